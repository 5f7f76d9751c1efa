use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelDirection {
    Bidirectional,
    SendOnly,
    ReceiveOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Nillability {
    Nillable,
    NonNillable,
}

impl Nillability {
    pub fn is_nillable(self) -> bool {
        matches!(self, Nillability::Nillable)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    Named(String),
    /// `[]T`
    Array(Box<TypeExpr>),
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Option(Box<TypeExpr>),
    Result(Box<TypeExpr>),
    Pointer {
        inner: Box<TypeExpr>,
        nillable: bool,
    },
    Channel {
        inner: Box<TypeExpr>,
        direction: ChannelDirection,
    },
    /// Multi-value return shape. The empty tuple is the unit shape.
    Tuple(Vec<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into())
    }

    pub fn array(element: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(element))
    }

    pub fn map(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn option(inner: TypeExpr) -> Self {
        TypeExpr::Option(Box::new(inner))
    }

    pub fn result(inner: TypeExpr) -> Self {
        TypeExpr::Result(Box::new(inner))
    }

    pub fn pointer(inner: TypeExpr) -> Self {
        TypeExpr::Pointer {
            inner: Box::new(inner),
            nillable: true,
        }
    }

    pub fn non_nillable(inner: TypeExpr) -> Self {
        TypeExpr::Pointer {
            inner: Box::new(inner),
            nillable: false,
        }
    }

    pub fn channel(inner: TypeExpr, direction: ChannelDirection) -> Self {
        TypeExpr::Channel {
            inner: Box::new(inner),
            direction,
        }
    }

    pub fn unit() -> Self {
        TypeExpr::Tuple(Vec::new())
    }

    pub fn error() -> Self {
        TypeExpr::named("error")
    }

    pub fn is_result(&self) -> bool {
        matches!(self, TypeExpr::Result(_))
    }

    pub fn is_option(&self) -> bool {
        matches!(self, TypeExpr::Option(_))
    }

    /// True for types whose zero value is `nil` in the host language.
    pub fn is_reference_like(&self) -> bool {
        match self {
            TypeExpr::Named(name) => matches!(name.as_str(), "error" | "any" | "interface{}"),
            TypeExpr::Array(_)
            | TypeExpr::Map { .. }
            | TypeExpr::Pointer { .. }
            | TypeExpr::Channel { .. }
            | TypeExpr::Option(_) => true,
            TypeExpr::Result(_) | TypeExpr::Tuple(_) => false,
        }
    }

    /// True when the expression contains no extended constructor.
    pub fn is_base(&self) -> bool {
        match self {
            TypeExpr::Named(_) => true,
            TypeExpr::Array(inner) => inner.is_base(),
            TypeExpr::Map { key, value } => key.is_base() && value.is_base(),
            TypeExpr::Option(_) | TypeExpr::Result(_) => false,
            TypeExpr::Pointer { inner, nillable } => *nillable && inner.is_base(),
            TypeExpr::Channel { inner, .. } => inner.is_base(),
            TypeExpr::Tuple(types) => types.iter().all(TypeExpr::is_base),
        }
    }

    /// Flattens a return shape into its positional slots.
    pub fn slots(&self) -> Vec<TypeExpr> {
        match self {
            TypeExpr::Tuple(types) => types.clone(),
            other => vec![other.clone()],
        }
    }

    pub fn canonical_name(&self) -> String {
        match self {
            TypeExpr::Named(name) => name.clone(),
            TypeExpr::Array(inner) => format!("[]{}", inner.canonical_name()),
            TypeExpr::Map { key, value } => {
                format!("map[{}]{}", key.canonical_name(), value.canonical_name())
            }
            TypeExpr::Option(inner) => format!("{}?", inner.canonical_name()),
            TypeExpr::Result(inner) => format!("Result<{}>", inner.canonical_name()),
            TypeExpr::Pointer { inner, nillable } => {
                if *nillable {
                    format!("*{}", inner.canonical_name())
                } else {
                    format!("*!{}", inner.canonical_name())
                }
            }
            TypeExpr::Channel { inner, direction } => match direction {
                ChannelDirection::Bidirectional => format!("chan {}", inner.canonical_name()),
                ChannelDirection::SendOnly => format!("chan<- {}", inner.canonical_name()),
                ChannelDirection::ReceiveOnly => format!("<-chan {}", inner.canonical_name()),
            },
            TypeExpr::Tuple(types) => {
                let rendered: Vec<String> = types.iter().map(|ty| ty.canonical_name()).collect();
                format!("({})", rendered.join(", "))
            }
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name())
    }
}
