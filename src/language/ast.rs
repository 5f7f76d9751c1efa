use crate::language::{span::Span, types::TypeExpr};

/// One program unit: a single host-language source file once lowered.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub name: String,
    pub package: String,
    pub imports: Vec<Import>,
    pub items: Vec<Item>,
}

impl Program {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            imports: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(def) => Some(def),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub alias: Option<String>,
}

impl Import {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Function(FunctionDecl),
    Struct(StructDef),
    Enum(EnumDef),
    Const(ConstDef),
    /// Support code inserted by lowering, rendered verbatim by the emitter.
    Runtime(RuntimeSupport),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuntimeSupport {
    SyncState { prefix: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<StructField>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<EnumVariant>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    pub fields: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstDef {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub receiver: Option<Param>,
    pub params: Vec<Param>,
    pub returns: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>, params: Vec<Param>, returns: Option<TypeExpr>) -> Self {
        Self {
            name: name.into(),
            receiver: None,
            params,
            returns,
            body: Block::default(),
            span: Span::default(),
        }
    }

    pub fn with_receiver(mut self, receiver: Param) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn with_body(mut self, statements: Vec<Statement>) -> Self {
        self.body = Block::new(statements);
        self
    }

    /// Key under which the signature table stores this declaration.
    pub fn signature_key(&self) -> String {
        match &self.receiver {
            Some(receiver) => method_key(receiver_type_name(&receiver.ty), &self.name),
            None => self.name.clone(),
        }
    }
}

pub fn method_key(type_name: &str, method: &str) -> String {
    format!("{type_name}.{method}")
}

/// Strips pointer layers from a receiver or variable type.
pub fn receiver_type_name(ty: &TypeExpr) -> &str {
    match ty {
        TypeExpr::Pointer { inner, .. } => receiver_type_name(inner),
        TypeExpr::Named(name) => name,
        _ => "",
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            span: Span::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            span: Span::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Var(VarStmt),
    Assign(AssignStmt),
    Expr(ExprStmt),
    Return(ReturnStmt),
    If(IfStmt),
    For(ForStmt),
    Throw(ThrowStmt),
    GoBinding(GoBindingStmt),
    Go(GoStmt),
    Defer(DeferStmt),
    Break(Span),
    Continue(Span),
    Block(Block),
}

impl Statement {
    pub fn define(names: &[&str], values: Vec<Expr>) -> Self {
        Statement::Assign(AssignStmt {
            targets: names.iter().map(|name| Expr::ident(*name)).collect(),
            op: AssignOp::Define,
            values,
            span: Span::default(),
        })
    }

    pub fn assign(targets: Vec<Expr>, values: Vec<Expr>) -> Self {
        Statement::Assign(AssignStmt {
            targets,
            op: AssignOp::Assign,
            values,
            span: Span::default(),
        })
    }

    pub fn expr(expr: Expr) -> Self {
        Statement::Expr(ExprStmt { expr })
    }

    pub fn ret(values: Vec<Expr>) -> Self {
        Statement::Return(ReturnStmt {
            values,
            span: Span::default(),
        })
    }

    pub fn throw(value: Expr) -> Self {
        Statement::Throw(ThrowStmt {
            value,
            span: Span::default(),
        })
    }

    pub fn if_then(condition: Expr, then_branch: Vec<Statement>) -> Self {
        Statement::If(IfStmt {
            condition,
            then_branch: Block::new(then_branch),
            else_branch: None,
            span: Span::default(),
        })
    }

    pub fn go_binding(names: &[&str], call: Expr) -> Self {
        Statement::GoBinding(GoBindingStmt {
            names: names.iter().map(|name| Identifier::new(*name)).collect(),
            call,
            span: Span::default(),
        })
    }

    pub fn span(&self) -> Span {
        match self {
            Statement::Var(stmt) => stmt.span,
            Statement::Assign(stmt) => stmt.span,
            Statement::Expr(stmt) => stmt.expr.span(),
            Statement::Return(stmt) => stmt.span,
            Statement::If(stmt) => stmt.span,
            Statement::For(stmt) => stmt.span,
            Statement::Throw(stmt) => stmt.span,
            Statement::GoBinding(stmt) => stmt.span,
            Statement::Go(stmt) => stmt.span,
            Statement::Defer(stmt) => stmt.span,
            Statement::Break(span) | Statement::Continue(span) => *span,
            Statement::Block(block) => block.span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarStmt {
    pub names: Vec<Identifier>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssignStmt {
    pub targets: Vec<Expr>,
    pub op: AssignOp,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    /// `:=`
    Define,
    /// `=`
    Assign,
    /// `op=`
    Compound(BinaryOp),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Block,
    pub else_branch: Option<ElseBranch>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElseBranch {
    Block(Block),
    ElseIf(Box<IfStmt>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForStmt {
    pub clause: ForClause,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ForClause {
    Infinite,
    Condition(Expr),
    ThreeClause {
        init: Option<Box<Statement>>,
        condition: Option<Expr>,
        post: Option<Box<Statement>>,
    },
    Range {
        key: Option<Identifier>,
        value: Option<Identifier>,
        define: bool,
        iterable: Expr,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThrowStmt {
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GoBindingStmt {
    pub names: Vec<Identifier>,
    pub call: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GoStmt {
    pub call: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeferStmt {
    pub call: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Identifier(Identifier),
    Literal(Literal),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Interpolated(InterpolatedString),
    Try {
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Selector {
        base: Box<Expr>,
        field: String,
        span: Span,
    },
    /// Element access, and generic instantiation when `index` is a type.
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Composite {
        ty: TypeExpr,
        elements: Vec<CompositeElement>,
        span: Span,
    },
    FuncLit(Box<FuncLit>),
    /// A type in expression position, e.g. the first argument of `make`.
    Type(TypeExpr, Span),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(Identifier::new(name))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into(), Span::default()))
    }

    pub fn int(value: i128) -> Self {
        Expr::Literal(Literal::Int(value, Span::default()))
    }

    pub fn bool(value: bool) -> Self {
        Expr::Literal(Literal::Bool(value, Span::default()))
    }

    pub fn nil() -> Self {
        Expr::Literal(Literal::Nil(Span::default()))
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
            span: Span::default(),
        }
    }

    /// Calls a possibly package-qualified function such as `fmt.Sprintf`.
    pub fn call_path(path: &str, args: Vec<Expr>) -> Self {
        let mut parts = path.split('.');
        let mut callee = Expr::ident(parts.next().unwrap_or_default());
        for part in parts {
            callee = Expr::selector(callee, part);
        }
        Expr::call(callee, args)
    }

    pub fn selector(base: Expr, field: impl Into<String>) -> Self {
        Expr::Selector {
            base: Box::new(base),
            field: field.into(),
            span: Span::default(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: Span::default(),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary {
            op,
            expr: Box::new(expr),
            span: Span::default(),
        }
    }

    pub fn receive(expr: Expr) -> Self {
        Expr::unary(UnaryOp::Receive, expr)
    }

    pub fn try_call(call: Expr) -> Self {
        Expr::Try {
            expr: Box::new(call),
            span: Span::default(),
        }
    }

    pub fn index(base: Expr, index: Expr) -> Self {
        Expr::Index {
            base: Box::new(base),
            index: Box::new(index),
            span: Span::default(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Identifier(ident) => ident.span,
            Expr::Literal(lit) => lit.span(),
            Expr::Interpolated(lit) => lit.span,
            Expr::FuncLit(lit) => lit.span,
            Expr::Type(_, span) => *span,
            Expr::Call { span, .. }
            | Expr::Try { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Selector { span, .. }
            | Expr::Index { span, .. }
            | Expr::Composite { span, .. } => *span,
        }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expr::Identifier(ident) => Some(&ident.name),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Nil(_)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: Span::default(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i128, Span),
    Float(f64, Span),
    String(String, Span),
    Rune(char, Span),
    Bool(bool, Span),
    Nil(Span),
}

impl Literal {
    pub fn span(&self) -> Span {
        match self {
            Literal::Int(_, span)
            | Literal::Float(_, span)
            | Literal::String(_, span)
            | Literal::Rune(_, span)
            | Literal::Bool(_, span)
            | Literal::Nil(span) => *span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterpolatedString {
    pub segments: Vec<InterpolationSegment>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InterpolationSegment {
    Text(String),
    Expr {
        expr: Expr,
        verb: Option<String>,
        span: Span,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompositeElement {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncLit {
    pub params: Vec<Param>,
    pub returns: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    AndNot,
    Shl,
    Shr,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::AndNot => "&^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }

    /// Host-language binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::BitAnd
            | BinaryOp::AndNot => 5,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::BitOr | BinaryOp::BitXor => 4,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => 3,
            BinaryOp::And => 2,
            BinaryOp::Or => 1,
        }
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Receive,
    AddressOf,
    Deref,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "^",
            UnaryOp::Receive => "<-",
            UnaryOp::AddressOf => "&",
            UnaryOp::Deref => "*",
        }
    }
}
