//! Type lowering: extended type expressions to base types plus metadata.
//!
//! Result types only shape function signatures; the signature rule itself is
//! applied by the error-propagation rewriter. This pass validates every type
//! annotation, lowers value types in place, rejects nil flowing into
//! non-nillable pointers, and builds the signature table later passes use.

use crate::{
    config::{LowerOptions, OptionPolicy},
    language::{
        ast::*,
        errors::{LowerError, LowerErrorKind, LowerResult},
        span::Span,
        types::{ChannelDirection, Nillability, TypeExpr},
    },
    lower::{
        finish,
        signatures::{FnSignature, SignatureTable, TypeEnv},
        walk,
    },
};
use log::trace;
use std::mem;

/// What the passes need to know about a type beyond its lowered form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeInfo {
    pub is_option: bool,
    pub is_result: bool,
    pub nillability: Option<Nillability>,
    pub channel_direction: Option<ChannelDirection>,
    pub element: Option<TypeExpr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoweredType {
    pub ty: TypeExpr,
    pub info: TypeInfo,
}

impl LoweredType {
    fn plain(ty: TypeExpr) -> Self {
        Self {
            ty,
            info: TypeInfo::default(),
        }
    }
}

/// Lowers a type in value position.
pub fn lower_type(ty: &TypeExpr, span: Span, options: &LowerOptions) -> LowerResult<LoweredType> {
    match ty {
        TypeExpr::Named(_) => Ok(LoweredType::plain(ty.clone())),
        TypeExpr::Array(element) => {
            let element = lower_type(element, span, options)?.ty;
            Ok(LoweredType {
                ty: TypeExpr::array(element.clone()),
                info: TypeInfo {
                    element: Some(element),
                    ..TypeInfo::default()
                },
            })
        }
        TypeExpr::Map { key, value } => {
            let key = lower_type(key, span, options)?.ty;
            let value = lower_type(value, span, options)?.ty;
            Ok(LoweredType {
                ty: TypeExpr::map(key, value.clone()),
                info: TypeInfo {
                    element: Some(value),
                    ..TypeInfo::default()
                },
            })
        }
        TypeExpr::Option(inner) => {
            let lowered = lower_type(inner, span, options)?.ty;
            let keep_sentinel = options.option_policy == OptionPolicy::NilSentinel
                && !inner.is_option()
                && lowered.is_reference_like();
            let ty = if keep_sentinel {
                lowered.clone()
            } else {
                TypeExpr::pointer(lowered.clone())
            };
            Ok(LoweredType {
                ty,
                info: TypeInfo {
                    is_option: true,
                    nillability: Some(Nillability::Nillable),
                    element: Some(lowered),
                    ..TypeInfo::default()
                },
            })
        }
        TypeExpr::Result(inner) => Err(LowerError::invalid_type_usage(
            span,
            format!(
                "`Result<{}>` can only be used as a function return type",
                inner.canonical_name()
            ),
        )
        .with_help("return the Result from a function, or use the value type directly")),
        TypeExpr::Pointer { inner, nillable } => {
            let element = lower_type(inner, span, options)?.ty;
            Ok(LoweredType {
                ty: TypeExpr::pointer(element.clone()),
                info: TypeInfo {
                    nillability: Some(if *nillable {
                        Nillability::Nillable
                    } else {
                        Nillability::NonNillable
                    }),
                    element: Some(element),
                    ..TypeInfo::default()
                },
            })
        }
        TypeExpr::Channel { inner, direction } => {
            let element = lower_type(inner, span, options)?.ty;
            Ok(LoweredType {
                ty: TypeExpr::channel(element.clone(), *direction),
                info: TypeInfo {
                    channel_direction: Some(*direction),
                    element: Some(element),
                    ..TypeInfo::default()
                },
            })
        }
        TypeExpr::Tuple(_) => Err(LowerError::invalid_type_usage(
            span,
            format!(
                "tuple type `{}` is only valid as a return type",
                ty.canonical_name()
            ),
        )),
    }
}

/// The lowered shape of a declared return clause.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReturnShape {
    pub declared_slots: Vec<TypeExpr>,
    pub value_slots: Vec<TypeExpr>,
    pub is_result: bool,
}

impl ReturnShape {
    pub fn info(&self) -> TypeInfo {
        TypeInfo {
            is_result: self.is_result,
            ..TypeInfo::default()
        }
    }

    pub fn lowered_return(&self) -> Option<TypeExpr> {
        let mut slots = self.value_slots.clone();
        if self.is_result {
            slots.push(TypeExpr::error());
        }
        match slots.len() {
            0 => None,
            1 => slots.pop(),
            _ => Some(TypeExpr::Tuple(slots)),
        }
    }
}

pub fn lower_return(
    ty: Option<&TypeExpr>,
    span: Span,
    options: &LowerOptions,
) -> LowerResult<ReturnShape> {
    let Some(ty) = ty else {
        return Ok(ReturnShape::default());
    };
    let (declared, is_result) = match ty {
        TypeExpr::Result(inner) => {
            if inner.is_result() {
                return Err(LowerError::invalid_type_usage(
                    span,
                    format!("nested Result `{}` is not allowed", ty.canonical_name()),
                )
                .with_help("a function has exactly one error slot"));
            }
            (inner.slots(), true)
        }
        other => (other.slots(), false),
    };
    let value_slots = declared
        .iter()
        .map(|slot| lower_type(slot, span, options).map(|lowered| lowered.ty))
        .collect::<LowerResult<Vec<_>>>()?;
    Ok(ReturnShape {
        declared_slots: declared,
        value_slots,
        is_result,
    })
}

const NUMERIC_TYPES: &[&str] = &[
    "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64",
    "uintptr", "float32", "float64", "complex64", "complex128", "byte", "rune",
];

/// Structural zero value of a lowered type.
pub fn zero_value(ty: &TypeExpr, table: &SignatureTable) -> Expr {
    match ty {
        TypeExpr::Named(name) => match name.as_str() {
            "string" => Expr::string(""),
            "bool" => Expr::bool(false),
            "error" | "any" | "interface{}" => Expr::nil(),
            numeric if NUMERIC_TYPES.contains(&numeric) => Expr::int(0),
            strukt if table.is_struct(strukt) => Expr::Composite {
                ty: ty.clone(),
                elements: Vec::new(),
                span: Span::default(),
            },
            // Works for any named type, including ones declared elsewhere.
            _ => Expr::unary(
                UnaryOp::Deref,
                Expr::call(Expr::ident("new"), vec![Expr::Type(ty.clone(), Span::default())]),
            ),
        },
        TypeExpr::Array(_)
        | TypeExpr::Map { .. }
        | TypeExpr::Option(_)
        | TypeExpr::Pointer { .. }
        | TypeExpr::Channel { .. }
        | TypeExpr::Result(_)
        | TypeExpr::Tuple(_) => Expr::nil(),
    }
}

/// Runs type lowering over a program unit and returns its signature table.
pub fn lower_types(
    program: &mut Program,
    options: &LowerOptions,
) -> Result<SignatureTable, Vec<LowerError>> {
    let mut errors = Vec::new();
    let table = build_signatures(program, options, &mut errors);

    for item in &program.items {
        match item {
            Item::Function(def) => {
                let env = TypeEnv::for_function(def, &table);
                let returns = table
                    .get(&def.signature_key())
                    .map(|sig| sig.declared_slots.clone())
                    .unwrap_or_default();
                let mut check = NilCheck {
                    table: &table,
                    env,
                    returns,
                    errors: &mut errors,
                };
                check.check_block(&def.body);
            }
            Item::Enum(def) => {
                if let Some(variant) = def.variants.iter().find(|v| !v.fields.is_empty()) {
                    errors.push(
                        LowerError::unsupported(
                            variant.span,
                            format!(
                                "enum `{}` variant `{}` carries associated values",
                                def.name, variant.name
                            ),
                        )
                        .with_help("only enums with plain variants can be lowered"),
                    );
                }
            }
            _ => {}
        }
    }

    let mut rewriter = TypeRewriter {
        options,
        errors: &mut errors,
    };
    for item in &mut program.items {
        rewriter.rewrite_item(item);
    }

    finish(errors)?;
    Ok(table)
}

fn build_signatures(
    program: &Program,
    options: &LowerOptions,
    errors: &mut Vec<LowerError>,
) -> SignatureTable {
    let mut table = SignatureTable::default();
    for item in &program.items {
        match item {
            Item::Struct(def) => table.insert_struct(def.name.clone()),
            Item::Function(def) => match lower_return(def.returns.as_ref(), def.span, options) {
                Ok(shape) => {
                    trace!(
                        "signature `{}`: {} value slot(s), result: {}",
                        def.signature_key(),
                        shape.value_slots.len(),
                        shape.is_result
                    );
                    table.insert(
                        def.signature_key(),
                        FnSignature {
                            name: def.name.clone(),
                            params: def.params.iter().map(|p| p.ty.clone()).collect(),
                            declared_slots: shape.declared_slots,
                            value_slots: shape.value_slots,
                            is_result: shape.is_result,
                        },
                    );
                }
                Err(err) => errors.push(err),
            },
            _ => {}
        }
    }
    table
}

fn is_non_nillable(ty: &TypeExpr) -> bool {
    matches!(
        ty,
        TypeExpr::Pointer {
            nillable: false,
            ..
        }
    )
}

fn nil_to_non_nillable(span: Span, what: &str) -> LowerError {
    LowerError::new(
        LowerErrorKind::NilToNonNillable,
        span,
        format!("{what} is a non-nillable pointer but receives a nil-producing expression"),
    )
}

struct NilCheck<'a> {
    table: &'a SignatureTable,
    env: TypeEnv,
    returns: Vec<TypeExpr>,
    errors: &'a mut Vec<LowerError>,
}

impl NilCheck<'_> {
    fn nil_producing(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Literal(Literal::Nil(_)) => true,
            Expr::Identifier(ident) => self.env.get(&ident.name).is_some_and(TypeExpr::is_option),
            Expr::Call { callee, .. } => self
                .table
                .resolve_call(callee, &self.env)
                .is_some_and(|sig| {
                    !sig.is_result
                        && matches!(
                            sig.declared_slots.as_slice(),
                            [TypeExpr::Option(_)] | [TypeExpr::Pointer { nillable: true, .. }]
                        )
                }),
            _ => false,
        }
    }

    fn check_block(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.check_statement(stmt);
        }
    }

    fn check_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Var(var) => {
                if let Some(ty) = var.ty.as_ref().filter(|ty| is_non_nillable(ty)) {
                    if var.values.is_empty() {
                        self.errors.push(
                            LowerError::new(
                                LowerErrorKind::NilToNonNillable,
                                var.span,
                                format!(
                                    "non-nillable `{}` declared without an initializer",
                                    ty.canonical_name()
                                ),
                            )
                            .with_help("initialize the variable with a non-nil value"),
                        );
                    }
                    for (name, value) in var.names.iter().zip(&var.values) {
                        if self.nil_producing(value) {
                            self.errors.push(nil_to_non_nillable(
                                value.span(),
                                &format!("`{}`", name.name),
                            ));
                        }
                    }
                }
            }
            Statement::Assign(assign)
                if assign.op == AssignOp::Assign && assign.targets.len() == assign.values.len() =>
            {
                for (target, value) in assign.targets.iter().zip(&assign.values) {
                    let declared = target
                        .as_identifier()
                        .and_then(|name| self.env.get(name))
                        .is_some_and(is_non_nillable);
                    if declared && self.nil_producing(value) {
                        self.errors.push(nil_to_non_nillable(
                            value.span(),
                            &format!("`{}`", target.as_identifier().unwrap_or_default()),
                        ));
                    }
                }
            }
            Statement::Return(ret) if ret.values.len() == self.returns.len() => {
                for (slot, value) in self.returns.iter().zip(&ret.values) {
                    if is_non_nillable(slot) && self.nil_producing(value) {
                        self.errors
                            .push(nil_to_non_nillable(value.span(), "return slot"));
                    }
                }
            }
            Statement::If(if_stmt) => self.check_if(if_stmt),
            Statement::For(for_stmt) => {
                if let ForClause::ThreeClause {
                    init: Some(init), ..
                } = &for_stmt.clause
                {
                    self.check_statement(init);
                }
                self.check_block(&for_stmt.body);
            }
            Statement::Block(block) => self.check_block(block),
            _ => {}
        }
        self.check_calls(stmt);
    }

    fn check_if(&mut self, if_stmt: &IfStmt) {
        self.check_block(&if_stmt.then_branch);
        match &if_stmt.else_branch {
            Some(ElseBranch::Block(block)) => self.check_block(block),
            Some(ElseBranch::ElseIf(nested)) => self.check_if(nested),
            None => {}
        }
    }

    /// Checks call arguments in the statement's own expressions; nested
    /// blocks are checked when `check_statement` reaches them.
    fn check_calls(&mut self, stmt: &Statement) {
        let exprs: Vec<&Expr> = match stmt {
            Statement::Var(var) => var.values.iter().collect(),
            Statement::Assign(assign) => assign.targets.iter().chain(&assign.values).collect(),
            Statement::Expr(stmt) => vec![&stmt.expr],
            Statement::Return(ret) => ret.values.iter().collect(),
            Statement::If(if_stmt) => vec![&if_stmt.condition],
            Statement::For(for_stmt) => match &for_stmt.clause {
                ForClause::Condition(cond) => vec![cond],
                ForClause::ThreeClause { condition, .. } => condition.iter().collect(),
                ForClause::Range { iterable, .. } => vec![iterable],
                ForClause::Infinite => Vec::new(),
            },
            Statement::Throw(throw) => vec![&throw.value],
            Statement::GoBinding(binding) => vec![&binding.call],
            Statement::Go(stmt) => vec![&stmt.call],
            Statement::Defer(stmt) => vec![&stmt.call],
            Statement::Break(_) | Statement::Continue(_) | Statement::Block(_) => Vec::new(),
        };
        for expr in exprs {
            walk::visit_expr(expr, &mut |node| match node {
                Expr::Call { callee, args, .. } => {
                    if let Some(sig) = self.table.resolve_call(callee, &self.env) {
                        for (param, arg) in sig.params.iter().zip(args) {
                            if is_non_nillable(param) && self.nil_producing(arg) {
                                self.errors.push(nil_to_non_nillable(
                                    arg.span(),
                                    &format!("parameter of `{}`", sig.name),
                                ));
                            }
                        }
                    }
                    true
                }
                Expr::FuncLit(lit) => {
                    let returns = match &lit.returns {
                        Some(TypeExpr::Result(inner)) => inner.slots(),
                        Some(other) => other.slots(),
                        None => Vec::new(),
                    };
                    let outer = mem::replace(&mut self.returns, returns);
                    self.check_block(&lit.body);
                    self.returns = outer;
                    false
                }
                _ => true,
            });
        }
    }
}

struct TypeRewriter<'a> {
    options: &'a LowerOptions,
    errors: &'a mut Vec<LowerError>,
}

impl TypeRewriter<'_> {
    fn lower(&mut self, ty: &mut TypeExpr, span: Span) {
        match lower_type(ty, span, self.options) {
            Ok(lowered) => *ty = lowered.ty,
            Err(err) => self.errors.push(err),
        }
    }

    fn rewrite_item(&mut self, item: &mut Item) {
        match item {
            Item::Function(def) => {
                if let Some(receiver) = &mut def.receiver {
                    self.lower(&mut receiver.ty, receiver.span);
                }
                for param in &mut def.params {
                    self.lower(&mut param.ty, param.span);
                }
                self.rewrite_block(&mut def.body);
            }
            Item::Struct(def) => {
                for field in &mut def.fields {
                    self.lower(&mut field.ty, field.span);
                }
            }
            Item::Const(def) => {
                if let Some(ty) = &mut def.ty {
                    self.lower(ty, def.span);
                }
                self.rewrite_expr(&mut def.value);
            }
            Item::Enum(_) | Item::Runtime(_) => {}
        }
    }

    fn rewrite_block(&mut self, block: &mut Block) {
        for stmt in &mut block.statements {
            self.rewrite_statement(stmt);
        }
    }

    fn rewrite_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Var(var) => {
                if let Some(ty) = &mut var.ty {
                    self.lower(ty, var.span);
                }
                for value in &mut var.values {
                    self.rewrite_expr(value);
                }
            }
            Statement::Assign(assign) => {
                for expr in assign.targets.iter_mut().chain(assign.values.iter_mut()) {
                    self.rewrite_expr(expr);
                }
            }
            Statement::Expr(stmt) => self.rewrite_expr(&mut stmt.expr),
            Statement::Return(ret) => {
                for value in &mut ret.values {
                    self.rewrite_expr(value);
                }
            }
            Statement::If(if_stmt) => self.rewrite_if(if_stmt),
            Statement::For(for_stmt) => {
                match &mut for_stmt.clause {
                    ForClause::Infinite => {}
                    ForClause::Condition(cond) => self.rewrite_expr(cond),
                    ForClause::ThreeClause {
                        init,
                        condition,
                        post,
                    } => {
                        if let Some(init) = init {
                            self.rewrite_statement(init);
                        }
                        if let Some(cond) = condition {
                            self.rewrite_expr(cond);
                        }
                        if let Some(post) = post {
                            self.rewrite_statement(post);
                        }
                    }
                    ForClause::Range { iterable, .. } => self.rewrite_expr(iterable),
                }
                self.rewrite_block(&mut for_stmt.body);
            }
            Statement::Throw(throw) => self.rewrite_expr(&mut throw.value),
            Statement::GoBinding(binding) => self.rewrite_expr(&mut binding.call),
            Statement::Go(stmt) => self.rewrite_expr(&mut stmt.call),
            Statement::Defer(stmt) => self.rewrite_expr(&mut stmt.call),
            Statement::Break(_) | Statement::Continue(_) => {}
            Statement::Block(block) => self.rewrite_block(block),
        }
    }

    fn rewrite_if(&mut self, if_stmt: &mut IfStmt) {
        self.rewrite_expr(&mut if_stmt.condition);
        self.rewrite_block(&mut if_stmt.then_branch);
        match &mut if_stmt.else_branch {
            Some(ElseBranch::Block(block)) => self.rewrite_block(block),
            Some(ElseBranch::ElseIf(nested)) => self.rewrite_if(nested),
            None => {}
        }
    }

    fn rewrite_expr(&mut self, expr: &mut Expr) {
        let taken = mem::replace(expr, Expr::nil());
        *expr = walk::map_expr_shallow(taken, &mut |node| match node {
            Expr::Composite {
                mut ty,
                elements,
                span,
            } => {
                self.lower(&mut ty, span);
                Expr::Composite { ty, elements, span }
            }
            Expr::Type(mut ty, span) => {
                self.lower(&mut ty, span);
                Expr::Type(ty, span)
            }
            Expr::FuncLit(mut lit) => {
                for param in &mut lit.params {
                    self.lower(&mut param.ty, param.span);
                }
                self.rewrite_block(&mut lit.body);
                Expr::FuncLit(lit)
            }
            other => other,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(ty: TypeExpr) -> LowerResult<LoweredType> {
        lower_type(&ty, Span::default(), &LowerOptions::default())
    }

    #[test]
    fn option_of_value_type_becomes_pointer() {
        let lowered = lower(TypeExpr::option(TypeExpr::named("int"))).expect("lowered");
        assert_eq!(lowered.ty, TypeExpr::pointer(TypeExpr::named("int")));
        assert!(lowered.info.is_option);
        assert_eq!(lowered.info.element, Some(TypeExpr::named("int")));
    }

    #[test]
    fn option_of_reference_type_keeps_nil_sentinel() {
        let slice = TypeExpr::array(TypeExpr::named("string"));
        let lowered = lower(TypeExpr::option(slice.clone())).expect("lowered");
        assert_eq!(lowered.ty, slice);

        let options = LowerOptions {
            option_policy: OptionPolicy::AlwaysPointer,
            ..LowerOptions::default()
        };
        let lowered =
            lower_type(&TypeExpr::option(slice.clone()), Span::default(), &options).expect("lowered");
        assert_eq!(lowered.ty, TypeExpr::pointer(slice));
    }

    #[test]
    fn nested_option_stays_distinguishable() {
        let lowered = lower(TypeExpr::option(TypeExpr::option(TypeExpr::named("int"))))
            .expect("lowered");
        assert_eq!(
            lowered.ty,
            TypeExpr::pointer(TypeExpr::pointer(TypeExpr::named("int")))
        );
    }

    #[test]
    fn result_in_value_position_is_invalid() {
        let err = lower(TypeExpr::array(TypeExpr::result(TypeExpr::named("int")))).unwrap_err();
        assert_eq!(err.kind, LowerErrorKind::InvalidTypeUsage);
    }

    #[test]
    fn non_nillable_pointer_lowers_to_plain_pointer() {
        let lowered = lower(TypeExpr::non_nillable(TypeExpr::named("User"))).expect("lowered");
        assert_eq!(lowered.ty, TypeExpr::pointer(TypeExpr::named("User")));
        assert_eq!(lowered.info.nillability, Some(Nillability::NonNillable));
    }

    #[test]
    fn channels_keep_direction() {
        let lowered = lower(TypeExpr::channel(
            TypeExpr::option(TypeExpr::named("int")),
            ChannelDirection::SendOnly,
        ))
        .expect("lowered");
        assert_eq!(
            lowered.ty,
            TypeExpr::channel(
                TypeExpr::pointer(TypeExpr::named("int")),
                ChannelDirection::SendOnly
            )
        );
        assert_eq!(lowered.info.channel_direction, Some(ChannelDirection::SendOnly));
    }

    #[test]
    fn result_return_splits_into_value_slots() {
        let options = LowerOptions::default();
        let shape = lower_return(
            Some(&TypeExpr::result(TypeExpr::Tuple(vec![
                TypeExpr::named("int"),
                TypeExpr::named("string"),
            ]))),
            Span::default(),
            &options,
        )
        .expect("shape");
        assert!(shape.is_result);
        assert_eq!(shape.value_slots.len(), 2);
        assert!(shape.info().is_result);
        assert_eq!(
            shape.lowered_return(),
            Some(TypeExpr::Tuple(vec![
                TypeExpr::named("int"),
                TypeExpr::named("string"),
                TypeExpr::error(),
            ]))
        );

        let nested = lower_return(
            Some(&TypeExpr::result(TypeExpr::result(TypeExpr::named("int")))),
            Span::default(),
            &options,
        );
        assert_eq!(nested.unwrap_err().kind, LowerErrorKind::InvalidTypeUsage);
    }

    #[test]
    fn zero_values_follow_the_type() {
        let mut table = SignatureTable::default();
        table.insert_struct("Point");
        assert_eq!(zero_value(&TypeExpr::named("string"), &table), Expr::string(""));
        assert_eq!(zero_value(&TypeExpr::named("float64"), &table), Expr::int(0));
        assert_eq!(zero_value(&TypeExpr::named("bool"), &table), Expr::bool(false));
        assert_eq!(
            zero_value(&TypeExpr::map(TypeExpr::named("string"), TypeExpr::named("int")), &table),
            Expr::nil()
        );
        assert!(matches!(
            zero_value(&TypeExpr::named("Point"), &table),
            Expr::Composite { .. }
        ));
        assert!(matches!(
            zero_value(&TypeExpr::named("time.Duration"), &table),
            Expr::Unary {
                op: UnaryOp::Deref,
                ..
            }
        ));
    }
}
