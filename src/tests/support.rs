use crate::{
    config::LowerOptions,
    language::{
        ast::*,
        errors::{LowerError, LowerErrorKind},
        span::Span,
        types::TypeExpr,
    },
    lower::lower_program,
    tools::emitter::emit_program,
};

pub fn unit(items: Vec<Item>) -> Program {
    let mut program = Program::new("main.gx", "main");
    program.items = items;
    program
}

pub fn func(
    name: &str,
    params: Vec<(&str, TypeExpr)>,
    returns: Option<TypeExpr>,
    body: Vec<Statement>,
) -> Item {
    let params = params
        .into_iter()
        .map(|(name, ty)| Param::new(name, ty))
        .collect();
    Item::Function(FunctionDecl::new(name, params, returns).with_body(body))
}

pub fn method(
    receiver: (&str, TypeExpr),
    name: &str,
    params: Vec<(&str, TypeExpr)>,
    returns: Option<TypeExpr>,
    body: Vec<Statement>,
) -> Item {
    match func(name, params, returns, body) {
        Item::Function(def) => Item::Function(def.with_receiver(Param::new(receiver.0, receiver.1))),
        other => other,
    }
}

pub fn empty_struct(name: &str) -> Item {
    Item::Struct(StructDef {
        name: name.to_string(),
        fields: Vec::new(),
        span: Span::default(),
    })
}

pub fn named(name: &str) -> TypeExpr {
    TypeExpr::named(name)
}

pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::ident(name), args)
}

pub fn try_call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::try_call(call(name, args))
}

pub fn text(value: &str) -> InterpolationSegment {
    InterpolationSegment::Text(value.to_string())
}

pub fn embed(expr: Expr, verb: Option<&str>) -> InterpolationSegment {
    InterpolationSegment::Expr {
        expr,
        verb: verb.map(str::to_string),
        span: Span::default(),
    }
}

pub fn interpolated(segments: Vec<InterpolationSegment>) -> Expr {
    Expr::Interpolated(InterpolatedString {
        segments,
        span: Span::default(),
    })
}

pub fn lower(program: Program) -> Program {
    lower_with(program, &LowerOptions::default())
}

pub fn lower_with(program: Program, options: &LowerOptions) -> Program {
    match lower_program(program, options) {
        Ok(program) => program,
        Err(errors) => panic!("lowering failed: {errors:?}"),
    }
}

pub fn emit(program: Program) -> String {
    emit_with(program, &LowerOptions::default())
}

pub fn emit_with(program: Program, options: &LowerOptions) -> String {
    emit_program(&lower_with(program, options)).expect("emitted")
}

pub fn lowering_errors(program: Program) -> Vec<LowerError> {
    match lower_program(program, &LowerOptions::default()) {
        Ok(lowered) => panic!("expected lowering to fail, got {lowered:?}"),
        Err(errors) => errors,
    }
}

pub fn error_kinds(program: Program) -> Vec<LowerErrorKind> {
    lowering_errors(program).into_iter().map(|err| err.kind).collect()
}

/// `func Hello(name string) Result<string>` from the first scenario.
pub fn hello() -> Item {
    func(
        "Hello",
        vec![("name", named("string"))],
        Some(TypeExpr::result(named("string"))),
        vec![
            Statement::if_then(
                Expr::binary(BinaryOp::Eq, Expr::ident("name"), Expr::string("")),
                vec![Statement::throw(Expr::string("empty name"))],
            ),
            Statement::ret(vec![Expr::binary(
                BinaryOp::Add,
                Expr::string("Hi, "),
                Expr::ident("name"),
            )]),
        ],
    )
}
