use crate::{
    language::{
        ast::*,
        errors::{LowerError, LowerResult},
        span::Span,
        types::{ChannelDirection, TypeExpr},
    },
    runtime::prelude::sync_state_source,
};

/// Binding strength of unary operators.
const UNARY_PREC: u8 = 6;
/// Binding strength of primary expressions: operands of calls, selectors and
/// index expressions.
const PRIMARY_PREC: u8 = 7;

/// Renders a fully lowered program unit as Go source.
pub fn emit_program(program: &Program) -> LowerResult<String> {
    let mut out = String::new();
    out.push_str(&format!("package {}\n", program.package));

    match program.imports.as_slice() {
        [] => {}
        [import] => out.push_str(&format!("\nimport {}\n", format_import(import))),
        imports => {
            out.push_str("\nimport (\n");
            for import in imports {
                out.push_str(&format!("\t{}\n", format_import(import)));
            }
            out.push_str(")\n");
        }
    }

    for item in &program.items {
        out.push('\n');
        match item {
            Item::Function(def) => format_function(&mut out, def)?,
            Item::Struct(def) => format_struct(&mut out, def)?,
            Item::Enum(def) => format_enum(&mut out, def)?,
            Item::Const(def) => format_const(&mut out, def)?,
            Item::Runtime(RuntimeSupport::SyncState { prefix }) => {
                out.push_str(&sync_state_source(prefix))
            }
        }
    }
    Ok(out)
}

fn format_import(import: &Import) -> String {
    match &import.alias {
        Some(alias) => format!("{alias} {}", quote_string(&import.path)),
        None => quote_string(&import.path),
    }
}

fn format_function(out: &mut String, def: &FunctionDecl) -> LowerResult<()> {
    out.push_str("func ");
    if let Some(receiver) = &def.receiver {
        out.push_str(&format!("({}) ", format_param(receiver)?));
    }
    out.push_str(&def.name);
    out.push_str(&format_signature(&def.params, def.returns.as_ref(), def.span)?);
    out.push_str(" {\n");
    format_block(out, &def.body, 1)?;
    out.push_str("}\n");
    Ok(())
}

fn format_signature(params: &[Param], returns: Option<&TypeExpr>, span: Span) -> LowerResult<String> {
    let params = params
        .iter()
        .map(format_param)
        .collect::<LowerResult<Vec<_>>>()?
        .join(", ");
    let returns = match returns {
        None => String::new(),
        Some(TypeExpr::Tuple(slots)) if slots.is_empty() => String::new(),
        Some(TypeExpr::Tuple(slots)) if slots.len() == 1 => format!(" {}", format_type(&slots[0], span)?),
        Some(TypeExpr::Tuple(slots)) => {
            let slots = slots
                .iter()
                .map(|slot| format_type(slot, span))
                .collect::<LowerResult<Vec<_>>>()?;
            format!(" ({})", slots.join(", "))
        }
        Some(ty) => format!(" {}", format_type(ty, span)?),
    };
    Ok(format!("({params}){returns}"))
}

fn format_param(param: &Param) -> LowerResult<String> {
    Ok(format!("{} {}", param.name, format_type(&param.ty, param.span)?))
}

fn format_struct(out: &mut String, def: &StructDef) -> LowerResult<()> {
    if def.fields.is_empty() {
        out.push_str(&format!("type {} struct{{}}\n", def.name));
        return Ok(());
    }
    out.push_str(&format!("type {} struct {{\n", def.name));
    let width = def.fields.iter().map(|field| field.name.len()).max().unwrap_or(0);
    for field in &def.fields {
        out.push_str(&format!(
            "\t{:width$} {}\n",
            field.name,
            format_type(&field.ty, field.span)?,
        ));
    }
    out.push_str("}\n");
    Ok(())
}

fn format_enum(out: &mut String, def: &EnumDef) -> LowerResult<()> {
    if let Some(variant) = def.variants.iter().find(|v| !v.fields.is_empty()) {
        return Err(LowerError::unsupported(
            variant.span,
            format!("enum variant `{}.{}` carries associated values", def.name, variant.name),
        ));
    }
    out.push_str(&format!("type {} int\n", def.name));
    if def.variants.is_empty() {
        return Ok(());
    }
    out.push_str("\nconst (\n");
    for (idx, variant) in def.variants.iter().enumerate() {
        if idx == 0 {
            out.push_str(&format!("\t{}{} {} = iota\n", def.name, variant.name, def.name));
        } else {
            out.push_str(&format!("\t{}{}\n", def.name, variant.name));
        }
    }
    out.push_str(")\n");
    Ok(())
}

fn format_const(out: &mut String, def: &ConstDef) -> LowerResult<()> {
    let value = format_expr(&def.value, 0)?;
    match &def.ty {
        Some(ty) => out.push_str(&format!(
            "const {} {} = {value}\n",
            def.name,
            format_type(ty, def.span)?
        )),
        None => out.push_str(&format!("const {} = {value}\n", def.name)),
    }
    Ok(())
}

fn format_block(out: &mut String, block: &Block, indent: usize) -> LowerResult<()> {
    for statement in &block.statements {
        format_statement(out, statement, indent)?;
    }
    Ok(())
}

fn write_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push('\t');
    }
}

fn format_statement(out: &mut String, statement: &Statement, indent: usize) -> LowerResult<()> {
    match statement {
        Statement::If(stmt) => {
            write_indent(out, indent);
            format_if(out, stmt, indent)?;
            out.push('\n');
        }
        Statement::For(stmt) => {
            write_indent(out, indent);
            out.push_str(&format_for_header(stmt, indent)?);
            out.push_str(" {\n");
            format_block(out, &stmt.body, indent + 1)?;
            write_indent(out, indent);
            out.push_str("}\n");
        }
        Statement::Block(block) => {
            write_indent(out, indent);
            out.push_str("{\n");
            format_block(out, block, indent + 1)?;
            write_indent(out, indent);
            out.push_str("}\n");
        }
        Statement::Throw(stmt) => {
            return Err(LowerError::unsupported(
                stmt.span,
                "`throw` reached the emitter without being lowered",
            ))
        }
        Statement::GoBinding(stmt) => {
            return Err(LowerError::unsupported(
                stmt.span,
                "go-binding reached the emitter without being lowered",
            ))
        }
        other => {
            write_indent(out, indent);
            out.push_str(&format_simple_statement(other, indent)?);
            out.push('\n');
        }
    }
    Ok(())
}

/// Statements that fit on one line, including `for` init and post clauses.
fn format_simple_statement(statement: &Statement, indent: usize) -> LowerResult<String> {
    Ok(match statement {
        Statement::Var(stmt) => {
            let names = stmt
                .names
                .iter()
                .map(|name| name.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let mut line = format!("var {names}");
            if let Some(ty) = &stmt.ty {
                line.push(' ');
                line.push_str(&format_type(ty, stmt.span)?);
            }
            if !stmt.values.is_empty() {
                line.push_str(" = ");
                line.push_str(&format_expr_list(&stmt.values, indent)?);
            }
            line
        }
        Statement::Assign(stmt) => {
            let op = match stmt.op {
                AssignOp::Define => ":=".to_string(),
                AssignOp::Assign => "=".to_string(),
                AssignOp::Compound(op) => format!("{}=", op.symbol()),
            };
            format!(
                "{} {op} {}",
                format_expr_list(&stmt.targets, indent)?,
                format_expr_list(&stmt.values, indent)?
            )
        }
        Statement::Expr(stmt) => format_expr(&stmt.expr, indent)?,
        Statement::Return(stmt) if stmt.values.is_empty() => "return".to_string(),
        Statement::Return(stmt) => format!("return {}", format_expr_list(&stmt.values, indent)?),
        Statement::Go(stmt) => format!("go {}", format_expr(&stmt.call, indent)?),
        Statement::Defer(stmt) => format!("defer {}", format_expr(&stmt.call, indent)?),
        Statement::Break(_) => "break".to_string(),
        Statement::Continue(_) => "continue".to_string(),
        other => {
            return Err(LowerError::unsupported(
                other.span(),
                "statement cannot appear in this position",
            ))
        }
    })
}

fn format_if(out: &mut String, stmt: &IfStmt, indent: usize) -> LowerResult<()> {
    out.push_str(&format!("if {} {{\n", format_expr(&stmt.condition, indent)?));
    format_block(out, &stmt.then_branch, indent + 1)?;
    write_indent(out, indent);
    out.push('}');
    match &stmt.else_branch {
        Some(ElseBranch::Block(block)) => {
            out.push_str(" else {\n");
            format_block(out, block, indent + 1)?;
            write_indent(out, indent);
            out.push('}');
        }
        Some(ElseBranch::ElseIf(nested)) => {
            out.push_str(" else ");
            format_if(out, nested, indent)?;
        }
        None => {}
    }
    Ok(())
}

fn format_for_header(stmt: &ForStmt, indent: usize) -> LowerResult<String> {
    Ok(match &stmt.clause {
        ForClause::Infinite => "for".to_string(),
        ForClause::Condition(cond) => format!("for {}", format_expr(cond, indent)?),
        ForClause::ThreeClause {
            init,
            condition,
            post,
        } => {
            let init = match init {
                Some(init) => format_simple_statement(init, indent)?,
                None => String::new(),
            };
            let condition = match condition {
                Some(cond) => format!(" {}", format_expr(cond, indent)?),
                None => String::new(),
            };
            let post = match post {
                Some(post) => format!(" {}", format_simple_statement(post, indent)?),
                None => String::new(),
            };
            format!("for {init};{condition};{post}")
        }
        ForClause::Range {
            key,
            value,
            define,
            iterable,
        } => {
            let iterable = format_expr(iterable, indent)?;
            let op = if *define { ":=" } else { "=" };
            match (key, value) {
                (None, None) => format!("for range {iterable}"),
                (Some(key), None) => format!("for {} {op} range {iterable}", key.name),
                (key, Some(value)) => format!(
                    "for {}, {} {op} range {iterable}",
                    key.as_ref().map_or("_", |key| key.name.as_str()),
                    value.name
                ),
            }
        }
    })
}

fn format_expr_list(exprs: &[Expr], indent: usize) -> LowerResult<String> {
    Ok(exprs
        .iter()
        .map(|expr| format_expr(expr, indent))
        .collect::<LowerResult<Vec<_>>>()?
        .join(", "))
}

fn format_expr(expr: &Expr, indent: usize) -> LowerResult<String> {
    format_expr_prec(expr, 0, indent)
}

fn format_expr_prec(expr: &Expr, parent_prec: u8, indent: usize) -> LowerResult<String> {
    Ok(match expr {
        Expr::Literal(lit) => format_literal(lit)?,
        Expr::Identifier(ident) => ident.name.clone(),
        Expr::Binary {
            op, left, right, ..
        } => {
            let prec = op.precedence();
            let left_str = format_expr_prec(left, prec, indent)?;
            let right_str = format_expr_prec(right, prec + 1, indent)?;
            let inner = format!("{left_str} {} {right_str}", op.symbol());
            if prec < parent_prec {
                format!("({inner})")
            } else {
                inner
            }
        }
        Expr::Unary { op, expr, .. } => {
            let symbol = op.symbol();
            let mut inner = format_expr_prec(expr, UNARY_PREC, indent)?;
            // `- -x` must not lex as `--x`, nor `& &x` as `&&x`.
            if symbol.chars().last().is_some_and(|last| inner.starts_with(last)) {
                inner = format!("({inner})");
            }
            let text = format!("{symbol}{inner}");
            if parent_prec >= PRIMARY_PREC {
                format!("({text})")
            } else {
                text
            }
        }
        Expr::Call { callee, args, .. } => format!(
            "{}({})",
            format_expr_prec(callee, PRIMARY_PREC, indent)?,
            format_expr_list(args, indent)?
        ),
        Expr::Selector { base, field, .. } => {
            format!("{}.{field}", format_expr_prec(base, PRIMARY_PREC, indent)?)
        }
        Expr::Index { base, index, .. } => format!(
            "{}[{}]",
            format_expr_prec(base, PRIMARY_PREC, indent)?,
            format_expr(index, indent)?
        ),
        Expr::Composite { ty, elements, span } => {
            let elements = elements
                .iter()
                .map(|element| {
                    let value = format_expr(&element.value, indent)?;
                    Ok(match &element.key {
                        Some(key) => format!("{}: {value}", format_expr(key, indent)?),
                        None => value,
                    })
                })
                .collect::<LowerResult<Vec<_>>>()?;
            format!("{}{{{}}}", format_type(ty, *span)?, elements.join(", "))
        }
        Expr::FuncLit(lit) => {
            let mut body = String::new();
            format_block(&mut body, &lit.body, indent + 1)?;
            let mut text = format!(
                "func{} {{\n{body}",
                format_signature(&lit.params, lit.returns.as_ref(), lit.span)?
            );
            for _ in 0..indent {
                text.push('\t');
            }
            text.push('}');
            text
        }
        Expr::Type(ty, span) => {
            let text = format_type(ty, *span)?;
            if parent_prec >= PRIMARY_PREC && (text.starts_with('*') || text.starts_with("<-")) {
                format!("({text})")
            } else {
                text
            }
        }
        Expr::Interpolated(lit) => {
            return Err(LowerError::unsupported(
                lit.span,
                "interpolated string reached the emitter without being expanded",
            ))
        }
        Expr::Try { span, .. } => {
            return Err(LowerError::unsupported(
                *span,
                "`try` reached the emitter without being lowered",
            ))
        }
    })
}

pub fn format_type(ty: &TypeExpr, span: Span) -> LowerResult<String> {
    Ok(match ty {
        TypeExpr::Named(name) => name.clone(),
        TypeExpr::Array(element) => format!("[]{}", format_type(element, span)?),
        TypeExpr::Map { key, value } => {
            format!("map[{}]{}", format_type(key, span)?, format_type(value, span)?)
        }
        TypeExpr::Pointer {
            inner,
            nillable: true,
        } => format!("*{}", format_type(inner, span)?),
        TypeExpr::Channel { inner, direction } => {
            let inner = format_type(inner, span)?;
            match direction {
                ChannelDirection::Bidirectional => format!("chan {inner}"),
                ChannelDirection::SendOnly => format!("chan<- {inner}"),
                ChannelDirection::ReceiveOnly => format!("<-chan {inner}"),
            }
        }
        other => {
            return Err(LowerError::unsupported(
                span,
                format!("type `{}` reached the emitter without being lowered", other.canonical_name()),
            ))
        }
    })
}

fn format_literal(lit: &Literal) -> LowerResult<String> {
    Ok(match lit {
        Literal::Int(value, _) => value.to_string(),
        Literal::Float(value, span) => {
            if !value.is_finite() {
                return Err(LowerError::unsupported(*span, "non-finite float literal"));
            }
            format!("{value:?}")
        }
        Literal::String(value, _) => quote_string(value),
        Literal::Rune(value, _) => quote_rune(*value),
        Literal::Bool(value, _) => value.to_string(),
        Literal::Nil(_) => "nil".to_string(),
    })
}

fn escape_char(out: &mut String, c: char, quote: char) {
    match c {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        '\0' => out.push_str("\\x00"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if (c as u32) < 0x20 || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
        c => out.push(c),
    }
}

pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        escape_char(&mut out, c, '"');
    }
    out.push('"');
    out
}

fn quote_rune(value: char) -> String {
    let mut out = String::from("'");
    escape_char(&mut out, value, '\'');
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(expr: Expr) -> String {
        format_expr(&expr, 0).expect("formatted")
    }

    #[test]
    fn parenthesizes_only_where_precedence_requires() {
        let sum = Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::ident("b"));
        assert_eq!(
            render(Expr::binary(BinaryOp::Mul, sum.clone(), Expr::ident("c"))),
            "(a + b) * c"
        );
        assert_eq!(
            render(Expr::binary(
                BinaryOp::Add,
                Expr::ident("a"),
                Expr::binary(BinaryOp::Mul, Expr::ident("b"), Expr::ident("c"))
            )),
            "a + b * c"
        );
        assert_eq!(
            render(Expr::binary(BinaryOp::Sub, Expr::ident("a"), sum)),
            "a - (a + b)"
        );
        assert_eq!(
            render(Expr::unary(UnaryOp::Neg, Expr::unary(UnaryOp::Neg, Expr::ident("x")))),
            "-(-x)"
        );
        assert_eq!(
            render(Expr::selector(
                Expr::unary(UnaryOp::Deref, Expr::ident("p")),
                "name"
            )),
            "(*p).name"
        );
    }

    #[test]
    fn quotes_like_go() {
        assert_eq!(quote_string("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(quote_rune('\''), "'\\''");
        assert_eq!(quote_string("tab\there"), "\"tab\\there\"");
    }

    #[test]
    fn generic_instantiation_renders_type_index() {
        let call = Expr::call(
            Expr::index(
                Expr::ident("gxNewSync"),
                Expr::Type(TypeExpr::array(TypeExpr::named("Item")), Span::default()),
            ),
            Vec::new(),
        );
        assert_eq!(render(call), "gxNewSync[[]Item]()");
    }

    #[test]
    fn unlowered_constructs_are_rejected() {
        let err = format_expr(&Expr::try_call(Expr::call(Expr::ident("f"), Vec::new())), 0)
            .unwrap_err();
        assert_eq!(err.kind, crate::language::errors::LowerErrorKind::UnsupportedConstruct);
        assert!(format_type(&TypeExpr::option(TypeExpr::named("int")), Span::default()).is_err());
    }

    #[test]
    fn plain_enums_become_iota_blocks() {
        let def = EnumDef {
            name: "Color".into(),
            variants: ["Red", "Green"]
                .iter()
                .map(|name| EnumVariant {
                    name: name.to_string(),
                    fields: Vec::new(),
                    span: Span::default(),
                })
                .collect(),
            span: Span::default(),
        };
        let mut out = String::new();
        format_enum(&mut out, &def).expect("enum");
        assert_eq!(
            out,
            "type Color int\n\nconst (\n\tColorRed Color = iota\n\tColorGreen\n)\n"
        );
    }
}
