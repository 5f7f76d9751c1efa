//! Interpolated string literals.
//!
//! `"You have \(count:d) apples"` lowers to
//! `fmt.Sprintf("You have %d apples", count)`. Verbs are checked against the
//! formatting grammar only; whether a verb suits the argument's type is left
//! to the host compiler.

use crate::{
    config::LowerOptions,
    language::{
        ast::*,
        errors::{LowerError, LowerResult},
        span::Span,
    },
    lower::{finish, walk, ImportSet},
};
use nom::{
    character::complete::{char, digit0, one_of},
    combinator::{all_consuming, opt, recognize},
    multi::many0_count,
    sequence::{pair, tuple},
    IResult, Parser as NomParser,
};
use std::{iter::Peekable, mem};

const VERB_LETTERS: &str = "vTtbcdoOqxXUeEfFgGspw";

fn format_verb(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        many0_count(one_of("+-# 0")),
        digit0,
        opt(pair(char('.'), digit0)),
        one_of(VERB_LETTERS),
    )))
    .parse(input)
}

/// Flags, width, precision and a verb letter, e.g. `d`, `08.3f`, `+q`.
pub fn is_valid_verb(verb: &str) -> bool {
    all_consuming(format_verb).parse(verb).is_ok()
}

/// Lowers one interpolated literal into a call to `function`.
///
/// Embedded interpolations are expected to be expanded already; the pipeline
/// walks bottom-up so the innermost literal is lowered first.
pub fn expand(lit: InterpolatedString, function: &str) -> LowerResult<Expr> {
    let mut template = String::new();
    let mut args = vec![];
    for segment in lit.segments {
        match segment {
            InterpolationSegment::Text(text) => template.push_str(&text.replace('%', "%%")),
            InterpolationSegment::Expr { expr, verb, span } => {
                let verb = verb.unwrap_or_else(|| "v".to_string());
                if !is_valid_verb(&verb) {
                    return Err(LowerError::malformed_interpolation(
                        span,
                        format!("`{verb}` is not a format verb"),
                    )
                    .with_help("use a verb such as `v`, `d`, `s`, `q` or `.2f`"));
                }
                template.push('%');
                template.push_str(&verb);
                args.push(expr);
            }
        }
    }
    let mut call_args = vec![Expr::Literal(Literal::String(template, lit.span))];
    call_args.extend(args);
    Ok(match Expr::call_path(function, call_args) {
        Expr::Call { callee, args, .. } => Expr::Call {
            callee,
            args,
            span: lit.span,
        },
        other => other,
    })
}

pub fn expand_program(
    program: &mut Program,
    options: &LowerOptions,
    imports: &mut ImportSet,
) -> Result<(), Vec<LowerError>> {
    let mut errors = Vec::new();
    let mut expanded = 0usize;
    let mut rewrite = |expr: Expr| match expr {
        Expr::Interpolated(lit) => match expand(lit, &options.format_function) {
            Ok(call) => {
                expanded += 1;
                call
            }
            Err(err) => {
                errors.push(err);
                Expr::nil()
            }
        },
        other => other,
    };
    for item in &mut program.items {
        match item {
            Item::Function(def) => def.body = walk::map_block(mem::take(&mut def.body), &mut rewrite),
            Item::Const(def) => {
                def.value = walk::map_expr(mem::replace(&mut def.value, Expr::nil()), &mut rewrite)
            }
            _ => {}
        }
    }
    if expanded > 0 {
        imports.require_for(&options.format_function);
    }
    finish(errors)
}

/// Splits the raw body of an interpolated literal into segments.
///
/// `raw` is the text between the quotes. Escapes are decoded in text
/// segments; each `\( ... )` embed is handed to `parse_expr` together with
/// its span, after an optional top-level `:verb` suffix is split off.
pub fn split_interpolation<F>(raw: &str, span: Span, mut parse_expr: F) -> LowerResult<InterpolatedString>
where
    F: FnMut(&str, Span) -> LowerResult<Expr>,
{
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = raw.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if c != '\\' {
            text.push(c);
            continue;
        }
        let Some((_, escaped)) = chars.next() else {
            return Err(LowerError::malformed_interpolation(
                Span::new(span.start + index, span.start + index + 1),
                "dangling `\\` at the end of the literal",
            ));
        };
        match escaped {
            '(' => {
                let open = index + 2;
                let close = matching_paren(raw, open).ok_or_else(|| {
                    LowerError::malformed_interpolation(
                        Span::new(span.start + index, span.start + raw.len()),
                        "unterminated `\\(` in interpolated string",
                    )
                })?;
                let embed_span = Span::new(span.start + index, span.start + close + 1);
                let (source, verb) = split_verb(&raw[open..close]);
                if source.trim().is_empty() {
                    return Err(LowerError::malformed_interpolation(
                        embed_span,
                        "empty interpolation",
                    ));
                }
                if let Some(verb) = verb {
                    if !is_valid_verb(verb) {
                        return Err(LowerError::malformed_interpolation(
                            embed_span,
                            format!("`{verb}` is not a format verb"),
                        ));
                    }
                }
                if !text.is_empty() {
                    segments.push(InterpolationSegment::Text(mem::take(&mut text)));
                }
                let expr = parse_expr(
                    source.trim(),
                    Span::new(span.start + open, span.start + open + source.len()),
                )?;
                segments.push(InterpolationSegment::Expr {
                    expr,
                    verb: verb.map(str::to_string),
                    span: embed_span,
                });
                while chars.peek().is_some_and(|(next, _)| *next <= close) {
                    chars.next();
                }
            }
            other => {
                let decoded = decode_escape(other, &mut chars).ok_or_else(|| {
                    let end = chars.peek().map_or(raw.len(), |(next, _)| *next);
                    LowerError::malformed_interpolation(
                        Span::new(span.start + index, span.start + end),
                        format!("invalid escape `\\{other}`"),
                    )
                })?;
                text.push(decoded);
            }
        }
    }
    if !text.is_empty() {
        segments.push(InterpolationSegment::Text(text));
    }
    Ok(InterpolatedString { segments, span })
}

/// Decodes a Go string escape whose letter follows the `\\`, consuming
/// any digits it needs.
fn decode_escape<I>(escaped: char, chars: &mut Peekable<I>) -> Option<char>
where
    I: Iterator<Item = (usize, char)>,
{
    let (radix, width, mut value) = match escaped {
        'a' => return Some('\u{7}'),
        'b' => return Some('\u{8}'),
        'f' => return Some('\u{c}'),
        'n' => return Some('\n'),
        'r' => return Some('\r'),
        't' => return Some('\t'),
        'v' => return Some('\u{b}'),
        '\\' | '"' => return Some(escaped),
        'x' => (16, 2, 0),
        'u' => (16, 4, 0),
        'U' => (16, 8, 0),
        '0'..='7' => (8, 2, escaped.to_digit(8)?),
        _ => return None,
    };
    for _ in 0..width {
        let (_, digit) = chars.next_if(|(_, c)| c.is_digit(radix))?;
        value = value * radix + digit.to_digit(radix)?;
    }
    // Byte escapes past ASCII cannot be carried as UTF-8 text.
    if matches!(escaped, 'x' | '0'..='7') && value > 0x7f {
        return None;
    }
    char::from_u32(value)
}

/// Byte offset of the `)` closing an embed whose body starts at `start`.
fn matching_paren(raw: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, c) in raw[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => return Some(start + offset),
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// Splits `expr:verb` at the last colon outside brackets and literals.
fn split_verb(body: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut colon = None;
    for (offset, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => colon = Some(offset),
            _ => {}
        }
    }
    match colon {
        Some(offset) => (&body[..offset], Some(body[offset + 1..].trim())),
        None => (body, None),
    }
}
