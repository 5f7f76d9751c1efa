use crate::language::span::Span;
use miette::SourceSpan;
use std::fmt;
use thiserror::Error;

pub type LowerResult<T> = Result<T, LowerError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LowerErrorKind {
    /// A Result type used where a value type is required.
    InvalidTypeUsage,
    /// A Result-returning call whose outcome is neither captured nor propagated.
    DiscardedResult,
    /// `throw` or `try` inside a function that does not return a Result.
    ThrowWithoutResultType,
    /// A parsed node the lowering engine has no rule for.
    UnsupportedConstruct,
    /// Unbalanced embeds or an unknown verb in an interpolated string.
    MalformedInterpolation,
    /// A non-nillable pointer fed from a nil-producing expression.
    NilToNonNillable,
    /// Value counts that do not match a lowered signature.
    ArityMismatch,
}

impl LowerErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            LowerErrorKind::InvalidTypeUsage => "GX0001",
            LowerErrorKind::DiscardedResult => "GX0002",
            LowerErrorKind::ThrowWithoutResultType => "GX0003",
            LowerErrorKind::UnsupportedConstruct => "GX0004",
            LowerErrorKind::MalformedInterpolation => "GX0005",
            LowerErrorKind::NilToNonNillable => "GX0006",
            LowerErrorKind::ArityMismatch => "GX0007",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LowerErrorKind::InvalidTypeUsage => "InvalidTypeUsage",
            LowerErrorKind::DiscardedResult => "DiscardedResult",
            LowerErrorKind::ThrowWithoutResultType => "ThrowWithoutResultType",
            LowerErrorKind::UnsupportedConstruct => "UnsupportedConstruct",
            LowerErrorKind::MalformedInterpolation => "MalformedInterpolation",
            LowerErrorKind::NilToNonNillable => "NilToNonNillable",
            LowerErrorKind::ArityMismatch => "ArityMismatch",
        }
    }
}

impl fmt::Display for LowerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("[{}] {message}", kind.code())]
pub struct LowerError {
    pub kind: LowerErrorKind,
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
}

impl LowerError {
    pub fn new(kind: LowerErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn invalid_type_usage(span: Span, message: impl Into<String>) -> Self {
        Self::new(LowerErrorKind::InvalidTypeUsage, span, message)
    }

    pub fn discarded_result(span: Span, callee: &str) -> Self {
        Self::new(
            LowerErrorKind::DiscardedResult,
            span,
            format!("result of `{callee}` is discarded"),
        )
        .with_help("wrap the call in `try` or capture every returned value")
    }

    pub fn unsupported(span: Span, message: impl Into<String>) -> Self {
        Self::new(LowerErrorKind::UnsupportedConstruct, span, message)
    }

    pub fn malformed_interpolation(span: Span, message: impl Into<String>) -> Self {
        Self::new(LowerErrorKind::MalformedInterpolation, span, message)
    }

    pub fn arity(span: Span, message: impl Into<String>) -> Self {
        Self::new(LowerErrorKind::ArityMismatch, span, message)
    }

    pub fn to_source_span(&self) -> SourceSpan {
        self.span.to_source_span()
    }
}
