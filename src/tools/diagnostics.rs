use crate::language::errors::LowerError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("[{code}] {message}")]
pub struct LowerDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    code: String,
    message: String,
    label: String,
}

impl LowerDiagnostic {
    pub fn from_error(src: NamedSource<String>, source_len: usize, err: &LowerError) -> Self {
        Self {
            src,
            span: clamp(err.to_source_span(), source_len),
            help: err.help.clone(),
            code: err.kind.code().to_string(),
            message: err.message.clone(),
            label: err.kind.name().to_string(),
        }
    }
}

/// Keeps a label inside the source so miette never renders past its end.
fn clamp(span: SourceSpan, len: usize) -> SourceSpan {
    let start = span.offset().min(len);
    let end = (span.offset() + span.len()).min(len);
    SourceSpan::from((start, end - start))
}

/// Renders every lowering error of a unit as a miette report.
pub fn render_lower_errors(name: &str, source: &str, errors: &[LowerError]) -> String {
    let named = NamedSource::new(name, source.to_string());
    let mut out = String::new();
    for err in errors {
        let diagnostic = LowerDiagnostic::from_error(named.clone(), source.len(), err);
        out.push_str(&format!("{:?}", Report::new(diagnostic)));
        out.push('\n');
    }
    out
}

/// One line per error, `name:start: [code] message`, for logs and tests.
pub fn summarize_lower_errors(name: &str, errors: &[LowerError]) -> Vec<String> {
    errors
        .iter()
        .map(|err| format!("{name}:{}: {err}", err.span.start))
        .collect()
}
