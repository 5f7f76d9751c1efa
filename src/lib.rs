#![allow(clippy::collapsible_if)]

pub mod config;
pub mod language;
pub mod lower;
pub mod runtime;
pub mod tools;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, LowerOptions, OptionPolicy};
pub use language::{
    ast::Program,
    errors::{LowerError, LowerErrorKind, LowerResult},
};
pub use lower::lower_program;
pub use tools::emitter::emit_program;

/// Lowers one program unit and renders it as host-language source.
pub fn transpile(program: Program, options: &LowerOptions) -> Result<String, Vec<LowerError>> {
    let lowered = lower_program(program, options)?;
    emit_program(&lowered).map_err(|err| vec![err])
}
