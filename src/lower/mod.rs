//! The lowering pipeline: extended gx syntax in, base host-language AST out.
//!
//! Passes run in a fixed order over one program unit. Each pass collects every
//! diagnostic it finds; the pipeline stops after the first pass that reports
//! any, so no partially lowered program ever reaches the emitter.

pub mod concurrency;
pub mod interpolate;
pub mod propagate;
pub mod signatures;
pub mod types;
pub mod walk;

#[cfg(test)]
mod tests;

use crate::{
    config::{import_path_of, LowerOptions},
    language::{
        ast::{Import, Program},
        errors::LowerError,
    },
};
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};

pub fn lower_program(program: Program, options: &LowerOptions) -> Result<Program, Vec<LowerError>> {
    let mut program = program;
    debug!("lowering unit `{}`", program.name);

    let table = types::lower_types(&mut program, options)?;
    debug!(
        "unit `{}`: type lowering done, {} signatures",
        program.name,
        table.len()
    );

    let mut imports = ImportSet::default();
    propagate::rewrite_program(&mut program, &table, options, &mut imports)?;
    debug!("unit `{}`: error propagation done", program.name);

    concurrency::lower_program(&mut program, &table, options, &mut imports)?;
    debug!("unit `{}`: go-bindings lowered", program.name);

    interpolate::expand_program(&mut program, options, &mut imports)?;
    debug!("unit `{}`: interpolation expanded", program.name);

    imports.apply(&mut program);
    Ok(program)
}

/// Imports required by compiler-inserted code.
#[derive(Debug, Default)]
pub struct ImportSet {
    paths: BTreeSet<String>,
}

impl ImportSet {
    pub fn require(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    /// Requires the package that provides a qualified function like `fmt.Sprintf`.
    pub fn require_for(&mut self, function: &str) {
        if let Some(path) = import_path_of(function) {
            self.require(path);
        }
    }

    fn apply(self, program: &mut Program) {
        let mut added = false;
        for path in self.paths {
            if !program.imports.iter().any(|import| import.path == path) {
                program.imports.push(Import::new(path));
                added = true;
            }
        }
        if added {
            program.imports.sort_by(|a, b| a.path.cmp(&b.path));
        }
    }
}

/// Hands out compiler-inserted names that never collide with a name already
/// used in the function being lowered.
#[derive(Debug)]
pub struct NameGen {
    prefix: String,
    used: HashSet<String>,
    counters: HashMap<String, usize>,
}

impl NameGen {
    pub fn new(prefix: impl Into<String>, used: impl IntoIterator<Item = String>) -> Self {
        Self {
            prefix: prefix.into(),
            used: used.into_iter().collect(),
            counters: HashMap::new(),
        }
    }

    pub fn fresh(&mut self, role: &str) -> String {
        loop {
            let counter = self.counters.entry(role.to_string()).or_insert(0);
            let candidate = format!("{}{}{}", self.prefix, role, counter);
            *counter += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Folds a pass's collected diagnostics into the pipeline result.
pub(crate) fn finish(errors: Vec<LowerError>) -> Result<(), Vec<LowerError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
