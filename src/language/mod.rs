pub mod ast;
pub mod errors;
pub mod span;
pub mod types;
