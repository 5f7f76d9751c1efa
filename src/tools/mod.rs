pub mod diagnostics;
pub mod emitter;
