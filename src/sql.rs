//! Statement parsing: turns a line of input into a validated request.

pub mod statement;

pub use statement::{prepare, PrepareError, Statement};
