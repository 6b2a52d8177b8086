//! The expression compiler (§4.2): lowers AST nodes into one of the three
//! runtime representations of [`CompiledExpression`], folding constants and
//! classifying subscription/stream dependence bottom-up.

mod attribute;
mod dispatch;
mod expr;
mod filter;
mod logical;
mod operators;
mod steps;
mod target;

pub use dispatch::compile as compile_node;
pub use dispatch::compile_standalone as compile;
pub use expr::{combine_n, CompiledExpression};
pub use target::{compile_target, TargetKind};
