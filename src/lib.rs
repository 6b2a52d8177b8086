#[macro_use]
extern crate tracing;

pub mod ast;
pub mod broker;
pub mod combining;
pub mod compiler;
pub mod ctx;
pub mod decision;
pub mod err;
pub mod pdp;
pub mod policy;
pub mod stream;
pub mod trace;
pub mod value;

pub use ast::Node;
pub use decision::{AuthorizationDecision, Decision};
pub use err::{CompileError, EngineError};
pub use trace::{DocumentTrace, RetrievalError, TracedDecision};
pub use value::{AttributeInvocationRecord, Metadata, Number, Value};
