mod compilation;
mod context;

pub use compilation::{CompilationContext, TraceLevel};
pub use context::{EvaluationContext, Subscription};
