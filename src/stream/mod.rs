//! Reactive combinators for the streaming evaluator (§5).
//!
//! Built on `tokio` + `futures` + `async-channel`, matching the host's
//! reactive core: a [`CompiledExpression::Stream`](crate::compiler::CompiledExpression)
//! is a plain function from an evaluation context to a `BoxStream`, and
//! these combinators are how the compiler wires multiple such streams
//! together without ever reordering events within one subscription.

mod cancel;
mod combine;
mod switch;

pub use cancel::{cancellable, head, CancellationHandle};
pub use combine::combine_latest;
pub use switch::switch_latest;
