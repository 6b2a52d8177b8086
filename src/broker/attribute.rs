use crate::value::{AttributeOptions, Value};
use futures::stream::BoxStream;

/// The fully-resolved parameters of one attribute subscription, after option
/// merging (§4.3) has already happened in the compiler.
#[derive(Clone, Debug)]
pub struct AttributeInvocation {
	pub name: String,
	pub entity: Option<Value>,
	pub arguments: Vec<Value>,
	pub options: AttributeOptions,
}

/// Subscribes to attribute updates and invokes PIPs (§6).
///
/// The broker owns caching, request coalescing across subscribers, and the
/// underlying PIP call; the core only ever sees the resulting stream of
/// [`Value`]s. `fresh` is passed through as a bypass hint (§4.3 step 3) --
/// whether the broker honors it is entirely up to the broker.
pub trait AttributeBroker: Send + Sync {
	fn subscribe(&self, invocation: AttributeInvocation) -> BoxStream<'static, Value>;
}

/// A broker that immediately errors every attribute lookup, useful as a
/// default in tests that don't exercise attribute finders.
#[derive(Default)]
pub struct EmptyAttributeBroker;

impl AttributeBroker for EmptyAttributeBroker {
	fn subscribe(&self, invocation: AttributeInvocation) -> BoxStream<'static, Value> {
		let message = format!("no broker registered for attribute `{}`", invocation.name);
		Box::pin(futures::stream::once(async move { Value::error(message) }))
	}
}
