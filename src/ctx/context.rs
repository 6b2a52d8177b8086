use crate::broker::{AttributeBroker, FunctionBroker};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The four elements of an authorization subscription (§3.1). Any element
/// the host does not supply defaults to [`Value::undefined`].
#[derive(Clone, Debug)]
pub struct Subscription {
	pub subject: Value,
	pub action: Value,
	pub resource: Value,
	pub environment: Value,
}

impl Default for Subscription {
	fn default() -> Self {
		Subscription {
			subject: Value::undefined(),
			action: Value::undefined(),
			resource: Value::undefined(),
			environment: Value::undefined(),
		}
	}
}

struct Inner {
	pdp_id: String,
	configuration_id: String,
	subscription_id: String,
	subscription: Subscription,
	variables: HashMap<String, Value>,
	function_broker: Arc<dyn FunctionBroker>,
	attribute_broker: Arc<dyn AttributeBroker>,
}

/// The per-subscription evaluation context (§3): an immutable record of
/// identifiers, the subscription itself, a copy-on-write variable bag, and
/// the two brokers.
///
/// Mirrors the host's `Context = Arc<MutableContext>` shape: cheap to clone,
/// `with` produces a new context that shares everything except the one
/// inserted variable, and nothing about an `EvaluationContext` is ever
/// mutated in place once constructed.
#[derive(Clone)]
pub struct EvaluationContext(Arc<Inner>);

impl EvaluationContext {
	pub fn new(
		pdp_id: impl Into<String>,
		configuration_id: impl Into<String>,
		subscription_id: impl Into<String>,
		subscription: Subscription,
		function_broker: Arc<dyn FunctionBroker>,
		attribute_broker: Arc<dyn AttributeBroker>,
	) -> Self {
		EvaluationContext(Arc::new(Inner {
			pdp_id: pdp_id.into(),
			configuration_id: configuration_id.into(),
			subscription_id: subscription_id.into(),
			subscription,
			variables: HashMap::new(),
			function_broker,
			attribute_broker,
		}))
	}

	/// Returns a new context with `name` bound to `value`, leaving `self`
	/// untouched. A pre-existing binding of the same name is shadowed.
	pub fn with(&self, name: impl Into<String>, value: Value) -> EvaluationContext {
		let mut variables = self.0.variables.clone();
		variables.insert(name.into(), value);
		EvaluationContext(Arc::new(Inner {
			pdp_id: self.0.pdp_id.clone(),
			configuration_id: self.0.configuration_id.clone(),
			subscription_id: self.0.subscription_id.clone(),
			subscription: self.0.subscription.clone(),
			variables,
			function_broker: self.0.function_broker.clone(),
			attribute_broker: self.0.attribute_broker.clone(),
		}))
	}

	pub fn pdp_id(&self) -> &str {
		&self.0.pdp_id
	}

	pub fn configuration_id(&self) -> &str {
		&self.0.configuration_id
	}

	pub fn subscription_id(&self) -> &str {
		&self.0.subscription_id
	}

	pub fn subscription(&self) -> &Subscription {
		&self.0.subscription
	}

	pub fn variable(&self, name: &str) -> Option<&Value> {
		self.0.variables.get(name)
	}

	pub fn function_broker(&self) -> &Arc<dyn FunctionBroker> {
		&self.0.function_broker
	}

	pub fn attribute_broker(&self) -> &Arc<dyn AttributeBroker> {
		&self.0.attribute_broker
	}
}
