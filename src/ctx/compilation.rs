use crate::broker::{AttributeBroker, FunctionBroker};
use crate::value::AttributeOptions;
use std::sync::Arc;

/// How much detail a traced decision should carry (§4.6).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceLevel {
	/// No trace is produced at all.
	None,
	/// Decision, obligations, advice, and the applicable policy names only.
	Basic,
	/// Everything in [`TraceLevel::Basic`] plus per-document evaluation
	/// traces, down to individual condition results.
	Full,
}

/// Everything the compiler needs that is not specific to a single
/// subscription: the two brokers, the trace level to compile in support for,
/// and the PDP-wide attribute option defaults (§4.3 step 3).
#[derive(Clone)]
pub struct CompilationContext {
	function_broker: Arc<dyn FunctionBroker>,
	attribute_broker: Arc<dyn AttributeBroker>,
	trace_level: TraceLevel,
	default_attribute_options: AttributeOptions,
}

impl CompilationContext {
	pub fn new(
		function_broker: Arc<dyn FunctionBroker>,
		attribute_broker: Arc<dyn AttributeBroker>,
	) -> Self {
		CompilationContext {
			function_broker,
			attribute_broker,
			trace_level: TraceLevel::Basic,
			default_attribute_options: AttributeOptions::default(),
		}
	}

	pub fn with_trace_level(mut self, trace_level: TraceLevel) -> Self {
		self.trace_level = trace_level;
		self
	}

	pub fn with_default_attribute_options(mut self, options: AttributeOptions) -> Self {
		self.default_attribute_options = options;
		self
	}

	pub fn function_broker(&self) -> &Arc<dyn FunctionBroker> {
		&self.function_broker
	}

	pub fn attribute_broker(&self) -> &Arc<dyn AttributeBroker> {
		&self.attribute_broker
	}

	pub fn trace_level(&self) -> TraceLevel {
		self.trace_level
	}

	pub fn default_attribute_options(&self) -> &AttributeOptions {
		&self.default_attribute_options
	}
}
