use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// How many arguments a function accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Arity {
	Exact(usize),
	AtLeast(usize),
	Any,
}

impl Arity {
	pub fn accepts(&self, n: usize) -> bool {
		match self {
			Arity::Exact(k) => n == *k,
			Arity::AtLeast(k) => n >= *k,
			Arity::Any => true,
		}
	}
}

/// A resolved function, per §6: `{ name, parameter_arity, invoke, pure }`.
///
/// Functions are pure by contract (§6): the core never calls `invoke` except
/// with already-computed arguments, and never re-invokes a constant-folded
/// call. `invoke` is a plain synchronous closure -- the host is responsible
/// for ensuring it does not block or depend on external state, exactly as
/// the host's `fnc::FunctionDescriptor` equivalent relies on its registered
/// functions being total and side-effect free.
#[derive(Clone)]
pub struct FunctionDescriptor {
	pub name: String,
	pub parameter_arity: Arity,
	pub pure: bool,
	invoke: Arc<dyn Fn(&[Value]) -> Value + Send + Sync>,
}

impl fmt::Debug for FunctionDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("FunctionDescriptor")
			.field("name", &self.name)
			.field("parameter_arity", &self.parameter_arity)
			.field("pure", &self.pure)
			.finish()
	}
}

impl FunctionDescriptor {
	pub fn new(
		name: impl Into<String>,
		parameter_arity: Arity,
		pure: bool,
		invoke: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
	) -> Self {
		FunctionDescriptor {
			name: name.into(),
			parameter_arity,
			pure,
			invoke: Arc::new(invoke),
		}
	}

	pub fn invoke(&self, args: &[Value]) -> Value {
		(self.invoke)(args)
	}
}

/// Resolves function names to descriptors (§6). The core never looks up
/// functions on its own; a [`FunctionBroker`] is a plain reference handed in
/// through the compilation context, matching §9's "no hidden global lookups
/// inside the core".
pub trait FunctionBroker: Send + Sync {
	fn resolve(&self, name: &str) -> Option<FunctionDescriptor>;
}

/// A broker with no registered functions, useful as a default in tests.
#[derive(Default)]
pub struct EmptyFunctionBroker;

impl FunctionBroker for EmptyFunctionBroker {
	fn resolve(&self, _name: &str) -> Option<FunctionDescriptor> {
		None
	}
}
