mod attribute;
mod function;

pub use attribute::{AttributeBroker, AttributeInvocation, EmptyAttributeBroker};
pub use function::{Arity, EmptyFunctionBroker, FunctionBroker, FunctionDescriptor};
