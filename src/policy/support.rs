use crate::broker::{EmptyAttributeBroker, EmptyFunctionBroker};
use crate::compiler::CompiledExpression;
use crate::ctx::{EvaluationContext, Subscription};
use crate::value::Value;
use futures::stream::StreamExt;
use std::sync::Arc;

/// A throwaway context used only to fold a body/obligation/advice expression
/// that provably never touches the subscription or a bound variable, the
/// same device [`crate::compiler::filter`] uses for condition-step folding.
pub fn empty_eval_context() -> EvaluationContext {
	EvaluationContext::new("", "", "", Subscription::default(), Arc::new(EmptyFunctionBroker), Arc::new(EmptyAttributeBroker))
}

/// Resolves any of the three [`CompiledExpression`] representations to a
/// single value: `Constant`/`Pure` resolve immediately, `Stream` samples its
/// first emission. Used wherever a policy needs one-shot access to an
/// obligation, advice, transformation, or set-variable value rather than a
/// live subscription to it.
pub async fn first_value(expr: &CompiledExpression, ctx: &EvaluationContext) -> Value {
	match expr {
		CompiledExpression::Constant(v) => v.clone(),
		CompiledExpression::Pure(_, _) => expr.eval_pure(ctx),
		CompiledExpression::Stream(_) => expr.to_stream(ctx).next().await.unwrap_or_else(Value::undefined),
	}
}
