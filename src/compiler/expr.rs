use crate::ctx::EvaluationContext;
use crate::value::Value;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;

type PureFn = Arc<dyn Fn(&EvaluationContext) -> Value + Send + Sync>;
type StreamFn = Arc<dyn Fn(&EvaluationContext) -> BoxStream<'static, Value> + Send + Sync>;

/// The three runtime representations an expression compiles into (§3):
/// fully known at compile time, a deterministic function of the evaluation
/// context that never suspends, or a reactive stream that may emit more than
/// once and may suspend awaiting a PIP update.
#[derive(Clone)]
pub enum CompiledExpression {
	Constant(Value),
	Pure(PureFn, bool),
	Stream(StreamFn),
}

impl fmt::Debug for CompiledExpression {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			CompiledExpression::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
			CompiledExpression::Pure(_, depends) => {
				f.debug_tuple("Pure").field(&"<fn>").field(depends).finish()
			}
			CompiledExpression::Stream(_) => f.debug_tuple("Stream").field(&"<fn>").finish(),
		}
	}
}

impl CompiledExpression {
	pub fn constant_value(&self) -> Option<&Value> {
		match self {
			CompiledExpression::Constant(v) => Some(v),
			_ => None,
		}
	}

	pub fn is_stream(&self) -> bool {
		matches!(self, CompiledExpression::Stream(_))
	}

	/// Whether evaluating this expression can ever consult the subscription
	/// or a bound variable, as opposed to being a closed constant. Streams
	/// are always treated as subscription-dependent since they are dynamic
	/// by construction.
	pub fn depends_on_subscription(&self) -> bool {
		match self {
			CompiledExpression::Constant(_) => false,
			CompiledExpression::Pure(_, depends) => *depends,
			CompiledExpression::Stream(_) => true,
		}
	}

	/// Evaluates a `Constant` or `Pure` expression against `ctx`. Must not be
	/// called on a `Stream` expression -- callers are expected to have
	/// already classified the expression via [`CompiledExpression::is_stream`].
	pub fn eval_pure(&self, ctx: &EvaluationContext) -> Value {
		match self {
			CompiledExpression::Constant(v) => v.clone(),
			CompiledExpression::Pure(f, _) => f(ctx),
			CompiledExpression::Stream(_) => {
				Value::error("internal error: eval_pure called on a Stream expression")
			}
		}
	}

	/// Coerces any of the three representations into a `BoxStream`: a
	/// `Constant`/`Pure` expression becomes a single-item stream of its one
	/// value, matching the host's "Pure and Constant never suspend" rule
	/// (§5) while still composing uniformly with genuine streams under
	/// combine-latest.
	pub fn to_stream(&self, ctx: &EvaluationContext) -> BoxStream<'static, Value> {
		match self {
			CompiledExpression::Constant(v) => {
				let v = v.clone();
				Box::pin(futures::stream::once(async move { v }))
			}
			CompiledExpression::Pure(f, _) => {
				let v = f(ctx);
				Box::pin(futures::stream::once(async move { v }))
			}
			CompiledExpression::Stream(f) => f(ctx),
		}
	}
}

/// Lifts `N` compiled sub-expressions into the right runtime representation
/// and applies `combine` to their resolved values (§4.2's bottom-up
/// classification rule, generalized across operators, container literals,
/// function calls, and dynamic step arguments):
///
/// - every input `Constant` → evaluate `combine` now, stay `Constant`.
/// - no `Stream` input → `Pure`, `depends_on_subscription` is the OR of inputs.
/// - any `Stream` input → `Stream`, driven by combine-latest (§5).
pub fn combine_n(
	inputs: Vec<CompiledExpression>,
	combine: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
) -> CompiledExpression {
	if inputs.iter().all(|i| matches!(i, CompiledExpression::Constant(_))) {
		let values: Vec<Value> = inputs.iter().map(|i| i.constant_value().unwrap().clone()).collect();
		return CompiledExpression::Constant(combine(&values));
	}
	if !inputs.iter().any(CompiledExpression::is_stream) {
		let depends = inputs.iter().any(CompiledExpression::depends_on_subscription);
		let inputs = Arc::new(inputs);
		let combine = Arc::new(combine);
		return CompiledExpression::Pure(
			Arc::new(move |ctx: &EvaluationContext| {
				let values: Vec<Value> = inputs.iter().map(|i| i.eval_pure(ctx)).collect();
				combine(&values)
			}),
			depends,
		);
	}
	let inputs = Arc::new(inputs);
	let combine = Arc::new(combine);
	CompiledExpression::Stream(Arc::new(move |ctx: &EvaluationContext| {
		let streams = inputs.iter().map(|i| i.to_stream(ctx)).collect();
		let combine = combine.clone();
		use futures::stream::StreamExt;
		Box::pin(crate::stream::combine_latest(streams).map(move |values| combine(&values)))
	}))
}
