use super::expr::CompiledExpression;
use super::steps;
use crate::broker::{EmptyAttributeBroker, EmptyFunctionBroker};
use crate::ctx::{EvaluationContext, Subscription};
use crate::value::{Array, Value};
use futures::stream::StreamExt;
use std::sync::Arc;

/// A throwaway context used only to carry `@`/`#` bindings when a filter
/// predicate that doesn't reference the subscription or any outer variable
/// can be folded away at compile time (§8, scenario 7:
/// `[1,2,3,4,5][?(@>2)][?(@<5)]` compiles to `Constant([3,4])`).
fn empty_eval_context() -> EvaluationContext {
	EvaluationContext::new(
		"",
		"",
		"",
		Subscription::default(),
		Arc::new(EmptyFunctionBroker),
		Arc::new(EmptyAttributeBroker),
	)
}

/// Compiles `base[?(predicate)]` (§4.2's condition step, fixed per §4.2.1:
/// the result is an ordinary steppable value, never special-cased as
/// terminal).
pub fn compile_filter(base: CompiledExpression, predicate: CompiledExpression) -> CompiledExpression {
	if let (CompiledExpression::Constant(base_value), false) = (&base, predicate.is_stream()) {
		if !predicate.depends_on_subscription() {
			let base_value = base_value.clone();
			let ctx = empty_eval_context();
			let result = steps::condition_filter(&base_value, |el, idx| {
				let scoped = ctx.with("@", el.clone()).with("#", idx.clone());
				predicate.eval_pure(&scoped)
			});
			return CompiledExpression::Constant(result);
		}
	}

	if !base.is_stream() && !predicate.is_stream() {
		let depends = base.depends_on_subscription() || predicate.depends_on_subscription();
		return CompiledExpression::Pure(
			Arc::new(move |ctx: &EvaluationContext| {
				let base_value = base.eval_pure(ctx);
				steps::condition_filter(&base_value, |el, idx| {
					let scoped = ctx.with("@", el.clone()).with("#", idx.clone());
					predicate.eval_pure(&scoped)
				})
			}),
			depends,
		);
	}

	CompiledExpression::Stream(Arc::new(move |ctx: &EvaluationContext| {
		let ctx = ctx.clone();
		let predicate = predicate.clone();
		Box::pin(base.to_stream(&ctx).then(move |base_value| {
			let ctx = ctx.clone();
			let predicate = predicate.clone();
			async move { filter_value_async(base_value, &predicate, &ctx).await }
		}))
	}))
}

async fn resolve_predicate(predicate: &CompiledExpression, ctx: &EvaluationContext) -> Value {
	match predicate {
		CompiledExpression::Constant(v) => v.clone(),
		CompiledExpression::Pure(f, _) => f(ctx),
		CompiledExpression::Stream(_) => predicate.to_stream(ctx).next().await.unwrap_or_else(Value::undefined),
	}
}

async fn filter_value_async(base_value: Value, predicate: &CompiledExpression, ctx: &EvaluationContext) -> Value {
	if base_value.is_error() {
		return base_value;
	}
	let meta = base_value.metadata().clone();
	match &base_value {
		Value::Array(a, _) => {
			let mut out = Vec::new();
			for (i, el) in a.iter().enumerate() {
				let scoped = ctx.with("@", el.clone()).with("#", Value::number(i));
				let verdict = resolve_predicate(predicate, &scoped).await;
				if verdict.is_error() {
					return verdict;
				}
				match verdict.as_boolean() {
					Some(true) => out.push(el.clone()),
					Some(false) => {}
					None => return Value::Error("Condition must evaluate to boolean".into(), meta),
				}
			}
			Value::Array(Array(out), meta)
		}
		Value::Object(o, _) => {
			let mut out = crate::value::Object::new();
			for (key, el) in o.iter() {
				let scoped = ctx.with("@", el.clone()).with("#", Value::text(key.clone()));
				let verdict = resolve_predicate(predicate, &scoped).await;
				if verdict.is_error() {
					return verdict;
				}
				match verdict.as_boolean() {
					Some(true) => out.insert(key.clone(), el.clone()),
					Some(false) => {}
					None => return Value::Error("Condition must evaluate to boolean".into(), meta),
				}
			}
			Value::Object(out, meta)
		}
		_ => {
			let scoped = ctx.with("@", base_value.clone()).with("#", Value::undefined());
			let verdict = resolve_predicate(predicate, &scoped).await;
			if verdict.is_error() {
				return verdict;
			}
			match verdict.as_boolean() {
				Some(true) => base_value,
				Some(false) => Value::Undefined(meta),
				None => Value::Error("Condition must evaluate to boolean".into(), meta),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::{BinaryOperator, Node};

	fn gt_two() -> Node {
		Node::BinaryOp {
			op: BinaryOperator::MoreThan,
			left: Box::new(Node::RelativeValue),
			right: Box::new(Node::Literal(Value::number(2))),
		}
	}

	#[tokio::test]
	async fn chained_condition_steps_compose() {
		use crate::ctx::CompilationContext;

		let cctx = CompilationContext::new(Arc::new(EmptyFunctionBroker), Arc::new(EmptyAttributeBroker));
		let array = Node::Literal(Value::array_literal(vec![
			Value::number(1),
			Value::number(2),
			Value::number(3),
			Value::number(4),
			Value::number(5),
		]));
		let predicate = crate::compiler::compile(&gt_two(), &cctx).unwrap();
		let base = crate::compiler::compile(&array, &cctx).unwrap();
		let filtered = compile_filter(base, predicate);
		match filtered {
			CompiledExpression::Constant(v) => {
				let arr = v.as_array().unwrap();
				assert_eq!(arr.0, vec![Value::number(3), Value::number(4), Value::number(5)]);
			}
			other => panic!("expected Constant, got {other:?}"),
		}
	}
}
