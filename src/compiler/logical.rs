use super::expr::CompiledExpression;
use crate::ast::BinaryOperator;
use crate::ctx::EvaluationContext;
use crate::value::{Metadata, Value};
use futures::stream::StreamExt;
use std::sync::Arc;

/// Which boolean value on the left short-circuits `&&`/`||` without ever
/// evaluating the right operand (§4.2): `false` for `&&`, `true` for `||`.
fn short_circuit_value(op: BinaryOperator) -> bool {
	matches!(op, BinaryOperator::Or)
}

/// Evaluates a lazy boolean operator. `right` is only invoked when `left`
/// does not short-circuit, so a skipped operand never contributes its secret
/// flag or attribute trace to the result (§4.1, §8).
fn eval_lazy(op: BinaryOperator, left: Value, right: impl FnOnce() -> Value) -> Value {
	let short = short_circuit_value(op);
	if left.is_error() {
		return left;
	}
	match left.as_boolean() {
		Some(b) if b == short => Value::Boolean(short, left.metadata().clone()),
		Some(_) => {
			let rv = right();
			if rv.is_error() {
				return rv;
			}
			match rv.as_boolean() {
				Some(rb) => Value::Boolean(rb, Metadata::merge([left.metadata(), rv.metadata()])),
				None => Value::Error(
					"Boolean operation requires Boolean values".into(),
					Metadata::merge([left.metadata(), rv.metadata()]),
				),
			}
		}
		None => Value::Error("Boolean operation requires Boolean values".into(), left.metadata().clone()),
	}
}

/// Compiles `&&`/`||`, keeping the laziness contract across all three
/// runtime representations: `right` is only ever resolved once `left` is
/// known not to short-circuit.
pub fn compile_logical(op: BinaryOperator, left: CompiledExpression, right: CompiledExpression) -> CompiledExpression {
	match (&left, &right) {
		(CompiledExpression::Constant(_), CompiledExpression::Constant(_)) => {
			let lv = left.constant_value().unwrap().clone();
			let rv = right.constant_value().unwrap().clone();
			CompiledExpression::Constant(eval_lazy(op, lv, move || rv))
		}
		_ if !left.is_stream() && !right.is_stream() => {
			let depends = left.depends_on_subscription() || right.depends_on_subscription();
			CompiledExpression::Pure(
				Arc::new(move |ctx: &EvaluationContext| {
					let lv = left.eval_pure(ctx);
					eval_lazy(op, lv, || right.eval_pure(ctx))
				}),
				depends,
			)
		}
		_ => CompiledExpression::Stream(Arc::new(move |ctx: &EvaluationContext| {
			let ctx = ctx.clone();
			let left = left.clone();
			let right = right.clone();
			Box::pin(left.to_stream(&ctx).then(move |lv| {
				let ctx = ctx.clone();
				let right = right.clone();
				async move {
					let short = short_circuit_value(op);
					if lv.is_error() || lv.as_boolean() == Some(short) {
						return eval_lazy(op, lv, || unreachable!("short-circuited, right not needed"));
					}
					let rv = right.to_stream(&ctx).next().await.unwrap_or_else(Value::undefined);
					eval_lazy(op, lv, move || rv)
				}
			}))
		})),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn and_short_circuits_on_false_left() {
		let result = eval_lazy(BinaryOperator::And, Value::boolean(false), || {
			panic!("right must not be evaluated")
		});
		assert_eq!(result.as_boolean(), Some(false));
	}

	#[test]
	fn or_short_circuits_on_true_left() {
		let result = eval_lazy(BinaryOperator::Or, Value::boolean(true), || {
			panic!("right must not be evaluated")
		});
		assert_eq!(result.as_boolean(), Some(true));
	}

	#[test]
	fn and_passes_through_right_when_left_true() {
		let result = eval_lazy(BinaryOperator::And, Value::boolean(true), || Value::boolean(false));
		assert_eq!(result.as_boolean(), Some(false));
	}
}
