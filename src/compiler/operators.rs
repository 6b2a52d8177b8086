use crate::ast::{BinaryOperator, UnaryOperator};
use crate::value::{Metadata, Value};
use std::cmp::Ordering;

fn merge2(a: &Value, b: &Value) -> Metadata {
	Metadata::merge([a.metadata(), b.metadata()])
}

pub fn eval_unary(op: UnaryOperator, operand: &Value) -> Value {
	if operand.is_error() {
		return operand.clone();
	}
	let meta = operand.metadata().clone();
	match op {
		UnaryOperator::Neg => match operand.as_number() {
			Some(n) => match n.checked_neg() {
				Some(r) => Value::Number(r, meta),
				None => Value::Error("arithmetic overflow".into(), meta),
			},
			None => Value::Error(format!("unary `-` requires a number, found {}", operand.kind_name()), meta),
		},
		UnaryOperator::Not => match operand.as_boolean() {
			Some(b) => Value::Boolean(!b, meta),
			None => Value::Error("Boolean operation requires Boolean values".into(), meta),
		},
	}
}

/// Evaluates an *eager* binary operator -- i.e. anything except `&&`/`||`,
/// whose laziness is handled by the compiler itself since the right operand
/// may not be evaluated at all (§4.2).
pub fn eval_binary(op: BinaryOperator, left: &Value, right: &Value) -> Value {
	use BinaryOperator::*;
	match op {
		Add => add(left, right),
		Sub => arithmetic(left, right, |a, b| a.checked_sub(b)),
		Mul => arithmetic(left, right, |a, b| a.checked_mul(b)),
		Div => arithmetic(left, right, |a, b| a.checked_div(b)),
		Rem => arithmetic(left, right, |a, b| a.checked_rem(b)),
		BitAnd => eager_bool(left, right, |a, b| a && b),
		BitOr => eager_bool(left, right, |a, b| a || b),
		BitXor => eager_bool(left, right, |a, b| a ^ b),
		Equal => Value::Boolean(left.value_eq(right), merge2(left, right)),
		NotEqual => Value::Boolean(!left.value_eq(right), merge2(left, right)),
		LessThan => ordering(left, right, |o| o == Ordering::Less),
		LessThanOrEqual => ordering(left, right, |o| o != Ordering::Greater),
		MoreThan => ordering(left, right, |o| o == Ordering::Greater),
		MoreThanOrEqual => ordering(left, right, |o| o != Ordering::Less),
		In => membership(left, right),
		Matches => matches(left, right),
		And | Or => unreachable!("lazy operators are evaluated by the compiler, not eval_binary"),
	}
}

fn add(left: &Value, right: &Value) -> Value {
	if left.is_error() {
		return left.clone();
	}
	if right.is_error() {
		return right.clone();
	}
	let meta = merge2(left, right);
	match (left, right) {
		(Value::Number(a, _), Value::Number(b, _)) => match a.checked_add(b) {
			Some(r) => Value::Number(r, meta),
			None => Value::Error("arithmetic overflow".into(), meta),
		},
		(Value::Text(a, _), Value::Text(b, _)) => Value::Text(format!("{a}{b}"), meta),
		(Value::Text(a, _), other) => Value::Text(format!("{a}{other}"), meta),
		(other, Value::Text(b, _)) => Value::Text(format!("{other}{b}"), meta),
		_ => Value::Error(
			format!("`+` requires numbers or text, found {} and {}", left.kind_name(), right.kind_name()),
			meta,
		),
	}
}

fn arithmetic(
	left: &Value,
	right: &Value,
	op: impl Fn(&crate::value::Number, &crate::value::Number) -> Option<crate::value::Number>,
) -> Value {
	if left.is_error() {
		return left.clone();
	}
	if right.is_error() {
		return right.clone();
	}
	let meta = merge2(left, right);
	match (left.as_number(), right.as_number()) {
		(Some(a), Some(b)) => match op(a, b) {
			Some(r) => Value::Number(r, meta),
			None => Value::Error("arithmetic error".into(), meta),
		},
		_ => Value::Error(
			format!("arithmetic operator requires numbers, found {} and {}", left.kind_name(), right.kind_name()),
			meta,
		),
	}
}

fn eager_bool(left: &Value, right: &Value, op: impl Fn(bool, bool) -> bool) -> Value {
	if left.is_error() {
		return left.clone();
	}
	if right.is_error() {
		return right.clone();
	}
	let meta = merge2(left, right);
	match (left.as_boolean(), right.as_boolean()) {
		(Some(a), Some(b)) => Value::Boolean(op(a, b), meta),
		_ => Value::Error("Boolean operation requires Boolean values".into(), meta),
	}
}

fn ordering(left: &Value, right: &Value, accept: impl Fn(Ordering) -> bool) -> Value {
	if left.is_error() {
		return left.clone();
	}
	if right.is_error() {
		return right.clone();
	}
	let meta = merge2(left, right);
	let ord = match (left, right) {
		(Value::Number(a, _), Value::Number(b, _)) => a.partial_cmp(b),
		(Value::Text(a, _), Value::Text(b, _)) => Some(a.cmp(b)),
		_ => None,
	};
	match ord {
		Some(o) => Value::Boolean(accept(o), meta),
		None => Value::Error(
			format!("ordering comparison requires two numbers or two text values, found {} and {}", left.kind_name(), right.kind_name()),
			meta,
		),
	}
}

fn membership(left: &Value, right: &Value) -> Value {
	if left.is_error() {
		return left.clone();
	}
	if right.is_error() {
		return right.clone();
	}
	let meta = merge2(left, right);
	match right {
		Value::Array(a, _) => Value::Boolean(a.iter().any(|v| v.value_eq(left)), meta),
		Value::Object(o, _) => Value::Boolean(o.values().any(|v| v.value_eq(left)), meta),
		_ => Value::Error(format!("`in` requires an array or object, found {}", right.kind_name()), meta),
	}
}

fn matches(left: &Value, right: &Value) -> Value {
	if left.is_error() {
		return left.clone();
	}
	if right.is_error() {
		return right.clone();
	}
	let meta = merge2(left, right);
	match (left.as_text(), right.as_text()) {
		(Some(text), Some(pattern)) => match regex::Regex::new(pattern) {
			Ok(re) => Value::Boolean(re.is_match(text), meta),
			Err(e) => Value::Error(format!("malformed regular expression `{pattern}`: {e}"), meta),
		},
		_ => Value::Error("`=~` requires text operands".into(), meta),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn string_concatenation() {
		let result = eval_binary(BinaryOperator::Add, &Value::text("foo"), &Value::text("bar"));
		assert_eq!(result.as_text(), Some("foobar"));
	}

	#[test]
	fn division_by_zero_is_error() {
		let result = eval_binary(BinaryOperator::Div, &Value::number(1), &Value::number(0));
		assert!(result.is_error());
	}

	#[test]
	fn cross_kind_equality_is_false() {
		let result = eval_binary(BinaryOperator::Equal, &Value::number(1), &Value::text("1"));
		assert_eq!(result.as_boolean(), Some(false));
	}

	#[test]
	fn ordering_requires_matching_kinds() {
		let result = eval_binary(BinaryOperator::LessThan, &Value::number(1), &Value::text("x"));
		assert!(result.is_error());
	}

	#[test]
	fn in_tests_value_membership_for_objects() {
		let obj = Value::object_literal(vec![("a".into(), Value::number(1))]);
		let result = eval_binary(BinaryOperator::In, &Value::number(1), &obj);
		assert_eq!(result.as_boolean(), Some(true));
	}

	#[test]
	fn secret_is_sticky_across_eager_ops() {
		let secret = Value::Number(crate::value::Number::from(1i64), Metadata::secret());
		let result = eval_binary(BinaryOperator::Add, &secret, &Value::number(1));
		assert!(result.metadata().secret);
	}
}
