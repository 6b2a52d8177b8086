use crate::value::{resolve_index, Array, Object, Value};

/// `.key` (§4.2): key access on a non-object yields `Undefined`; the parent's
/// metadata is preserved on the result even when the result is scalar.
pub fn key_access(base: &Value, key: &str) -> Value {
	if base.is_error() {
		return base.clone();
	}
	match base.as_object().and_then(|o| o.get(key)) {
		Some(v) => v.clone(),
		None => Value::Undefined(base.metadata().clone()),
	}
}

/// `[index]` (§4.2, §8): index access on a non-array yields `Undefined`;
/// out-of-range on an array is `Error`. Negative indices count from the end.
pub fn index_access(base: &Value, index: i64) -> Value {
	if base.is_error() {
		return base.clone();
	}
	let Some(array) = base.as_array() else {
		return Value::Undefined(base.metadata().clone());
	};
	match resolve_index(index, array.len()) {
		Some(i) => array[i].clone(),
		None => Value::Error("out of bounds".into(), base.metadata().clone()),
	}
}

/// `[i:j:k]` (§4.2): Python slice semantics on arrays; non-arrays yield an
/// empty array carrying the parent's metadata.
pub fn slice(base: &Value, start: Option<i64>, end: Option<i64>, step: Option<i64>) -> Value {
	if base.is_error() {
		return base.clone();
	}
	let meta = base.metadata().clone();
	let Some(array) = base.as_array() else {
		return Value::Array(Array(Vec::new()), meta);
	};
	let len = array.len() as i64;
	let step = step.unwrap_or(1);
	if step == 0 {
		return Value::Error("slice step cannot be zero".into(), meta);
	}
	let (default_start, default_end) = if step > 0 { (0, len) } else { (len - 1, -1) };
	let clamp = |i: i64| -> i64 {
		let i = if i < 0 { i + len } else { i };
		i.clamp(if step > 0 { 0 } else { -1 }, len)
	};
	let mut i = start.map(clamp).unwrap_or(default_start);
	let bound = end.map(clamp).unwrap_or(default_end);
	let mut out = Vec::new();
	if step > 0 {
		while i < bound && i < len {
			if i >= 0 {
				out.push(array[i as usize].clone());
			}
			i += step;
		}
	} else {
		while i > bound && i >= 0 {
			if i < len {
				out.push(array[i as usize].clone());
			}
			i += step;
		}
	}
	Value::Array(Array(out), meta)
}

/// `.key, .key2, ...]` style union over an object, or `[a, b, ...]` over an
/// array (§4.2). Array unions require integer selectors and out-of-range is
/// `Error`; object unions require text keys and missing keys are dropped.
pub fn union_array(base: &Value, selectors: &[Value]) -> Value {
	if base.is_error() {
		return base.clone();
	}
	let meta = base.metadata().clone();
	let Some(array) = base.as_array() else {
		return Value::Undefined(meta);
	};
	let mut out = Vec::new();
	for selector in selectors {
		if selector.is_error() {
			return selector.clone();
		}
		let Some(n) = selector.as_number().and_then(|n| n.to_i64_truncated()) else {
			return Value::Error("array union selector must be a number".into(), meta);
		};
		match resolve_index(n, array.len()) {
			Some(i) => out.push(array[i].clone()),
			None => return Value::Error("out of bounds".into(), meta),
		}
	}
	Value::Array(Array(out), meta)
}

pub fn union_object(base: &Value, selectors: &[Value]) -> Value {
	if base.is_error() {
		return base.clone();
	}
	let meta = base.metadata().clone();
	let Some(obj) = base.as_object() else {
		return Value::Undefined(meta);
	};
	let mut out = Object::new();
	for selector in selectors {
		if selector.is_error() {
			return selector.clone();
		}
		let Some(key) = selector.as_text() else {
			return Value::Error("object union selector must be text".into(), meta);
		};
		if let Some(v) = obj.get(key) {
			out.insert(key.to_string(), v.clone());
		}
	}
	Value::Object(out, meta)
}

/// `.*` / `[*]` (§4.2): collects values in insertion/array order.
pub fn wildcard(base: &Value) -> Value {
	if base.is_error() {
		return base.clone();
	}
	let meta = base.metadata().clone();
	match base {
		Value::Array(a, _) => Value::Array(Array(a.iter().cloned().collect()), meta),
		Value::Object(o, _) => Value::Array(Array(o.values().cloned().collect()), meta),
		_ => Value::Undefined(meta),
	}
}

/// `..key` (§4.2): depth-first traversal collecting every match, possibly
/// with repetitions across nesting levels.
pub fn recursive_key(base: &Value, key: &str) -> Value {
	if base.is_error() {
		return base.clone();
	}
	let meta = base.metadata().clone();
	let mut out = Vec::new();
	collect_recursive_key(base, key, &mut out);
	Value::Array(Array(out), meta)
}

fn collect_recursive_key(value: &Value, key: &str, out: &mut Vec<Value>) {
	match value {
		Value::Object(o, _) => {
			if let Some(v) = o.get(key) {
				out.push(v.clone());
			}
			for (_, v) in o.iter() {
				collect_recursive_key(v, key, out);
			}
		}
		Value::Array(a, _) => {
			for v in a.iter() {
				collect_recursive_key(v, key, out);
			}
		}
		_ => {}
	}
}

/// `..[i]` (§4.2): recursive descent collecting every element at index `i` of
/// any nested array.
pub fn recursive_index(base: &Value, index: i64) -> Value {
	if base.is_error() {
		return base.clone();
	}
	let meta = base.metadata().clone();
	let mut out = Vec::new();
	collect_recursive_index(base, index, &mut out);
	Value::Array(Array(out), meta)
}

fn collect_recursive_index(value: &Value, index: i64, out: &mut Vec<Value>) {
	match value {
		Value::Array(a, _) => {
			if let Some(i) = resolve_index(index, a.len()) {
				out.push(a[i].clone());
			}
			for v in a.iter() {
				collect_recursive_index(v, index, out);
			}
		}
		Value::Object(o, _) => {
			for (_, v) in o.iter() {
				collect_recursive_index(v, index, out);
			}
		}
		_ => {}
	}
}

/// `[?(pred)]` (§4.2.1): applies a predicate closure (already bound to `@`
/// and `#`) to every element. Arrays are filtered preserving order, objects
/// filtered preserving entries, scalars pass through unchanged when the
/// predicate is true and become `Undefined` otherwise. The predicate must
/// produce a boolean; anything else is `Error`. The result of this step is
/// itself an ordinary steppable value -- an array stays an array -- so a
/// subsequent step composes normally instead of treating the filter's output
/// as terminal.
pub fn condition_filter(base: &Value, mut predicate: impl FnMut(&Value, &Value) -> Value) -> Value {
	if base.is_error() {
		return base.clone();
	}
	let meta = base.metadata().clone();
	match base {
		Value::Array(a, _) => {
			let mut out = Vec::new();
			for (i, element) in a.iter().enumerate() {
				let index = Value::number(i);
				let verdict = predicate(element, &index);
				if verdict.is_error() {
					return verdict;
				}
				match verdict.as_boolean() {
					Some(true) => out.push(element.clone()),
					Some(false) => {}
					None => return Value::Error("Condition must evaluate to boolean".into(), meta),
				}
			}
			Value::Array(Array(out), meta)
		}
		Value::Object(o, _) => {
			let mut out = Object::new();
			for (key, element) in o.iter() {
				let key_value = Value::text(key.clone());
				let verdict = predicate(element, &key_value);
				if verdict.is_error() {
					return verdict;
				}
				match verdict.as_boolean() {
					Some(true) => out.insert(key.clone(), element.clone()),
					Some(false) => {}
					None => return Value::Error("Condition must evaluate to boolean".into(), meta),
				}
			}
			Value::Object(out, meta)
		}
		_ => {
			let verdict = predicate(base, &Value::undefined());
			if verdict.is_error() {
				return verdict;
			}
			match verdict.as_boolean() {
				Some(true) => base.clone(),
				Some(false) => Value::Undefined(meta),
				None => Value::Error("Condition must evaluate to boolean".into(), meta),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn negative_index_from_end() {
		let arr = Value::array_literal(vec![Value::number(1), Value::number(2), Value::number(3)]);
		assert_eq!(index_access(&arr, -3), Value::number(1));
		assert_eq!(index_access(&arr, -1), Value::number(3));
	}

	#[test]
	fn boundary_negative_index_errors() {
		let arr = Value::array_literal(vec![Value::number(1), Value::number(2)]);
		assert!(index_access(&arr, -3).is_error());
	}

	#[test]
	fn full_slice_returns_equal_array() {
		let arr = Value::array_literal(vec![Value::number(1), Value::number(2), Value::number(3)]);
		let sliced = slice(&arr, None, None, None);
		assert_eq!(sliced, arr);
	}

	#[test]
	fn recursive_descent_matches_one_level_wildcard_on_flat_object() {
		let obj = Value::object_literal(vec![("a".into(), Value::number(1)), ("b".into(), Value::number(2))]);
		let via_wildcard = wildcard(&obj);
		let via_recursive_a = recursive_key(&obj, "a");
		assert_eq!(via_recursive_a.as_array().unwrap().0, vec![Value::number(1)]);
		assert!(via_wildcard.as_array().unwrap().0.contains(&Value::number(1)));
	}

	#[test]
	fn condition_on_empty_array_returns_empty_array() {
		let empty = Value::array_literal(vec![]);
		let result = condition_filter(&empty, |_, _| Value::boolean(true));
		assert_eq!(result, Value::array_literal(vec![]));
	}

	#[test]
	fn non_boolean_predicate_is_error() {
		let arr = Value::array_literal(vec![Value::number(1)]);
		let result = condition_filter(&arr, |_, _| Value::number(42));
		assert!(result.is_error());
	}
}
