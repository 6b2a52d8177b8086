mod array;
mod metadata;
mod number;
mod object;
#[allow(clippy::module_inception)]
mod value;

pub use array::{resolve_index, Array};
pub use metadata::{AttributeInvocationRecord, AttributeOptions, AttributeTrace, Metadata};
pub use number::Number;
pub use object::Object;
pub use value::Value;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn undefined_equals_undefined_but_not_null() {
		assert_eq!(Value::undefined(), Value::undefined());
		assert_ne!(Value::undefined(), Value::null());
	}

	#[test]
	fn array_literal_drops_undefined_keeps_error() {
		let v = Value::array_literal(vec![
			Value::number(1),
			Value::undefined(),
			Value::error("boom"),
		]);
		let arr = v.as_array().unwrap();
		assert_eq!(arr.len(), 2);
		assert!(arr[1].is_error());
	}

	#[test]
	fn object_literal_drops_undefined_fields() {
		let v = Value::object_literal(vec![
			("a".into(), Value::number(1)),
			("b".into(), Value::undefined()),
		]);
		let obj = v.as_object().unwrap();
		assert_eq!(obj.len(), 1);
		assert!(obj.get("b").is_none());
	}

	#[test]
	fn secret_is_sticky_through_merge() {
		let secret = Value::Text("s".into(), Metadata::secret());
		let plain = Value::number(1);
		let merged = Metadata::merge([secret.metadata(), plain.metadata()]);
		assert!(merged.secret);
	}

	#[test]
	fn negative_index_resolution() {
		assert_eq!(resolve_index(-1, 3), Some(2));
		assert_eq!(resolve_index(-3, 3), Some(0));
		assert_eq!(resolve_index(-4, 3), None);
		assert_eq!(resolve_index(0, 3), Some(0));
	}
}
