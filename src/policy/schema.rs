use crate::value::Value;

/// Validates `value` structurally against `schema` (§4.5.1): `type` checks
/// the value's kind name, `required` checks field presence on an object,
/// and `properties` recurses into named fields. Any schema key not among
/// these three is ignored, matching the attribute-options "unknown fields
/// ignored" convention of §6.
///
/// Assumes `schema` is itself an object -- the compiler rejects a
/// non-object schema with [`crate::err::CompileError::SchemaNotAnObject`]
/// before this function is ever called.
pub fn validate(value: &Value, schema: &Value) -> bool {
	let schema = match schema.as_object() {
		Some(o) => o,
		None => return false,
	};

	if let Some(expected_kind) = schema.get("type").and_then(|v| v.as_text()) {
		if value.kind_name() != expected_kind {
			return false;
		}
	}

	if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
		let Some(obj) = value.as_object() else { return false };
		for field in required.iter() {
			if let Some(name) = field.as_text() {
				if !obj.contains_key(name) {
					return false;
				}
			}
		}
	}

	if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
		let Some(obj) = value.as_object() else { return false };
		for (key, nested_schema) in properties.iter() {
			if let Some(field_value) = obj.get(key) {
				if !validate(field_value, nested_schema) {
					return false;
				}
			}
		}
	}

	true
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema_object(pairs: Vec<(&str, Value)>) -> Value {
		Value::object_literal(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
	}

	#[test]
	fn type_mismatch_fails() {
		let schema = schema_object(vec![("type", Value::text("object"))]);
		assert!(!validate(&Value::number(1), &schema));
	}

	#[test]
	fn missing_required_field_fails() {
		let schema = schema_object(vec![
			("type", Value::text("object")),
			("required", Value::array_literal(vec![Value::text("name")])),
		]);
		let value = Value::object_literal(vec![("age".into(), Value::number(30))]);
		assert!(!validate(&value, &schema));
	}

	#[test]
	fn nested_property_validated_recursively() {
		let inner = schema_object(vec![("type", Value::text("number"))]);
		let schema = schema_object(vec![
			("type", Value::text("object")),
			("properties", Value::object_literal(vec![("age".into(), inner)])),
		]);
		let good = Value::object_literal(vec![("age".into(), Value::number(30))]);
		let bad = Value::object_literal(vec![("age".into(), Value::text("thirty"))]);
		assert!(validate(&good, &schema));
		assert!(!validate(&bad, &schema));
	}

	#[test]
	fn unrecognized_schema_key_is_ignored() {
		let schema = schema_object(vec![("type", Value::text("number")), ("description", Value::text("an age"))]);
		assert!(validate(&Value::number(1), &schema));
	}
}
