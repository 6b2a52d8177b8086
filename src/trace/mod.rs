//! The traced decision builder (§4.6): shapes a subscription's outcome,
//! along with the per-document detail that produced it, into the JSON object
//! a host hands back to the party that asked for a decision.

use crate::ctx::Subscription;
use crate::decision::Decision;
use crate::policy::Entitlement;
use crate::value::{Array, Metadata, Object, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether a [`DocumentTrace`] describes a single policy or a policy set.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
	Policy,
	Set,
}

/// One document's contribution to a traced decision (§4.6). A set's
/// `total_policies`/`policies` are populated from its children; a policy
/// leaves them `None`/empty.
#[derive(Clone, Debug)]
pub struct DocumentTrace {
	pub name: String,
	pub kind: DocumentKind,
	pub entitlement: Option<Entitlement>,
	pub decision: Decision,
	pub obligations: Vec<Value>,
	pub advice: Vec<Value>,
	pub resource: Option<Value>,
	pub total_policies: Option<usize>,
	pub policies: Vec<DocumentTrace>,
}

impl DocumentTrace {
	pub fn for_policy(name: impl Into<String>, entitlement: Entitlement, outcome: &crate::combining::PolicyOutcome) -> Self {
		DocumentTrace {
			name: name.into(),
			kind: DocumentKind::Policy,
			entitlement: Some(entitlement),
			decision: outcome.decision,
			obligations: outcome.obligations.clone(),
			advice: outcome.advice.clone(),
			resource: outcome.resource.clone(),
			total_policies: None,
			policies: Vec::new(),
		}
	}

	pub fn for_set(name: impl Into<String>, outcome: &crate::combining::PolicyOutcome, children: Vec<DocumentTrace>) -> Self {
		DocumentTrace {
			name: name.into(),
			kind: DocumentKind::Set,
			entitlement: None,
			decision: outcome.decision,
			obligations: outcome.obligations.clone(),
			advice: outcome.advice.clone(),
			resource: outcome.resource.clone(),
			total_policies: Some(children.len()),
			policies: children,
		}
	}

	/// Returns a copy with every [`Value`] replaced per §4.6.1 wherever its
	/// metadata carries the secret bit.
	fn redacted(&self) -> DocumentTrace {
		DocumentTrace {
			name: self.name.clone(),
			kind: self.kind,
			entitlement: self.entitlement,
			decision: self.decision,
			obligations: self.obligations.iter().map(redacted_value).collect(),
			advice: self.advice.iter().map(redacted_value).collect(),
			resource: self.resource.as_ref().map(redacted_value),
			total_policies: self.total_policies,
			policies: self.policies.iter().map(DocumentTrace::redacted).collect(),
		}
	}

	fn to_json(&self) -> serde_json::Value {
		let mut fields = serde_json::Map::new();
		fields.insert("name".into(), serde_json::Value::String(self.name.clone()));
		fields.insert("type".into(), serde_json::to_value(self.kind).unwrap_or(serde_json::Value::Null));
		fields.insert(
			"entitlement".into(),
			match self.entitlement {
				Some(Entitlement::Permit) => serde_json::Value::String("permit".into()),
				Some(Entitlement::Deny) => serde_json::Value::String("deny".into()),
				None => serde_json::Value::Null,
			},
		);
		fields.insert("decision".into(), serde_json::Value::String(self.decision.as_str().into()));
		fields.insert("obligations".into(), serde_json::Value::Array(self.obligations.iter().map(value_to_json).collect()));
		fields.insert("advice".into(), serde_json::Value::Array(self.advice.iter().map(value_to_json).collect()));
		fields.insert("resource".into(), self.resource.as_ref().map(value_to_json).unwrap_or(serde_json::Value::Null));
		if self.kind == DocumentKind::Set {
			fields.insert("totalPolicies".into(), serde_json::Value::from(self.total_policies.unwrap_or(0)));
			fields.insert("policies".into(), serde_json::Value::Array(self.policies.iter().map(DocumentTrace::to_json).collect()));
		}
		serde_json::Value::Object(fields)
	}
}

/// A failure reported by the policy retrieval point (§6/§7): surfaces in
/// `retrievalErrors` and forces the overall decision to `INDETERMINATE`.
#[derive(Clone, Debug)]
pub struct RetrievalError {
	pub name: String,
	pub message: String,
}

impl RetrievalError {
	fn to_json(&self) -> serde_json::Value {
		serde_json::json!({ "name": self.name, "message": self.message })
	}
}

/// The top-level traced decision (§4.6) emitted for one subscription.
#[derive(Clone, Debug)]
pub struct TracedDecision {
	pub pdp_id: String,
	pub configuration_id: String,
	pub subscription_id: String,
	pub subscription: Subscription,
	pub timestamp: DateTime<Utc>,
	pub algorithm: crate::combining::CombiningAlgorithm,
	pub documents: Vec<DocumentTrace>,
	pub decision: Decision,
	pub obligations: Vec<Value>,
	pub advice: Vec<Value>,
	pub resource: Option<Value>,
	pub retrieval_errors: Vec<RetrievalError>,
}

impl TracedDecision {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		pdp_id: impl Into<String>,
		configuration_id: impl Into<String>,
		subscription_id: impl Into<String>,
		subscription: Subscription,
		timestamp: DateTime<Utc>,
		algorithm: crate::combining::CombiningAlgorithm,
		documents: Vec<DocumentTrace>,
		decision: crate::decision::AuthorizationDecision,
	) -> Self {
		TracedDecision {
			pdp_id: pdp_id.into(),
			configuration_id: configuration_id.into(),
			subscription_id: subscription_id.into(),
			subscription,
			timestamp,
			algorithm,
			documents,
			decision: decision.decision,
			obligations: decision.obligations,
			advice: decision.advice,
			resource: decision.resource,
			retrieval_errors: Vec::new(),
		}
	}

	/// A traced decision for a subscription whose policy retrieval point
	/// failed outright (§7): no documents were ever compiled, the decision is
	/// unconditionally `INDETERMINATE`, and the errors are surfaced verbatim.
	pub fn retrieval_failure(
		pdp_id: impl Into<String>,
		configuration_id: impl Into<String>,
		subscription_id: impl Into<String>,
		subscription: Subscription,
		timestamp: DateTime<Utc>,
		algorithm: crate::combining::CombiningAlgorithm,
		errors: Vec<RetrievalError>,
	) -> Self {
		TracedDecision {
			pdp_id: pdp_id.into(),
			configuration_id: configuration_id.into(),
			subscription_id: subscription_id.into(),
			subscription,
			timestamp,
			algorithm,
			documents: Vec::new(),
			decision: Decision::Indeterminate,
			obligations: Vec::new(),
			advice: Vec::new(),
			resource: None,
			retrieval_errors: errors,
		}
	}

	pub fn total_documents(&self) -> usize {
		self.documents.len()
	}

	/// Projects this trace for an external observer (§4.6.1): every secret
	/// value in every document, obligation, advice entry, and resource is
	/// replaced with a redaction marker before the caller ever gets to
	/// serialize it. The subscription itself is left untouched -- it is the
	/// input the caller already possesses, not a value the engine derived.
	pub fn redacted(&self) -> TracedDecision {
		TracedDecision {
			pdp_id: self.pdp_id.clone(),
			configuration_id: self.configuration_id.clone(),
			subscription_id: self.subscription_id.clone(),
			subscription: self.subscription.clone(),
			timestamp: self.timestamp,
			algorithm: self.algorithm,
			documents: self.documents.iter().map(DocumentTrace::redacted).collect(),
			decision: self.decision,
			obligations: self.obligations.iter().map(redacted_value).collect(),
			advice: self.advice.iter().map(redacted_value).collect(),
			resource: self.resource.as_ref().map(redacted_value),
			retrieval_errors: self.retrieval_errors.clone(),
		}
	}

	/// Shapes this trace into the JSON object of §4.6. Callers that intend to
	/// hand the result to anyone other than the engine's own audit log should
	/// call [`TracedDecision::redacted`] first.
	pub fn to_json(&self) -> serde_json::Value {
		let mut fields = serde_json::Map::new();
		fields.insert("pdp_id".into(), serde_json::Value::String(self.pdp_id.clone()));
		fields.insert("configuration_id".into(), serde_json::Value::String(self.configuration_id.clone()));
		fields.insert("subscription_id".into(), serde_json::Value::String(self.subscription_id.clone()));
		fields.insert("subscription".into(), subscription_to_json(&self.subscription));
		fields.insert("timestamp".into(), serde_json::Value::String(self.timestamp.to_rfc3339()));
		fields.insert("algorithm".into(), serde_json::Value::String(self.algorithm.name().into()));
		fields.insert("totalDocuments".into(), serde_json::Value::from(self.total_documents()));
		fields.insert("documents".into(), serde_json::Value::Array(self.documents.iter().map(DocumentTrace::to_json).collect()));
		fields.insert("decision".into(), serde_json::Value::String(self.decision.as_str().into()));
		fields.insert("obligations".into(), serde_json::Value::Array(self.obligations.iter().map(value_to_json).collect()));
		fields.insert("advice".into(), serde_json::Value::Array(self.advice.iter().map(value_to_json).collect()));
		fields.insert("resource".into(), self.resource.as_ref().map(value_to_json).unwrap_or(serde_json::Value::Null));
		if !self.retrieval_errors.is_empty() {
			fields.insert("retrievalErrors".into(), serde_json::Value::Array(self.retrieval_errors.iter().map(RetrievalError::to_json).collect()));
		}
		serde_json::Value::Object(fields)
	}
}

fn subscription_to_json(subscription: &Subscription) -> serde_json::Value {
	serde_json::json!({
		"subject": value_to_json(&subscription.subject),
		"action": value_to_json(&subscription.action),
		"resource": value_to_json(&subscription.resource),
		"environment": value_to_json(&subscription.environment),
	})
}

/// Converts a DSL [`Value`] into its JSON shape. `Undefined` collapses to
/// `null`, matching the "absent field" reading an object literal already
/// gives an `Undefined`-valued field (§3). `Error` has no JSON-native
/// counterpart, so it is shaped as `{"error": message}`.
pub fn value_to_json(value: &Value) -> serde_json::Value {
	match value {
		Value::Null(_) | Value::Undefined(_) => serde_json::Value::Null,
		Value::Boolean(b, _) => serde_json::Value::Bool(*b),
		Value::Number(n, _) => serde_json::to_value(n).unwrap_or(serde_json::Value::Null),
		Value::Text(s, _) => serde_json::Value::String(s.clone()),
		Value::Array(a, _) => serde_json::Value::Array(a.iter().map(value_to_json).collect()),
		Value::Object(o, _) => serde_json::Value::Object(o.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect()),
		Value::Error(message, _) => serde_json::json!({ "error": message }),
	}
}

/// Bridges a [`DocumentTrace`] through a [`Value`] so it can travel through
/// [`crate::stream::combine_latest`], the same device [`value_to_json`]'s
/// sibling conversions in [`crate::policy`] use for [`crate::combining::PolicyOutcome`].
pub(crate) fn document_trace_to_value(trace: &DocumentTrace) -> Value {
	Value::object_literal(vec![
		("name".into(), Value::text(trace.name.clone())),
		("kind".into(), Value::text(match trace.kind {
			DocumentKind::Policy => "policy",
			DocumentKind::Set => "set",
		})),
		(
			"entitlement".into(),
			match trace.entitlement {
				Some(Entitlement::Permit) => Value::text("permit"),
				Some(Entitlement::Deny) => Value::text("deny"),
				None => Value::undefined(),
			},
		),
		("decision".into(), Value::text(trace.decision.as_str())),
		("obligations".into(), Value::array_literal(trace.obligations.clone())),
		("advice".into(), Value::array_literal(trace.advice.clone())),
		("resource".into(), trace.resource.clone().unwrap_or_else(Value::undefined)),
		("policies".into(), Value::array_literal(trace.policies.iter().map(document_trace_to_value).collect())),
	])
}

pub(crate) fn value_to_document_trace(v: &Value) -> DocumentTrace {
	let obj = v.as_object();
	let name = obj.and_then(|o| o.get("name")).and_then(|v| v.as_text()).unwrap_or_default().to_string();
	let kind = match obj.and_then(|o| o.get("kind")).and_then(|v| v.as_text()) {
		Some("set") => DocumentKind::Set,
		_ => DocumentKind::Policy,
	};
	let entitlement = match obj.and_then(|o| o.get("entitlement")).and_then(|v| v.as_text()) {
		Some("permit") => Some(Entitlement::Permit),
		Some("deny") => Some(Entitlement::Deny),
		_ => None,
	};
	let decision = match obj.and_then(|o| o.get("decision")).and_then(|v| v.as_text()) {
		Some("PERMIT") => Decision::Permit,
		Some("DENY") => Decision::Deny,
		Some("INDETERMINATE") => Decision::Indeterminate,
		_ => Decision::NotApplicable,
	};
	let obligations = obj.and_then(|o| o.get("obligations")).and_then(|v| v.as_array()).map(|a| a.0.clone()).unwrap_or_default();
	let advice = obj.and_then(|o| o.get("advice")).and_then(|v| v.as_array()).map(|a| a.0.clone()).unwrap_or_default();
	let resource = obj.and_then(|o| o.get("resource")).cloned().filter(|v| !v.is_undefined());
	let policies: Vec<DocumentTrace> =
		obj.and_then(|o| o.get("policies")).and_then(|v| v.as_array()).map(|a| a.iter().map(value_to_document_trace).collect()).unwrap_or_default();
	let total_policies = if kind == DocumentKind::Set { Some(policies.len()) } else { None };
	DocumentTrace { name, kind, entitlement, decision, obligations, advice, resource, total_policies, policies }
}

/// Replaces `value` with a redaction marker if its metadata carries the
/// secret bit (§4.1's stickiness means a composite built from even one
/// secret input already reports `secret = true`, so the whole composite is
/// redacted rather than picked apart field by field); otherwise recurses into
/// arrays/objects so a secret nested several levels down still triggers
/// redaction even though the ancestor containers above it are not
/// themselves secret.
fn redacted_value(value: &Value) -> Value {
	if value.metadata().secret {
		return Value::Text("**REDACTED**".into(), Metadata::secret());
	}
	match value {
		Value::Array(a, m) => Value::Array(Array(a.iter().map(redacted_value).collect()), m.clone()),
		Value::Object(o, m) => {
			let redacted: Object = o.iter().map(|(k, v)| (k.clone(), redacted_value(v))).collect();
			Value::Object(redacted, m.clone())
		}
		other => other.clone(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::combining::{CombiningAlgorithm, PolicyOutcome};
	use crate::ctx::Subscription;

	fn timestamp() -> DateTime<Utc> {
		DateTime::from_timestamp(1_700_000_000, 0).unwrap()
	}

	#[test]
	fn secret_value_is_replaced_but_tag_survives() {
		let secret = Value::Text("s3cr3t".into(), Metadata::secret());
		let redacted = redacted_value(&secret);
		assert_eq!(redacted.as_text(), Some("**REDACTED**"));
		assert!(redacted.metadata().secret);
	}

	#[test]
	fn secret_nested_field_redacts_whole_object_due_to_sticky_metadata() {
		let obj = Value::object_literal(vec![
			("public".into(), Value::text("ok")),
			("private".into(), Value::Text("s3cr3t".into(), Metadata::secret())),
		]);
		let redacted = redacted_value(&obj);
		assert_eq!(redacted.as_text(), Some("**REDACTED**"));
	}

	#[test]
	fn plain_values_pass_through_to_json_unredacted() {
		let obj = Value::object_literal(vec![("x".into(), Value::number(1))]);
		let json = value_to_json(&obj);
		assert_eq!(json, serde_json::json!({"x": "1"}));
	}

	#[test]
	fn document_trace_to_json_shapes_policy() {
		let outcome = PolicyOutcome { name: "p1".into(), decision: Decision::Permit, obligations: Vec::new(), advice: Vec::new(), resource: None };
		let trace = DocumentTrace::for_policy("p1", Entitlement::Permit, &outcome);
		let json = trace.to_json();
		assert_eq!(json["type"], serde_json::json!("policy"));
		assert_eq!(json["decision"], serde_json::json!("PERMIT"));
		assert!(json.get("totalPolicies").is_none());
	}

	#[test]
	fn set_trace_carries_total_policies_and_children() {
		let child = PolicyOutcome { name: "p1".into(), decision: Decision::Permit, obligations: Vec::new(), advice: Vec::new(), resource: None };
		let child_trace = DocumentTrace::for_policy("p1", Entitlement::Permit, &child);
		let set_outcome = PolicyOutcome { name: "set1".into(), decision: Decision::Permit, obligations: Vec::new(), advice: Vec::new(), resource: None };
		let trace = DocumentTrace::for_set("set1", &set_outcome, vec![child_trace]);
		let json = trace.to_json();
		assert_eq!(json["totalPolicies"], serde_json::json!(1));
		assert_eq!(json["policies"].as_array().unwrap().len(), 1);
	}

	#[test]
	fn traced_decision_surfaces_retrieval_errors_and_forces_indeterminate() {
		let trace = TracedDecision::retrieval_failure(
			"pdp-1",
			"cfg-1",
			"sub-1",
			Subscription::default(),
			timestamp(),
			CombiningAlgorithm::DenyOverrides,
			vec![RetrievalError { name: "pip-down".into(), message: "connection refused".into() }],
		);
		assert_eq!(trace.decision, Decision::Indeterminate);
		let json = trace.to_json();
		assert_eq!(json["retrievalErrors"].as_array().unwrap().len(), 1);
	}

	#[test]
	fn redacted_traced_decision_hides_secret_obligations() {
		let decision = crate::decision::AuthorizationDecision {
			decision: Decision::Permit,
			obligations: vec![Value::Text("s3cr3t".into(), Metadata::secret())],
			advice: Vec::new(),
			resource: None,
		};
		let trace = TracedDecision::new(
			"pdp-1",
			"cfg-1",
			"sub-1",
			Subscription::default(),
			timestamp(),
			CombiningAlgorithm::DenyOverrides,
			Vec::new(),
			decision,
		);
		let redacted = trace.redacted();
		assert_eq!(redacted.obligations[0].as_text(), Some("**REDACTED**"));
	}
}
