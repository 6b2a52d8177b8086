//! The policy compiler and evaluator (§4.5): compiles a policy or policy
//! set document into the runtime representations the expression compiler
//! already defines, and evaluates compiled documents into a stream of
//! per-document [`crate::combining::PolicyOutcome`]s.

mod ast;
mod body;
mod document;
mod schema;
mod support;

pub use ast::{BodyStatement, DocumentNode, Entitlement, PolicyNode, PolicySetNode, Schemas};
pub use document::{
	compile_document, compile_document_standalone, compile_policy, compile_policy_set, evaluate_document, evaluate_policy,
	evaluate_policy_set, evaluate_policy_set_traced, CompiledDocument, CompiledPolicy, CompiledPolicySet,
};
pub(crate) use document::{outcome_to_value, value_to_outcome};
pub use schema::validate;

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::{BinaryOperator, Node, SubscriptionElement};
	use crate::broker::{EmptyAttributeBroker, EmptyFunctionBroker};
	use crate::combining::CombiningAlgorithm;
	use crate::ctx::{CompilationContext, EvaluationContext, Subscription};
	use crate::decision::Decision;
	use crate::value::Value;
	use futures::stream::StreamExt;
	use std::sync::Arc;

	fn cctx() -> CompilationContext {
		CompilationContext::new(Arc::new(EmptyFunctionBroker), Arc::new(EmptyAttributeBroker))
	}

	fn ctx_with_action(action: &str) -> EvaluationContext {
		EvaluationContext::new(
			"pdp-1",
			"config-1",
			"sub-1",
			Subscription { subject: Value::text("alice"), action: Value::text(action), resource: Value::undefined(), environment: Value::undefined() },
			Arc::new(EmptyFunctionBroker),
			Arc::new(EmptyAttributeBroker),
		)
	}

	fn action_equals(action: &str) -> Node {
		Node::BinaryOp {
			op: BinaryOperator::Equal,
			left: Box::new(Node::SubscriptionElement(SubscriptionElement::Action)),
			right: Box::new(Node::Literal(Value::text(action))),
		}
	}

	fn simple_policy(name: &str, entitlement: Entitlement, action: &str) -> PolicyNode {
		PolicyNode {
			name: name.to_string(),
			entitlement,
			target: Some(action_equals(action)),
			schemas: Schemas::default(),
			body: Vec::new(),
			obligations: Vec::new(),
			advice: Vec::new(),
			transformation: None,
		}
	}

	#[tokio::test]
	async fn policy_with_matching_target_permits() {
		let policy = simple_policy("p1", Entitlement::Permit, "read");
		let compiled = compile_document_standalone(&DocumentNode::Policy(policy), &cctx()).unwrap();
		let ctx = ctx_with_action("read");
		let mut stream = evaluate_document(compiled, ctx);
		let outcome = stream.next().await.unwrap();
		assert_eq!(outcome.decision, Decision::Permit);
	}

	#[tokio::test]
	async fn policy_with_non_matching_target_is_not_applicable() {
		let policy = simple_policy("p1", Entitlement::Permit, "write");
		let compiled = compile_document_standalone(&DocumentNode::Policy(policy), &cctx()).unwrap();
		let ctx = ctx_with_action("read");
		let mut stream = evaluate_document(compiled, ctx);
		let outcome = stream.next().await.unwrap();
		assert_eq!(outcome.decision, Decision::NotApplicable);
	}

	#[tokio::test]
	async fn first_applicable_set_returns_first_matching_policy_obligations() {
		let set = PolicySetNode {
			name: "test".into(),
			algorithm: CombiningAlgorithm::FirstApplicable,
			target: None,
			variables: Vec::new(),
			policies: vec![
				PolicyNode {
					name: "na".into(),
					entitlement: Entitlement::Permit,
					target: None,
					schemas: Schemas::default(),
					body: vec![BodyStatement::Condition(Node::Literal(Value::boolean(false)))],
					obligations: Vec::new(),
					advice: Vec::new(),
					transformation: None,
				},
				PolicyNode {
					name: "first".into(),
					entitlement: Entitlement::Permit,
					target: None,
					schemas: Schemas::default(),
					body: Vec::new(),
					obligations: vec![Node::Literal(Value::object_literal(vec![("type".into(), Value::text("o1"))]))],
					advice: Vec::new(),
					transformation: None,
				},
				PolicyNode {
					name: "second".into(),
					entitlement: Entitlement::Permit,
					target: None,
					schemas: Schemas::default(),
					body: Vec::new(),
					obligations: vec![Node::Literal(Value::object_literal(vec![("type".into(), Value::text("o2"))]))],
					advice: Vec::new(),
					transformation: None,
				},
			],
		};
		let compiled = compile_document_standalone(&DocumentNode::Set(set), &cctx()).unwrap();
		let ctx = ctx_with_action("read");
		let mut stream = evaluate_document(compiled, ctx);
		let outcome = stream.next().await.unwrap();
		assert_eq!(outcome.decision, Decision::Permit);
		assert_eq!(outcome.obligations.len(), 1);
	}

	#[test]
	fn schema_check_rejects_non_object_schema_at_compile_time() {
		let mut policy = simple_policy("p1", Entitlement::Permit, "read");
		policy.schemas.subject = Some(Value::number(1));
		let result = compile_document_standalone(&DocumentNode::Policy(policy), &cctx());
		assert!(matches!(result, Err(crate::err::CompileError::SchemaNotAnObject(None))));
	}
}
