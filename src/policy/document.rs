use super::ast::{DocumentNode, Entitlement, PolicyNode, PolicySetNode, Schemas};
use super::body::compile_body;
use super::schema::validate;
use super::support::first_value;
use crate::ast::Node;
use crate::combining::{self, CombiningAlgorithm, PolicyOutcome};
use crate::compiler::{combine_n, compile_node, compile_target, CompiledExpression, TargetKind};
use crate::ctx::{CompilationContext, EvaluationContext};
use crate::decision::Decision;
use crate::err::CompileError;
use crate::value::Value;
use futures::stream::{BoxStream, StreamExt};
use reblessive::tree::Stk;
use tracing::instrument;

/// A compiled policy (§3): its own match expression (target AND enforced
/// schemas), its body compiled to one short-circuiting boolean expression,
/// and the obligation/advice/transformation expressions it carries.
#[derive(Clone)]
pub struct CompiledPolicy {
	pub name: String,
	pub entitlement: Entitlement,
	pub match_expression: CompiledExpression,
	pub decision_expression: CompiledExpression,
	pub obligations: Vec<CompiledExpression>,
	pub advice: Vec<CompiledExpression>,
	pub transformation: Option<CompiledExpression>,
}

/// A compiled policy set (§3): a target, one-shot-resolved set-level
/// variables, the combining algorithm, and its child policies.
#[derive(Clone)]
pub struct CompiledPolicySet {
	pub name: String,
	pub algorithm: CombiningAlgorithm,
	pub match_expression: CompiledExpression,
	pub variables: Vec<(String, CompiledExpression)>,
	pub policies: Vec<CompiledPolicy>,
}

#[derive(Clone)]
pub enum CompiledDocument {
	Policy(CompiledPolicy),
	Set(CompiledPolicySet),
}

impl CompiledDocument {
	pub fn name(&self) -> &str {
		match self {
			CompiledDocument::Policy(p) => &p.name,
			CompiledDocument::Set(s) => &s.name,
		}
	}
}

fn default_target() -> Node {
	Node::Literal(Value::boolean(true))
}

/// Builds `AND(target_expression, schema_checks)` (§4.5): schema checks are
/// `Pure` expressions that dereference the corresponding subscription
/// element and run [`validate`] against it.
fn compile_match_expression(
	target_expr: CompiledExpression,
	schemas: &Schemas,
) -> Result<CompiledExpression, CompileError> {
	let mut inputs = vec![target_expr];
	for (schema, selector) in [
		(&schemas.subject, SubscriptionSelector::Subject),
		(&schemas.action, SubscriptionSelector::Action),
		(&schemas.resource, SubscriptionSelector::Resource),
		(&schemas.environment, SubscriptionSelector::Environment),
	] {
		if let Some(schema) = schema {
			if schema.as_object().is_none() {
				return Err(CompileError::SchemaNotAnObject(None));
			}
			let schema = schema.clone();
			inputs.push(CompiledExpression::Pure(
				std::sync::Arc::new(move |ctx: &EvaluationContext| {
					let element = selector.dereference(ctx);
					Value::boolean(validate(element, &schema))
				}),
				true,
			));
		}
	}
	Ok(combine_n(inputs, eager_and))
}

#[derive(Clone, Copy)]
enum SubscriptionSelector {
	Subject,
	Action,
	Resource,
	Environment,
}

impl SubscriptionSelector {
	fn dereference<'a>(&self, ctx: &'a EvaluationContext) -> &'a Value {
		let subscription = ctx.subscription();
		match self {
			SubscriptionSelector::Subject => &subscription.subject,
			SubscriptionSelector::Action => &subscription.action,
			SubscriptionSelector::Resource => &subscription.resource,
			SubscriptionSelector::Environment => &subscription.environment,
		}
	}
}

fn eager_and(values: &[Value]) -> Value {
	for v in values {
		if v.is_error() {
			return v.clone();
		}
	}
	for v in values {
		match v.as_boolean() {
			Some(true) => continue,
			Some(false) => return v.clone(),
			None => return Value::Error("Boolean operation requires Boolean values".into(), v.metadata().clone()),
		}
	}
	Value::boolean(true)
}

/// Compiles one of `obligations`/`advice`/the `transform` clause, rejecting
/// an expression that provably always evaluates to `Error` (§4.5).
async fn compile_side_effect(
	stk: &mut Stk,
	node: &Node,
	cctx: &CompilationContext,
	always_error: impl FnOnce() -> CompileError,
) -> Result<CompiledExpression, CompileError> {
	let compiled = stk.run(|stk| compile_node(stk, node, cctx)).await?;
	if let Some(v) = compiled.constant_value() {
		if v.is_error() {
			return Err(always_error());
		}
	}
	Ok(compiled)
}

/// Compiles a single policy document (§4.5). `outer_variables` names the
/// variables already bound by an enclosing policy set, so the body compiler
/// can reject a colliding name.
#[instrument(skip_all, fields(policy = %node.name))]
pub async fn compile_policy(
	stk: &mut Stk,
	node: &PolicyNode,
	cctx: &CompilationContext,
	outer_variables: &[String],
) -> Result<CompiledPolicy, CompileError> {
	let target_node = node.target.clone().unwrap_or_else(default_target);
	let target_expr = compile_target(&target_node, cctx, TargetKind::Policy)?;
	let match_expression = compile_match_expression(target_expr, &node.schemas)?;

	let decision_expression = compile_body(stk, &node.body, cctx, outer_variables).await?;

	let mut obligations = Vec::with_capacity(node.obligations.len());
	for ob in &node.obligations {
		obligations.push(compile_side_effect(stk, ob, cctx, || CompileError::ObligationAlwaysError(None)).await?);
	}
	let mut advice = Vec::with_capacity(node.advice.len());
	for ad in &node.advice {
		advice.push(compile_side_effect(stk, ad, cctx, || CompileError::AdviceAlwaysError(None)).await?);
	}
	let transformation = match &node.transformation {
		Some(t) => Some(compile_side_effect(stk, t, cctx, || CompileError::TransformAlwaysError(None)).await?),
		None => None,
	};

	Ok(CompiledPolicy {
		name: node.name.clone(),
		entitlement: node.entitlement,
		match_expression,
		decision_expression,
		obligations,
		advice,
		transformation,
	})
}

/// Compiles a policy set (§4.5): the set's own target, its variable
/// bindings (provably-always-error bindings are rejected the same way
/// policy bodies reject them), and every child policy.
#[instrument(skip_all, fields(policy_set = %node.name))]
pub async fn compile_policy_set(stk: &mut Stk, node: &PolicySetNode, cctx: &CompilationContext) -> Result<CompiledPolicySet, CompileError> {
	let target_node = node.target.clone().unwrap_or_else(default_target);
	let match_expression = compile_target(&target_node, cctx, TargetKind::Set)?;

	let mut seen = std::collections::HashSet::new();
	let mut variables = Vec::with_capacity(node.variables.len());
	let mut variable_names = Vec::with_capacity(node.variables.len());
	for (name, value) in &node.variables {
		if !seen.insert(name.clone()) {
			return Err(CompileError::DuplicateVariableInSet { name: name.clone(), location: None });
		}
		let compiled = stk.run(|stk| compile_node(stk, value, cctx)).await?;
		if let Some(v) = compiled.constant_value() {
			if v.is_error() {
				return Err(CompileError::SetVariableAlwaysError { name: name.clone(), location: None });
			}
		}
		variable_names.push(name.clone());
		variables.push((name.clone(), compiled));
	}

	let mut policies = Vec::with_capacity(node.policies.len());
	for policy in &node.policies {
		policies.push(compile_policy(stk, policy, cctx, &variable_names).await?);
	}

	Ok(CompiledPolicySet { name: node.name.clone(), algorithm: node.algorithm, match_expression, variables, policies })
}

pub async fn compile_document(stk: &mut Stk, node: &DocumentNode, cctx: &CompilationContext) -> Result<CompiledDocument, CompileError> {
	match node {
		DocumentNode::Policy(p) => Ok(CompiledDocument::Policy(compile_policy(stk, p, cctx, &[]).await?)),
		DocumentNode::Set(s) => Ok(CompiledDocument::Set(compile_policy_set(stk, s, cctx).await?)),
	}
}

/// Synchronous entry point mirroring [`crate::compiler::compile`]'s own
/// `compile_standalone`/`compile` split: hosts call this one, driving the
/// `Stk` recursion stack themselves.
pub fn compile_document_standalone(node: &DocumentNode, cctx: &CompilationContext) -> Result<CompiledDocument, CompileError> {
	let mut stack = reblessive::TreeStack::new();
	futures::executor::block_on(stack.enter(|stk| compile_document(stk, node, cctx)).finish())
}

/// Evaluates a compiled policy against `ctx`, producing a stream of
/// [`PolicyOutcome`]s that updates whenever the match expression or body
/// changes (both are combined via combine-latest, so either's PIPs driving
/// a re-evaluation produce a fresh outcome). Obligations, advice, and the
/// transformation are resampled once per outcome change rather than tracked
/// continuously of their own accord -- the same one-shot-sampling trade-off
/// the attribute-finder compiler's options resolution makes.
pub fn evaluate_policy(policy: CompiledPolicy, ctx: EvaluationContext) -> BoxStream<'static, PolicyOutcome> {
	let combined = combine_n(vec![policy.match_expression.clone(), policy.decision_expression.clone()], |values| {
		Value::array_literal(vec![values[0].clone(), values[1].clone()])
	});
	Box::pin(combined.to_stream(&ctx).then(move |pair| {
		let ctx = ctx.clone();
		let name = policy.name.clone();
		let entitlement = policy.entitlement;
		let obligations = policy.obligations.clone();
		let advice = policy.advice.clone();
		let transformation = policy.transformation.clone();
		async move {
			let elements = pair.as_array().map(|a| a.0.clone()).unwrap_or_default();
			let match_value = elements.first().cloned().unwrap_or_else(Value::undefined);
			let body_value = elements.get(1).cloned().unwrap_or_else(Value::undefined);

			if match_value.is_error() {
				return PolicyOutcome::indeterminate(name);
			}
			if match_value.as_boolean() != Some(true) {
				return PolicyOutcome::not_applicable(name);
			}
			if body_value.is_error() {
				return PolicyOutcome::indeterminate(name);
			}
			match body_value.as_boolean() {
				Some(true) => {}
				Some(false) => return PolicyOutcome::not_applicable(name),
				None => return PolicyOutcome::indeterminate(name),
			}

			let mut resolved_obligations = Vec::with_capacity(obligations.len());
			for expr in &obligations {
				let v = first_value(expr, &ctx).await;
				if v.is_error() {
					return PolicyOutcome::indeterminate(name);
				}
				resolved_obligations.push(v);
			}
			let mut resolved_advice = Vec::with_capacity(advice.len());
			for expr in &advice {
				let v = first_value(expr, &ctx).await;
				if v.is_error() {
					return PolicyOutcome::indeterminate(name);
				}
				resolved_advice.push(v);
			}
			let resource = match &transformation {
				Some(expr) => {
					let v = first_value(expr, &ctx).await;
					if v.is_error() {
						return PolicyOutcome::indeterminate(name);
					}
					Some(v)
				}
				None => None,
			};

			PolicyOutcome { name, decision: entitlement.decision(), obligations: resolved_obligations, advice: resolved_advice, resource }
		}
	}))
}

pub(crate) fn outcome_to_value(o: &PolicyOutcome) -> Value {
	Value::object_literal(vec![
		("name".into(), Value::text(o.name.clone())),
		("decision".into(), Value::text(o.decision.as_str())),
		("obligations".into(), Value::array_literal(o.obligations.clone())),
		("advice".into(), Value::array_literal(o.advice.clone())),
		("resource".into(), o.resource.clone().unwrap_or_else(Value::undefined)),
	])
}

pub(crate) fn value_to_outcome(v: &Value) -> PolicyOutcome {
	let obj = v.as_object();
	let name = obj.and_then(|o| o.get("name")).and_then(|v| v.as_text()).unwrap_or_default().to_string();
	let decision = match obj.and_then(|o| o.get("decision")).and_then(|v| v.as_text()) {
		Some("PERMIT") => Decision::Permit,
		Some("DENY") => Decision::Deny,
		Some("INDETERMINATE") => Decision::Indeterminate,
		_ => Decision::NotApplicable,
	};
	let obligations = obj.and_then(|o| o.get("obligations")).and_then(|v| v.as_array()).map(|a| a.0.clone()).unwrap_or_default();
	let advice = obj.and_then(|o| o.get("advice")).and_then(|v| v.as_array()).map(|a| a.0.clone()).unwrap_or_default();
	let resource = obj.and_then(|o| o.get("resource")).cloned().filter(|v| !v.is_undefined());
	PolicyOutcome { name, decision, obligations, advice, resource }
}

/// Evaluates a policy set (§4.4/§4.5): set-level variables are resolved
/// once up front (the same one-shot trade-off [`evaluate_policy`] documents
/// for obligations/advice), then the set's target gates re-evaluation of
/// every child policy via [`crate::stream::switch_latest`], and the
/// children's outcomes are combined with [`crate::stream::combine_latest`]
/// so a change to any single child re-runs the combining algorithm.
pub fn evaluate_policy_set(set: CompiledPolicySet, ctx: EvaluationContext) -> BoxStream<'static, PolicyOutcome> {
	Box::pin(
		futures::stream::once(async move {
			let mut scoped_ctx = ctx.clone();
			for (name, expr) in &set.variables {
				let v = first_value(expr, &scoped_ctx).await;
				scoped_ctx = scoped_ctx.with(name.clone(), v);
			}
			(set, scoped_ctx)
		})
		.flat_map(|(set, scoped_ctx)| {
			let name = set.name.clone();
			let algorithm = set.algorithm;
			let policies = set.policies.clone();
			let target_stream = set.match_expression.to_stream(&scoped_ctx);
			crate::stream::switch_latest(target_stream, move |target_value| {
				let name = name.clone();
				if target_value.is_error() {
					return Box::pin(futures::stream::once(async move { outcome_to_value(&PolicyOutcome::indeterminate(name)) }))
						as BoxStream<'static, Value>;
				}
				if target_value.as_boolean() != Some(true) {
					return Box::pin(futures::stream::once(async move { outcome_to_value(&PolicyOutcome::not_applicable(name)) }));
				}
				let child_streams: Vec<BoxStream<'static, Value>> = policies
					.iter()
					.cloned()
					.map(|p| Box::pin(evaluate_policy(p, scoped_ctx.clone()).map(|o| outcome_to_value(&o))) as BoxStream<'static, Value>)
					.collect();
				Box::pin(crate::stream::combine_latest(child_streams).map(move |values| {
					let outcomes: Vec<PolicyOutcome> = values.iter().map(value_to_outcome).collect();
					let decision = combining::combine(algorithm, &outcomes);
					outcome_to_value(&PolicyOutcome {
						name: name.clone(),
						decision: decision.decision,
						obligations: decision.obligations,
						advice: decision.advice,
						resource: decision.resource,
					})
				}))
			})
		})
		.map(|v| value_to_outcome(&v)),
	)
}

/// Evaluates any compiled top-level document (§6's policy retrieval point
/// hands back a mix of policies and sets).
pub fn evaluate_document(document: CompiledDocument, ctx: EvaluationContext) -> BoxStream<'static, PolicyOutcome> {
	match document {
		CompiledDocument::Policy(p) => evaluate_policy(p, ctx),
		CompiledDocument::Set(s) => evaluate_policy_set(s, ctx),
	}
}

/// Like [`evaluate_policy_set`], but additionally yields every child policy's
/// own outcome alongside the combined one, for [`crate::trace`]'s per-policy
/// document traces. Kept separate from [`evaluate_policy_set`] so ordinary
/// decision consumption never pays for child-outcome bookkeeping it doesn't
/// need.
pub fn evaluate_policy_set_traced(set: CompiledPolicySet, ctx: EvaluationContext) -> BoxStream<'static, (PolicyOutcome, Vec<PolicyOutcome>)> {
	Box::pin(
		futures::stream::once(async move {
			let mut scoped_ctx = ctx.clone();
			for (name, expr) in &set.variables {
				let v = first_value(expr, &scoped_ctx).await;
				scoped_ctx = scoped_ctx.with(name.clone(), v);
			}
			(set, scoped_ctx)
		})
		.flat_map(|(set, scoped_ctx)| {
			let name = set.name.clone();
			let algorithm = set.algorithm;
			let policies = set.policies.clone();
			let target_stream = set.match_expression.to_stream(&scoped_ctx);
			crate::stream::switch_latest(target_stream, move |target_value| {
				let name = name.clone();
				if target_value.is_error() {
					let outcome = PolicyOutcome::indeterminate(name);
					return Box::pin(futures::stream::once(async move { wrap_traced(outcome, Vec::new()) }))
						as BoxStream<'static, Value>;
				}
				if target_value.as_boolean() != Some(true) {
					let outcome = PolicyOutcome::not_applicable(name);
					return Box::pin(futures::stream::once(async move { wrap_traced(outcome, Vec::new()) }));
				}
				let child_streams: Vec<BoxStream<'static, Value>> = policies
					.iter()
					.cloned()
					.map(|p| Box::pin(evaluate_policy(p, scoped_ctx.clone()).map(|o| outcome_to_value(&o))) as BoxStream<'static, Value>)
					.collect();
				Box::pin(crate::stream::combine_latest(child_streams).map(move |values| {
					let children: Vec<PolicyOutcome> = values.iter().map(value_to_outcome).collect();
					let decision = combining::combine(algorithm, &children);
					let merged = PolicyOutcome {
						name: name.clone(),
						decision: decision.decision,
						obligations: decision.obligations,
						advice: decision.advice,
						resource: decision.resource,
					};
					wrap_traced(merged, children)
				}))
			})
		})
		.map(|v| unwrap_traced(&v)),
	)
}

/// Bundles a merged outcome with its children into a single [`Value`] so it
/// can travel through [`crate::stream::switch_latest`]/[`crate::stream::combine_latest`],
/// the same device [`outcome_to_value`]/[`value_to_outcome`] use for a lone
/// outcome.
fn wrap_traced(outcome: PolicyOutcome, children: Vec<PolicyOutcome>) -> Value {
	Value::object_literal(vec![
		("outcome".into(), outcome_to_value(&outcome)),
		("children".into(), Value::array_literal(children.iter().map(outcome_to_value).collect())),
	])
}

fn unwrap_traced(v: &Value) -> (PolicyOutcome, Vec<PolicyOutcome>) {
	let obj = v.as_object();
	let outcome = obj.and_then(|o| o.get("outcome")).map(value_to_outcome).unwrap_or_else(|| PolicyOutcome::indeterminate(""));
	let children = obj
		.and_then(|o| o.get("children"))
		.and_then(|v| v.as_array())
		.map(|a| a.iter().map(value_to_outcome).collect())
		.unwrap_or_default();
	(outcome, children)
}
