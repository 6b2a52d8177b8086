//! The PDP orchestration loop (§2.1/§6): wires a [`ConfigurationSource`] and
//! the [`PolicyRetrievalPoint`] it names together, recompiling and
//! re-evaluating the matching document set whenever either changes, and
//! emits a [`TracedDecision`] for every resulting change.

use crate::broker::{AttributeBroker, FunctionBroker};
use crate::combining::{self, CombiningAlgorithm, PolicyOutcome};
use crate::ctx::{CompilationContext, EvaluationContext, Subscription};
use crate::policy::{self, compile_document_standalone, evaluate_policy, evaluate_policy_set_traced, CompiledDocument, DocumentNode, Entitlement};
use crate::trace::{self, DocumentTrace, RetrievalError, TracedDecision};
use crate::value::Value;
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::instrument;

/// What a policy retrieval point hands back on success (§6).
#[derive(Clone, Debug)]
pub struct MatchingDocuments {
	pub documents: Vec<DocumentNode>,
	pub total: usize,
}

/// One emission of a [`PolicyRetrievalPoint`] subscription.
#[derive(Clone, Debug)]
pub enum RetrievalOutcome {
	Matching(MatchingDocuments),
	Error(RetrievalError),
}

/// Resolves the documents applicable to a subscription and re-emits
/// whenever that set changes (§6). Implementations own whatever storage or
/// network lookup backs policy retrieval; the core only ever consumes the
/// resulting stream.
pub trait PolicyRetrievalPoint: Send + Sync {
	fn matching_documents(&self, subscription: &Subscription) -> BoxStream<'static, RetrievalOutcome>;
}

/// One fully resolved PDP configuration (§6): the combining algorithm used
/// to aggregate retrieved documents, PDP-wide variables, the two brokers,
/// and the retrieval point documents are pulled from.
#[derive(Clone)]
pub struct CompiledPDPConfiguration {
	pub pdp_id: String,
	pub configuration_id: String,
	pub algorithm: CombiningAlgorithm,
	pub variables: Vec<(String, Value)>,
	pub function_broker: Arc<dyn FunctionBroker>,
	pub attribute_broker: Arc<dyn AttributeBroker>,
	pub retrieval_point: Arc<dyn PolicyRetrievalPoint>,
}

/// Supplies a PDP's configuration and re-emits whenever it changes (§6); a
/// `None` emission means the PDP is (temporarily or permanently)
/// unconfigured.
pub trait ConfigurationSource: Send + Sync {
	fn pdp_configurations(&self, pdp_id: &str) -> BoxStream<'static, Option<CompiledPDPConfiguration>>;
}

/// Runs the PDP loop for one subscription (§2.1/§6). Re-subscribes to the
/// configuration source's current configuration's retrieval point, and
/// recompiles/re-evaluates the matching documents on every change of
/// either, emitting a fresh [`TracedDecision`] each time. Dropping the
/// returned stream propagates cancellation through every layer: the
/// retrieval subscription, every document's evaluation, and in turn every
/// attribute subscription a document depends on (§5).
pub fn decide(
	source: Arc<dyn ConfigurationSource>,
	pdp_id: impl Into<String>,
	subscription_id: impl Into<String>,
	subscription: Subscription,
) -> BoxStream<'static, TracedDecision> {
	let pdp_id = pdp_id.into();
	let subscription_id = subscription_id.into();
	let config_stream = source.pdp_configurations(&pdp_id);

	switch_stream(config_stream, move |config| {
		let subscription = subscription.clone();
		let pdp_id = pdp_id.clone();
		let subscription_id = subscription_id.clone();
		let config = match config {
			Some(config) => config,
			None => {
				warn!(pdp_id, "no PDP configuration available");
				let trace = TracedDecision::retrieval_failure(
					pdp_id,
					"",
					subscription_id,
					subscription,
					chrono::Utc::now(),
					CombiningAlgorithm::DenyOverrides,
					vec![RetrievalError { name: "configuration".into(), message: "no PDP configuration available".into() }],
				);
				return Box::pin(futures::stream::once(async move { trace })) as BoxStream<'static, TracedDecision>;
			}
		};
		let retrieval_stream = config.retrieval_point.matching_documents(&subscription);
		let config = Arc::new(config);
		Box::pin(switch_stream(retrieval_stream, move |outcome| {
			decide_for_retrieval(config.clone(), pdp_id.clone(), subscription_id.clone(), subscription.clone(), outcome)
		}))
	})
}

#[instrument(skip(config, subscription, outcome), fields(pdp_id = %pdp_id, configuration_id = %config.configuration_id))]
fn decide_for_retrieval(
	config: Arc<CompiledPDPConfiguration>,
	pdp_id: String,
	subscription_id: String,
	subscription: Subscription,
	outcome: RetrievalOutcome,
) -> BoxStream<'static, TracedDecision> {
	let matching = match outcome {
		RetrievalOutcome::Error(err) => {
			warn!(error = %err.message, "policy retrieval failed");
			let trace = TracedDecision::retrieval_failure(
				pdp_id,
				config.configuration_id.clone(),
				subscription_id,
				subscription,
				chrono::Utc::now(),
				config.algorithm,
				vec![err],
			);
			return Box::pin(futures::stream::once(async move { trace }));
		}
		RetrievalOutcome::Matching(m) => m,
	};

	let cctx = CompilationContext::new(config.function_broker.clone(), config.attribute_broker.clone());
	let mut compiled = Vec::with_capacity(matching.documents.len());
	for document in matching.documents {
		let name = document_name(&document);
		match compile_document_standalone(&document, &cctx) {
			Ok(c) => compiled.push(c),
			Err(err) => warn!(document = name, "dropping document from evaluation: {err}"),
		}
	}

	let mut ctx = EvaluationContext::new(
		pdp_id.clone(),
		config.configuration_id.clone(),
		subscription_id.clone(),
		subscription.clone(),
		config.function_broker.clone(),
		config.attribute_broker.clone(),
	);
	for (name, value) in &config.variables {
		ctx = ctx.with(name.clone(), value.clone());
	}

	if compiled.is_empty() {
		let decision = combining::combine(config.algorithm, &[]);
		let trace =
			TracedDecision::new(pdp_id, config.configuration_id.clone(), subscription_id, subscription, chrono::Utc::now(), config.algorithm, Vec::new(), decision);
		return Box::pin(futures::stream::once(async move { trace }));
	}

	let algorithm = config.algorithm;
	let streams: Vec<BoxStream<'static, Value>> =
		compiled.into_iter().map(|d| Box::pin(evaluate_document_traced(d, ctx.clone()).map(|pair| wrap_pair(&pair))) as BoxStream<'static, Value>).collect();

	Box::pin(crate::stream::combine_latest(streams).map(move |values| {
		let pairs: Vec<(PolicyOutcome, DocumentTrace)> = values.iter().map(unwrap_pair).collect();
		let outcomes: Vec<PolicyOutcome> = pairs.iter().map(|(o, _)| o.clone()).collect();
		let traces: Vec<DocumentTrace> = pairs.into_iter().map(|(_, t)| t).collect();
		let decision = combining::combine(algorithm, &outcomes);
		if decision.decision == crate::decision::Decision::Indeterminate {
			debug!(pdp_id = %pdp_id, "combining algorithm `{}` produced an indeterminate decision", algorithm.name());
		}
		TracedDecision::new(pdp_id.clone(), config.configuration_id.clone(), subscription_id.clone(), subscription.clone(), chrono::Utc::now(), algorithm, traces, decision)
	}))
}

/// Evaluates one compiled document alongside the [`DocumentTrace`] it
/// produces. A set's children carry their own entitlement, looked up by
/// name from the compiled set before it is moved into evaluation.
fn evaluate_document_traced(document: CompiledDocument, ctx: EvaluationContext) -> BoxStream<'static, (PolicyOutcome, DocumentTrace)> {
	match document {
		CompiledDocument::Policy(p) => {
			let name = p.name.clone();
			let entitlement = p.entitlement;
			Box::pin(evaluate_policy(p, ctx).map(move |outcome| {
				let trace = DocumentTrace::for_policy(name.clone(), entitlement, &outcome);
				(outcome, trace)
			}))
		}
		CompiledDocument::Set(s) => {
			let name = s.name.clone();
			let entitlements: HashMap<String, Entitlement> = s.policies.iter().map(|p| (p.name.clone(), p.entitlement)).collect();
			Box::pin(evaluate_policy_set_traced(s, ctx).map(move |(outcome, children)| {
				let child_traces = children
					.iter()
					.map(|c| {
						let entitlement = entitlements.get(&c.name).copied().unwrap_or(Entitlement::Deny);
						DocumentTrace::for_policy(c.name.clone(), entitlement, c)
					})
					.collect();
				let trace = DocumentTrace::for_set(name.clone(), &outcome, child_traces);
				(outcome, trace)
			}))
		}
	}
}

fn wrap_pair(pair: &(PolicyOutcome, DocumentTrace)) -> Value {
	Value::object_literal(vec![("outcome".into(), policy::outcome_to_value(&pair.0)), ("trace".into(), trace::document_trace_to_value(&pair.1))])
}

fn unwrap_pair(v: &Value) -> (PolicyOutcome, DocumentTrace) {
	let obj = v.as_object();
	let outcome = obj.and_then(|o| o.get("outcome")).map(policy::value_to_outcome).unwrap_or_else(|| PolicyOutcome::indeterminate(""));
	let trace = obj
		.and_then(|o| o.get("trace"))
		.map(trace::value_to_document_trace)
		.unwrap_or_else(|| DocumentTrace::for_policy("", Entitlement::Deny, &PolicyOutcome::indeterminate("")));
	(outcome, trace)
}

fn document_name(document: &DocumentNode) -> &str {
	match document {
		DocumentNode::Policy(p) => &p.name,
		DocumentNode::Set(s) => &s.name,
	}
}

type InnerHandle<O> = (JoinHandle<()>, async_channel::Receiver<O>);
type InnerFactory<T, O> = Arc<dyn Fn(T) -> BoxStream<'static, O> + Send + Sync>;

/// The same switch-on-entity device as [`crate::stream::switch_latest`],
/// generalized beyond `Value` for the PDP loop's own configuration- and
/// retrieval-gated re-subscription, which has no natural `Value`
/// representation to round-trip through.
fn switch_stream<T, O, F>(entity: BoxStream<'static, T>, make_inner: F) -> BoxStream<'static, O>
where
	T: Send + 'static,
	O: Send + 'static,
	F: Fn(T) -> BoxStream<'static, O> + Send + Sync + 'static,
{
	let make_inner: InnerFactory<T, O> = Arc::new(make_inner);
	Box::pin(futures::stream::unfold((entity, None::<InnerHandle<O>>, make_inner), move |(mut entity, mut current, make_inner)| async move {
		loop {
			if current.is_none() {
				let value = entity.next().await?;
				current = Some(spawn_inner(value, &make_inner));
			}
			let (handle, rx) = current.take().expect("just ensured current is Some");
			tokio::select! {
				biased;
				next_entity = entity.next() => {
					handle.abort();
					match next_entity {
						Some(value) => {
							current = Some(spawn_inner(value, &make_inner));
						}
						None => return None,
					}
				}
				item = rx.recv() => {
					match item {
						Ok(value) => {
							current = Some((handle, rx));
							return Some((value, (entity, current, make_inner)));
						}
						Err(_) => {
							current = None;
						}
					}
				}
			}
		}
	}))
}

fn spawn_inner<T, O>(entity_value: T, make_inner: &InnerFactory<T, O>) -> InnerHandle<O>
where
	T: Send + 'static,
	O: Send + 'static,
{
	let (tx, rx) = async_channel::unbounded();
	let mut inner = make_inner(entity_value);
	let handle = tokio::spawn(async move {
		while let Some(value) = inner.next().await {
			if tx.send(value).await.is_err() {
				break;
			}
		}
	});
	(handle, rx)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::broker::{EmptyAttributeBroker, EmptyFunctionBroker};
	use crate::policy::{BodyStatement, PolicyNode, Schemas};
	use futures::stream::StreamExt;

	struct StaticRetrieval(Vec<DocumentNode>);

	impl PolicyRetrievalPoint for StaticRetrieval {
		fn matching_documents(&self, _subscription: &Subscription) -> BoxStream<'static, RetrievalOutcome> {
			let total = self.0.len();
			let documents = self.0.clone();
			Box::pin(futures::stream::once(async move { RetrievalOutcome::Matching(MatchingDocuments { documents, total }) }))
		}
	}

	struct FailingRetrieval;

	impl PolicyRetrievalPoint for FailingRetrieval {
		fn matching_documents(&self, _subscription: &Subscription) -> BoxStream<'static, RetrievalOutcome> {
			Box::pin(futures::stream::once(async move {
				RetrievalOutcome::Error(RetrievalError { name: "pip".into(), message: "unreachable".into() })
			}))
		}
	}

	struct StaticConfiguration(CompiledPDPConfiguration);

	impl ConfigurationSource for StaticConfiguration {
		fn pdp_configurations(&self, _pdp_id: &str) -> BoxStream<'static, Option<CompiledPDPConfiguration>> {
			Box::pin(futures::stream::once({
				let config = self.0.clone();
				async move { Some(config) }
			}))
		}
	}

	fn permit_policy(name: &str) -> DocumentNode {
		DocumentNode::Policy(PolicyNode {
			name: name.into(),
			entitlement: Entitlement::Permit,
			target: None,
			schemas: Schemas::default(),
			body: Vec::new(),
			obligations: Vec::new(),
			advice: Vec::new(),
			transformation: None,
		})
	}

	fn bad_policy(name: &str) -> DocumentNode {
		DocumentNode::Policy(PolicyNode {
			name: name.into(),
			entitlement: Entitlement::Permit,
			target: None,
			schemas: Schemas::default(),
			body: vec![BodyStatement::Condition(crate::ast::Node::Literal(Value::number(1)))],
			obligations: Vec::new(),
			advice: Vec::new(),
			transformation: None,
		})
	}

	fn config(retrieval_point: Arc<dyn PolicyRetrievalPoint>) -> CompiledPDPConfiguration {
		CompiledPDPConfiguration {
			pdp_id: "pdp-1".into(),
			configuration_id: "cfg-1".into(),
			algorithm: CombiningAlgorithm::DenyOverrides,
			variables: Vec::new(),
			function_broker: Arc::new(EmptyFunctionBroker),
			attribute_broker: Arc::new(EmptyAttributeBroker),
			retrieval_point,
		}
	}

	#[tokio::test]
	async fn permits_when_retrieved_policy_matches() {
		let retrieval = Arc::new(StaticRetrieval(vec![permit_policy("p1")]));
		let source: Arc<dyn ConfigurationSource> = Arc::new(StaticConfiguration(config(retrieval)));
		let mut decisions = decide(source, "pdp-1", "sub-1", Subscription::default());
		let trace = decisions.next().await.unwrap();
		assert_eq!(trace.decision, crate::decision::Decision::Permit);
		assert_eq!(trace.total_documents(), 1);
	}

	#[tokio::test]
	async fn retrieval_error_yields_indeterminate_with_retrieval_errors() {
		let source: Arc<dyn ConfigurationSource> = Arc::new(StaticConfiguration(config(Arc::new(FailingRetrieval))));
		let mut decisions = decide(source, "pdp-1", "sub-1", Subscription::default());
		let trace = decisions.next().await.unwrap();
		assert_eq!(trace.decision, crate::decision::Decision::Indeterminate);
		assert_eq!(trace.retrieval_errors.len(), 1);
	}

	#[tokio::test]
	async fn no_configuration_yields_indeterminate() {
		struct Unconfigured;
		impl ConfigurationSource for Unconfigured {
			fn pdp_configurations(&self, _pdp_id: &str) -> BoxStream<'static, Option<CompiledPDPConfiguration>> {
				Box::pin(futures::stream::once(async { None }))
			}
		}
		let mut decisions = decide(Arc::new(Unconfigured), "pdp-1", "sub-1", Subscription::default());
		let trace = decisions.next().await.unwrap();
		assert_eq!(trace.decision, crate::decision::Decision::Indeterminate);
	}

	#[tokio::test]
	async fn document_that_fails_to_compile_is_dropped_not_fatal() {
		let retrieval = Arc::new(StaticRetrieval(vec![bad_policy("broken"), permit_policy("p1")]));
		let source: Arc<dyn ConfigurationSource> = Arc::new(StaticConfiguration(config(retrieval)));
		let mut decisions = decide(source, "pdp-1", "sub-1", Subscription::default());
		let trace = decisions.next().await.unwrap();
		assert_eq!(trace.decision, crate::decision::Decision::Permit);
		assert_eq!(trace.total_documents(), 1);
	}
}
