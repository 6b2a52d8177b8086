use super::expr::{combine_n, CompiledExpression};
use crate::ast::Node;
use crate::broker::AttributeInvocation;
use crate::ctx::{CompilationContext, EvaluationContext};
use crate::err::CompileError;
use crate::value::{AttributeInvocationRecord, AttributeOptions, AttributeTrace, Value};
use futures::stream::{BoxStream, StreamExt};
use reblessive::tree::Stk;
use std::sync::Arc;
use std::time::Duration;

/// Compiles an attribute-finder expression `entity.<name[options]>` or
/// `<name[options]>` (§4.3) into a `Stream`. Entity and arguments are
/// compiled like any other sub-expression; a `Constant(Undefined)` entity is
/// a compile-time error (§4.3, §8), everything else is resolved lazily at
/// evaluation time.
pub async fn compile_attribute(
	stk: &mut Stk,
	name: &str,
	entity: Option<&Node>,
	args: &[Node],
	options: Option<&Node>,
	head: bool,
	cctx: &CompilationContext,
) -> Result<CompiledExpression, CompileError> {
	let compiled_entity = match entity {
		Some(node) => {
			let compiled = stk.run(|stk| super::dispatch::compile(stk, node, cctx)).await?;
			if matches!(compiled.constant_value(), Some(Value::Undefined(_))) {
				return Err(CompileError::AttributeOnUndefined(None));
			}
			Some(compiled)
		}
		None => None,
	};
	let mut compiled_args = Vec::with_capacity(args.len());
	for arg in args {
		compiled_args.push(stk.run(|stk| super::dispatch::compile(stk, arg, cctx)).await?);
	}
	let compiled_options = match options {
		Some(node) => Some(stk.run(|stk| super::dispatch::compile(stk, node, cctx)).await?),
		None => None,
	};

	let name = Arc::new(name.to_string());
	let broker = cctx.attribute_broker().clone();
	let defaults = cctx.default_attribute_options().clone();
	let has_entity = compiled_entity.is_some();

	Ok(CompiledExpression::Stream(Arc::new(move |ctx: &EvaluationContext| {
		let ctx = ctx.clone();
		let name = name.clone();
		let broker = broker.clone();
		let defaults = defaults.clone();
		let compiled_entity = compiled_entity.clone();
		let compiled_args = compiled_args.clone();
		let compiled_options = compiled_options.clone();

		Box::pin(
			futures::stream::once(async move {
				let options_value = match &compiled_options {
					Some(o) => first_value(o, &ctx).await,
					None => Value::undefined(),
				};
				if options_value.is_error() {
					return Box::pin(futures::stream::once(async move { options_value })) as BoxStream<'static, Value>;
				}

				let mut key_inputs = Vec::with_capacity(1 + compiled_args.len());
				if let Some(entity_expr) = &compiled_entity {
					key_inputs.push(entity_expr.clone());
				}
				key_inputs.extend(compiled_args.iter().cloned());

				let key_stream: BoxStream<'static, Value> = if key_inputs.is_empty() {
					Box::pin(futures::stream::once(async { Value::array_literal(Vec::new()) }))
				} else {
					combine_n(key_inputs, |values| Value::array_literal(values.to_vec())).to_stream(&ctx)
				};

				let name = name.clone();
				let broker = broker.clone();
				let defaults = defaults.clone();
				let ctx_for_options = ctx.clone();
				let stream = crate::stream::switch_latest(key_stream, move |key_array| {
					let elements = key_array.as_array().map(|a| a.0.clone()).unwrap_or_default();
					let (entity_value, argument_values) = if has_entity {
						(elements.first().cloned(), elements.get(1..).map(|s| s.to_vec()).unwrap_or_default())
					} else {
						(None, elements.clone())
					};
					let resolved_options = resolve_options(&options_value, &ctx_for_options, &defaults);
					let invocation = AttributeInvocation {
						name: (*name).clone(),
						entity: entity_value.clone(),
						arguments: argument_values.clone(),
						options: resolved_options.clone(),
					};
					let record = AttributeInvocationRecord {
						attribute_name: (*name).clone(),
						entity: entity_value.as_ref().map(|v| format!("{v}")),
						arguments: argument_values.iter().map(|v| format!("{v}")).collect(),
						options: resolved_options,
					};
					let broker = broker.clone();
					Box::pin(
						subscribe_with_retry(broker, invocation)
							.into_stream()
							.flatten()
							.map(move |v| attach_record(v, &record)),
					)
				});

				if head {
					crate::stream::head(stream)
				} else {
					stream
				}
			})
			.flatten(),
		)
	})))
}

async fn first_value(expr: &CompiledExpression, ctx: &EvaluationContext) -> Value {
	match expr {
		CompiledExpression::Constant(v) => v.clone(),
		CompiledExpression::Pure(_, _) => expr.eval_pure(ctx),
		CompiledExpression::Stream(_) => expr.to_stream(ctx).next().await.unwrap_or_else(Value::undefined),
	}
}

fn attach_record(value: Value, record: &AttributeInvocationRecord) -> Value {
	let mut meta = value.metadata().clone();
	if !meta.attribute_trace.0.contains(record) {
		meta.attribute_trace = meta.attribute_trace.union(&AttributeTrace::single(record.clone()));
	}
	value.with_metadata(meta)
}

fn resolve_options(inline: &Value, ctx: &EvaluationContext, defaults: &AttributeOptions) -> AttributeOptions {
	let subscription = ctx
		.variable("SAPL")
		.and_then(|v| v.as_object())
		.and_then(|o| o.get("attributeFinderOptions"))
		.cloned();
	let inline = Some(inline);
	let subscription = subscription.as_ref();
	AttributeOptions {
		initial_timeout_ms: field_i64(inline, "initialTimeOutMs")
			.or_else(|| field_i64(subscription, "initialTimeOutMs"))
			.unwrap_or(defaults.initial_timeout_ms),
		poll_interval_ms: field_i64(inline, "pollIntervalMs")
			.or_else(|| field_i64(subscription, "pollIntervalMs"))
			.unwrap_or(defaults.poll_interval_ms),
		backoff_ms: field_i64(inline, "backoffMs")
			.or_else(|| field_i64(subscription, "backoffMs"))
			.unwrap_or(defaults.backoff_ms),
		retries: field_i64(inline, "retries").or_else(|| field_i64(subscription, "retries")).unwrap_or(defaults.retries),
		fresh: field_bool(inline, "fresh").or_else(|| field_bool(subscription, "fresh")).unwrap_or(defaults.fresh),
	}
}

fn field_i64(obj: Option<&Value>, field: &str) -> Option<i64> {
	obj.and_then(|v| v.as_object()).and_then(|o| o.get(field)).and_then(|v| v.as_number()).and_then(|n| n.to_i64_truncated())
}

fn field_bool(obj: Option<&Value>, field: &str) -> Option<bool> {
	obj.and_then(|v| v.as_object()).and_then(|o| o.get(field)).and_then(|v| v.as_boolean())
}

/// Applies `initialTimeOutMs`, `retries`, and `backoffMs` (§4.3 steps 4-5)
/// around a single broker subscription: if the first emission does not
/// arrive within the timeout, or the broker's first emission is itself an
/// error value, retry with exponentially increasing backoff up to
/// `options.retries` times before giving up.
async fn subscribe_with_retry(
	broker: Arc<dyn crate::broker::AttributeBroker>,
	invocation: AttributeInvocation,
) -> BoxStream<'static, Value> {
	let retries = invocation.options.retries.max(0) as u32;
	let mut backoff_ms = invocation.options.backoff_ms.max(0) as u64;
	let timeout = Duration::from_millis(invocation.options.initial_timeout_ms.max(0) as u64);
	let mut attempt = 0u32;
	loop {
		let mut stream = broker.subscribe(invocation.clone());
		match tokio::time::timeout(timeout, stream.next()).await {
			Ok(Some(value)) if !value.is_error() || attempt >= retries => {
				if value.is_error() {
					warn!(attribute = %invocation.name, attempt, "attribute finder exhausted retries with an error value");
				}
				return Box::pin(futures::stream::once(async move { value }).chain(stream));
			}
			Ok(None) if attempt >= retries => {
				debug!(attribute = %invocation.name, attempt, "attribute finder stream ended with no value after exhausting retries");
				return Box::pin(futures::stream::empty());
			}
			Err(_) if attempt >= retries => {
				warn!(attribute = %invocation.name, attempt, timeout_ms = timeout.as_millis() as u64, "attribute finder timed out after exhausting retries");
				return Box::pin(futures::stream::once(async { Value::error("timeout") }));
			}
			_ => {
				debug!(attribute = %invocation.name, attempt, "attribute finder retrying after timeout or error");
			}
		}
		attempt += 1;
		tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
		backoff_ms = backoff_ms.saturating_mul(2);
	}
}

trait IntoStreamOnce: std::future::Future<Output = BoxStream<'static, Value>> + Sized {
	fn into_stream(self) -> futures::stream::Once<Self> {
		futures::stream::once(self)
	}
}

impl<F: std::future::Future<Output = BoxStream<'static, Value>>> IntoStreamOnce for F {}
