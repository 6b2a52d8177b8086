use super::attribute::compile_attribute;
use super::expr::{combine_n, CompiledExpression};
use super::filter::compile_filter;
use super::logical::compile_logical;
use super::{operators, steps};
use crate::ast::{BinaryOperator, Node, StepKind, SubscriptionElement};
use crate::ctx::{CompilationContext, EvaluationContext};
use crate::err::CompileError;
use crate::value::Value;
use reblessive::tree::Stk;
use std::sync::Arc;

/// Compiles a single AST node from scratch, driving the [`Stk`] recursion
/// stack itself. The entry point hosts use; [`compile`] is for recursive
/// calls already inside a `Stk` frame.
pub fn compile_standalone(node: &Node, cctx: &CompilationContext) -> Result<CompiledExpression, CompileError> {
	let mut stack = reblessive::TreeStack::new();
	futures::executor::block_on(stack.enter(|stk| compile(stk, node, cctx)).finish())
}

/// Bottom-up compilation per §4.2: leaves fold to `Constant`, an operator
/// with only `Constant`/`Pure` inputs folds to `Constant`/`Pure`, and any
/// `Stream` input propagates `Stream`.
pub async fn compile(stk: &mut Stk, node: &Node, cctx: &CompilationContext) -> Result<CompiledExpression, CompileError> {
	match node {
		Node::Literal(value) => Ok(CompiledExpression::Constant(value.clone())),
		Node::Undefined => Ok(CompiledExpression::Constant(Value::undefined())),

		Node::Variable(name) => Ok(compile_named_lookup(name.clone(), true)),
		// `@`/`#` are bound by the enclosing filter step on each element, not
		// by the subscription, so a predicate referencing only them must stay
		// foldable when its base is a `Constant` (§8 scenario 7).
		Node::RelativeValue => Ok(compile_named_lookup("@".to_string(), false)),
		Node::RelativeIndex => Ok(compile_named_lookup("#".to_string(), false)),

		Node::SubscriptionElement(element) => {
			let element = *element;
			Ok(CompiledExpression::Pure(
				Arc::new(move |ctx: &EvaluationContext| {
					let subscription = ctx.subscription();
					match element {
						SubscriptionElement::Subject => subscription.subject.clone(),
						SubscriptionElement::Action => subscription.action.clone(),
						SubscriptionElement::Resource => subscription.resource.clone(),
						SubscriptionElement::Environment => subscription.environment.clone(),
					}
				}),
				true,
			))
		}

		Node::ArrayLiteral(items) => {
			let mut compiled = Vec::with_capacity(items.len());
			for item in items {
				compiled.push(stk.run(|stk| compile(stk, item, cctx)).await?);
			}
			Ok(combine_n(compiled, |values| Value::array_literal(values.to_vec())))
		}

		Node::ObjectLiteral(fields) => {
			let keys: Arc<Vec<String>> = Arc::new(fields.iter().map(|(k, _)| k.clone()).collect());
			let mut compiled = Vec::with_capacity(fields.len());
			for (_, value_node) in fields {
				compiled.push(stk.run(|stk| compile(stk, value_node, cctx)).await?);
			}
			Ok(combine_n(compiled, move |values| {
				let pairs = keys.iter().cloned().zip(values.iter().cloned()).collect();
				Value::object_literal(pairs)
			}))
		}

		Node::UnaryOp { op, operand } => {
			let compiled_operand = stk.run(|stk| compile(stk, operand, cctx)).await?;
			let op = *op;
			Ok(combine_n(vec![compiled_operand], move |values| operators::eval_unary(op, &values[0])))
		}

		Node::BinaryOp { op, left, right } => {
			let compiled_left = stk.run(|stk| compile(stk, left, cctx)).await?;
			if matches!(op, BinaryOperator::And | BinaryOperator::Or) {
				let compiled_right = stk.run(|stk| compile(stk, right, cctx)).await?;
				return Ok(compile_logical(*op, compiled_left, compiled_right));
			}
			let compiled_right = stk.run(|stk| compile(stk, right, cctx)).await?;
			let op = *op;
			Ok(combine_n(vec![compiled_left, compiled_right], move |values| {
				operators::eval_binary(op, &values[0], &values[1])
			}))
		}

		Node::StepAccess { base, step } => {
			let compiled_base = stk.run(|stk| compile(stk, base, cctx)).await?;
			compile_step(stk, compiled_base, step, cctx).await
		}

		Node::FilterExpression { base, condition } => {
			let compiled_base = stk.run(|stk| compile(stk, base, cctx)).await?;
			let predicate_node: &Node = match condition.as_ref() {
				Node::Condition(inner) => inner.as_ref(),
				other => other,
			};
			let compiled_predicate = stk.run(|stk| compile(stk, predicate_node, cctx)).await?;
			Ok(compile_filter(compiled_base, compiled_predicate))
		}

		Node::Condition(inner) => stk.run(|stk| compile(stk, inner, cctx)).await,

		Node::FunctionCall { name, args } => {
			let descriptor = cctx
				.function_broker()
				.resolve(name)
				.ok_or_else(|| CompileError::UnresolvableFunction { name: name.clone(), location: None })?;
			if !descriptor.parameter_arity.accepts(args.len()) {
				let expected = match descriptor.parameter_arity {
					crate::broker::Arity::Exact(n) => n,
					crate::broker::Arity::AtLeast(n) => n,
					crate::broker::Arity::Any => args.len(),
				};
				return Err(CompileError::ArityMismatch {
					name: name.clone(),
					expected,
					found: args.len(),
					location: None,
				});
			}
			let mut compiled_args = Vec::with_capacity(args.len());
			for arg in args {
				compiled_args.push(stk.run(|stk| compile(stk, arg, cctx)).await?);
			}
			Ok(combine_n(compiled_args, move |values| descriptor.invoke(values)))
		}

		Node::AttributeAccess { name, entity, args, options, head } => {
			compile_attribute(stk, name, entity.as_deref(), args, options.as_deref(), *head, cctx).await
		}
	}
}

/// `depends_on_subscription` distinguishes a real subscription/variable
/// lookup (`true`) from a relative filter binding (`@`/`#`, `false`): both
/// are resolved the same way at evaluation time via `ctx.variable`, but only
/// the former should defeat constant-folding in callers like
/// [`super::filter::compile_filter`].
fn compile_named_lookup(name: String, depends_on_subscription: bool) -> CompiledExpression {
	CompiledExpression::Pure(
		Arc::new(move |ctx: &EvaluationContext| ctx.variable(&name).cloned().unwrap_or_else(Value::undefined)),
		depends_on_subscription,
	)
}

async fn compile_step(
	stk: &mut Stk,
	base: CompiledExpression,
	step: &StepKind,
	cctx: &CompilationContext,
) -> Result<CompiledExpression, CompileError> {
	match step {
		StepKind::Key(key) => {
			let key = key.clone();
			Ok(combine_n(vec![base], move |values| steps::key_access(&values[0], &key)))
		}
		StepKind::Wildcard => Ok(combine_n(vec![base], |values| steps::wildcard(&values[0]))),
		StepKind::Index(index_node) => {
			let compiled_index = stk.run(|stk| compile(stk, index_node, cctx)).await?;
			Ok(combine_n(vec![base, compiled_index], |values| {
				to_index(&values[1]).map(|i| steps::index_access(&values[0], i)).unwrap_or_else(|| {
					Value::Error(
						"index must be a number".into(),
						crate::value::Metadata::merge([values[0].metadata(), values[1].metadata()]),
					)
				})
			}))
		}
		StepKind::RecursiveKey(key) => {
			let key = key.clone();
			Ok(combine_n(vec![base], move |values| steps::recursive_key(&values[0], &key)))
		}
		StepKind::RecursiveIndex(index_node) => {
			let compiled_index = stk.run(|stk| compile(stk, index_node, cctx)).await?;
			Ok(combine_n(vec![base, compiled_index], |values| {
				to_index(&values[1]).map(|i| steps::recursive_index(&values[0], i)).unwrap_or_else(|| {
					Value::Error(
						"index must be a number".into(),
						crate::value::Metadata::merge([values[0].metadata(), values[1].metadata()]),
					)
				})
			}))
		}
		StepKind::Union(selector_nodes) => {
			let mut inputs = Vec::with_capacity(1 + selector_nodes.len());
			inputs.push(base);
			for selector in selector_nodes {
				inputs.push(stk.run(|stk| compile(stk, selector, cctx)).await?);
			}
			Ok(combine_n(inputs, |values| {
				let (base, selectors) = values.split_first().expect("base always present");
				if base.as_array().is_some() {
					steps::union_array(base, selectors)
				} else {
					steps::union_object(base, selectors)
				}
			}))
		}
		StepKind::Slice { start, end, step } => {
			let compiled_start = compile_optional_bound(stk, start.as_deref(), cctx).await?;
			let compiled_end = compile_optional_bound(stk, end.as_deref(), cctx).await?;
			let compiled_step = compile_optional_bound(stk, step.as_deref(), cctx).await?;
			Ok(combine_n(vec![base, compiled_start, compiled_end, compiled_step], |values| {
				steps::slice(&values[0], to_index(&values[1]), to_index(&values[2]), to_index(&values[3]))
			}))
		}
	}
}

async fn compile_optional_bound(
	stk: &mut Stk,
	node: Option<&Node>,
	cctx: &CompilationContext,
) -> Result<CompiledExpression, CompileError> {
	match node {
		Some(node) => stk.run(|stk| compile(stk, node, cctx)).await,
		None => Ok(CompiledExpression::Constant(Value::undefined())),
	}
}

fn to_index(value: &Value) -> Option<i64> {
	value.as_number().and_then(|n| n.to_i64_truncated())
}
