use super::ast::BodyStatement;
use super::support::{empty_eval_context, first_value};
use crate::compiler::CompiledExpression;
use crate::ctx::{CompilationContext, EvaluationContext};
use crate::err::CompileError;
use crate::value::Value;
use reblessive::tree::Stk;
use std::sync::Arc;

/// One compiled body statement: a variable binding that extends the
/// evaluation context for everything after it, or a boolean assertion.
#[derive(Clone)]
enum BodyOp {
	Bind(String, CompiledExpression),
	Assert(CompiledExpression),
}

/// Compiles a policy's `where` body (§4.5) into a single short-circuiting
/// conjunction expression. `outer_variables` are the names already bound by
/// an enclosing policy set; a body variable reusing one of those names is
/// rejected per §4.5's "duplicate variable in enclosing set" rule, and a
/// name reused within the body itself is "duplicate variable in body".
pub async fn compile_body(
	stk: &mut Stk,
	statements: &[BodyStatement],
	cctx: &CompilationContext,
	outer_variables: &[String],
) -> Result<CompiledExpression, CompileError> {
	let mut seen = std::collections::HashSet::new();
	let mut ops = Vec::with_capacity(statements.len());
	for statement in statements {
		match statement {
			BodyStatement::Var { name, value } => {
				if outer_variables.iter().any(|v| v == name) {
					return Err(CompileError::DuplicateVariableInSet { name: name.clone(), location: None });
				}
				if !seen.insert(name.clone()) {
					return Err(CompileError::DuplicateVariableInBody { name: name.clone(), location: None });
				}
				let compiled = stk.run(|stk| crate::compiler::compile_node(stk, value, cctx)).await?;
				ops.push(BodyOp::Bind(name.clone(), compiled));
			}
			BodyStatement::Condition(node) => {
				let compiled = stk.run(|stk| crate::compiler::compile_node(stk, node, cctx)).await?;
				if let Some(v) = compiled.constant_value() {
					if !v.is_error() && v.as_boolean().is_none() {
						return Err(CompileError::BodyStatementNonBoolean(None));
					}
				}
				ops.push(BodyOp::Assert(compiled));
			}
		}
	}
	Ok(build_body_expression(ops))
}

fn build_body_expression(ops: Vec<BodyOp>) -> CompiledExpression {
	let is_stream = |op: &BodyOp| matches!(op, BodyOp::Bind(_, e) | BodyOp::Assert(e) if e.is_stream());
	let is_constant = |op: &BodyOp| matches!(op, BodyOp::Bind(_, e) | BodyOp::Assert(e) if matches!(e, CompiledExpression::Constant(_)));

	if ops.iter().all(is_constant) {
		let ctx = empty_eval_context();
		return CompiledExpression::Constant(eval_ops_pure(&ops, &ctx));
	}
	if !ops.iter().any(is_stream) {
		let depends = ops.iter().any(|op| match op {
			BodyOp::Bind(_, e) | BodyOp::Assert(e) => e.depends_on_subscription(),
		});
		let ops = Arc::new(ops);
		return CompiledExpression::Pure(Arc::new(move |ctx: &EvaluationContext| eval_ops_pure(&ops, ctx)), depends);
	}
	let ops = Arc::new(ops);
	CompiledExpression::Stream(Arc::new(move |ctx: &EvaluationContext| {
		let ctx = ctx.clone();
		let ops = ops.clone();
		Box::pin(futures::stream::once(async move { eval_ops_async(&ops, &ctx).await }))
	}))
}

fn eval_ops_pure(ops: &[BodyOp], ctx: &EvaluationContext) -> Value {
	let mut ctx = ctx.clone();
	for op in ops {
		match op {
			BodyOp::Bind(name, expr) => {
				ctx = ctx.with(name.clone(), expr.eval_pure(&ctx));
			}
			BodyOp::Assert(expr) => {
				if let Some(err) = assert_result(expr.eval_pure(&ctx)) {
					return err;
				}
			}
		}
	}
	Value::boolean(true)
}

async fn eval_ops_async(ops: &[BodyOp], ctx: &EvaluationContext) -> Value {
	let mut ctx = ctx.clone();
	for op in ops {
		match op {
			BodyOp::Bind(name, expr) => {
				let v = first_value(expr, &ctx).await;
				ctx = ctx.with(name.clone(), v);
			}
			BodyOp::Assert(expr) => {
				let v = first_value(expr, &ctx).await;
				if let Some(err) = assert_result(v) {
					return err;
				}
			}
		}
	}
	Value::boolean(true)
}

/// `None` means the assertion held and the body should continue; `Some(v)`
/// is the terminal value the whole body resolves to (a short-circuiting
/// `false`, or an error).
fn assert_result(v: Value) -> Option<Value> {
	if v.is_error() {
		return Some(v);
	}
	match v.as_boolean() {
		Some(true) => None,
		Some(false) => Some(v),
		None => Some(Value::Error("Condition must evaluate to boolean".into(), v.metadata().clone())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::{BinaryOperator, Node};
	use crate::broker::{EmptyAttributeBroker, EmptyFunctionBroker};

	fn cctx() -> CompilationContext {
		CompilationContext::new(Arc::new(EmptyFunctionBroker), Arc::new(EmptyAttributeBroker))
	}

	#[tokio::test]
	async fn var_binding_is_visible_to_later_condition() {
		let statements = vec![
			BodyStatement::Var { name: "x".into(), value: Node::Literal(Value::number(5)) },
			BodyStatement::Condition(Node::BinaryOp {
				op: BinaryOperator::MoreThan,
				left: Box::new(Node::Variable("x".into())),
				right: Box::new(Node::Literal(Value::number(1))),
			}),
		];
		let cctx = cctx();
		let mut stack = reblessive::TreeStack::new();
		let compiled = stack.enter(|stk| compile_body(stk, &statements, &cctx, &[])).finish().await.unwrap();
		let ctx = empty_eval_context();
		let result = match &compiled {
			CompiledExpression::Pure(_, _) => compiled.eval_pure(&ctx),
			CompiledExpression::Constant(v) => v.clone(),
			CompiledExpression::Stream(_) => panic!("expected non-stream"),
		};
		assert_eq!(result.as_boolean(), Some(true));
	}

	#[tokio::test]
	async fn duplicate_variable_in_body_is_rejected() {
		let statements = vec![
			BodyStatement::Var { name: "x".into(), value: Node::Literal(Value::number(1)) },
			BodyStatement::Var { name: "x".into(), value: Node::Literal(Value::number(2)) },
		];
		let cctx = cctx();
		let mut stack = reblessive::TreeStack::new();
		let result = stack.enter(|stk| compile_body(stk, &statements, &cctx, &[])).finish().await;
		assert!(matches!(result, Err(CompileError::DuplicateVariableInBody { .. })));
	}

	#[tokio::test]
	async fn reusing_set_variable_name_is_rejected() {
		let statements = vec![BodyStatement::Var { name: "x".into(), value: Node::Literal(Value::number(1)) }];
		let cctx = cctx();
		let set_vars = ["x".to_string()];
		let mut stack = reblessive::TreeStack::new();
		let result = stack.enter(|stk| compile_body(stk, &statements, &cctx, &set_vars)).finish().await;
		assert!(matches!(result, Err(CompileError::DuplicateVariableInSet { .. })));
	}
}
