use super::dispatch::compile_standalone;
use super::expr::CompiledExpression;
use crate::ast::Node;
use crate::ctx::CompilationContext;
use crate::err::CompileError;

/// Distinguishes a policy's target from an enclosing policy set's target,
/// since a provably-bad target produces a different [`CompileError`] variant
/// for each (§4.5).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TargetKind {
	Policy,
	Set,
}

/// Compiles a target expression, applying §4.2/§4.5's target-specific rule:
/// a target that folds to `Constant` must be a boolean `true`; `false`, an
/// error, or any other kind is a compile-time error rather than the ordinary
/// `Constant(Error)` an expression would otherwise fold to. Targets that
/// don't fold to `Constant` (they reference the subscription, which they
/// always do in practice) are accepted -- provability is a compile-time-only
/// property.
pub fn compile_target(node: &Node, cctx: &CompilationContext, kind: TargetKind) -> Result<CompiledExpression, CompileError> {
	let compiled = compile_standalone(node, cctx)?;
	if let Some(value) = compiled.constant_value() {
		if value.is_error() {
			return Err(match kind {
				TargetKind::Policy => CompileError::TargetAlwaysError(None),
				TargetKind::Set => CompileError::TargetAlwaysError(None),
			});
		}
		match value.as_boolean() {
			Some(true) => {}
			Some(false) => {
				return Err(match kind {
					TargetKind::Policy => CompileError::TargetAlwaysFalse(None),
					TargetKind::Set => CompileError::SetTargetAlwaysFalse(None),
				});
			}
			None => return Err(CompileError::TargetAlwaysNonBoolean(None)),
		}
	}
	Ok(compiled)
}
