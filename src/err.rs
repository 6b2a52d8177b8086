//! Engine-internal error types.
//!
//! These are distinct from [`crate::Value::Error`], which is a first-class
//! DSL value that flows *through* expressions. The types here are raised at
//! compile time (a document that cannot be loaded at all) or at the
//! host/broker boundary (a failure that has no sensible representation as a
//! DSL value).

use std::fmt;

/// A byte-offset span into the original document source, when the AST node
/// that triggered a [`CompileError`] happened to carry one. Parsing is out of
/// scope for this crate, so most AST boundaries supplied by a host will leave
/// this `None`; compilation proceeds regardless.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SourceSpan {
	pub start: usize,
	pub end: usize,
}

impl fmt::Display for SourceSpan {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}..{}", self.start, self.end)
	}
}

/// A structural violation discovered while compiling a policy or policy set.
///
/// Any `CompileError` aborts compilation of the whole document: a document
/// that fails to compile is never partially loaded.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompileError {
	#[error("target expression is always false{}", at(.0))]
	TargetAlwaysFalse(Option<SourceSpan>),

	#[error("target expression never evaluates to a boolean{}", at(.0))]
	TargetAlwaysNonBoolean(Option<SourceSpan>),

	#[error("target expression always evaluates to an error{}", at(.0))]
	TargetAlwaysError(Option<SourceSpan>),

	#[error("policy set target expression is always false{}", at(.0))]
	SetTargetAlwaysFalse(Option<SourceSpan>),

	#[error("policy set variable binding always evaluates to an error{}", at(.location))]
	SetVariableAlwaysError { name: String, location: Option<SourceSpan> },

	#[error("duplicate variable `{name}` in policy body{}", at(.location))]
	DuplicateVariableInBody { name: String, location: Option<SourceSpan> },

	#[error("duplicate variable `{name}` in enclosing policy set{}", at(.location))]
	DuplicateVariableInSet { name: String, location: Option<SourceSpan> },

	#[error("body statement never evaluates to a boolean{}", at(.0))]
	BodyStatementNonBoolean(Option<SourceSpan>),

	#[error("obligation expression always evaluates to an error{}", at(.0))]
	ObligationAlwaysError(Option<SourceSpan>),

	#[error("advice expression always evaluates to an error{}", at(.0))]
	AdviceAlwaysError(Option<SourceSpan>),

	#[error("transformation expression always evaluates to an error{}", at(.0))]
	TransformAlwaysError(Option<SourceSpan>),

	#[error("schema value does not evaluate to an object{}", at(.0))]
	SchemaNotAnObject(Option<SourceSpan>),

	#[error("malformed regular expression `{pattern}`: {message}{}", at(.location))]
	InvalidRegex { pattern: String, message: String, location: Option<SourceSpan> },

	#[error("attribute finder applied to an expression that is always undefined{}", at(.0))]
	AttributeOnUndefined(Option<SourceSpan>),

	#[error("unresolvable function `{name}`{}", at(.location))]
	UnresolvableFunction { name: String, location: Option<SourceSpan> },

	#[error("`{name}` expects {expected} argument(s), found {found}{}", at(.location))]
	ArityMismatch { name: String, expected: usize, found: usize, location: Option<SourceSpan> },
}

fn at(span: &Option<SourceSpan>) -> String {
	match span {
		Some(s) => format!(" (at {s})"),
		None => String::new(),
	}
}

/// A failure at the host/broker boundary that cannot be represented as a DSL
/// [`crate::Value`] because it reflects a contract violation rather than an
/// evaluation outcome (e.g. the host queried a broker that was never wired
/// up, or attribute options were malformed at the API boundary rather than
/// in DSL source).
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
	#[error("no function broker configured for compilation context")]
	NoFunctionBroker,

	#[error("no attribute broker configured for compilation context")]
	NoAttributeBroker,

	#[error("attribute option `{field}` must be {expected}")]
	InvalidAttributeOption { field: &'static str, expected: &'static str },

	#[error("evaluation subscription was cancelled")]
	Cancelled,
}
