use super::operator::{BinaryOperator, UnaryOperator};
use crate::value::Value;

/// Which element of the authorization subscription a `SubscriptionElement`
/// node dereferences (§3.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SubscriptionElement {
	Subject,
	Action,
	Resource,
	Environment,
}

/// A step applied to a base expression, per the "Step semantics" of §4.2.
///
/// Models the spec's generic `StepAccess{kind, args}` AST node kind as an
/// idiomatic Rust enum: the variant itself carries whatever arguments that
/// step needs, rather than a separate `kind` tag plus an untyped `args`
/// list.
#[derive(Clone, Debug)]
pub enum StepKind {
	/// `.key`
	Key(String),
	/// `[index]`, where the index is itself an expression.
	Index(Box<Node>),
	/// `[i:j:k]`, Python slice semantics; any bound may be omitted.
	Slice {
		start: Option<Box<Node>>,
		end: Option<Box<Node>>,
		step: Option<Box<Node>>,
	},
	/// `.*` / `[*]`
	Wildcard,
	/// `[a, b, ...]` — integer selectors against arrays, text keys against
	/// objects.
	Union(Vec<Node>),
	/// `..key` — recursive descent collecting every `key` match.
	RecursiveKey(String),
	/// `..[i]` — recursive descent collecting every element at index `i` of
	/// any nested array.
	RecursiveIndex(Box<Node>),
}

/// A parsed DSL expression tree, as handed to the compiler across the AST
/// boundary of §6. Every node kind enumerated there is represented:
/// `Literal`, `Variable`, `SubscriptionElement`, `ArrayLiteral`,
/// `ObjectLiteral`, `BinaryOp`, `UnaryOp`, `StepAccess`, `FunctionCall`,
/// `AttributeAccess`, `FilterExpression`, `Condition`, `RelativeValue@`,
/// `RelativeIndex#`, `Undefined`.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Node {
	Literal(Value),
	Undefined,
	Variable(String),
	SubscriptionElement(SubscriptionElement),
	ArrayLiteral(Vec<Node>),
	ObjectLiteral(Vec<(String, Node)>),
	BinaryOp {
		op: BinaryOperator,
		left: Box<Node>,
		right: Box<Node>,
	},
	UnaryOp {
		op: UnaryOperator,
		operand: Box<Node>,
	},
	StepAccess {
		base: Box<Node>,
		step: StepKind,
	},
	FunctionCall {
		name: String,
		args: Vec<Node>,
	},
	AttributeAccess {
		name: String,
		entity: Option<Box<Node>>,
		args: Vec<Node>,
		options: Option<Box<Node>>,
		head: bool,
	},
	/// `base[?(condition)]`. `condition` is expected to be a [`Node::Condition`],
	/// establishing the `@`/`#` scope the predicate evaluates in.
	FilterExpression {
		base: Box<Node>,
		condition: Box<Node>,
	},
	/// Wraps the predicate of a `FilterExpression`, marking the scope
	/// boundary at which `@` and `#` are (re)bound; nested conditions shadow
	/// the outer binding per §4.2.
	Condition(Box<Node>),
	/// `@` — the current element inside the nearest enclosing condition.
	RelativeValue,
	/// `#` — the current index/key inside the nearest enclosing condition.
	RelativeIndex,
}
