use crate::ast::Node;
use crate::combining::CombiningAlgorithm;
use crate::value::Value;

/// The entitlement a policy declares at its head; a policy set has none of
/// its own (§3: "for policy sets `entitlement` is absent").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Entitlement {
	Permit,
	Deny,
}

impl Entitlement {
	pub fn decision(&self) -> crate::decision::Decision {
		match self {
			Entitlement::Permit => crate::decision::Decision::Permit,
			Entitlement::Deny => crate::decision::Decision::Deny,
		}
	}
}

/// The schemas a policy enforces against each subscription element (§4.5).
/// Each one is a plain `Value::Object` handed to the compiler directly,
/// rather than an AST node -- schema documents are authored data, not
/// expressions evaluated against a subscription.
#[derive(Clone, Debug, Default)]
pub struct Schemas {
	pub subject: Option<Value>,
	pub action: Option<Value>,
	pub resource: Option<Value>,
	pub environment: Option<Value>,
}

impl Schemas {
	pub fn is_empty(&self) -> bool {
		self.subject.is_none() && self.action.is_none() && self.resource.is_none() && self.environment.is_none()
	}
}

/// One statement of a policy's `where` body (§4.5): a variable binding that
/// extends the evaluation context for every statement after it, or a
/// boolean condition that must hold for the body to continue.
#[derive(Clone, Debug)]
pub enum BodyStatement {
	Var { name: String, value: Node },
	Condition(Node),
}

/// A single policy document, as handed to [`super::compile_policy`].
#[derive(Clone, Debug)]
pub struct PolicyNode {
	pub name: String,
	pub entitlement: Entitlement,
	pub target: Option<Node>,
	pub schemas: Schemas,
	pub body: Vec<BodyStatement>,
	pub obligations: Vec<Node>,
	pub advice: Vec<Node>,
	pub transformation: Option<Node>,
}

/// A policy set: a target, an ordered list of set-level variable bindings,
/// a combining algorithm, and the policies it governs. Sets are not
/// recursively nestable in this model -- a set's children are always plain
/// policies, matching the one-level-deep `totalPolicies`/`policies` shape
/// of §4.6's document trace.
#[derive(Clone, Debug)]
pub struct PolicySetNode {
	pub name: String,
	pub algorithm: CombiningAlgorithm,
	pub target: Option<Node>,
	pub variables: Vec<(String, Node)>,
	pub policies: Vec<PolicyNode>,
}

/// A top-level document a policy retrieval point hands back (§6): either a
/// standalone policy or a policy set.
#[derive(Clone, Debug)]
pub enum DocumentNode {
	Policy(PolicyNode),
	Set(PolicySetNode),
}
