use crate::decision::Decision;
use crate::value::Value;

/// One policy's fully-evaluated contribution to a combining algorithm (§4.4):
/// its own verdict plus whatever obligations, advice, and transformed
/// resource it declared. Order matters -- `first-applicable` and the
/// "first deny's resource" tie-break both depend on the order outcomes were
/// produced in, which is the order the policies appear in the document.
#[derive(Clone, Debug)]
pub struct PolicyOutcome {
	pub name: String,
	pub decision: Decision,
	pub obligations: Vec<Value>,
	pub advice: Vec<Value>,
	pub resource: Option<Value>,
}

impl PolicyOutcome {
	pub fn not_applicable(name: impl Into<String>) -> Self {
		PolicyOutcome { name: name.into(), decision: Decision::NotApplicable, obligations: Vec::new(), advice: Vec::new(), resource: None }
	}

	pub fn indeterminate(name: impl Into<String>) -> Self {
		PolicyOutcome { name: name.into(), decision: Decision::Indeterminate, obligations: Vec::new(), advice: Vec::new(), resource: None }
	}
}
