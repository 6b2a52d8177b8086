use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// The attribute options actually applied to one invocation, after the
/// three-level merge of §4.3 (inline > subscription > PDP defaults). Carried
/// verbatim into the [`AttributeInvocationRecord`] so a trace observer can
/// see exactly what timeout/retry/poll/fresh settings were in effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeOptions {
	pub initial_timeout_ms: i64,
	pub poll_interval_ms: i64,
	pub backoff_ms: i64,
	pub retries: i64,
	pub fresh: bool,
}

impl Default for AttributeOptions {
	fn default() -> Self {
		AttributeOptions {
			initial_timeout_ms: 3000,
			poll_interval_ms: 30_000,
			backoff_ms: 1000,
			retries: 3,
			fresh: false,
		}
	}
}

/// One attribute invocation that contributed to the provenance of a value.
///
/// `arguments` and `options` are recorded as plain debug strings rather than
/// full [`crate::Value`]s: a record is metadata *about* a value, not a value
/// itself, and keeping it `Value`-free avoids an awkward recursive
/// metadata-of-metadata shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeInvocationRecord {
	pub attribute_name: String,
	pub entity: Option<String>,
	pub arguments: Vec<String>,
	pub options: AttributeOptions,
}

impl Display for AttributeInvocationRecord {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match &self.entity {
			Some(e) => write!(f, "{e}.<{}>", self.attribute_name),
			None => write!(f, "<{}>", self.attribute_name),
		}
	}
}

/// The union-of-inputs attribute trace carried by every [`crate::Value`].
///
/// Modelled as a deduplicating `Vec` rather than a `HashSet`: invocation
/// records are small and traces rarely grow past a handful of entries, so
/// the O(n) membership check on union keeps the type simple and avoids
/// requiring `Hash` on every field of a record (notably `AttributeOptions`'
/// `fresh: bool` aside, decimal-shaped fields would otherwise need a hash
/// impl with the same equality-vs-hash pitfalls `rust_decimal` itself works
/// around).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeTrace(pub Vec<AttributeInvocationRecord>);

impl AttributeTrace {
	pub fn empty() -> Self {
		AttributeTrace(Vec::new())
	}

	pub fn single(record: AttributeInvocationRecord) -> Self {
		AttributeTrace(vec![record])
	}

	/// Union with another trace, per §4.1: the result trace is exactly the
	/// set of invocations that contributed, with no duplicates.
	pub fn union(&self, other: &AttributeTrace) -> AttributeTrace {
		let mut merged = self.0.clone();
		for record in &other.0 {
			if !merged.contains(record) {
				merged.push(record.clone());
			}
		}
		AttributeTrace(merged)
	}

	pub fn union_all<'a, I: IntoIterator<Item = &'a AttributeTrace>>(traces: I) -> AttributeTrace {
		traces.into_iter().fold(AttributeTrace::empty(), |acc, t| acc.union(t))
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Per-value metadata: the sticky secret bit and the attribute provenance
/// trace, per §3 and §4.1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
	pub secret: bool,
	pub attribute_trace: AttributeTrace,
}

impl Metadata {
	pub fn plain() -> Self {
		Metadata::default()
	}

	pub fn secret() -> Self {
		Metadata {
			secret: true,
			attribute_trace: AttributeTrace::empty(),
		}
	}

	/// Merge the metadata of every input actually consumed by an operation,
	/// per §4.1: `secret_out = any(input.secret)`, `trace_out = ∪ traces`.
	pub fn merge<'a, I: IntoIterator<Item = &'a Metadata>>(inputs: I) -> Metadata {
		let mut secret = false;
		let mut trace = AttributeTrace::empty();
		for m in inputs {
			secret |= m.secret;
			trace = trace.union(&m.attribute_trace);
		}
		Metadata { secret, attribute_trace: trace }
	}
}
