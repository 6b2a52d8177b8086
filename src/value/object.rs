use super::Value;
use std::fmt::{self, Display, Formatter, Write};

/// A mapping from text keys to [`Value`]s.
///
/// Backed by an insertion-ordered `Vec` of pairs rather than the host's
/// `BTreeMap`: §3 requires insertion order to be retained for trace
/// rendering even though it carries no semantic weight, which a sorted map
/// cannot give us. Lookup is linear, which is the right trade for the small,
/// human-authored objects a policy document actually builds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object(pub Vec<(String, Value)>);

impl Object {
	pub fn new() -> Self {
		Object(Vec::new())
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
	}

	/// Inserts or replaces a key, preserving the position of a pre-existing
	/// key rather than moving it to the end.
	pub fn insert(&mut self, key: String, value: Value) {
		if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
			entry.1 = value;
		} else {
			self.0.push((key, value));
		}
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.0.iter().any(|(k, _)| k == key)
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|(k, _)| k.as_str())
	}

	pub fn values(&self) -> impl Iterator<Item = &Value> {
		self.0.iter().map(|(_, v)| v)
	}

	pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl FromIterator<(String, Value)> for Object {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		let mut obj = Object::new();
		for (k, v) in iter {
			obj.insert(k, v);
		}
		obj
	}
}

impl IntoIterator for Object {
	type Item = (String, Value);
	type IntoIter = std::vec::IntoIter<(String, Value)>;
	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

impl Display for Object {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_char('{')?;
		for (i, (k, v)) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{k:?}: {v}")?;
		}
		f.write_char('}')
	}
}
