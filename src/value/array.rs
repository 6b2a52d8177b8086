use super::Value;
use std::fmt::{self, Display, Formatter, Write};
use std::ops::{Deref, DerefMut};

/// An ordered sequence of [`Value`]s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Array(pub Vec<Value>);

impl Deref for Array {
	type Target = Vec<Value>;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for Array {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

impl FromIterator<Value> for Array {
	fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
		Array(iter.into_iter().collect())
	}
}

impl IntoIterator for Array {
	type Item = Value;
	type IntoIter = std::vec::IntoIter<Value>;
	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

impl<'a> IntoIterator for &'a Array {
	type Item = &'a Value;
	type IntoIter = std::slice::Iter<'a, Value>;
	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}

impl From<Vec<Value>> for Array {
	fn from(v: Vec<Value>) -> Self {
		Array(v)
	}
}

impl Display for Array {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_char('[')?;
		for (i, v) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{v}")?;
		}
		f.write_char(']')
	}
}

/// Resolves a possibly-negative index against an array length, per §4.2:
/// `-len` maps to `0`, `-len - 1` is out of range.
pub fn resolve_index(index: i64, len: usize) -> Option<usize> {
	if index >= 0 {
		let i = index as usize;
		if i < len {
			Some(i)
		} else {
			None
		}
	} else {
		let from_end = (-index) as usize;
		if from_end <= len {
			Some(len - from_end)
		} else {
			None
		}
	}
}
