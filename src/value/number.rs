use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// An arbitrary-precision decimal number.
///
/// Backed by [`rust_decimal::Decimal`], matching the host's approach of
/// wrapping a single decimal representation rather than the classic
/// int/float split: the DSL has one numeric kind, and every arithmetic
/// operator below is total except where §4.2 calls for an explicit error
/// (division/modulo by zero).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Number(pub Decimal);

impl Eq for Number {}

impl Number {
	pub fn new(d: Decimal) -> Self {
		Number(d)
	}

	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	/// Truncates towards zero, used when coercing decimal option values
	/// (e.g. `initialTimeOutMs`) to integer milliseconds per §3.
	pub fn to_i64_truncated(&self) -> Option<i64> {
		self.0.trunc().to_i64()
	}

	pub fn to_u64_truncated(&self) -> Option<u64> {
		self.0.trunc().to_u64()
	}

	pub fn checked_add(&self, other: &Number) -> Option<Number> {
		self.0.checked_add(other.0).map(Number)
	}

	pub fn checked_sub(&self, other: &Number) -> Option<Number> {
		self.0.checked_sub(other.0).map(Number)
	}

	pub fn checked_mul(&self, other: &Number) -> Option<Number> {
		self.0.checked_mul(other.0).map(Number)
	}

	pub fn checked_div(&self, other: &Number) -> Option<Number> {
		if other.is_zero() {
			return None;
		}
		self.0.checked_div(other.0).map(Number)
	}

	pub fn checked_rem(&self, other: &Number) -> Option<Number> {
		if other.is_zero() {
			return None;
		}
		self.0.checked_rem(other.0).map(Number)
	}

	pub fn checked_neg(&self) -> Option<Number> {
		Some(Number(-self.0))
	}
}

impl From<i64> for Number {
	fn from(v: i64) -> Self {
		Number(Decimal::from(v))
	}
}

impl From<i32> for Number {
	fn from(v: i32) -> Self {
		Number(Decimal::from(v))
	}
}

impl From<usize> for Number {
	fn from(v: usize) -> Self {
		Number(Decimal::from(v))
	}
}

impl From<f64> for Number {
	fn from(v: f64) -> Self {
		Number(Decimal::from_f64(v).unwrap_or_default())
	}
}

impl PartialOrd for Number {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		self.0.partial_cmp(&other.0)
	}
}

impl Display for Number {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		Display::fmt(&self.0, f)
	}
}

impl Add for Number {
	type Output = Number;
	fn add(self, rhs: Self) -> Self::Output {
		Number(self.0 + rhs.0)
	}
}

impl Sub for Number {
	type Output = Number;
	fn sub(self, rhs: Self) -> Self::Output {
		Number(self.0 - rhs.0)
	}
}

impl Mul for Number {
	type Output = Number;
	fn mul(self, rhs: Self) -> Self::Output {
		Number(self.0 * rhs.0)
	}
}

impl Div for Number {
	type Output = Number;
	fn div(self, rhs: Self) -> Self::Output {
		Number(self.0 / rhs.0)
	}
}

impl Rem for Number {
	type Output = Number;
	fn rem(self, rhs: Self) -> Self::Output {
		Number(self.0 % rhs.0)
	}
}

impl Neg for Number {
	type Output = Number;
	fn neg(self) -> Self::Output {
		Number(-self.0)
	}
}
