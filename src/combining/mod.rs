//! Policy-combining algorithms (§4.4): aggregate each policy's verdict and
//! constraints into a single document-set decision.

mod algorithm;
mod verdict;

pub use algorithm::{combine, CombiningAlgorithm};
pub use verdict::PolicyOutcome;
