mod node;
mod operator;

pub use node::{Node, StepKind, SubscriptionElement};
pub use operator::{BinaryOperator, UnaryOperator};
