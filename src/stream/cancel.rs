use crate::value::Value;
use futures::stream::{Abortable, BoxStream, StreamExt};
use futures::future::AbortHandle;

/// The head operator `|<...>` (§4.3 step 7, §GLOSSARY): surfaces only the
/// first emission of `source`, then completes. Chaining two heads is
/// idempotent (§8) because `take(1)` on an already-single-item stream is a
/// no-op.
pub fn head(source: BoxStream<'static, Value>) -> BoxStream<'static, Value> {
	Box::pin(source.take(1))
}

/// A handle returned when subscribing to a decision stream (§5): dropping or
/// calling [`CancellationHandle::cancel`] tears down the underlying stream,
/// which propagates upstream through every combinator and cancels any
/// attribute subscriptions it was driving.
pub struct CancellationHandle(AbortHandle);

impl CancellationHandle {
	pub fn cancel(&self) {
		self.0.abort();
	}
}

/// Wraps `stream` so it can be cancelled from outside without the caller
/// needing to drop the stream value itself (useful when the stream has
/// already been handed off to a task).
pub fn cancellable(stream: BoxStream<'static, Value>) -> (BoxStream<'static, Value>, CancellationHandle) {
	let (abort_handle, abort_registration) = AbortHandle::new_pair();
	let wrapped = Abortable::new(stream, abort_registration);
	(Box::pin(wrapped), CancellationHandle(abort_handle))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn head_emits_one_then_completes() {
		let source = futures::stream::iter(vec![Value::number(1), Value::number(2), Value::number(3)]).boxed();
		let mut headed = head(source);
		assert_eq!(headed.next().await, Some(Value::number(1)));
		assert_eq!(headed.next().await, None);
	}

	#[tokio::test]
	async fn chaining_two_heads_is_idempotent() {
		let source = futures::stream::iter(vec![Value::number(1), Value::number(2)]).boxed();
		let mut headed = head(head(source));
		assert_eq!(headed.next().await, Some(Value::number(1)));
		assert_eq!(headed.next().await, None);
	}

	#[tokio::test]
	async fn cancel_stops_emission() {
		let source = futures::stream::iter(vec![Value::number(1), Value::number(2), Value::number(3)]).boxed();
		let (mut wrapped, handle) = cancellable(source);
		handle.cancel();
		assert_eq!(wrapped.next().await, None);
	}
}
