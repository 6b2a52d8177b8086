use crate::value::Value;
use futures::stream::{BoxStream, StreamExt};

/// *Combine-latest* over `N` reactive inputs (§5): waits until every input
/// has emitted at least once, then emits the full vector of latest values on
/// every subsequent change of any single input.
///
/// An empty `streams` list yields an empty stream rather than a single empty
/// vector, since there is no "every input has emitted" moment to wait for.
pub fn combine_latest(streams: Vec<BoxStream<'static, Value>>) -> BoxStream<'static, Vec<Value>> {
	let width = streams.len();
	if width == 0 {
		return Box::pin(futures::stream::empty());
	}
	let tagged = streams
		.into_iter()
		.enumerate()
		.map(|(index, stream)| stream.map(move |value| (index, value)));
	let merged = futures::stream::select_all(tagged);
	let latest: Vec<Option<Value>> = vec![None; width];
	Box::pin(futures::stream::unfold((merged, latest), move |(mut merged, mut latest)| async move {
		loop {
			let (index, value) = merged.next().await?;
			latest[index] = Some(value);
			if latest.iter().all(Option::is_some) {
				let snapshot = latest.iter().cloned().map(|v| v.expect("checked above")).collect();
				return Some((snapshot, (merged, latest)));
			}
		}
	}))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn waits_for_every_input_before_first_emission() {
		let a = futures::stream::iter(vec![Value::number(1), Value::number(2)]).boxed();
		let b = futures::stream::iter(vec![Value::text("x")]).boxed();
		let mut combined = combine_latest(vec![a, b]);
		let first = combined.next().await.unwrap();
		assert_eq!(first[0], Value::number(1));
		assert_eq!(first[1], Value::text("x"));
		let second = combined.next().await.unwrap();
		assert_eq!(second[0], Value::number(2));
		assert_eq!(second[1], Value::text("x"));
		assert!(combined.next().await.is_none());
	}

	#[tokio::test]
	async fn empty_input_list_yields_empty_stream() {
		let mut combined = combine_latest(Vec::new());
		assert!(combined.next().await.is_none());
	}
}
