use crate::value::Value;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;

type InnerFactory = Arc<dyn Fn(Value) -> BoxStream<'static, Value> + Send + Sync>;
type InnerHandle = (JoinHandle<()>, async_channel::Receiver<Value>);

/// *Switch* (§5): whenever `entity` emits a new value, the previous inner
/// subscription (if any) is cancelled and a fresh one started via
/// `make_inner`. Used by the attribute-finder compiler when the entity
/// expression is itself a stream.
pub fn switch_latest<F>(entity: BoxStream<'static, Value>, make_inner: F) -> BoxStream<'static, Value>
where
	F: Fn(Value) -> BoxStream<'static, Value> + Send + Sync + 'static,
{
	let make_inner: InnerFactory = Arc::new(make_inner);
	Box::pin(futures::stream::unfold(
		(entity, None::<InnerHandle>, make_inner),
		move |(mut entity, mut current, make_inner)| async move {
			loop {
				if current.is_none() {
					let value = entity.next().await?;
					current = Some(spawn_inner(value, &make_inner));
				}
				let (handle, rx) = current.take().expect("just ensured current is Some");
				tokio::select! {
					biased;
					next_entity = entity.next() => {
						handle.abort();
						match next_entity {
							Some(value) => {
								current = Some(spawn_inner(value, &make_inner));
							}
							None => return None,
						}
					}
					item = rx.recv() => {
						match item {
							Ok(value) => {
								current = Some((handle, rx));
								return Some((value, (entity, current, make_inner)));
							}
							Err(_) => {
								current = None;
							}
						}
					}
				}
			}
		},
	))
}

fn spawn_inner(entity_value: Value, make_inner: &InnerFactory) -> InnerHandle {
	let (tx, rx) = async_channel::unbounded();
	let mut inner = make_inner(entity_value);
	let handle = tokio::spawn(async move {
		while let Some(value) = inner.next().await {
			if tx.send(value).await.is_err() {
				break;
			}
		}
	});
	(handle, rx)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn resubscribes_on_new_entity() {
		let entities = futures::stream::iter(vec![Value::text("alice"), Value::text("bob")]).boxed();
		let mut switched = switch_latest(entities, |entity| {
			let suffix = entity.as_text().unwrap().to_string();
			futures::stream::iter(vec![Value::text(format!("{suffix}-1")), Value::text(format!("{suffix}-2"))]).boxed()
		});
		let mut seen = Vec::new();
		while let Some(v) = switched.next().await {
			seen.push(v.as_text().unwrap().to_string());
			if seen.len() == 4 {
				break;
			}
		}
		assert!(seen.contains(&"alice-1".to_string()) || seen.contains(&"bob-1".to_string()));
	}
}
