//! Caller-facing event framing.
//!
//! Relay fragments and pipeline events are mapped onto [`BoundaryEvent`]s,
//! interleaved with periodic heartbeats while work is in progress, and
//! closed with a `done` event. Each event is written as one SSE frame.

use std::time::Duration;

use futures::{Stream, StreamExt};
use gemini_relay_types::BoundaryEvent;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

enum Tick<T> {
    Item(Option<T>),
    Heartbeat,
}

/// Merge heartbeats into `events` every `period`.
///
/// The first heartbeat goes out immediately. The timer lives only as long
/// as the inner stream; a final `done` event follows the last item.
pub fn with_heartbeat<S, T>(events: S, period: Duration) -> impl Stream<Item = BoundaryEvent> + Send
where
    S: Stream<Item = T> + Send + 'static,
    T: Into<BoundaryEvent> + Send + 'static,
{
    async_stream::stream! {
        let mut events = Box::pin(events);
        let mut ticker = interval_at(Instant::now(), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let tick = tokio::select! {
                biased;
                item = events.next() => Tick::Item(item),
                _ = ticker.tick() => Tick::Heartbeat,
            };
            match tick {
                Tick::Item(Some(item)) => yield item.into(),
                Tick::Item(None) => break,
                Tick::Heartbeat => yield BoundaryEvent::heartbeat(),
            }
        }

        yield BoundaryEvent::done();
    }
}

/// Map events without heartbeats, still closing with `done`.
pub fn framed<S, T>(events: S) -> impl Stream<Item = BoundaryEvent> + Send
where
    S: Stream<Item = T> + Send + 'static,
    T: Into<BoundaryEvent> + Send + 'static,
{
    events
        .map(|event| -> BoundaryEvent { event.into() })
        .chain(futures::stream::once(async { BoundaryEvent::done() }))
}

/// `data: {"type":..,"content":..}\n\n`
pub fn to_sse_frame(event: &BoundaryEvent) -> Result<String, serde_json::Error> {
    Ok(format!("data: {}\n\n", serde_json::to_string(event)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_relay_types::{EventType, Fragment, PipelineEvent};

    #[tokio::test]
    async fn test_framed_appends_done() {
        let events: Vec<BoundaryEvent> =
            framed(futures::stream::iter(vec![Fragment::content("Hi")])).collect().await;
        assert_eq!(
            events,
            vec![BoundaryEvent::new(EventType::Content, "Hi"), BoundaryEvent::done()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_while_work_is_slow() {
        let slow = async_stream::stream! {
            tokio::time::sleep(Duration::from_secs(65)).await;
            yield PipelineEvent::Analysis("summary".to_string());
        };

        let events: Vec<BoundaryEvent> =
            with_heartbeat(slow, Duration::from_secs(30)).collect().await;
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();

        // t=0, t=30, t=60, then the item at t=65
        assert_eq!(
            types,
            vec![
                EventType::Heartbeat,
                EventType::Heartbeat,
                EventType::Heartbeat,
                EventType::Analysis,
                EventType::Done,
            ]
        );
    }

    #[test]
    fn test_sse_frame() {
        let frame = to_sse_frame(&BoundaryEvent::new(EventType::Status, "working")).unwrap();
        assert_eq!(frame, "data: {\"type\":\"status\",\"content\":\"working\"}\n\n");
    }
}
