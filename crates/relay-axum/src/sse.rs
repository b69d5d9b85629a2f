//! SSE framing of relay streams.
//!
//! Each [`StreamEvent`] becomes one SSE message: the variant name on the
//! `event:` line and its payload, without the tag, on the `data:` line.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{Stream, StreamExt};
use relay_core::StreamEvent;
use relay_stream::EventStream;

/// Interval of keep-alive comments on idle streams.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Wrap a relay event stream in an Axum SSE response.
///
/// The response ends when the round's channel closes, right after its
/// terminal event. Dropping the response (client disconnect) drops the
/// receiver, which the driver observes as a cancellation.
pub fn sse_response(
    events: EventStream,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let stream = events.map(|event| Ok(to_sse_event(&event)));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

/// Payload of an event without its `event` tag.
pub fn event_payload(event: &StreamEvent) -> serde_json::Value {
    match serde_json::to_value(event) {
        Ok(serde_json::Value::Object(mut map)) => {
            map.remove("event");
            serde_json::Value::Object(map)
        }
        Ok(other) => other,
        Err(e) => {
            tracing::warn!(event = event.name(), error = %e, "Failed to serialize event");
            serde_json::Value::Null
        }
    }
}

pub fn to_sse_event(event: &StreamEvent) -> Event {
    let payload = event_payload(event);
    Event::default()
        .event(event.name())
        .data(payload.to_string())
}
