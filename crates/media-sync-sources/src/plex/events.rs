use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use tracing::debug;

use super::{NotificationStream, RawNotification};
use crate::error::SourceError;

/// Turn a streaming response into decoded notifications
pub fn notification_stream(response: reqwest::Response) -> NotificationStream {
    decode_events(response.bytes_stream())
}

/// Decode a `text/event-stream` body delivered in arbitrary chunks
///
/// Messages whose data is not JSON are skipped; transport failures end up in
/// the stream so the dispatcher can reconnect.
pub fn decode_events<S, B, E>(bytes: S) -> NotificationStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<SourceError> + std::fmt::Display + Send + 'static,
{
    bytes
        .eventsource()
        .filter_map(|item| async move {
            match item {
                Ok(event) => to_notification(event).map(Ok),
                Err(EventStreamError::Transport(e)) => Some(Err(e.into())),
                Err(EventStreamError::Utf8(e)) => Some(Err(SourceError::Decode(e.to_string()))),
                Err(EventStreamError::Parser(e)) => Some(Err(SourceError::Decode(e.to_string()))),
            }
        })
        .boxed()
}

fn to_notification(event: Event) -> Option<RawNotification> {
    if event.data.is_empty() {
        return None;
    }
    let name = if event.event.is_empty() {
        "message".to_string()
    } else {
        event.event
    };
    match serde_json::from_str(&event.data) {
        Ok(data) => Some(RawNotification { event: name, data }),
        Err(e) => {
            debug!("Skipping undecodable {} notification: {}", name, e);
            None
        }
    }
}
