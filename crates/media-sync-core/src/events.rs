use async_trait::async_trait;
use futures::StreamExt;
use media_sync_sources::{PlexServer, RawNotification, SourceResult};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_RESTART_INTERVAL: Duration = Duration::from_secs(15);

/// Plex timeline state of an item removed from the library
pub const TIMELINE_DELETED_STATE: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PlaySessionState,
    Activity,
    Timeline,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
    Stopped,
    Buffering,
}

impl PlayState {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "playing" => Some(PlayState::Playing),
            "paused" => Some(PlayState::Paused),
            "stopped" => Some(PlayState::Stopped),
            "buffering" => Some(PlayState::Buffering),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayState::Playing => "playing",
            PlayState::Paused => "paused",
            PlayState::Stopped => "stopped",
            PlayState::Buffering => "buffering",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaySessionState {
    pub session_key: String,
    pub rating_key: u64,
    /// Milliseconds
    pub view_offset: u64,
    pub state: PlayState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    /// `started`, `updated` or `ended`
    pub event: String,
    /// e.g. `library.refresh.items`
    pub activity_type: String,
    pub progress: u32,
    /// Rating key from the activity context
    pub key: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    pub item_id: u64,
    pub state: u32,
    pub metadata_state: Option<String>,
}

/// Typed server push message
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PlaySessionState(PlaySessionState),
    Activity(ActivityEvent),
    Timeline(TimelineEvent),
    /// Emitted by the dispatcher when the stream dies
    Error(String),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PlaySessionState(_) => EventKind::PlaySessionState,
            Event::Activity(_) => EventKind::Activity,
            Event::Timeline(_) => EventKind::Timeline,
            Event::Error(_) => EventKind::Error,
        }
    }

    /// Field used by listener filters
    pub fn field(&self, name: &str) -> Option<String> {
        match (self, name) {
            (Event::PlaySessionState(e), "state") => Some(e.state.as_str().to_string()),
            (Event::PlaySessionState(e), "session_key") => Some(e.session_key.clone()),
            (Event::Activity(e), "event") => Some(e.event.clone()),
            (Event::Activity(e), "type") => Some(e.activity_type.clone()),
            (Event::Activity(e), "progress") => Some(e.progress.to_string()),
            (Event::Timeline(e), "state") => Some(e.state.to_string()),
            (Event::Timeline(e), "metadata_state") => e.metadata_state.clone(),
            _ => None,
        }
    }
}

/// Event kind plus `field == value` conditions, all of which must hold
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub kind: EventKind,
    pub conditions: Vec<(String, String)>,
}

impl EventFilter {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            conditions: Vec::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        event.kind() == self.kind
            && self
                .conditions
                .iter()
                .all(|(field, value)| event.field(field).as_deref() == Some(value.as_str()))
    }
}

fn as_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `"/library/metadata/123"` to `123`
fn key_from_path(path: &str) -> Option<u64> {
    path.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Entries under `name`, whether Plex sent one object or an array
fn entries<'a>(data: &'a Value, name: &str) -> Vec<&'a Value> {
    match data.get(name) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

fn decode_play_session(value: &Value) -> Option<Event> {
    Some(Event::PlaySessionState(PlaySessionState {
        session_key: as_string(value.get("sessionKey"))?,
        rating_key: as_u64(value.get("ratingKey"))
            .or_else(|| value.get("key").and_then(|k| k.as_str()).and_then(key_from_path))?,
        view_offset: as_u64(value.get("viewOffset")).unwrap_or(0),
        state: PlayState::parse(value.get("state")?.as_str()?)?,
    }))
}

fn decode_activity(value: &Value) -> Option<Event> {
    let activity = value.get("Activity")?;
    Some(Event::Activity(ActivityEvent {
        event: as_string(value.get("event"))?,
        activity_type: as_string(activity.get("type")).unwrap_or_default(),
        progress: as_u64(activity.get("progress")).unwrap_or(0) as u32,
        key: activity
            .get("Context")
            .and_then(|c| c.get("key"))
            .and_then(|k| k.as_str())
            .and_then(key_from_path),
    }))
}

fn decode_timeline(value: &Value) -> Option<Event> {
    Some(Event::Timeline(TimelineEvent {
        item_id: as_u64(value.get("itemID"))?,
        state: as_u64(value.get("state"))? as u32,
        metadata_state: as_string(value.get("metadataState")),
    }))
}

/// Decode a raw push message into typed events
///
/// Accepts both the event-stream shape (`{"PlaySessionStateNotification": {...}}`)
/// and the websocket shape wrapped in `NotificationContainer`. Unknown
/// messages decode to nothing.
pub fn decode(raw: &RawNotification) -> Vec<Event> {
    let data = raw.data.get("NotificationContainer").unwrap_or(&raw.data);

    let mut events = Vec::new();
    events.extend(
        entries(data, "PlaySessionStateNotification")
            .into_iter()
            .filter_map(decode_play_session),
    );
    events.extend(entries(data, "ActivityNotification").into_iter().filter_map(decode_activity));
    events.extend(entries(data, "TimelineEntry").into_iter().filter_map(decode_timeline));

    if events.is_empty() {
        debug!("Ignoring {} notification", raw.event);
    }
    events
}

/// Receiver of dispatched events
#[async_trait]
pub trait EventHandler: Send {
    fn name(&self) -> &'static str;

    fn filters(&self) -> Vec<EventFilter>;

    async fn handle(&mut self, event: &Event) -> anyhow::Result<()>;
}

/// Fans push events out to the handlers whose filters match
pub struct EventDispatcher {
    handlers: Vec<Box<dyn EventHandler>>,
    restart_interval: Duration,
}

impl EventDispatcher {
    pub fn new(restart_interval: Duration) -> Self {
        Self {
            handlers: Vec::new(),
            restart_interval,
        }
    }

    pub fn register(&mut self, handler: Box<dyn EventHandler>) {
        debug!("Registered event handler {}", handler.name());
        self.handlers.push(handler);
    }

    /// Deliver `event` to matching handlers in registration order
    ///
    /// Handler errors are logged and never stop the dispatch.
    pub async fn dispatch(&mut self, event: &Event) -> usize {
        let mut delivered = 0;
        for handler in self.handlers.iter_mut() {
            if !handler.filters().iter().any(|f| f.matches(event)) {
                continue;
            }
            delivered += 1;
            if let Err(e) = handler.handle(event).await {
                error!("Event handler {} failed on {:?}: {:#}", handler.name(), event.kind(), e);
            }
        }
        delivered
    }

    async fn listen(&mut self, plex: &dyn PlexServer) -> SourceResult<()> {
        let mut stream = plex.notifications().await?;
        while let Some(message) = stream.next().await {
            for event in decode(&message?) {
                self.dispatch(&event).await;
            }
        }
        Ok(())
    }

    /// Listen until `shutdown` completes, resubscribing whenever the stream dies
    pub async fn run<F>(&mut self, plex: &dyn PlexServer, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let result = tokio::select! {
                _ = &mut shutdown => return,
                result = self.listen(plex) => result,
            };

            let reason = match result {
                Ok(()) => "notification stream closed".to_string(),
                Err(e) => e.to_string(),
            };
            warn!(
                "Plex notifications stopped ({}), reconnecting in {:?}",
                reason, self.restart_interval
            );
            self.dispatch(&Event::Error(reason)).await;

            tokio::select! {
                _ = &mut shutdown => return,
                _ = tokio::time::sleep(self.restart_interval) => {}
            }
            info!("Reconnecting to Plex notifications");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePlex, PlexCall};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn raw(event: &str, data: Value) -> RawNotification {
        RawNotification {
            event: event.to_string(),
            data,
        }
    }

    fn playing(state: &str, offset: u64) -> RawNotification {
        raw(
            "playing",
            json!({"PlaySessionStateNotification": {
                "sessionKey": "23", "ratingKey": "500", "key": "/library/metadata/500",
                "viewOffset": offset, "state": state
            }}),
        )
    }

    struct Recorder {
        filters: Vec<EventFilter>,
        seen: Arc<Mutex<Vec<Event>>>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn filters(&self) -> Vec<EventFilter> {
            self.filters.clone()
        }

        async fn handle(&mut self, event: &Event) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(event.clone());
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    fn recorder(filters: Vec<EventFilter>, fail: bool) -> (Box<Recorder>, Arc<Mutex<Vec<Event>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Recorder {
                filters,
                seen: seen.clone(),
                fail,
            }),
            seen,
        )
    }

    #[test]
    fn test_decode_play_session() {
        let events = decode(&playing("paused", 600000));
        assert_eq!(
            events,
            vec![Event::PlaySessionState(PlaySessionState {
                session_key: "23".to_string(),
                rating_key: 500,
                view_offset: 600000,
                state: PlayState::Paused,
            })]
        );
    }

    #[test]
    fn test_decode_activity_and_timeline() {
        let activity = raw(
            "activity",
            json!({"ActivityNotification": {"event": "ended", "uuid": "x", "Activity": {
                "type": "library.refresh.items", "progress": 100,
                "Context": {"key": "/library/metadata/123"}
            }}}),
        );
        match &decode(&activity)[0] {
            Event::Activity(a) => {
                assert_eq!(a.key, Some(123));
                assert_eq!(a.progress, 100);
            }
            other => panic!("unexpected {other:?}"),
        }

        let timeline = raw(
            "timeline",
            json!({"NotificationContainer": {"TimelineEntry": [
                {"itemID": "77", "type": 1, "state": 9, "metadataState": "deleted"},
                {"itemID": "78", "type": 1, "state": 5}
            ]}}),
        );
        let events = decode(&timeline);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].field("metadata_state").as_deref(), Some("deleted"));

        assert!(decode(&raw("progress", json!({"foo": 1}))).is_empty());
    }

    #[test]
    fn test_filters() {
        let filter = EventFilter::new(EventKind::Timeline)
            .with("state", "9")
            .with("metadata_state", "deleted");
        let deleted = Event::Timeline(TimelineEvent {
            item_id: 1,
            state: 9,
            metadata_state: Some("deleted".to_string()),
        });
        let created = Event::Timeline(TimelineEvent {
            item_id: 1,
            state: 0,
            metadata_state: Some("created".to_string()),
        });
        assert!(filter.matches(&deleted));
        assert!(!filter.matches(&created));
        assert!(!filter.matches(&Event::Error("x".to_string())));
    }

    #[tokio::test]
    async fn test_handler_errors_do_not_stop_dispatch() {
        let mut dispatcher = EventDispatcher::new(DEFAULT_RESTART_INTERVAL);
        let (failing, failing_seen) = recorder(vec![EventFilter::new(EventKind::Error)], true);
        let (ok, ok_seen) = recorder(vec![EventFilter::new(EventKind::Error)], false);
        let (other, other_seen) = recorder(vec![EventFilter::new(EventKind::Activity)], false);
        dispatcher.register(failing);
        dispatcher.register(ok);
        dispatcher.register(other);

        let delivered = dispatcher.dispatch(&Event::Error("gone".to_string())).await;
        assert_eq!(delivered, 2);
        assert_eq!(failing_seen.lock().unwrap().len(), 1);
        assert_eq!(ok_seen.lock().unwrap().len(), 1);
        assert!(other_seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_stream_ends() {
        let plex = FakePlex::default();
        plex.streams
            .lock()
            .unwrap()
            .push_back(vec![Ok(playing("playing", 0)), Ok(playing("paused", 1000))]);
        plex.streams
            .lock()
            .unwrap()
            .push_back(vec![Ok(playing("stopped", 2000))]);

        let mut dispatcher = EventDispatcher::new(DEFAULT_RESTART_INTERVAL);
        let (handler, seen) = recorder(
            vec![
                EventFilter::new(EventKind::PlaySessionState),
                EventFilter::new(EventKind::Error),
            ],
            false,
        );
        dispatcher.register(handler);

        // subscriptions at 0s, 15s (second stream) and 30s (refused)
        dispatcher
            .run(&plex, tokio::time::sleep(Duration::from_secs(40)))
            .await;

        let subscriptions = plex
            .calls()
            .into_iter()
            .filter(|c| *c == PlexCall::Subscribe)
            .count();
        assert_eq!(subscriptions, 3);

        let kinds: Vec<EventKind> = seen.lock().unwrap().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::PlaySessionState,
                EventKind::PlaySessionState,
                EventKind::Error,
                EventKind::PlaySessionState,
                EventKind::Error,
                EventKind::Error,
            ]
        );
    }
}
