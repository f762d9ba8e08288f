//! Family changefeed. Services publish after successful writes, clients
//! subscribe over server-sent events.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{auth::session::Session, state::AppState};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChangeKind {
    MealsChanged,
    DayPlanChanged { date: String },
    GroceryChanged,
    FamilyChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub family_id: Uuid,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

#[derive(Clone)]
pub struct Changefeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for Changefeed {
    fn default() -> Self {
        Self::new()
    }
}

impl Changefeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Fire and forget; having no subscribers is not an error.
    pub fn publish(&self, family_id: Uuid, kind: ChangeKind) {
        let _ = self.tx.send(ChangeEvent { family_id, kind });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Events for one family. Lagging subscribers skip what they missed.
    pub fn family_stream(&self, family_id: Uuid) -> impl Stream<Item = ChangeEvent> + Send {
        stream::unfold(self.subscribe(), move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.family_id == family_id => return Some((event, rx)),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "changefeed subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(family_events))
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn family_events(
    State(state): State<AppState>,
    session: Session,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    use futures::StreamExt;

    let updates = match session.active_family_id {
        Some(family_id) => state.changes.family_stream(family_id).boxed(),
        None => stream::pending::<ChangeEvent>().boxed(),
    };
    let events = updates.map(|change| {
        let event = Event::default()
            .event("change")
            .json_data(&change)
            .unwrap_or_else(|_| Event::default().event("change"));
        Ok(event)
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn family_stream_filters_other_families() {
        let feed = Changefeed::new();
        let mine = Uuid::new_v4();
        let stream = feed.family_stream(mine);
        tokio::pin!(stream);

        feed.publish(Uuid::new_v4(), ChangeKind::GroceryChanged);
        feed.publish(
            mine,
            ChangeKind::DayPlanChanged {
                date: "2024-06-03".into(),
            },
        );

        let event = stream.next().await.unwrap();
        assert_eq!(event.family_id, mine);
        assert_eq!(
            event.kind,
            ChangeKind::DayPlanChanged {
                date: "2024-06-03".into()
            }
        );
    }

    #[test]
    fn change_event_serializes_flat() {
        let event = ChangeEvent {
            family_id: Uuid::nil(),
            kind: ChangeKind::DayPlanChanged {
                date: "2024-06-03".into(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "dayPlanChanged");
        assert_eq!(json["date"], "2024-06-03");
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        Changefeed::new().publish(Uuid::new_v4(), ChangeKind::MealsChanged);
    }
}
