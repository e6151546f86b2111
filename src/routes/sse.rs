use crate::state::StudentState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt, future};
use serde::Serialize;
use std::convert::Infallible;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StudentChange {
    Created { id: i64 },
    Updated { id: i64 },
    Deleted { id: i64 },
    Imported { count: usize },
}

impl StudentChange {
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Deleted { .. } => "deleted",
            Self::Imported { .. } => "imported",
        }
    }
}

pub async fn sse_feed(
    State(state): State<StudentState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let changes = BroadcastStream::new(state.subscribe_to_change_feed()).filter_map(|change| {
        future::ready(match change {
            Ok(change) => match Event::default().event(change.event_name()).json_data(&change) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    error!(?e, ?change, "Error serialising change event");
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "change feed subscriber lagged");
                None
            }
        })
    });

    Sse::new(changes).keep_alive(KeepAlive::default())
}
