/// Live board changes over Server-Sent Events
///
/// # Endpoint
///
/// ```text
/// GET /v1/board/events[?project_id={uuid}]
/// Accept: text/event-stream
/// ```
///
/// Without `project_id` the stream follows the session's selected project.
/// Authorization happens when the stream opens. If the subscriber is later
/// removed from the project, the stream sends a final `revoked` event and
/// closes.
///
/// # Events
///
/// One event per committed change, named after its kind, with the change as
/// JSON data:
///
/// ```text
/// event: moved
/// data: {"kind":"moved","task":{...},"from_status":"backlog","from_position":1}
/// ```
///
/// A subscriber that falls too far behind receives a `lagged` event whose
/// data is the number of changes it missed, and should refetch the board.

use crate::{app::AppState, error::ApiError, extract::SessionCookie, policies};
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use taskboard_shared::{auth::ScopeHint, events::TaskChange};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt as _,
};
use uuid::Uuid;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardEventsQuery {
    /// Explicit project; defaults to the session's selection
    pub project_id: Option<Uuid>,
}

pub async fn board_events(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Query(query): Query<BoardEventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let scope = query.project_id.map(ScopeHint::Project).unwrap_or_default();
    let access = state.authorize(&policies::PROJECT_READ, token, scope).await?;
    let project_id = access.project_id()?;

    let user_id = access.user()?.id;

    tracing::info!(user_id = %user_id, project_id = %project_id, "Streaming board events");

    let changes = BroadcastStream::new(state.hub.subscribe());
    let stream = stream::unfold(Some(changes), move |changes| async move {
        let mut changes = changes?;
        loop {
            match board_event(project_id, user_id, changes.next().await?) {
                Step::Send(event) => return Some((Ok::<_, Infallible>(event), Some(changes))),
                Step::Close(event) => {
                    tracing::info!(user_id = %user_id, project_id = %project_id, "Board access revoked, closing stream");
                    return Some((Ok(event), None));
                }
                Step::Skip => {}
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

/// What a subscriber's stream does with one hub item
#[derive(Debug)]
enum Step {
    Send(Event),
    Skip,
    /// Send the event, then end the stream
    Close(Event),
}

/// Maps one hub item for the subscriber `user_id` watching `project_id`
fn board_event(
    project_id: Uuid,
    user_id: Uuid,
    item: Result<TaskChange, BroadcastStreamRecvError>,
) -> Step {
    match item {
        Ok(change) if change.project_id() != project_id => Step::Skip,
        Ok(change) if change.revoked_user() == Some(user_id) => {
            Step::Close(Event::default().event("revoked").data(project_id.to_string()))
        }
        Ok(change) => match Event::default().event(change.kind()).json_data(&change) {
            Ok(event) => Step::Send(event),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode board event");
                Step::Skip
            }
        },
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            tracing::warn!(project_id = %project_id, missed, "Board event subscriber lagged");
            Step::Send(Event::default().event("lagged").data(missed.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_projects_are_filtered_out() {
        let change = TaskChange::Deleted {
            task_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            status: Default::default(),
        };

        let viewer = Uuid::new_v4();
        assert!(matches!(board_event(Uuid::new_v4(), viewer, Ok(change.clone())), Step::Skip));
        assert!(matches!(board_event(change.project_id(), viewer, Ok(change)), Step::Send(_)));
    }

    #[test]
    fn test_lag_is_reported() {
        let step = board_event(Uuid::new_v4(), Uuid::new_v4(), Err(BroadcastStreamRecvError::Lagged(3)));
        assert!(matches!(step, Step::Send(_)));
    }

    #[test]
    fn test_only_the_removed_member_is_cut_off() {
        let project_id = Uuid::new_v4();
        let removed = Uuid::new_v4();
        let change = TaskChange::MemberRemoved {
            project_id,
            user_id: removed,
        };

        assert!(matches!(board_event(project_id, removed, Ok(change.clone())), Step::Close(_)));
        assert!(matches!(board_event(project_id, Uuid::new_v4(), Ok(change.clone())), Step::Send(_)));
        assert!(matches!(board_event(Uuid::new_v4(), removed, Ok(change)), Step::Skip));
    }
}
