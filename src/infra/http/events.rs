//! `GET /events`: live updates over Server-Sent Events.

use std::convert::Infallible;

use async_stream::stream;
use axum::extract::State;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::application::events::LiveEvent;

use super::middleware::MaybeUser;
use super::state::HttpState;

pub async fn live_events(State(state): State<HttpState>, viewer: MaybeUser) -> Response {
    let viewer = viewer.user_id();
    let mut receiver = state.events.subscribe();
    debug!(
        target = "agora::http::events",
        authenticated = viewer.is_some(),
        subscribers = state.events.subscriber_count(),
        "live event subscriber connected"
    );

    let stream = stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if !event.visible_to(viewer) {
                        continue;
                    }
                    if let Some(frame) = to_frame(&event) {
                        yield Ok::<Event, Infallible>(frame);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        target = "agora::http::events",
                        skipped,
                        "live event subscriber lagged; skipping missed events"
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(state.keep_alive))
        .into_response()
}

fn to_frame(event: &LiveEvent) -> Option<Event> {
    match Event::default().event(event.name.as_str()).json_data(&event.data) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(
                target = "agora::http::events",
                event = event.name.as_str(),
                error = %err,
                "failed to encode live event"
            );
            None
        }
    }
}
