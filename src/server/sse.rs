use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};

use crate::services::{ChatEvent, ChatEventStream};

pub fn to_event(event: &ChatEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.data().to_string())
}

/// Frame a chat response as `message` events followed by one `end` event.
pub fn chat_sse(events: ChatEventStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(events.map(|event| Ok(to_event(&event))))
}
