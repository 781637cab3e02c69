use std::any::Any;

use kellerclub_drinks_database::models::Event;
use serde::Serialize;

use super::{AppState, Handler};
use crate::error::HandlerError;
use crate::response::Response;
use crate::templating::WELCOME;

/// Landing page: the running event, or a form to start one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WelcomeScreen;

#[derive(Serialize)]
struct WelcomeView {
    event: Option<EventView>,
}

#[derive(Serialize)]
struct EventView {
    id: i64,
    name: Option<String>,
    started: String,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        Self {
            id: event.id(),
            started: event.start_time.format("%Y-%m-%d %H:%M UTC").to_string(),
            name: event.name,
        }
    }
}

impl Handler for WelcomeScreen {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError> {
        let view = WelcomeView {
            event: state.datastore.current_event()?.map(EventView::from),
        };
        Ok(Response::html(state.templates.render(WELCOME, &view)?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::WelcomeScreen;
    use crate::handlers::tests::{body, state, FakeDatastore};
    use crate::handlers::Handler;

    #[test]
    fn offers_start_without_event() {
        let response = WelcomeScreen
            .handle(&state(FakeDatastore::default()))
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(&response).contains("action=\"/start_event\""));
    }

    #[test]
    fn links_running_event() {
        let state = state(FakeDatastore::default());
        state.datastore.start_event(None, Some("Erstiparty")).unwrap();

        let page = body(&WelcomeScreen.handle(&state).unwrap());

        assert!(page.contains("Erstiparty"));
        assert!(page.contains("href=\"/event/1000/selector\""));
        assert!(page.contains("action=\"/stop_event\""));
    }
}
