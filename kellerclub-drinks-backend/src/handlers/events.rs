use std::any::Any;

use kellerclub_drinks_database::error::DatabaseError;
use tracing::info;

use super::{AppState, ErrorHandler, Handler};
use crate::error::HandlerError;
use crate::response::Response;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartEvent {
    pub name: Option<String>,
}

impl Handler for StartEvent {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError> {
        match state.datastore.start_event(None, self.name.as_deref()) {
            Ok(event) => {
                info!(event = event.id(), name = ?event.name, "started event");
                Ok(Response::redirect("/"))
            }
            Err(error @ (DatabaseError::EventStillRunning | DatabaseError::EventStartTaken)) => {
                ErrorHandler::new(400, error.to_string()).handle(state)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopEvent;

impl Handler for StopEvent {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError> {
        let stopped = state.datastore.stop_current_event(None)?;
        info!(stopped, "stop event requested");
        Ok(Response::redirect("/"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
