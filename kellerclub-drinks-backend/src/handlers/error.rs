use std::any::Any;

use http::StatusCode;
use serde::Serialize;
use tracing::error;

use super::{AppState, Handler};
use crate::error::HandlerError;
use crate::response::Response;
use crate::templating::{ERROR, TEMPLATE_ERROR_PAGE};

/// Serves an error page with the given status and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorHandler {
    pub status: u16,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorView<'a> {
    title: &'a str,
    status: u16,
    message: &'a str,
}

impl ErrorHandler {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl Handler for ErrorHandler {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError> {
        let title = StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Error");
        let view = ErrorView {
            title,
            status: self.status,
            message: &self.message,
        };
        match state.templates.render(ERROR, &view) {
            Ok(page) => Ok(Response::error(self.status, page)),
            Err(template_error) => {
                error!("failed to render error page: {template_error}");
                Ok(Response::error(400, TEMPLATE_ERROR_PAGE))
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
