use std::any::Any;
use std::path::{Component, Path, PathBuf};

use mime::Mime;
use tracing::debug;

use super::{AppState, ErrorHandler, Handler};
use crate::error::HandlerError;
use crate::response::Response;

/// Serves a file below the configured static directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticHandler {
    pub path: String,
    pub content_type: Mime,
}

/// Joins `path` onto `root`, accepting only plain file and directory names.
fn map_path(root: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
        .then(|| root.join(relative))
}

impl Handler for StaticHandler {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError> {
        let content = map_path(&state.settings.static_dir, &self.path)
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::InvalidInput))
            .and_then(std::fs::read);
        match content {
            Ok(content) => Ok(Response::success(content, self.content_type.clone(), true)),
            Err(error) => {
                debug!(path = %self.path, "static file unavailable: {error}");
                ErrorHandler::new(404, format!("File {} not found!", self.path)).handle(state)
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
