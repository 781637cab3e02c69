use kellerclub_drinks_config::ConfigError;
use kellerclub_drinks_database::error::DatabaseError;

/// Failures while a handler does its work.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Failures that stop the server from starting or running.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    File(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),
}
