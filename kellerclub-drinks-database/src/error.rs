use std::path::PathBuf;

use thiserror::Error;

use crate::models::InvalidDrinkName;

#[allow(clippy::module_name_repetitions)]
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to connect to database {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("Database query failed {0}")]
    Query(#[from] diesel::result::Error),
    #[error("Database migration failed {0}")]
    Migration(String),
    #[error("Database path {0} is not valid UTF-8")]
    InvalidPath(PathBuf),
    #[error("There is an ongoing event!")]
    EventStillRunning,
    #[error("An event was already started in this second, try again!")]
    EventStartTaken,
    #[error(transparent)]
    InvalidDrinkName(#[from] InvalidDrinkName),
    #[error("Stored timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}
