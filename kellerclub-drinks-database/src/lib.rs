pub mod error;
pub mod layout_factory;
pub mod models;
pub mod schema;
pub mod sqlite_store;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use error::DatabaseError;
use kellerclub_drinks_config::DatastoreSettings;
use models::{Drink, Event, Layout};
pub use sqlite_store::SqliteStore;

/// Everything the web frontend needs from persistent storage.
///
/// Implementations open their own connections per call and must be usable
/// from several request threads at once.
pub trait Datastore: Send + Sync {
    /// All drinks keyed by their internal name.
    fn all_drinks(&self) -> Result<BTreeMap<String, Drink>, DatabaseError>;

    fn add_drink(&self, drink: &Drink) -> Result<(), DatabaseError>;

    /// Starts a new event, failing with [`DatabaseError::EventStillRunning`]
    /// while another one has not ended yet and with
    /// [`DatabaseError::EventStartTaken`] when an earlier event started in the
    /// same second.
    fn start_event(
        &self,
        start_time: Option<DateTime<Utc>>,
        name: Option<&str>,
    ) -> Result<Event, DatabaseError>;

    /// Ends the running event. Returns whether there was one.
    fn stop_current_event(&self, end_time: Option<DateTime<Utc>>) -> Result<bool, DatabaseError>;

    fn current_event(&self) -> Result<Option<Event>, DatabaseError>;

    /// Persists one order per drink name and returns the new order ids.
    fn submit_order(&self, event_id: i64, drink_names: &[String]) -> Result<Vec<i32>, DatabaseError> {
        self.submit_order_at(event_id, drink_names, None)
    }

    /// Like [`Datastore::submit_order`] but records the orders at `ordered_at`
    /// instead of now. Orders colliding on `(timestamp, drink)` are moved up to
    /// one second into the future.
    fn submit_order_at(
        &self,
        event_id: i64,
        drink_names: &[String],
        ordered_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<i32>, DatabaseError>;

    fn all_layouts(&self) -> Result<BTreeMap<String, Layout>, DatabaseError>;

    /// Turns errors caused by bad user input into a message that can be shown
    /// to the user. Everything else yields `None`.
    fn handle_exception(&self, error: &DatabaseError) -> Option<String>;
}

/// Opens the datastore described by the settings, applying pending migrations.
pub fn from_settings(settings: &DatastoreSettings) -> Result<Arc<dyn Datastore>, DatabaseError> {
    match settings {
        DatastoreSettings::Sqlite { path } => Ok(Arc::new(SqliteStore::open(path)?)),
    }
}
