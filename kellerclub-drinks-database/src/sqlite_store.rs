use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rand::Rng as _;
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::layout_factory::{self, ButtonRow};
use crate::models::{
    from_unix_seconds, Button, Drink, DrinkRow, Event, EventRow, Layout, NewPurchaseOrder,
    PriceChangeRow, PriceHistory, PurchaseOrder, PurchaseOrderRow,
};
use crate::schema::{
    drink, event, link_button, order_button, price_change, purchase_order, selector_button,
    selector_layout,
};
use crate::Datastore;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Upper bound of the random offset applied to an order whose timestamp collides.
pub const MAX_COLLISION_OFFSET_MILLIS: i64 = 1000;

/// Inserts tried for one order before the collision is reported.
pub const MAX_COLLISION_ATTEMPTS: u32 = 32;

const CONNECTION_SETUP: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// Datastore backed by a single SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    database_url: String,
}

impl SqliteStore {
    /// Opens the database at `path`, creating it if needed, and migrates it.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let database_url = path
            .to_str()
            .ok_or_else(|| DatabaseError::InvalidPath(path.to_owned()))?
            .to_owned();
        let store = Self { database_url };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn connection(&self) -> Result<SqliteConnection, DatabaseError> {
        let mut connection = SqliteConnection::establish(&self.database_url)?;
        connection.batch_execute(CONNECTION_SETUP)?;
        Ok(connection)
    }

    pub fn run_migrations(&self) -> Result<(), DatabaseError> {
        let mut connection = self.connection()?;
        let applied = connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(|error| DatabaseError::Migration(error.to_string()))?;
        for version in applied {
            info!(%version, "applied database migration");
        }
        Ok(())
    }

    /// Orders recorded for an event, oldest first.
    pub fn event_orders(&self, event_id: i64) -> Result<Vec<PurchaseOrder>, DatabaseError> {
        let mut connection = self.connection()?;
        purchase_order::table
            .filter(purchase_order::event_start.eq(event_id))
            .order((purchase_order::ordered_at.asc(), purchase_order::drink_name.asc()))
            .select(PurchaseOrderRow::as_select())
            .load(&mut connection)?
            .into_iter()
            .map(PurchaseOrder::try_from)
            .collect()
    }
}

fn insert_order(
    connection: &mut SqliteConnection,
    event_start: i64,
    drink_name: &str,
    ordered_at: i64,
) -> Result<i32, DatabaseError> {
    let mut result = try_insert_order(connection, event_start, drink_name, ordered_at);
    let mut attempt = 1;
    while let Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) =
        result
    {
        if attempt >= MAX_COLLISION_ATTEMPTS {
            break;
        }
        attempt += 1;
        let offset = rand::thread_rng().gen_range(1..=MAX_COLLISION_OFFSET_MILLIS);
        debug!(drink_name, ordered_at, offset, attempt, "order timestamp taken, moving it");
        result = try_insert_order(connection, event_start, drink_name, ordered_at + offset);
    }
    Ok(result?)
}

fn try_insert_order(
    connection: &mut SqliteConnection,
    event_start: i64,
    drink_name: &str,
    ordered_at: i64,
) -> QueryResult<i32> {
    diesel::insert_into(purchase_order::table)
        .values(NewPurchaseOrder {
            ordered_at,
            drink_name,
            event_start,
        })
        .returning(purchase_order::id)
        .get_result(connection)
}

impl Datastore for SqliteStore {
    fn all_drinks(&self) -> Result<BTreeMap<String, Drink>, DatabaseError> {
        let mut connection = self.connection()?;
        let drink_rows = drink::table
            .select(DrinkRow::as_select())
            .load(&mut connection)?;
        let mut price_changes: BTreeMap<String, Vec<PriceChangeRow>> = BTreeMap::new();
        for change in price_change::table
            .select(PriceChangeRow::as_select())
            .load(&mut connection)?
        {
            price_changes
                .entry(change.drink_name.clone())
                .or_default()
                .push(change);
        }

        drink_rows
            .into_iter()
            .map(|row| -> Result<(String, Drink), DatabaseError> {
                let mut drink = Drink::new(row.name, row.display_name)?;
                if let Some(base_price) = row.base_price {
                    let mut history = PriceHistory::new(base_price);
                    for change in price_changes.remove(drink.name()).unwrap_or_default() {
                        history = history
                            .with_change(from_unix_seconds(change.valid_from)?, change.price);
                    }
                    drink = drink.with_price_history(history);
                }
                Ok((drink.name().to_owned(), drink))
            })
            .collect()
    }

    fn add_drink(&self, drink: &Drink) -> Result<(), DatabaseError> {
        let mut connection = self.connection()?;
        connection.immediate_transaction(|connection| {
            diesel::insert_into(drink::table)
                .values(&DrinkRow {
                    name: drink.name().to_owned(),
                    display_name: drink.display_name().to_owned(),
                    base_price: drink.price_history().map(PriceHistory::base_price),
                })
                .execute(connection)?;
            if let Some(history) = drink.price_history() {
                for (valid_from, price) in history.changes() {
                    diesel::insert_into(price_change::table)
                        .values(&PriceChangeRow {
                            drink_name: drink.name().to_owned(),
                            valid_from: valid_from.timestamp(),
                            price: *price,
                        })
                        .execute(connection)?;
                }
            }
            Ok::<_, DatabaseError>(())
        })?;
        info!(drink = drink.name(), "added drink");
        Ok(())
    }

    fn start_event(
        &self,
        start_time: Option<DateTime<Utc>>,
        name: Option<&str>,
    ) -> Result<Event, DatabaseError> {
        let start_time = start_time.unwrap_or_else(Utc::now).timestamp();
        let mut connection = self.connection()?;
        let event = connection.immediate_transaction(|connection| {
            let running: i64 = event::table
                .filter(event::end_time.is_null())
                .count()
                .get_result(connection)?;
            if running > 0 {
                return Err(DatabaseError::EventStillRunning);
            }
            let taken: i64 = event::table
                .filter(event::start_time.eq(start_time))
                .count()
                .get_result(connection)?;
            if taken > 0 {
                return Err(DatabaseError::EventStartTaken);
            }
            let row = EventRow {
                start_time,
                name: name.map(str::to_owned),
                end_time: None,
            };
            diesel::insert_into(event::table)
                .values(&row)
                .execute(connection)?;
            Event::try_from(row)
        })?;
        info!(event = event.id(), name = ?event.name, "started event");
        Ok(event)
    }

    fn stop_current_event(&self, end_time: Option<DateTime<Utc>>) -> Result<bool, DatabaseError> {
        let end_time = end_time.unwrap_or_else(Utc::now).timestamp();
        let mut connection = self.connection()?;
        let stopped = diesel::update(event::table.filter(event::end_time.is_null()))
            .set(event::end_time.eq(end_time))
            .execute(&mut connection)?;
        Ok(stopped > 0)
    }

    fn current_event(&self) -> Result<Option<Event>, DatabaseError> {
        let mut connection = self.connection()?;
        event::table
            .filter(event::end_time.is_null())
            .order(event::start_time.desc())
            .select(EventRow::as_select())
            .first(&mut connection)
            .optional()?
            .map(Event::try_from)
            .transpose()
    }

    fn submit_order_at(
        &self,
        event_id: i64,
        drink_names: &[String],
        ordered_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<i32>, DatabaseError> {
        let mut connection = self.connection()?;
        let ids = connection.immediate_transaction(|connection| {
            let mut ids = Vec::with_capacity(drink_names.len());
            for drink_name in drink_names {
                let ordered_at = ordered_at.unwrap_or_else(Utc::now).timestamp_millis();
                ids.push(insert_order(connection, event_id, drink_name, ordered_at)?);
            }
            Ok::<_, DatabaseError>(ids)
        })?;
        debug!(event = event_id, orders = ?drink_names, "submitted orders");
        Ok(ids)
    }

    fn all_layouts(&self) -> Result<BTreeMap<String, Layout>, DatabaseError> {
        let mut connection = self.connection()?;
        let layout_names: Vec<String> = selector_layout::table
            .select(selector_layout::name)
            .load(&mut connection)?;
        let order_rows: Vec<(String, i32, i32, Option<String>, String, String)> =
            order_button::table
                .inner_join(selector_button::table)
                .inner_join(drink::table)
                .select((
                    selector_button::layout_name,
                    selector_button::xpos,
                    selector_button::ypos,
                    selector_button::display_name,
                    order_button::drink_name,
                    drink::display_name,
                ))
                .load(&mut connection)?;
        let link_rows: Vec<(String, i32, i32, Option<String>, String)> = link_button::table
            .inner_join(selector_button::table)
            .select((
                selector_button::layout_name,
                selector_button::xpos,
                selector_button::ypos,
                selector_button::display_name,
                link_button::linked_layout,
            ))
            .load(&mut connection)?;

        let order_buttons = order_rows.into_iter().map(
            |(layout_name, xpos, ypos, display_name, drink_name, drink_display_name)| ButtonRow {
                layout_name,
                xpos,
                ypos,
                button: Button::Order {
                    display_name: display_name.unwrap_or(drink_display_name),
                    drink_name,
                },
            },
        );
        let link_buttons = link_rows.into_iter().map(
            |(layout_name, xpos, ypos, display_name, target_layout)| ButtonRow {
                layout_name,
                xpos,
                ypos,
                button: Button::Link {
                    display_name: display_name.unwrap_or_else(|| target_layout.clone()),
                    target_layout,
                },
            },
        );

        Ok(layout_factory::from_button_rows(
            layout_names,
            order_buttons.chain(link_buttons),
        ))
    }

    fn handle_exception(&self, error: &DatabaseError) -> Option<String> {
        match error {
            DatabaseError::InvalidDrinkName(error) => Some(error.to_string()),
            DatabaseError::Query(diesel::result::Error::DatabaseError(kind, information)) => {
                match kind {
                    DatabaseErrorKind::UniqueViolation => {
                        Some(format!("Entry already exists: {}", information.message()))
                    }
                    DatabaseErrorKind::ForeignKeyViolation => {
                        Some("Referenced drink, event or layout does not exist.".to_owned())
                    }
                    DatabaseErrorKind::NotNullViolation | DatabaseErrorKind::CheckViolation => {
                        Some(format!("Invalid value: {}", information.message()))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}
