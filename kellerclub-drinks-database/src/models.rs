use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::DatabaseError;
use crate::schema::{drink, event, price_change, purchase_order};

/// Number of rows and columns of a selector layout.
pub const GRID_SIZE: usize = 5;

static DRINK_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-zA-Z0-9_]+$").expect("drink name pattern is valid"));

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid drink name {0}!")]
pub struct InvalidDrinkName(pub String);

/// A drink or bundle that can be ordered.
///
/// The internal `name` is validated on construction and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drink {
    name: String,
    display_name: String,
    price_history: Option<PriceHistory>,
}

impl Drink {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self, InvalidDrinkName> {
        let name = name.into();
        if !Self::valid_name(&name) {
            return Err(InvalidDrinkName(name));
        }
        Ok(Self {
            name,
            display_name: display_name.into(),
            price_history: None,
        })
    }

    #[must_use]
    pub fn with_price_history(mut self, price_history: PriceHistory) -> Self {
        self.price_history = Some(price_history);
        self
    }

    /// Whether `name` may be used as the internal name of a drink.
    #[must_use]
    pub fn valid_name(name: &str) -> bool {
        DRINK_NAME.is_match(name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub const fn price_history(&self) -> Option<&PriceHistory> {
        self.price_history.as_ref()
    }

    #[must_use]
    pub fn current_price(&self) -> Option<i64> {
        self.price_history.as_ref().map(PriceHistory::current)
    }
}

/// Base price of a drink plus the points in time at which it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceHistory {
    base_price: i64,
    changes: BTreeMap<DateTime<Utc>, i64>,
}

impl PriceHistory {
    #[must_use]
    pub const fn new(base_price: i64) -> Self {
        Self {
            base_price,
            changes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_change(mut self, valid_from: DateTime<Utc>, price: i64) -> Self {
        self.changes.insert(valid_from, price);
        self
    }

    #[must_use]
    pub const fn base_price(&self) -> i64 {
        self.base_price
    }

    pub fn changes(&self) -> impl Iterator<Item = (&DateTime<Utc>, &i64)> {
        self.changes.iter()
    }

    /// Price of the latest change point not after `time`, else the base price.
    #[must_use]
    pub fn price_at(&self, time: DateTime<Utc>) -> i64 {
        self.changes
            .range(..=time)
            .next_back()
            .map_or(self.base_price, |(_, price)| *price)
    }

    #[must_use]
    pub fn current(&self) -> i64 {
        self.changes
            .values()
            .next_back()
            .copied()
            .unwrap_or(self.base_price)
    }
}

/// One opening of the venue. Orders are grouped by event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub start_time: DateTime<Utc>,
    pub name: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Event {
    /// Identifier used in URLs and cookies: the start time in unix seconds.
    /// Two events can not start within the same second.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.start_time.timestamp()
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.end_time.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    pub id: i32,
    pub drink_name: String,
    pub event_start: DateTime<Utc>,
    pub ordered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Button {
    Order {
        display_name: String,
        drink_name: String,
    },
    /// Switches the selector to another layout, looked up by name.
    Link {
        display_name: String,
        target_layout: String,
    },
}

impl Button {
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Order { display_name, .. } | Self::Link { display_name, .. } => display_name,
        }
    }
}

pub type ButtonGrid = [[Option<Button>; GRID_SIZE]; GRID_SIZE];

/// A named 5x5 grid of buttons. The outer index is `xpos`, the inner one `ypos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub name: String,
    pub grid: ButtonGrid,
}

impl Layout {
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grid: ButtonGrid::default(),
        }
    }

    #[must_use]
    pub fn button(&self, xpos: usize, ypos: usize) -> Option<&Button> {
        self.grid.get(xpos)?.get(ypos)?.as_ref()
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.grid.iter().flatten().flatten()
    }
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = drink)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct DrinkRow {
    pub name: String,
    pub display_name: String,
    pub base_price: Option<i64>,
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = price_change)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct PriceChangeRow {
    pub drink_name: String,
    pub valid_from: i64,
    pub price: i64,
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = event)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct EventRow {
    pub start_time: i64,
    pub name: Option<String>,
    pub end_time: Option<i64>,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = purchase_order)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct PurchaseOrderRow {
    pub id: i32,
    pub ordered_at: i64,
    pub drink_name: String,
    pub event_start: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = purchase_order)]
pub(crate) struct NewPurchaseOrder<'a> {
    pub ordered_at: i64,
    pub drink_name: &'a str,
    pub event_start: i64,
}

pub(crate) fn from_unix_seconds(seconds: i64) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::from_timestamp(seconds, 0).ok_or(DatabaseError::InvalidTimestamp(seconds))
}

pub(crate) fn from_unix_millis(millis: i64) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::from_timestamp_millis(millis).ok_or(DatabaseError::InvalidTimestamp(millis))
}

impl TryFrom<EventRow> for Event {
    type Error = DatabaseError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            start_time: from_unix_seconds(row.start_time)?,
            name: row.name,
            end_time: row.end_time.map(from_unix_seconds).transpose()?,
        })
    }
}

impl TryFrom<PurchaseOrderRow> for PurchaseOrder {
    type Error = DatabaseError;

    fn try_from(row: PurchaseOrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            drink_name: row.drink_name,
            event_start: from_unix_seconds(row.event_start)?,
            ordered_at: from_unix_millis(row.ordered_at)?,
        })
    }
}
