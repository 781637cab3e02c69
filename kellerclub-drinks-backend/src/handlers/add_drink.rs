use std::any::Any;

use kellerclub_drinks_database::models::Drink;
use tracing::info;

use super::{AppState, Handler};
use crate::error::HandlerError;
use crate::response::Response;

/// Registers a new drink and goes back to the drink list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDrink {
    pub drink: Drink,
}

impl Handler for AddDrink {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError> {
        state.datastore.add_drink(&self.drink)?;
        info!(drink = self.drink.name(), "added drink");
        Ok(Response::redirect("/drinks"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
