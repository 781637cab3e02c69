pub mod add_drink;
pub mod drink_list;
pub mod drink_selector;
pub mod error;
pub mod events;
pub mod orders;
pub mod settings;
pub mod static_files;
pub mod welcome_screen;

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use kellerclub_drinks_config::Settings;
use kellerclub_drinks_database::Datastore;
use tracing::error;

pub use self::add_drink::AddDrink;
pub use self::drink_list::{DrinkList, DrinkListFormat};
pub use self::drink_selector::DrinkSelector;
pub use self::error::ErrorHandler;
pub use self::events::{StartEvent, StopEvent};
pub use self::orders::{AddOrderToClient, ClearOrders, SubmitOrder};
pub use self::settings::DrinkSelectorSettings;
pub use self::static_files::StaticHandler;
pub use self::welcome_screen::WelcomeScreen;
use crate::error::HandlerError;
use crate::response::Response;
use crate::templating::Templates;

/// Everything a handler may use, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub datastore: Arc<dyn Datastore>,
    pub templates: Arc<Templates>,
}

/// One unit of work, chosen by the router for a single request.
pub trait Handler: Debug + Send {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError>;

    /// Gives access to the concrete handler, mostly for inspecting routing decisions.
    fn as_any(&self) -> &dyn Any;
}

/// How a request was sent, which decides the kind of answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource {
    /// An HTML form, answered with a redirect.
    Form,
    /// A script, answered with JSON.
    Ajax,
}

/// Turns template errors and user-caused database errors into error pages.
///
/// Database errors the datastore can not explain are passed on.
#[derive(Debug)]
pub struct Resistant<H>(pub H);

impl<H: Handler> Handler for Resistant<H> {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError> {
        match self.0.handle(state) {
            Err(HandlerError::Template(template_error)) => {
                error!("Template Error: {template_error}");
                ErrorHandler::new(400, "Template Error").handle(state)
            }
            Err(HandlerError::Database(database_error)) => {
                match state.datastore.handle_exception(&database_error) {
                    Some(message) => {
                        ErrorHandler::new(400, format!("Database Error: {message}")).handle(state)
                    }
                    None => Err(database_error.into()),
                }
            }
            result => result,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self.0.as_any()
    }
}

pub(crate) fn resistant<H: Handler + 'static>(handler: H) -> Box<dyn Handler> {
    Box::new(Resistant(handler))
}
