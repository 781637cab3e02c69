use std::any::Any;

use http::StatusCode;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{AppState, Handler};
use crate::error::HandlerError;
use crate::response::Response;
use crate::templating::DRINK_LIST;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrinkListFormat {
    Html,
    Json,
}

/// All known drinks, as a page or as `name -> [display_name, current_price]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrinkList {
    pub format: DrinkListFormat,
}

#[derive(Serialize)]
struct DrinkView<'a> {
    name: &'a str,
    display_name: &'a str,
    price: Option<i64>,
}

#[derive(Serialize)]
struct DrinkListView<'a> {
    drinks: Vec<DrinkView<'a>>,
}

impl Handler for DrinkList {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError> {
        let drinks = state.datastore.all_drinks()?;
        match self.format {
            DrinkListFormat::Html => {
                let view = DrinkListView {
                    drinks: drinks
                        .values()
                        .map(|drink| DrinkView {
                            name: drink.name(),
                            display_name: drink.display_name(),
                            price: drink.current_price(),
                        })
                        .collect(),
                };
                Ok(Response::html(state.templates.render(DRINK_LIST, &view)?))
            }
            DrinkListFormat::Json => {
                let payload: Map<String, Value> = drinks
                    .values()
                    .map(|drink| {
                        (
                            drink.name().to_owned(),
                            json!([drink.display_name(), drink.current_price()]),
                        )
                    })
                    .collect();
                Ok(Response::ajax(Some(&Value::Object(payload)), StatusCode::OK))
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use kellerclub_drinks_database::models::{Drink, PriceHistory};
    use serde_json::{json, Value};

    use super::{DrinkList, DrinkListFormat};
    use crate::handlers::tests::{body, state, FakeDatastore};
    use crate::handlers::Handler;

    fn datastore() -> FakeDatastore {
        let datastore = FakeDatastore::with_drinks(&["wasser"]);
        datastore.drinks.lock().unwrap().insert(
            "bier".to_owned(),
            Drink::new("bier", "Bier 0,5")
                .unwrap()
                .with_price_history(PriceHistory::new(250)),
        );
        datastore
    }

    #[test]
    fn json_maps_names_to_display_name_and_price() {
        let response = DrinkList {
            format: DrinkListFormat::Json,
        }
        .handle(&state(datastore()))
        .unwrap();

        let payload: Value = serde_json::from_str(&body(&response)).unwrap();
        assert_eq!(
            payload,
            json!({"bier": ["Bier 0,5", 250], "wasser": ["WASSER", null]})
        );
    }

    #[test]
    fn html_lists_drinks_and_add_form() {
        let page = body(
            &DrinkList {
                format: DrinkListFormat::Html,
            }
            .handle(&state(datastore()))
            .unwrap(),
        );

        assert!(page.contains("Bier 0,5"));
        assert!(page.contains("<code>wasser</code>"));
        assert!(page.contains("action=\"/add_drink\""));
    }
}
