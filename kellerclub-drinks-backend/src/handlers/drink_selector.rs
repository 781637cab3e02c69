use std::any::Any;

use kellerclub_drinks_database::models::{Button, Layout};
use serde::Serialize;
use tracing::{debug, info};
use url::form_urlencoded;

use super::{AppState, ErrorHandler, Handler};
use crate::client_order_store;
use crate::error::HandlerError;
use crate::response::Response;
use crate::templating::DRINK_SELECTOR;

/// Grid of buttons for quickly recording orders during an event.
///
/// With `autosubmit` the pending orders sent along are persisted right away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrinkSelector {
    pub event_id: i64,
    pub layout: String,
    pub autosubmit: bool,
    pub pending: Vec<String>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CellView<'a> {
    Order {
        display_name: &'a str,
        drink_name: &'a str,
    },
    Link {
        display_name: &'a str,
        href: String,
    },
}

#[derive(Serialize)]
struct SelectorView<'a> {
    event_id: i64,
    layout: &'a str,
    autosubmit: bool,
    rows: Vec<Vec<Option<CellView<'a>>>>,
    pending: &'a [String],
}

impl DrinkSelector {
    fn selector_url(&self, layout: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("layout", layout);
        if !self.autosubmit {
            query.append_pair("autosubmit", "false");
        }
        format!("/event/{}/selector?{}", self.event_id, query.finish())
    }

    fn cell<'a>(&self, button: &'a Button) -> CellView<'a> {
        match button {
            Button::Order {
                display_name,
                drink_name,
            } => CellView::Order {
                display_name,
                drink_name,
            },
            Button::Link {
                display_name,
                target_layout,
            } => CellView::Link {
                display_name,
                href: self.selector_url(target_layout),
            },
        }
    }

    fn rows<'a>(&self, layout: &'a Layout) -> Vec<Vec<Option<CellView<'a>>>> {
        layout
            .grid
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| button.as_ref().map(|button| self.cell(button)))
                    .collect()
            })
            .collect()
    }
}

impl Handler for DrinkSelector {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError> {
        let layouts = state.datastore.all_layouts()?;
        let Some(layout) = layouts.get(&self.layout) else {
            return ErrorHandler::new(404, format!("Layout \"{}\" not found!", self.layout))
                .handle(state);
        };

        let flush = self.autosubmit && !self.pending.is_empty();
        if flush {
            let drinks = state.datastore.all_drinks()?;
            let (known, unknown): (Vec<String>, Vec<String>) = self
                .pending
                .iter()
                .cloned()
                .partition(|drink_name| drinks.contains_key(drink_name));
            if !unknown.is_empty() {
                debug!(event = self.event_id, ?unknown, "dropping unknown pending orders");
            }
            if !known.is_empty() {
                state.datastore.submit_order(self.event_id, &known)?;
                info!(event = self.event_id, orders = ?known, "submitted pending orders");
            }
        }

        let view = SelectorView {
            event_id: self.event_id,
            layout: &layout.name,
            autosubmit: self.autosubmit,
            rows: self.rows(layout),
            pending: if flush { &[] } else { self.pending.as_slice() },
        };
        let mut response = Response::html(state.templates.render(DRINK_SELECTOR, &view)?);
        if flush {
            response.add_header_modifier(client_order_store::clear_orders(self.event_id));
        }
        Ok(response)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::header::SET_COOKIE;
    use http::StatusCode;
    use kellerclub_drinks_database::models::{Button, Layout};

    use super::DrinkSelector;
    use crate::handlers::tests::{body, shared_state, state, FakeDatastore};
    use crate::handlers::Handler;

    fn selector(layout: &str, autosubmit: bool, pending: &[&str]) -> DrinkSelector {
        DrinkSelector {
            event_id: 1000,
            layout: layout.to_owned(),
            autosubmit,
            pending: pending.iter().map(|name| (*name).to_owned()).collect(),
        }
    }

    fn datastore() -> FakeDatastore {
        let mut datastore = FakeDatastore::with_drinks(&["bier", "mate"]);
        let mut layout = Layout::empty("default");
        layout.grid[0][0] = Some(Button::Order {
            display_name: "Bier".to_owned(),
            drink_name: "bier".to_owned(),
        });
        layout.grid[0][1] = Some(Button::Link {
            display_name: "Shots".to_owned(),
            target_layout: "shots".to_owned(),
        });
        datastore.layouts.insert("default".to_owned(), layout);
        datastore
    }

    #[test]
    fn unknown_layout_is_not_found_without_side_effects() {
        let datastore = Arc::new(datastore());
        let state = shared_state(Arc::clone(&datastore));

        let response = selector("missing", true, &["bier"]).handle(&state).unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body(&response).contains("Layout &quot;missing&quot; not found!"));
        assert!(response.serve(&state.settings).headers().get(SET_COOKIE).is_none());
        assert!(datastore.submitted.lock().unwrap().is_empty());
    }

    #[test]
    fn autosubmit_flushes_known_pending_orders() {
        let datastore = Arc::new(datastore());
        let state = shared_state(Arc::clone(&datastore));

        let response = selector("default", true, &["bier", "gone", "mate"])
            .handle(&state)
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *datastore.submitted.lock().unwrap(),
            [(1000, vec!["bier".to_owned(), "mate".to_owned()])]
        );
        let served = response.serve(&state.settings);
        let cookie = served.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("event-1000-orders=;"));
    }

    #[test]
    fn nothing_is_submitted_without_pending_orders() {
        let datastore = Arc::new(datastore());
        let state = shared_state(Arc::clone(&datastore));

        let response = selector("default", true, &[]).handle(&state).unwrap();

        assert!(datastore.submitted.lock().unwrap().is_empty());
        assert!(response.serve(&state.settings).headers().get(SET_COOKIE).is_none());
    }

    #[test]
    fn renders_order_and_link_buttons() {
        let page = body(
            &selector("default", false, &[])
                .handle(&state(datastore()))
                .unwrap(),
        );

        assert!(page.contains("name=\"order\" value=\"bier\""));
        assert!(page.contains(
            "href=\"/event/1000/selector?layout&#x3D;shots&amp;autosubmit&#x3D;false\""
        ));
        assert!(page.contains("action=\"/submit_order\""));
    }

    #[test]
    fn manual_mode_keeps_pending_orders() {
        let datastore = Arc::new(datastore());
        let state = shared_state(Arc::clone(&datastore));

        let response = selector("default", false, &["mate"]).handle(&state).unwrap();

        assert!(body(&response).contains("<li>mate</li>"));
        assert!(datastore.submitted.lock().unwrap().is_empty());
    }
}
