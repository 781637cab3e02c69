use std::any::Any;

use http::StatusCode;
use tracing::{debug, info};

use super::{AppState, Handler, RequestSource};
use crate::client_order_store;
use crate::error::HandlerError;
use crate::response::Response;

/// Appends a drink to the client's pending orders. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOrderToClient {
    pub drink_name: String,
    pub event_id: i64,
    pub current: Vec<String>,
    pub redirect_to: String,
}

impl Handler for AddOrderToClient {
    fn handle(&self, _: &AppState) -> Result<Response, HandlerError> {
        let mut orders = self.current.clone();
        orders.push(self.drink_name.clone());
        debug!(event = self.event_id, ?orders, "pending orders");
        Ok(Response::redirect(&self.redirect_to)
            .with_header_modifier(client_order_store::store_orders(self.event_id, &orders)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Persists orders for an event and forgets the client's pending list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOrder {
    pub orders: Vec<String>,
    pub event_id: i64,
    pub source: RequestSource,
    pub redirect_to: String,
}

impl Handler for SubmitOrder {
    fn handle(&self, state: &AppState) -> Result<Response, HandlerError> {
        let ids = state.datastore.submit_order(self.event_id, &self.orders)?;
        info!(event = self.event_id, orders = ?self.orders, ?ids, "submitted orders");
        let response = match self.source {
            RequestSource::Form => Response::redirect(&self.redirect_to),
            RequestSource::Ajax => Response::ajax(None, StatusCode::OK),
        };
        Ok(response.with_header_modifier(client_order_store::clear_orders(self.event_id)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearOrders {
    pub event_id: i64,
    pub redirect_to: String,
}

impl Handler for ClearOrders {
    fn handle(&self, _: &AppState) -> Result<Response, HandlerError> {
        Ok(Response::redirect(&self.redirect_to)
            .with_header_modifier(client_order_store::clear_orders(self.event_id)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::header::{LOCATION, SET_COOKIE};
    use http::StatusCode;

    use super::{AddOrderToClient, ClearOrders, SubmitOrder};
    use crate::handlers::tests::{body, shared_state, state, FakeDatastore};
    use crate::handlers::{Handler, RequestSource};

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn add_order_appends_to_cookie() {
        let state = state(FakeDatastore::default());

        let response = AddOrderToClient {
            drink_name: "mate".to_owned(),
            event_id: 7,
            current: names(&["bier"]),
            redirect_to: "/event/7/selector".to_owned(),
        }
        .handle(&state)
        .unwrap()
        .serve(&state.settings);

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/event/7/selector");
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("event-7-orders=bier,mate;"));
    }

    #[test]
    fn form_submit_persists_clears_and_redirects() {
        let datastore = Arc::new(FakeDatastore::with_drinks(&["bier"]));
        let state = shared_state(Arc::clone(&datastore));

        let response = SubmitOrder {
            orders: names(&["bier", "bier"]),
            event_id: 7,
            source: RequestSource::Form,
            redirect_to: "/".to_owned(),
        }
        .handle(&state)
        .unwrap()
        .serve(&state.settings);

        assert_eq!(
            *datastore.submitted.lock().unwrap(),
            [(7, names(&["bier", "bier"]))]
        );
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("event-7-orders=;"));
    }

    #[test]
    fn ajax_submit_answers_empty_ok() {
        let state = state(FakeDatastore::with_drinks(&["bier"]));

        let response = SubmitOrder {
            orders: names(&["bier"]),
            event_id: 7,
            source: RequestSource::Ajax,
            redirect_to: "/".to_owned(),
        }
        .handle(&state)
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(&response).is_empty());
        assert!(response
            .serve(&state.settings)
            .headers()
            .contains_key(SET_COOKIE));
    }

    #[test]
    fn clear_orders_expires_cookie() {
        let state = state(FakeDatastore::default());

        let response = ClearOrders {
            event_id: 3,
            redirect_to: "/back".to_owned(),
        }
        .handle(&state)
        .unwrap()
        .serve(&state.settings);

        assert_eq!(response.headers()[LOCATION], "/back");
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }
}
