//! Web front of the drinks register: routing, form parsing, handlers and the
//! HTTP server around them.

pub mod client_order_store;
pub mod error;
pub mod form_parser;
pub mod handlers;
pub mod response;
pub mod router;
pub mod server;
pub mod templating;
