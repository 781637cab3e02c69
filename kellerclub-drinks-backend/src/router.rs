//! Picks the handler for a request. Routing never fails: anything that can
//! not be served becomes an [`ErrorHandler`].

use http::header::{CONTENT_TYPE, REFERER};
use http::request::Parts;
use http::Method;
use kellerclub_drinks_database::models::Drink;
use mime::Mime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client_order_store::pending_orders;
use crate::form_parser::{self, FormError, Param, ParsedForm};
use crate::handlers::{
    resistant, AddDrink, AddOrderToClient, ClearOrders, DrinkList, DrinkListFormat,
    DrinkSelector, DrinkSelectorSettings, ErrorHandler, Handler, RequestSource, StartEvent,
    StaticHandler, StopEvent, SubmitOrder, WelcomeScreen,
};

static VALID_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9/_]*(\.[a-z0-9]+)?$").expect("valid path regex"));

static EVENT_SELECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/event/([0-9]+)/selector$").expect("valid selector regex"));

static FONT_WOFF2: Lazy<Mime> = Lazy::new(|| "font/woff2".parse().expect("valid mime type"));

/// Everything routing needs from a request besides the path.
struct RequestInfo<'a> {
    parts: &'a Parts,
    body: &'a [u8],
}

impl<'a> RequestInfo<'a> {
    fn header(&self, name: http::header::HeaderName) -> Option<&'a str> {
        self.parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    fn referer(&self) -> String {
        self.header(REFERER).unwrap_or("/").to_owned()
    }

    fn form(&self, params: &[Param]) -> Result<ParsedForm, Box<dyn Handler>> {
        let body = std::str::from_utf8(self.body)
            .map_err(|_| error(400, "Request body is not valid UTF-8!"))?;
        form_parser::parse(body, params, self.header(CONTENT_TYPE)).map_err(form_error)
    }
}

fn error(status: u16, message: impl Into<String>) -> Box<dyn Handler> {
    Box::new(ErrorHandler::new(status, message))
}

fn form_error(form_error: FormError) -> Box<dyn Handler> {
    debug!("rejected parameters: {form_error}");
    error(400, form_error.to_string())
}

/// Chooses the handler for a request with the given head and body.
#[must_use]
pub fn route(parts: &Parts, body: &[u8]) -> Box<dyn Handler> {
    let request = RequestInfo { parts, body };
    let path = parts.uri.path();
    match parts.method {
        Method::GET => route_get(path, &request),
        Method::POST => route_post(path, &request),
        _ => error(400, "Unsupported HTTP method!"),
    }
}

fn valid_path(path: &str) -> bool {
    let valid = VALID_PATH.is_match(path);
    if !valid {
        warn!(path, "invalid path");
    }
    valid
}

fn route_get(path: &str, request: &RequestInfo<'_>) -> Box<dyn Handler> {
    if !valid_path(path) {
        return error(400, "Invalid path!");
    }

    let stripped = path.trim_end_matches('/');
    match stripped {
        "" => return resistant(WelcomeScreen),
        "/drinks" => {
            return resistant(DrinkList {
                format: DrinkListFormat::Html,
            })
        }
        _ => {}
    }

    if let Some(captures) = EVENT_SELECTOR.captures(stripped) {
        return match captures[1].parse() {
            Ok(event_id) => drink_selector(event_id, request),
            Err(_) => error(404, format!("Unknown GET route {path}!")),
        };
    }

    if stripped == "/api/drinks" {
        return resistant(DrinkList {
            format: DrinkListFormat::Json,
        });
    }

    let content_type = if path.ends_with(".css") {
        mime::TEXT_CSS
    } else if path.ends_with(".js") || path.ends_with(".mjs") {
        mime::TEXT_JAVASCRIPT
    } else if path.ends_with(".woff2") {
        FONT_WOFF2.clone()
    } else {
        return error(404, format!("Unknown GET route {path}!"));
    };
    Box::new(StaticHandler {
        path: path.to_owned(),
        content_type,
    })
}

fn drink_selector(event_id: i64, request: &RequestInfo<'_>) -> Box<dyn Handler> {
    let params = [
        Param::single("layout").default_values(&["default"]),
        Param::boolean("autosubmit").default_values(&["true"]),
    ];
    let query = request.parts.uri.query().unwrap_or_default();
    let parsed = match form_parser::parse(query, &params, None) {
        Ok(parsed) => parsed,
        Err(form_error) => return self::form_error(form_error),
    };
    match (parsed.text("layout"), parsed.boolean("autosubmit")) {
        (Ok(layout), Ok(autosubmit)) => resistant(DrinkSelector {
            event_id,
            layout: layout.to_owned(),
            autosubmit,
            pending: pending_orders(&request.parts.headers, event_id),
        }),
        (Err(form_error), _) | (_, Err(form_error)) => self::form_error(form_error),
    }
}

fn route_post(path: &str, request: &RequestInfo<'_>) -> Box<dyn Handler> {
    if !valid_path(path) {
        return error(400, "Invalid path!");
    }

    let result = match path.trim_end_matches('/') {
        "/add_order" => add_order(request),
        "/submit_order" => submit_order(request),
        "/clear_orders" => clear_orders(request),
        "/add_drink" => add_drink(request),
        "/start_event" => start_event(request),
        "/stop_event" => Ok(resistant(StopEvent)),
        "/settings/drink_selector" => drink_selector_settings(request),
        "/api/submit_order" => api_submit_order(request),
        _ => Err(error(400, format!("Unknown POST route {path}!"))),
    };
    match result {
        Ok(handler) | Err(handler) => handler,
    }
}

fn add_order(request: &RequestInfo<'_>) -> Result<Box<dyn Handler>, Box<dyn Handler>> {
    let form = request.form(&[
        Param::single("order").allowed(Drink::valid_name),
        Param::int("event"),
    ])?;
    let event_id = form.int("event").map_err(form_error)?;
    Ok(resistant(AddOrderToClient {
        drink_name: form.text("order").map_err(form_error)?.to_owned(),
        event_id,
        current: pending_orders(&request.parts.headers, event_id),
        redirect_to: request.referer(),
    }))
}

fn submit_order(request: &RequestInfo<'_>) -> Result<Box<dyn Handler>, Box<dyn Handler>> {
    let form = request.form(&[Param::new("order").min_values(1), Param::int("event")])?;
    Ok(resistant(SubmitOrder {
        orders: form.texts("order"),
        event_id: form.int("event").map_err(form_error)?,
        source: RequestSource::Form,
        redirect_to: request.referer(),
    }))
}

fn clear_orders(request: &RequestInfo<'_>) -> Result<Box<dyn Handler>, Box<dyn Handler>> {
    let form = request.form(&[Param::int("event")])?;
    Ok(resistant(ClearOrders {
        event_id: form.int("event").map_err(form_error)?,
        redirect_to: request.referer(),
    }))
}

fn add_drink(request: &RequestInfo<'_>) -> Result<Box<dyn Handler>, Box<dyn Handler>> {
    let form = request.form(&[Param::single("drink"), Param::single("display_name")])?;
    let drink = Drink::new(
        form.text("drink").map_err(form_error)?,
        form.text("display_name").map_err(form_error)?,
    )
    .map_err(|invalid| error(400, invalid.to_string()))?;
    Ok(resistant(AddDrink { drink }))
}

fn start_event(request: &RequestInfo<'_>) -> Result<Box<dyn Handler>, Box<dyn Handler>> {
    let form = request.form(&[Param::new("name").max_values(1)])?;
    Ok(resistant(StartEvent {
        name: form.optional_text("name").map(str::to_owned),
    }))
}

fn drink_selector_settings(
    request: &RequestInfo<'_>,
) -> Result<Box<dyn Handler>, Box<dyn Handler>> {
    let form = request.form(&[Param::checkbox("autosubmit")])?;
    Ok(resistant(DrinkSelectorSettings {
        autosubmit: form.boolean("autosubmit").map_err(form_error)?,
        referer: request.header(REFERER).map(str::to_owned),
    }))
}

fn api_submit_order(request: &RequestInfo<'_>) -> Result<Box<dyn Handler>, Box<dyn Handler>> {
    let content = String::from_utf8_lossy(request.body);
    let parsed: Value = serde_json::from_str(&content)
        .map_err(|_| error(400, format!("Malformed JSON {content}!")))?;

    let orders = parsed
        .get("orders")
        .ok_or_else(|| error(400, "Key 'orders' not present!"))?;
    let orders = orders
        .as_array()
        .ok_or_else(|| error(400, "'orders' is not a list!"))?;
    let orders = orders
        .iter()
        .map(|order| order.as_str().map(str::to_owned))
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| {
            error(
                400,
                format!("{} contains an item that is not a string!", parsed["orders"]),
            )
        })?;

    let event_id = parsed
        .get("event")
        .ok_or_else(|| error(400, "Key 'event' not present!"))?
        .as_i64()
        .ok_or_else(|| error(400, "'event' is not a number!"))?;

    Ok(resistant(SubmitOrder {
        orders,
        event_id,
        source: RequestSource::Ajax,
        redirect_to: request.referer(),
    }))
}
