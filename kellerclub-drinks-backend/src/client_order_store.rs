//! Orders a client collected but did not submit yet. They live in one cookie
//! per event as a comma separated list of drink names.

use cookie::time::OffsetDateTime;
use cookie::{Cookie, SameSite};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use kellerclub_drinks_config::Settings;
use kellerclub_drinks_database::models::Drink;
use tracing::{debug, warn};

use crate::response::HeaderModifier;

#[must_use]
pub fn cookie_name(event_id: i64) -> String {
    format!("event-{event_id}-orders")
}

/// Pending orders of `event_id` sent by the client. Names that can not be
/// drinks are dropped.
#[must_use]
pub fn pending_orders(headers: &HeaderMap, event_id: i64) -> Vec<String> {
    let name = cookie_name(event_id);
    headers
        .get_all(COOKIE)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
        .map(std::borrow::ToOwned::to_owned)
        .flat_map(Cookie::split_parse)
        .filter_map(std::result::Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| {
            cookie
                .value()
                .split(',')
                .filter(|drink_name| Drink::valid_name(drink_name))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Replaces the pending orders of `event_id` with `orders`.
pub fn store_orders(event_id: i64, orders: &[String]) -> impl HeaderModifier {
    let cookie = Cookie::build((cookie_name(event_id), orders.join(",")))
        .same_site(SameSite::Strict)
        .path("/")
        .build();
    move |headers: &mut HeaderMap, _: &Settings| set_cookie(headers, &cookie)
}

/// Drops the pending orders of `event_id`.
pub fn clear_orders(event_id: i64) -> impl HeaderModifier {
    let cookie = Cookie::build((cookie_name(event_id), ""))
        .same_site(SameSite::Strict)
        .path("/")
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build();
    move |headers: &mut HeaderMap, _: &Settings| {
        debug!(cookie = cookie.name(), "clearing pending orders");
        set_cookie(headers, &cookie);
    }
}

fn set_cookie(headers: &mut HeaderMap, cookie: &Cookie<'static>) {
    match HeaderValue::try_from(cookie.to_string()) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(error) => warn!("failed to encode cookie {}: {error}", cookie.name()),
    }
}

#[cfg(test)]
mod tests {
    use http::header::{COOKIE, SET_COOKIE};
    use http::{HeaderMap, HeaderValue};

    use super::{clear_orders, pending_orders, store_orders};
    use crate::response::tests::settings;
    use crate::response::HeaderModifier;

    fn apply(modifier: impl HeaderModifier + 'static) -> String {
        let mut headers = HeaderMap::new();
        let modifier: Box<dyn HeaderModifier> = Box::new(modifier);
        modifier.apply(&mut headers, &settings());
        headers[SET_COOKIE].to_str().unwrap().to_owned()
    }

    #[test]
    fn pending_orders_are_read_per_event() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("event-5-orders=bier,mate; event-6-orders=wasser"),
        );

        assert_eq!(pending_orders(&headers, 5), ["bier", "mate"]);
        assert_eq!(pending_orders(&headers, 6), ["wasser"]);
        assert!(pending_orders(&headers, 7).is_empty());
    }

    #[test]
    fn invalid_names_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("event-5-orders=bier,<script>,,mate"),
        );

        assert_eq!(pending_orders(&headers, 5), ["bier", "mate"]);
    }

    #[test]
    fn stored_orders_are_strict_and_site_wide() {
        let cookie = apply(store_orders(5, &["bier".to_owned(), "mate".to_owned()]));

        assert!(cookie.starts_with("event-5-orders=bier,mate"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
    }

    #[test]
    fn cleared_orders_expire_at_the_epoch() {
        let cookie = apply(clear_orders(5));

        assert!(cookie.starts_with("event-5-orders=;"));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }
}
