use std::any::Any;

use tracing::debug;
use url::{ParseError, Url};

use super::{AppState, Handler};
use crate::error::HandlerError;
use crate::response::Response;

/// Switches autosubmit of the drink selector by rewriting the query of the
/// page the form was sent from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrinkSelectorSettings {
    pub autosubmit: bool,
    pub referer: Option<String>,
}

/// Resolves referers sent without scheme and host.
const RELATIVE_BASE: &str = "http://localhost";

fn parse_referer(referer: &str) -> Option<(Url, bool)> {
    match Url::parse(referer) {
        Ok(url) => Some((url, false)),
        Err(ParseError::RelativeUrlWithoutBase) => Url::parse(RELATIVE_BASE)
            .and_then(|base| base.join(referer))
            .ok()
            .map(|url| (url, true)),
        Err(_) => None,
    }
}

impl DrinkSelectorSettings {
    fn target(&self) -> String {
        let Some((mut url, relative)) = self.referer.as_deref().and_then(parse_referer) else {
            debug!(referer = ?self.referer, "no usable referer, going home");
            return "/".to_owned();
        };

        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "autosubmit")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        if !self.autosubmit {
            pairs.push(("autosubmit".to_owned(), "false".to_owned()));
        }

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        if relative {
            url[url::Position::BeforePath..].to_owned()
        } else {
            url.into()
        }
    }
}

impl Handler for DrinkSelectorSettings {
    fn handle(&self, _: &AppState) -> Result<Response, HandlerError> {
        Ok(Response::redirect(self.target()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::DrinkSelectorSettings;

    fn target(autosubmit: bool, referer: Option<&str>) -> String {
        DrinkSelectorSettings {
            autosubmit,
            referer: referer.map(str::to_owned),
        }
        .target()
    }

    #[test]
    fn disabling_sets_false() {
        assert_eq!(
            target(false, Some("http://bar/event/1/selector?layout=shots")),
            "http://bar/event/1/selector?layout=shots&autosubmit=false"
        );
    }

    #[test]
    fn enabling_removes_flag() {
        assert_eq!(
            target(
                true,
                Some("http://bar/event/1/selector?autosubmit=false&layout=shots")
            ),
            "http://bar/event/1/selector?layout=shots"
        );
        assert_eq!(
            target(true, Some("http://bar/event/1/selector?autosubmit=false")),
            "http://bar/event/1/selector"
        );
    }

    #[test]
    fn disabling_twice_keeps_one_flag() {
        assert_eq!(
            target(false, Some("http://bar/?autosubmit=false")),
            "http://bar/?autosubmit=false"
        );
    }

    #[test]
    fn missing_or_broken_referer_goes_home() {
        assert_eq!(target(false, None), "/");
        assert_eq!(target(true, Some("http://[::1")), "/");
    }

    #[test]
    fn relative_referer_stays_relative() {
        assert_eq!(
            target(false, Some("/event/1/selector?layout=x")),
            "/event/1/selector?layout=x&autosubmit=false"
        );
        assert_eq!(
            target(true, Some("/event/1/selector?autosubmit=false")),
            "/event/1/selector"
        );
    }
}
