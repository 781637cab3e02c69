use std::time::Duration;

use bytes::Bytes;
use headers::{CacheControl, ContentType, HeaderMapExt as _};
use http::header::LOCATION;
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;
use kellerclub_drinks_config::Settings;
use mime::Mime;
use tracing::warn;

/// Changes the response headers right before the response is sent.
///
/// Modifiers are consumed when applied, so each one runs exactly once.
pub trait HeaderModifier: Send {
    fn apply(self: Box<Self>, headers: &mut HeaderMap, settings: &Settings);
}

impl<F> HeaderModifier for F
where
    F: FnOnce(&mut HeaderMap, &Settings) + Send,
{
    fn apply(self: Box<Self>, headers: &mut HeaderMap, settings: &Settings) {
        (*self)(headers, settings);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    Redirect { location: String },
    Error { status: StatusCode },
    Success { content_type: Mime, cacheable: bool },
    Ajax { status: StatusCode },
}

#[must_use]
pub struct Response {
    kind: ResponseKind,
    body: Bytes,
    header_modifiers: Vec<Box<dyn HeaderModifier>>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("kind", &self.kind)
            .field("body", &self.body)
            .field("header_modifiers", &self.header_modifiers.len())
            .finish()
    }
}

impl Response {
    const fn new(kind: ResponseKind, body: Bytes) -> Self {
        Self {
            kind,
            body,
            header_modifiers: Vec::new(),
        }
    }

    /// `303 See Other` to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(
            ResponseKind::Redirect {
                location: location.into(),
            },
            Bytes::new(),
        )
    }

    /// An HTML error page. Codes outside of `400..500` become `400`.
    pub fn error(status: u16, content: impl Into<Bytes>) -> Self {
        let status = if (400..500).contains(&status) {
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST)
        } else {
            StatusCode::BAD_REQUEST
        };
        Self::new(ResponseKind::Error { status }, content.into())
    }

    pub fn success(content: impl Into<Bytes>, content_type: Mime, cacheable: bool) -> Self {
        Self::new(
            ResponseKind::Success {
                content_type,
                cacheable,
            },
            content.into(),
        )
    }

    /// A freshly rendered page that must not be cached.
    pub fn html(content: impl Into<Bytes>) -> Self {
        Self::success(content, mime::TEXT_HTML_UTF_8, false)
    }

    /// A JSON answer. Without a payload the body stays empty.
    pub fn ajax(payload: Option<&serde_json::Value>, status: StatusCode) -> Self {
        let body = payload.map_or_else(Bytes::new, |payload| Bytes::from(payload.to_string()));
        Self::new(ResponseKind::Ajax { status }, body)
    }

    pub fn add_header_modifier(&mut self, modifier: impl HeaderModifier + 'static) {
        self.header_modifiers.push(Box::new(modifier));
    }

    pub fn with_header_modifier(mut self, modifier: impl HeaderModifier + 'static) -> Self {
        self.add_header_modifier(modifier);
        self
    }

    #[must_use]
    pub const fn kind(&self) -> &ResponseKind {
        &self.kind
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.kind {
            ResponseKind::Redirect { .. } => StatusCode::SEE_OTHER,
            ResponseKind::Error { status } | ResponseKind::Ajax { status } => *status,
            ResponseKind::Success { .. } => StatusCode::OK,
        }
    }

    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Builds the HTTP response, running the header modifiers in the order
    /// they were added.
    #[must_use]
    pub fn serve(self, settings: &Settings) -> http::Response<Full<Bytes>> {
        let status = self.status();
        let mut response = http::Response::new(Full::new(self.body));
        *response.status_mut() = status;
        let headers = response.headers_mut();

        match self.kind {
            ResponseKind::Redirect { location } => {
                let location = HeaderValue::try_from(location).unwrap_or_else(|error| {
                    warn!("unrepresentable redirect target: {error}");
                    HeaderValue::from_static("/")
                });
                headers.insert(LOCATION, location);
            }
            ResponseKind::Error { .. } => {
                headers.typed_insert(ContentType::from(mime::TEXT_HTML_UTF_8));
            }
            ResponseKind::Success {
                content_type,
                cacheable,
            } => {
                headers.typed_insert(ContentType::from(content_type));
                headers.typed_insert(if cacheable {
                    CacheControl::new()
                        .with_max_age(Duration::from_secs(u64::from(settings.cache_age)))
                } else {
                    CacheControl::new().with_no_cache()
                });
            }
            ResponseKind::Ajax { .. } => {
                headers.typed_insert(ContentType::json());
            }
        }

        for modifier in self.header_modifiers {
            modifier.apply(headers, settings);
        }

        response
    }
}
