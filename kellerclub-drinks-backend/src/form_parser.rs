//! Validation of url-encoded form payloads and query strings against a
//! declarative list of expected parameters.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use mime::Mime;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Wrong Content Type!")]
    WrongContentType,
    #[error("bad query field: {0:?}")]
    BadQueryField(String),
    #[error("Found extraneous keys {0:?}!")]
    ExtraneousKeys(BTreeSet<String>),
    #[error("Param {key} does not have enough values ({count}<{min})!")]
    NotEnoughValues {
        key: String,
        count: usize,
        min: usize,
    },
    #[error("Param {key} has too many values ({count}>{max})!")]
    TooManyValues {
        key: String,
        count: usize,
        max: usize,
    },
    #[error("Value {value} for key {key} not in allowed values!")]
    NotAllowed { key: String, value: String },
    #[error("Value {value} for key {key} could not be converted!")]
    Conversion { key: String, value: String },
    #[error("Param {0} is missing!")]
    Missing(String),
}

/// A decoded value, after the parameter's conversion ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    Bool(bool),
    Int(i64),
}

type Allowed = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Convert = Box<dyn Fn(&str) -> Option<FormValue> + Send + Sync>;

/// Describes one expected parameter.
pub struct Param {
    key: &'static str,
    min_values: usize,
    max_values: Option<usize>,
    default: Vec<String>,
    allowed: Option<Allowed>,
    convert: Option<Convert>,
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("key", &self.key)
            .field("min_values", &self.min_values)
            .field("max_values", &self.max_values)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

impl Param {
    /// Any number of values, none required.
    #[must_use]
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            min_values: 0,
            max_values: None,
            default: Vec::new(),
            allowed: None,
            convert: None,
        }
    }

    /// Exactly one value.
    #[must_use]
    pub fn single(key: &'static str) -> Self {
        Self::new(key).min_values(1).max_values(1)
    }

    /// Exactly one of `true` or `false`.
    #[must_use]
    pub fn boolean(key: &'static str) -> Self {
        Self::single(key)
            .allowed(|value| value == "true" || value == "false")
            .convert(|value| Some(FormValue::Bool(value == "true")))
    }

    /// An HTML checkbox: `on` when ticked, absent (meaning `off`) otherwise.
    #[must_use]
    pub fn checkbox(key: &'static str) -> Self {
        Self::new(key)
            .max_values(1)
            .default_values(&["off"])
            .allowed(|value| value == "on" || value == "off")
            .convert(|value| Some(FormValue::Bool(value == "on")))
    }

    /// Exactly one non-negative integer.
    #[must_use]
    pub fn int(key: &'static str) -> Self {
        Self::single(key)
            .allowed(|value| !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit()))
            .convert(|value| value.parse().ok().map(FormValue::Int))
    }

    #[must_use]
    pub fn min_values(mut self, min_values: usize) -> Self {
        self.min_values = min_values;
        self
    }

    #[must_use]
    pub fn max_values(mut self, max_values: usize) -> Self {
        self.max_values = Some(max_values);
        self
    }

    /// Raw values used when the key is absent.
    #[must_use]
    pub fn default_values(mut self, default: &[&str]) -> Self {
        self.default = default.iter().map(|value| (*value).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn allowed(mut self, allowed: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.allowed = Some(Box::new(allowed));
        self
    }

    #[must_use]
    pub fn convert(
        mut self,
        convert: impl Fn(&str) -> Option<FormValue> + Send + Sync + 'static,
    ) -> Self {
        self.convert = Some(Box::new(convert));
        self
    }

    fn validate(&self, raw: Option<Vec<String>>) -> Result<Vec<FormValue>, FormError> {
        let values = raw.unwrap_or_else(|| self.default.clone());
        let count = values.len();
        if count < self.min_values {
            return Err(FormError::NotEnoughValues {
                key: self.key.to_owned(),
                count,
                min: self.min_values,
            });
        }
        if let Some(max) = self.max_values.filter(|max| count > *max) {
            return Err(FormError::TooManyValues {
                key: self.key.to_owned(),
                count,
                max,
            });
        }
        if let Some(allowed) = &self.allowed {
            if let Some(value) = values.iter().find(|value| !allowed(value.as_str())) {
                return Err(FormError::NotAllowed {
                    key: self.key.to_owned(),
                    value: value.clone(),
                });
            }
        }
        values
            .into_iter()
            .map(|value| match &self.convert {
                None => Ok(FormValue::Text(value)),
                Some(convert) => convert(value.as_str()).ok_or_else(|| FormError::Conversion {
                    key: self.key.to_owned(),
                    value,
                }),
            })
            .collect()
    }
}

/// Result of a successful parse. Every declared key is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedForm(BTreeMap<&'static str, Vec<FormValue>>);

impl ParsedForm {
    #[must_use]
    pub fn values(&self, key: &str) -> &[FormValue] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn text(&self, key: &str) -> Result<&str, FormError> {
        self.optional_text(key)
            .ok_or_else(|| FormError::Missing(key.to_owned()))
    }

    #[must_use]
    pub fn optional_text(&self, key: &str) -> Option<&str> {
        self.values(key).iter().find_map(|value| match value {
            FormValue::Text(text) => Some(text.as_str()),
            FormValue::Bool(_) | FormValue::Int(_) => None,
        })
    }

    #[must_use]
    pub fn texts(&self, key: &str) -> Vec<String> {
        self.values(key)
            .iter()
            .filter_map(|value| match value {
                FormValue::Text(text) => Some(text.clone()),
                FormValue::Bool(_) | FormValue::Int(_) => None,
            })
            .collect()
    }

    pub fn boolean(&self, key: &str) -> Result<bool, FormError> {
        self.values(key)
            .iter()
            .find_map(|value| match value {
                FormValue::Bool(value) => Some(*value),
                FormValue::Text(_) | FormValue::Int(_) => None,
            })
            .ok_or_else(|| FormError::Missing(key.to_owned()))
    }

    pub fn int(&self, key: &str) -> Result<i64, FormError> {
        self.values(key)
            .iter()
            .find_map(|value| match value {
                FormValue::Int(value) => Some(*value),
                FormValue::Text(_) | FormValue::Bool(_) => None,
            })
            .ok_or_else(|| FormError::Missing(key.to_owned()))
    }
}

/// Parses `query` against `params`.
///
/// When a content type is given its essence has to be
/// `application/x-www-form-urlencoded`.
pub fn parse(
    query: &str,
    params: &[Param],
    content_type: Option<&str>,
) -> Result<ParsedForm, FormError> {
    if let Some(content_type) = content_type {
        let mime: Mime = content_type
            .parse()
            .map_err(|_| FormError::WrongContentType)?;
        if mime.essence_str() != mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() {
            return Err(FormError::WrongContentType);
        }
    }

    let mut payload = decode_strict(query)?;

    let extraneous: BTreeSet<String> = payload
        .keys()
        .filter(|key| !params.iter().any(|param| param.key == key.as_str()))
        .cloned()
        .collect();
    if !extraneous.is_empty() {
        return Err(FormError::ExtraneousKeys(extraneous));
    }

    params
        .iter()
        .map(|param| Ok((param.key, param.validate(payload.remove(param.key))?)))
        .collect::<Result<BTreeMap<_, _>, FormError>>()
        .map(ParsedForm)
}

/// Every `&`-separated field has to contain a `=`. Fields with an empty value
/// are skipped.
fn decode_strict(query: &str) -> Result<BTreeMap<String, Vec<String>>, FormError> {
    let mut payload: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if query.is_empty() {
        return Ok(payload);
    }
    for field in query.split('&') {
        if !field.contains('=') {
            return Err(FormError::BadQueryField(field.to_owned()));
        }
        let decoded: Vec<(String, String)> = serde_urlencoded::from_str(field)
            .map_err(|_| FormError::BadQueryField(field.to_owned()))?;
        for (key, value) in decoded {
            if !value.is_empty() {
                payload.entry(key).or_default().push(value);
            }
        }
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::{parse, FormError, FormValue, Param};

    #[test]
    fn empty_query_uses_defaults() {
        let parsed = parse(
            "",
            &[
                Param::single("layout").default_values(&["default"]),
                Param::boolean("autosubmit").default_values(&["true"]),
            ],
            None,
        )
        .unwrap();

        assert_eq!(parsed.text("layout"), Ok("default"));
        assert_eq!(parsed.boolean("autosubmit"), Ok(true));
    }

    #[test]
    fn values_are_decoded() {
        let parsed = parse(
            "drink=test_drink&display_name=Test+Drink%21",
            &[Param::single("drink"), Param::single("display_name")],
            Some("application/x-www-form-urlencoded"),
        )
        .unwrap();

        assert_eq!(parsed.text("drink"), Ok("test_drink"));
        assert_eq!(parsed.text("display_name"), Ok("Test Drink!"));
    }

    #[test]
    fn fields_without_equals_sign_fail() {
        assert_eq!(
            parse("&=", &[Param::new("a")], None),
            Err(FormError::BadQueryField(String::new()))
        );
        assert_eq!(
            parse("a", &[Param::new("a")], None),
            Err(FormError::BadQueryField("a".to_owned()))
        );
    }

    #[test]
    fn empty_values_are_dropped() {
        let parsed = parse("a=&a=x", &[Param::new("a")], None).unwrap();

        assert_eq!(parsed.texts("a"), ["x"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = parse("a=1&b=2&c=3", &[Param::new("a")], None).unwrap_err();

        assert_eq!(
            error,
            FormError::ExtraneousKeys(["b".to_owned(), "c".to_owned()].into())
        );
        assert!(parse("b=2", &[], None).is_err());
    }

    #[test]
    fn single_value_needs_exactly_one() {
        assert_eq!(
            parse("", &[Param::single("drink")], None).unwrap_err().to_string(),
            "Param drink does not have enough values (0<1)!"
        );
        assert_eq!(
            parse("drink=a&drink=b", &[Param::single("drink")], None)
                .unwrap_err()
                .to_string(),
            "Param drink has too many values (2>1)!"
        );
    }

    #[test]
    fn booleans_are_case_sensitive() {
        let params = [Param::boolean("flag")];

        assert_eq!(parse("flag=false", &params, None).unwrap().boolean("flag"), Ok(false));
        assert!(matches!(
            parse("flag=True", &params, None),
            Err(FormError::NotAllowed { .. })
        ));
        assert!(parse("flag=yes", &params, None).is_err());
    }

    #[test]
    fn checkbox_defaults_to_off() {
        let params = [Param::checkbox("autosubmit")];

        assert_eq!(parse("", &params, None).unwrap().boolean("autosubmit"), Ok(false));
        assert_eq!(
            parse("autosubmit=on", &params, None).unwrap().boolean("autosubmit"),
            Ok(true)
        );
        assert!(parse("autosubmit=maybe", &params, None).is_err());
    }

    #[test]
    fn ints_need_digits() {
        let params = [Param::int("event")];

        assert_eq!(parse("event=1700000000", &params, None).unwrap().int("event"), Ok(1_700_000_000));
        assert!(parse("event=-1", &params, None).is_err());
        assert!(parse("event=12a", &params, None).is_err());
        assert!(matches!(
            parse("event=99999999999999999999", &params, None),
            Err(FormError::Conversion { .. })
        ));
    }

    #[test]
    fn content_type_essence_is_checked() {
        let params = [Param::new("a")];

        assert!(parse("a=1", &params, Some("application/x-www-form-urlencoded; charset=UTF-8")).is_ok());
        assert_eq!(
            parse("a=1", &params, Some("application/json")),
            Err(FormError::WrongContentType)
        );
        assert_eq!(
            parse("a=1", &params, Some("not a mime")),
            Err(FormError::WrongContentType)
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        let params = [Param::new("order").min_values(1), Param::int("event")];
        let query = "order=bier&order=mate&event=5";

        assert_eq!(parse(query, &params, None), parse(query, &params, None));
        assert_eq!(
            parse(query, &params, None).unwrap().values("event"),
            [FormValue::Int(5)]
        );
    }
}
