use core::fmt::{Debug, Display};
use std::net::SocketAddr;
use std::path::PathBuf;

use figment::providers::{Env, Format, Json, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer};

const ONE_DAY_IN_SECONDS: u32 = 60 * 60 * 24;

/// Where drinks, events, orders and layouts are persisted.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatastoreSettings {
    Sqlite { path: PathBuf },
}

/// Application settings, loaded once at startup and passed around explicitly.
#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub datastore: DatastoreSettings,
    /// Seconds a cacheable response may be reused by clients.
    #[serde(
        alias = "cacheAge",
        default = "default_cache_age",
        deserialize_with = "non_negative_cache_age"
    )]
    pub cache_age: u32,
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

const fn default_cache_age() -> u32 {
    ONE_DAY_IN_SECONDS
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn non_negative_cache_age<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = i64::deserialize(deserializer)?;
    Ok(u32::try_from(value.max(0)).unwrap_or(u32::MAX))
}

#[derive(thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] figment::Error),
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Settings {
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }
}

/// Layers `kellerclub-drinks.toml`, `settings.json` and `KELLERCLUB_*` environment variables.
pub fn get_settings() -> Result<Settings, ConfigError> {
    Settings::from_figment(
        &Figment::new()
            .merge(Toml::file("kellerclub-drinks.toml"))
            .merge(Json::file("settings.json"))
            .merge(Env::prefixed("KELLERCLUB_").split("__")),
    )
}

#[cfg(test)]
mod tests {
    use figment::providers::{Format, Json, Toml};
    use figment::Figment;

    use super::{DatastoreSettings, Settings};

    #[test]
    fn cache_age_defaults_to_one_day() {
        let figment = Figment::from(Json::string(
            r#"{"datastore": {"type": "sqlite", "path": "drinks.db"}}"#,
        ));

        let settings = Settings::from_figment(&figment).unwrap();

        assert_eq!(settings.cache_age, 60 * 60 * 24);
        assert_eq!(
            settings.datastore,
            DatastoreSettings::Sqlite {
                path: "drinks.db".into()
            }
        );
        assert_eq!(settings.listen.port(), 8000);
    }

    #[test]
    fn negative_cache_age_is_clamped() {
        let figment = Figment::from(Json::string(
            r#"{"datastore": {"type": "sqlite", "path": "drinks.db"}, "cacheAge": -5}"#,
        ));

        assert_eq!(Settings::from_figment(&figment).unwrap().cache_age, 0);
    }

    #[test]
    fn toml_settings_are_read() {
        let figment = Figment::from(Toml::string(
            r#"
            cache_age = 60
            listen = "0.0.0.0:9000"
            static_dir = "/srv/static"

            [datastore]
            type = "sqlite"
            path = "/var/lib/drinks.db"
            "#,
        ));

        let settings = Settings::from_figment(&figment).unwrap();

        assert_eq!(settings.cache_age, 60);
        assert_eq!(settings.listen.port(), 9000);
        assert_eq!(settings.static_dir.to_str(), Some("/srv/static"));
    }

    #[test]
    fn invalid_json_fails() {
        assert!(Settings::from_figment(&Figment::from(Json::string("{"))).is_err());
    }

    #[test]
    fn unknown_datastore_type_fails() {
        let figment = Figment::from(Json::string(r#"{"datastore": {"type": "postgres"}}"#));

        assert!(Settings::from_figment(&figment).is_err());
    }
}
