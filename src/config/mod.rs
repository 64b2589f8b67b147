use crate::error::{ExtensionError, Result};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::env;
use std::sync::Arc;

mod severity;

pub use severity::Severity;

/// Top-level configuration key owned by the extension.
pub const SECTION: &str = "REPORTABLE_ERROR";

/// Configuration service
///
/// Shared, mutable key-value store owned by the host application. Cloning
/// yields another handle on the same store.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, Value>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store populated from the process environment.
    ///
    /// `SECTION__KEY=value` variables land in the nested `SECTION` mapping.
    pub fn from_env() -> Self {
        let service = Self::new();
        service.load_env(env::vars());
        service
    }

    pub fn load_env<I>(&self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, raw) in vars {
            // Values that are valid JSON keep their type ("400" is a number).
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            match key.split_once("__") {
                Some((section, nested)) => self.set_nested(section, nested, value),
                None => self.set(&key, value),
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.config.insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.config.remove(key).map(|(_, value)| value)
    }

    /// Sets `key` inside the mapping stored under `section`, creating or
    /// replacing that mapping when needed.
    pub fn set_nested(&self, section: &str, key: &str, value: impl Into<Value>) {
        let mut entry = self
            .config
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry.value_mut() {
            Value::Object(map) => {
                map.insert(key.to_string(), value.into());
            }
            other => {
                let mut map = Map::new();
                map.insert(key.to_string(), value.into());
                *other = Value::Object(map);
            }
        }
    }

    /// Deserializes the value under `key`, or `T::default()` when absent.
    pub fn section<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.get(key) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ExtensionError::invalid_setting(key, e.to_string())),
        }
    }

    /// The extension's own settings.
    ///
    /// Only the shape of the section is checked here; each key is
    /// interpreted when it is read, so one bad value only affects the
    /// step that needs it.
    pub fn settings(&self) -> Result<Settings> {
        self.section::<Map<String, Value>>(SECTION)
            .map(|values| Settings { values })
    }
}

/// The `REPORTABLE_ERROR` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    /// Severity caught exceptions are logged at. Defaults to `Error`.
    pub fn loglevel(&self) -> Result<Severity> {
        Ok(self.parse("LOGLEVEL")?.unwrap_or_default())
    }

    /// Status used when an exception sets none. Defaults to 500.
    pub fn default_status_code(&self) -> Result<StatusCode> {
        match self.parse::<u16>("DEFAULT_STATUS_CODE")? {
            None => Ok(StatusCode::INTERNAL_SERVER_ERROR),
            Some(code) => StatusCode::from_u16(code)
                .map_err(|e| invalid("DEFAULT_STATUS_CODE", e.to_string())),
        }
    }

    pub fn template(&self) -> Result<Option<&str>> {
        match self.value("TEMPLATE") {
            None => Ok(None),
            Some(Value::String(template)) => Ok(Some(template)),
            Some(other) => Err(invalid("TEMPLATE", format!("expected a string, got {other}"))),
        }
    }

    /// Default response headers, if configured.
    ///
    /// Numbers and booleans are accepted as values (`"Retry-After": 60`).
    pub fn headers(&self) -> Result<Option<HeaderMap>> {
        let headers = match self.value("HEADERS") {
            None => return Ok(None),
            Some(Value::Object(headers)) => headers,
            Some(other) => {
                return Err(invalid("HEADERS", format!("expected a mapping, got {other}")));
            }
        };

        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let value = match value {
                Value::String(value) => value.clone(),
                Value::Number(_) | Value::Bool(_) => value.to_string(),
                other => {
                    return Err(invalid("HEADERS", format!("{name}: unsupported value {other}")));
                }
            };
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| invalid("HEADERS", format!("{name}: {e}")))?;
            let value = HeaderValue::try_from(value)
                .map_err(|e| invalid("HEADERS", format!("{name}: {e}")))?;
            map.insert(name, value);
        }
        Ok(Some(map))
    }

    fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|value| !value.is_null())
    }

    fn parse<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.value(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| invalid(key, e.to_string()))
            })
            .transpose()
    }
}

fn invalid(key: &str, message: String) -> ExtensionError {
    ExtensionError::invalid_setting(format!("{SECTION}.{key}"), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_section_uses_defaults() {
        let config = ConfigService::new();
        let settings = config.settings().unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.loglevel().unwrap(), Severity::Error);
        assert_eq!(
            settings.default_status_code().unwrap(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(settings.headers().unwrap().is_none());
        assert!(settings.template().unwrap().is_none());
    }

    #[test]
    fn test_section_keys() {
        let config = ConfigService::new();
        config.set(
            SECTION,
            json!({
                "LOGLEVEL": "debug",
                "DEFAULT_STATUS_CODE": 400,
                "TEMPLATE": "errors/default.html",
                "HEADERS": { "Content-Type": "text/plain" },
            }),
        );

        let settings = config.settings().unwrap();
        assert_eq!(settings.loglevel().unwrap(), Severity::Debug);
        assert_eq!(settings.default_status_code().unwrap(), StatusCode::BAD_REQUEST);
        assert_eq!(settings.template().unwrap(), Some("errors/default.html"));
        let headers = settings.headers().unwrap().unwrap();
        assert_eq!(headers["content-type"], "text/plain");
    }

    #[test]
    fn test_scalar_header_values() {
        let config = ConfigService::new();
        config.set(
            SECTION,
            json!({ "HEADERS": { "Retry-After": 60, "X-Cacheable": false } }),
        );

        let headers = config.settings().unwrap().headers().unwrap().unwrap();
        assert_eq!(headers["retry-after"], "60");
        assert_eq!(headers["x-cacheable"], "false");

        config.set(SECTION, json!({ "HEADERS": { "X-List": [1, 2] } }));
        assert!(config.settings().unwrap().headers().is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = ConfigService::new();
        config.set(SECTION, json!({ "DEFAULT_STATUS_CODE": 1000 }));
        let err = config.settings().unwrap().default_status_code().unwrap_err();
        assert!(matches!(
            err,
            ExtensionError::InvalidSetting { ref key, .. } if key == "REPORTABLE_ERROR.DEFAULT_STATUS_CODE"
        ));

        config.set(SECTION, json!({ "HEADERS": { "bad header": "x" } }));
        assert!(config.settings().unwrap().headers().is_err());

        config.set(SECTION, json!({ "TEMPLATE": 3 }));
        assert!(config.settings().unwrap().template().is_err());

        config.set(SECTION, json!("not a mapping"));
        let err = config.settings().unwrap_err();
        assert!(err.to_string().starts_with("Invalid setting REPORTABLE_ERROR: "));
    }

    #[test]
    fn test_bad_key_leaves_other_keys_readable() {
        let config = ConfigService::new();
        config.set(
            SECTION,
            json!({ "LOGLEVEL": "loud", "DEFAULT_STATUS_CODE": 404 }),
        );

        let settings = config.settings().unwrap();
        let err = settings.loglevel().unwrap_err().to_string();
        assert!(err.starts_with("Invalid setting REPORTABLE_ERROR.LOGLEVEL: "));
        assert!(err.contains("loud"));
        assert_eq!(settings.default_status_code().unwrap(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_load_env_nests_sections() {
        let config = ConfigService::new();
        config.load_env(vec![
            ("REPORTABLE_ERROR__DEFAULT_STATUS_CODE".to_string(), "418".to_string()),
            ("REPORTABLE_ERROR__LOGLEVEL".to_string(), "warn".to_string()),
            ("APP_NAME".to_string(), "shop".to_string()),
        ]);

        assert_eq!(config.get("APP_NAME"), Some(json!("shop")));
        let settings = config.settings().unwrap();
        assert_eq!(settings.default_status_code().unwrap(), StatusCode::IM_A_TEAPOT);
        assert_eq!(settings.loglevel().unwrap(), Severity::Warn);
    }

    #[test]
    fn test_clones_share_the_store() {
        let config = ConfigService::new();
        let handle = config.clone();
        handle.set_nested(SECTION, "DEFAULT_STATUS_CODE", 404);
        assert_eq!(
            config.settings().unwrap().default_status_code().unwrap(),
            StatusCode::NOT_FOUND
        );

        assert!(handle.remove(SECTION).is_some());
        assert_eq!(config.settings().unwrap(), Settings::default());
    }
}
