//! Loader for placelens configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. built-in defaults (every field has one)
//! 2. an optional or required YAML file (`placelens.yaml`)
//! 3. inline YAML snippets (tests, embedding)
//! 4. `PLACELENS__SECTION__KEY` environment variables, parsed as numbers or
//!    booleans where they look like one
//!
//! After merging, every string is run through `${VAR}` expansion. API keys
//! default to `${SERPAPI_API_KEY}` and `${OPENROUTER_API_KEY}`, so exporting
//! those is enough for a working setup. A key that is still unresolved when a
//! command needs it is reported by [`require_secret`].
//!
//! ```yaml
//! search:
//!   api_key: "${SERPAPI_API_KEY}"
//!   inter_query_delay_ms: 1000
//!   max_pages: 10
//! vision:
//!   model: "google/gemini-2.0-flash-lite-001"
//!   labels: beauty
//! capture:
//!   webdriver_url: "http://localhost:9515"
//!   screenshots_dir: "screenshots"
//! analyze:
//!   concurrency: 2
//! logging:
//!   format: json
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "PLACELENS";
pub const DEFAULT_CONFIG_FILE: &str = "placelens.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error(transparent)]
    Source(#[from] ConfigError),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("missing setting `{0}`: set it in {DEFAULT_CONFIG_FILE} or the environment")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlacelensConfig {
    pub search: SearchConfig,
    pub vision: VisionConfig,
    pub capture: CaptureConfig,
    pub analyze: AnalyzeConfig,
    pub logging: LoggingConfig,
}

/// Paged maps-search API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(deserialize_with = "lenient_string")]
    pub api_key: String,
    pub endpoint: String,
    pub engine: String,
    pub inter_query_delay_ms: u64,
    /// Hard cap on pages per query; unbounded when absent.
    pub max_pages: Option<u32>,
    pub timeout_secs: u64,
    pub retries: usize,
    pub concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://serpapi.com".into(),
            engine: "google_maps".into(),
            inter_query_delay_ms: 1000,
            max_pages: None,
            timeout_secs: 30,
            retries: 2,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSchemeKind {
    #[default]
    Modernity,
    Beauty,
}

/// Vision completion endpoint and retry policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    #[serde(deserialize_with = "lenient_string")]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub referer: Option<String>,
    pub title: String,
    pub labels: LabelSchemeKind,
    pub requests_per_minute: Option<u32>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://openrouter.ai/api/v1".into(),
            model: "google/gemini-2.0-flash-lite-001".into(),
            max_tokens: 200,
            max_attempts: 3,
            base_delay_ms: 5000,
            timeout_secs: 60,
            referer: None,
            title: "Website Aesthetic Analyzer".into(),
            labels: LabelSchemeKind::Modernity,
            requests_per_minute: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub webdriver_url: String,
    pub screenshots_dir: PathBuf,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub nav_timeout_secs: u64,
    pub settle_ms: u64,
    pub scroll_settle_ms: u64,
    pub headless: bool,
    pub user_agent: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            screenshots_dir: PathBuf::from("screenshots"),
            viewport_width: 1920,
            viewport_height: 3000,
            nav_timeout_secs: 90,
            settle_ms: 3000,
            scroll_settle_ms: 2000,
            headless: true,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzeConfig {
    pub concurrency: usize,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
    pub emit_stderr: bool,
    pub dir: Option<PathBuf>,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "text".into(),
            emit_stderr: true,
            dir: None,
            filter: "info".into(),
        }
    }
}

impl PlacelensConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let positive = [
            ("vision.max_attempts", self.vision.max_attempts as u64),
            ("search.concurrency", self.search.concurrency as u64),
            ("analyze.concurrency", self.analyze.concurrency as u64),
            ("capture.viewport_width", self.capture.viewport_width as u64),
            ("capture.viewport_height", self.capture.viewport_height as u64),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigLoadError::Invalid {
                    key,
                    reason: "must be at least 1".into(),
                });
            }
        }
        if self.search.max_pages == Some(0) {
            return Err(ConfigLoadError::Invalid {
                key: "search.max_pages",
                reason: "must be at least 1 when set".into(),
            });
        }
        if self.vision.requests_per_minute == Some(0) {
            return Err(ConfigLoadError::Invalid {
                key: "vision.requests_per_minute",
                reason: "must be at least 1 when set".into(),
            });
        }
        Ok(())
    }
}

/// Return the secret if it was actually provided.
///
/// Empty values and values still holding an unexpanded `${VAR}` placeholder
/// count as missing.
///
/// ```
/// use placelens_config::require_secret;
///
/// assert!(require_secret("sk-live", "vision.api_key").is_ok());
/// assert!(require_secret("${OPENROUTER_API_KEY}", "vision.api_key").is_err());
/// assert!(require_secret("  ", "vision.api_key").is_err());
/// ```
pub fn require_secret<'a>(value: &'a str, key: &'static str) -> Result<&'a str, ConfigLoadError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.contains("${") {
        return Err(ConfigLoadError::Missing(key));
    }
    Ok(trimmed)
}

/// `~/.config/placelens/placelens.yaml` (platform equivalent), if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("placelens").join(DEFAULT_CONFIG_FILE))
}

// Numeric-looking env overrides arrive as numbers after `try_parsing`.
fn lenient_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(de)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct PlacelensConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PlacelensConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PlacelensConfigLoader {
    /// Start with defaults and `PLACELENS__` env overrides.
    ///
    /// ```
    /// use placelens_config::PlacelensConfigLoader;
    ///
    /// let config = PlacelensConfigLoader::new()
    ///     .with_yaml_str("search:\n  max_pages: 3")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.search.max_pages, Some(3));
    /// assert_eq!(config.search.inter_query_delay_ms, 1000);
    /// assert_eq!(config.vision.max_tokens, 200);
    /// ```
    pub fn new() -> Self {
        // Defaults that reference the environment have to go through the
        // builder so they are expanded with everything else.
        let builder = Config::builder()
            .set_default("search.api_key", "${SERPAPI_API_KEY}")
            .and_then(|b| b.set_default("vision.api_key", "${OPENROUTER_API_KEY}"));
        let builder = match builder {
            Ok(b) => b,
            Err(_) => Config::builder(),
        };
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is merged only when present, so env-only setups work.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use placelens_config::{LabelSchemeKind, PlacelensConfigLoader};
    ///
    /// let cfg = PlacelensConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// vision:
    ///   labels: beauty
    ///   max_attempts: 5
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.vision.labels, LabelSchemeKind::Beauty);
    /// assert_eq!(cfg.vision.max_attempts, 5);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use placelens_config::PlacelensConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOCTEST_MAPS_KEY", "injected-from-env"); }
    ///
    /// let config = PlacelensConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// search:
    ///   api_key: "${DOCTEST_MAPS_KEY}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.search.api_key, "injected-from-env");
    /// assert_eq!(config.search.endpoint, "https://serpapi.com");
    ///
    /// unsafe { std::env::remove_var("DOCTEST_MAPS_KEY"); }
    /// ```
    pub fn load(self) -> Result<PlacelensConfig, ConfigLoadError> {
        // Env is added last so it overrides every file and snippet.
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: PlacelensConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;
        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Winston")), ("STATE", Some("NC"))], || {
            let mut v = json!([
                "hello-$CITY",
                { "loc": "${CITY}-${STATE}" },
                42,
                true,
                null
            ]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["hello-Winston", { "loc": "Winston-NC" }, 42, true, null])
            );
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!("X=${FOO}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("X=start-mid-qux-end"));
            },
        );
    }

    #[test]
    fn stops_on_cycles_and_leaves_value_reasonable() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
    }

    #[test]
    fn unresolved_secrets_are_missing() {
        let err = require_secret("${SERPAPI_API_KEY}", "search.api_key").unwrap_err();
        assert!(err.to_string().contains("search.api_key"));
        assert_eq!(require_secret(" abc ", "k").unwrap(), "abc");
    }

    #[test]
    fn lenient_string_accepts_numbers() {
        #[derive(Deserialize)]
        struct Sample {
            #[serde(deserialize_with = "lenient_string")]
            key: String,
        }
        let p: Sample = serde_json::from_value(json!({"key": 12345})).unwrap();
        assert_eq!(p.key, "12345");
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut cfg = PlacelensConfig::default();
        cfg.vision.max_attempts = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigLoadError::Invalid {
                key: "vision.max_attempts",
                ..
            })
        ));
    }
}
