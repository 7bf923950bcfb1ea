use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::literal;
use crate::options::{extract, Operation, OperationArgs};
use crate::value::{Key, Map, Value};
use crate::{PpdfError, Result};

/// Options used when the caller supplies none.
pub const DEFAULT_ARGS: &str = "{launch={args=['--font-render-hinting=none']}, \
goto={waitUntil='networkidle0', timeout=100000}, \
pdf={width='8.27in', printBackground=true, margin={top='1in', right='1in', bottom='1in', left='1in'}}}";

/// Options as handed over by a caller: literal text or an already built mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum RawConfig {
    Text(String),
    Map(Map),
}

impl From<&str> for RawConfig {
    fn from(text: &str) -> Self {
        RawConfig::Text(text.to_string())
    }
}

impl From<String> for RawConfig {
    fn from(text: String) -> Self {
        RawConfig::Text(text)
    }
}

impl From<Map> for RawConfig {
    fn from(map: Map) -> Self {
        RawConfig::Map(map)
    }
}

impl RawConfig {
    fn into_map(self, what: &str) -> Result<Map> {
        match self {
            RawConfig::Map(map) => Ok(map),
            RawConfig::Text(text) => match literal::parse(&text)? {
                Value::Map(map) => Ok(map),
                other => Err(PpdfError::Config(format!(
                    "Invalid {what} (should be a mapping, got {}): {other}",
                    other.kind()
                ))),
            },
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, RawConfig::Text(text) if text.trim().is_empty())
    }
}

/// Normalized per-operation options. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration(Map);

impl Configuration {
    pub fn as_map(&self) -> &Map {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(&Key::name(name))
    }

    /// Arguments for `op`, or `None` when the operation is suppressed.
    pub fn args(&self, op: Operation, default: Option<&Value>) -> Option<OperationArgs> {
        extract(op.as_str(), &self.0, default)
    }

    /// The `goto.url` entry, when configured.
    pub fn goto_url(&self) -> Option<&str> {
        self.get(Operation::Goto.as_str())
            .and_then(Value::as_map)
            .and_then(|goto| goto.get(&Key::name("url")))
            .and_then(Value::as_str)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        match literal::parse(DEFAULT_ARGS) {
            Ok(Value::Map(map)) => Configuration(map),
            _ => Configuration(Map::new()),
        }
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Map(self.0.clone()))
    }
}

/// Parses `raw` (or the defaults) and deep-merges `overlay` over it.
pub fn normalize(raw: Option<RawConfig>, overlay: Option<RawConfig>) -> Result<Configuration> {
    let base = match raw.filter(|raw| !raw.is_blank()) {
        Some(raw) => raw.into_map("browser options")?,
        None => Configuration::default().0,
    };
    let merged = match overlay.filter(|raw| !raw.is_blank()) {
        Some(overlay) => {
            let overlay = overlay.into_map("browser options update")?;
            crate::merge::merge(&overlay, &base)
        }
        None => base,
    };
    Ok(Configuration(merged))
}

/// Process-reaping timeouts used after the browser closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReapTimeouts {
    /// Time children get to exit on their own.
    #[serde(with = "humantime_serde")]
    pub natural_exit: Duration,
    /// Time survivors get between SIGTERM and SIGKILL.
    #[serde(with = "humantime_serde")]
    pub terminate: Duration,
}

impl Default for ReapTimeouts {
    fn default() -> Self {
        Self {
            natural_exit: Duration::from_secs(1),
            terminate: Duration::from_secs(3),
        }
    }
}

/// Settings read from an optional TOML file.
///
/// ```toml
/// node_command = "node"
/// args = "{pdf={format='A4'}}"
/// upd = "{waitFor=[500]}"
/// close_timeout = "10s"
///
/// [reap]
/// natural_exit = "1s"
/// terminate = "3s"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub node_command: String,
    pub args: Option<String>,
    pub upd: Option<String>,
    #[serde(with = "humantime_serde")]
    pub close_timeout: Duration,
    pub reap: ReapTimeouts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            args: None,
            upd: None,
            close_timeout: Duration::from_secs(10),
            reap: ReapTimeouts::default(),
        }
    }
}

impl Settings {
    /// Loads the file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            PpdfError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let settings: Settings = toml::from_str(&text).map_err(|e| {
            PpdfError::Config(format!("Invalid config ({}): {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_command.trim().is_empty() {
            return Err(PpdfError::Config("node_command must not be empty".to_string()));
        }
        if self.close_timeout.is_zero() {
            return Err(PpdfError::Config("close_timeout must be positive".to_string()));
        }
        if self.reap.natural_exit.is_zero() || self.reap.terminate.is_zero() {
            return Err(PpdfError::Config("reap timeouts must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_configuration_matches_literal() {
        let cfg = Configuration::default();
        let launch = cfg.args(Operation::Launch, None).unwrap();
        assert_eq!(
            launch.keywords["args"],
            Value::Seq(vec![Value::from("--font-render-hinting=none")])
        );
        let goto = cfg.args(Operation::Goto, None).unwrap();
        assert_eq!(goto.keywords["waitUntil"], Value::from("networkidle0"));
        assert_eq!(goto.keywords["timeout"], Value::Int(100000));
        let pdf = cfg.args(Operation::Pdf, None).unwrap();
        assert_eq!(pdf.keywords["width"], Value::from("8.27in"));
        assert_eq!(pdf.keywords["printBackground"], Value::Bool(true));
        assert!(cfg.args(Operation::WaitFor, None).is_none());
    }

    #[test]
    fn absent_or_blank_raw_uses_defaults() {
        assert_eq!(normalize(None, None).unwrap(), Configuration::default());
        assert_eq!(
            normalize(Some("  ".into()), None).unwrap(),
            Configuration::default()
        );
    }

    #[test]
    fn overlay_only_touches_named_keys() {
        let cfg = normalize(None, Some("{pdf={printBackground=false}}".into())).unwrap();
        let pdf = cfg.args(Operation::Pdf, None).unwrap();
        assert_eq!(pdf.keywords["printBackground"], Value::Bool(false));
        assert_eq!(pdf.keywords["width"], Value::from("8.27in"));
        let margin = pdf.keywords["margin"].as_map().unwrap();
        assert_eq!(margin[&Key::name("left")], Value::from("1in"));
        assert!(cfg.args(Operation::Goto, None).is_some());
    }

    #[test]
    fn overlay_adds_wait_for() {
        let cfg = normalize(None, Some("{waitFor=1000}".into())).unwrap();
        let wait = cfg.args(Operation::WaitFor, None).unwrap();
        assert_eq!(wait.positional, vec![Value::Int(1000)]);
    }

    #[test]
    fn raw_replaces_defaults_entirely() {
        let cfg = normalize(Some("{pdf={format='A4'}}".into()), None).unwrap();
        assert!(cfg.get("launch").is_none());
        assert!(cfg.get("goto").is_none());
    }

    #[test]
    fn accepts_prebuilt_mapping() {
        let mut map = Map::new();
        map.insert(Key::name("waitFor"), Value::Seq(vec![Value::Int(5)]));
        let cfg = normalize(Some(map.clone().into()), None).unwrap();
        assert_eq!(cfg.as_map(), &map);
    }

    #[test]
    fn non_mapping_is_a_config_error() {
        let err = normalize(Some("[1, 2]".into()), None).unwrap_err();
        assert!(matches!(err, PpdfError::Config(ref msg) if msg.contains("should be a mapping")));
        let err = normalize(None, Some("'text'".into())).unwrap_err();
        assert!(matches!(err, PpdfError::Config(_)));
    }

    #[test]
    fn syntax_error_is_a_literal_error() {
        let err = normalize(Some("{a=".into()), None).unwrap_err();
        assert!(matches!(err, PpdfError::Literal(_)));
    }

    #[test]
    fn goto_url_is_read_from_configuration() {
        let cfg = normalize(Some("{goto={url='https://example.com'}}".into()), None).unwrap();
        assert_eq!(cfg.goto_url(), Some("https://example.com"));
        assert_eq!(Configuration::default().goto_url(), None);
    }

    #[test]
    fn display_reparses_to_same_configuration() {
        let cfg = Configuration::default();
        let again = normalize(Some(cfg.to_string().into()), None).unwrap();
        assert_eq!(cfg, again);
    }

    #[test]
    fn settings_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.node_command, "node");
        assert_eq!(settings.close_timeout, Duration::from_secs(10));
        assert_eq!(settings.reap.natural_exit, Duration::from_secs(1));
        assert_eq!(settings.reap.terminate, Duration::from_secs(3));
        assert_eq!(Settings::load(None).unwrap(), settings);
    }

    #[test]
    fn settings_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "node_command = \"nodejs\"\nupd = \"{{waitFor=[1]}}\"\nclose_timeout = \"2s\"\n\n[reap]\nterminate = \"500ms\""
        )
        .unwrap();
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.node_command, "nodejs");
        assert_eq!(settings.upd.as_deref(), Some("{waitFor=[1]}"));
        assert_eq!(settings.close_timeout, Duration::from_secs(2));
        assert_eq!(settings.reap.terminate, Duration::from_millis(500));
        assert_eq!(settings.reap.natural_exit, Duration::from_secs(1));
    }

    #[test]
    fn settings_reject_unknown_keys_and_zero_timeouts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "viewport = \"1x1\"").unwrap();
        assert!(matches!(
            Settings::load(Some(file.path())),
            Err(PpdfError::Config(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "close_timeout = \"0s\"").unwrap();
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("close_timeout"));
    }

    #[test]
    fn settings_missing_file_is_config_error() {
        let err = Settings::load(Some(Path::new("/definitely/missing/ppdf.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
