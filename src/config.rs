use serde::{Deserialize, Serialize};

use crate::path::ExtractType;
use crate::strategies::MatchMode;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub default_extract_type: ExtractType,
}

/// Remote query behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// Skip TLS certificate validation for the remote platform only.
    pub accept_invalid_certs: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: "SkillAegis".into(),
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SearchConfig {
    #[serde(default)]
    pub match_mode: MatchMode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Empty disables the file log. `~` is expanded.
    #[serde(default)]
    pub log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            log_file: String::new(),
        }
    }
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    fetch: FetchOverlay,
    #[serde(default)]
    search: SearchOverlay,
    #[serde(default)]
    logging: LoggingOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    default_extract_type: Option<ExtractType>,
}

#[derive(Debug, Deserialize, Default)]
struct FetchOverlay {
    timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    accept_invalid_certs: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct SearchOverlay {
    match_mode: Option<MatchMode>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingOverlay {
    level: Option<String>,
    log_file: Option<String>,
}

// ── Merge logic ──

fn merge<T>(base: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *base = v;
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge user overlay from ~/.config/inject-eval/config.toml (if exists)
    ///
    /// Every key in the overlay is optional and overrides the default.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay() {
            config.apply_overlay(overlay);
        }
        config
    }

    /// Try to load user overlay from ~/.config/inject-eval/config.toml.
    fn load_overlay() -> Option<ConfigOverlay> {
        let home = std::env::var_os("HOME")?;
        let path = std::path::Path::new(&home).join(".config/inject-eval/config.toml");
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                eprintln!("inject-eval: config parse error: {e}");
                None
            }
        }
    }

    /// Apply an overlay on top of this config (scalars override).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        merge(
            &mut self.settings.default_extract_type,
            overlay.settings.default_extract_type,
        );

        let f = overlay.fetch;
        // A zero timeout would fail every remote query at once.
        merge(&mut self.fetch.timeout_secs, f.timeout_secs.map(|s| s.max(1)));
        merge(
            &mut self.fetch.connect_timeout_secs,
            f.connect_timeout_secs.map(|s| s.max(1)),
        );
        merge(&mut self.fetch.user_agent, f.user_agent);
        merge(&mut self.fetch.accept_invalid_certs, f.accept_invalid_certs);

        merge(&mut self.search.match_mode, overlay.search.match_mode);

        merge(&mut self.logging.level, overlay.logging.level);
        merge(&mut self.logging.log_file, overlay.logging.log_file);
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
