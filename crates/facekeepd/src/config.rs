use anyhow::{Context, Result};
use facekeep_core::MatchPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Daemon configuration: optional TOML file, then `FACEKEEP_*` overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory containing the SCRFD and ArcFace ONNX files.
    pub model_dir: PathBuf,
    /// Path to the SQLite profile database.
    pub db_path: PathBuf,
    /// Upper bound on a single extraction request, in seconds.
    pub extract_timeout_secs: u64,
    /// Serve on the session bus instead of the system bus.
    pub session_bus: bool,
    /// Window size and thresholds (`[policy]` table).
    pub policy: MatchPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = xdg_dir("XDG_DATA_HOME", ".local/share").join("facekeep");
        Self {
            model_dir: facekeep_core::default_model_dir(),
            db_path: data_dir.join("profiles.db"),
            extract_timeout_secs: 10,
            session_bus: false,
            policy: MatchPolicy::default(),
        }
    }
}

impl Config {
    /// Load from `FACEKEEP_CONFIG` (or the XDG default, when present), then
    /// apply environment overrides.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var_os("FACEKEEP_CONFIG").map(PathBuf::from);
        let fallback = xdg_dir("XDG_CONFIG_HOME", ".config").join("facekeep/facekeepd.toml");

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if fallback.exists() => Self::from_file(&fallback)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply `FACEKEEP_*` overrides. Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACEKEEP_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEKEEP_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEKEEP_SESSION_BUS") {
            self.session_bus = v != "0";
        }
        override_parsed(&lookup, "FACEKEEP_EXTRACT_TIMEOUT_SECS", &mut self.extract_timeout_secs);
        override_parsed(&lookup, "FACEKEEP_MAX_WINDOW", &mut self.policy.max_window);
        // Euclidean on L2-normalized ArcFace vectors: d = sqrt(2 - 2 cos), so
        // 0.6 is cosine >= 0.82 and 0.4 is cosine >= 0.92.
        override_parsed(&lookup, "FACEKEEP_MATCH_THRESHOLD", &mut self.policy.match_threshold);
        override_parsed(&lookup, "FACEKEEP_UPDATE_THRESHOLD", &mut self.policy.update_threshold);
        override_parsed(&lookup, "FACEKEEP_EMBEDDING_DIM", &mut self.policy.embedding_dim);
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else { return };
    match raw.parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable override"),
    }
}

fn xdg_dir(var: &str, home_relative: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(home_relative)
    })
}
