use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_MS: u64 = 3000;
const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 30_000;

/// Runtime settings for the hook and the admin CLI.
///
/// Built once per process and passed down explicitly; nothing in the engine
/// reads the environment on its own.
#[derive(Debug, Clone)]
pub struct Config {
    pub rules_file: PathBuf,
    /// Budget for one interception, store access included.
    pub timeout: Duration,
    pub enabled: bool,
    pub log_filter: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(val: &str) -> Self {
        match val.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_file: default_rules_file(std::env::var("HOME").ok().as_deref()),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            enabled: true,
            log_filter: "warn".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

fn default_rules_file(home: Option<&str>) -> PathBuf {
    match home.filter(|h| !h.is_empty()) {
        Some(home) => Path::new(home).join(".toolfix").join("rules.json"),
        None => PathBuf::from(".toolfix").join("rules.json"),
    }
}

/// Optional settings file (`.toolfix.toml` / `.toolfix.json`).
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    rules_file: Option<PathBuf>,
    timeout_ms: Option<u64>,
    enabled: Option<bool>,
    log: Option<String>,
    log_format: Option<String>,
}

/// Problems met while loading configuration. None of them is fatal; they are
/// reported once logging is up.
#[derive(Debug, Error)]
pub enum ConfigWarning {
    #[error("cannot read config file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ignoring invalid config file {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
    #[error("failed to load {}: {message}", path.display())]
    DotEnv { path: PathBuf, message: String },
}

/// Configuration plus whatever was skipped on the way.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub warnings: Vec<ConfigWarning>,
}

/// Emit load-time warnings through the installed subscriber.
pub fn report_warnings(warnings: &[ConfigWarning]) {
    for warning in warnings {
        tracing::warn!("{warning}");
    }
}

/// Load configuration: defaults, then the config file, then environment.
///
/// A `.env` next to the executable is loaded first; it never overrides
/// variables that are already set.
pub fn load_config() -> LoadedConfig {
    let mut warnings = Vec::new();
    if let Some(warning) = load_dotenv_beside_exe() {
        warnings.push(warning);
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut loaded = load_config_with(|key| std::env::var(key).ok(), &cwd);
    warnings.append(&mut loaded.warnings);
    loaded.warnings = warnings;
    loaded
}

/// Same as [`load_config`] with an injectable environment, for tests.
pub fn load_config_with<F>(env: F, cwd: &Path) -> LoadedConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = Config {
        rules_file: default_rules_file(env("HOME").as_deref()),
        ..Config::default()
    };
    let mut warnings = Vec::new();

    let explicit = env("TOOLFIX_CONFIG_FILE").map(PathBuf::from);
    let candidates = match explicit {
        Some(path) => vec![path],
        None => vec![cwd.join(".toolfix.toml"), cwd.join(".toolfix.json")],
    };
    if let Some(path) = candidates.iter().find(|p| p.is_file()) {
        match read_file_config(path) {
            Ok(file) => apply_file(&mut cfg, file, path.parent().unwrap_or(cwd)),
            Err(warning) => warnings.push(warning),
        }
    }

    if let Some(val) = env("TOOLFIX_RULES_FILE").filter(|v| !v.trim().is_empty()) {
        cfg.rules_file = PathBuf::from(val);
    }
    if let Some(ms) = env("TOOLFIX_TIMEOUT_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
        cfg.timeout = clamp_timeout(ms);
    }
    if let Some(val) = env("TOOLFIX_DISABLED") {
        cfg.enabled = !is_truthy(&val);
    }
    if let Some(val) = env("TOOLFIX_LOG").filter(|v| !v.trim().is_empty()) {
        cfg.log_filter = val;
    }
    if let Some(val) = env("TOOLFIX_LOG_FORMAT") {
        cfg.log_format = LogFormat::parse(&val);
    }

    LoadedConfig {
        config: cfg,
        warnings,
    }
}

fn apply_file(cfg: &mut Config, file: FileConfig, base: &Path) {
    if let Some(path) = file.rules_file {
        cfg.rules_file = if path.is_relative() { base.join(path) } else { path };
    }
    if let Some(ms) = file.timeout_ms {
        cfg.timeout = clamp_timeout(ms);
    }
    if let Some(enabled) = file.enabled {
        cfg.enabled = enabled;
    }
    if let Some(log) = file.log.filter(|l| !l.trim().is_empty()) {
        cfg.log_filter = log;
    }
    if let Some(format) = file.log_format {
        cfg.log_format = LogFormat::parse(&format);
    }
}

/// Parse a TOML or JSON settings file.
fn read_file_config(path: &Path) -> Result<FileConfig, ConfigWarning> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigWarning::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let parsed = if is_json {
        serde_json::from_str::<FileConfig>(&text).map_err(|e| e.to_string())
    } else {
        toml::from_str::<FileConfig>(&text).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigWarning::Invalid {
        path: path.to_path_buf(),
        message,
    })
}

fn clamp_timeout(ms: u64) -> Duration {
    Duration::from_millis(ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
}

fn is_truthy(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn load_dotenv_beside_exe() -> Option<ConfigWarning> {
    let exe_path = std::env::current_exe().ok()?;
    let env_file = exe_path.parent()?.join(".env");
    if !env_file.is_file() {
        return None;
    }
    dotenvy::from_path(&env_file)
        .err()
        .map(|e| ConfigWarning::DotEnv {
            path: env_file,
            message: e.to_string(),
        })
}
