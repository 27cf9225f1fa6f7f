use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, info, warn};

const CONFIG_FILE: &str = "taskdeck.toml";
const CONFIG_ENV_VAR: &str = "TASKDECK_CONFIG";
const SERVER_ENV_VAR: &str = "TASKDECK_SERVER";
const TIMEZONE_ENV_VAR: &str = "TASKDECK_TIMEZONE";
const DEFAULT_SERVER_URL: &str = "http://localhost:8080/api";

/// Which wire encoding the deployment uses for task priority. Both are
/// valid backend contracts; commands that write a priority consult this,
/// while reads round-trip whatever the server sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityScheme {
    Starred,
    Levels,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub timezone: Tz,
    pub scheme: PriorityScheme,
    pub color: bool,
    pub loaded_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    server: Option<ServerSection>,
    time: Option<TimeSection>,
    priority: Option<PrioritySection>,
    color: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSection {
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PrioritySection {
    scheme: Option<PriorityScheme>,
}

impl Config {
    #[tracing::instrument(skip(config_override, server_override))]
    pub fn load(
        config_override: Option<&Path>,
        server_override: Option<&str>,
    ) -> anyhow::Result<Self> {
        let (file, loaded_file) = match resolve_config_path(config_override) {
            Some(path) if path.exists() => {
                info!(file = %path.display(), "loading config file");
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let parsed: ConfigFile = toml::from_str(&raw)
                    .with_context(|| format!("failed to parse {}", path.display()))?;
                (parsed, Some(path))
            }
            Some(path) => {
                debug!(file = %path.display(), "config file not found; using defaults");
                (ConfigFile::default(), None)
            }
            None => {
                warn!("cannot determine config directory; using defaults");
                (ConfigFile::default(), None)
            }
        };

        let server_url = server_override
            .map(ToString::to_string)
            .or_else(|| env_var(SERVER_ENV_VAR))
            .or_else(|| file.server.and_then(|s| s.url))
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let server_url = server_url.trim_end_matches('/').to_string();

        let timezone = resolve_timezone(
            env_var(TIMEZONE_ENV_VAR)
                .or_else(|| file.time.and_then(|t| t.timezone))
                .as_deref(),
        )?;

        let scheme = file
            .priority
            .and_then(|p| p.scheme)
            .unwrap_or(PriorityScheme::Levels);

        let color = file.color.unwrap_or(true);

        info!(
            server = %server_url,
            timezone = %timezone,
            scheme = ?scheme,
            "resolved configuration"
        );

        Ok(Self {
            server_url,
            timezone,
            scheme,
            color,
            loaded_file,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_config_path(config_override: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = config_override {
        return Some(path.to_path_buf());
    }

    if let Some(raw) = env_var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(raw));
    }

    dirs::config_dir().map(|dir| dir.join("taskdeck").join(CONFIG_FILE))
}

fn resolve_timezone(raw: Option<&str>) -> anyhow::Result<Tz> {
    let Some(raw) = raw else {
        return Ok(chrono_tz::UTC);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(chrono_tz::UTC);
    }

    trimmed
        .parse::<Tz>()
        .map_err(|err| anyhow!("invalid timezone id {trimmed}: {err}"))
}

/// Where the persisted session lives. Next to the config file so both
/// pieces of durable client state share one directory.
pub fn session_path() -> anyhow::Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("cannot determine config directory"))?
        .join("taskdeck");
    Ok(dir.join("session.json"))
}

#[cfg(test)]
mod tests {
    use super::resolve_timezone;

    #[test]
    fn missing_timezone_defaults_to_utc() {
        let tz = resolve_timezone(None).expect("default timezone");
        assert_eq!(tz, chrono_tz::UTC);
    }

    #[test]
    fn named_timezone_parses() {
        let tz = resolve_timezone(Some("America/New_York")).expect("parse timezone");
        assert_eq!(tz.name(), "America/New_York");
    }

    #[test]
    fn garbage_timezone_is_an_error() {
        assert!(resolve_timezone(Some("Not/AZone")).is_err());
    }
}
