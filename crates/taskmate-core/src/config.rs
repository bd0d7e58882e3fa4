use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use reqwest::Url;
use tracing::{debug, info, trace, warn};

use crate::store::local::DEFAULT_SLOT;
use crate::task::Category;

const RC_FILE_NAME: &str = ".taskmaterc";
const RC_ENV: &str = "TASKMATERC";
const DATA_ENV: &str = "TASKMATE_DATA";

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let mut map = HashMap::new();
        for (key, value) in [
            ("data.location", "~/.taskmate"),
            ("store.backend", "local"),
            ("store.slot", DEFAULT_SLOT),
            ("remote.url", "http://localhost:5000"),
            ("remote.timeout", "30"),
            ("color", "on"),
            ("default.category", "personal"),
        ] {
            map.insert(key.to_string(), value.to_string());
        }

        Self {
            map,
            loaded_files: vec![],
        }
    }
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config::default();

        let rc = resolve_rc_path(rc_override)?;
        if let Some(path) = rc {
            info!(rc = %path.display(), "loading taskmaterc");
            cfg.load_file(&path)?;
        } else {
            warn!("no taskmaterc found; using defaults");
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn default_category(&self) -> Category {
        self.get("default.category")
            .map(|raw| Category::parse(raw.trim()))
            .unwrap_or_default()
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }
            if line.is_empty() {
                continue;
            }

            if let Some(include_rest) = line.strip_prefix("include ") {
                let include_path = resolve_include_path(&base_dir, include_rest.trim())?;
                debug!(
                    file = %path.display(),
                    include = %include_path.display(),
                    line = line_num + 1,
                    "processing include"
                );

                if self.loaded_files.contains(&include_path) {
                    warn!(include = %include_path.display(), "include already loaded; skipping");
                } else if include_path.exists() {
                    self.load_file(&include_path)?;
                } else {
                    warn!(include = %include_path.display(), "include file does not exist; skipping");
                }
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

/// Backend choice and its construction parameters, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    Local { data_dir: PathBuf, slot: String },
    Remote { base_url: Url, timeout: Duration },
}

impl StoreSettings {
    #[tracing::instrument(skip(cfg, data_override))]
    pub fn from_config(cfg: &Config, data_override: Option<&Path>) -> anyhow::Result<Self> {
        let backend = cfg
            .get("store.backend")
            .unwrap_or_else(|| "local".to_string());

        let settings = match backend.trim().to_ascii_lowercase().as_str() {
            "local" => {
                let slot = cfg
                    .get("store.slot")
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|| DEFAULT_SLOT.to_string());
                if slot.is_empty() || slot.contains(['/', '\\']) {
                    bail!("invalid store.slot: {slot:?}");
                }
                StoreSettings::Local {
                    data_dir: resolve_data_dir(cfg, data_override)?,
                    slot,
                }
            }
            "remote" => {
                let raw_url = cfg
                    .get("remote.url")
                    .ok_or_else(|| anyhow!("store.backend=remote requires remote.url"))?;
                let base_url = Url::parse(raw_url.trim())
                    .with_context(|| format!("invalid remote.url: {raw_url}"))?;
                if !matches!(base_url.scheme(), "http" | "https") {
                    bail!("remote.url must use http or https: {base_url}");
                }

                let raw_timeout = cfg
                    .get("remote.timeout")
                    .unwrap_or_else(|| "30".to_string());
                let secs: u64 = raw_timeout
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid remote.timeout: {raw_timeout}"))?;
                if secs == 0 {
                    bail!("remote.timeout must be at least one second");
                }

                StoreSettings::Remote {
                    base_url,
                    timeout: Duration::from_secs(secs),
                }
            }
            other => bail!("unknown store.backend: {other} (expected local or remote)"),
        };

        debug!(?settings, "resolved store settings");
        Ok(settings)
    }
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = override_dir {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_dir) = std::env::var(DATA_ENV)
        && !env_dir.trim().is_empty()
    {
        return Ok(expand_tilde(Path::new(env_dir.trim())));
    }

    if let Some(cfg_value) = cfg.get("data.location") {
        return Ok(expand_tilde(Path::new(&cfg_value)));
    }

    default_data_dir()
}

#[tracing::instrument(skip(override_path))]
fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var(RC_ENV) {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let Some(home) = dirs::home_dir() else {
        return Ok(None);
    };
    let candidate = home.join(RC_FILE_NAME);
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".taskmate"))
}

fn resolve_include_path(base_dir: &Path, include: &str) -> anyhow::Result<PathBuf> {
    if include.trim().is_empty() {
        return Err(anyhow!("include path cannot be empty"));
    }

    let expanded = expand_tilde(Path::new(include));
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
