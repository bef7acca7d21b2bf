use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scan: ScanConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub browse: BrowseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL or filesystem path of the index database.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Root of the real media tree to walk.
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Upper bound on the deep probe, in seconds. A probe that does not
    /// finish in time is treated as a failure for that file, not a hang.
    pub deadline_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { deadline_secs: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseConfig {
    /// Whether the root `files` pseudo-directory lists every indexed file.
    pub list_all_at_root: bool,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            list_all_at_root: true,
        }
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
