use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::DuplicatePolicy;

#[derive(Debug, Default, Deserialize)]
pub struct UserConfig {
    pub logging: Option<LoggingCfg>,
    pub workbook: Option<WorkbookCfg>,
    pub export: Option<ExportCfg>,
    pub apply: Option<ApplyCfg>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingCfg {
    pub to_file: Option<bool>,
    pub dir: Option<String>,
    pub json: Option<bool>,
    pub compact: Option<bool>,
    pub pretty: Option<bool>,
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkbookCfg {
    pub dir: Option<String>,           // absolute path preferred
    pub bindings_file: Option<String>, // overrides <dir>/model_suppliers.csv
    pub configs_file: Option<String>,  // overrides <dir>/model_configs.csv
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportCfg {
    pub dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyCfg {
    pub on_duplicate: Option<DuplicatePolicy>,
}

pub fn load_user_config(cw_home: &Path) -> anyhow::Result<Option<UserConfig>> {
    let path = cw_home.join("config.toml");
    if !path.exists() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path)?;
    let cfg: UserConfig = toml::from_str(&s)?;
    Ok(Some(cfg))
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
