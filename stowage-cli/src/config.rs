use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use stowage_core::config::ImporterConfig;

const CONFIG_PATH_VAR: &str = "STOWAGE_CONFIG_PATH";
const CONFIG_JSON_VAR: &str = "STOWAGE_CONFIG_JSON";

const DEFAULT_CANDIDATES: &[&str] =
    &["stowage.toml", "stowage.json", "config/stowage.toml"];

/// Source that produced the importer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImporterConfigSource {
    #[default]
    Default,
    Flag(PathBuf),
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Resolves importer configuration overrides.
///
/// Evaluation order:
/// 1) an explicit `--config` file,
/// 2) `$STOWAGE_CONFIG_PATH` (TOML or JSON file),
/// 3) `$STOWAGE_CONFIG_JSON` (inline JSON),
/// 4) the first default file found under `base_dir`,
/// 5) defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    pub explicit_path: Option<PathBuf>,
    pub env_path: Option<String>,
    pub env_json: Option<String>,
    pub base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn from_env(explicit_path: Option<PathBuf>) -> Self {
        Self {
            explicit_path,
            env_path: env::var(CONFIG_PATH_VAR).ok(),
            env_json: env::var(CONFIG_JSON_VAR).ok(),
            base_dir: PathBuf::from("."),
        }
    }

    pub fn load(&self) -> anyhow::Result<(ImporterConfig, ImporterConfigSource)> {
        if let Some(path) = &self.explicit_path {
            let config = load_from_file(path)?;
            return Ok((config, ImporterConfigSource::Flag(path.clone())));
        }

        if let Some(path_str) = &self.env_path
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = load_from_file(&path)?;
            return Ok((config, ImporterConfigSource::EnvPath(path)));
        }

        if let Some(raw) = &self.env_json
            && !raw.trim().is_empty()
        {
            let parsed = parse_json(raw)
                .with_context(|| format!("failed to parse {CONFIG_JSON_VAR}"))?;
            return Ok((parsed, ImporterConfigSource::EnvInline));
        }

        if let Some(path) = self.find_default_file() {
            let config = load_from_file(&path)?;
            return Ok((config, ImporterConfigSource::File(path)));
        }

        Ok((ImporterConfig::default(), ImporterConfigSource::Default))
    }

    fn find_default_file(&self) -> Option<PathBuf> {
        DEFAULT_CANDIDATES
            .iter()
            .map(|candidate| self.base_dir.join(candidate))
            .find(|path| path.exists())
    }
}

pub fn load_from_file(path: &Path) -> anyhow::Result<ImporterConfig> {
    let contents = fs::read_to_string(path).with_context(|| {
        format!("failed to read importer config from {}", path.display())
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => parse_json(&contents).with_context(|| {
            format!("invalid importer config {}", path.display())
        }),
        Some("toml") | Some("tml") => toml::from_str(&contents).map_err(|err| {
            anyhow!("invalid importer config {}: {}", path.display(), err)
        }),
        _ => parse_from_str(&contents, &path.display().to_string()),
    }
}

pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<ImporterConfig> {
    toml::from_str(contents).or_else(|toml_err| {
        serde_json::from_str(contents).map_err(|json_err| {
            anyhow!(
                "failed to parse importer config {}: toml error: {}; json error: {}",
                origin,
                toml_err,
                json_err
            )
        })
    })
}

pub fn parse_json(raw: &str) -> anyhow::Result<ImporterConfig> {
    serde_json::from_str(raw)
        .map_err(|err| anyhow!("invalid importer config json: {err}"))
}
