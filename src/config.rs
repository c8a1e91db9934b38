use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::preconditions::SUPPORTED_MAJOR_VERSIONS;
use crate::registry::Registry;

const DEFAULT_CONFIG_FILE: &str = "lockdown.toml";
const DEFAULT_SUDO: &str = "/usr/bin/sudo";
const DEFAULT_MINISIGN: &str = "minisign";

/// Main configuration structure loaded from lockdown.toml
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub preconditions: Option<PreconditionsConfig>,
    pub signature: Option<SignatureConfig>,
    pub tools: Option<ToolsConfig>,
    pub settings: Option<SettingsConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PreconditionsConfig {
    /// Major macOS versions to accept (e.g. [14, 15])
    pub supported_versions: Option<Vec<u32>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct SignatureConfig {
    /// minisign public key (the base64 line, starting with "RW")
    pub public_key: Option<String>,
    /// Defaults to `<executable>.minisig`
    pub signature_path: Option<String>,
}

/// External tool paths
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    pub minisign: Option<String>,
    pub sudo: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct SettingsConfig {
    /// Setting names left out of whole-registry runs
    #[serde(default)]
    pub skip: Vec<String>,
}

impl Config {
    /// Load config from file, or return default if no config exists.
    /// If an explicit path is provided via --config, it MUST exist (error if not).
    /// If no path is provided, check ./lockdown.toml (use default if not found).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    bail!("Config file not found: {}", p.display());
                }
                p
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    default_path
                } else {
                    return Ok(Config::default());
                }
            }
        };

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", config_path.display(), e))?;

        config.validate_versions()?;

        Ok(config)
    }

    fn validate_versions(&self) -> Result<()> {
        if let Some(versions) = self
            .preconditions
            .as_ref()
            .and_then(|p| p.supported_versions.as_ref())
        {
            if versions.is_empty() {
                bail!("Invalid preconditions.supported_versions: list cannot be empty");
            }
        }
        Ok(())
    }

    /// Reject skip entries that name no registered setting.
    pub fn validate(&self, registry: &Registry) -> Result<()> {
        for name in self.skipped_settings() {
            if registry.position(name).is_none() {
                bail!(
                    "Invalid settings.skip entry '{}': no such setting. Run `lockdown list` to see names.",
                    name
                );
            }
        }
        Ok(())
    }

    pub fn supported_versions(&self) -> Vec<u32> {
        self.preconditions
            .as_ref()
            .and_then(|p| p.supported_versions.clone())
            .unwrap_or_else(|| SUPPORTED_MAJOR_VERSIONS.to_vec())
    }

    /// Public key for signature verification; empty strings count as unset.
    pub fn signature_public_key(&self) -> Option<&str> {
        self.signature
            .as_ref()
            .and_then(|s| s.public_key.as_deref())
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn signature_path(&self) -> Option<&str> {
        self.signature
            .as_ref()
            .and_then(|s| s.signature_path.as_deref())
    }

    /// Configured path if set, otherwise the bare name for PATH lookup
    pub fn minisign_path(&self) -> String {
        self.tools
            .as_ref()
            .and_then(|t| t.minisign.clone())
            .unwrap_or_else(|| DEFAULT_MINISIGN.to_string())
    }

    pub fn sudo_path(&self) -> String {
        self.tools
            .as_ref()
            .and_then(|t| t.sudo.clone())
            .unwrap_or_else(|| DEFAULT_SUDO.to_string())
    }

    pub fn skipped_settings(&self) -> &[String] {
        self.settings
            .as_ref()
            .map(|s| s.skip.as_slice())
            .unwrap_or_default()
    }
}
