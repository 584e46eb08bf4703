//! Configuration loading and validation.
//!
//! Gangway reads a single file (YAML, JSON, or TOML, chosen by extension)
//! describing the server prefixes, proxy behavior, refresh policy, and the
//! application registry contents. [`load_file`] is the async entry point;
//! [`ConfigVersion`] wraps a SHA-256 content hash used by the registry
//! poll loop for change detection.

pub mod model;
pub mod validation;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::GangwayError;
use model::Config;
use validation::validate;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}

impl ConfigVersion {
    #[must_use]
    pub fn short(&self) -> &str {
        match self {
            Self::Hash(h) => h.get(..8).unwrap_or(h),
        }
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, GangwayError> {
    match ext {
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| GangwayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        "json" => serde_json::from_str(content).map_err(|e| GangwayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        "toml" => toml::from_str(content).map_err(|e| GangwayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(GangwayError::UnsupportedFormat(other.to_string())),
    }
}

async fn read_content(path: &Path) -> Result<String, GangwayError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GangwayError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            GangwayError::Io(e)
        }
    })
}

/// Read, parse, and validate a config file, returning it with its
/// content-hash version.
pub async fn load_file(path: &Path) -> Result<(Config, ConfigVersion), GangwayError> {
    let content = read_content(path).await?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config = parse_config_str(ext, &content, &path.display().to_string())?;

    if let Err(errors) = validate(&config) {
        return Err(GangwayError::ConfigValidation { errors });
    }

    let hash = sha256_hex(content.as_bytes());
    Ok((config, ConfigVersion::Hash(hash)))
}

/// Hash the file contents without parsing, for cheap change detection.
pub async fn file_version(path: &Path) -> Result<ConfigVersion, GangwayError> {
    let content = read_content(path).await?;
    Ok(ConfigVersion::Hash(sha256_hex(content.as_bytes())))
}
