use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::Network;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    FileRead(#[from] io::Error),
    #[error("failed to deserialize settings: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("invalid name filter: {0}")]
    NameFilter(#[from] regex::Error),
}

pub type SettingsResult = Result<Settings, SettingsError>;

/// Whazzup feed parsing.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all(deserialize = "camelCase"))]
pub struct ParserSettings {
    pub network: Network,
    pub delimiter: char,
    /// characters removed from client real names
    pub name_strip_pattern: String,
    /// split a trailing ICAO code off the real name
    pub extract_home_base: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            network: Network::Vatsim,
            delimiter: ':',
            name_strip_pattern: r#"[\p{Cc}"`´]"#.to_string(),
            extract_home_base: true,
        }
    }
}

impl ParserSettings {
    pub fn name_filter(&self) -> Result<Regex, regex::Error> {
        Regex::new(&self.name_strip_pattern)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all(deserialize = "camelCase"))]
pub struct SectorSettings {
    pub sector_list: PathBuf,
    pub display: PathBuf,
    pub supplementary_display: Option<PathBuf>,
    pub use_supplementary_display: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all(deserialize = "camelCase"))]
pub struct NavDataSettings {
    pub airports: Option<PathBuf>,
    pub navaids: Option<PathBuf>,
    pub fixes: Option<PathBuf>,
    pub airways: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all(deserialize = "camelCase"))]
pub struct ResolverSettings {
    /// route tokens that never name a fix
    pub ignored_tokens: Vec<String>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            ignored_tokens: ["DCT", "SID", "STAR", "IFR", "VFR"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all(deserialize = "camelCase"))]
pub struct Settings {
    pub parser: ParserSettings,
    pub sectors: SectorSettings,
    pub nav_data: NavDataSettings,
    pub resolver: ResolverSettings,
}

impl Settings {
    pub fn from_json(content: &[u8]) -> SettingsResult {
        let settings: Settings = serde_json::from_slice(content)?;
        // reject broken filters early instead of on the first snapshot
        settings.parser.name_filter()?;
        Ok(settings)
    }

    pub fn from_path(path: &Path) -> SettingsResult {
        Self::from_json(&fs_err::read(path)?)
    }
}
