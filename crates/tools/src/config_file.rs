//! Generation configs stored as TOML. Missing tables and fields fall back to
//! the built-in defaults.

use std::fs;
use std::io;
use std::path::Path;

use delve_core::GenConfig;

/// Parses and validates a config, reporting both failure kinds as
/// `InvalidData`.
pub fn parse(text: &str) -> io::Result<GenConfig> {
    let config: GenConfig =
        toml::from_str(text).map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    config.validate().map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    Ok(config)
}

pub fn load(path: &Path) -> io::Result<GenConfig> {
    parse(&fs::read_to_string(path)?)
}

pub fn save(path: &Path, config: &GenConfig) -> io::Result<()> {
    let text = toml::to_string_pretty(config)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    fs::write(path, text)
}
