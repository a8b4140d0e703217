//! OTSrv Configuration Management
//!
//! Loads server options from `serveroptions.txt` and reads the XML-like
//! documents that declare scripted modules.

pub mod xml;

pub use xml::{parse_document, parse_integer, ConfigNode, XmlError, XmlNode};

use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the options file, relative to the working directory
pub const DEFAULT_OPTIONS_PATH: &str = "servers/default/config/serveroptions.txt";

/// Server options relevant to scripted module dispatch
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name (from "name" option)
    pub name: String,
    /// Data directory (from "datadir" option, default: data)
    pub data_dir: PathBuf,
    /// Module declarations and scripts (from "modulesdir" option, default: data/modules)
    pub modules_dir: PathBuf,
    /// Script call environments available for nested calls (from "maxnestedcalls" option, default: 16)
    pub max_nested_calls: usize,
    /// Log filter directive (from "loglevel" option, default: info)
    pub log_level: String,
    /// Reload modules when files under `modules_dir` change (from "watchmodules" option)
    pub watch_modules: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "My Server".to_string(),
            data_dir: PathBuf::from("data"),
            modules_dir: PathBuf::from("data/modules"),
            max_nested_calls: 16,
            log_level: "info".to_string(),
            watch_modules: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from an options file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        Ok(config)
    }

    /// Load configuration from the default server path
    pub fn load_default() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_from_file(DEFAULT_OPTIONS_PATH)
    }

    /// Parse serveroptions.txt content
    fn parse(content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key=value
            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim();
                let value = line[eq_pos + 1..].trim();

                config.parse_option(&key.to_ascii_lowercase(), value);
            }
        }

        if config.max_nested_calls == 0 {
            return Err("maxnestedcalls must be at least 1".into());
        }

        Ok(config)
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key {
            "name" => self.name = value.into(),
            "datadir" => {
                self.data_dir = PathBuf::from(value);
            }
            "modulesdir" => {
                self.modules_dir = PathBuf::from(value);
            }
            "maxnestedcalls" => {
                self.max_nested_calls = value.parse().unwrap_or(16);
            }
            "loglevel" => self.log_level = value.into(),
            "watchmodules" => {
                self.watch_modules = parse_bool(value).unwrap_or(false);
            }
            _ => {
                tracing::debug!("Unknown config option: {} = {}", key, value);
            }
        }
    }

    /// Path of the module declaration document
    pub fn modules_file(&self) -> PathBuf {
        self.modules_dir.join("modules.xml")
    }

    /// Display configuration summary
    pub fn display(&self) {
        tracing::info!("Server Configuration:");
        tracing::info!("    Name: {}", self.name);
        tracing::info!("    Data: {}", self.data_dir.display());
        tracing::info!("    Modules: {}", self.modules_file().display());
        tracing::info!("    Max Nested Script Calls: {}", self.max_nested_calls);
        tracing::info!("    Watch Modules: {}", self.watch_modules);
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
