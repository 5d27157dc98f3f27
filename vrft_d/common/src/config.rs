use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutatorConfig {
    pub enabled: bool,
    /// 0.0 passes values through untouched, 1.0 is the heaviest filter.
    pub smoothness: f32,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smoothness: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub enabled: bool,
    /// Keep adapting at `steady_weight` after the learning window.
    pub continuous: bool,
    pub learning_duration_secs: f32,
    pub learning_weight: f32,
    pub steady_weight: f32,
    pub storage_dir: PathBuf,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            continuous: true,
            learning_duration_secs: 30.0,
            learning_weight: 0.75,
            steady_weight: 0.2,
            storage_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    #[serde(alias = "osc_send_address")]
    pub send_address: String,
    #[serde(alias = "osc_send_port")]
    pub send_port: u16,
    pub receive_port: u16,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            send_address: "127.0.0.1".to_string(),
            send_port: 9000,
            receive_port: 9001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    #[serde(alias = "active_plugin")]
    pub active: String,
    pub plugins_dir: PathBuf,
    pub legacy_dir: PathBuf,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            active: "vd_module.dll".to_string(),
            plugins_dir: PathBuf::from("plugins/native"),
            legacy_dir: PathBuf::from("plugins/legacy"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9010,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mutator: MutatorConfig,
    pub calibration: CalibrationConfig,
    pub osc: OscConfig,
    pub module: ModuleConfig,
    pub operator: OperatorConfig,
    pub max_fps: Option<f32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mutator: MutatorConfig::default(),
            calibration: CalibrationConfig::default(),
            osc: OscConfig::default(),
            module: ModuleConfig::default(),
            operator: OperatorConfig::default(),
            max_fps: Some(200.0),
        }
    }
}

impl Config {
    /// Reads `path`, or writes the defaults there when it does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading config from {:?}", path);
            let file = fs::File::open(path)
                .with_context(|| format!("Failed to open config {:?}", path))?;
            let reader = std::io::BufReader::new(file);
            let config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config {:?}", path))?;
            Ok(config)
        } else {
            info!("Config not found. Creating default at {:?}", path);
            let config = Config::default();
            let file = fs::File::create(path)
                .with_context(|| format!("Failed to create config {:?}", path))?;
            let writer = std::io::BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &config).context("Failed to write config")?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let json = r#"{ "calibration": { "learning_duration_secs": 5.0 }, "osc": { "osc_send_port": 9100 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.calibration.learning_duration_secs, 5.0);
        assert_eq!(config.calibration.learning_weight, 0.75);
        assert_eq!(config.calibration.steady_weight, 0.2);
        assert_eq!(config.osc.send_port, 9100);
        assert_eq!(config.osc.receive_port, 9001);
        assert!(config.mutator.enabled);
        assert_eq!(config.max_fps, Some(200.0));
    }

    #[test]
    fn load_or_create_writes_defaults() {
        let dir = std::env::temp_dir().join("vrft_test_config_create");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());

        let reloaded = Config::load_or_create(&path).unwrap();
        assert_eq!(reloaded.osc.send_port, created.osc.send_port);
        assert_eq!(reloaded.module.active, created.module.active);

        let _ = fs::remove_dir_all(&dir);
    }
}
