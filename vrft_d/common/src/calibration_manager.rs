use crate::CalibrationData;
use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

const CALIBRATION_FILENAME: &str = "calibration.json";

/// Reads and writes the persisted calibration ranges.
#[derive(Debug, Clone)]
pub struct CalibrationManager {
    storage_path: PathBuf,
}

impl CalibrationManager {
    pub fn new(storage_dir: PathBuf) -> Self {
        Self {
            storage_path: storage_dir.join(CALIBRATION_FILENAME),
        }
    }

    pub fn save(&self, data: &CalibrationData) -> Result<()> {
        if let Some(parent) = self.storage_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create calibration dir: {:?}", parent))?;
            }
        }
        let mut sanitized = data.clone();
        sanitized.sanitize();

        let file = File::create(&self.storage_path).context("Failed to create calibration file")?;
        serde_json::to_writer_pretty(file, &sanitized)
            .context("Failed to serialize calibration data")?;
        info!("Saved calibration data to {:?}", self.storage_path);
        Ok(())
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<CalibrationData>> {
        if !self.storage_path.exists() {
            info!(
                "No calibration file found at {:?}, starting uncalibrated",
                self.storage_path
            );
            return Ok(None);
        }

        let file = File::open(&self.storage_path).context("Failed to open calibration file")?;
        let reader = BufReader::new(file);
        let data: CalibrationData =
            serde_json::from_reader(reader).context("Failed to deserialize calibration data")?;

        info!("Loaded calibration data from {:?}", self.storage_path);
        Ok(Some(data))
    }
}
