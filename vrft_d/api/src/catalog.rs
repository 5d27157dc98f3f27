//! Module catalog contract. The daemon only consumes this; nothing on the
//! tick path depends on it.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A module listed by a catalog, installed or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTrackingModule {
    pub module_id: String,
    pub module_name: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub rating: f32,
}

/// A module present on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalTrackingModule {
    pub name: String,
    pub path: PathBuf,
}

pub trait ModuleDataService {
    fn list_available_modules(&self) -> Result<Vec<RemoteTrackingModule>>;
    fn get_rating(&self, module: &RemoteTrackingModule) -> Result<Option<u8>>;
    fn set_rating(&self, module: &RemoteTrackingModule, rating: u8) -> Result<()>;
    fn list_installed_modules(&self) -> Result<Vec<LocalTrackingModule>>;
    fn increment_download_count(&self, module: &RemoteTrackingModule) -> Result<()>;
    fn list_legacy_modules(&self) -> Result<Vec<String>>;
}
