//! Native module loading and the offline module store.

use anyhow::{bail, Context, Result};
use api::{LocalTrackingModule, ModuleDataService, RemoteTrackingModule, TrackingModule};
use common::ModuleConfig;
use libloading::{Library, Symbol};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const MANIFEST_FILENAME: &str = "modules.json";
const RATINGS_FILENAME: &str = "ratings.json";

type CreateModule = unsafe extern "C" fn() -> Box<dyn TrackingModule>;

/// A module instance together with the library its code lives in.
pub struct LoadedModule {
    pub name: String,
    pub module: Box<dyn TrackingModule>,
    // Dropped after `module`; field order matters.
    _library: Library,
}

fn is_native_library(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "dll" || ext == "so" || ext == "dylib")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

pub fn load_module(path: &Path) -> Result<LoadedModule> {
    // SAFETY: the library is trusted to export `create_module` with this
    // signature and to be built against the same `api` crate.
    unsafe {
        let library = Library::new(path)
            .with_context(|| format!("Failed to open module library {:?}", path))?;
        let module = {
            let create: Symbol<CreateModule> = library
                .get(b"create_module")
                .with_context(|| format!("{:?} does not export create_module", path))?;
            create()
        };
        Ok(LoadedModule {
            name: file_name(path),
            module,
            _library: library,
        })
    }
}

/// Load every native library in the store's plugin directory. Failures are
/// logged and skipped.
pub fn load_installed(store: &LocalModuleStore) -> Result<Vec<LoadedModule>> {
    let mut loaded = Vec::new();
    for local in store.list_installed_modules()? {
        info!("Loading module: {:?}", local.path);
        match load_module(&local.path) {
            Ok(module) => {
                info!("Loaded module: {}", module.name);
                loaded.push(module);
            }
            Err(e) => error!("Failed to load module {:?}: {:#}", local.path, e),
        }
    }
    Ok(loaded)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Ratings(BTreeMap<String, u8>);

/// Offline `ModuleDataService` over the plugin directories and a cached
/// manifest.
#[derive(Debug, Clone)]
pub struct LocalModuleStore {
    plugins_dir: PathBuf,
    legacy_dir: PathBuf,
}

impl LocalModuleStore {
    pub fn new(plugins_dir: impl Into<PathBuf>, legacy_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            legacy_dir: legacy_dir.into(),
        }
    }

    pub fn from_config(config: &ModuleConfig) -> Self {
        Self::new(config.plugins_dir.clone(), config.legacy_dir.clone())
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        if !self.plugins_dir.exists() {
            warn!("{:?} not found. Creating it.", self.plugins_dir);
            fs::create_dir_all(&self.plugins_dir)
                .with_context(|| format!("Failed to create {:?}", self.plugins_dir))?;
        }
        Ok(())
    }

    fn manifest_path(&self) -> PathBuf {
        self.plugins_dir.join(MANIFEST_FILENAME)
    }

    fn ratings_path(&self) -> PathBuf {
        self.plugins_dir.join(RATINGS_FILENAME)
    }

    fn read_json<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
        if !path.exists() {
            debug!("{:?} does not exist yet", path);
            return Ok(T::default());
        }
        let file = fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse {:?}", path))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        self.ensure_dirs()?;
        let file =
            fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)
            .with_context(|| format!("Failed to write {:?}", path))
    }

    fn files_in(dir: &Path, accept: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {:?}", dir))? {
            let path = entry?.path();
            if path.is_file() && accept(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl ModuleDataService for LocalModuleStore {
    fn list_available_modules(&self) -> Result<Vec<RemoteTrackingModule>> {
        Self::read_json(&self.manifest_path())
    }

    fn get_rating(&self, module: &RemoteTrackingModule) -> Result<Option<u8>> {
        let ratings: Ratings = Self::read_json(&self.ratings_path())?;
        Ok(ratings.0.get(&module.module_id).copied())
    }

    fn set_rating(&self, module: &RemoteTrackingModule, rating: u8) -> Result<()> {
        if !(1..=5).contains(&rating) {
            bail!("Rating must be between 1 and 5, got {}", rating);
        }
        let mut ratings: Ratings = Self::read_json(&self.ratings_path())?;
        ratings.0.insert(module.module_id.clone(), rating);
        self.write_json(&self.ratings_path(), &ratings)
    }

    fn list_installed_modules(&self) -> Result<Vec<LocalTrackingModule>> {
        Ok(Self::files_in(&self.plugins_dir, is_native_library)?
            .into_iter()
            .map(|path| LocalTrackingModule {
                name: file_name(&path),
                path,
            })
            .collect())
    }

    fn increment_download_count(&self, module: &RemoteTrackingModule) -> Result<()> {
        let mut manifest: Vec<RemoteTrackingModule> = Self::read_json(&self.manifest_path())?;
        let Some(entry) = manifest
            .iter_mut()
            .find(|m| m.module_id == module.module_id)
        else {
            bail!("Module '{}' is not in the manifest", module.module_id);
        };
        entry.downloads += 1;
        self.write_json(&self.manifest_path(), &manifest)
    }

    fn list_legacy_modules(&self) -> Result<Vec<String>> {
        Ok(
            Self::files_in(&self.legacy_dir, |p| p.extension().is_some_and(|e| e == "dll"))?
                .iter()
                .map(|p| file_name(p))
                .collect(),
        )
    }
}
