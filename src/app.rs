use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::StorageError;
use crate::metadata::{DateRewriter, ExifToolRewriter};
use crate::remote::{LocalLibrary, PhotosApi};

/// Process-wide context for one command: the loaded config plus the
/// collaborators built from it.
pub struct App {
    config: Config,
    config_path: PathBuf,
}

impl App {
    pub fn init() -> Result<Self> {
        let config_path = Config::default_path()?;
        Self::init_at(config_path)
    }

    pub fn init_at<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref().to_path_buf();
        let config = Config::init_at(&config_path)?;
        Ok(Self { config, config_path })
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn save_config(&mut self, config: Config) -> Result<()> {
        config
            .save_to(&self.config_path)
            .with_context(|| format!("saving {}", self.config_path.display()))?;
        self.config = config;
        Ok(())
    }

    pub fn open_library(&self) -> Result<Arc<dyn PhotosApi>> {
        let lib = LocalLibrary::open(&self.config.library_path)
            .with_context(|| format!("opening library {}", self.config.library_path.display()))?;
        Ok(Arc::new(lib))
    }

    /// `None` when rewriting is off; an error when it is on but exiftool is missing.
    pub fn date_rewriter(&self, enabled: bool) -> Result<Option<Arc<dyn DateRewriter>>> {
        if !enabled {
            return Ok(None);
        }
        let r = ExifToolRewriter::detect().context(
            "date rewriting needs exiftool (brew install exiftool / apt-get install exiftool); \
             pass --no-rewrite-dates to upload files unchanged",
        )?;
        Ok(Some(Arc::new(r)))
    }
}

/// JSON persistence for small serde documents.
pub(crate) trait StorageObject: Sized {
    fn pretty_json(&self) -> Result<String, serde_json::Error>;
    fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), StorageError>;
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, StorageError>;
    /// Like `read_from`, but a missing file yields `Default`.
    fn read_or_default<P: AsRef<Path>>(path: P) -> Result<Self, StorageError>;
}

impl<T: Serialize + DeserializeOwned + Default> StorageObject for T {
    fn pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), StorageError> {
        let path = path.as_ref();
        let json = self
            .pretty_json()
            .map_err(|source| StorageError::Json { path: path.to_path_buf(), source })?;
        let io_err = |source| StorageError::Io { path: path.to_path_buf(), source };
        // 先写临时文件再重命名，避免写一半
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        std::io::Write::write_all(&mut tmp, json.as_bytes()).map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&s).map_err(|source| StorageError::Json { path: path.to_path_buf(), source })
    }

    fn read_or_default<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        match Self::read_from(&path) {
            Err(StorageError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }
}
