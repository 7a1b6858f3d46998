//! FILENAME: core/persistence/src/json_store.rs
//! Directory-backed view store: one pretty-printed JSON file per view.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{validate_name, PersistenceError, SavedView, ViewConfig, ViewId, ViewStore};

const FILE_PREFIX: &str = "view-";
const FILE_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(JsonFileStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn view_path(&self, id: ViewId) -> PathBuf {
        self.root.join(format!("{}{}.{}", FILE_PREFIX, id, FILE_EXTENSION))
    }

    /// Ids of all view files in the directory, ascending.
    fn view_ids(&self) -> Result<Vec<ViewId>, PersistenceError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix(FILE_PREFIX))
                .and_then(|s| s.parse::<ViewId>().ok());
            if let Some(id) = id {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

impl ViewStore for JsonFileStore {
    fn save_view(
        &mut self,
        name: &str,
        description: &str,
        config: &ViewConfig,
    ) -> Result<SavedView, PersistenceError> {
        let name = validate_name(name)?;
        let id = self.view_ids()?.last().map_or(1, |last| last + 1);

        let view = SavedView {
            id,
            name,
            description: description.to_string(),
            config: config.clone(),
        };

        let json = serde_json::to_string_pretty(&view)?;
        fs::write(self.view_path(id), json)?;
        log::info!("saved view id={} to {}", id, self.root.display());
        Ok(view)
    }

    fn load_view(&self, id: ViewId) -> Result<SavedView, PersistenceError> {
        let json = match fs::read_to_string(self.view_path(id)) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PersistenceError::ViewNotFound(id))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    fn list_views(&self) -> Result<Vec<SavedView>, PersistenceError> {
        self.view_ids()?.into_iter().map(|id| self.load_view(id)).collect()
    }

    fn delete_view(&mut self, id: ViewId) -> Result<(), PersistenceError> {
        match fs::remove_file(self.view_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PersistenceError::ViewNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}
