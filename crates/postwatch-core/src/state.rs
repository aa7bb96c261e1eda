use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{domain::PostId, Result};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StateFileData {
    #[serde(default)]
    last_id: Option<PostId>,
}

/// One-field JSON file holding the last post id that was handled.
#[derive(Clone, Debug)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last saved id. A missing, empty or unreadable file counts as "never saved".
    pub fn load(&self) -> Option<PostId> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no state file yet");
            return None;
        }

        let txt = match fs::read_to_string(&self.path) {
            Ok(txt) => txt,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file unreadable; treating as first run");
                return None;
            }
        };
        if txt.trim().is_empty() {
            return None;
        }

        match serde_json::from_str::<StateFileData>(&txt) {
            Ok(data) => data.last_id,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file corrupt; treating as first run");
                None
            }
        }
    }

    /// Replace the saved id. Written to a sibling temp file first, then renamed.
    pub fn save(&self, id: PostId) -> Result<()> {
        let data = StateFileData { last_id: Some(id) };
        let txt = serde_json::to_string(&data)?;

        let tmp = self.tmp_path();
        let written = fs::write(&tmp, txt).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            tracing::error!(path = %self.path.display(), error = %e, "failed to save state");
            return Err(e.into());
        }

        tracing::debug!(path = %self.path.display(), %id, "state saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("state.json"))
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(&dir).load(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(PostId::new(1234)).unwrap();

        assert_eq!(store.load(), Some(PostId::new(1234)));
        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"{"last_id":"1234"}"#);
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn corrupt_or_odd_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        for body in ["", "   ", "not json", "[1,2]", r#"{"last_id":"abc"}"#, r#"{"last_id":null}"#, "{}"] {
            fs::write(store.path(), body).unwrap();
            assert_eq!(store.load(), None, "body {body:?}");
        }
    }

    #[test]
    fn reads_files_written_by_older_tooling() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"last_id": "1790000000000000001", "extra": 1}"#).unwrap();
        assert_eq!(store.load(), Some(PostId::new(1_790_000_000_000_000_001)));
    }

    #[test]
    fn save_into_missing_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nope").join("state.json"));
        assert!(store.save(PostId::new(1)).is_err());
    }
}
