use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{
    combatant::Side,
    error::{Error, Result},
};

pub fn agent_key(prefix: &str, side: Side) -> String {
    format!("{}-agent{}", prefix, side.number())
}

pub fn round_key(prefix: &str) -> String {
    format!("{}-round", prefix)
}

/// Opaque keyed byte storage for model parameters and bookkeeping.
pub trait BlobStore {
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()>;

    /// `Ok(None)` when nothing has been stored under `key` yet.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// One file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| Error::Io {
            operation: "create store directory",
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", key))
    }
}

impl BlobStore for FileStore {
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        // Readers never see a partially written blob.
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes).map_err(|source| Error::Io {
            operation: "write",
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| Error::Io {
            operation: "rename",
            path,
            source,
        })
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::Io {
                operation: "read",
                path,
                source,
            }),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl BlobStore for MemoryStore {
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.insert(key.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).cloned())
    }
}

pub fn load_round(store: &impl BlobStore, prefix: &str) -> Result<u64> {
    let key = round_key(prefix);
    match store.get(&key)? {
        None => Ok(0),
        Some(bytes) => std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or(Error::CorruptRound { key }),
    }
}

pub fn save_round(store: &mut impl BlobStore, prefix: &str, round: u64) -> Result<()> {
    store.put(&round_key(prefix), round.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_keys() {
        assert_eq!(agent_key("duel", Side::One), "duel-agent1");
        assert_eq!(agent_key("duel", Side::Two), "duel-agent2");
        assert_eq!(round_key("duel"), "duel-round");
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("models")).unwrap();
        assert_eq!(store.get("duel-agent1").unwrap(), None);

        store.put("duel-agent1", &[1, 2, 3]).unwrap();
        assert_eq!(store.get("duel-agent1").unwrap(), Some(vec![1, 2, 3]));
        store.put("duel-agent1", &[4]).unwrap();
        assert_eq!(store.get("duel-agent1").unwrap(), Some(vec![4]));
        assert!(store.dir().join("duel-agent1.bin").exists());
    }

    #[test]
    fn round_counter_defaults_to_zero() {
        let mut store = MemoryStore::default();
        assert_eq!(load_round(&store, "duel").unwrap(), 0);
        save_round(&mut store, "duel", 41).unwrap();
        assert_eq!(load_round(&store, "duel").unwrap(), 41);
        assert_eq!(store.get("duel-round").unwrap(), Some(b"41".to_vec()));
    }

    #[test]
    fn corrupt_round_counter_is_reported() {
        let mut store = MemoryStore::default();
        store.put("duel-round", b"forty").unwrap();
        assert!(matches!(
            load_round(&store, "duel"),
            Err(Error::CorruptRound { .. })
        ));
    }
}
