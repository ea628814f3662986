use crate::error::KvError;
use crate::store::Store;
use tracing::{info, warn};

impl Store {
    /// Compacts the engine file, reclaiming space left by deleted and overwritten entries.
    ///
    /// Other calls on this store wait until compaction finishes. Returns whether the file
    /// changed.
    ///
    /// # Errors
    /// Returns [`KvError::Closed`] after [`Store::close`], or [`KvError::Engine`] if the engine
    /// refuses (for example while a read snapshot is still alive).
    pub fn compact(&self) -> Result<bool, KvError> {
        let compacted = self.engine().compact()?;
        info!(path = %self.path().display(), compacted, "Store compacted");
        Ok(compacted)
    }

    /// Verifies the engine file's checksums.
    ///
    /// Returns `false` when corruption was found and repaired.
    ///
    /// # Errors
    /// Returns [`KvError::Closed`] after [`Store::close`], or [`KvError::Engine`] if the file
    /// cannot be repaired.
    pub fn check_integrity(&self) -> Result<bool, KvError> {
        let intact = self.engine().check_integrity()?;
        if intact {
            info!(path = %self.path().display(), "Store integrity verified");
        } else {
            warn!(path = %self.path().display(), "Store corruption repaired");
        }
        Ok(intact)
    }
}

#[cfg(test)]
mod tests {
    use crate::kv::PutOptions;
    use crate::store::Store;
    use tempfile::TempDir;

    #[test]
    fn compaction_keeps_data() {
        let dir = TempDir::new().unwrap();
        let store = Store::builder().path(dir.path()).open().unwrap();
        let kv = store.keyspace("k");
        for i in 0..64 {
            kv.put(PutOptions::new(&format!("{i:03}"), &[7; 512])).unwrap();
        }
        for i in 0..60 {
            kv.delete(&format!("{i:03}")).unwrap();
        }

        store.compact().unwrap();
        assert_eq!(kv.len().unwrap(), 4);
        assert_eq!(kv.get("063").unwrap(), vec![7; 512]);
    }

    #[test]
    fn fresh_store_is_intact() {
        let dir = TempDir::new().unwrap();
        let store = Store::builder().path(dir.path()).open().unwrap();
        store.keyspace("k").put(PutOptions::new("a", b"1")).unwrap();
        assert!(store.check_integrity().unwrap());
    }

    #[test]
    fn maintenance_after_close_fails() {
        let dir = TempDir::new().unwrap();
        let store = Store::builder().path(dir.path()).open().unwrap();
        store.close().unwrap();
        assert!(store.compact().unwrap_err().is_closed());
        assert!(store.check_integrity().unwrap_err().is_closed());
    }
}
