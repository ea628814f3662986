use nestkv_store::{Context, Kv, KvError, Store};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Routes library logs to the test output when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Opens a fresh store inside a temporary directory.
///
/// The directory is returned alongside the store and must outlive it.
/// # Panics
/// * If the store cannot be opened.
#[must_use]
pub fn setup_store() -> (TempDir, Store) {
    init_tracing();
    let dir = TempDir::new().expect("Temp dir creation failed");
    let store = Store::builder().path(dir.path().join("kv")).open().expect("Store setup failed");
    (dir, store)
}

/// Collects a full listing of `kv` starting at `start`.
/// # Errors
/// * Propagates the first error the listing yields.
pub fn list_all(kv: &Kv, start: &str) -> Result<Vec<String>, KvError> {
    kv.list(&Context::background(), start)?.collect()
}
