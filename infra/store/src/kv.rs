//! Keyspace adapter: logical keys in, prefixed engine keys out.

use crate::context::Context;
use crate::engine::{Engine, Snapshot};
use crate::error::KvError;
use crate::prefix::Prefix;
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Bound, ControlFlow};
use std::sync::Arc;
use tracing::{debug, trace};

/// Arguments of [`Kv::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOptions<'a> {
    pub key: &'a str,
    pub data: &'a [u8],
    /// Overwrite an existing value instead of failing with [`KvError::KeyExists`].
    pub replace: bool,
}

impl<'a> PutOptions<'a> {
    /// A create-if-absent write of `data` under `key`.
    #[must_use]
    pub const fn new(key: &'a str, data: &'a [u8]) -> Self {
        Self { key, data, replace: false }
    }

    #[must_use]
    pub const fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

/// One keyspace of a store.
///
/// Every logical key is written to the shared engine as `prefix ++ key`, so keyspaces that
/// share an engine never observe each other's entries. A `Kv` is cheap to clone; it borrows
/// the engine and never closes it.
///
/// # Examples
///
/// ```rust
/// use nestkv_store::{Context, PutOptions, Store};
///
/// # fn main() -> Result<(), nestkv_store::KvError> {
/// # let tmp = tempfile::tempdir().unwrap();
/// let store = Store::builder().path(tmp.path().join("db")).create(true).open()?;
/// let blobs = store.keyspace("blobs");
///
/// blobs.put(PutOptions::new("a", b"1"))?;
/// assert!(blobs.put(PutOptions::new("a", b"2")).unwrap_err().is_exists());
/// blobs.put(PutOptions::new("a", b"2").replace(true))?;
/// assert_eq!(blobs.get("a")?, b"2");
///
/// let keys = blobs.list(&Context::background(), "")?.collect::<Result<Vec<_>, _>>()?;
/// assert_eq!(keys, ["a"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Kv {
    engine: Arc<Engine>,
    prefix: Prefix,
}

impl fmt::Debug for Kv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kv").field("prefix", &self.prefix).finish_non_exhaustive()
    }
}

impl Kv {
    pub(crate) fn new(engine: Arc<Engine>, prefix: Prefix) -> Self {
        debug!(prefix = %prefix, "Keyspace created");
        Self { engine, prefix }
    }

    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    /// Returns [`KvError::KeyNotFound`] if the key was never written (or was deleted), and
    /// [`KvError::Engine`] / [`KvError::Closed`] if the engine call fails.
    pub fn get(&self, key: &str) -> Result<Vec<u8>, KvError> {
        trace!(prefix = %self.prefix, key, "Reading key");
        self.engine.get(&self.prefix.add(key))?.ok_or_else(|| KvError::not_found(key))
    }

    /// Returns the subset of `keys` that currently exist, in query order.
    ///
    /// All probes run against one read snapshot.
    ///
    /// # Errors
    /// Fails only when the engine does.
    pub fn has<I, S>(&self, keys: I) -> Result<Vec<String>, KvError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<S> = keys.into_iter().collect();
        let physical: Vec<Vec<u8>> = keys.iter().map(|key| self.prefix.add(key.as_ref())).collect();
        let present = self.engine.contains_many(&physical)?;
        trace!(prefix = %self.prefix, probed = keys.len(), "Probed keys");

        Ok(keys
            .iter()
            .zip(present)
            .filter_map(|(key, found)| found.then(|| key.as_ref().to_owned()))
            .collect())
    }

    /// Writes `opts.data` under `opts.key`.
    ///
    /// With `replace` the write is an unconditional upsert. Without it the existence check and
    /// the insert run in one write transaction, so among concurrent creators of the same key
    /// exactly one succeeds.
    ///
    /// # Errors
    /// Returns [`KvError::KeyExists`] if `replace` is false and the key is present; the stored
    /// value is left untouched.
    pub fn put(&self, opts: PutOptions<'_>) -> Result<(), KvError> {
        let physical = self.prefix.add(opts.key);
        if opts.replace {
            self.engine.put(&physical, opts.data)?;
        } else {
            self.engine.update(|txn| {
                if txn.has(&physical)? {
                    return Err(KvError::exists(opts.key));
                }
                txn.put(&physical, opts.data)
            })?;
        }
        debug!(prefix = %self.prefix, key = opts.key, replace = opts.replace, "Key written");
        Ok(())
    }

    /// Removes `key`.
    ///
    /// # Errors
    /// Returns [`KvError::KeyNotFound`] if the key is absent; nothing is written in that case.
    pub fn delete(&self, key: &str) -> Result<(), KvError> {
        let physical = self.prefix.add(key);
        self.engine.update(|txn| {
            if txn.delete(&physical)? { Ok(()) } else { Err(KvError::not_found(key)) }
        })?;
        debug!(prefix = %self.prefix, key, "Key deleted");
        Ok(())
    }

    /// Lists the keys of this keyspace in ascending byte order, starting at `start`.
    ///
    /// The returned iterator is lazy and reads from one snapshot taken here. `ctx` is
    /// consulted before every step; once it is done the iterator yields the matching
    /// [`KvError::Cancelled`] or [`KvError::DeadlineExceeded`] and then ends. Dropping the
    /// iterator stops the listing and releases the snapshot.
    ///
    /// # Errors
    /// Fails if the engine is closed or a snapshot cannot be opened.
    pub fn list(&self, ctx: &Context, start: &str) -> Result<Keys, KvError> {
        ctx.err()?;
        let snapshot = self.engine.snapshot()?;
        trace!(prefix = %self.prefix, start, "Listing keys");
        Ok(Keys {
            prefix: self.prefix.clone(),
            ctx: ctx.clone(),
            snapshot: Some(snapshot),
            cursor: Bound::Included(self.prefix.add(start)),
            batch: VecDeque::new(),
            batch_size: self.engine.scan_batch(),
        })
    }

    /// Callback form of [`Kv::list`].
    ///
    /// `f` returns [`ControlFlow::Break`] to stop early; that is a clean `Ok(())`.
    ///
    /// # Errors
    /// Propagates engine failures and context cancellation.
    pub fn scan(
        &self,
        ctx: &Context,
        start: &str,
        mut f: impl FnMut(&str) -> ControlFlow<()>,
    ) -> Result<(), KvError> {
        for key in self.list(ctx, start)? {
            if f(&key?).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Counts the entries of this keyspace with a full ordered scan.
    ///
    /// # Errors
    /// Fails when the engine does.
    pub fn len(&self) -> Result<u64, KvError> {
        let mut count = 0u64;
        self.engine.walk(Bound::Included(self.prefix.as_bytes()), |physical| {
            if self.prefix.contains(physical) {
                count += 1;
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        })?;
        Ok(count)
    }

    /// # Errors
    /// Fails when the engine does.
    pub fn is_empty(&self) -> Result<bool, KvError> {
        let mut empty = true;
        self.engine.walk(Bound::Included(self.prefix.as_bytes()), |physical| {
            empty = !self.prefix.contains(physical);
            ControlFlow::Break(())
        })?;
        Ok(empty)
    }
}

/// Lazy iterator returned by [`Kv::list`].
///
/// Keys are pulled from the engine in bounded batches; the engine cursor never outlives one
/// batch, so consumer code never runs while an engine range is open. The snapshot is released
/// as soon as the iterator finishes, fails or is dropped, and by [`crate::Store::close`].
pub struct Keys {
    prefix: Prefix,
    ctx: Context,
    /// `None` once the iterator is finished.
    snapshot: Option<Snapshot>,
    cursor: Bound<Vec<u8>>,
    batch: VecDeque<String>,
    batch_size: usize,
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("prefix", &self.prefix)
            .field("buffered", &self.batch.len())
            .field("finished", &self.snapshot.is_none())
            .finish_non_exhaustive()
    }
}

impl Keys {
    fn finish(&mut self) {
        self.snapshot = None;
        self.batch.clear();
    }

    /// Pulls the next batch; leaves it empty when the keyspace is exhausted.
    fn fill(&mut self) -> Result<(), KvError> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };
        let from = match &self.cursor {
            Bound::Included(key) => Bound::Included(key.as_slice()),
            Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };

        let prefix = &self.prefix;
        let batch = &mut self.batch;
        let limit = self.batch_size;
        let mut last: Option<Vec<u8>> = None;
        let mut invalid: Option<std::str::Utf8Error> = None;
        snapshot.walk(from, |physical| {
            let Some(logical) = prefix.remove(physical) else {
                return ControlFlow::Break(());
            };
            match std::str::from_utf8(logical) {
                Ok(key) => batch.push_back(key.to_owned()),
                Err(err) => {
                    invalid = Some(err);
                    return ControlFlow::Break(());
                },
            }
            last = Some(physical.to_vec());
            if batch.len() >= limit { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
        })?;

        if let Some(err) = invalid {
            return Err(KvError::InvalidKey {
                message: err.to_string().into(),
                context: Some(format!("Listing {}", self.prefix).into()),
            });
        }
        if let Some(last) = last {
            self.cursor = Bound::Excluded(last);
        }
        Ok(())
    }
}

impl Iterator for Keys {
    type Item = Result<String, KvError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.snapshot.as_ref()?;
        if let Err(err) = self.ctx.err() {
            self.finish();
            return Some(Err(err));
        }
        if self.batch.is_empty() {
            if let Err(err) = self.fill() {
                self.finish();
                return Some(Err(err));
            }
        }
        match self.batch.pop_front() {
            Some(key) => Some(Ok(key)),
            None => {
                self.finish();
                None
            },
        }
    }
}

impl std::iter::FusedIterator for Keys {}
