//! Idempotent identity for named children of a namespace node.

use crate::prefix::Prefix;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds a keyspace for a handle and the prefix derived for it.
pub(crate) type Factory<H, K> = fn(H, Prefix) -> K;

struct Children<H, K> {
    keyspaces: FxHashMap<String, K>,
    subs: FxHashMap<String, Arc<Monitor<H, K>>>,
}

/// A node of the namespace tree.
///
/// Children are created on first request and cached for the lifetime of the node, so asking
/// for the same name twice returns the same keyspace (same prefix) or the same sub-node.
/// Lookup and insertion happen under one lock: concurrent callers observe exactly one
/// construction per name.
pub(crate) struct Monitor<H, K> {
    handle: H,
    prefix: Prefix,
    factory: Factory<H, K>,
    children: Mutex<Children<H, K>>,
}

impl<H, K> fmt::Debug for Monitor<H, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let children = self.children.lock();
        f.debug_struct("Monitor")
            .field("prefix", &self.prefix)
            .field("keyspaces", &children.keyspaces.len())
            .field("subs", &children.subs.len())
            .finish_non_exhaustive()
    }
}

impl<H: Clone, K: Clone> Monitor<H, K> {
    pub(crate) fn new(handle: H, prefix: Prefix, factory: Factory<H, K>) -> Self {
        Self {
            handle,
            prefix,
            factory,
            children: Mutex::new(Children {
                keyspaces: FxHashMap::default(),
                subs: FxHashMap::default(),
            }),
        }
    }

    pub(crate) const fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub(crate) const fn handle(&self) -> &H {
        &self.handle
    }

    pub(crate) fn keyspace(&self, name: &str) -> K {
        let mut children = self.children.lock();
        if let Some(kv) = children.keyspaces.get(name) {
            return kv.clone();
        }
        let kv = (self.factory)(self.handle.clone(), self.prefix.keyspace(name));
        children.keyspaces.insert(name.to_owned(), kv.clone());
        kv
    }

    pub(crate) fn sub(&self, name: &str) -> Arc<Self> {
        let mut children = self.children.lock();
        if let Some(sub) = children.subs.get(name) {
            return Arc::clone(sub);
        }
        let sub = Arc::new(Self::new(self.handle.clone(), self.prefix.sub(name), self.factory));
        debug!(prefix = %sub.prefix, "Sub-store created");
        children.subs.insert(name.to_owned(), Arc::clone(&sub));
        sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    #[derive(Clone, Debug)]
    struct Built {
        prefix: Prefix,
        serial: usize,
    }

    fn build((): (), prefix: Prefix) -> Built {
        Built { prefix, serial: BUILT.fetch_add(1, Ordering::SeqCst) }
    }

    fn root() -> Monitor<(), Built> {
        Monitor::new((), Prefix::root(), build)
    }

    #[test]
    fn repeated_keyspace_is_cached() {
        let root = root();
        let first = root.keyspace("users");
        let second = root.keyspace("users");
        assert_eq!(first.serial, second.serial);
        assert_eq!(first.prefix, Prefix::root().keyspace("users"));
        assert_ne!(root.keyspace("other").prefix, first.prefix);
    }

    #[test]
    fn repeated_sub_is_the_same_node() {
        let root = root();
        let a = root.sub("tenant");
        let b = root.sub("tenant");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.prefix(), &Prefix::root().sub("tenant"));

        let nested = a.sub("x").keyspace("y");
        assert_eq!(nested.prefix, Prefix::root().sub("tenant").sub("x").keyspace("y"));
        assert_eq!(b.sub("x").keyspace("y").serial, nested.serial);
    }

    #[test]
    fn keyspace_and_sub_names_do_not_clash() {
        let root = root();
        let ks = root.keyspace("same");
        let sub = root.sub("same");
        assert_ne!(&ks.prefix, sub.prefix());
    }

    #[test]
    fn concurrent_callers_share_one_construction() {
        let root = Arc::new(root());
        let serials: Vec<usize> = (0..16)
            .map(|_| {
                let root = Arc::clone(&root);
                thread::spawn(move || root.sub("shared").keyspace("race").serial)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        assert!(serials.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
