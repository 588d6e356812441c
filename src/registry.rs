//! Connection registry: display name -> live connection handle.

use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

/// Writer half of a client connection, shared between the owning session
/// and any router operation that targets it.
pub type ClientHandle = Arc<Mutex<TcpStream>>;

/// Directory of live connections keyed by display name.
///
/// Every access goes through one internal lock, so mutations and snapshots
/// are strictly ordered. The lock is only ever held for the map operation
/// itself: callers take a snapshot and perform socket I/O after release,
/// so one stalled peer cannot stall joins and leaves for everyone else.
pub struct Registry {
    clients: Mutex<HashMap<String, ClientHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Insert `handle` under `name`. Last writer wins: when the name is
    /// already taken the superseded handle is returned so the caller can
    /// close it instead of leaking the connection.
    pub fn register(&self, name: &str, handle: ClientHandle) -> Option<ClientHandle> {
        let mut clients = self.clients.lock().unwrap();
        clients.insert(name.to_string(), handle)
    }

    /// Remove `name`, but only while it still maps to `handle`. A session
    /// that was superseded by a newer registration must not evict the new
    /// owner during its own cleanup. Returns whether an entry was removed.
    pub fn unregister(&self, name: &str, handle: &ClientHandle) -> bool {
        let mut clients = self.clients.lock().unwrap();
        match clients.get(name) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                clients.remove(name);
                true
            }
            _ => false,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<ClientHandle> {
        let clients = self.clients.lock().unwrap();
        clients.get(name).cloned()
    }

    /// Point-in-time view of all registered names, sorted for stable output.
    pub fn snapshot_names(&self) -> Vec<String> {
        let clients = self.clients.lock().unwrap();
        let mut names: Vec<String> = clients.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of every handle except `exclude`, taken under the lock so a
    /// broadcast can write to the sockets after releasing it.
    pub fn handles_except(&self, exclude: Option<&ClientHandle>) -> Vec<ClientHandle> {
        let clients = self.clients.lock().unwrap();
        clients
            .values()
            .filter(|h| exclude.map_or(true, |ex| !Arc::ptr_eq(h, ex)))
            .cloned()
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Real loopback sockets so handles are honest `TcpStream`s; the
    /// accepted ends are dropped, nothing here performs I/O.
    fn test_handles(n: usize) -> Vec<ClientHandle> {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        (0..n)
            .map(|_| {
                let stream = TcpStream::connect(addr).unwrap();
                let _ = listener.accept().unwrap();
                Arc::new(Mutex::new(stream))
            })
            .collect()
    }

    #[test]
    fn register_lookup_unregister() {
        let registry = Registry::new();
        let handles = test_handles(1);
        assert!(registry.register("ana", handles[0].clone()).is_none());
        assert!(registry.lookup("ana").is_some());
        assert!(registry.lookup("zed").is_none());
        assert!(registry.unregister("ana", &handles[0]));
        assert!(registry.lookup("ana").is_none());
    }

    #[test]
    fn duplicate_name_returns_the_superseded_handle() {
        let registry = Registry::new();
        let handles = test_handles(2);
        registry.register("dup", handles[0].clone());
        let old = registry.register("dup", handles[1].clone()).unwrap();
        assert!(Arc::ptr_eq(&old, &handles[0]));
        let current = registry.lookup("dup").unwrap();
        assert!(Arc::ptr_eq(&current, &handles[1]));
    }

    #[test]
    fn superseded_session_cannot_evict_the_new_owner() {
        let registry = Registry::new();
        let handles = test_handles(2);
        registry.register("dup", handles[0].clone());
        registry.register("dup", handles[1].clone());
        // stale cleanup with the old handle is a no-op
        assert!(!registry.unregister("dup", &handles[0]));
        assert!(registry.lookup("dup").is_some());
        assert!(registry.unregister("dup", &handles[1]));
    }

    #[test]
    fn snapshot_is_sorted_and_complete() {
        let registry = Registry::new();
        let handles = test_handles(3);
        registry.register("caio", handles[0].clone());
        registry.register("ana", handles[1].clone());
        registry.register("bia", handles[2].clone());
        assert_eq!(registry.snapshot_names(), vec!["ana", "bia", "caio"]);
    }

    #[test]
    fn handles_except_skips_only_the_excluded_connection() {
        let registry = Registry::new();
        let handles = test_handles(3);
        registry.register("a", handles[0].clone());
        registry.register("b", handles[1].clone());
        registry.register("c", handles[2].clone());
        let rest = registry.handles_except(Some(&handles[1]));
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|h| !Arc::ptr_eq(h, &handles[1])));
        assert_eq!(registry.handles_except(None).len(), 3);
    }

    #[test]
    fn concurrent_join_and_leave_never_corrupt_the_map() {
        let registry = Arc::new(Registry::new());
        let mut workers = Vec::new();
        for (t, handle) in test_handles(8).into_iter().enumerate() {
            let registry = registry.clone();
            workers.push(thread::spawn(move || {
                for i in 0..500 {
                    let name = format!("user-{}-{}", t, i % 7);
                    registry.register(&name, handle.clone());
                    // snapshots taken mid-churn must be internally consistent
                    let names = registry.snapshot_names();
                    assert!(names.len() <= 8 * 7);
                    registry.unregister(&name, &handle);
                }
            }));
        }
        for w in workers {
            w.join().unwrap();
        }
        assert!(registry.snapshot_names().is_empty());
    }
}
