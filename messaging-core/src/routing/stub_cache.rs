//! Address-keyed cache of live messaging stubs.

use crate::address::Address;
use crate::messaging::stub::MessagingStub;
use crate::messaging::stub_factory::StubFactoryError;
use crate::observability::events;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

const COMPONENT: &str = "stub_cache";

/// At most one stub per distinct address.
///
/// Creation runs under the shard lock of the address' entry, so concurrent first use
/// invokes the factory once. Factories must not call back into the cache.
#[derive(Default)]
pub struct StubCache {
    stubs: DashMap<Address, Arc<dyn MessagingStub>>,
}

impl StubCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create<F>(
        &self,
        address: &Address,
        create: F,
    ) -> Result<Arc<dyn MessagingStub>, StubFactoryError>
    where
        F: FnOnce(&Address) -> Result<Arc<dyn MessagingStub>, StubFactoryError>,
    {
        // Fast path: stub already cached.
        if let Some(stub) = self.stubs.get(address) {
            return Ok(Arc::clone(&stub));
        }

        let stub = self
            .stubs
            .entry(address.clone())
            .or_try_insert_with(|| {
                let stub = create(address)?;
                debug!(
                    event = events::STUB_CREATE,
                    component = COMPONENT,
                    address = %address,
                    "created messaging stub"
                );
                Ok(stub)
            })?
            .clone();
        Ok(stub)
    }

    /// Evicts the stub for `address` and shuts it down.
    pub fn remove(&self, address: &Address) -> bool {
        let Some((_, stub)) = self.stubs.remove(address) else {
            return false;
        };
        stub.shutdown();
        debug!(
            event = events::STUB_EVICT,
            component = COMPONENT,
            address = %address,
            "evicted messaging stub"
        );
        true
    }

    /// Evicts and shuts down every cached stub.
    pub fn clear(&self) -> usize {
        let addresses: Vec<Address> = self.stubs.iter().map(|entry| entry.key().clone()).collect();
        addresses
            .iter()
            .filter(|address| self.remove(address))
            .count()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.stubs.contains_key(address)
    }
}

#[cfg(test)]
mod tests {
    use super::StubCache;
    use crate::address::Address;
    use crate::message::Message;
    use crate::messaging::stub::{MessagingStub, TransmitCompletion};
    use crate::messaging::stub_factory::StubFactoryError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[derive(Default)]
    struct TrackingStub {
        shutdowns: AtomicUsize,
    }

    impl MessagingStub for TrackingStub {
        fn transmit(&self, _message: Arc<Message>, completion: TransmitCompletion) {
            completion.succeed();
        }

        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn concurrent_first_use_creates_one_stub() {
        let cache = Arc::new(StubCache::new());
        let created = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let address = Address::in_process("shared");

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let created = created.clone();
                let barrier = barrier.clone();
                let address = address.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_create(&address, |_| {
                            created.fetch_add(1, Ordering::SeqCst);
                            Ok(Arc::new(TrackingStub::default()) as Arc<dyn MessagingStub>)
                        })
                        .expect("creation succeeds")
                })
            })
            .collect();

        let stubs: Vec<_> = workers
            .into_iter()
            .map(|worker| worker.join().expect("worker should not panic"))
            .collect();

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(stubs.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn failed_creation_leaves_no_entry() {
        let cache = StubCache::new();
        let address = Address::in_process("broken");

        let result = cache.get_or_create(&address, |_| {
            Err(StubFactoryError::Configuration {
                reason: "bad".to_string(),
            })
        });

        assert!(result.is_err());
        assert!(!cache.contains(&address));
    }

    #[test]
    fn remove_shuts_the_stub_down() {
        let cache = StubCache::new();
        let address = Address::in_process("p");
        let stub = Arc::new(TrackingStub::default());
        let cached = stub.clone();
        cache
            .get_or_create(&address, move |_| Ok(cached as Arc<dyn MessagingStub>))
            .expect("creation succeeds");

        assert!(cache.remove(&address));
        assert!(!cache.remove(&address));
        assert_eq!(stub.shutdowns.load(Ordering::SeqCst), 1);
    }
}
