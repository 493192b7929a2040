use super::RpcService;
use crate::transport::Connection;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use uuid::Uuid;

#[derive(Default)]
struct RegistrySlot {
    connection: Option<Arc<Connection>>,
    cache: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

/// Hands out service proxies bound to the current connection.
///
/// The connection and the proxy cache sit behind one lock, so a proxy built for an old
/// connection can never be returned after [`ServiceRegistry::reset`] swaps it out.
#[derive(Default)]
pub struct ServiceRegistry {
    slot: Mutex<RegistrySlot>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, RegistrySlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the current connection and drops every cached proxy.
    pub fn reset(&self, connection: Option<Arc<Connection>>) {
        let mut slot = self.slot();
        let previous = slot.connection.as_ref().map(|c| c.id());
        slot.connection = connection;
        slot.cache.clear();
        debug!(
            "Service registry reset: {:?} -> {:?}",
            previous,
            slot.connection.as_ref().map(|c| c.id())
        );
    }

    /// Returns the cached proxy for `T`, building it on first use.
    ///
    /// `None` when no connection is set or the current connection is dead.
    pub fn try_get_service<T: RpcService>(&self) -> Option<Arc<T>> {
        let mut slot = self.slot();
        let connection = match &slot.connection {
            Some(connection) if connection.is_alive() => Arc::clone(connection),
            _ => return None,
        };

        let key = TypeId::of::<T>();
        if let Some(cached) = slot.cache.get(&key) {
            return Arc::clone(cached).downcast::<T>().ok();
        }

        let service = Arc::new(connection.create_service::<T>());
        slot.cache.insert(key, Arc::clone(&service) as Arc<dyn Any + Send + Sync>);
        Some(service)
    }

    pub fn current_connection_id(&self) -> Option<Uuid> {
        self.slot().connection.as_ref().map(|c| c.id())
    }

    pub fn cached_service_count(&self) -> usize {
        self.slot().cache.len()
    }
}
