use alloy::primitives::Address;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::Arc,
};

/// Last deployed address observed per contract name.
///
/// Clones share state. Concurrent updates for the same name are last write wins.
#[derive(Debug, Clone, Default)]
pub struct AddressCache {
    seen: Arc<Mutex<HashMap<String, Address>>>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `address` for `name`. Returns `false` when it was already the
    /// last observed address.
    pub fn observe(&self, name: &str, address: Address) -> bool {
        let mut seen = self.seen.lock();
        if seen.get(name) == Some(&address) {
            return false;
        }
        seen.insert(name.to_string(), address);
        true
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.seen.lock().get(name).copied()
    }
}
