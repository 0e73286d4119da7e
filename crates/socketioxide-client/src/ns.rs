//! The set of namespaces joined by a connection.
use std::{borrow::Cow, collections::HashSet, sync::RwLock};

/// Namespaces currently joined. A namespace is joined when the server answers
/// a connect request with a CONNECT packet and left on DISCONNECT.
#[derive(Debug, Default)]
pub(crate) struct Namespaces {
    joined: RwLock<HashSet<Cow<'static, str>>>,
}

impl Namespaces {
    /// Returns false if the namespace was already joined.
    pub fn join(&self, ns: Cow<'static, str>) -> bool {
        self.joined.write().unwrap().insert(ns)
    }

    /// Returns false if the namespace was not joined.
    pub fn leave(&self, ns: &str) -> bool {
        self.joined.write().unwrap().remove(ns)
    }

    pub fn is_joined(&self, ns: &str) -> bool {
        self.joined.read().unwrap().contains(ns)
    }

    pub fn list(&self) -> Vec<Cow<'static, str>> {
        self.joined.read().unwrap().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.joined.write().unwrap().clear();
    }
}
