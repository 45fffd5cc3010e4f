use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Error;
use crate::common::ids::ObjectRef;

/// A namespace-scoped alias binding submissions to one cluster queue.
///
/// The binding is resolved once per admission attempt; a workload that was
/// already admitted remembers the cluster queue it was evaluated against,
/// so rebinding never affects it retroactively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalQueue {
    key: ObjectRef,
    cluster_queue: Option<Arc<str>>,
}

impl LocalQueue {
    pub fn new(key: ObjectRef) -> Self {
        LocalQueue {
            key,
            cluster_queue: None,
        }
    }

    #[inline]
    pub fn key(&self) -> &ObjectRef {
        &self.key
    }

    pub fn bind(&mut self, cluster_queue: &str) {
        log::debug!("Local queue {} bound to {}", self.key, cluster_queue);
        self.cluster_queue = Some(cluster_queue.into());
    }

    pub fn resolve(&self) -> crate::Result<&str> {
        self.cluster_queue
            .as_deref()
            .ok_or_else(|| Error::UnboundQueue(self.key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_unbound() {
        let queue = LocalQueue::new(ObjectRef::new("ns", "main"));
        assert!(matches!(queue.resolve(), Err(Error::UnboundQueue(_))));
    }

    #[test]
    fn test_rebind() {
        let mut queue = LocalQueue::new(ObjectRef::new("ns", "main"));
        queue.bind("cq-a");
        assert_eq!(queue.resolve().unwrap(), "cq-a");
        queue.bind("cq-b");
        assert_eq!(queue.resolve().unwrap(), "cq-b");
    }
}
