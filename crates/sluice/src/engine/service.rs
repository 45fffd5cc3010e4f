use tokio::sync::{mpsc, oneshot};

use crate::common::ids::{JobId, ObjectRef};
use crate::engine::reactor::{JobSubmission, QuotaInput};

/// Messages driving the engine process: change notifications from the
/// persistence layer plus queries against the status surface.
#[derive(Debug)]
pub enum EngineMessage {
    // Notifications
    JobCreated(JobSubmission),
    JobFinished(JobId),
    JobRemoved(JobId),
    FlavorUpsert(String),
    FlavorRemoved(String, oneshot::Sender<crate::Result<()>>),
    ClusterQueueUpsert {
        name: String,
        quotas: Vec<QuotaInput>,
        response: oneshot::Sender<crate::Result<()>>,
    },
    ClusterQueueRemoved(String),
    LocalQueueUpsert {
        key: ObjectRef,
        cluster_queue: String,
    },
    LocalQueueRemoved(ObjectRef),
    // Queries
    QueryWorkload(ObjectRef, oneshot::Sender<Option<serde_json::Value>>),
    QueryClusterQueue(String, oneshot::Sender<Option<serde_json::Value>>),
    Stop,
}

/// Cheaply cloneable facade over the engine message channel.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::UnboundedSender<EngineMessage>,
}

impl EngineHandle {
    pub fn on_job_created(&self, submission: JobSubmission) {
        self.send(EngineMessage::JobCreated(submission));
    }

    pub fn on_job_finished(&self, job: JobId) {
        self.send(EngineMessage::JobFinished(job));
    }

    pub fn on_job_removed(&self, job: JobId) {
        self.send(EngineMessage::JobRemoved(job));
    }

    pub fn upsert_flavor(&self, name: &str) {
        self.send(EngineMessage::FlavorUpsert(name.to_string()));
    }

    pub async fn remove_flavor(&self, name: &str) -> crate::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineMessage::FlavorRemoved(name.to_string(), tx));
        rx.await.map_err(|_| "Engine stopped".to_string())?
    }

    pub async fn upsert_cluster_queue(
        &self,
        name: &str,
        quotas: Vec<QuotaInput>,
    ) -> crate::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineMessage::ClusterQueueUpsert {
            name: name.to_string(),
            quotas,
            response: tx,
        });
        rx.await.map_err(|_| "Engine stopped".to_string())?
    }

    pub fn remove_cluster_queue(&self, name: &str) {
        self.send(EngineMessage::ClusterQueueRemoved(name.to_string()));
    }

    pub fn upsert_local_queue(&self, key: ObjectRef, cluster_queue: &str) {
        self.send(EngineMessage::LocalQueueUpsert {
            key,
            cluster_queue: cluster_queue.to_string(),
        });
    }

    pub fn remove_local_queue(&self, key: ObjectRef) {
        self.send(EngineMessage::LocalQueueRemoved(key));
    }

    pub async fn workload_status(&self, key: ObjectRef) -> Option<serde_json::Value> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineMessage::QueryWorkload(key, tx));
        rx.await.ok().flatten()
    }

    pub async fn cluster_queue_status(&self, name: &str) -> Option<serde_json::Value> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineMessage::QueryClusterQueue(name.to_string(), tx));
        rx.await.ok().flatten()
    }

    pub fn stop(&self) {
        self.send(EngineMessage::Stop);
    }

    fn send(&self, message: EngineMessage) {
        let _ = self.sender.send(message);
    }
}

pub fn make_engine_channel() -> (EngineHandle, mpsc::UnboundedReceiver<EngineMessage>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (EngineHandle { sender }, receiver)
}
