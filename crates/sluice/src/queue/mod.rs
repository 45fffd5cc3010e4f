pub mod cluster;
pub mod local;

pub use cluster::{ClusterQueue, FlavorQuota, QuotaSpec, Reservation, ResourceQuota};
pub use local::LocalQueue;
