use serde::{Deserialize, Serialize};
use serde_json::json;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::Error;
use crate::common::ids::{FlavorId, ReservationId};
use crate::resources::{
    FlavorRegistry, ResourceAmount, ResourceId, ResourceNames, ResourceRequest,
};

/// Quota for a single (resource, flavor) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlavorQuota {
    pub flavor: FlavorId,
    pub capacity: ResourceAmount,
    reserved: ResourceAmount,
    used: ResourceAmount,
}

impl FlavorQuota {
    fn new(flavor: FlavorId, capacity: ResourceAmount) -> Self {
        FlavorQuota {
            flavor,
            capacity,
            reserved: ResourceAmount::ZERO,
            used: ResourceAmount::ZERO,
        }
    }

    #[inline]
    pub fn reserved(&self) -> ResourceAmount {
        self.reserved
    }

    #[inline]
    pub fn used(&self) -> ResourceAmount {
        self.used
    }

    #[inline]
    fn remaining(&self) -> ResourceAmount {
        self.capacity.saturating_sub(self.reserved)
    }
}

/// Quota entries of one resource; flavors keep their configured order, which
/// fixes the first-fit flavor selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub resource: ResourceId,
    pub flavors: Vec<FlavorQuota>,
}

/// Configuration input for [`ClusterQueue::configure`].
#[derive(Debug, Clone)]
pub struct QuotaSpec {
    pub resource: ResourceId,
    /// (flavor, capacity) in selection-preference order.
    pub flavors: Vec<(FlavorId, ResourceAmount)>,
}

/// Capacity held against a cluster queue, recorded per (resource, flavor).
/// Returned by a successful reservation and consumed by `release`.
#[derive(Debug)]
pub struct Reservation {
    id: ReservationId,
    amounts: SmallVec<[(ResourceId, FlavorId, ResourceAmount); 3]>,
    released: bool,
}

impl Reservation {
    #[inline]
    pub fn id(&self) -> ReservationId {
        self.id
    }

    #[inline]
    pub fn amounts(&self) -> &[(ResourceId, FlavorId, ResourceAmount)] {
        &self.amounts
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }
}

/// A cluster-scoped quota pool partitioned by resource and flavor.
///
/// All mutations of the quota table go through `try_reserve`/`release`,
/// which are executed by the single engine owner; `reserved <= capacity`
/// holds for every entry at all times.
pub struct ClusterQueue {
    name: Arc<str>,
    quotas: Vec<ResourceQuota>,
}

impl ClusterQueue {
    pub fn new(name: &str) -> Self {
        ClusterQueue {
            name: name.into(),
            quotas: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn quotas(&self) -> &[ResourceQuota] {
        &self.quotas
    }

    /// Replaces the quota table. Every referenced flavor must be registered,
    /// otherwise nothing is changed and `InvalidFlavor` is returned.
    /// `reserved`/`used` survive for (resource, flavor) keys present in both
    /// the old and the new table.
    pub fn configure(
        &mut self,
        specs: Vec<QuotaSpec>,
        registry: &mut FlavorRegistry,
    ) -> crate::Result<()> {
        for spec in &specs {
            for &(flavor, _) in &spec.flavors {
                if !registry.exists(flavor) {
                    return Err(Error::InvalidFlavor(format!("{flavor}")));
                }
            }
        }

        let old = std::mem::take(&mut self.quotas);
        self.quotas = specs
            .into_iter()
            .map(|spec| ResourceQuota {
                resource: spec.resource,
                flavors: spec
                    .flavors
                    .into_iter()
                    .map(|(flavor, capacity)| {
                        let mut entry = FlavorQuota::new(flavor, capacity);
                        if let Some(previous) = old
                            .iter()
                            .find(|q| q.resource == spec.resource)
                            .and_then(|q| q.flavors.iter().find(|f| f.flavor == flavor))
                        {
                            entry.reserved = previous.reserved;
                            entry.used = previous.used;
                        }
                        entry
                    })
                    .collect(),
            })
            .collect();

        for quota in &old {
            for entry in &quota.flavors {
                registry.remove_ref(entry.flavor);
            }
        }
        for quota in &self.quotas {
            for entry in &quota.flavors {
                registry.add_ref(entry.flavor);
            }
        }
        log::debug!("Cluster queue {} reconfigured", self.name);
        Ok(())
    }

    /// Drops all flavor references held by this queue's quota table.
    /// Called when the queue itself is removed.
    pub fn unconfigure(&mut self, registry: &mut FlavorRegistry) {
        for quota in std::mem::take(&mut self.quotas) {
            for entry in quota.flavors {
                registry.remove_ref(entry.flavor);
            }
        }
    }

    /// Attempts to reserve capacity for every resource in the request.
    ///
    /// The reservation is all-or-nothing: flavors are first selected for
    /// all resources without touching the table, and only a fully
    /// satisfiable request is committed. Flavor selection is first-fit in
    /// configured order.
    pub fn try_reserve(
        &mut self,
        id: ReservationId,
        request: &ResourceRequest,
        names: &ResourceNames,
    ) -> crate::Result<Reservation> {
        let mut picks: SmallVec<[(ResourceId, FlavorId, ResourceAmount); 3]> = SmallVec::new();
        for entry in request.entries() {
            let quota = self
                .quotas
                .iter()
                .find(|q| q.resource == entry.resource_id)
                .ok_or_else(|| Error::InsufficientCapacity {
                    resource: names.get_name(entry.resource_id).to_string(),
                })?;
            let flavor = quota
                .flavors
                .iter()
                .find(|f| f.remaining() >= entry.amount)
                .ok_or_else(|| Error::InsufficientCapacity {
                    resource: names.get_name(entry.resource_id).to_string(),
                })?;
            picks.push((entry.resource_id, flavor.flavor, entry.amount));
        }

        for &(resource, flavor, amount) in &picks {
            let entry = self.quota_entry_mut(resource, flavor);
            entry.reserved += amount;
            debug_assert!(entry.reserved <= entry.capacity);
        }
        log::debug!(
            "Queue {}: reserved {} as reservation {}",
            self.name,
            request,
            id
        );
        Ok(Reservation {
            id,
            amounts: picks,
            released: false,
        })
    }

    /// Returns the reserved amounts to the pool. Releasing an already
    /// released reservation is a no-op.
    pub fn release(&mut self, reservation: &mut Reservation) {
        if reservation.released {
            log::warn!(
                "Reservation {} released twice on queue {}",
                reservation.id,
                self.name
            );
            return;
        }
        reservation.released = true;
        for &(resource, flavor, amount) in reservation.amounts.iter() {
            // The entry may be gone if the queue was reconfigured meanwhile
            if let Some(entry) = self.find_quota_entry_mut(resource, flavor) {
                entry.reserved = entry.reserved.saturating_sub(amount);
            }
        }
        log::debug!(
            "Queue {}: released reservation {}",
            self.name,
            reservation.id
        );
    }

    /// Mirrors the reservation into the `used` counters when the workload
    /// actually starts running.
    pub fn mark_used(&mut self, reservation: &Reservation) {
        for &(resource, flavor, amount) in reservation.amounts.iter() {
            if let Some(entry) = self.find_quota_entry_mut(resource, flavor) {
                entry.used += amount;
            }
        }
    }

    pub fn clear_used(&mut self, reservation: &Reservation) {
        for &(resource, flavor, amount) in reservation.amounts.iter() {
            if let Some(entry) = self.find_quota_entry_mut(resource, flavor) {
                entry.used = entry.used.saturating_sub(amount);
            }
        }
    }

    pub fn total_reserved(&self) -> ResourceAmount {
        self.quotas
            .iter()
            .flat_map(|q| q.flavors.iter().map(|f| f.reserved))
            .sum()
    }

    fn quota_entry_mut(&mut self, resource: ResourceId, flavor: FlavorId) -> &mut FlavorQuota {
        self.find_quota_entry_mut(resource, flavor)
            .expect("Reservation references an unknown quota entry")
    }

    fn find_quota_entry_mut(
        &mut self,
        resource: ResourceId,
        flavor: FlavorId,
    ) -> Option<&mut FlavorQuota> {
        self.quotas
            .iter_mut()
            .find(|q| q.resource == resource)
            .and_then(|q| q.flavors.iter_mut().find(|f| f.flavor == flavor))
    }

    pub fn dump(&self, names: &ResourceNames, registry: &FlavorRegistry) -> serde_json::Value {
        json!({
            "name": self.name.as_ref(),
            "quotas": self.quotas.iter().map(|q| json!({
                "resource": names.get_name(q.resource),
                "flavors": q.flavors.iter().map(|f| json!({
                    "flavor": registry.name_of(f.flavor),
                    "capacity": f.capacity.to_string(),
                    "reserved": f.reserved.to_string(),
                    "used": f.used.to_string(),
                })).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        })
    }
}
