use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::resources::{ResourceAmount, ResourceId};

#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq)]
pub struct ResourceRequestEntry {
    pub resource_id: ResourceId,
    pub amount: ResourceAmount,
}

pub type ResourceRequestEntries = SmallVec<[ResourceRequestEntry; 3]>;

/// Resources requested by a single workload, one entry per resource.
/// Entries are kept sorted by resource id so requests compare and iterate
/// deterministically.
#[derive(Default, Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq)]
pub struct ResourceRequest {
    entries: ResourceRequestEntries,
}

impl ResourceRequest {
    pub fn new(mut entries: ResourceRequestEntries) -> ResourceRequest {
        entries.sort_unstable_by_key(|r| r.resource_id);
        ResourceRequest { entries }
    }

    pub fn entries(&self) -> &ResourceRequestEntries {
        &self.entries
    }

    pub fn amount_of(&self, resource_id: ResourceId) -> Option<ResourceAmount> {
        self.entries
            .iter()
            .find(|e| e.resource_id == resource_id)
            .map(|e| e.amount)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.entries.is_empty() {
            return Err("Resource request is empty".into());
        }
        for entry in &self.entries {
            if entry.amount.is_zero() {
                return Err("Zero resources cannot be requested".into());
            }
        }
        for pair in self.entries.windows(2) {
            if pair[0].resource_id >= pair[1].resource_id {
                return Err("Requests are not sorted or unique".into());
            }
        }
        Ok(())
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (idx, entry) in self.entries.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", entry.resource_id, entry.amount)?;
        }
        Ok(())
    }
}
