use crate::Error;
use crate::common::Map;
use crate::common::ids::FlavorId;
use crate::common::index::IndexVec;

/// Catalog of named capacity flavors.
///
/// A flavor is pure identity from the point of view of admission; quota
/// entries reference flavors and a referenced flavor cannot be removed
/// until every referencing quota is gone.
#[derive(Debug, Default)]
pub struct FlavorRegistry {
    flavors: Map<String, FlavorId>,
    names_by_id: IndexVec<FlavorId, String>,
    // Number of quota entries currently referencing each flavor
    ref_counts: IndexVec<FlavorId, u32>,
}

impl FlavorRegistry {
    /// Registers a flavor, returning its id. Re-registering an existing
    /// name is a no-op returning the original id.
    pub fn register(&mut self, name: &str) -> FlavorId {
        match self.flavors.get(name) {
            Some(&id) => id,
            None => {
                let id = FlavorId::new(self.names_by_id.len() as u32);
                log::debug!("Registered resource flavor '{name}' as {id}");
                self.flavors.insert(name.to_string(), id);
                self.names_by_id.push(name.to_string());
                self.ref_counts.push(0);
                id
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<FlavorId> {
        self.flavors.get(name).copied()
    }

    pub fn exists(&self, id: FlavorId) -> bool {
        // Compare the ids: a removed name may have been re-registered,
        // which must not revive the stale id
        self.names_by_id
            .get(id)
            .is_some_and(|name| self.flavors.get(name) == Some(&id))
    }

    pub fn name_of(&self, id: FlavorId) -> &str {
        &self.names_by_id[id]
    }

    /// Removes a flavor. Fails while any cluster queue quota references it.
    pub fn remove(&mut self, name: &str) -> crate::Result<()> {
        let id = self
            .get(name)
            .ok_or_else(|| Error::not_found("resource flavor", name))?;
        if self.ref_counts[id] > 0 {
            return Err(Error::FlavorInUse(name.to_string()));
        }
        self.flavors.remove(name);
        Ok(())
    }

    pub(crate) fn add_ref(&mut self, id: FlavorId) {
        self.ref_counts[id] += 1;
    }

    pub(crate) fn remove_ref(&mut self, id: FlavorId) {
        let count = &mut self.ref_counts[id];
        debug_assert!(*count > 0);
        *count = count.saturating_sub(1);
    }
}
