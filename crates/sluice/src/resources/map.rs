use crate::common::Map;
use crate::common::index::IndexVec;
use crate::resources::ResourceId;

pub const CPU_RESOURCE_ID: ResourceId = ResourceId::new(0);
pub const MEM_RESOURCE_ID: ResourceId = ResourceId::new(1);

pub const CPU_RESOURCE_NAME: &str = "cpu";
pub const MEM_RESOURCE_NAME: &str = "memory";

/// Interns resource names ("cpu", "memory", "gpu", ...) into dense ids.
/// Well-known resources have fixed ids.
#[derive(Debug)]
pub struct ResourceNames {
    resource_names: Map<String, ResourceId>,
    names_by_id: IndexVec<ResourceId, String>,
}

impl Default for ResourceNames {
    fn default() -> Self {
        let mut names = ResourceNames {
            resource_names: Map::new(),
            names_by_id: Default::default(),
        };
        assert_eq!(names.get_or_allocate_id(CPU_RESOURCE_NAME), CPU_RESOURCE_ID);
        assert_eq!(names.get_or_allocate_id(MEM_RESOURCE_NAME), MEM_RESOURCE_ID);
        names
    }
}

impl ResourceNames {
    pub fn get_or_allocate_id(&mut self, name: &str) -> ResourceId {
        match self.resource_names.get(name) {
            Some(&id) => id,
            None => {
                let id = ResourceId::new(self.names_by_id.len() as u32);
                log::debug!("New resource registered '{name}' as {id}");
                self.resource_names.insert(name.to_string(), id);
                self.names_by_id.push(name.to_string());
                id
            }
        }
    }

    pub fn get_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_names.get(name).copied()
    }

    pub fn get_name(&self, id: ResourceId) -> &str {
        &self.names_by_id[id]
    }
}
