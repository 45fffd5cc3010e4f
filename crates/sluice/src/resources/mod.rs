pub mod amount;
pub mod flavor;
pub mod map;
pub mod request;

use crate::define_id_type;

pub use amount::{FRACTIONS_PER_UNIT, ResourceAmount, ResourceFractions, ResourceUnits};
pub use flavor::FlavorRegistry;
pub use map::{CPU_RESOURCE_ID, CPU_RESOURCE_NAME, MEM_RESOURCE_ID, MEM_RESOURCE_NAME, ResourceNames};
pub use request::{ResourceRequest, ResourceRequestEntries, ResourceRequestEntry};

// Identifies an interned resource name ("cpu", "memory", ...).
define_id_type!(ResourceId, u32);
