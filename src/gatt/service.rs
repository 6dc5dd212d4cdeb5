use super::{characteristic::Characteristic, descriptor::Descriptor};
use crate::uuid::SERVICE_UUID;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Service {
    pub uuid: Uuid,
    pub primary: bool,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn characteristic(&self, uuid: Uuid) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }

    /// Looks a descriptor up across every characteristic of the service.
    pub fn descriptor(&self, uuid: Uuid) -> Option<(&Characteristic, &Descriptor)> {
        self.characteristics
            .iter()
            .find_map(|c| c.descriptor(uuid).map(|d| (c, d)))
    }
}

/// The single primary service exposed by the emulator: one
/// read/write/notify characteristic carrying a CCCD.
impl Default for Service {
    fn default() -> Self {
        Service {
            uuid: SERVICE_UUID,
            primary: true,
            characteristics: vec![Characteristic::default()],
        }
    }
}
