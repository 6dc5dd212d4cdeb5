use super::{
    descriptor::Descriptor,
    properties::{AttributePermission, CharacteristicProperty},
};
use crate::uuid::CHARACTERISTIC_UUID;
use uuid::Uuid;

/// Static declaration of a characteristic. The value itself lives in the
/// attribute store so the declaration can be shared freely.
#[derive(Debug, Clone)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub properties: Vec<CharacteristicProperty>,
    pub permissions: Vec<AttributePermission>,
    pub descriptors: Vec<Descriptor>,
}

impl Characteristic {
    pub fn supports(&self, property: CharacteristicProperty) -> bool {
        self.properties.contains(&property)
    }

    pub fn descriptor(&self, uuid: Uuid) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| d.uuid == uuid)
    }
}

impl Default for Characteristic {
    fn default() -> Self {
        Characteristic {
            uuid: CHARACTERISTIC_UUID,
            properties: vec![
                CharacteristicProperty::Read,
                CharacteristicProperty::Write,
                CharacteristicProperty::Notify,
            ],
            permissions: vec![
                AttributePermission::Readable,
                AttributePermission::Writeable,
            ],
            descriptors: vec![Descriptor::cccd()],
        }
    }
}
