use super::{error::GattError, properties::AttributePermission};
use crate::uuid::CCCD_UUID;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub permissions: Vec<AttributePermission>,
}

impl Descriptor {
    /// The Client Characteristic Configuration Descriptor every notifiable
    /// characteristic carries.
    pub fn cccd() -> Self {
        Descriptor {
            uuid: CCCD_UUID,
            ..Default::default()
        }
    }

    pub fn is_cccd(&self) -> bool {
        self.uuid == CCCD_UUID
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Descriptor {
            uuid: Uuid::nil(),
            permissions: vec![
                AttributePermission::Readable,
                AttributePermission::Writeable,
            ],
        }
    }
}

/// Decoded CCCD value. Only the notification bit is supported; indications
/// and reserved bits are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subscription {
    #[default]
    Disabled,
    Notifications,
}

impl Subscription {
    const DISABLED: [u8; 2] = [0x00, 0x00];
    const NOTIFICATIONS: [u8; 2] = [0x01, 0x00];

    pub fn decode(value: &[u8]) -> Result<Self, GattError> {
        match value {
            [0x00, 0x00] => Ok(Subscription::Disabled),
            [0x01, 0x00] => Ok(Subscription::Notifications),
            _ => Err(GattError::MalformedDescriptorValue),
        }
    }

    pub fn encode(self) -> Vec<u8> {
        match self {
            Subscription::Disabled => Self::DISABLED.to_vec(),
            Subscription::Notifications => Self::NOTIFICATIONS.to_vec(),
        }
    }

    pub fn is_enabled(self) -> bool {
        self == Subscription::Notifications
    }
}

impl From<bool> for Subscription {
    fn from(enabled: bool) -> Self {
        if enabled {
            Subscription::Notifications
        } else {
            Subscription::Disabled
        }
    }
}
