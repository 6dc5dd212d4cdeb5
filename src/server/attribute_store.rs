use crate::gatt::{descriptor::Subscription, error::GattError};
use crate::uuid::CCCD_UUID;
use uuid::Uuid;

/// Holds the characteristic value and the last CCCD value written by any
/// central.
#[derive(Debug, Clone)]
pub struct AttributeStore {
    value: Vec<u8>,
    cccd: Vec<u8>,
    max_value_len: usize,
}

impl AttributeStore {
    pub fn new(max_value_len: usize) -> Self {
        AttributeStore {
            value: Vec::new(),
            cccd: Subscription::Disabled.encode(),
            max_value_len,
        }
    }

    pub fn read(&self) -> &[u8] {
        &self.value
    }

    pub fn write(&mut self, value: &[u8]) -> Result<(), GattError> {
        if value.len() > self.max_value_len {
            return Err(GattError::ValueTooLarge {
                len: value.len(),
                max: self.max_value_len,
            });
        }
        self.value.clear();
        self.value.extend_from_slice(value);
        Ok(())
    }

    pub fn read_descriptor(&self, id: Uuid) -> Result<&[u8], GattError> {
        if id != CCCD_UUID {
            return Err(GattError::AttributeNotFound);
        }
        Ok(&self.cccd)
    }

    pub fn write_descriptor(&mut self, id: Uuid, value: &[u8]) -> Result<Subscription, GattError> {
        if id != CCCD_UUID {
            return Err(GattError::AttributeNotFound);
        }
        let subscription = Subscription::decode(value)?;
        self.cccd = subscription.encode();
        Ok(subscription)
    }
}
