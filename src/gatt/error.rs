//! Protocol-level error taxonomy. Attribute errors never tear a connection
//! down; they are folded into a [`RequestResponse`] status for the peer.

use super::peer::PeerId;
use super::peripheral_event::{AdvertiseFailure, RequestResponse};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GattError {
    #[error("attribute not found")]
    AttributeNotFound,
    #[error("attribute is not readable")]
    ReadNotPermitted,
    #[error("attribute is not writable")]
    WriteNotPermitted,
    #[error("offset {offset} is past the end of a {len} byte value")]
    InvalidOffset { offset: u64, len: usize },
    #[error("value of {len} bytes exceeds the {max} byte attribute limit")]
    ValueTooLarge { len: usize, max: usize },
    #[error("descriptor value is not a known subscription state")]
    MalformedDescriptorValue,
    #[error("no connection registered for {0}")]
    UnknownConnection(PeerId),
    #[error("advertising is already active")]
    AdvertisingAlreadyActive,
    #[error("advertising failed: {0:?}")]
    AdvertisingFailure(AdvertiseFailure),
}

impl From<&GattError> for RequestResponse {
    fn from(err: &GattError) -> Self {
        match err {
            GattError::AttributeNotFound => RequestResponse::AttributeNotFound,
            GattError::ReadNotPermitted => RequestResponse::ReadNotPermitted,
            GattError::WriteNotPermitted => RequestResponse::WriteNotPermitted,
            GattError::InvalidOffset { .. } => RequestResponse::InvalidOffset,
            GattError::ValueTooLarge { .. } => RequestResponse::InvalidAttributeValueLength,
            GattError::MalformedDescriptorValue => RequestResponse::CccdImproperlyConfigured,
            GattError::UnknownConnection(_)
            | GattError::AdvertisingAlreadyActive
            | GattError::AdvertisingFailure(_) => RequestResponse::UnlikelyError,
        }
    }
}
