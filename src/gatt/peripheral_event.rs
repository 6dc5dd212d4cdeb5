use super::peer::PeerId;
use uuid::Uuid;

/// Everything the platform radio layer reports to the peripheral core.
#[derive(Debug, Clone, PartialEq)]
pub enum PeripheralEvent {
    AdvertiseStarted,
    AdvertiseFailed {
        reason: AdvertiseFailure,
    },
    ConnectionStateChanged {
        peer: PeerId,
        state: ConnectionState,
    },
    CharacteristicReadRequest {
        request: PeripheralRequest,
        offset: u64,
    },
    CharacteristicWriteRequest {
        request: PeripheralRequest,
        offset: u64,
        value: Vec<u8>,
        response_needed: bool,
    },
    DescriptorReadRequest {
        request: PeripheralRequest,
        offset: u64,
    },
    DescriptorWriteRequest {
        request: PeripheralRequest,
        offset: u64,
        value: Vec<u8>,
        response_needed: bool,
    },
}

/// Identifies one attribute request. `attribute` is the characteristic UUID
/// for characteristic requests and the descriptor UUID for descriptor ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralRequest {
    pub client: PeerId,
    pub request_id: u32,
    pub attribute: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseFailure {
    DataTooLarge,
    TooManyAdvertisers,
    AlreadyStarted,
    InternalError,
    FeatureUnsupported,
}

impl AdvertiseFailure {
    /// Maps the numeric codes Android's `AdvertiseCallback` reports.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => AdvertiseFailure::DataTooLarge,
            2 => AdvertiseFailure::TooManyAdvertisers,
            3 => AdvertiseFailure::AlreadyStarted,
            5 => AdvertiseFailure::FeatureUnsupported,
            _ => AdvertiseFailure::InternalError,
        }
    }
}

/// Status carried by every attribute response, encoded as ATT error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestResponse {
    Success,
    ReadNotPermitted,
    WriteNotPermitted,
    InvalidOffset,
    AttributeNotFound,
    InvalidAttributeValueLength,
    UnlikelyError,
    CccdImproperlyConfigured,
}

impl RequestResponse {
    pub fn code(self) -> u8 {
        match self {
            RequestResponse::Success => 0x00,
            RequestResponse::ReadNotPermitted => 0x02,
            RequestResponse::WriteNotPermitted => 0x03,
            RequestResponse::InvalidOffset => 0x07,
            RequestResponse::AttributeNotFound => 0x0A,
            RequestResponse::InvalidAttributeValueLength => 0x0D,
            RequestResponse::UnlikelyError => 0x0E,
            RequestResponse::CccdImproperlyConfigured => 0xFD,
        }
    }
}
