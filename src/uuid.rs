use uuid::Uuid;

/// Heart Rate service, as advertised by the emulated device.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180D_0000_1000_8000_00805F9B34FB);

/// Heart Rate Measurement characteristic.
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x00002A37_0000_1000_8000_00805F9B34FB);

/// Client Characteristic Configuration Descriptor.
pub const CCCD_UUID: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805F9B34FB);

const BASE_UUID_TAIL: &[u8; 8] = b"\x80\x00\x00\x80\x5F\x9B\x34\xFB";

pub trait ShortUuid {
    /// Returns the 16-bit alias if this UUID lives in the Bluetooth base range.
    fn to_short(&self) -> Option<u16>;
}

impl ShortUuid for Uuid {
    fn to_short(&self) -> Option<u16> {
        let (d1, d2, d3, d4) = self.as_fields();
        if d2 == 0 && d3 == 0x1000 && d4 == BASE_UUID_TAIL && d1 <= u16::MAX as u32 {
            return Some(d1 as u16);
        }
        None
    }
}
