use std::fmt;

/// Opaque identity of a connected central, usually its Bluetooth address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(String);

impl From<&str> for PeerId {
    fn from(address: &str) -> Self {
        PeerId(address.to_string())
    }
}

impl From<String> for PeerId {
    fn from(address: String) -> Self {
        PeerId(address)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}
