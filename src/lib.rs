pub mod config;
pub mod error;
pub mod gatt;
pub mod server;
pub mod uuid;

mod peripheral;
pub use self::peripheral::{ChannelLink, Peripheral, PlatformEvents, PlatformLink};
