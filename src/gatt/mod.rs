pub mod characteristic;
pub mod descriptor;
pub mod error;
pub mod peer;
pub mod peripheral_event;
pub mod properties;
pub mod service;
