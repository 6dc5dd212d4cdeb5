/// Largest value a single ATT attribute may carry.
pub const DEFAULT_MAX_VALUE_LEN: usize = 512;

pub const DEFAULT_DEVICE_NAME: &str = "MyBLEDevice";

/// Whether the peer that wrote the characteristic also receives the
/// resulting notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyPolicy {
    #[default]
    IncludeWriter,
    ExcludeWriter,
}

/// How CCCD writes are scoped.
///
/// `PerConnection` keeps one subscription flag per central, which is what the
/// Bluetooth Core spec mandates. `Shared` reproduces a GATT server that keeps
/// a single descriptor value: the last CCCD write from any central decides
/// delivery for every connected central.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionScope {
    #[default]
    PerConnection,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvertiseMode {
    LowPower,
    Balanced,
    #[default]
    LowLatency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxPowerLevel {
    UltraLow,
    Low,
    Medium,
    #[default]
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingSettings {
    pub mode: AdvertiseMode,
    pub tx_power: TxPowerLevel,
    pub connectable: bool,
    pub include_device_name: bool,
    pub scan_response_device_name: bool,
}

impl Default for AdvertisingSettings {
    fn default() -> Self {
        AdvertisingSettings {
            mode: AdvertiseMode::default(),
            tx_power: TxPowerLevel::default(),
            connectable: true,
            include_device_name: true,
            scan_response_device_name: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralConfig {
    pub device_name: String,
    pub max_value_len: usize,
    pub notify_policy: NotifyPolicy,
    pub subscription_scope: SubscriptionScope,
    pub advertising: AdvertisingSettings,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        PeripheralConfig {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            notify_policy: NotifyPolicy::default(),
            subscription_scope: SubscriptionScope::default(),
            advertising: AdvertisingSettings::default(),
        }
    }
}

impl PeripheralConfig {
    pub fn with_device_name<T: Into<String>>(mut self, name: T) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn with_max_value_len(mut self, max_value_len: usize) -> Self {
        self.max_value_len = max_value_len;
        self
    }

    pub fn with_notify_policy(mut self, policy: NotifyPolicy) -> Self {
        self.notify_policy = policy;
        self
    }

    pub fn with_subscription_scope(mut self, scope: SubscriptionScope) -> Self {
        self.subscription_scope = scope;
        self
    }

    pub fn with_advertising(mut self, settings: AdvertisingSettings) -> Self {
        self.advertising = settings;
        self
    }
}
