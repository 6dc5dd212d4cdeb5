pub mod advertising;
pub mod arbiter;
pub mod attribute_store;
pub mod connection;
pub mod notifier;

use crate::config::PeripheralConfig;
use crate::gatt::{
    error::GattError,
    peer::PeerId,
    peripheral_event::{ConnectionState, PeripheralEvent},
    service::Service,
};
use crate::uuid::CHARACTERISTIC_UUID;
use advertising::{AdvertisingController, AdvertisingRequest, AdvertisingState};
use arbiter::{Attributes, GattResponse, RequestArbiter};
use attribute_store::AttributeStore;
use connection::ConnectionRegistry;
use notifier::{Notification, Notifier};

/// Side effects the platform has to carry out, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SendResponse(GattResponse),
    SendNotification(Notification),
    StartAdvertising(AdvertisingRequest),
    StopAdvertising,
}

/// Owns all peripheral state. Every platform event and local command goes
/// through `&mut self`, so callers must serialize access.
#[derive(Debug)]
pub struct GattServer {
    config: PeripheralConfig,
    service: Service,
    store: AttributeStore,
    advertising: AdvertisingController,
    registry: ConnectionRegistry,
    notifier: Notifier,
    arbiter: RequestArbiter,
}

impl GattServer {
    pub fn new(config: PeripheralConfig) -> Self {
        let service = Service::default();
        GattServer {
            store: AttributeStore::new(config.max_value_len),
            advertising: AdvertisingController::new(service.uuid, config.device_name.clone()),
            registry: ConnectionRegistry::new(config.subscription_scope),
            notifier: Notifier::new(),
            arbiter: RequestArbiter::new(config.notify_policy),
            service,
            config,
        }
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn advertising_state(&self) -> &AdvertisingState {
        self.advertising.state()
    }

    pub fn characteristic_value(&self) -> &[u8] {
        self.store.read()
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.registry.connected()
    }

    pub fn subscribers(&self) -> Vec<PeerId> {
        self.registry.subscribers()
    }

    pub fn handle(&mut self, event: PeripheralEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            PeripheralEvent::AdvertiseStarted => {
                if self.advertising.on_started() {
                    effects.push(Effect::StopAdvertising);
                }
            }
            PeripheralEvent::AdvertiseFailed { reason } => self.advertising.on_failed(reason),
            PeripheralEvent::ConnectionStateChanged { peer, state } => {
                self.on_connection_state(&peer, state)
            }
            PeripheralEvent::CharacteristicReadRequest { request, offset } => {
                let (arbiter, attrs) = self.split();
                effects.extend(arbiter.read(attrs, &request, offset).map(Effect::SendResponse));
            }
            PeripheralEvent::CharacteristicWriteRequest {
                request,
                offset,
                value,
                response_needed,
            } => {
                let (arbiter, attrs) = self.split();
                effects.extend(
                    arbiter
                        .write(attrs, &request, offset, &value, response_needed)
                        .map(Effect::SendResponse),
                );
            }
            PeripheralEvent::DescriptorReadRequest { request, offset } => {
                let (arbiter, attrs) = self.split();
                effects.extend(
                    arbiter
                        .read_descriptor(attrs, &request, offset)
                        .map(Effect::SendResponse),
                );
            }
            PeripheralEvent::DescriptorWriteRequest {
                request,
                offset,
                value,
                response_needed,
            } => {
                let (arbiter, attrs) = self.split();
                effects.extend(
                    arbiter
                        .write_descriptor(attrs, &request, offset, &value, response_needed)
                        .map(Effect::SendResponse),
                );
            }
        }
        self.flush_notifications(&mut effects);
        effects
    }

    fn on_connection_state(&mut self, peer: &PeerId, state: ConnectionState) {
        match state {
            ConnectionState::Connecting => self.registry.on_connecting(peer),
            ConnectionState::Connected => self.registry.on_connect(peer),
            ConnectionState::Disconnected => {
                self.registry.on_disconnect(peer);
                self.notifier.forget(peer);
                self.arbiter.forget(peer);
            }
        }
        if self.registry.is_empty() {
            log::debug!("No centrals connected");
        } else {
            log::debug!("{} central(s) registered", self.registry.len());
        }
    }

    fn split(&mut self) -> (&mut RequestArbiter, Attributes<'_>) {
        (
            &mut self.arbiter,
            Attributes {
                service: &self.service,
                store: &mut self.store,
                registry: &mut self.registry,
                notifier: &mut self.notifier,
            },
        )
    }

    fn flush_notifications(&mut self, effects: &mut Vec<Effect>) {
        effects.extend(
            self.notifier
                .drain()
                .into_iter()
                .map(Effect::SendNotification),
        );
    }

    pub fn start_advertising(&mut self) -> Result<Vec<Effect>, GattError> {
        let request = self.advertising.start(&self.config.advertising)?;
        Ok(vec![Effect::StartAdvertising(request)])
    }

    pub fn stop_advertising(&mut self) -> Vec<Effect> {
        if self.advertising.stop() {
            vec![Effect::StopAdvertising]
        } else {
            Vec::new()
        }
    }

    pub fn set_device_name<T: Into<String>>(&mut self, name: T) {
        let name = name.into();
        self.advertising.set_device_name(name.clone());
        self.config.device_name = name;
    }

    /// Replaces the value from the application side and notifies every
    /// subscriber.
    pub fn update_characteristic(&mut self, value: &[u8]) -> Result<Vec<Effect>, GattError> {
        self.store.write(value)?;
        let subscribers = self.registry.subscribers();
        self.notifier.notify(&subscribers, CHARACTERISTIC_UUID, value);
        let mut effects = Vec::new();
        self.flush_notifications(&mut effects);
        Ok(effects)
    }
}
