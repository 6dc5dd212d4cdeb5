mod channel_link;
mod manager;

pub use self::channel_link::ChannelLink;

use crate::{
    config::PeripheralConfig,
    error::Error,
    gatt::{peer::PeerId, peripheral_event::PeripheralEvent, service::Service},
    server::{
        advertising::{AdvertisingRequest, AdvertisingState},
        arbiter::GattResponse,
        notifier::Notification,
        GattServer,
    },
};
use async_trait::async_trait;
use manager::{ManagerEvent, PeripheralManager};
use tokio::sync::{mpsc, oneshot, watch};

/// The platform radio stack, seen from the peripheral core. Every call is a
/// hand-off: implementations queue the work and return without waiting for
/// the air interface.
#[async_trait]
pub trait PlatformLink: Send {
    async fn add_service(&mut self, service: &Service) -> Result<(), Error>;

    async fn start_advertising(&mut self, request: &AdvertisingRequest) -> Result<(), Error>;

    async fn stop_advertising(&mut self) -> Result<(), Error>;

    async fn send_response(&mut self, response: &GattResponse) -> Result<(), Error>;

    async fn send_notification(&mut self, notification: &Notification) -> Result<(), Error>;
}

/// Feeds platform callbacks into the peripheral. Cheap to clone; hand one to
/// every callback context of the radio stack.
#[derive(Debug, Clone)]
pub struct PlatformEvents {
    manager_tx: mpsc::Sender<ManagerEvent>,
}

impl PlatformEvents {
    pub async fn emit(&self, event: PeripheralEvent) -> Result<(), Error> {
        self.manager_tx.send(ManagerEvent::Platform(event)).await?;
        Ok(())
    }

    /// For callbacks running on platform threads outside the tokio runtime.
    pub fn emit_blocking(&self, event: PeripheralEvent) -> Result<(), Error> {
        futures::executor::block_on(self.emit(event))
    }
}

/// Handle to the emulated peripheral. All state lives on one spawned task;
/// dropping the handle stops it.
pub struct Peripheral {
    manager_tx: mpsc::Sender<ManagerEvent>,
    advertising_rx: watch::Receiver<AdvertisingState>,
    _drop_tx: oneshot::Sender<()>,
}

impl Peripheral {
    pub async fn new<L>(
        config: PeripheralConfig,
        mut link: L,
    ) -> Result<(Self, PlatformEvents), Error>
    where
        L: PlatformLink + 'static,
    {
        let server = GattServer::new(config);
        link.add_service(server.service()).await?;
        log::info!("Service Added");

        let (manager_tx, manager_rx) = mpsc::channel(256);
        let (drop_tx, drop_rx) = oneshot::channel();
        let (advertising_tx, advertising_rx) = watch::channel(server.advertising_state().clone());

        let manager = PeripheralManager::new(server, Box::new(link), advertising_tx);
        tokio::spawn(manager.run(manager_rx, drop_rx));

        let events = PlatformEvents {
            manager_tx: manager_tx.clone(),
        };
        let peripheral = Peripheral {
            manager_tx,
            advertising_rx,
            _drop_tx: drop_tx,
        };
        Ok((peripheral, events))
    }

    /// Requests a new advertising session. Success means the radio accepted
    /// the request; whether advertising actually begins arrives through
    /// [`Peripheral::advertising_updates`]. A radio that refuses the request
    /// leaves the state `Failed(InternalError)` and the call returns an
    /// `Advertising` error.
    pub async fn start_advertising(&self) -> Result<(), Error> {
        let (responder, responder_rx) = oneshot::channel();
        self.manager_tx
            .send(ManagerEvent::StartAdvertising { responder })
            .await?;
        return responder_rx.await?;
    }

    pub async fn stop_advertising(&self) -> Result<(), Error> {
        let (responder, responder_rx) = oneshot::channel();
        self.manager_tx
            .send(ManagerEvent::StopAdvertising { responder })
            .await?;
        return Ok(responder_rx.await?);
    }

    pub async fn update_characteristic(&self, value: Vec<u8>) -> Result<(), Error> {
        let (responder, responder_rx) = oneshot::channel();
        self.manager_tx
            .send(ManagerEvent::UpdateCharacteristic { value, responder })
            .await?;
        return responder_rx.await?;
    }

    pub async fn set_device_name(&self, name: &str) -> Result<(), Error> {
        let (responder, responder_rx) = oneshot::channel();
        self.manager_tx
            .send(ManagerEvent::SetDeviceName {
                name: name.to_string(),
                responder,
            })
            .await?;
        return Ok(responder_rx.await?);
    }

    pub async fn advertising_state(&self) -> Result<AdvertisingState, Error> {
        let (responder, responder_rx) = oneshot::channel();
        self.manager_tx
            .send(ManagerEvent::AdvertisingState { responder })
            .await?;
        return Ok(responder_rx.await?);
    }

    pub fn advertising_updates(&self) -> watch::Receiver<AdvertisingState> {
        self.advertising_rx.clone()
    }

    pub async fn characteristic_value(&self) -> Result<Vec<u8>, Error> {
        let (responder, responder_rx) = oneshot::channel();
        self.manager_tx
            .send(ManagerEvent::CharacteristicValue { responder })
            .await?;
        return Ok(responder_rx.await?);
    }

    pub async fn connected_peers(&self) -> Result<Vec<PeerId>, Error> {
        let (responder, responder_rx) = oneshot::channel();
        self.manager_tx
            .send(ManagerEvent::ConnectedPeers { responder })
            .await?;
        return Ok(responder_rx.await?);
    }

    pub async fn subscribers(&self) -> Result<Vec<PeerId>, Error> {
        let (responder, responder_rx) = oneshot::channel();
        self.manager_tx
            .send(ManagerEvent::Subscribers { responder })
            .await?;
        return Ok(responder_rx.await?);
    }

    /// Stops advertising and ends the owner task. Platform events emitted
    /// afterwards fail with a channel error.
    pub async fn shutdown(self) -> Result<(), Error> {
        let (responder, responder_rx) = oneshot::channel();
        self.manager_tx
            .send(ManagerEvent::Shutdown { responder })
            .await?;
        return Ok(responder_rx.await?);
    }
}
