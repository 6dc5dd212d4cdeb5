use super::PlatformLink;
use crate::error::Error;
use crate::gatt::{
    error::GattError,
    peer::PeerId,
    peripheral_event::{AdvertiseFailure, PeripheralEvent},
};
use crate::server::{advertising::AdvertisingState, Effect, GattServer};
use std::collections::VecDeque;
use tokio::sync::{mpsc, oneshot, watch};

/// Commands serialized onto the single task that owns the [`GattServer`].
#[derive(Debug)]
pub(crate) enum ManagerEvent {
    Platform(PeripheralEvent),
    StartAdvertising {
        responder: oneshot::Sender<Result<(), Error>>,
    },
    StopAdvertising {
        responder: oneshot::Sender<()>,
    },
    UpdateCharacteristic {
        value: Vec<u8>,
        responder: oneshot::Sender<Result<(), Error>>,
    },
    SetDeviceName {
        name: String,
        responder: oneshot::Sender<()>,
    },
    AdvertisingState {
        responder: oneshot::Sender<AdvertisingState>,
    },
    CharacteristicValue {
        responder: oneshot::Sender<Vec<u8>>,
    },
    ConnectedPeers {
        responder: oneshot::Sender<Vec<PeerId>>,
    },
    Subscribers {
        responder: oneshot::Sender<Vec<PeerId>>,
    },
    Shutdown {
        responder: oneshot::Sender<()>,
    },
}

pub(crate) struct PeripheralManager {
    server: GattServer,
    link: Box<dyn PlatformLink>,
    advertising_tx: watch::Sender<AdvertisingState>,
}

impl PeripheralManager {
    pub fn new(
        server: GattServer,
        link: Box<dyn PlatformLink>,
        advertising_tx: watch::Sender<AdvertisingState>,
    ) -> Self {
        PeripheralManager {
            server,
            link,
            advertising_tx,
        }
    }

    /// Applies commands one at a time until every sender is gone or the
    /// owning handle is dropped.
    pub async fn run(
        mut self,
        mut manager_rx: mpsc::Receiver<ManagerEvent>,
        mut drop_rx: oneshot::Receiver<()>,
    ) {
        loop {
            let event = tokio::select! {
                event = manager_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = &mut drop_rx => break,
            };
            let running = self.on_event(event).await;
            self.publish_advertising_state();
            if !running {
                break;
            }
        }
        log::debug!("Peripheral manager stopped");
    }

    /// Returns `false` once the manager should stop.
    async fn on_event(&mut self, event: ManagerEvent) -> bool {
        match event {
            ManagerEvent::Platform(event) => {
                log::debug!("Platform event: {event:?}");
                let effects = self.server.handle(event);
                self.apply(effects).await;
            }
            ManagerEvent::StartAdvertising { responder } => {
                let result = match self.server.start_advertising() {
                    Ok(effects) => {
                        self.apply(effects).await;
                        // Radio callbacks queue behind this command, so only a
                        // rejected hand-off can have failed the session here.
                        match self.server.advertising_state() {
                            AdvertisingState::Failed(reason) => {
                                Err(GattError::AdvertisingFailure(*reason).into())
                            }
                            _ => Ok(()),
                        }
                    }
                    Err(err) => Err(err.into()),
                };
                let _ = responder.send(result);
            }
            ManagerEvent::StopAdvertising { responder } => {
                let effects = self.server.stop_advertising();
                self.apply(effects).await;
                let _ = responder.send(());
            }
            ManagerEvent::UpdateCharacteristic { value, responder } => {
                let result = match self.server.update_characteristic(&value) {
                    Ok(effects) => {
                        self.apply(effects).await;
                        Ok(())
                    }
                    Err(err) => Err(err.into()),
                };
                let _ = responder.send(result);
            }
            ManagerEvent::SetDeviceName { name, responder } => {
                self.server.set_device_name(name);
                let _ = responder.send(());
            }
            ManagerEvent::AdvertisingState { responder } => {
                let _ = responder.send(self.server.advertising_state().clone());
            }
            ManagerEvent::CharacteristicValue { responder } => {
                let _ = responder.send(self.server.characteristic_value().to_vec());
            }
            ManagerEvent::ConnectedPeers { responder } => {
                let _ = responder.send(self.server.connected_peers());
            }
            ManagerEvent::Subscribers { responder } => {
                let _ = responder.send(self.server.subscribers());
            }
            ManagerEvent::Shutdown { responder } => {
                let effects = self.server.stop_advertising();
                self.apply(effects).await;
                let _ = responder.send(());
                return false;
            }
        }
        true
    }

    /// Hands effects to the platform in order. Transport errors are logged
    /// and dropped, except a rejected advertising start which is fed back
    /// as a failure so the controller does not stay in `Starting`.
    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::SendResponse(response) => {
                    if let Err(err) = self.link.send_response(&response).await {
                        log::error!("Error sending response to {}: {err}", response.peer);
                    }
                }
                Effect::SendNotification(notification) => {
                    if let Err(err) = self.link.send_notification(&notification).await {
                        log::debug!("Dropped notification to {}: {err}", notification.peer);
                    }
                }
                Effect::StartAdvertising(request) => {
                    if let Err(err) = self.link.start_advertising(&request).await {
                        log::error!("Error starting advertising: {err}");
                        queue.extend(self.server.handle(PeripheralEvent::AdvertiseFailed {
                            reason: AdvertiseFailure::InternalError,
                        }));
                    }
                }
                Effect::StopAdvertising => {
                    if let Err(err) = self.link.stop_advertising().await {
                        log::error!("Error stopping advertising: {err}");
                    }
                }
            }
        }
    }

    fn publish_advertising_state(&self) {
        let state = self.server.advertising_state();
        self.advertising_tx.send_if_modified(|current| {
            if *current == *state {
                return false;
            }
            *current = state.clone();
            true
        });
    }
}
