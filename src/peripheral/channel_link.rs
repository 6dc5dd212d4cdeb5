use super::PlatformLink;
use crate::{
    error::{Error, ErrorType},
    gatt::service::Service,
    server::{
        advertising::AdvertisingRequest, arbiter::GattResponse, notifier::Notification, Effect,
    },
};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A [`PlatformLink`] with no radio behind it: every effect is logged and
/// forwarded to an unbounded channel, which makes it suitable for driving
/// the peripheral from tests or a simulated platform.
#[derive(Debug)]
pub struct ChannelLink {
    effects_tx: mpsc::UnboundedSender<Effect>,
    reject_advertising: bool,
}

impl ChannelLink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Effect>) {
        let (effects_tx, effects_rx) = mpsc::unbounded_channel();
        let link = ChannelLink {
            effects_tx,
            reject_advertising: false,
        };
        (link, effects_rx)
    }

    /// Makes every `start_advertising` call fail, as a radio without LE
    /// advertising support would.
    pub fn rejecting_advertising(mut self) -> Self {
        self.reject_advertising = true;
        self
    }

    fn forward(&self, effect: Effect) -> Result<(), Error> {
        self.effects_tx.send(effect)?;
        Ok(())
    }
}

#[async_trait]
impl PlatformLink for ChannelLink {
    async fn add_service(&mut self, service: &Service) -> Result<(), Error> {
        log::debug!(
            "Registering service {} with {} characteristic(s)",
            service.uuid,
            service.characteristics.len()
        );
        Ok(())
    }

    async fn start_advertising(&mut self, request: &AdvertisingRequest) -> Result<(), Error> {
        if self.reject_advertising {
            return Err(Error::new(
                "start_advertising",
                "LE advertising is not supported",
                ErrorType::Platform,
            ));
        }
        log::debug!("Start advertising: {request:?}");
        self.forward(Effect::StartAdvertising(request.clone()))
    }

    async fn stop_advertising(&mut self) -> Result<(), Error> {
        log::debug!("Stop advertising");
        self.forward(Effect::StopAdvertising)
    }

    async fn send_response(&mut self, response: &GattResponse) -> Result<(), Error> {
        log::debug!(
            "Response to {} #{}: {:?} offset {} {:?}",
            response.peer,
            response.request_id,
            response.status,
            response.offset,
            response.value
        );
        self.forward(Effect::SendResponse(response.clone()))
    }

    async fn send_notification(&mut self, notification: &Notification) -> Result<(), Error> {
        log::debug!(
            "Notify {} on {}: {:?}",
            notification.peer,
            notification.attribute,
            notification.value
        );
        self.forward(Effect::SendNotification(notification.clone()))
    }
}
