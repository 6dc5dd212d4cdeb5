use ble_peripheral_emulator::{
    config::{NotifyPolicy, PeripheralConfig, SubscriptionScope},
    error::ErrorType,
    gatt::{
        peer::PeerId,
        peripheral_event::{
            AdvertiseFailure, ConnectionState, PeripheralEvent, PeripheralRequest, RequestResponse,
        },
    },
    server::{advertising::AdvertisingState, arbiter::GattResponse, notifier::Notification, Effect},
    uuid::{CCCD_UUID, CHARACTERISTIC_UUID, SERVICE_UUID},
    ChannelLink, Peripheral, PlatformEvents,
};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

struct Harness {
    peripheral: Peripheral,
    events: PlatformEvents,
    effects: UnboundedReceiver<Effect>,
    next_request: u32,
}

impl Harness {
    async fn new(config: PeripheralConfig) -> Self {
        let (link, effects) = ChannelLink::new();
        Self::with_link(config, link, effects).await
    }

    async fn with_link(
        config: PeripheralConfig,
        link: ChannelLink,
        effects: UnboundedReceiver<Effect>,
    ) -> Self {
        let (peripheral, events) = Peripheral::new(config, link).await.unwrap();
        Harness {
            peripheral,
            events,
            effects,
            next_request: 0,
        }
    }

    fn request(&mut self, peer: &str, attribute: Uuid) -> PeripheralRequest {
        self.next_request += 1;
        PeripheralRequest {
            client: PeerId::from(peer),
            request_id: self.next_request,
            attribute,
        }
    }

    /// Emits an event and waits until the peripheral has applied it.
    async fn emit(&mut self, event: PeripheralEvent) -> Vec<Effect> {
        self.events.emit(event).await.unwrap();
        self.settle().await
    }

    /// Round-trips a query through the command queue, then collects every
    /// effect produced before it.
    async fn settle(&mut self) -> Vec<Effect> {
        self.peripheral.characteristic_value().await.unwrap();
        let mut effects = Vec::new();
        while let Ok(effect) = self.effects.try_recv() {
            effects.push(effect);
        }
        effects
    }

    async fn connect(&mut self, peer: &str) {
        self.emit(PeripheralEvent::ConnectionStateChanged {
            peer: PeerId::from(peer),
            state: ConnectionState::Connected,
        })
        .await;
    }

    async fn disconnect(&mut self, peer: &str) {
        self.emit(PeripheralEvent::ConnectionStateChanged {
            peer: PeerId::from(peer),
            state: ConnectionState::Disconnected,
        })
        .await;
    }

    async fn write_cccd(&mut self, peer: &str, value: &[u8]) -> GattResponse {
        let request = self.request(peer, CCCD_UUID);
        let effects = self
            .emit(PeripheralEvent::DescriptorWriteRequest {
                request,
                offset: 0,
                value: value.to_vec(),
                response_needed: true,
            })
            .await;
        single_response(&effects)
    }

    async fn write(&mut self, peer: &str, offset: u64, value: &[u8]) -> Vec<Effect> {
        let request = self.request(peer, CHARACTERISTIC_UUID);
        self.emit(PeripheralEvent::CharacteristicWriteRequest {
            request,
            offset,
            value: value.to_vec(),
            response_needed: true,
        })
        .await
    }

    async fn read(&mut self, peer: &str, offset: u64) -> GattResponse {
        let request = self.request(peer, CHARACTERISTIC_UUID);
        let effects = self
            .emit(PeripheralEvent::CharacteristicReadRequest { request, offset })
            .await;
        single_response(&effects)
    }
}

fn responses(effects: &[Effect]) -> Vec<&GattResponse> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::SendResponse(response) => Some(response),
            _ => None,
        })
        .collect()
}

fn single_response(effects: &[Effect]) -> GattResponse {
    match responses(effects).as_slice() {
        [response] => (*response).clone(),
        other => panic!("expected one response, got {other:?}"),
    }
}

fn notifications(effects: &[Effect]) -> Vec<&Notification> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::SendNotification(notification) => Some(notification),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn subscribed_peer_is_notified_until_it_disconnects() {
    let mut h = Harness::new(PeripheralConfig::default()).await;
    h.connect("AA:BB").await;
    assert_eq!(h.write_cccd("AA:BB", &[0x01, 0x00]).await.status, RequestResponse::Success);

    let effects = h.write("AA:BB", 0, b"37").await;
    let sent = notifications(&effects);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].peer, PeerId::from("AA:BB"));
    assert_eq!(sent[0].attribute, CHARACTERISTIC_UUID);
    assert_eq!(sent[0].value, b"37");

    h.disconnect("AA:BB").await;
    assert!(h.peripheral.subscribers().await.unwrap().is_empty());

    let effects = h.write("CC:DD", 0, b"40").await;
    assert!(notifications(&effects).is_empty());
    assert_eq!(h.peripheral.characteristic_value().await.unwrap(), b"40");
}

#[tokio::test]
async fn unsubscribing_stops_delivery() {
    let mut h = Harness::new(PeripheralConfig::default()).await;
    h.connect("AA:BB").await;
    h.write_cccd("AA:BB", &[0x01, 0x00]).await;
    h.write_cccd("AA:BB", &[0x00, 0x00]).await;
    assert!(notifications(&h.write("AA:BB", 0, b"1").await).is_empty());

    h.write_cccd("AA:BB", &[0x01, 0x00]).await;
    assert_eq!(notifications(&h.write("AA:BB", 0, b"2").await).len(), 1);
}

#[tokio::test]
async fn written_value_is_read_back() {
    let mut h = Harness::new(PeripheralConfig::default()).await;
    h.connect("AA:BB").await;

    let response = single_response(&h.write("AA:BB", 0, b"hello").await);
    assert_eq!(response.status, RequestResponse::Success);
    assert_eq!(response.value, b"hello");

    let response = h.read("AA:BB", 0).await;
    assert_eq!(response.status, RequestResponse::Success);
    assert_eq!(response.value, b"hello");

    let response = h.read("AA:BB", 6).await;
    assert_eq!(response.status, RequestResponse::InvalidOffset);
    assert!(response.value.is_empty());
}

#[tokio::test]
async fn offset_write_on_empty_characteristic_is_rejected() {
    let mut h = Harness::new(PeripheralConfig::default()).await;
    h.connect("AA:BB").await;
    let response = single_response(&h.write("AA:BB", 5, b"37").await);
    assert_eq!(response.status, RequestResponse::InvalidOffset);
    assert!(h.peripheral.characteristic_value().await.unwrap().is_empty());
}

#[tokio::test]
async fn configured_limit_bounds_writes() {
    let mut h = Harness::new(PeripheralConfig::default().with_max_value_len(20)).await;
    h.connect("AA:BB").await;
    let response = single_response(&h.write("AA:BB", 0, &[0x55; 21]).await);
    assert_eq!(response.status, RequestResponse::InvalidAttributeValueLength);

    assert!(h.peripheral.update_characteristic(vec![0; 21]).await.is_err());
    assert!(h.peripheral.characteristic_value().await.unwrap().is_empty());
}

#[tokio::test]
async fn foreign_attribute_requests_do_not_fault() {
    let mut h = Harness::new(PeripheralConfig::default()).await;
    h.connect("AA:BB").await;
    let request = h.request("AA:BB", Uuid::from_u128(0xDEAD_BEEF));
    let effects = h
        .emit(PeripheralEvent::CharacteristicReadRequest { request, offset: 0 })
        .await;
    assert_eq!(single_response(&effects).status, RequestResponse::AttributeNotFound);

    let request = h.request("AA:BB", Uuid::from_u128(0xDEAD_BEEF));
    let effects = h
        .emit(PeripheralEvent::DescriptorWriteRequest {
            request,
            offset: 0,
            value: vec![1, 0],
            response_needed: false,
        })
        .await;
    assert!(effects.is_empty());
    assert_eq!(h.read("AA:BB", 0).await.status, RequestResponse::Success);
}

#[tokio::test]
async fn duplicate_delivery_is_answered_once() {
    let mut h = Harness::new(PeripheralConfig::default()).await;
    h.connect("AA:BB").await;
    let request = h.request("AA:BB", CHARACTERISTIC_UUID);
    let event = PeripheralEvent::CharacteristicReadRequest { request, offset: 0 };
    assert_eq!(responses(&h.emit(event.clone()).await).len(), 1);
    assert!(h.emit(event).await.is_empty());
}

#[tokio::test]
async fn cccd_read_reflects_the_connection() {
    let mut h = Harness::new(PeripheralConfig::default()).await;
    h.connect("AA:BB").await;
    h.connect("CC:DD").await;
    h.write_cccd("AA:BB", &[0x01, 0x00]).await;

    for (peer, expected) in [("AA:BB", vec![0x01, 0x00]), ("CC:DD", vec![0x00, 0x00])] {
        let request = h.request(peer, CCCD_UUID);
        let effects = h
            .emit(PeripheralEvent::DescriptorReadRequest { request, offset: 0 })
            .await;
        assert_eq!(single_response(&effects).value, expected, "{peer}");
    }
}

#[tokio::test]
async fn shared_cccd_scope_notifies_every_connection() {
    let config = PeripheralConfig::default().with_subscription_scope(SubscriptionScope::Shared);
    let mut h = Harness::new(config).await;
    h.connect("AA:BB").await;
    h.connect("CC:DD").await;
    h.write_cccd("AA:BB", &[0x01, 0x00]).await;

    let effects = h.write("CC:DD", 0, b"37").await;
    let mut peers: Vec<_> = notifications(&effects).iter().map(|n| n.peer.clone()).collect();
    peers.sort();
    assert_eq!(peers, vec![PeerId::from("AA:BB"), PeerId::from("CC:DD")]);
}

#[tokio::test]
async fn exclude_writer_policy_is_honoured() {
    let config = PeripheralConfig::default().with_notify_policy(NotifyPolicy::ExcludeWriter);
    let mut h = Harness::new(config).await;
    h.connect("AA:BB").await;
    h.write_cccd("AA:BB", &[0x01, 0x00]).await;
    assert!(notifications(&h.write("AA:BB", 0, b"37").await).is_empty());

    h.peripheral.update_characteristic(b"38".to_vec()).await.unwrap();
    let effects = h.settle().await;
    assert_eq!(notifications(&effects).len(), 1);
}

#[tokio::test]
async fn advertising_lifecycle() {
    let mut h = Harness::new(PeripheralConfig::default().with_device_name("Pulse")).await;
    let mut updates = h.peripheral.advertising_updates();

    h.peripheral.start_advertising().await.unwrap();
    match h.settle().await.as_slice() {
        [Effect::StartAdvertising(request)] => {
            assert_eq!(request.payload.service_uuids, vec![SERVICE_UUID]);
            assert_eq!(request.payload.device_name.as_deref(), Some("Pulse"));
            assert!(request.settings.connectable);
        }
        other => panic!("unexpected effects {other:?}"),
    }
    assert_eq!(h.peripheral.advertising_state().await.unwrap(), AdvertisingState::Starting);

    h.emit(PeripheralEvent::AdvertiseStarted).await;
    updates.wait_for(|state| *state == AdvertisingState::Advertising).await.unwrap();

    assert!(h.peripheral.start_advertising().await.is_err());
    assert_eq!(h.peripheral.advertising_state().await.unwrap(), AdvertisingState::Advertising);

    h.peripheral.stop_advertising().await.unwrap();
    h.peripheral.stop_advertising().await.unwrap();
    assert_eq!(h.settle().await, vec![Effect::StopAdvertising]);
    assert_eq!(h.peripheral.advertising_state().await.unwrap(), AdvertisingState::Idle);
}

#[tokio::test]
async fn advertising_failure_requires_restart() {
    let mut h = Harness::new(PeripheralConfig::default()).await;
    h.peripheral.start_advertising().await.unwrap();
    h.emit(PeripheralEvent::AdvertiseFailed {
        reason: AdvertiseFailure::from_code(2),
    })
    .await;
    assert_eq!(
        h.peripheral.advertising_state().await.unwrap(),
        AdvertisingState::Failed(AdvertiseFailure::TooManyAdvertisers)
    );

    h.peripheral.set_device_name("Retry").await.unwrap();
    h.peripheral.start_advertising().await.unwrap();
    match h.settle().await.as_slice() {
        [Effect::StartAdvertising(request)] => {
            assert_eq!(request.payload.device_name.as_deref(), Some("Retry"))
        }
        other => panic!("unexpected effects {other:?}"),
    }
}

#[tokio::test]
async fn rejected_radio_start_is_reported_as_failure() {
    let (link, effects) = ChannelLink::new();
    let link = link.rejecting_advertising();
    let mut h = Harness::with_link(PeripheralConfig::default(), link, effects).await;
    let updates = h.peripheral.advertising_updates();

    let err = h.peripheral.start_advertising().await.unwrap_err();
    assert_eq!(err.error_type(), &ErrorType::Advertising);
    assert_eq!(
        h.peripheral.advertising_state().await.unwrap(),
        AdvertisingState::Failed(AdvertiseFailure::InternalError)
    );
    assert_eq!(
        *updates.borrow(),
        AdvertisingState::Failed(AdvertiseFailure::InternalError)
    );
    assert!(h.settle().await.is_empty());
}

#[tokio::test]
async fn connected_peers_follow_connection_events() {
    let mut h = Harness::new(PeripheralConfig::default()).await;
    h.emit(PeripheralEvent::ConnectionStateChanged {
        peer: PeerId::from("AA:BB"),
        state: ConnectionState::Connecting,
    })
    .await;
    assert!(h.peripheral.connected_peers().await.unwrap().is_empty());

    h.connect("AA:BB").await;
    assert_eq!(h.peripheral.connected_peers().await.unwrap(), vec![PeerId::from("AA:BB")]);

    h.disconnect("AA:BB").await;
    h.disconnect("AA:BB").await;
    assert!(h.peripheral.connected_peers().await.unwrap().is_empty());
}

#[tokio::test]
async fn shutdown_stops_advertising_and_closes_the_queue() {
    let mut h = Harness::new(PeripheralConfig::default()).await;
    h.peripheral.start_advertising().await.unwrap();
    h.emit(PeripheralEvent::AdvertiseStarted).await;

    let Harness {
        peripheral,
        events,
        mut effects,
        ..
    } = h;
    peripheral.shutdown().await.unwrap();
    assert_eq!(effects.recv().await, Some(Effect::StopAdvertising));
    assert_eq!(effects.recv().await, None);
    assert!(events.emit(PeripheralEvent::AdvertiseStarted).await.is_err());
}

#[test]
fn blocking_emission_from_a_platform_thread() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (link, mut effects) = ChannelLink::new();
    let (peripheral, events) = runtime
        .block_on(Peripheral::new(PeripheralConfig::default(), link))
        .unwrap();

    std::thread::spawn(move || {
        events
            .emit_blocking(PeripheralEvent::ConnectionStateChanged {
                peer: PeerId::from("AA:BB"),
                state: ConnectionState::Connected,
            })
            .unwrap();
        events
            .emit_blocking(PeripheralEvent::CharacteristicReadRequest {
                request: PeripheralRequest {
                    client: PeerId::from("AA:BB"),
                    request_id: 1,
                    attribute: CHARACTERISTIC_UUID,
                },
                offset: 0,
            })
            .unwrap();
    })
    .join()
    .unwrap();

    let effect = runtime.block_on(effects.recv()).unwrap();
    assert!(matches!(effect, Effect::SendResponse(ref r) if r.status == RequestResponse::Success));
    assert_eq!(
        runtime.block_on(peripheral.connected_peers()).unwrap(),
        vec![PeerId::from("AA:BB")]
    );
}
