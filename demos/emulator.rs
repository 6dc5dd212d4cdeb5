use std::{
    io::{self, BufRead},
    time::Duration,
};
use tokio::{runtime::Builder, sync::mpsc::UnboundedReceiver};

use ble_peripheral_emulator::{
    config::PeripheralConfig,
    gatt::{
        peer::PeerId,
        peripheral_event::{ConnectionState, PeripheralEvent, PeripheralRequest},
    },
    server::Effect,
    uuid::{CCCD_UUID, CHARACTERISTIC_UUID},
    ChannelLink, Peripheral, PlatformEvents,
};

fn main() {
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    runtime.block_on(start_app());
}

async fn start_app() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    if let Err(err) = pretty_env_logger::try_init() {
        eprintln!("WARNING: failed to initialize logging framework: {}", err);
    }

    let (link, effects_rx) = ChannelLink::new();
    let (peripheral, events) = Peripheral::new(PeripheralConfig::default(), link)
        .await
        .unwrap();

    // Stand-in for the radio: log what would go on air and confirm
    // advertising starts.
    tokio::spawn(handle_effects(effects_rx, events.clone()));

    let mut updates = peripheral.advertising_updates();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            log::info!("Advertising state: {:?}", *updates.borrow());
        }
    });

    if let Err(err) = peripheral.start_advertising().await {
        log::error!("Error starting advertising: {}", err);
        return;
    }

    simulate_central(&events).await;
    log::info!(
        "Characteristic value: {:?}",
        peripheral.characteristic_value().await.unwrap()
    );

    // Write in console to notify subscribed clients
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(input) => {
                println!("Writing: {input} to {CHARACTERISTIC_UUID}");
                if let Err(err) = peripheral.update_characteristic(input.into()).await {
                    log::error!("Error updating characteristic: {}", err);
                }
            }
            Err(err) => {
                log::error!("Error reading from console: {}", err);
                break;
            }
        }
    }

    peripheral.shutdown().await.unwrap();
}

/// A central that connects, subscribes, writes, and leaves. The second
/// write comes from a peer that never subscribed and reaches nobody.
async fn simulate_central(events: &PlatformEvents) {
    let central = PeerId::from("AA:BB");
    let request = |request_id, attribute| PeripheralRequest {
        client: central.clone(),
        request_id,
        attribute,
    };

    let script = vec![
        PeripheralEvent::ConnectionStateChanged {
            peer: central.clone(),
            state: ConnectionState::Connected,
        },
        PeripheralEvent::DescriptorWriteRequest {
            request: request(1, CCCD_UUID),
            offset: 0,
            value: vec![0x01, 0x00],
            response_needed: true,
        },
        PeripheralEvent::CharacteristicWriteRequest {
            request: request(2, CHARACTERISTIC_UUID),
            offset: 0,
            value: b"37".to_vec(),
            response_needed: true,
        },
        PeripheralEvent::CharacteristicReadRequest {
            request: request(3, CHARACTERISTIC_UUID),
            offset: 0,
        },
        PeripheralEvent::ConnectionStateChanged {
            peer: central.clone(),
            state: ConnectionState::Disconnected,
        },
        PeripheralEvent::CharacteristicWriteRequest {
            request: PeripheralRequest {
                client: PeerId::from("CC:DD"),
                request_id: 1,
                attribute: CHARACTERISTIC_UUID,
            },
            offset: 0,
            value: b"40".to_vec(),
            response_needed: false,
        },
    ];

    for event in script {
        if let Err(err) = events.emit(event).await {
            log::error!("Error delivering event: {}", err);
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn handle_effects(mut effects_rx: UnboundedReceiver<Effect>, events: PlatformEvents) {
    while let Some(effect) = effects_rx.recv().await {
        match effect {
            Effect::StartAdvertising(request) => {
                log::info!(
                    "Advertising {:?} as {:?}",
                    request.payload.service_uuids,
                    request.payload.device_name
                );
                if let Err(err) = events.emit(PeripheralEvent::AdvertiseStarted).await {
                    log::error!("Error confirming advertising: {}", err);
                }
            }
            Effect::StopAdvertising => log::info!("Advertising stopped"),
            Effect::SendResponse(response) => log::info!(
                "Response to {}: {:?} {:?}",
                response.peer,
                response.status,
                String::from_utf8_lossy(&response.value)
            ),
            Effect::SendNotification(notification) => log::info!(
                "Notification to {}: {:?}",
                notification.peer,
                String::from_utf8_lossy(&notification.value)
            ),
        }
    }
}
