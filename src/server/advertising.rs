use crate::config::AdvertisingSettings;
use crate::gatt::{error::GattError, peripheral_event::AdvertiseFailure};
use crate::uuid::ShortUuid;
use uuid::Uuid;

/// Size limit of a legacy advertising PDU payload and of its scan response.
pub const LEGACY_ADV_DATA_LEN: usize = 31;

// AD structure header: one length byte and one type byte.
const AD_HEADER_LEN: usize = 2;
// Flags AD structure, present on connectable advertisements.
const AD_FLAGS_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvertisingState {
    Idle,
    Starting,
    Advertising,
    Failed(AdvertiseFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingPayload {
    pub device_name: Option<String>,
    pub service_uuids: Vec<Uuid>,
    pub scan_response_device_name: Option<String>,
}

impl AdvertisingPayload {
    /// Bytes the advertising data occupies once encoded as AD structures.
    pub fn encoded_len(&self, connectable: bool) -> usize {
        let flags = if connectable { AD_FLAGS_LEN } else { 0 };
        let uuids: usize = self
            .service_uuids
            .iter()
            .map(|uuid| match uuid.to_short() {
                Some(_) => 2,
                None => 16,
            })
            .sum();
        let uuids = if self.service_uuids.is_empty() {
            0
        } else {
            AD_HEADER_LEN + uuids
        };
        let name = self
            .device_name
            .as_ref()
            .map_or(0, |name| AD_HEADER_LEN + name.len());
        flags + uuids + name
    }

    pub fn scan_response_len(&self) -> usize {
        self.scan_response_device_name
            .as_ref()
            .map_or(0, |name| AD_HEADER_LEN + name.len())
    }

    /// Whether both the advertising data and the scan response fit a legacy
    /// advertising PDU.
    pub fn fits_legacy_pdu(&self, connectable: bool) -> bool {
        self.encoded_len(connectable) <= LEGACY_ADV_DATA_LEN
            && self.scan_response_len() <= LEGACY_ADV_DATA_LEN
    }
}

/// Everything the platform needs to begin a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingRequest {
    pub settings: AdvertisingSettings,
    pub payload: AdvertisingPayload,
}

#[derive(Debug)]
pub struct AdvertisingController {
    state: AdvertisingState,
    service_uuid: Uuid,
    device_name: String,
}

impl AdvertisingController {
    pub fn new<T: Into<String>>(service_uuid: Uuid, device_name: T) -> Self {
        AdvertisingController {
            state: AdvertisingState::Idle,
            service_uuid,
            device_name: device_name.into(),
        }
    }

    pub fn state(&self) -> &AdvertisingState {
        &self.state
    }

    /// Takes effect on the next `start`; a running session keeps its name.
    pub fn set_device_name<T: Into<String>>(&mut self, name: T) {
        self.device_name = name.into();
    }

    pub fn start(
        &mut self,
        settings: &AdvertisingSettings,
    ) -> Result<AdvertisingRequest, GattError> {
        match self.state {
            AdvertisingState::Starting | AdvertisingState::Advertising => {
                return Err(GattError::AdvertisingAlreadyActive)
            }
            AdvertisingState::Idle | AdvertisingState::Failed(_) => {}
        }

        let request = AdvertisingRequest {
            settings: settings.clone(),
            payload: self.build_payload(settings),
        };
        if !request.payload.fits_legacy_pdu(settings.connectable) {
            log::warn!(
                "Advertising data is {} bytes and scan response {} bytes, \
                 over the {LEGACY_ADV_DATA_LEN} byte legacy limit",
                request.payload.encoded_len(settings.connectable),
                request.payload.scan_response_len()
            );
        }

        log::debug!("Advertising: {:?} -> Starting", self.state);
        self.state = AdvertisingState::Starting;
        Ok(request)
    }

    fn build_payload(&self, settings: &AdvertisingSettings) -> AdvertisingPayload {
        let name = || self.device_name.clone();
        AdvertisingPayload {
            device_name: settings.include_device_name.then(name),
            service_uuids: vec![self.service_uuid],
            scan_response_device_name: settings.scan_response_device_name.then(name),
        }
    }

    /// Returns `true` when the radio must be told to stop.
    pub fn stop(&mut self) -> bool {
        let radio_active = matches!(
            self.state,
            AdvertisingState::Starting | AdvertisingState::Advertising
        );
        if self.state != AdvertisingState::Idle {
            log::debug!("Advertising: {:?} -> Idle", self.state);
        }
        self.state = AdvertisingState::Idle;
        radio_active
    }

    /// Returns `true` when a late confirmation arrived for a session that was
    /// already stopped, so the radio must be told to stop again.
    pub fn on_started(&mut self) -> bool {
        match self.state {
            AdvertisingState::Starting => {
                log::info!("Advertising started successfully");
                self.state = AdvertisingState::Advertising;
                false
            }
            AdvertisingState::Idle => {
                log::warn!("Advertising confirmed after stop, stopping radio");
                true
            }
            ref state => {
                log::warn!("Ignoring advertising confirmation in state {state:?}");
                false
            }
        }
    }

    pub fn on_failed(&mut self, reason: AdvertiseFailure) {
        if self.state != AdvertisingState::Starting {
            log::warn!(
                "Ignoring advertising failure {reason:?} in state {:?}",
                self.state
            );
            return;
        }
        log::error!("Advertising failed with error: {reason:?}");
        self.state = AdvertisingState::Failed(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::SERVICE_UUID;

    fn controller() -> AdvertisingController {
        AdvertisingController::new(SERVICE_UUID, "MyBLEDevice")
    }

    #[test]
    fn start_confirm_and_reject_second_start() {
        let settings = AdvertisingSettings::default();
        let mut adv = controller();

        let request = adv.start(&settings).unwrap();
        assert_eq!(adv.state(), &AdvertisingState::Starting);
        assert_eq!(request.payload.service_uuids, vec![SERVICE_UUID]);
        assert_eq!(request.payload.device_name.as_deref(), Some("MyBLEDevice"));

        assert!(!adv.on_started());
        assert_eq!(adv.state(), &AdvertisingState::Advertising);

        assert_eq!(adv.start(&settings), Err(GattError::AdvertisingAlreadyActive));
        assert_eq!(adv.state(), &AdvertisingState::Advertising);
    }

    #[test]
    fn start_is_rejected_while_starting() {
        let settings = AdvertisingSettings::default();
        let mut adv = controller();
        adv.start(&settings).unwrap();
        assert_eq!(adv.start(&settings), Err(GattError::AdvertisingAlreadyActive));
        assert_eq!(adv.state(), &AdvertisingState::Starting);
    }

    #[test]
    fn failure_is_terminal_until_restarted() {
        let settings = AdvertisingSettings::default();
        let mut adv = controller();
        adv.start(&settings).unwrap();
        adv.on_failed(AdvertiseFailure::TooManyAdvertisers);
        assert_eq!(
            adv.state(),
            &AdvertisingState::Failed(AdvertiseFailure::TooManyAdvertisers)
        );

        adv.start(&settings).unwrap();
        assert_eq!(adv.state(), &AdvertisingState::Starting);
    }

    #[test]
    fn stop_twice_from_every_state_ends_idle() {
        let settings = AdvertisingSettings::default();
        let setups: [fn(&mut AdvertisingController, &AdvertisingSettings); 4] = [
            |_, _| {},
            |adv, s| {
                adv.start(s).unwrap();
            },
            |adv, s| {
                adv.start(s).unwrap();
                adv.on_started();
            },
            |adv, s| {
                adv.start(s).unwrap();
                adv.on_failed(AdvertiseFailure::InternalError);
            },
        ];
        for setup in setups {
            let mut adv = controller();
            setup(&mut adv, &settings);
            adv.stop();
            assert!(!adv.stop());
            assert_eq!(adv.state(), &AdvertisingState::Idle);
        }
    }

    #[test]
    fn stop_only_touches_the_radio_when_active() {
        let settings = AdvertisingSettings::default();
        let mut adv = controller();
        assert!(!adv.stop());
        adv.start(&settings).unwrap();
        assert!(adv.stop());
        adv.start(&settings).unwrap();
        adv.on_failed(AdvertiseFailure::DataTooLarge);
        assert!(!adv.stop());
    }

    #[test]
    fn late_confirmation_after_stop_requests_another_stop() {
        let settings = AdvertisingSettings::default();
        let mut adv = controller();
        adv.start(&settings).unwrap();
        adv.stop();
        assert!(adv.on_started());
        assert_eq!(adv.state(), &AdvertisingState::Idle);
    }

    #[test]
    fn failure_outside_starting_is_ignored() {
        let settings = AdvertisingSettings::default();
        let mut adv = controller();
        adv.start(&settings).unwrap();
        adv.on_started();
        adv.on_failed(AdvertiseFailure::InternalError);
        assert_eq!(adv.state(), &AdvertisingState::Advertising);
    }

    #[test]
    fn payload_is_rebuilt_with_the_current_name() {
        let settings = AdvertisingSettings::default();
        let mut adv = controller();
        let running = adv.start(&settings).unwrap();
        adv.set_device_name("Renamed");
        assert_eq!(running.payload.device_name.as_deref(), Some("MyBLEDevice"));
        assert_eq!(adv.state(), &AdvertisingState::Starting);

        adv.stop();
        let request = adv.start(&settings).unwrap();
        assert_eq!(request.payload.device_name.as_deref(), Some("Renamed"));
        assert_eq!(
            request.payload.scan_response_device_name.as_deref(),
            Some("Renamed")
        );
    }

    #[test]
    fn name_can_be_left_out_of_the_payload() {
        let settings = AdvertisingSettings {
            include_device_name: false,
            scan_response_device_name: false,
            ..Default::default()
        };
        let request = controller().start(&settings).unwrap();
        assert_eq!(request.payload.device_name, None);
        assert_eq!(request.payload.scan_response_device_name, None);
        assert_eq!(request.payload.scan_response_len(), 0);
    }

    #[test]
    fn encoded_len_counts_ad_structures() {
        let payload = AdvertisingPayload {
            device_name: Some("MyBLEDevice".to_string()),
            service_uuids: vec![SERVICE_UUID],
            scan_response_device_name: None,
        };
        // flags 3 + 16-bit uuid list 4 + name 2 + 11
        assert_eq!(payload.encoded_len(true), 20);
        assert_eq!(payload.encoded_len(false), 17);

        let vendor = AdvertisingPayload {
            service_uuids: vec![Uuid::from_u128(0x12345678_1234_5678_1234_56789ABCDEF0)],
            ..payload
        };
        assert_eq!(vendor.encoded_len(true), 3 + 18 + 13);
    }

    #[test]
    fn long_names_overflow_the_legacy_pdu() {
        let short = AdvertisingPayload {
            device_name: Some("MyBLEDevice".to_string()),
            service_uuids: vec![SERVICE_UUID],
            scan_response_device_name: Some("MyBLEDevice".to_string()),
        };
        assert!(short.fits_legacy_pdu(true));

        // 2 + 30 bytes of scan response, advertising data left without a name
        let long_scan_response = AdvertisingPayload {
            device_name: None,
            scan_response_device_name: Some("x".repeat(30)),
            ..short.clone()
        };
        assert_eq!(long_scan_response.encoded_len(true), 7);
        assert!(!long_scan_response.fits_legacy_pdu(true));

        let long_name = AdvertisingPayload {
            device_name: Some("x".repeat(25)),
            scan_response_device_name: None,
            ..short
        };
        assert!(long_name.fits_legacy_pdu(false));
        assert!(!long_name.fits_legacy_pdu(true));
    }
}
