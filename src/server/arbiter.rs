//! Attribute request handling.
//!
//! Every request from a registered peer is answered at most once: the
//! arbiter remembers the last [`REQUEST_WINDOW`] request ids of each peer
//! until it disconnects, and a repeated delivery inside that window produces
//! neither a response nor a second mutation. Requests from peers the registry
//! does not know are served but never recorded.

use super::{attribute_store::AttributeStore, connection::ConnectionRegistry, notifier::Notifier};
use crate::config::{NotifyPolicy, SubscriptionScope};
use crate::gatt::{
    characteristic::Characteristic,
    descriptor::Subscription,
    error::GattError,
    peer::PeerId,
    peripheral_event::{PeripheralRequest, RequestResponse},
    properties::CharacteristicProperty,
    service::Service,
};
use crate::uuid::CCCD_UUID;
use std::collections::{HashMap, HashSet, VecDeque};

/// Request ids remembered per peer for duplicate detection.
pub const REQUEST_WINDOW: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattResponse {
    pub peer: PeerId,
    pub request_id: u32,
    pub status: RequestResponse,
    pub offset: u64,
    pub value: Vec<u8>,
}

/// Mutable state a request may touch.
pub struct Attributes<'a> {
    pub service: &'a Service,
    pub store: &'a mut AttributeStore,
    pub registry: &'a mut ConnectionRegistry,
    pub notifier: &'a mut Notifier,
}

/// The most recent request ids of one peer, oldest first.
#[derive(Debug, Default)]
struct RecentRequests {
    order: VecDeque<u32>,
    ids: HashSet<u32>,
}

impl RecentRequests {
    /// Returns `false` if `id` is still inside the window.
    fn insert(&mut self, id: u32) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > REQUEST_WINDOW {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }
}

#[derive(Debug)]
pub struct RequestArbiter {
    notify_policy: NotifyPolicy,
    seen: HashMap<PeerId, RecentRequests>,
}

impl RequestArbiter {
    pub fn new(notify_policy: NotifyPolicy) -> Self {
        RequestArbiter {
            notify_policy,
            seen: HashMap::new(),
        }
    }

    /// Forgets the request ids of a peer that disconnected.
    pub fn forget(&mut self, peer: &PeerId) {
        self.seen.remove(peer);
    }

    fn first_delivery(&mut self, attrs: &Attributes<'_>, request: &PeripheralRequest) -> bool {
        if !attrs.registry.contains(&request.client) {
            return true;
        }
        let fresh = self
            .seen
            .entry(request.client.clone())
            .or_default()
            .insert(request.request_id);
        if !fresh {
            log::warn!(
                "Dropping duplicate request {} from {}",
                request.request_id,
                request.client
            );
        }
        fresh
    }

    pub fn read(
        &mut self,
        attrs: Attributes<'_>,
        request: &PeripheralRequest,
        offset: u64,
    ) -> Option<GattResponse> {
        if !self.first_delivery(&attrs, request) {
            return None;
        }
        log::info!("Read request for characteristic: {}", request.attribute);
        let result = find_characteristic(attrs.service, request)
            .and_then(|characteristic| {
                require(
                    characteristic,
                    &[CharacteristicProperty::Read],
                    GattError::ReadNotPermitted,
                )
            })
            .and_then(|_| slice_from(attrs.store.read(), offset));
        Some(respond(request, offset, result))
    }

    pub fn write(
        &mut self,
        attrs: Attributes<'_>,
        request: &PeripheralRequest,
        offset: u64,
        value: &[u8],
        response_needed: bool,
    ) -> Option<GattResponse> {
        if !self.first_delivery(&attrs, request) {
            return None;
        }
        log::info!("Write request for characteristic: {}", request.attribute);
        let result = self.apply_write(attrs, request, offset, value);
        match &result {
            Ok(_) => log::info!("Characteristic written successfully"),
            Err(err) => log::warn!("Write from {} rejected: {err}", request.client),
        }
        response_needed.then(|| respond(request, offset, result))
    }

    fn apply_write(
        &self,
        attrs: Attributes<'_>,
        request: &PeripheralRequest,
        offset: u64,
        value: &[u8],
    ) -> Result<Vec<u8>, GattError> {
        let characteristic = find_characteristic(attrs.service, request)?;
        require(
            characteristic,
            &[
                CharacteristicProperty::Write,
                CharacteristicProperty::WriteWithoutResponse,
            ],
            GattError::WriteNotPermitted,
        )?;
        if offset != 0 {
            return Err(GattError::InvalidOffset {
                offset,
                len: attrs.store.read().len(),
            });
        }
        attrs.store.write(value)?;
        if !characteristic.supports(CharacteristicProperty::Notify) {
            return Ok(value.to_vec());
        }

        let subscribers: Vec<PeerId> = attrs
            .registry
            .subscribers()
            .into_iter()
            .filter(|peer| match self.notify_policy {
                NotifyPolicy::IncludeWriter => true,
                NotifyPolicy::ExcludeWriter => *peer != request.client,
            })
            .collect();
        attrs
            .notifier
            .notify(&subscribers, characteristic.uuid, attrs.store.read());
        Ok(value.to_vec())
    }

    pub fn read_descriptor(
        &mut self,
        attrs: Attributes<'_>,
        request: &PeripheralRequest,
        offset: u64,
    ) -> Option<GattResponse> {
        if !self.first_delivery(&attrs, request) {
            return None;
        }
        let result = cccd_value(&attrs, request).and_then(|value| slice_from(&value, offset));
        Some(respond(request, offset, result))
    }

    pub fn write_descriptor(
        &mut self,
        attrs: Attributes<'_>,
        request: &PeripheralRequest,
        offset: u64,
        value: &[u8],
        response_needed: bool,
    ) -> Option<GattResponse> {
        if !self.first_delivery(&attrs, request) {
            return None;
        }
        let result = apply_descriptor_write(attrs, request, offset, value);
        match &result {
            Ok(_) => log::info!("Descriptor {} written by {}", request.attribute, request.client),
            Err(err) => log::warn!("Descriptor write from {} rejected: {err}", request.client),
        }
        response_needed.then(|| respond(request, offset, result))
    }
}

fn find_characteristic<'s>(
    service: &'s Service,
    request: &PeripheralRequest,
) -> Result<&'s Characteristic, GattError> {
    service.characteristic(request.attribute).ok_or_else(|| {
        log::error!("Request for unknown characteristic: {}", request.attribute);
        GattError::AttributeNotFound
    })
}

/// Fails with `denied` unless the characteristic declares one of
/// `properties`.
fn require(
    characteristic: &Characteristic,
    properties: &[CharacteristicProperty],
    denied: GattError,
) -> Result<(), GattError> {
    if properties.iter().any(|p| characteristic.supports(*p)) {
        return Ok(());
    }
    log::warn!(
        "Characteristic {} declares none of {properties:?}",
        characteristic.uuid
    );
    Err(denied)
}

fn find_cccd(service: &Service, request: &PeripheralRequest) -> Result<(), GattError> {
    match service.descriptor(request.attribute) {
        Some((_, descriptor)) if descriptor.is_cccd() => Ok(()),
        _ => {
            log::error!("Request for unknown descriptor: {}", request.attribute);
            Err(GattError::AttributeNotFound)
        }
    }
}

fn cccd_value(attrs: &Attributes<'_>, request: &PeripheralRequest) -> Result<Vec<u8>, GattError> {
    find_cccd(attrs.service, request)?;
    match attrs.registry.scope() {
        SubscriptionScope::PerConnection => Ok(attrs
            .registry
            .subscription(&request.client)
            .unwrap_or_default()
            .encode()),
        SubscriptionScope::Shared => Ok(attrs.store.read_descriptor(CCCD_UUID)?.to_vec()),
    }
}

fn apply_descriptor_write(
    attrs: Attributes<'_>,
    request: &PeripheralRequest,
    offset: u64,
    value: &[u8],
) -> Result<Vec<u8>, GattError> {
    find_cccd(attrs.service, request)?;
    if offset != 0 {
        return Err(GattError::InvalidOffset {
            offset,
            len: value.len(),
        });
    }
    let subscription = Subscription::decode(value)?;
    attrs
        .registry
        .set_subscription(&request.client, subscription.is_enabled())?;
    attrs.store.write_descriptor(CCCD_UUID, value)?;
    Ok(value.to_vec())
}

fn slice_from(value: &[u8], offset: u64) -> Result<Vec<u8>, GattError> {
    let start = usize::try_from(offset)
        .ok()
        .filter(|start| *start <= value.len())
        .ok_or(GattError::InvalidOffset {
            offset,
            len: value.len(),
        })?;
    Ok(value[start..].to_vec())
}

fn respond(
    request: &PeripheralRequest,
    offset: u64,
    result: Result<Vec<u8>, GattError>,
) -> GattResponse {
    let (status, value) = match result {
        Ok(value) => (RequestResponse::Success, value),
        Err(err) => (RequestResponse::from(&err), Vec::new()),
    };
    GattResponse {
        peer: request.client.clone(),
        request_id: request.request_id,
        status,
        offset,
        value,
    }
}
