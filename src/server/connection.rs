use crate::config::SubscriptionScope;
use crate::gatt::{
    descriptor::Subscription, error::GattError, peer::PeerId,
    peripheral_event::ConnectionState,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub peer: PeerId,
    pub state: ConnectionState,
    pub subscription: Subscription,
}

/// Connected centrals keyed by peer. A `BTreeMap` keeps fan-out order
/// stable between calls.
#[derive(Debug)]
pub struct ConnectionRegistry {
    scope: SubscriptionScope,
    connections: BTreeMap<PeerId, Connection>,
    shared: Subscription,
}

impl ConnectionRegistry {
    pub fn new(scope: SubscriptionScope) -> Self {
        ConnectionRegistry {
            scope,
            connections: BTreeMap::new(),
            shared: Subscription::Disabled,
        }
    }

    pub fn scope(&self) -> SubscriptionScope {
        self.scope
    }

    pub fn on_connecting(&mut self, peer: &PeerId) {
        match self.connections.get(peer) {
            Some(connection) if connection.state == ConnectionState::Connected => {
                log::warn!("Ignoring Connecting for already connected {peer}");
            }
            Some(_) => {}
            None => {
                log::debug!("Device connecting: {peer}");
                self.connections.insert(
                    peer.clone(),
                    Connection {
                        peer: peer.clone(),
                        state: ConnectionState::Connecting,
                        subscription: Subscription::Disabled,
                    },
                );
            }
        }
    }

    pub fn on_connect(&mut self, peer: &PeerId) {
        log::info!("Device connected: {peer}");
        self.connections
            .entry(peer.clone())
            .and_modify(|connection| connection.state = ConnectionState::Connected)
            .or_insert_with(|| Connection {
                peer: peer.clone(),
                state: ConnectionState::Connected,
                subscription: Subscription::Disabled,
            });
    }

    /// Removing an unknown peer is a no-op.
    pub fn on_disconnect(&mut self, peer: &PeerId) -> Option<Connection> {
        let removed = self.connections.remove(peer);
        if removed.is_some() {
            log::info!("Device disconnected: {peer}");
        }
        removed
    }

    pub fn set_subscription(&mut self, peer: &PeerId, enabled: bool) -> Result<(), GattError> {
        let connection = self
            .connections
            .get_mut(peer)
            .ok_or_else(|| GattError::UnknownConnection(peer.clone()))?;
        let subscription = Subscription::from(enabled);
        match self.scope {
            SubscriptionScope::PerConnection => connection.subscription = subscription,
            SubscriptionScope::Shared => self.shared = subscription,
        }
        log::debug!("Subscription of {peer} set to {subscription:?} ({:?})", self.scope);
        Ok(())
    }

    pub fn subscription(&self, peer: &PeerId) -> Option<Subscription> {
        let connection = self.connections.get(peer)?;
        Some(match self.scope {
            SubscriptionScope::PerConnection => connection.subscription,
            SubscriptionScope::Shared => self.shared,
        })
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.connections.contains_key(peer)
    }

    pub fn connected(&self) -> Vec<PeerId> {
        self.connections
            .values()
            .filter(|c| c.state == ConnectionState::Connected)
            .map(|c| c.peer.clone())
            .collect()
    }

    /// Peers that are connected and have notifications enabled.
    pub fn subscribers(&self) -> Vec<PeerId> {
        self.connections
            .values()
            .filter(|c| c.state == ConnectionState::Connected)
            .filter(|c| match self.scope {
                SubscriptionScope::PerConnection => c.subscription.is_enabled(),
                SubscriptionScope::Shared => self.shared.is_enabled(),
            })
            .map(|c| c.peer.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
