//! Connection lifecycle registry (§4.2). Tracks every client socket's state machine,
//! heartbeat timers and reconnect window independently of the transport that moves
//! bytes (the server crate owns the actual WebSocket tasks; this module only owns
//! the bookkeeping).

use std::collections::HashMap;

use super::ratelimit::{RateLimitConfig, RateLimiter};

pub const HEARTBEAT_INTERVAL_MS: u64 = 5_000;
pub const HEARTBEAT_TIMEOUT_MS: u64 = 15_000;
/// A disconnected client's entity is kept alive for reconnection within this window.
pub const STATE_RESTORE_WINDOW_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

#[derive(Debug)]
pub struct ClientConnection {
    pub client_id: u32,
    pub state: ConnectionState,
    pub entity_id: Option<u32>,
    pub reconnect_token: u64,
    pub last_processed_input: u32,
    pub last_receive_ms: u64,
    pub last_heartbeat_sent_ms: u64,
    /// Set when the connection drops, so the registry knows when the reconnect
    /// window (§4.2) expires.
    pub disconnected_at_ms: Option<u64>,
    pub rate_limiter: RateLimiter,
}

impl ClientConnection {
    fn new(client_id: u32, reconnect_token: u64, now_ms: u64) -> Self {
        Self {
            client_id,
            state: ConnectionState::Connecting,
            entity_id: None,
            reconnect_token,
            last_processed_input: 0,
            last_receive_ms: now_ms,
            last_heartbeat_sent_ms: now_ms,
            disconnected_at_ms: None,
            rate_limiter: RateLimiter::new(RateLimitConfig::default()),
        }
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_receive_ms = now_ms;
    }

    pub fn is_heartbeat_timed_out(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_receive_ms) > HEARTBEAT_TIMEOUT_MS
    }

    pub fn needs_heartbeat(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heartbeat_sent_ms) >= HEARTBEAT_INTERVAL_MS
    }
}

/// Owns every connection by an opaque `client_id` (assigned at accept time, stable
/// for the socket's lifetime) and a `reconnect_token` (survives a drop/reconnect).
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: HashMap<u32, ClientConnection>,
    token_to_client: HashMap<u64, u32>,
    next_client_id: u32,
    next_reconnect_token: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            token_to_client: HashMap::new(),
            next_client_id: 1,
            next_reconnect_token: 1,
        }
    }

    pub fn accept(&mut self, now_ms: u64) -> u32 {
        let client_id = self.next_client_id;
        self.next_client_id += 1;
        let token = self.next_reconnect_token;
        self.next_reconnect_token += 1;

        let connection = ClientConnection::new(client_id, token, now_ms);
        self.token_to_client.insert(token, client_id);
        self.clients.insert(client_id, connection);
        client_id
    }

    /// Attempts to resume a previously disconnected session still inside its
    /// reconnect window. Returns the resumed client's id and its preserved entity.
    pub fn try_reconnect(&mut self, token: u64, now_ms: u64) -> Option<(u32, Option<u32>)> {
        let client_id = *self.token_to_client.get(&token)?;
        let connection = self.clients.get_mut(&client_id)?;

        let disconnected_at = connection.disconnected_at_ms?;
        if now_ms.saturating_sub(disconnected_at) > STATE_RESTORE_WINDOW_MS {
            return None;
        }

        connection.state = ConnectionState::Connected;
        connection.disconnected_at_ms = None;
        connection.last_receive_ms = now_ms;
        Some((client_id, connection.entity_id))
    }

    pub fn mark_connected(&mut self, client_id: u32, entity_id: u32) {
        if let Some(connection) = self.clients.get_mut(&client_id) {
            connection.state = ConnectionState::Connected;
            connection.entity_id = Some(entity_id);
        }
    }

    pub fn mark_disconnected(&mut self, client_id: u32, now_ms: u64) {
        if let Some(connection) = self.clients.get_mut(&client_id) {
            connection.state = ConnectionState::Reconnecting;
            connection.disconnected_at_ms = Some(now_ms);
        }
    }

    /// Drops sessions whose reconnect window has fully expired. Returns their
    /// entity ids so the caller can despawn them.
    pub fn reap_expired(&mut self, now_ms: u64) -> Vec<(u32, Option<u32>)> {
        let expired: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, c)| {
                c.disconnected_at_ms
                    .is_some_and(|t| now_ms.saturating_sub(t) > STATE_RESTORE_WINDOW_MS)
            })
            .map(|(&id, _)| id)
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(connection) = self.clients.remove(&id) {
                self.token_to_client.remove(&connection.reconnect_token);
                removed.push((id, connection.entity_id));
            }
        }
        removed
    }

    /// Clients past their heartbeat timeout but not yet marked disconnected.
    pub fn find_timed_out(&self, now_ms: u64) -> Vec<u32> {
        self.clients
            .iter()
            .filter(|(_, c)| {
                c.state == ConnectionState::Connected && c.is_heartbeat_timed_out(now_ms)
            })
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn get(&self, client_id: u32) -> Option<&ClientConnection> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut ClientConnection> {
        self.clients.get_mut(&client_id)
    }

    pub fn remove(&mut self, client_id: u32) -> Option<ClientConnection> {
        let connection = self.clients.remove(&client_id)?;
        self.token_to_client.remove(&connection.reconnect_token);
        Some(connection)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientConnection> {
        self.clients.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClientConnection> {
        self.clients.values_mut()
    }

    pub fn connected_count(&self) -> usize {
        self.clients
            .values()
            .filter(|c| c.state == ConnectionState::Connected)
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_then_reconnect_preserves_entity() {
        let mut registry = ConnectionRegistry::new();
        let client_id = registry.accept(0);
        registry.mark_connected(client_id, 77);
        let token = registry.get(client_id).unwrap().reconnect_token;

        registry.mark_disconnected(client_id, 1_000);
        let (resumed_id, entity_id) = registry.try_reconnect(token, 5_000).unwrap();

        assert_eq!(resumed_id, client_id);
        assert_eq!(entity_id, Some(77));
    }

    #[test]
    fn reconnect_rejected_after_window_expires() {
        let mut registry = ConnectionRegistry::new();
        let client_id = registry.accept(0);
        registry.mark_connected(client_id, 1);
        let token = registry.get(client_id).unwrap().reconnect_token;

        registry.mark_disconnected(client_id, 0);
        let beyond_window = STATE_RESTORE_WINDOW_MS + 1;
        assert!(registry.try_reconnect(token, beyond_window).is_none());
    }

    #[test]
    fn heartbeat_timeout_detected() {
        let mut registry = ConnectionRegistry::new();
        let client_id = registry.accept(0);
        registry.mark_connected(client_id, 1);

        assert!(registry
            .find_timed_out(HEARTBEAT_TIMEOUT_MS + 1)
            .contains(&client_id));
        assert!(registry.find_timed_out(HEARTBEAT_TIMEOUT_MS - 1).is_empty());
    }

    #[test]
    fn expired_sessions_are_reaped() {
        let mut registry = ConnectionRegistry::new();
        let client_id = registry.accept(0);
        registry.mark_connected(client_id, 9);
        registry.mark_disconnected(client_id, 0);

        let removed = registry.reap_expired(STATE_RESTORE_WINDOW_MS + 1);
        assert_eq!(removed, vec![(client_id, Some(9))]);
        assert!(registry.get(client_id).is_none());
    }
}
