//! Correctness-first message envelopes (§4.11, §6). These carry the typed
//! client<->server kinds that aren't on the high-frequency hot path (that path uses
//! the binary `rkyv` frames in [`super::protocol`]); here JSON favors debuggability
//! and easy versioning over raw throughput.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::protocol::PROTOCOL_VERSION;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ClientEnvelope {
    Join {
        protocol_version: u32,
        name: String,
        /// Token from a prior `ConnectionAccepted`, presented to resume a session
        /// still inside its reconnect window (§4.2) instead of starting fresh.
        reconnect_token: Option<u64>,
    },
    Leave,
    SetClass {
        class: u8,
    },
    Attack {
        slot: u8,
        aim_x: f32,
        aim_y: f32,
    },
    ExecuteAbility {
        ability: u8,
    },
    Respawn,
    Ping {
        timestamp_ms: u64,
    },
    CollisionMask {
        width: u32,
        height: u32,
        tile_size: f32,
        /// Row-major packed bits, one bit per tile (1 = blocked).
        mask: Vec<u8>,
    },
    CreateProjectile {
        direction_x: f32,
        direction_y: f32,
        spec_id: u8,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ServerEnvelope {
    ConnectionAccepted {
        client_id: u32,
        entity_id: u32,
        reconnect_token: u64,
    },
    ConnectionRejected {
        reason: String,
    },
    Init {
        entity_id: u32,
        world_width: u32,
        world_height: u32,
        world_seed: u64,
        player_roster: Vec<u32>,
        monster_roster: Vec<u32>,
        protocol_version: u32,
    },
    GameState {
        tick: u32,
    },
    EntitySpawn {
        entity_id: u32,
        entity_kind: u8,
    },
    EntityDespawn {
        entity_id: u32,
    },
    EntityUpdate {
        entity_id: u32,
    },
    AttackEvent {
        attacker_id: u32,
        slot: u8,
    },
    DamageEvent {
        attacker_id: u32,
        target_id: u32,
        damage: u16,
    },
    DeathEvent {
        entity_id: u32,
        killer_id: Option<u32>,
    },
    RespawnEvent {
        player_id: u32,
        position: [f32; 2],
    },
    LevelUpEvent {
        player_id: u32,
        new_level: u8,
    },
    Batch {
        messages: Vec<ServerEnvelope>,
        server_time_ms: u64,
    },
    Error {
        message: String,
    },
    Disconnect,
    Kicked {
        reason: String,
    },
    Pong {
        timestamp_ms: u64,
    },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("protocol version mismatch: client={client}, server={server}")]
    VersionMismatch { client: u32, server: u32 },
    #[error("malformed json envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn encode_server_envelope(envelope: &ServerEnvelope) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(envelope)?)
}

pub fn decode_client_envelope(data: &[u8]) -> Result<ClientEnvelope, CodecError> {
    let envelope: ClientEnvelope = serde_json::from_slice(data)?;
    if let ClientEnvelope::Join { protocol_version, .. } = &envelope {
        if *protocol_version != PROTOCOL_VERSION {
            return Err(CodecError::VersionMismatch {
                client: *protocol_version,
                server: PROTOCOL_VERSION,
            });
        }
    }
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_roundtrip() {
        let envelope = ClientEnvelope::Join {
            protocol_version: PROTOCOL_VERSION,
            name: "wanderer".to_string(),
            reconnect_token: None,
        };
        let encoded = serde_json::to_vec(&envelope).unwrap();
        let decoded = decode_client_envelope(&encoded).unwrap();
        matches!(decoded, ClientEnvelope::Join { .. });
    }

    #[test]
    fn version_mismatch_rejected() {
        let envelope = ClientEnvelope::Join {
            protocol_version: PROTOCOL_VERSION + 1,
            name: "wanderer".to_string(),
            reconnect_token: None,
        };
        let encoded = serde_json::to_vec(&envelope).unwrap();
        assert!(matches!(
            decode_client_envelope(&encoded),
            Err(CodecError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn batch_envelope_nests() {
        let batch = ServerEnvelope::Batch {
            messages: vec![ServerEnvelope::Pong { timestamp_ms: 5 }],
            server_time_ms: 100,
        };
        let bytes = encode_server_envelope(&batch).unwrap();
        assert!(!bytes.is_empty());
    }
}
