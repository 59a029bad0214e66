use rkyv::{Archive, Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilityMode {
    Unreliable,
    UnreliableExpiring { ttl_ms: u64 },
    Reliable,
}

impl ReliabilityMode {
    pub fn is_reliable(&self) -> bool {
        matches!(self, Self::Reliable)
    }

    pub fn ttl_ms(&self) -> Option<u64> {
        match self {
            Self::UnreliableExpiring { ttl_ms } => Some(*ttl_ms),
            _ => None,
        }
    }
}

/// One-shot game events (§4.9 "one-shot event bypass"). These always reach the
/// clients involved regardless of AOI distance filtering, separate from the
/// continuous per-tick entity state stream.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum GameEvent {
    EntitySpawned {
        entity_id: u32,
        entity_kind: u8,
    },
    EntityDespawned {
        entity_id: u32,
    },
    AttackStarted {
        attacker_id: u32,
        slot: u8,
        attack_type: u8,
    },
    DamageDealt {
        attacker_id: u32,
        target_id: u32,
        damage: u16,
    },
    EntityDied {
        entity_id: u32,
        killer_id: Option<u32>,
    },
    PlayerRespawned {
        player_id: u32,
        position: [f32; 2],
    },
    PlayerLeveledUp {
        player_id: u32,
        new_level: u8,
    },
    PlayerKicked {
        player_id: u32,
        reason: String,
    },
}

impl GameEvent {
    /// Determines resend behavior (§4.9, §7). Death/level-up/kick are load-bearing
    /// for client correctness and always retransmit until acked; spawn/despawn are
    /// important but short-lived; damage and attack-start are purely cosmetic once
    /// stale.
    pub fn reliability(&self) -> ReliabilityMode {
        match self {
            Self::EntityDied { .. } => ReliabilityMode::Reliable,
            Self::PlayerLeveledUp { .. } => ReliabilityMode::Reliable,
            Self::PlayerKicked { .. } => ReliabilityMode::Reliable,
            Self::PlayerRespawned { .. } => ReliabilityMode::Reliable,

            Self::EntitySpawned { .. } => ReliabilityMode::UnreliableExpiring { ttl_ms: 5_000 },
            Self::EntityDespawned { .. } => ReliabilityMode::UnreliableExpiring { ttl_ms: 5_000 },

            Self::AttackStarted { .. } => ReliabilityMode::Unreliable,
            Self::DamageDealt { .. } => ReliabilityMode::Unreliable,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::AttackStarted { .. } | Self::DamageDealt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn death_is_reliable() {
        let event = GameEvent::EntityDied {
            entity_id: 1,
            killer_id: Some(2),
        };
        assert!(event.reliability().is_reliable());
    }

    #[test]
    fn damage_is_transient_and_unreliable() {
        let event = GameEvent::DamageDealt {
            attacker_id: 1,
            target_id: 2,
            damage: 10,
        };
        assert!(event.is_transient());
        assert!(!event.reliability().is_reliable());
    }
}
