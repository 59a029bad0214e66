//! Session-scoped violation counters and kick policy (§4.10).

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    ExcessiveRate,
    ImpossibleMovement,
    InvalidSequence,
    MalformedFrame,
    OutOfRangeTarget,
    ImplausibleDamage,
}

#[derive(Debug, Clone, Default)]
struct PlayerViolations {
    count: u32,
    last_kind: Option<ViolationKind>,
}

#[derive(Debug)]
pub struct AntiCheat {
    threshold: u32,
    players: HashMap<u32, PlayerViolations>,
}

impl Default for AntiCheat {
    fn default() -> Self {
        Self::new(20)
    }
}

impl AntiCheat {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            players: HashMap::new(),
        }
    }

    /// Records a violation for `player_id`; returns `true` if the player crossed the
    /// kick threshold on this call.
    pub fn record(&mut self, player_id: u32, kind: ViolationKind) -> bool {
        let entry = self.players.entry(player_id).or_default();
        entry.count += 1;
        entry.last_kind = Some(kind);
        entry.count >= self.threshold
    }

    pub fn violation_count(&self, player_id: u32) -> u32 {
        self.players.get(&player_id).map_or(0, |v| v.count)
    }

    pub fn last_violation(&self, player_id: u32) -> Option<ViolationKind> {
        self.players.get(&player_id).and_then(|v| v.last_kind)
    }

    /// Clears anti-cheat state for a player; called on disconnect (§4.10).
    pub fn clear(&mut self, player_id: u32) {
        self.players.remove(&player_id);
    }

    /// Validates that a reported speed is plausible for the player's class
    /// (`speed > class_max * 1.1` is flagged, §4.10).
    pub fn check_movement_speed(&mut self, player_id: u32, observed_speed: f32, class_max: f32) -> bool {
        if observed_speed > class_max * 1.1 {
            self.record(player_id, ViolationKind::ImpossibleMovement);
            false
        } else {
            true
        }
    }

    /// Validates a client-reported damage number against the server's own computed
    /// value's plausible bounds (§7 E5): never trust it outright, but flag wild values.
    pub fn check_damage_plausible(&mut self, player_id: u32, claimed: u32, server_computed: u32) -> bool {
        let plausible = claimed <= server_computed.saturating_mul(2).max(1);
        if !plausible {
            self.record(player_id, ViolationKind::ImplausibleDamage);
        }
        plausible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_triggers_kick() {
        let mut ac = AntiCheat::new(3);
        assert!(!ac.record(1, ViolationKind::InvalidSequence));
        assert!(!ac.record(1, ViolationKind::InvalidSequence));
        assert!(ac.record(1, ViolationKind::InvalidSequence));
        assert_eq!(ac.violation_count(1), 3);
    }

    #[test]
    fn clear_resets_player() {
        let mut ac = AntiCheat::new(3);
        ac.record(1, ViolationKind::MalformedFrame);
        ac.clear(1);
        assert_eq!(ac.violation_count(1), 0);
    }

    #[test]
    fn implausible_damage_flagged() {
        let mut ac = AntiCheat::new(5);
        assert!(!ac.check_damage_plausible(1, 99, 1));
        assert_eq!(ac.violation_count(1), 1);
        assert!(ac.check_damage_plausible(1, 2, 1));
    }
}
