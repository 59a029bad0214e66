//! Lag compensation (§4.7): rewinds hit testing to the attacker's perceived past
//! so that "I was aiming at them" client-side lines up with server authority.

use std::collections::HashMap;

use glam::Vec2;

use crate::net::WorldSnapshot;
use crate::snapshot::SnapshotBuffer;

/// Maximum rewind depth (§4.7, §6 tunables).
pub const MAX_REWIND_TIME_MS: u64 = 250;

/// Bounds for accepted latency samples (§4.7): outside this range the sample is
/// discarded as implausible rather than corrupting the smoothed estimate.
const MIN_PLAUSIBLE_LATENCY_MS: f64 = 0.0;
const MAX_PLAUSIBLE_LATENCY_MS: f64 = 2000.0;

/// EWMA smoothing factor for the per-player latency estimate.
const LATENCY_SMOOTHING_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Copy)]
struct LatencyEstimate {
    smoothed_ms: f64,
}

impl Default for LatencyEstimate {
    fn default() -> Self {
        Self { smoothed_ms: 50.0 }
    }
}

/// Tracks a smoothed one-way latency estimate per connected player.
#[derive(Debug, Default)]
pub struct LatencyTracker {
    estimates: HashMap<u32, LatencyEstimate>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a new round-trip sample into the player's smoothed estimate. Samples
    /// outside the plausible range are dropped rather than polluting the average.
    pub fn record_rtt_sample(&mut self, player_id: u32, rtt_ms: f64) {
        let one_way_ms = rtt_ms / 2.0;
        if !(MIN_PLAUSIBLE_LATENCY_MS..=MAX_PLAUSIBLE_LATENCY_MS).contains(&one_way_ms) {
            return;
        }

        let entry = self.estimates.entry(player_id).or_default();
        entry.smoothed_ms =
            entry.smoothed_ms + LATENCY_SMOOTHING_ALPHA * (one_way_ms - entry.smoothed_ms);
    }

    pub fn latency_ms(&self, player_id: u32) -> f64 {
        self.estimates.get(&player_id).map_or(50.0, |e| e.smoothed_ms)
    }

    pub fn clear(&mut self, player_id: u32) {
        self.estimates.remove(&player_id);
    }

    /// Computes the effective server time to rewind hit testing to for `player_id`
    /// (§4.7): `t_srv - latency`, clamped to at most [`MAX_REWIND_TIME_MS`] back.
    pub fn effective_time_ms(&self, player_id: u32, server_time_ms: u64) -> u64 {
        let latency = self.latency_ms(player_id).round() as u64;
        let rewind = latency.min(MAX_REWIND_TIME_MS);
        server_time_ms.saturating_sub(rewind)
    }
}

/// Looks up an entity's historical position closest to `effective_time_ms`,
/// interpolating between the two bracketing snapshots in the history ring buffer.
/// Returns `None` if the entity has no recorded history spanning that time (it
/// likely didn't exist yet, or history has rolled past it).
pub fn rewound_position(
    history: &SnapshotBuffer,
    current_tick: u32,
    ticks_per_second: u32,
    server_time_ms: u64,
    effective_time_ms: u64,
    entity_id: u32,
) -> Option<Vec2> {
    let ms_behind = server_time_ms.saturating_sub(effective_time_ms);
    let ticks_behind = (ms_behind * ticks_per_second as u64 / 1000) as u32;
    let target_tick = current_tick.saturating_sub(ticks_behind);

    let lower = find_position(history, target_tick, entity_id);
    let upper = find_position(history, target_tick.saturating_add(1), entity_id);

    match (lower, upper) {
        (Some(a), Some(b)) => Some(a.lerp(b, 0.5)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn find_position(history: &SnapshotBuffer, tick: u32, entity_id: u32) -> Option<Vec2> {
    find_entity_in_snapshot(history.get(tick)?, entity_id)
}

fn find_entity_in_snapshot(snapshot: &WorldSnapshot, entity_id: u32) -> Option<Vec2> {
    snapshot
        .entities
        .iter()
        .find(|e| e.entity_id == entity_id)
        .map(|e| Vec2::new(e.position[0], e.position[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::EntityState;

    fn snapshot_with(tick: u32, entity_id: u32, position: [f32; 2]) -> WorldSnapshot {
        let mut snapshot = WorldSnapshot::new(tick, tick as u64 * 16);
        snapshot.entities.push(EntityState {
            entity_id,
            position,
            ..Default::default()
        });
        snapshot
    }

    #[test]
    fn latency_tracker_discards_implausible_samples() {
        let mut tracker = LatencyTracker::new();
        tracker.record_rtt_sample(1, 60.0);
        let before = tracker.latency_ms(1);
        tracker.record_rtt_sample(1, 50_000.0);
        assert_eq!(tracker.latency_ms(1), before);
    }

    #[test]
    fn effective_time_clamped_to_max_rewind() {
        let mut tracker = LatencyTracker::new();
        for _ in 0..50 {
            tracker.record_rtt_sample(1, 5000.0);
        }
        let effective = tracker.effective_time_ms(1, 100_000);
        assert!(100_000 - effective <= MAX_REWIND_TIME_MS);
    }

    #[test]
    fn rewound_position_finds_historical_tick() {
        let mut history = SnapshotBuffer::new(64);
        history.push(snapshot_with(10, 7, [1.0, 1.0]));
        history.push(snapshot_with(11, 7, [2.0, 1.0]));

        let pos = rewound_position(&history, 11, 60, 11 * 16, 10 * 16, 7);
        assert!(pos.is_some());
    }
}
