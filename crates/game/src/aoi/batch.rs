//! Per-socket event routing and message batching (§4.9). One-shot [`GameEvent`]s
//! bypass AOI distance filtering for the parties directly involved (you always
//! hear about your own death); everyone else only gets them in range. Whatever
//! survives is merged and flushed as either a single envelope or a `Batch`.

use std::collections::HashMap;

use glam::Vec2;

use crate::event::GameEvent;
use crate::net::{EntityState, ServerEnvelope, WorldSnapshot};

use super::filter::PLAYER_VIEW_DISTANCE;

fn event_involves(event: &GameEvent, viewer_entity_id: u32) -> bool {
    match *event {
        GameEvent::EntitySpawned { entity_id, .. }
        | GameEvent::EntityDespawned { entity_id }
        | GameEvent::EntityDied { entity_id, .. } => entity_id == viewer_entity_id,
        GameEvent::AttackStarted { attacker_id, .. } => attacker_id == viewer_entity_id,
        GameEvent::DamageDealt { attacker_id, target_id, .. } => {
            attacker_id == viewer_entity_id || target_id == viewer_entity_id
        }
        GameEvent::PlayerRespawned { player_id, .. }
        | GameEvent::PlayerLeveledUp { player_id, .. }
        | GameEvent::PlayerKicked { player_id, .. } => player_id == viewer_entity_id,
    }
}

/// The entity whose position governs whether a bystander (not directly involved)
/// sees this event at all.
fn event_subject_id(event: &GameEvent) -> Option<u32> {
    match *event {
        GameEvent::EntitySpawned { entity_id, .. }
        | GameEvent::EntityDespawned { entity_id }
        | GameEvent::EntityDied { entity_id, .. } => Some(entity_id),
        GameEvent::AttackStarted { attacker_id, .. } => Some(attacker_id),
        GameEvent::DamageDealt { target_id, .. } => Some(target_id),
        GameEvent::PlayerRespawned { player_id, .. }
        | GameEvent::PlayerLeveledUp { player_id, .. }
        | GameEvent::PlayerKicked { player_id, .. } => Some(player_id),
    }
}

fn find_position(snapshot: &WorldSnapshot, entity_id: u32) -> Option<Vec2> {
    snapshot
        .entities
        .iter()
        .find(|e: &&EntityState| e.entity_id == entity_id)
        .map(|e| Vec2::from(e.position))
}

/// Whether `viewer_entity_id` at `viewer_position` should receive `event` this
/// tick, given `snapshot` (the unfiltered global snapshot, for position lookups).
pub fn event_is_visible(
    event: &GameEvent,
    viewer_entity_id: u32,
    viewer_position: Vec2,
    snapshot: &WorldSnapshot,
) -> bool {
    if event_involves(event, viewer_entity_id) {
        return true;
    }

    match event_subject_id(event).and_then(|id| find_position(snapshot, id)) {
        Some(subject_position) => {
            subject_position.distance(viewer_position) <= PLAYER_VIEW_DISTANCE
        }
        // Subject already left the snapshot (e.g. despawned) and the viewer isn't
        // involved: nothing to show them.
        None => false,
    }
}

pub fn to_envelope(event: &GameEvent) -> ServerEnvelope {
    match *event {
        GameEvent::EntitySpawned { entity_id, entity_kind } => {
            ServerEnvelope::EntitySpawn { entity_id, entity_kind }
        }
        GameEvent::EntityDespawned { entity_id } => ServerEnvelope::EntityDespawn { entity_id },
        GameEvent::AttackStarted { attacker_id, slot, .. } => {
            ServerEnvelope::AttackEvent { attacker_id, slot }
        }
        GameEvent::DamageDealt { attacker_id, target_id, damage } => {
            ServerEnvelope::DamageEvent { attacker_id, target_id, damage }
        }
        GameEvent::EntityDied { entity_id, killer_id } => {
            ServerEnvelope::DeathEvent { entity_id, killer_id }
        }
        GameEvent::PlayerRespawned { player_id, position } => {
            ServerEnvelope::RespawnEvent { player_id, position }
        }
        GameEvent::PlayerLeveledUp { player_id, new_level } => {
            ServerEnvelope::LevelUpEvent { player_id, new_level }
        }
        GameEvent::PlayerKicked { ref reason, .. } => ServerEnvelope::Kicked {
            reason: reason.clone(),
        },
    }
}

/// Collapses repeated updates about the same entity within one flush window to
/// the latest occurrence (§4.9 "last write wins"), rather than sending several
/// superseded copies.
fn merge_duplicates(messages: Vec<ServerEnvelope>) -> Vec<ServerEnvelope> {
    let mut slot_of_entity: HashMap<u32, usize> = HashMap::new();
    let mut result: Vec<Option<ServerEnvelope>> = Vec::with_capacity(messages.len());

    for message in messages {
        if let ServerEnvelope::EntityUpdate { entity_id } = &message {
            if let Some(&slot) = slot_of_entity.get(entity_id) {
                result[slot] = Some(message);
                continue;
            }
            slot_of_entity.insert(*entity_id, result.len());
        }
        result.push(Some(message));
    }

    result.into_iter().flatten().collect()
}

/// Produces the envelope to actually send for this flush: `None` if there was
/// nothing to say, the lone message if there was exactly one, or a `Batch` if
/// several messages landed in the same network tick (§4.9/§6).
pub fn flush(messages: Vec<ServerEnvelope>, server_time_ms: u64) -> Option<ServerEnvelope> {
    let mut messages = merge_duplicates(messages);
    match messages.len() {
        0 => None,
        1 => messages.pop(),
        _ => Some(ServerEnvelope::Batch { messages, server_time_ms }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn involved_party_bypasses_distance() {
        let snapshot = WorldSnapshot::new(0, 0);
        let event = GameEvent::EntityDied { entity_id: 5, killer_id: None };
        assert!(event_is_visible(&event, 5, Vec2::new(100_000.0, 0.0), &snapshot));
    }

    #[test]
    fn bystander_out_of_range_filtered() {
        let mut snapshot = WorldSnapshot::new(0, 0);
        snapshot.entities.push(EntityState {
            entity_id: 9,
            position: [0.0, 0.0],
            ..Default::default()
        });
        let event = GameEvent::EntityDied { entity_id: 9, killer_id: None };
        assert!(!event_is_visible(&event, 1, Vec2::new(10_000.0, 0.0), &snapshot));
    }

    #[test]
    fn single_message_sent_unwrapped() {
        let out = flush(vec![ServerEnvelope::Pong { timestamp_ms: 1 }], 0);
        assert!(matches!(out, Some(ServerEnvelope::Pong { .. })));
    }

    #[test]
    fn multiple_messages_wrapped_in_batch() {
        let out = flush(
            vec![
                ServerEnvelope::Pong { timestamp_ms: 1 },
                ServerEnvelope::EntityDespawn { entity_id: 2 },
            ],
            0,
        );
        assert!(matches!(out, Some(ServerEnvelope::Batch { .. })));
    }

    #[test]
    fn duplicate_entity_updates_collapse_to_latest() {
        let messages = vec![
            ServerEnvelope::EntityUpdate { entity_id: 1 },
            ServerEnvelope::Pong { timestamp_ms: 2 },
            ServerEnvelope::EntityUpdate { entity_id: 1 },
        ];
        let merged = merge_duplicates(messages);
        assert_eq!(merged.len(), 2);
    }
}
