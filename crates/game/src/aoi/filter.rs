//! Per-client area-of-interest filtering (§4.9). Takes the already-built global
//! (full or delta) [`WorldSnapshot`] for this network tick and narrows it down to
//! what one viewer is actually allowed to see.

use glam::Vec2;

use crate::net::{EntityState, WorldSnapshot};
use crate::snapshot::EntityType;

pub const PLAYER_VIEW_DISTANCE: f32 = 800.0;
pub const MONSTER_SYNC_DISTANCE: f32 = 1000.0;
pub const EFFECT_SYNC_DISTANCE: f32 = 600.0;
/// Even inside sync range, only the nearest this many monsters are sent — a very
/// dense pack shouldn't blow out one client's bandwidth budget.
pub const MAX_SYNCED_MONSTERS: usize = 50;

fn view_distance_for(kind: EntityType) -> f32 {
    match kind {
        EntityType::Player => PLAYER_VIEW_DISTANCE,
        EntityType::Monster => MONSTER_SYNC_DISTANCE,
        EntityType::Effect => EFFECT_SYNC_DISTANCE,
        EntityType::Projectile => PLAYER_VIEW_DISTANCE,
    }
}

fn within_view_distance(viewer_position: Vec2, entity: &EntityState) -> bool {
    let position = Vec2::from(entity.position);
    position.distance(viewer_position) <= view_distance_for(EntityType::from(entity.entity_kind))
}

/// Narrows `snapshot` to the entities `viewer_entity_id` should receive: itself
/// unconditionally, plus anything else within its kind's sync distance, with the
/// monster count capped and sorted nearest-first.
pub fn filter_snapshot(
    viewer_entity_id: u32,
    viewer_position: Vec2,
    snapshot: &WorldSnapshot,
) -> WorldSnapshot {
    let mut filtered = snapshot.clone();
    filtered.entities = snapshot
        .entities
        .iter()
        .filter(|e| e.entity_id == viewer_entity_id || within_view_distance(viewer_position, e))
        .cloned()
        .collect();

    cap_monsters(&mut filtered.entities, viewer_position);
    filtered
}

fn cap_monsters(entities: &mut Vec<EntityState>, viewer_position: Vec2) {
    let mut monster_indices: Vec<usize> = entities
        .iter()
        .enumerate()
        .filter(|(_, e)| EntityType::from(e.entity_kind) == EntityType::Monster)
        .map(|(i, _)| i)
        .collect();

    if monster_indices.len() <= MAX_SYNCED_MONSTERS {
        return;
    }

    monster_indices.sort_by(|&a, &b| {
        let da = Vec2::from(entities[a].position).distance(viewer_position);
        let db = Vec2::from(entities[b].position).distance(viewer_position);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });

    let drop: std::collections::HashSet<usize> = monster_indices
        .into_iter()
        .skip(MAX_SYNCED_MONSTERS)
        .collect();

    let mut i = 0;
    entities.retain(|_| {
        let keep = !drop.contains(&i);
        i += 1;
        keep
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_at(id: u32, kind: u8, pos: [f32; 2]) -> EntityState {
        EntityState {
            entity_id: id,
            entity_kind: kind,
            position: pos,
            ..Default::default()
        }
    }

    #[test]
    fn self_always_included_even_when_far() {
        let mut snapshot = WorldSnapshot::new(0, 0);
        snapshot.entities.push(entity_at(1, 0, [10_000.0, 0.0]));

        let filtered = filter_snapshot(1, Vec2::ZERO, &snapshot);
        assert_eq!(filtered.entities.len(), 1);
    }

    #[test]
    fn distant_player_dropped() {
        let mut snapshot = WorldSnapshot::new(0, 0);
        snapshot.entities.push(entity_at(1, 0, [0.0, 0.0]));
        snapshot.entities.push(entity_at(2, 0, [PLAYER_VIEW_DISTANCE * 2.0, 0.0]));

        let filtered = filter_snapshot(1, Vec2::ZERO, &snapshot);
        assert_eq!(filtered.entities.len(), 1);
        assert_eq!(filtered.entities[0].entity_id, 1);
    }

    #[test]
    fn monster_count_capped_to_nearest() {
        let mut snapshot = WorldSnapshot::new(0, 0);
        snapshot.entities.push(entity_at(1, 0, [0.0, 0.0]));
        for i in 0..(MAX_SYNCED_MONSTERS + 10) {
            snapshot
                .entities
                .push(entity_at(100 + i as u32, 1, [i as f32, 0.0]));
        }

        let filtered = filter_snapshot(1, Vec2::ZERO, &snapshot);
        let monster_count = filtered
            .entities
            .iter()
            .filter(|e| EntityType::from(e.entity_kind) == EntityType::Monster)
            .count();
        assert_eq!(monster_count, MAX_SYNCED_MONSTERS);
        // nearest monster (id 100, distance 0) must survive the cap.
        assert!(filtered.entities.iter().any(|e| e.entity_id == 100));
    }
}
