//! Glue between [`crate::config::ServerConfig`] and the authoritative
//! [`keepwatch::SimulationState`] the server binary drives every tick. The state
//! machines themselves (movement, combat, AI, lag-comp, delta compression) live in
//! the `keepwatch` crate; this module only wires configuration into it.

use keepwatch::{CollisionMask, SimulationState};

use crate::config::ServerConfig;

pub fn build_simulation(config: &ServerConfig) -> SimulationState {
    let mask = CollisionMask::empty(
        config.world_width_tiles,
        config.world_height_tiles,
        config.tile_size,
    );
    SimulationState::with_network_rate(
        mask,
        config.tick_rate,
        config.network_rate,
        config.history_capacity,
    )
}

/// Replaces the shared world collision mask with a client-uploaded one (§4.4,
/// `ClientEnvelope::CollisionMask`). The mask is server-global, not per-client: the
/// first upload wins, matching "configured server-side or uploaded once".
pub fn apply_collision_mask_upload(
    sim: &mut SimulationState,
    width: u32,
    height: u32,
    tile_size: f32,
    packed: &[u8],
) {
    sim.mask = CollisionMask::from_packed_bits(width, height, tile_size, packed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_mask_sized_from_config() {
        let config = ServerConfig {
            world_width_tiles: 10,
            world_height_tiles: 20,
            tile_size: 16.0,
            ..Default::default()
        };
        let sim = build_simulation(&config);
        assert_eq!(sim.mask.width(), 10);
        assert_eq!(sim.mask.height(), 20);
    }

    #[test]
    fn upload_replaces_mask() {
        let config = ServerConfig::default();
        let mut sim = build_simulation(&config);
        let packed = vec![0xFFu8; 8];
        apply_collision_mask_upload(&mut sim, 4, 4, 8.0, &packed);
        assert_eq!(sim.mask.width(), 4);
        assert!(sim.mask.is_blocked_tile(0, 0));
    }
}
