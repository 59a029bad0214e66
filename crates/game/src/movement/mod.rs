pub mod collision;

pub use collision::{move_with_sliding, CollisionMask};

use glam::Vec2;

use crate::net::PlayerClass;

/// Per-class base move speed (§3 Player-specific attributes; §4.4). Content balance
/// numbers are nominally external data (§1), but a server with no character table
/// loaded still needs sane defaults to move at all, so these are the floor values.
pub fn base_move_speed(class: PlayerClass) -> f32 {
    match class {
        PlayerClass::Bladedancer => 6.0,
        PlayerClass::Guardian => 5.0,
        PlayerClass::Hunter => 5.5,
        PlayerClass::Rogue => 6.5,
    }
}

/// Resolves a local-frame move intent (x = strafe, y = forward, both in `[-1, 1]`)
/// into a world-space velocity, applying the directional multiplier table and
/// additive level bonus from §4.4.
pub fn resolve_move_velocity(
    local_intent: Vec2,
    facing: f32,
    base_speed: f32,
    move_speed_bonus: f32,
) -> Vec2 {
    if local_intent.length_squared() < 1e-6 {
        return Vec2::ZERO;
    }

    let multiplier = directional_multiplier(local_intent);
    let speed = (base_speed + move_speed_bonus).max(0.0) * multiplier;

    let normalized = local_intent.normalize();
    let (sin_f, cos_f) = facing.sin_cos();
    // Rotate local (strafe, forward) into world space by facing.
    let world = Vec2::new(
        normalized.x * cos_f - normalized.y * sin_f,
        normalized.x * sin_f + normalized.y * cos_f,
    );

    world * speed
}

fn directional_multiplier(local_intent: Vec2) -> f32 {
    const FORWARD: f32 = 1.0;
    const STRAFE: f32 = 0.7;
    const BACKWARD: f32 = 0.5;
    const DIAGONAL: f32 = 0.85;

    let forward_component = local_intent.y;
    let strafe_component = local_intent.x;

    let moving_forward = forward_component > 0.1;
    let moving_backward = forward_component < -0.1;
    let moving_strafe = strafe_component.abs() > 0.1;

    match (moving_forward, moving_backward, moving_strafe) {
        (true, _, true) => DIAGONAL,
        (true, _, false) => FORWARD,
        (_, true, true) => DIAGONAL,
        (_, true, false) => BACKWARD,
        (_, _, true) => STRAFE,
        _ => FORWARD,
    }
}

/// Integrates one simulation tick of movement against the collision mask, honoring
/// the "ignore client position while server-controlled" rule (§3/§4.4) via the
/// caller checking `EntityFlags::IN_ABILITY` before calling this.
pub fn step_position(mask: &CollisionMask, position: Vec2, velocity: Vec2, dt: f32, radius: f32) -> Vec2 {
    move_with_sliding(mask, position, velocity * dt, radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_multiplier_is_full_speed() {
        let vel = resolve_move_velocity(Vec2::new(0.0, 1.0), 0.0, 5.0, 0.0);
        assert!((vel.length() - 5.0).abs() < 0.01);
    }

    #[test]
    fn backward_is_half_speed() {
        let vel = resolve_move_velocity(Vec2::new(0.0, -1.0), 0.0, 5.0, 0.0);
        assert!((vel.length() - 2.5).abs() < 0.01);
    }

    #[test]
    fn level_bonus_stacks_additively() {
        let vel = resolve_move_velocity(Vec2::new(0.0, 1.0), 0.0, 5.0, 2.0);
        assert!((vel.length() - 7.0).abs() < 0.01);
    }

    #[test]
    fn zero_intent_yields_zero_velocity() {
        let vel = resolve_move_velocity(Vec2::ZERO, 0.3, 5.0, 0.0);
        assert_eq!(vel, Vec2::ZERO);
    }
}
