use super::hitbox::HitboxShape;
use crate::net::PlayerClass;

#[derive(Debug, Clone, Copy)]
pub struct ProjectileSpec {
    pub speed: f32,
    pub max_range: f32,
    pub piercing: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DashSpec {
    pub duration_ms: u32,
    pub distance: f32,
}

/// One row of the `{class}_{slot}` attack table (§4.5). A real deployment loads
/// this from external content data; these are the floor defaults the core ships
/// with so a fresh server can run without one.
#[derive(Debug, Clone, Copy)]
pub struct AttackDef {
    pub windup_ms: u32,
    pub recovery_ms: u32,
    pub cooldown_ms: u32,
    pub hitbox: HitboxShape,
    pub base_damage: u16,
    pub projectile: Option<ProjectileSpec>,
    pub dash: Option<DashSpec>,
    pub invulnerable: bool,
    /// Overrides the action point; defaults to the end of windup when `None`.
    pub action_point_delay_ms: Option<u32>,
}

impl AttackDef {
    pub fn action_point_ms(&self) -> u32 {
        self.action_point_delay_ms.unwrap_or(self.windup_ms)
    }

    pub fn total_duration_ms(&self) -> u32 {
        self.windup_ms + self.recovery_ms
    }
}

pub const MAX_ATTACK_SLOTS: u8 = 2;

/// Looks up the attack definition for a player class and slot. Slot 0 is the
/// primary attack, slot 1 the secondary/ability slot.
pub fn attack_def(class: PlayerClass, slot: u8) -> AttackDef {
    match (class, slot) {
        (PlayerClass::Bladedancer, 0) => AttackDef {
            windup_ms: 150,
            recovery_ms: 200,
            cooldown_ms: 100,
            hitbox: HitboxShape::Rectangle { width: 45.0, length: 85.0 },
            base_damage: 12,
            projectile: None,
            dash: None,
            invulnerable: false,
            action_point_delay_ms: None,
        },
        (PlayerClass::Bladedancer, _) => AttackDef {
            windup_ms: 100,
            recovery_ms: 300,
            cooldown_ms: 1500,
            hitbox: HitboxShape::Rectangle { width: 60.0, length: 120.0 },
            base_damage: 20,
            projectile: None,
            dash: Some(DashSpec { duration_ms: 150, distance: 140.0 }),
            invulnerable: true,
            action_point_delay_ms: None,
        },

        (PlayerClass::Guardian, 0) => AttackDef {
            windup_ms: 250,
            recovery_ms: 350,
            cooldown_ms: 150,
            hitbox: HitboxShape::Cone { range: 90.0, angle_radians: std::f32::consts::FRAC_PI_2 },
            base_damage: 18,
            projectile: None,
            dash: None,
            invulnerable: false,
            action_point_delay_ms: None,
        },
        (PlayerClass::Guardian, _) => AttackDef {
            windup_ms: 0,
            recovery_ms: 500,
            cooldown_ms: 4000,
            hitbox: HitboxShape::Circle { radius: 120.0 },
            base_damage: 0,
            projectile: None,
            dash: None,
            invulnerable: true,
            action_point_delay_ms: Some(0),
        },

        (PlayerClass::Hunter, 0) => AttackDef {
            windup_ms: 180,
            recovery_ms: 220,
            cooldown_ms: 400,
            hitbox: HitboxShape::Projectile { width: 12.0, length: 12.0 },
            base_damage: 10,
            projectile: Some(ProjectileSpec { speed: 900.0, max_range: 1000.0, piercing: false }),
            dash: None,
            invulnerable: false,
            action_point_delay_ms: None,
        },
        (PlayerClass::Hunter, _) => AttackDef {
            windup_ms: 350,
            recovery_ms: 250,
            cooldown_ms: 3000,
            hitbox: HitboxShape::Projectile { width: 20.0, length: 20.0 },
            base_damage: 8,
            projectile: Some(ProjectileSpec { speed: 1100.0, max_range: 1400.0, piercing: true }),
            dash: None,
            invulnerable: false,
            action_point_delay_ms: None,
        },

        (PlayerClass::Rogue, 0) => AttackDef {
            windup_ms: 80,
            recovery_ms: 120,
            cooldown_ms: 80,
            hitbox: HitboxShape::Rectangle { width: 30.0, length: 60.0 },
            base_damage: 8,
            projectile: None,
            dash: None,
            invulnerable: false,
            action_point_delay_ms: None,
        },
        (PlayerClass::Rogue, _) => AttackDef {
            windup_ms: 0,
            recovery_ms: 150,
            cooldown_ms: 2500,
            hitbox: HitboxShape::Circle { radius: 20.0 },
            base_damage: 0,
            projectile: None,
            dash: Some(DashSpec { duration_ms: 120, distance: 220.0 }),
            invulnerable: true,
            action_point_delay_ms: Some(0),
        },
    }
}

/// Monster attacks share the same FSM shape (§4.6) but are keyed by monster type
/// rather than class/slot.
pub fn monster_attack_def(monster_type: u8) -> AttackDef {
    AttackDef {
        windup_ms: 300,
        recovery_ms: 400,
        cooldown_ms: 800,
        hitbox: HitboxShape::Circle { radius: 50.0 + monster_type as f32 * 5.0 },
        base_damage: 6 + monster_type as u16 * 2,
        projectile: None,
        dash: None,
        invulnerable: false,
        action_point_delay_ms: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_point_defaults_to_windup_end() {
        let def = attack_def(PlayerClass::Bladedancer, 0);
        assert_eq!(def.action_point_ms(), def.windup_ms);
    }

    #[test]
    fn instant_ability_overrides_action_point() {
        let def = attack_def(PlayerClass::Guardian, 1);
        assert_eq!(def.action_point_ms(), 0);
    }
}
