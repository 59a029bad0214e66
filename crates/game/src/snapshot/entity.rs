use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::net::{EntityState, PlayerClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum EntityType {
    #[default]
    Player = 0,
    Monster = 1,
    Projectile = 2,
    Effect = 3,
}

impl From<u8> for EntityType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Player,
            1 => Self::Monster,
            2 => Self::Projectile,
            _ => Self::Effect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u32);

impl EntityHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntityFlags: u16 {
        const INVULNERABLE  = 1 << 0;
        const DEAD          = 1 << 1;
        const STUNNED       = 1 << 2;
        const ROLL_UNLOCKED = 1 << 3;
        const IN_ABILITY    = 1 << 4;
    }
}

/// Attack FSM phase shared by player abilities and monster attacks (§4.5/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AttackPhase {
    #[default]
    Ready = 0,
    Windup = 1,
    Active = 2,
    Recovery = 3,
}

impl From<u8> for AttackPhase {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Windup,
            2 => Self::Active,
            3 => Self::Recovery,
            _ => Self::Ready,
        }
    }
}

/// Monster AI state (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MonsterAiState {
    #[default]
    Dormant = 0,
    Idle = 1,
    Chasing = 2,
    Attacking = 3,
    Stunned = 4,
    Dying = 5,
}

impl From<u8> for MonsterAiState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Idle,
            2 => Self::Chasing,
            3 => Self::Attacking,
            4 => Self::Stunned,
            5 => Self::Dying,
            _ => Self::Dormant,
        }
    }
}

/// Per-level stat bonuses that stack additively on base values (§3 Player-specific
/// attributes). Kept numeric rather than a lookup table: the table itself (how much
/// each level grants) is content data out of core scope; the core only adds bonuses
/// already resolved onto the player record.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerAttributes {
    pub class: PlayerClass,
    pub connection_id: u32,
    pub last_processed_input: u32,
    pub xp: u32,
    pub level: u8,
    pub move_speed_bonus: f32,
    pub attack_recovery_bonus: f32,
    pub attack_cooldown_bonus: f32,
    pub damage_bonus: f32,
    pub roll_unlocked: bool,
    pub armor_hp: u16,
}

/// Monster-specific attributes (§3).
#[derive(Debug, Clone, Copy, Default)]
pub struct MonsterAttributes {
    pub monster_type: u8,
    pub ai_state: MonsterAiState,
    pub target_id: Option<u32>,
    pub home_position: Vec2,
    pub aggro_range: f32,
    pub attack_range: f32,
    /// Tick at which a `Stunned` monster recovers.
    pub stunned_until_tick: u32,
    /// Tick at which a `Dying` monster is despawned, letting the death animation
    /// play out client-side first (§4.6).
    pub death_at_tick: u32,
}

/// Projectile-specific attributes (§3).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectileAttributes {
    pub owner_id: u32,
    pub owner_kind: EntityType,
    pub direction: Vec2,
    pub speed: f32,
    pub max_range: f32,
    pub distance_travelled: f32,
    pub piercing: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub enum EntityAttributes {
    #[default]
    None,
    Player(PlayerAttributes),
    Monster(MonsterAttributes),
    Projectile(ProjectileAttributes),
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: u32,
    pub entity_type: EntityType,
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: f32,
    pub hp: u16,
    pub max_hp: u16,
    pub flags: EntityFlags,
    pub last_updated_tick: u32,
    pub current_attack_type: u8,
    pub attack_phase: AttackPhase,
    pub attributes: EntityAttributes,
    pub dirty: bool,
}

impl Entity {
    pub fn new(id: u32, entity_type: EntityType) -> Self {
        Self {
            id,
            entity_type,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            facing: 0.0,
            hp: 1,
            max_hp: 1,
            flags: EntityFlags::empty(),
            last_updated_tick: 0,
            current_attack_type: 0,
            attack_phase: AttackPhase::Ready,
            attributes: EntityAttributes::None,
            dirty: true,
        }
    }

    pub fn player(id: u32, spawn_position: Vec2, class: PlayerClass) -> Self {
        let mut entity = Self::new(id, EntityType::Player);
        entity.position = spawn_position;
        entity.hp = 100;
        entity.max_hp = 100;
        entity.attributes = EntityAttributes::Player(PlayerAttributes {
            class,
            ..Default::default()
        });
        entity
    }

    pub fn monster(id: u32, spawn_position: Vec2, monster_type: u8, hp: u16) -> Self {
        let mut entity = Self::new(id, EntityType::Monster);
        entity.position = spawn_position;
        entity.hp = hp;
        entity.max_hp = hp;
        entity.attributes = EntityAttributes::Monster(MonsterAttributes {
            monster_type,
            home_position: spawn_position,
            aggro_range: 300.0 + monster_type as f32 * 20.0,
            attack_range: 60.0 + monster_type as f32 * 5.0,
            ..Default::default()
        });
        entity
    }

    pub fn handle(&self) -> EntityHandle {
        EntityHandle(self.id)
    }

    pub fn is_dead(&self) -> bool {
        self.hp == 0 || self.flags.contains(EntityFlags::DEAD)
    }

    /// Applies server-computed damage. No-op against already dead entities (§3 invariant).
    pub fn apply_damage(&mut self, amount: u16) {
        if self.is_dead() {
            return;
        }
        self.hp = self.hp.saturating_sub(amount);
        self.dirty = true;
        if self.hp == 0 {
            self.flags.insert(EntityFlags::DEAD);
        }
    }

    pub fn as_player(&self) -> Option<&PlayerAttributes> {
        match &self.attributes {
            EntityAttributes::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerAttributes> {
        match &mut self.attributes {
            EntityAttributes::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_monster(&self) -> Option<&MonsterAttributes> {
        match &self.attributes {
            EntityAttributes::Monster(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_monster_mut(&mut self) -> Option<&mut MonsterAttributes> {
        match &mut self.attributes {
            EntityAttributes::Monster(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_projectile(&self) -> Option<&ProjectileAttributes> {
        match &self.attributes {
            EntityAttributes::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_projectile_mut(&mut self) -> Option<&mut ProjectileAttributes> {
        match &mut self.attributes {
            EntityAttributes::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn to_network_state(&self) -> EntityState {
        let mut state = EntityState::new(self.id, self.entity_type as u8);
        state.position = self.position.into();
        state.encode_velocity(self.velocity.into());
        state.encode_facing(self.facing);
        state.hp = self.hp;
        state.max_hp = self.max_hp;
        state.flags = self.flags.bits();
        state.current_attack_type = self.current_attack_type;
        state.attack_phase = self.attack_phase as u8;

        match &self.attributes {
            EntityAttributes::Player(p) => {
                state.kind_id = p.class as u8;
                state.level = p.level;
                state.armor_hp = p.armor_hp;
                state.move_speed_bonus = p.move_speed_bonus as i16;
                state.attack_recovery_bonus = p.attack_recovery_bonus as i16;
                state.attack_cooldown_bonus = p.attack_cooldown_bonus as i16;
                state.damage_bonus = p.damage_bonus as i16;
                if p.roll_unlocked {
                    state.set_flag(EntityState::FLAG_ROLL_UNLOCKED, true);
                }
            }
            EntityAttributes::Monster(m) => {
                state.kind_id = m.monster_type;
                state.ai_state = m.ai_state as u8;
            }
            EntityAttributes::Projectile(_) | EntityAttributes::None => {}
        }

        state
    }

    pub fn from_network_state(state: &EntityState) -> Self {
        let vel = state.decode_velocity();
        let mut entity = Self::new(state.entity_id, EntityType::from(state.entity_kind));
        entity.position = state.position.into();
        entity.velocity = Vec2::from(vel);
        entity.facing = state.decode_facing();
        entity.hp = state.hp;
        entity.max_hp = state.max_hp;
        entity.flags = EntityFlags::from_bits_truncate(state.flags);
        entity.current_attack_type = state.current_attack_type;
        entity.attack_phase = AttackPhase::from(state.attack_phase);
        entity.dirty = false;

        match entity.entity_type {
            EntityType::Player => {
                entity.attributes = EntityAttributes::Player(PlayerAttributes {
                    class: PlayerClass::from(state.kind_id),
                    level: state.level,
                    armor_hp: state.armor_hp,
                    move_speed_bonus: state.move_speed_bonus as f32,
                    attack_recovery_bonus: state.attack_recovery_bonus as f32,
                    attack_cooldown_bonus: state.attack_cooldown_bonus as f32,
                    damage_bonus: state.damage_bonus as f32,
                    roll_unlocked: state.has_flag(EntityState::FLAG_ROLL_UNLOCKED),
                    ..Default::default()
                });
            }
            EntityType::Monster => {
                entity.attributes = EntityAttributes::Monster(MonsterAttributes {
                    monster_type: state.kind_id,
                    ai_state: MonsterAiState::from(state.ai_state),
                    ..Default::default()
                });
            }
            _ => {}
        }

        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_roundtrip() {
        let mut entity = Entity::player(42, Vec2::new(10.0, -3.0), PlayerClass::Hunter);
        entity.velocity = Vec2::new(2.5, -1.0);
        entity.facing = 1.1;
        if let Some(p) = entity.as_player_mut() {
            p.level = 4;
            p.move_speed_bonus = 3.0;
        }

        let network_state = entity.to_network_state();
        let reconstructed = Entity::from_network_state(&network_state);

        assert_eq!(entity.id, reconstructed.id);
        assert!((entity.position - reconstructed.position).length() < 0.001);
        assert!((entity.velocity - reconstructed.velocity).length() < 0.02);
        assert_eq!(reconstructed.as_player().unwrap().level, 4);
        assert_eq!(reconstructed.as_player().unwrap().class, PlayerClass::Hunter);
    }

    #[test]
    fn damage_clamps_and_kills() {
        let mut entity = Entity::player(1, Vec2::ZERO, PlayerClass::Guardian);
        entity.hp = 5;
        entity.apply_damage(3);
        assert_eq!(entity.hp, 2);
        assert!(!entity.is_dead());
        entity.apply_damage(10);
        assert_eq!(entity.hp, 0);
        assert!(entity.is_dead());
        entity.apply_damage(10);
        assert_eq!(entity.hp, 0);
    }
}
