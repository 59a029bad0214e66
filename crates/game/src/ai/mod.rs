//! Monster AI (§4.6): a small FSM per monster entity — `Dormant -> Idle -> Chasing
//! -> Attacking`, with `Stunned`/`Dying` as interrupts. Reuses [`crate::combat`] for
//! the attack itself and [`crate::movement`] for collision-aware stepping, so a
//! monster's attack and a player's attack share one resolution path.

pub mod pathfind;

use glam::Vec2;

use crate::combat::{AttackFsm, AttackOutcome, monster_attack_def};
use crate::movement::CollisionMask;
use crate::snapshot::{Entity, EntityFlags, MonsterAiState};

/// A monster gives up the chase and returns home once the target is farther than
/// this multiple of its aggro range (§4.6 "leash").
const LEASH_RANGE_MULTIPLIER: f32 = 3.0;
/// `chasing -> idle` once the target itself (not the monster's home) drifts past
/// this multiple of aggro range (§4.6).
const CHASE_DISENGAGE_AGGRO_MULTIPLIER: f32 = 1.5;
/// Once in `Attacking`, the monster stays engaged until the target drifts this
/// much farther than its attack range before falling back to `Chasing`.
const DISENGAGE_RANGE_MULTIPLIER: f32 = 1.2;
/// How long a stun lasts by default, in ticks (0.5s at 60Hz).
pub const DEFAULT_STUN_TICKS: u32 = 30;
/// How long a dead monster lingers in `Dying` before despawn, letting its death
/// animation play out client-side (§4.6).
pub const DEATH_LINGER_TICKS: u32 = 60;

pub fn monster_move_speed(monster_type: u8) -> f32 {
    3.0 + monster_type as f32 * 0.3
}

/// What the simulation tick should do in response to this monster's AI step.
#[derive(Debug, Clone, Copy, Default)]
pub struct AiStepResult {
    pub velocity: Vec2,
    /// Set the tick the attack reaches its action point — the caller resolves the
    /// hitbox test and damage, mirroring how player attacks are resolved.
    pub action_point: bool,
    pub should_despawn: bool,
}

/// Puts a monster into `Stunned` for `duration_ticks`, interrupting whatever it
/// was doing. Called by the simulation tick in response to a hit (§4.6).
pub fn stun(monster: &mut Entity, current_tick: u32, duration_ticks: u32) {
    let Some(attrs) = monster.as_monster_mut() else {
        return;
    };
    attrs.ai_state = MonsterAiState::Stunned;
    attrs.stunned_until_tick = current_tick + duration_ticks;
    monster.flags.insert(EntityFlags::STUNNED);
}

/// Transitions a monster into `Dying` once its hp has reached zero. The monster
/// stays in the world (and keeps broadcasting) for [`DEATH_LINGER_TICKS`] so
/// clients can play a death animation before it's removed.
pub fn enter_dying(monster: &mut Entity, current_tick: u32) {
    let Some(attrs) = monster.as_monster_mut() else {
        return;
    };
    attrs.ai_state = MonsterAiState::Dying;
    attrs.death_at_tick = current_tick + DEATH_LINGER_TICKS;
    attrs.target_id = None;
}

/// Advances one monster's AI by one tick. `target` is the nearest living player
/// candidate, already filtered by the caller (AOI/visibility is not this module's
/// concern); `None` means no player is currently a valid target.
pub fn step(
    monster: &mut Entity,
    attack_fsm: &mut AttackFsm,
    target: Option<(u32, Vec2)>,
    mask: &CollisionMask,
    current_tick: u32,
) -> AiStepResult {
    if monster.is_dead() && !matches!(
        monster.as_monster().map(|m| m.ai_state),
        Some(MonsterAiState::Dying)
    ) {
        enter_dying(monster, current_tick);
    }

    let position = monster.position;
    let Some(attrs) = monster.as_monster_mut() else {
        return AiStepResult::default();
    };

    match attrs.ai_state {
        MonsterAiState::Dormant => {
            if let Some((_, target_pos)) = target {
                if position.distance(target_pos) <= attrs.aggro_range * 2.0 {
                    attrs.ai_state = MonsterAiState::Idle;
                }
            }
            AiStepResult::default()
        }

        MonsterAiState::Idle => {
            if let Some((target_id, target_pos)) = target {
                if position.distance(target_pos) <= attrs.aggro_range {
                    attrs.ai_state = MonsterAiState::Chasing;
                    attrs.target_id = Some(target_id);
                }
            }
            AiStepResult::default()
        }

        MonsterAiState::Chasing => {
            let Some((target_id, target_pos)) = target.filter(|(id, _)| Some(*id) == attrs.target_id || attrs.target_id.is_none()) else {
                attrs.ai_state = MonsterAiState::Idle;
                attrs.target_id = None;
                return AiStepResult::default();
            };
            attrs.target_id = Some(target_id);

            if position.distance(target_pos) > attrs.aggro_range * CHASE_DISENGAGE_AGGRO_MULTIPLIER
            {
                attrs.ai_state = MonsterAiState::Idle;
                attrs.target_id = None;
                return AiStepResult::default();
            }

            if position.distance(attrs.home_position) > attrs.aggro_range * LEASH_RANGE_MULTIPLIER
            {
                attrs.ai_state = MonsterAiState::Idle;
                attrs.target_id = None;
                return AiStepResult::default();
            }

            if position.distance(target_pos) <= attrs.attack_range {
                attrs.ai_state = MonsterAiState::Attacking;
                return AiStepResult::default();
            }

            let direction = pathfind::step_towards(mask, position, target_pos);
            let speed = monster_move_speed(attrs.monster_type);
            if direction != Vec2::ZERO {
                monster.facing = direction.y.atan2(direction.x);
            }
            AiStepResult {
                velocity: direction * speed,
                ..Default::default()
            }
        }

        MonsterAiState::Attacking => {
            let Some((_, target_pos)) = target else {
                attrs.ai_state = MonsterAiState::Chasing;
                return AiStepResult::default();
            };

            if position.distance(target_pos) > attrs.attack_range * DISENGAGE_RANGE_MULTIPLIER {
                attrs.ai_state = MonsterAiState::Chasing;
                return AiStepResult::default();
            }

            let def = monster_attack_def(attrs.monster_type);
            if attack_fsm.active_slot().is_none() {
                attack_fsm.start(0, &def, current_tick);
            }
            let outcome = attack_fsm.step(&def, current_tick);

            AiStepResult {
                action_point: matches!(outcome, AttackOutcome::ActionPoint),
                ..Default::default()
            }
        }

        MonsterAiState::Stunned => {
            if current_tick >= attrs.stunned_until_tick {
                monster.flags.remove(EntityFlags::STUNNED);
                attrs.ai_state = if attrs.target_id.is_some() {
                    MonsterAiState::Chasing
                } else {
                    MonsterAiState::Idle
                };
            }
            AiStepResult::default()
        }

        MonsterAiState::Dying => AiStepResult {
            should_despawn: current_tick >= attrs.death_at_tick,
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Entity;

    fn monster_at(pos: Vec2) -> Entity {
        let mut m = Entity::monster(1, pos, 0, 30);
        if let Some(attrs) = m.as_monster_mut() {
            attrs.ai_state = MonsterAiState::Idle;
        }
        m
    }

    #[test]
    fn wakes_and_chases_within_aggro_range() {
        let mask = CollisionMask::empty(100, 100, 10.0);
        let mut monster = monster_at(Vec2::new(500.0, 500.0));
        let mut fsm = AttackFsm::default();

        let target = Some((7, Vec2::new(550.0, 500.0)));
        let result = step(&mut monster, &mut fsm, target, &mask, 0);

        assert_eq!(monster.as_monster().unwrap().ai_state, MonsterAiState::Chasing);
        assert!(result.velocity.length() > 0.0);
    }

    #[test]
    fn enters_attacking_within_attack_range() {
        let mask = CollisionMask::empty(100, 100, 10.0);
        let mut monster = monster_at(Vec2::new(500.0, 500.0));
        if let Some(attrs) = monster.as_monster_mut() {
            attrs.ai_state = MonsterAiState::Chasing;
            attrs.target_id = Some(7);
        }
        let mut fsm = AttackFsm::default();

        let target = Some((7, Vec2::new(520.0, 500.0)));
        step(&mut monster, &mut fsm, target, &mask, 0);

        assert_eq!(monster.as_monster().unwrap().ai_state, MonsterAiState::Attacking);
    }

    #[test]
    fn gives_up_chase_when_target_exits_disengage_range() {
        let mask = CollisionMask::empty(200, 200, 10.0);
        let mut monster = monster_at(Vec2::new(0.0, 0.0));
        if let Some(attrs) = monster.as_monster_mut() {
            attrs.ai_state = MonsterAiState::Chasing;
            attrs.target_id = Some(7);
            attrs.home_position = Vec2::new(0.0, 0.0);
        }
        let mut fsm = AttackFsm::default();

        // aggro_range is 300 for monster_type 0; 1.5x that is 450, well short of
        // the 3x home leash (900), so this exercises the target-distance check
        // on its own rather than the leash.
        let drifted_target = Some((7, Vec2::new(460.0, 0.0)));
        step(&mut monster, &mut fsm, drifted_target, &mask, 0);

        assert_eq!(monster.as_monster().unwrap().ai_state, MonsterAiState::Idle);
    }

    #[test]
    fn gives_up_chase_beyond_leash_range() {
        let mask = CollisionMask::empty(200, 200, 10.0);
        let mut monster = monster_at(Vec2::new(0.0, 0.0));
        if let Some(attrs) = monster.as_monster_mut() {
            attrs.ai_state = MonsterAiState::Chasing;
            attrs.target_id = Some(7);
            attrs.home_position = Vec2::new(0.0, 0.0);
        }
        let mut fsm = AttackFsm::default();

        let far_target = Some((7, Vec2::new(2000.0, 0.0)));
        step(&mut monster, &mut fsm, far_target, &mask, 0);

        assert_eq!(monster.as_monster().unwrap().ai_state, MonsterAiState::Idle);
    }

    #[test]
    fn stun_interrupts_and_recovers() {
        let mask = CollisionMask::empty(10, 10, 10.0);
        let mut monster = monster_at(Vec2::ZERO);
        if let Some(attrs) = monster.as_monster_mut() {
            attrs.ai_state = MonsterAiState::Chasing;
            attrs.target_id = Some(7);
        }
        stun(&mut monster, 0, 10);
        assert_eq!(monster.as_monster().unwrap().ai_state, MonsterAiState::Stunned);
        assert!(monster.flags.contains(EntityFlags::STUNNED));

        let mut fsm = AttackFsm::default();
        step(&mut monster, &mut fsm, None, &mask, 5);
        assert_eq!(monster.as_monster().unwrap().ai_state, MonsterAiState::Stunned);

        step(&mut monster, &mut fsm, None, &mask, 11);
        assert_eq!(monster.as_monster().unwrap().ai_state, MonsterAiState::Chasing);
        assert!(!monster.flags.contains(EntityFlags::STUNNED));
    }

    #[test]
    fn death_lingers_then_despawns() {
        let mask = CollisionMask::empty(10, 10, 10.0);
        let mut monster = monster_at(Vec2::ZERO);
        monster.apply_damage(monster.hp);
        let mut fsm = AttackFsm::default();

        let result = step(&mut monster, &mut fsm, None, &mask, 0);
        assert!(!result.should_despawn);
        assert_eq!(monster.as_monster().unwrap().ai_state, MonsterAiState::Dying);

        let result = step(&mut monster, &mut fsm, None, &mask, DEATH_LINGER_TICKS + 1);
        assert!(result.should_despawn);
    }
}
