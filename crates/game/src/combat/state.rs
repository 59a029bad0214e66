use std::collections::HashMap;

use crate::net::TICK_RATE;
use crate::snapshot::AttackPhase;

use super::table::AttackDef;

pub fn ms_to_ticks(ms: u32) -> u32 {
    ((ms as u64 * TICK_RATE as u64) / 1000) as u32
}

/// Per-entity attack FSM (§4.5): `READY -> WINDUP -> ACTIVE -> RECOVERY -> READY`.
/// Only one slot can be mid-attack at a time; cooldowns are tracked independently
/// per slot so a different slot can be requested the instant this one recovers.
#[derive(Debug, Default)]
pub struct AttackFsm {
    active_slot: Option<u8>,
    phase: AttackPhase,
    phase_start_tick: u32,
    action_point_tick: Option<u32>,
    action_point_fired: bool,
    cooldown_ready_tick: HashMap<u8, u32>,
}

/// Returned by [`AttackFsm::start`] / [`AttackFsm::step`] so the caller can react
/// without reaching back into FSM internals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackOutcome {
    Started,
    Rejected,
    ActionPoint,
    Recovered,
    None,
}

impl AttackFsm {
    pub fn phase(&self) -> AttackPhase {
        self.phase
    }

    pub fn active_slot(&self) -> Option<u8> {
        self.active_slot
    }

    fn is_off_cooldown(&self, slot: u8, current_tick: u32) -> bool {
        self.cooldown_ready_tick
            .get(&slot)
            .is_none_or(|&ready| current_tick >= ready)
    }

    /// Attempts to begin an attack in `slot`. Rejected if another attack is mid
    /// windup/active, or this slot is on cooldown (§4.5 "second attack intent is
    /// dropped").
    pub fn start(&mut self, slot: u8, def: &AttackDef, current_tick: u32) -> AttackOutcome {
        if matches!(self.phase, AttackPhase::Windup | AttackPhase::Active) {
            return AttackOutcome::Rejected;
        }
        if !self.is_off_cooldown(slot, current_tick) {
            return AttackOutcome::Rejected;
        }

        self.active_slot = Some(slot);
        self.phase = AttackPhase::Windup;
        self.phase_start_tick = current_tick;
        self.action_point_tick = Some(current_tick + ms_to_ticks(def.action_point_ms()));
        self.action_point_fired = false;
        AttackOutcome::Started
    }

    /// Advances the FSM by one tick; returns the most significant event that
    /// occurred, if any. `def` must be the attack definition for `active_slot`.
    pub fn step(&mut self, def: &AttackDef, current_tick: u32) -> AttackOutcome {
        let Some(slot) = self.active_slot else {
            return AttackOutcome::None;
        };

        if !self.action_point_fired {
            if let Some(action_tick) = self.action_point_tick {
                if current_tick >= action_tick {
                    self.action_point_fired = true;
                    self.phase = AttackPhase::Active;
                    return AttackOutcome::ActionPoint;
                }
            }
        }

        let windup_end = self.phase_start_tick + ms_to_ticks(def.windup_ms);
        let recovery_end = windup_end + ms_to_ticks(def.recovery_ms);

        if self.action_point_fired && current_tick >= recovery_end {
            self.cooldown_ready_tick
                .insert(slot, current_tick + ms_to_ticks(def.cooldown_ms));
            self.active_slot = None;
            self.phase = AttackPhase::Ready;
            return AttackOutcome::Recovered;
        }

        if self.action_point_fired && current_tick >= windup_end {
            self.phase = AttackPhase::Recovery;
        }

        AttackOutcome::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::table::attack_def;
    use crate::net::PlayerClass;

    #[test]
    fn second_intent_dropped_during_windup() {
        let def = attack_def(PlayerClass::Bladedancer, 0);
        let mut fsm = AttackFsm::default();
        assert_eq!(fsm.start(0, &def, 0), AttackOutcome::Started);
        assert_eq!(fsm.start(0, &def, 1), AttackOutcome::Rejected);
    }

    #[test]
    fn full_cycle_reaches_action_point_then_recovers() {
        let def = attack_def(PlayerClass::Bladedancer, 0);
        let mut fsm = AttackFsm::default();
        fsm.start(0, &def, 0);

        let action_tick = ms_to_ticks(def.action_point_ms());
        let mut saw_action_point = false;
        for tick in 0..=(action_tick + ms_to_ticks(def.recovery_ms) + 2) {
            match fsm.step(&def, tick) {
                AttackOutcome::ActionPoint => saw_action_point = true,
                AttackOutcome::Recovered => {
                    assert!(saw_action_point);
                    assert_eq!(fsm.phase(), AttackPhase::Ready);
                    return;
                }
                _ => {}
            }
        }
        panic!("attack never recovered");
    }

    #[test]
    fn cooldown_blocks_immediate_restart() {
        let def = attack_def(PlayerClass::Bladedancer, 0);
        let mut fsm = AttackFsm::default();
        fsm.start(0, &def, 0);

        let recovery_tick = ms_to_ticks(def.windup_ms) + ms_to_ticks(def.recovery_ms) + 1;
        for tick in 0..=recovery_tick {
            fsm.step(&def, tick);
        }

        assert_eq!(fsm.start(0, &def, recovery_tick + 1), AttackOutcome::Rejected);
    }
}
