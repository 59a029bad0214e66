//! The fixed-tick simulation loop (§4.1): a generic accumulator driving a per-tick
//! closure, and the six ordered phases that closure runs against one world.

use std::collections::HashMap;

use glam::Vec2;

use crate::ai;
use crate::anticheat::AntiCheat;
use crate::combat::{
    self, AttackDef, AttackFsm, AttackOutcome, HitboxShape, attack_def, contains,
    monster_attack_def, resolve_damage,
};
use crate::event::{EventQueue, GameEvent};
use crate::lagcomp::{self, LatencyTracker};
use crate::movement::{self, CollisionMask};
use crate::net::{ClientCommand, NETWORK_UPDATE_RATE, WorldSnapshot};
use crate::snapshot::{
    AttackPhase, Entity, EntityAttributes, EntityFlags, EntityType, MonsterAiState,
    ProjectileAttributes, SnapshotBuffer, World,
};

use super::command::CommandBuffer;

/// Collision radius used for every entity's movement integration and melee/
/// projectile hit testing. A real deployment would vary this per entity kind; the
/// core ships one floor value (§1, content data is out of scope).
const ENTITY_RADIUS: f32 = 20.0;
const PROJECTILE_HIT_RADIUS: f32 = 16.0;

fn ticks_per_network_update(tick_rate: u32, network_rate: u32) -> u32 {
    (tick_rate / network_rate.max(1)).max(1)
}

/// Generic fixed-timestep accumulator: turns a variable wall-clock delta into a
/// whole number of fixed-size simulation steps.
pub struct FixedTimestep {
    tick_rate: u32,
    dt: f32,
    accumulator: f32,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            tick_rate,
            dt: 1.0 / tick_rate as f32,
            accumulator: 0.0,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn accumulate(&mut self, delta: f32) {
        self.accumulator += delta.min(0.25);
    }

    pub fn should_tick(&self) -> bool {
        self.accumulator >= self.dt
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            true
        } else {
            false
        }
    }

    pub fn alpha(&self) -> f32 {
        self.accumulator / self.dt
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

/// What a simulation tick produced, for the server crate to act on: a network tick
/// carries the global delta snapshot (still unfiltered by AOI — see [`crate::aoi`])
/// and the events raised this tick; everything else is `None`/empty.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub tick: u32,
    pub network_tick: bool,
    pub global_delta: Option<WorldSnapshot>,
    pub events: Vec<GameEvent>,
    pub despawned_monsters: Vec<u32>,
}

/// Everything one simulation tick needs (§4.1). Owns the world, the collision mask
/// it was built against, per-entity attack FSMs (shared by players and monsters —
/// §4.5/§4.6 resolve through the same machinery), and the supporting systems (lag
/// compensation history, anti-cheat counters, pending events, queued input).
pub struct SimulationState {
    pub world: World,
    pub mask: CollisionMask,
    pub attack_fsms: HashMap<u32, AttackFsm>,
    pub anticheat: AntiCheat,
    pub latency: LatencyTracker,
    pub history: SnapshotBuffer,
    pub events: EventQueue,
    pub command_buffer: CommandBuffer,
    timestep: FixedTimestep,
    network_rate: u32,
    baseline: WorldSnapshot,
    ticks_since_network_flush: u32,
    /// Damage a spawned projectile will deal on its eventual hit, keyed by the
    /// projectile's entity id — computed once at the action point (§4.5) since
    /// the server must never recompute damage from anything the projectile carries.
    pending_projectile_damage: HashMap<u32, u16>,
}

impl SimulationState {
    pub fn new(mask: CollisionMask, tick_rate: u32, history_capacity: usize) -> Self {
        Self::with_network_rate(mask, tick_rate, NETWORK_UPDATE_RATE, history_capacity)
    }

    /// As [`Self::new`], but with an explicit network broadcast rate (§6
    /// `NETWORK_UPDATE_RATE`) instead of the default — used to run the simulation
    /// at non-default rates for testing or deployment tuning.
    pub fn with_network_rate(
        mask: CollisionMask,
        tick_rate: u32,
        network_rate: u32,
        history_capacity: usize,
    ) -> Self {
        let world = World::new();
        let baseline = world.snapshot(0);
        Self {
            world,
            mask,
            attack_fsms: HashMap::new(),
            anticheat: AntiCheat::default(),
            latency: LatencyTracker::new(),
            history: SnapshotBuffer::new(history_capacity),
            events: EventQueue::new(1024),
            command_buffer: CommandBuffer::new(8),
            timestep: FixedTimestep::new(tick_rate),
            network_rate,
            baseline,
            ticks_since_network_flush: 0,
            pending_projectile_damage: HashMap::new(),
        }
    }

    pub fn tick(&self) -> u32 {
        self.world.tick()
    }

    pub fn timestep_mut(&mut self) -> &mut FixedTimestep {
        &mut self.timestep
    }

    /// Runs the six ordered phases of one simulation tick (§4.1) and returns what
    /// happened, leaving per-connection AOI filtering and dispatch to the caller.
    pub fn step(&mut self) -> TickOutcome {
        let tick = self.world.tick();
        let dt = self.timestep.dt();

        self.drain_input(tick);
        self.step_player_attacks(tick);
        self.step_projectiles(dt);
        let despawned_monsters = self.step_monster_ai(tick);
        self.step_movement(dt);

        let full = self.world.snapshot(0);
        self.history.push(full);

        self.world.advance_tick();
        self.ticks_since_network_flush += 1;

        let network_tick = self.ticks_since_network_flush
            >= ticks_per_network_update(self.timestep.tick_rate(), self.network_rate);
        let (global_delta, events) = if network_tick {
            self.ticks_since_network_flush = 0;
            let delta = self.world.delta_from_baseline(&self.baseline, 0);
            self.baseline = self.world.snapshot(0);
            let drained = self.events.drain_events_for_tick(tick);
            self.events.cleanup(self.world.server_time_ms());
            (Some(delta), drained)
        } else {
            (None, Vec::new())
        };

        TickOutcome {
            tick,
            network_tick,
            global_delta,
            events,
            despawned_monsters,
        }
    }

    // --- Phase 1: input drain -------------------------------------------------

    fn drain_input(&mut self, tick: u32) {
        for entity_id in self.command_buffer.entity_ids() {
            for command in self.command_buffer.drain_all(entity_id) {
                self.apply_command(entity_id, &command, tick);
            }
        }
    }

    fn apply_command(&mut self, entity_id: u32, command: &ClientCommand, tick: u32) {
        let class = {
            let Some(entity) = self.world.get_by_id_mut(entity_id) else {
                return;
            };
            if entity.is_dead() || entity.flags.contains(EntityFlags::STUNNED) {
                return;
            }
            entity.facing = command.decode_facing();

            let Some(player) = entity.as_player_mut() else {
                return;
            };
            player.last_processed_input = command.command_sequence;
            player.class
        };

        if let Some(entity) = self.world.get_by_id_mut(entity_id) {
            if !entity.flags.contains(EntityFlags::IN_ABILITY) {
                let intent = Vec2::from(command.decode_move_direction());
                let base_speed = movement::base_move_speed(class);
                let bonus = entity.as_player().map_or(0.0, |p| p.move_speed_bonus);
                entity.velocity =
                    movement::resolve_move_velocity(intent, entity.facing, base_speed, bonus);
            }
        }

        if command.has_flag(ClientCommand::FLAG_ATTACK_PRIMARY) {
            self.try_start_attack(entity_id, 0, tick);
        } else if command.has_flag(ClientCommand::FLAG_ATTACK_SECONDARY)
            || command.has_flag(ClientCommand::FLAG_ABILITY)
            || command.has_flag(ClientCommand::FLAG_ROLL)
        {
            self.try_start_attack(entity_id, 1, tick);
        }
    }

    fn try_start_attack(&mut self, entity_id: u32, slot: u8, tick: u32) {
        let Some(class) = self
            .world
            .get_by_id(entity_id)
            .and_then(|e| e.as_player())
            .map(|p| p.class)
        else {
            return;
        };
        let def = attack_def(class, slot);
        let fsm = self.attack_fsms.entry(entity_id).or_default();
        let outcome = fsm.start(slot, &def, tick);

        if outcome == AttackOutcome::Started {
            if let Some(entity) = self.world.get_by_id_mut(entity_id) {
                entity.current_attack_type = slot;
                entity.attack_phase = AttackPhase::Windup;
                entity.flags.insert(EntityFlags::IN_ABILITY);
                if def.invulnerable {
                    entity.flags.insert(EntityFlags::INVULNERABLE);
                }
            }
            let timestamp_ms = self.world.server_time_ms();
            self.events.push(
                tick,
                timestamp_ms,
                GameEvent::AttackStarted { attacker_id: entity_id, slot, attack_type: slot },
            );
        }
    }

    // --- Phase 2: abilities & projectiles --------------------------------------

    fn step_player_attacks(&mut self, tick: u32) {
        let player_ids: Vec<u32> = self
            .world
            .entities()
            .filter(|e| e.entity_type == EntityType::Player)
            .map(|e| e.id)
            .collect();

        for entity_id in player_ids {
            let Some(slot) = self.attack_fsms.get(&entity_id).and_then(|f| f.active_slot())
            else {
                continue;
            };
            let Some(class) = self
                .world
                .get_by_id(entity_id)
                .and_then(|e| e.as_player())
                .map(|p| p.class)
            else {
                continue;
            };
            let def = attack_def(class, slot);
            let outcome = self
                .attack_fsms
                .get_mut(&entity_id)
                .map(|fsm| fsm.step(&def, tick))
                .unwrap_or(AttackOutcome::None);

            match outcome {
                AttackOutcome::ActionPoint => self.resolve_player_action_point(entity_id, &def, tick),
                AttackOutcome::Recovered => self.finish_attack(entity_id),
                _ => {}
            }

            let phase = self
                .attack_fsms
                .get(&entity_id)
                .map(|f| f.phase())
                .unwrap_or(AttackPhase::Ready);
            if let Some(entity) = self.world.get_by_id_mut(entity_id) {
                entity.attack_phase = phase;
            }
        }
    }

    fn resolve_player_action_point(&mut self, attacker_id: u32, def: &AttackDef, tick: u32) {
        if let Some(dash) = def.dash {
            if let Some(entity) = self.world.get_by_id_mut(attacker_id) {
                let forward = Vec2::new(entity.facing.cos(), entity.facing.sin());
                entity.position = movement::move_with_sliding(
                    &self.mask,
                    entity.position,
                    forward * dash.distance,
                    ENTITY_RADIUS,
                );
            }
        }

        if let Some(spec) = def.projectile {
            let (origin, facing, damage_bonus) = match self.world.get_by_id(attacker_id) {
                Some(e) => (e.position, e.facing, e.as_player().map_or(0, |p| p.damage_bonus as i16)),
                None => return,
            };
            let damage = resolve_damage(def.base_damage, damage_bonus, 0);
            let direction = Vec2::new(facing.cos(), facing.sin());
            let handle = self.world.spawn(EntityType::Projectile);
            if let Some(projectile) = self.world.get_mut(handle) {
                projectile.position = origin;
                projectile.facing = facing;
                projectile.attributes = EntityAttributes::Projectile(ProjectileAttributes {
                    owner_id: attacker_id,
                    owner_kind: EntityType::Player,
                    direction,
                    speed: spec.speed,
                    max_range: spec.max_range,
                    distance_travelled: 0.0,
                    piercing: spec.piercing,
                });
            }
            let timestamp_ms = self.world.server_time_ms();
            self.events.push(
                tick,
                timestamp_ms,
                GameEvent::EntitySpawned { entity_id: handle.id(), entity_kind: EntityType::Projectile as u8 },
            );
            self.pending_projectile_damage.insert(handle.id(), damage);
            return;
        }

        let (origin, facing) = match self.world.get_by_id(attacker_id) {
            Some(e) => (e.position, e.facing),
            None => return,
        };
        let damage_bonus = self
            .world
            .get_by_id(attacker_id)
            .and_then(|e| e.as_player())
            .map_or(0, |p| p.damage_bonus as i16);

        // Victims are hit-tested against their rewound position at the attacker's
        // effective time (§4.7); the attacker's own position is always current.
        let server_time_ms = self.world.server_time_ms();
        let effective_time_ms = self.latency.effective_time_ms(attacker_id, server_time_ms);
        let tick_rate = self.timestep.tick_rate();
        let history = &self.history;

        let target_ids: Vec<u32> = self
            .world
            .entities()
            .filter(|e| e.id != attacker_id && !e.is_dead() && e.entity_type != EntityType::Projectile)
            .filter(|e| {
                let test_position = lagcomp::rewound_position(
                    history,
                    tick,
                    tick_rate,
                    server_time_ms,
                    effective_time_ms,
                    e.id,
                )
                .unwrap_or(e.position);
                contains(def.hitbox, origin, facing, test_position)
            })
            .map(|e| e.id)
            .collect();

        let damage = resolve_damage(def.base_damage, damage_bonus, 0);
        for target_id in target_ids {
            self.deal_damage(attacker_id, target_id, damage, tick);
        }
    }

    fn finish_attack(&mut self, entity_id: u32) {
        if let Some(entity) = self.world.get_by_id_mut(entity_id) {
            entity.attack_phase = AttackPhase::Ready;
            entity.flags.remove(EntityFlags::IN_ABILITY);
            entity.flags.remove(EntityFlags::INVULNERABLE);
        }
    }

    fn step_projectiles(&mut self, dt: f32) {
        let projectile_ids: Vec<u32> = self
            .world
            .entities()
            .filter(|e| e.entity_type == EntityType::Projectile)
            .map(|e| e.id)
            .collect();

        let mut to_despawn = Vec::new();
        let tick = self.world.tick();

        for projectile_id in &projectile_ids {
            let projectile_id = *projectile_id;
            let Some((owner_id, direction, speed, max_range, piercing, position)) =
                self.world.get_by_id(projectile_id).and_then(|p| {
                    p.as_projectile().map(|attrs| {
                        (attrs.owner_id, attrs.direction, attrs.speed, attrs.max_range, attrs.piercing, p.position)
                    })
                })
            else {
                continue;
            };

            let (new_position, travelled) = combat::step_projectile(position, direction, speed, dt);

            let hit_target = self
                .world
                .entities()
                .find(|other| {
                    other.id != owner_id
                        && other.id != projectile_id
                        && !other.is_dead()
                        && other.entity_type != EntityType::Projectile
                        && contains(
                            HitboxShape::Circle { radius: PROJECTILE_HIT_RADIUS },
                            new_position,
                            0.0,
                            other.position,
                        )
                })
                .map(|e| e.id);

            let mut total_travelled = 0.0;
            if let Some(projectile) = self.world.get_by_id_mut(projectile_id) {
                projectile.position = new_position;
                if let Some(attrs) = projectile.as_projectile_mut() {
                    attrs.distance_travelled += travelled;
                    total_travelled = attrs.distance_travelled;
                }
            }

            if let Some(target_id) = hit_target {
                let damage = self
                    .pending_projectile_damage
                    .get(&projectile_id)
                    .copied()
                    .unwrap_or(0);
                self.deal_damage(owner_id, target_id, damage, tick);
                if !piercing {
                    to_despawn.push(projectile_id);
                }
            }

            if total_travelled >= max_range {
                to_despawn.push(projectile_id);
            }
        }

        for id in to_despawn {
            self.pending_projectile_damage.remove(&id);
            if let Some(handle) = self.world.get_by_id(id).map(|e| e.handle()) {
                self.world.despawn(handle);
                let timestamp_ms = self.world.server_time_ms();
                self.events
                    .push(tick, timestamp_ms, GameEvent::EntityDespawned { entity_id: id });
            }
        }
    }

    fn deal_damage(&mut self, attacker_id: u32, target_id: u32, damage: u16, tick: u32) {
        let Some(target) = self.world.get_by_id_mut(target_id) else {
            return;
        };
        if target.flags.contains(EntityFlags::INVULNERABLE) {
            return;
        }
        target.apply_damage(damage);
        let died = target.is_dead();
        let target_type = target.entity_type;
        let timestamp_ms = self.world.server_time_ms();
        self.events.push(
            tick,
            timestamp_ms,
            GameEvent::DamageDealt { attacker_id, target_id, damage },
        );

        if target_type == EntityType::Monster {
            if let Some(monster) = self.world.get_by_id_mut(target_id) {
                ai::stun(monster, tick, ai::DEFAULT_STUN_TICKS / 3);
            }
        }

        if died {
            if target_type == EntityType::Monster {
                if let Some(monster) = self.world.get_by_id_mut(target_id) {
                    ai::enter_dying(monster, tick);
                }
            }
            self.events.push(
                tick,
                timestamp_ms,
                GameEvent::EntityDied { entity_id: target_id, killer_id: Some(attacker_id) },
            );
        }
    }

    // --- Phase 3: monster AI ----------------------------------------------------

    fn step_monster_ai(&mut self, tick: u32) -> Vec<u32> {
        let monster_ids: Vec<u32> = self
            .world
            .entities()
            .filter(|e| e.entity_type == EntityType::Monster)
            .map(|e| e.id)
            .collect();
        let players: Vec<(u32, Vec2)> = self
            .world
            .entities()
            .filter(|e| e.entity_type == EntityType::Player && !e.is_dead())
            .map(|e| (e.id, e.position))
            .collect();

        let mut despawned = Vec::new();

        for monster_id in monster_ids {
            let position = match self.world.get_by_id(monster_id) {
                Some(m) => m.position,
                None => continue,
            };
            let current_target = self
                .world
                .get_by_id(monster_id)
                .and_then(|m| m.as_monster())
                .and_then(|attrs| attrs.target_id);

            let target = players
                .iter()
                .find(|(id, _)| Some(*id) == current_target)
                .copied()
                .or_else(|| {
                    players
                        .iter()
                        .min_by(|a, b| {
                            a.1.distance(position)
                                .partial_cmp(&b.1.distance(position))
                                .unwrap_or(std::cmp::Ordering::Equal)
                        })
                        .copied()
                });

            let fsm = self.attack_fsms.entry(monster_id).or_default();
            let Some(monster) = self.world.get_by_id_mut(monster_id) else {
                continue;
            };
            let result = ai::step(monster, fsm, target, &self.mask, tick);
            monster.velocity = result.velocity;

            if result.action_point {
                if let Some((target_id, _)) = target {
                    let monster_type = monster.as_monster().map_or(0, |m| m.monster_type);
                    let def = monster_attack_def(monster_type);
                    let damage = resolve_damage(def.base_damage, 0, 0);
                    let monster_position = monster.position;
                    if let Some(target_position) = players
                        .iter()
                        .find(|(id, _)| *id == target_id)
                        .map(|(_, p)| *p)
                    {
                        if contains(def.hitbox, monster_position, monster.facing, target_position) {
                            self.deal_damage(monster_id, target_id, damage, tick);
                        }
                    }
                }
            }

            if result.should_despawn {
                despawned.push(monster_id);
            }
        }

        for monster_id in &despawned {
            if let Some(handle) = self.world.get_by_id(*monster_id).map(|e| e.handle()) {
                self.world.despawn(handle);
                self.attack_fsms.remove(monster_id);
                let timestamp_ms = self.world.server_time_ms();
                self.events.push(
                    tick,
                    timestamp_ms,
                    GameEvent::EntityDespawned { entity_id: *monster_id },
                );
            }
        }

        despawned
    }

    // --- Phase 4: movement & collision ------------------------------------------

    fn step_movement(&mut self, dt: f32) {
        let mask = &self.mask;
        for entity in self.world.entities_mut() {
            if entity.entity_type == EntityType::Projectile {
                continue;
            }
            if entity.is_dead() || entity.velocity == Vec2::ZERO {
                continue;
            }
            entity.position =
                movement::step_position(mask, entity.position, entity.velocity, dt, ENTITY_RADIUS);
            entity.dirty = true;
        }
    }
}

/// Drives a [`SimulationState`] from wall-clock deltas through a user-supplied
/// per-tick closure, the same fixed-timestep shape used across this codebase.
pub struct SimulationLoop<F> {
    state: SimulationState,
    tick_fn: F,
}

impl<F> SimulationLoop<F>
where
    F: FnMut(&mut SimulationState) -> TickOutcome,
{
    pub fn new(state: SimulationState, tick_fn: F) -> Self {
        Self { state, tick_fn }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    pub fn update(&mut self, delta: f32) -> Vec<TickOutcome> {
        self.state.timestep_mut().accumulate(delta);

        let mut outcomes = Vec::new();
        while self.state.timestep_mut().consume_tick() {
            outcomes.push((self.tick_fn)(&mut self.state));
        }
        outcomes
    }

    pub fn interpolation_alpha(&self) -> f32 {
        self.state.timestep.alpha()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::PlayerClass;

    fn state() -> SimulationState {
        SimulationState::new(CollisionMask::empty(200, 200, 32.0), 60, 64)
    }

    #[test]
    fn fixed_timestep_accumulation() {
        let mut ts = FixedTimestep::new(60);
        ts.accumulate(2.0 / 60.0);
        assert!(ts.consume_tick());
        assert!(ts.consume_tick());
        assert!(!ts.consume_tick());
    }

    #[test]
    fn tick_advances_world_and_flushes_network_on_schedule() {
        let mut sim = state();
        let mut last = sim.step();
        for _ in 0..(ticks_per_network_update(60, NETWORK_UPDATE_RATE) - 1) {
            last = sim.step();
        }
        assert!(last.network_tick);
        assert!(last.global_delta.is_some());
    }

    #[test]
    fn queued_movement_command_moves_the_player() {
        let mut sim = state();
        let handle = sim.world.spawn_player(Vec2::new(100.0, 100.0), PlayerClass::Rogue);
        let start = sim.world.get(handle).unwrap().position;

        let mut cmd = ClientCommand::new(0, 1);
        cmd.encode_move_direction([0.0, 1.0]);
        sim.command_buffer.push(handle.id(), cmd);

        sim.step();

        let moved = sim.world.get(handle).unwrap().position;
        assert!(moved.distance(start) > 0.0);
    }

    #[test]
    fn melee_attack_damages_entity_in_hitbox() {
        let mut sim = state();
        let attacker = sim.world.spawn_player(Vec2::new(0.0, 0.0), PlayerClass::Bladedancer);
        let target = sim.world.spawn_monster(Vec2::new(40.0, 0.0), 0, 50);

        let mut cmd = ClientCommand::new(0, 1);
        cmd.set_flag(ClientCommand::FLAG_ATTACK_PRIMARY, true);
        sim.command_buffer.push(attacker.id(), cmd);

        let def = attack_def(PlayerClass::Bladedancer, 0);
        let action_ticks = combat::ms_to_ticks(def.action_point_ms());
        for _ in 0..=(action_ticks + 1) {
            sim.step();
        }

        assert!(sim.world.get(target).unwrap().hp < 50);
    }

    /// §4.7/E1: a melee attack lands against a victim's rewound position even
    /// though the victim's *current* position has since moved out of the hitbox.
    #[test]
    fn melee_attack_uses_rewound_victim_position() {
        use crate::net::{EntityState, WorldSnapshot};

        let mut sim = state();
        let attacker = sim.world.spawn_player(Vec2::new(0.0, 0.0), PlayerClass::Bladedancer);
        // Far enough that the monster stays Dormant (velocity stays zero) so its
        // *current* position never drifts away from where we pin it below.
        let target = sim.world.spawn_monster(Vec2::new(1000.0, 0.0), 0, 50);

        // Converge the attacker's latency estimate above the rewind cap.
        for _ in 0..10 {
            sim.latency.record_rtt_sample(attacker.id(), 4000.0);
        }
        assert!(sim.latency.latency_ms(attacker.id()) > crate::lagcomp::MAX_REWIND_TIME_MS as f64);

        // Let two real ticks elapse (monster stays put) so history has entries for
        // ticks 0 and 1 to overwrite below without a later real push clobbering them.
        sim.step();
        sim.step();

        // Rewrite history to say the monster was well inside the hitbox back then.
        let mut past0 = WorldSnapshot::new(0, 0);
        past0.entities.push(EntityState {
            entity_id: target.id(),
            position: [50.0, 0.0],
            ..Default::default()
        });
        let mut past1 = WorldSnapshot::new(1, 0);
        past1.entities.push(EntityState {
            entity_id: target.id(),
            position: [50.0, 0.0],
            ..Default::default()
        });
        sim.history.push(past0);
        sim.history.push(past1);

        // Current world.tick() is now 2; queue the attack here.
        let mut cmd = ClientCommand::new(0, 1);
        cmd.set_flag(ClientCommand::FLAG_ATTACK_PRIMARY, true);
        sim.command_buffer.push(attacker.id(), cmd);

        let def = attack_def(PlayerClass::Bladedancer, 0);
        let action_ticks = combat::ms_to_ticks(def.action_point_ms());
        for _ in 0..=(action_ticks + 1) {
            sim.step();
        }

        // The monster's *current* position (1000,0) is far outside the 85-unit
        // rectangle; only the rewound (50,0) position lands the hit.
        assert!(sim.world.get(target).unwrap().hp < 50);
        assert_eq!(sim.world.get(target).unwrap().position, Vec2::new(1000.0, 0.0));
    }
}
