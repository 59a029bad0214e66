//! The authoritative game server (§4, §5). Owns one [`SimulationState`] driven by a
//! plain timed loop that never awaits I/O; each connection gets its own reader and
//! writer task talking to that loop through bounded `tokio::mpsc` channels, matching
//! the per-connection inbound/outbound task model in §5.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec2;
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};

use keepwatch::{
    ClientCommand, ClientEnvelope, ConnectionRegistry, ConnectionState, EntityType, GameEvent,
    InputRejection, Packet, PacketHeader, PacketType, PlayerClass, RateLimitKind, ServerEnvelope,
    SimulationLoop, SimulationState, TickOutcome, ViolationKind, WorldSnapshot,
    decode_client_envelope, encode_server_envelope, event_is_visible, filter_snapshot,
    flush_messages, to_envelope, validate_command,
};

use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};
use crate::simulation;
use crate::transport;

#[derive(Debug)]
enum ServerMessage {
    Connected {
        addr: SocketAddr,
        outbound: mpsc::Sender<Vec<u8>>,
        client_id_tx: oneshot::Sender<u32>,
    },
    Envelope {
        client_id: u32,
        envelope: ClientEnvelope,
    },
    Command {
        client_id: u32,
        command: ClientCommand,
    },
    Disconnected {
        client_id: u32,
    },
}

struct ConnectionLink {
    addr: SocketAddr,
    outbound: mpsc::Sender<Vec<u8>>,
    known_entities: HashSet<u32>,
    send_sequence: u32,
    name: String,
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub tick: u32,
    pub client_count: usize,
    pub max_clients: usize,
    pub entity_count: usize,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: u32,
    pub name: String,
    pub addr: String,
    pub entity_id: Option<u32>,
    pub class: Option<PlayerClass>,
    pub level: u8,
    pub hp: u16,
    pub max_hp: u16,
    pub violations: u32,
}

pub struct GameServer {
    config: ServerConfig,
    sim_loop: SimulationLoop<fn(&mut SimulationState) -> TickOutcome>,
    connections: ConnectionRegistry,
    links: HashMap<u32, ConnectionLink>,
    /// Maps a freshly accepted transport connection that turned out to be a
    /// reconnect onto the canonical (originally accepted) client id, since the
    /// socket always arrives under a brand new id (§4.2).
    client_aliases: HashMap<u32, u32>,
    control_rx: mpsc::Receiver<ServerMessage>,
    running: Arc<AtomicBool>,
    start_time: Instant,
    last_tick_time: Instant,
    local_addr: SocketAddr,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub async fn new(bind_addr: &str, config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let (control_tx, control_rx) = mpsc::channel(1024);

        tokio::spawn(accept_loop(listener, control_tx));

        let sim = simulation::build_simulation(&config);

        Ok(Self {
            sim_loop: SimulationLoop::new(sim, SimulationState::step),
            connections: ConnectionRegistry::new(),
            links: HashMap::new(),
            client_aliases: HashMap::new(),
            control_rx,
            running: Arc::new(AtomicBool::new(true)),
            start_time: Instant::now(),
            last_tick_time: Instant::now(),
            local_addr,
            pending_events: VecDeque::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub async fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        self.shutdown_connections();
    }

    /// Drains pending I/O, steps the simulation for however many ticks the elapsed
    /// wall time demands, and runs connection housekeeping. Never awaits.
    pub fn tick_once(&mut self) {
        self.drain_control_messages();

        let now = Instant::now();
        let delta = now.duration_since(self.last_tick_time).as_secs_f32();
        self.last_tick_time = now;

        for outcome in self.sim_loop.update(delta) {
            if outcome.network_tick {
                self.broadcast_network_tick(&outcome);
            }
            for monster_id in &outcome.despawned_monsters {
                log::debug!("monster {monster_id} despawned at tick {}", outcome.tick);
            }
        }

        self.run_heartbeats_and_reaping();
    }

    pub fn shutdown_connections(&mut self) {
        let client_ids: Vec<u32> = self.connections.iter().map(|c| c.client_id).collect();
        for client_id in client_ids {
            self.kick_client(client_id, "server shutting down".to_string());
        }
    }

    pub fn kick_client(&mut self, client_id: u32, reason: String) {
        if let Some(link) = self.links.get(&client_id) {
            send_envelope_to(&link.outbound, &ServerEnvelope::Kicked { reason: reason.clone() });
        }
        self.remove_connection_fully(client_id, DisconnectReason::Kicked);
        self.pending_events.push_back(ServerEvent::ClientKicked { client_id, reason });
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.sim_loop.state().tick(),
            client_count: self.connections.connected_count(),
            max_clients: self.config.max_players,
            entity_count: self.sim_loop.state().world.entity_count(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn client_infos(&self) -> Vec<ClientInfo> {
        let state = self.sim_loop.state();
        self.connections
            .iter()
            .filter(|c| c.state == ConnectionState::Connected)
            .map(|c| {
                let entity = c.entity_id.and_then(|id| state.world.get_by_id(id));
                let (class, level, hp, max_hp) = entity.map_or((None, 0, 0, 0), |e| {
                    let (class, level) = e.as_player().map_or((None, 0), |p| (Some(p.class), p.level));
                    (class, level, e.hp, e.max_hp)
                });
                let link = self.links.get(&c.client_id);
                ClientInfo {
                    client_id: c.client_id,
                    name: link.map(|l| l.name.clone()).unwrap_or_default(),
                    addr: link.map(|l| l.addr.to_string()).unwrap_or_default(),
                    entity_id: c.entity_id,
                    class,
                    level,
                    hp,
                    max_hp,
                    violations: c.entity_id.map_or(0, |id| state.anticheat.violation_count(id)),
                }
            })
            .collect()
    }

    fn now_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn resolve_client(&self, client_id: u32) -> u32 {
        self.client_aliases.get(&client_id).copied().unwrap_or(client_id)
    }

    fn drain_control_messages(&mut self) {
        while let Ok(message) = self.control_rx.try_recv() {
            match message {
                ServerMessage::Connected { addr, outbound, client_id_tx } => {
                    self.handle_connected(addr, outbound, client_id_tx);
                }
                ServerMessage::Envelope { client_id, envelope } => {
                    self.handle_envelope(client_id, envelope);
                }
                ServerMessage::Command { client_id, command } => {
                    self.handle_command(client_id, command);
                }
                ServerMessage::Disconnected { client_id } => {
                    self.handle_disconnected(client_id, DisconnectReason::Graceful);
                }
            }
        }
    }

    fn handle_connected(
        &mut self,
        addr: SocketAddr,
        outbound: mpsc::Sender<Vec<u8>>,
        client_id_tx: oneshot::Sender<u32>,
    ) {
        if self.connections.total_count() >= self.config.max_players {
            let reason = "server full".to_string();
            send_envelope_to(&outbound, &ServerEnvelope::ConnectionRejected { reason: reason.clone() });
            self.pending_events.push_back(ServerEvent::ConnectionDenied { addr, reason });
            drop(client_id_tx);
            return;
        }

        self.pending_events.push_back(ServerEvent::ClientConnecting { addr });
        let now_ms = self.now_ms();
        let client_id = self.connections.accept(now_ms);
        self.links.insert(
            client_id,
            ConnectionLink {
                addr,
                outbound,
                known_entities: HashSet::new(),
                send_sequence: 0,
                name: String::new(),
            },
        );
        let _ = client_id_tx.send(client_id);
    }

    fn handle_envelope(&mut self, client_id: u32, envelope: ClientEnvelope) {
        let client_id = self.resolve_client(client_id);
        let now_ms = self.now_ms();
        if let Some(connection) = self.connections.get_mut(client_id) {
            connection.touch(now_ms);
            if !connection.rate_limiter.check(RateLimitKind::Message, now_ms) {
                return;
            }
        }
        match envelope {
            ClientEnvelope::Join { name, reconnect_token, .. } => {
                self.handle_join(client_id, name, reconnect_token);
            }
            ClientEnvelope::Leave => self.handle_disconnected(client_id, DisconnectReason::Graceful),
            ClientEnvelope::SetClass { class } => self.handle_set_class(client_id, class),
            ClientEnvelope::Attack { slot, aim_x, aim_y } => {
                self.queue_synthetic_attack(client_id, slot, aim_x, aim_y);
            }
            ClientEnvelope::ExecuteAbility { ability } => {
                self.queue_synthetic_attack(client_id, ability.min(1), 0.0, 0.0);
            }
            ClientEnvelope::Respawn => self.handle_respawn(client_id),
            ClientEnvelope::Ping { timestamp_ms } => self.handle_ping(client_id, timestamp_ms),
            ClientEnvelope::CollisionMask { width, height, tile_size, mask } => {
                simulation::apply_collision_mask_upload(
                    self.sim_loop.state_mut(),
                    width,
                    height,
                    tile_size,
                    &mask,
                );
            }
            ClientEnvelope::CreateProjectile { .. } => {
                // direction/spec are client-supplied and untrusted; route through the
                // normal slot-1 attack FSM so cooldown/windup and server-computed
                // damage still apply rather than honoring a free-form spawn (§4.5).
                self.queue_synthetic_attack(client_id, 1, 0.0, 0.0);
            }
        }
    }

    fn handle_join(&mut self, client_id: u32, name: String, reconnect_token: Option<u64>) {
        let now_ms = self.now_ms();

        if let Some(token) = reconnect_token {
            if let Some((resumed_id, Some(entity_id))) = self.connections.try_reconnect(token, now_ms) {
                self.alias_connection(client_id, resumed_id);
                self.finish_join(resumed_id, entity_id, name, token);
                log::info!("client {resumed_id} reconnected as entity {entity_id}");
                return;
            }
        }

        let handle = self
            .sim_loop
            .state_mut()
            .world
            .spawn_player(Vec2::ZERO, PlayerClass::default());
        let entity_id = handle.id();
        self.connections.mark_connected(client_id, entity_id);
        let token = self.connections.get(client_id).map_or(0, |c| c.reconnect_token);
        self.finish_join(client_id, entity_id, name, token);
        log::info!("client {client_id} joined as entity {entity_id}");
    }

    fn alias_connection(&mut self, transport_id: u32, canonical_id: u32) {
        if transport_id == canonical_id {
            return;
        }
        if let Some(link) = self.links.remove(&transport_id) {
            self.links.insert(canonical_id, link);
        }
        self.connections.remove(transport_id);
        self.client_aliases.insert(transport_id, canonical_id);
    }

    fn finish_join(&mut self, client_id: u32, entity_id: u32, name: String, reconnect_token: u64) {
        if let Some(link) = self.links.get_mut(&client_id) {
            link.name = name;
        }

        let (player_roster, monster_roster) = {
            let world = &self.sim_loop.state().world;
            (
                world
                    .entities()
                    .filter(|e| e.entity_type == EntityType::Player)
                    .map(|e| e.id)
                    .collect::<Vec<_>>(),
                world
                    .entities()
                    .filter(|e| e.entity_type == EntityType::Monster)
                    .map(|e| e.id)
                    .collect::<Vec<_>>(),
            )
        };

        let addr = self.links.get(&client_id).map(|l| l.addr);

        if let Some(link) = self.links.get(&client_id) {
            send_envelope_to(
                &link.outbound,
                &ServerEnvelope::ConnectionAccepted { client_id, entity_id, reconnect_token },
            );
            send_envelope_to(
                &link.outbound,
                &ServerEnvelope::Init {
                    entity_id,
                    world_width: self.config.world_width_tiles,
                    world_height: self.config.world_height_tiles,
                    world_seed: self.config.world_seed,
                    player_roster,
                    monster_roster,
                    protocol_version: keepwatch::PROTOCOL_VERSION,
                },
            );
        }

        if let Some(addr) = addr {
            self.pending_events.push_back(ServerEvent::ClientConnected { client_id, addr, entity_id });
        }
    }

    fn handle_set_class(&mut self, client_id: u32, class: u8) {
        let Some(entity_id) = self.connections.get(client_id).and_then(|c| c.entity_id) else {
            return;
        };
        if let Some(player) = self
            .sim_loop
            .state_mut()
            .world
            .get_by_id_mut(entity_id)
            .and_then(|e| e.as_player_mut())
        {
            player.class = PlayerClass::from(class);
        }
    }

    fn handle_respawn(&mut self, client_id: u32) {
        let Some(entity_id) = self.connections.get(client_id).and_then(|c| c.entity_id) else {
            return;
        };
        let state = self.sim_loop.state_mut();
        let tick = state.world.tick();
        let Some(entity) = state.world.get_by_id_mut(entity_id) else {
            return;
        };
        if !entity.is_dead() {
            return;
        }
        entity.hp = entity.max_hp;
        entity.flags.remove(keepwatch::EntityFlags::DEAD);
        entity.position = Vec2::ZERO;
        let position = entity.position;
        let timestamp_ms = state.world.server_time_ms();
        state.events.push(
            tick,
            timestamp_ms,
            GameEvent::PlayerRespawned { player_id: entity_id, position: position.into() },
        );
    }

    fn handle_ping(&mut self, client_id: u32, timestamp_ms: u64) {
        if let Some(link) = self.links.get(&client_id) {
            send_envelope_to(&link.outbound, &ServerEnvelope::Pong { timestamp_ms });
        }
    }

    /// Builds a minimal [`ClientCommand`] carrying only an attack-slot flag and
    /// pushes it through the same FIFO the binary hot path uses, so JSON-only
    /// clients still go through shape validation, cooldown, and server-computed
    /// damage rather than a bespoke path (§4.5).
    fn queue_synthetic_attack(&mut self, client_id: u32, slot: u8, aim_x: f32, aim_y: f32) {
        let now_ms = self.now_ms();
        let Some(connection) = self.connections.get_mut(client_id) else {
            return;
        };
        if !connection.rate_limiter.check(RateLimitKind::Attack, now_ms) {
            return;
        }
        let Some(entity_id) = connection.entity_id else {
            return;
        };
        let sequence = connection.last_processed_input.wrapping_add(1);
        let tick = self.sim_loop.state().tick();

        let mut command = ClientCommand::new(tick, sequence);
        if aim_x != 0.0 || aim_y != 0.0 {
            command.encode_facing(aim_y.atan2(aim_x));
        }
        let flag = if slot == 0 {
            ClientCommand::FLAG_ATTACK_PRIMARY
        } else {
            ClientCommand::FLAG_ATTACK_SECONDARY
        };
        command.set_flag(flag, true);

        if let Some(connection) = self.connections.get_mut(client_id) {
            connection.last_processed_input = sequence;
        }
        self.sim_loop.state_mut().command_buffer.push(entity_id, command);
    }

    fn handle_command(&mut self, client_id: u32, command: ClientCommand) {
        let client_id = self.resolve_client(client_id);
        let now_ms = self.now_ms();
        let Some(entity_id) = self.connections.get(client_id).and_then(|c| c.entity_id) else {
            return;
        };
        let Some(connection) = self.connections.get_mut(client_id) else {
            return;
        };
        connection.touch(now_ms);

        match validate_command(connection, &command, now_ms) {
            Ok(()) => {
                // The client echoes back the sim tick it was generated on; comparing
                // that against the server's current tick gives a clock-sync-free RTT
                // estimate for lag compensation (§4.7) without a dedicated ping round
                // trip between simulation and network layers.
                let sim_tick_now = self.sim_loop.state().tick();
                let ticks_behind = sim_tick_now.saturating_sub(command.tick);
                let rtt_ms = ticks_behind as f64 * 1000.0 / self.config.tick_rate.max(1) as f64;
                let state = self.sim_loop.state_mut();
                state.latency.record_rtt_sample(entity_id, rtt_ms);
                state.command_buffer.push(entity_id, command);
            }
            Err(rejection) => {
                let kind = match rejection {
                    InputRejection::RateLimited => ViolationKind::ExcessiveRate,
                    InputRejection::StaleOrDuplicateSequence | InputRejection::SequenceOutOfWindow => {
                        ViolationKind::InvalidSequence
                    }
                    InputRejection::MalformedShape => ViolationKind::MalformedFrame,
                };
                let kicked = self.sim_loop.state_mut().anticheat.record(entity_id, kind);
                log::debug!("client {client_id} command rejected: {rejection:?}");
                if kicked {
                    self.kick_client(client_id, "excessive anti-cheat violations".to_string());
                }
            }
        }
    }

    fn handle_disconnected(&mut self, client_id: u32, reason: DisconnectReason) {
        let client_id = self.resolve_client(client_id);
        match reason {
            DisconnectReason::Graceful | DisconnectReason::Kicked => {
                self.remove_connection_fully(client_id, reason);
            }
            DisconnectReason::Timeout => {
                let now_ms = self.now_ms();
                self.connections.mark_disconnected(client_id, now_ms);
                self.links.remove(&client_id);
                self.pending_events.push_back(ServerEvent::ClientDisconnected { client_id, reason });
            }
        }
    }

    fn remove_connection_fully(&mut self, client_id: u32, reason: DisconnectReason) {
        self.links.remove(&client_id);
        if let Some(connection) = self.connections.remove(client_id) {
            if let Some(entity_id) = connection.entity_id {
                let state = self.sim_loop.state_mut();
                if let Some(handle) = state.world.get_by_id(entity_id).map(|e| e.handle()) {
                    let tick = state.world.tick();
                    let timestamp_ms = state.world.server_time_ms();
                    state.world.despawn(handle);
                    state.events.push(tick, timestamp_ms, GameEvent::EntityDespawned { entity_id });
                }
                state.attack_fsms.remove(&entity_id);
                state.anticheat.clear(entity_id);
            }
        }
        self.pending_events.push_back(ServerEvent::ClientDisconnected { client_id, reason });
    }

    fn run_heartbeats_and_reaping(&mut self) {
        let now_ms = self.now_ms();

        let timed_out = self.connections.find_timed_out(now_ms);
        for client_id in timed_out {
            self.handle_disconnected(client_id, DisconnectReason::Timeout);
        }

        for connection in self.connections.iter_mut() {
            if connection.state == ConnectionState::Connected && connection.needs_heartbeat(now_ms) {
                connection.last_heartbeat_sent_ms = now_ms;
            }
        }

        let expired = self.connections.reap_expired(now_ms);
        for (client_id, entity_id) in expired {
            self.links.remove(&client_id);
            if let Some(entity_id) = entity_id {
                let state = self.sim_loop.state_mut();
                if let Some(handle) = state.world.get_by_id(entity_id).map(|e| e.handle()) {
                    state.world.despawn(handle);
                }
                state.attack_fsms.remove(&entity_id);
                state.anticheat.clear(entity_id);
            }
            log::info!("client {client_id}'s reconnect window expired; entity removed");
        }
    }

    fn broadcast_network_tick(&mut self, outcome: &TickOutcome) {
        let Some(delta) = outcome.global_delta.clone() else {
            return;
        };
        let full_snapshot = self.sim_loop.state().world.snapshot(0);
        let server_time_ms = full_snapshot.server_time_ms;

        let client_ids: Vec<u32> = self.links.keys().copied().collect();
        for client_id in client_ids {
            let Some(entity_id) = self.connections.get(client_id).and_then(|c| c.entity_id) else {
                continue;
            };
            let Some(viewer_position) = position_of(&full_snapshot, entity_id) else {
                continue;
            };
            let last_command_ack = self.connections.get(client_id).map_or(0, |c| c.last_processed_input);

            let view = filter_snapshot(entity_id, viewer_position, &full_snapshot);
            let delta_view = filter_snapshot(entity_id, viewer_position, &delta);
            let visible_ids: HashSet<u32> = view.entities.iter().map(|e| e.entity_id).collect();

            let Some(link) = self.links.get_mut(&client_id) else {
                continue;
            };

            let mut out_entities = Vec::new();
            for entity in &view.entities {
                if link.known_entities.insert(entity.entity_id) {
                    out_entities.push(*entity);
                } else if let Some(d) = delta_view.entities.iter().find(|d| d.entity_id == entity.entity_id) {
                    out_entities.push(*d);
                }
            }

            let mut removed_ids = Vec::new();
            link.known_entities.retain(|id| {
                let keep = visible_ids.contains(id);
                if !keep {
                    removed_ids.push(*id);
                }
                keep
            });
            for id in &delta.removed_entity_ids {
                if !removed_ids.contains(id) {
                    removed_ids.push(*id);
                }
            }

            if out_entities.is_empty() && removed_ids.is_empty() {
                continue;
            }

            let sequence = link.send_sequence;
            link.send_sequence = link.send_sequence.wrapping_add(1);

            let snapshot = WorldSnapshot {
                tick: outcome.tick,
                server_time_ms,
                last_command_ack,
                baseline_tick: delta.baseline_tick,
                is_delta: true,
                entities: out_entities,
                removed_entity_ids: removed_ids,
            };

            send_packet_to(&link.outbound, sequence, PacketType::WorldSnapshot(snapshot));
        }

        self.broadcast_events(outcome, &full_snapshot);
    }

    fn broadcast_events(&mut self, outcome: &TickOutcome, full_snapshot: &WorldSnapshot) {
        if outcome.events.is_empty() {
            return;
        }
        let server_time_ms = full_snapshot.server_time_ms;

        let client_ids: Vec<u32> = self.links.keys().copied().collect();
        for client_id in client_ids {
            let Some(entity_id) = self.connections.get(client_id).and_then(|c| c.entity_id) else {
                continue;
            };
            let Some(viewer_position) = position_of(full_snapshot, entity_id) else {
                continue;
            };

            let visible: Vec<ServerEnvelope> = outcome
                .events
                .iter()
                .filter(|event| event_is_visible(event, entity_id, viewer_position, full_snapshot))
                .map(to_envelope)
                .collect();

            if let Some(envelope) = flush_messages(visible, server_time_ms) {
                if let Some(link) = self.links.get(&client_id) {
                    send_envelope_to(&link.outbound, &envelope);
                }
            }
        }
    }
}

fn position_of(snapshot: &WorldSnapshot, entity_id: u32) -> Option<Vec2> {
    snapshot
        .entities
        .iter()
        .find(|e| e.entity_id == entity_id)
        .map(|e| Vec2::from(e.position))
}

fn send_envelope_to(outbound: &mpsc::Sender<Vec<u8>>, envelope: &ServerEnvelope) {
    match encode_server_envelope(envelope) {
        Ok(bytes) => {
            if outbound.try_send(transport::encode_envelope_frame(&bytes)).is_err() {
                log::debug!("outbound envelope queue full or closed");
            }
        }
        Err(e) => log::error!("failed to encode envelope: {e}"),
    }
}

fn send_packet_to(outbound: &mpsc::Sender<Vec<u8>>, sequence: u32, payload: PacketType) {
    let header = PacketHeader::new(sequence, 0, 0);
    let packet = Packet::new(header, payload);
    match packet.serialize() {
        Ok(bytes) => {
            if outbound.try_send(transport::encode_packet_frame(&bytes)).is_err() {
                log::debug!("outbound packet queue full or closed");
            }
        }
        Err(e) => log::error!("failed to serialize packet: {e}"),
    }
}

async fn accept_loop(listener: TcpListener, control_tx: mpsc::Sender<ServerMessage>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if stream.set_nodelay(true).is_err() {
                    log::warn!("failed to set TCP_NODELAY for {addr}");
                }
                spawn_connection_tasks(stream, addr, control_tx.clone());
            }
            Err(e) => log::error!("accept failed: {e}"),
        }
    }
}

fn spawn_connection_tasks(
    stream: tokio::net::TcpStream,
    addr: SocketAddr,
    control_tx: mpsc::Sender<ServerMessage>,
) {
    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(256);
    tokio::spawn(writer_task(write_half, outbound_rx));
    tokio::spawn(reader_task(read_half, control_tx, outbound_tx, addr));
}

async fn writer_task(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(bytes) = rx.recv().await {
        if transport::write_bytes(&mut writer, &bytes).await.is_err() {
            break;
        }
    }
}

async fn reader_task(
    mut reader: OwnedReadHalf,
    control_tx: mpsc::Sender<ServerMessage>,
    outbound_tx: mpsc::Sender<Vec<u8>>,
    addr: SocketAddr,
) {
    let (id_tx, id_rx) = oneshot::channel();
    if control_tx
        .send(ServerMessage::Connected { addr, outbound: outbound_tx, client_id_tx: id_tx })
        .await
        .is_err()
    {
        return;
    }
    let client_id = match id_rx.await {
        Ok(id) => id,
        Err(_) => return,
    };

    loop {
        let frame = match transport::read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                log::debug!("connection {client_id} read error: {e}");
                break;
            }
        };

        match frame {
            transport::Frame::Envelope(bytes) => {
                let envelope = match decode_client_envelope(&bytes) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        log::debug!("client {client_id} sent malformed envelope: {e}");
                        break;
                    }
                };
                if control_tx.send(ServerMessage::Envelope { client_id, envelope }).await.is_err() {
                    break;
                }
            }
            transport::Frame::Packet(bytes) => {
                let packet = match Packet::deserialize(&bytes) {
                    Ok(packet) => packet,
                    Err(e) => {
                        log::debug!("client {client_id} sent malformed packet: {e}");
                        break;
                    }
                };
                if let PacketType::ClientCommand(command) = packet.payload {
                    if control_tx.send(ServerMessage::Command { client_id, command }).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    let _ = control_tx.send(ServerMessage::Disconnected { client_id }).await;
}
