pub mod ai;
pub mod anticheat;
pub mod aoi;
pub mod combat;
pub mod event;
pub mod lagcomp;
pub mod movement;
pub mod net;
pub mod simulation;
pub mod snapshot;

pub use ai::{AiStepResult, DEATH_LINGER_TICKS, DEFAULT_STUN_TICKS, monster_move_speed};
pub use anticheat::{AntiCheat, ViolationKind};
pub use aoi::{
    EFFECT_SYNC_DISTANCE, MAX_SYNCED_MONSTERS, MONSTER_SYNC_DISTANCE, PLAYER_VIEW_DISTANCE,
    event_is_visible, filter_snapshot, flush as flush_messages, to_envelope,
};
pub use combat::{AttackDef, AttackFsm, AttackOutcome, HitboxShape, attack_def, contains, monster_attack_def, resolve_damage, step_projectile};
pub use event::{EventQueue, GameEvent, PendingEvent, ReliabilityMode};
pub use lagcomp::{LatencyTracker, MAX_REWIND_TIME_MS, rewound_position};
pub use movement::{CollisionMask, base_move_speed, move_with_sliding, resolve_move_velocity, step_position};
pub use net::{
    ClientCommand, ClientConnection, ClientEnvelope, CodecError, ConnectionRegistry,
    ConnectionState, DEFAULT_PORT, EntityState, HEARTBEAT_INTERVAL_MS, HEARTBEAT_TIMEOUT_MS,
    MAX_PACKET_SIZE, NETWORK_UPDATE_RATE, Packet, PacketError, PacketHeader, PacketType,
    PlayerClass, PROTOCOL_MAGIC, PROTOCOL_VERSION, RateLimitConfig, RateLimitKind, RateLimiter,
    STATE_RESTORE_WINDOW_MS, ServerEnvelope, TICK_RATE, WorldSnapshot,
};
pub use simulation::{
    CommandBuffer, FixedTimestep, INPUT_SEQUENCE_WINDOW, InputRejection, SimulationLoop,
    SimulationState, TickOutcome, validate_command,
};
pub use snapshot::{
    AttackPhase, Entity, EntityAttributes, EntityFlags, EntityHandle, EntityType,
    MonsterAiState, MonsterAttributes, PlayerAttributes, ProjectileAttributes, SnapshotBuffer,
    World,
};
