use rkyv::{rancor, Archive, Deserialize, Serialize};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x4B574348;
pub const DEFAULT_PORT: u16 = 27015;

/// Simulation tick rate (§4.1).
pub const TICK_RATE: u32 = 60;
/// Network broadcast tick rate (§4.1); every `TICK_RATE / NETWORK_UPDATE_RATE`-th
/// simulation tick is also a network tick.
pub const NETWORK_UPDATE_RATE: u32 = 20;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

fn normalize_angle(angle: f32) -> f32 {
    let two_pi = std::f32::consts::TAU;
    let mut normalized = angle % two_pi;
    if normalized > std::f32::consts::PI {
        normalized -= two_pi;
    } else if normalized < -std::f32::consts::PI {
        normalized += two_pi;
    }
    normalized
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bitfield: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32, ack: u32, ack_bitfield: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
            ack,
            ack_bitfield,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

/// Class the player picked; drives base move speed and the `{class}_{slot}` attack
/// table lookup (§4.5). Content balance numbers themselves stay out of core scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug, PartialEq))]
#[repr(u8)]
pub enum PlayerClass {
    #[default]
    Bladedancer = 0,
    Guardian = 1,
    Hunter = 2,
    Rogue = 3,
}

impl PlayerClass {
    pub fn slug(self) -> &'static str {
        match self {
            PlayerClass::Bladedancer => "bladedancer",
            PlayerClass::Guardian => "guardian",
            PlayerClass::Hunter => "hunter",
            PlayerClass::Rogue => "rogue",
        }
    }
}

impl From<u8> for PlayerClass {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Bladedancer,
            1 => Self::Guardian,
            2 => Self::Hunter,
            _ => Self::Rogue,
        }
    }
}

/// Binary hot-path payload (§6). Connection handshake, chat-grade events and other
/// low-frequency traffic travel as JSON `ClientEnvelope`/`ServerEnvelope` values
/// instead (see [`super::codec`]); this enum only carries the two message kinds that
/// are sent every network tick and benefit from a fixed-layout binary encoding.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum PacketType {
    ClientCommand(ClientCommand),
    WorldSnapshot(WorldSnapshot),
}

/// High-frequency binary input frame (§6). `move_direction` carries local-frame
/// forward/strafe intent quantized to i8; `facing` is the view angle quantized to i16.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ClientCommand {
    pub tick: u32,
    pub command_sequence: u32,
    pub move_direction: [i8; 2],
    pub facing: i16,
    pub input_flags: u16,
}

impl ClientCommand {
    pub const FLAG_ATTACK_PRIMARY: u16 = 1 << 0;
    pub const FLAG_ATTACK_SECONDARY: u16 = 1 << 1;
    pub const FLAG_ABILITY: u16 = 1 << 2;
    pub const FLAG_ROLL: u16 = 1 << 3;

    pub fn new(tick: u32, command_sequence: u32) -> Self {
        Self {
            tick,
            command_sequence,
            move_direction: [0, 0],
            facing: 0,
            input_flags: 0,
        }
    }

    pub fn decode_move_direction(&self) -> [f32; 2] {
        [
            self.move_direction[0] as f32 / 127.0,
            self.move_direction[1] as f32 / 127.0,
        ]
    }

    pub fn encode_move_direction(&mut self, dir: [f32; 2]) {
        self.move_direction = [
            (dir[0].clamp(-1.0, 1.0) * 127.0) as i8,
            (dir[1].clamp(-1.0, 1.0) * 127.0) as i8,
        ];
    }

    pub fn decode_facing(&self) -> f32 {
        self.facing as f32 / 10000.0
    }

    pub fn encode_facing(&mut self, facing: f32) {
        self.facing = (normalize_angle(facing) * 10000.0) as i16;
    }

    #[inline]
    pub fn has_flag(&self, flag: u16) -> bool {
        self.input_flags & flag != 0
    }

    #[inline]
    pub fn set_flag(&mut self, flag: u16, value: bool) {
        if value {
            self.input_flags |= flag;
        } else {
            self.input_flags &= !flag;
        }
    }
}

/// Wire representation of an entity (§3 Entity + Player/Monster-specific attributes).
/// Every field here is a critical field candidate for its kind (§4.8); the delta
/// compressor decides which of these always ride along.
#[derive(Debug, Clone, Copy, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EntityState {
    pub entity_id: u32,
    pub entity_kind: u8,
    pub position: [f32; 2],
    pub velocity: [i16; 2],
    pub facing: i16,
    pub hp: u16,
    pub max_hp: u16,
    pub armor_hp: u16,
    pub flags: u16,
    /// Player: class; Monster: opaque type id (looked up in the external stats table).
    pub kind_id: u8,
    pub level: u8,
    pub move_speed_bonus: i16,
    pub attack_recovery_bonus: i16,
    pub attack_cooldown_bonus: i16,
    pub damage_bonus: i16,
    /// Monster AI state, or 0 for non-monsters.
    pub ai_state: u8,
    pub current_attack_type: u8,
    pub attack_phase: u8,
}

impl EntityState {
    pub const MAX_VELOCITY: f32 = 327.67;

    pub const FLAG_INVULNERABLE: u16 = 1 << 0;
    pub const FLAG_DEAD: u16 = 1 << 1;
    pub const FLAG_STUNNED: u16 = 1 << 2;
    pub const FLAG_ROLL_UNLOCKED: u16 = 1 << 3;
    pub const FLAG_IN_ABILITY: u16 = 1 << 4;

    pub fn new(entity_id: u32, entity_kind: u8) -> Self {
        Self {
            entity_id,
            entity_kind,
            ..Default::default()
        }
    }

    pub fn encode_velocity(&mut self, vel: [f32; 2]) {
        self.velocity = [
            (vel[0].clamp(-Self::MAX_VELOCITY, Self::MAX_VELOCITY) * 100.0) as i16,
            (vel[1].clamp(-Self::MAX_VELOCITY, Self::MAX_VELOCITY) * 100.0) as i16,
        ];
    }

    pub fn decode_velocity(&self) -> [f32; 2] {
        [self.velocity[0] as f32 / 100.0, self.velocity[1] as f32 / 100.0]
    }

    pub fn encode_facing(&mut self, facing: f32) {
        self.facing = (normalize_angle(facing) * 10000.0) as i16;
    }

    pub fn decode_facing(&self) -> f32 {
        self.facing as f32 / 10000.0
    }

    #[inline]
    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    #[inline]
    pub fn set_flag(&mut self, flag: u16, value: bool) {
        if value {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WorldSnapshot {
    pub tick: u32,
    pub server_time_ms: u64,
    pub last_command_ack: u32,
    pub baseline_tick: u32,
    pub is_delta: bool,
    pub entities: Vec<EntityState>,
    pub removed_entity_ids: Vec<u32>,
}

impl WorldSnapshot {
    pub fn new(tick: u32, server_time_ms: u64) -> Self {
        Self {
            tick,
            server_time_ms,
            last_command_ack: 0,
            baseline_tick: 0,
            is_delta: false,
            entities: Vec::new(),
            removed_entity_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: PacketType,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl Packet {
    pub fn new(header: PacketHeader, payload: PacketType) -> Self {
        Self { header, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)
    }

    pub fn access_archived(data: &[u8]) -> Result<&ArchivedPacket, PacketError> {
        rkyv::access::<ArchivedPacket, rancor::Error>(data).map_err(PacketError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_comparison() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }

    #[test]
    fn test_entity_state_encoding() {
        let mut state = EntityState::new(1, 0);
        state.position = [100.5, 50.25];
        state.encode_velocity([10.5, -5.25]);
        state.encode_facing(1.2);

        let vel = state.decode_velocity();
        assert!((vel[0] - 10.5).abs() < 0.01);
        assert!((vel[1] - -5.25).abs() < 0.01);
        assert!((state.decode_facing() - 1.2).abs() < 0.001);
    }

    #[test]
    fn test_packet_serialization() {
        let header = PacketHeader::new(1, 0, 0);
        let payload = PacketType::ClientCommand(ClientCommand::new(1, 1));
        let packet = Packet::new(header, payload);

        let serialized = packet.serialize().unwrap();
        let deserialized = Packet::deserialize(&serialized).unwrap();

        assert_eq!(packet.header, deserialized.header);
    }

    #[test]
    fn test_client_command_flags() {
        let mut cmd = ClientCommand::new(0, 0);
        cmd.set_flag(ClientCommand::FLAG_ATTACK_PRIMARY, true);
        assert!(cmd.has_flag(ClientCommand::FLAG_ATTACK_PRIMARY));
        assert!(!cmd.has_flag(ClientCommand::FLAG_ROLL));
    }
}
