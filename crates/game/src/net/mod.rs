mod codec;
mod connection;
mod protocol;
mod ratelimit;

pub use codec::{
    ClientEnvelope, CodecError, ServerEnvelope, decode_client_envelope, encode_server_envelope,
};
pub use connection::{
    ClientConnection, ConnectionRegistry, ConnectionState, HEARTBEAT_INTERVAL_MS,
    HEARTBEAT_TIMEOUT_MS, STATE_RESTORE_WINDOW_MS,
};
pub use protocol::{ArchivedPacket, sequence_greater_than};
pub use protocol::{
    ClientCommand, DEFAULT_PORT, EntityState, MAX_PACKET_SIZE, NETWORK_UPDATE_RATE, Packet,
    PacketError, PacketHeader, PacketType, PROTOCOL_MAGIC, PROTOCOL_VERSION, PlayerClass,
    TICK_RATE, WorldSnapshot,
};
pub use ratelimit::{RateLimitConfig, RateLimitKind, RateLimiter};
