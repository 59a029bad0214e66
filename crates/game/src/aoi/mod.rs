//! Area-of-interest filtering and per-socket message batching (§4.9).

pub mod batch;
pub mod filter;

pub use batch::{event_is_visible, flush, to_envelope};
pub use filter::{
    EFFECT_SYNC_DISTANCE, MAX_SYNCED_MONSTERS, MONSTER_SYNC_DISTANCE, PLAYER_VIEW_DISTANCE,
    filter_snapshot,
};
