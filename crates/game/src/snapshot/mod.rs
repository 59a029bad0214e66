mod buffer;
mod entity;
mod world;

pub use buffer::SnapshotBuffer;
pub use entity::{
    AttackPhase, Entity, EntityAttributes, EntityFlags, EntityHandle, EntityType, MonsterAiState,
    MonsterAttributes, PlayerAttributes, ProjectileAttributes,
};
pub use world::World;
