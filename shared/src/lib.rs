//! Shared vocabulary between the relay hub and the participants: wire
//! protocol types, the newline-delimited framing codec, the block map
//! model and the fixed weapon table.
//!
//! Both sides of the protocol depend on this crate and nothing else, so
//! every change here is by definition a wire-format change.

pub mod error;
pub mod framing;
pub mod geom;
pub mod map;
pub mod protocol;
pub mod weapons;

pub use error::NetError;
pub use framing::{encode, FrameDecoder, READ_CHUNK};
pub use geom::Rect;
pub use map::{Block, BlockKind, BlockMap, Blockmap};
pub use protocol::{Facing, Message, PlayerSnapshot, ProjectileState};
pub use weapons::{kinetic_spec, weapon, KineticKind, WeaponClass, WeaponSpec, WEAPONS};

/// Side of one map cell in world units.
pub const BLOCK_SIZE: f32 = 16.0;

pub const PLAYER_WIDTH: f32 = 10.0;
pub const PLAYER_HEIGHT: f32 = 16.0;
pub const MAX_HP: f32 = 100.0;

/// Ticks of post-spawn invulnerability during which damage and knockback
/// are rejected unconditionally.
pub const IMMORTALITY_TICKS: u32 = 120;

pub const GRAVITY: f32 = 0.03;
pub const MAX_FALL_SPEED: f32 = 5.0;
pub const MAX_RUN_SPEED: f32 = 2.0;
pub const RUN_ACCEL: f32 = 0.1;
pub const GROUND_FRICTION: f32 = 0.2;
pub const JUMP_SPEED: f32 = -2.0;

pub const HOOK_SPEED: f32 = 10.0;
pub const HOOK_MAX_LENGTH: f32 = 200.0;
pub const HOOK_TENSION: f32 = 0.1;

pub const EXPLOSION_RADIUS: f32 = 50.0;
pub const EXPLOSION_TICKS: u32 = 10;
pub const REFLECT_DAMPING: f32 = 0.7;
pub const REFLECT_MIN_SPEED: f32 = 1.0;
/// Damage factor applied when a ballistic shot comes back on its shooter.
pub const SELF_DAMAGE_FACTOR: f32 = 0.7;

/// Bounding box of a participant standing at `pos`.
pub fn player_rect(pos: (f32, f32)) -> Rect {
    Rect::new(pos.0, pos.1, PLAYER_WIDTH, PLAYER_HEIGHT)
}
