//! Wire protocol messages.
//!
//! Every message is one JSON document on the wire (see [`crate::framing`]).
//! The protocol predates any envelope convention, so messages are
//! discriminated structurally, most specific shape first: a document with
//! `server_shutdown` is the hub's shutdown notice, one with `disconnect`
//! a voluntary leave, one with snapshot fields a participant snapshot, an
//! object of snapshots keyed by peer key a roster, and a document with a
//! `map` key a map update.

use crate::weapons::KineticKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Roster key: `ip:port` of the sending connection as seen by the hub.
/// Stable for the lifetime of one connection, not portable across
/// reconnects.
pub type PeerKey = String;

/// Untagged matching tries the variants in declaration order, so the
/// permissive shapes must come last: the roster accepts any object whose
/// values are snapshots (`{}` is an empty roster), and the map update,
/// whose only field is an `Option`, would otherwise swallow every frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Message {
    /// Hub → all sessions right before it terminates.
    Shutdown { server_shutdown: bool },

    /// Participant → hub on voluntary exit. `id` names a participant
    /// identity, which may match any roster entry, not only the sender's.
    Leave { disconnect: bool, id: u32 },

    /// Participant → hub, once per simulation tick, replace-wholesale.
    Snapshot(PlayerSnapshot),

    /// Hub → all sessions on any roster change. The whole roster including
    /// the receiver's own entry; receivers self-filter by peer key.
    Roster(HashMap<PeerKey, PlayerSnapshot>),

    /// Hub → participant on accept and on map change; participant → hub to
    /// submit a map. `None` is the explicit empty-map marker a first joiner
    /// receives before any map exists.
    Map { map: Option<crate::map::BlockMap> },
}

/// Which way a participant faces, driven by its cursor side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Left,
    Right,
}

/// Full visible state of one participant for one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSnapshot {
    pub x: f32,
    pub y: f32,
    pub is_rope_torn: bool,
    pub hook_x: f32,
    pub hook_y: f32,
    pub direction: Facing,
    pub mouse_pos: [f32; 2],
    /// Index into the fixed weapon list ([`crate::weapons::WEAPONS`]).
    pub weapon_index: usize,
    pub bullets: Vec<ProjectileState>,
    pub hp: f32,
    pub nickname: String,
    pub id: u32,
    pub is_e_active: bool,
    pub is_hiding: bool,
}

/// Serialized form of a live projectile, including the idempotent
/// damage-credit fields.
///
/// `(shooter, shot)` uniquely identifies one fired projectile across all
/// rebroadcasts of the owner's snapshots; victims key their applied-damage
/// set on it so a hit is resolved exactly once no matter how many times the
/// marked descriptor is relayed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "bullet_type", rename_all = "snake_case")]
pub enum ProjectileState {
    /// Explosive round, optionally reflecting off terrain. One detonation
    /// can credit several victims at once, hence the set.
    Ballistic {
        pos: [f32; 2],
        direction: [f32; 2],
        damage: f32,
        shot: u64,
        shooter: u32,
        is_damaged: bool,
        is_exploded: bool,
        damaged_players: Vec<u32>,
    },
    /// Plain straight-flying round. At most one victim.
    Kinetic {
        weapon: KineticKind,
        pos: [f32; 2],
        direction: [f32; 2],
        damage: f32,
        shot: u64,
        shooter: u32,
        is_exist: bool,
        is_damaged: bool,
        damaged_player: Option<u32>,
    },
}

impl ProjectileState {
    /// Idempotency key shared by every rebroadcast of this projectile.
    pub fn shot_key(&self) -> (u32, u64) {
        match self {
            ProjectileState::Ballistic { shooter, shot, .. } => (*shooter, *shot),
            ProjectileState::Kinetic { shooter, shot, .. } => (*shooter, *shot),
        }
    }

    /// Identities this projectile has been credited against so far.
    pub fn credited(&self) -> Vec<u32> {
        match self {
            ProjectileState::Ballistic {
                damaged_players, ..
            } => damaged_players.clone(),
            ProjectileState::Kinetic { damaged_player, .. } => {
                damaged_player.iter().copied().collect()
            }
        }
    }
}
