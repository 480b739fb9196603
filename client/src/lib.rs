//! # Participant library
//!
//! One participant runs its own full simulation and periodically publishes
//! a wholesale snapshot of itself to the relay hub. Everything it knows
//! about other participants comes back as roster broadcasts, which the
//! reconciler turns into local mirror objects. There is no referee: damage
//! a participant causes is resolved on its own simulation and carried to
//! the victim as idempotent credit markers inside projectile descriptors.
//!
//! Module split:
//! - [`session`]: the transport session (connect/retry, atomic sends, the
//!   background receive loop).
//! - [`reconciler`]: roster/map/shutdown ingestion and the exactly-once
//!   damage-credit scan.
//! - [`game`]: the local world, player kinematics, weapons, doors and
//!   respawn rules.
//! - [`projectile`]: live projectile objects and their wire descriptors.
//! - [`hook`]: the grappling hook.

pub mod game;
pub mod hook;
pub mod potion;
pub mod projectile;
pub mod reconciler;
pub mod session;
