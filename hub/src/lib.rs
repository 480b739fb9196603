//! # Relay hub library
//!
//! The hub is the single always-on process of the system. It does not
//! simulate or validate anything: it accepts sessions, keeps the
//! last-known snapshot per connection and the canonical map, and fans
//! every change out to all connected sessions. All conflict resolution is
//! last write wins; correctness of gameplay rests on the idempotency
//! markers the participants put inside their snapshots.

pub mod relay;
