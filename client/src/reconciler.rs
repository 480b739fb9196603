//! Turns hub broadcasts into local world state.
//!
//! Rosters replace mirror state wholesale, map messages feed the map
//! authority rules, and projectile descriptors are scanned for damage
//! credits naming the local participant. The `(shooter, shot)` key of a
//! credited projectile goes into an applied set so rebroadcasts of the
//! same marked descriptor never land the hit twice.

use crate::game::{Mirror, World};
use log::{debug, info};
use shared::protocol::{Message, PlayerSnapshot, ProjectileState};
use std::collections::{HashMap, HashSet};

/// What the main loop should do after one ingested message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// The hub is going away; tear the session down.
    Shutdown,
}

pub fn apply_message(world: &mut World, own_key: &str, message: Message) -> Control {
    match message {
        Message::Map { map: Some(blocks) } => {
            if world.map_loaded {
                world.replace_map(blocks);
            } else {
                world.load_map(blocks);
            }
            Control::Continue
        }
        // The empty-map marker only matters during the join handshake,
        // which the main loop handles before the tick loop starts.
        Message::Map { map: None } => Control::Continue,
        Message::Shutdown { .. } => Control::Shutdown,
        Message::Roster(roster) => {
            apply_roster(world, own_key, roster);
            Control::Continue
        }
        // Hub-bound messages; a relay never forwards them to participants.
        other => {
            debug!("ignoring non-broadcast message: {:?}", other);
            Control::Continue
        }
    }
}

/// Whole-roster reconciliation: drop mirrors for departed peers, update
/// or add the rest, collect their projectiles and apply any damage
/// credit naming the local participant exactly once.
pub fn apply_roster(
    world: &mut World,
    own_key: &str,
    mut roster: HashMap<String, PlayerSnapshot>,
) {
    // The hub echoes our own entry back; we are authoritative over it.
    roster.remove(own_key);

    world.mirrors.retain(|key, _| roster.contains_key(key));

    let mut live_keys = HashSet::new();
    world.foreign.clear();

    for (key, snapshot) in roster {
        for descriptor in &snapshot.bullets {
            live_keys.insert(descriptor.shot_key());
            scan_for_credit(world, descriptor);
        }

        match world.mirrors.get_mut(&key) {
            Some(mirror) => mirror.apply(&snapshot),
            None => {
                debug!("peer {} joined as {}", key, snapshot.nickname);
                world
                    .mirrors
                    .insert(key, Mirror::from_snapshot(&snapshot));
            }
        }
    }

    for mirror in world.mirrors.values() {
        world
            .foreign
            .extend(mirror.projectiles.iter().cloned());
    }

    // Once a projectile has left every snapshot it can never be
    // rebroadcast, so its key no longer needs remembering.
    world.applied_hits.retain(|key| live_keys.contains(key));
}

fn scan_for_credit(world: &mut World, descriptor: &ProjectileState) {
    if !descriptor.credited().contains(&world.me.id) {
        return;
    }
    if !world.applied_hits.insert(descriptor.shot_key()) {
        return;
    }

    match descriptor {
        ProjectileState::Kinetic { damage, shooter, .. } => {
            info!("hit by {} for {}", shooter, damage);
            world.take_damage(*damage);
        }
        ProjectileState::Ballistic {
            damage,
            shooter,
            pos,
            ..
        } => {
            info!("caught in {}'s blast for {}", shooter, damage);
            world.push_from_blast((pos[0], pos[1]));
            world.take_damage(*damage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::Facing;
    use shared::weapons::KineticKind;
    use shared::{Message, MAX_HP};

    fn snapshot(id: u32, bullets: Vec<ProjectileState>) -> PlayerSnapshot {
        PlayerSnapshot {
            x: 200.0,
            y: 200.0,
            is_rope_torn: true,
            hook_x: 0.0,
            hook_y: 0.0,
            direction: Facing::Left,
            mouse_pos: [0.0, 0.0],
            weapon_index: 1,
            bullets,
            hp: MAX_HP,
            nickname: format!("peer{}", id),
            id,
            is_e_active: false,
            is_hiding: false,
        }
    }

    fn kinetic_credit(shooter: u32, shot: u64, victim: u32, damage: f32) -> ProjectileState {
        ProjectileState::Kinetic {
            weapon: KineticKind::Deagle,
            pos: [100.0, 100.0],
            direction: [1.0, 0.0],
            damage,
            shot,
            shooter,
            is_exist: false,
            is_damaged: true,
            damaged_player: Some(victim),
        }
    }

    fn vulnerable_world() -> World {
        let mut world = World::new("victim");
        world.me.immortality_ticks = 0;
        world
    }

    #[test]
    fn test_roster_self_filter() {
        let mut world = vulnerable_world();
        let mut roster = HashMap::new();
        roster.insert("1.2.3.4:5000".to_string(), snapshot(world.me.id, vec![]));
        roster.insert("9.9.9.9:1234".to_string(), snapshot(2, vec![]));

        apply_roster(&mut world, "1.2.3.4:5000", roster);
        assert_eq!(world.mirrors.len(), 1);
        assert!(world.mirrors.contains_key("9.9.9.9:1234"));
    }

    #[test]
    fn test_departed_peer_mirror_removed() {
        let mut world = vulnerable_world();
        let mut roster = HashMap::new();
        roster.insert("a:1".to_string(), snapshot(1, vec![]));
        roster.insert("b:2".to_string(), snapshot(2, vec![]));
        apply_roster(&mut world, "me:0", roster);
        assert_eq!(world.mirrors.len(), 2);

        let mut roster = HashMap::new();
        roster.insert("a:1".to_string(), snapshot(1, vec![]));
        apply_roster(&mut world, "me:0", roster);
        assert_eq!(world.mirrors.len(), 1);
        assert!(world.mirrors.contains_key("a:1"));
    }

    #[test]
    fn test_damage_credit_applied_exactly_once() {
        let mut world = vulnerable_world();
        let me = world.me.id;

        let mut roster = HashMap::new();
        roster.insert(
            "a:1".to_string(),
            snapshot(1, vec![kinetic_credit(1, 7, me, 40.0)]),
        );
        apply_roster(&mut world, "me:0", roster.clone());
        assert_eq!(world.me.hp, MAX_HP - 40.0);

        // The same marked descriptor rebroadcast must not land again.
        apply_roster(&mut world, "me:0", roster);
        assert_eq!(world.me.hp, MAX_HP - 40.0);
    }

    #[test]
    fn test_credit_for_someone_else_ignored() {
        let mut world = vulnerable_world();
        let mut roster = HashMap::new();
        roster.insert(
            "a:1".to_string(),
            snapshot(1, vec![kinetic_credit(1, 7, world.me.id + 1, 40.0)]),
        );
        apply_roster(&mut world, "me:0", roster);
        assert_eq!(world.me.hp, MAX_HP);
    }

    #[test]
    fn test_distinct_shots_each_land() {
        let mut world = vulnerable_world();
        let me = world.me.id;

        let mut roster = HashMap::new();
        roster.insert(
            "a:1".to_string(),
            snapshot(
                1,
                vec![kinetic_credit(1, 7, me, 10.0), kinetic_credit(1, 8, me, 15.0)],
            ),
        );
        apply_roster(&mut world, "me:0", roster);
        assert_eq!(world.me.hp, MAX_HP - 25.0);
    }

    #[test]
    fn test_applied_set_pruned_with_projectiles() {
        let mut world = vulnerable_world();
        let me = world.me.id;

        let mut roster = HashMap::new();
        roster.insert(
            "a:1".to_string(),
            snapshot(1, vec![kinetic_credit(1, 7, me, 10.0)]),
        );
        apply_roster(&mut world, "me:0", roster);
        assert_eq!(world.applied_hits.len(), 1);

        let mut roster = HashMap::new();
        roster.insert("a:1".to_string(), snapshot(1, vec![]));
        apply_roster(&mut world, "me:0", roster);
        assert!(world.applied_hits.is_empty());
    }

    #[test]
    fn test_ballistic_credit_damages_and_pushes() {
        let mut world = vulnerable_world();
        world.me.pos = (120.0, 100.0);
        world.me.velocity = (0.0, 0.0);
        let me = world.me.id;

        let blast = ProjectileState::Ballistic {
            pos: [100.0, 100.0],
            direction: [1.0, 0.0],
            damage: 30.0,
            shot: 3,
            shooter: 5,
            is_damaged: true,
            is_exploded: true,
            damaged_players: vec![me],
        };
        let mut roster = HashMap::new();
        roster.insert("a:1".to_string(), snapshot(5, vec![blast]));
        apply_roster(&mut world, "me:0", roster);

        assert_eq!(world.me.hp, MAX_HP - 30.0);
        // Blast to the left of the player pushes it right.
        assert!(world.me.velocity.0 > 0.0);
    }

    #[test]
    fn test_invulnerable_victim_rejects_credit_but_remembers_it() {
        let mut world = World::new("victim");
        assert!(world.me.immortality_ticks > 0);
        let me = world.me.id;

        let mut roster = HashMap::new();
        roster.insert(
            "a:1".to_string(),
            snapshot(1, vec![kinetic_credit(1, 7, me, 40.0)]),
        );
        apply_roster(&mut world, "me:0", roster.clone());
        assert_eq!(world.me.hp, MAX_HP);

        // Losing the shield later must not resurrect an old credit.
        world.me.immortality_ticks = 0;
        apply_roster(&mut world, "me:0", roster);
        assert_eq!(world.me.hp, MAX_HP);
    }

    #[test]
    fn test_foreign_projectiles_follow_mirrors() {
        let mut world = vulnerable_world();
        let mut roster = HashMap::new();
        roster.insert(
            "a:1".to_string(),
            snapshot(1, vec![kinetic_credit(1, 9, 999, 5.0)]),
        );
        apply_roster(&mut world, "me:0", roster);
        assert_eq!(world.foreign.len(), 1);
        assert_eq!(world.mirrors["a:1"].projectiles.len(), 1);

        let mut roster = HashMap::new();
        roster.insert("a:1".to_string(), snapshot(1, vec![]));
        apply_roster(&mut world, "me:0", roster);
        assert!(world.foreign.is_empty());
    }

    #[test]
    fn test_shutdown_message_stops_the_loop() {
        let mut world = vulnerable_world();
        let control = apply_message(
            &mut world,
            "me:0",
            Message::Shutdown {
                server_shutdown: true,
            },
        );
        assert_eq!(control, Control::Shutdown);
    }

    #[test]
    fn test_map_messages_load_then_replace() {
        use shared::map::{cell_key, Block, BlockKind, BlockMap};

        let mut world = vulnerable_world();
        let mut blocks = BlockMap::new();
        blocks.insert(
            cell_key(1, 1),
            Block {
                kind: BlockKind::ClosedDoor,
                pos: (1, 1),
                size: None,
                hide: None,
            },
        );
        apply_message(&mut world, "me:0", Message::Map { map: Some(blocks.clone()) });
        assert!(world.map_loaded);
        assert_eq!(world.map.door_positions, vec![(1, 1)]);

        // A relayed door toggle replaces cells without re-deriving indices.
        blocks.get_mut(&cell_key(1, 1)).unwrap().kind = BlockKind::OpenedDoor;
        apply_message(&mut world, "me:0", Message::Map { map: Some(blocks) });
        assert_eq!(
            world.map.block_kind_at(1, 1),
            Some(BlockKind::OpenedDoor)
        );
        assert_eq!(world.map.door_positions, vec![(1, 1)]);
    }
}
