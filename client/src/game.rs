//! The local world: the player this process controls, mirror copies of
//! everyone else, the map and the doors in it.
//!
//! Each participant is the sole authority over its own state. Mirrors are
//! display state driven entirely by roster broadcasts; the only writes this
//! module does to them are cosmetic hit previews. Damage dealt TO the local
//! player arrives through the reconciler, never through geometry here.

use crate::hook::Hook;
use crate::potion::{
    BuffKind, HealPotion, RandomPotion, BUFF_DAMAGE_FACTOR, BUFF_RUN_SPEED, HEAL_POWER,
};
use crate::projectile::{collision_normal, Payload, Projectile};
use log::debug;
use rand::Rng;
use shared::geom::{distance, Rect};
use shared::map::{BlockKind, BlockMap, Blockmap};
use shared::protocol::{Facing, PeerKey, PlayerSnapshot};
use shared::weapons::{weapon, WEAPONS};
use shared::{
    player_rect, BLOCK_SIZE, EXPLOSION_RADIUS, GRAVITY, GROUND_FRICTION, IMMORTALITY_TICKS,
    JUMP_SPEED, MAX_FALL_SPEED, MAX_HP, MAX_RUN_SPEED, RUN_ACCEL, SELF_DAMAGE_FACTOR,
};
use std::collections::{HashMap, HashSet};

/// Ticks a door stays untoggleable after being used.
pub const DOOR_COOLDOWN: u32 = 60;
/// How close a participant must stand to operate a door.
pub const DOOR_REACH: f32 = 30.0;

/// One tick of player intent. The headless binary feeds the default
/// (stand still, do nothing); an embedding with real input fills it in.
#[derive(Debug, Clone, Copy)]
pub struct InputCommand {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    /// Door-use key held this tick.
    pub interact: bool,
    pub fire: bool,
    /// Hook trigger edge; fires the hook if the rope is torn.
    pub hook_fire: bool,
    /// Hook trigger held; releasing tears the rope.
    pub hook_hold: bool,
    /// Weapon wheel delta, -1/0/1.
    pub switch_weapon: i32,
    /// Aim vector from the player center; need not be unit length.
    pub aim: (f32, f32),
    /// Raw cursor position, forwarded verbatim in snapshots.
    pub cursor: [f32; 2],
}

impl Default for InputCommand {
    fn default() -> Self {
        Self {
            left: false,
            right: false,
            jump: false,
            interact: false,
            fire: false,
            hook_fire: false,
            hook_hold: false,
            switch_weapon: 0,
            aim: (1.0, 0.0),
            cursor: [0.0, 0.0],
        }
    }
}

#[derive(Debug)]
pub struct LocalPlayer {
    pub pos: (f32, f32),
    pub velocity: (f32, f32),
    pub hp: f32,
    pub jumps: u32,
    pub direction: Facing,
    pub mouse_pos: [f32; 2],
    pub weapon_index: usize,
    /// Ticks since each weapon last fired; only the held one advances.
    pub weapon_ticks: [u32; WEAPONS.len()],
    pub immortality_ticks: u32,
    /// Invulnerability switch held open by the immortality buff.
    pub is_immortal: bool,
    /// Run speed cap, raised while the speed buff runs.
    pub max_run_speed: f32,
    /// Outgoing damage multiplier, raised while the damage buff runs.
    pub damage_factor: f32,
    pub nickname: String,
    pub id: u32,
    pub is_hiding: bool,
    pub is_e_active: bool,
    pub on_ground: bool,
    pub hook: Hook,
    pub projectiles: Vec<Projectile>,
    /// Per-shooter fire sequence; with the id it forms the projectile key.
    pub next_shot: u64,
}

impl LocalPlayer {
    fn new(nickname: &str) -> Self {
        Self {
            pos: (0.0, 0.0),
            velocity: (0.0, 0.0),
            hp: MAX_HP,
            jumps: 0,
            direction: Facing::Right,
            mouse_pos: [0.0, 0.0],
            weapon_index: 0,
            weapon_ticks: [u32::MAX / 2; WEAPONS.len()],
            immortality_ticks: IMMORTALITY_TICKS,
            is_immortal: false,
            max_run_speed: MAX_RUN_SPEED,
            damage_factor: 1.0,
            nickname: nickname.to_string(),
            id: rand::thread_rng().gen_range(1..10_000),
            is_hiding: false,
            is_e_active: false,
            on_ground: false,
            hook: Hook::new(),
            projectiles: Vec::new(),
            next_shot: 0,
        }
    }

    pub fn rect(&self) -> Rect {
        player_rect(self.pos)
    }
}

/// Display copy of a remote participant, rebuilt from roster broadcasts.
#[derive(Debug)]
pub struct Mirror {
    pub pos: (f32, f32),
    pub direction: Facing,
    pub hook_pos: (f32, f32),
    pub is_rope_torn: bool,
    pub mouse_pos: [f32; 2],
    pub weapon_index: usize,
    pub hp: f32,
    pub nickname: String,
    pub id: u32,
    pub is_e_active: bool,
    pub is_hiding: bool,
    pub projectiles: Vec<Projectile>,
}

impl Mirror {
    pub fn from_snapshot(snapshot: &PlayerSnapshot) -> Self {
        let mut mirror = Self {
            pos: (snapshot.x, snapshot.y),
            direction: snapshot.direction,
            hook_pos: (snapshot.hook_x, snapshot.hook_y),
            is_rope_torn: snapshot.is_rope_torn,
            mouse_pos: snapshot.mouse_pos,
            weapon_index: snapshot.weapon_index,
            hp: snapshot.hp,
            nickname: snapshot.nickname.clone(),
            id: snapshot.id,
            is_e_active: snapshot.is_e_active,
            is_hiding: snapshot.is_hiding,
            projectiles: Vec::new(),
        };
        mirror.apply(snapshot);
        mirror
    }

    /// Replace-wholesale update from the latest snapshot.
    pub fn apply(&mut self, snapshot: &PlayerSnapshot) {
        self.pos = (snapshot.x, snapshot.y);
        self.direction = snapshot.direction;
        self.hook_pos = (snapshot.hook_x, snapshot.hook_y);
        self.is_rope_torn = snapshot.is_rope_torn;
        self.mouse_pos = snapshot.mouse_pos;
        self.weapon_index = snapshot.weapon_index;
        self.hp = snapshot.hp;
        self.nickname = snapshot.nickname.clone();
        self.id = snapshot.id;
        self.is_e_active = snapshot.is_e_active;
        self.is_hiding = snapshot.is_hiding;
        self.projectiles = snapshot.bullets.iter().map(Projectile::from_state).collect();
    }

    pub fn rect(&self) -> Rect {
        player_rect(self.pos)
    }
}

/// A door cell and its toggle cooldown.
#[derive(Debug)]
pub struct Door {
    pub cell: (i32, i32),
    pub ticks: u32,
}

impl Door {
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.cell.0 as f32 * BLOCK_SIZE,
            self.cell.1 as f32 * BLOCK_SIZE,
            BLOCK_SIZE,
            BLOCK_SIZE * 2.0,
        )
    }

    fn world_pos(&self) -> (f32, f32) {
        (self.cell.0 as f32 * BLOCK_SIZE, self.cell.1 as f32 * BLOCK_SIZE)
    }
}

pub struct World {
    pub me: LocalPlayer,
    pub mirrors: HashMap<PeerKey, Mirror>,
    pub map: Blockmap,
    pub map_loaded: bool,
    pub doors: Vec<Door>,
    pub heal_potions: Vec<HealPotion>,
    pub random_potions: Vec<RandomPotion>,
    /// Rehydrated copies of every mirror's projectiles, flown between
    /// roster updates so remote shots do not freeze mid-air.
    pub foreign: Vec<Projectile>,
    /// Projectile keys whose damage credit has already been applied to
    /// the local player. Pruned once the projectile leaves every snapshot.
    pub applied_hits: HashSet<(u32, u64)>,
    map_dirty: bool,
}

impl World {
    pub fn new(nickname: &str) -> Self {
        Self {
            me: LocalPlayer::new(nickname),
            mirrors: HashMap::new(),
            map: Blockmap::new(),
            map_loaded: false,
            doors: Vec::new(),
            heal_potions: Vec::new(),
            random_potions: Vec::new(),
            foreign: Vec::new(),
            applied_hits: HashSet::new(),
            map_dirty: false,
        }
    }

    /// Initial map: derive the indices, build the doors and pickups,
    /// spawn the player.
    pub fn load_map(&mut self, blocks: BlockMap) {
        self.map.load(blocks);
        self.doors = self
            .map
            .door_positions
            .iter()
            .map(|&cell| Door {
                cell,
                ticks: DOOR_COOLDOWN,
            })
            .collect();
        self.heal_potions = self
            .map
            .heal_positions
            .iter()
            .map(|&cell| HealPotion::new(cell))
            .collect();
        let mut rng = rand::thread_rng();
        self.random_potions = self
            .map
            .random_potion_positions
            .iter()
            .map(|&cell| RandomPotion::new(cell, &mut rng))
            .collect();
        self.map_loaded = true;
        self.respawn();
        self.me.hook = Hook::new();
        // A rebuilt potion set can no longer revert a running buff.
        self.me.max_run_speed = MAX_RUN_SPEED;
        self.me.damage_factor = 1.0;
        self.me.is_immortal = false;
    }

    /// Later map broadcasts replace cells only; indices and doors stay.
    pub fn replace_map(&mut self, blocks: BlockMap) {
        self.map.replace(blocks);
    }

    /// A pending door toggle to submit to the hub, if any.
    pub fn take_map_update(&mut self) -> Option<BlockMap> {
        if self.map_dirty {
            self.map_dirty = false;
            Some(self.map.blocks.clone())
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            x: self.me.pos.0,
            y: self.me.pos.1,
            is_rope_torn: self.me.hook.is_rope_torn,
            hook_x: self.me.hook.pos.0,
            hook_y: self.me.hook.pos.1,
            direction: self.me.direction,
            mouse_pos: self.me.mouse_pos,
            weapon_index: self.me.weapon_index,
            bullets: self.me.projectiles.iter().map(Projectile::to_state).collect(),
            hp: self.me.hp,
            nickname: self.me.nickname.clone(),
            id: self.me.id,
            is_e_active: self.me.is_e_active,
            is_hiding: self.me.is_hiding,
        }
    }

    /// One simulation tick.
    pub fn tick(&mut self, input: &InputCommand) {
        self.me.is_hiding = false;
        self.me.immortality_ticks = self.me.immortality_ticks.saturating_sub(1);
        self.me.weapon_ticks[self.me.weapon_index] =
            self.me.weapon_ticks[self.me.weapon_index].saturating_add(1);

        // Projectiles that died last tick have been through one snapshot
        // by now, so their credit markers made it out.
        self.me.projectiles.retain(|p| p.is_exist);
        self.foreign.retain(|p| p.is_exist);

        self.me.mouse_pos = input.cursor;
        self.me.is_e_active = input.interact;
        self.me.direction = if input.aim.0 >= 0.0 {
            Facing::Right
        } else {
            Facing::Left
        };

        if input.switch_weapon != 0 {
            let count = WEAPONS.len() as i32;
            let index = self.me.weapon_index as i32 + input.switch_weapon;
            self.me.weapon_index = index.rem_euclid(count) as usize;
        }
        if input.fire {
            self.fire_weapon(input.aim);
        }

        if input.hook_fire {
            self.me.hook.shoot(self.me.rect().center(), input.aim);
        }
        let center = self.me.rect().center();
        if let Some(force) = self.me.hook.update(&self.map, center, input.hook_hold) {
            self.me.velocity.0 += force.0;
            self.me.velocity.1 += force.1;
        }

        if input.jump && self.me.jumps > 0 {
            self.me.velocity.1 = JUMP_SPEED;
            self.me.jumps -= 1;
        }

        self.step_kinematics(input);
        self.update_own_projectiles();
        self.update_foreign_projectiles();
        self.update_doors();
        self.update_potions();
    }

    /// Damage to the local player, from any source. Invulnerability
    /// swallows it whole; dropping under one hp triggers a respawn.
    pub fn take_damage(&mut self, amount: f32) {
        if self.me.immortality_ticks > 0 || self.me.is_immortal {
            return;
        }
        self.me.hp -= amount;
        if self.me.hp < 1.0 {
            self.me.hp = 0.0;
            self.respawn();
        }
    }

    /// Radial blast force on the local player from a detonation point.
    pub fn push_from_blast(&mut self, blast: (f32, f32)) {
        if self.me.immortality_ticks > 0 || self.me.is_immortal {
            return;
        }
        let center = self.me.rect().center();
        let dx = center.0 - blast.0;
        let dy = center.1 - blast.1;
        let dist = (dx * dx + dy * dy).sqrt().max(2.0);
        let force = (10.0 / dist).max(2.0);
        self.me.velocity.0 += force * dx / dist;
        self.me.velocity.1 += force * dy / dist;
    }

    pub fn respawn(&mut self) {
        let spawn = if self.map.spawn_points.is_empty() {
            (0, 0)
        } else {
            let index = rand::thread_rng().gen_range(0..self.map.spawn_points.len());
            self.map.spawn_points[index]
        };
        self.me.pos = (spawn.0 as f32 * BLOCK_SIZE, spawn.1 as f32 * BLOCK_SIZE);
        self.me.hp = MAX_HP;
        self.me.velocity = (0.0, 0.0);
        self.me.immortality_ticks = IMMORTALITY_TICKS;
    }

    fn fire_weapon(&mut self, aim: (f32, f32)) {
        let index = self.me.weapon_index;
        let spec = weapon(index);
        if self.me.weapon_ticks[index] <= spec.cooldown {
            return;
        }
        self.me.weapon_ticks[index] = 0;

        let origin = self.me.rect().center();
        let mut rng = rand::thread_rng();
        for _ in 0..spec.pellets {
            let shot = self.me.next_shot;
            self.me.next_shot += 1;
            let mut round = Projectile::fire(spec, origin, aim, self.me.id, shot, &mut rng);
            round.damage *= self.me.damage_factor;
            self.me.projectiles.push(round);
            // Recoil, once per pellet.
            self.me.velocity.0 -= spec.push_power * aim.0;
            self.me.velocity.1 -= spec.push_power * aim.1;
        }
    }

    fn step_kinematics(&mut self, input: &InputCommand) {
        let me = &mut self.me;
        if input.left {
            me.velocity.0 = (me.velocity.0 - RUN_ACCEL).max(-me.max_run_speed);
        }
        if input.right {
            me.velocity.0 = (me.velocity.0 + RUN_ACCEL).min(me.max_run_speed);
        }

        me.pos.0 += me.velocity.0;
        let mut rect = me.rect();
        for cover in &self.map.hiding_rects {
            if rect.intersects(cover) {
                me.is_hiding = true;
            }
        }
        for wall in self.map.solid_rects_around(me.pos) {
            if rect.intersects(&wall) {
                if me.velocity.0 > 0.0 {
                    rect.x = wall.x - rect.w;
                }
                if me.velocity.0 < 0.0 {
                    rect.x = wall.right();
                }
                me.pos.0 = rect.x;
            }
        }

        let mut on_ground = false;
        let mut on_ceiling = false;
        me.pos.1 += me.velocity.1;
        let mut rect = me.rect();
        for wall in self.map.solid_rects_around(me.pos) {
            if rect.intersects(&wall) {
                if me.velocity.1 > 0.0 {
                    rect.y = wall.y - rect.h;
                    on_ground = true;
                    me.jumps = 2;
                }
                if me.velocity.1 < 0.0 {
                    rect.y = wall.bottom();
                    on_ceiling = true;
                }
                me.pos.1 = rect.y;
            }
        }

        me.velocity.1 = MAX_FALL_SPEED.min(me.velocity.1 + GRAVITY);
        if on_ground {
            if me.velocity.0.abs() < GROUND_FRICTION {
                me.velocity.0 = 0.0;
            } else if me.velocity.0 > 0.0 {
                me.velocity.0 -= GROUND_FRICTION;
            } else {
                me.velocity.0 += GROUND_FRICTION;
            }
        }
        if on_ground || on_ceiling {
            me.velocity.1 = 0.0;
        }
        me.on_ground = on_ground;
    }

    /// Flies the local player's own shots. This simulation is the only
    /// one that resolves their hits against other participants; a hit
    /// marks the victim inside the projectile and leaves the real damage
    /// application to the victim's reconciler.
    fn update_own_projectiles(&mut self) {
        let mut projectiles = std::mem::take(&mut self.me.projectiles);
        for p in &mut projectiles {
            if p.detonated() {
                p.tick_explosion();
                continue;
            }
            if !p.is_exist {
                continue;
            }
            p.advance();
            if !p.ricochet() && p.exceeded_range() {
                p.is_exist = false;
                continue;
            }
            self.resolve_participant_hits(p);
            if p.in_flight() {
                self.resolve_terrain_hit(p);
            }
        }
        self.me.projectiles = projectiles;
    }

    fn resolve_participant_hits(&mut self, p: &mut Projectile) {
        let rect = p.rect();
        match p.payload {
            Payload::Kinetic { .. } => {
                let hit = self
                    .mirrors
                    .values_mut()
                    .find(|mirror| rect.intersects(&mirror.rect()));
                if let Some(mirror) = hit {
                    let id = mirror.id;
                    mirror.hp -= p.damage; // preview; the victim's sim is authoritative
                    p.credit(id);
                    p.detonate();
                }
            }
            Payload::Ballistic { .. } => {
                let direct_hit = self
                    .mirrors
                    .values()
                    .any(|mirror| rect.intersects(&mirror.rect()));
                if direct_hit {
                    self.explode(p);
                    return;
                }
                // The round starts inside the shooter; only after it has
                // flown clear can it come back and hurt them.
                if !p.left_shooter {
                    if !rect.intersects(&self.me.rect()) {
                        p.left_shooter = true;
                    }
                } else if rect.intersects(&self.me.rect()) {
                    self.explode(p);
                }
            }
        }
    }

    fn resolve_terrain_hit(&mut self, p: &mut Projectile) {
        let rect = p.rect();
        for wall in self.map.solid_rects_around(p.pos) {
            if rect.intersects(&wall) {
                match p.payload {
                    Payload::Kinetic { .. } => p.is_exist = false,
                    Payload::Ballistic { .. } => {
                        if p.ricochet() {
                            p.reflect(collision_normal(&rect, &wall));
                        } else {
                            self.explode(p);
                        }
                    }
                }
                break;
            }
        }
    }

    /// Area pass of a ballistic detonation: credit every participant in
    /// the blast radius. The shooter itself takes reduced damage locally,
    /// and no blast force if the weapon has its push power zeroed.
    fn explode(&mut self, p: &mut Projectile) {
        p.detonate();
        let blast = p.rect().center();

        for mirror in self.mirrors.values_mut() {
            if distance(blast, mirror.rect().center()) <= EXPLOSION_RADIUS {
                p.credit(mirror.id);
                mirror.hp -= p.damage;
            }
        }

        if distance(blast, self.me.rect().center()) <= EXPLOSION_RADIUS {
            p.credit(self.me.id);
            if p.knockback != 0.0 {
                self.push_from_blast(blast);
            }
            self.take_damage(p.damage * SELF_DAMAGE_FACTOR);
        }
    }

    /// Flies mirror projectiles between roster updates. Terrain stops
    /// them everywhere identically; participant hits stay with the
    /// shooter's simulation.
    fn update_foreign_projectiles(&mut self) {
        for p in &mut self.foreign {
            if p.detonated() {
                p.tick_explosion();
                continue;
            }
            if !p.is_exist {
                continue;
            }
            p.advance();
            if p.exceeded_range() {
                p.is_exist = false;
                continue;
            }
            let rect = p.rect();
            for wall in self.map.solid_rects_around(p.pos) {
                if rect.intersects(&wall) {
                    p.detonate();
                    break;
                }
            }
        }
    }

    fn update_doors(&mut self) {
        let mut actors: Vec<(Rect, (f32, f32), bool)> = vec![(
            self.me.rect(),
            self.me.pos,
            self.me.is_e_active,
        )];
        actors.extend(
            self.mirrors
                .values()
                .map(|m| (m.rect(), m.pos, m.is_e_active)),
        );

        for door in &mut self.doors {
            door.ticks = door.ticks.saturating_add(1);
            if door.ticks <= DOOR_COOLDOWN {
                continue;
            }
            let rect = door.rect();
            let blocked = actors.iter().any(|(r, _, _)| r.intersects(&rect));

            for (_, pos, active) in &actors {
                if !active || distance(door.world_pos(), *pos) >= DOOR_REACH {
                    continue;
                }
                let is_open = matches!(
                    self.map.block_kind_at(door.cell.0, door.cell.1),
                    Some(BlockKind::OpenedDoor | BlockKind::OpenedGrayDoor)
                );
                // An open door only closes when nobody stands in it.
                if (!is_open || !blocked)
                    && self.map.toggle_door(door.cell.0, door.cell.1)
                {
                    self.map_dirty = true;
                    debug!("door at {:?} toggled", door.cell);
                }
                door.ticks = 0;
                break;
            }
        }
    }

    /// Pickups on the map's potion cells. Heals apply to whoever stands
    /// on them, mirror hp being a preview as with hits. Buffs only ever
    /// change the local player; a mirror grabbing one just empties the
    /// cell here, its effect runs on the grabber's own simulation.
    fn update_potions(&mut self) {
        let me_rect = self.me.rect();

        for potion in &mut self.heal_potions {
            potion.tick();
            if !potion.is_active {
                continue;
            }
            let rect = potion.rect();
            if self.me.hp < MAX_HP && rect.intersects(&me_rect) {
                self.me.hp = (self.me.hp + HEAL_POWER).min(MAX_HP);
                potion.consume();
                continue;
            }
            for mirror in self.mirrors.values_mut() {
                if mirror.hp < MAX_HP && rect.intersects(&mirror.rect()) {
                    mirror.hp = (mirror.hp + HEAL_POWER).min(MAX_HP);
                    potion.consume();
                    break;
                }
            }
        }

        let mut rng = rand::thread_rng();
        for potion in &mut self.random_potions {
            if let Some(expired) = potion.tick(&mut rng) {
                match expired {
                    BuffKind::SpeedUp => self.me.max_run_speed = MAX_RUN_SPEED,
                    BuffKind::Immortality => self.me.is_immortal = false,
                    BuffKind::DamageUp => self.me.damage_factor = 1.0,
                }
            }
            if !potion.is_active {
                continue;
            }
            let rect = potion.rect();
            if rect.intersects(&me_rect) {
                match potion.consume() {
                    BuffKind::SpeedUp => self.me.max_run_speed = BUFF_RUN_SPEED,
                    BuffKind::Immortality => self.me.is_immortal = true,
                    BuffKind::DamageUp => self.me.damage_factor = BUFF_DAMAGE_FACTOR,
                }
            } else if self.mirrors.values().any(|m| rect.intersects(&m.rect())) {
                potion.deplete();
            }
        }
    }
}
