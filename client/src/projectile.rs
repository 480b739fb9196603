//! Live projectiles and their wire descriptors.
//!
//! Two families exist. Kinetic rounds fly straight, hit one victim and
//! vanish. Ballistic rounds detonate with area damage, can reflect off
//! terrain when fired in ricochet mode and may come back on their own
//! shooter. Either way the shooter's simulation is the only one that
//! resolves hits against other participants; the victims it credits are
//! carried inside the serialized descriptor under the projectile's
//! `(shooter, shot)` key.

use rand::Rng;
use shared::geom::{distance, normalize, Rect};
use shared::weapons::{kinetic_spec, KineticKind, WeaponClass, WeaponSpec};
use shared::{ProjectileState, EXPLOSION_TICKS, REFLECT_DAMPING, REFLECT_MIN_SPEED, WEAPONS};

/// Collision box side of a projectile in world units.
pub const PROJECTILE_SIZE: f32 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Ballistic {
        ricochet: bool,
        is_damaged: bool,
        damaged_players: Vec<u32>,
        /// Remaining explosion animation ticks; `Some` means detonated.
        explosion_ticks: Option<u32>,
    },
    Kinetic {
        weapon: KineticKind,
        is_damaged: bool,
        damaged_player: Option<u32>,
    },
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub payload: Payload,
    pub pos: (f32, f32),
    pub velocity: (f32, f32),
    pub direction: (f32, f32),
    pub start_pos: (f32, f32),
    pub range: f32,
    pub damage: f32,
    pub shooter: u32,
    pub shot: u64,
    /// Push power of the firing weapon. Zero disables the blast force a
    /// ballistic round applies to its own shooter.
    pub knockback: f32,
    pub is_exist: bool,
    /// Ballistic only: set once the round has cleared the shooter's own
    /// box, after which re-entering it counts as a self hit.
    pub left_shooter: bool,
}

impl Projectile {
    /// Fires one round of `spec` from `pos` toward `direction`, which
    /// need not be unit length. Spread and range jitter are rolled here.
    pub fn fire<R: Rng>(
        spec: &WeaponSpec,
        pos: (f32, f32),
        direction: (f32, f32),
        shooter: u32,
        shot: u64,
        rng: &mut R,
    ) -> Self {
        let direction = normalize(direction.0, direction.1);
        let (payload, velocity) = match spec.class {
            WeaponClass::Ballistic => (
                Payload::Ballistic {
                    ricochet: false,
                    is_damaged: false,
                    damaged_players: Vec::new(),
                    explosion_ticks: None,
                },
                (
                    direction.0 * spec.projectile_speed,
                    direction.1 * spec.projectile_speed,
                ),
            ),
            WeaponClass::Kinetic(kind) => {
                let spread = if spec.spread_deg > 0.0 {
                    rng.gen_range(-spec.spread_deg..spec.spread_deg)
                } else {
                    0.0
                };
                let angle = direction.1.atan2(direction.0) + spread.to_radians();
                (
                    Payload::Kinetic {
                        weapon: kind,
                        is_damaged: false,
                        damaged_player: None,
                    },
                    (
                        angle.cos() * spec.projectile_speed,
                        angle.sin() * spec.projectile_speed,
                    ),
                )
            }
        };

        let range = if spec.stability > 0.0 {
            rng.gen_range(spec.range * (1.0 - spec.stability)..spec.range * (1.0 + spec.stability))
        } else {
            spec.range
        };

        Self {
            payload,
            pos,
            velocity,
            direction,
            start_pos: pos,
            range,
            damage: spec.damage,
            shooter,
            shot,
            knockback: spec.push_power,
            is_exist: true,
            left_shooter: false,
        }
    }

    /// Rebuilds a mirror copy from a wire descriptor. Mirror copies only
    /// fly and draw; the shooter's simulation stays authoritative, so the
    /// travel budget restarting at the snapshot position is harmless.
    pub fn from_state(state: &ProjectileState) -> Self {
        match state {
            ProjectileState::Ballistic {
                pos,
                direction,
                damage,
                shot,
                shooter,
                is_damaged,
                is_exploded,
                damaged_players,
            } => {
                let spec = &WEAPONS[0];
                Self {
                    payload: Payload::Ballistic {
                        ricochet: false,
                        is_damaged: *is_damaged,
                        damaged_players: damaged_players.clone(),
                        explosion_ticks: is_exploded.then_some(EXPLOSION_TICKS),
                    },
                    pos: (pos[0], pos[1]),
                    velocity: (
                        direction[0] * spec.projectile_speed,
                        direction[1] * spec.projectile_speed,
                    ),
                    direction: (direction[0], direction[1]),
                    start_pos: (pos[0], pos[1]),
                    range: spec.range,
                    damage: *damage,
                    shooter: *shooter,
                    shot: *shot,
                    knockback: spec.push_power,
                    is_exist: true,
                    left_shooter: true,
                }
            }
            ProjectileState::Kinetic {
                weapon,
                pos,
                direction,
                damage,
                shot,
                shooter,
                is_exist,
                is_damaged,
                damaged_player,
            } => {
                let spec = kinetic_spec(*weapon);
                Self {
                    payload: Payload::Kinetic {
                        weapon: *weapon,
                        is_damaged: *is_damaged,
                        damaged_player: *damaged_player,
                    },
                    pos: (pos[0], pos[1]),
                    velocity: (
                        direction[0] * spec.projectile_speed,
                        direction[1] * spec.projectile_speed,
                    ),
                    direction: (direction[0], direction[1]),
                    start_pos: (pos[0], pos[1]),
                    range: spec.range,
                    damage: *damage,
                    shooter: *shooter,
                    shot: *shot,
                    knockback: spec.push_power,
                    is_exist: *is_exist,
                    left_shooter: true,
                }
            }
        }
    }

    pub fn to_state(&self) -> ProjectileState {
        match &self.payload {
            Payload::Ballistic {
                is_damaged,
                damaged_players,
                explosion_ticks,
                ..
            } => ProjectileState::Ballistic {
                pos: [self.pos.0, self.pos.1],
                direction: [self.direction.0, self.direction.1],
                damage: self.damage,
                shot: self.shot,
                shooter: self.shooter,
                is_damaged: *is_damaged,
                is_exploded: explosion_ticks.is_some(),
                damaged_players: damaged_players.clone(),
            },
            Payload::Kinetic {
                weapon,
                is_damaged,
                damaged_player,
            } => ProjectileState::Kinetic {
                weapon: *weapon,
                pos: [self.pos.0, self.pos.1],
                direction: [self.direction.0, self.direction.1],
                damage: self.damage,
                shot: self.shot,
                shooter: self.shooter,
                is_exist: self.is_exist,
                is_damaged: *is_damaged,
                damaged_player: *damaged_player,
            },
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.pos.0, self.pos.1, PROJECTILE_SIZE, PROJECTILE_SIZE)
    }

    pub fn advance(&mut self) {
        self.pos.0 += self.velocity.0;
        self.pos.1 += self.velocity.1;
    }

    pub fn exceeded_range(&self) -> bool {
        distance(self.pos, self.start_pos) > self.range
    }

    /// True while the projectile still flies and can interact.
    pub fn in_flight(&self) -> bool {
        self.is_exist && !self.detonated()
    }

    pub fn detonated(&self) -> bool {
        matches!(
            self.payload,
            Payload::Ballistic {
                explosion_ticks: Some(_),
                ..
            }
        )
    }

    pub fn ricochet(&self) -> bool {
        matches!(self.payload, Payload::Ballistic { ricochet: true, .. })
    }

    /// Adds `id` to the credited-victim set of this projectile.
    pub fn credit(&mut self, id: u32) {
        match &mut self.payload {
            Payload::Ballistic {
                damaged_players,
                is_damaged,
                ..
            } => {
                damaged_players.push(id);
                *is_damaged = true;
            }
            Payload::Kinetic {
                damaged_player,
                is_damaged,
                ..
            } => {
                *damaged_player = Some(id);
                *is_damaged = true;
            }
        }
    }

    /// Kills a kinetic round, starts the explosion of a ballistic one.
    pub fn detonate(&mut self) {
        match &mut self.payload {
            Payload::Ballistic {
                explosion_ticks,
                is_damaged,
                ..
            } => {
                if explosion_ticks.is_none() {
                    *explosion_ticks = Some(EXPLOSION_TICKS);
                }
                *is_damaged = true;
            }
            Payload::Kinetic { .. } => self.is_exist = false,
        }
    }

    /// Counts a detonated ballistic round through its explosion frames,
    /// removing it when they run out.
    pub fn tick_explosion(&mut self) {
        if let Payload::Ballistic {
            explosion_ticks: Some(ticks),
            ..
        } = &mut self.payload
        {
            if *ticks == 0 {
                self.is_exist = false;
            } else {
                *ticks -= 1;
            }
        }
    }

    /// Bounces off a surface with the given unit normal, losing speed.
    /// Detonates instead once too slow to keep flying.
    pub fn reflect(&mut self, normal: (f32, f32)) {
        // Step back out of the wall before changing course.
        self.pos.0 -= self.velocity.0;
        self.pos.1 -= self.velocity.1;

        let dot = self.velocity.0 * normal.0 + self.velocity.1 * normal.1;
        self.velocity = (
            (self.velocity.0 - 2.0 * dot * normal.0) * REFLECT_DAMPING,
            (self.velocity.1 - 2.0 * dot * normal.1) * REFLECT_DAMPING,
        );

        let speed = (self.velocity.0 * self.velocity.0 + self.velocity.1 * self.velocity.1).sqrt();
        if speed < REFLECT_MIN_SPEED {
            self.detonate();
            return;
        }
        self.direction = normalize(self.velocity.0, self.velocity.1);
    }
}

/// Which face of `wall` the projectile struck, as a unit normal.
pub fn collision_normal(projectile: &Rect, wall: &Rect) -> (f32, f32) {
    let (cx, cy) = projectile.center();
    let hit_x = cx.clamp(wall.x, wall.right());
    let hit_y = cy.clamp(wall.y, wall.bottom());

    if hit_x == wall.x {
        (-1.0, 0.0)
    } else if hit_x == wall.right() {
        (1.0, 0.0)
    } else if hit_y == wall.y {
        (0.0, -1.0)
    } else {
        (0.0, 1.0)
    }
}
