//! Pickups placed on the map's potion marker cells.
//!
//! A heal pickup restores hp on contact and returns after a respawn
//! delay. A buff pickup grants one of three timed effects to whoever
//! grabs it; the effect itself lives on the local player, the potion only
//! keeps the timers. Pickups are map-derived local state: every
//! simulation runs them against the same marker cells, and a mirror
//! walking over one consumes it here too.

use rand::Rng;
use shared::geom::Rect;
use shared::BLOCK_SIZE;

/// Hp restored by a heal pickup.
pub const HEAL_POWER: f32 = 40.0;
/// Ticks before a consumed heal pickup returns.
pub const HEAL_RESPAWN_TICKS: u32 = 300;
/// Ticks before a consumed buff pickup returns.
pub const BUFF_RESPAWN_TICKS: u32 = 600;
/// How long a grabbed buff lasts.
pub const BUFF_TICKS: u32 = 300;
/// Run speed cap while the speed buff is active.
pub const BUFF_RUN_SPEED: f32 = 4.0;
/// Outgoing damage multiplier while the damage buff is active.
pub const BUFF_DAMAGE_FACTOR: f32 = 2.0;

#[derive(Debug)]
pub struct HealPotion {
    pub pos: (f32, f32),
    pub is_active: bool,
    timer: u32,
}

impl HealPotion {
    pub fn new(cell: (i32, i32)) -> Self {
        Self {
            pos: (cell.0 as f32 * BLOCK_SIZE, cell.1 as f32 * BLOCK_SIZE),
            is_active: true,
            timer: 0,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.pos.0, self.pos.1, BLOCK_SIZE, BLOCK_SIZE)
    }

    /// Counts a consumed pickup back in.
    pub fn tick(&mut self) {
        if !self.is_active {
            self.timer += 1;
            if self.timer >= HEAL_RESPAWN_TICKS {
                self.is_active = true;
            }
        }
    }

    pub fn consume(&mut self) {
        self.is_active = false;
        self.timer = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuffKind {
    SpeedUp,
    Immortality,
    DamageUp,
}

impl BuffKind {
    pub fn roll<R: Rng>(rng: &mut R) -> Self {
        match rng.gen_range(0..3) {
            0 => BuffKind::SpeedUp,
            1 => BuffKind::Immortality,
            _ => BuffKind::DamageUp,
        }
    }
}

#[derive(Debug)]
pub struct RandomPotion {
    pub pos: (f32, f32),
    pub is_active: bool,
    /// Rolled at spawn; whoever grabs the potion gets this effect.
    pub buff: BuffKind,
    pub is_buff_active: bool,
    pub buff_timer: u32,
    spawn_timer: u32,
}

impl RandomPotion {
    pub fn new<R: Rng>(cell: (i32, i32), rng: &mut R) -> Self {
        Self {
            pos: (cell.0 as f32 * BLOCK_SIZE, cell.1 as f32 * BLOCK_SIZE),
            is_active: true,
            buff: BuffKind::roll(rng),
            is_buff_active: false,
            buff_timer: 0,
            spawn_timer: 0,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.pos.0, self.pos.1, BLOCK_SIZE, BLOCK_SIZE)
    }

    /// Advances the respawn and buff timers. Returns the buff that just
    /// ran out, if any, so the holder can revert its effect.
    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> Option<BuffKind> {
        if !self.is_active {
            self.spawn_timer += 1;
            if self.spawn_timer >= BUFF_RESPAWN_TICKS {
                self.is_active = true;
                self.buff = BuffKind::roll(rng);
            }
        }
        if self.is_buff_active {
            self.buff_timer += 1;
            if self.buff_timer >= BUFF_TICKS {
                self.is_buff_active = false;
                return Some(self.buff);
            }
        }
        None
    }

    /// Local pickup: the potion disappears and its buff starts running.
    pub fn consume(&mut self) -> BuffKind {
        self.is_active = false;
        self.spawn_timer = 0;
        self.buff_timer = 0;
        self.is_buff_active = true;
        self.buff
    }

    /// Picked up by someone else's simulation; no local effect runs.
    pub fn deplete(&mut self) {
        self.is_active = false;
        self.spawn_timer = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heal_respawn_timer() {
        let mut potion = HealPotion::new((3, 3));
        assert_eq!(potion.pos, (48.0, 48.0));

        potion.consume();
        assert!(!potion.is_active);
        for _ in 0..HEAL_RESPAWN_TICKS {
            potion.tick();
        }
        assert!(potion.is_active);
    }

    #[test]
    fn test_buff_expiry_reported_once() {
        let mut rng = rand::thread_rng();
        let mut potion = RandomPotion::new((1, 1), &mut rng);
        let buff = potion.consume();
        assert!(potion.is_buff_active);

        let mut expirations = Vec::new();
        for _ in 0..BUFF_TICKS + 10 {
            if let Some(expired) = potion.tick(&mut rng) {
                expirations.push(expired);
            }
        }
        assert_eq!(expirations, vec![buff]);
        assert!(!potion.is_buff_active);
    }

    #[test]
    fn test_depleted_potion_respawns_without_buff() {
        let mut rng = rand::thread_rng();
        let mut potion = RandomPotion::new((1, 1), &mut rng);
        potion.deplete();
        assert!(!potion.is_active);
        assert!(!potion.is_buff_active);

        for _ in 0..BUFF_RESPAWN_TICKS {
            potion.tick(&mut rng);
        }
        assert!(potion.is_active);
    }
}
