//! Grappling hook.
//!
//! The hook is a point that flies out from the player, latches onto the
//! first solid cell it enters and then acts as a rope: once the player
//! drifts past the latched rope length, a spring force proportional to
//! the overshoot pulls them back. Releasing the trigger tears the rope.

use shared::geom::{distance, normalize};
use shared::map::Blockmap;
use shared::{HOOK_MAX_LENGTH, HOOK_SPEED, HOOK_TENSION};

#[derive(Debug, Clone)]
pub struct Hook {
    pub pos: (f32, f32),
    pub velocity: (f32, f32),
    /// Rope length latched at anchor time; shrinks as the player reels in.
    pub length: f32,
    pub is_hooked: bool,
    pub is_rope_torn: bool,
}

impl Default for Hook {
    fn default() -> Self {
        Self::new()
    }
}

impl Hook {
    pub fn new() -> Self {
        Self {
            pos: (0.0, 0.0),
            velocity: (0.0, 0.0),
            length: 0.0,
            is_hooked: false,
            is_rope_torn: true,
        }
    }

    /// Fires the hook from the player center toward `direction`, which
    /// need not be unit length. A live rope must be torn before it can be
    /// re-fired.
    pub fn shoot(&mut self, origin: (f32, f32), direction: (f32, f32)) {
        if !self.is_rope_torn {
            return;
        }
        let (dx, dy) = normalize(direction.0, direction.1);
        self.is_rope_torn = false;
        self.is_hooked = false;
        self.pos = origin;
        self.velocity = (dx * HOOK_SPEED, dy * HOOK_SPEED);
        self.length = 0.0;
    }

    pub fn tear(&mut self) {
        self.is_rope_torn = true;
        self.is_hooked = false;
    }

    /// One tick of hook motion. `holding` mirrors the fire button; letting
    /// go tears the rope. Returns the pull force to add to the player's
    /// velocity, if the rope is taut.
    pub fn update(
        &mut self,
        map: &Blockmap,
        player_center: (f32, f32),
        holding: bool,
    ) -> Option<(f32, f32)> {
        if !holding {
            self.tear();
        }

        if self.is_hooked {
            return self.pull(player_center);
        }

        if !self.is_rope_torn {
            self.fly(player_center);
            self.latch(map);
        }
        None
    }

    fn fly(&mut self, player_center: (f32, f32)) {
        self.pos = (self.pos.0 + self.velocity.0, self.pos.1 + self.velocity.1);
        self.length = distance(player_center, self.pos);
        if self.length > HOOK_MAX_LENGTH {
            self.tear();
        }
    }

    fn latch(&mut self, map: &Blockmap) {
        if self.is_rope_torn {
            return;
        }
        for rect in map.solid_rects_around(self.pos) {
            if rect.contains_point(self.pos) {
                self.is_hooked = true;
                break;
            }
        }
    }

    fn pull(&mut self, player_center: (f32, f32)) -> Option<(f32, f32)> {
        let dx = self.pos.0 - player_center.0;
        let dy = self.pos.1 - player_center.1;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist > HOOK_MAX_LENGTH {
            self.tear();
            return None;
        }

        if dist > self.length {
            let force = (dist - self.length) * HOOK_TENSION;
            Some((force * dx / dist, force * dy / dist))
        } else {
            // Reeling in: remember the shortest distance reached.
            self.length = dist;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::map::{cell_key, Block, BlockKind, BlockMap};

    fn wall_map(x: i32, y: i32) -> Blockmap {
        let mut blocks = BlockMap::new();
        blocks.insert(
            cell_key(x, y),
            Block {
                kind: BlockKind::Grass,
                pos: (x, y),
                size: None,
                hide: None,
            },
        );
        let mut map = Blockmap::new();
        map.load(blocks);
        map
    }

    #[test]
    fn test_shoot_requires_torn_rope() {
        let mut hook = Hook::new();
        hook.shoot((0.0, 0.0), (1.0, 0.0));
        assert!(!hook.is_rope_torn);

        // A second shot while the rope is live is ignored.
        hook.shoot((50.0, 50.0), (0.0, 1.0));
        assert_eq!(hook.pos, (0.0, 0.0));
    }

    #[test]
    fn test_shoot_normalizes_direction() {
        let mut hook = Hook::new();
        hook.shoot((0.0, 0.0), (0.0, 4.0));
        assert_approx_eq!(hook.velocity.0, 0.0);
        assert_approx_eq!(hook.velocity.1, HOOK_SPEED);
    }

    #[test]
    fn test_hook_latches_on_solid_cell() {
        let map = wall_map(3, 0); // cell at x 48..64
        let mut hook = Hook::new();
        hook.shoot((0.0, 8.0), (1.0, 0.0));

        let mut hooked = false;
        for _ in 0..10 {
            hook.update(&map, (0.0, 8.0), true);
            if hook.is_hooked {
                hooked = true;
                break;
            }
        }
        assert!(hooked);
        assert!(!hook.is_rope_torn);
    }

    #[test]
    fn test_rope_tears_past_max_length() {
        let map = wall_map(100, 100); // nothing to latch on near the flight path
        let mut hook = Hook::new();
        hook.shoot((0.0, 0.0), (1.0, 0.0));

        for _ in 0..((HOOK_MAX_LENGTH / HOOK_SPEED) as usize + 2) {
            hook.update(&map, (0.0, 0.0), true);
        }
        assert!(hook.is_rope_torn);
        assert!(!hook.is_hooked);
    }

    #[test]
    fn test_release_tears_rope() {
        let map = wall_map(3, 0);
        let mut hook = Hook::new();
        hook.shoot((0.0, 8.0), (1.0, 0.0));
        hook.update(&map, (0.0, 8.0), false);
        assert!(hook.is_rope_torn);
    }

    #[test]
    fn test_taut_rope_pulls_toward_anchor() {
        let mut hook = Hook::new();
        hook.is_rope_torn = false;
        hook.is_hooked = true;
        hook.pos = (100.0, 0.0);
        hook.length = 50.0;

        let map = wall_map(50, 50);
        let force = hook.update(&map, (0.0, 0.0), true).expect("taut rope");
        // 50 units past the latched length, scaled by tension, along +x.
        assert_approx_eq!(force.0, 50.0 * HOOK_TENSION);
        assert_approx_eq!(force.1, 0.0);
    }

    #[test]
    fn test_slack_rope_shortens() {
        let mut hook = Hook::new();
        hook.is_rope_torn = false;
        hook.is_hooked = true;
        hook.pos = (30.0, 0.0);
        hook.length = 50.0;

        let map = wall_map(50, 50);
        assert!(hook.update(&map, (0.0, 0.0), true).is_none());
        assert_approx_eq!(hook.length, 30.0);
    }
}
