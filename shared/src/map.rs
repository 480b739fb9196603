//! The shared world map.
//!
//! A map is a flat document keyed by cell coordinate (`"x;y"`). It is
//! replicated whole: the hub stores the first non-empty map it sees as
//! canonical and replaces it only on a byte-different update, so the map
//! type keeps its keys sorted (`BTreeMap`) to make the canonical JSON
//! serialization deterministic and byte-comparable.

use crate::geom::Rect;
use crate::BLOCK_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire and file representation of a map document.
pub type BlockMap = BTreeMap<String, Block>;

/// Offsets of the 3×3 cell neighbourhood used by collision queries.
const NEIGHBOUR_OFFSETS: [(i32, i32); 9] = [
    (-1, 1),
    (0, 1),
    (1, 1),
    (-1, 0),
    (0, 0),
    (1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub pos: (i32, i32),
    /// Pixel size of hiding cover, which spans more than one cell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<(i32, i32)>,
    /// Present on cover blocks a participant can conceal behind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide: Option<bool>,
}

/// Closed vocabulary of map cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    // terrain
    Grass,
    LeftGrass,
    RightGrass,
    LeftGroundWall,
    Ground,
    RightGroundWall,
    LeftBottomGround,
    BottomGround,
    RightBottomGround,
    TopBrick,
    TopLeftBrick,
    TopRightBrick,
    LeftBrick,
    MidBrick,
    RightBrick,
    BottomBrick,
    BottomLeftBrick,
    BottomRightBrick,
    Glass,
    Wood,
    GrayBlock,
    // doors (closed doors are solid, open ones are not)
    ClosedDoor,
    OpenedDoor,
    ClosedGrayDoor,
    OpenedGrayDoor,
    // markers
    Spawnpoint,
    Heal,
    RandomPotion,
    // hiding cover
    Bush,
    BigWall,
}

impl BlockKind {
    pub fn is_solid(self) -> bool {
        use BlockKind::*;
        matches!(
            self,
            Grass
                | LeftGrass
                | RightGrass
                | LeftGroundWall
                | Ground
                | RightGroundWall
                | LeftBottomGround
                | BottomGround
                | RightBottomGround
                | TopBrick
                | TopLeftBrick
                | TopRightBrick
                | LeftBrick
                | MidBrick
                | RightBrick
                | BottomBrick
                | BottomLeftBrick
                | BottomRightBrick
                | Glass
                | Wood
                | GrayBlock
                | ClosedDoor
                | ClosedGrayDoor
        )
    }

    pub fn is_door(self) -> bool {
        use BlockKind::*;
        matches!(self, ClosedDoor | OpenedDoor | ClosedGrayDoor | OpenedGrayDoor)
    }

    /// Opposite door state, `None` for anything that is not a door.
    pub fn toggled(self) -> Option<BlockKind> {
        use BlockKind::*;
        match self {
            ClosedDoor => Some(OpenedDoor),
            OpenedDoor => Some(ClosedDoor),
            ClosedGrayDoor => Some(OpenedGrayDoor),
            OpenedGrayDoor => Some(ClosedGrayDoor),
            _ => None,
        }
    }
}

/// Map cell key for a cell coordinate.
pub fn cell_key(x: i32, y: i32) -> String {
    format!("{};{}", x, y)
}

/// Canonical serialization used for whole-document equality. Keys are
/// sorted by the BTreeMap, so equal maps serialize to equal bytes.
pub fn canonical_json(map: &BlockMap) -> String {
    serde_json::to_string(map).unwrap_or_default()
}

/// Collision rectangle of one block. Closed doors occupy two cells
/// vertically; every other solid fills exactly one.
pub fn block_rect(block: &Block) -> Rect {
    let height = match block.kind {
        BlockKind::ClosedDoor | BlockKind::ClosedGrayDoor => BLOCK_SIZE * 2.0,
        _ => BLOCK_SIZE,
    };
    Rect::new(
        block.pos.0 as f32 * BLOCK_SIZE,
        block.pos.1 as f32 * BLOCK_SIZE,
        BLOCK_SIZE,
        height,
    )
}

/// A loaded map plus the position indices derived from it.
///
/// The indices are derived once, on the initial map load. Later map
/// replacements (door toggles relayed by the hub) swap the cell contents
/// without re-deriving them, so transient per-cell state never resets
/// spawn or potion bookkeeping mid-session.
#[derive(Debug, Default, Clone)]
pub struct Blockmap {
    pub blocks: BlockMap,
    pub spawn_points: Vec<(i32, i32)>,
    pub heal_positions: Vec<(i32, i32)>,
    pub random_potion_positions: Vec<(i32, i32)>,
    pub door_positions: Vec<(i32, i32)>,
    pub hiding_rects: Vec<Rect>,
}

impl Blockmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial load: store the cells and derive every index.
    pub fn load(&mut self, blocks: BlockMap) {
        self.blocks = blocks;
        self.rebuild_indices();
    }

    /// Incremental replacement: cells only, indices untouched.
    pub fn replace(&mut self, blocks: BlockMap) {
        self.blocks = blocks;
    }

    fn rebuild_indices(&mut self) {
        self.spawn_points.clear();
        self.heal_positions.clear();
        self.random_potion_positions.clear();
        self.door_positions.clear();
        self.hiding_rects.clear();

        for block in self.blocks.values() {
            match block.kind {
                BlockKind::Spawnpoint => self.spawn_points.push(block.pos),
                BlockKind::Heal => self.heal_positions.push(block.pos),
                BlockKind::RandomPotion => self.random_potion_positions.push(block.pos),
                BlockKind::ClosedDoor | BlockKind::ClosedGrayDoor => {
                    self.door_positions.push(block.pos)
                }
                _ => {}
            }
            if block.hide.is_some() {
                let size = block.size.unwrap_or((BLOCK_SIZE as i32, BLOCK_SIZE as i32));
                self.hiding_rects.push(Rect::new(
                    block.pos.0 as f32 * BLOCK_SIZE,
                    block.pos.1 as f32 * BLOCK_SIZE,
                    size.0 as f32,
                    size.1 as f32,
                ));
            }
        }
    }

    /// Blocks in the 3×3 cell neighbourhood of a world position.
    pub fn blocks_around(&self, pos: (f32, f32)) -> Vec<&Block> {
        let cell = (
            (pos.0 / BLOCK_SIZE).floor() as i32,
            (pos.1 / BLOCK_SIZE).floor() as i32,
        );
        NEIGHBOUR_OFFSETS
            .iter()
            .filter_map(|(dx, dy)| self.blocks.get(&cell_key(cell.0 + dx, cell.1 + dy)))
            .collect()
    }

    /// Collision rectangles of the solid blocks around a world position.
    pub fn solid_rects_around(&self, pos: (f32, f32)) -> Vec<Rect> {
        self.blocks_around(pos)
            .into_iter()
            .filter(|block| block.kind.is_solid())
            .map(block_rect)
            .collect()
    }

    pub fn block_kind_at(&self, x: i32, y: i32) -> Option<BlockKind> {
        self.blocks.get(&cell_key(x, y)).map(|b| b.kind)
    }

    /// Flips a door cell between open and closed. Returns false when the
    /// cell is missing or not a door.
    pub fn toggle_door(&mut self, x: i32, y: i32) -> bool {
        if let Some(block) = self.blocks.get_mut(&cell_key(x, y)) {
            if let Some(next) = block.kind.toggled() {
                block.kind = next;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: BlockKind, x: i32, y: i32) -> Block {
        Block {
            kind,
            pos: (x, y),
            size: None,
            hide: None,
        }
    }

    fn put(map: &mut BlockMap, kind: BlockKind, x: i32, y: i32) {
        map.insert(cell_key(x, y), block(kind, x, y));
    }

    #[test]
    fn test_solidity_rules() {
        assert!(BlockKind::Grass.is_solid());
        assert!(BlockKind::ClosedDoor.is_solid());
        assert!(!BlockKind::OpenedDoor.is_solid());
        assert!(!BlockKind::Spawnpoint.is_solid());
        assert!(!BlockKind::Bush.is_solid());
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&block(BlockKind::ClosedGrayDoor, 2, 3)).unwrap();
        assert!(json.contains("\"type\":\"closed_gray_door\""));
        assert!(!json.contains("size"));

        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, BlockKind::ClosedGrayDoor);
    }

    #[test]
    fn test_closed_door_spans_two_cells() {
        let rect = block_rect(&block(BlockKind::ClosedDoor, 1, 1));
        assert_eq!(rect.h, BLOCK_SIZE * 2.0);
        let rect = block_rect(&block(BlockKind::Grass, 1, 1));
        assert_eq!(rect.h, BLOCK_SIZE);
    }

    #[test]
    fn test_canonical_json_is_order_independent() {
        let mut a = BlockMap::new();
        put(&mut a, BlockKind::Grass, 0, 0);
        put(&mut a, BlockKind::Ground, 1, 0);

        let mut b = BlockMap::new();
        put(&mut b, BlockKind::Ground, 1, 0);
        put(&mut b, BlockKind::Grass, 0, 0);

        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_index_derivation_only_on_load() {
        let mut blocks = BlockMap::new();
        put(&mut blocks, BlockKind::Spawnpoint, 2, 2);
        put(&mut blocks, BlockKind::Heal, 3, 2);
        put(&mut blocks, BlockKind::ClosedDoor, 4, 2);

        let mut map = Blockmap::new();
        map.load(blocks.clone());
        assert_eq!(map.spawn_points, vec![(2, 2)]);
        assert_eq!(map.heal_positions, vec![(3, 2)]);
        assert_eq!(map.door_positions, vec![(4, 2)]);

        // A door toggle arrives as a whole-map replacement; indices stay.
        let mut toggled = blocks.clone();
        toggled.get_mut(&cell_key(4, 2)).unwrap().kind = BlockKind::OpenedDoor;
        map.replace(toggled);
        assert_eq!(map.door_positions, vec![(4, 2)]);
        assert_eq!(map.block_kind_at(4, 2), Some(BlockKind::OpenedDoor));
    }

    #[test]
    fn test_solid_rects_around() {
        let mut blocks = BlockMap::new();
        put(&mut blocks, BlockKind::Grass, 0, 1);
        put(&mut blocks, BlockKind::Spawnpoint, 1, 1);
        put(&mut blocks, BlockKind::Grass, 10, 10); // out of neighbourhood

        let mut map = Blockmap::new();
        map.load(blocks);

        let rects = map.solid_rects_around((8.0, 8.0));
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0], Rect::new(0.0, BLOCK_SIZE, BLOCK_SIZE, BLOCK_SIZE));
    }

    #[test]
    fn test_toggle_door() {
        let mut blocks = BlockMap::new();
        put(&mut blocks, BlockKind::ClosedDoor, 5, 5);
        put(&mut blocks, BlockKind::Grass, 6, 5);

        let mut map = Blockmap::new();
        map.load(blocks);

        assert!(map.toggle_door(5, 5));
        assert_eq!(map.block_kind_at(5, 5), Some(BlockKind::OpenedDoor));
        assert!(map.toggle_door(5, 5));
        assert_eq!(map.block_kind_at(5, 5), Some(BlockKind::ClosedDoor));

        assert!(!map.toggle_door(6, 5));
        assert!(!map.toggle_door(9, 9));
    }

    #[test]
    fn test_hiding_rect_uses_block_size() {
        let mut blocks = BlockMap::new();
        blocks.insert(
            cell_key(1, 1),
            Block {
                kind: BlockKind::BigWall,
                pos: (1, 1),
                size: Some((32, 48)),
                hide: Some(true),
            },
        );

        let mut map = Blockmap::new();
        map.load(blocks);
        assert_eq!(map.hiding_rects, vec![Rect::new(16.0, 16.0, 32.0, 48.0)]);
    }
}
