//! Tile grid and solidity oracle.
//!
//! The map loader is an external collaborator; it hands the simulation a
//! ready [`TileGrid`] plus named spawn locations. The grid is a row-major
//! byte array where the sentinel byte means "not solid" and any other value
//! is solid. There is no per-tile physics variance.

use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// Sentinel byte marking a non-solid cell.
pub const EMPTY_TILE: i8 = -128;

/// Immutable-per-tick solidity oracle over a row-major byte grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tile_width: f32,
    tile_height: f32,
    tiles: Vec<i8>,
}

impl TileGrid {
    /// Creates an all-empty grid.
    pub fn new(width: usize, height: usize, tile_width: f32, tile_height: f32) -> Self {
        Self {
            width,
            height,
            tile_width,
            tile_height,
            tiles: vec![EMPTY_TILE; width * height],
        }
    }

    /// Builds a grid from an existing row-major byte array.
    pub fn from_tiles(
        width: usize,
        height: usize,
        tile_width: f32,
        tile_height: f32,
        tiles: Vec<i8>,
    ) -> anyhow::Result<Self> {
        ensure!(
            tiles.len() == width * height,
            "tile array length {} does not match {}x{}",
            tiles.len(),
            width,
            height
        );
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
            tiles,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_width(&self) -> f32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> f32 {
        self.tile_height
    }

    /// Writes one cell. Out-of-range coordinates are ignored.
    pub fn set(&mut self, tile_x: usize, tile_y: usize, value: i8) {
        if tile_x < self.width && tile_y < self.height {
            self.tiles[tile_y * self.width + tile_x] = value;
        }
    }

    /// Whether the cell at tile coordinates is solid. Coordinates are
    /// clamped to the grid, so the border extends outward and a lookup can
    /// never index outside the array.
    pub fn is_solid(&self, tile_x: i32, tile_y: i32) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let tx = tile_x.clamp(0, self.width as i32 - 1) as usize;
        let ty = tile_y.clamp(0, self.height as i32 - 1) as usize;
        self.tiles[ty * self.width + tx] != EMPTY_TILE
    }

    /// AABB-vs-grid overlap test: converts the box corners to tile
    /// coordinates and scans the inclusive tile rectangle between them.
    pub fn overlaps(&self, left: f32, bottom: f32, right: f32, top: f32) -> bool {
        let tile_left = (left / self.tile_width).floor() as i32;
        let tile_bottom = (bottom / self.tile_height).floor() as i32;
        let tile_right = (right / self.tile_width).floor() as i32;
        let tile_top = (top / self.tile_height).floor() as i32;

        for ty in tile_bottom..=tile_top {
            for tx in tile_left..=tile_right {
                if self.is_solid(tx, ty) {
                    return true;
                }
            }
        }
        false
    }
}

/// Named spawn location supplied by the map collaborator, in world units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Built-in arena standing in for the out-of-scope map parser: a walled
/// 24x14 room with a floor, two ledges, and a spawn point per side.
pub fn starter_arena() -> (TileGrid, Vec<SpawnPoint>) {
    const TILE: f32 = 16.0;
    let mut grid = TileGrid::new(24, 14, TILE, TILE);

    for tx in 0..24 {
        grid.set(tx, 0, 1);
        grid.set(tx, 13, 1);
    }
    for ty in 0..14 {
        grid.set(0, ty, 1);
        grid.set(23, ty, 1);
    }
    for tx in 4..9 {
        grid.set(tx, 4, 2);
    }
    for tx in 15..20 {
        grid.set(tx, 4, 2);
    }

    let spawns = vec![
        SpawnPoint {
            name: "p1_start".to_string(),
            x: 2.0 * TILE,
            y: TILE,
            width: TILE,
            height: TILE,
        },
        SpawnPoint {
            name: "p2_start".to_string(),
            x: 21.0 * TILE,
            y: TILE,
            width: TILE,
            height: TILE,
        },
    ];

    (grid, spawns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_not_solid() {
        let mut grid = TileGrid::new(4, 4, 16.0, 16.0);
        assert!(!grid.is_solid(1, 1));
        grid.set(1, 1, 0);
        assert!(grid.is_solid(1, 1));
        grid.set(1, 1, EMPTY_TILE);
        assert!(!grid.is_solid(1, 1));
    }

    #[test]
    fn out_of_range_lookup_clamps_to_border() {
        let mut grid = TileGrid::new(3, 3, 16.0, 16.0);
        grid.set(0, 0, 1);
        assert!(grid.is_solid(-5, -5));
        assert!(!grid.is_solid(10, 10));
    }

    #[test]
    fn box_overlap_scans_inclusive_tile_rect() {
        let mut grid = TileGrid::new(10, 1, 16.0, 16.0);
        grid.set(5, 0, 1);
        // Box fully inside tile 4.
        assert!(!grid.overlaps(64.0, 0.0, 72.0, 8.0));
        // Box straddling tiles 4..5.
        assert!(grid.overlaps(76.0, 0.0, 84.0, 8.0));
        // Box fully inside tile 5.
        assert!(grid.overlaps(81.0, 0.0, 90.0, 8.0));
    }

    #[test]
    fn from_tiles_rejects_bad_length() {
        assert!(TileGrid::from_tiles(3, 3, 16.0, 16.0, vec![EMPTY_TILE; 8]).is_err());
        assert!(TileGrid::from_tiles(3, 3, 16.0, 16.0, vec![EMPTY_TILE; 9]).is_ok());
    }

    #[test]
    fn starter_arena_has_floor_and_spawns() {
        let (grid, spawns) = starter_arena();
        assert!(grid.is_solid(10, 0));
        assert!(!grid.is_solid(10, 1));
        assert!(spawns.iter().any(|s| s.name == "p1_start"));
        assert!(spawns.iter().any(|s| s.name == "p2_start"));
    }
}
