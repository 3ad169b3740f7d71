//! Tile map and pixel/tile coordinate conversion
//!
//! The grid is the only terrain the simulation knows about. Rocks at rest are
//! stored here as `Tile::Rock`; a rock is lifted out of the map the moment it
//! starts falling.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::Direction;
use crate::consts::*;

/// Terrain value of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tile {
    Empty,
    Dirt,
    Rock,
}

/// Fixed-size tile map, row-major
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(GRID_WIDTH, GRID_HEIGHT)
    }
}

impl Grid {
    /// Solid dirt with the sky rows cleared
    pub fn new(width: usize, height: usize) -> Self {
        let mut grid = Self {
            width,
            height,
            tiles: vec![Tile::Dirt; width * height],
        };
        grid.reset();
        grid
    }

    /// Refill with dirt for a fresh level (the only way dirt comes back)
    pub fn reset(&mut self) {
        for row in 0..self.height {
            let fill = if row < SKY_ROWS { Tile::Empty } else { Tile::Dirt };
            for col in 0..self.width {
                self.tiles[row * self.width + col] = fill;
            }
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major tile slice for renderers
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Size of the playfield in pixels
    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(
            self.width as f32 * TILE_SIZE,
            self.height as f32 * TILE_SIZE,
        )
    }

    #[inline]
    pub fn in_bounds(&self, col: i32, row: i32) -> bool {
        col >= 0 && row >= 0 && (col as usize) < self.width && (row as usize) < self.height
    }

    #[inline]
    fn index(&self, col: i32, row: i32) -> Option<usize> {
        self.in_bounds(col, row)
            .then(|| row as usize * self.width + col as usize)
    }

    /// Tile at a cell; anything outside the map reads as dirt
    pub fn tile_at(&self, col: i32, row: i32) -> Tile {
        self.index(col, row).map_or(Tile::Dirt, |i| self.tiles[i])
    }

    /// Overwrite a cell. Returns false for out-of-bounds cells and for
    /// attempts to put anything but `Empty` into the sky rows.
    pub fn set_tile(&mut self, col: i32, row: i32, tile: Tile) -> bool {
        if tile != Tile::Empty && (row as usize) < SKY_ROWS {
            return false;
        }
        match self.index(col, row) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    /// Convert dirt to empty. True only when the cell actually changed.
    pub fn dig(&mut self, col: i32, row: i32) -> bool {
        match self.index(col, row) {
            Some(i) if self.tiles[i] == Tile::Dirt => {
                self.tiles[i] = Tile::Empty;
                true
            }
            _ => false,
        }
    }

    pub fn place_rock(&mut self, col: i32, row: i32) -> bool {
        self.set_tile(col, row, Tile::Rock)
    }

    /// Lift a rock out of the map, leaving the cell empty
    pub fn remove_rock(&mut self, col: i32, row: i32) -> bool {
        match self.index(col, row) {
            Some(i) if self.tiles[i] == Tile::Rock => {
                self.tiles[i] = Tile::Empty;
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn is_empty(&self, col: i32, row: i32) -> bool {
        self.tile_at(col, row) == Tile::Empty
    }

    #[inline]
    pub fn is_dirt(&self, col: i32, row: i32) -> bool {
        self.tile_at(col, row) == Tile::Dirt
    }

    #[inline]
    pub fn is_rock(&self, col: i32, row: i32) -> bool {
        self.tile_at(col, row) == Tile::Rock
    }

    /// Clear a horizontal run of tiles (inclusive range)
    pub fn clear_horizontal(&mut self, row: i32, col_start: i32, col_end: i32) {
        let (a, b) = (col_start.min(col_end), col_start.max(col_end));
        for col in a..=b {
            self.set_tile(col, row, Tile::Empty);
        }
    }

    /// Clear a vertical run of tiles (inclusive range)
    pub fn clear_vertical(&mut self, col: i32, row_start: i32, row_end: i32) {
        let (a, b) = (row_start.min(row_end), row_start.max(row_end));
        for row in a..=b {
            self.set_tile(col, row, Tile::Empty);
        }
    }

    /// Count of cells holding `tile`
    pub fn count(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|&&t| t == tile).count()
    }

    /// First empty cell below the sky in row-major order that satisfies `accept`
    pub fn find_empty(&self, mut accept: impl FnMut(i32, i32) -> bool) -> Option<(i32, i32)> {
        (SKY_ROWS as i32..self.height as i32)
            .flat_map(|row| (0..self.width as i32).map(move |col| (col, row)))
            .find(|&(col, row)| self.is_empty(col, row) && accept(col, row))
    }

    /// Whether a tile-sized box at `pos` (top-left) is clear of rock tiles
    pub fn is_position_valid(&self, pos: Vec2) -> bool {
        corner_cells(pos)
            .iter()
            .all(|&(col, row)| !self.is_rock(col, row))
    }

    /// Whether every corner of a tile-sized box lies in an empty tile
    pub fn is_box_in_tunnel(&self, pos: Vec2) -> bool {
        corner_cells(pos)
            .iter()
            .all(|&(col, row)| self.is_empty(col, row))
    }
}

/// Floor-division mapping from a pixel to the cell containing it
#[inline]
pub fn pixel_to_grid(p: Vec2) -> (i32, i32) {
    (
        (p.x / TILE_SIZE).floor() as i32,
        (p.y / TILE_SIZE).floor() as i32,
    )
}

/// Top-left pixel of a cell
#[inline]
pub fn grid_to_pixel(col: i32, row: i32) -> Vec2 {
    Vec2::new(col as f32 * TILE_SIZE, row as f32 * TILE_SIZE)
}

/// Centre pixel of a cell
#[inline]
pub fn tile_center(col: i32, row: i32) -> Vec2 {
    grid_to_pixel(col, row) + Vec2::splat(TILE_SIZE / 2.0)
}

/// Distance from `pos` to the next tile boundary along `dir`. A position
/// already on a boundary is a full tile away from the next one.
pub fn distance_to_boundary(pos: Vec2, dir: Direction) -> f32 {
    let v = if dir.is_horizontal() { pos.x } else { pos.y };
    let rem = v.rem_euclid(TILE_SIZE);
    if rem < ALIGN_EPSILON || TILE_SIZE - rem < ALIGN_EPSILON {
        TILE_SIZE
    } else if matches!(dir, Direction::Right | Direction::Down) {
        TILE_SIZE - rem
    } else {
        rem
    }
}

/// Cells under the four (inset) corners of a tile-sized box at `pos`
pub fn corner_cells(pos: Vec2) -> [(i32, i32); 4] {
    let lo = CORNER_INSET;
    let hi = TILE_SIZE - CORNER_INSET;
    [
        pixel_to_grid(pos + Vec2::new(lo, lo)),
        pixel_to_grid(pos + Vec2::new(hi, lo)),
        pixel_to_grid(pos + Vec2::new(lo, hi)),
        pixel_to_grid(pos + Vec2::new(hi, hi)),
    ]
}
