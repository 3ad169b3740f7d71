//! Geometric predicates used by the collision pass
//!
//! Everything here is pure: no state is mutated and the same inputs always
//! give the same answer.

use glam::Vec2;

use super::grid::{Grid, Tile};
use crate::consts::TILE_SIZE;

/// Axis-aligned box given by its top-left corner and size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub size: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, size: Vec2) -> Self {
        Self { min, size }
    }

    /// Tile-sized hitbox at `pos`
    pub fn tile(pos: Vec2) -> Self {
        Self::new(pos, Vec2::splat(TILE_SIZE))
    }

    /// Shrink evenly on all sides (forgiving contact boxes)
    pub fn shrink(self, margin: f32) -> Self {
        let size = (self.size - Vec2::splat(margin * 2.0)).max(Vec2::ZERO);
        Self::new(self.min + Vec2::splat(margin), size)
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        self.min + self.size
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.min + self.size * 0.5
    }

    /// Strict overlap test (touching edges do not count)
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let a_max = self.max();
        let b_max = other.max();
        self.min.x < b_max.x && other.min.x < a_max.x && self.min.y < b_max.y && other.min.y < a_max.y
    }
}

/// Overlap test for two tile-sized hitboxes
#[inline]
pub fn tiles_overlap(a: Vec2, b: Vec2) -> bool {
    Aabb::tile(a).overlaps(&Aabb::tile(b))
}

/// Length of the horizontal overlap of two tile-sized boxes (<= 0 means apart)
#[inline]
pub fn horizontal_overlap(a_x: f32, b_x: f32) -> f32 {
    (a_x + TILE_SIZE).min(b_x + TILE_SIZE) - a_x.max(b_x)
}

/// Perpendicular distance from `p` to segment `a..b`, with the projection
/// clamped onto the segment
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Bresenham walk between two cells. Fails if any traversed cell is dirt.
pub fn line_of_sight(grid: &Grid, from: (i32, i32), to: (i32, i32)) -> bool {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if grid.tile_at(x, y) == Tile::Dirt {
            return false;
        }
        if (x, y) == to {
            return true;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::grid::grid_to_pixel;

    #[test]
    fn test_tiles_overlap() {
        let a = grid_to_pixel(2, 2);
        assert!(tiles_overlap(a, a + Vec2::new(31.0, 0.0)));
        // Touching edges are not an overlap
        assert!(!tiles_overlap(a, a + Vec2::new(32.0, 0.0)));
        assert!(!tiles_overlap(a, a + Vec2::new(0.0, 40.0)));
    }

    #[test]
    fn test_shrink_reduces_contact() {
        let a = Aabb::tile(Vec2::ZERO).shrink(8.0);
        let b = Aabb::tile(Vec2::new(20.0, 0.0)).shrink(8.0);
        assert!(!a.overlaps(&b));
        let c = Aabb::tile(Vec2::new(12.0, 0.0)).shrink(8.0);
        assert!(a.overlaps(&c));
    }

    #[test]
    fn test_horizontal_overlap() {
        assert_eq!(horizontal_overlap(0.0, 0.0), TILE_SIZE);
        assert_eq!(horizontal_overlap(0.0, 20.0), 12.0);
        assert!(horizontal_overlap(0.0, 40.0) < 0.0);
    }

    #[test]
    fn test_point_segment_distance_perpendicular() {
        let d = point_segment_distance(Vec2::new(5.0, 3.0), Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert!((d - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_point_segment_distance_clamped() {
        // Beyond the far end: distance to the endpoint
        let d = point_segment_distance(Vec2::new(14.0, 3.0), Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-5);
        // Behind the start
        let d = point_segment_distance(Vec2::new(-4.0, 0.0), Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert!((d - 4.0).abs() < 1e-5);
        // Degenerate segment
        let d = point_segment_distance(Vec2::new(3.0, 4.0), Vec2::ZERO, Vec2::ZERO);
        assert!((d - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_line_of_sight_through_tunnel() {
        let mut grid = Grid::default();
        grid.clear_horizontal(6, 2, 9);
        assert!(line_of_sight(&grid, (2, 6), (9, 6)));
        assert!(!line_of_sight(&grid, (2, 6), (9, 8)));
    }

    #[test]
    fn test_line_of_sight_blocked_by_dirt() {
        let mut grid = Grid::default();
        grid.clear_horizontal(6, 2, 4);
        grid.clear_horizontal(6, 6, 9);
        assert!(!line_of_sight(&grid, (2, 6), (9, 6)));
        // Rock is not dirt
        grid.place_rock(5, 6);
        assert!(line_of_sight(&grid, (2, 6), (9, 6)));
    }
}
