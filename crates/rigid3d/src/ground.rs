//! Horizontal ground plane spanning the grid footprint.

use crate::grid::SimulationGrid;
use glam::{Vec2, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundPlane {
    /// World-space height of the plane
    pub height: f32,
    /// XZ footprint, taken from the grid corners
    pub min: Vec2,
    pub max: Vec2,
}

impl GroundPlane {
    pub fn from_grid(grid: &SimulationGrid, height: f32) -> Self {
        let lo = grid.bottom_left_front();
        let hi = grid.top_right_back();
        Self {
            height,
            min: Vec2::new(lo.x.min(hi.x), lo.z.min(hi.z)),
            max: Vec2::new(lo.x.max(hi.x), lo.z.max(hi.z)),
        }
    }

    /// Depth a sphere of `radius` at `position` sinks below the plane.
    pub fn penetration(&self, position: Vec3, radius: f32) -> f32 {
        radius - (position.y - self.height)
    }

    /// Quad corners for drawing, counter-clockwise seen from above.
    pub fn corners(&self) -> [Vec3; 4] {
        let h = self.height;
        [
            Vec3::new(self.min.x, h, self.min.y),
            Vec3::new(self.min.x, h, self.max.y),
            Vec3::new(self.max.x, h, self.max.y),
            Vec3::new(self.max.x, h, self.min.y),
        ]
    }
}
