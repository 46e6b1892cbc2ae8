use crate::{Vec3, WorldRng};

/// The simulated volume's boundary and movement policy.
///
/// Owns nothing chunk- or agent-shaped — that's `sim_spatial::ChunkedIndex`'s
/// job. `World` is the shared, read-mostly context every agent's `step`
/// consults: is a candidate position in bounds, should movement resolve by
/// discrete displacement or by ray-casting, and where does randomness come
/// from.
#[derive(Clone, Copy, Debug)]
pub struct World {
    min_corner: Vec3,
    max_corner: Vec3,
    /// When `true`, `move` resolves via `first_hit` ray-casting instead of a
    /// single collision test at the destination.
    pub precise_movement: bool,
    /// When `true`, `ChunkedIndex::step` shuffles batch execution order
    /// within each colour before dispatch.
    pub randomised_execution_order: bool,
    rng: WorldRng,
}

impl World {
    /// # Panics
    ///
    /// Panics if any axis of `max_corner` is not greater than the matching
    /// axis of `min_corner`.
    #[must_use]
    pub fn new(min_corner: Vec3, max_corner: Vec3, seed: u64) -> Self {
        assert!(max_corner.x > min_corner.x, "max_corner.x must exceed min_corner.x");
        assert!(max_corner.y > min_corner.y, "max_corner.y must exceed min_corner.y");
        assert!(max_corner.z > min_corner.z, "max_corner.z must exceed min_corner.z");

        Self {
            min_corner,
            max_corner,
            precise_movement: false,
            randomised_execution_order: false,
            rng: WorldRng::new(seed),
        }
    }

    #[must_use]
    pub const fn min_corner(&self) -> Vec3 {
        self.min_corner
    }

    #[must_use]
    pub const fn max_corner(&self) -> Vec3 {
        self.max_corner
    }

    #[must_use]
    pub fn is_in_bounds(&self, p: Vec3) -> bool {
        p.x >= self.min_corner.x
            && p.x <= self.max_corner.x
            && p.y >= self.min_corner.y
            && p.y <= self.max_corner.y
            && p.z >= self.min_corner.z
            && p.z <= self.max_corner.z
    }

    #[must_use]
    pub const fn rng(&self) -> WorldRng {
        self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let world = World::new(Vec3::ZERO, Vec3::new(10.0, 10.0, 10.0), 1);
        assert!(world.is_in_bounds(Vec3::ZERO));
        assert!(world.is_in_bounds(Vec3::new(10.0, 10.0, 10.0)));
        assert!(!world.is_in_bounds(Vec3::new(10.0001, 5.0, 5.0)));
        assert!(!world.is_in_bounds(Vec3::new(-0.0001, 5.0, 5.0)));
    }

    #[test]
    #[should_panic(expected = "max_corner.x")]
    fn degenerate_bounds_panic() {
        World::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 1);
    }
}
