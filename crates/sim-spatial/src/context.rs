use parking_lot::MutexGuard;
use rand::rngs::StdRng;
use rand::Rng;
use sim_geom::{Agent, AgentContext, AgentId, Vec3, World};

use crate::coord::{ChunkCoord, Dims};
use crate::index;
use crate::query;

/// The `AgentContext` an agent's `step` actually runs against: a view over
/// one already-locked 1-ring, split so the agent being stepped can be
/// mutated while its neighbours (in the same chunk and in adjacent chunks)
/// are read concurrently — the `split_at_mut` discipline needed to keep a
/// mutable and shared view of the same slice alive at once, carried one
/// level further to cross chunk boundaries (see DESIGN.md).
pub struct StepContext<'a, A> {
    pub(crate) world: &'a World,
    pub(crate) min_corner: Vec3,
    pub(crate) chunk_size: f64,
    pub(crate) dims: Dims,
    pub(crate) home_coord: ChunkCoord,
    pub(crate) home_before: &'a mut [A],
    pub(crate) home_after: &'a mut [A],
    pub(crate) ring_before: &'a mut [(ChunkCoord, MutexGuard<'a, Vec<A>>)],
    pub(crate) ring_after: &'a mut [(ChunkCoord, MutexGuard<'a, Vec<A>>)],
    pub(crate) spawned_home: &'a mut Vec<A>,
    pub(crate) rng: StdRng,
}

impl<'a, A: Agent> StepContext<'a, A> {
    fn candidates(&self) -> impl Iterator<Item = (AgentId, Vec3, f64)> + '_ {
        self.home_before
            .iter()
            .chain(self.home_after.iter())
            .map(|a| (a.id(), a.position(), a.size()))
            .chain(
                self.ring_before
                    .iter()
                    .chain(self.ring_after.iter())
                    .flat_map(|(_, guard)| guard.iter())
                    .map(|a| (a.id(), a.position(), a.size())),
            )
    }

    /// Uniform random point on the unit sphere, via spherical coordinates
    /// rather than rejection sampling since we don't otherwise depend on
    /// `rand_distr`.
    fn random_unit_vector(&mut self) -> Vec3 {
        let theta = self.rng.gen_range(0.0..std::f64::consts::TAU);
        let z: f64 = self.rng.gen_range(-1.0..1.0);
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * theta.cos(), r * theta.sin(), z)
    }

    /// Inserts `agent` into `coord`'s slot of the already-locked 1-ring.
    /// Returns `false` without inserting if `coord` isn't actually part of
    /// that ring — the caller must treat this as the placement attempt
    /// failing outright rather than reporting success for an agent that was
    /// never added.
    #[must_use]
    fn insert_into_ring(&mut self, coord: ChunkCoord, agent: A) -> bool {
        if coord == self.home_coord {
            self.spawned_home.push(agent);
            return true;
        }
        for (c, guard) in self.ring_before.iter_mut().chain(self.ring_after.iter_mut()) {
            if *c == coord {
                guard.push(agent);
                return true;
            }
        }
        tracing::debug!(
            ?coord,
            "reproduction target chunk is outside the parent's locked 1-ring; retrying placement"
        );
        false
    }
}

impl<'a, A: Agent> AgentContext<A> for StepContext<'a, A> {
    fn world(&self) -> &World {
        self.world
    }

    fn overlap(&self, agent: &A, probe: Vec3) -> bool {
        if !self.world.is_in_bounds(probe) {
            return true;
        }
        query::sphere_overlap(probe, agent.size(), self.candidates())
    }

    fn first_hit(&self, agent: &A, dir_hat: Vec3, length: f64) -> (bool, f64) {
        if !self.world.is_in_bounds(agent.position() + dir_hat * length) {
            return (true, 0.0);
        }
        query::ray_sphere_first_hit(agent.position(), dir_hat, agent.size(), length, self.candidates())
    }

    fn nearest_neighbour(&self, agent: &A) -> Option<AgentId> {
        query::nearest_by_distance(agent.position(), self.candidates())
    }

    /// Non-precise mode: a single collision-gated step, rejected outright on
    /// either a world-bounds violation or an overlap. Precise mode: the
    /// displacement is first clipped to the nearest ray-cast hit along the
    /// same direction, then the (shorter) resulting step is bounds-checked
    /// the same way. A precise move that would still end up out of bounds is
    /// rejected rather than clipped to the boundary, matching non-precise
    /// mode's all-or-nothing semantics (see DESIGN.md).
    fn move_by(&mut self, agent: &mut A, dir: Vec3) {
        let distance = dir.length();
        if distance == 0.0 {
            return;
        }
        let dir_hat = dir * (1.0 / distance);

        let candidate = if self.world.precise_movement {
            const MOVE_EPSILON: f64 = 0.001;
            let (_, hit_distance) = self.first_hit(agent, dir_hat, distance);
            let travel = (hit_distance - MOVE_EPSILON).max(0.0);
            agent.position() + dir_hat * travel
        } else {
            agent.position() + dir
        };

        if !self.world.is_in_bounds(candidate) {
            return;
        }
        if query::sphere_overlap(candidate, agent.size(), self.candidates()) {
            return;
        }
        agent.set_position(candidate);
    }

    fn reproduce(&mut self, agent: &mut A, make_child: &mut dyn FnMut(Vec3) -> A) -> Option<AgentId> {
        let r = agent.size() * 1.02;
        let origin = agent.position();

        for _ in 0..5 {
            let dir = self.random_unit_vector();
            let plus_r = origin + dir * r;
            let minus_r = origin - dir * r;
            let plus_2r = origin + dir * (2.0 * r);
            let minus_2r = origin - dir * (2.0 * r);

            let plus_r_free = self.world.is_in_bounds(plus_r) && !self.overlap(agent, plus_r);
            let minus_r_free = self.world.is_in_bounds(minus_r) && !self.overlap(agent, minus_r);
            let plus_2r_free = self.world.is_in_bounds(plus_2r) && !self.overlap(agent, plus_2r);
            let minus_2r_free = self.world.is_in_bounds(minus_2r) && !self.overlap(agent, minus_2r);

            // Priority order: symmetric split first, then the two one-sided
            // fallbacks.
            let placement = if plus_r_free && minus_r_free {
                Some((plus_r, Some(minus_r)))
            } else if plus_2r_free {
                Some((plus_2r, None))
            } else if minus_2r_free {
                Some((minus_2r, None))
            } else {
                None
            };

            let Some((child_pos, parent_pos)) = placement else {
                continue;
            };

            let child = make_child(child_pos);
            let child_id = child.id();
            let child_coord = index::coord_of(self.min_corner, self.chunk_size, self.dims, child.position());
            if !self.insert_into_ring(child_coord, child) {
                // The child's chunk fell outside the parent's locked 1-ring
                // (possible when `2 * size * 1.02` exceeds `chunk_size`) —
                // treat this as a failed attempt rather than returning an id
                // for an agent that was never inserted, and try again.
                continue;
            }
            if let Some(parent_pos) = parent_pos {
                agent.set_position(parent_pos);
            }
            return Some(child_id);
        }
        None
    }
}
