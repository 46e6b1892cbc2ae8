use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Aabb, Vec3, World};

/// Stable identity for an agent, used to skip "self" in collision/nearest
/// queries and to compare before/after state in reproduction safety checks.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct AgentId(pub u64);

/// Monotonic allocator for [`AgentId`]s, shared across worker threads.
///
/// Concrete agent factories (initial seeding, `reproduce`) are expected to
/// hold one of these and call [`AgentIdAllocator::next`] whenever a new
/// agent is constructed.
#[derive(Debug, Default)]
pub struct AgentIdAllocator {
    next: AtomicU64,
}

impl AgentIdAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self { next: AtomicU64::new(0) }
    }

    pub fn next(&self) -> AgentId {
        AgentId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// The capability contract the core (`Chunk`/`ChunkedIndex`/`Scheduler`)
/// requires of a concrete agent type.
///
/// Behaviour beyond this contract — what an organism actually decides to do
/// each tick — is deliberately left to implementors; the core only needs
/// enough to place, move and step an agent safely.
pub trait Agent: Send + Sized {
    /// Stable per-agent identity (for self-exclusion in queries).
    fn id(&self) -> AgentId;

    /// Agent-type tag, for persistence only — the core neither reads nor
    /// writes this beyond exposing it.
    fn key(&self) -> &str;

    fn position(&self) -> Vec3;

    /// Overwrites the agent's position. Called only by the core
    /// (`AgentContext::move_by`/`reproduce`'s symmetric split) after a
    /// candidate position has already been validated against the 1-ring.
    fn set_position(&mut self, pos: Vec3);

    /// Sphere radius. Immutable for the agent's lifetime (enforced by
    /// convention, not the type system — nothing in the core calls this
    /// after construction expecting a different answer).
    fn size(&self) -> f64;

    /// Minimum bounding box, derived from `position`/`size`.
    fn mbb(&self) -> Aabb {
        Aabb::from_sphere(self.position(), self.size())
    }

    /// Invoked exactly once per tick for every agent present at tick start.
    /// Implementations drive their own behaviour using the queries and
    /// mutators `ctx` exposes.
    fn step(&mut self, ctx: &mut impl AgentContext<Self>);
}

/// The index-side operations an agent's `step` may call into: the three
/// query kernels, plus the `Move`/`Reproduce` algorithms, bound to whatever
/// chunk locks the caller (`Chunk::step`) already holds for this agent's
/// 1-ring.
///
/// Generic over the concrete agent type rather than `dyn Agent`, matching
/// `ChunkedIndex<A: Agent>`'s own monomorphic design (see DESIGN.md).
pub trait AgentContext<A: Agent> {
    fn world(&self) -> &World;

    /// True if `probe` is out of bounds, or overlaps any other agent in
    /// `agent`'s 1-ring.
    fn overlap(&self, agent: &A, probe: Vec3) -> bool;

    /// First ray–sphere hit along `dir_hat` (must be a unit vector) within
    /// `length`, searched over `agent`'s 1-ring.
    fn first_hit(&self, agent: &A, dir_hat: Vec3, length: f64) -> (bool, f64);

    /// Nearest other agent by squared distance, searched over `agent`'s
    /// 1-ring only.
    fn nearest_neighbour(&self, agent: &A) -> Option<AgentId>;

    /// Attempt to move `agent` by `dir`: a single
    /// collision-gated step in non-precise mode, or ray-cast-limited
    /// displacement in precise mode. No-op when `dir` is the zero vector.
    fn move_by(&mut self, agent: &mut A, dir: Vec3);

    /// Attempt the 5-try reproduction placement: symmetric split first, then
    /// the two one-sided fallbacks. On success, constructs the child via
    /// `make_child(position)`, inserts it into the index, possibly relocates
    /// `agent` (the symmetric-split case), and returns the child's id.
    /// Returns `None` if every attempt collides.
    fn reproduce(&mut self, agent: &mut A, make_child: &mut dyn FnMut(Vec3) -> A) -> Option<AgentId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_is_monotonic_and_unique() {
        let alloc = AgentIdAllocator::new();
        let ids: Vec<_> = (0..5).map(|_| alloc.next()).collect();
        for w in ids.windows(2) {
            assert!(w[0].0 < w[1].0);
        }
    }
}
