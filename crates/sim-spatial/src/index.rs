use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::MutexGuard;
use rand::seq::SliceRandom;
use sim_geom::{Agent, AgentId, Vec3, World};
use sim_tick::Scheduler;

use crate::chunk::Chunk;
use crate::color::Color;
use crate::context::StepContext;
use crate::coord::{ChunkCoord, Dims};
use crate::error::{ConfigError, QueryError};
use crate::query;

/// Construction-time inputs for [`ChunkedIndex::new`].
#[derive(Copy, Clone, Debug)]
pub struct ChunkedIndexConfig {
    pub chunk_size: f64,
    pub largest_agent_size: f64,
    /// `0` defers to `available_parallelism() - 1`, floored at 1.
    pub core_count: usize,
}

/// Maps chunk coordinate to row-major index, the canonical lock order for a
/// 1-ring.
pub(crate) fn coord_of(min_corner: Vec3, chunk_size: f64, dims: Dims, pos: Vec3) -> ChunkCoord {
    let rel = pos - min_corner;
    let i = (rel.x / chunk_size).floor().clamp(0.0, (dims.nx - 1) as f64) as usize;
    let j = (rel.y / chunk_size).floor().clamp(0.0, (dims.ny - 1) as f64) as usize;
    let k = (rel.z / chunk_size).floor().clamp(0.0, (dims.nz - 1) as f64) as usize;
    ChunkCoord::new(i, j, k)
}

fn resolve_core_count(requested: usize) -> usize {
    if requested == 0 {
        std::thread::available_parallelism().map_or(1, |n| n.get().saturating_sub(1).max(1))
    } else {
        requested
    }
}

/// A chunked spatial grid over agents of a single concrete type `A`, stepped
/// in parallel one colour at a time.
///
/// Generic over `A: Agent` rather than `dyn Agent` — every chunk then stores
/// `Vec<A>` directly instead of boxing, and `Chunk<A>: Send + Sync` falls out
/// for free from `A: Send` plus the `Mutex`.
pub struct ChunkedIndex<A> {
    world: World,
    min_corner: Vec3,
    chunk_size: f64,
    dims: Dims,
    chunks: Vec<Chunk<A>>,
    /// One batch list per colour, fixed for the life of the index — batches
    /// don't change as agents move or reproduce, only the chunk grid's own
    /// shape decides them.
    batches_by_color: [Vec<Vec<ChunkCoord>>; 8],
    scheduler: Scheduler,
    stepping: AtomicBool,
    tick: AtomicU64,
}

/// Resets the re-entrancy guard even if a batch panics mid-tick, so the next
/// `step()` call isn't permanently locked out.
struct SteppingGuard<'a>(&'a AtomicBool);

impl Drop for SteppingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<A: Agent> ChunkedIndex<A> {
    /// # Errors
    ///
    /// Returns [`ConfigError::ChunkTooSmall`] if `chunk_size / 2` doesn't
    /// exceed `largest_agent_size` — an agent that size could otherwise span
    /// three chunks on one axis, breaking the 1-ring locking invariant.
    pub fn new(world: World, config: ChunkedIndexConfig) -> Result<Self, ConfigError> {
        let ChunkedIndexConfig { chunk_size, largest_agent_size, core_count } = config;

        if chunk_size / 2.0 < largest_agent_size {
            return Err(ConfigError::ChunkTooSmall { chunk_size, largest_agent_size });
        }
        if chunk_size > 10.0 * largest_agent_size {
            tracing::warn!(
                chunk_size,
                largest_agent_size,
                "chunk_size is much larger than largest_agent_size; chunks will be sparsely \
                 populated and the 1-ring query cost grows without a matching locality benefit"
            );
        }

        let min_corner = world.min_corner();
        let max_corner = world.max_corner();
        let span = max_corner - min_corner;
        let nx = ((span.x / chunk_size).ceil() as usize).max(1);
        let ny = ((span.y / chunk_size).ceil() as usize).max(1);
        let nz = ((span.z / chunk_size).ceil() as usize).max(1);
        let dims = Dims { nx, ny, nz };

        let resolved_cores = resolve_core_count(core_count);
        if core_count == 1 {
            tracing::warn!("core_count == 1 gives a parallel index no parallelism to exploit");
        }
        let available = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        if resolved_cores > available {
            tracing::warn!(
                resolved_cores,
                available,
                "requested core_count exceeds available_parallelism; oversubscribing"
            );
        }

        let mut chunks = Vec::with_capacity(dims.len());
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let coord = ChunkCoord::new(i, j, k);
                    let center = Vec3::new(
                        min_corner.x + (i as f64 + 0.5) * chunk_size,
                        min_corner.y + (j as f64 + 0.5) * chunk_size,
                        min_corner.z + (k as f64 + 0.5) * chunk_size,
                    );
                    let mut neighbours = Vec::with_capacity(26);
                    for di in -1i64..=1 {
                        for dj in -1i64..=1 {
                            for dk in -1i64..=1 {
                                if di == 0 && dj == 0 && dk == 0 {
                                    continue;
                                }
                                let ni = i as i64 + di;
                                let nj = j as i64 + dj;
                                let nk = k as i64 + dk;
                                if ni < 0 || nj < 0 || nk < 0 {
                                    continue;
                                }
                                let neighbour = ChunkCoord::new(ni as usize, nj as usize, nk as usize);
                                if dims.in_bounds(neighbour) {
                                    neighbours.push(neighbour);
                                }
                            }
                        }
                    }
                    chunks.push(Chunk::new(coord, center, chunk_size, neighbours));
                }
            }
        }

        let mut groups: [Vec<ChunkCoord>; 8] =
            [Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new()];
        for chunk in &chunks {
            groups[Color::of(chunk.coord).index()].push(chunk.coord);
        }

        let batches_by_color = groups.map(|group| {
            if group.is_empty() {
                return Vec::new();
            }
            let worker_count = resolved_cores.min(group.len());
            let mut batches: Vec<Vec<ChunkCoord>> = (0..worker_count).map(|_| Vec::new()).collect();
            for (n, coord) in group.into_iter().enumerate() {
                batches[n % worker_count].push(coord);
            }
            batches
        });

        Ok(Self {
            world,
            min_corner,
            chunk_size,
            dims,
            chunks,
            batches_by_color,
            scheduler: Scheduler::new(resolved_cores),
            stepping: AtomicBool::new(false),
            tick: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.scheduler.worker_count()
    }

    fn coord_of(&self, pos: Vec3) -> ChunkCoord {
        coord_of(self.min_corner, self.chunk_size, self.dims, pos)
    }

    fn chunk_at(&self, coord: ChunkCoord) -> &Chunk<A> {
        &self.chunks[self.dims.linear_index(coord)]
    }

    /// Locks `coord`'s chunk plus every existing neighbour, in ascending
    /// linear-index order, and returns the guards in that same order. This
    /// is the ordered-lock discipline that makes a colour's parallel batches
    /// race-free in practice, not just by the informal non-adjacency
    /// argument the colour partition makes on its own (see DESIGN.md).
    fn lock_ring(&self, coord: ChunkCoord) -> Vec<(ChunkCoord, MutexGuard<'_, Vec<A>>)> {
        let mut coords: Vec<ChunkCoord> = self.chunk_at(coord).neighbours().to_vec();
        coords.push(coord);
        coords.sort_by_key(|c| self.dims.linear_index(*c));
        coords.into_iter().map(|c| (c, self.chunk_at(c).lock())).collect()
    }

    /// Advances every agent by exactly one tick: every colour's batches run
    /// in parallel with a barrier before the next colour, and an
    /// already-running tick causes a new call to be dropped rather than
    /// queued or run concurrently.
    pub fn step(&self) {
        if self.stepping.swap(true, Ordering::SeqCst) {
            tracing::debug!("step() called while a previous tick is still running; dropping this call");
            return;
        }
        let _guard = SteppingGuard(&self.stepping);

        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        let _span = tracing::debug_span!("tick", tick).entered();

        for color in Color::ALL {
            let batches = &self.batches_by_color[color.index()];
            if batches.is_empty() {
                continue;
            }
            if self.world.randomised_execution_order {
                let mut shuffled = batches.clone();
                let mut rng = self.world.rng().fork(tick as usize * 8 + color.index());
                shuffled.shuffle(&mut rng);
                self.scheduler.run_colour(&shuffled, |batch| self.step_batch(batch, tick));
            } else {
                self.scheduler.run_colour(batches, |batch| self.step_batch(batch, tick));
            }
        }
    }

    fn step_batch(&self, batch: &[ChunkCoord], tick: u64) {
        for &coord in batch {
            self.step_chunk(coord, tick);
        }
    }

    fn step_chunk(&self, coord: ChunkCoord, tick: u64) {
        let mut ring = self.lock_ring(coord);
        let home_pos = ring
            .iter()
            .position(|(c, _)| *c == coord)
            .expect("a chunk's own neighbourhood always contains itself");

        let len = ring[home_pos].1.len();
        let mut spawned_home = Vec::new();
        let mut relocations: Vec<(usize, ChunkCoord)> = Vec::new();

        // One forked generator per chunk-tick, its stream carried forward
        // across every agent stepped here this tick — not re-forked from the
        // same seed per agent, which would hand every co-located agent the
        // identical "random" sequence (see DESIGN.md's RNG note).
        let seed_index = tick as usize * self.chunks.len() + self.dims.linear_index(coord);
        let mut rng = self.world.rng().fork(seed_index);

        for i in 0..len {
            let (before, mid_after) = ring.split_at_mut(home_pos);
            let (home_entry, after) = mid_after.split_at_mut(1);
            let home_agents = &mut home_entry[0].1;
            let (left, right) = home_agents.split_at_mut(i);
            let (current, right) = right.split_at_mut(1);
            let agent = &mut current[0];

            let mut ctx = StepContext {
                world: &self.world,
                min_corner: self.min_corner,
                chunk_size: self.chunk_size,
                dims: self.dims,
                home_coord: coord,
                home_before: left,
                home_after: right,
                ring_before: before,
                ring_after: after,
                spawned_home: &mut spawned_home,
                rng,
            };

            agent.step(&mut ctx);
            rng = ctx.rng;

            let new_coord = self.coord_of(agent.position());
            if new_coord != coord {
                relocations.push((i, new_coord));
            }
        }

        // Apply cross-chunk relocations in descending index order so removing
        // one doesn't shift the index of another not-yet-processed entry.
        let home_agents = &mut ring[home_pos].1;
        relocations.sort_unstable_by_key(|(i, _)| std::cmp::Reverse(*i));
        for (i, new_coord) in relocations {
            let agent = home_agents.remove(i);
            if let Some((_, guard)) = ring.iter_mut().find(|(c, _)| *c == new_coord) {
                guard.push(agent);
            } else {
                // Outside the locked 1-ring entirely: an agent cannot move
                // further than its own chunk's neighbours in one tick under
                // any sane move distance, but fall back safely if it somehow
                // does.
                drop(ring);
                self.chunk_at(new_coord).lock().push(agent);
                ring = self.lock_ring(coord);
            }
        }
        ring[home_pos].1.append(&mut spawned_home);
    }

    pub fn add_agent(&self, agent: A) {
        let coord = self.coord_of(agent.position());
        self.chunk_at(coord).lock().push(agent);
    }

    pub fn remove_agent(&self, id: AgentId) -> bool {
        for chunk in &self.chunks {
            let mut guard = chunk.lock();
            if let Some(pos) = guard.iter().position(|a| a.id() == id) {
                guard.remove(pos);
                return true;
            }
        }
        false
    }

    #[must_use]
    pub fn organism_count(&self) -> usize {
        self.chunks.iter().map(|c| c.lock().len()).sum()
    }

    #[must_use]
    pub fn all_organisms(&self) -> Vec<A>
    where
        A: Clone,
    {
        self.chunks.iter().flat_map(|c| c.lock().clone()).collect()
    }

    /// Looks up a single agent's current data by identity, scanning every
    /// chunk. Lets a caller holding only an [`AgentId`] (e.g. the result of
    /// [`Self::nearest_neighbour`]) recover the full agent.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<A>
    where
        A: Clone,
    {
        self.chunks.iter().find_map(|c| c.lock().iter().find(|a| a.id() == id).cloned())
    }

    /// External-to-a-tick overlap query: locks `agent`'s 1-ring transiently
    /// rather than reusing an already-held lock set.
    #[must_use]
    pub fn overlap(&self, agent: &A, probe: Vec3) -> bool {
        if !self.world.is_in_bounds(probe) {
            return true;
        }
        let coord = self.coord_of(agent.position());
        let ring = self.lock_ring(coord);
        let candidates = ring
            .iter()
            .flat_map(|(_, guard)| guard.iter())
            .filter(|other| other.id() != agent.id())
            .map(|a| (a.id(), a.position(), a.size()));
        query::sphere_overlap(probe, agent.size(), candidates)
    }

    #[must_use]
    pub fn first_hit(&self, agent: &A, dir_hat: Vec3, length: f64) -> (bool, f64) {
        if !self.world.is_in_bounds(agent.position() + dir_hat * length) {
            return (true, 0.0);
        }
        let coord = self.coord_of(agent.position());
        let ring = self.lock_ring(coord);
        let candidates = ring
            .iter()
            .flat_map(|(_, guard)| guard.iter())
            .filter(|other| other.id() != agent.id())
            .map(|a| (a.id(), a.position(), a.size()));
        query::ray_sphere_first_hit(agent.position(), dir_hat, agent.size(), length, candidates)
    }

    #[must_use]
    pub fn nearest_neighbour(&self, agent: &A) -> Option<AgentId> {
        let coord = self.coord_of(agent.position());
        let ring = self.lock_ring(coord);
        let candidates = ring
            .iter()
            .flat_map(|(_, guard)| guard.iter())
            .filter(|other| other.id() != agent.id())
            .map(|a| (a.id(), a.position(), a.size()));
        query::nearest_by_distance(agent.position(), candidates)
    }

    /// Unbounded range queries are out of scope: answering them would mean
    /// scanning beyond the fixed 1-ring this index is built to bound the
    /// cost of.
    pub fn organisms_within_range(&self, _agent: &A, _range: f64) -> Result<Vec<AgentId>, QueryError> {
        Err(QueryError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use sim_geom::{Agent, AgentContext, AgentId};

    use super::*;

    #[derive(Clone)]
    struct Dummy {
        id: AgentId,
        pos: Vec3,
    }

    impl Agent for Dummy {
        fn id(&self) -> AgentId {
            self.id
        }

        fn key(&self) -> &str {
            "dummy"
        }

        fn position(&self) -> Vec3 {
            self.pos
        }

        fn set_position(&mut self, pos: Vec3) {
            self.pos = pos;
        }

        fn size(&self) -> f64 {
            0.1
        }

        fn step(&mut self, _ctx: &mut impl AgentContext<Self>) {}
    }

    /// Scenario S4: a 4x4x4 grid has exactly 8 chunks of each colour, and no
    /// two chunks sharing a colour appear in each other's neighbour list.
    #[test]
    fn a_4x4x4_grid_splits_into_8_colours_of_8_chunks_each() {
        let world = World::new(Vec3::ZERO, Vec3::new(8.0, 8.0, 8.0), 1);
        let config = ChunkedIndexConfig { chunk_size: 2.0, largest_agent_size: 0.5, core_count: 1 };
        let index = ChunkedIndex::<Dummy>::new(world, config).unwrap();

        assert_eq!(index.dims.nx, 4);
        assert_eq!(index.dims.ny, 4);
        assert_eq!(index.dims.nz, 4);

        for batches in &index.batches_by_color {
            let total: usize = batches.iter().map(Vec::len).sum();
            assert_eq!(total, 8);
        }

        for chunk in &index.chunks {
            let colour = Color::of(chunk.coord);
            for &neighbour in chunk.neighbours() {
                assert_ne!(Color::of(neighbour), colour);
            }
        }
    }
}
