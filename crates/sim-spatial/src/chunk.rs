use parking_lot::{Mutex, MutexGuard};
use sim_geom::Vec3;

use crate::coord::ChunkCoord;

/// One cell of the chunk grid: a fixed cube in space, its precomputed list of
/// up-to-26 existing neighbours, and the agents currently inside it.
///
/// Membership (`push`/`remove`) and the per-tick step walk both go through
/// the same `Mutex<Vec<A>>` — there is exactly one lock per chunk, acquired
/// in the ascending linear-index order `ChunkedIndex` establishes for a
/// 1-ring (see DESIGN.md).
pub struct Chunk<A> {
    pub coord: ChunkCoord,
    pub center: Vec3,
    pub edge_length: f64,
    neighbours: Vec<ChunkCoord>,
    agents: Mutex<Vec<A>>,
}

impl<A> Chunk<A> {
    pub fn new(coord: ChunkCoord, center: Vec3, edge_length: f64, neighbours: Vec<ChunkCoord>) -> Self {
        Self {
            coord,
            center,
            edge_length,
            neighbours,
            agents: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn neighbours(&self) -> &[ChunkCoord] {
        &self.neighbours
    }

    pub fn lock(&self) -> MutexGuard<'_, Vec<A>> {
        self.agents.lock()
    }
}
