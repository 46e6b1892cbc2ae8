/// Grid index of a chunk within a [`crate::ChunkedIndex`], always
/// non-negative (the index owns one corner of the world and every chunk sits
/// at a non-negative offset from it).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ChunkCoord {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl ChunkCoord {
    #[must_use]
    pub const fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }
}

/// Chunk grid extent along each axis.
#[derive(Copy, Clone, Debug)]
pub struct Dims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Dims {
    #[must_use]
    pub const fn len(self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Row-major linear index, used both to flatten `chunks: Vec<Chunk<A>>`
    /// and as the canonical lock ordering for a 1-ring — acquiring a ring's
    /// locks in this order is what turns the colour partition's informal
    /// non-adjacency argument into a real ordered-lock discipline (see
    /// DESIGN.md).
    #[must_use]
    pub const fn linear_index(self, coord: ChunkCoord) -> usize {
        coord.i + coord.j * self.nx + coord.k * self.nx * self.ny
    }

    #[must_use]
    pub const fn in_bounds(self, coord: ChunkCoord) -> bool {
        coord.i < self.nx && coord.j < self.ny && coord.k < self.nz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_index_is_row_major() {
        let dims = Dims { nx: 4, ny: 3, nz: 2 };
        assert_eq!(dims.linear_index(ChunkCoord::new(0, 0, 0)), 0);
        assert_eq!(dims.linear_index(ChunkCoord::new(1, 0, 0)), 1);
        assert_eq!(dims.linear_index(ChunkCoord::new(0, 1, 0)), 4);
        assert_eq!(dims.linear_index(ChunkCoord::new(0, 0, 1)), 12);
        assert_eq!(dims.len(), 24);
    }
}
