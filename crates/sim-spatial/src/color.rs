use crate::coord::ChunkCoord;

/// Parity class of a chunk coordinate: one bit per axis, `(i % 2, j % 2,
/// k % 2)`. Two chunks that differ by exactly one step along any axis always
/// differ in colour, so same-colour chunks are never neighbours and every
/// batch of a colour can run without locking against any other batch of the
/// same colour. Eight colours total, one per combination of the three axis
/// parities.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Color {
    C0,
    C1,
    C2,
    C3,
    C4,
    C5,
    C6,
    C7,
}

impl Color {
    pub const ALL: [Self; 8] = [
        Self::C0,
        Self::C1,
        Self::C2,
        Self::C3,
        Self::C4,
        Self::C5,
        Self::C6,
        Self::C7,
    ];

    #[must_use]
    pub const fn of(coord: ChunkCoord) -> Self {
        let bits = (coord.i & 1) << 2 | (coord.j & 1) << 1 | (coord.k & 1);
        match bits {
            0 => Self::C0,
            1 => Self::C1,
            2 => Self::C2,
            3 => Self::C3,
            4 => Self::C4,
            5 => Self::C5,
            6 => Self::C6,
            _ => Self::C7,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::C0 => 0,
            Self::C1 => 1,
            Self::C2 => 2,
            Self::C3 => 3,
            Self::C4 => 4,
            Self::C5 => 5,
            Self::C6 => 6,
            Self::C7 => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_two_1_ring_neighbours_share_a_colour() {
        let centre = ChunkCoord::new(3, 3, 3);
        let centre_colour = Color::of(centre);
        for di in -1i64..=1 {
            for dj in -1i64..=1 {
                for dk in -1i64..=1 {
                    if di == 0 && dj == 0 && dk == 0 {
                        continue;
                    }
                    let neighbour = ChunkCoord::new(
                        (centre.i as i64 + di) as usize,
                        (centre.j as i64 + dj) as usize,
                        (centre.k as i64 + dk) as usize,
                    );
                    assert_ne!(Color::of(neighbour), centre_colour);
                }
            }
        }
    }

    #[test]
    fn all_covers_every_index_once() {
        let mut seen: Vec<usize> = Color::ALL.iter().map(|c| c.index()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }
}
