//! Chunked spatial index over agents of one concrete type: an 8-colour
//! parity grid (`Color`) that lets `ChunkedIndex::step` advance every chunk
//! in parallel a colour at a time, plus the query kernels (`overlap`,
//! `first_hit`, `nearest_neighbour`) agents use to sense their 1-ring.

mod chunk;
mod color;
mod context;
mod coord;
mod error;
mod index;
mod query;

pub use chunk::Chunk;
pub use color::Color;
pub use context::StepContext;
pub use coord::{ChunkCoord, Dims};
pub use error::{ConfigError, QueryError};
pub use index::{ChunkedIndex, ChunkedIndexConfig};
