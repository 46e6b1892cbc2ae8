use thiserror::Error;

/// Fatal `ChunkedIndex::new` construction failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "chunk_size {chunk_size} is too small for largest_agent_size {largest_agent_size}: \
         half a chunk edge must exceed the largest agent so a single agent can never span \
         three chunks on one axis"
    )]
    ChunkTooSmall { chunk_size: f64, largest_agent_size: f64 },
}

/// Unsupported or malformed query requests.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("organisms_within_range is out of scope for this index")]
    Unsupported,
}
