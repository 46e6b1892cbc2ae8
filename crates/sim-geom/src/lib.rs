//! World bounds, vector/box math, and the per-agent step contract shared by
//! `sim-spatial`'s chunked index and `sim-tick`'s scheduler.

mod aabb;
mod agent;
mod rng;
mod vec3;
mod world;

pub use aabb::Aabb;
pub use agent::{Agent, AgentContext, AgentId, AgentIdAllocator};
pub use rng::WorldRng;
pub use vec3::Vec3;
pub use world::World;
