//! Domain layer: entities, storage contract, audit fan-out, deletion queue.

pub mod audit;
pub mod deletion;
pub mod entities;
pub mod repositories;
