//! Application layer: use-case coordination over the domain contracts.

pub mod services;
