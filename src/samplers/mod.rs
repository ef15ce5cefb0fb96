//! Minimal-sample generation.
//!
//! Both samplers draw through [`UniformRandomGenerator`](crate::utils::UniformRandomGenerator)
//! and are generic over the random source, so a caller-provided
//! `&mut StdRng` keeps runs reproducible.

pub mod prosac;
pub mod uniform;

pub use prosac::ProsacSampler;
pub use uniform::UniformRandomSampler;
