//! hub-utils - helpers shared across the hub data library
//!
//! This crate bundles small, independent building blocks: capability probes
//! for optional storage backends and compute runtimes, integer and batching
//! helpers, shape and cache-size normalization for configuration inputs,
//! and scoped helpers for locking, failure suppression and timing.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod batch;
pub mod config;
pub mod error;
pub mod math;
pub mod probe;
pub mod scope;
pub mod shape;

// Re-exports
pub use batch::{batch_count, batchify, flatten};
pub use crate::config::{BatchSettings, ProbeSettings, Settings};
pub use error::{Error, Result};
pub use math::{compute_lcm, gcd};
pub use probe::runtime::{
    dask_loaded, pathos_loaded, pytorch_loaded, ray_loaded, tensorflow_loaded, tfds_loaded,
    transformers_loaded,
};
pub use probe::storage::{azure_creds_exist, gcp_creds_exist, hub_creds_exist, s3_creds_exist};
pub use probe::{default_probes, Environment, MapEnv, Probe, ProbeReport, ProcessEnv};
pub use scope::{time, NoopLock, ScopedLock, SuppressingScope, Timer};
pub use shape::{norm_cache, norm_shape, Dim, Shape};
