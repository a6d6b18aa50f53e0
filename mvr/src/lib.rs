//! # `mvr`
//!
//! Batteries-included global registration of overlapping 3D views
//!
//! This crate gathers everything needed to go from per-view interest points or whole-image links
//! to one transform per view. Use it for scripts, tests and tutorials. Applications should import
//! the individual crates so that they only build what they use.
//!
//! The core types live at the root of the crate. Everything else is optional:
//!
//! ## Modules
//! * [`consensus`] - robust model estimation from noisy matches
//! * [`pairwise`] - finding correspondences between two views
//! * [`optimize`] - the tile graph and the global optimizers

pub use mvr_core::{sample_consensus::*, *};

/// Consensus algorithms (RANSAC)
pub mod consensus {
    #[cfg(feature = "mvr-ransac")]
    pub use mvr_ransac::*;
}

/// Pairwise matching
pub mod pairwise {
    #[cfg(feature = "mvr-pairwise")]
    pub use mvr_pairwise::*;
}

/// Global optimization of tile graphs
pub mod optimize {
    #[cfg(feature = "mvr-optimize")]
    pub use mvr_optimize::*;
}
