//! # mediaconv Testkit
//!
//! Test utilities for mediaconv.
//!
//! This crate provides:
//! - Temporary cache directories with dump, transcoded and blank media files
//! - Property-based test generators using proptest
//! - Hand-assembled FozDB byte vectors for format verification
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mediaconv_testkit::prelude::*;
//!
//! #[test]
//! fn cold_cache() {
//!     let fixture = CacheFixture::new(MediaKind::Video);
//!     let cache = fixture.cache();
//!     // ... push chunks, serve, finish
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
    pub use mediaconv_core::{tags, MediaKind};
}

pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
