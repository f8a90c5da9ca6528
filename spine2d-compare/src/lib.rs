//! Load, lay out and structurally compare Spine skeleton exports (unofficial).
//!
//! The crate drives an external animation runtime through [`SpineRuntime`] and
//! [`SkeletonInstance`] and never renders itself. It reads the JSON and binary encodings of a
//! skeleton into a structural [`SkeletonData`] summary, places instances side by side or
//! overlaid, and reports where the two encodings disagree.

#![forbid(unsafe_code)]

mod appearance;
mod atlas;
mod config;
mod diff;
mod error;
mod geometry;
mod layout;
mod model;
mod names;
mod runtime;
mod session;
mod version;

#[cfg(feature = "json")]
mod json;

#[cfg(feature = "binary")]
mod binary;

pub use appearance::*;
pub use atlas::*;
pub use config::*;
pub use diff::*;
pub use error::*;
pub use geometry::*;
pub use layout::*;
pub use model::*;
pub use names::natural_cmp;
pub use runtime::*;
pub use session::*;
pub use version::*;

#[cfg(test)]
mod test_support;




#[cfg(all(test, feature = "json"))]
mod json_tests;
