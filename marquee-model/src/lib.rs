//! Core data model definitions shared across Marquee crates.
#![allow(missing_docs)]

pub mod entity;
pub mod ids;
pub mod image;
pub mod prelude;

pub use entity::{EntityKind, PrefetchEntity};
pub use ids::EntityId;
pub use image::{ImageDimensions, ImageType, PreferenceKey, ResolveKey};
