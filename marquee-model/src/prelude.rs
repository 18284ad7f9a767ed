//! Snapshot of the model surface for consumers that want one import.

pub use super::entity::{EntityKind, PrefetchEntity};
pub use super::ids::EntityId;
pub use super::image::{ImageDimensions, ImageType, PreferenceKey, ResolveKey};
