//! Image vocabulary shared by the prefetch scheduler and its resolvers.

use std::fmt;

use crate::{entity::EntityKind, ids::EntityId};

/// Artwork variants a catalog entity may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageType {
    Primary,
    Thumb,
    Backdrop,
    Logo,
    Banner,
}

impl ImageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ImageType::Primary => "Primary",
            ImageType::Thumb => "Thumb",
            ImageType::Backdrop => "Backdrop",
            ImageType::Logo => "Logo",
            ImageType::Banner => "Banner",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "primary" => Some(ImageType::Primary),
            "thumb" => Some(ImageType::Thumb),
            "backdrop" => Some(ImageType::Backdrop),
            "logo" => Some(ImageType::Logo),
            "banner" => Some(ImageType::Banner),
            _ => None,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested rendition of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
    /// Encoder quality hint, 0-100.
    pub quality: u8,
}

impl ImageDimensions {
    pub const fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width,
            height,
            quality: if quality > 100 { 100 } else { quality },
        }
    }
}

/// Memoization key for resolved image URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolveKey {
    pub entity_id: EntityId,
    pub image_type: ImageType,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl ResolveKey {
    pub fn new(
        entity_id: EntityId,
        image_type: ImageType,
        dims: ImageDimensions,
    ) -> Self {
        Self {
            entity_id,
            image_type,
            width: dims.width,
            height: dims.height,
            quality: dims.quality,
        }
    }

    pub fn dimensions(&self) -> ImageDimensions {
        ImageDimensions::new(self.width, self.height, self.quality)
    }
}

impl fmt::Display for ResolveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}x{}@{}",
            self.entity_id,
            self.image_type,
            self.width,
            self.height,
            self.quality
        )
    }
}

/// Identifies one logical image slot for preference learning.
///
/// Two lookups with the same key render the same place in the UI, so the
/// variant that worked last time is the best first guess next time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreferenceKey {
    pub entity_id: EntityId,
    pub related_id: Option<EntityId>,
    pub entity_kind: EntityKind,
    pub requested: ImageType,
    pub fallback: ImageType,
}

impl PreferenceKey {
    pub fn new(
        entity_id: EntityId,
        related_id: Option<EntityId>,
        entity_kind: EntityKind,
        requested: ImageType,
        fallback: ImageType,
    ) -> Self {
        Self {
            entity_id,
            related_id,
            entity_kind,
            requested,
            fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ImageType::parse("THUMB"), Some(ImageType::Thumb));
        assert_eq!(ImageType::parse(" backdrop "), Some(ImageType::Backdrop));
        assert_eq!(ImageType::parse("poster"), None);
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(ImageDimensions::new(10, 10, 250).quality, 100);
    }

    #[test]
    fn resolve_keys_differ_by_dimensions() {
        let id = EntityId::from("m1");
        let a = ResolveKey::new(
            id.clone(),
            ImageType::Primary,
            ImageDimensions::new(300, 450, 90),
        );
        let b = ResolveKey::new(
            id,
            ImageType::Primary,
            ImageDimensions::new(600, 900, 90),
        );
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "m1:Primary:300x450@90");
    }
}
