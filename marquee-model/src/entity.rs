use crate::ids::EntityId;

/// Catalog entity categories the client prefetches imagery for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityKind {
    Movie,
    Series,
    Season,
    Episode,
    Video,
    #[default]
    Other,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Movie => "Movie",
            EntityKind::Series => "Series",
            EntityKind::Season => "Season",
            EntityKind::Episode => "Episode",
            EntityKind::Video => "Video",
            EntityKind::Other => "Other",
        }
    }

    /// Whether artwork for this kind usually lives on a parent entity
    /// (the series for an episode or season).
    pub const fn inherits_parent_artwork(self) -> bool {
        matches!(self, EntityKind::Episode | EntityKind::Season)
    }
}

/// An entity that needs auxiliary imagery warmed before it scrolls into view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrefetchEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Related entity whose artwork may stand in for this one (e.g. the
    /// series of an episode).
    pub parent_id: Option<EntityId>,
}

impl PrefetchEntity {
    pub fn new(id: impl Into<EntityId>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<EntityId>) -> Self {
        let parent_id = parent_id.into();
        self.parent_id = (!parent_id.is_empty()).then_some(parent_id);
        self
    }

    /// Candidate ids whose artwork may represent this entity, own id first.
    pub fn source_ids(&self) -> impl Iterator<Item = &EntityId> {
        std::iter::once(&self.id).chain(
            self.parent_id.iter().filter(|parent| **parent != self.id),
        )
    }
}
