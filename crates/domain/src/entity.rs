//! World occupants as seen by the client.

use serde::{Deserialize, Serialize};

use crate::conversation::EntityConversation;
use crate::grid::{Facing, GridPos};
use crate::ids::EntityId;

/// What kind of occupant an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    /// Human-controlled avatar
    #[default]
    Player,
    /// Static obstacle
    Wall,
    /// Autonomous agent
    Robot,
}

impl EntityKind {
    /// Walls never take part in conversations.
    pub fn can_converse(self) -> bool {
        !matches!(self, EntityKind::Wall)
    }
}

/// Needs of an autonomous entity. `mood` ranges -1..=1, the rest 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub energy: f32,
    pub hunger: f32,
    pub loneliness: f32,
    pub mood: f32,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            energy: 0.8,
            hunger: 0.3,
            loneliness: 0.3,
            mood: 0.5,
        }
    }
}

impl Vitals {
    /// Overwrite only the fields present in `patch`, clamped to their ranges.
    pub fn apply(&mut self, patch: &VitalsPatch) {
        if let Some(energy) = patch.energy {
            self.energy = energy.clamp(0.0, 1.0);
        }
        if let Some(hunger) = patch.hunger {
            self.hunger = hunger.clamp(0.0, 1.0);
        }
        if let Some(loneliness) = patch.loneliness {
            self.loneliness = loneliness.clamp(0.0, 1.0);
        }
        if let Some(mood) = patch.mood {
            self.mood = mood.clamp(-1.0, 1.0);
        }
    }
}

/// Partial vitals update; absent fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VitalsPatch {
    #[serde(default)]
    pub energy: Option<f32>,
    #[serde(default)]
    pub hunger: Option<f32>,
    #[serde(default)]
    pub loneliness: Option<f32>,
    #[serde(default)]
    pub mood: Option<f32>,
}

/// A simulated occupant of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub display_name: String,
    pub position: GridPos,
    pub facing: Facing,
    /// Sprite-set reference for the renderer.
    pub sprites: Option<String>,
    pub conversation: EntityConversation,
    pub vitals: Option<Vitals>,
}

impl WorldEntity {
    pub fn new(id: impl Into<EntityId>, kind: EntityKind, position: GridPos) -> Self {
        Self {
            id: id.into(),
            kind,
            display_name: String::new(),
            position,
            facing: Facing::None,
            sprites: None,
            conversation: EntityConversation::idle(),
            vitals: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_conversation(mut self, conversation: EntityConversation) -> Self {
        self.conversation = conversation;
        self
    }

    /// Name for UI, falling back to a short id.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            let id = self.id.as_str();
            &id[..id.char_indices().nth(8).map_or(id.len(), |(i, _)| i)]
        } else {
            &self.display_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vitals_patch_updates_only_present_fields() {
        let mut vitals = Vitals::default();
        vitals.apply(&VitalsPatch {
            hunger: Some(1.4),
            mood: Some(-0.25),
            ..VitalsPatch::default()
        });

        assert_eq!(vitals.energy, 0.8);
        assert_eq!(vitals.hunger, 1.0);
        assert_eq!(vitals.mood, -0.25);
    }

    #[test]
    fn label_falls_back_to_short_id() {
        let e = WorldEntity::new("0123456789abcdef", EntityKind::Robot, GridPos::new(0, 0));
        assert_eq!(e.label(), "01234567");
        let named = e.with_display_name("Ada");
        assert_eq!(named.label(), "Ada");
    }

    #[test]
    fn walls_cannot_converse() {
        assert!(!EntityKind::Wall.can_converse());
        assert!(EntityKind::Robot.can_converse());
    }
}
