//! Entity kinds of the game configuration data.
//!
//! The parsing stage labels every definition with a free-text type string.
//! [`EntityKind`] closes the set of kinds the engine knows about and keeps an
//! [`EntityKind::Other`] escape hatch so unrecognized types from newer game
//! data still flow through unchanged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of a game-data definition.
///
/// Serialized as its canonical lowercase name (`"item"`, `"entity_class"`),
/// so stored rows and JSON stay readable by other tools.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Item,
    Block,
    Buff,
    EntityClass,
    EntityGroup,
    Recipe,
    LootContainer,
    LootGroup,
    ItemModifier,
    Quest,
    Progression,
    GameEvent,
    Sound,
    Material,
    /// A type string the engine has no dedicated variant for.
    Other(String),
}

impl EntityKind {
    /// Returns the canonical type string used by the parsing stage.
    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::Item => "item",
            EntityKind::Block => "block",
            EntityKind::Buff => "buff",
            EntityKind::EntityClass => "entity_class",
            EntityKind::EntityGroup => "entity_group",
            EntityKind::Recipe => "recipe",
            EntityKind::LootContainer => "loot_container",
            EntityKind::LootGroup => "loot_group",
            EntityKind::ItemModifier => "item_modifier",
            EntityKind::Quest => "quest",
            EntityKind::Progression => "progression",
            EntityKind::GameEvent => "game_event",
            EntityKind::Sound => "sound",
            EntityKind::Material => "material",
            EntityKind::Other(s) => s,
        }
    }

    /// Returns `true` for kinds outside the known set.
    pub fn is_other(&self) -> bool {
        matches!(self, EntityKind::Other(_))
    }
}

impl From<&str> for EntityKind {
    fn from(s: &str) -> Self {
        match s {
            "item" => EntityKind::Item,
            "block" => EntityKind::Block,
            "buff" => EntityKind::Buff,
            "entity_class" => EntityKind::EntityClass,
            "entity_group" => EntityKind::EntityGroup,
            "recipe" => EntityKind::Recipe,
            "loot_container" => EntityKind::LootContainer,
            "loot_group" => EntityKind::LootGroup,
            "item_modifier" => EntityKind::ItemModifier,
            "quest" => EntityKind::Quest,
            "progression" => EntityKind::Progression,
            "game_event" => EntityKind::GameEvent,
            "sound" => EntityKind::Sound,
            "material" => EntityKind::Material,
            other => EntityKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EntityKind {
    fn from(s: String) -> Self {
        EntityKind::from(s.as_str())
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for EntityKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EntityKind::from(s))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_parse_to_variants() {
        assert_eq!(EntityKind::from("item"), EntityKind::Item);
        assert_eq!(EntityKind::from("entity_class"), EntityKind::EntityClass);
        assert_eq!(EntityKind::from("loot_container"), EntityKind::LootContainer);
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let kind = EntityKind::from("vehicle");
        assert_eq!(kind, EntityKind::Other("vehicle".into()));
        assert!(kind.is_other());
        assert_eq!(kind.as_str(), "vehicle");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&EntityKind::Buff).unwrap();
        assert_eq!(json, "\"buff\"");
        let back: EntityKind = serde_json::from_str("\"npc_faction\"").unwrap();
        assert_eq!(back, EntityKind::Other("npc_faction".into()));
    }

    #[test]
    fn known_name_never_becomes_other() {
        // "block" must map to the dedicated variant so equality with
        // parser-produced kinds holds.
        let parsed: EntityKind = "block".parse().unwrap();
        assert!(!parsed.is_other());
        assert_eq!(parsed.to_string(), "block");
    }
}
