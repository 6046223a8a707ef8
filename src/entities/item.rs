// 🏠 Item Entity - a configurable thing in the home-automation registry
//
// "Item name is IDENTITY (never changes after creation), everything else is a VALUE"
//
// Items are either scalar (a switch, a number, a dimmer...) or groups. A group
// may be typed with a scalar base type, in which case it can compute a derived
// state through an aggregation function.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// BASE TYPE (scalar kinds)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BaseType {
    Switch,
    Contact,
    Rollershutter,
    Dimmer,
    Number,
    String,
    DateTime,
    Color,
    Location,
    Player,
    Image,
    Call,
}

impl BaseType {
    pub const ALL: [BaseType; 12] = [
        BaseType::Switch,
        BaseType::Contact,
        BaseType::Rollershutter,
        BaseType::Dimmer,
        BaseType::Number,
        BaseType::String,
        BaseType::DateTime,
        BaseType::Color,
        BaseType::Location,
        BaseType::Player,
        BaseType::Image,
        BaseType::Call,
    ];

    /// Bare registry token, e.g. `Number`
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::Switch => "Switch",
            BaseType::Contact => "Contact",
            BaseType::Rollershutter => "Rollershutter",
            BaseType::Dimmer => "Dimmer",
            BaseType::Number => "Number",
            BaseType::String => "String",
            BaseType::DateTime => "DateTime",
            BaseType::Color => "Color",
            BaseType::Location => "Location",
            BaseType::Player => "Player",
            BaseType::Image => "Image",
            BaseType::Call => "Call",
        }
    }

    /// Item type token, e.g. `NumberItem`
    pub fn item_token(&self) -> &'static str {
        match self {
            BaseType::Switch => "SwitchItem",
            BaseType::Contact => "ContactItem",
            BaseType::Rollershutter => "RollershutterItem",
            BaseType::Dimmer => "DimmerItem",
            BaseType::Number => "NumberItem",
            BaseType::String => "StringItem",
            BaseType::DateTime => "DateTimeItem",
            BaseType::Color => "ColorItem",
            BaseType::Location => "LocationItem",
            BaseType::Player => "PlayerItem",
            BaseType::Image => "ImageItem",
            BaseType::Call => "CallItem",
        }
    }

    pub fn parse(token: &str) -> Option<BaseType> {
        BaseType::ALL.iter().copied().find(|b| b.as_str() == token)
    }

    /// Numeric-like kinds aggregate with arithmetic functions
    pub fn is_numeric(&self) -> bool {
        matches!(self, BaseType::Number | BaseType::Dimmer)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ============================================================================
// ITEM TYPE
// ============================================================================

pub const GROUP_TOKEN: &str = "GroupItem";

/// Item type tag: one of the scalar kinds or the group kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ItemType {
    Scalar(BaseType),
    Group,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Scalar(base) => base.item_token(),
            ItemType::Group => GROUP_TOKEN,
        }
    }

    pub fn parse(token: &str) -> Option<ItemType> {
        if token == GROUP_TOKEN {
            return Some(ItemType::Group);
        }
        BaseType::ALL
            .iter()
            .copied()
            .find(|b| b.item_token() == token)
            .map(ItemType::Scalar)
    }

    pub fn is_group(&self) -> bool {
        matches!(self, ItemType::Group)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl TryFrom<String> for ItemType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ItemType::parse(&value).ok_or_else(|| format!("unknown item type: {}", value))
    }
}

impl From<ItemType> for String {
    fn from(value: ItemType) -> Self {
        value.as_str().to_string()
    }
}

// ============================================================================
// ITEM ENTITY
// ============================================================================

/// Item as the registry stores it (wire form).
///
/// `group_type` is the bare base type and `function` the encoded aggregation
/// function string; both only mean something for group items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier, immutable after creation
    pub name: String,

    #[serde(rename = "type")]
    pub item_type: ItemType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_type: Option<BaseType>,

    /// Icon hint (e.g. "temperature", "light")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Parent groups this item belongs to
    #[serde(default)]
    pub group_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

impl Item {
    pub fn new(name: impl Into<String>, item_type: ItemType) -> Self {
        Item {
            name: name.into(),
            item_type,
            group_type: None,
            category: None,
            label: String::new(),
            tags: BTreeSet::new(),
            group_names: Vec::new(),
            function: None,
        }
    }

    /// Create a group, optionally typed and with an encoded function
    pub fn group(
        name: impl Into<String>,
        group_type: Option<BaseType>,
        function: Option<&str>,
    ) -> Self {
        let mut item = Self::new(name, ItemType::Group);
        item.group_type = group_type;
        item.function = function.map(str::to_string);
        item
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn is_group(&self) -> bool {
        self.item_type.is_group()
    }

    /// Base type of a group, or None for scalar items and untyped groups
    pub fn effective_group_type(&self) -> Option<BaseType> {
        if self.is_group() {
            self.group_type
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_type_tokens() {
        assert_eq!(ItemType::Group.as_str(), "GroupItem");
        assert_eq!(ItemType::Scalar(BaseType::Number).as_str(), "NumberItem");
        assert_eq!(ItemType::parse("DimmerItem"), Some(ItemType::Scalar(BaseType::Dimmer)));
        assert_eq!(ItemType::parse("GroupItem"), Some(ItemType::Group));
        assert_eq!(ItemType::parse("Dimmer"), None);
    }

    #[test]
    fn test_base_type_tokens() {
        for base in BaseType::ALL {
            assert_eq!(BaseType::parse(base.as_str()), Some(base));
            assert_eq!(base.item_token(), format!("{}Item", base.as_str()));
        }
        assert!(BaseType::Number.is_numeric());
        assert!(BaseType::Dimmer.is_numeric());
        assert!(!BaseType::Switch.is_numeric());
    }

    #[test]
    fn test_item_json_shape() {
        let item = Item::group("Temp1", Some(BaseType::Number), Some("AVG")).with_label("Temperature");
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["name"], "Temp1");
        assert_eq!(json["type"], "GroupItem");
        assert_eq!(json["groupType"], "Number");
        assert_eq!(json["function"], "AVG");
        assert!(json.get("category").is_none());

        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_effective_group_type() {
        let temps = Item::group("Temps", Some(BaseType::Number), Some("AVG"));
        assert_eq!(temps.effective_group_type(), Some(BaseType::Number));
        assert_eq!(Item::group("House", None, None).effective_group_type(), None);

        // A stale group type on a scalar does not count
        let mut lamp = Item::new("Lamp", ItemType::Scalar(BaseType::Switch));
        lamp.group_type = Some(BaseType::Switch);
        assert_eq!(lamp.effective_group_type(), None);
    }

    #[test]
    fn test_item_json_defaults() {
        let item: Item = serde_json::from_str(r#"{"name":"Lamp","type":"SwitchItem"}"#).unwrap();
        assert_eq!(item.item_type, ItemType::Scalar(BaseType::Switch));
        assert!(item.tags.is_empty());
        assert!(item.function.is_none());
        assert!(!item.is_group());

        let bad = serde_json::from_str::<Item>(r#"{"name":"X","type":"FooItem"}"#);
        assert!(bad.is_err());
    }
}
