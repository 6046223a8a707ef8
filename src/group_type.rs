// 🔁 Group Type Normalizer
//
// The registry stores a group's base type bare (`Number`) or not at all.
// The editor shows it suffixed (`NumberItem`) and uses `none` for untyped
// groups. Both directions are pure and inverse to each other.

use crate::entities::BaseType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix marking a base type "used as a group"
pub const GROUP_SUFFIX: &str = "Item";

/// Display sentinel for an untyped (heterogeneous) group
pub const NONE_TOKEN: &str = "none";

/// Group type as the editor displays and selects it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GroupTypeChoice {
    #[default]
    None,
    Typed(BaseType),
}

impl GroupTypeChoice {
    /// Display token: `none` or `<Base>Item`
    pub fn token(&self) -> String {
        match self {
            GroupTypeChoice::None => NONE_TOKEN.to_string(),
            GroupTypeChoice::Typed(base) => format!("{}{}", base.as_str(), GROUP_SUFFIX),
        }
    }

    pub fn parse(token: &str) -> Option<GroupTypeChoice> {
        if token == NONE_TOKEN {
            return Some(GroupTypeChoice::None);
        }
        token
            .strip_suffix(GROUP_SUFFIX)
            .and_then(BaseType::parse)
            .map(GroupTypeChoice::Typed)
    }

    pub fn base_type(&self) -> Option<BaseType> {
        to_wire(*self)
    }

    /// Every choice offered by the group type picker, `none` first
    pub fn all() -> Vec<GroupTypeChoice> {
        std::iter::once(GroupTypeChoice::None)
            .chain(BaseType::ALL.iter().copied().map(GroupTypeChoice::Typed))
            .collect()
    }
}

impl fmt::Display for GroupTypeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.token())
    }
}

impl TryFrom<String> for GroupTypeChoice {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        GroupTypeChoice::parse(&value).ok_or_else(|| format!("unknown group type: {}", value))
    }
}

impl From<GroupTypeChoice> for String {
    fn from(value: GroupTypeChoice) -> Self {
        value.token()
    }
}

pub fn to_display(base: Option<BaseType>) -> GroupTypeChoice {
    match base {
        Some(base) => GroupTypeChoice::Typed(base),
        None => GroupTypeChoice::None,
    }
}

pub fn to_wire(display: GroupTypeChoice) -> Option<BaseType> {
    match display {
        GroupTypeChoice::None => None,
        GroupTypeChoice::Typed(base) => Some(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_tokens() {
        assert_eq!(to_display(Some(BaseType::Number)).token(), "NumberItem");
        assert_eq!(to_display(Some(BaseType::Switch)).token(), "SwitchItem");
        assert_eq!(to_display(None).token(), "none");
    }

    #[test]
    fn test_round_trip_every_base_type() {
        assert_eq!(to_wire(to_display(None)), None);
        for base in BaseType::ALL {
            assert_eq!(to_wire(to_display(Some(base))), Some(base));

            let token = to_display(Some(base)).token();
            assert_eq!(GroupTypeChoice::parse(&token), Some(GroupTypeChoice::Typed(base)));
        }
    }

    #[test]
    fn test_parse_rejects_bare_and_unknown_tokens() {
        assert_eq!(GroupTypeChoice::parse("none"), Some(GroupTypeChoice::None));
        assert_eq!(GroupTypeChoice::parse("Number"), None);
        assert_eq!(GroupTypeChoice::parse("GroupItem"), None);
        assert_eq!(GroupTypeChoice::parse("Item"), None);
    }

    #[test]
    fn test_picker_choices() {
        let all = GroupTypeChoice::all();
        assert_eq!(all.len(), BaseType::ALL.len() + 1);
        assert_eq!(all[0], GroupTypeChoice::None);
    }
}
