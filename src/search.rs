// 🔍 Relation Search - candidates for the parent/member pickers
//
// Recomputed on every keystroke, so results are a lazy iterator over the
// snapshot rather than a cached list. Snapshot order is name order, which
// makes the result sorted and duplicate-free for free.

use crate::entities::{Item, ItemSnapshot};

/// Options for a relation search
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchQuery<'a> {
    /// Raw substring the name must contain (no case folding)
    pub text: &'a str,

    /// Only offer group items (parent picker)
    pub only_groups: bool,

    /// Name never offered, usually the item being edited
    pub exclude: Option<&'a str>,
}

impl<'a> SearchQuery<'a> {
    pub fn new(text: &'a str) -> Self {
        SearchQuery {
            text,
            ..Default::default()
        }
    }

    pub fn groups_only(mut self) -> Self {
        self.only_groups = true;
        self
    }

    pub fn excluding(mut self, name: Option<&'a str>) -> Self {
        self.exclude = name;
        self
    }

    fn matches(&self, item: &Item) -> bool {
        item.name.contains(self.text)
            && (!self.only_groups || item.is_group())
            && self.exclude != Some(item.name.as_str())
    }
}

/// Names of matching items in ascending order
pub fn search<'a>(
    snapshot: &'a ItemSnapshot,
    query: SearchQuery<'a>,
) -> impl Iterator<Item = &'a str> + 'a {
    snapshot
        .iter()
        .filter(move |item| query.matches(item))
        .map(|item| item.name.as_str())
}
