// ⚖️ Configuration Reconciler - load, edit, and submit one item
//
// An editing session holds two views of the item:
//   original  wire form as loaded (None while creating), never mutated
//   working   display form the editor mutates
//
// On submit the working form is turned back into wire form and compared to
// the original. Only a real difference reaches the store.
//
// Session lifecycle:
//   Loading  -> no session yet (open/load)
//   Create   -> SessionMode::Create
//   Edit     -> SessionMode::Edit
//   Submitting -> inside submit()
//   Succeeded / Failed -> the submit result; the caller then closes the editor

use crate::entities::{Item, ItemSnapshot, ItemType};
use crate::error::{FunctionError, LoadError, SubmitError, ValidationError};
use crate::function::{self, derive_function_set, AggregationFunction, FunctionKind};
use crate::group_type::{self, GroupTypeChoice};
use crate::search::{search, SearchQuery};
use crate::services::{Collaborators, ItemStore};
use crate::validation::{self, NameField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// SESSION MODE & OUTCOME
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Create,
    Edit,
}

impl SessionMode {
    /// Notice shown after a successful (or skipped) write
    pub fn success_message(&self) -> &'static str {
        match self {
            SessionMode::Create => "Item created.",
            SessionMode::Edit => "Item updated.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitOutcome {
    /// Nothing changed, no write was issued
    Unchanged,
    /// The store acknowledged the write
    Written,
}

// ============================================================================
// ITEM FORM (display form)
// ============================================================================

/// Editable state of an item as the editor shows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemForm {
    name: String,
    pub item_type: Option<ItemType>,
    group_type: GroupTypeChoice,
    pub category: Option<String>,
    pub label: String,
    pub tags: BTreeSet<String>,
    pub group_names: Vec<String>,
    function: Option<AggregationFunction>,
    /// Stored function string that did not decode, written back as is
    unreadable_function: Option<String>,
}

impl ItemForm {
    pub fn blank() -> Self {
        ItemForm {
            name: String::new(),
            item_type: None,
            group_type: GroupTypeChoice::None,
            category: None,
            label: String::new(),
            tags: BTreeSet::new(),
            group_names: Vec::new(),
            function: None,
            unreadable_function: None,
        }
    }

    /// Display form of a stored item.
    ///
    /// The function string only means something on a typed group, so it is
    /// only decoded there. A string that does not decode is kept verbatim
    /// until the function is edited.
    pub fn from_item(item: &Item) -> Self {
        let mut function = None;
        let mut unreadable_function = None;

        if let (Some(_), Some(wire)) = (item.effective_group_type(), item.function.as_deref()) {
            match function::decode(wire) {
                Ok(decoded) => function = decoded,
                Err(e) => {
                    log::warn!("Keeping unreadable function {:?} of {}: {}", wire, item.name, e);
                    unreadable_function = Some(wire.to_string());
                }
            }
        }

        ItemForm {
            name: item.name.clone(),
            item_type: Some(item.item_type),
            group_type: group_type::to_display(item.group_type),
            category: item.category.clone(),
            label: item.label.clone(),
            tags: item.tags.clone(),
            group_names: item.group_names.clone(),
            function,
            unreadable_function,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group_type(&self) -> GroupTypeChoice {
        self.group_type
    }

    pub fn function(&self) -> Option<&AggregationFunction> {
        self.function.as_ref()
    }

    pub fn unreadable_function(&self) -> Option<&str> {
        self.unreadable_function.as_deref()
    }

    fn set_function(&mut self, function: Option<AggregationFunction>) {
        self.function = function;
        self.unreadable_function = None;
    }

    /// Wire form of the item: the inverse of `from_item`.
    pub fn to_item(&self) -> Result<Item, ValidationError> {
        let item_type = self.item_type.ok_or(ValidationError::MissingType)?;
        Ok(self.to_item_as(item_type))
    }

    fn to_item_as(&self, item_type: ItemType) -> Item {
        // Functions only exist on typed groups
        let (group_type, function) = match (item_type, group_type::to_wire(self.group_type)) {
            (ItemType::Group, Some(base)) => (
                Some(base),
                function::encode_field(self.function.as_ref())
                    .or_else(|| self.unreadable_function.clone()),
            ),
            _ => (None, None),
        };

        Item {
            name: self.name.clone(),
            item_type,
            group_type,
            category: self
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            label: self.label.clone(),
            tags: self.tags.clone(),
            group_names: self.group_names.clone(),
            function,
        }
    }
}

// ============================================================================
// FORM CHANGES (bulk edits from CLI flags or API requests)
// ============================================================================

/// Function selection: a kind and its raw parameters, or no kind to clear
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionChoice {
    pub kind: Option<FunctionKind>,
    #[serde(default)]
    pub params: Vec<String>,
}

/// A set of field edits; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormChanges {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
    pub group_type: Option<GroupTypeChoice>,
    pub category: Option<String>,
    pub label: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub group_names: Option<Vec<String>>,
    pub function: Option<FunctionChoice>,
}

// ============================================================================
// EDITING SESSION
// ============================================================================

#[derive(Debug, Clone)]
pub struct EditingSession {
    mode: SessionMode,
    original: Option<Item>,
    working: ItemForm,
    candidate_functions: &'static [FunctionKind],
    snapshot: ItemSnapshot,
    name_field: NameField,
}

impl EditingSession {
    /// Start a session for a new item
    pub fn create(snapshot: ItemSnapshot) -> Self {
        let working = ItemForm::blank();
        log::debug!("Opened create session on snapshot {}", snapshot.snapshot_id);

        EditingSession {
            mode: SessionMode::Create,
            original: None,
            candidate_functions: derive_function_set(working.group_type.base_type()),
            working,
            snapshot,
            name_field: NameField::default(),
        }
    }

    /// Start a session editing the item `name` from the snapshot
    pub fn edit(snapshot: ItemSnapshot, name: &str) -> Result<Self, LoadError> {
        let item = snapshot
            .get(name)
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;

        let working = ItemForm::from_item(item);
        // Original goes through the same transforms, so an untouched form
        // compares equal even if the stored item was shaped differently.
        let original = working.to_item_as(item.item_type);
        log::debug!("Opened edit session for {} on snapshot {}", name, snapshot.snapshot_id);

        Ok(EditingSession {
            mode: SessionMode::Edit,
            original: Some(original),
            candidate_functions: derive_function_set(working.group_type.base_type()),
            working,
            snapshot,
            name_field: NameField::default(),
        })
    }

    /// Edit when a key is given, create otherwise
    pub fn load(snapshot: ItemSnapshot, key: Option<&str>) -> Result<Self, LoadError> {
        match key {
            Some(name) => Self::edit(snapshot, name),
            None => Ok(Self::create(snapshot)),
        }
    }

    /// Take a fresh snapshot from the store and load
    pub fn open(store: &dyn ItemStore, key: Option<&str>) -> Result<Self, LoadError> {
        let snapshot = ItemSnapshot::new(store.list_non_recursive()?);
        Self::load(snapshot, key)
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn original(&self) -> Option<&Item> {
        self.original.as_ref()
    }

    pub fn working(&self) -> &ItemForm {
        &self.working
    }

    pub fn working_mut(&mut self) -> &mut ItemForm {
        &mut self.working
    }

    pub fn snapshot(&self) -> &ItemSnapshot {
        &self.snapshot
    }

    /// Functions offered for the current group type
    pub fn candidate_functions(&self) -> &'static [FunctionKind] {
        self.candidate_functions
    }

    // ------------------------------------------------------------------------
    // Field edits
    // ------------------------------------------------------------------------

    /// Names can only be chosen while creating
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        let name = name.into();
        if self.mode == SessionMode::Edit && name != self.working.name {
            return Err(ValidationError::NameLocked);
        }
        self.working.name = name;
        Ok(())
    }

    /// Check the current name against the snapshot and update the field
    /// marking. Returns whether the field is valid.
    pub fn check_name(&mut self) -> bool {
        self.name_field.check(&self.working.name, &self.snapshot)
    }

    pub fn name_invalid(&self) -> bool {
        self.name_field.invalid
    }

    /// Change the display group type.
    ///
    /// Re-derives the candidate functions; a real change drops the function
    /// chosen so far.
    pub fn set_group_type(&mut self, choice: GroupTypeChoice) {
        if choice != self.working.group_type {
            self.working.group_type = choice;
            self.working.set_function(None);
        }
        self.candidate_functions = derive_function_set(choice.base_type());
    }

    pub fn select_function<S: AsRef<str>>(
        &mut self,
        kind: FunctionKind,
        params: &[S],
    ) -> Result<(), FunctionError> {
        if !self.candidate_functions.contains(&kind) {
            return Err(FunctionError::NotAvailable {
                kind: kind.as_str().to_string(),
                group_type: self.working.group_type.token(),
            });
        }
        let function = AggregationFunction::from_parts(kind, params)?;
        self.working.set_function(Some(function));
        Ok(())
    }

    pub fn clear_function(&mut self) {
        self.working.set_function(None);
    }

    /// Add a parent group; only existing groups other than the item itself
    pub fn add_parent(&mut self, name: &str) -> Result<(), ValidationError> {
        let is_group = self.snapshot.get(name).map(Item::is_group).unwrap_or(false);
        if !is_group || name == self.working.name {
            return Err(ValidationError::InvalidParent(name.to_string()));
        }
        if !self.working.group_names.iter().any(|g| g == name) {
            self.working.group_names.push(name.to_string());
        }
        Ok(())
    }

    pub fn remove_parent(&mut self, name: &str) -> bool {
        let before = self.working.group_names.len();
        self.working.group_names.retain(|g| g != name);
        self.working.group_names.len() != before
    }

    /// Apply a batch of edits, group type before function.
    ///
    /// All or nothing: if any edit is rejected the working item is left as
    /// it was before the call.
    pub fn apply(&mut self, changes: &FormChanges) -> Result<(), ValidationError> {
        let working = self.working.clone();
        let candidate_functions = self.candidate_functions;

        let result = self.apply_each(changes);
        if result.is_err() {
            self.working = working;
            self.candidate_functions = candidate_functions;
        }
        result
    }

    fn apply_each(&mut self, changes: &FormChanges) -> Result<(), ValidationError> {
        if let Some(name) = &changes.name {
            self.set_name(name.clone())?;
        }
        if let Some(item_type) = changes.item_type {
            self.working.item_type = Some(item_type);
        }
        if let Some(choice) = changes.group_type {
            self.set_group_type(choice);
        }
        if let Some(category) = &changes.category {
            self.working.category = Some(category.clone());
        }
        if let Some(label) = &changes.label {
            self.working.label = label.clone();
        }
        if let Some(tags) = &changes.tags {
            self.working.tags = tags.clone();
        }
        if let Some(parents) = &changes.group_names {
            self.working.group_names.clear();
            for parent in parents {
                self.add_parent(parent)?;
            }
        }
        if let Some(choice) = &changes.function {
            match choice.kind {
                Some(kind) => self.select_function(kind, choice.params.as_slice())?,
                None => self.clear_function(),
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Relation pickers
    // ------------------------------------------------------------------------

    /// Group items this item could belong to
    pub fn parent_candidates<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        search(
            &self.snapshot,
            SearchQuery::new(text).groups_only().excluding(self.self_name()),
        )
    }

    /// Items that could become members of this group
    pub fn member_candidates<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        search(&self.snapshot, SearchQuery::new(text).excluding(self.self_name()))
    }

    fn self_name(&self) -> Option<&str> {
        Some(self.working.name.as_str()).filter(|n| !n.is_empty())
    }

    // ------------------------------------------------------------------------
    // Submit
    // ------------------------------------------------------------------------

    /// Wire form of the working item, validated for submission
    pub fn prepare(&self) -> Result<Item, ValidationError> {
        if self.mode == SessionMode::Create {
            validation::validate_new_name(&self.working.name, &self.snapshot)?;
        }
        self.working.to_item()
    }

    /// Whether the prepared item differs from what was loaded
    pub fn is_changed(&self, prepared: &Item) -> bool {
        self.original.as_ref() != Some(prepared)
    }

    /// Validate, diff and write if needed.
    ///
    /// A validation error keeps the editor open; see
    /// [`SubmitError::leaves_editor`] for the navigation policy.
    pub fn submit(&self, services: Collaborators<'_>) -> Result<SubmitOutcome, SubmitError> {
        let item = self.prepare()?;
        let message = self.mode.success_message();

        if !self.is_changed(&item) {
            log::debug!("No changes to {}, skipping write", item.name);
            services.notifier.show_message(message);
            return Ok(SubmitOutcome::Unchanged);
        }

        match services.store.put(&item.name, &item) {
            Ok(()) => {
                log::info!("Saved item {} ({:?})", item.name, self.mode);
                services.dirty.mark_dirty();
                services.notifier.show_message(message);
                Ok(SubmitOutcome::Written)
            }
            Err(e) => {
                log::warn!("Saving item {} failed: {}", item.name, e);
                services
                    .notifier
                    .show_message(&format!("Item could not be saved: {}", e));
                Err(SubmitError::Write(e))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BaseType;
    use crate::function::{ARITHMETIC_FUNCTIONS, LOGICAL_FUNCTIONS};
    use crate::services::{DirtyFlag, MemoryItemStore, MessageLog};

    struct Harness {
        store: MemoryItemStore,
        dirty: DirtyFlag,
        messages: MessageLog,
    }

    impl Harness {
        fn new(items: Vec<Item>) -> Self {
            Harness {
                store: MemoryItemStore::with_items(items),
                dirty: DirtyFlag::new(),
                messages: MessageLog::new(),
            }
        }

        fn services(&self) -> Collaborators<'_> {
            Collaborators::new(&self.store, &self.dirty, &self.messages)
        }

        fn open(&self, key: Option<&str>) -> EditingSession {
            EditingSession::open(&self.store, key).unwrap()
        }
    }

    fn temp_group() -> Item {
        Item::group("Temp1", Some(BaseType::Number), Some("AVG")).with_label("Temperatures")
    }

    fn registry() -> Vec<Item> {
        vec![
            temp_group(),
            Item::group("Lights", Some(BaseType::Switch), Some("AND")),
            Item::group("House", None, None),
            Item::new("Lamp", ItemType::Scalar(BaseType::Switch)),
        ]
    }

    #[test]
    fn test_edit_changed_writes_once() {
        let h = Harness::new(registry());
        let mut session = h.open(Some("Temp1"));
        assert_eq!(session.mode(), SessionMode::Edit);
        assert_eq!(session.working().group_type().token(), "NumberItem");
        assert_eq!(session.working().function(), Some(&AggregationFunction::new(FunctionKind::Avg)));

        session.working_mut().label = "Average temperature".to_string();
        let outcome = session.submit(h.services()).unwrap();

        assert_eq!(outcome, SubmitOutcome::Written);
        assert_eq!(h.store.write_count(), 1);
        assert_eq!(h.dirty.count(), 1);
        assert_eq!(h.messages.messages(), vec!["Item updated."]);

        let saved = h.store.get("Temp1").unwrap();
        assert_eq!(saved.function.as_deref(), Some("AVG"));
        assert_eq!(saved.group_type, Some(BaseType::Number));
        assert_eq!(saved.label, "Average temperature");
    }

    #[test]
    fn test_edit_unchanged_skips_write() {
        let h = Harness::new(registry());
        let session = h.open(Some("Temp1"));

        let outcome = session.submit(h.services()).unwrap();

        assert_eq!(outcome, SubmitOutcome::Unchanged);
        assert_eq!(h.store.write_count(), 0);
        assert!(!h.dirty.is_dirty());
        assert_eq!(h.messages.messages(), vec!["Item updated."]);
    }

    #[test]
    fn test_create_group_with_threshold() {
        let h = Harness::new(registry());
        let mut session = h.open(None);
        assert_eq!(session.mode(), SessionMode::Create);
        assert!(session.original().is_none());

        session.set_name("Humidity").unwrap();
        session.working_mut().item_type = Some(ItemType::Group);
        session.set_group_type(GroupTypeChoice::Typed(BaseType::Number));
        session
            .select_function(FunctionKind::Threshold, &["10", "20"])
            .unwrap();

        let outcome = session.submit(h.services()).unwrap();
        assert_eq!(outcome, SubmitOutcome::Written);

        let saved = h.store.get("Humidity").unwrap();
        assert_eq!(saved.function.as_deref(), Some("THRESHOLD_10_20"));
        assert_eq!(saved.group_type, Some(BaseType::Number));
        assert_eq!(h.messages.messages(), vec!["Item created."]);
    }

    #[test]
    fn test_function_set_follows_group_type() {
        let h = Harness::new(registry());
        let mut session = h.open(Some("Lights"));
        assert_eq!(session.candidate_functions(), LOGICAL_FUNCTIONS);
        assert_eq!(session.working().function(), Some(&AggregationFunction::new(FunctionKind::And)));

        session.set_group_type(GroupTypeChoice::Typed(BaseType::Number));
        assert_eq!(session.candidate_functions(), ARITHMETIC_FUNCTIONS);
        assert_eq!(session.working().function(), None);

        // AND is no longer offered
        let err = session.select_function::<&str>(FunctionKind::And, &[]).unwrap_err();
        assert!(matches!(err, FunctionError::NotAvailable { .. }));

        session.select_function::<&str>(FunctionKind::Max, &[]).unwrap();
        session.set_group_type(GroupTypeChoice::Typed(BaseType::Number));
        assert_eq!(session.working().function(), Some(&AggregationFunction::new(FunctionKind::Max)));
    }

    #[test]
    fn test_untyped_group_and_scalars_drop_function() {
        let h = Harness::new(registry());
        let mut session = h.open(Some("Lights"));
        session.set_group_type(GroupTypeChoice::None);
        let prepared = session.prepare().unwrap();
        assert_eq!(prepared.group_type, None);
        assert_eq!(prepared.function, None);

        let mut session = h.open(Some("Temp1"));
        session.working_mut().item_type = Some(ItemType::Scalar(BaseType::Number));
        let prepared = session.prepare().unwrap();
        assert_eq!(prepared.group_type, None);
        assert_eq!(prepared.function, None);
        assert!(session.is_changed(&prepared));
    }

    #[test]
    fn test_equivalent_shapes_are_not_changes() {
        // Stored shapes that normalize to the loaded form
        let mut scalar = Item::new("Lamp", ItemType::Scalar(BaseType::Switch));
        scalar.group_type = Some(BaseType::Switch);
        scalar.function = Some("OR".to_string());
        scalar.category = Some(String::new());
        let overlong = Item::group("Heating", Some(BaseType::Number), Some("THRESHOLD_18_22_5"));
        let empty_fn = Item::group("Blinds", Some(BaseType::Rollershutter), Some(""));
        let untyped = Item::group("House", None, Some("OR"));

        let h = Harness::new(vec![scalar, overlong, empty_fn, untyped]);
        for name in ["Lamp", "Heating", "Blinds", "House"] {
            let session = h.open(Some(name));
            assert_eq!(session.submit(h.services()).unwrap(), SubmitOutcome::Unchanged);
        }
        assert_eq!(h.store.write_count(), 0);
    }

    #[test]
    fn test_create_validation_blocks_write() {
        let h = Harness::new(registry());
        let mut session = h.open(None);

        session.working_mut().item_type = Some(ItemType::Scalar(BaseType::Switch));
        let err = session.submit(h.services()).unwrap_err();
        assert!(matches!(err, SubmitError::Validation(ValidationError::EmptyName)));
        assert!(!err.leaves_editor());

        session.set_name("Lamp").unwrap();
        assert!(!session.check_name());
        assert!(session.name_invalid());
        let err = session.submit(h.services()).unwrap_err();
        assert!(matches!(err, SubmitError::Validation(ValidationError::DuplicateName(_))));

        session.set_name("Lamp_2").unwrap();
        session.working_mut().item_type = None;
        let err = session.submit(h.services()).unwrap_err();
        assert!(matches!(err, SubmitError::Validation(ValidationError::MissingType)));

        assert_eq!(h.store.write_count(), 0);
        assert!(h.messages.messages().is_empty());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let h = Harness::new(registry());
        h.store.reject_writes(Some("registry is read-only"));
        let mut session = h.open(Some("Lamp"));
        session.working_mut().label = "Desk lamp".to_string();

        let err = session.submit(h.services()).unwrap_err();
        assert!(matches!(err, SubmitError::Write(_)));
        assert!(err.leaves_editor());
        assert!(!h.dirty.is_dirty());

        let messages = h.messages.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("registry is read-only"));
    }

    #[test]
    fn test_missing_item_is_not_found() {
        let h = Harness::new(registry());
        let err = EditingSession::open(&h.store, Some("Missing")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(ref n) if n == "Missing"));
    }

    #[test]
    fn test_label_edit_keeps_function_arguments() {
        let doors = Item::group("Doors", Some(BaseType::Contact), Some("AND_OPEN_CLOSED"));
        let h = Harness::new(vec![doors]);

        let mut session = h.open(Some("Doors"));
        assert_eq!(session.working().function().map(|f| f.params().len()), Some(2));
        session.working_mut().label = "All doors".to_string();
        assert_eq!(session.submit(h.services()).unwrap(), SubmitOutcome::Written);

        let saved = h.store.get("Doors").unwrap();
        assert_eq!(saved.label, "All doors");
        assert_eq!(saved.function.as_deref(), Some("AND_OPEN_CLOSED"));
    }

    #[test]
    fn test_function_ignored_outside_typed_groups() {
        let mut lamp = Item::new("Lamp", ItemType::Scalar(BaseType::Switch));
        lamp.function = Some("EQUALITY".to_string());
        let house = Item::group("House", None, Some("MEDIAN_1"));
        let h = Harness::new(vec![lamp, house]);

        for name in ["Lamp", "House"] {
            let session = h.open(Some(name));
            assert_eq!(session.working().function(), None);
            assert_eq!(session.working().unreadable_function(), None);
            assert_eq!(session.submit(h.services()).unwrap(), SubmitOutcome::Unchanged);
        }
        assert_eq!(h.store.write_count(), 0);
    }

    #[test]
    fn test_unreadable_function_is_kept_verbatim() {
        let counter = Item::group("Counter", Some(BaseType::Number), Some("COUNT_ON"));
        let h = Harness::new(vec![counter]);

        let mut session = h.open(Some("Counter"));
        assert_eq!(session.working().function(), None);
        assert_eq!(session.working().unreadable_function(), Some("COUNT_ON"));

        // Untouched, it survives an unrelated edit
        session.working_mut().label = "Open windows".to_string();
        session.submit(h.services()).unwrap();
        assert_eq!(h.store.get("Counter").unwrap().function.as_deref(), Some("COUNT_ON"));

        // Choosing a function replaces it
        let mut session = h.open(Some("Counter"));
        session.select_function::<&str>(FunctionKind::Sum, &[]).unwrap();
        assert_eq!(session.working().unreadable_function(), None);
        session.submit(h.services()).unwrap();
        assert_eq!(h.store.get("Counter").unwrap().function.as_deref(), Some("SUM"));

        // So does a group type change
        let mut session = h.open(Some("Counter"));
        session.set_group_type(GroupTypeChoice::Typed(BaseType::Switch));
        assert_eq!(session.prepare().unwrap().function, None);
    }

    #[test]
    fn test_name_is_locked_while_editing() {
        let h = Harness::new(registry());
        let mut session = h.open(Some("Lamp"));
        assert_eq!(session.set_name("Lamp2"), Err(ValidationError::NameLocked));
        assert!(session.set_name("Lamp").is_ok());

        // The duplicate check does not exclude the item's own name
        assert!(!session.check_name());
    }

    #[test]
    fn test_original_is_independent_of_working() {
        let h = Harness::new(registry());
        let mut session = h.open(Some("Temp1"));
        session.working_mut().tags.insert("Measurement".to_string());
        session.set_group_type(GroupTypeChoice::None);

        let original = session.original().unwrap();
        assert!(original.tags.is_empty());
        assert_eq!(original.function.as_deref(), Some("AVG"));
    }

    #[test]
    fn test_relation_candidates_exclude_self() {
        let h = Harness::new(registry());
        let session = h.open(Some("House"));

        let parents: Vec<&str> = session.parent_candidates("").collect();
        assert_eq!(parents, vec!["Lights", "Temp1"]);

        let members: Vec<&str> = session.member_candidates("").collect();
        assert_eq!(members, vec!["Lamp", "Lights", "Temp1"]);
    }

    #[test]
    fn test_parents() {
        let h = Harness::new(registry());
        let mut session = h.open(Some("Lamp"));

        session.add_parent("Lights").unwrap();
        session.add_parent("Lights").unwrap();
        assert_eq!(session.working().group_names, vec!["Lights"]);

        assert_eq!(
            session.add_parent("Lamp"),
            Err(ValidationError::InvalidParent("Lamp".to_string()))
        );
        assert!(session.add_parent("Nowhere").is_err());

        assert!(session.remove_parent("Lights"));
        assert!(!session.remove_parent("Lights"));
    }

    #[test]
    fn test_apply_changes() {
        let h = Harness::new(registry());
        let mut session = h.open(None);

        let changes = FormChanges {
            name: Some("Power".to_string()),
            item_type: Some(ItemType::Group),
            group_type: Some(GroupTypeChoice::Typed(BaseType::Number)),
            label: Some("Total power".to_string()),
            group_names: Some(vec!["House".to_string()]),
            function: Some(FunctionChoice {
                kind: Some(FunctionKind::Sum),
                params: Vec::new(),
            }),
            ..Default::default()
        };
        session.apply(&changes).unwrap();

        let prepared = session.prepare().unwrap();
        assert_eq!(prepared.function.as_deref(), Some("SUM"));
        assert_eq!(prepared.group_names, vec!["House"]);

        let bad = FormChanges {
            function: Some(FunctionChoice {
                kind: Some(FunctionKind::Threshold),
                params: vec!["10".to_string()],
            }),
            ..Default::default()
        };
        assert!(matches!(session.apply(&bad), Err(ValidationError::Function(_))));
    }

    #[test]
    fn test_rejected_changes_leave_session_untouched() {
        let h = Harness::new(registry());
        let mut session = h.open(Some("Lamp"));
        session.add_parent("Lights").unwrap();
        let before = session.working().clone();

        let changes = FormChanges {
            label: Some("x".to_string()),
            group_type: Some(GroupTypeChoice::Typed(BaseType::Number)),
            group_names: Some(vec!["House".to_string(), "Nowhere".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            session.apply(&changes),
            Err(ValidationError::InvalidParent("Nowhere".to_string()))
        );

        assert_eq!(session.working(), &before);
        assert_eq!(session.working().group_names, vec!["Lights"]);
        assert_eq!(session.candidate_functions(), LOGICAL_FUNCTIONS);
    }

    #[test]
    fn test_form_changes_json() {
        let changes: FormChanges = serde_json::from_str(
            r#"{"type":"GroupItem","groupType":"NumberItem","function":{"kind":"THRESHOLD","params":["10","20"]}}"#,
        )
        .unwrap();
        assert_eq!(changes.item_type, Some(ItemType::Group));
        assert_eq!(changes.group_type, Some(GroupTypeChoice::Typed(BaseType::Number)));
        assert_eq!(
            changes.function.unwrap().kind,
            Some(FunctionKind::Threshold)
        );
    }
}
