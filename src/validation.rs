// 📐 Name Validation
//
// Checks run synchronously against the session snapshot. A collision created
// elsewhere after the snapshot was taken is only seen on the next load.

use crate::entities::ItemSnapshot;
use crate::error::ValidationError;

/// True iff an item with exactly this name (case-sensitive) is in the snapshot
pub fn is_duplicate(candidate: &str, snapshot: &ItemSnapshot) -> bool {
    snapshot.iter().any(|item| item.name == candidate)
}

/// Item names: ASCII letters, digits and '_', not starting with a digit
pub fn validate_name_syntax(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err(ValidationError::EmptyName),
    };

    let valid_first = first.is_ascii_alphabetic() || first == '_';
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_first && valid_rest {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

/// Full check for a name about to be created
pub fn validate_new_name(name: &str, snapshot: &ItemSnapshot) -> Result<(), ValidationError> {
    validate_name_syntax(name)?;
    if is_duplicate(name, snapshot) {
        return Err(ValidationError::DuplicateName(name.to_string()));
    }
    Ok(())
}

// ============================================================================
// FIELD MARKING (UI boundary)
// ============================================================================

/// Validity marking of the name input field.
///
/// A duplicate marks the field invalid; a non-duplicate, non-empty value
/// clears any earlier marking. An empty value leaves the marking untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameField {
    pub invalid: bool,
}

impl NameField {
    pub fn check(&mut self, value: &str, snapshot: &ItemSnapshot) -> bool {
        if is_duplicate(value, snapshot) {
            self.invalid = true;
        } else if !value.is_empty() {
            self.invalid = false;
        }
        !self.invalid
    }
}
