// Item Configuration - Core Library
// Exposes the editor core for use in the CLI, the API server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod function;       // Aggregation function codec
pub mod group_type;     // Group type display/wire normalizer
pub mod listing;        // Listing & confirm-then-remove
pub mod reconciliation; // Editing sessions: load, diff, submit
pub mod search;         // Relation search for parent/member pickers
pub mod services;       // Collaborator traits + in-memory implementations
pub mod validation;     // Name validation

// Re-export commonly used types
pub use config::Settings;
pub use db::{
    Event, SqliteItemStore,
    setup_database, load_csv, import_items, get_all_items, get_events_for_item, verify_count,
};
pub use entities::{BaseType, Item, ItemSnapshot, ItemType};
pub use error::{FunctionError, LoadError, StoreError, SubmitError, ValidationError, WriteError};
pub use function::{AggregationFunction, FunctionKind, derive_function_set};
pub use group_type::GroupTypeChoice;
pub use listing::{ItemListing, ItemRow, RemovalRequest};
pub use reconciliation::{
    EditingSession, FormChanges, FunctionChoice, ItemForm, SessionMode, SubmitOutcome,
};
pub use search::{search, SearchQuery};
pub use services::{
    Collaborators, DirtyFlag, DirtyNotifier, IconResolver, ItemStore, LogNotifier,
    MemoryItemStore, MessageLog, Notifier, PathIconResolver,
};
pub use validation::is_duplicate;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
