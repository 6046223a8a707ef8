// Entity Models
//
// Items are identified by name; a snapshot is a consistent, read-only view
// of all items taken at the start of an editing session.

pub mod item;
pub mod snapshot;

pub use item::{BaseType, Item, ItemType, GROUP_TOKEN};
pub use snapshot::ItemSnapshot;
