//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a borrowed `Connection`; callers own transactions
//! and connection lifetime. All public functions are re-exported here.

mod columns;

pub mod chat;
pub mod courses;
pub mod entries;
pub mod medications;
pub mod sessions;
pub mod users;
pub mod verification;

pub use chat::*;
pub use courses::*;
pub use entries::*;
pub use medications::*;
pub use sessions::*;
pub use users::*;
pub use verification::*;
