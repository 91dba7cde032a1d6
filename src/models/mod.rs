pub mod chat;
pub mod course;
pub mod entry;
pub mod enums;
pub mod user;
pub mod verification;

pub use chat::*;
pub use course::*;
pub use entry::*;
pub use user::*;
pub use verification::*;
