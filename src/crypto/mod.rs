pub mod password;
pub mod token;

pub use password::*;
pub use token::*;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("Malformed password hash")]
    MalformedHash,

    #[error("Password hashing failed")]
    HashFailed,

    #[error("Wrong password")]
    WrongPassword,
}
