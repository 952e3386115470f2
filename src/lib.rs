pub mod config;
pub mod error;
pub mod gallery;
pub mod identity;
pub mod render;
pub mod storage;

pub use error::{AuthError, AuthResult};
