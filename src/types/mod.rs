mod access;
mod models;

pub use access::{AccessLevel, Role};
pub use models::*;
