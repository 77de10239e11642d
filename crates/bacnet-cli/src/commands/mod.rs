//! Command implementations for bacnet-cli

pub mod discover;
pub mod health;
pub mod read;
pub mod status;
pub mod write;

pub use discover::discover;
pub use health::health;
pub use read::read;
pub use status::status;
pub use write::write;
