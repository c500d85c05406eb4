pub mod cli;
pub mod config;
pub mod crypto;
pub mod database;
pub mod exchange;
pub mod legacy;
pub mod models;
pub mod store;
pub mod transfer;
pub mod utils;

pub use config::Config;
pub use database::{KeyValueStore, MemoryStore, SqliteStore};
pub use exchange::{Document, ExchangeError, PasswordPrompt, decode, encode};
pub use models::{Idea, Status};
pub use store::IdeaStore;
pub use utils::Profile;
