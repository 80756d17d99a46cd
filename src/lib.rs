pub mod bus;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod http;
pub mod store;
pub mod summarize;
pub mod types;
pub mod worker;

pub use config::Config;
pub use error::{NotesError, Result};
