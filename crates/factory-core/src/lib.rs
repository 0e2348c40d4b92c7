pub mod cache;
pub mod catalog;
pub mod error;
pub mod folders;
pub mod git;
pub mod github;
pub mod io;
pub mod paths;
pub mod probe;
pub mod push;
pub mod remote;
pub mod scanner;
pub mod screenshots;
pub mod settings;
pub mod version;

pub use error::{FactoryError, Result};
