pub mod config;
pub mod folders;
pub mod github;
pub mod open;
pub mod push;
pub mod repos;
pub mod screenshots;
