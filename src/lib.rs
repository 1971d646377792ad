pub mod fleet;
pub mod server;
pub mod version;
pub mod web;
