pub mod auth;
pub mod engine;
pub mod persistence;
pub mod room;
