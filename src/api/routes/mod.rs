pub mod analysis;
pub mod auth;
pub mod chat;
pub mod middleware;
pub mod predictions;
pub mod profile;
