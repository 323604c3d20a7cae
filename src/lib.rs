//! youdo-api - A to-do list API
//!
//! Every request passes through a per-client token-bucket admission
//! controller; task routes additionally require a signed session token
//! obtained by registering or logging in.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod server;
pub mod tasks;
pub mod validation;
