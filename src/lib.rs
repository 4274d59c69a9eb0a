//! smartmarks: a personal bookmark manager client.
//!
//! Signs in through a hosted OAuth provider, keeps the signed-in user's
//! bookmarks in sync with a managed backend, and refreshes them whenever
//! the backend's change feed reports a write. The library backs the
//! console client, the JSON-RPC bridge and the integration tests.

pub mod app;
pub mod backend;
pub mod controller;
pub mod database;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
pub mod view;
