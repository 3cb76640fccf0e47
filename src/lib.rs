//! Connection acquisition and cleanup for the Chambers desktop client.
//!
//! [`db::ConnectionManager`] opens one connection per call from settings
//! loaded at startup, and the release helpers in [`db::release`] close
//! handles without ever failing the caller. UI helpers live in [`ui`].

pub mod db;
pub mod ui;
