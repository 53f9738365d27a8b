//! Data models for the Halaqa Hub application.
//!
//! Field names serialize in camelCase to match the web client.

mod class_session;
mod community;
mod question;
mod revision;
mod voter;

pub use class_session::*;
pub use community::*;
pub use question::*;
pub use revision::*;
pub use voter::*;
