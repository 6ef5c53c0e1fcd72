//! Screen capture and pointer boundary
//!
//! The automation core never talks to a display directly; it is handed a
//! [`ScreenDriver`] implementation by the embedding application (a desktop
//! shell, a test harness, a replay tool).

pub mod backend;
pub mod error;

pub use backend::{Frame, ScreenDriver};
pub use error::ScreenError;
