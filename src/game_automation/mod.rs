//! Game automation core
//!
//! Owns the capture-detect-click cycle: a state machine sequences the known
//! game screens, the entity tracker gives noisy detections stable
//! identities, and every pointer action is verified against a fresh capture.

pub mod bot;
pub mod channels;
pub mod config;
pub mod template;
pub mod tracker;
pub mod types;


pub use bot::{Bot, BotError};
pub use channels::create_event_channel;
pub use config::BotConfig;
pub use template::{load_directory, parse_priority, Template, TemplateError, TemplateSet};
pub use tracker::{sort_by_priority, Detection, EntityTracker, TrackerParams};
pub use types::{BotEvent, BotState};
