pub mod game_automation;
pub mod screen;
pub mod template_matching;

pub use game_automation::{Bot, BotConfig, BotError, BotEvent, BotState};
pub use screen::{Frame, ScreenDriver, ScreenError};
