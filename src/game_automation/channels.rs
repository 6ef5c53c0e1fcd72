// Event channel for bot observers
use tokio::sync::mpsc;

use super::types::BotEvent;

/// Helper function to create the bot event channel.
///
/// The channel is bounded; the bot emits with `try_send`, so when the
/// consumer falls this far behind, events are dropped rather than blocking
/// a tick.
pub fn create_event_channel() -> (mpsc::Sender<BotEvent>, mpsc::Receiver<BotEvent>) {
    mpsc::channel(64)
}
