// States and events for the automation state machine

/// The current phase of the automation. Exactly one is current at a time;
/// transitions happen only inside a tick or from start/stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Stopped,
    /// Initial and recovery state: work out which screen is showing.
    AutoDetect,
    /// Scanning for clickable entry buttons.
    Entry,
    /// Clicked an entry button, waiting in the lobby for the game to start.
    EntryWaiting,
    /// Game running; low-frequency watch for the exit marker.
    InGame,
    /// Exit marker seen; click it.
    ExitStep1,
    /// Waiting for the return button after exiting.
    ExitStep2,
    /// Search flow: open the list, select the target, verify the highlight.
    SearchOpen,
    SearchSelect,
    SearchVerify,
}

impl BotState {
    /// Short label for status lines.
    pub fn describe(&self) -> &'static str {
        match self {
            BotState::Stopped => "Stopped",
            BotState::AutoDetect => "Auto Detecting State...",
            BotState::Entry => "Scanning Entry...",
            BotState::EntryWaiting => "Waiting in Lobby...",
            BotState::InGame => "In Game...",
            BotState::ExitStep1 => "Waiting for Exit...",
            BotState::ExitStep2 => "Waiting for Return...",
            BotState::SearchOpen => "Searching [Open List]...",
            BotState::SearchSelect => "Searching [Target Channel]...",
            BotState::SearchVerify => "Verifying Highlight...",
        }
    }
}

/// Observer events emitted by the bot. Delivery is best-effort: a slow or
/// absent consumer never stalls a tick.
#[derive(Debug, Clone)]
pub enum BotEvent {
    StateChanged(BotState),
    /// Transient status line, replaced on every tick.
    Status(String),
    /// Persistent log line worth keeping in a history view.
    Log(String),
    Clicked {
        template: String,
        x: i32,
        y: i32,
    },
    Error(String),
}
