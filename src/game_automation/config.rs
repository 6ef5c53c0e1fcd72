//! Automation configuration
//!
//! Every timing constant and threshold in one place. The relative ordering
//! matters more than the absolute values: the entry scan is the hot path,
//! the in-game scan the slowest.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::tracker::TrackerParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Root of the per-screen template directories.
    pub assets_dir: PathBuf,
    /// Display index the driver captures; informational, passed to errors.
    pub display_index: usize,

    /// Euclidean RGB distance allowed per pixel, 0-255 scale.
    pub tolerance: f32,
    /// Entry detections below this Y are discarded (task-bar false
    /// positives).
    pub entry_max_y: i32,

    /// Idle entry scanning (hot path).
    pub entry_scan_interval_ms: u64,
    /// Low-frequency exit watch while a game runs.
    pub ingame_scan_interval_ms: u64,
    /// Search-step and auto-detect scanning.
    pub search_scan_interval_ms: u64,
    /// Fast retry inside the exit/search flow.
    pub search_retry_interval_ms: u64,
    /// Consecutive search-step failures before falling back to auto-detect.
    pub search_max_retries: u32,

    /// Settle delay right after an entry click, before verification.
    pub click_settle_ms: u64,
    /// Settle delay after search/exit clicks.
    pub post_click_wait_ms: u64,
    /// Post-click verification polls and their spacing.
    pub verify_attempts: u32,
    pub verify_retry_ms: u64,

    /// Lobby wait: spacing between checks and how many before giving up.
    pub lobby_wait_interval_ms: u64,
    pub lobby_wait_max_checks: u32,

    /// Entity tracker thresholds.
    pub entity_ttl_ms: u64,
    pub position_quantum: i32,
    pub max_clicks: u32,
    pub roi_margin: i32,
    pub moved_x_threshold: i32,
    pub moved_y_max_up: i32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets/targets"),
            display_index: 0,
            tolerance: 60.0,
            entry_max_y: 950,
            entry_scan_interval_ms: 150,
            ingame_scan_interval_ms: 30_000,
            search_scan_interval_ms: 2_000,
            search_retry_interval_ms: 500,
            search_max_retries: 3,
            click_settle_ms: 100,
            post_click_wait_ms: 1_000,
            verify_attempts: 5,
            verify_retry_ms: 200,
            lobby_wait_interval_ms: 5_000,
            lobby_wait_max_checks: 10,
            entity_ttl_ms: 2_000,
            position_quantum: 20,
            max_clicks: 7,
            roi_margin: 100,
            moved_x_threshold: 30,
            moved_y_max_up: 200,
        }
    }
}

impl BotConfig {
    /// Read a config file, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| match serde_json::from_str(&s) {
                Ok(config) => Some(config),
                Err(e) => {
                    log::warn!("ignoring malformed config {path:?}: {e}");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Best-effort save.
    pub fn save(&self, path: &Path) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            if let Err(e) = std::fs::write(path, json) {
                log::warn!("failed to save config {path:?}: {e}");
            }
        }
    }

    pub fn tracker_params(&self) -> TrackerParams {
        TrackerParams {
            max_clicks: self.max_clicks,
            position_quantum: self.position_quantum,
            ttl: Duration::from_millis(self.entity_ttl_ms),
            roi_margin: self.roi_margin,
            moved_x_threshold: self.moved_x_threshold,
            moved_y_max_up: self.moved_y_max_up,
        }
    }

    pub fn entry_scan_interval(&self) -> Duration {
        Duration::from_millis(self.entry_scan_interval_ms)
    }

    pub fn ingame_scan_interval(&self) -> Duration {
        Duration::from_millis(self.ingame_scan_interval_ms)
    }

    pub fn search_scan_interval(&self) -> Duration {
        Duration::from_millis(self.search_scan_interval_ms)
    }

    pub fn search_retry_interval(&self) -> Duration {
        Duration::from_millis(self.search_retry_interval_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn post_click_wait(&self) -> Duration {
        Duration::from_millis(self.post_click_wait_ms)
    }

    pub fn verify_retry(&self) -> Duration {
        Duration::from_millis(self.verify_retry_ms)
    }

    pub fn lobby_wait_interval(&self) -> Duration {
        Duration::from_millis(self.lobby_wait_interval_ms)
    }
}
