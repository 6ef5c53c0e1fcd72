//! Automation state machine
//!
//! One logical ticking loop: each tick captures a frame, runs detection for
//! the current state, optionally clicks and verifies, then returns the delay
//! until the next tick. Only one tick executes at a time; a stop request
//! lets the in-flight tick finish and suppresses the next one.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::screen::{Frame, ScreenDriver};
use crate::template_matching::{self, Match, Region};

use super::config::BotConfig;
use super::template::{Template, TemplateError, TemplateSet};
use super::tracker::{sort_by_priority, Detection, EntityTracker};
use super::types::{BotEvent, BotState};

/// The error type for bot control operations.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("automation is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Assets(#[from] TemplateError),
}

/// Public control handle for the automation.
///
/// All state lives in the core behind one mutex; `start`/`stop` and the tick
/// loop are the only mutators, so observers never see a half-updated state.
pub struct Bot {
    core: Arc<Mutex<BotCore>>,
    driver: Arc<dyn ScreenDriver>,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl Bot {
    pub fn new(
        config: BotConfig,
        driver: Arc<dyn ScreenDriver>,
        event_tx: mpsc::Sender<BotEvent>,
    ) -> Self {
        Self {
            core: Arc::new(Mutex::new(BotCore::new(config, event_tx))),
            driver,
            stop_tx: None,
            task: None,
        }
    }

    /// Load template assets and start the ticking loop.
    ///
    /// Refuses when already running. A missing required template category
    /// aborts the start; optional categories were already downgraded to
    /// warnings during loading.
    pub async fn start(&mut self) -> Result<(), BotError> {
        {
            let mut core = self.core.lock().await;
            if core.state != BotState::Stopped {
                return Err(BotError::AlreadyRunning);
            }
            core.templates = TemplateSet::load(&core.config.assets_dir)?;
            core.tracker.reset();
            core.enter_state(BotState::AutoDetect);
            core.log("automation started, auto-detecting state".to_string());
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.task = Some(tokio::spawn(run_loop(
            Arc::clone(&self.core),
            Arc::clone(&self.driver),
            stop_rx,
        )));
        self.stop_tx = Some(stop_tx);
        Ok(())
    }

    /// Signal the loop to end after its current tick and wait for it to
    /// exit, then reset to Stopped. A no-op when not running.
    pub async fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        let _ = stop_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }

        let mut core = self.core.lock().await;
        core.enter_state(BotState::Stopped);
        core.log("automation stopped".to_string());
        core.status(BotState::Stopped.describe().to_string());
    }

    pub async fn state(&self) -> BotState {
        self.core.lock().await.state
    }

    /// (tracked, blacklisted) entity counts.
    pub async fn stats(&self) -> (usize, usize) {
        self.core.lock().await.tracker.stats()
    }
}

async fn run_loop(
    core: Arc<Mutex<BotCore>>,
    driver: Arc<dyn ScreenDriver>,
    mut stop_rx: watch::Receiver<bool>,
) {
    log::debug!("automation loop started");
    loop {
        if *stop_rx.borrow() {
            break;
        }

        let delay = {
            let mut core = core.lock().await;
            core.tick(driver.as_ref()).await
        };

        if delay.is_zero() {
            // Immediate re-tick; yield so a stop request can land.
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = sleep(delay) => {}
        }
    }
    log::debug!("automation loop ended");
}

/// State machine internals. Owned by [`Bot`] behind its mutex; `pub(crate)`
/// so integration tests can drive single ticks directly.
pub(crate) struct BotCore {
    pub(crate) state: BotState,
    pub(crate) config: BotConfig,
    pub(crate) templates: TemplateSet,
    pub(crate) tracker: EntityTracker,
    /// Lobby wait checks since entering EntryWaiting.
    pub(crate) entry_wait_count: u32,
    /// Consecutive failed search-step ticks; bounded, then AutoDetect.
    pub(crate) search_retries: u32,
    event_tx: mpsc::Sender<BotEvent>,
}

impl BotCore {
    pub(crate) fn new(config: BotConfig, event_tx: mpsc::Sender<BotEvent>) -> Self {
        let tracker = EntityTracker::new(config.tracker_params());
        Self {
            state: BotState::Stopped,
            config,
            templates: TemplateSet::default(),
            tracker,
            entry_wait_count: 0,
            search_retries: 0,
            event_tx,
        }
    }

    pub(crate) async fn tick(&mut self, driver: &dyn ScreenDriver) -> Duration {
        match self.state {
            BotState::Stopped => Duration::from_millis(100),
            BotState::AutoDetect => self.handle_auto_detect(driver),
            BotState::Entry => self.handle_entry(driver).await,
            BotState::EntryWaiting => self.handle_entry_waiting(driver),
            BotState::InGame => self.handle_in_game(driver),
            BotState::ExitStep1 => self.handle_exit_step1(driver).await,
            BotState::ExitStep2 => self.handle_exit_step2(driver).await,
            state @ (BotState::SearchOpen | BotState::SearchSelect | BotState::SearchVerify) => {
                self.handle_search_step(driver, state).await
            }
        }
    }

    /// Work out which known screen is showing and jump to its state.
    ///
    /// Checked in a fixed priority order: a game in progress outranks
    /// everything, an unfinished exit flow outranks the search flow, and
    /// entry scanning is the default when its buttons are visible.
    fn handle_auto_detect(&mut self, driver: &dyn ScreenDriver) -> Duration {
        self.status(self.state.describe().to_string());
        let Some(frame) = self.capture(driver) else {
            return self.config.search_scan_interval();
        };
        let tolerance = self.config.tolerance;

        let target = {
            let t = &self.templates;
            let checks = [
                (&t.in_game, BotState::InGame),
                (&t.exit, BotState::ExitStep1),
                (&t.lobby, BotState::EntryWaiting),
                (&t.back, BotState::ExitStep2),
                (&t.search_open, BotState::SearchOpen),
                (&t.search_select, BotState::SearchSelect),
                (&t.search_verify, BotState::SearchVerify),
                (&t.entry, BotState::Entry),
            ];
            checks.iter().find_map(|(templates, next)| {
                find_detection(&frame, templates, tolerance).map(|d| (d.template_name, *next))
            })
        };

        match target {
            Some((name, next)) => {
                self.log(format!("auto-detect: found [{name}], state -> {next:?}"));
                self.enter_state(next);
                self.state_interval(next)
            }
            None => self.config.search_scan_interval(),
        }
    }

    /// Entry scanning: shortcuts for screens we are already past, then the
    /// ROI fast path, then a full-frame scan feeding the tracker.
    async fn handle_entry(&mut self, driver: &dyn ScreenDriver) -> Duration {
        self.status(self.state.describe().to_string());
        let Some(frame) = self.capture(driver) else {
            return Duration::from_millis(400);
        };
        let tolerance = self.config.tolerance;

        if let Some(d) = find_detection(&frame, &self.templates.in_game, tolerance) {
            self.log(format!("entry: already in game [{}]", d.template_name));
            self.enter_state(BotState::InGame);
            return self.config.ingame_scan_interval();
        }
        if let Some(d) = find_detection(&frame, &self.templates.lobby, tolerance) {
            self.log(format!("entry: already in lobby [{}]", d.template_name));
            self.enter_state(BotState::EntryWaiting);
            return self.config.lobby_wait_interval();
        }

        // ROI fast path around the last acted-on entity. ROI detections go
        // through the tracker like any others so click counts stay accurate
        // when this path fires repeatedly.
        if self.tracker.has_roi() {
            let roi = self.tracker.roi();
            let roi_detections = self.collect_entry_detections(&frame, Some(roi));
            if !roi_detections.is_empty() {
                self.tracker.update(&roi_detections);
                let mut valid = self.tracker.filter_blacklisted(&roi_detections);
                if !valid.is_empty() {
                    sort_by_priority(&mut valid);
                    log::debug!(
                        "entry: ROI fast path, {} candidate(s), acting on {}",
                        valid.len(),
                        valid[0].template_name
                    );
                    let target = valid.swap_remove(0);
                    return self.click_and_verify_entry(driver, target).await;
                }
            }
            log::debug!("entry: no actionable ROI target, falling back to full screen");
        }

        let detections = self.collect_entry_detections(&frame, None);
        self.tracker.update(&detections);

        if detections.is_empty() {
            return self.config.entry_scan_interval();
        }

        let mut valid = self.tracker.filter_blacklisted(&detections);
        if valid.is_empty() {
            let (tracked, blacklisted) = self.tracker.stats();
            log::debug!(
                "entry: all {} detection(s) blacklisted (tracked={tracked}, blacklisted={blacklisted})",
                detections.len()
            );
            return self.config.entry_scan_interval();
        }

        sort_by_priority(&mut valid);
        let target = valid.swap_remove(0);
        self.click_and_verify_entry(driver, target).await
    }

    /// Scan all entry templates, full-frame or within a region, dropping
    /// detections below the Y cutoff (task-bar false positives).
    fn collect_entry_detections(&self, frame: &Frame, region: Option<Region>) -> Vec<Detection> {
        let tolerance = self.config.tolerance;
        let mut detections = Vec::new();

        for template in &self.templates.entry {
            let matches = match region {
                Some(roi) => {
                    template_matching::find_all_in_region(frame, &template.image, roi, tolerance)
                }
                None => template_matching::find_all(frame, &template.image, tolerance),
            };
            for m in matches {
                let d = detection_from(template, m);
                if d.y > self.config.entry_max_y {
                    continue;
                }
                detections.push(d);
            }
        }
        detections
    }

    /// Click an entry target and verify the click took by polling for the
    /// clicked marker to disappear, then classify the screen that follows.
    async fn click_and_verify_entry(
        &mut self,
        driver: &dyn ScreenDriver,
        target: Detection,
    ) -> Duration {
        let clicks = self.tracker.get_click_count(&target);
        log::debug!(
            "entry: clicking {} at ({}, {}) (click #{})",
            target.template_name,
            target.x,
            target.y,
            clicks + 1
        );
        self.perform_click(driver, &target);

        let blacklisted = self.tracker.record_click(&target);
        self.tracker.set_last_high_priority(&target);
        if blacklisted {
            self.log(format!(
                "entry: {} at ({}, {}) blacklisted after {} clicks",
                target.template_name, target.x, target.y, self.config.max_clicks
            ));
        }

        sleep(self.config.click_settle()).await;

        let tolerance = self.config.tolerance;
        let mut marker_gone = false;

        for attempt in 0..self.config.verify_attempts {
            let Some(frame) = self.capture(driver) else {
                sleep(self.config.verify_retry()).await;
                continue;
            };

            let still_visible = self
                .templates
                .entry
                .iter()
                .find(|t| t.name == target.template_name)
                .is_some_and(|t| {
                    template_matching::find_first(&frame, &t.image, tolerance).is_some()
                });
            if still_visible {
                log::debug!("verify: entry marker still visible (attempt {})", attempt + 1);
                sleep(self.config.verify_retry()).await;
                continue;
            }
            marker_gone = true;

            if let Some(d) = find_detection(&frame, &self.templates.lobby, tolerance) {
                self.log(format!(
                    "entered lobby [{}], waiting for game start",
                    d.template_name
                ));
                self.enter_state(BotState::EntryWaiting);
                return self.config.lobby_wait_interval();
            }
            if let Some(d) = find_detection(&frame, &self.templates.in_game, tolerance) {
                self.log(format!("game running [{}]", d.template_name));
                self.enter_state(BotState::InGame);
                return self.config.ingame_scan_interval();
            }
            if find_detection(&frame, &self.templates.exit, tolerance).is_some() {
                self.log("exit marker already visible, game finished".to_string());
                self.enter_state(BotState::ExitStep1);
                return Duration::ZERO;
            }

            // Marker gone but no recognized screen yet; it may be loading.
            sleep(self.config.verify_retry()).await;
        }

        if marker_gone {
            // Conservative fallback: the click took but nothing recognizable
            // appeared within the verification budget.
            self.log("entry marker gone, assuming in game".to_string());
            self.enter_state(BotState::InGame);
            return self.config.ingame_scan_interval();
        }

        // Click never took (the target was likely grabbed by someone else);
        // rescan immediately.
        Duration::ZERO
    }

    /// Lobby wait: the game has been joined but not started. Bounded by the
    /// check cap, after which the lobby is abandoned via the return button.
    fn handle_entry_waiting(&mut self, driver: &dyn ScreenDriver) -> Duration {
        self.entry_wait_count += 1;
        let max_checks = self.config.lobby_wait_max_checks;
        self.status(format!(
            "Waiting in lobby... ({}/{max_checks})",
            self.entry_wait_count
        ));

        let Some(frame) = self.capture(driver) else {
            return self.config.lobby_wait_interval();
        };
        let tolerance = self.config.tolerance;

        if find_detection(&frame, &self.templates.lobby, tolerance).is_none() {
            match find_detection(&frame, &self.templates.in_game, tolerance) {
                Some(d) => self.log(format!("game started, confirmed by [{}]", d.template_name)),
                None => self.log("lobby marker gone, game started".to_string()),
            }
            self.enter_state(BotState::InGame);
            return self.config.ingame_scan_interval();
        }

        if self.entry_wait_count >= max_checks {
            self.log("waited too long in lobby, leaving to re-search".to_string());
            if let Some(d) = find_detection(&frame, &self.templates.back, tolerance) {
                self.perform_click(driver, &d);
                self.log(format!("clicked return button [{}]", d.template_name));
            }
            self.entry_wait_count = 0;
            self.enter_state(BotState::SearchOpen);
            return self.config.search_scan_interval();
        }

        log::debug!(
            "lobby marker still visible, wait count {}",
            self.entry_wait_count
        );
        self.config.lobby_wait_interval()
    }

    /// Low-frequency watch for the exit marker while the game runs.
    fn handle_in_game(&mut self, driver: &dyn ScreenDriver) -> Duration {
        self.status(self.state.describe().to_string());
        let Some(frame) = self.capture(driver) else {
            return self.config.ingame_scan_interval();
        };

        if let Some(d) = find_detection(&frame, &self.templates.exit, self.config.tolerance) {
            self.log(format!("exit marker [{}] visible, game over", d.template_name));
            self.enter_state(BotState::ExitStep1);
            return Duration::ZERO;
        }
        self.config.ingame_scan_interval()
    }

    async fn handle_exit_step1(&mut self, driver: &dyn ScreenDriver) -> Duration {
        self.status(self.state.describe().to_string());
        let Some(frame) = self.capture(driver) else {
            return self.config.search_scan_interval();
        };

        if let Some(d) = find_detection(&frame, &self.templates.exit, self.config.tolerance) {
            self.perform_click(driver, &d);
            sleep(self.config.post_click_wait()).await;
            self.log("exit clicked, waiting for return button".to_string());
            self.enter_state(BotState::ExitStep2);
            return self.config.search_retry_interval();
        }
        self.config.search_scan_interval()
    }

    async fn handle_exit_step2(&mut self, driver: &dyn ScreenDriver) -> Duration {
        self.status(self.state.describe().to_string());
        let Some(frame) = self.capture(driver) else {
            return self.config.search_retry_interval();
        };

        if let Some(d) = find_detection(&frame, &self.templates.back, self.config.tolerance) {
            self.perform_click(driver, &d);
            sleep(self.config.post_click_wait()).await;
            self.log("return clicked, starting search flow".to_string());
            self.enter_state(BotState::SearchOpen);
            return self.config.search_scan_interval();
        }
        self.config.search_retry_interval()
    }

    /// One search step: click this step's marker and advance, or count the
    /// failure against the bounded retry budget and fall back to AutoDetect
    /// when it is spent. The budget is the self-healing mechanism against a
    /// misdetected screen; looping forever here is the failure mode.
    async fn handle_search_step(&mut self, driver: &dyn ScreenDriver, state: BotState) -> Duration {
        self.status(state.describe().to_string());
        let Some(frame) = self.capture(driver) else {
            return self.config.search_scan_interval();
        };
        let tolerance = self.config.tolerance;

        let templates = match state {
            BotState::SearchOpen => &self.templates.search_open,
            BotState::SearchSelect => &self.templates.search_select,
            _ => &self.templates.search_verify,
        };
        let found = find_detection(&frame, templates, tolerance);

        let Some(d) = found else {
            self.search_retries += 1;
            if self.search_retries >= self.config.search_max_retries {
                self.log(format!(
                    "search step {state:?} failed {} times, re-detecting state",
                    self.config.search_max_retries
                ));
                self.enter_state(BotState::AutoDetect);
            }
            return self.config.search_scan_interval();
        };

        self.perform_click(driver, &d);
        sleep(self.config.post_click_wait()).await;

        match state {
            BotState::SearchOpen => {
                self.enter_state(BotState::SearchSelect);
                self.config.post_click_wait()
            }
            BotState::SearchSelect => {
                self.enter_state(BotState::SearchVerify);
                self.config.post_click_wait()
            }
            _ => {
                self.log(format!(
                    "verified highlight [{}], cycle complete",
                    d.template_name
                ));
                self.tracker.reset();
                self.enter_state(BotState::Entry);
                self.config.search_scan_interval()
            }
        }
    }

    /// Transition to a new state. Retry counters reset on every successful
    /// transition; major screen boundaries also reset entity tracking so it
    /// never leaks across unrelated game phases.
    pub(crate) fn enter_state(&mut self, next: BotState) {
        if self.state == next {
            return;
        }
        log::debug!("state: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.search_retries = 0;
        match next {
            BotState::EntryWaiting => {
                self.entry_wait_count = 0;
                self.tracker.reset();
            }
            BotState::InGame | BotState::SearchOpen => self.tracker.reset(),
            _ => {}
        }
        self.emit(BotEvent::StateChanged(next));
    }

    /// Natural polling interval of a state, returned when AutoDetect jumps
    /// into it so the first wait already matches the target cadence.
    fn state_interval(&self, state: BotState) -> Duration {
        match state {
            BotState::InGame => self.config.ingame_scan_interval(),
            BotState::EntryWaiting => self.config.lobby_wait_interval(),
            BotState::AutoDetect => self.config.search_scan_interval(),
            _ => Duration::ZERO,
        }
    }

    fn capture(&mut self, driver: &dyn ScreenDriver) -> Option<Frame> {
        match driver.capture_screen() {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("capture failed: {e}");
                self.emit(BotEvent::Error(e.to_string()));
                None
            }
        }
    }

    /// Click the center of a detection, translated by the display offset
    /// into global pointer coordinates. Failures are absorbed: the next
    /// verification pass sees an unchanged screen and retries.
    fn perform_click(&mut self, driver: &dyn ScreenDriver, detection: &Detection) {
        let (cx, cy) = detection.center();
        let (ox, oy) = driver.display_offset();
        let (gx, gy) = (cx + ox, cy + oy);

        log::debug!(
            "clicking [{}] center ({cx}, {cy}) global ({gx}, {gy})",
            detection.template_name
        );
        if let Err(e) = driver.move_and_click(gx, gy) {
            log::warn!("click failed: {e}");
            self.emit(BotEvent::Error(e.to_string()));
            return;
        }
        self.emit(BotEvent::Clicked {
            template: detection.template_name.clone(),
            x: gx,
            y: gy,
        });
    }

    fn emit(&self, event: BotEvent) {
        // Best-effort: a missing or saturated observer never stalls a tick.
        let _ = self.event_tx.try_send(event);
    }

    fn log(&self, message: String) {
        log::info!("{message}");
        self.emit(BotEvent::Log(message));
    }

    fn status(&self, message: String) {
        self.emit(BotEvent::Status(message));
    }
}

/// First detection of any template in the list, in template order.
fn find_detection(frame: &Frame, templates: &[Template], tolerance: f32) -> Option<Detection> {
    templates.iter().find_map(|template| {
        template_matching::find_first(frame, &template.image, tolerance)
            .map(|m| detection_from(template, m))
    })
}

fn detection_from(template: &Template, m: Match) -> Detection {
    Detection {
        template_name: template.name.clone(),
        priority: template.priority,
        x: m.x as i32,
        y: m.y as i32,
        width: template.width(),
        height: template.height(),
    }
}
