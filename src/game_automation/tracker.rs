//! Entity lifecycle tracking: identity across frames, click budgets,
//! blacklisting, and region-of-interest derivation
//!
//! Raw detections are ephemeral; the tracker gives them stable identities by
//! quantizing position, so per-frame jitter keeps mapping to the same entity.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::template_matching::Region;

/// One raw template match in one frame, before identity tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub template_name: String,
    pub priority: i32,
    /// Top-left position in frame coordinates.
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Detection {
    /// Center point, used for clicking.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }
}

/// Identity key: priority plus quantized position. At most one tracked
/// entity exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKey {
    priority: i32,
    x: i32,
    y: i32,
}

/// A detection with tracking metadata attached.
#[derive(Debug, Clone)]
pub struct TrackedEntity {
    pub detection: Detection,
    pub click_count: u32,
    pub first_seen: Instant,
    pub last_seen: Instant,
}

/// Tunable tracker thresholds.
#[derive(Debug, Clone)]
pub struct TrackerParams {
    /// Clicks before an entity is blacklisted.
    pub max_clicks: u32,
    /// Position quantization unit in pixels.
    pub position_quantum: i32,
    /// How long an unseen entity survives.
    pub ttl: Duration,
    /// Margin around the last high-priority entity when deriving a ROI.
    pub roi_margin: i32,
    /// Max horizontal displacement for moved-entity reconciliation.
    pub moved_x_threshold: i32,
    /// Max upward displacement (a list scrolling up). Downward moves are
    /// only accepted within one quantum.
    pub moved_y_max_up: i32,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            max_clicks: 7,
            position_quantum: 20,
            ttl: Duration::from_secs(2),
            roi_margin: 100,
            moved_x_threshold: 30,
            moved_y_max_up: 200,
        }
    }
}

/// Tracks entity lifecycle across capture ticks.
///
/// Owned by the bot core and mutated only behind its lock; the struct itself
/// carries no synchronization.
pub struct EntityTracker {
    entities: HashMap<EntityKey, TrackedEntity>,
    blacklist: HashMap<EntityKey, Instant>,
    last_high_priority: Option<Detection>,
    params: TrackerParams,
}

impl EntityTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self {
            entities: HashMap::new(),
            blacklist: HashMap::new(),
            last_high_priority: None,
            params,
        }
    }

    /// Identity key for a detection: position divided down to the quantum
    /// grid so small jitter maps to the same key.
    pub fn entity_key(&self, detection: &Detection) -> EntityKey {
        let q = self.params.position_quantum.max(1);
        EntityKey {
            priority: detection.priority,
            x: (detection.x / q) * q,
            y: (detection.y / q) * q,
        }
    }

    /// Reconcile one frame's detections against the tracked entities.
    ///
    /// Exact-key hits refresh the entity; near misses are checked against the
    /// moved-entity heuristic and inherit the old entity's history; the rest
    /// become new entities. Entities not seen for longer than the TTL are
    /// dropped, but an entity seen in this call is never expired by it.
    pub fn update(&mut self, detections: &[Detection]) {
        let now = Instant::now();
        let mut seen: HashSet<EntityKey> = HashSet::new();

        for detection in detections {
            let key = self.entity_key(detection);
            seen.insert(key);

            if let Some(existing) = self.entities.get_mut(&key) {
                existing.last_seen = now;
                existing.detection = detection.clone();
                log::debug!(
                    "tracker: refresh {} at ({}, {}) clicks={}",
                    detection.template_name,
                    detection.x,
                    detection.y,
                    existing.click_count
                );
                continue;
            }

            if let Some(old_key) = self.find_moved_key(detection) {
                if let Some(old) = self.entities.remove(&old_key) {
                    log::debug!(
                        "tracker: moved {} ({}, {}) -> ({}, {}) clicks={}",
                        detection.template_name,
                        old.detection.x,
                        old.detection.y,
                        detection.x,
                        detection.y,
                        old.click_count
                    );
                    self.entities.insert(
                        key,
                        TrackedEntity {
                            detection: detection.clone(),
                            click_count: old.click_count,
                            first_seen: old.first_seen,
                            last_seen: now,
                        },
                    );
                    // Blacklist status follows the entity to its new key.
                    if let Some(stamp) = self.blacklist.remove(&old_key) {
                        self.blacklist.insert(key, stamp);
                    }
                    continue;
                }
            }

            log::debug!(
                "tracker: new {} at ({}, {}) tracked={}",
                detection.template_name,
                detection.x,
                detection.y,
                self.entities.len()
            );
            self.entities.insert(
                key,
                TrackedEntity {
                    detection: detection.clone(),
                    click_count: 0,
                    first_seen: now,
                    last_seen: now,
                },
            );
        }

        let ttl = self.params.ttl;
        self.entities
            .retain(|key, tracked| seen.contains(key) || now.duration_since(tracked.last_seen) <= ttl);
    }

    /// Find an existing entity this detection plausibly is, displaced by a
    /// scrolling list: same priority, close in X, moved up within the cap or
    /// down within one quantum. Best-effort; identical stacked items can be
    /// confused under fast scrolling.
    fn find_moved_key(&self, detection: &Detection) -> Option<EntityKey> {
        for (key, tracked) in &self.entities {
            let e = &tracked.detection;

            if e.priority != detection.priority {
                continue;
            }
            if (e.x - detection.x).abs() > self.params.moved_x_threshold {
                continue;
            }

            let dy = e.y - detection.y; // positive = moved up
            if dy > 0 && dy <= self.params.moved_y_max_up {
                return Some(*key);
            }
            if dy < 0 && -dy <= self.params.position_quantum {
                return Some(*key);
            }
        }
        None
    }

    pub fn is_blacklisted(&self, detection: &Detection) -> bool {
        self.blacklist.contains_key(&self.entity_key(detection))
    }

    /// Record a click on an entity, creating it if it is not tracked yet.
    ///
    /// Returns true when the entity is (or already was) blacklisted. An
    /// already-blacklisted entity's count is not incremented further.
    pub fn record_click(&mut self, detection: &Detection) -> bool {
        let key = self.entity_key(detection);
        if self.blacklist.contains_key(&key) {
            return true;
        }

        let now = Instant::now();
        let tracked = self.entities.entry(key).or_insert_with(|| TrackedEntity {
            detection: detection.clone(),
            click_count: 0,
            first_seen: now,
            last_seen: now,
        });
        tracked.click_count += 1;

        if tracked.click_count >= self.params.max_clicks {
            self.blacklist.insert(key, now);
            return true;
        }
        false
    }

    pub fn get_click_count(&self, detection: &Detection) -> u32 {
        self.entities
            .get(&self.entity_key(detection))
            .map(|t| t.click_count)
            .unwrap_or(0)
    }

    /// Detections whose key is not currently blacklisted.
    pub fn filter_blacklisted(&self, detections: &[Detection]) -> Vec<Detection> {
        detections
            .iter()
            .filter(|d| !self.blacklist.contains_key(&self.entity_key(d)))
            .cloned()
            .collect()
    }

    /// Record the most recently acted-on high-priority detection; the ROI is
    /// derived from it.
    pub fn set_last_high_priority(&mut self, detection: &Detection) {
        self.last_high_priority = Some(detection.clone());
    }

    /// Region around the last high-priority entity, expanded by the margin.
    /// Empty when no entity has been recorded.
    pub fn roi(&self) -> Region {
        let Some(e) = &self.last_high_priority else {
            return Region::default();
        };
        let margin = self.params.roi_margin;
        Region::new(
            e.x - margin,
            e.y - margin,
            (e.width as i32 + 2 * margin).max(0) as u32,
            (e.height as i32 + 2 * margin).max(0) as u32,
        )
    }

    pub fn has_roi(&self) -> bool {
        self.last_high_priority.is_some()
    }

    /// Clear entities, blacklist, and the ROI source. Called on every major
    /// screen transition so tracking never leaks across game phases.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.blacklist.clear();
        self.last_high_priority = None;
    }

    /// (tracked, blacklisted) counts for status reporting.
    pub fn stats(&self) -> (usize, usize) {
        (self.entities.len(), self.blacklist.len())
    }
}

/// Candidate selection order: priority descending, then Y descending. For
/// stacked lists the item closest to scrolling off screen is acted on first.
pub fn sort_by_priority(detections: &mut [Detection]) {
    detections.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.y.cmp(&a.y)));
}
