//! Capture/click capability trait

use image::RgbaImage;

use super::error::ScreenResult;

/// One captured screen image. Never mutated after capture; the matcher and
/// tracker only read it for the duration of a tick.
pub type Frame = RgbaImage;

/// Injected capture/click capability.
///
/// Implementations are expected to be cheap to call repeatedly:
/// `capture_screen` sits on the hot scanning path. Calls are made
/// sequentially from the automation tick, so implementations do not need
/// internal ordering guarantees beyond `Send + Sync`.
pub trait ScreenDriver: Send + Sync {
    /// Capture the targeted display.
    fn capture_screen(&self) -> ScreenResult<Frame>;

    /// Move the pointer to global coordinates and click.
    ///
    /// Coordinates are global: the core adds [`ScreenDriver::display_offset`]
    /// to the display-relative template center before calling this.
    fn move_and_click(&self, x: i32, y: i32) -> ScreenResult<()>;

    /// Top-left corner of the captured display in global pointer
    /// coordinates. `(0, 0)` for a single-display setup.
    fn display_offset(&self) -> (i32, i32) {
        (0, 0)
    }
}
