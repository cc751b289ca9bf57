//! plastiscan-io: Filesystem, camera and illumination collaborators.
//!
//! Wraps the sans-IO `plastiscan-pipeline` crate with everything that
//! touches the outside world: reading sample photographs from disk,
//! writing diagnostic panels, capturing with `libcamera-still`, and
//! switching the excitation LEDs.

pub mod analyze;
pub mod capture;
pub mod light;
pub mod render;

use std::time::{Duration, Instant};

use plastiscan_pipeline::diagnostics::Clock;

pub use analyze::{
    AnalyzeError, analyze, analyze_with_config, analyze_with_diagnostics, analyze_with_report,
    read_image,
};
pub use capture::{Camera, CaptureError, CaptureSettings, LibcameraStill};
pub use light::{Illuminated, LightError, LightSource, SysfsLeds};
pub use render::{DirectorySink, RenderError};

/// [`Clock`] implementation backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
