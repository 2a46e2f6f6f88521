//! Process-wide tunables.  A `Config` is fixed when the session starts;
//! everything that may change from one render to the next travels in
//! the render request instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RenderError, Result};
use crate::escape::{Fractal, DEFAULT_DWELL};
use crate::job::RenderRequest;

/// Most worker threads a pool will start.
pub const MAX_THREADS: usize = 32;

/// Side of the square on-screen viewport, in pixels.
pub const VIEWPORT_SIZE: usize = 800;

/// Largest viewport side accepted.  The viewport keeps a pixel and a
/// raw sample for every point, so it grows with the square of this.
pub const MAX_VIEWPORT_SIZE: usize = 2048;

/// Largest working buffer the session will try to reserve, in pixels.
pub const MAX_PANEL_CAPACITY: usize = 500_000_000;

/// Name of the stitched output file.
pub const RENDER_FILE: &str = "render.bmp";

/// Runtime parameters of a rendering session.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of compute workers.
    pub threads: usize,
    /// Side of the square viewport, in pixels.
    pub viewport_size: usize,
    /// Capacity of the working buffer used by full renders, in pixels.
    pub panel_capacity: usize,
    /// Dwell limit for requests that do not name one.
    pub dwell: u32,
    /// How often progress is sampled while rendering the viewport.
    pub viewport_poll: Duration,
    /// How often progress is sampled during a full render.
    pub render_poll: Duration,
    /// Where panel files and the final image are written.
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            threads: num_cpus::get().max(1).min(MAX_THREADS),
            viewport_size: VIEWPORT_SIZE,
            panel_capacity: MAX_PANEL_CAPACITY,
            dwell: DEFAULT_DWELL,
            viewport_poll: Duration::from_millis(200),
            render_poll: Duration::from_millis(2000),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Checks the values a session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(RenderError::BadDimensions(format!(
                "Thread count must be between 1 and {}",
                MAX_THREADS
            )));
        }
        if self.viewport_size == 0 || self.viewport_size > MAX_VIEWPORT_SIZE {
            return Err(RenderError::BadDimensions(format!(
                "Viewport size must be between 1 and {}",
                MAX_VIEWPORT_SIZE
            )));
        }
        if self.panel_capacity < 4 {
            return Err(RenderError::BadDimensions(
                "The panel buffer needs room for at least four pixels".to_string(),
            ));
        }
        Ok(())
    }

    /// A viewport request for the home view of `fractal` at this
    /// session's dwell limit.
    pub fn home_request(&self, fractal: Fractal) -> RenderRequest {
        RenderRequest::home(fractal, self.dwell)
    }

    /// Path of the temporary file for 1-based panel `number`.
    pub fn panel_path(&self, number: usize) -> PathBuf {
        self.output_dir.join(format!("panel_{:04}.bmp", number))
    }

    /// Path of the stitched image.
    pub fn render_path(&self) -> PathBuf {
        self.output_dir.join(RENDER_FILE)
    }

    /// Builder-style setter for the output directory.
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Config {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let c = Config::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.dwell, 100);
        assert_eq!(c.viewport_size, 800);
        assert!(c.threads >= 1 && c.threads <= MAX_THREADS);
    }

    #[test]
    fn panel_files_are_numbered_from_one() {
        let c = Config::default().with_output_dir("/tmp/out");
        assert_eq!(c.panel_path(1), PathBuf::from("/tmp/out/panel_0001.bmp"));
        assert_eq!(c.panel_path(12), PathBuf::from("/tmp/out/panel_0012.bmp"));
        assert_eq!(c.render_path(), PathBuf::from("/tmp/out/render.bmp"));
    }

    #[test]
    fn home_requests_use_the_configured_dwell() {
        let c = Config {
            dwell: 2500,
            ..Config::default()
        };
        let request = c.home_request(Fractal::Julia);
        assert_eq!(request.dwell, 2500);
        assert_eq!(request.fractal, Fractal::Julia);
        assert_eq!(request.coord, Fractal::Julia.home());
    }

    #[test]
    fn rejects_oversized_viewports() {
        let c = Config {
            viewport_size: MAX_VIEWPORT_SIZE + 1,
            ..Config::default()
        };
        assert!(c.validate().is_err());
        let c = Config {
            viewport_size: MAX_VIEWPORT_SIZE,
            ..Config::default()
        };
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_zero_threads() {
        let c = Config {
            threads: 0,
            ..Config::default()
        };
        assert!(c.validate().is_err());
    }
}
