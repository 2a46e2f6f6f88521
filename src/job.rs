//! Render jobs and how they are cut into panels.
//!
//! A job covers `rows` x `columns` pixels.  The working buffer holds at
//! most `capacity` pixels, so the job is split into vertical panels of
//! `panel_width` columns each; the last panel may be narrower.

use std::fmt;
use std::str::FromStr;

use itertools::iproduct;

use crate::error::{RenderError, Result};
use crate::escape::Fractal;
use crate::planes::Coordinate;

/// Narrowest full render we accept.
pub const MIN_RENDER_WIDTH: usize = 10;

/// Widest full render we accept.
pub const MAX_RENDER_WIDTH: usize = 1_000_000;

/// How many samples to take per pixel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Oversample {
    /// One sample per pixel.
    None,
    /// A 2x2 grid at quarter-pixel offsets.
    Four,
    /// A 3x3 grid at quarter-pixel offsets.
    Nine,
}

impl Oversample {
    /// Number of samples taken per pixel.
    pub fn count(&self) -> usize {
        match self {
            Oversample::None => 1,
            Oversample::Four => 4,
            Oversample::Nine => 9,
        }
    }

    /// The (real, imaginary) offsets of each sample from the pixel's
    /// position, in the order the shader averages them.
    pub fn offsets(&self, pixel_size: f64) -> Vec<(f64, f64)> {
        let q = pixel_size / 4.0;
        match self {
            Oversample::None => vec![(0.0, 0.0)],
            Oversample::Four => iproduct!([-q, q].iter(), [-q, q].iter())
                .map(|(&re, &im)| (re, im))
                .collect(),
            Oversample::Nine => iproduct!([-q, 0.0, q].iter(), [-q, 0.0, q].iter())
                .map(|(&im, &re)| (re, im))
                .collect(),
        }
    }
}

impl Default for Oversample {
    fn default() -> Self {
        Oversample::None
    }
}

impl fmt::Display for Oversample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Oversample::None => write!(f, "0"),
            Oversample::Four => write!(f, "4"),
            Oversample::Nine => write!(f, "9"),
        }
    }
}

impl FromStr for Oversample {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "0" | "1" => Ok(Oversample::None),
            "4" => Ok(Oversample::Four),
            "9" => Ok(Oversample::Nine),
            other => Err(format!("Oversampling must be 0, 4 or 9, not '{}'", other)),
        }
    }
}

/// Widest panel, in columns, whose `rows` rows fit in `capacity`
/// pixels.  Rounded down to a multiple of four.
pub fn panel_width_for(rows: usize, capacity: usize) -> Result<usize> {
    if rows == 0 {
        return Err(RenderError::BadDimensions(
            "An image needs at least one row".to_string(),
        ));
    }
    let width = (capacity / rows) & !3;
    if rows > capacity || width == 0 {
        return Err(RenderError::TooLarge { rows, capacity });
    }
    Ok(width)
}

/// Rows of a full render `columns` wide over `coord`, keeping the
/// window's aspect ratio.
pub fn rows_for(columns: usize, coord: &Coordinate) -> usize {
    (columns as f64 * coord.span.im / coord.span.re + 0.5) as usize
}

/// Describes the size of an image for confirmation messages.
pub fn megapixels(rows: usize, columns: usize) -> String {
    let mp = (rows as f64) * (columns as f64) / 1_000_000.0;
    if mp > 1000.0 {
        format!("{:.2} gigapixels", mp / 1000.0)
    } else {
        format!("{:.1} megapixels", mp)
    }
}

/// Everything a worker needs to fill one panel.  The coordinator owns
/// it; workers see it read-only once a panel starts.
#[derive(Clone, Debug, PartialEq)]
pub struct PlotSettings {
    /// Rows in the whole image.
    pub rows: usize,
    /// Columns in the whole image.
    pub columns: usize,
    /// Columns in every panel but possibly the last.
    pub panel_width: usize,
    /// Columns in the current panel.
    pub cols_this_panel: usize,
    /// Zero-based index of the current panel.
    pub panel_number: usize,
    /// The window being rendered.
    pub coord: Coordinate,
    /// Width of one pixel on the complex plane.
    pub pixel_size: f64,
    /// Samples per pixel.
    pub oversample: Oversample,
    /// Iteration limit.
    pub dwell: u32,
    /// Which family to iterate.
    pub fractal: Fractal,
}

impl PlotSettings {
    /// A single-panel job covering the square viewport.
    pub fn viewport(request: &RenderRequest, size: usize) -> PlotSettings {
        PlotSettings {
            rows: size,
            columns: size,
            panel_width: size,
            cols_this_panel: size,
            panel_number: 0,
            coord: request.coord,
            pixel_size: request.coord.span.re / size as f64,
            oversample: request.oversample,
            dwell: request.dwell,
            fractal: request.fractal,
        }
    }

    /// A job `columns` wide, tiled to fit `capacity` pixels.
    pub fn full(request: &RenderRequest, columns: usize, capacity: usize) -> Result<PlotSettings> {
        if columns < MIN_RENDER_WIDTH || columns > MAX_RENDER_WIDTH {
            return Err(RenderError::BadDimensions(format!(
                "Render width {} is outside {}..={}",
                columns, MIN_RENDER_WIDTH, MAX_RENDER_WIDTH
            )));
        }
        let rows = rows_for(columns, &request.coord);
        if rows.checked_mul((columns + 3) & !3).is_none() {
            return Err(RenderError::TooLarge { rows, capacity });
        }
        let panel_width = panel_width_for(rows, capacity)?;
        Ok(PlotSettings {
            rows,
            columns,
            panel_width,
            cols_this_panel: panel_width.min(columns),
            panel_number: 0,
            coord: request.coord,
            pixel_size: request.coord.span.re / columns as f64,
            oversample: request.oversample,
            dwell: request.dwell,
            fractal: request.fractal,
        })
    }

    /// Number of panels the job is cut into.
    pub fn panel_count(&self) -> usize {
        (self.columns + self.panel_width - 1) / self.panel_width
    }

    /// Makes `number` the current panel and sizes it.
    pub fn start_panel(&mut self, number: usize) {
        self.panel_number = number;
        let first = number * self.panel_width;
        self.cols_this_panel = self.panel_width.min(self.columns.saturating_sub(first));
    }

    /// Absolute column of the current panel's first column.
    pub fn first_column(&self) -> usize {
        self.panel_number * self.panel_width
    }

    /// Real value of the current panel's local column `col`.
    #[inline]
    pub fn column_real(&self, col: usize) -> f64 {
        self.coord.min_real() + self.pixel_size * (self.first_column() + col) as f64
    }

    /// Imaginary value of every row, top first.
    pub fn imaginary_rows(&self) -> Vec<f64> {
        let top = self.coord.max_imag();
        let rows = self.rows as f64;
        (0..self.rows)
            .map(|y| top - self.coord.span.im * y as f64 / rows)
            .collect()
    }

    /// Pixels in the current panel.
    pub fn panel_len(&self) -> usize {
        self.rows * self.cols_this_panel
    }
}

/// What kind of image a request asks for.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RenderKind {
    /// The on-screen square, kept in memory with its raw samples.
    Viewport,
    /// A disk-backed image `width` pixels wide.
    Full {
        /// Columns of the final image.
        width: usize,
    },
}

/// A render as submitted by the user interface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderRequest {
    /// Which family to iterate.
    pub fractal: Fractal,
    /// The window to render.
    pub coord: Coordinate,
    /// Samples per pixel.
    pub oversample: Oversample,
    /// Iteration limit.
    pub dwell: u32,
    /// Viewport or full render.
    pub kind: RenderKind,
}

impl RenderRequest {
    /// A viewport request for the home view of `fractal`.
    pub fn home(fractal: Fractal, dwell: u32) -> RenderRequest {
        RenderRequest {
            fractal,
            coord: fractal.home(),
            oversample: Oversample::None,
            dwell,
            kind: RenderKind::Viewport,
        }
    }

    /// The same request, asking for a full render `width` wide.
    pub fn full(self, width: usize) -> RenderRequest {
        RenderRequest {
            kind: RenderKind::Full { width },
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::Complex;

    fn request() -> RenderRequest {
        RenderRequest::home(Fractal::Mandelbrot, 100)
    }

    #[test]
    fn panel_width_is_a_multiple_of_four() {
        assert_eq!(panel_width_for(100, 1000).unwrap(), 8);
        assert_eq!(panel_width_for(3, 1000).unwrap(), 332);
        assert_eq!(panel_width_for(250, 1000).unwrap(), 4);
    }

    #[test]
    fn rows_beyond_capacity_are_too_large() {
        match panel_width_for(2000, 1000) {
            Err(RenderError::TooLarge { rows, capacity }) => {
                assert_eq!((rows, capacity), (2000, 1000))
            }
            other => panic!("unexpected {:?}", other),
        }
        // A column fits but four do not.
        assert!(panel_width_for(300, 1000).is_err());
        assert!(panel_width_for(0, 1000).is_err());
    }

    #[test]
    fn panel_columns_sum_to_the_image_width() {
        let mut job = PlotSettings::full(&request(), 1000, 100 * 1000).unwrap();
        assert_eq!(job.rows, 1000);
        assert_eq!(job.panel_width, 100);
        let mut total = 0;
        for n in 0..job.panel_count() {
            job.start_panel(n);
            assert!(job.cols_this_panel <= job.panel_width);
            total += job.cols_this_panel;
        }
        assert_eq!(total, job.columns);

        let mut odd = PlotSettings::full(&request(), 1003, 100 * 1003).unwrap();
        assert_eq!(odd.panel_width, 100);
        assert_eq!(odd.panel_count(), 11);
        odd.start_panel(10);
        assert_eq!(odd.cols_this_panel, 3);
    }

    #[test]
    fn full_renders_keep_the_aspect_ratio() {
        let mut r = request();
        r.coord = Coordinate::new(Complex::new(0.0, 0.0), Complex::new(4.0, 1.0)).unwrap();
        let job = PlotSettings::full(&r, 400, 1_000_000).unwrap();
        assert_eq!(job.rows, 100);
        assert!((job.pixel_size - 0.01).abs() < 1e-12);
    }

    #[test]
    fn render_width_is_bounded() {
        assert!(PlotSettings::full(&request(), 9, 1_000_000).is_err());
        assert!(PlotSettings::full(&request(), 1_000_001, usize::max_value()).is_err());
    }

    #[test]
    fn tall_windows_cannot_overflow_the_pixel_count() {
        let mut r = request();
        r.coord = Coordinate::new(Complex::new(0.0, 0.0), Complex::new(1.0, 1e11)).unwrap();
        match PlotSettings::full(&r, MAX_RENDER_WIDTH, usize::max_value()) {
            Err(RenderError::TooLarge { rows, .. }) => assert!(rows > 1_000_000_000),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rows_run_from_the_top_edge_down() {
        let job = PlotSettings::viewport(&request(), 4);
        let rows = job.imaginary_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], 1.5);
        assert_eq!(rows[2], 0.0);
        assert!(rows.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn columns_account_for_earlier_panels() {
        let mut job = PlotSettings::full(&request(), 1000, 100 * 1000).unwrap();
        job.start_panel(3);
        let expected = -2.25 + job.pixel_size * 305.0;
        assert!((job.column_real(5) - expected).abs() < 1e-12);
    }

    #[test]
    fn oversample_offsets() {
        assert_eq!(Oversample::None.offsets(4.0), vec![(0.0, 0.0)]);
        assert_eq!(
            Oversample::Four.offsets(4.0),
            vec![(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)]
        );
        let nine = Oversample::Nine.offsets(4.0);
        assert_eq!(nine.len(), 9);
        assert_eq!(nine[1], (0.0, -1.0));
        assert_eq!(nine[3], (-1.0, 0.0));
        assert_eq!(nine[4], (0.0, 0.0));
    }

    #[test]
    fn oversample_parses() {
        assert_eq!("9".parse::<Oversample>().unwrap(), Oversample::Nine);
        assert_eq!("0".parse::<Oversample>().unwrap(), Oversample::None);
        assert!("3".parse::<Oversample>().is_err());
    }

    #[test]
    fn megapixels_switch_units() {
        assert_eq!(megapixels(1000, 2000), "2.0 megapixels");
        assert_eq!(megapixels(100_000, 100_000), "10.00 gigapixels");
    }
}
