//! Describes windows on the complex plane and the zoom history that
//! the viewport walks through.  A `Coordinate` is a center and a span;
//! mapping it onto an integral plane of pixels puts the upper-left
//! pixel at the largest imaginary value, so imaginary values decrease
//! as the row number grows.

use num::Complex;

/// Describes the width and height of an integral plane that is assumed
/// to start at 0,0.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntegralPlane(pub usize, pub usize);

/// Describes the x, y of a pixel on an integral plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PixelPos(pub usize, pub usize);

/// A rectangular window on the complex plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Coordinate {
    /// The point in the middle of the window.
    pub center: Complex<f64>,
    /// Full width (real part) and full height (imaginary part).
    pub span: Complex<f64>,
}

impl Coordinate {
    /// Builds a window, refusing spans that are not strictly positive.
    pub fn new(center: Complex<f64>, span: Complex<f64>) -> Result<Coordinate, String> {
        if !(span.re > 0.0) || !(span.im > 0.0) {
            return Err(format!(
                "The span {},{} must be positive in both directions.",
                span.re, span.im
            ));
        }
        Ok(Coordinate { center, span })
    }

    /// The smallest real value in the window.
    pub fn min_real(&self) -> f64 {
        self.center.re - self.span.re / 2.0
    }

    /// The largest imaginary value in the window, i.e. the top edge.
    pub fn max_imag(&self) -> f64 {
        self.center.im + self.span.im / 2.0
    }

    /// The same window, scaled about its center.  A factor of 0.5
    /// zooms in by two; 2.0 zooms out by two.
    pub fn scaled(&self, factor: f64) -> Coordinate {
        Coordinate {
            center: self.center,
            span: self.span * factor,
        }
    }

    /// Given a pixel on an integral plane laid over this window, return
    /// the complex number at that pixel's upper-left corner.
    pub fn pixel_to_point(&self, pixel: &PixelPos, plane: IntegralPlane) -> Complex<f64> {
        Complex::new(
            self.min_real() + self.span.re * (pixel.0 as f64) / (plane.0 as f64),
            self.max_imag() - self.span.im * (pixel.1 as f64) / (plane.1 as f64),
        )
    }

    /// The window covered by a rectangle of pixels, given its two
    /// corners.  When `square` is set the rectangle is first made
    /// square by averaging its sides, keeping its center.
    pub fn lasso(
        &self,
        anchor: PixelPos,
        extent: PixelPos,
        plane: IntegralPlane,
        square: bool,
    ) -> Coordinate {
        let (mut ax, mut ay) = (anchor.0.min(extent.0), anchor.1.min(extent.1));
        let (mut ex, mut ey) = (anchor.0.max(extent.0), anchor.1.max(extent.1));

        if square {
            let (span_x, span_y) = (ex - ax, ey - ay);
            let (center_x, center_y) = (ax + span_x / 2, ay + span_y / 2);
            let side = (span_x + span_y) / 2;
            ax = center_x.saturating_sub(side / 2);
            ay = center_y.saturating_sub(side / 2);
            ex = ax + side;
            ey = ay + side;
        }

        let ulc = self.pixel_to_point(&PixelPos(ax, ay), plane);
        let lrc = self.pixel_to_point(&PixelPos(ex, ey), plane);
        Coordinate {
            center: (ulc + lrc) / 2.0,
            span: Complex::new((ulc.re - lrc.re).abs(), (ulc.im - lrc.im).abs()),
        }
    }
}

/// The zoom history.  The bottom entry is the fully zoomed-out view of
/// the current fractal and can never be popped, so the stack is never
/// empty.
#[derive(Clone, Debug)]
pub struct CoordStack {
    stack: Vec<Coordinate>,
}

impl CoordStack {
    /// A history holding only the home view.
    pub fn new(home: Coordinate) -> CoordStack {
        CoordStack { stack: vec![home] }
    }

    /// The window currently on display.
    pub fn top(&self) -> Coordinate {
        self.stack[self.stack.len() - 1]
    }

    /// Number of entries, home view included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Enters a new view.
    pub fn push(&mut self, coord: Coordinate) {
        self.stack.push(coord);
    }

    /// Restores the previous view.  Returns false, leaving the stack
    /// alone, when already at the home view.
    pub fn pop(&mut self) -> bool {
        if self.stack.len() == 1 {
            return false;
        }
        self.stack.pop();
        true
    }

    /// Drops everything but the home view.
    pub fn reset(&mut self) {
        self.stack.truncate(1);
    }

    /// Replaces the whole history with a new home view.
    pub fn rehome(&mut self, home: Coordinate) {
        self.stack.clear();
        self.stack.push(home);
    }

    /// Pushes the current view scaled about its center.
    pub fn zoom(&mut self, factor: f64) {
        let next = self.top().scaled(factor);
        self.push(next);
    }

    /// Pushes a view centered on the given pixel with the same span.
    pub fn recenter(&mut self, pixel: PixelPos, plane: IntegralPlane) {
        let current = self.top();
        self.push(Coordinate {
            center: current.pixel_to_point(&pixel, plane),
            span: current.span,
        });
    }

    /// Pushes a view centered on the given pixel at half the span.
    pub fn zoom_at(&mut self, pixel: PixelPos, plane: IntegralPlane) {
        let current = self.top();
        self.push(Coordinate {
            center: current.pixel_to_point(&pixel, plane),
            span: current.span / 2.0,
        });
    }
}
