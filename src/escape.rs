//! Escape-time iteration.  Every fractal family here iterates
//! `z = z * z + c` and differs only in which of `z` and `c` the
//! sampled point supplies.  The iterators are pure functions of the
//! point and the dwell limit, so any number of workers may call them
//! at once.

use num::Complex;
use std::fmt;
use std::str::FromStr;

use crate::planes::Coordinate;

/// The dwell limit used until someone asks for another.
pub const DEFAULT_DWELL: u32 = 100;

/// The fixed constant of the Julia family.
pub const JULIA_C: Complex<f64> = Complex {
    re: -0.8,
    im: 0.156,
};

/// The outcome of iterating a single point.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct EscapeSample {
    /// Iterations taken before escape; zero means the point never
    /// escaped within the dwell limit.
    pub iterations: u32,
    /// The squared modulus of `z` two iterations past escape.
    pub modulus_sq: f64,
}

impl EscapeSample {
    /// The sample of a point that stayed bounded.
    pub const INSIDE: EscapeSample = EscapeSample {
        iterations: 0,
        modulus_sq: 0.0,
    };

    /// True when the point never escaped.
    pub fn is_inside(&self) -> bool {
        self.iterations == 0
    }
}

/// Up to nine samples of a single pixel, one per oversampling
/// position.  Only the first `count` entries are meaningful.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct FractalValue {
    /// The samples, in sub-pixel order.
    pub samples: [EscapeSample; 9],
    /// How many samples were taken.
    pub count: u8,
}

impl FractalValue {
    /// Wraps a single sample.
    pub fn single(sample: EscapeSample) -> FractalValue {
        let mut value = FractalValue::default();
        value.samples[0] = sample;
        value.count = 1;
        value
    }

    /// The meaningful samples.
    pub fn samples(&self) -> &[EscapeSample] {
        &self.samples[..self.count as usize]
    }
}

/// The fractal families the renderer knows how to iterate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fractal {
    /// `z` starts at the sampled point, which is also `c`.
    Mandelbrot,
    /// `c` is fixed at `JULIA_C` and the sampled point is the start.
    Julia,
}

impl Fractal {
    /// The fully zoomed-out view of this family.
    pub fn home(&self) -> Coordinate {
        match self {
            Fractal::Mandelbrot => Coordinate {
                center: Complex::new(-0.75, 0.0),
                span: Complex::new(3.0, 3.0),
            },
            Fractal::Julia => Coordinate {
                center: Complex::new(0.0, 0.0),
                span: Complex::new(3.5, 3.5),
            },
        }
    }

    /// Iterates the point `real + imag i` for up to `dwell` steps.
    #[inline]
    pub fn iterate(&self, real: f64, imag: f64, dwell: u32) -> EscapeSample {
        let point = Complex::new(real, imag);
        match self {
            Fractal::Mandelbrot => escape(point, point, dwell),
            Fractal::Julia => escape(point, JULIA_C, dwell),
        }
    }
}

impl Default for Fractal {
    fn default() -> Self {
        Fractal::Mandelbrot
    }
}

impl fmt::Display for Fractal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Fractal::Mandelbrot => write!(f, "mandelbrot"),
            Fractal::Julia => write!(f, "julia"),
        }
    }
}

impl FromStr for Fractal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "mandelbrot" => Ok(Fractal::Mandelbrot),
            "1" | "julia" => Ok(Fractal::Julia),
            other => Err(format!("Unknown fractal '{}'", other)),
        }
    }
}

/// This is our classic iterator function.  On escape it runs two more
/// iterations before measuring the modulus, which keeps the smooth
/// colorings from banding.
#[inline]
fn escape(mut z: Complex<f64>, c: Complex<f64>, dwell: u32) -> EscapeSample {
    for i in 1..=dwell {
        z = z * z + c;
        if z.norm_sqr() >= 4.0 {
            z = z * z + c;
            z = z * z + c;
            return EscapeSample {
                iterations: i,
                modulus_sq: z.norm_sqr(),
            };
        }
    }
    EscapeSample::INSIDE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_never_escapes() {
        for dwell in &[1, 2, 10, 100, 5000] {
            let s = Fractal::Mandelbrot.iterate(0.0, 0.0, *dwell);
            assert_eq!(s, EscapeSample::INSIDE);
        }
    }

    #[test]
    fn far_points_escape_quickly() {
        let s = Fractal::Mandelbrot.iterate(3.0, 0.0, 5);
        assert_eq!(s.iterations, 1);
        // 3 -> 12 -> 147 -> 21612
        assert_eq!(s.modulus_sq, 21612.0 * 21612.0);
        assert!(Fractal::Mandelbrot.iterate(-2.5, 0.0, 5).iterations > 0);
        assert!(Fractal::Julia.iterate(3.0, 0.0, 5).iterations > 0);
    }

    #[test]
    fn zero_dwell_is_always_inside() {
        assert!(Fractal::Mandelbrot.iterate(3.0, 0.0, 0).is_inside());
    }

    #[test]
    fn julia_uses_its_own_constant() {
        let j = Fractal::Julia.iterate(1.0, 1.0, 100);
        let m = Fractal::Mandelbrot.iterate(1.0, 1.0, 100);
        assert_eq!(j.iterations, 1);
        assert_eq!(m.iterations, 1);
        assert!(j.modulus_sq != m.modulus_sq);
    }

    #[test]
    fn fractals_parse_by_name_or_index() {
        assert_eq!("Julia".parse::<Fractal>(), Ok(Fractal::Julia));
        assert_eq!("0".parse::<Fractal>(), Ok(Fractal::Mandelbrot));
        assert!("newton".parse::<Fractal>().is_err());
    }

    #[test]
    fn fractal_value_exposes_only_taken_samples() {
        let v = FractalValue::single(EscapeSample {
            iterations: 3,
            modulus_sq: 10.0,
        });
        assert_eq!(v.samples().len(), 1);
        assert_eq!(v.samples()[0].iterations, 3);
    }
}
