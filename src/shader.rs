//! The pixel shader.  A shader turns the escape samples of one pixel
//! into a color under one of several palette schemes, then applies
//! the channel inversions and the optional greyscale collapse.
//!
//! The constants in the smooth and gradient schemes are tuned by eye
//! and treated as part of the visual output; they are reproduced as
//! they are rather than derived.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::color::{color_span, hsv_to_rgb, lerp, Pixel};
use crate::escape::{EscapeSample, FractalValue};
use crate::spline::CubicMonoSpline;

/// 1 / ln(2), to the precision the palettes were tuned with.
pub const ONE_OVER_LOG2: f64 = 1.442_695_04;

/// Entries in the spline gradient.
pub const GRADIENT_LENGTH: usize = 2048;

/// The fixed hue the interactive explorer starts with.
pub const DEFAULT_FIXED_HUE: f64 = 0.585;

// Control points of the orange/blue/white spline gradient.
const GRADIENT_X: [f64; 6] = [0.0000, 0.1600, 0.4200, 0.6425, 0.8575, 1.0000];
const GRADIENT_RED: [f64; 6] = [0.0, 32.0, 237.0, 255.0, 0.0, 0.0];
const GRADIENT_GREEN: [f64; 6] = [7.0, 107.0, 255.0, 170.0, 2.0, 7.0];
const GRADIENT_BLUE: [f64; 6] = [100.0, 203.0, 255.0, 0.0, 0.0, 100.0];

/// The palette algorithms.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scheme {
    /// Smooth coloring with a hue that drifts with escape distance.
    Default,
    /// Smooth coloring with the hue pinned to the fixed hue.
    FixedHue,
    /// Lookup into a palette of three concatenated HSL spans.
    LinearGradient,
    /// Smooth grey levels.
    Monochrome,
    /// Lookup into the spline-built orange/blue/white gradient.
    SplineGradient,
}

impl Scheme {
    /// Every scheme, in menu order.
    pub const ALL: [Scheme; 5] = [
        Scheme::Default,
        Scheme::FixedHue,
        Scheme::LinearGradient,
        Scheme::Monochrome,
        Scheme::SplineGradient,
    ];
}

impl Default for Scheme {
    fn default() -> Self {
        Scheme::Default
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Scheme::Default => "default",
            Scheme::FixedHue => "fixed-hue",
            Scheme::LinearGradient => "linear",
            Scheme::Monochrome => "monochrome",
            Scheme::SplineGradient => "spline",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        if let Ok(index) = wanted.parse::<usize>() {
            return Scheme::ALL
                .get(index)
                .cloned()
                .ok_or_else(|| format!("No color scheme number {}", index));
        }
        Scheme::ALL
            .iter()
            .find(|scheme| scheme.to_string() == wanted)
            .cloned()
            .ok_or_else(|| format!("Unknown color scheme '{}'", s))
    }
}

/// The user-adjustable part of a shader.  Changing only these lets
/// the viewport be reshaded without iterating a single point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShaderSettings {
    /// Which palette algorithm to use.
    pub scheme: Scheme,
    /// Hue (0..1) used by `Scheme::FixedHue`.
    pub fixed_hue: f64,
    /// Invert the red channel.
    pub invert_r: bool,
    /// Invert the green channel.
    pub invert_g: bool,
    /// Invert the blue channel.
    pub invert_b: bool,
    /// Collapse every color to its luma.
    pub greyscale: bool,
}

impl Default for ShaderSettings {
    fn default() -> Self {
        ShaderSettings {
            scheme: Scheme::Default,
            fixed_hue: DEFAULT_FIXED_HUE,
            invert_r: false,
            invert_g: false,
            invert_b: false,
            greyscale: false,
        }
    }
}

impl ShaderSettings {
    /// Sets or clears all three inversions at once.
    pub fn set_invert_all(&mut self, invert: bool) {
        self.invert_r = invert;
        self.invert_g = invert;
        self.invert_b = invert;
    }

    /// True when every channel is inverted.
    pub fn invert_all(&self) -> bool {
        self.invert_r && self.invert_g && self.invert_b
    }
}

/// Maps escape samples to colors.  The lookup tables are built once
/// and shared between shaders that differ only in their settings.
#[derive(Clone, Debug)]
pub struct Shader {
    settings: ShaderSettings,
    linear: Arc<Vec<Pixel>>,
    gradient: Arc<Vec<Pixel>>,
}

impl Default for Shader {
    fn default() -> Self {
        Shader::new(ShaderSettings::default())
    }
}

impl Shader {
    /// Builds the lookup tables and a shader using `settings`.
    pub fn new(settings: ShaderSettings) -> Shader {
        Shader {
            settings,
            linear: Arc::new(linear_palette()),
            gradient: Arc::new(spline_gradient()),
        }
    }

    /// A shader sharing this one's tables but using other settings.
    pub fn reconfigured(&self, settings: ShaderSettings) -> Shader {
        Shader {
            settings,
            linear: Arc::clone(&self.linear),
            gradient: Arc::clone(&self.gradient),
        }
    }

    /// The settings in force.
    pub fn settings(&self) -> &ShaderSettings {
        &self.settings
    }

    /// The color of a pixel.  With more than one sample the channels
    /// of the individual sample colors are averaged.
    pub fn color(&self, value: &FractalValue) -> Pixel {
        let samples = value.samples();
        match samples.len() {
            0 => Pixel::BLACK,
            1 => self.sample_color(&samples[0]),
            n => {
                let (mut r, mut g, mut b) = (0u32, 0u32, 0u32);
                for sample in samples {
                    let p = self.sample_color(sample);
                    r += u32::from(p.r);
                    g += u32::from(p.g);
                    b += u32::from(p.b);
                }
                let n = n as u32;
                Pixel::rgb((r / n) as u8, (g / n) as u8, (b / n) as u8)
            }
        }
    }

    /// The color of one sample, post-processing included.
    pub fn sample_color(&self, e: &EscapeSample) -> Pixel {
        let mut p = match self.settings.scheme {
            Scheme::Default | Scheme::FixedHue => self.smooth(e),
            Scheme::LinearGradient => self.linear(e),
            Scheme::Monochrome => monochrome(e),
            Scheme::SplineGradient => self.gradient(e),
        };

        if self.settings.invert_r {
            p.r = 255 - p.r;
        }
        if self.settings.invert_g {
            p.g = 255 - p.g;
        }
        if self.settings.invert_b {
            p.b = 255 - p.b;
        }

        if self.settings.greyscale {
            let shade =
                f64::from(p.r) * 0.299 + f64::from(p.g) * 0.587 + f64::from(p.b) * 0.114;
            p = Pixel::grey(shade as u8);
        }
        p
    }

    /// The lookup table of the active scheme, if it has one.
    pub fn palette(&self) -> Option<&[Pixel]> {
        match self.settings.scheme {
            Scheme::LinearGradient => Some(self.linear.as_slice()),
            Scheme::SplineGradient => Some(self.gradient.as_slice()),
            _ => None,
        }
    }

    /// The active lookup table repeated `height` times, as a
    /// `(width, pixels)` image for inspecting the palette.
    pub fn palette_strip(&self, height: usize) -> Option<(usize, Vec<Pixel>)> {
        self.palette().map(|palette| {
            let mut image = Vec::with_capacity(palette.len() * height);
            for _ in 0..height {
                image.extend_from_slice(palette);
            }
            (palette.len(), image)
        })
    }

    fn smooth(&self, e: &EscapeSample) -> Pixel {
        if e.is_inside() {
            return Pixel::BLACK;
        }
        let d = log_distance(e);
        let p = d.floor();
        lerp(self.wave(p), self.wave(p + 1.0), d - p)
    }

    // The continuous palette behind the smooth schemes.
    fn wave(&self, d: f64) -> Pixel {
        let h = if self.settings.scheme == Scheme::FixedHue {
            self.settings.fixed_hue
        } else {
            d * 0.005_213_36
        };
        let v = (d * 0.184_796_9).sin() * 0.5 + 0.5;
        let s = ((d * 0.162_012_467).sin() * 0.5 + 0.5) * (1.0 - v);
        hsv_to_rgb(h, s, v)
    }

    fn linear(&self, e: &EscapeSample) -> Pixel {
        if e.is_inside() {
            return Pixel::BLACK;
        }
        let zero_to_one = (escape_distance(e) * 0.001).sin().abs();
        let index = (zero_to_one * self.linear.len() as f64) as usize;
        self.linear[index.min(self.linear.len() - 1)]
    }

    fn gradient(&self, e: &EscapeSample) -> Pixel {
        if e.is_inside() {
            return Pixel::BLACK;
        }
        let smoothed = (e.modulus_sq * ONE_OVER_LOG2).ln().ln() * ONE_OVER_LOG2;
        let d = (f64::from(e.iterations) + 1.0 - smoothed).sqrt();
        self.gradient[(d * 256.0) as usize % self.gradient.len()]
    }
}

/// The normalized escape distance shared by the smooth schemes.
fn escape_distance(e: &EscapeSample) -> f64 {
    let smoothed = (e.modulus_sq.ln() * 0.5).ln() * ONE_OVER_LOG2;
    f64::from(e.iterations) + 10.0 - smoothed
}

/// The escape distance stretched onto the continuous palettes.
fn log_distance(e: &EscapeSample) -> f64 {
    (escape_distance(e) + 50.0).ln() * 100.0
}

fn monochrome(e: &EscapeSample) -> Pixel {
    if e.is_inside() {
        return Pixel::BLACK;
    }
    let shade = |d: f64| Pixel::grey(((d * 0.1).sin().abs() * 255.0) as u8);
    let d = log_distance(e);
    let p = d.floor();
    lerp(shade(p), shade(p + 1.0), d - p)
}

/// White to blue to black, black to orange to white, white to blue
/// to black.
fn linear_palette() -> Vec<Pixel> {
    let mut palette = Vec::with_capacity(320);
    color_span(&mut palette, 0.6, 0.5, 0.0, 1.0, 120);
    color_span(&mut palette, 0.1, 1.0, 1.0, 0.0, 100);
    color_span(&mut palette, 0.6, 0.9, 0.0, 1.0, 100);
    palette
}

fn spline_gradient() -> Vec<Pixel> {
    let fit = |ys: &[f64]| {
        CubicMonoSpline::new(&GRADIENT_X, ys).expect("gradient control points are well formed")
    };
    let (red, green, blue) = (fit(&GRADIENT_RED), fit(&GRADIENT_GREEN), fit(&GRADIENT_BLUE));
    let channel = |v: f64| num::clamp(v, 0.0, 255.0) as u8;

    (0..GRADIENT_LENGTH)
        .map(|i| {
            let ratio = i as f64 / (GRADIENT_LENGTH - 1) as f64;
            Pixel::rgb(
                channel(red.interpolate(ratio)),
                channel(green.interpolate(ratio)),
                channel(blue.interpolate(ratio)),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::Fractal;

    fn escaped(iterations: u32) -> EscapeSample {
        EscapeSample {
            iterations,
            modulus_sq: 1.0e6,
        }
    }

    fn shader(scheme: Scheme) -> Shader {
        Shader::new(ShaderSettings {
            scheme,
            ..ShaderSettings::default()
        })
    }

    #[test]
    fn never_escaping_points_are_black_in_every_scheme() {
        for scheme in Scheme::ALL.iter() {
            let s = shader(*scheme);
            assert_eq!(s.sample_color(&EscapeSample::INSIDE), Pixel::BLACK);
        }
    }

    #[test]
    fn inversion_is_self_inverse() {
        let plain = shader(Scheme::Default);
        let mut settings = ShaderSettings::default();
        settings.set_invert_all(true);
        assert!(settings.invert_all());
        let inverted = plain.reconfigured(settings);

        for i in 1..200 {
            let p = plain.sample_color(&escaped(i));
            let q = inverted.sample_color(&escaped(i));
            assert_eq!(p.r, 255 - q.r);
            assert_eq!(p.g, 255 - q.g);
            assert_eq!(p.b, 255 - q.b);
            assert_eq!(255 - (255 - q.r), q.r);
        }
        // Inside points turn white.
        assert_eq!(
            inverted.sample_color(&EscapeSample::INSIDE),
            Pixel::rgb(255, 255, 255)
        );
    }

    #[test]
    fn greyscale_collapses_channels() {
        let s = Shader::new(ShaderSettings {
            scheme: Scheme::SplineGradient,
            greyscale: true,
            ..ShaderSettings::default()
        });
        for i in 1..100 {
            let p = s.sample_color(&escaped(i));
            assert_eq!(p.r, p.g);
            assert_eq!(p.g, p.b);
        }
    }

    #[test]
    fn oversampled_pixels_average_their_samples() {
        let s = shader(Scheme::Monochrome);
        let mut v = FractalValue::default();
        v.count = 4;
        v.samples[0] = escaped(7);
        v.samples[1] = EscapeSample::INSIDE;
        v.samples[2] = escaped(7);
        v.samples[3] = EscapeSample::INSIDE;
        let lit = s.sample_color(&escaped(7));
        let p = s.color(&v);
        assert_eq!(p.r, ((u32::from(lit.r) * 2) / 4) as u8);
        assert_eq!(p.a, 255);
    }

    #[test]
    fn fixed_hue_ignores_distance_for_hue() {
        let s = Shader::new(ShaderSettings {
            scheme: Scheme::FixedHue,
            fixed_hue: 0.0,
            ..ShaderSettings::default()
        });
        // With hue zero the red channel always dominates.
        for i in 1..300 {
            let p = s.sample_color(&escaped(i));
            assert!(p.r >= p.g && p.r >= p.b, "{:?}", p);
        }
    }

    #[test]
    fn palettes_have_their_documented_sizes() {
        assert_eq!(shader(Scheme::LinearGradient).palette().unwrap().len(), 320);
        let gradient = shader(Scheme::SplineGradient);
        let table = gradient.palette().unwrap();
        assert_eq!(table.len(), GRADIENT_LENGTH);
        // Endpoints reproduce the control points.
        assert_eq!(table[0], Pixel::rgb(0, 7, 100));
        assert_eq!(table[GRADIENT_LENGTH - 1], Pixel::rgb(0, 7, 100));
        assert!(shader(Scheme::Default).palette().is_none());
    }

    #[test]
    fn palette_strip_repeats_rows() {
        let (width, strip) = shader(Scheme::LinearGradient).palette_strip(3).unwrap();
        assert_eq!(width, 320);
        assert_eq!(strip.len(), 960);
        assert_eq!(&strip[..320], &strip[640..]);
    }

    #[test]
    fn schemes_parse_by_name_or_index() {
        assert_eq!("spline".parse::<Scheme>(), Ok(Scheme::SplineGradient));
        assert_eq!("1".parse::<Scheme>(), Ok(Scheme::FixedHue));
        assert!("9".parse::<Scheme>().is_err());
        for scheme in Scheme::ALL.iter() {
            assert_eq!(scheme.to_string().parse::<Scheme>(), Ok(*scheme));
        }
    }

    #[test]
    fn real_samples_shade_without_panicking() {
        for scheme in Scheme::ALL.iter() {
            let s = shader(*scheme);
            for x in 0..50 {
                let e = Fractal::Mandelbrot.iterate(-2.0 + x as f64 * 0.05, 0.3, 500);
                s.sample_color(&e);
            }
        }
    }
}
