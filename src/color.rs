//! Pixels and the color-space arithmetic the palettes are built from.

/// One pixel, stored in the channel order of the bitmap format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Pixel {
    /// Blue.
    pub b: u8,
    /// Green.
    pub g: u8,
    /// Red.
    pub r: u8,
    /// Alpha; always opaque for rendered pixels.
    pub a: u8,
}

impl Pixel {
    /// Opaque black, the color of every point that never escapes.
    pub const BLACK: Pixel = Pixel {
        b: 0,
        g: 0,
        r: 0,
        a: 255,
    };

    /// An opaque pixel from red, green and blue.
    pub fn rgb(r: u8, g: u8, b: u8) -> Pixel {
        Pixel { b, g, r, a: 255 }
    }

    /// An opaque grey.
    pub fn grey(shade: u8) -> Pixel {
        Pixel::rgb(shade, shade, shade)
    }

    /// Packs the pixel into a word, blue in the low byte.
    pub fn to_word(self) -> u32 {
        u32::from_le_bytes([self.b, self.g, self.r, self.a])
    }

    /// Inverse of `to_word`.
    pub fn from_word(word: u32) -> Pixel {
        let [b, g, r, a] = word.to_le_bytes();
        Pixel { b, g, r, a }
    }
}

/// Converts hue, saturation and value (all 0..1, hue wraps) to a
/// pixel.  Channels at or above 0.999 saturate to 255; the rest scale
/// by 256 and truncate.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Pixel {
    let h = (h - h.floor()) * 6.0;
    let s = num::clamp(s, 0.0, 1.0);
    let v = num::clamp(v, 0.0, 1.0);

    let sextant = h.floor();
    let f = h - sextant;

    let (r, g, b) = match sextant as u32 {
        0 => (1.0, 1.0 - (1.0 - f) * s, 1.0 - s),
        1 => (1.0 - s * f, 1.0, 1.0 - s),
        2 => (1.0 - s, 1.0, 1.0 - (1.0 - f) * s),
        3 => (1.0 - s, 1.0 - s * f, 1.0),
        4 => (1.0 - (1.0 - f) * s, 1.0 - s, 1.0),
        _ => (1.0, 1.0 - s, 1.0 - s * f),
    };

    fn channel(c: f64) -> u8 {
        if c <= 0.0 {
            0
        } else if c >= 0.999 {
            255
        } else {
            (c * 256.0) as u8
        }
    }

    Pixel::rgb(channel(r * v), channel(g * v), channel(b * v))
}

/// Converts hue, saturation and luminosity (all 0..1) to a pixel.
pub fn hsl_to_rgb(h: f64, sl: f64, l: f64) -> Pixel {
    let (mut r, mut g, mut b) = (l, l, l);

    let v = if l <= 0.5 {
        l * (1.0 + sl)
    } else {
        l + sl - l * sl
    };

    if v > 0.0 {
        let m = l + l - v;
        let sv = (v - m) / v;
        let h = h * 6.0;
        let sextant = h as i32;
        let fract = h - f64::from(sextant);
        let vsf = v * sv * fract;
        let mid1 = m + vsf;
        let mid2 = v - vsf;

        let rgb = match sextant {
            0 => Some((v, mid1, m)),
            1 => Some((mid2, v, m)),
            2 => Some((m, v, mid1)),
            3 => Some((m, mid2, v)),
            4 => Some((mid1, m, v)),
            5 => Some((v, m, mid2)),
            _ => None,
        };
        if let Some(rgb) = rgb {
            r = rgb.0;
            g = rgb.1;
            b = rgb.2;
        }
    }

    Pixel::rgb((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

/// A pixel `t` of the way from `a` to `b`.
pub fn lerp(a: Pixel, b: Pixel, t: f64) -> Pixel {
    let mix = |x: u8, y: u8| (f64::from(x) + t * (f64::from(y) - f64::from(x))) as u8;
    Pixel::rgb(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
}

/// Appends `steps` colors of one hue and saturation, sweeping the
/// luminosity from `lum_start` toward `lum_end`.
pub fn color_span(
    palette: &mut Vec<Pixel>,
    hue: f64,
    sat: f64,
    lum_start: f64,
    lum_end: f64,
    steps: usize,
) {
    let step = (lum_end - lum_start) / steps as f64;
    palette.extend((0..steps).map(|i| hsl_to_rgb(hue, sat, lum_start + i as f64 * step)));
}
