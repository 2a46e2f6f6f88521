//! Monotonic cubic interpolation (Fritsch-Carlson style tangents).
//! Between any two control points the curve never overshoots, which
//! is what keeps a color gradient built from it free of ringing.

/// A monotonic cubic spline through a fixed set of control points.
#[derive(Clone, Debug)]
pub struct CubicMonoSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    c1s: Vec<f64>,
    c2s: Vec<f64>,
    c3s: Vec<f64>,
}

impl CubicMonoSpline {
    /// Fits the spline.  The xs must be strictly increasing and there
    /// must be at least two points.
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<CubicMonoSpline, String> {
        if xs.len() != ys.len() {
            return Err(format!(
                "Spline needs as many ys ({}) as xs ({}).",
                ys.len(),
                xs.len()
            ));
        }
        if xs.len() < 2 {
            return Err("Spline needs at least two control points.".to_string());
        }
        if xs.windows(2).any(|w| !(w[1] > w[0])) {
            return Err("Spline control points must be strictly increasing in x.".to_string());
        }

        let dxs: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let ms: Vec<f64> = ys
            .windows(2)
            .zip(&dxs)
            .map(|(w, dx)| (w[1] - w[0]) / dx)
            .collect();

        // Degree-1 coefficients: zero where the slope changes sign,
        // otherwise a weighted harmonic mean of neighboring slopes.
        let mut c1s = Vec::with_capacity(xs.len());
        c1s.push(ms[0]);
        for i in 0..dxs.len() - 1 {
            let (m, m_next) = (ms[i], ms[i + 1]);
            if m * m_next <= 0.0 {
                c1s.push(0.0);
            } else {
                let (dx, dx_next) = (dxs[i], dxs[i + 1]);
                let common = dx + dx_next;
                c1s.push(3.0 * common / ((common + dx_next) / m + (common + dx) / m_next));
            }
        }
        c1s.push(ms[ms.len() - 1]);

        let mut c2s = Vec::with_capacity(dxs.len());
        let mut c3s = Vec::with_capacity(dxs.len());
        for i in 0..dxs.len() {
            let c1 = c1s[i];
            let inv_dx = 1.0 / dxs[i];
            let common = c1 + c1s[i + 1] - ms[i] - ms[i];
            c2s.push((ms[i] - c1 - common) * inv_dx);
            c3s.push(common * inv_dx * inv_dx);
        }

        Ok(CubicMonoSpline {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            c1s,
            c2s,
            c3s,
        })
    }

    /// The interpolated y at `x`.  Control points are reproduced
    /// exactly; points outside the range extend the end segments.
    pub fn interpolate(&self, x: f64) -> f64 {
        let last = self.xs.len() - 1;
        if x == self.xs[last] {
            return self.ys[last];
        }

        // Find the segment holding x, or the exact control point.
        let segment = match self
            .xs
            .binary_search_by(|probe| probe.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Less))
        {
            Ok(i) => return self.ys[i],
            Err(0) => 0,
            Err(i) => (i - 1).min(self.c3s.len() - 1),
        };

        let diff = x - self.xs[segment];
        let diff_sq = diff * diff;
        self.ys[segment]
            + self.c1s[segment] * diff
            + self.c2s[segment] * diff_sq
            + self.c3s[segment] * diff * diff_sq
    }
}
