//! SVG rendering for [`Plot`].

use super::{Plot, SeriesKind};
use crate::tidy::format::fmt_sig;

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 55.0;
const POINT_RADIUS: f64 = 2.5;
const TARGET_TICKS: f64 = 5.0;
const MAX_TICKS: usize = 50;

const PALETTE: [&str; 6] = ["#1f1f1f", "#d62728", "#1f77b4", "#2ca02c", "#9467bd", "#ff7f0e"];

/// Data range mapped onto a pixel range.
struct Axis {
    lo: f64,
    hi: f64,
    pixel_lo: f64,
    pixel_hi: f64,
}

impl Axis {
    fn new(lo: f64, hi: f64, pixel_lo: f64, pixel_hi: f64) -> Self {
        let (lo, hi) = padded(lo, hi);
        Self {
            lo,
            hi,
            pixel_lo,
            pixel_hi,
        }
    }

    fn map(&self, v: f64) -> f64 {
        self.pixel_lo + (v - self.lo) / (self.hi - self.lo) * (self.pixel_hi - self.pixel_lo)
    }

    fn ticks(&self) -> Vec<f64> {
        let step = nice_step((self.hi - self.lo) / TARGET_TICKS);
        let first = (self.lo / step).ceil() * step;
        let count = ((self.hi - first) / step + 1e-9).floor();
        if !count.is_finite() || count < 0.0 {
            return Vec::new();
        }
        (0..=(count as usize).min(MAX_TICKS))
            .map(|k| first + k as f64 * step)
            // Snap values like 0.30000000000000004
            .map(|t| if t.abs() < step * 1e-9 { 0.0 } else { t })
            .collect()
    }
}

/// Widen the range by 4% on each side. A range too narrow to tick (equal
/// values, or values a few ULPs apart) becomes ±10% around it, or ±1 at zero.
fn padded(lo: f64, hi: f64) -> (f64, f64) {
    if hi - lo > 8.0 * f64::EPSILON * lo.abs().max(hi.abs()) {
        let pad = 0.04 * (hi - lo);
        (lo - pad, hi + pad)
    } else {
        let half = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
        (lo - half, hi + half)
    }
}

/// 1, 2 or 5 times a power of ten.
fn nice_step(raw: f64) -> f64 {
    let magnitude = 10f64.powf(raw.log10().floor());
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn data_bounds(plot: &Plot) -> (f64, f64, f64, f64) {
    let mut bounds = (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in plot.series.iter().flat_map(|s| s.finite_points()) {
        bounds.0 = bounds.0.min(x);
        bounds.1 = bounds.1.max(x);
        bounds.2 = bounds.2.min(y);
        bounds.3 = bounds.3.max(y);
    }
    for &h in plot.hlines.iter().filter(|h| h.is_finite()) {
        bounds.2 = bounds.2.min(h);
        bounds.3 = bounds.3.max(h);
    }
    bounds
}

/// Caller guarantees at least one finite point.
pub(super) fn render(plot: &Plot, width: f64, height: f64) -> String {
    let (x_lo, x_hi, y_lo, y_hi) = data_bounds(plot);
    let x_axis = Axis::new(x_lo, x_hi, MARGIN_LEFT, width - MARGIN_RIGHT);
    let y_axis = Axis::new(y_lo, y_hi, height - MARGIN_BOTTOM, MARGIN_TOP);
    let (left, right) = (MARGIN_LEFT, width - MARGIN_RIGHT);
    let (top, bottom) = (MARGIN_TOP, height - MARGIN_BOTTOM);

    let mut out = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" font-family=\"sans-serif\" font-size=\"12\">\n",
        w = width,
        h = height
    );
    out.push_str(&format!(
        "<rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"white\"/>\n",
        width, height
    ));
    out.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"15\" font-weight=\"bold\">{}</text>\n",
        width / 2.0,
        MARGIN_TOP / 2.0 + 5.0,
        escape(&plot.title)
    ));

    // Frame and ticks
    out.push_str(&format!(
        "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" stroke=\"black\"/>\n",
        left,
        top,
        right - left,
        bottom - top
    ));
    for t in x_axis.ticks() {
        let px = x_axis.map(t);
        out.push_str(&format!(
            "<line x1=\"{px:.1}\" y1=\"{b:.1}\" x2=\"{px:.1}\" y2=\"{b2:.1}\" stroke=\"black\"/>\n\
             <text x=\"{px:.1}\" y=\"{ty:.1}\" text-anchor=\"middle\">{label}</text>\n",
            px = px,
            b = bottom,
            b2 = bottom + 5.0,
            ty = bottom + 18.0,
            label = fmt_sig(t, 4)
        ));
    }
    for t in y_axis.ticks() {
        let py = y_axis.map(t);
        out.push_str(&format!(
            "<line x1=\"{l2:.1}\" y1=\"{py:.1}\" x2=\"{l:.1}\" y2=\"{py:.1}\" stroke=\"black\"/>\n\
             <text x=\"{tx:.1}\" y=\"{ty:.1}\" text-anchor=\"end\">{label}</text>\n",
            l = left,
            l2 = left - 5.0,
            py = py,
            tx = left - 8.0,
            ty = py + 4.0,
            label = fmt_sig(t, 4)
        ));
    }
    out.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{}</text>\n",
        (left + right) / 2.0,
        height - 12.0,
        escape(&plot.x_label)
    ));
    out.push_str(&format!(
        "<text x=\"16\" y=\"{y:.1}\" text-anchor=\"middle\" transform=\"rotate(-90 16 {y:.1})\">{}</text>\n",
        escape(&plot.y_label),
        y = (top + bottom) / 2.0
    ));

    for &h in plot.hlines.iter().filter(|h| h.is_finite()) {
        let py = y_axis.map(h);
        out.push_str(&format!(
            "<line x1=\"{:.1}\" y1=\"{py:.1}\" x2=\"{:.1}\" y2=\"{py:.1}\" stroke=\"gray\" stroke-dasharray=\"4 3\"/>\n",
            left,
            right,
            py = py
        ));
    }

    out.push_str(&format!(
        "<clipPath id=\"plot-area\"><rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\"/></clipPath>\n<g clip-path=\"url(#plot-area)\">\n",
        left,
        top,
        right - left,
        bottom - top
    ));
    for (i, series) in plot.series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        match series.kind {
            SeriesKind::Points => {
                for (x, y) in series.finite_points() {
                    out.push_str(&format!(
                        "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{}\" fill=\"none\" stroke=\"{}\"/>\n",
                        x_axis.map(x),
                        y_axis.map(y),
                        POINT_RADIUS,
                        color
                    ));
                }
            }
            SeriesKind::Line => {
                // A non-finite point breaks the line
                for segment in line_segments(&series.x, &series.y) {
                    let coords: Vec<String> = segment
                        .iter()
                        .map(|&(x, y)| format!("{:.2},{:.2}", x_axis.map(x), y_axis.map(y)))
                        .collect();
                    out.push_str(&format!(
                        "<polyline points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\"/>\n",
                        coords.join(" "),
                        color
                    ));
                }
            }
        }
    }
    out.push_str("</g>\n");

    let named: Vec<(usize, &str)> = plot
        .series
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.name.is_empty())
        .map(|(i, s)| (i, s.name.as_str()))
        .collect();
    for (row, (i, name)) in named.iter().enumerate() {
        let y = top + 14.0 + 16.0 * row as f64;
        out.push_str(&format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"10\" height=\"10\" fill=\"{}\"/>\n<text x=\"{:.1}\" y=\"{:.1}\">{}</text>\n",
            left + 8.0,
            y - 9.0,
            PALETTE[i % PALETTE.len()],
            left + 22.0,
            y,
            escape(name)
        ));
    }

    out.push_str("</svg>\n");
    out
}

fn line_segments(xs: &[f64], ys: &[f64]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for (&x, &y) in xs.iter().zip(ys) {
        if x.is_finite() && y.is_finite() {
            current.push((x, y));
        } else if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_nice_step() {
        assert_abs_diff_eq!(nice_step(0.23), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(nice_step(1.7), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(nice_step(30.0), 50.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_range_is_widened() {
        let (lo, hi) = padded(3.0, 3.0);
        assert!(lo < 3.0 && hi > 3.0);
        let (lo, hi) = padded(0.0, 0.0);
        assert_abs_diff_eq!(lo, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hi, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nearly_equal_values_get_a_usable_axis() {
        let axis = Axis::new(3.5, 3.5000000000000004, 0.0, 100.0);
        assert!(axis.hi - axis.lo > 0.1);
        let ticks = axis.ticks();
        assert!(!ticks.is_empty() && ticks.len() <= MAX_TICKS + 1);
        assert!(ticks.windows(2).all(|w| w[1] > w[0]));

        let plot = Plot::new("t", "x", "y").with_points(
            "",
            vec![3.5, 3.5000000000000004],
            vec![1.0, 1.0000000000000002],
        );
        assert!(render(&plot, 640.0, 480.0).ends_with("</svg>\n"));
    }

    #[test]
    fn test_tick_count_is_bounded() {
        let axis = Axis::new(-1e300, 1e300, 0.0, 100.0);
        assert!(axis.ticks().len() <= MAX_TICKS + 1);
    }

    #[test]
    fn test_line_breaks_at_missing_values() {
        let segs = line_segments(&[0.0, 1.0, 2.0, 3.0, 4.0], &[0.0, 1.0, f64::NAN, 3.0, 4.0]);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[1], vec![(3.0, 3.0), (4.0, 4.0)]);
    }

    #[test]
    fn test_text_is_escaped() {
        let plot = Plot::new("a < b & c", "x", "y").with_points("", vec![1.0], vec![1.0]);
        let svg = render(&plot, 300.0, 200.0);
        assert!(svg.contains("a &lt; b &amp; c"));
    }
}
