//! Number formatting and plain-text tables for printed summaries.

/// Format with `digits` significant digits, switching to scientific notation
/// for very large or very small magnitudes.
pub fn fmt_sig(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return match value {
            v if v.is_nan() => "NaN".to_string(),
            v if v > 0.0 => "Inf".to_string(),
            _ => "-Inf".to_string(),
        };
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let digits = digits.max(1);
    let magnitude = value.abs().log10().floor() as i32;
    if !(-4..6).contains(&magnitude) {
        return format!("{:.*e}", digits - 1, value);
    }
    let decimals = (digits as i32 - 1 - magnitude).max(0) as usize;
    format!("{:.*}", decimals, value)
}

/// p-values the way R prints them: tiny values collapse to "<2e-16".
pub fn fmt_pvalue(p: f64) -> String {
    if p.is_nan() {
        "NA".to_string()
    } else if p < 2.2e-16 {
        "<2e-16".to_string()
    } else if p < 1e-4 {
        format!("{:.2e}", p)
    } else {
        fmt_sig(p, 3)
    }
}

/// Lay out `rows` under `headers`: first column left-aligned, the rest
/// right-aligned, one space between columns.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let n_cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (j, cell) in row.iter().enumerate().take(n_cols) {
            widths[j] = widths[j].max(cell.chars().count());
        }
    }

    let render_line = |cells: Vec<&str>| -> String {
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(j, cell)| {
                if j == 0 {
                    format!("{:<width$}", cell, width = widths[j])
                } else {
                    format!("{:>width$}", cell, width = widths[j])
                }
            })
            .collect();
        format!("{}\n", line.join(" ").trim_end())
    };

    let mut out = render_line(headers.to_vec());
    for row in rows {
        out.push_str(&render_line(row.iter().map(String::as_str).collect()));
    }
    out
}
