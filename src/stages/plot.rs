//! Plain SVG and HTML renderers used by the default visualizer.
//!
//! Every renderer returns the complete document as a string; the caller
//! decides where it goes.


use super::stats;

const PALETTE: [&str; 6] = ["#3b82f6", "#ef4444", "#10b981", "#f59e0b", "#8b5cf6", "#14b8a6"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureConfig {
    pub width: u32,
    pub height: u32,
    pub bins: usize,
    /// Inner margin reserved for axes and labels
    pub margin: u32,
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 320,
            bins: 16,
            margin: 40,
        }
    }
}

/// Escape text for SVG/HTML content and attributes
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Linear map from a data range onto a pixel range
#[derive(Debug, Clone, Copy)]
struct Scale {
    lo: f64,
    hi: f64,
    from: f64,
    to: f64,
}

impl Scale {
    fn new(values: &[f64], from: f64, to: f64) -> Self {
        let lo = stats::min(values).unwrap_or(0.0);
        let hi = stats::max(values).unwrap_or(1.0);
        Self { lo, hi, from, to }
    }

    fn map(&self, v: f64) -> f64 {
        let span = (self.hi - self.lo).max(1e-9);
        self.from + (v - self.lo) / span * (self.to - self.from)
    }
}

fn open_svg(config: &FigureConfig, title: &str) -> String {
    format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{w}' height='{h}' font-family='sans-serif' font-size='11'>\
         <rect width='100%' height='100%' fill='white'/>\
         <text x='{cx}' y='16' text-anchor='middle' font-size='13'>{title}</text>",
        w = config.width,
        h = config.height,
        cx = config.width / 2,
        title = escape(title),
    )
}

fn axes(out: &mut String, config: &FigureConfig, x_label: &str, y_label: &str) {
    let m = config.margin as f64;
    let (w, h) = (config.width as f64, config.height as f64);
    out.push_str(&format!(
        "<line x1='{m}' y1='{b}' x2='{r}' y2='{b}' stroke='black'/>\
         <line x1='{m}' y1='{t}' x2='{m}' y2='{b}' stroke='black'/>\
         <text x='{cx}' y='{lx}' text-anchor='middle'>{xl}</text>\
         <text x='12' y='{cy}' text-anchor='middle' transform='rotate(-90 12 {cy})'>{yl}</text>",
        m = m,
        t = m / 2.0,
        b = h - m,
        r = w - m / 2.0,
        cx = w / 2.0,
        cy = h / 2.0,
        lx = h - 8.0,
        xl = escape(x_label),
        yl = escape(y_label),
    ));
}

fn histogram_bins(values: &[f64], bins: usize) -> (f64, f64, Vec<usize>) {
    let min = stats::min(values).unwrap_or(0.0);
    let max = stats::max(values).unwrap_or(0.0);
    let bin_count = bins.max(1);
    let mut counts = vec![0usize; bin_count];
    let span = (max - min).max(1e-9);
    for value in values {
        let idx = (((value - min) / span) * bin_count as f64).floor() as usize;
        counts[idx.min(bin_count - 1)] += 1;
    }
    (min, max, counts)
}

/// Bars of a histogram inside the box `(x, y, w, h)`
fn histogram_bars(out: &mut String, values: &[f64], bins: usize, (x, y, w, h): (f64, f64, f64, f64)) {
    let (_, _, counts) = histogram_bins(values, bins);
    let max_bin = counts.iter().copied().max().unwrap_or(0).max(1) as f64;
    let bar_width = w / counts.len() as f64;
    for (i, count) in counts.iter().enumerate() {
        let bar = *count as f64 / max_bin * h;
        out.push_str(&format!(
            "<rect x='{:.2}' y='{:.2}' width='{:.2}' height='{:.2}' fill='{}' stroke='white'/>",
            x + bar_width * i as f64,
            y + h - bar,
            bar_width,
            bar,
            PALETTE[0]
        ));
    }
}

pub fn histogram_svg(column: &str, values: &[f64], config: &FigureConfig) -> String {
    let mut out = open_svg(config, &format!("Distribution of {}", column));
    let m = config.margin as f64;
    let (w, h) = (config.width as f64, config.height as f64);

    histogram_bars(&mut out, values, config.bins, (m, m / 2.0, w - 1.5 * m, h - 1.5 * m));
    axes(&mut out, config, column, "count");

    if let (Some(lo), Some(hi)) = (stats::min(values), stats::max(values)) {
        out.push_str(&format!(
            "<text x='{m}' y='{y}' text-anchor='start'>{lo:.3}</text>\
             <text x='{r}' y='{y}' text-anchor='end'>{hi:.3}</text>",
            m = m,
            r = w - m / 2.0,
            y = h - m + 14.0,
            lo = lo,
            hi = hi,
        ));
    }
    out.push_str("</svg>");
    out
}

/// Scatter matrix: histograms on the diagonal, scatter plots elsewhere
pub fn pairplot_svg(columns: &[(String, Vec<f64>)], config: &FigureConfig) -> String {
    let n = columns.len().max(1);
    let cell = 160.0;
    let m = config.margin as f64;
    let size = FigureConfig {
        width: (cell * n as f64 + m) as u32,
        height: (cell * n as f64 + m) as u32,
        ..*config
    };
    let mut out = open_svg(&size, "Pair plot");

    for (row, (y_name, ys)) in columns.iter().enumerate() {
        for (col, (x_name, xs)) in columns.iter().enumerate() {
            let x0 = m + cell * col as f64;
            let y0 = m / 2.0 + cell * row as f64;
            let pad = 8.0;
            out.push_str(&format!(
                "<rect x='{:.2}' y='{:.2}' width='{cell}' height='{cell}' fill='none' stroke='#d1d5db'/>",
                x0, y0, cell = cell
            ));

            if row == col {
                histogram_bars(&mut out, xs, config.bins, (x0 + pad, y0 + pad, cell - 2.0 * pad, cell - 2.0 * pad));
            } else {
                let sx = Scale::new(xs, x0 + pad, x0 + cell - pad);
                let sy = Scale::new(ys, y0 + cell - pad, y0 + pad);
                for (x, y) in xs.iter().zip(ys) {
                    out.push_str(&format!(
                        "<circle cx='{:.2}' cy='{:.2}' r='1.8' fill='{}' fill-opacity='0.6'/>",
                        sx.map(*x),
                        sy.map(*y),
                        PALETTE[0]
                    ));
                }
            }

            if row + 1 == columns.len() {
                out.push_str(&format!(
                    "<text x='{:.2}' y='{:.2}' text-anchor='middle'>{}</text>",
                    x0 + cell / 2.0,
                    y0 + cell + 14.0,
                    escape(x_name)
                ));
            }
            if col == 0 {
                let cy = y0 + cell / 2.0;
                out.push_str(&format!(
                    "<text x='12' y='{cy:.2}' text-anchor='middle' transform='rotate(-90 12 {cy:.2})'>{}</text>",
                    escape(y_name),
                    cy = cy
                ));
            }
        }
    }
    out.push_str("</svg>");
    out
}

/// Color for a correlation in [-1, 1]: blue for negative, red for positive
fn diverging(r: f64) -> String {
    let t = r.clamp(-1.0, 1.0);
    let fade = |c: f64| (255.0 - (255.0 - c) * t.abs()).round() as u8;
    let (red, green, blue) = if t >= 0.0 {
        (fade(220.0), fade(38.0), fade(38.0))
    } else {
        (fade(37.0), fade(99.0), fade(235.0))
    };
    format!("#{:02x}{:02x}{:02x}", red, green, blue)
}

pub fn heatmap_svg(names: &[String], matrix: &[Vec<f64>], config: &FigureConfig) -> String {
    let n = names.len().max(1);
    let cell = 56.0;
    let label = 100.0;
    let size = FigureConfig {
        width: (label + cell * n as f64 + 20.0) as u32,
        height: (label + cell * n as f64 + 20.0) as u32,
        ..*config
    };
    let mut out = open_svg(&size, "Correlation heatmap");

    for (i, row) in matrix.iter().enumerate() {
        for (j, r) in row.iter().enumerate() {
            let x = label + cell * j as f64;
            let y = 24.0 + cell * i as f64;
            out.push_str(&format!(
                "<rect x='{x:.2}' y='{y:.2}' width='{cell}' height='{cell}' fill='{fill}' stroke='white'/>\
                 <text x='{tx:.2}' y='{ty:.2}' text-anchor='middle'>{r:.2}</text>",
                x = x,
                y = y,
                cell = cell,
                fill = diverging(*r),
                tx = x + cell / 2.0,
                ty = y + cell / 2.0 + 4.0,
                r = r,
            ));
        }
    }
    for (i, name) in names.iter().enumerate() {
        out.push_str(&format!(
            "<text x='{lx:.2}' y='{ly:.2}' text-anchor='end'>{name}</text>\
             <text x='{cx:.2}' y='{cy:.2}' text-anchor='middle'>{name}</text>",
            lx = label - 6.0,
            ly = 24.0 + cell * i as f64 + cell / 2.0 + 4.0,
            cx = label + cell * i as f64 + cell / 2.0,
            cy = 24.0 + cell * n as f64 + 14.0,
            name = escape(name),
        ));
    }
    out.push_str("</svg>");
    out
}

/// One box per group: quartiles, median and 1.5 IQR whiskers
pub fn boxplot_svg(value: &str, group: &str, groups: &[(String, Vec<f64>)], config: &FigureConfig) -> String {
    let mut out = open_svg(config, &format!("{} by {}", value, group));
    let m = config.margin as f64;
    let (w, h) = (config.width as f64, config.height as f64);

    let all: Vec<f64> = groups.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    let sy = Scale::new(&all, h - m, m / 2.0);
    let slot = (w - 1.5 * m) / groups.len().max(1) as f64;

    for (i, (name, values)) in groups.iter().enumerate() {
        let (Some(q1), Some(q2), Some(q3)) = (
            stats::quantile(values, 0.25),
            stats::quantile(values, 0.5),
            stats::quantile(values, 0.75),
        ) else {
            continue;
        };
        let iqr = q3 - q1;
        let lo = values.iter().copied().filter(|v| *v >= q1 - 1.5 * iqr).fold(q1, f64::min);
        let hi = values.iter().copied().filter(|v| *v <= q3 + 1.5 * iqr).fold(q3, f64::max);

        let cx = m + slot * (i as f64 + 0.5);
        let half = slot * 0.3;
        out.push_str(&format!(
            "<line x1='{cx:.2}' y1='{lo:.2}' x2='{cx:.2}' y2='{hi:.2}' stroke='black'/>\
             <rect x='{x:.2}' y='{top:.2}' width='{bw:.2}' height='{bh:.2}' fill='{fill}' stroke='black'/>\
             <line x1='{x:.2}' y1='{med:.2}' x2='{x2:.2}' y2='{med:.2}' stroke='black' stroke-width='2'/>\
             <text x='{cx:.2}' y='{ly:.2}' text-anchor='middle'>{name}</text>",
            cx = cx,
            lo = sy.map(lo),
            hi = sy.map(hi),
            x = cx - half,
            x2 = cx + half,
            top = sy.map(q3),
            bw = 2.0 * half,
            bh = (sy.map(q1) - sy.map(q3)).abs(),
            med = sy.map(q2),
            fill = PALETTE[i % PALETTE.len()],
            ly = h - m + 14.0,
            name = escape(name),
        ));
    }
    axes(&mut out, config, group, value);
    out.push_str("</svg>");
    out
}

/// Bar chart of category counts, in the given order
pub fn bar_svg(column: &str, counts: &[(String, usize)], config: &FigureConfig) -> String {
    let mut out = open_svg(config, &format!("Counts of {}", column));
    let m = config.margin as f64;
    let (w, h) = (config.width as f64, config.height as f64);

    let max = counts.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as f64;
    let slot = (w - 1.5 * m) / counts.len().max(1) as f64;
    let plot_h = h - 1.5 * m;

    for (i, (name, count)) in counts.iter().enumerate() {
        let bar = *count as f64 / max * plot_h;
        let x = m + slot * i as f64;
        out.push_str(&format!(
            "<rect x='{x:.2}' y='{y:.2}' width='{bw:.2}' height='{bar:.2}' fill='{fill}'/>\
             <text x='{cx:.2}' y='{ly:.2}' text-anchor='middle'>{name}</text>",
            x = x + slot * 0.1,
            y = h - m - bar,
            bw = slot * 0.8,
            bar = bar,
            fill = PALETTE[0],
            cx = x + slot / 2.0,
            ly = h - m + 14.0,
            name = escape(name),
        ));
    }
    axes(&mut out, config, column, "count");
    out.push_str("</svg>");
    out
}

fn html_page(title: &str, svg: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset='utf-8'><title>{title}</title>\
         <style>body{{font-family:sans-serif;margin:2em}} circle:hover{{fill:#ef4444;r:5}}</style>\
         </head><body><h1>{title}</h1>{svg}</body></html>\n",
        title = escape(title),
        svg = svg,
    )
}

/// Standalone HTML scatter plot; every point carries a hover tooltip
pub fn interactive_scatter_html(x_name: &str, y_name: &str, points: &[(f64, f64)], config: &FigureConfig) -> String {
    let title = format!("{} vs {}", y_name, x_name);
    let mut svg = open_svg(config, &title);
    let m = config.margin as f64;
    let (w, h) = (config.width as f64, config.height as f64);

    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let sx = Scale::new(&xs, m, w - m / 2.0);
    let sy = Scale::new(&ys, h - m, m / 2.0);

    for (x, y) in points {
        svg.push_str(&format!(
            "<circle cx='{:.2}' cy='{:.2}' r='3' fill='{}' fill-opacity='0.7'><title>{}={}, {}={}</title></circle>",
            sx.map(*x),
            sy.map(*y),
            PALETTE[0],
            escape(x_name),
            x,
            escape(y_name),
            y
        ));
    }
    axes(&mut svg, config, x_name, y_name);
    svg.push_str("</svg>");
    html_page(&title, &svg)
}

/// Standalone HTML line plot over labelled x positions (e.g. timestamps),
/// drawn in the given order with hover tooltips on every point
pub fn interactive_line_html(x_name: &str, y_name: &str, points: &[(String, f64)], config: &FigureConfig) -> String {
    let title = format!("{} over {}", y_name, x_name);
    let mut svg = open_svg(config, &title);
    let m = config.margin as f64;
    let (w, h) = (config.width as f64, config.height as f64);

    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let sy = Scale::new(&ys, h - m, m / 2.0);
    let step = (w - 1.5 * m) / (points.len().max(2) - 1) as f64;

    let coords: Vec<(f64, f64)> = ys
        .iter()
        .enumerate()
        .map(|(i, y)| (m + step * i as f64, sy.map(*y)))
        .collect();
    let path: Vec<String> = coords.iter().map(|(x, y)| format!("{:.2},{:.2}", x, y)).collect();
    svg.push_str(&format!(
        "<polyline points='{}' fill='none' stroke='{}' stroke-width='1.5'/>",
        path.join(" "),
        PALETTE[0]
    ));
    for ((x, y), (label, value)) in coords.iter().zip(points) {
        svg.push_str(&format!(
            "<circle cx='{:.2}' cy='{:.2}' r='3' fill='{}'><title>{}={}, {}={}</title></circle>",
            x,
            y,
            PALETTE[0],
            escape(x_name),
            escape(label),
            escape(y_name),
            value
        ));
    }
    axes(&mut svg, config, x_name, y_name);
    svg.push_str("</svg>");
    html_page(&title, &svg)
}
