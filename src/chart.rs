//! Chart rasterization. The compositor only needs an image back; the built-in
//! renderer draws axes, gridlines and series without text (titles are laid out
//! as PDF text above the image).

use image::{Rgba, RgbaImage};

use crate::model::{ChartBlock, ChartKind, Color, DataTable};

pub trait ChartRenderer: Send + Sync {
    fn render(&self, chart: &ChartBlock, data: &DataTable) -> Result<RgbaImage, String>;
}

/// Matplotlib's default cycle.
const PALETTE: [[u8; 3]; 10] = [
    [0x1f, 0x77, 0xb4],
    [0xff, 0x7f, 0x0e],
    [0x2c, 0xa0, 0x2c],
    [0xd6, 0x27, 0x28],
    [0x94, 0x67, 0xbd],
    [0x8c, 0x56, 0x4b],
    [0xe3, 0x77, 0xc2],
    [0x7f, 0x7f, 0x7f],
    [0xbc, 0xbd, 0x22],
    [0x17, 0xbe, 0xcf],
];

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([0, 0, 0, 255]);
const GRID: Rgba<u8> = Rgba([0xdd, 0xdd, 0xdd, 255]);

pub struct RasterChartRenderer {
    /// Raster resolution in pixels per inch of chart size.
    pub dpi: f32,
}

impl Default for RasterChartRenderer {
    fn default() -> Self {
        RasterChartRenderer { dpi: 100.0 }
    }
}

struct Series {
    values: Vec<f64>,
    color: Rgba<u8>,
}

fn series_color(chart: &ChartBlock, i: usize) -> Rgba<u8> {
    let rgb = chart
        .colors
        .as_ref()
        .and_then(|c| c.get(i))
        .map(|c: &Color| c.0)
        .unwrap_or(PALETTE[i % PALETTE.len()]);
    Rgba([rgb[0], rgb[1], rgb[2], 255])
}

fn numeric_column(data: &DataTable, name: &str) -> Result<Vec<f64>, String> {
    let column = data
        .column(name)
        .ok_or_else(|| format!("column '{name}' not found in data source"))?;
    column
        .into_iter()
        .map(|v| {
            v.trim()
                .replace(',', "")
                .parse::<f64>()
                .map_err(|_| format!("value '{v}' in column '{name}' is not numeric"))
        })
        .collect()
}

fn xy_series(chart: &ChartBlock, data: &DataTable) -> Result<(usize, Vec<Series>), String> {
    let kind = format!("{:?}", chart.chart_type);
    let (Some(x), Some(y)) = (chart.x_axis.as_deref(), chart.y_axis.as_ref()) else {
        return Err(format!("{kind} chart requires 'xAxis' and 'yAxis'"));
    };
    let categories = data
        .column(x)
        .ok_or_else(|| format!("column '{x}' not found in data source"))?
        .len();
    let series = y
        .as_slice()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            Ok(Series {
                values: numeric_column(data, col)?,
                color: series_color(chart, i),
            })
        })
        .collect::<Result<Vec<_>, String>>()?;
    Ok((categories, series))
}

struct Plot {
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
    min: f64,
    max: f64,
}

impl Plot {
    fn new(img: &RgbaImage, series: &[Series]) -> Plot {
        let (w, h) = (img.width() as f32, img.height() as f32);
        let all = series.iter().flat_map(|s| s.values.iter().copied());
        let max = all.clone().fold(0.0f64, f64::max);
        let min = all.fold(0.0f64, f64::min);
        Plot {
            left: w * 0.1,
            right: w * 0.95,
            top: h * 0.05,
            bottom: h * 0.9,
            min,
            max: if max > min { max } else { min + 1.0 },
        }
    }

    fn y(&self, v: f64) -> f32 {
        let t = ((v - self.min) / (self.max - self.min)) as f32;
        self.bottom - t * (self.bottom - self.top)
    }

    fn slot(&self, i: usize, n: usize) -> (f32, f32) {
        let w = (self.right - self.left) / n.max(1) as f32;
        (self.left + w * i as f32, w)
    }
}

fn fill_rect(img: &mut RgbaImage, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (xa, xb) = (x0.min(x1).round() as i64, x0.max(x1).round() as i64);
    let (ya, yb) = (y0.min(y1).round() as i64, y0.max(y1).round() as i64);
    for y in ya.max(0)..yb.min(h) {
        for x in xa.max(0)..xb.min(w) {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn draw_line(img: &mut RgbaImage, from: (f32, f32), to: (f32, f32), thickness: f32, color: Rgba<u8>) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as usize;
    let r = thickness / 2.0;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = from.0 + (to.0 - from.0) * t;
        let y = from.1 + (to.1 - from.1) * t;
        fill_rect(img, x - r, y - r, x + r, y + r, color);
    }
}

fn draw_axes(img: &mut RgbaImage, plot: &Plot, grid: bool) {
    if grid {
        for step in 1..=4 {
            let v = plot.min + (plot.max - plot.min) * step as f64 / 4.0;
            let y = plot.y(v);
            draw_line(img, (plot.left, y), (plot.right, y), 1.0, GRID);
        }
    }
    let zero = plot.y(0.0);
    draw_line(img, (plot.left, plot.top), (plot.left, plot.bottom), 1.5, AXIS);
    draw_line(img, (plot.left, zero), (plot.right, zero), 1.5, AXIS);
}

fn point_centers(plot: &Plot, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let (x, w) = plot.slot(i, n);
            x + w / 2.0
        })
        .collect()
}

fn render_bars(img: &mut RgbaImage, plot: &Plot, n: usize, series: &[Series]) {
    let groups = series.len().max(1) as f32;
    for i in 0..n {
        let (x, w) = plot.slot(i, n);
        let bar_w = w * 0.7 / groups;
        let start = x + w * 0.15;
        for (si, s) in series.iter().enumerate() {
            let Some(&v) = s.values.get(i) else { continue };
            let bx = start + bar_w * si as f32;
            fill_rect(img, bx, plot.y(0.0), bx + bar_w, plot.y(v), s.color);
        }
    }
}

fn render_lines(img: &mut RgbaImage, plot: &Plot, n: usize, series: &[Series], area: bool) {
    let xs = point_centers(plot, n);
    for s in series {
        let pts: Vec<(f32, f32)> = xs.iter().zip(&s.values).map(|(&x, &v)| (x, plot.y(v))).collect();
        if area {
            let [r, g, b, _] = s.color.0;
            let fill = Rgba([
                ((r as u16 + 2 * 255) / 3) as u8,
                ((g as u16 + 2 * 255) / 3) as u8,
                ((b as u16 + 2 * 255) / 3) as u8,
                255,
            ]);
            for pair in pts.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let steps = (b.0 - a.0).ceil().max(1.0) as usize;
                for i in 0..steps {
                    let t = i as f32 / steps as f32;
                    let x = a.0 + (b.0 - a.0) * t;
                    let y = a.1 + (b.1 - a.1) * t;
                    fill_rect(img, x, y, x + 1.0, plot.y(0.0), fill);
                }
            }
        }
        for pair in pts.windows(2) {
            draw_line(img, pair[0], pair[1], 2.0, s.color);
        }
        if !area {
            for &(x, y) in &pts {
                fill_rect(img, x - 3.0, y - 3.0, x + 3.0, y + 3.0, s.color);
            }
        }
    }
}

fn render_scatter(img: &mut RgbaImage, plot: &Plot, n: usize, series: &[Series]) {
    let xs = point_centers(plot, n);
    for s in series {
        for (&x, &v) in xs.iter().zip(&s.values) {
            let y = plot.y(v);
            let r = 4.0f32;
            for dy in -4i32..=4 {
                for dx in -4i32..=4 {
                    if ((dx * dx + dy * dy) as f32) <= r * r {
                        fill_rect(img, x + dx as f32, y + dy as f32, x + dx as f32 + 1.0, y + dy as f32 + 1.0, s.color);
                    }
                }
            }
        }
    }
}

fn render_pie(img: &mut RgbaImage, chart: &ChartBlock, data: &DataTable) -> Result<(), String> {
    let (Some(labels), Some(values)) = (chart.labels.as_deref(), chart.values.as_deref()) else {
        return Err("Pie chart requires 'labels' and 'values'".to_string());
    };
    if data.column(labels).is_none() {
        return Err(format!("column '{labels}' not found in data source"));
    }
    let values = numeric_column(data, values)?;
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    if total <= 0.0 {
        return Err("Pie chart needs at least one positive value".to_string());
    }
    let (w, h) = (img.width() as f32, img.height() as f32);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let radius = w.min(h) * 0.42;
    let mut bounds = Vec::with_capacity(values.len());
    let mut acc = 0.0f64;
    for v in &values {
        acc += v.max(0.0) / total;
        bounds.push(acc);
    }
    for y in 0..img.height() {
        for x in 0..img.width() {
            let (dx, dy) = (x as f32 + 0.5 - cx, cy - (y as f32 + 0.5));
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            // Counter-clockwise from 12 o'clock, like matplotlib with startangle=90.
            let angle = (dx.atan2(dy).to_degrees() * -1.0).rem_euclid(360.0) as f64 / 360.0;
            let slice = bounds.iter().position(|&b| angle < b).unwrap_or(values.len() - 1);
            img.put_pixel(x, y, series_color(chart, slice));
        }
    }
    Ok(())
}

impl ChartRenderer for RasterChartRenderer {
    fn render(&self, chart: &ChartBlock, data: &DataTable) -> Result<RgbaImage, String> {
        let px = |inches: f32| ((inches * self.dpi).round() as u32).clamp(16, 4000);
        let mut img = RgbaImage::from_pixel(px(chart.width), px(chart.height), BACKGROUND);
        if chart.chart_type == ChartKind::Pie {
            render_pie(&mut img, chart, data)?;
            return Ok(img);
        }
        let (n, series) = xy_series(chart, data)?;
        let plot = Plot::new(&img, &series);
        draw_axes(&mut img, &plot, chart.grid);
        match chart.chart_type {
            ChartKind::Bar => render_bars(&mut img, &plot, n, &series),
            ChartKind::Line => render_lines(&mut img, &plot, n, &series, false),
            ChartKind::Area => render_lines(&mut img, &plot, n, &series, true),
            ChartKind::Scatter => render_scatter(&mut img, &plot, n, &series),
            ChartKind::Pie => {}
        }
        Ok(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OneOrMany;

    fn sales() -> DataTable {
        DataTable {
            columns: vec!["month".into(), "revenue".into()],
            rows: vec![
                vec!["Jan".into(), "120".into()],
                vec!["Feb".into(), "1,350".into()],
            ],
        }
    }

    fn chart(kind: ChartKind) -> ChartBlock {
        serde_json::from_value(serde_json::json!({
            "chartType": format!("{kind:?}").to_lowercase(),
            "dataSource": "sales",
            "xAxis": "month",
            "yAxis": "revenue",
            "labels": "month",
            "values": "revenue",
            "width": 2,
            "height": 1
        }))
        .unwrap()
    }

    #[test]
    fn renders_every_kind_at_requested_size() {
        let r = RasterChartRenderer::default();
        for kind in [ChartKind::Bar, ChartKind::Line, ChartKind::Area, ChartKind::Scatter, ChartKind::Pie] {
            let img = r.render(&chart(kind), &sales()).unwrap();
            assert_eq!(img.dimensions(), (200, 100));
        }
    }

    #[test]
    fn missing_column_is_reported() {
        let mut c = chart(ChartKind::Bar);
        c.y_axis = Some(OneOrMany::One("profit".into()));
        let err = RasterChartRenderer::default().render(&c, &sales()).unwrap_err();
        assert!(err.contains("profit"));
    }
}
