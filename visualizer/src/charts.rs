//! Bar, histogram, scatter and heatmap panels.

use crate::style::{gradient, COOLWARM, FONT, LABEL_SIZE, TITLE_SIZE, YLORRD};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

/// Lower edge of every log-scaled axis, so single counts stay visible.
const LOG_FLOOR: f64 = 0.5;
const COLORBAR_STEPS: usize = 50;

pub type DrawResult<DB> = Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

/// Equal-width histogram bins.
#[derive(Debug, Clone, PartialEq)]
pub struct Bins {
    pub low: f64,
    pub width: f64,
    pub counts: Vec<usize>,
}

impl Bins {
    pub fn high(&self) -> f64 {
        self.low + self.width * self.counts.len() as f64
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Histogram over `bins` equal-width bins spanning the data. A constant
/// input is centred in a unit-wide range.
pub fn histogram(values: &[f64], bins: usize) -> Bins {
    let bins = bins.max(1);
    let mut counts = vec![0; bins];
    if values.is_empty() {
        return Bins {
            low: 0.0,
            width: 1.0 / bins as f64,
            counts,
        };
    }

    let mut low = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if high - low <= f64::EPSILON {
        low -= 0.5;
        high += 0.5;
    }
    let width = (high - low) / bins as f64;
    for &value in values {
        let bin = (((value - low) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    Bins { low, width, counts }
}

fn label_at<'a>(labels: &'a [String], value: &SegmentValue<u32>) -> &'a str {
    match value {
        SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
            labels.get(*i as usize).map(String::as_str).unwrap_or("")
        }
        SegmentValue::Last => "",
    }
}

fn slots(count: usize) -> u32 {
    count.max(1) as u32
}

fn centered_label() -> TextStyle<'static> {
    TextStyle::from((FONT, LABEL_SIZE).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom))
}

/// One bar per label on a logarithmic count axis.
pub fn log_bars<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    y_desc: &str,
    labels: &[String],
    values: &[f64],
    color: RGBColor,
) -> DrawResult<DB> {
    let max = values.iter().copied().fold(1.0, f64::max);
    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(
            (0u32..slots(labels.len())).into_segmented(),
            (LOG_FLOOR..max * 2.0).log_scale(),
        )?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len() + 1)
        .x_label_formatter(&|v| label_at(labels, v).to_string())
        .y_desc(y_desc)
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(color.mix(0.85).filled())
            .margin(6)
            .baseline(LOG_FLOOR)
            .data(values.iter().enumerate().map(|(i, &v)| (i as u32, v))),
    )?;
    Ok(())
}

/// Histogram panel with a logarithmic frequency axis.
pub fn log_histogram<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    x_desc: &str,
    bins: &Bins,
    color: RGBColor,
) -> DrawResult<DB> {
    let max = (bins.max_count() as f64).max(1.0);
    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(55)
        .build_cartesian_2d(bins.low..bins.high(), (LOG_FLOOR..max * 2.0).log_scale())?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Frequency")
        .draw()?;

    let fill = color.mix(0.7).filled();
    chart.draw_series(
        bins.counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(i, &count)| {
                let left = bins.low + bins.width * i as f64;
                Rectangle::new([(left, LOG_FLOOR), (left + bins.width, count as f64)], fill)
            }),
    )?;
    Ok(())
}

/// Linear bars with the value printed above each one.
pub fn count_bars<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    labels: &[String],
    values: &[f64],
    color: RGBColor,
) -> DrawResult<DB> {
    let max = values.iter().copied().fold(1.0, f64::max);
    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d((0u32..slots(labels.len())).into_segmented(), 0.0..max * 1.15)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len() + 1)
        .x_label_formatter(&|v| label_at(labels, v).to_string())
        .y_desc("Count")
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(color.mix(0.85).filled())
            .margin(6)
            .data(values.iter().enumerate().map(|(i, &v)| (i as u32, v))),
    )?;

    let style = centered_label();
    chart.draw_series(values.iter().enumerate().map(|(i, &v)| {
        Text::new(
            format!("{}", v.round() as u64),
            (SegmentValue::CenterOf(i as u32), v),
            style.clone(),
        )
    }))?;
    Ok(())
}

/// Two-segment stacked bars; `stacks[i] = (lower, upper)`.
pub fn stacked_bars<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    labels: &[String],
    stacks: &[(f64, f64)],
    series: [(&str, RGBColor); 2],
) -> DrawResult<DB> {
    let max = stacks.iter().map(|(a, b)| a + b).fold(0.0, f64::max);
    let top = if max > 0.0 { max * 1.1 } else { 1.0 };
    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d((0u32..slots(labels.len())).into_segmented(), 0.0..top)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len() + 1)
        .x_label_formatter(&|v| label_at(labels, v).to_string())
        .x_desc("User")
        .y_desc("PageRank")
        .draw()?;

    // The full stack goes down first; the lower segment is painted over it.
    let [(lower_name, lower_color), (upper_name, upper_color)] = series;
    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(upper_color.filled())
                .margin(8)
                .data(stacks.iter().enumerate().map(|(i, (a, b))| (i as u32, a + b))),
        )?
        .label(upper_name)
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], upper_color.filled()));
    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(lower_color.filled())
                .margin(8)
                .data(stacks.iter().enumerate().map(|(i, (a, _))| (i as u32, *a))),
        )?
        .label(lower_name)
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], lower_color.filled()));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub radius: i32,
    /// Position on the colour scale, in `[0, 1]`.
    pub shade: f64,
    pub label: Option<String>,
}

pub struct Axes<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    pub scale_desc: &'a str,
}

/// Scatter on axes from 0 to the largest coordinate, shaded blue to red,
/// with a colour bar on the right.
pub fn scatter<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    axes: &Axes<'_>,
    points: &[ScatterPoint],
) -> DrawResult<DB> {
    let (width, _) = area.dim_in_pixel();
    let (plot_area, bar_area) = area.split_horizontally((width as i32 - 110).max(1));

    let extent = |value: f64| if value > 0.0 { value * 1.1 } else { 1.0 };
    let max_x = extent(points.iter().map(|p| p.x).fold(0.0, f64::max));
    let max_y = extent(points.iter().map(|p| p.y).fold(0.0, f64::max));

    let mut chart = ChartBuilder::on(&plot_area)
        .caption(axes.title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..max_x, 0.0..max_y)?;

    chart
        .configure_mesh()
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .draw()?;

    chart.draw_series(points.iter().map(|p| {
        Circle::new(
            (p.x, p.y),
            p.radius,
            gradient(&COOLWARM, p.shade).mix(0.7).filled(),
        )
    }))?;

    let text = TextStyle::from((FONT, LABEL_SIZE).into_font());
    chart.draw_series(points.iter().filter_map(|p| {
        let label = p.label.as_ref()?;
        Some(EmptyElement::at((p.x, p.y)) + Text::new(label.clone(), (5, -15), text.clone()))
    }))?;

    colorbar(&bar_area, axes.scale_desc)
}

fn colorbar<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, desc: &str) -> DrawResult<DB> {
    let mut bar = ChartBuilder::on(area)
        .margin_top(45)
        .margin_bottom(55)
        .margin_right(10)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..1.0, 0.0..1.0)?;

    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_labels(6)
        .y_desc(desc)
        .draw()?;

    let step = 1.0 / COLORBAR_STEPS as f64;
    bar.draw_series((0..COLORBAR_STEPS).map(|i| {
        let low = step * i as f64;
        Rectangle::new(
            [(0.0, low), (1.0, low + step)],
            gradient(&COOLWARM, low + step / 2.0).filled(),
        )
    }))?;
    Ok(())
}

/// Annotated count matrix, the first row at the top.
pub fn heatmap<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    axes: &Axes<'_>,
    rows: &[String],
    columns: &[String],
    matrix: &[Vec<f64>],
) -> DrawResult<DB> {
    let max = matrix.iter().flatten().copied().fold(0.0, f64::max);
    let row_count = rows.len() as u32;
    // Screen rows run bottom-up, so row labels are looked up in reverse.
    let flipped: Vec<String> = rows.iter().rev().cloned().collect();

    let mut chart = ChartBuilder::on(area)
        .caption(axes.title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(120)
        .build_cartesian_2d(
            (0u32..slots(columns.len())).into_segmented(),
            (0u32..slots(rows.len())).into_segmented(),
        )?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(columns.len() + 1)
        .y_labels(rows.len() + 1)
        .x_label_formatter(&|v| label_at(columns, v).to_string())
        .y_label_formatter(&|v| label_at(&flipped, v).to_string())
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .draw()?;

    let cells: Vec<(u32, u32, f64)> = matrix
        .iter()
        .enumerate()
        .flat_map(|(r, row)| {
            let y = row_count - 1 - r as u32;
            row.iter().enumerate().map(move |(c, &v)| (c as u32, y, v))
        })
        .collect();

    chart.draw_series(cells.iter().map(|&(x, y, value)| {
        let shade = if max > 0.0 { value / max } else { 0.0 };
        Rectangle::new(
            [
                (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
            ],
            gradient(&YLORRD, shade).filled(),
        )
    }))?;

    let text = TextStyle::from((FONT, LABEL_SIZE).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(cells.iter().map(|&(x, y, value)| {
        Text::new(
            format!("{}", value.round() as u64),
            (SegmentValue::CenterOf(x), SegmentValue::CenterOf(y)),
            text.clone(),
        )
    }))?;
    Ok(())
}
