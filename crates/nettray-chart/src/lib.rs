//! Turns a window of reachability samples into chart geometry.
//!
//! Everything here is pure: no state is kept between calls and nothing is
//! drawn. The front end owns a [`ChartWindow`], calls [`render`] after every
//! change and paints the returned [`ChartFrame`].
//!
//! Vertical convention: y grows downwards, as on every canvas we draw to.
//! Lower latency sits nearer the top of the plot area, higher latency nearer
//! the bottom, and unreachable samples sit on a baseline inside the bottom
//! margin, below the plot area.

use std::ops::RangeInclusive;

use nettray_types::{config::ChartConfig, NetTrayError, Result};
use serde::Serialize;

mod scale;
mod window;

pub use scale::{Scale, MIN_SCALE_RANGE, SCALE_PADDING};
pub use window::{ChartWindow, CHART_WINDOW};

const GRID_COLUMNS: usize = 10;
const GRID_ROWS: usize = 5;

/// One sample as seen by the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub index: usize,
    pub is_online: bool,
    pub value: Option<f64>,
}

/// Validated canvas dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartGeometry {
    width: f64,
    height: f64,
    margin_top: f64,
    margin_bottom: f64,
    padding: f64,
}

impl ChartGeometry {
    pub fn new(config: &ChartConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|err| chart_error(format!("invalid chart geometry: {err}")))?;
        Ok(Self {
            width: config.width,
            height: config.height,
            margin_top: config.margin_top,
            margin_bottom: config.margin_bottom,
            padding: config.padding,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn plot_top(&self) -> f64 {
        self.margin_top
    }

    pub fn plot_bottom(&self) -> f64 {
        self.height - self.margin_bottom
    }

    /// Row used for unreachable samples.
    pub fn baseline(&self) -> f64 {
        self.plot_bottom() + self.margin_bottom / 2.0
    }

    fn x_for(&self, index: usize, count: usize) -> f64 {
        let span = self.width - 2.0 * self.padding;
        self.padding + index as f64 / (count - 1) as f64 * span
    }

    fn y_for(&self, scale: &Scale, value: f64) -> f64 {
        self.plot_top() + scale.fraction(value) * (self.plot_bottom() - self.plot_top())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentStatus {
    Reachable,
    Unreachable,
}

impl From<bool> for SegmentStatus {
    fn from(online: bool) -> Self {
        if online {
            SegmentStatus::Reachable
        } else {
            SegmentStatus::Unreachable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlotPoint {
    pub index: usize,
    pub x: f64,
    pub y: f64,
}

/// Maximal run of samples sharing one status, drawn as one polyline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSegment {
    pub status: SegmentStatus,
    pub points: Vec<PlotPoint>,
}

impl ChartSegment {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn indices(&self) -> RangeInclusive<usize> {
        let first = self.points.first().map(|p| p.index).unwrap_or(0);
        let last = self.points.last().map(|p| p.index).unwrap_or(0);
        first..=last
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisLabel {
    pub value: f64,
    pub y: f64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridLine {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct ChartStats {
    /// Latency of the newest sample, if it has one.
    pub current_ms: Option<f64>,
    /// Mean over reachable samples with a latency; `None` when there are none.
    pub average_ms: Option<f64>,
    pub loss_percent: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ChartFrame {
    pub segments: Vec<ChartSegment>,
    pub scale: Option<Scale>,
    pub labels: Vec<AxisLabel>,
    pub stats: ChartStats,
}

impl ChartFrame {
    pub fn scale_min(&self) -> Option<f64> {
        self.scale.map(|s| s.min)
    }

    pub fn scale_max(&self) -> Option<f64> {
        self.scale.map(|s| s.max)
    }
}

/// Builds segments, scale, labels and statistics for `points`.
///
/// `points` must be in chronological order with `index` equal to position.
/// With fewer than two points there is no geometry, only statistics.
pub fn render(points: &[ChartPoint], geometry: &ChartGeometry) -> ChartFrame {
    let stats = stats(points);
    if points.len() < 2 {
        return ChartFrame {
            stats,
            ..Default::default()
        };
    }

    let online_values: Vec<f64> = points
        .iter()
        .filter(|p| p.is_online)
        .filter_map(|p| p.value)
        .collect();
    let scale = Scale::from_values(&online_values);

    let count = points.len();
    let segments = segment_ranges(points)
        .into_iter()
        .map(|range| {
            let status = SegmentStatus::from(points[*range.start()].is_online);
            let plotted = points[range]
                .iter()
                .map(|point| PlotPoint {
                    index: point.index,
                    x: geometry.x_for(point.index, count),
                    y: y_for_point(point, scale.as_ref(), geometry),
                })
                .collect();
            ChartSegment {
                status,
                points: plotted,
            }
        })
        .collect();

    let labels = scale
        .map(|scale| axis_labels(&scale, geometry))
        .unwrap_or_default();

    ChartFrame {
        segments,
        scale,
        labels,
        stats,
    }
}

fn y_for_point(point: &ChartPoint, scale: Option<&Scale>, geometry: &ChartGeometry) -> f64 {
    match (point.is_online, point.value, scale) {
        (true, Some(value), Some(scale)) => geometry.y_for(scale, value),
        // reachable over HTTP only: no latency to place
        (true, None, Some(_)) => geometry.plot_bottom(),
        _ => geometry.baseline(),
    }
}

/// Index ranges of the maximal same-status runs, in order.
pub fn segment_ranges(points: &[ChartPoint]) -> Vec<RangeInclusive<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for i in 1..=points.len() {
        if i == points.len() || points[i].is_online != points[start].is_online {
            ranges.push(start..=i - 1);
            start = i;
        }
    }
    ranges
}

pub fn stats(points: &[ChartPoint]) -> ChartStats {
    let total = points.len();
    let offline = points.iter().filter(|p| !p.is_online).count();
    let latencies: Vec<f64> = points
        .iter()
        .filter(|p| p.is_online)
        .filter_map(|p| p.value)
        .collect();

    ChartStats {
        current_ms: points.last().and_then(|p| p.value),
        average_ms: if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        },
        loss_percent: if total == 0 {
            0.0
        } else {
            offline as f64 * 100.0 / total as f64
        },
        samples: total,
    }
}

fn axis_labels(scale: &Scale, geometry: &ChartGeometry) -> Vec<AxisLabel> {
    let mid = (scale.min + scale.max) / 2.0;
    [scale.min, mid, scale.max]
        .into_iter()
        .map(|value| AxisLabel {
            value,
            y: geometry.y_for(scale, value),
            text: format!("{value:.0} ms"),
        })
        .collect()
}

/// Background grid covering the whole canvas.
pub fn grid_lines(geometry: &ChartGeometry) -> Vec<GridLine> {
    let columns = (0..=GRID_COLUMNS).map(|i| {
        let x = geometry.width * i as f64 / GRID_COLUMNS as f64;
        GridLine {
            x1: x,
            y1: 0.0,
            x2: x,
            y2: geometry.height,
        }
    });
    let rows = (0..=GRID_ROWS).map(|i| {
        let y = geometry.height * i as f64 / GRID_ROWS as f64;
        GridLine {
            x1: 0.0,
            y1: y,
            x2: geometry.width,
            y2: y,
        }
    });
    columns.chain(rows).collect()
}

pub fn chart_error(message: impl Into<String>) -> NetTrayError {
    NetTrayError::Chart(message.into())
}
