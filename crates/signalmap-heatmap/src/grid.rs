use serde::{Deserialize, Serialize};
use signalmap_types::{
    meters_per_map_point_at_latitude, GeoCoordinate, MapPoint, MapRect, Sample,
};
use tracing::{debug, warn};

use crate::color::{signal_color, SignalColor};

/// 热力图参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapOptions {
    /// 网格边长（米）
    pub resolution_m: f64,

    /// 包围盒四周的留白（以网格数计）
    pub padding_cells: f64,

    /// 网格数上限，超过时不构建
    pub max_cells: usize,
}

/// 默认网格数上限
pub const DEFAULT_MAX_CELLS: usize = 250_000;

impl Default for HeatmapOptions {
    fn default() -> Self {
        Self {
            resolution_m: 1.0,
            padding_cells: 2.0,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl HeatmapOptions {
    pub fn with_resolution(resolution_m: f64) -> Self {
        Self {
            resolution_m,
            ..Default::default()
        }
    }
}

/// 热力图网格单元
///
/// 每次构建都重新计算，不做持久化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// 闭合多边形的四个角点（左上、右上、右下、左下）
    pub polygon: Vec<GeoCoordinate>,

    /// 单元在投影平面上的范围
    pub bounds: MapRect,

    /// 填充颜色
    pub color: SignalColor,

    /// 标签（最近采样点的信号强度）
    pub label: String,

    /// 最近采样点的信号强度
    pub signal_strength: i32,

    /// 行号（自北向南）
    pub row: usize,

    /// 列号（自西向东）
    pub column: usize,
}

/// 把采样点聚合为均匀网格
///
/// 每个网格取距其中心最近的采样点着色。线性扫描，复杂度 O(网格数 × 采样数)；
/// 采样点数量受注册表的距离门限约束。采样为空、分辨率非法或网格数超过
/// `max_cells` 时返回空列表。
pub fn build_cells(samples: &[Sample], options: &HeatmapOptions) -> Vec<GridCell> {
    if samples.is_empty() {
        return Vec::new();
    }
    if !(options.resolution_m.is_finite() && options.resolution_m > 0.0) {
        debug!(resolution_m = options.resolution_m, "Ignoring invalid heatmap resolution");
        return Vec::new();
    }

    let points: Vec<MapPoint> = samples
        .iter()
        .map(|s| MapPoint::from_coordinate(&s.location))
        .collect();

    let centroid_latitude =
        samples.iter().map(|s| s.location.latitude).sum::<f64>() / samples.len() as f64;
    let step = options.resolution_m / meters_per_map_point_at_latitude(centroid_latitude);

    let bounds = match MapRect::bounding(&points) {
        Some(rect) => rect.expanded(options.padding_cells.max(0.0) * step),
        None => return Vec::new(),
    };

    let columns = ((bounds.width / step).ceil() as usize).max(1);
    let rows = ((bounds.height / step).ceil() as usize).max(1);
    let total = match rows.checked_mul(columns) {
        Some(total) if total <= options.max_cells => total,
        _ => {
            warn!(
                rows,
                columns,
                max_cells = options.max_cells,
                resolution_m = options.resolution_m,
                "Heatmap grid too large, skipped"
            );
            return Vec::new();
        }
    };

    let mut cells = Vec::with_capacity(total);
    for row in 0..rows {
        let y = bounds.min_y() + row as f64 * step;
        let next_y = bounds.min_y() + (row + 1) as f64 * step;
        for column in 0..columns {
            let x = bounds.min_x() + column as f64 * step;
            let next_x = bounds.min_x() + (column + 1) as f64 * step;
            // 相邻单元共用同一条边，避免浮点累加产生缝隙
            let rect = MapRect::new(x, y, next_x - x, next_y - y);

            let Some(nearest) = nearest_sample(&rect.center(), &points, samples) else {
                continue;
            };

            cells.push(GridCell {
                polygon: rect.corners().iter().map(MapPoint::to_coordinate).collect(),
                bounds: rect,
                color: signal_color(nearest.signal_strength),
                label: nearest.signal_strength.to_string(),
                signal_strength: nearest.signal_strength,
                row,
                column,
            });
        }
    }

    debug!(
        samples = samples.len(),
        rows,
        columns,
        cells = cells.len(),
        "Heatmap cells built"
    );

    cells
}

/// 距离相等时取先出现的采样点
fn nearest_sample<'a>(
    center: &MapPoint,
    points: &[MapPoint],
    samples: &'a [Sample],
) -> Option<&'a Sample> {
    let mut best: Option<&Sample> = None;
    let mut best_distance = f64::MAX;
    for (point, sample) in points.iter().zip(samples) {
        let d = point.distance(center);
        if d < best_distance {
            best_distance = d;
            best = Some(sample);
        }
    }
    best
}
