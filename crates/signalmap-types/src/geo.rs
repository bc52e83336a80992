use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 投影平面的世界边长（地图点），与常见地图 SDK 的 Web Mercator 平面一致
pub const MAP_WORLD_SIZE: f64 = 268_435_456.0;

/// 赤道周长（米，WGS84 长半轴）
const EARTH_CIRCUMFERENCE_M: f64 = 2.0 * PI * 6_378_137.0;

/// Web Mercator 可表示的最大纬度
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// 地理坐标（WGS84，单位：度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    /// 纬度
    pub latitude: f64,
    /// 经度
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// 投影平面上的距离（米）
    ///
    /// 在两点平均纬度处把地图点换算为米，与热力图网格使用同一投影，
    /// 米级距离内与大圆距离的误差可以忽略。
    pub fn planar_distance_m(&self, other: &GeoCoordinate) -> f64 {
        let a = MapPoint::from_coordinate(self);
        let b = MapPoint::from_coordinate(other);
        let mid_latitude = (self.latitude + other.latitude) / 2.0;
        a.distance(&b) * meters_per_map_point_at_latitude(mid_latitude)
    }
}

/// 投影平面上的点（地图点）
///
/// x 向东增长，y 向南增长。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
}

impl MapPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 地理坐标 -> 地图点
    pub fn from_coordinate(coordinate: &GeoCoordinate) -> Self {
        let latitude = coordinate.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let x = (coordinate.longitude + 180.0) / 360.0 * MAP_WORLD_SIZE;
        let sin_lat = latitude.to_radians().sin();
        let y = (0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI)) * MAP_WORLD_SIZE;
        Self { x, y }
    }

    /// 地图点 -> 地理坐标
    pub fn to_coordinate(&self) -> GeoCoordinate {
        let longitude = self.x / MAP_WORLD_SIZE * 360.0 - 180.0;
        let n = PI - 2.0 * PI * self.y / MAP_WORLD_SIZE;
        let latitude = n.sinh().atan().to_degrees();
        GeoCoordinate {
            latitude,
            longitude,
        }
    }

    /// 平面欧氏距离（地图点）
    pub fn distance(&self, other: &MapPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// 投影平面上的轴对齐矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl MapRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 包含所有点的最小矩形，点集为空时返回 None
    pub fn bounding(points: &[MapPoint]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// 四周各扩展 `amount`
    pub fn expanded(&self, amount: f64) -> Self {
        Self::new(
            self.x - amount,
            self.y - amount,
            self.width + 2.0 * amount,
            self.height + 2.0 * amount,
        )
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> MapPoint {
        MapPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// 四个角点，顺序：左上、右上、右下、左下
    pub fn corners(&self) -> [MapPoint; 4] {
        [
            MapPoint::new(self.min_x(), self.min_y()),
            MapPoint::new(self.max_x(), self.min_y()),
            MapPoint::new(self.max_x(), self.max_y()),
            MapPoint::new(self.min_x(), self.max_y()),
        ]
    }

    pub fn contains(&self, point: &MapPoint) -> bool {
        point.x >= self.min_x()
            && point.x <= self.max_x()
            && point.y >= self.min_y()
            && point.y <= self.max_y()
    }
}

/// 指定纬度处每个地图点对应的米数
///
/// Web Mercator 不是等积投影，离赤道越远一个地图点代表的地面距离越短。
pub fn meters_per_map_point_at_latitude(latitude: f64) -> f64 {
    let latitude = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    EARTH_CIRCUMFERENCE_M * latitude.to_radians().cos() / MAP_WORLD_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_origin() {
        let p = MapPoint::from_coordinate(&GeoCoordinate::new(0.0, 0.0));
        assert!((p.x - MAP_WORLD_SIZE / 2.0).abs() < 1e-6);
        assert!((p.y - MAP_WORLD_SIZE / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_projection_inverse() {
        let c = GeoCoordinate::new(40.1650, -105.1147);
        let back = MapPoint::from_coordinate(&c).to_coordinate();
        assert!((back.latitude - c.latitude).abs() < 1e-9);
        assert!((back.longitude - c.longitude).abs() < 1e-9);
    }

    #[test]
    fn test_meters_per_map_point() {
        let equator = meters_per_map_point_at_latitude(0.0);
        assert!((equator - 0.149_291).abs() < 1e-5);

        // 60° 纬度处约为赤道的一半
        let sixty = meters_per_map_point_at_latitude(60.0);
        assert!((sixty / equator - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_planar_distance_matches_ground_distance() {
        // 纬度差 1e-5 度约为 1.11 米
        let a = GeoCoordinate::new(40.1650, -105.1147);
        let b = GeoCoordinate::new(40.16501, -105.1147);
        let d = a.planar_distance_m(&b);
        assert!((d - 1.113).abs() < 0.01, "distance was {}", d);

        assert_eq!(a.planar_distance_m(&a), 0.0);
    }

    #[test]
    fn test_bounding_rect() {
        assert!(MapRect::bounding(&[]).is_none());

        let rect = MapRect::bounding(&[
            MapPoint::new(3.0, 4.0),
            MapPoint::new(-1.0, 10.0),
            MapPoint::new(2.0, 6.0),
        ])
        .unwrap();
        assert_eq!(rect, MapRect::new(-1.0, 4.0, 4.0, 6.0));

        let padded = rect.expanded(1.0);
        assert_eq!(padded.min_x(), -2.0);
        assert_eq!(padded.max_y(), 11.0);
        assert!(padded.contains(&MapPoint::new(-2.0, 3.0)));
    }
}
