use chrono::{Duration, Utc};
use signalmap_heatmap::{build_cells, ColorBand, GridCell, HeatmapOptions};
use signalmap_types::{meters_per_map_point_at_latitude, GeoCoordinate, MapPoint, MapRect, Sample};
use std::collections::HashMap;

/// 一段步行轨迹上的采样
fn walk_samples() -> Vec<Sample> {
    let start = Utc::now();
    [
        (40.16500, -105.11470, -51),
        (40.16510, -105.11470, -70),
        (40.16510, -105.11475, -75),
        (40.16505, -105.11477, -70),
        (40.16500, -105.11475, -62),
    ]
    .iter()
    .enumerate()
    .map(|(i, &(lat, lon, rssi))| {
        Sample::new(
            GeoCoordinate::new(lat, lon),
            rssi,
            start + Duration::seconds(i as i64 * 2),
        )
    })
    .collect()
}

fn index_cells(cells: &[GridCell]) -> HashMap<(usize, usize), &GridCell> {
    cells.iter().map(|c| ((c.row, c.column), c)).collect()
}

/// 网格覆盖留白后的包围盒，且相邻单元无缝隙、无重叠
#[test]
fn test_grid_covers_padded_bounds_without_gaps() {
    let samples = walk_samples();
    let options = HeatmapOptions::default();
    let cells = build_cells(&samples, &options);
    assert!(!cells.is_empty());

    let rows = cells.iter().map(|c| c.row).max().unwrap() + 1;
    let columns = cells.iter().map(|c| c.column).max().unwrap() + 1;
    assert_eq!(cells.len(), rows * columns);

    let by_pos = index_cells(&cells);
    assert_eq!(by_pos.len(), cells.len(), "duplicate cell positions");

    for row in 0..rows {
        for column in 0..columns {
            let cell = by_pos[&(row, column)];
            if column + 1 < columns {
                let right = by_pos[&(row, column + 1)];
                assert_eq!(cell.bounds.max_x(), right.bounds.min_x());
                assert_eq!(cell.bounds.min_y(), right.bounds.min_y());
            }
            if row + 1 < rows {
                let below = by_pos[&(row + 1, column)];
                assert_eq!(cell.bounds.max_y(), below.bounds.min_y());
                assert_eq!(cell.bounds.min_x(), below.bounds.min_x());
            }
        }
    }

    // 重算留白包围盒
    let points: Vec<MapPoint> = samples
        .iter()
        .map(|s| MapPoint::from_coordinate(&s.location))
        .collect();
    let centroid_latitude =
        samples.iter().map(|s| s.location.latitude).sum::<f64>() / samples.len() as f64;
    let step = options.resolution_m / meters_per_map_point_at_latitude(centroid_latitude);
    let padded = MapRect::bounding(&points).unwrap().expanded(2.0 * step);

    let first = by_pos[&(0, 0)];
    let last = by_pos[&(rows - 1, columns - 1)];
    assert!((first.bounds.min_x() - padded.min_x()).abs() < 1e-6);
    assert!((first.bounds.min_y() - padded.min_y()).abs() < 1e-6);
    assert!(last.bounds.max_x() >= padded.max_x() - 1e-6);
    assert!(last.bounds.max_y() >= padded.max_y() - 1e-6);
}

#[test]
fn test_every_label_comes_from_a_sample() {
    let samples = walk_samples();
    let cells = build_cells(&samples, &HeatmapOptions::default());
    let rssi: Vec<i32> = samples.iter().map(|s| s.signal_strength).collect();

    for cell in &cells {
        assert!(rssi.contains(&cell.signal_strength));
        assert_eq!(cell.label, cell.signal_strength.to_string());
    }

    // -51 是最强的采样点，所在单元应为红色
    let strongest = MapPoint::from_coordinate(&samples[0].location);
    let home = cells
        .iter()
        .find(|c| c.bounds.contains(&strongest))
        .unwrap();
    assert_eq!(home.signal_strength, -51);
    assert_eq!(home.color.band, ColorBand::Red);
}

#[test]
fn test_polygon_corners_round_trip_to_bounds() {
    let samples = walk_samples();
    let cells = build_cells(&samples, &HeatmapOptions::with_resolution(3.0));

    for cell in cells.iter().take(10) {
        let top_left = MapPoint::from_coordinate(&cell.polygon[0]);
        let bottom_right = MapPoint::from_coordinate(&cell.polygon[2]);
        assert!((top_left.x - cell.bounds.min_x()).abs() < 1e-3);
        assert!((top_left.y - cell.bounds.min_y()).abs() < 1e-3);
        assert!((bottom_right.x - cell.bounds.max_x()).abs() < 1e-3);
        assert!((bottom_right.y - cell.bounds.max_y()).abs() < 1e-3);
        // 北边纬度大于南边
        assert!(cell.polygon[0].latitude > cell.polygon[3].latitude);
    }
}

#[test]
fn test_coarser_resolution_produces_fewer_cells() {
    let samples = walk_samples();
    let fine = build_cells(&samples, &HeatmapOptions::with_resolution(1.0));
    let coarse = build_cells(&samples, &HeatmapOptions::with_resolution(4.0));
    assert!(coarse.len() < fine.len());
}
