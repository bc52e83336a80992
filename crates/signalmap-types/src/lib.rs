pub mod device;
pub mod geo;

pub use device::{DeviceId, Sample};
pub use geo::{
    meters_per_map_point_at_latitude, GeoCoordinate, MapPoint, MapRect, MAP_WORLD_SIZE,
};
