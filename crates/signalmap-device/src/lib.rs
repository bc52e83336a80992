pub mod error;
pub mod events;
pub mod favorites;
pub mod listing;
pub mod model;
pub mod port;
pub mod registry;
pub mod session;
pub mod simulator;

pub use error::{DeviceError, Result};
pub use events::{EventBus, EventSink, RegistryEvent, ScanEvent};
pub use favorites::{Entitlement, FavoriteStore, Favorites, InMemoryFavoriteStore, StaticEntitlement, Unlocked};
pub use listing::{DeviceListing, ListingFilter};
pub use model::{
    signal_level, AdapterState, ConnectionState, DeviceRecord, DiscoveryEvent, FavoriteDevice,
    UNKNOWN_DEVICE_NAME,
};
pub use port::{Connector, DiscoverySource, LocationSource};
pub use registry::{DeviceRegistry, RegistryPolicy, UpdateOutcome};
pub use session::ScanSession;
