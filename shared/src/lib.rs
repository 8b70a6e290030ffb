pub mod city;
pub mod config;
pub mod geo;
pub mod registry;
pub mod selection;
pub mod tiles;
pub mod viewport;

pub use city::City;
pub use config::{ConfigError, DashboardConfig, MarkerStyle, TileSource};
pub use geo::{LatLng, MapView};
pub use registry::{CityRegistry, RegistryError};
pub use selection::{ResetTicket, ResetToken, SelectionError, SelectionMachine, SelectionState};
pub use tiles::TileKey;
pub use viewport::{ViewCommand, ViewportController, dispatch};
