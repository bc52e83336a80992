pub mod color;
pub mod grid;

pub use color::{normalize_signal, signal_color, ColorBand, SignalColor};
pub use grid::{build_cells, GridCell, HeatmapOptions, DEFAULT_MAX_CELLS};
