pub mod fixture;
pub mod grid;

pub use fixture::LightFixture;
pub use grid::{calculate_grid_unit_id, get_grid_position, GridPosition, GridError};
