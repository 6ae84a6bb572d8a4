//! Macro placement grid.
//!
//! A coarse occupancy grid over the play area. Squads claim a cell as their
//! destination so two squads never settle on the same spot. This is a
//! placement aid, not a navigation mesh: nothing here routes around
//! obstacles.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Grid coordinates of a placement cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    /// Column, along world `x`.
    pub x: u32,
    /// Row, along world `y`.
    pub y: u32,
}

impl GridCoord {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// One grid cell. Validity is fixed at construction; occupancy is the only
/// mutable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementCell {
    position: Vec2Fixed,
    valid: bool,
    occupied: bool,
}

impl PlacementCell {
    /// World position of the cell centre.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.position
    }

    /// Inside the play radius and clear of static obstacles.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Claimed by a squad.
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.occupied
    }

    /// Valid and unclaimed.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.valid && !self.occupied
    }
}

/// Occupancy grid centred on the play area.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementGrid {
    center: Vec2Fixed,
    #[serde(with = "fixed_serde")]
    radius: Fixed,
    width: u32,
    height: u32,
    #[serde(with = "fixed_serde")]
    cell_size: Fixed,
    /// Lower-left corner of the grid.
    origin: Vec2Fixed,
    /// Row-major cells.
    cells: Vec<PlacementCell>,
}

impl PlacementGrid {
    /// Build a grid with no static obstacles.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfiguration`] if the radius is not
    /// positive or either dimension is zero.
    pub fn new(center: Vec2Fixed, radius: Fixed, width: u32, height: u32) -> Result<Self> {
        Self::with_obstacles(center, radius, width, height, |_, _| false)
    }

    /// Build a grid, marking cells invalid where `blocked(cell_centre,
    /// half_cell)` reports a static obstacle.
    ///
    /// Cell size is `2 * radius / max(width, height)`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfiguration`] if the radius is not
    /// positive, either dimension is zero, or the cells would have no size.
    pub fn with_obstacles(
        center: Vec2Fixed,
        radius: Fixed,
        width: u32,
        height: u32,
        blocked: impl Fn(Vec2Fixed, Fixed) -> bool,
    ) -> Result<Self> {
        if width == 0 || height == 0 || radius <= Fixed::ZERO {
            return Err(GameError::InvalidConfiguration {
                name: "placement grid".to_string(),
                reason: format!("radius must be positive and dimensions non-zero (got {width}x{height})"),
            });
        }

        let two = Fixed::from_num(2);
        let cell_size = radius * two / Fixed::from_num(width.max(height));
        if cell_size <= Fixed::ZERO {
            return Err(GameError::InvalidConfiguration {
                name: "placement grid".to_string(),
                reason: format!("radius {radius} is too small for {width}x{height} cells"),
            });
        }
        let half_cell = cell_size / two;
        let origin = Vec2Fixed::new(
            center.x - Fixed::from_num(width) * cell_size / two,
            center.y - Fixed::from_num(height) * cell_size / two,
        );

        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let position = Vec2Fixed::new(
                    origin.x + Fixed::from_num(x) * cell_size + half_cell,
                    origin.y + Fixed::from_num(y) * cell_size + half_cell,
                );
                let valid = position.distance(center) <= radius && !blocked(position, half_cell);
                cells.push(PlacementCell {
                    position,
                    valid,
                    occupied: false,
                });
            }
        }

        tracing::debug!(width, height, cell_size = %cell_size, "Placement grid built");
        Ok(Self {
            center,
            radius,
            width,
            height,
            cell_size,
            origin,
            cells,
        })
    }

    /// Grid centre.
    #[must_use]
    pub const fn center(&self) -> Vec2Fixed {
        self.center
    }

    /// Play radius.
    #[must_use]
    pub const fn radius(&self) -> Fixed {
        self.radius
    }

    /// Width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell edge length in world units.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    fn index(&self, coord: GridCoord) -> Option<usize> {
        (coord.x < self.width && coord.y < self.height)
            .then(|| coord.y as usize * self.width as usize + coord.x as usize)
    }

    /// Cell at grid coordinates.
    #[must_use]
    pub fn cell(&self, coord: GridCoord) -> Option<&PlacementCell> {
        self.index(coord).and_then(|i| self.cells.get(i))
    }

    /// Grid coordinates containing a world position, or `None` outside
    /// the grid.
    #[must_use]
    pub fn cell_at(&self, position: Vec2Fixed) -> Option<GridCoord> {
        let x = ((position.x - self.origin.x) / self.cell_size).floor();
        let y = ((position.y - self.origin.y) / self.cell_size).floor();
        let x = u32::try_from(x.to_num::<i64>()).ok()?;
        let y = u32::try_from(y.to_num::<i64>()).ok()?;
        let coord = GridCoord::new(x, y);
        self.index(coord).map(|_| coord)
    }

    /// Nearest valid, unoccupied cell to a world position.
    ///
    /// The containing cell wins outright when it is available; otherwise
    /// every cell is scanned and the closest centre is returned (first
    /// found on ties, scanning columns then rows).
    #[must_use]
    pub fn nearest_valid_free_cell(&self, position: Vec2Fixed) -> Option<GridCoord> {
        if let Some(coord) = self.cell_at(position) {
            if self.cell(coord).is_some_and(PlacementCell::is_available) {
                return Some(coord);
            }
        }

        let mut best: Option<(GridCoord, Fixed)> = None;
        for x in 0..self.width {
            for y in 0..self.height {
                let coord = GridCoord::new(x, y);
                let Some(cell) = self.cell(coord).filter(|c| c.is_available()) else {
                    continue;
                };
                let dist_sq = cell.position.distance_squared(position);
                if best.map_or(true, |(_, d)| dist_sq < d) {
                    best = Some((coord, dist_sq));
                }
            }
        }
        best.map(|(coord, _)| coord)
    }

    /// Mark a cell claimed or released.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] for coordinates outside the
    /// grid.
    pub fn set_occupied(&mut self, coord: GridCoord, occupied: bool) -> Result<()> {
        let index = self
            .index(coord)
            .ok_or_else(|| GameError::InvalidReference(format!("grid cell {coord:?}")))?;
        if let Some(cell) = self.cells.get_mut(index) {
            cell.occupied = occupied;
        }
        Ok(())
    }

    /// Mark the cell containing a world position claimed or released.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::OutOfBounds`] if the position is outside the
    /// grid.
    pub fn set_occupied_at(&mut self, position: Vec2Fixed, occupied: bool) -> Result<GridCoord> {
        let coord = self
            .cell_at(position)
            .ok_or_else(|| GameError::out_of_bounds(position))?;
        self.set_occupied(coord, occupied)?;
        Ok(coord)
    }

    /// Release every cell.
    pub fn reset_occupied(&mut self) {
        for cell in &mut self.cells {
            cell.occupied = false;
        }
    }

    /// Number of cells currently claimed.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.occupied).count()
    }
}
