use crate::model::Tile;
use crate::MAX_BOARD_DIM;
use std::fmt;

/// A single changed cell between two board states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDiff {
    pub x: u8,
    pub y: u8,
    pub tile: Tile,
}

/// Rectangular arena stored as a row-major flat tile array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: usize,
    height: usize,
    grid: Vec<Tile>,
}

impl Board {
    /// Creates an all-empty board.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero or larger than [`MAX_BOARD_DIM`],
    /// since coordinates must fit in a byte on the wire.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(
            (1..=MAX_BOARD_DIM).contains(&width) && (1..=MAX_BOARD_DIM).contains(&height),
            "board dimensions {width}x{height} out of range"
        );
        Self {
            width,
            height,
            grid: vec![Tile::Empty; width * height],
        }
    }

    /// Builds a board from decoded tiles; `None` if the sizes disagree.
    pub fn from_tiles(width: usize, height: usize, tiles: Vec<Tile>) -> Option<Self> {
        if width == 0
            || height == 0
            || width > MAX_BOARD_DIM
            || height > MAX_BOARD_DIM
            || tiles.len() != width * height
        {
            return None;
        }
        Some(Self {
            width,
            height,
            grid: tiles,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.grid
    }

    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn coord(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    /// Signed bounds check, convenient for neighbour arithmetic.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Tile> {
        if x < self.width && y < self.height {
            Some(self.grid[self.index(x, y)])
        } else {
            None
        }
    }

    /// Writes `tile` at (x, y). Returns false when out of bounds.
    pub fn set(&mut self, x: usize, y: usize, tile: Tile) -> bool {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            self.grid[index] = tile;
            true
        } else {
            false
        }
    }

    /// Position of the first cell holding `tile`, in row-major order.
    pub fn find(&self, tile: Tile) -> Option<(usize, usize)> {
        self.grid
            .iter()
            .position(|t| *t == tile)
            .map(|index| self.coord(index))
    }

    /// Applies diffs in order, ignoring entries outside the board.
    /// Returns the number of cells written.
    pub fn apply_diff(&mut self, diffs: &[TileDiff]) -> usize {
        diffs
            .iter()
            .filter(|d| self.set(d.x as usize, d.y as usize, d.tile))
            .count()
    }

    pub fn replace_with(&mut self, other: &Board) {
        self.width = other.width;
        self.height = other.height;
        self.grid.clone_from(&other.grid);
    }
}

/// Changed cells from `before` to `after`, in row-major scan order.
///
/// Returns `None` when the boards have different dimensions. The returned
/// vector holds exactly as many entries as there are changes.
pub fn diff(before: &Board, after: &Board) -> Option<Vec<TileDiff>> {
    if before.width != after.width || before.height != after.height {
        return None;
    }

    let changed = || {
        before
            .grid
            .iter()
            .zip(&after.grid)
            .enumerate()
            .filter(|(_, (old, new))| old != new)
    };

    let mut diffs = Vec::with_capacity(changed().count());
    for (index, (_, new)) in changed() {
        let (x, y) = after.coord(index);
        diffs.push(TileDiff {
            x: x as u8,
            y: y as u8,
            tile: *new,
        });
    }
    Some(diffs)
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let horizontal: String = std::iter::repeat(Tile::HorizontalBorder.to_char())
            .take(self.width + 2)
            .collect();
        writeln!(f, "{horizontal}")?;
        for row in self.grid.chunks(self.width) {
            let line: String = row.iter().map(|t| t.to_char()).collect();
            let border = Tile::VerticalBorder.to_char();
            writeln!(f, "{border}{line}{border}")?;
        }
        write!(f, "{horizontal}")
    }
}
