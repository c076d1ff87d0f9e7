use std::collections::HashSet;

use tracing::{debug, warn};

use crate::models::{Contour, GridPoint, SENSITIVITY_GRID_SIZE, SensitivityGrid};

/// Default alpha at or below which a cell is part of a sensitive region
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Upper bound on walk iterations: every cell entered from every side,
/// each entry testing at most four sides.
const MAX_WALK_STEPS: usize = 4 * 4 * SENSITIVITY_GRID_SIZE * SENSITIVITY_GRID_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn clockwise(self) -> Self {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }

    pub fn opposite(self) -> Self {
        self.clockwise().clockwise()
    }

    /// Neighbouring cell in this direction, None when it would leave the grid
    fn neighbor(self, (row, col): (usize, usize)) -> Option<(usize, usize)> {
        let (row, col) = match self {
            Direction::Up => (row.checked_sub(1)?, col),
            Direction::Right => (row, col + 1),
            Direction::Down => (row + 1, col),
            Direction::Left => (row, col.checked_sub(1)?),
        };
        (row < SENSITIVITY_GRID_SIZE && col < SENSITIVITY_GRID_SIZE).then_some((row, col))
    }

    /// The side of cell (row, col) facing this direction, clockwise from start to end
    fn edge(self, (row, col): (usize, usize)) -> (GridPoint, GridPoint) {
        let (x, y) = (col as u32, row as u32);
        let top_left = GridPoint::new(x, y);
        let top_right = GridPoint::new(x + 1, y);
        let bottom_right = GridPoint::new(x + 1, y + 1);
        let bottom_left = GridPoint::new(x, y + 1);
        match self {
            Direction::Up => (top_left, top_right),
            Direction::Right => (top_right, bottom_right),
            Direction::Down => (bottom_right, bottom_left),
            Direction::Left => (bottom_left, top_left),
        }
    }
}

/// Walk state for one contour
struct Walk {
    position: (usize, usize),
    movement: Direction,
    check: Direction,
    path: Vec<GridPoint>,
}

impl Walk {
    /// Start so the first side tested is the first outside side, clockwise from Up.
    /// For a region's top-left cell that side is Up and the walk heads Right.
    /// A cell next to a hole with Up already inside starts against the hole.
    fn start(grid: &SensitivityGrid, position: (usize, usize), threshold: f64) -> Self {
        let outside = Direction::ALL
            .into_iter()
            .find(|&direction| !inside_neighbor(grid, position, direction, threshold))
            .unwrap_or(Direction::Up);
        let movement = outside.clockwise();
        Self {
            position,
            movement,
            check: movement.opposite(),
            path: Vec::new(),
        }
    }

    fn inside_toward(
        &self,
        grid: &SensitivityGrid,
        direction: Direction,
        threshold: f64,
    ) -> Option<(usize, usize)> {
        direction
            .neighbor(self.position)
            .filter(|&(row, col)| grid.is_inside(row, col, threshold))
    }

    /// Append the edge on the `check` side. Returns true once the path is back at its start.
    fn draw_edge(&mut self) -> bool {
        let (from, to) = self.check.edge(self.position);
        if self.path.is_empty() {
            self.path.push(from);
        }
        self.path.push(to);
        self.path.first() == Some(&to)
    }
}

/// A sensitive cell whose four neighbours are all sensitive has no edge to draw.
/// Off-grid counts as outside, so cells on the border never qualify.
fn is_enclosed(grid: &SensitivityGrid, position: (usize, usize), threshold: f64) -> bool {
    Direction::ALL
        .into_iter()
        .all(|direction| inside_neighbor(grid, position, direction, threshold))
}

fn inside_neighbor(
    grid: &SensitivityGrid,
    position: (usize, usize),
    direction: Direction,
    threshold: f64,
) -> bool {
    direction
        .neighbor(position)
        .is_some_and(|(row, col)| grid.is_inside(row, col, threshold))
}

/// Outline every region of cells with `alpha <= threshold`.
///
/// Cells are scanned row by row. Reaching an unvisited cell that is fully
/// enclosed by sensitive cells ends the scan of that row; anything later in
/// the same row is only picked up if a later row reaches it.
pub fn trace(grid: &SensitivityGrid, threshold: f64) -> Vec<Contour> {
    let mut seen = HashSet::new();
    let mut contours = Vec::new();

    for row in 0..SENSITIVITY_GRID_SIZE {
        for col in 0..SENSITIVITY_GRID_SIZE {
            if seen.contains(&(row, col)) || !grid.is_inside(row, col, threshold) {
                continue;
            }
            if is_enclosed(grid, (row, col), threshold) {
                break;
            }
            if let Some(contour) = follow_boundary(grid, (row, col), threshold, &mut seen) {
                contours.push(contour);
            }
        }
    }

    debug!(contours = contours.len(), threshold, "traced sensitivity outlines");
    contours
}

/// Follow the boundary of the region containing `start`, keeping the region
/// on the right. Every cell the walk enters is added to `seen`.
///
/// A walk that comes back to the same (cell, side) without drawing an edge
/// in between is circling inside the region; it ends there and emits nothing.
fn follow_boundary(
    grid: &SensitivityGrid,
    start: (usize, usize),
    threshold: f64,
    seen: &mut HashSet<(usize, usize)>,
) -> Option<Contour> {
    let mut walk = Walk::start(grid, start, threshold);
    let mut since_edge = HashSet::new();
    seen.insert(start);

    for _ in 0..MAX_WALK_STEPS {
        walk.check = walk.check.clockwise();

        match walk.inside_toward(grid, walk.check, threshold) {
            Some(next) => {
                if !since_edge.insert((walk.position, walk.check)) {
                    warn!(?start, "outline walk circled without reaching an edge");
                    return None;
                }
                walk.movement = walk.check;
                walk.position = next;
                walk.check = walk.movement.opposite();
                seen.insert(next);
            }
            None => {
                since_edge.clear();
                if walk.draw_edge() {
                    return Some(Contour::new(walk.path));
                }
            }
        }
    }

    warn!(?start, "outline walk did not return to its start, closing early");
    let first = *walk.path.first()?;
    walk.path.push(first);
    Some(Contour::new(walk.path))
}
