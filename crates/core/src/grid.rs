//! Fixed-size terrain grid and the integer point helpers shared by every
//! generation stage and by the path search.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Cell, Pos, Terrain};

pub const DUNGEON_WIDTH: i32 = 80;
pub const DUNGEON_HEIGHT: i32 = 21;
pub const DUNGEON_CELLS: usize = (DUNGEON_WIDTH * DUNGEON_HEIGHT) as usize;

pub fn in_bounds(pos: Pos) -> bool {
    pos.x >= 0 && pos.y >= 0 && pos.x < DUNGEON_WIDTH && pos.y < DUNGEON_HEIGHT
}

/// True for cells that are not on the outer edge of the grid.
pub fn in_interior(pos: Pos) -> bool {
    pos.x >= 1 && pos.y >= 1 && pos.x < DUNGEON_WIDTH - 1 && pos.y < DUNGEON_HEIGHT - 1
}

pub fn index_of(pos: Pos) -> usize {
    (pos.y * DUNGEON_WIDTH + pos.x) as usize
}

pub fn pos_of(index: usize) -> Pos {
    let index = index as i32;
    Pos { y: index / DUNGEON_WIDTH, x: index % DUNGEON_WIDTH }
}

pub fn center() -> Pos {
    Pos { y: DUNGEON_HEIGHT / 2, x: DUNGEON_WIDTH / 2 }
}

/// Every grid position in row-major order.
pub fn positions() -> impl Iterator<Item = Pos> {
    (0..DUNGEON_CELLS).map(pos_of)
}

/// In-bounds orthogonal neighbours of `pos` accepted by `admissible`.
pub fn neighbors4_where(
    pos: Pos,
    mut admissible: impl FnMut(Pos) -> bool,
) -> impl Iterator<Item = Pos> {
    pos.neighbors4().into_iter().filter(move |&next| in_bounds(next) && admissible(next))
}

/// In-bounds 8-way neighbours of `pos` accepted by `admissible`.
pub fn neighbors8_where(
    pos: Pos,
    mut admissible: impl FnMut(Pos) -> bool,
) -> impl Iterator<Item = Pos> {
    pos.ring8().into_iter().filter(move |&next| in_bounds(next) && admissible(next))
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    cells: Vec<Cell>,
}

impl Grid {
    pub fn filled(terrain: Terrain) -> Self {
        Self { cells: vec![Cell::new(terrain); DUNGEON_CELLS] }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, pos: Pos) -> Cell {
        if !in_bounds(pos) {
            return Cell::new(Terrain::Wall);
        }
        self.cells[index_of(pos)]
    }

    /// Out-of-bounds positions read as wall.
    pub fn terrain(&self, pos: Pos) -> Terrain {
        self.cell(pos).terrain()
    }

    pub fn set(&mut self, pos: Pos, terrain: Terrain) {
        if !in_bounds(pos) {
            return;
        }
        let index = index_of(pos);
        self.cells[index] = self.cells[index].with_terrain(terrain);
    }

    pub fn mark_explored(&mut self, pos: Pos) {
        if in_bounds(pos) {
            let index = index_of(pos);
            self.cells[index] = self.cells[index].explored();
        }
    }

    pub fn is_passable(&self, pos: Pos) -> bool {
        in_bounds(pos) && self.terrain(pos).is_passable()
    }

    pub fn count(&self, terrain: Terrain) -> usize {
        self.cells.iter().filter(|cell| cell.terrain() == terrain).count()
    }

    pub fn count_passable(&self) -> usize {
        self.cells.iter().filter(|cell| cell.terrain().is_passable()).count()
    }

    /// Number of wall-class cells in the 8-ring, counting out-of-bounds as wall.
    pub fn walls_around(&self, pos: Pos) -> u32 {
        pos.ring8().into_iter().filter(|&next| self.terrain(next).is_wall_like()).count() as u32
    }

    pub fn find(&self, terrain: Terrain) -> impl Iterator<Item = Pos> + '_ {
        positions().filter(move |&pos| self.terrain(pos) == terrain)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..DUNGEON_HEIGHT {
            let row: String =
                (0..DUNGEON_WIDTH).map(|x| self.terrain(Pos { y, x }).glyph()).collect();
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grid {{\n{self}}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips_through_position() {
        for pos in [Pos::new(0, 0), Pos::new(79, 0), Pos::new(3, 7), Pos::new(79, 20)] {
            assert_eq!(pos_of(index_of(pos)), pos);
        }
    }

    #[test]
    fn out_of_bounds_reads_as_wall_and_writes_are_ignored() {
        let mut grid = Grid::filled(Terrain::Ground);
        let outside = Pos::new(-1, 4);
        grid.set(outside, Terrain::Ground);
        assert_eq!(grid.terrain(outside), Terrain::Wall);
        assert!(!grid.is_passable(Pos::new(DUNGEON_WIDTH, 0)));
    }

    #[test]
    fn neighbour_enumeration_respects_bounds_and_predicate() {
        let corner: Vec<Pos> = neighbors4_where(Pos::new(0, 0), |_| true).collect();
        assert_eq!(corner, vec![Pos::new(1, 0), Pos::new(0, 1)]);

        let grid = Grid::filled(Terrain::Wall);
        let open: Vec<Pos> = neighbors8_where(Pos::new(5, 5), |p| grid.is_passable(p)).collect();
        assert!(open.is_empty());
        assert_eq!(neighbors8_where(Pos::new(5, 5), |_| true).count(), 8);
    }

    #[test]
    fn walls_around_counts_outside_as_wall() {
        let grid = Grid::filled(Terrain::Ground);
        assert_eq!(grid.walls_around(Pos::new(0, 0)), 5);
        assert_eq!(grid.walls_around(Pos::new(5, 5)), 0);
    }
}
