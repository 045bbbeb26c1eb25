use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub y: i32,
    pub x: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { y, x }
    }

    pub fn shift(self, dx: i32, dy: i32) -> Self {
        Self { y: self.y + dy, x: self.x + dx }
    }

    pub fn manhattan(self, other: Pos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Orthogonal neighbours in north, east, south, west order.
    pub fn neighbors4(self) -> [Pos; 4] {
        [
            Pos { y: self.y - 1, x: self.x },
            Pos { y: self.y, x: self.x + 1 },
            Pos { y: self.y + 1, x: self.x },
            Pos { y: self.y, x: self.x - 1 },
        ]
    }

    /// The 8-ring in clockwise order starting north. Consecutive entries are
    /// orthogonally adjacent to each other, which the local articulation test
    /// relies on.
    pub fn ring8(self) -> [Pos; 8] {
        [
            Pos { y: self.y - 1, x: self.x },
            Pos { y: self.y - 1, x: self.x + 1 },
            Pos { y: self.y, x: self.x + 1 },
            Pos { y: self.y + 1, x: self.x + 1 },
            Pos { y: self.y + 1, x: self.x },
            Pos { y: self.y + 1, x: self.x - 1 },
            Pos { y: self.y, x: self.x - 1 },
            Pos { y: self.y - 1, x: self.x - 1 },
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Terrain {
    Wall = 0,
    Ground = 1,
    Door = 2,
    Foliage = 3,
    Tree = 4,
    Water = 5,
    Chasm = 6,
    Stairs = 7,
    BlockedStairs = 8,
    FakeStairs = 9,
    Window = 10,
    HoledWall = 11,
    Light = 12,
    Table = 13,
    Barrel = 14,
    MagicStone = 15,
    Artifact = 16,
}

impl Terrain {
    pub const ALL: [Terrain; 17] = [
        Terrain::Wall,
        Terrain::Ground,
        Terrain::Door,
        Terrain::Foliage,
        Terrain::Tree,
        Terrain::Water,
        Terrain::Chasm,
        Terrain::Stairs,
        Terrain::BlockedStairs,
        Terrain::FakeStairs,
        Terrain::Window,
        Terrain::HoledWall,
        Terrain::Light,
        Terrain::Table,
        Terrain::Barrel,
        Terrain::MagicStone,
        Terrain::Artifact,
    ];

    pub fn from_bits(bits: u8) -> Option<Terrain> {
        Terrain::ALL.get(usize::from(bits)).copied()
    }

    /// Baseline movement rule: no levitation, digging or squeezing.
    pub fn is_passable(self) -> bool {
        matches!(
            self,
            Terrain::Ground
                | Terrain::Door
                | Terrain::Foliage
                | Terrain::Water
                | Terrain::Stairs
                | Terrain::BlockedStairs
                | Terrain::FakeStairs
                | Terrain::Barrel
                | Terrain::MagicStone
                | Terrain::Artifact
        )
    }

    pub fn is_wall_like(self) -> bool {
        matches!(self, Terrain::Wall | Terrain::Window | Terrain::HoledWall)
    }

    pub fn is_descent(self) -> bool {
        matches!(self, Terrain::Stairs | Terrain::BlockedStairs)
    }

    pub fn glyph(self) -> char {
        match self {
            Terrain::Wall => '#',
            Terrain::Ground => '.',
            Terrain::Door => '+',
            Terrain::Foliage => '"',
            Terrain::Tree => 'T',
            Terrain::Water => '~',
            Terrain::Chasm => ':',
            Terrain::Stairs => '>',
            Terrain::BlockedStairs => '*',
            Terrain::FakeStairs => 'z',
            Terrain::Window => '=',
            Terrain::HoledWall => 'o',
            Terrain::Light => '%',
            Terrain::Table => 'n',
            Terrain::Barrel => '&',
            Terrain::MagicStone => '_',
            Terrain::Artifact => '$',
        }
    }
}

const EXPLORED_BIT: u8 = 0x80;

/// Terrain tag and explored flag packed into one byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cell(u8);

impl Cell {
    pub fn new(terrain: Terrain) -> Self {
        Cell(terrain as u8)
    }

    pub fn terrain(self) -> Terrain {
        Terrain::from_bits(self.0 & !EXPLORED_BIT).unwrap_or(Terrain::Wall)
    }

    pub fn with_terrain(self, terrain: Terrain) -> Self {
        Cell((self.0 & EXPLORED_BIT) | terrain as u8)
    }

    pub fn is_explored(self) -> bool {
        self.0 & EXPLORED_BIT != 0
    }

    pub fn explored(self) -> Self {
        Cell(self.0 | EXPLORED_BIT)
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::new(Terrain::Wall)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let explored = if self.is_explored() { ", explored" } else { "" };
        write!(f, "Cell({:?}{explored})", self.terrain())
    }
}

/// Overall cave style of a depth, which selects the carver and room budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaveLayout {
    AutomataCave,
    RandomWalkCave,
    RandomWalkTreeCave,
    RandomSmallWalkCaveUrbanised,
}

impl CaveLayout {
    pub const ALL: [CaveLayout; 4] = [
        CaveLayout::AutomataCave,
        CaveLayout::RandomWalkCave,
        CaveLayout::RandomWalkTreeCave,
        CaveLayout::RandomSmallWalkCaveUrbanised,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CaveLayout::AutomataCave => "automata_cave",
            CaveLayout::RandomWalkCave => "random_walk_cave",
            CaveLayout::RandomWalkTreeCave => "random_walk_tree_cave",
            CaveLayout::RandomSmallWalkCaveUrbanised => "random_small_walk_cave_urbanised",
        }
    }
}

impl FromStr for CaveLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaveLayout::ALL
            .into_iter()
            .find(|layout| layout.name() == s)
            .ok_or_else(|| format!("unknown cave layout `{s}`"))
    }
}

impl fmt::Display for CaveLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
