//! Room template catalog: ASCII blueprints parsed and validated once, then
//! handed out in random orientations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{GenError, GenResult};
use crate::grid::{DUNGEON_HEIGHT, DUNGEON_WIDTH};
use crate::types::{Pos, Terrain};

use super::progression::{Narrative, SpecialRoom};
use super::seed::GenRng;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryRole {
    Captive,
    Companion,
    Monolith,
}

impl StoryRole {
    pub const ALL: [StoryRole; 3] =
        [StoryRole::Captive, StoryRole::Companion, StoryRole::Monolith];
}

/// Typed marker a template leaves behind for the feature and band passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceKind {
    Door,
    Patrol,
    SpecialPatrol,
    Static,
    SpecialStatic,
    Item,
    Story(StoryRole),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Normal,
    /// Irregular rooms embedded in wild cave; `?` cells keep the cave.
    Cave,
    Special(SpecialRoom),
    Story(Narrative),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateCell {
    Keep,
    Terrain(Terrain),
    /// Ground carrying a place marker.
    Marker(PlaceKind),
    /// Border opening; stamped as wall until a tunnel uses it.
    Entry { virtual_entry: bool },
    /// Door between two parts of the same room.
    InternalDoor,
}

impl TemplateCell {
    fn from_char(ch: char) -> Option<Self> {
        let cell = match ch {
            '#' => TemplateCell::Terrain(Terrain::Wall),
            '.' => TemplateCell::Terrain(Terrain::Ground),
            '"' => TemplateCell::Terrain(Terrain::Foliage),
            'T' => TemplateCell::Terrain(Terrain::Tree),
            '~' => TemplateCell::Terrain(Terrain::Water),
            '?' => TemplateCell::Keep,
            '+' => TemplateCell::Entry { virtual_entry: false },
            '-' => TemplateCell::Entry { virtual_entry: true },
            'P' => TemplateCell::Marker(PlaceKind::Patrol),
            'X' => TemplateCell::Marker(PlaceKind::SpecialPatrol),
            'S' => TemplateCell::Marker(PlaceKind::Static),
            '!' => TemplateCell::Marker(PlaceKind::SpecialStatic),
            'I' => TemplateCell::Marker(PlaceKind::Item),
            'C' => TemplateCell::Marker(PlaceKind::Story(StoryRole::Captive)),
            'F' => TemplateCell::Marker(PlaceKind::Story(StoryRole::Companion)),
            'M' => TemplateCell::Marker(PlaceKind::Story(StoryRole::Monolith)),
            _ => return None,
        };
        Some(cell)
    }

    /// Terrain a cell leaves on the grid, `None` for kept cells.
    pub fn terrain(self) -> Option<Terrain> {
        match self {
            TemplateCell::Keep => None,
            TemplateCell::Terrain(terrain) => Some(terrain),
            TemplateCell::Marker(_) => Some(Terrain::Ground),
            TemplateCell::Entry { .. } => Some(Terrain::Wall),
            TemplateCell::InternalDoor => Some(Terrain::Door),
        }
    }

    fn is_walkable(self) -> bool {
        self.terrain().is_some_and(Terrain::is_passable)
    }
}

/// Static blueprint as written in the catalog.
#[derive(Clone, Copy, Debug)]
pub struct TemplateSource {
    pub name: &'static str,
    pub kind: RoomKind,
    pub rows: &'static [&'static str],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomTemplate {
    pub name: &'static str,
    pub kind: RoomKind,
    pub width: i32,
    pub height: i32,
    cells: Vec<TemplateCell>,
}

impl RoomTemplate {
    pub fn parse(source: &TemplateSource) -> GenResult<Self> {
        let fail =
            |reason: String| GenError::Template { template: source.name.to_string(), reason };

        let height = source.rows.len();
        let width = source.rows.first().map_or(0, |row| row.chars().count());
        if width == 0 {
            return Err(fail("template is empty".to_string()));
        }
        if width > DUNGEON_WIDTH as usize || height > DUNGEON_HEIGHT as usize {
            return Err(fail(format!("{width}x{height} does not fit the dungeon")));
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in source.rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(fail(format!("row {y} is not {width} characters wide")));
            }
            for (x, ch) in row.chars().enumerate() {
                let Some(mut cell) = TemplateCell::from_char(ch) else {
                    return Err(fail(format!("unknown character {ch:?} at ({x}, {y})")));
                };
                let on_border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                match cell {
                    TemplateCell::Entry { virtual_entry: false } if !on_border => {
                        cell = TemplateCell::InternalDoor;
                    }
                    TemplateCell::Entry { virtual_entry: true } if !on_border => {
                        return Err(fail(format!("virtual entry inside the room at ({x}, {y})")));
                    }
                    TemplateCell::Marker(_) if on_border => {
                        return Err(fail(format!("marker {ch:?} on the border at ({x}, {y})")));
                    }
                    _ => {}
                }
                cells.push(cell);
            }
        }

        let template = Self {
            name: source.name,
            kind: source.kind,
            width: width as i32,
            height: height as i32,
            cells,
        };
        template.check_entries().map_err(fail)?;
        template.check_story_roles().map_err(fail)?;
        Ok(template)
    }

    fn check_entries(&self) -> Result<(), String> {
        let mut entries = 0;
        for (pos, cell) in self.cells() {
            if !matches!(cell, TemplateCell::Entry { .. }) {
                continue;
            }
            entries += 1;
            let opens_inward = pos
                .neighbors4()
                .into_iter()
                .filter(|&next| self.is_inner(next))
                .any(|next| self.cell(next).is_walkable());
            if !opens_inward {
                return Err(format!("entry at ({}, {}) leads nowhere", pos.x, pos.y));
            }
        }
        if entries == 0 {
            return Err("template has no entry".to_string());
        }
        Ok(())
    }

    fn check_story_roles(&self) -> Result<(), String> {
        let roles: Vec<StoryRole> = self
            .cells
            .iter()
            .filter_map(|cell| match cell {
                TemplateCell::Marker(PlaceKind::Story(role)) => Some(*role),
                _ => None,
            })
            .collect();
        if !matches!(self.kind, RoomKind::Story(_)) {
            return match roles.first() {
                Some(role) => Err(format!("{role:?} anchor outside a story template")),
                None => Ok(()),
            };
        }
        for role in StoryRole::ALL {
            let count = roles.iter().filter(|&&found| found == role).count();
            if count != 1 {
                return Err(format!("story template needs exactly one {role:?}, found {count}"));
            }
        }
        Ok(())
    }

    fn is_inner(&self, pos: Pos) -> bool {
        pos.x > 0 && pos.y > 0 && pos.x < self.width - 1 && pos.y < self.height - 1
    }

    /// Cell at template-local `pos`; callers stay inside the template.
    pub fn cell(&self, pos: Pos) -> TemplateCell {
        self.cells[(pos.y * self.width + pos.x) as usize]
    }

    /// Every cell with its template-local position, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (Pos, TemplateCell)> + '_ {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(index, &cell)| {
            let index = index as i32;
            (Pos { y: index / width, x: index % width }, cell)
        })
    }

    /// Quarter turn clockwise.
    pub fn rotated(&self) -> Self {
        let (width, height) = (self.height, self.width);
        let mut cells = vec![TemplateCell::Keep; self.cells.len()];
        for (pos, cell) in self.cells() {
            let target = Pos { y: pos.x, x: self.height - 1 - pos.y };
            cells[(target.y * width + target.x) as usize] = cell;
        }
        Self { cells, width, height, ..self.clone() }
    }

    /// Horizontal mirror.
    pub fn mirrored(&self) -> Self {
        let mut cells = self.cells.clone();
        for row in cells.chunks_mut(self.width as usize) {
            row.reverse();
        }
        Self { cells, ..self.clone() }
    }

    /// Copy with 0 to 3 random rotations or mirrors applied. Near-square
    /// templates favour fewer transforms.
    pub fn oriented(&self, rng: &mut GenRng) -> Self {
        let transforms = if self.width.abs_diff(self.height) <= 2 {
            rng.weighted(&[4, 3, 2, 1]).unwrap_or(0)
        } else {
            rng.below(4)
        };
        let mut template = self.clone();
        for _ in 0..transforms {
            template = if rng.chance(50) { template.rotated() } else { template.mirrored() };
        }
        template
    }
}

/// Every template the generator may place, parsed once.
#[derive(Clone, Debug)]
pub struct TemplateCatalog {
    templates: Vec<RoomTemplate>,
}

impl TemplateCatalog {
    pub fn builtin() -> GenResult<Self> {
        Self::from_sources(BUILTIN_TEMPLATES)
    }

    pub fn from_sources(sources: &[TemplateSource]) -> GenResult<Self> {
        let mut names = BTreeSet::new();
        let mut templates = Vec::with_capacity(sources.len());
        for source in sources {
            if !names.insert(source.name) {
                return Err(GenError::Template {
                    template: source.name.to_string(),
                    reason: "duplicate template name".to_string(),
                });
            }
            templates.push(RoomTemplate::parse(source)?);
        }
        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[RoomTemplate] {
        &self.templates
    }

    pub fn get(&self, name: &str) -> Option<&RoomTemplate> {
        self.templates.iter().find(|template| template.name == name)
    }

    pub fn of_kind(&self, kind: RoomKind) -> Vec<&RoomTemplate> {
        self.templates.iter().filter(|template| template.kind == kind).collect()
    }
}

const BUILTIN_TEMPLATES: &[TemplateSource] = &[
    TemplateSource {
        name: "small-hall",
        kind: RoomKind::Normal,
        rows: &["###+###", "#.....#", "+..S..+", "#.P..I#", "###+###"],
    },
    TemplateSource {
        name: "corridor-room",
        kind: RoomKind::Normal,
        rows: &["####+####", "#P.....S#", "+.......+", "#I.....P#", "####+####"],
    },
    TemplateSource {
        name: "pillared",
        kind: RoomKind::Normal,
        rows: &[
            "####+####",
            "#S.....P#",
            "#.#...#.#",
            "+...!...+",
            "#.#...#.#",
            "#P..I...#",
            "####+####",
        ],
    },
    TemplateSource {
        name: "long-gallery",
        kind: RoomKind::Normal,
        rows: &[
            "######+######",
            "#P....S....P#",
            "+...........+",
            "#..I.....I..#",
            "######+######",
        ],
    },
    TemplateSource {
        name: "small-cell",
        kind: RoomKind::Normal,
        rows: &["##+##", "#...#", "+.S.+", "#.I.#", "##-##"],
    },
    TemplateSource {
        name: "twin-chamber",
        kind: RoomKind::Normal,
        rows: &[
            "##+########",
            "#P...#...S#",
            "#....#....#",
            "+..S.+.I..+",
            "#....#....#",
            "#I...#...P#",
            "########+##",
        ],
    },
    TemplateSource {
        name: "round",
        kind: RoomKind::Normal,
        rows: &["###-###", "##...##", "#.P.S.#", "-.....-", "#..I..#", "##...##", "###-###"],
    },
    TemplateSource {
        name: "cave-nook",
        kind: RoomKind::Cave,
        rows: &["??#+#??", "?#...#?", "#..S..+", "#.I...#", "?#.P.#?", "??#-#??"],
    },
    TemplateSource {
        name: "cave-shrine",
        kind: RoomKind::Cave,
        rows: &[
            "???#+#???",
            "??#...#??",
            "?#..!..#?",
            "+...S...+",
            "?#..I..#?",
            "??#...#??",
            "???#-#???",
        ],
    },
    TemplateSource {
        name: "cave-camp",
        kind: RoomKind::Cave,
        rows: &["?##+##?", "#..S..#", "+.P..I+", "#.....#", "?##-##?"],
    },
    TemplateSource {
        name: "garden",
        kind: RoomKind::Special(SpecialRoom::Garden),
        rows: &[
            "#####+#####",
            "#T\"...\"..T#",
            "#\"..~~~..\"#",
            "+..X.!.X..+",
            "#\"..~~~..\"#",
            "#T\"..I...\"#",
            "#####+#####",
        ],
    },
    TemplateSource {
        name: "shrine",
        kind: RoomKind::Special(SpecialRoom::Shrine),
        rows: &[
            "####+####",
            "#S.....S#",
            "#..#!#..#",
            "+.......+",
            "#..#.#..#",
            "#P..I..P#",
            "####-####",
        ],
    },
    TemplateSource {
        name: "vault",
        kind: RoomKind::Special(SpecialRoom::Vault),
        rows: &[
            "#########",
            "#I.#!#.I#",
            "#..#.#..#",
            "#.......#",
            "#S.....S#",
            "#...X...#",
            "####+####",
        ],
    },
    TemplateSource {
        name: "barracks",
        kind: RoomKind::Special(SpecialRoom::Barracks),
        rows: &[
            "######+######",
            "#P.S.#.#.S.P#",
            "#....+.+....#",
            "+.X..#!#..X.+",
            "#....#.#....#",
            "#P.I.#.#.I.P#",
            "######+######",
        ],
    },
    TemplateSource {
        name: "prison",
        kind: RoomKind::Story(Narrative::Rescue),
        rows: &[
            "#######+#######",
            "#C#.....P...M.#",
            "#+#...........#",
            "#.....!...S...+",
            "#...F.....I...#",
            "#######-#######",
        ],
    },
];
