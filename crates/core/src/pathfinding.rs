//! Deterministic shortest-path search over caller-defined graphs.
//! This module exists so tunnel carving, stair queries and later monster
//! movement share one A* implementation and one reusable scratch context.
//! It does not own any passability policy; callers supply it via [`Pather`].

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::mem;

use crate::grid::{self, DUNGEON_HEIGHT, DUNGEON_WIDTH, Grid};
use crate::types::Pos;

pub const UNREACHABLE: u32 = u32::MAX;

/// Component label; `NO_COMPONENT` marks cells outside every component.
pub type ComponentId = u32;
pub const NO_COMPONENT: ComponentId = 0;

/// Graph contract for [`PathRange::astar`].
///
/// `estimation` must never overestimate the true remaining cost.
pub trait Pather {
    /// Pushes the neighbours of `pos` into `out`, which arrives empty.
    fn neighbors(&mut self, pos: Pos, out: &mut Vec<Pos>);
    fn cost(&self, from: Pos, to: Pos) -> u32;
    fn estimation(&self, from: Pos, to: Pos) -> u32;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AstarPath {
    /// Ordered from start to goal, both included.
    pub path: Vec<Pos>,
    pub cost: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeState {
    Unvisited,
    Open,
    /// Expanded; a cheaper route later moves it back to `Open`.
    Closed,
}

#[derive(Clone, Copy, Debug)]
struct Node {
    cost: u32,
    rank: u32,
    parent: Option<u32>,
    state: NodeState,
    search: u32,
}

impl Node {
    fn fresh(search: u32) -> Self {
        Self {
            cost: UNREACHABLE,
            rank: UNREACHABLE,
            parent: None,
            state: NodeState::Unvisited,
            search,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct OpenEntry {
    rank: u32,
    order: u64,
    index: u32,
}

/// Search context owning every buffer the searches reuse between calls.
///
/// Nodes are tagged with the id of the search that last touched them, so a
/// new search only bumps the id instead of clearing the pool.
pub struct PathRange {
    width: i32,
    height: i32,
    nodes: Vec<Node>,
    search: u32,
    open: BinaryHeap<Reverse<OpenEntry>>,
    neighbors: Vec<Pos>,
    queue: VecDeque<Pos>,
    stack: Vec<Pos>,
    distances: Vec<u32>,
    components: Vec<ComponentId>,
}

impl PathRange {
    pub fn new(width: i32, height: i32) -> Self {
        let len = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            nodes: vec![Node::fresh(0); len],
            search: 0,
            open: BinaryHeap::new(),
            neighbors: Vec::with_capacity(8),
            queue: VecDeque::new(),
            stack: Vec::new(),
            distances: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn for_dungeon() -> Self {
        Self::new(DUNGEON_WIDTH, DUNGEON_HEIGHT)
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Pos) -> usize {
        (pos.y * self.width + pos.x) as usize
    }

    fn pos_at(&self, index: usize) -> Pos {
        let index = index as i32;
        Pos { y: index / self.width, x: index % self.width }
    }

    fn begin_search(&mut self) {
        if self.search == u32::MAX {
            for node in &mut self.nodes {
                node.search = 0;
            }
            self.search = 0;
        }
        self.search += 1;
        self.open.clear();
    }

    fn node_mut(&mut self, index: usize) -> &mut Node {
        let search = self.search;
        let node = &mut self.nodes[index];
        if node.search != search {
            *node = Node::fresh(search);
        }
        node
    }

    /// Lowest-cost path from `from` to `to`, or `None` when the goal cannot be
    /// reached. Equal ranks are expanded in insertion order.
    pub fn astar<P: Pather>(&mut self, pather: &mut P, from: Pos, to: Pos) -> Option<AstarPath> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if from == to {
            return Some(AstarPath { path: vec![from], cost: 0 });
        }

        self.begin_search();
        let mut order = 0_u64;
        let start = self.index(from);
        let rank = pather.estimation(from, to);
        let node = self.node_mut(start);
        node.cost = 0;
        node.rank = rank;
        node.state = NodeState::Open;
        self.open.push(Reverse(OpenEntry { rank, order, index: start as u32 }));

        let mut neighbors = mem::take(&mut self.neighbors);
        let mut goal = None;
        while let Some(Reverse(entry)) = self.open.pop() {
            let index = entry.index as usize;
            let current = self.nodes[index];
            if current.state != NodeState::Open || current.rank != entry.rank {
                continue;
            }
            let pos = self.pos_at(index);
            if pos == to {
                goal = Some(index);
                break;
            }
            self.nodes[index].state = NodeState::Closed;

            neighbors.clear();
            pather.neighbors(pos, &mut neighbors);
            for &next in &neighbors {
                if !self.contains(next) {
                    continue;
                }
                let cost = current.cost.saturating_add(pather.cost(pos, next));
                let next_index = self.index(next);
                if cost >= self.node_mut(next_index).cost {
                    continue;
                }
                let rank = cost.saturating_add(pather.estimation(next, to));
                let node = self.node_mut(next_index);
                node.cost = cost;
                node.rank = rank;
                node.parent = Some(index as u32);
                node.state = NodeState::Open;
                order += 1;
                self.open.push(Reverse(OpenEntry { rank, order, index: next_index as u32 }));
            }
        }
        self.neighbors = neighbors;

        let goal = goal?;
        let mut path = vec![self.pos_at(goal)];
        let mut cursor = self.nodes[goal].parent;
        while let Some(parent) = cursor {
            let parent = parent as usize;
            path.push(self.pos_at(parent));
            cursor = self.nodes[parent].parent;
        }
        path.reverse();
        Some(AstarPath { path, cost: self.nodes[goal].cost })
    }

    /// Breadth-first step distances from `from` over 4-connected cells accepted
    /// by `passable`. Cells never reached hold [`UNREACHABLE`].
    pub fn bfs(&mut self, from: Pos, mut passable: impl FnMut(Pos) -> bool) -> &[u32] {
        let len = self.nodes.len();
        self.distances.clear();
        self.distances.resize(len, UNREACHABLE);
        self.queue.clear();
        if self.contains(from) && passable(from) {
            let index = self.index(from);
            self.distances[index] = 0;
            self.queue.push_back(from);
        }
        while let Some(pos) = self.queue.pop_front() {
            let distance = self.distances[self.index(pos)];
            for next in pos.neighbors4() {
                if !self.contains(next) {
                    continue;
                }
                let next_index = self.index(next);
                if self.distances[next_index] != UNREACHABLE || !passable(next) {
                    continue;
                }
                self.distances[next_index] = distance + 1;
                self.queue.push_back(next);
            }
        }
        &self.distances
    }

    /// Labels the 4-connected components of cells accepted by `passable`,
    /// numbering them from 1 in row-major order of their first cell.
    pub fn components(&mut self, mut passable: impl FnMut(Pos) -> bool) -> &[ComponentId] {
        let len = self.nodes.len();
        self.components.clear();
        self.components.resize(len, NO_COMPONENT);
        self.stack.clear();
        let mut next_id = NO_COMPONENT;
        for index in 0..len {
            if self.components[index] != NO_COMPONENT {
                continue;
            }
            let pos = self.pos_at(index);
            if !passable(pos) {
                continue;
            }
            next_id += 1;
            self.components[index] = next_id;
            self.stack.push(pos);
            while let Some(current) = self.stack.pop() {
                for next in current.neighbors4() {
                    if !self.contains(next) {
                        continue;
                    }
                    let next_index = self.index(next);
                    if self.components[next_index] != NO_COMPONENT || !passable(next) {
                        continue;
                    }
                    self.components[next_index] = next_id;
                    self.stack.push(next);
                }
            }
        }
        &self.components
    }

    #[cfg(test)]
    fn jump_search_id(&mut self, search: u32) {
        self.search = search;
    }
}

impl Default for PathRange {
    fn default() -> Self {
        Self::for_dungeon()
    }
}

/// Baseline movement over a finished level: orthogonal steps onto passable
/// terrain, unit cost.
pub struct WalkPather<'a> {
    grid: &'a Grid,
}

impl<'a> WalkPather<'a> {
    pub fn new(grid: &'a Grid) -> Self {
        Self { grid }
    }
}

impl Pather for WalkPather<'_> {
    fn neighbors(&mut self, pos: Pos, out: &mut Vec<Pos>) {
        out.extend(grid::neighbors4_where(pos, |next| self.grid.is_passable(next)));
    }

    fn cost(&self, _from: Pos, _to: Pos) -> u32 {
        1
    }

    fn estimation(&self, from: Pos, to: Pos) -> u32 {
        from.manhattan(to)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use proptest::prelude::*;

    use super::*;
    use crate::types::Terrain;

    /// Small synthetic grid; `None` cells are impassable, others cost their value to enter.
    struct CostGrid {
        width: i32,
        height: i32,
        costs: Vec<Option<u32>>,
    }

    impl CostGrid {
        fn from_rows(rows: &[&str]) -> Self {
            let height = rows.len() as i32;
            let width = rows[0].len() as i32;
            let costs = rows
                .iter()
                .flat_map(|row| row.chars())
                .map(|ch| ch.to_digit(10).filter(|&cost| cost > 0))
                .collect();
            Self { width, height, costs }
        }

        fn cost_at(&self, pos: Pos) -> Option<u32> {
            if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
                return None;
            }
            self.costs[(pos.y * self.width + pos.x) as usize]
        }

        fn brute_force(&self, from: Pos, to: Pos) -> Option<u32> {
            let len = self.costs.len();
            let mut dist = vec![UNREACHABLE; len];
            dist[(from.y * self.width + from.x) as usize] = 0;
            let mut changed = true;
            while changed {
                changed = false;
                for index in 0..len {
                    if dist[index] == UNREACHABLE {
                        continue;
                    }
                    let pos = Pos { y: index as i32 / self.width, x: index as i32 % self.width };
                    for next in pos.neighbors4() {
                        let Some(step) = self.cost_at(next) else {
                            continue;
                        };
                        let next_index = (next.y * self.width + next.x) as usize;
                        if dist[index] + step < dist[next_index] {
                            dist[next_index] = dist[index] + step;
                            changed = true;
                        }
                    }
                }
            }
            let goal = dist[(to.y * self.width + to.x) as usize];
            (goal != UNREACHABLE).then_some(goal)
        }
    }

    impl Pather for CostGrid {
        fn neighbors(&mut self, pos: Pos, out: &mut Vec<Pos>) {
            out.extend(pos.neighbors4().into_iter().filter(|&next| self.cost_at(next).is_some()));
        }

        fn cost(&self, _from: Pos, to: Pos) -> u32 {
            self.cost_at(to).unwrap_or(UNREACHABLE)
        }

        fn estimation(&self, from: Pos, to: Pos) -> u32 {
            from.manhattan(to)
        }
    }

    fn assert_valid_path(grid: &CostGrid, result: &AstarPath, from: Pos, to: Pos) {
        assert_eq!(result.path.first(), Some(&from));
        assert_eq!(result.path.last(), Some(&to));
        let mut total = 0;
        for step in result.path.windows(2) {
            assert_eq!(step[0].manhattan(step[1]), 1, "path must be contiguous: {:?}", result.path);
            total += grid.cost_at(step[1]).expect("path must avoid blocked cells");
        }
        assert_eq!(total, result.cost);
    }

    #[test]
    fn astar_prefers_cheap_detour_over_expensive_straight_line() {
        let mut grid = CostGrid::from_rows(&["1991", "1111"]);
        let mut range = PathRange::new(grid.width, grid.height);
        let result = range.astar(&mut grid, Pos::new(0, 0), Pos::new(3, 0)).expect("reachable");
        assert_eq!(result.cost, 5);
        assert_valid_path(&grid, &result, Pos::new(0, 0), Pos::new(3, 0));
    }

    #[test]
    fn astar_reports_not_found_for_walled_goal() {
        let mut grid = CostGrid::from_rows(&["1101", "1101", "1101"]);
        let mut range = PathRange::new(grid.width, grid.height);
        assert_eq!(range.astar(&mut grid, Pos::new(0, 0), Pos::new(3, 2)), None);
        assert_eq!(range.astar(&mut grid, Pos::new(0, 0), Pos::new(9, 9)), None);
    }

    #[test]
    fn astar_start_equals_goal_is_zero_cost_single_cell() {
        let mut grid = CostGrid::from_rows(&["11", "11"]);
        let mut range = PathRange::new(2, 2);
        let result = range.astar(&mut grid, Pos::new(1, 1), Pos::new(1, 1)).expect("trivial");
        assert_eq!(result, AstarPath { path: vec![Pos::new(1, 1)], cost: 0 });
    }

    #[test]
    fn equal_cost_routes_resolve_identically_every_time() {
        let mut grid = CostGrid::from_rows(&["11111", "11111", "11111", "11111"]);
        let mut range = PathRange::new(grid.width, grid.height);
        let first = range.astar(&mut grid, Pos::new(0, 0), Pos::new(4, 3)).expect("open grid");
        for _ in 0..5 {
            let again = range.astar(&mut grid, Pos::new(0, 0), Pos::new(4, 3)).expect("open grid");
            assert_eq!(first, again);
        }
        let mut fresh = PathRange::new(grid.width, grid.height);
        assert_eq!(fresh.astar(&mut grid, Pos::new(0, 0), Pos::new(4, 3)), Some(first));
    }

    /// Five nodes on a row: S=0, A=1, B=2, C=3, G=4. B's estimate is
    /// admissible but inconsistent, so C is closed through A before the
    /// cheaper route through B reaches it.
    struct InconsistentGraph;

    impl Pather for InconsistentGraph {
        fn neighbors(&mut self, pos: Pos, out: &mut Vec<Pos>) {
            let next: &[i32] = match pos.x {
                0 => &[1, 2],
                1 | 2 => &[3],
                3 => &[4],
                _ => &[],
            };
            out.extend(next.iter().map(|&x| Pos::new(x, 0)));
        }

        fn cost(&self, from: Pos, to: Pos) -> u32 {
            match (from.x, to.x) {
                (0, 1) | (2, 3) => 1,
                (0, 2) => 2,
                (1, 3) => 3,
                _ => 4,
            }
        }

        fn estimation(&self, from: Pos, _to: Pos) -> u32 {
            if from.x == 2 { 5 } else { 0 }
        }
    }

    #[test]
    fn closed_nodes_reopen_when_a_cheaper_route_arrives() {
        let mut range = PathRange::new(5, 1);
        let result =
            range.astar(&mut InconsistentGraph, Pos::new(0, 0), Pos::new(4, 0)).expect("linked");
        assert_eq!(result.cost, 7);
        let xs: Vec<i32> = result.path.iter().map(|pos| pos.x).collect();
        assert_eq!(xs, [0, 2, 3, 4]);
    }

    #[test]
    fn reused_pool_ignores_nodes_from_previous_searches() {
        let mut open = CostGrid::from_rows(&["111", "111", "111"]);
        let mut walled = CostGrid::from_rows(&["101", "101", "101"]);
        let mut range = PathRange::new(3, 3);
        assert!(range.astar(&mut open, Pos::new(0, 0), Pos::new(2, 2)).is_some());
        assert_eq!(range.astar(&mut walled, Pos::new(0, 0), Pos::new(2, 2)), None);
        assert!(range.astar(&mut open, Pos::new(2, 2), Pos::new(0, 0)).is_some());
    }

    #[test]
    fn search_id_wrap_resets_the_pool() {
        let mut grid = CostGrid::from_rows(&["111", "191", "111"]);
        let mut range = PathRange::new(3, 3);
        let expected = range.astar(&mut grid, Pos::new(0, 1), Pos::new(2, 1));
        range.jump_search_id(u32::MAX - 1);
        assert_eq!(range.astar(&mut grid, Pos::new(0, 1), Pos::new(2, 1)), expected);
        assert_eq!(range.astar(&mut grid, Pos::new(0, 1), Pos::new(2, 1)), expected);
        assert_eq!(range.astar(&mut grid, Pos::new(0, 1), Pos::new(2, 1)), expected);
    }

    #[test]
    fn bfs_and_components_follow_the_predicate() {
        let grid = CostGrid::from_rows(&["1101", "1101", "0001"]);
        let mut range = PathRange::new(grid.width, grid.height);
        let open = |pos: Pos| grid.cost_at(pos).is_some();

        let distances = range.bfs(Pos::new(0, 0), open).to_vec();
        assert_eq!(distances[(grid.width + 1) as usize], 2);
        assert_eq!(distances[3], UNREACHABLE);

        let components = range.components(open).to_vec();
        assert_eq!(components[0], 1);
        assert_eq!(components[3], 2);
        assert_eq!(components[8], NO_COMPONENT);
    }

    #[test]
    fn walk_pather_crosses_doors_but_not_walls() {
        let mut grid = Grid::filled(Terrain::Wall);
        for x in 1..6 {
            grid.set(Pos::new(x, 1), Terrain::Ground);
        }
        grid.set(Pos::new(3, 1), Terrain::Door);
        let mut range = PathRange::for_dungeon();
        let result = range
            .astar(&mut WalkPather::new(&grid), Pos::new(1, 1), Pos::new(5, 1))
            .expect("corridor is open");
        assert_eq!(result.cost, 4);

        grid.set(Pos::new(3, 1), Terrain::Wall);
        assert_eq!(range.astar(&mut WalkPather::new(&grid), Pos::new(1, 1), Pos::new(5, 1)), None);
    }

    fn cost_grid_strategy() -> impl Strategy<Value = (CostGrid, Pos, Pos)> {
        (2_i32..7, 2_i32..7).prop_flat_map(|(width, height)| {
            let len = (width * height) as usize;
            (
                prop::collection::vec(prop::option::weighted(0.75, 1_u32..9), len),
                0..len,
                0..len,
            )
                .prop_map(move |(costs, start, goal)| {
                    let to_pos = |index: usize| Pos {
                        y: index as i32 / width,
                        x: index as i32 % width,
                    };
                    (CostGrid { width, height, costs }, to_pos(start), to_pos(goal))
                })
        })
    }

    impl fmt::Debug for CostGrid {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "CostGrid {}x{} {:?}", self.width, self.height, self.costs)
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]
        #[test]
        fn astar_matches_brute_force_reference((grid, from, to) in cost_grid_strategy()) {
            let mut grid = grid;
            let expected = grid.brute_force(from, to);
            let mut range = PathRange::new(grid.width, grid.height);
            let result = range.astar(&mut grid, from, to);
            match (expected, result) {
                (None, None) => {}
                (Some(cost), Some(found)) => {
                    prop_assert_eq!(found.cost, cost);
                    assert_valid_path(&grid, &found, from, to);
                }
                (expected, found) => {
                    prop_assert!(false, "expected {:?}, A* returned {:?}", expected, found);
                }
            }
        }
    }
}
