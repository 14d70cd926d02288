//! Shortest-path search over a [`GridMap`] plus a per-query obstacle set.
//!
//! The search is an unweighted breadth-first expansion over 4-connected
//! neighbours, so any returned path has the minimum possible step count.
//!
//! # Neighbour order
//!
//! Neighbours are always expanded in the fixed order **up, right, down, left**
//! (clockwise from north, `y` growing downwards). Among several equally short
//! paths, the one found first under this order is returned, which means paths
//! prefer to travel vertically-up and right before down and left. The order is
//! part of the observable contract: callers and tests may rely on it.

use std::collections::{HashSet, VecDeque};

use crate::grid::{GridMap, GridPos};

/// Expansion order: up, right, down, left.
pub const NEIGHBOR_ORDER: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Stateless breadth-first path search over a static grid.
#[derive(Debug, Clone, Copy)]
pub struct Pathfinder<'a> {
    grid: &'a GridMap,
}

impl<'a> Pathfinder<'a> {
    pub fn new(grid: &'a GridMap) -> Self {
        Self { grid }
    }

    /// A cell is traversable when it is in bounds, not statically blocked and
    /// not in the caller-supplied obstacle set.
    pub fn is_traversable(&self, pos: GridPos, obstacles: &HashSet<GridPos>) -> bool {
        self.grid.is_walkable(pos) && !obstacles.contains(&pos)
    }

    /// Find the shortest path from `start` to `goal`.
    ///
    /// The returned waypoints exclude `start` and end with `goal`; an empty
    /// vector means the caller already stands on the goal. `None` means no
    /// path: the goal is out of bounds, blocked, occupied or unreachable.
    /// `start` itself is never checked against `obstacles`.
    pub fn find_path(
        &self,
        start: GridPos,
        goal: GridPos,
        obstacles: &HashSet<GridPos>,
    ) -> Option<Vec<GridPos>> {
        if !self.grid.in_bounds(start) {
            return None;
        }
        if start == goal {
            return Some(Vec::new());
        }
        if !self.is_traversable(goal, obstacles) {
            return None;
        }

        let width = self.grid.width() as usize;
        let cells = width * self.grid.height() as usize;
        let index = |p: GridPos| p.y as usize * width + p.x as usize;

        let mut came_from: Vec<Option<GridPos>> = vec![None; cells];
        let mut visited = vec![false; cells];
        let mut frontier = VecDeque::new();

        visited[index(start)] = true;
        frontier.push_back(start);

        while let Some(current) = frontier.pop_front() {
            if current == goal {
                return Some(rebuild_path(&came_from, start, goal, index));
            }

            for (dx, dy) in NEIGHBOR_ORDER {
                let next = current.offset(dx, dy);
                if !self.is_traversable(next, obstacles) {
                    continue;
                }
                let i = index(next);
                if visited[i] {
                    continue;
                }
                visited[i] = true;
                came_from[i] = Some(current);
                frontier.push_back(next);
            }
        }

        None
    }
}

fn rebuild_path(
    came_from: &[Option<GridPos>],
    start: GridPos,
    goal: GridPos,
    index: impl Fn(GridPos) -> usize,
) -> Vec<GridPos> {
    let mut path = vec![goal];
    let mut cursor = goal;
    while let Some(prev) = came_from[index(cursor)] {
        if prev == start {
            break;
        }
        path.push(prev);
        cursor = prev;
    }
    path.reverse();
    path
}

/// A computed route: ordered waypoints plus a cursor.
///
/// Plans are replaced wholesale on every planning call and never edited in
/// place; only the cursor moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPlan {
    waypoints: Vec<GridPos>,
    cursor: usize,
}

impl PathPlan {
    pub fn new(waypoints: Vec<GridPos>) -> Self {
        Self {
            waypoints,
            cursor: 0,
        }
    }

    pub fn waypoints(&self) -> &[GridPos] {
        &self.waypoints
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<GridPos> {
        self.waypoints.get(self.cursor).copied()
    }

    pub fn goal(&self) -> Option<GridPos> {
        self.waypoints.last().copied()
    }

    pub fn advance(&mut self) {
        if self.cursor < self.waypoints.len() {
            self.cursor += 1;
        }
    }

    pub fn remaining(&self) -> &[GridPos] {
        &self.waypoints[self.cursor.min(self.waypoints.len())..]
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(width: u32, height: u32, walls: &[(i32, i32)]) -> GridMap {
        GridMap::new(width, height)
            .expect("grid")
            .with_blocked(walls.iter().map(|&(x, y)| GridPos::new(x, y)))
    }

    /// Reference BFS distance, independent of path reconstruction.
    fn bfs_distance(
        grid: &GridMap,
        start: GridPos,
        goal: GridPos,
        obstacles: &HashSet<GridPos>,
    ) -> Option<usize> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        while let Some((p, d)) = queue.pop_front() {
            if p == goal {
                return Some(d);
            }
            for (dx, dy) in NEIGHBOR_ORDER {
                let n = p.offset(dx, dy);
                if grid.is_walkable(n) && !obstacles.contains(&n) && seen.insert(n) {
                    queue.push_back((n, d + 1));
                }
            }
        }
        None
    }

    fn assert_valid_path(start: GridPos, path: &[GridPos]) {
        let mut prev = start;
        for step in path {
            assert!(prev.is_adjacent(*step), "{prev} -> {step} is not a single step");
            prev = *step;
        }
    }

    #[test]
    fn straight_line_excludes_start() {
        let g = grid(5, 1, &[]);
        let path = Pathfinder::new(&g)
            .find_path(GridPos::new(0, 0), GridPos::new(3, 0), &HashSet::new())
            .expect("path");
        assert_eq!(
            path,
            vec![GridPos::new(1, 0), GridPos::new(2, 0), GridPos::new(3, 0)]
        );
    }

    #[test]
    fn tie_break_prefers_up_then_right() {
        // From (1,1) to (2,0) both "up then right" and "right then up" are 2 steps.
        let g = grid(3, 3, &[]);
        let path = Pathfinder::new(&g)
            .find_path(GridPos::new(1, 1), GridPos::new(2, 0), &HashSet::new())
            .expect("path");
        assert_eq!(path, vec![GridPos::new(1, 0), GridPos::new(2, 0)]);
    }

    #[test]
    fn routes_around_static_walls() {
        // Wall column at x=2 with a gap at y=3.
        let g = grid(5, 4, &[(2, 0), (2, 1), (2, 2)]);
        let start = GridPos::new(0, 0);
        let goal = GridPos::new(4, 0);
        let path = Pathfinder::new(&g)
            .find_path(start, goal, &HashSet::new())
            .expect("path");

        assert_valid_path(start, &path);
        assert_eq!(path.last(), Some(&goal));
        assert_eq!(Some(path.len()), bfs_distance(&g, start, goal, &HashSet::new()));
        assert!(path.contains(&GridPos::new(2, 3)));
    }

    #[test]
    fn dynamic_obstacles_block_cells() {
        let g = grid(3, 1, &[]);
        let obstacles = HashSet::from([GridPos::new(1, 0)]);
        let result = Pathfinder::new(&g).find_path(GridPos::new(0, 0), GridPos::new(2, 0), &obstacles);
        assert_eq!(result, None);
    }

    #[test]
    fn occupied_or_blocked_or_outside_goal_has_no_path() {
        let g = grid(4, 4, &[(3, 3)]);
        let pf = Pathfinder::new(&g);
        let start = GridPos::new(0, 0);
        let occupied = HashSet::from([GridPos::new(2, 2)]);

        assert_eq!(pf.find_path(start, GridPos::new(2, 2), &occupied), None);
        assert_eq!(pf.find_path(start, GridPos::new(3, 3), &HashSet::new()), None);
        assert_eq!(pf.find_path(start, GridPos::new(9, 0), &HashSet::new()), None);
    }

    #[test]
    fn enclosed_goal_is_unreachable() {
        let g = grid(5, 5, &[(1, 2), (3, 2), (2, 1), (2, 3)]);
        let result = Pathfinder::new(&g).find_path(GridPos::new(0, 0), GridPos::new(2, 2), &HashSet::new());
        assert_eq!(result, None);
    }

    #[test]
    fn start_equal_goal_is_empty_path() {
        let g = grid(2, 2, &[]);
        let result = Pathfinder::new(&g).find_path(GridPos::new(1, 1), GridPos::new(1, 1), &HashSet::new());
        assert_eq!(result, Some(Vec::new()));
    }

    #[test]
    fn path_length_matches_bfs_distance_across_grid() {
        let g = grid(
            8,
            6,
            &[(1, 1), (2, 1), (3, 1), (5, 0), (5, 1), (5, 2), (5, 3), (2, 4), (3, 4), (4, 4)],
        );
        let obstacles = HashSet::from([GridPos::new(6, 4), GridPos::new(0, 3)]);
        let pf = Pathfinder::new(&g);
        let start = GridPos::new(0, 0);

        for y in 0..6 {
            for x in 0..8 {
                let goal = GridPos::new(x, y);
                if goal == start {
                    continue;
                }
                let found = pf.find_path(start, goal, &obstacles);
                let expected = if pf.is_traversable(goal, &obstacles) {
                    bfs_distance(&g, start, goal, &obstacles)
                } else {
                    None
                };
                assert_eq!(found.as_ref().map(Vec::len), expected, "goal {goal}");
                if let Some(path) = found {
                    assert_valid_path(start, &path);
                    assert!(path.iter().all(|p| pf.is_traversable(*p, &obstacles)));
                }
            }
        }
    }

    #[test]
    fn plan_cursor_walks_waypoints() {
        let mut plan = PathPlan::new(vec![GridPos::new(1, 0), GridPos::new(2, 0)]);
        assert_eq!(plan.current(), Some(GridPos::new(1, 0)));
        assert_eq!(plan.goal(), Some(GridPos::new(2, 0)));

        plan.advance();
        assert_eq!(plan.remaining(), &[GridPos::new(2, 0)]);
        plan.advance();
        plan.advance();
        assert!(plan.is_complete());
        assert_eq!(plan.current(), None);
        assert!(plan.remaining().is_empty());
    }
}
