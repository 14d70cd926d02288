//! Manual steering and click-to-move path following.

use gridtalk_domain::{Direction, EntityId, GridMap, GridPos, PathPlan, Pathfinder};
use thiserror::Error;

use crate::application::services::world_state::WorldStateStore;
use crate::infrastructure::websocket::ClientMessageBuilder;
use crate::ports::outbound::{CommandSink, SendError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MovementError {
    #[error("Local entity {0} is not in the world yet")]
    UnknownLocalEntity(EntityId),
    #[error("No map received yet")]
    NoMap,
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Result of a planning request. A miss is a normal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    Planned { steps: usize },
    AlreadyThere,
    NoPath,
}

#[derive(Debug, Default)]
pub struct MovementController {
    plan: Option<PathPlan>,
    /// Last direction put on the wire.
    heading: Direction,
}

impl MovementController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&self) -> Option<&PathPlan> {
        self.plan.as_ref()
    }

    pub fn heading(&self) -> Direction {
        self.heading
    }

    /// Manual input edge: drops any plan, then steers.
    pub fn set_direction(
        &mut self,
        sink: &dyn CommandSink,
        direction: Direction,
    ) -> Result<(), MovementError> {
        if self.plan.take().is_some() {
            tracing::debug!("Path cancelled by manual input");
        }
        self.steer(sink, direction)
    }

    /// Replace the plan with a fresh shortest path to `goal`.
    ///
    /// Other entities' cells count as obstacles. A miss, or a goal we are
    /// already standing on, clears the plan and stops the entity.
    pub fn plan_to(
        &mut self,
        sink: &dyn CommandSink,
        grid: &GridMap,
        world: &WorldStateStore,
        local: &EntityId,
        goal: GridPos,
    ) -> Result<PlanOutcome, MovementError> {
        let start = world
            .get(local)
            .map(|e| e.position)
            .ok_or_else(|| MovementError::UnknownLocalEntity(local.clone()))?;
        let obstacles = world.occupied_cells(Some(local));

        self.plan = None;
        match Pathfinder::new(grid).find_path(start, goal, &obstacles) {
            None => {
                tracing::debug!(%start, %goal, "No path");
                self.steer(sink, Direction::STOP)?;
                Ok(PlanOutcome::NoPath)
            }
            Some(waypoints) if waypoints.is_empty() => {
                self.steer(sink, Direction::STOP)?;
                Ok(PlanOutcome::AlreadyThere)
            }
            Some(waypoints) => {
                let steps = waypoints.len();
                tracing::debug!(%start, %goal, steps, "Path planned");
                self.plan = Some(PathPlan::new(waypoints));
                Ok(PlanOutcome::Planned { steps })
            }
        }
    }

    /// Advance the plan from the entity's current cell and steer toward the
    /// next waypoint. Stops when the goal is reached or the entity has been
    /// displaced off the path.
    pub fn tick(&mut self, sink: &dyn CommandSink, position: GridPos) -> Result<(), MovementError> {
        let Some(plan) = self.plan.as_mut() else {
            return Ok(());
        };

        while plan.current() == Some(position) {
            plan.advance();
        }

        let next = match plan.current() {
            None => {
                self.plan = None;
                return self.steer(sink, Direction::STOP);
            }
            Some(next) if !position.is_adjacent(next) => {
                tracing::debug!(%position, %next, "Displaced off path; stopping");
                self.plan = None;
                return self.steer(sink, Direction::STOP);
            }
            Some(next) => next,
        };
        self.steer(sink, Direction::toward(position, next))
    }

    /// Drop the plan and stop moving.
    pub fn cancel(&mut self, sink: &dyn CommandSink) -> Result<(), MovementError> {
        self.plan = None;
        self.steer(sink, Direction::STOP)
    }

    /// Send SET_DIRECTION only when the heading changes.
    fn steer(&mut self, sink: &dyn CommandSink, direction: Direction) -> Result<(), MovementError> {
        if direction == self.heading {
            return Ok(());
        }
        sink.send(ClientMessageBuilder::set_direction(direction))?;
        self.heading = direction;
        Ok(())
    }
}
