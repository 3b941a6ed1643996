//! Waypoint traversal for travelers.

use glam::Vec3;

/// Distance at which a waypoint counts as reached.
pub(crate) const ARRIVAL_THRESHOLD: f32 = 0.05;

/// Immutable waypoint list plus the traveler's progress along it.
#[derive(Clone, Debug)]
pub(crate) struct TravelerPath {
    waypoints: Vec<Vec3>,
    /// `tail[i]` is the length of the polyline from waypoint `i` to the goal.
    tail: Vec<f32>,
    index: usize,
    remaining: f32,
}

impl TravelerPath {
    /// Builds a path from a non-empty waypoint list. Returns `None` when empty.
    pub(crate) fn new(waypoints: Vec<Vec3>) -> Option<Self> {
        let first = *waypoints.first()?;

        let mut tail = vec![0.0; waypoints.len()];
        for index in (0..waypoints.len().saturating_sub(1)).rev() {
            tail[index] = tail[index + 1] + waypoints[index].distance(waypoints[index + 1]);
        }

        let mut path = Self {
            waypoints,
            tail,
            index: 0,
            remaining: 0.0,
        };
        path.refresh(first);
        Some(path)
    }

    /// Index of the waypoint currently being walked toward.
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Cached remaining distance as of the last movement step.
    pub(crate) fn remaining_distance(&self) -> f32 {
        self.remaining
    }

    /// Whether every waypoint has been reached.
    pub(crate) fn is_complete(&self) -> bool {
        self.index >= self.waypoints.len()
    }

    /// Walks `budget` world units along the path, carrying leftover budget
    /// across waypoints reached within the same step.
    ///
    /// Returns `true` once the final waypoint has been reached.
    pub(crate) fn advance(&mut self, position: &mut Vec3, budget: f32) -> bool {
        let mut budget = budget.max(0.0);

        while let Some(next) = self.waypoints.get(self.index).copied() {
            let offset = next - *position;
            let distance = offset.length();

            if distance <= ARRIVAL_THRESHOLD || distance <= budget {
                budget = (budget - distance).max(0.0);
                *position = next;
                self.index += 1;
                continue;
            }

            if budget > 0.0 {
                *position += offset / distance * budget;
            }
            break;
        }

        self.refresh(*position);
        self.is_complete()
    }

    /// Recomputes the cached remaining distance from `position`.
    pub(crate) fn refresh(&mut self, position: Vec3) {
        self.remaining = match self.waypoints.get(self.index) {
            Some(next) => position.distance(*next) + self.tail[self.index],
            None => 0.0,
        };
    }
}
