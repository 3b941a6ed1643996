use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::scenario::LaneLayout;

/// Source of traveler paths.
pub(crate) trait PathProvider {
    /// Returns the waypoints leading from `start` to `goal`.
    ///
    /// The path is never empty and always ends exactly at `goal`.
    fn path(&mut self, start: Vec3, goal: Vec3) -> Vec<Vec3>;
}

/// Straight lane split into even segments with seeded sideways jitter on the
/// interior waypoints.
#[derive(Debug)]
pub(crate) struct LanePathProvider {
    segments: u32,
    jitter: f32,
    rng: ChaCha8Rng,
}

impl LanePathProvider {
    /// Creates a provider for the provided lane, seeding the jitter source.
    pub(crate) fn new(lane: &LaneLayout, seed: u64) -> Self {
        Self {
            segments: lane.segments.max(1),
            jitter: if lane.jitter.is_finite() {
                lane.jitter.abs()
            } else {
                0.0
            },
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn offset(&mut self) -> f32 {
        if self.jitter > 0.0 {
            self.rng.gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        }
    }
}

impl PathProvider for LanePathProvider {
    fn path(&mut self, start: Vec3, goal: Vec3) -> Vec<Vec3> {
        let heading = goal - start;
        let lateral = Vec3::new(-heading.z, 0.0, heading.x).normalize_or_zero();

        let mut waypoints = Vec::with_capacity(self.segments as usize + 1);
        waypoints.push(start);
        for step in 1..self.segments {
            let along = start.lerp(goal, step as f32 / self.segments as f32);
            let offset = self.offset();
            waypoints.push(along + lateral * offset);
        }
        waypoints.push(goal);
        waypoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(segments: u32, jitter: f32) -> LaneLayout {
        LaneLayout {
            start: Vec3::ZERO,
            goal: Vec3::new(0.0, 0.0, 12.0),
            segments,
            jitter,
        }
    }

    #[test]
    fn straight_lane_is_split_evenly() {
        let layout = lane(3, 0.0);
        let mut provider = LanePathProvider::new(&layout, 1);
        let path = provider.path(layout.start, layout.goal);

        assert_eq!(
            path,
            vec![
                Vec3::ZERO,
                Vec3::new(0.0, 0.0, 4.0),
                Vec3::new(0.0, 0.0, 8.0),
                Vec3::new(0.0, 0.0, 12.0),
            ]
        );
    }

    #[test]
    fn jitter_moves_interior_waypoints_sideways_only() {
        let layout = lane(4, 1.5);
        let mut provider = LanePathProvider::new(&layout, 9);
        let path = provider.path(layout.start, layout.goal);

        assert_eq!(path.len(), 5);
        assert_eq!(path[0], layout.start);
        assert_eq!(path[4], layout.goal);
        for (step, waypoint) in path.iter().enumerate().take(4).skip(1) {
            assert_eq!(waypoint.z, step as f32 * 3.0);
            assert!(waypoint.x.abs() <= 1.5);
            assert_eq!(waypoint.y, 0.0);
        }
    }

    #[test]
    fn equal_seeds_produce_equal_paths() {
        let layout = lane(6, 2.0);
        let mut first = LanePathProvider::new(&layout, 42);
        let mut second = LanePathProvider::new(&layout, 42);
        for _ in 0..3 {
            assert_eq!(
                first.path(layout.start, layout.goal),
                second.path(layout.start, layout.goal)
            );
        }
    }
}
