#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic projectile flight model shared by the world and its systems.
//!
//! A projectile follows `lerp(source, destination, t) + up * sin(pi * t) * arc`,
//! where the arc height and the progress rate are both interpolated by the
//! launch distance. Longer shots arc higher and progress more slowly.

use std::{f32::consts::PI, time::Duration};

use glam::Vec3;
use lane_defence_core::FlightTuning;

/// Normalises a launch distance against the tuning's reference distance.
///
/// The result is clamped to `[0, 1]`. A non-positive reference distance
/// saturates every shot.
#[must_use]
pub fn distance_factor(distance: f32, tuning: &FlightTuning) -> f32 {
    if !(tuning.reference_distance > 0.0) || !distance.is_finite() {
        return 1.0;
    }

    (distance / tuning.reference_distance).clamp(0.0, 1.0)
}

/// Apex height of the arc for a shot covering `distance`.
#[must_use]
pub fn arc_height(distance: f32, tuning: &FlightTuning) -> f32 {
    lerp(
        tuning.min_arc_height,
        tuning.max_arc_height,
        distance_factor(distance, tuning),
    )
}

/// Progress gained per second by a shot covering `distance`.
///
/// Interpolates inversely: the shortest shots use `max_speed`, shots at or
/// beyond the reference distance use `min_speed`.
#[must_use]
pub fn progress_rate(distance: f32, tuning: &FlightTuning) -> f32 {
    lerp(
        tuning.max_speed,
        tuning.min_speed,
        distance_factor(distance, tuning),
    )
}

/// Position along the arc at progress `t`.
#[must_use]
pub fn position_at(source: Vec3, destination: Vec3, t: f32, arc: f32) -> Vec3 {
    let t = t.clamp(0.0, 1.0);
    source.lerp(destination, t) + Vec3::Y * ((PI * t).sin() * arc)
}

/// Damage multiplier at `distance` from a splash impact.
///
/// Linear from 1.0 at the impact point to 0.0 at the radius edge and beyond.
#[must_use]
pub fn splash_falloff(distance: f32, radius: f32) -> f32 {
    if !(radius > 0.0) {
        return if distance <= 0.0 { 1.0 } else { 0.0 };
    }

    (1.0 - distance / radius).clamp(0.0, 1.0)
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Flight state of a single projectile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Flight {
    source: Vec3,
    progress: f32,
}

/// Where a flight ended up after advancing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlightSample {
    /// Position along the arc after advancing.
    pub position: Vec3,
    /// Whether progress reached 1.0 this step.
    pub landed: bool,
}

impl Flight {
    /// Starts a flight at `source` with zero progress.
    #[must_use]
    pub const fn launch(source: Vec3) -> Self {
        Self {
            source,
            progress: 0.0,
        }
    }

    /// Progress in `[0, 1]`.
    #[must_use]
    pub const fn progress(&self) -> f32 {
        self.progress
    }

    /// Advances progress toward `destination` by one tick.
    ///
    /// A non-positive or non-finite progress rate lands the projectile
    /// immediately rather than leaving it suspended.
    pub fn advance(
        &mut self,
        destination: Vec3,
        dt: Duration,
        tuning: &FlightTuning,
    ) -> FlightSample {
        let distance = self.source.distance(destination);
        let rate = progress_rate(distance, tuning);

        if rate.is_finite() && rate > 0.0 {
            self.progress = (self.progress + rate * dt.as_secs_f32()).min(1.0);
        } else {
            self.progress = 1.0;
        }

        FlightSample {
            position: position_at(
                self.source,
                destination,
                self.progress,
                arc_height(distance, tuning),
            ),
            landed: self.progress >= 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> FlightTuning {
        FlightTuning {
            min_arc_height: 1.0,
            max_arc_height: 3.0,
            min_speed: 0.5,
            max_speed: 2.0,
            reference_distance: 10.0,
        }
    }

    #[test]
    fn arc_height_interpolates_by_distance() {
        let tuning = tuning();
        assert_eq!(arc_height(0.0, &tuning), 1.0);
        assert_eq!(arc_height(5.0, &tuning), 2.0);
        assert_eq!(arc_height(25.0, &tuning), 3.0);
    }

    #[test]
    fn longer_shots_progress_more_slowly() {
        let tuning = tuning();
        assert_eq!(progress_rate(0.0, &tuning), 2.0);
        assert!(progress_rate(4.0, &tuning) > progress_rate(8.0, &tuning));
        assert_eq!(progress_rate(40.0, &tuning), 0.5);
    }

    #[test]
    fn arc_peaks_halfway_and_returns_to_ground() {
        let source = Vec3::ZERO;
        let destination = Vec3::new(4.0, 0.0, 0.0);

        let start = position_at(source, destination, 0.0, 2.0);
        let apex = position_at(source, destination, 0.5, 2.0);
        let end = position_at(source, destination, 1.0, 2.0);

        assert_eq!(start, source);
        assert!((apex - Vec3::new(2.0, 2.0, 0.0)).length() < 1e-5);
        assert!((end - destination).length() < 1e-5);
    }

    #[test]
    fn splash_falloff_is_linear_to_the_edge() {
        assert_eq!(splash_falloff(0.0, 2.0), 1.0);
        assert_eq!(splash_falloff(1.0, 2.0), 0.5);
        assert_eq!(splash_falloff(2.0, 2.0), 0.0);
        assert_eq!(splash_falloff(3.0, 2.0), 0.0);
    }

    #[test]
    fn zero_radius_only_hits_the_impact_point() {
        assert_eq!(splash_falloff(0.0, 0.0), 1.0);
        assert_eq!(splash_falloff(0.1, 0.0), 0.0);
    }

    #[test]
    fn flight_lands_after_expected_time() {
        let tuning = tuning();
        let destination = Vec3::new(10.0, 0.0, 0.0);
        let mut flight = Flight::launch(Vec3::ZERO);

        let mut ticks = 0;
        loop {
            ticks += 1;
            let sample = flight.advance(destination, Duration::from_millis(250), &tuning);
            if sample.landed {
                assert!((sample.position - destination).length() < 1e-4);
                break;
            }
            assert!(ticks < 100, "flight never landed");
        }

        assert_eq!(ticks, 8);
        assert_eq!(flight.progress(), 1.0);
    }

    #[test]
    fn stalled_tuning_lands_immediately() {
        let tuning = FlightTuning {
            min_speed: 0.0,
            max_speed: 0.0,
            ..tuning()
        };
        let mut flight = Flight::launch(Vec3::ZERO);
        let sample = flight.advance(Vec3::X, Duration::from_millis(16), &tuning);
        assert!(sample.landed);
    }
}
