//! Tuning parameters injected by the settings layer at spawn and upgrade time.
//!
//! Durations are expressed in seconds so that scenario files stay readable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ProjectileKind;

/// Combat stats shared by every entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityStats {
    /// Upper bound of the health pool; entities spawn at full health.
    pub max_health: f32,
    /// Movement speed in world units per second.
    pub speed: f32,
    /// Damage dealt when a windup completes.
    pub damage: f32,
    /// Distance within which the entity can strike its target.
    pub attack_range: f32,
    /// Cooldown after each strike, in seconds.
    pub attack_interval_secs: f32,
    /// Windup before each strike lands, in seconds.
    pub windup_secs: f32,
}

impl EntityStats {
    /// Cooldown after each strike.
    #[must_use]
    pub fn attack_interval(&self) -> Duration {
        seconds(self.attack_interval_secs)
    }

    /// Windup before each strike lands.
    #[must_use]
    pub fn windup(&self) -> Duration {
        seconds(self.windup_secs)
    }
}

impl Default for EntityStats {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            speed: 2.0,
            damage: 10.0,
            attack_range: 1.0,
            attack_interval_secs: 1.0,
            windup_secs: 0.25,
        }
    }
}

/// Spawn-time tuning for a traveler.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelerTuning {
    /// Combat stats of the traveler.
    pub stats: EntityStats,
    /// Reward reported when the traveler is killed.
    pub reward: u32,
    /// Whether emplacements and melee squads may target the traveler.
    pub engageable: bool,
}

impl Default for TravelerTuning {
    fn default() -> Self {
        Self {
            stats: EntityStats {
                max_health: 60.0,
                speed: 1.5,
                damage: 5.0,
                ..EntityStats::default()
            },
            reward: 5,
            engageable: true,
        }
    }
}

/// Arc and speed envelope of a projectile type.
///
/// Both the arc height and the progress rate are interpolated by the launch
/// distance normalised against `reference_distance`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightTuning {
    /// Apex height of the shortest shots.
    pub min_arc_height: f32,
    /// Apex height of shots at or beyond the reference distance.
    pub max_arc_height: f32,
    /// Progress per second of shots at or beyond the reference distance.
    pub min_speed: f32,
    /// Progress per second of the shortest shots.
    pub max_speed: f32,
    /// Distance at which the envelope saturates.
    pub reference_distance: f32,
}

impl Default for FlightTuning {
    fn default() -> Self {
        Self {
            min_arc_height: 0.5,
            max_arc_height: 2.5,
            min_speed: 1.0,
            max_speed: 2.5,
            reference_distance: 10.0,
        }
    }
}

/// How an emplacement's projectiles travel and resolve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlightMode {
    /// Follows the live target and damages only it.
    PointSeeking,
    /// Lands on the target's position at launch and damages everything nearby.
    FixedDestination {
        /// Radius at which falloff reaches zero.
        splash_radius: f32,
    },
}

/// Placement- and upgrade-time tuning for a ranged emplacement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmplacementTuning {
    /// Targeting radius.
    pub range: f32,
    /// Damage carried by each projectile.
    pub damage: f32,
    /// Length of one attack cycle, in seconds.
    pub attack_interval_secs: f32,
    /// Number of attack slots fired in round-robin order.
    pub slots: u32,
    /// Pool the projectiles are drawn from.
    pub projectile: ProjectileKind,
    /// Flight model of the projectiles.
    pub mode: FlightMode,
    /// Arc and speed envelope of the projectiles.
    pub flight: FlightTuning,
}

impl EmplacementTuning {
    /// Length of one attack cycle.
    #[must_use]
    pub fn attack_interval(&self) -> Duration {
        seconds(self.attack_interval_secs)
    }
}

impl Default for EmplacementTuning {
    fn default() -> Self {
        Self {
            range: 6.0,
            damage: 15.0,
            attack_interval_secs: 1.0,
            slots: 1,
            projectile: ProjectileKind::Arrow,
            mode: FlightMode::PointSeeking,
            flight: FlightTuning::default(),
        }
    }
}

/// Placement-time tuning for a melee squad coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorTuning {
    /// Radius around the anchor scanned for travelers.
    pub detection_radius: f32,
    /// Period of the detection loop, in seconds.
    pub detection_period_secs: f32,
    /// Period of the assist loop, in seconds.
    pub assist_period_secs: f32,
    /// Period of the reconciliation loop, in seconds.
    pub reconciliation_period_secs: f32,
}

impl CoordinatorTuning {
    /// Period of the detection loop.
    #[must_use]
    pub fn detection_period(&self) -> Duration {
        seconds(self.detection_period_secs)
    }

    /// Period of the assist loop.
    #[must_use]
    pub fn assist_period(&self) -> Duration {
        seconds(self.assist_period_secs)
    }

    /// Period of the reconciliation loop.
    #[must_use]
    pub fn reconciliation_period(&self) -> Duration {
        seconds(self.reconciliation_period_secs)
    }
}

impl Default for CoordinatorTuning {
    fn default() -> Self {
        Self {
            detection_radius: 5.0,
            detection_period_secs: 0.5,
            assist_period_secs: 0.5,
            reconciliation_period_secs: 0.25,
        }
    }
}

/// Converts seconds into a duration, treating invalid input as zero.
fn seconds(value: f32) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f32(value).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
