//! Scenario files describing the lane layout, the defence and the spawn cadence.

use std::{fs, path::Path, time::Duration};

use anyhow::{ensure, Context, Result};
use glam::Vec3;
use lane_defence_core::{
    CoordinatorTuning, EmplacementTuning, EntityStats, FlightMode, ProjectileKind, TravelerTuning,
};
use serde::{Deserialize, Serialize};

/// Complete description of a simulation run.
///
/// Sections missing from a scenario file fall back to the built-in scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Scenario {
    /// Lane the travelers walk.
    pub(crate) lane: LaneLayout,
    /// Cadence and number of traveler spawns.
    pub(crate) spawns: SpawnSchedule,
    /// Tuning injected into every spawned traveler.
    pub(crate) traveler: TravelerTuning,
    /// Ranged emplacements placed before the first tick.
    pub(crate) emplacements: Vec<EmplacementLayout>,
    /// Melee squads placed before the first tick.
    pub(crate) squads: Vec<SquadLayout>,
}

/// Lane geometry handed to the path provider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LaneLayout {
    /// Where travelers enter the lane.
    pub(crate) start: Vec3,
    /// Where travelers breach.
    pub(crate) goal: Vec3,
    /// Number of segments between start and goal.
    pub(crate) segments: u32,
    /// Maximum sideways offset applied to interior waypoints.
    pub(crate) jitter: f32,
}

/// Fixed-interval spawn schedule.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SpawnSchedule {
    /// Seconds between consecutive spawns.
    pub(crate) interval_secs: f32,
    /// Total number of travelers spawned.
    pub(crate) count: u32,
}

impl SpawnSchedule {
    /// Interval between spawns. Invalid intervals release every spawn at once.
    pub(crate) fn interval(&self) -> Duration {
        Duration::try_from_secs_f32(self.interval_secs).unwrap_or(Duration::ZERO)
    }
}

/// Emplacement placed at a fixed position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct EmplacementLayout {
    /// World position.
    pub(crate) position: Vec3,
    /// Placement tuning.
    #[serde(default)]
    pub(crate) tuning: EmplacementTuning,
}

/// Coordinator together with the units enlisted in its roster.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct SquadLayout {
    /// Anchor of the coordinator and home of its units.
    pub(crate) anchor: Vec3,
    /// Number of melee units enlisted at start.
    #[serde(default = "default_squad_size")]
    pub(crate) units: u32,
    /// Detection radius and loop periods.
    #[serde(default)]
    pub(crate) tuning: CoordinatorTuning,
    /// Stats shared by every unit of the squad.
    #[serde(default)]
    pub(crate) stats: EntityStats,
}

fn default_squad_size() -> u32 {
    3
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            lane: LaneLayout::default(),
            spawns: SpawnSchedule::default(),
            traveler: TravelerTuning::default(),
            emplacements: vec![
                EmplacementLayout {
                    position: Vec3::new(-3.0, 0.0, -4.0),
                    tuning: EmplacementTuning::default(),
                },
                EmplacementLayout {
                    position: Vec3::new(3.0, 0.0, 2.0),
                    tuning: EmplacementTuning {
                        range: 7.0,
                        damage: 30.0,
                        attack_interval_secs: 3.0,
                        projectile: ProjectileKind::Shell,
                        mode: FlightMode::FixedDestination { splash_radius: 1.5 },
                        ..EmplacementTuning::default()
                    },
                },
            ],
            squads: vec![SquadLayout {
                anchor: Vec3::new(0.0, 0.0, 7.0),
                units: default_squad_size(),
                tuning: CoordinatorTuning::default(),
                stats: EntityStats::default(),
            }],
        }
    }
}

impl Default for LaneLayout {
    fn default() -> Self {
        Self {
            start: Vec3::new(0.0, 0.0, -15.0),
            goal: Vec3::new(0.0, 0.0, 15.0),
            segments: 6,
            jitter: 1.0,
        }
    }
}

impl Default for SpawnSchedule {
    fn default() -> Self {
        Self {
            interval_secs: 2.0,
            count: 12,
        }
    }
}

impl Scenario {
    /// Loads the scenario stored at `path`, or the built-in scenario when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            log::info!("no scenario file given, running the built-in scenario");
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Parses and validates a scenario from TOML text.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(contents).context("malformed scenario TOML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.lane.start.is_finite() && self.lane.goal.is_finite(),
            "lane endpoints must be finite"
        );
        ensure!(self.lane.segments > 0, "lane needs at least one segment");
        ensure!(
            self.lane.jitter.is_finite() && self.lane.jitter >= 0.0,
            "lane jitter must be a non-negative number"
        );
        ensure!(
            self.spawns.interval_secs.is_finite() && self.spawns.interval_secs > 0.0,
            "spawn interval must be positive"
        );
        Ok(())
    }
}
