//! Pooled projectiles and their flight integration.
//!
//! Every projectile kind owns its own pool. A landed projectile lingers for a
//! short settle delay before its slot returns to the free list; acquiring a
//! slot always builds a fresh projectile so nothing leaks between shots.

use std::{collections::BTreeMap, time::Duration};

use glam::Vec3;
use lane_defence_core::{
    EntityId, FlightMode, FlightTuning, ProjectileDestination, ProjectileId, ProjectileKind,
    ProjectileSnapshot,
};
use lane_defence_system_ballistics::Flight;

use crate::arena::{Arena, Handle};

/// Time a landed projectile stays reserved before its slot is reused.
pub(crate) const SETTLE_DELAY: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug)]
struct SlotKey {
    index: u32,
    generation: u32,
}

impl Handle for SlotKey {
    fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    fn slot(&self) -> u32 {
        self.index
    }

    fn issued_generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    InFlight,
    Settling { remaining: Duration },
}

/// Everything needed to launch a projectile.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Launch {
    pub(crate) source: Vec3,
    pub(crate) destination: ProjectileDestination,
    pub(crate) initial_point: Vec3,
    pub(crate) aimed_at: Option<EntityId>,
    pub(crate) damage: f32,
    pub(crate) mode: FlightMode,
    pub(crate) tuning: FlightTuning,
}

#[derive(Clone, Debug)]
struct Projectile {
    flight: Flight,
    destination: ProjectileDestination,
    last_known: Vec3,
    aimed_at: Option<EntityId>,
    damage: f32,
    mode: FlightMode,
    tuning: FlightTuning,
    position: Vec3,
    phase: Phase,
}

impl Projectile {
    fn launch(spec: Launch) -> Self {
        Self {
            flight: Flight::launch(spec.source),
            destination: spec.destination,
            last_known: spec.initial_point,
            aimed_at: spec.aimed_at,
            damage: spec.damage,
            mode: spec.mode,
            tuning: spec.tuning,
            position: spec.source,
            phase: Phase::InFlight,
        }
    }
}

/// A projectile reaching the end of its arc this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Landing {
    /// Point-seeking impact; the target must be re-validated.
    Seeking {
        projectile: ProjectileId,
        target: EntityId,
        point: Vec3,
        damage: f32,
    },
    /// Area impact at a fixed point.
    Splash {
        projectile: ProjectileId,
        point: Vec3,
        damage: f32,
        radius: f32,
    },
}

#[derive(Debug)]
struct ProjectilePool {
    kind: ProjectileKind,
    arena: Arena<SlotKey, Projectile>,
}

impl ProjectilePool {
    fn new(kind: ProjectileKind) -> Self {
        Self {
            kind,
            arena: Arena::new(),
        }
    }

    fn id(&self, key: SlotKey) -> ProjectileId {
        ProjectileId::new(self.kind, key.index, key.generation)
    }

    fn advance<F>(&mut self, dt: Duration, locate: &F, landings: &mut Vec<Landing>)
    where
        F: Fn(EntityId) -> Option<Vec3>,
    {
        for key in self.arena.handles() {
            let id = self.id(key);
            let Some(projectile) = self.arena.get_mut(key) else {
                continue;
            };

            match projectile.phase {
                Phase::Settling { remaining } => {
                    let remaining = remaining.saturating_sub(dt);
                    if remaining.is_zero() {
                        let _ = self.arena.remove(key);
                    } else {
                        projectile.phase = Phase::Settling { remaining };
                    }
                }
                Phase::InFlight => {
                    let destination = match projectile.destination {
                        ProjectileDestination::Target(target) => {
                            if let Some(position) = locate(target) {
                                projectile.last_known = position;
                            }
                            projectile.last_known
                        }
                        ProjectileDestination::Point(point) => point,
                    };

                    let sample = projectile
                        .flight
                        .advance(destination, dt, &projectile.tuning);
                    projectile.position = sample.position;
                    if !sample.landed {
                        continue;
                    }

                    projectile.phase = Phase::Settling {
                        remaining: SETTLE_DELAY,
                    };
                    landings.push(match (projectile.destination, projectile.mode) {
                        (ProjectileDestination::Target(target), _) => Landing::Seeking {
                            projectile: id,
                            target,
                            point: destination,
                            damage: projectile.damage,
                        },
                        (ProjectileDestination::Point(_), mode) => Landing::Splash {
                            projectile: id,
                            point: destination,
                            damage: projectile.damage,
                            radius: match mode {
                                FlightMode::FixedDestination { splash_radius } => splash_radius,
                                FlightMode::PointSeeking => 0.0,
                            },
                        },
                    });
                }
            }
        }
    }
}

/// One pool per projectile kind.
#[derive(Debug)]
pub(crate) struct Projectiles {
    pools: BTreeMap<ProjectileKind, ProjectilePool>,
}

impl Projectiles {
    pub(crate) fn new() -> Self {
        Self {
            pools: ProjectileKind::ALL
                .into_iter()
                .map(|kind| (kind, ProjectilePool::new(kind)))
                .collect(),
        }
    }

    /// Acquires a slot from the kind's pool and launches a projectile in it.
    pub(crate) fn acquire(&mut self, kind: ProjectileKind, spec: Launch) -> ProjectileId {
        let pool = self
            .pools
            .entry(kind)
            .or_insert_with(|| ProjectilePool::new(kind));
        let key = pool.arena.insert_with(|_| Projectile::launch(spec));
        pool.id(key)
    }

    /// Integrates every in-flight projectile and releases settled ones.
    ///
    /// `locate` resolves the live position of point-seeking targets; `None`
    /// leaves the projectile flying to the target's last known position.
    pub(crate) fn advance<F>(&mut self, dt: Duration, locate: F) -> Vec<Landing>
    where
        F: Fn(EntityId) -> Option<Vec3>,
    {
        let mut landings = Vec::new();
        for pool in self.pools.values_mut() {
            pool.advance(dt, &locate, &mut landings);
        }
        landings
    }

    /// Snapshots of projectiles still in flight.
    pub(crate) fn snapshots(&self) -> Vec<ProjectileSnapshot> {
        self.pools
            .values()
            .flat_map(|pool| {
                pool.arena
                    .iter()
                    .filter(|(_, projectile)| projectile.phase == Phase::InFlight)
                    .map(|(key, projectile)| ProjectileSnapshot {
                        id: pool.id(key),
                        aimed_at: projectile.aimed_at,
                        damage: projectile.damage,
                        progress: projectile.flight.progress(),
                        position: projectile.position,
                    })
            })
            .collect()
    }

    /// Slots ever allocated by the kind's pool.
    pub(crate) fn capacity(&self, kind: ProjectileKind) -> usize {
        self.pools.get(&kind).map_or(0, |pool| pool.arena.capacity())
    }

    /// Slots currently reserved (in flight or settling) by the kind's pool.
    pub(crate) fn reserved(&self, kind: ProjectileKind) -> usize {
        self.pools.get(&kind).map_or(0, |pool| pool.arena.len())
    }
}
