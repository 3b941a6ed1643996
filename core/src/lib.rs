#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Lane Defence combat engine.
//!
//! This crate defines the message surface that connects the simulation driver,
//! the authoritative world, and pure systems. Drivers and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! on the combat event bus. Systems consume event streams, query immutable
//! views, and respond exclusively with new command batches.

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod tuning;
mod views;

pub use tuning::{
    CoordinatorTuning, EmplacementTuning, EntityStats, FlightMode, FlightTuning, TravelerTuning,
};
pub use views::{
    CoordinatorSnapshot, CoordinatorView, EmplacementSnapshot, EmplacementTarget,
    EmplacementView, EntitySnapshot, EntityView, ProjectileSnapshot, ProjectileView,
};

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests that a traveler enter the lane at the head of its path.
    SpawnTraveler {
        /// Ordered waypoints produced by the path provider.
        waypoints: Vec<Vec3>,
        /// Stats and reward injected by the spawn scheduler.
        tuning: TravelerTuning,
    },
    /// Requests that a melee unit join the roster of a coordinator.
    SpawnMeleeUnit {
        /// Coordinator that owns the new unit.
        coordinator: CoordinatorId,
        /// Home anchor the unit returns to when idle.
        anchor: Vec3,
        /// Combat stats for the unit.
        stats: EntityStats,
    },
    /// Requests placement of a ranged emplacement.
    PlaceEmplacement {
        /// World position of the emplacement.
        position: Vec3,
        /// Tuning injected at placement time.
        tuning: EmplacementTuning,
    },
    /// Disables an emplacement for the upgrade duration, then applies new tuning.
    UpgradeEmplacement {
        /// Emplacement being upgraded.
        emplacement: EmplacementId,
        /// Tuning that takes effect once the upgrade completes.
        tuning: EmplacementTuning,
        /// Time the emplacement stays disabled.
        duration: Duration,
    },
    /// Requests placement of a melee squad coordinator.
    PlaceCoordinator {
        /// Anchor around which the squad detects travelers.
        anchor: Vec3,
        /// Detection radius and loop periods.
        tuning: CoordinatorTuning,
    },
    /// Orders an entity to engage a new combat target.
    ///
    /// A missing target is rejected as a no-op.
    SetCombatTarget {
        /// Entity receiving the order.
        entity: EntityId,
        /// Target to engage.
        target: Option<EntityId>,
    },
    /// Orders an entity to drop its combat target and resume its default routine.
    ExitEngagement {
        /// Entity leaving combat.
        entity: EntityId,
    },
    /// Applies raw damage to an entity. Negative amounts heal.
    ApplyDamage {
        /// Entity receiving the damage.
        entity: EntityId,
        /// Amount of health removed.
        amount: f32,
    },
    /// Records the outcome of an emplacement targeting pass.
    AcquireTarget {
        /// Emplacement whose cycle ran.
        emplacement: EmplacementId,
        /// Travelers found within range this cycle.
        candidates: Vec<EntityId>,
        /// Target retained or selected from the candidates.
        target: Option<EntityId>,
    },
    /// Fires the next attack slot of an emplacement at its current target.
    FireProjectile {
        /// Emplacement that fires.
        emplacement: EmplacementId,
        /// Traveler the projectile is aimed at.
        target: EntityId,
    },
    /// Consumes an emplacement cycle without firing.
    HoldFire {
        /// Emplacement that stays silent this cycle.
        emplacement: EmplacementId,
    },
    /// Attempts to register a main-combat pairing for a coordinator.
    ClaimTraveler {
        /// Coordinator issuing the claim.
        coordinator: CoordinatorId,
        /// Idle unit that becomes the main combatant.
        unit: EntityId,
        /// Traveler being claimed.
        traveler: EntityId,
    },
    /// Removes the main-combat pairing keyed by the provided unit.
    ReleaseClaim {
        /// Coordinator that owns the pairing.
        coordinator: CoordinatorId,
        /// Unit keying the pairing.
        unit: EntityId,
    },
    /// Replaces a fallen main combatant with an assisting unit.
    PromoteAssist {
        /// Coordinator that owns the pairing.
        coordinator: CoordinatorId,
        /// Main combatant that is no longer live.
        fallen: EntityId,
        /// Assisting unit taking over the pairing.
        successor: EntityId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a traveler entered the lane.
    TravelerSpawned {
        /// Identifier assigned to the traveler.
        entity: EntityId,
        /// Position of the first waypoint.
        position: Vec3,
    },
    /// Confirms that a melee unit joined a roster.
    MeleeUnitSpawned {
        /// Identifier assigned to the unit.
        entity: EntityId,
        /// Coordinator owning the unit.
        coordinator: CoordinatorId,
    },
    /// Reports that a spawn request was aborted.
    SpawnRejected {
        /// Reason the spawn was aborted.
        reason: SpawnError,
    },
    /// Confirms that an emplacement was placed.
    EmplacementPlaced {
        /// Identifier assigned to the emplacement.
        emplacement: EmplacementId,
    },
    /// Confirms that an emplacement finished upgrading and is armed again.
    EmplacementUpgraded {
        /// Emplacement that finished upgrading.
        emplacement: EmplacementId,
    },
    /// Confirms that a coordinator was placed.
    CoordinatorPlaced {
        /// Identifier assigned to the coordinator.
        coordinator: CoordinatorId,
    },
    /// Announces that an entity started a new attack cycle.
    EngagementStarted {
        /// Entity that engaged.
        entity: EntityId,
        /// Target of the engagement.
        target: EntityId,
    },
    /// Announces that an entity left combat.
    EngagementEnded {
        /// Entity that disengaged.
        entity: EntityId,
    },
    /// Reports a melee strike landing at the end of a windup.
    AttackLanded {
        /// Entity that struck.
        attacker: EntityId,
        /// Entity that was struck.
        target: EntityId,
        /// Damage dealt.
        damage: f32,
    },
    /// Announces the death of an entity. Published exactly once per entity.
    EntityKilled {
        /// Entity that died.
        entity: EntityId,
        /// Kind of entity that died.
        kind: EntityKind,
        /// Reward granted for the kill.
        reward: u32,
    },
    /// Announces that a dead entity finished its death sequence and was removed.
    EntityDespawned {
        /// Entity that was removed.
        entity: EntityId,
    },
    /// Announces that a traveler reached the goal and left the lane.
    EndpointReached {
        /// Traveler that breached the goal.
        entity: EntityId,
    },
    /// Requests that presentation layers spawn a projectile.
    ProjectileSpawnRequest {
        /// Pooled projectile backing the request.
        projectile: ProjectileId,
        /// Visual type of the projectile.
        kind: ProjectileKind,
        /// Launch position.
        source: Vec3,
        /// Damage carried by the projectile.
        damage: f32,
        /// Live target or fixed landing point.
        destination: ProjectileDestination,
    },
    /// Reports a projectile impact that damaged one or more entities.
    ProjectileImpact {
        /// Projectile that landed.
        projectile: ProjectileId,
        /// Landing position.
        point: Vec3,
        /// Damage applied to each entity hit.
        hits: Vec<ProjectileHit>,
    },
    /// Reports a projectile that landed without dealing damage.
    ProjectileMissed {
        /// Projectile that landed.
        projectile: ProjectileId,
        /// Landing position.
        point: Vec3,
    },
    /// Confirms a new main-combat pairing.
    ClaimEstablished {
        /// Coordinator owning the pairing.
        coordinator: CoordinatorId,
        /// Main combatant.
        unit: EntityId,
        /// Claimed traveler.
        traveler: EntityId,
    },
    /// Reports that a claim attempt failed.
    ClaimRejected {
        /// Coordinator that attempted the claim.
        coordinator: CoordinatorId,
        /// Unit proposed as main combatant.
        unit: EntityId,
        /// Traveler that was requested.
        traveler: EntityId,
        /// Reason the claim failed.
        reason: ClaimRejection,
    },
    /// Confirms that a pairing was removed.
    ClaimReleased {
        /// Coordinator that owned the pairing.
        coordinator: CoordinatorId,
        /// Unit that keyed the pairing.
        unit: EntityId,
        /// Traveler that was released.
        traveler: EntityId,
    },
    /// Confirms that an assisting unit replaced a fallen main combatant.
    ClaimPromoted {
        /// Coordinator owning the pairing.
        coordinator: CoordinatorId,
        /// Main combatant that fell.
        fallen: EntityId,
        /// Unit promoted to main combatant.
        successor: EntityId,
        /// Traveler of the pairing.
        traveler: EntityId,
    },
}

/// Generation-checked handle into the entity arena.
///
/// A handle whose slot has since been reused carries a stale generation and
/// never resolves to the new occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    /// Creates a handle from a slot index and its generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the arena.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Unique identifier assigned to an emplacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmplacementId(u32);

impl EmplacementId {
    /// Creates a new emplacement identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a melee squad coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoordinatorId(u32);

impl CoordinatorId {
    /// Creates a new coordinator identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Handle to a pooled projectile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectileId {
    kind: ProjectileKind,
    index: u32,
    generation: u32,
}

impl ProjectileId {
    /// Creates a handle from the pool kind, slot index and slot generation.
    #[must_use]
    pub const fn new(kind: ProjectileKind, index: u32, generation: u32) -> Self {
        Self {
            kind,
            index,
            generation,
        }
    }

    /// Pool the projectile belongs to.
    #[must_use]
    pub const fn kind(&self) -> ProjectileKind {
        self.kind
    }

    /// Slot index inside the pool.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when the projectile was acquired.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Projectile types, each backed by its own pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    /// Light single-target projectile.
    Arrow,
    /// Heavy single-target projectile.
    Bolt,
    /// Lobbed area projectile.
    Shell,
}

impl ProjectileKind {
    /// Every projectile kind, in pool order.
    pub const ALL: [ProjectileKind; 3] = [Self::Arrow, Self::Bolt, Self::Shell];
}

/// Where a projectile is headed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProjectileDestination {
    /// Tracks the live position of an entity.
    Target(EntityId),
    /// Flies to a precomputed landing point.
    Point(Vec3),
}

/// Damage dealt to a single entity by a projectile impact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectileHit {
    /// Entity that was hit.
    pub entity: EntityId,
    /// Damage applied after falloff.
    pub damage: f32,
}

/// Role of an entity on the battlefield.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Hostile unit walking a waypoint path toward the goal.
    Traveler,
    /// Defending unit bound to a squad coordinator.
    MeleeUnit,
}

/// Combat state machine of an entity. `Dead` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Standing still without a target.
    Idle,
    /// Walking a path, returning to an anchor, or closing on a target.
    Moving,
    /// Within attack range of its target.
    Engaging,
    /// Killed; the entity ignores every further operation.
    Dead,
}

/// Reasons a spawn or placement request is aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// The path provider returned no waypoints.
    #[error("traveler path contains no waypoints")]
    EmptyPath,
    /// A waypoint or anchor contained a non-finite coordinate.
    #[error("position contains a non-finite coordinate")]
    NonFinitePosition,
    /// Maximum health was zero, negative or not finite.
    #[error("maximum health must be positive and finite")]
    InvalidHealth,
    /// Range or radius was negative or not finite.
    #[error("range must be non-negative and finite")]
    InvalidRange,
    /// An interval or period was negative or not finite.
    #[error("intervals must be non-negative and finite")]
    InvalidInterval,
    /// An emplacement was configured without attack slots.
    #[error("emplacement requires at least one attack slot")]
    NoAttackSlots,
    /// The referenced coordinator does not exist.
    #[error("coordinator {0:?} does not exist")]
    UnknownCoordinator(CoordinatorId),
}

/// Reasons a claim or promotion is refused by the authoritative registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ClaimRejection {
    /// Another pairing already holds the traveler.
    #[error("traveler already claimed by coordinator {holder:?}")]
    AlreadyClaimed {
        /// Coordinator owning the existing pairing.
        holder: CoordinatorId,
    },
    /// The traveler is dead, gone, or not engageable.
    #[error("traveler is not available for melee engagement")]
    TravelerUnavailable,
    /// The unit is dead, gone, busy, or already a main combatant.
    #[error("unit is not idle")]
    UnitUnavailable,
    /// The unit does not belong to the coordinator's roster.
    #[error("unit is not on the coordinator's roster")]
    NotInRoster,
    /// The coordinator does not exist.
    #[error("coordinator does not exist")]
    UnknownCoordinator,
}
