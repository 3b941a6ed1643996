//! Read-only snapshots that systems query between commands.

use glam::Vec3;

use crate::{
    CoordinatorId, CoordinatorTuning, EmplacementId, EntityId, EntityKind, EntityState,
    ProjectileId,
};

/// Immutable representation of a single entity's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySnapshot {
    /// Handle of the entity.
    pub id: EntityId,
    /// Role of the entity.
    pub kind: EntityKind,
    /// Current combat state.
    pub state: EntityState,
    /// World position.
    pub position: Vec3,
    /// Displacement per second during the last step.
    pub velocity: Vec3,
    /// Current health.
    pub health: f32,
    /// Upper bound of the health pool.
    pub max_health: f32,
    /// Current combat target, if any.
    pub target: Option<EntityId>,
    /// Coordinator the entity belongs to, for melee units.
    pub coordinator: Option<CoordinatorId>,
    /// Remaining path length to the goal, for travelers.
    pub remaining_distance: Option<f32>,
    /// Whether defenders may engage the entity.
    pub engageable: bool,
}

impl EntitySnapshot {
    /// Reports whether the entity is still a valid participant in combat.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state != EntityState::Dead
    }

    /// Reports whether the entity is a live traveler that defenders may target.
    #[must_use]
    pub fn is_engageable_traveler(&self) -> bool {
        self.kind == EntityKind::Traveler && self.engageable && self.is_alive()
    }
}

/// Read-only snapshot describing every entity in the arena.
#[derive(Clone, Debug, Default)]
pub struct EntityView {
    snapshots: Vec<EntitySnapshot>,
}

impl EntityView {
    /// Creates a new entity view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EntitySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots.iter()
    }

    /// Iterator over live, engageable travelers in ascending handle order.
    pub fn engageable_travelers(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots
            .iter()
            .filter(|snapshot| snapshot.is_engageable_traveler())
    }

    /// Looks up a snapshot by handle. Stale handles resolve to `None`.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Reports whether the handle resolves to a live entity.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(EntitySnapshot::is_alive)
    }
}

/// Immutable representation of a single emplacement used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct EmplacementSnapshot {
    /// Identifier of the emplacement.
    pub id: EmplacementId,
    /// World position of the emplacement.
    pub position: Vec3,
    /// Targeting radius.
    pub range: f32,
    /// Damage carried by each projectile.
    pub damage: f32,
    /// Target held since the previous cycle.
    pub current_target: Option<EntityId>,
    /// Whether the attack cycle is due this tick.
    pub ready: bool,
    /// Whether the emplacement is mid-upgrade.
    pub disabled: bool,
}

/// Read-only snapshot describing every emplacement.
#[derive(Clone, Debug, Default)]
pub struct EmplacementView {
    snapshots: Vec<EmplacementSnapshot>,
}

impl EmplacementView {
    /// Creates a new emplacement view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EmplacementSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &EmplacementSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a snapshot by identifier.
    #[must_use]
    pub fn get(&self, id: EmplacementId) -> Option<&EmplacementSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }
}

/// Outcome of one emplacement targeting pass.
#[derive(Clone, Debug, PartialEq)]
pub struct EmplacementTarget {
    /// Emplacement whose cycle ran.
    pub emplacement: EmplacementId,
    /// Travelers found within range, in ascending handle order.
    pub candidates: Vec<EntityId>,
    /// Target retained or selected, always a member of `candidates`.
    pub target: Option<EntityId>,
}

/// Immutable representation of an in-flight projectile used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectileSnapshot {
    /// Handle of the projectile.
    pub id: ProjectileId,
    /// Traveler the projectile was fired at.
    pub aimed_at: Option<EntityId>,
    /// Damage carried by the projectile.
    pub damage: f32,
    /// Flight progress in `[0, 1]`.
    pub progress: f32,
    /// Current position along the arc.
    pub position: Vec3,
}

/// Read-only snapshot describing every projectile still in flight.
#[derive(Clone, Debug, Default)]
pub struct ProjectileView {
    snapshots: Vec<ProjectileSnapshot>,
}

impl ProjectileView {
    /// Creates a new projectile view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<ProjectileSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &ProjectileSnapshot> {
        self.snapshots.iter()
    }

    /// Iterator over projectiles aimed at the provided traveler.
    pub fn aimed_at(&self, traveler: EntityId) -> impl Iterator<Item = &ProjectileSnapshot> {
        self.snapshots
            .iter()
            .filter(move |snapshot| snapshot.aimed_at == Some(traveler))
    }
}

/// Immutable representation of a melee squad coordinator used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinatorSnapshot {
    /// Identifier of the coordinator.
    pub id: CoordinatorId,
    /// Anchor around which travelers are detected.
    pub anchor: Vec3,
    /// Detection radius and loop periods.
    pub tuning: CoordinatorTuning,
    /// Units bound to the coordinator, in ascending handle order.
    pub roster: Vec<EntityId>,
    /// Main-combat pairings as `(unit, traveler)`, in ascending unit order.
    pub active_combats: Vec<(EntityId, EntityId)>,
}

impl CoordinatorSnapshot {
    /// Reports whether the unit keys one of this coordinator's pairings.
    #[must_use]
    pub fn is_main_combatant(&self, unit: EntityId) -> bool {
        self.active_combats.iter().any(|(key, _)| *key == unit)
    }
}

/// Read-only snapshot describing every coordinator.
#[derive(Clone, Debug, Default)]
pub struct CoordinatorView {
    snapshots: Vec<CoordinatorSnapshot>,
}

impl CoordinatorView {
    /// Creates a new coordinator view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<CoordinatorSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &CoordinatorSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a snapshot by identifier.
    #[must_use]
    pub fn get(&self, id: CoordinatorId) -> Option<&CoordinatorSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Returns the coordinator holding a main-combat claim on the traveler.
    #[must_use]
    pub fn claim_holder(&self, traveler: EntityId) -> Option<CoordinatorId> {
        self.snapshots
            .iter()
            .find(|snapshot| {
                snapshot
                    .active_combats
                    .iter()
                    .any(|(_, claimed)| *claimed == traveler)
            })
            .map(|snapshot| snapshot.id)
    }
}
