//! Coordinator rosters and the authoritative claim registry.
//!
//! Every main-combat pairing is recorded twice: in its coordinator's
//! `active_combats` (keyed by unit) and in the registry-wide `claims` table
//! (keyed by traveler). Claims are compare-and-swap: a traveler that already
//! has an entry in `claims` cannot be claimed again until it is released.

use std::collections::BTreeMap;

use glam::Vec3;
use lane_defence_core::{
    ClaimRejection, CoordinatorId, CoordinatorSnapshot, CoordinatorTuning, EntityId, SpawnError,
};

/// Snapshot of a coordinator stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct CoordinatorState {
    pub(crate) id: CoordinatorId,
    pub(crate) anchor: Vec3,
    pub(crate) tuning: CoordinatorTuning,
    roster: Vec<EntityId>,
    /// Main pairings keyed by unit.
    active_combats: BTreeMap<EntityId, EntityId>,
}

impl CoordinatorState {
    fn new(id: CoordinatorId, anchor: Vec3, tuning: CoordinatorTuning) -> Self {
        Self {
            id,
            anchor,
            tuning,
            roster: Vec::new(),
            active_combats: BTreeMap::new(),
        }
    }

    pub(crate) fn has_member(&self, unit: EntityId) -> bool {
        self.roster.contains(&unit)
    }

    pub(crate) fn is_main_combatant(&self, unit: EntityId) -> bool {
        self.active_combats.contains_key(&unit)
    }

    pub(crate) fn pairing(&self, unit: EntityId) -> Option<EntityId> {
        self.active_combats.get(&unit).copied()
    }

    pub(crate) fn snapshot(&self) -> CoordinatorSnapshot {
        let mut roster = self.roster.clone();
        roster.sort_unstable();
        CoordinatorSnapshot {
            id: self.id,
            anchor: self.anchor,
            tuning: self.tuning,
            roster,
            active_combats: self
                .active_combats
                .iter()
                .map(|(unit, traveler)| (*unit, *traveler))
                .collect(),
        }
    }
}

/// Registry that stores coordinators and the claim table.
#[derive(Debug)]
pub(crate) struct SquadRegistry {
    coordinators: BTreeMap<CoordinatorId, CoordinatorState>,
    /// Holder of every claimed traveler, as `(coordinator, unit)`.
    claims: BTreeMap<EntityId, (CoordinatorId, EntityId)>,
    next_coordinator_id: CoordinatorId,
}

impl SquadRegistry {
    pub(crate) fn new() -> Self {
        Self {
            coordinators: BTreeMap::new(),
            claims: BTreeMap::new(),
            next_coordinator_id: CoordinatorId::new(0),
        }
    }

    /// Validates the tuning and stores a new coordinator with an empty roster.
    pub(crate) fn place(
        &mut self,
        anchor: Vec3,
        tuning: CoordinatorTuning,
    ) -> Result<CoordinatorId, SpawnError> {
        if !anchor.is_finite() {
            return Err(SpawnError::NonFinitePosition);
        }
        if !tuning.detection_radius.is_finite() || tuning.detection_radius < 0.0 {
            return Err(SpawnError::InvalidRange);
        }
        let periods = [
            tuning.detection_period_secs,
            tuning.assist_period_secs,
            tuning.reconciliation_period_secs,
        ];
        if periods.iter().any(|period| !period.is_finite() || *period < 0.0) {
            return Err(SpawnError::InvalidInterval);
        }

        let id = self.next_coordinator_id;
        self.next_coordinator_id = CoordinatorId::new(id.get().saturating_add(1));
        let _ = self
            .coordinators
            .insert(id, CoordinatorState::new(id, anchor, tuning));
        Ok(id)
    }

    pub(crate) fn get(&self, id: CoordinatorId) -> Option<&CoordinatorState> {
        self.coordinators.get(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &CoordinatorState> {
        self.coordinators.values()
    }

    /// Adds a freshly spawned unit to a coordinator's roster.
    pub(crate) fn enlist(&mut self, coordinator: CoordinatorId, unit: EntityId) -> bool {
        match self.coordinators.get_mut(&coordinator) {
            Some(state) => {
                state.roster.push(unit);
                true
            }
            None => false,
        }
    }

    /// Coordinator currently holding a claim on the traveler.
    pub(crate) fn holder(&self, traveler: EntityId) -> Option<CoordinatorId> {
        self.claims.get(&traveler).map(|(coordinator, _)| *coordinator)
    }

    /// Records `(unit, traveler)` unless the traveler is already claimed.
    ///
    /// The caller validates liveness; this only enforces roster membership
    /// and uniqueness of keys and values.
    pub(crate) fn try_claim(
        &mut self,
        coordinator: CoordinatorId,
        unit: EntityId,
        traveler: EntityId,
    ) -> Result<(), ClaimRejection> {
        if let Some(holder) = self.holder(traveler) {
            return Err(ClaimRejection::AlreadyClaimed { holder });
        }
        let state = self
            .coordinators
            .get_mut(&coordinator)
            .ok_or(ClaimRejection::UnknownCoordinator)?;
        if !state.has_member(unit) {
            return Err(ClaimRejection::NotInRoster);
        }
        if state.is_main_combatant(unit) {
            return Err(ClaimRejection::UnitUnavailable);
        }

        let _ = state.active_combats.insert(unit, traveler);
        let _ = self.claims.insert(traveler, (coordinator, unit));
        Ok(())
    }

    /// Removes the pairing keyed by `unit`, returning its traveler.
    pub(crate) fn release(
        &mut self,
        coordinator: CoordinatorId,
        unit: EntityId,
    ) -> Option<EntityId> {
        let traveler = self
            .coordinators
            .get_mut(&coordinator)?
            .active_combats
            .remove(&unit)?;
        let _ = self.claims.remove(&traveler);
        Some(traveler)
    }

    /// Re-keys the pairing held by `fallen` onto `successor`.
    pub(crate) fn promote(
        &mut self,
        coordinator: CoordinatorId,
        fallen: EntityId,
        successor: EntityId,
    ) -> Result<EntityId, ClaimRejection> {
        let state = self
            .coordinators
            .get_mut(&coordinator)
            .ok_or(ClaimRejection::UnknownCoordinator)?;
        if !state.has_member(successor) {
            return Err(ClaimRejection::NotInRoster);
        }
        if state.is_main_combatant(successor) {
            return Err(ClaimRejection::UnitUnavailable);
        }
        let traveler = state
            .active_combats
            .remove(&fallen)
            .ok_or(ClaimRejection::NotInRoster)?;

        let _ = state.active_combats.insert(successor, traveler);
        let _ = self.claims.insert(traveler, (coordinator, successor));
        Ok(traveler)
    }

    /// Drops a despawned unit from its roster.
    ///
    /// A pairing the unit still keys stays in place, along with its claim,
    /// so reconciliation can promote an assisting unit or release it.
    pub(crate) fn discharge(&mut self, coordinator: CoordinatorId, unit: EntityId) {
        if let Some(state) = self.coordinators.get_mut(&coordinator) {
            state.roster.retain(|member| *member != unit);
        }
    }
}
