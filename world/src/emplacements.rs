//! Authoritative emplacement state management utilities.

use std::{collections::BTreeMap, f32::consts::TAU, time::Duration};

use glam::Vec3;
use lane_defence_core::{
    EmplacementId, EmplacementSnapshot, EmplacementTuning, EntityId, SpawnError,
};

/// Height above the emplacement origin that projectiles launch from.
const MUZZLE_HEIGHT: f32 = 1.0;
/// Horizontal spread of attack slots around the muzzle.
const SLOT_RING_RADIUS: f32 = 0.25;

#[derive(Clone, Copy, Debug)]
struct PendingUpgrade {
    remaining: Duration,
    tuning: EmplacementTuning,
}

/// Snapshot of an emplacement stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct EmplacementState {
    pub(crate) id: EmplacementId,
    pub(crate) position: Vec3,
    pub(crate) tuning: EmplacementTuning,
    /// Target held since the previous cycle. Always a member of `candidates`.
    pub(crate) current_target: Option<EntityId>,
    candidates: Vec<EntityId>,
    ready_in: Duration,
    next_slot: u32,
    upgrade: Option<PendingUpgrade>,
}

impl EmplacementState {
    fn new(id: EmplacementId, position: Vec3, tuning: EmplacementTuning) -> Self {
        Self {
            id,
            position,
            tuning,
            current_target: None,
            candidates: Vec::new(),
            ready_in: Duration::ZERO,
            next_slot: 0,
            upgrade: None,
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready_in.is_zero()
    }

    pub(crate) fn is_disabled(&self) -> bool {
        self.upgrade.is_some()
    }

    /// Stores the outcome of a targeting pass.
    ///
    /// A target outside the candidate set is dropped so the held target is
    /// always one of the candidates.
    pub(crate) fn acquire(&mut self, candidates: Vec<EntityId>, target: Option<EntityId>) {
        self.current_target = target.filter(|target| candidates.contains(target));
        if target.is_some() && self.current_target.is_none() {
            log::debug!(
                "emplacement {:?} dropped target {:?} outside its candidates",
                self.id,
                target
            );
        }
        self.candidates = candidates;
    }

    /// Removes a traveler that is no longer live from the held target and candidates.
    pub(crate) fn forget(&mut self, traveler: EntityId) {
        self.candidates.retain(|candidate| *candidate != traveler);
        if self.current_target == Some(traveler) {
            self.current_target = None;
        }
    }

    /// Consumes the cycle and returns the launch position of the next slot.
    pub(crate) fn fire(&mut self) -> Vec3 {
        let slots = self.tuning.slots.max(1);
        let slot = self.next_slot % slots;
        self.next_slot = (slot + 1) % slots;
        self.ready_in = self.tuning.attack_interval();

        let angle = TAU * slot as f32 / slots as f32;
        let ring = if slots > 1 {
            Vec3::new(angle.cos(), 0.0, angle.sin()) * SLOT_RING_RADIUS
        } else {
            Vec3::ZERO
        };
        self.position + Vec3::Y * MUZZLE_HEIGHT + ring
    }

    /// Consumes the cycle without firing.
    pub(crate) fn hold(&mut self) {
        self.ready_in = self.tuning.attack_interval();
    }

    pub(crate) fn begin_upgrade(&mut self, tuning: EmplacementTuning, duration: Duration) {
        self.upgrade = Some(PendingUpgrade {
            remaining: duration,
            tuning,
        });
    }

    /// Advances the cycle and upgrade countdowns.
    ///
    /// Returns `true` when a pending upgrade completed during this tick.
    fn advance(&mut self, dt: Duration) -> bool {
        self.ready_in = self.ready_in.saturating_sub(dt);

        let Some(mut upgrade) = self.upgrade else {
            return false;
        };
        upgrade.remaining = upgrade.remaining.saturating_sub(dt);
        if !upgrade.remaining.is_zero() {
            self.upgrade = Some(upgrade);
            return false;
        }

        self.upgrade = None;
        self.tuning = upgrade.tuning;
        self.next_slot = 0;
        self.ready_in = Duration::ZERO;
        true
    }

    pub(crate) fn snapshot(&self) -> EmplacementSnapshot {
        EmplacementSnapshot {
            id: self.id,
            position: self.position,
            range: self.tuning.range,
            damage: self.tuning.damage,
            current_target: self.current_target,
            ready: self.is_ready(),
            disabled: self.is_disabled(),
        }
    }
}

/// Registry that stores emplacements and manages identifier allocation.
#[derive(Debug)]
pub(crate) struct EmplacementRegistry {
    entries: BTreeMap<EmplacementId, EmplacementState>,
    next_emplacement_id: EmplacementId,
}

impl EmplacementRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_emplacement_id: EmplacementId::new(0),
        }
    }

    /// Validates the tuning and stores a new emplacement.
    pub(crate) fn place(
        &mut self,
        position: Vec3,
        tuning: EmplacementTuning,
    ) -> Result<EmplacementId, SpawnError> {
        if !position.is_finite() {
            return Err(SpawnError::NonFinitePosition);
        }
        validate(&tuning)?;

        let id = self.next_emplacement_id;
        self.next_emplacement_id = EmplacementId::new(id.get().saturating_add(1));
        let _ = self
            .entries
            .insert(id, EmplacementState::new(id, position, tuning));
        Ok(id)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, id: EmplacementId) -> Option<&EmplacementState> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EmplacementId) -> Option<&mut EmplacementState> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &EmplacementState> {
        self.entries.values()
    }

    /// Drops every reference to a traveler that left the lane or died.
    pub(crate) fn forget(&mut self, traveler: EntityId) {
        for emplacement in self.entries.values_mut() {
            emplacement.forget(traveler);
        }
    }

    /// Advances every countdown, returning emplacements whose upgrade completed.
    pub(crate) fn advance(&mut self, dt: Duration) -> Vec<EmplacementId> {
        self.entries
            .values_mut()
            .filter_map(|emplacement| emplacement.advance(dt).then_some(emplacement.id))
            .collect()
    }
}

/// Checks emplacement tuning before it is accepted by placement or upgrade.
pub(crate) fn validate(tuning: &EmplacementTuning) -> Result<(), SpawnError> {
    if !tuning.range.is_finite() || tuning.range < 0.0 {
        return Err(SpawnError::InvalidRange);
    }
    if !tuning.attack_interval_secs.is_finite() || tuning.attack_interval_secs < 0.0 {
        return Err(SpawnError::InvalidInterval);
    }
    if tuning.slots == 0 {
        return Err(SpawnError::NoAttackSlots);
    }
    Ok(())
}
