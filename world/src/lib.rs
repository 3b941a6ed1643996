#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Lane Defence.

mod arena;
mod emplacements;
mod entity;
mod projectiles;
mod squads;
mod traveler;

use std::time::Duration;

use glam::Vec3;
use lane_defence_core::{
    ClaimRejection, Command, CoordinatorId, CoordinatorTuning, EmplacementId, EmplacementTuning,
    EntityId, EntityKind, EntityStats, Event, FlightMode, ProjectileDestination, ProjectileHit,
    SpawnError, TravelerTuning,
};
use lane_defence_system_ballistics::splash_falloff;

use crate::{
    arena::Arena,
    emplacements::EmplacementRegistry,
    entity::{DamageOutcome, Entity, Role, StepOutcome, TargetProbe},
    projectiles::{Landing, Launch, Projectiles},
    squads::SquadRegistry,
    traveler::TravelerPath,
};

/// Represents the authoritative Lane Defence world state.
#[derive(Debug)]
pub struct World {
    entities: Arena<EntityId, Entity>,
    projectiles: Projectiles,
    emplacements: EmplacementRegistry,
    squads: SquadRegistry,
    tick_index: u64,
}

impl World {
    /// Creates an empty world ready for simulation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Arena::new(),
            projectiles: Projectiles::new(),
            emplacements: EmplacementRegistry::new(),
            squads: SquadRegistry::new(),
            tick_index: 0,
        }
    }

    fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(id).is_some_and(Entity::is_alive)
    }

    fn spawn_traveler(
        &mut self,
        waypoints: Vec<Vec3>,
        tuning: TravelerTuning,
    ) -> Result<(EntityId, Vec3), SpawnError> {
        validate_stats(&tuning.stats)?;
        if waypoints.iter().any(|waypoint| !waypoint.is_finite()) {
            return Err(SpawnError::NonFinitePosition);
        }
        let start = *waypoints.first().ok_or(SpawnError::EmptyPath)?;
        let path = TravelerPath::new(waypoints).ok_or(SpawnError::EmptyPath)?;

        let role = Role::Traveler {
            path,
            reward: tuning.reward,
            engageable: tuning.engageable,
        };
        let id = self
            .entities
            .insert_with(|id| Entity::new(id, role, start, tuning.stats));
        Ok((id, start))
    }

    fn spawn_melee_unit(
        &mut self,
        coordinator: CoordinatorId,
        anchor: Vec3,
        stats: EntityStats,
    ) -> Result<EntityId, SpawnError> {
        if self.squads.get(coordinator).is_none() {
            return Err(SpawnError::UnknownCoordinator(coordinator));
        }
        if !anchor.is_finite() {
            return Err(SpawnError::NonFinitePosition);
        }
        validate_stats(&stats)?;

        let role = Role::MeleeUnit {
            coordinator,
            anchor,
        };
        let id = self
            .entities
            .insert_with(|id| Entity::new(id, role, anchor, stats));
        let enlisted = self.squads.enlist(coordinator, id);
        debug_assert!(enlisted, "coordinator existence was checked above");
        Ok(id)
    }

    fn set_combat_target(
        &mut self,
        entity: EntityId,
        target: Option<EntityId>,
        out_events: &mut Vec<Event>,
    ) {
        let Some(target) = target else {
            log::debug!("ignoring empty combat target for {entity:?}");
            return;
        };
        if !self.is_alive(target) {
            log::debug!("ignoring stale combat target {target:?} for {entity:?}");
            return;
        }
        let Some(attacker) = self.entities.get_mut(entity) else {
            log::debug!("ignoring combat target for stale entity {entity:?}");
            return;
        };

        if attacker.set_combat_target(target) {
            out_events.push(Event::EngagementStarted { entity, target });
        } else {
            log::debug!("{entity:?} refused combat target {target:?}");
        }
    }

    fn exit_engagement(&mut self, entity: EntityId, out_events: &mut Vec<Event>) {
        let Some(subject) = self.entities.get_mut(entity) else {
            log::debug!("ignoring engagement exit for stale entity {entity:?}");
            return;
        };
        if subject.exit_engagement() {
            out_events.push(Event::EngagementEnded { entity });
        }
    }

    fn damage_entity(&mut self, entity: EntityId, amount: f32, out_events: &mut Vec<Event>) {
        let Some(victim) = self.entities.get_mut(entity) else {
            log::debug!("ignoring damage for stale entity {entity:?}");
            return;
        };

        if victim.take_damage(amount) != DamageOutcome::Killed {
            return;
        }

        let kind = victim.kind();
        let reward = victim.reward();
        log::info!("{kind:?} {entity:?} killed");
        out_events.push(Event::EntityKilled {
            entity,
            kind,
            reward,
        });
        if kind == EntityKind::Traveler {
            self.emplacements.forget(entity);
        }
    }

    fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.tick_index = self.tick_index.saturating_add(1);
        out_events.push(Event::TimeAdvanced { dt });

        self.step_entities(dt, out_events);
        self.advance_projectiles(dt, out_events);

        for emplacement in self.emplacements.advance(dt) {
            log::info!("emplacement {emplacement:?} finished upgrading");
            out_events.push(Event::EmplacementUpgraded { emplacement });
        }
    }

    fn step_entities(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        for id in self.entities.handles() {
            let probe = match self.entities.get(id).and_then(|entity| entity.target) {
                None => TargetProbe::NoTarget,
                Some(target) => match self.entities.get(target) {
                    Some(target) if target.is_alive() => TargetProbe::Live(target.position),
                    _ => TargetProbe::Invalid,
                },
            };
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };

            match entity.step(dt, probe) {
                StepOutcome::Continue => {}
                StepOutcome::Strike { target, damage } => {
                    out_events.push(Event::AttackLanded {
                        attacker: id,
                        target,
                        damage,
                    });
                    self.damage_entity(target, damage, out_events);
                }
                StepOutcome::Disengaged => {
                    log::debug!("{id:?} lost its combat target");
                    out_events.push(Event::EngagementEnded { entity: id });
                }
                StepOutcome::ReachedGoal => {
                    let _ = self.entities.remove(id);
                    self.emplacements.forget(id);
                    log::info!("traveler {id:?} reached the goal");
                    out_events.push(Event::EndpointReached { entity: id });
                }
                StepOutcome::Despawn => {
                    let coordinator = self.entities.remove(id).and_then(|e| e.coordinator());
                    if let Some(coordinator) = coordinator {
                        self.squads.discharge(coordinator, id);
                    }
                    out_events.push(Event::EntityDespawned { entity: id });
                }
            }
        }
    }

    fn advance_projectiles(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let entities = &self.entities;
        let landings = self.projectiles.advance(dt, |id| {
            entities
                .get(id)
                .filter(|entity| entity.is_alive())
                .map(|entity| entity.position)
        });

        for landing in landings {
            match landing {
                Landing::Seeking {
                    projectile,
                    target,
                    point,
                    damage,
                } => {
                    if !self.is_alive(target) {
                        out_events.push(Event::ProjectileMissed { projectile, point });
                        continue;
                    }
                    out_events.push(Event::ProjectileImpact {
                        projectile,
                        point,
                        hits: vec![ProjectileHit {
                            entity: target,
                            damage,
                        }],
                    });
                    self.damage_entity(target, damage, out_events);
                }
                Landing::Splash {
                    projectile,
                    point,
                    damage,
                    radius,
                } => {
                    let hits: Vec<ProjectileHit> = self
                        .entities
                        .iter()
                        .filter(|(_, entity)| entity.is_alive())
                        .filter_map(|(id, entity)| {
                            let dealt =
                                damage * splash_falloff(entity.position.distance(point), radius);
                            (dealt > 0.0).then_some(ProjectileHit { entity: id, damage: dealt })
                        })
                        .collect();

                    if hits.is_empty() {
                        out_events.push(Event::ProjectileMissed { projectile, point });
                        continue;
                    }
                    out_events.push(Event::ProjectileImpact {
                        projectile,
                        point,
                        hits: hits.clone(),
                    });
                    for hit in hits {
                        self.damage_entity(hit.entity, hit.damage, out_events);
                    }
                }
            }
        }
    }

    fn upgrade_emplacement(
        &mut self,
        emplacement: EmplacementId,
        tuning: EmplacementTuning,
        duration: Duration,
        out_events: &mut Vec<Event>,
    ) {
        if let Err(reason) = emplacements::validate(&tuning) {
            reject_spawn(reason, out_events);
            return;
        }
        match self.emplacements.get_mut(emplacement) {
            Some(state) => state.begin_upgrade(tuning, duration),
            None => log::debug!("ignoring upgrade of unknown emplacement {emplacement:?}"),
        }
    }

    fn acquire_target(
        &mut self,
        emplacement: EmplacementId,
        candidates: Vec<EntityId>,
        target: Option<EntityId>,
    ) {
        let live: Vec<EntityId> = candidates
            .into_iter()
            .filter(|candidate| self.is_alive(*candidate))
            .collect();
        match self.emplacements.get_mut(emplacement) {
            Some(state) => state.acquire(live, target),
            None => log::debug!("ignoring targeting for unknown emplacement {emplacement:?}"),
        }
    }

    fn fire_projectile(
        &mut self,
        emplacement: EmplacementId,
        target: EntityId,
        out_events: &mut Vec<Event>,
    ) {
        let Some(aim_point) = self
            .entities
            .get(target)
            .filter(|traveler| traveler.is_engageable_traveler())
            .map(|traveler| traveler.position)
        else {
            log::debug!("emplacement {emplacement:?} cannot fire at {target:?}");
            return;
        };
        let Some(state) = self.emplacements.get_mut(emplacement) else {
            log::debug!("ignoring fire order for unknown emplacement {emplacement:?}");
            return;
        };
        if !state.is_ready() || state.is_disabled() || state.current_target != Some(target) {
            log::debug!("emplacement {emplacement:?} is not armed against {target:?}");
            return;
        }

        let source = state.fire();
        let tuning = state.tuning;
        let destination = match tuning.mode {
            FlightMode::PointSeeking => ProjectileDestination::Target(target),
            FlightMode::FixedDestination { .. } => ProjectileDestination::Point(aim_point),
        };
        let projectile = self.projectiles.acquire(
            tuning.projectile,
            Launch {
                source,
                destination,
                initial_point: aim_point,
                aimed_at: Some(target),
                damage: tuning.damage,
                mode: tuning.mode,
                tuning: tuning.flight,
            },
        );
        out_events.push(Event::ProjectileSpawnRequest {
            projectile,
            kind: tuning.projectile,
            source,
            damage: tuning.damage,
            destination,
        });
    }

    fn check_claim(
        &self,
        coordinator: CoordinatorId,
        unit: EntityId,
        traveler: EntityId,
    ) -> Result<(), ClaimRejection> {
        let squad = self
            .squads
            .get(coordinator)
            .ok_or(ClaimRejection::UnknownCoordinator)?;
        if !squad.has_member(unit) {
            return Err(ClaimRejection::NotInRoster);
        }
        let unit_idle = self.entities.get(unit).is_some_and(Entity::is_idle);
        if !unit_idle || squad.is_main_combatant(unit) {
            return Err(ClaimRejection::UnitUnavailable);
        }
        let available = self
            .entities
            .get(traveler)
            .is_some_and(Entity::is_engageable_traveler);
        if !available {
            return Err(ClaimRejection::TravelerUnavailable);
        }
        Ok(())
    }

    fn claim_traveler(
        &mut self,
        coordinator: CoordinatorId,
        unit: EntityId,
        traveler: EntityId,
        out_events: &mut Vec<Event>,
    ) {
        let claimed = self
            .check_claim(coordinator, unit, traveler)
            .and_then(|()| self.squads.try_claim(coordinator, unit, traveler));

        if let Err(reason) = claimed {
            log::debug!("claim of {traveler:?} by {coordinator:?} rejected: {reason}");
            out_events.push(Event::ClaimRejected {
                coordinator,
                unit,
                traveler,
                reason,
            });
            return;
        }

        log::info!("{coordinator:?} claimed {traveler:?} with {unit:?}");
        out_events.push(Event::ClaimEstablished {
            coordinator,
            unit,
            traveler,
        });
        self.set_combat_target(unit, Some(traveler), out_events);
        self.set_combat_target(traveler, Some(unit), out_events);
    }

    fn release_claim(
        &mut self,
        coordinator: CoordinatorId,
        unit: EntityId,
        out_events: &mut Vec<Event>,
    ) {
        let Some(traveler) = self.squads.release(coordinator, unit) else {
            log::debug!("{coordinator:?} holds no pairing keyed by {unit:?}");
            return;
        };
        out_events.push(Event::ClaimReleased {
            coordinator,
            unit,
            traveler,
        });

        let unit_target = self.entities.get(unit).and_then(|entity| entity.target);
        if unit_target.is_none() || unit_target == Some(traveler) {
            self.exit_engagement(unit, out_events);
        } else {
            log::debug!("{unit:?} already engaged {unit_target:?}; leaving it in combat");
        }
        self.release_traveler(traveler, unit, out_events);
    }

    /// Sends a traveler back to its path if it was still fighting the released unit.
    fn release_traveler(
        &mut self,
        traveler: EntityId,
        unit: EntityId,
        out_events: &mut Vec<Event>,
    ) {
        let fighting_unit = self
            .entities
            .get(traveler)
            .is_some_and(|entity| entity.target == Some(unit));
        if fighting_unit {
            self.exit_engagement(traveler, out_events);
        }
    }

    fn promote_assist(
        &mut self,
        coordinator: CoordinatorId,
        fallen: EntityId,
        successor: EntityId,
        out_events: &mut Vec<Event>,
    ) {
        let Some(traveler) = self
            .squads
            .get(coordinator)
            .and_then(|squad| squad.pairing(fallen))
        else {
            log::debug!("{coordinator:?} holds no pairing keyed by {fallen:?}");
            return;
        };

        let successor_assisting = self
            .entities
            .get(successor)
            .is_some_and(|entity| entity.is_alive() && entity.target == Some(traveler));
        let checked = if self.is_alive(fallen) || !successor_assisting {
            Err(ClaimRejection::UnitUnavailable)
        } else if !self.is_alive(traveler) {
            Err(ClaimRejection::TravelerUnavailable)
        } else {
            Ok(())
        };
        let promoted = checked.and_then(|()| self.squads.promote(coordinator, fallen, successor));

        if let Err(reason) = promoted {
            log::debug!("promotion of {successor:?} by {coordinator:?} rejected: {reason}");
            out_events.push(Event::ClaimRejected {
                coordinator,
                unit: successor,
                traveler,
                reason,
            });
            return;
        }

        log::info!("{coordinator:?} promoted {successor:?} over fallen {fallen:?}");
        out_events.push(Event::ClaimPromoted {
            coordinator,
            fallen,
            successor,
            traveler,
        });

        let traveler_target = self.entities.get(traveler).and_then(|entity| entity.target);
        if !traveler_target.is_some_and(|target| self.is_alive(target)) {
            self.set_combat_target(traveler, Some(successor), out_events);
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => world.tick(dt, out_events),
        Command::SpawnTraveler { waypoints, tuning } => {
            match world.spawn_traveler(waypoints, tuning) {
                Ok((entity, position)) => {
                    out_events.push(Event::TravelerSpawned { entity, position });
                }
                Err(reason) => reject_spawn(reason, out_events),
            }
        }
        Command::SpawnMeleeUnit {
            coordinator,
            anchor,
            stats,
        } => match world.spawn_melee_unit(coordinator, anchor, stats) {
            Ok(entity) => out_events.push(Event::MeleeUnitSpawned {
                entity,
                coordinator,
            }),
            Err(reason) => reject_spawn(reason, out_events),
        },
        Command::PlaceEmplacement { position, tuning } => {
            match world.emplacements.place(position, tuning) {
                Ok(emplacement) => out_events.push(Event::EmplacementPlaced { emplacement }),
                Err(reason) => reject_spawn(reason, out_events),
            }
        }
        Command::UpgradeEmplacement {
            emplacement,
            tuning,
            duration,
        } => world.upgrade_emplacement(emplacement, tuning, duration, out_events),
        Command::PlaceCoordinator { anchor, tuning } => {
            place_coordinator(world, anchor, tuning, out_events);
        }
        Command::SetCombatTarget { entity, target } => {
            world.set_combat_target(entity, target, out_events);
        }
        Command::ExitEngagement { entity } => world.exit_engagement(entity, out_events),
        Command::ApplyDamage { entity, amount } => world.damage_entity(entity, amount, out_events),
        Command::AcquireTarget {
            emplacement,
            candidates,
            target,
        } => world.acquire_target(emplacement, candidates, target),
        Command::FireProjectile {
            emplacement,
            target,
        } => world.fire_projectile(emplacement, target, out_events),
        Command::HoldFire { emplacement } => match world.emplacements.get_mut(emplacement) {
            Some(state) => state.hold(),
            None => log::debug!("ignoring hold order for unknown emplacement {emplacement:?}"),
        },
        Command::ClaimTraveler {
            coordinator,
            unit,
            traveler,
        } => world.claim_traveler(coordinator, unit, traveler, out_events),
        Command::ReleaseClaim { coordinator, unit } => {
            world.release_claim(coordinator, unit, out_events);
        }
        Command::PromoteAssist {
            coordinator,
            fallen,
            successor,
        } => world.promote_assist(coordinator, fallen, successor, out_events),
    }
}

fn place_coordinator(
    world: &mut World,
    anchor: Vec3,
    tuning: CoordinatorTuning,
    out_events: &mut Vec<Event>,
) {
    match world.squads.place(anchor, tuning) {
        Ok(coordinator) => out_events.push(Event::CoordinatorPlaced { coordinator }),
        Err(reason) => reject_spawn(reason, out_events),
    }
}

fn reject_spawn(reason: SpawnError, out_events: &mut Vec<Event>) {
    log::warn!("spawn aborted: {reason}");
    out_events.push(Event::SpawnRejected { reason });
}

fn validate_stats(stats: &EntityStats) -> Result<(), SpawnError> {
    if !stats.max_health.is_finite() || stats.max_health <= 0.0 {
        return Err(SpawnError::InvalidHealth);
    }
    if !stats.attack_range.is_finite() || stats.attack_range < 0.0 {
        return Err(SpawnError::InvalidRange);
    }
    let intervals = [stats.attack_interval_secs, stats.windup_secs];
    if intervals
        .iter()
        .any(|interval| !interval.is_finite() || *interval < 0.0)
    {
        return Err(SpawnError::InvalidInterval);
    }
    Ok(())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use lane_defence_core::{
        CoordinatorId, CoordinatorView, EmplacementView, EntityId, EntityView, ProjectileKind,
        ProjectileView,
    };

    use super::World;

    /// Captures a read-only view of every entity in the arena, dead ones included.
    #[must_use]
    pub fn entity_view(world: &World) -> EntityView {
        EntityView::from_snapshots(
            world
                .entities
                .iter()
                .map(|(_, entity)| entity.snapshot())
                .collect(),
        )
    }

    /// Captures a read-only view of every emplacement.
    #[must_use]
    pub fn emplacement_view(world: &World) -> EmplacementView {
        EmplacementView::from_snapshots(
            world
                .emplacements
                .iter()
                .map(|emplacement| emplacement.snapshot())
                .collect(),
        )
    }

    /// Captures a read-only view of every projectile still in flight.
    #[must_use]
    pub fn projectile_view(world: &World) -> ProjectileView {
        ProjectileView::from_snapshots(world.projectiles.snapshots())
    }

    /// Captures a read-only view of every coordinator and its pairings.
    #[must_use]
    pub fn coordinator_view(world: &World) -> CoordinatorView {
        CoordinatorView::from_snapshots(world.squads.iter().map(|squad| squad.snapshot()).collect())
    }

    /// Coordinator holding the authoritative claim on a traveler, if any.
    #[must_use]
    pub fn claim_holder(world: &World, traveler: EntityId) -> Option<CoordinatorId> {
        world.squads.holder(traveler)
    }

    /// Number of ticks processed since the world was created.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Number of entity slots currently occupied, dead entities included.
    #[must_use]
    pub fn entity_count(world: &World) -> usize {
        world.entities.len()
    }

    /// Slots ever allocated by the pool of the given projectile kind.
    #[must_use]
    pub fn projectile_pool_capacity(world: &World, kind: ProjectileKind) -> usize {
        world.projectiles.capacity(kind)
    }

    /// Slots of the given projectile kind that are in flight or settling.
    #[must_use]
    pub fn projectiles_reserved(world: &World, kind: ProjectileKind) -> usize {
        world.projectiles.reserved(kind)
    }
}
