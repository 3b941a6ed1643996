#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that runs the melee squad assignment protocol.
//!
//! Every coordinator runs three loops on independent periods: reconciliation
//! repairs pairings broken by deaths or retargeting, detection claims
//! unclaimed travelers near the anchor, and assist sends the remaining idle
//! units after travelers that are already paired. Loops whose periods elapse
//! in the same pass run in that order. Claims are only proposed here; the
//! world's claim registry decides which of two competing claims wins.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use lane_defence_core::{
    Command, CoordinatorId, CoordinatorSnapshot, CoordinatorTuning, CoordinatorView, EntityId,
    EntitySnapshot, EntityView, Event,
};

/// Squad coordination system holding one set of loop accumulators per coordinator.
#[derive(Debug, Default)]
pub struct SquadCoordination {
    clocks: BTreeMap<CoordinatorId, LoopClocks>,
    scratch: Vec<Command>,
}

impl SquadCoordination {
    /// Creates a new squad coordination system with no coordinators tracked.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances every coordinator's loop clocks by the time reported in
    /// `events` and emits the commands of the loops that came due.
    ///
    /// A coordinator seen for the first time runs all three loops at once.
    pub fn handle(
        &mut self,
        events: &[Event],
        coordinators: &CoordinatorView,
        entities: &EntityView,
        out: &mut Vec<Command>,
    ) {
        let elapsed: Duration = events
            .iter()
            .filter_map(|event| match event {
                Event::TimeAdvanced { dt } => Some(*dt),
                _ => None,
            })
            .sum();

        self.clocks.retain(|id, _| coordinators.get(*id).is_some());
        self.scratch.clear();

        for coordinator in coordinators.iter() {
            let clocks = self
                .clocks
                .entry(coordinator.id)
                .or_insert_with(|| LoopClocks::primed(&coordinator.tuning));
            clocks.advance(elapsed);
            let due = clocks.take_due(&coordinator.tuning);

            let mut pass = Pass::new(coordinator, coordinators, entities);
            if due.reconciliation {
                pass.reconcile(&mut self.scratch);
            }
            if due.detection {
                pass.detect(&mut self.scratch);
            }
            if due.assist {
                pass.assist(&mut self.scratch);
            }
        }

        if self.scratch.is_empty() {
            return;
        }

        out.reserve(self.scratch.len());
        out.append(&mut self.scratch);
    }
}

/// Time accumulated toward each loop's next run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LoopClocks {
    detection: Duration,
    assist: Duration,
    reconciliation: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DueLoops {
    detection: bool,
    assist: bool,
    reconciliation: bool,
}

impl LoopClocks {
    fn primed(tuning: &CoordinatorTuning) -> Self {
        Self {
            detection: tuning.detection_period(),
            assist: tuning.assist_period(),
            reconciliation: tuning.reconciliation_period(),
        }
    }

    fn advance(&mut self, elapsed: Duration) {
        self.detection = self.detection.saturating_add(elapsed);
        self.assist = self.assist.saturating_add(elapsed);
        self.reconciliation = self.reconciliation.saturating_add(elapsed);
    }

    fn take_due(&mut self, tuning: &CoordinatorTuning) -> DueLoops {
        DueLoops {
            detection: take(&mut self.detection, tuning.detection_period()),
            assist: take(&mut self.assist, tuning.assist_period()),
            reconciliation: take(&mut self.reconciliation, tuning.reconciliation_period()),
        }
    }
}

/// Consumes one period from the accumulator. Backlog beyond one period is
/// dropped so a long stall does not trigger a burst of runs.
fn take(accumulated: &mut Duration, period: Duration) -> bool {
    if *accumulated < period {
        return false;
    }
    *accumulated = (*accumulated - period).min(period);
    true
}

/// Working state of one coordinator's loops within a single pass.
struct Pass<'a> {
    coordinator: &'a CoordinatorSnapshot,
    coordinators: &'a CoordinatorView,
    entities: &'a EntityView,
    /// Units given an order earlier in this pass.
    committed: BTreeSet<EntityId>,
    /// Pairings released earlier in this pass, keyed by unit.
    released: BTreeSet<EntityId>,
}

impl<'a> Pass<'a> {
    fn new(
        coordinator: &'a CoordinatorSnapshot,
        coordinators: &'a CoordinatorView,
        entities: &'a EntityView,
    ) -> Self {
        Self {
            coordinator,
            coordinators,
            entities,
            committed: BTreeSet::new(),
            released: BTreeSet::new(),
        }
    }

    fn reconcile(&mut self, out: &mut Vec<Command>) {
        let coordinator = self.coordinator;
        let entities = self.entities;

        for &(unit, traveler) in &coordinator.active_combats {
            if !entities.is_alive(traveler) {
                self.release(unit, out);
                continue;
            }

            match entities.get(unit) {
                Some(snapshot) if snapshot.is_alive() => {
                    if snapshot.target != Some(traveler) {
                        self.release(unit, out);
                    }
                }
                _ => match self.successor(unit, traveler) {
                    Some(successor) => {
                        let _ = self.committed.insert(successor);
                        out.push(Command::PromoteAssist {
                            coordinator: coordinator.id,
                            fallen: unit,
                            successor,
                        });
                    }
                    None => self.release(unit, out),
                },
            }
        }
    }

    fn release(&mut self, unit: EntityId, out: &mut Vec<Command>) {
        let _ = self.released.insert(unit);
        out.push(Command::ReleaseClaim {
            coordinator: self.coordinator.id,
            unit,
        });
    }

    /// Lowest-handle live roster member assisting against `traveler`.
    fn successor(&self, fallen: EntityId, traveler: EntityId) -> Option<EntityId> {
        self.coordinator
            .roster
            .iter()
            .copied()
            .filter(|unit| *unit != fallen && !self.committed.contains(unit))
            .filter(|unit| !self.coordinator.is_main_combatant(*unit))
            .find(|unit| {
                self.entities.get(*unit).is_some_and(|snapshot| {
                    snapshot.is_alive() && snapshot.target == Some(traveler)
                })
            })
    }

    fn detect(&mut self, out: &mut Vec<Command>) {
        let anchor = self.coordinator.anchor;
        let radius = self.coordinator.tuning.detection_radius;

        let mut travelers: Vec<&EntitySnapshot> = self
            .entities
            .engageable_travelers()
            .filter(|snapshot| snapshot.position.distance(anchor) <= radius)
            .filter(|snapshot| self.coordinators.claim_holder(snapshot.id).is_none())
            .collect();
        travelers.sort_by(|a, b| closer_to_goal(a, b));

        for traveler in travelers {
            let Some(unit) = self.nearest_idle_unit(traveler) else {
                break;
            };
            let _ = self.committed.insert(unit);
            out.push(Command::ClaimTraveler {
                coordinator: self.coordinator.id,
                unit,
                traveler: traveler.id,
            });
        }
    }

    fn assist(&mut self, out: &mut Vec<Command>) {
        let pairings: Vec<&EntitySnapshot> = self
            .coordinator
            .active_combats
            .iter()
            .filter(|(unit, _)| !self.released.contains(unit))
            .filter_map(|(_, traveler)| self.entities.get(*traveler))
            .filter(|snapshot| snapshot.is_alive())
            .collect();
        if pairings.is_empty() {
            return;
        }

        for unit in self.idle_units() {
            let Some(position) = self.entities.get(unit).map(|snapshot| snapshot.position) else {
                continue;
            };
            let nearest = pairings.iter().min_by(|a, b| {
                a.position
                    .distance(position)
                    .total_cmp(&b.position.distance(position))
                    .then(a.id.cmp(&b.id))
            });
            if let Some(traveler) = nearest {
                let _ = self.committed.insert(unit);
                out.push(Command::SetCombatTarget {
                    entity: unit,
                    target: Some(traveler.id),
                });
            }
        }
    }

    /// Live roster members with no target, no pairing and no order this pass.
    fn idle_units(&self) -> Vec<EntityId> {
        self.coordinator
            .roster
            .iter()
            .copied()
            .filter(|unit| !self.committed.contains(unit))
            .filter(|unit| !self.coordinator.is_main_combatant(*unit))
            .filter(|unit| {
                self.entities
                    .get(*unit)
                    .is_some_and(|snapshot| snapshot.is_alive() && snapshot.target.is_none())
            })
            .collect()
    }

    fn nearest_idle_unit(&self, traveler: &EntitySnapshot) -> Option<EntityId> {
        self.idle_units()
            .into_iter()
            .filter_map(|unit| self.entities.get(unit))
            .min_by(|a, b| {
                a.position
                    .distance(traveler.position)
                    .total_cmp(&b.position.distance(traveler.position))
                    .then(a.id.cmp(&b.id))
            })
            .map(|snapshot| snapshot.id)
    }
}

fn closer_to_goal(a: &EntitySnapshot, b: &EntitySnapshot) -> Ordering {
    remaining(a)
        .total_cmp(&remaining(b))
        .then(a.id.cmp(&b.id))
}

fn remaining(snapshot: &EntitySnapshot) -> f32 {
    snapshot.remaining_distance.unwrap_or(f32::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use lane_defence_core::{EntityKind, EntityState};

    const SQUAD: CoordinatorId = CoordinatorId::new(0);

    fn unit(index: u32, x: f32, target: Option<EntityId>) -> EntitySnapshot {
        EntitySnapshot {
            id: EntityId::new(index, 0),
            kind: EntityKind::MeleeUnit,
            state: EntityState::Idle,
            position: Vec3::new(x, 0.0, 0.0),
            velocity: Vec3::ZERO,
            health: 100.0,
            max_health: 100.0,
            target,
            coordinator: Some(SQUAD),
            remaining_distance: None,
            engageable: false,
        }
    }

    fn traveler(index: u32, x: f32, remaining: f32) -> EntitySnapshot {
        EntitySnapshot {
            id: EntityId::new(index, 0),
            kind: EntityKind::Traveler,
            state: EntityState::Moving,
            position: Vec3::new(x, 0.0, 0.0),
            velocity: Vec3::ZERO,
            health: 50.0,
            max_health: 50.0,
            target: None,
            coordinator: None,
            remaining_distance: Some(remaining),
            engageable: true,
        }
    }

    fn dead(mut snapshot: EntitySnapshot) -> EntitySnapshot {
        snapshot.state = EntityState::Dead;
        snapshot.health = 0.0;
        snapshot.target = None;
        snapshot
    }

    fn squad(roster: &[u32], active_combats: &[(u32, u32)]) -> CoordinatorView {
        CoordinatorView::from_snapshots(vec![CoordinatorSnapshot {
            id: SQUAD,
            anchor: Vec3::ZERO,
            tuning: CoordinatorTuning::default(),
            roster: roster.iter().map(|index| EntityId::new(*index, 0)).collect(),
            active_combats: active_combats
                .iter()
                .map(|(u, t)| (EntityId::new(*u, 0), EntityId::new(*t, 0)))
                .collect(),
        }])
    }

    fn run(coordinators: &CoordinatorView, entities: Vec<EntitySnapshot>) -> Vec<Command> {
        let mut system = SquadCoordination::new();
        let mut out = Vec::new();
        system.handle(&[], coordinators, &EntityView::from_snapshots(entities), &mut out);
        out
    }

    fn id(index: u32) -> EntityId {
        EntityId::new(index, 0)
    }

    #[test]
    fn detection_claims_the_traveler_closest_to_the_goal_first() {
        let out = run(
            &squad(&[0], &[]),
            vec![unit(0, 0.0, None), traveler(5, 1.0, 9.0), traveler(6, 2.0, 4.0)],
        );

        assert_eq!(
            out,
            vec![Command::ClaimTraveler {
                coordinator: SQUAD,
                unit: id(0),
                traveler: id(6),
            }]
        );
    }

    #[test]
    fn detection_assigns_the_nearest_idle_unit() {
        let out = run(
            &squad(&[0, 1], &[]),
            vec![unit(0, -3.0, None), unit(1, 2.0, None), traveler(5, 3.0, 9.0)],
        );

        assert_eq!(
            out,
            vec![Command::ClaimTraveler {
                coordinator: SQUAD,
                unit: id(1),
                traveler: id(5),
            }]
        );
    }

    #[test]
    fn travelers_outside_the_radius_or_claimed_are_ignored() {
        let mut claimed = squad(&[0, 1], &[(1, 6)]).iter().cloned().collect::<Vec<_>>();
        claimed.push(CoordinatorSnapshot {
            id: CoordinatorId::new(1),
            anchor: Vec3::new(50.0, 0.0, 0.0),
            tuning: CoordinatorTuning::default(),
            roster: vec![id(2)],
            active_combats: vec![(id(2), id(7))],
        });
        let view = CoordinatorView::from_snapshots(claimed);

        let out = run(
            &view,
            vec![
                unit(0, 0.0, Some(id(6))),
                unit(1, 0.0, Some(id(6))),
                unit(2, 50.0, Some(id(7))),
                traveler(5, 30.0, 1.0),
                traveler(6, 1.0, 2.0),
                traveler(7, 2.0, 3.0),
            ],
        );

        assert!(
            out.iter()
                .all(|command| !matches!(command, Command::ClaimTraveler { .. })),
            "{out:?}"
        );
    }

    #[test]
    fn zero_idle_units_leave_travelers_unclaimed() {
        let out = run(
            &squad(&[0], &[(0, 5)]),
            vec![unit(0, 0.0, Some(id(5))), traveler(5, 1.0, 3.0), traveler(6, 1.0, 2.0)],
        );
        assert!(out.is_empty(), "{out:?}");
    }

    #[test]
    fn idle_units_assist_existing_pairings() {
        let out = run(
            &squad(&[0, 1], &[(0, 5)]),
            vec![unit(0, 0.0, Some(id(5))), unit(1, 0.0, None), traveler(5, 1.0, 3.0)],
        );

        assert_eq!(
            out,
            vec![Command::SetCombatTarget {
                entity: id(1),
                target: Some(id(5)),
            }]
        );
    }

    #[test]
    fn dead_traveler_releases_its_pairing() {
        let out = run(
            &squad(&[0], &[(0, 5)]),
            vec![unit(0, 0.0, None), dead(traveler(5, 1.0, 3.0))],
        );

        assert_eq!(
            out.first(),
            Some(&Command::ReleaseClaim {
                coordinator: SQUAD,
                unit: id(0),
            })
        );
    }

    #[test]
    fn fallen_main_is_replaced_by_its_assist() {
        let out = run(
            &squad(&[0, 1], &[(0, 5)]),
            vec![
                dead(unit(0, 0.0, None)),
                unit(1, 0.0, Some(id(5))),
                traveler(5, 1.0, 3.0),
            ],
        );

        assert_eq!(
            out,
            vec![Command::PromoteAssist {
                coordinator: SQUAD,
                fallen: id(0),
                successor: id(1),
            }]
        );
    }

    #[test]
    fn fallen_main_without_assist_is_released() {
        let out = run(
            &squad(&[0], &[(0, 5)]),
            vec![dead(unit(0, 0.0, None)), traveler(5, 1.0, 3.0)],
        );

        assert_eq!(
            out.first(),
            Some(&Command::ReleaseClaim {
                coordinator: SQUAD,
                unit: id(0),
            })
        );
    }

    #[test]
    fn loops_wait_for_their_periods_after_the_first_pass() {
        let view = squad(&[0], &[]);
        let entities = EntityView::from_snapshots(vec![unit(0, 0.0, None), traveler(5, 1.0, 3.0)]);
        let mut system = SquadCoordination::new();
        let mut out = Vec::new();

        system.handle(&[], &view, &entities, &mut out);
        assert_eq!(out.len(), 1);

        out.clear();
        let short = [Event::TimeAdvanced {
            dt: Duration::from_millis(100),
        }];
        system.handle(&short, &view, &entities, &mut out);
        assert!(out.is_empty(), "detection period has not elapsed");

        let rest = [Event::TimeAdvanced {
            dt: Duration::from_millis(400),
        }];
        system.handle(&rest, &view, &entities, &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn long_stalls_do_not_queue_extra_runs() {
        let mut accumulated = Duration::from_secs(10);
        let period = Duration::from_millis(500);

        assert!(take(&mut accumulated, period));
        assert!(take(&mut accumulated, period));
        assert!(!take(&mut accumulated, period));
    }
}
