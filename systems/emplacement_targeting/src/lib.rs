#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that computes emplacement candidate sets and targets from world snapshots.

use std::cmp::Ordering;

use glam::Vec3;
use lane_defence_core::{EmplacementId, EmplacementTarget, EmplacementView, EntityId, EntityView};

/// Emplacement targeting system that reuses scratch buffers to avoid repeated allocations.
#[derive(Debug, Default)]
pub struct EmplacementTargeting {
    emplacement_workspace: Vec<EmplacementWorkspace>,
    traveler_workspace: Vec<TravelerCandidate>,
}

impl EmplacementTargeting {
    /// Creates a new emplacement targeting system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a targeting pass for every emplacement whose attack cycle is due.
    ///
    /// The output buffer is cleared first. Each due emplacement yields one
    /// entry, even when no traveler is in range, so the world can clear a
    /// target that left the candidate set.
    pub fn handle(
        &mut self,
        emplacements: &EmplacementView,
        entities: &EntityView,
        out: &mut Vec<EmplacementTarget>,
    ) {
        out.clear();

        self.prepare_emplacement_workspace(emplacements);
        if self.emplacement_workspace.is_empty() {
            return;
        }
        self.prepare_traveler_workspace(entities);

        for emplacement in &self.emplacement_workspace {
            let mut candidates = Vec::new();
            let mut best: Option<BestCandidate> = None;

            for traveler in &self.traveler_workspace {
                if traveler.position.distance(emplacement.position) > emplacement.range {
                    continue;
                }
                candidates.push(traveler.id);

                let current = BestCandidate {
                    remaining: traveler.remaining,
                    traveler: traveler.id,
                };
                match &mut best {
                    Some(existing) => {
                        if current.precedes(existing) {
                            *existing = current;
                        }
                    }
                    None => best = Some(current),
                }
            }

            let retained = emplacement
                .current_target
                .filter(|target| candidates.contains(target));
            let target = retained.or(best.map(|candidate| candidate.traveler));

            out.push(EmplacementTarget {
                emplacement: emplacement.id,
                candidates,
                target,
            });
        }
    }

    fn prepare_emplacement_workspace(&mut self, emplacements: &EmplacementView) {
        self.emplacement_workspace.clear();
        self.emplacement_workspace.extend(
            emplacements
                .iter()
                .filter(|snapshot| snapshot.ready)
                .map(|snapshot| EmplacementWorkspace {
                    id: snapshot.id,
                    position: snapshot.position,
                    range: snapshot.range,
                    current_target: snapshot.current_target,
                }),
        );
    }

    fn prepare_traveler_workspace(&mut self, entities: &EntityView) {
        self.traveler_workspace.clear();
        self.traveler_workspace
            .extend(entities.engageable_travelers().map(|snapshot| TravelerCandidate {
                id: snapshot.id,
                position: snapshot.position,
                remaining: snapshot.remaining_distance.unwrap_or(f32::INFINITY),
            }));
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct EmplacementWorkspace {
    id: EmplacementId,
    position: Vec3,
    range: f32,
    current_target: Option<EntityId>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct TravelerCandidate {
    id: EntityId,
    position: Vec3,
    remaining: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BestCandidate {
    remaining: f32,
    traveler: EntityId,
}

impl BestCandidate {
    /// Strictly closer to the goal wins; ties keep the earlier handle.
    fn precedes(&self, other: &Self) -> bool {
        match self.remaining.total_cmp(&other.remaining) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.traveler < other.traveler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lane_defence_core::{EmplacementSnapshot, EntityKind, EntitySnapshot, EntityState};

    fn emplacement(id: u32, range: f32, current_target: Option<EntityId>) -> EmplacementSnapshot {
        EmplacementSnapshot {
            id: EmplacementId::new(id),
            position: Vec3::ZERO,
            range,
            damage: 10.0,
            current_target,
            ready: true,
            disabled: false,
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

    fn run(
        emplacements: Vec<EmplacementSnapshot>,
        travelers: Vec<EntitySnapshot>,
    ) -> Vec<EmplacementTarget> {
        let mut system = EmplacementTargeting::new();
        let mut out = Vec::new();
        system.handle(
            &EmplacementView::from_snapshots(emplacements),
            &EntityView::from_snapshots(travelers),
            &mut out,
        );
        out
    }

    #[test]
    fn selects_the_candidate_closest_to_the_goal() {
        let out = run(
            vec![emplacement(0, 5.0, None)],
            vec![traveler(0, 2.0, 10.0), traveler(1, 4.0, 3.0)],
        );

        assert_eq!(
            out,
            vec![EmplacementTarget {
                emplacement: EmplacementId::new(0),
                candidates: vec![EntityId::new(0, 0), EntityId::new(1, 0)],
                target: Some(EntityId::new(1, 0)),
            }]
        );
    }

    #[test]
    fn ties_keep_the_first_candidate_in_handle_order() {
        let out = run(
            vec![emplacement(0, 5.0, None)],
            vec![traveler(3, 1.0, 4.0), traveler(1, 2.0, 4.0)],
        );
        assert_eq!(out[0].target, Some(EntityId::new(1, 0)));
    }

    #[test]
    fn held_target_is_retained_while_it_remains_a_candidate() {
        let held = EntityId::new(0, 0);
        let out = run(
            vec![emplacement(0, 5.0, Some(held))],
            vec![traveler(0, 2.0, 10.0), traveler(1, 4.0, 3.0)],
        );
        assert_eq!(out[0].target, Some(held));
    }

    #[test]
    fn target_leaving_range_is_replaced() {
        let out = run(
            vec![emplacement(0, 5.0, Some(EntityId::new(0, 0)))],
            vec![traveler(0, 9.0, 1.0), traveler(1, 4.0, 3.0)],
        );
        assert_eq!(out[0].candidates, vec![EntityId::new(1, 0)]);
        assert_eq!(out[0].target, Some(EntityId::new(1, 0)));
    }

    #[test]
    fn dead_and_unengageable_travelers_are_not_candidates() {
        let mut dead = traveler(0, 1.0, 1.0);
        dead.state = EntityState::Dead;
        let mut ghost = traveler(1, 1.0, 1.0);
        ghost.engageable = false;

        let out = run(vec![emplacement(0, 5.0, Some(dead.id))], vec![dead, ghost]);

        assert_eq!(
            out,
            vec![EmplacementTarget {
                emplacement: EmplacementId::new(0),
                candidates: Vec::new(),
                target: None,
            }]
        );
    }

    #[test]
    fn emplacements_between_cycles_are_skipped() {
        let mut cooling = emplacement(1, 5.0, None);
        cooling.ready = false;

        let out = run(
            vec![cooling, emplacement(2, 5.0, None)],
            vec![traveler(0, 1.0, 1.0)],
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].emplacement, EmplacementId::new(2));
    }
}
