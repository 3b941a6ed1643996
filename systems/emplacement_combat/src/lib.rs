#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that turns emplacement targeting passes into firing commands.

use lane_defence_core::{
    Command, EmplacementTarget, EmplacementView, EntityId, EntityView, ProjectileView,
};

/// Emplacement combat system that queues firing commands for due emplacements.
#[derive(Debug, Default)]
pub struct EmplacementCombat {
    scratch: Vec<Command>,
}

impl EmplacementCombat {
    /// Creates a new emplacement combat system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits one `AcquireTarget` per due emplacement followed by either
    /// `FireProjectile` or `HoldFire`.
    ///
    /// An emplacement holds when it has no target, is disabled by an upgrade,
    /// or already has a projectile in flight whose damage alone finishes the
    /// target.
    pub fn handle(
        &mut self,
        emplacements: &EmplacementView,
        targets: &[EmplacementTarget],
        entities: &EntityView,
        projectiles: &ProjectileView,
        out: &mut Vec<Command>,
    ) {
        if targets.is_empty() {
            return;
        }

        self.scratch.clear();

        for target in targets {
            let Some(snapshot) = emplacements.get(target.emplacement) else {
                continue;
            };
            if !snapshot.ready {
                continue;
            }

            self.scratch.push(Command::AcquireTarget {
                emplacement: target.emplacement,
                candidates: target.candidates.clone(),
                target: target.target,
            });

            let firing_solution = target
                .target
                .filter(|_| !snapshot.disabled)
                .filter(|traveler| !already_doomed(*traveler, entities, projectiles));
            self.scratch.push(match firing_solution {
                Some(traveler) => Command::FireProjectile {
                    emplacement: target.emplacement,
                    target: traveler,
                },
                None => Command::HoldFire {
                    emplacement: target.emplacement,
                },
            });
        }

        if self.scratch.is_empty() {
            return;
        }

        out.reserve(self.scratch.len());
        out.append(&mut self.scratch);
    }
}

/// Whether a single projectile already in flight carries enough damage to kill the traveler.
fn already_doomed(traveler: EntityId, entities: &EntityView, projectiles: &ProjectileView) -> bool {
    let Some(snapshot) = entities.get(traveler) else {
        return false;
    };
    projectiles
        .aimed_at(traveler)
        .any(|projectile| projectile.damage >= snapshot.health)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use lane_defence_core::{
        EmplacementId, EmplacementSnapshot, EntityKind, EntitySnapshot, EntityState, ProjectileId,
        ProjectileKind, ProjectileSnapshot,
    };

    fn emplacements(ready: bool, disabled: bool) -> EmplacementView {
        EmplacementView::from_snapshots(vec![EmplacementSnapshot {
            id: EmplacementId::new(0),
            position: Vec3::ZERO,
            range: 5.0,
            damage: 20.0,
            current_target: None,
            ready,
            disabled,
        }])
    }

    fn traveler(health: f32) -> EntityView {
        EntityView::from_snapshots(vec![EntitySnapshot {
            id: EntityId::new(4, 0),
            kind: EntityKind::Traveler,
            state: EntityState::Moving,
            position: Vec3::X,
            velocity: Vec3::ZERO,
            health,
            max_health: 100.0,
            target: None,
            coordinator: None,
            remaining_distance: Some(6.0),
            engageable: true,
        }])
    }

    fn in_flight(damages: &[f32]) -> ProjectileView {
        ProjectileView::from_snapshots(
            damages
                .iter()
                .enumerate()
                .map(|(index, damage)| ProjectileSnapshot {
                    id: ProjectileId::new(ProjectileKind::Arrow, index as u32, 0),
                    aimed_at: Some(EntityId::new(4, 0)),
                    damage: *damage,
                    progress: 0.5,
                    position: Vec3::Y,
                })
                .collect(),
        )
    }

    fn targeted(target: Option<EntityId>) -> Vec<EmplacementTarget> {
        vec![EmplacementTarget {
            emplacement: EmplacementId::new(0),
            candidates: target.into_iter().collect(),
            target,
        }]
    }

    fn run(
        emplacements: &EmplacementView,
        targets: &[EmplacementTarget],
        entities: &EntityView,
        projectiles: &ProjectileView,
    ) -> Vec<Command> {
        let mut system = EmplacementCombat::new();
        let mut out = Vec::new();
        system.handle(emplacements, targets, entities, projectiles, &mut out);
        out
    }

    #[test]
    fn due_emplacement_fires_at_its_target() {
        let target = Some(EntityId::new(4, 0));
        let out = run(
            &emplacements(true, false),
            &targeted(target),
            &traveler(50.0),
            &in_flight(&[]),
        );

        assert_eq!(
            out,
            vec![
                Command::AcquireTarget {
                    emplacement: EmplacementId::new(0),
                    candidates: vec![EntityId::new(4, 0)],
                    target,
                },
                Command::FireProjectile {
                    emplacement: EmplacementId::new(0),
                    target: EntityId::new(4, 0),
                },
            ]
        );
    }

    #[test]
    fn empty_candidate_set_holds_fire() {
        let out = run(
            &emplacements(true, false),
            &targeted(None),
            &traveler(50.0),
            &in_flight(&[]),
        );
        assert_eq!(
            out.last(),
            Some(&Command::HoldFire {
                emplacement: EmplacementId::new(0)
            })
        );
    }

    #[test]
    fn disabled_emplacement_tracks_but_holds_fire() {
        let out = run(
            &emplacements(true, true),
            &targeted(Some(EntityId::new(4, 0))),
            &traveler(50.0),
            &in_flight(&[]),
        );
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Command::AcquireTarget { .. }));
        assert!(matches!(out[1], Command::HoldFire { .. }));
    }

    #[test]
    fn lethal_projectile_in_flight_suppresses_firing() {
        let out = run(
            &emplacements(true, false),
            &targeted(Some(EntityId::new(4, 0))),
            &traveler(20.0),
            &in_flight(&[20.0]),
        );
        assert!(matches!(out.last(), Some(Command::HoldFire { .. })));
    }

    #[test]
    fn damage_is_not_summed_across_projectiles() {
        let out = run(
            &emplacements(true, false),
            &targeted(Some(EntityId::new(4, 0))),
            &traveler(30.0),
            &in_flight(&[20.0, 20.0]),
        );
        assert!(matches!(out.last(), Some(Command::FireProjectile { .. })));
    }

    #[test]
    fn emplacements_between_cycles_are_silent() {
        let out = run(
            &emplacements(false, false),
            &targeted(Some(EntityId::new(4, 0))),
            &traveler(50.0),
            &in_flight(&[]),
        );
        assert!(out.is_empty());
    }
}
