//! Per-entity combat state machine.
//!
//! Each entity runs at most one attack cycle at a time. The cycle only
//! suspends at its named wait points (approach, windup, cooldown), so a tick
//! never observes a half-applied strike.

use std::time::Duration;

use glam::Vec3;
use lane_defence_core::{
    CoordinatorId, EntityId, EntityKind, EntitySnapshot, EntityState, EntityStats,
};

use crate::traveler::{TravelerPath, ARRIVAL_THRESHOLD};

/// Time a dead entity lingers before it is removed from the arena.
pub(crate) const DEATH_DESPAWN_DELAY: Duration = Duration::from_millis(1_500);

/// Role-specific data carried by an entity.
#[derive(Clone, Debug)]
pub(crate) enum Role {
    Traveler {
        path: TravelerPath,
        reward: u32,
        engageable: bool,
    },
    MeleeUnit {
        coordinator: CoordinatorId,
        anchor: Vec3,
    },
}

/// Wait point the attack cycle is suspended at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttackCycle {
    Approach,
    Windup { remaining: Duration },
    Cooldown { remaining: Duration },
}

/// What the world has to know about an entity's combat target this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum TargetProbe {
    NoTarget,
    Live(Vec3),
    Invalid,
}

/// Side effect of a single entity step that the world must apply.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum StepOutcome {
    Continue,
    Strike { target: EntityId, damage: f32 },
    Disengaged,
    ReachedGoal,
    Despawn,
}

/// Result of applying damage to an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DamageOutcome {
    Ignored,
    Absorbed,
    Killed,
}

#[derive(Clone, Debug)]
pub(crate) struct Entity {
    pub(crate) id: EntityId,
    pub(crate) role: Role,
    pub(crate) position: Vec3,
    pub(crate) velocity: Vec3,
    pub(crate) health: f32,
    pub(crate) stats: EntityStats,
    pub(crate) state: EntityState,
    pub(crate) target: Option<EntityId>,
    cycle: Option<AttackCycle>,
    death_triggered: bool,
    despawn_in: Duration,
}

impl Entity {
    pub(crate) fn new(id: EntityId, role: Role, position: Vec3, stats: EntityStats) -> Self {
        Self {
            id,
            role,
            position,
            velocity: Vec3::ZERO,
            health: stats.max_health,
            stats,
            state: EntityState::Idle,
            target: None,
            cycle: None,
            death_triggered: false,
            despawn_in: Duration::ZERO,
        }
    }

    pub(crate) fn kind(&self) -> EntityKind {
        match self.role {
            Role::Traveler { .. } => EntityKind::Traveler,
            Role::MeleeUnit { .. } => EntityKind::MeleeUnit,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.death_triggered
    }

    /// Whether defenders may engage this entity.
    pub(crate) fn is_engageable_traveler(&self) -> bool {
        self.is_alive() && matches!(self.role, Role::Traveler { engageable: true, .. })
    }

    /// Whether the entity is live and free to accept a new order.
    pub(crate) fn is_idle(&self) -> bool {
        self.is_alive() && self.target.is_none()
    }

    pub(crate) fn reward(&self) -> u32 {
        match self.role {
            Role::Traveler { reward, .. } => reward,
            Role::MeleeUnit { .. } => 0,
        }
    }

    pub(crate) fn coordinator(&self) -> Option<CoordinatorId> {
        match self.role {
            Role::MeleeUnit { coordinator, .. } => Some(coordinator),
            Role::Traveler { .. } => None,
        }
    }

    /// Replaces the combat target and restarts the attack cycle.
    ///
    /// Returns `false` without side effects when the entity is dead or the
    /// target is the entity itself.
    pub(crate) fn set_combat_target(&mut self, target: EntityId) -> bool {
        if !self.is_alive() || target == self.id {
            return false;
        }

        self.target = Some(target);
        self.cycle = Some(AttackCycle::Approach);
        self.state = EntityState::Moving;
        true
    }

    /// Drops the combat target and cancels the attack cycle.
    ///
    /// Travelers resume walking from their current waypoint on the next tick
    /// and melee units resume seeking their anchor.
    pub(crate) fn exit_engagement(&mut self) -> bool {
        if !self.is_alive() {
            return false;
        }

        let had_target = self.target.take().is_some();
        self.cycle = None;
        self.velocity = Vec3::ZERO;
        self.state = EntityState::Idle;
        if let Role::Traveler { path, .. } = &mut self.role {
            path.refresh(self.position);
            log::debug!(
                "traveler {:?} resumes at waypoint {}",
                self.id,
                path.index()
            );
        }
        had_target
    }

    /// Removes `amount` health, clamped into `[0, max_health]`.
    ///
    /// The first call that drops health to zero fires the death transition;
    /// every call after that is ignored.
    pub(crate) fn take_damage(&mut self, amount: f32) -> DamageOutcome {
        if self.death_triggered || !amount.is_finite() {
            return DamageOutcome::Ignored;
        }

        self.health = (self.health - amount).clamp(0.0, self.stats.max_health);
        if self.health > 0.0 {
            return DamageOutcome::Absorbed;
        }

        self.death_triggered = true;
        self.state = EntityState::Dead;
        self.target = None;
        self.cycle = None;
        self.velocity = Vec3::ZERO;
        self.despawn_in = DEATH_DESPAWN_DELAY;
        DamageOutcome::Killed
    }

    /// Advances the entity by one tick.
    pub(crate) fn step(&mut self, dt: Duration, probe: TargetProbe) -> StepOutcome {
        if self.death_triggered {
            self.despawn_in = self.despawn_in.saturating_sub(dt);
            return if self.despawn_in.is_zero() {
                StepOutcome::Despawn
            } else {
                StepOutcome::Continue
            };
        }

        match (self.target, probe) {
            (Some(target), TargetProbe::Live(target_position)) => {
                self.run_attack_cycle(target, target_position, dt)
            }
            (Some(_), _) => {
                let _ = self.exit_engagement();
                StepOutcome::Disengaged
            }
            (None, _) => self.run_routine(dt),
        }
    }

    fn run_attack_cycle(
        &mut self,
        target: EntityId,
        target_position: Vec3,
        dt: Duration,
    ) -> StepOutcome {
        let Some(mut cycle) = self.cycle else {
            return StepOutcome::Continue;
        };
        let mut budget = dt;

        let outcome = loop {
            match cycle {
                AttackCycle::Approach => {
                    let distance = self.position.distance(target_position);
                    if distance > self.stats.attack_range {
                        self.state = EntityState::Moving;
                        let step = (self.stats.speed * budget.as_secs_f32())
                            .min(distance - self.stats.attack_range);
                        self.move_toward(target_position, step, budget);
                        break StepOutcome::Continue;
                    }

                    self.state = EntityState::Engaging;
                    self.velocity = Vec3::ZERO;
                    cycle = AttackCycle::Windup {
                        remaining: self.stats.windup(),
                    };
                }
                AttackCycle::Windup { remaining } => {
                    if remaining > budget {
                        cycle = AttackCycle::Windup {
                            remaining: remaining - budget,
                        };
                        break StepOutcome::Continue;
                    }

                    cycle = AttackCycle::Cooldown {
                        remaining: self.stats.attack_interval(),
                    };
                    break StepOutcome::Strike {
                        target,
                        damage: self.stats.damage,
                    };
                }
                AttackCycle::Cooldown { remaining } => {
                    if remaining > budget {
                        cycle = AttackCycle::Cooldown {
                            remaining: remaining - budget,
                        };
                        break StepOutcome::Continue;
                    }

                    budget -= remaining;
                    cycle = AttackCycle::Approach;
                }
            }
        };

        self.cycle = Some(cycle);
        if let Role::Traveler { path, .. } = &mut self.role {
            path.refresh(self.position);
        }
        outcome
    }

    fn run_routine(&mut self, dt: Duration) -> StepOutcome {
        let budget = self.stats.speed * dt.as_secs_f32();
        match &mut self.role {
            Role::Traveler { path, .. } => {
                let before = self.position;
                let reached_goal = path.advance(&mut self.position, budget);
                self.velocity = velocity_between(before, self.position, dt);
                self.state = EntityState::Moving;
                if reached_goal {
                    StepOutcome::ReachedGoal
                } else {
                    StepOutcome::Continue
                }
            }
            Role::MeleeUnit { anchor, .. } => {
                let anchor = *anchor;
                let distance = self.position.distance(anchor);
                if distance <= ARRIVAL_THRESHOLD {
                    self.velocity = Vec3::ZERO;
                    self.state = EntityState::Idle;
                } else {
                    self.state = EntityState::Moving;
                    self.move_toward(anchor, budget.min(distance), dt);
                }
                StepOutcome::Continue
            }
        }
    }

    fn move_toward(&mut self, destination: Vec3, step: f32, dt: Duration) {
        let before = self.position;
        let offset = destination - self.position;
        let distance = offset.length();
        if distance > 0.0 && step > 0.0 {
            self.position += offset / distance * step.min(distance);
        }
        self.velocity = velocity_between(before, self.position, dt);
    }

    pub(crate) fn snapshot(&self) -> EntitySnapshot {
        let (remaining_distance, engageable) = match &self.role {
            Role::Traveler {
                path, engageable, ..
            } => (Some(path.remaining_distance()), *engageable),
            Role::MeleeUnit { .. } => (None, false),
        };

        EntitySnapshot {
            id: self.id,
            kind: self.kind(),
            state: self.state,
            position: self.position,
            velocity: self.velocity,
            health: self.health,
            max_health: self.stats.max_health,
            target: self.target,
            coordinator: self.coordinator(),
            remaining_distance,
            engageable,
        }
    }
}

fn velocity_between(before: Vec3, after: Vec3, dt: Duration) -> Vec3 {
    let seconds = dt.as_secs_f32();
    if seconds > 0.0 {
        (after - before) / seconds
    } else {
        Vec3::ZERO
    }
}
