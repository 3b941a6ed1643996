//! Headless driver that wires the world to the combat systems.

use std::{fmt, time::Duration};

use lane_defence_core::{Command, EmplacementTarget, EntityKind, Event, ProjectileKind};
use lane_defence_system_emplacement_combat::EmplacementCombat;
use lane_defence_system_emplacement_targeting::EmplacementTargeting;
use lane_defence_system_squad::SquadCoordination;
use lane_defence_world::{self as world, query, World};

use crate::{
    path::PathProvider,
    scenario::{Scenario, SpawnSchedule},
};

/// Running tallies of the event stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Outcome {
    /// Ticks simulated.
    pub(crate) ticks: u64,
    /// Travelers that entered the lane.
    pub(crate) spawned: u32,
    /// Spawn or placement requests the world refused.
    pub(crate) rejected: u32,
    /// Travelers killed by the defence.
    pub(crate) travelers_killed: u32,
    /// Melee units that died.
    pub(crate) units_lost: u32,
    /// Travelers that reached the goal.
    pub(crate) breaches: u32,
    /// Projectiles launched.
    pub(crate) shots: u32,
    /// Main-combat pairings established.
    pub(crate) claims: u32,
    /// Assisting units promoted over a fallen main combatant.
    pub(crate) promotions: u32,
}

impl Outcome {
    fn record(&mut self, event: &Event) {
        match event {
            Event::TimeAdvanced { .. } => self.ticks += 1,
            Event::TravelerSpawned { .. } => self.spawned += 1,
            Event::SpawnRejected { .. } => self.rejected += 1,
            Event::EntityKilled {
                kind: EntityKind::Traveler,
                ..
            } => self.travelers_killed += 1,
            Event::EntityKilled {
                kind: EntityKind::MeleeUnit,
                ..
            } => self.units_lost += 1,
            Event::EndpointReached { .. } => self.breaches += 1,
            Event::ProjectileSpawnRequest { .. } => self.shots += 1,
            Event::ClaimEstablished { .. } => self.claims += 1,
            Event::ClaimPromoted { .. } => self.promotions += 1,
            _ => {}
        }
    }

    /// Travelers that have left the lane, one way or the other.
    pub(crate) fn resolved(&self) -> u32 {
        self.travelers_killed + self.breaches
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ticks simulated:   {}", self.ticks)?;
        writeln!(f, "travelers spawned: {}", self.spawned)?;
        writeln!(f, "travelers killed:  {}", self.travelers_killed)?;
        writeln!(f, "goal breaches:     {}", self.breaches)?;
        writeln!(f, "units lost:        {}", self.units_lost)?;
        writeln!(f, "projectiles fired: {}", self.shots)?;
        writeln!(f, "claims:            {}", self.claims)?;
        writeln!(f, "promotions:        {}", self.promotions)?;
        write!(f, "rejected requests: {}", self.rejected)
    }
}

/// Owns the world, the systems and the spawn schedule of one run.
#[derive(Debug)]
pub(crate) struct Simulation<P> {
    world: World,
    paths: P,
    scenario: Scenario,
    targeting: EmplacementTargeting,
    combat: EmplacementCombat,
    squads: SquadCoordination,
    targets: Vec<EmplacementTarget>,
    commands: Vec<Command>,
    events: Vec<Event>,
    pending: Vec<Event>,
    spawn_clock: Duration,
    requested: u32,
    outcome: Outcome,
}

impl<P: PathProvider> Simulation<P> {
    /// Places the scenario's emplacements and squads into a fresh world.
    pub(crate) fn new(scenario: Scenario, paths: P) -> Self {
        let mut simulation = Self {
            world: World::new(),
            paths,
            spawn_clock: scenario.spawns.interval(),
            scenario,
            targeting: EmplacementTargeting::new(),
            combat: EmplacementCombat::new(),
            squads: SquadCoordination::new(),
            targets: Vec::new(),
            commands: Vec::new(),
            events: Vec::new(),
            pending: Vec::new(),
            requested: 0,
            outcome: Outcome::default(),
        };

        for layout in simulation.scenario.emplacements.clone() {
            simulation.dispatch(Command::PlaceEmplacement {
                position: layout.position,
                tuning: layout.tuning,
            });
        }
        for layout in simulation.scenario.squads.clone() {
            simulation.dispatch(Command::PlaceCoordinator {
                anchor: layout.anchor,
                tuning: layout.tuning,
            });
            let Some(coordinator) = simulation.events.iter().rev().find_map(|event| match event {
                Event::CoordinatorPlaced { coordinator } => Some(*coordinator),
                _ => None,
            }) else {
                continue;
            };
            for _ in 0..layout.units {
                simulation.dispatch(Command::SpawnMeleeUnit {
                    coordinator,
                    anchor: layout.anchor,
                    stats: layout.stats,
                });
            }
        }

        simulation
    }

    /// Runs up to `ticks` ticks of `dt`, stopping early once every scheduled
    /// traveler has been resolved.
    pub(crate) fn run(&mut self, ticks: u32, dt: Duration) -> Outcome {
        for _ in 0..ticks {
            if self.is_settled() {
                log::info!("all travelers resolved after {} ticks", self.outcome.ticks);
                break;
            }
            self.step(dt);
        }

        log::debug!(
            "{} entities remain, {} of {} arrow slots reserved",
            query::entity_count(&self.world),
            query::projectiles_reserved(&self.world, ProjectileKind::Arrow),
            query::projectile_pool_capacity(&self.world, ProjectileKind::Arrow),
        );
        self.outcome()
    }

    /// Advances the run by one frame: spawns, system passes, then the tick.
    pub(crate) fn step(&mut self, dt: Duration) {
        self.spawn_due_travelers();

        self.targeting.handle(
            &query::emplacement_view(&self.world),
            &query::entity_view(&self.world),
            &mut self.targets,
        );
        self.commands.clear();
        self.combat.handle(
            &query::emplacement_view(&self.world),
            &self.targets,
            &query::entity_view(&self.world),
            &query::projectile_view(&self.world),
            &mut self.commands,
        );
        self.squads.handle(
            &self.pending,
            &query::coordinator_view(&self.world),
            &query::entity_view(&self.world),
            &mut self.commands,
        );
        self.pending.clear();

        let commands = std::mem::take(&mut self.commands);
        for command in commands {
            self.dispatch(command);
        }

        self.dispatch(Command::Tick { dt });
        self.spawn_clock = self.spawn_clock.saturating_add(dt);
    }

    /// Tallies collected so far.
    pub(crate) fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn is_settled(&self) -> bool {
        self.requested >= self.scenario.spawns.count
            && self.outcome.resolved() >= self.outcome.spawned
    }

    fn spawn_due_travelers(&mut self) {
        let SpawnSchedule { count, .. } = self.scenario.spawns;
        let interval = self.scenario.spawns.interval();
        let lane = self.scenario.lane;

        while self.spawn_clock >= interval && self.requested < count {
            self.spawn_clock -= interval;
            self.requested += 1;
            let waypoints = self.paths.path(lane.start, lane.goal);
            self.dispatch(Command::SpawnTraveler {
                waypoints,
                tuning: self.scenario.traveler,
            });
        }
    }

    fn dispatch(&mut self, command: Command) {
        self.events.clear();
        world::apply(&mut self.world, command, &mut self.events);
        for event in &self.events {
            log::trace!("{event:?}");
            self.outcome.record(event);
        }
        self.pending.extend(self.events.iter().cloned());
    }
}
