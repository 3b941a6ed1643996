use std::{collections::BTreeMap, time::Duration};

use glam::Vec3;
use lane_defence_core::{
    Command, CoordinatorId, CoordinatorTuning, EntityId, EntityStats, Event, TravelerTuning,
};
use lane_defence_system_squad::SquadCoordination;
use lane_defence_world::{self as world, query, World};

const TICK: Duration = Duration::from_millis(250);

struct Harness {
    world: World,
    squad: SquadCoordination,
    pending: Vec<Event>,
}

impl Harness {
    fn new() -> Self {
        Self {
            world: World::new(),
            squad: SquadCoordination::new(),
            pending: Vec::new(),
        }
    }

    fn apply(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        events
    }

    fn coordinator(&mut self, anchor: Vec3) -> CoordinatorId {
        self.coordinator_with(anchor, CoordinatorTuning::default())
    }

    fn coordinator_with(&mut self, anchor: Vec3, tuning: CoordinatorTuning) -> CoordinatorId {
        match self
            .apply(Command::PlaceCoordinator { anchor, tuning })
            .as_slice()
        {
            [Event::CoordinatorPlaced { coordinator }] => *coordinator,
            other => panic!("unexpected placement events: {other:?}"),
        }
    }

    fn unit(&mut self, coordinator: CoordinatorId, anchor: Vec3) -> EntityId {
        let command = Command::SpawnMeleeUnit {
            coordinator,
            anchor,
            stats: EntityStats::default(),
        };
        match self.apply(command).as_slice() {
            [Event::MeleeUnitSpawned { entity, .. }] => *entity,
            other => panic!("unexpected spawn events: {other:?}"),
        }
    }

    fn traveler(&mut self, waypoints: Vec<Vec3>, health: f32, speed: f32) -> EntityId {
        let tuning = TravelerTuning {
            stats: EntityStats {
                max_health: health,
                speed,
                ..TravelerTuning::default().stats
            },
            ..TravelerTuning::default()
        };
        match self
            .apply(Command::SpawnTraveler { waypoints, tuning })
            .as_slice()
        {
            [Event::TravelerSpawned { entity, .. }] => *entity,
            other => panic!("unexpected spawn events: {other:?}"),
        }
    }

    fn pass(&mut self) -> Vec<Event> {
        let mut commands = Vec::new();
        self.squad.handle(
            &self.pending,
            &query::coordinator_view(&self.world),
            &query::entity_view(&self.world),
            &mut commands,
        );
        self.pending.clear();

        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }
        events
    }

    fn tick_and_pass(&mut self) -> Vec<Event> {
        let mut events = self.apply(Command::Tick { dt: TICK });
        self.pending.extend(events.iter().cloned());
        events.extend(self.pass());
        events
    }

    fn pairings(&self) -> Vec<(CoordinatorId, EntityId, EntityId)> {
        query::coordinator_view(&self.world)
            .iter()
            .flat_map(|squad| {
                squad
                    .active_combats
                    .iter()
                    .map(move |(unit, traveler)| (squad.id, *unit, *traveler))
            })
            .collect()
    }
}

#[test]
fn simultaneous_detection_leaves_exactly_one_holder() {
    let mut harness = Harness::new();
    let west = harness.coordinator(Vec3::new(-1.0, 0.0, 0.0));
    let east = harness.coordinator(Vec3::new(1.0, 0.0, 0.0));
    let _ = harness.unit(west, Vec3::new(-1.0, 0.0, 0.0));
    let _ = harness.unit(east, Vec3::new(1.0, 0.0, 0.0));
    let traveler = harness.traveler(vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 9.0)], 100.0, 0.0);

    let events = harness.pass();

    let claims = events
        .iter()
        .filter(|event| matches!(event, Event::ClaimEstablished { .. }))
        .count();
    let rejections = events
        .iter()
        .filter(|event| matches!(event, Event::ClaimRejected { .. }))
        .count();
    assert_eq!((claims, rejections), (1, 1));

    let holders: Vec<_> = harness
        .pairings()
        .into_iter()
        .filter(|(_, _, claimed)| *claimed == traveler)
        .collect();
    assert_eq!(holders.len(), 1);
    assert_eq!(query::claim_holder(&harness.world, traveler), Some(holders[0].0));
}

#[test]
fn assisting_unit_inherits_the_pairing_of_a_fallen_main() {
    let mut harness = Harness::new();
    let squad = harness.coordinator(Vec3::ZERO);
    let main = harness.unit(squad, Vec3::ZERO);
    let assist = harness.unit(squad, Vec3::ZERO);
    let traveler = harness.traveler(
        vec![Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.5, 0.0, 9.0)],
        1_000.0,
        0.0,
    );

    let _ = harness.pass();
    assert_eq!(harness.pairings(), vec![(squad, main, traveler)]);

    for _ in 0..2 {
        let _ = harness.tick_and_pass();
    }
    let view = query::entity_view(&harness.world);
    assert_eq!(view.get(assist).and_then(|s| s.target), Some(traveler));

    let _ = harness.apply(Command::ApplyDamage {
        entity: main,
        amount: 1_000.0,
    });
    let mut events = Vec::new();
    for _ in 0..2 {
        events.extend(harness.tick_and_pass());
    }

    assert!(events.contains(&Event::ClaimPromoted {
        coordinator: squad,
        fallen: main,
        successor: assist,
        traveler,
    }));
    assert_eq!(harness.pairings(), vec![(squad, assist, traveler)]);
    assert!(harness
        .pairings()
        .iter()
        .all(|(_, unit, _)| *unit != main));
}

#[test]
fn slow_reconciliation_still_promotes_after_the_fallen_main_despawns() {
    let mut harness = Harness::new();
    let squad = harness.coordinator_with(
        Vec3::ZERO,
        CoordinatorTuning {
            reconciliation_period_secs: 2.0,
            ..CoordinatorTuning::default()
        },
    );
    let main = harness.unit(squad, Vec3::ZERO);
    let assist = harness.unit(squad, Vec3::ZERO);
    let traveler = harness.traveler(
        vec![Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.5, 0.0, 9.0)],
        100_000.0,
        0.0,
    );

    let _ = harness.pass();
    for _ in 0..2 {
        let _ = harness.tick_and_pass();
    }
    let view = query::entity_view(&harness.world);
    assert_eq!(view.get(assist).and_then(|s| s.target), Some(traveler));

    let _ = harness.apply(Command::ApplyDamage {
        entity: main,
        amount: 1_000.0,
    });
    let mut events = Vec::new();
    for _ in 0..12 {
        events.extend(harness.tick_and_pass());
    }

    let despawned = events
        .iter()
        .position(|event| *event == Event::EntityDespawned { entity: main })
        .expect("fallen main despawns");
    let promoted = events
        .iter()
        .position(|event| {
            *event
                == Event::ClaimPromoted {
                    coordinator: squad,
                    fallen: main,
                    successor: assist,
                    traveler,
                }
        })
        .expect("assisting unit is promoted");
    assert!(despawned < promoted, "promotion ran before the despawn");
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::ClaimReleased { .. })));
    assert_eq!(harness.pairings(), vec![(squad, assist, traveler)]);
    assert_eq!(query::claim_holder(&harness.world, traveler), Some(squad));
}

#[test]
fn ranged_kill_frees_the_main_combatant() {
    let mut harness = Harness::new();
    let squad = harness.coordinator(Vec3::ZERO);
    let unit = harness.unit(squad, Vec3::ZERO);
    let traveler = harness.traveler(
        vec![Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.5, 0.0, 9.0)],
        100.0,
        0.0,
    );
    let _ = harness.pass();
    assert_eq!(query::claim_holder(&harness.world, traveler), Some(squad));

    let _ = harness.apply(Command::ApplyDamage {
        entity: traveler,
        amount: 500.0,
    });
    let events = harness.tick_and_pass();

    assert!(events.contains(&Event::ClaimReleased {
        coordinator: squad,
        unit,
        traveler,
    }));
    assert_eq!(query::claim_holder(&harness.world, traveler), None);
    let view = query::entity_view(&harness.world);
    assert_eq!(view.get(unit).and_then(|s| s.target), None);
}

#[test]
fn travelers_are_never_held_by_two_pairings_during_a_skirmish() {
    let mut harness = Harness::new();
    let west = harness.coordinator(Vec3::new(-2.0, 0.0, 1.0));
    let east = harness.coordinator(Vec3::new(2.0, 0.0, 1.0));
    for _ in 0..3 {
        let _ = harness.unit(west, Vec3::new(-2.0, 0.0, 1.0));
        let _ = harness.unit(east, Vec3::new(2.0, 0.0, 1.0));
    }
    for lane in 0..4 {
        let z = lane as f32 * 0.5;
        let _ = harness.traveler(
            vec![Vec3::new(-10.0, 0.0, z), Vec3::new(10.0, 0.0, z)],
            60.0,
            1.5,
        );
    }

    let mut killed = 0;
    for _ in 0..80 {
        let events = harness.tick_and_pass();
        killed += events
            .iter()
            .filter(|event| matches!(event, Event::EntityKilled { .. }))
            .count();

        let mut holders: BTreeMap<EntityId, usize> = BTreeMap::new();
        for (_, _, traveler) in harness.pairings() {
            *holders.entry(traveler).or_default() += 1;
        }
        assert!(
            holders.values().all(|count| *count == 1),
            "duplicate pairing: {holders:?}"
        );
    }

    assert!(killed > 0, "squads should have engaged the travelers");
}
