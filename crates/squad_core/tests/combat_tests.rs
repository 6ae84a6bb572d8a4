//! Combat flow through the public simulation API: attack windups, hits,
//! deaths and the presentation intents they raise.

use squad_core::prelude::*;
use squad_test_utils::fixtures::{fixed, fixed_f, skirmish, vec2, Arena};
use squad_test_utils::recording::{Intent, RecordingSink};

fn run(sim: &mut Simulation, ticks: usize) -> Vec<TickEvents> {
    (0..ticks).map(|_| sim.tick()).collect()
}

#[test]
fn attack_lands_after_presented_windup() {
    let mut arena = Arena::new(1);
    let sink = RecordingSink::new().with_attack_duration(fixed_f(0.25));
    arena.sim.set_sink(Box::new(sink.clone()));

    let (troop, raider) = (arena.troop, arena.raider);
    let attacker = arena.spawn(troop, Faction::Defenders, vec2(0, 0));
    let target = arena.spawn_passive(raider, Faction::Raiders, vec2(1, 0));
    arena.sim.order_attack(attacker, target).unwrap();

    let events = run(&mut arena.sim, 8);

    assert_eq!(events[0].attacks.len(), 1);
    assert_eq!(events[0].attacks[0].lands_at, fixed_f(0.25));
    for tick in &events[1..5] {
        assert!(tick.damage_events.is_empty());
    }
    let hit = events[5].damage_events[0];
    assert_eq!(hit.attacker, Some(attacker));
    assert_eq!(hit.amount, fixed(10));
    assert_eq!(hit.remaining, fixed(50));

    let intents = sink.intents();
    assert!(intents.contains(&Intent::Attack {
        agent: attacker,
        target
    }));
    assert!(intents.contains(&Intent::Hit {
        agent: target,
        remaining: fixed(50),
        max: fixed(60)
    }));
}

#[test]
fn death_grace_comes_from_presentation() {
    let mut arena = Arena::new(2);
    let sink = RecordingSink::new().with_death_duration(fixed_f(0.5));
    arena.sim.set_sink(Box::new(sink.clone()));

    let raider = arena.raider;
    let victim = arena.spawn_passive(raider, Faction::Raiders, vec2(5, 5));
    assert!(arena.sim.apply_damage(victim, fixed(1000)).unwrap());

    let events = run(&mut arena.sim, 12);
    assert_eq!(events[0].deaths, vec![victim]);
    assert_eq!(events[0].damage_events[0].remaining, Fixed::ZERO);
    assert!(events[1..10].iter().all(|e| e.despawned.is_empty()));
    assert_eq!(events[10].despawned, vec![victim]);
    assert!(arena.sim.agent(victim).is_none());

    assert_eq!(
        sink.intents_for(victim),
        vec![
            Intent::Hit {
                agent: victim,
                remaining: Fixed::ZERO,
                max: fixed(60)
            },
            Intent::Death(victim),
        ]
    );
}

#[test]
fn dead_agents_take_no_further_damage() {
    let mut arena = Arena::new(3);
    let raider = arena.raider;
    let victim = arena.spawn_passive(raider, Faction::Raiders, vec2(0, 0));
    arena.sim.kill(victim).unwrap();

    assert!(arena.sim.apply_damage(victim, fixed(5)).is_err());
    assert!(arena.sim.kill(victim).is_err());
    let agent = arena.sim.agent(victim).unwrap();
    assert_eq!(agent.health.current(), Fixed::ZERO);
    assert_eq!(agent.state(), TroopState::Dead);
}

#[test]
fn skirmish_keeps_health_in_bounds() {
    let mut sim = skirmish(11);
    let mut deaths = 0;
    for _ in 0..400 {
        deaths += sim.tick().deaths.len();
        for agent in sim.agents().iter() {
            let health = agent.health.current();
            assert!(health >= Fixed::ZERO && health <= agent.health.max());
            if !agent.is_alive() {
                assert_eq!(health, Fixed::ZERO);
                assert_eq!(agent.state(), TroopState::Dead);
            }
        }
    }
    let living = sim.survivors(Faction::Defenders) + sim.survivors(Faction::Raiders);
    assert!(living + deaths == 18);
}

#[test]
fn skirmish_respects_speed_and_force_limits() {
    let mut sim = skirmish(12);
    let dt = 1.0 / f64::from(squad_core::simulation::TICK_RATE);
    for _ in 0..300 {
        let before: Vec<(AgentId, Vec2Fixed)> = sim
            .agents()
            .iter()
            .filter(|a| a.is_alive())
            .map(|a| (a.id, a.kinematics.velocity))
            .collect();
        sim.tick();
        for (id, old) in before {
            let Some(agent) = sim.agent(id).filter(|a| a.is_alive()) else {
                continue;
            };
            let velocity = agent.kinematics.velocity;
            assert!(velocity.length() <= agent.stats.move_speed);

            let change = (velocity - old).length().to_num::<f64>();
            let budget = agent.stats.max_force.to_num::<f64>() * dt;
            assert!(change <= budget + 1e-6, "agent {id} changed velocity by {change}");
        }
    }
}
