//! Troop state machine behaviour driven through orders and ticks.

use squad_core::fsm::StateTransition;
use squad_core::prelude::*;
use squad_test_utils::fixtures::{fixed, vec2, Arena};
use squad_test_utils::recording::{Intent, RecordingSink};

const SCOUT_RON: &str = r#"
AgentConfig(
    name: "scout",
    stats: AgentStats(move_speed: 5.0, max_force: 20.0),
    behaviors: [
        BehaviorTemplate(params: Arrival(arrival_radius: 0.5, slowing_radius: 3.0)),
        BehaviorTemplate(params: Flee(flee_radius: 10.0)),
    ],
)
"#;

const WALKER_RON: &str = r#"
AgentConfig(
    name: "walker",
    behaviors: [
        BehaviorTemplate(params: Arrival(arrival_radius: 0.1, slowing_radius: 2.0)),
    ],
)
"#;

fn skittish_ron(hesitation_chance: f64) -> String {
    format!(
        r#"
AgentConfig(
    name: "skittish",
    behaviors: [
        BehaviorTemplate(probability: 1.0, params: Fear(duration: 2.0, hesitation_chance: {hesitation_chance:.1})),
    ],
)
"#
    )
}

fn register(arena: &mut Arena, name: &str, ron: &str) -> ConfigId {
    let config = AgentConfig::from_ron(name, ron).unwrap();
    arena.sim.register_config(config).unwrap()
}

fn transitions_of(events: &TickEvents, agent: AgentId) -> Vec<StateTransition> {
    events
        .transitions
        .iter()
        .filter(|t| t.agent == agent)
        .copied()
        .collect()
}

#[test]
fn flee_runs_away_then_settles() {
    let mut arena = Arena::new(4);
    let sink = RecordingSink::new();
    arena.sim.set_sink(Box::new(sink.clone()));
    let scout_config = register(&mut arena, "scout", SCOUT_RON);
    let raider = arena.raider;

    let scout = arena.spawn_passive(scout_config, Faction::Defenders, vec2(0, 0));
    let threat = arena.spawn_passive(raider, Faction::Raiders, vec2(3, 0));
    arena.sim.order_flee(scout, threat).unwrap();
    assert_eq!(sink.intents_for(scout), vec![Intent::Flee(scout)]);

    let mut events = Vec::new();
    for _ in 0..61 {
        events.push(arena.sim.tick());
    }

    // Flee state lasts three seconds.
    for tick in &events[1..60] {
        assert!(transitions_of(tick, scout).is_empty());
    }
    assert_eq!(
        transitions_of(&events[60], scout),
        vec![StateTransition {
            agent: scout,
            from: TroopState::Flee,
            to: TroopState::Idle,
        }]
    );

    let agent = arena.sim.agent(scout).unwrap();
    assert!(agent.position().x < fixed(-5));
    assert_eq!(agent.target, None);
}

#[test]
fn defender_engages_hostile_that_comes_close() {
    let mut arena = Arena::new(5);
    let (troop, raider) = (arena.troop, arena.raider);
    let guard = arena.spawn(troop, Faction::Defenders, vec2(0, 0));
    let intruder = arena.spawn_passive(raider, Faction::Raiders, vec2(10, 0));
    arena.sim.order_defend(guard).unwrap();

    // Out of reach: holds.
    for _ in 0..5 {
        arena.sim.tick();
    }
    assert_eq!(arena.sim.agent(guard).unwrap().state(), TroopState::Defend);

    arena.sim.order_move(intruder, vec2(1, 0)).unwrap();
    let mut engaged = false;
    for _ in 0..200 {
        let events = arena.sim.tick();
        if transitions_of(&events, guard).contains(&StateTransition {
            agent: guard,
            from: TroopState::Defend,
            to: TroopState::Attack,
        }) {
            assert_eq!(arena.sim.agent(guard).unwrap().target, Some(intruder));
            engaged = true;
            break;
        }
    }
    assert!(engaged, "guard never escalated from Defend to Attack");
}

#[test]
fn hesitation_holds_still_and_episodes_do_not_overlap() {
    let mut arena = Arena::new(6);
    let sink = RecordingSink::new();
    arena.sim.set_sink(Box::new(sink.clone()));
    let config = register(&mut arena, "skittish", &skittish_ron(1.0));
    let agent = arena.spawn_passive(config, Faction::Defenders, vec2(2, 2));

    for _ in 0..41 {
        arena.sim.tick();
    }

    let episodes = sink.count(|i| matches!(i, Intent::Fear { hesitating: true, .. }));
    assert_eq!(episodes, 2);
    assert_eq!(arena.sim.agent(agent).unwrap().position(), vec2(2, 2));
}

#[test]
fn panic_moves_the_agent() {
    let mut arena = Arena::new(7);
    let sink = RecordingSink::new();
    arena.sim.set_sink(Box::new(sink.clone()));
    let config = register(&mut arena, "skittish", &skittish_ron(0.0));
    let agent = arena.spawn_passive(config, Faction::Defenders, vec2(0, 0));

    for _ in 0..20 {
        arena.sim.tick();
    }

    assert_eq!(
        sink.intents_for(agent),
        vec![Intent::Fear {
            agent,
            hesitating: false
        }]
    );
    assert!(arena.sim.agent(agent).unwrap().position().length() > fixed(1));
}

#[test]
fn move_order_reports_move_then_idle() {
    let mut arena = Arena::new(8);
    let sink = RecordingSink::new();
    arena.sim.set_sink(Box::new(sink.clone()));
    let config = register(&mut arena, "walker", WALKER_RON);
    let agent = arena.spawn_passive(config, Faction::Defenders, vec2(0, 0));

    arena.sim.order_move(agent, vec2(6, 0)).unwrap();
    for _ in 0..200 {
        arena.sim.tick();
        if arena.sim.agent(agent).unwrap().state() == TroopState::Idle {
            break;
        }
    }

    assert_eq!(
        sink.intents_for(agent),
        vec![Intent::Move(agent), Intent::Idle(agent)]
    );
    let position = arena.sim.agent(agent).unwrap().position();
    assert!(position.distance(vec2(6, 0)) <= arena.sim.settings().arrival_tolerance);
}
