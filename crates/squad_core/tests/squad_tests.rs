//! Squad bookkeeping under casualties, reflows and random orders.

use squad_core::components::SquadMembership;
use squad_core::prelude::*;
use squad_core::simulation::TICK_RATE;
use squad_test_utils::determinism::strategies::{arb_formation, arb_order_sequence};
use squad_test_utils::fixtures::{fixed, skirmish, vec2, Arena};
use squad_test_utils::proptest::prelude::*;

fn assert_slots_contiguous(sim: &Simulation, squad: SquadId) {
    let members = sim.squad(squad).unwrap().members().to_vec();
    for (slot, &member) in members.iter().enumerate() {
        let agent = sim.agent(member).unwrap();
        assert!(agent.is_alive(), "dead agent {member} still in squad {squad}");
        assert_eq!(agent.squad, Some(SquadMembership { squad, slot }));
        assert_eq!(sim.squad(squad).unwrap().slot_of(member), Some(slot));
    }
}

const DRILL_RON: &str = r#"
AgentConfig(
    name: "drill",
    behaviors: [
        BehaviorTemplate(params: Arrival(arrival_radius: 0.1, slowing_radius: 2.0)),
    ],
)
"#;

fn drill_squad(seed: u64, formation: FormationType, count: usize) -> (Arena, SquadId) {
    let mut arena = Arena::new(seed);
    let config = AgentConfig::from_ron("drill", DRILL_RON).unwrap();
    let drill = arena.sim.register_config(config).unwrap();
    let squad = arena.squad(drill, Faction::Defenders, vec2(0, 0), formation, count);
    (arena, squad)
}

fn assert_members_in_slots(sim: &Simulation, squad: SquadId) {
    let squad_ref = sim.squad(squad).unwrap();
    for (slot, &member) in squad_ref.members().iter().enumerate() {
        let agent = sim.agent(member).unwrap();
        let target = squad_ref.slot_position(slot).unwrap();
        assert!(
            agent.position().distance(target) <= fixed(1),
            "member {member} is not at slot {slot}"
        );
    }
}

#[test]
fn members_walk_to_new_slots_after_formation_change() {
    let (mut arena, squad) = drill_squad(21, FormationType::Square, 4);
    arena.sim.set_formation(squad, FormationType::Column).unwrap();

    // Settle delay, stagger and walking time.
    for _ in 0..(6 * TICK_RATE) {
        arena.sim.tick();
    }

    assert_eq!(
        arena.sim.squad(squad).unwrap().formation(),
        FormationType::Column
    );
    assert_members_in_slots(&arena.sim, squad);
}

#[test]
fn squad_move_relocates_anchor_and_members() {
    let (mut arena, squad) = drill_squad(22, FormationType::Line, 5);
    let destination = arena.sim.move_squad_to(squad, vec2(12, 0)).unwrap();
    assert_eq!(destination, vec2(12, 0));

    for _ in 0..(10 * TICK_RATE) {
        arena.sim.tick();
    }

    let anchor = arena.sim.squad(squad).unwrap().anchor();
    assert!(anchor.distance(destination) <= arena.sim.settings().movement_tolerance);
    assert_members_in_slots(&arena.sim, squad);
}

#[test]
fn skirmish_keeps_squads_consistent() {
    let mut sim = skirmish(23);
    for _ in 0..400 {
        sim.tick();
        for squad in sim.squad_ids() {
            assert_slots_contiguous(&sim, squad);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn casualties_leave_contiguous_slots(mask in 0u16..(1 << 9), formation in arb_formation()) {
        let mut arena = Arena::new(u64::from(mask));
        let troop = arena.troop;
        let squad = arena.squad(troop, Faction::Defenders, vec2(0, 0), formation, 9);
        let members = arena.sim.squad(squad).unwrap().members().to_vec();

        let mut killed = 0;
        for (bit, &member) in members.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                arena.sim.kill(member).unwrap();
                killed += 1;
            }
        }
        for _ in 0..(3 * TICK_RATE) {
            arena.sim.tick();
        }

        prop_assert_eq!(arena.sim.squad(squad).unwrap().len(), 9 - killed);
        assert_slots_contiguous(&arena.sim, squad);
    }

    #[test]
    fn random_orders_preserve_invariants(orders in arb_order_sequence(12), seed in 0u64..1000) {
        let mut sim = skirmish(seed);
        let agent = sim.agents().sorted_ids()[0];
        let squad = sim.squad_ids()[0];

        for order in &orders {
            order.apply(&mut sim, agent, squad);
            for id in sim.squad_ids() {
                assert_slots_contiguous(&sim, id);
            }
            for a in sim.agents().iter() {
                prop_assert!(a.kinematics.velocity.length() <= a.stats.move_speed);
                prop_assert!(a.health.current() <= a.health.max());
            }
        }
    }
}
