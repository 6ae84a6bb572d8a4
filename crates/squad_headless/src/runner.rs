//! Scenario execution.
//!
//! Runs a built scenario to completion and folds the per-tick events into a
//! [`RunSummary`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use squad_core::components::{Faction, SquadId};
use squad_core::simulation::{Simulation, TickEvents};

use crate::scenario::{Prepared, Scenario, ScenarioCommand, ScenarioError, ScriptedCommand};

const FACTIONS: [Faction; 2] = [Faction::Defenders, Faction::Raiders];

/// Overrides for a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Tick limit; the scenario's own limit otherwise.
    pub ticks: Option<u64>,
    /// Seed; the scenario settings' seed otherwise.
    pub seed: Option<u64>,
}

/// Outcome of one run, printed as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// Ticks actually simulated.
    pub ticks: u64,
    /// Whether the run stopped because a side was wiped out.
    pub eliminated: bool,
    /// Only side with living agents at the end, if exactly one.
    pub winner: Option<String>,
    /// Living agents per faction at the end.
    pub survivors: BTreeMap<String, usize>,
    /// Agents that died.
    pub deaths: usize,
    /// Dead agents removed.
    pub despawned: usize,
    /// Attack windups started.
    pub attacks: usize,
    /// Hits landed.
    pub hits: usize,
    /// Total damage applied.
    pub total_damage: f64,
    /// Scripted commands the simulation rejected.
    pub rejected_commands: usize,
    /// Final simulation state hash.
    pub final_state_hash: u64,
}

impl RunSummary {
    fn record(&mut self, events: &TickEvents) {
        self.deaths += events.deaths.len();
        self.despawned += events.despawned.len();
        self.attacks += events.attacks.len();
        self.hits += events.damage_events.len();
        self.total_damage += events
            .damage_events
            .iter()
            .map(|e| e.amount.to_num::<f64>())
            .sum::<f64>();
    }

    fn finish(&mut self, sim: &Simulation) {
        self.ticks = sim.get_tick();
        self.final_state_hash = sim.state_hash();
        self.survivors = FACTIONS
            .iter()
            .map(|&f| (faction_name(f), sim.survivors(f)))
            .collect();
        let mut standing = FACTIONS.iter().filter(|&&f| sim.survivors(f) > 0);
        self.winner = match (standing.next(), standing.next()) {
            (Some(&only), None) => Some(faction_name(only)),
            _ => None,
        };
    }
}

fn faction_name(faction: Faction) -> String {
    format!("{faction:?}")
}

/// Build and run a scenario.
pub fn run_scenario(scenario: &Scenario, options: RunOptions) -> Result<RunSummary, ScenarioError> {
    let Prepared { mut sim, squads } = scenario.build(options.seed)?;
    let limit = options.ticks.unwrap_or(scenario.ticks);

    let mut script: Vec<&ScriptedCommand> = scenario.commands.iter().collect();
    script.sort_by_key(|c| c.tick);
    let mut script = script.into_iter().peekable();

    let contested: Vec<Faction> = FACTIONS
        .iter()
        .copied()
        .filter(|&f| sim.survivors(f) > 0)
        .collect();

    let mut summary = RunSummary {
        scenario: scenario.name.clone(),
        seed: sim.settings().seed,
        ..RunSummary::default()
    };

    info!(
        scenario = %scenario.name,
        seed = summary.seed,
        ticks = limit,
        "Starting run"
    );

    while sim.get_tick() < limit {
        let tick = sim.get_tick();
        while let Some(scripted) = script.next_if(|c| c.tick <= tick) {
            if !apply_command(&mut sim, &squads, &scripted.command) {
                summary.rejected_commands += 1;
            }
        }

        let events = sim.tick();
        summary.record(&events);

        if scenario.stop_on_elimination
            && contested.len() > 1
            && contested.iter().any(|&f| sim.survivors(f) == 0)
        {
            summary.eliminated = true;
            debug!(tick = sim.get_tick(), "Side eliminated, stopping");
            break;
        }
    }

    summary.finish(&sim);
    info!(
        ticks = summary.ticks,
        deaths = summary.deaths,
        winner = ?summary.winner,
        hash = summary.final_state_hash,
        "Run complete"
    );
    Ok(summary)
}

/// Apply one scripted command; false when the simulation rejects it.
fn apply_command(sim: &mut Simulation, squads: &[SquadId], command: &ScenarioCommand) -> bool {
    let result = match *command {
        ScenarioCommand::MoveSquad { squad, to } => {
            sim.move_squad_to(squads[squad], to).map(|_| ())
        }
        ScenarioCommand::SetFormation { squad, formation } => {
            sim.set_formation(squads[squad], formation)
        }
        ScenarioCommand::DefendSquad { squad } => {
            let members = sim
                .squad(squads[squad])
                .map(|s| s.members().to_vec())
                .unwrap_or_default();
            members
                .into_iter()
                .try_for_each(|agent| sim.order_defend(agent))
        }
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(tick = sim.get_tick(), command = ?command, "Scripted command rejected: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_skirmish_is_reproducible() {
        let scenario = Scenario::skirmish();
        let options = RunOptions {
            ticks: Some(200),
            seed: Some(9),
        };
        let a = run_scenario(&scenario, options).unwrap();
        let b = run_scenario(&scenario, options).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.seed, 9);
        assert!(a.ticks <= 200);
    }

    #[test]
    fn test_idle_scenario_runs_to_the_limit() {
        let mut scenario = Scenario::skirmish();
        scenario.squads.truncate(1);
        scenario.commands.clear();
        let summary = run_scenario(
            &scenario,
            RunOptions {
                ticks: Some(30),
                seed: None,
            },
        )
        .unwrap();
        assert_eq!(summary.ticks, 30);
        assert!(!summary.eliminated);
        assert_eq!(summary.deaths, 0);
        assert_eq!(summary.survivors["Defenders"], 9);
        assert_eq!(summary.survivors["Raiders"], 0);
        assert_eq!(summary.winner.as_deref(), Some("Defenders"));
    }
}
