//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays and lockstep clients need the simulation to be 100%
//! deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`squad_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted agent and squad ID order.
//!
//! - **Randomness**: Every stochastic decision draws from the simulation's
//!   one seeded stream, in agent order.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual module determinism (steering, formations, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full simulation scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use squad_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use squad_test_utils::determinism::verify_determinism;
/// use squad_test_utils::fixtures::skirmish;
///
/// let result = verify_determinism(
///     3,   // Run 3 times
///     100, // 100 ticks each
///     || skirmish(7),
///     |sim| { sim.tick(); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`Simulation`].
///
/// Runs the simulation twice with identical setup and verifies the final
/// state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        |sim| sim.state_hash(),
    );
    result.is_deterministic
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Each simulation is built and ticked on its own thread, so the
/// simulation itself never crosses a thread boundary.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a save/load round trip neither changes the state nor the
/// future: the restored copy must stay in lockstep with the original for
/// `resume_ticks` more ticks.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64, resume_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for _ in 0..num_ticks {
        sim.tick();
    }

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    for _ in 0..resume_ticks {
        sim.tick();
        restored.tick();
        if restored.state_hash() != sim.state_hash() {
            return false;
        }
    }
    true
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use proptest::prelude::*;
    use squad_core::components::AgentId;
    use squad_core::formation::FormationType;
    use squad_core::math::{Fixed, Vec2Fixed};
    use squad_core::simulation::Simulation;

    /// Generate a fixed-point coordinate inside a 200 x 200 field.
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        (-100i32..100i32).prop_map(Fixed::from_num)
    }

    /// Generate a ground-plane position.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_position(), arb_fixed_position()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate a vector with components in `[-range, range]` at 1/16 steps.
    pub fn arb_vec2(range: i32) -> impl Strategy<Value = Vec2Fixed> {
        let steps = range * 16;
        (-steps..=steps, -steps..=steps).prop_map(|(x, y)| {
            Vec2Fixed::new(Fixed::from_num(x) / Fixed::from_num(16), Fixed::from_num(y) / Fixed::from_num(16))
        })
    }

    /// Generate a value in `[0, 1]` at 1/100 steps.
    pub fn arb_unit() -> impl Strategy<Value = Fixed> {
        (0i32..=100).prop_map(|n| Fixed::from_num(n) / Fixed::from_num(100))
    }

    /// Generate health or damage values (1-200).
    pub fn arb_amount() -> impl Strategy<Value = Fixed> {
        (1i32..200).prop_map(Fixed::from_num)
    }

    /// Generate any formation layout.
    pub fn arb_formation() -> impl Strategy<Value = FormationType> {
        prop_oneof![
            Just(FormationType::Square),
            Just(FormationType::Line),
            Just(FormationType::Column),
            Just(FormationType::V),
        ]
    }

    /// An external command applied to the first agent or first squad.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Order {
        /// Move an agent to a point.
        Move(Vec2Fixed),
        /// Put an agent on defence.
        Defend,
        /// Move a squad.
        SquadMove(Vec2Fixed),
        /// Change a squad's formation.
        Formation(FormationType),
        /// Let time pass.
        Wait(u8),
    }

    impl Order {
        /// Apply to `sim`. Rejected orders are ignored, as a player's
        /// invalid click would be.
        pub fn apply(&self, sim: &mut Simulation, agent: AgentId, squad: u32) {
            match *self {
                Self::Move(point) => {
                    let _ = sim.order_move(agent, point);
                }
                Self::Defend => {
                    let _ = sim.order_defend(agent);
                }
                Self::SquadMove(point) => {
                    let _ = sim.move_squad_to(squad, point);
                }
                Self::Formation(formation) => {
                    let _ = sim.set_formation(squad, formation);
                }
                Self::Wait(ticks) => {
                    for _ in 0..ticks {
                        sim.tick();
                    }
                }
            }
        }
    }

    /// Generate one order.
    pub fn arb_order() -> impl Strategy<Value = Order> {
        prop_oneof![
            arb_vec2_position().prop_map(Order::Move),
            Just(Order::Defend),
            arb_vec2_position().prop_map(Order::SquadMove),
            arb_formation().prop_map(Order::Formation),
            (1u8..40).prop_map(Order::Wait),
        ]
    }

    /// Generate a sequence of orders.
    pub fn arb_order_sequence(max_len: usize) -> impl Strategy<Value = Vec<Order>> {
        proptest::collection::vec(arb_order(), 0..max_len)
    }
}
