use proptest::prelude::*;
use std::collections::HashMap;

use stigmergy::domain::models::{ALIVE_THRESHOLD, MAX_STRENGTH};
use stigmergy::{DecayRates, Environment, InvalidateFilter, Payload};

const TYPES: [&str; 3] = ["goal", "plan", "code"];
const AGENTS: [&str; 3] = ["user", "planner", "coder"];

fn uniform(rate: f64) -> DecayRates {
    DecayRates {
        default_rate: rate,
        per_type: HashMap::new(),
    }
}

#[derive(Debug, Clone)]
enum Op {
    Decay(f64),
    Reinforce(f64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0.0f64..=1.0).prop_map(Op::Decay),
        (0.0f64..=2.0).prop_map(Op::Reinforce),
    ]
}

proptest! {
    /// Property: decay is multiplicative and dead traces disappear from reads
    #[test]
    fn prop_decay_is_multiplicative(rate in 0.0f64..=1.0, passes in 1usize..10) {
        let env = Environment::new();
        env.add_init("user", "task", "goal", Payload::new());

        let mut expected = MAX_STRENGTH;
        for _ in 0..passes {
            env.decay("task", &uniform(rate));
            expected *= 1.0 - rate;
        }

        let alive = env.read("task", None);
        if expected > ALIVE_THRESHOLD + 1e-9 {
            prop_assert_eq!(alive.len(), 1);
            prop_assert!((alive[0].strength - expected).abs() < 1e-9);
        } else if expected < ALIVE_THRESHOLD - 1e-9 {
            prop_assert!(alive.is_empty());
            prop_assert_eq!(env.trace_count("task"), 0);
        }
    }

    /// Property: strength stays within [0, 1] under any mix of decay and
    /// reinforcement
    #[test]
    fn prop_strength_is_bounded(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let env = Environment::new();
        env.add_init("user", "task", "goal", Payload::new());

        for op in ops {
            match op {
                Op::Decay(rate) => {
                    env.decay("task", &uniform(rate));
                }
                Op::Reinforce(amount) => {
                    env.reinforce("task", "goal", amount).unwrap();
                }
            }
            for trace in env.read("task", None) {
                prop_assert!(trace.strength <= MAX_STRENGTH);
                prop_assert!(trace.strength > ALIVE_THRESHOLD);
            }
        }
    }

    /// Property: the snapshot depends only on the ordered (type, agent,
    /// strength bucket) sequence
    #[test]
    fn prop_snapshot_is_structural(
        writes in prop::collection::vec((0usize..3, 0usize..3), 0..12),
        rate in 0.0f64..0.5,
    ) {
        let left = Environment::new();
        let right = Environment::new();
        for (t, a) in &writes {
            let mut payload = Payload::new();
            payload.insert("noise".to_string(), serde_json::json!(t * 7 + a));
            left.add_init(AGENTS[*a], "task", TYPES[*t], payload);
            right.add_init(AGENTS[*a], "task", TYPES[*t], Payload::new());
        }
        left.decay("task", &uniform(rate));
        right.decay("task", &uniform(rate));

        let snapshot = left.snapshot("task");
        prop_assert_eq!(&snapshot, &right.snapshot("task"));
        prop_assert_eq!(snapshot.len(), left.read("task", None).len());
        prop_assert_eq!(&snapshot, &left.snapshot("task"));
    }

    /// Property: invalidation is idempotent and hides exactly the matched type
    #[test]
    fn prop_invalidation_is_idempotent(
        writes in prop::collection::vec(0usize..3, 1..12),
        target in 0usize..3,
    ) {
        let env = Environment::new();
        for t in &writes {
            env.add_init("user", "task", TYPES[*t], Payload::new());
        }
        let matching = writes.iter().filter(|t| **t == target).count();

        let filter = InvalidateFilter::by_type(TYPES[target]);
        prop_assert_eq!(env.invalidate("task", &filter), matching);
        prop_assert_eq!(env.invalidate("task", &filter), 0);

        prop_assert!(env.read("task", Some(TYPES[target])).is_empty());
        prop_assert_eq!(env.read("task", None).len(), writes.len() - matching);
    }
}
