//! Machine-level properties checked over whole explorations.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::time::Duration;

use crate::lang::{parse, SchemeSemantics, SchemeValue};
use crate::machine::explorer::{explore, ExplorerOptions, WorkOrder};
use crate::machine::semantics::StateOf;
use crate::machine::successor::{inject, step};
use crate::machine::time::ZeroCfa;

type Semantics = SchemeSemantics<ZeroCfa>;
type State = StateOf<Semantics>;

const FACTORIAL: &str =
    "(letrec ((fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1))))))) (fact input))";
const BRANCH: &str = "(if (< input 0) 1 2)";
const LOOP: &str = "(letrec ((loop (lambda (n) (loop n)))) (loop 0))";

/// Breadth-first drive of the raw transition function, checking the
/// continuation store invariants after every transition.
fn drive(source: &str) -> Vec<State> {
    let semantics = Semantics::new();
    let program = parse(source).unwrap();

    let mut visited: HashSet<State> = HashSet::new();
    let mut worklist: VecDeque<State> = VecDeque::new();
    worklist.push_back(inject(&semantics, program, "", true));

    while let Some(state) = worklist.pop_front() {
        if !visited.insert(state.clone()) {
            continue;
        }
        state.kstore().assert_invariants();
        assert!(
            state.kstore().refs(state.kont()) >= 1,
            "current continuation address lost its root reference"
        );
        for successor in step(&semantics, &state).unwrap() {
            worklist.push_back(successor);
        }
    }
    visited.into_iter().collect()
}

fn final_value_set(source: &str, options: &ExplorerOptions) -> BTreeSet<SchemeValue<ZeroCfa>> {
    let program = parse(source).unwrap();
    let exploration = explore(&Semantics::new(), program, options).unwrap();
    assert!(!exploration.timed_out());
    exploration.final_values().into_iter().collect()
}

#[test]
fn refcounts_stay_positive_across_every_transition() {
    // `drive` asserts the invariants internally.
    assert!(!drive(BRANCH).is_empty());
    assert!(!drive(FACTORIAL).is_empty());
}

#[test]
fn tail_recursion_keeps_the_kont_store_small() {
    let states = drive(LOOP);

    // The loop never returns, so nothing ever halts; still, the state
    // space is finite and every state carries a bounded continuation
    // store, no matter how long the abstract execution runs.
    assert!(!states.is_empty());
    for state in &states {
        assert!(
            state.kstore().len() <= 3,
            "tail call leaked continuation frames: {} entries",
            state.kstore().len()
        );
    }
}

#[test]
fn worklist_order_does_not_change_the_result() {
    for source in [BRANCH, FACTORIAL] {
        let lifo = ExplorerOptions {
            order: WorkOrder::Lifo,
            ..ExplorerOptions::default()
        };
        let fifo = ExplorerOptions {
            order: WorkOrder::Fifo,
            ..ExplorerOptions::default()
        };

        assert_eq!(final_value_set(source, &lifo), final_value_set(source, &fifo));

        let program = parse(source).unwrap();
        let lifo_count = explore(&Semantics::new(), program.clone(), &lifo)
            .unwrap()
            .number_of_states();
        let fifo_count = explore(&Semantics::new(), program, &fifo)
            .unwrap()
            .number_of_states();
        assert_eq!(lifo_count, fifo_count);
    }
}

#[test]
fn collected_and_uncollected_stores_agree() {
    for source in ["((lambda (x) x) 42)", BRANCH, FACTORIAL, "(car '())"] {
        let collected = ExplorerOptions::default();
        let uncollected = ExplorerOptions {
            collect_konts: false,
            ..ExplorerOptions::default()
        };

        assert_eq!(
            final_value_set(source, &collected),
            final_value_set(source, &uncollected),
            "collection changed the meaning of {}",
            source
        );
    }
}

#[test]
fn subsumption_pruning_preserves_the_joined_result() {
    for source in [BRANCH, FACTORIAL] {
        let plain = ExplorerOptions::default();
        let pruned = ExplorerOptions {
            subsumption: true,
            ..ExplorerOptions::default()
        };

        let program = parse(source).unwrap();
        let plain = explore(&Semantics::new(), program.clone(), &plain).unwrap();
        let pruned = explore(&Semantics::new(), program, &pruned).unwrap();

        assert_eq!(plain.final_value(), pruned.final_value());
        assert_eq!(
            plain
                .final_faults()
                .into_iter()
                .collect::<BTreeSet<_>>(),
            pruned.final_faults().into_iter().collect::<BTreeSet<_>>()
        );
        assert!(pruned.number_of_states() <= plain.number_of_states());
    }
}

#[test]
fn a_zero_timeout_reports_timed_out() {
    let options = ExplorerOptions {
        timeout: Some(Duration::from_secs(0)),
        ..ExplorerOptions::default()
    };
    let exploration = explore(&Semantics::new(), parse(FACTORIAL).unwrap(), &options).unwrap();

    assert!(exploration.timed_out());
    assert_eq!(exploration.number_of_states(), 0);
    assert_eq!(exploration.halted().count(), 0);
}

#[test]
fn the_transition_graph_covers_the_visited_states() {
    let options = ExplorerOptions {
        graph: true,
        ..ExplorerOptions::default()
    };
    let exploration = explore(&Semantics::new(), parse(BRANCH).unwrap(), &options).unwrap();

    let graph = exploration.graph().unwrap();
    assert_eq!(graph.num_vertices(), exploration.number_of_states());
    assert!(graph.num_edges() >= graph.num_vertices() - 1);

    let dot = graph.dot_graph();
    assert!(dot.starts_with("digraph G {"));
    // Halted states are colored distinctly.
    assert!(dot.contains("#88ee88"));
}

#[test]
fn explorations_without_a_graph_return_none() {
    let exploration = explore(
        &Semantics::new(),
        parse(BRANCH).unwrap(),
        &ExplorerOptions::default(),
    )
    .unwrap();
    assert!(exploration.graph().is_none());
}
