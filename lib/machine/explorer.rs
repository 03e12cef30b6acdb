//! The worklist fixpoint explorer.

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::hash_map::Entry;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::graph::{Edge, Graph, Vertex};
use crate::lattice::Lattice;
use crate::machine::control::Control;
use crate::machine::semantics::{KontAddrOf, Semantics, StateOf};
use crate::machine::successor::{inject, step};
use crate::Error;
use crate::RC;

/// The order in which pending states are explored. The fixpoint is
/// confluent, so the order changes neither the halted set nor the visited
/// count; it only changes how soon memory peaks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkOrder {
    Lifo,
    Fifo,
}

/// Knobs for an exploration.
#[derive(Clone, Debug)]
pub struct ExplorerOptions {
    pub order: WorkOrder,
    /// Skip states some visited state already subsumes.
    pub subsumption: bool,
    /// Record the transition graph for diagnostics.
    pub graph: bool,
    /// Give up after this much wall-clock time.
    pub timeout: Option<Duration>,
    /// Reclaim unreachable continuation store entries. Disabled only to
    /// compare against the non-collecting baseline.
    pub collect_konts: bool,
    /// Seed for the initial timestamp.
    pub seed: String,
}

impl Default for ExplorerOptions {
    fn default() -> ExplorerOptions {
        ExplorerOptions {
            order: WorkOrder::Fifo,
            subsumption: false,
            graph: false,
            timeout: None,
            collect_konts: true,
            seed: String::new(),
        }
    }
}

/// The control kind of a state, used to color transition graph vertices.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlKind {
    Eval,
    Kont,
    HaltedKont,
    Error,
}

/// A transition graph vertex: one explored state.
#[derive(Clone, Debug)]
pub struct StateVertex {
    index: usize,
    label: String,
    kind: ControlKind,
}

impl StateVertex {
    pub fn kind(&self) -> ControlKind {
        self.kind
    }
}

impl Vertex for StateVertex {
    fn index(&self) -> usize {
        self.index
    }
    fn dot_label(&self) -> String {
        self.label.clone()
    }
    fn dot_fill_color(&self) -> String {
        match self.kind {
            ControlKind::Eval => "#ffffff".to_string(),
            ControlKind::Kont => "#ccffcc".to_string(),
            ControlKind::HaltedKont => "#88ee88".to_string(),
            ControlKind::Error => "#ff7777".to_string(),
        }
    }
}

/// A transition graph edge.
#[derive(Clone, Debug)]
pub struct TransitionEdge {
    head: usize,
    tail: usize,
}

impl Edge for TransitionEdge {
    fn head(&self) -> usize {
        self.head
    }
    fn tail(&self) -> usize {
        self.tail
    }
    fn dot_label(&self) -> String {
        String::new()
    }
}

/// The result of driving a program to its fixpoint.
pub struct Exploration<S: Semantics> {
    halted: Vec<RC<StateOf<S>>>,
    visited: usize,
    elapsed: Duration,
    timed_out: bool,
    graph: Option<Graph<StateVertex, TransitionEdge>>,
}

impl<S: Semantics> Exploration<S> {
    /// Every halted state: returns to `Halt` and semantic errors.
    pub fn halted(&self) -> impl Iterator<Item = &StateOf<S>> {
        self.halted.iter().map(|state| state.as_ref())
    }

    /// The number of distinct states visited.
    pub fn number_of_states(&self) -> usize {
        self.visited
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// The transition graph, if one was requested.
    pub fn graph(&self) -> Option<&Graph<StateVertex, TransitionEdge>> {
        self.graph.as_ref()
    }

    /// The distinct values returned to the root continuation.
    pub fn final_values(&self) -> Vec<S::Value> {
        let mut values: Vec<S::Value> = Vec::new();
        for state in self.halted() {
            if let Control::Kont(value) = state.control() {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        values
    }

    /// The join of every value returned to the root continuation.
    pub fn final_value(&self) -> S::Value {
        S::Value::join_all(&self.final_values())
    }

    /// The distinct faults of halted error states.
    pub fn final_faults(&self) -> Vec<S::Fault> {
        let mut faults: Vec<S::Fault> = Vec::new();
        for state in self.halted() {
            if let Control::Error(fault) = state.control() {
                if !faults.contains(fault) {
                    faults.push(fault.clone());
                }
            }
        }
        faults
    }
}

/// Bookkeeping for the optional transition graph.
struct GraphRecorder<S: Semantics> {
    graph: Graph<StateVertex, TransitionEdge>,
    vertex_ids: FxHashMap<RC<StateOf<S>>, usize>,
}

impl<S: Semantics> GraphRecorder<S> {
    fn new() -> GraphRecorder<S> {
        GraphRecorder {
            graph: Graph::new(),
            vertex_ids: FxHashMap::default(),
        }
    }

    fn vertex(&mut self, state: &RC<StateOf<S>>) -> Result<usize, Error> {
        let next_index = self.vertex_ids.len();
        match self.vertex_ids.entry(state.clone()) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                self.graph.insert_vertex(StateVertex {
                    index: next_index,
                    label: state_label::<S>(state),
                    kind: state_kind::<S>(state),
                })?;
                entry.insert(next_index);
                Ok(next_index)
            }
        }
    }

    fn edge(&mut self, head: usize, tail: usize) -> Result<(), Error> {
        // The transition graph deduplicates parallel edges.
        if !self.graph.has_edge(head, tail) {
            self.graph.insert_edge(TransitionEdge { head, tail })?;
        }
        Ok(())
    }
}

/// Explore the reachable state space of `program` to a least fixed point.
///
/// States are popped from a worklist, discarded if already visited (or, when
/// enabled, subsumed by a visited state), collected when halted, and
/// expanded otherwise. Termination is guaranteed by the finiteness of the
/// abstract domains; the timeout is a backstop for semantics that are not
/// finite.
///
/// # Errors
/// Error if the semantics or a store operation breaks a machine invariant.
/// Semantic errors in the analyzed program become halted states, not `Err`s.
pub fn explore<S: Semantics>(
    semantics: &S,
    program: S::Expr,
    options: &ExplorerOptions,
) -> Result<Exploration<S>, Error> {
    let started = Instant::now();

    let mut worklist: VecDeque<RC<StateOf<S>>> = VecDeque::new();
    let mut visited: FxHashSet<RC<StateOf<S>>> = FxHashSet::default();
    let mut buckets: FxHashMap<KontAddrOf<S>, Vec<RC<StateOf<S>>>> = FxHashMap::default();
    let mut halted: Vec<RC<StateOf<S>>> = Vec::new();
    let mut recorder: Option<GraphRecorder<S>> = if options.graph {
        Some(GraphRecorder::new())
    } else {
        None
    };

    worklist.push_back(RC::new(inject(
        semantics,
        program,
        &options.seed,
        options.collect_konts,
    )));

    let mut timed_out = false;
    loop {
        if let Some(timeout) = options.timeout {
            if started.elapsed() >= timeout {
                timed_out = true;
                break;
            }
        }

        let state = match options.order {
            WorkOrder::Lifo => worklist.pop_back(),
            WorkOrder::Fifo => worklist.pop_front(),
        };
        let state = match state {
            Some(state) => state,
            None => break,
        };

        if visited.contains(&state) {
            continue;
        }
        if options.subsumption && representative::<S>(&buckets, &state).is_some() {
            continue;
        }

        trace!("exploring state {}", visited.len());

        if state.is_halted() {
            if let Some(recorder) = recorder.as_mut() {
                recorder.vertex(&state)?;
            }
            halted.push(state.clone());
            mark_visited::<S>(&mut visited, &mut buckets, state);
            continue;
        }

        let successors = step(semantics, &state)?;
        let head = match recorder.as_mut() {
            Some(recorder) => Some(recorder.vertex(&state)?),
            None => None,
        };
        for successor in successors {
            let successor = RC::new(successor);
            let pruned_to = if options.subsumption {
                representative::<S>(&buckets, &successor)
            } else {
                None
            };
            match pruned_to {
                Some(subsuming) => {
                    // Pruned by subsumption; the edge still points at the
                    // subsuming state so the graph stays connected.
                    if let (Some(recorder), Some(head)) = (recorder.as_mut(), head) {
                        let tail = recorder.vertex(&subsuming)?;
                        recorder.edge(head, tail)?;
                    }
                }
                None => {
                    if let (Some(recorder), Some(head)) = (recorder.as_mut(), head) {
                        let tail = recorder.vertex(&successor)?;
                        recorder.edge(head, tail)?;
                    }
                    worklist.push_back(successor);
                }
            }
        }
        mark_visited::<S>(&mut visited, &mut buckets, state);
    }

    debug!(
        "exploration finished: {} states visited, {} halted, timed out: {}",
        visited.len(),
        halted.len(),
        timed_out
    );

    Ok(Exploration {
        halted,
        visited: visited.len(),
        elapsed: started.elapsed(),
        timed_out,
        graph: recorder.map(|recorder| recorder.graph),
    })
}

fn mark_visited<S: Semantics>(
    visited: &mut FxHashSet<RC<StateOf<S>>>,
    buckets: &mut FxHashMap<KontAddrOf<S>, Vec<RC<StateOf<S>>>>,
    state: RC<StateOf<S>>,
) {
    buckets
        .entry(state.key().clone())
        .or_default()
        .push(state.clone());
    visited.insert(state);
}

/// A visited state subsuming this one, if any. Only states bucketed under
/// the same continuation address are candidates.
fn representative<S: Semantics>(
    buckets: &FxHashMap<KontAddrOf<S>, Vec<RC<StateOf<S>>>>,
    state: &RC<StateOf<S>>,
) -> Option<RC<StateOf<S>>> {
    buckets
        .get(state.key())?
        .iter()
        .find(|old| old.subsumes(state))
        .cloned()
}

fn state_kind<S: Semantics>(state: &StateOf<S>) -> ControlKind {
    match state.control() {
        Control::Eval(_, _) => ControlKind::Eval,
        Control::Kont(_) if state.is_halted() => ControlKind::HaltedKont,
        Control::Kont(_) => ControlKind::Kont,
        Control::Error(_) => ControlKind::Error,
    }
}

fn state_label<S: Semantics>(state: &StateOf<S>) -> String {
    const MAX_LABEL: usize = 64;
    let label = match state.control() {
        Control::Eval(expr, _) => format!("eval {:?}", expr),
        Control::Kont(value) => format!("kont {:?}", value),
        Control::Error(fault) => format!("error {:?}", fault),
    };
    if label.len() <= MAX_LABEL {
        return label;
    }
    let cut = label
        .char_indices()
        .map(|(index, _)| index)
        .take_while(|index| *index <= MAX_LABEL - 3)
        .last()
        .unwrap_or(0);
    format!("{}...", &label[..cut])
}
