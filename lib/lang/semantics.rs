//! The abstract semantics of the Scheme-like language.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use crate::lang::ast::Expr;
use crate::lang::value::{Prim, SchemeAddr, SchemeValue};
use crate::lattice::Lattice;
use crate::machine::env::Environment;
use crate::machine::semantics::{Action, ActionOf, EnvOf, Semantics, StoreOf};
use crate::machine::store::Store;
use crate::machine::time::Time;
use crate::Error;
use crate::RC;

type Env<T> = Environment<SchemeAddr<T>>;
type ValueStore<T> = Store<SchemeAddr<T>, SchemeValue<T>>;

/// A continuation frame: what remains of the enclosing expression once the
/// machine has gone off to evaluate a subexpression.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum SchemeFrame<T: Ord> {
    /// Awaiting the condition of an `if`.
    If {
        consequent: RC<Expr>,
        alternative: RC<Expr>,
        env: Env<T>,
    },
    /// Awaiting the bound expression of a `let`.
    Let {
        name: String,
        body: RC<Expr>,
        env: Env<T>,
    },
    /// Awaiting the bound expression of a `letrec`; the address is already
    /// allocated so the binding can see itself.
    Letrec {
        address: SchemeAddr<T>,
        body: RC<Expr>,
        env: Env<T>,
    },
    /// Awaiting the operator of an application.
    AppFn {
        call_site: RC<Expr>,
        args: Vec<Expr>,
        env: Env<T>,
    },
    /// Awaiting one argument of an application.
    AppArg {
        call_site: RC<Expr>,
        operator: SchemeValue<T>,
        done: Vec<(Expr, SchemeValue<T>)>,
        current: Expr,
        remaining: Vec<Expr>,
        env: Env<T>,
    },
}

/// A semantic error in the analyzed program. These become terminal `Error`
/// states, never `Err` results.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum SchemeFault {
    UnboundVariable(String),
    NotAFunction,
    WrongArity { expected: usize, got: usize },
    TypeError(String),
}

impl fmt::Display for SchemeFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchemeFault::UnboundVariable(name) => write!(f, "unbound variable {}", name),
            SchemeFault::NotAFunction => write!(f, "application of a non-function"),
            SchemeFault::WrongArity { expected, got } => {
                write!(f, "expected {} arguments, got {}", expected, got)
            }
            SchemeFault::TypeError(message) => write!(f, "type error: {}", message),
        }
    }
}

/// The Scheme-like semantics, parameterized by the clock.
///
/// Besides the primitives, the initial environment binds `input` to the
/// unknown integer, so programs over unconstrained inputs can be written
/// directly.
pub struct SchemeSemantics<T> {
    time: PhantomData<T>,
}

impl<T> SchemeSemantics<T> {
    pub fn new() -> SchemeSemantics<T> {
        SchemeSemantics { time: PhantomData }
    }
}

impl<T> Default for SchemeSemantics<T> {
    fn default() -> SchemeSemantics<T> {
        SchemeSemantics::new()
    }
}

const PRIMS: &[Prim] = &[
    Prim::Add,
    Prim::Sub,
    Prim::Mul,
    Prim::Lt,
    Prim::NumEq,
    Prim::Cons,
    Prim::Car,
    Prim::Cdr,
];

impl<T: Time<Expr>> Semantics for SchemeSemantics<T> {
    type Expr = Expr;
    type Addr = SchemeAddr<T>;
    type Value = SchemeValue<T>;
    type Frame = SchemeFrame<T>;
    type Fault = SchemeFault;
    type Time = T;

    fn initial_env(&self) -> Vec<(String, SchemeAddr<T>)> {
        let mut bindings: Vec<(String, SchemeAddr<T>)> = PRIMS
            .iter()
            .map(|prim| {
                (
                    prim.name().to_string(),
                    SchemeAddr::Prim(prim.name().to_string()),
                )
            })
            .collect();
        bindings.push(("input".to_string(), SchemeAddr::Prim("input".to_string())));
        bindings
    }

    fn initial_store(&self) -> Vec<(SchemeAddr<T>, SchemeValue<T>)> {
        let mut entries: Vec<(SchemeAddr<T>, SchemeValue<T>)> = PRIMS
            .iter()
            .map(|prim| {
                (
                    SchemeAddr::Prim(prim.name().to_string()),
                    SchemeValue::prim(*prim),
                )
            })
            .collect();
        entries.push((
            SchemeAddr::Prim("input".to_string()),
            SchemeValue::int_top(),
        ));
        entries
    }

    fn step_eval(
        &self,
        expr: &Expr,
        env: &EnvOf<Self>,
        store: &StoreOf<Self>,
        time: &T,
    ) -> Result<Vec<ActionOf<Self>>, Error> {
        let actions = match expr {
            Expr::Var(name) => match env.lookup(name) {
                Some(address) => vec![Action::Value {
                    value: store.lookup(address),
                    store: store.clone(),
                }],
                None => vec![Action::Error {
                    fault: SchemeFault::UnboundVariable(name.clone()),
                }],
            },
            Expr::Bool(value) => vec![value_action(SchemeValue::bool(*value), store)],
            Expr::Int(value) => vec![value_action(SchemeValue::int(*value), store)],
            Expr::Nil => vec![value_action(SchemeValue::nil(), store)],
            Expr::Lambda(_, _) => vec![value_action(
                SchemeValue::closure(RC::new(expr.clone()), env.clone()),
                store,
            )],
            Expr::If(condition, consequent, alternative) => vec![Action::Push {
                frame: SchemeFrame::If {
                    consequent: consequent.clone(),
                    alternative: alternative.clone(),
                    env: env.clone(),
                },
                expr: (**condition).clone(),
                env: env.clone(),
                store: store.clone(),
            }],
            Expr::Let(name, binding, body) => vec![Action::Push {
                frame: SchemeFrame::Let {
                    name: name.clone(),
                    body: body.clone(),
                    env: env.clone(),
                },
                expr: (**binding).clone(),
                env: env.clone(),
                store: store.clone(),
            }],
            Expr::Letrec(name, binding, body) => {
                // The address exists before the binding is evaluated, so a
                // recursive function can close over itself.
                let address = SchemeAddr::Var(name.clone(), time.clone());
                let env = env.bind(name.clone(), address.clone());
                let store = store.extend(address.clone(), SchemeValue::bottom());
                vec![Action::Push {
                    frame: SchemeFrame::Letrec {
                        address,
                        body: body.clone(),
                        env: env.clone(),
                    },
                    expr: (**binding).clone(),
                    env,
                    store,
                }]
            }
            Expr::App(operator, args) => vec![Action::Push {
                frame: SchemeFrame::AppFn {
                    call_site: RC::new(expr.clone()),
                    args: args.clone(),
                    env: env.clone(),
                },
                expr: (**operator).clone(),
                env: env.clone(),
                store: store.clone(),
            }],
        };
        Ok(actions)
    }

    fn step_kont(
        &self,
        value: &SchemeValue<T>,
        frame: &SchemeFrame<T>,
        store: &StoreOf<Self>,
        time: &T,
    ) -> Result<Vec<ActionOf<Self>>, Error> {
        let actions = match frame {
            SchemeFrame::If {
                consequent,
                alternative,
                env,
            } => {
                let mut actions = Vec::new();
                if value.may_be_truthy() {
                    actions.push(Action::Eval {
                        expr: (**consequent).clone(),
                        env: env.clone(),
                        store: store.clone(),
                    });
                }
                if value.may_be_falsy() {
                    actions.push(Action::Eval {
                        expr: (**alternative).clone(),
                        env: env.clone(),
                        store: store.clone(),
                    });
                }
                actions
            }
            SchemeFrame::Let { name, body, env } => {
                let address = SchemeAddr::Var(name.clone(), time.clone());
                vec![Action::Eval {
                    expr: (**body).clone(),
                    env: env.bind(name.clone(), address.clone()),
                    store: store.extend(address, value.clone()),
                }]
            }
            SchemeFrame::Letrec { address, body, env } => vec![Action::Eval {
                expr: (**body).clone(),
                env: env.clone(),
                store: store.extend(address.clone(), value.clone()),
            }],
            SchemeFrame::AppFn {
                call_site,
                args,
                env,
            } => match args.split_first() {
                None => apply(call_site, value, &[], store, time),
                Some((first, rest)) => vec![Action::Push {
                    frame: SchemeFrame::AppArg {
                        call_site: call_site.clone(),
                        operator: value.clone(),
                        done: Vec::new(),
                        current: first.clone(),
                        remaining: rest.to_vec(),
                        env: env.clone(),
                    },
                    expr: first.clone(),
                    env: env.clone(),
                    store: store.clone(),
                }],
            },
            SchemeFrame::AppArg {
                call_site,
                operator,
                done,
                current,
                remaining,
                env,
            } => {
                let mut done = done.clone();
                done.push((current.clone(), value.clone()));
                match remaining.split_first() {
                    None => apply(call_site, operator, &done, store, time),
                    Some((next, rest)) => vec![Action::Push {
                        frame: SchemeFrame::AppArg {
                            call_site: call_site.clone(),
                            operator: operator.clone(),
                            done,
                            current: next.clone(),
                            remaining: rest.to_vec(),
                            env: env.clone(),
                        },
                        expr: next.clone(),
                        env: env.clone(),
                        store: store.clone(),
                    }],
                }
            }
        };
        Ok(actions)
    }
}

fn value_action<T: Time<Expr>>(
    value: SchemeValue<T>,
    store: &ValueStore<T>,
) -> ActionOf<SchemeSemantics<T>> {
    Action::Value {
        value,
        store: store.clone(),
    }
}

/// Apply an operator value to fully evaluated arguments.
///
/// Abstraction makes this a set of outcomes: one `StepIn` per closure, the
/// primitive results, and error actions for arity mismatches and
/// non-callable components.
fn apply<T: Time<Expr>>(
    call_site: &RC<Expr>,
    operator: &SchemeValue<T>,
    args: &[(Expr, SchemeValue<T>)],
    store: &ValueStore<T>,
    time: &T,
) -> Vec<ActionOf<SchemeSemantics<T>>> {
    let mut actions = Vec::new();

    for (lambda, closure_env) in operator.closures() {
        if let Expr::Lambda(params, body) = &**lambda {
            if params.len() != args.len() {
                actions.push(Action::Error {
                    fault: SchemeFault::WrongArity {
                        expected: params.len(),
                        got: args.len(),
                    },
                });
                continue;
            }
            let mut env = closure_env.clone();
            let mut bound_store = store.clone();
            for (param, (_, arg)) in params.iter().zip(args) {
                let address = SchemeAddr::Var(param.clone(), time.clone());
                env = env.bind(param.clone(), address.clone());
                bound_store = bound_store.extend(address, arg.clone());
            }
            actions.push(Action::StepIn {
                call_site: (**call_site).clone(),
                operator: ((**lambda).clone(), closure_env.clone()),
                body: (**body).clone(),
                env,
                store: bound_store,
                args: args.to_vec(),
            });
        }
    }

    for prim in operator.prims() {
        actions.extend(apply_prim(*prim, args, store, time));
    }

    if operator.has_non_callable() {
        actions.push(Action::Error {
            fault: SchemeFault::NotAFunction,
        });
    }

    actions
}

fn apply_prim<T: Time<Expr>>(
    prim: Prim,
    args: &[(Expr, SchemeValue<T>)],
    store: &ValueStore<T>,
    time: &T,
) -> Vec<ActionOf<SchemeSemantics<T>>> {
    let expected = match prim {
        Prim::Car | Prim::Cdr => 1,
        _ => 2,
    };
    if args.len() != expected {
        return vec![Action::Error {
            fault: SchemeFault::WrongArity {
                expected,
                got: args.len(),
            },
        }];
    }

    match prim {
        Prim::Add => arith(prim, args, store, |a, b| a.wrapping_add(b)),
        Prim::Sub => arith(prim, args, store, |a, b| a.wrapping_sub(b)),
        Prim::Mul => arith(prim, args, store, |a, b| a.wrapping_mul(b)),
        Prim::Lt => comparison(prim, args, store, |a, b| a < b),
        Prim::NumEq => comparison(prim, args, store, |a, b| a == b),
        Prim::Cons => {
            let car_address = SchemeAddr::Car(time.clone());
            let cdr_address = SchemeAddr::Cdr(time.clone());
            let store = store
                .extend(car_address.clone(), args[0].1.clone())
                .extend(cdr_address.clone(), args[1].1.clone());
            vec![Action::Value {
                value: SchemeValue::pair(car_address, cdr_address),
                store,
            }]
        }
        Prim::Car | Prim::Cdr => {
            let argument = &args[0].1;
            let mut actions = Vec::new();
            let mut value = SchemeValue::bottom();
            for (car_address, cdr_address) in argument.pairs() {
                let address = match prim {
                    Prim::Car => car_address,
                    _ => cdr_address,
                };
                value = value.join(&store.lookup(address));
            }
            if argument.pairs().next().is_some() {
                actions.push(Action::Value {
                    value,
                    store: store.clone(),
                });
            }
            if argument.has_non_pair() {
                actions.push(Action::Error {
                    fault: SchemeFault::TypeError(format!("{}: expected a pair", prim.name())),
                });
            }
            actions
        }
    }
}

fn arith<T: Time<Expr>>(
    prim: Prim,
    args: &[(Expr, SchemeValue<T>)],
    store: &ValueStore<T>,
    op: fn(i64, i64) -> i64,
) -> Vec<ActionOf<SchemeSemantics<T>>> {
    let lhs = &args[0].1;
    let rhs = &args[1].1;
    let mut actions = Vec::new();
    let ints = lhs.int_set().binop(rhs.int_set(), op);
    if !ints.is_bottom() {
        actions.push(Action::Value {
            value: SchemeValue::ints(ints),
            store: store.clone(),
        });
    }
    if lhs.has_non_number() || rhs.has_non_number() {
        actions.push(Action::Error {
            fault: SchemeFault::TypeError(format!("{}: expected numbers", prim.name())),
        });
    }
    actions
}

fn comparison<T: Time<Expr>>(
    prim: Prim,
    args: &[(Expr, SchemeValue<T>)],
    store: &ValueStore<T>,
    op: fn(i64, i64) -> bool,
) -> Vec<ActionOf<SchemeSemantics<T>>> {
    let lhs = &args[0].1;
    let rhs = &args[1].1;
    let mut actions = Vec::new();
    let booleans = lhs.int_set().compare(rhs.int_set(), op);
    if !booleans.is_empty() {
        actions.push(Action::Value {
            value: SchemeValue::bools(booleans),
            store: store.clone(),
        });
    }
    if lhs.has_non_number() || rhs.has_non_number() {
        actions.push(Action::Error {
            fault: SchemeFault::TypeError(format!("{}: expected numbers", prim.name())),
        });
    }
    actions
}
