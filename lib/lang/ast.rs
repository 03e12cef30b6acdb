//! The expression AST, and a small s-expression reader for it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Error;
use crate::RC;

/// A Scheme-like expression.
///
/// `let` and `letrec` are single-binding; the reader desugars multi-binding
/// forms into nested expressions.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Expr {
    Var(String),
    Bool(bool),
    Int(i64),
    Nil,
    Lambda(Vec<String>, RC<Expr>),
    App(RC<Expr>, Vec<Expr>),
    If(RC<Expr>, RC<Expr>, RC<Expr>),
    Let(String, RC<Expr>, RC<Expr>),
    Letrec(String, RC<Expr>, RC<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Bool(true) => write!(f, "#t"),
            Expr::Bool(false) => write!(f, "#f"),
            Expr::Int(i) => write!(f, "{}", i),
            Expr::Nil => write!(f, "'()"),
            Expr::Lambda(params, body) => {
                write!(f, "(lambda ({}) {})", params.join(" "), body)
            }
            Expr::App(operator, args) => {
                write!(f, "({}", operator)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Expr::If(condition, consequent, alternative) => {
                write!(f, "(if {} {} {})", condition, consequent, alternative)
            }
            Expr::Let(name, binding, body) => {
                write!(f, "(let (({} {})) {})", name, binding, body)
            }
            Expr::Letrec(name, binding, body) => {
                write!(f, "(letrec (({} {})) {})", name, binding, body)
            }
        }
    }
}

/// Read a single expression from its s-expression form.
pub fn parse(input: &str) -> Result<Expr, Error> {
    let tokens = tokenize(input);
    let mut position = 0;
    let sexp = parse_sexp(&tokens, &mut position)?;
    if position != tokens.len() {
        return Err(Error::Parse(format!(
            "trailing input after expression: {}",
            tokens[position]
        )));
    }
    lower(&sexp)
}

enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

fn tokenize(input: &str) -> Vec<String> {
    input
        .replace('(', " ( ")
        .replace(')', " ) ")
        .replace('\'', " ' ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn parse_sexp(tokens: &[String], position: &mut usize) -> Result<Sexp, Error> {
    let token = tokens
        .get(*position)
        .ok_or_else(|| Error::Parse("unexpected end of input".to_string()))?;
    *position += 1;
    match token.as_str() {
        "(" => {
            let mut items = Vec::new();
            loop {
                match tokens.get(*position) {
                    Some(token) if token == ")" => {
                        *position += 1;
                        return Ok(Sexp::List(items));
                    }
                    Some(_) => items.push(parse_sexp(tokens, position)?),
                    None => return Err(Error::Parse("unbalanced parenthesis".to_string())),
                }
            }
        }
        ")" => Err(Error::Parse("unexpected )".to_string())),
        "'" => {
            let quoted = parse_sexp(tokens, position)?;
            Ok(Sexp::List(vec![Sexp::Atom("quote".to_string()), quoted]))
        }
        _ => Ok(Sexp::Atom(token.clone())),
    }
}

fn lower(sexp: &Sexp) -> Result<Expr, Error> {
    match sexp {
        Sexp::Atom(atom) => lower_atom(atom),
        Sexp::List(items) => match items.first() {
            Some(Sexp::Atom(head)) => match head.as_str() {
                "quote" => lower_quote(&items[1..]),
                "lambda" => lower_lambda(&items[1..]),
                "if" => lower_if(&items[1..]),
                "let" => lower_binding_form(&items[1..], "let", Expr::Let),
                "letrec" => lower_binding_form(&items[1..], "letrec", Expr::Letrec),
                _ => lower_application(items),
            },
            Some(Sexp::List(_)) => lower_application(items),
            None => Err(Error::Parse("() is not an expression".to_string())),
        },
    }
}

fn lower_atom(atom: &str) -> Result<Expr, Error> {
    match atom {
        "#t" => Ok(Expr::Bool(true)),
        "#f" => Ok(Expr::Bool(false)),
        _ => {
            if let Ok(i) = atom.parse::<i64>() {
                Ok(Expr::Int(i))
            } else {
                Ok(Expr::Var(atom.to_string()))
            }
        }
    }
}

fn lower_quote(items: &[Sexp]) -> Result<Expr, Error> {
    match items {
        [Sexp::List(quoted)] if quoted.is_empty() => Ok(Expr::Nil),
        _ => Err(Error::Parse(
            "only the empty list can be quoted".to_string(),
        )),
    }
}

fn lower_lambda(items: &[Sexp]) -> Result<Expr, Error> {
    match items {
        [Sexp::List(params), body] => {
            let params = params
                .iter()
                .map(|param| match param {
                    Sexp::Atom(name) => Ok(name.clone()),
                    Sexp::List(_) => {
                        Err(Error::Parse("lambda parameters must be names".to_string()))
                    }
                })
                .collect::<Result<Vec<String>, Error>>()?;
            Ok(Expr::Lambda(params, RC::new(lower(body)?)))
        }
        _ => Err(Error::Parse("malformed lambda".to_string())),
    }
}

fn lower_if(items: &[Sexp]) -> Result<Expr, Error> {
    match items {
        [condition, consequent, alternative] => Ok(Expr::If(
            RC::new(lower(condition)?),
            RC::new(lower(consequent)?),
            RC::new(lower(alternative)?),
        )),
        _ => Err(Error::Parse("malformed if".to_string())),
    }
}

/// Lower `(let ((x e) ...) body)` or `(letrec ...)` to nested
/// single-binding expressions.
fn lower_binding_form(
    items: &[Sexp],
    form: &str,
    constructor: fn(String, RC<Expr>, RC<Expr>) -> Expr,
) -> Result<Expr, Error> {
    match items {
        [Sexp::List(bindings), body] => {
            let mut lowered = Vec::new();
            for binding in bindings {
                match binding {
                    Sexp::List(pair) => match pair.as_slice() {
                        [Sexp::Atom(name), value] => lowered.push((name.clone(), lower(value)?)),
                        _ => return Err(Error::Parse(format!("malformed {} binding", form))),
                    },
                    Sexp::Atom(_) => {
                        return Err(Error::Parse(format!("malformed {} binding", form)))
                    }
                }
            }
            let mut expr = lower(body)?;
            for (name, value) in lowered.into_iter().rev() {
                expr = constructor(name, RC::new(value), RC::new(expr));
            }
            Ok(expr)
        }
        _ => Err(Error::Parse(format!("malformed {}", form))),
    }
}

fn lower_application(items: &[Sexp]) -> Result<Expr, Error> {
    let operator = lower(&items[0])?;
    let args = items[1..]
        .iter()
        .map(lower)
        .collect::<Result<Vec<Expr>, Error>>()?;
    Ok(Expr::App(RC::new(operator), args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literals_and_variables() {
        assert_eq!(parse("42").unwrap(), Expr::Int(42));
        assert_eq!(parse("-7").unwrap(), Expr::Int(-7));
        assert_eq!(parse("#t").unwrap(), Expr::Bool(true));
        assert_eq!(parse("'()").unwrap(), Expr::Nil);
        assert_eq!(parse("x").unwrap(), Expr::Var("x".to_string()));
    }

    #[test]
    fn parses_lambda_and_application() {
        let expr = parse("((lambda (x) x) 42)").unwrap();
        match expr {
            Expr::App(operator, args) => {
                assert_eq!(
                    *operator,
                    Expr::Lambda(
                        vec!["x".to_string()],
                        RC::new(Expr::Var("x".to_string()))
                    )
                );
                assert_eq!(args, vec![Expr::Int(42)]);
            }
            _ => panic!("expected an application"),
        }
    }

    #[test]
    fn let_with_multiple_bindings_nests() {
        let expr = parse("(let ((x 1) (y 2)) y)").unwrap();
        assert_eq!(
            expr,
            Expr::Let(
                "x".to_string(),
                RC::new(Expr::Int(1)),
                RC::new(Expr::Let(
                    "y".to_string(),
                    RC::new(Expr::Int(2)),
                    RC::new(Expr::Var("y".to_string()))
                ))
            )
        );
    }

    #[test]
    fn display_round_trips() {
        let source = "(letrec ((f (lambda (n) (if (= n 0) 1 (f (- n 1)))))) (f 3))";
        let expr = parse(source).unwrap();
        assert_eq!(parse(&expr.to_string()).unwrap(), expr);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("(").is_err());
        assert!(parse(")").is_err());
        assert!(parse("()").is_err());
        assert!(parse("(if #t 1)").is_err());
        assert!(parse("'(1 2)").is_err());
        assert!(parse("1 2").is_err());
    }
}
