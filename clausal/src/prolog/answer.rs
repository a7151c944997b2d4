//! Conversion of engine answer terms into caller-facing values and text.

use crate::goal::{is_atom_name, quote_atom};
use scryer_prolog::Term;
use serde_json::{Number, Value};

/// Answer value handed back to callers: atoms and strings become JSON strings,
/// numbers stay numbers, lists become arrays and anything else is rendered as
/// Prolog text.
pub(crate) fn to_json(term: &Term) -> Value {
    match term {
        Term::Integer(i) => integer(&i.to_string()),
        Term::Float(f) => float(&f.to_string()),
        Term::Atom(name) if name == "[]" => Value::Array(Vec::new()),
        Term::Atom(name) => Value::String(name.clone()),
        Term::String(text) => Value::String(text.clone()),
        Term::List(items) => Value::Array(items.iter().map(to_json).collect()),
        Term::Var(name) => Value::String(unbound(name)),
        other => Value::String(render(other)),
    }
}

fn integer(text: &str) -> Value {
    text.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}

fn float(text: &str) -> Value {
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

/// Name reported for a variable the engine left unbound
pub(crate) fn unbound(name: &str) -> String {
    if name.starts_with('_') {
        name.to_string()
    } else {
        format!("_{}", name)
    }
}

const INFIX: &[&str] = &["/", ":", "-", "+", "*", "=", "==", "->", ","];

/// Prolog text for a term
pub(crate) fn render(term: &Term) -> String {
    match term {
        Term::Integer(i) => i.to_string(),
        Term::Float(f) => f.to_string(),
        Term::Atom(name) => atom(name),
        Term::String(text) => format!("{:?}", text),
        Term::List(items) => format!("[{}]", join(items)),
        Term::Compound(name, args) if args.len() == 2 && INFIX.contains(&name.as_str()) => {
            format!("{}{}{}", render(&args[0]), name, render(&args[1]))
        }
        Term::Compound(name, args) => format!("{}({})", atom(name), join(args)),
        Term::Var(name) => name.clone(),
        other => format!("{:?}", other),
    }
}

fn join(terms: &[Term]) -> String {
    terms.iter().map(render).collect::<Vec<_>>().join(", ")
}

fn atom(name: &str) -> String {
    if is_atom_name(name) || name == "[]" || name == "!" {
        name.to_string()
    } else {
        quote_atom(name)
    }
}

/// Readable diagnostic for an exception term thrown by the engine
pub(crate) fn describe(error: &Term) -> String {
    let Term::Compound(name, args) = error else {
        return render(error);
    };
    if name != "error" || args.len() != 2 {
        return render(error);
    }
    match &args[0] {
        Term::Compound(kind, detail) => match (kind.as_str(), detail.as_slice()) {
            ("existence_error", [Term::Atom(what), culprit]) if what == "procedure" => {
                format!("Unknown procedure: {}", render(culprit))
            }
            ("type_error", [expected, culprit]) => format!(
                "Type error: {} expected, found {}",
                render(expected),
                render(culprit)
            ),
            ("syntax_error", [what]) => format!("Syntax error: {}", render(what)),
            _ => render(error),
        },
        Term::Atom(kind) if kind == "instantiation_error" => {
            "Arguments are not sufficiently instantiated".to_string()
        }
        _ => render(error),
    }
}
