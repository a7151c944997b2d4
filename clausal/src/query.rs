//! Free-text query parsing.
//!
//! Two forms are accepted:
//!
//! - full predicate syntax, `partner(john, Y)`
//! - a bare argument list, `john, Y`, applied to the default predicate
//!
//! Arguments are split on top-level commas and classified with
//! [`Term::from_token`]. Arity and argument types are left for the engine.

use crate::error::ClausalError;
use crate::goal::{Goal, Term};
use crate::ClausalResult;

/// Tracks whether the scanner is inside a quoted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

impl Quote {
    fn step(self, c: char) -> Quote {
        match (self, c) {
            (Quote::None, '\'') => Quote::Single,
            (Quote::None, '"') => Quote::Double,
            (Quote::Single, '\'') | (Quote::Double, '"') => Quote::None,
            (state, _) => state,
        }
    }
}

pub fn parse_query(text: &str, default_predicate: Option<&str>) -> ClausalResult<Goal> {
    check_parentheses(text)?;
    let text = text.trim();

    if let Some((name, inner)) = split_call(text) {
        let args = split_arguments(inner)?;
        return Goal::new(name, args);
    }

    let predicate = default_predicate
        .ok_or_else(|| ClausalError::validation("No default predicate set"))?;
    let args = split_arguments(text)?;
    Goal::new(predicate, args)
}

/// Reject text whose parentheses do not balance. Parentheses inside quoted
/// atoms and strings are not counted.
pub fn check_parentheses(text: &str) -> ClausalResult<()> {
    let mut depth: i64 = 0;
    let mut quote = Quote::None;
    for c in text.chars() {
        quote = quote.step(c);
        if quote != Quote::None {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(mismatched());
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(mismatched());
    }
    Ok(())
}

fn mismatched() -> ClausalError {
    ClausalError::validation("Mismatched parentheses in query")
}

/// Split `name(...)` into the name and the text between the outer parentheses.
/// Returns `None` unless the parenthesis opened right after the name closes at
/// the very end of the text.
fn split_call(text: &str) -> Option<(&str, &str)> {
    let name_end = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)?;
    let name = &text[..name_end];
    if !name.chars().next()?.is_ascii_alphabetic() || !text[name_end..].starts_with('(') {
        return None;
    }

    let mut depth = 0usize;
    let mut quote = Quote::None;
    for (i, c) in text[name_end..].char_indices() {
        quote = quote.step(c);
        if quote != Quote::None {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let close = name_end + i;
                    return if close == text.len() - 1 {
                        Some((name, &text[name_end + 1..close]))
                    } else {
                        None
                    };
                }
            }
            _ => {}
        }
    }
    None
}

/// Split an argument list on commas that are not nested inside brackets or quotes.
pub fn split_arguments(text: &str) -> ClausalResult<Vec<Term>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut tokens = Vec::new();
    let mut depth = 0i64;
    let mut quote = Quote::None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        quote = quote.step(c);
        if quote != Quote::None {
            continue;
        }
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                tokens.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(&text[start..]);

    tokens
        .into_iter()
        .enumerate()
        .map(|(position, token)| {
            let token = token.trim();
            if token.is_empty() {
                Err(ClausalError::validation(format!(
                    "Empty argument at position {} in query",
                    position + 1
                )))
            } else {
                Ok(Term::from_token(token))
            }
        })
        .collect()
}
