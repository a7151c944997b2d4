use clausal::{ClausalResult, QueryResult, Solution};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Row, Table};
use serde_json::Value;

pub struct Formatter {
    json: bool,
}

impl Formatter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn format_result(&self, query: &str, result: &QueryResult) -> String {
        if self.json {
            return format!("{}\n", to_json(result));
        }
        let mut output = String::new();
        if !query.is_empty() {
            output.push_str(&format!("?- {}\n", query));
        }
        output.push_str(&self.format_answers(result));
        output
    }

    /// One streamed answer; JSON output is one document per line
    pub fn format_stream_item(&self, result: &QueryResult) -> String {
        if self.json {
            return format!("{}\n", serde_json::to_string(result).unwrap_or_default());
        }
        match result {
            QueryResult::Bool(b) => format!("{}\n", b),
            QueryResult::Solutions(solutions) => solutions
                .iter()
                .map(|s| format!("{}\n", inline_bindings(s)))
                .collect(),
        }
    }

    pub fn format_batch(&self, queries: &[String], results: &[ClausalResult<QueryResult>]) -> String {
        if self.json {
            let values: Vec<Value> = results
                .iter()
                .map(|r| match r {
                    Ok(result) => serde_json::to_value(result).unwrap_or(Value::Null),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                })
                .collect();
            return format!("{}\n", to_json(&values));
        }

        let mut output = String::new();
        for (query, result) in queries.iter().zip(results) {
            output.push_str(&format!("?- {}\n", query));
            match result {
                Ok(result) => output.push_str(&self.format_answers(result)),
                Err(e) => output.push_str(&format!("error: {}\n", e)),
            }
            output.push('\n');
        }
        output
    }

    fn format_answers(&self, result: &QueryResult) -> String {
        match result {
            QueryResult::Bool(b) => format!("{}\n", b),
            QueryResult::Solutions(solutions) => format!("{}\n", self.solutions_table(solutions)),
        }
    }

    fn solutions_table(&self, solutions: &[Solution]) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);

        let names: Vec<&String> = solutions.first().map(|s| s.keys().collect()).unwrap_or_default();
        table.set_header(Row::from(
            names
                .iter()
                .map(|n| Cell::new(n).set_alignment(CellAlignment::Left))
                .collect::<Vec<_>>(),
        ));

        for solution in solutions {
            let cells: Vec<String> = names
                .iter()
                .map(|name| solution.get(*name).map(display_value).unwrap_or_default())
                .collect();
            table.add_row(Row::from(cells));
        }

        table.to_string()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn inline_bindings(solution: &Solution) -> String {
    solution
        .iter()
        .map(|(name, value)| format!("{} = {}", name, display_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}
