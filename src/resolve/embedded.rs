use crate::constants::{EMBEDDED_PAYLOAD_VARIABLES, EMBEDDED_RECORD_KEYS};
use serde_json::Value;
use tracing::debug;

use super::html_table::FlatTable;

/// Look for an inline `var <name> = {...}` assignment carrying the record list
/// and turn the records into a flat table.
pub fn extract(body: &str) -> Option<FlatTable> {
    for name in EMBEDDED_PAYLOAD_VARIABLES {
        let Some(literal) = assigned_literal(body, name) else {
            continue;
        };
        let Some(payload) = parse_lenient(literal) else {
            debug!("embedded payload '{}' is not parseable JSON", name);
            continue;
        };
        if let Some(records) = record_list(&payload) {
            let table = records_to_table(records);
            if !table.rows.is_empty() {
                debug!("embedded payload '{}' carries {} records", name, table.rows.len());
                return Some(table);
            }
        }
    }
    None
}

/// The balanced `{...}` or `[...]` literal assigned to `name`, if any.
fn assigned_literal<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    let mut search_from = 0;
    while let Some(pos) = body[search_from..].find(name) {
        let after = search_from + pos + name.len();
        search_from = after;
        // Reject longer identifiers such as `ecrDataLoaded`.
        let preceded_ok = body[..after - name.len()]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '$'));
        let rest = body[after..].trim_start();
        if !preceded_ok || !rest.starts_with('=') || rest.starts_with("==") {
            continue;
        }
        let value = rest[1..].trim_start();
        let start = body.len() - value.len();
        if let Some(len) = balanced_len(value) {
            return Some(&body[start..start + len]);
        }
    }
    None
}

/// Length of the bracketed literal at the start of `s`, honoring string quotes.
fn balanced_len(s: &str) -> Option<usize> {
    let open = s.chars().next()?;
    if open != '{' && open != '[' {
        return None;
    }
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Strict JSON first, then once more with single quotes rewritten.
fn parse_lenient(literal: &str) -> Option<Value> {
    serde_json::from_str(literal)
        .or_else(|_| serde_json::from_str(&literal.replace('\'', "\"")))
        .ok()
}

fn record_list(payload: &Value) -> Option<&Vec<Value>> {
    if let Some(list) = payload.as_array() {
        return Some(list);
    }
    let obj = payload.as_object()?;
    for key in EMBEDDED_RECORD_KEYS {
        if let Some(list) = obj.get(*key).and_then(Value::as_array) {
            return Some(list);
        }
    }
    obj.values()
        .filter_map(Value::as_object)
        .find_map(|nested| nested.get("players").and_then(Value::as_array))
}

/// Scalar fields become columns in first-seen order; nested values are dropped.
fn records_to_table(records: &[Value]) -> FlatTable {
    let mut columns: Vec<String> = Vec::new();
    for record in records.iter().filter_map(Value::as_object) {
        for (key, value) in record {
            if is_scalar(value) && !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    let rows = records
        .iter()
        .filter_map(Value::as_object)
        .map(|record| {
            columns
                .iter()
                .map(|c| record.get(c).map(scalar_text).unwrap_or_default())
                .collect()
        })
        .collect();
    FlatTable { columns, rows }
}

fn is_scalar(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null)
}

fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_players_under_known_variable() {
        let body = r#"<script>
            var ecrDataLoaded = true;
            var ecrData = {"sport":"NFL","players":[
                {"player_name":"Justin Jefferson","player_team_id":"MIN","rank_ecr":1,"stats":{"a":1}},
                {"player_name":"Ja'Marr Chase","player_team_id":"CIN","rank_ecr":2}
            ]};
        </script>"#;
        let t = extract(body).unwrap();
        assert!(t.columns.contains(&"player_name".to_string()));
        assert!(!t.columns.contains(&"stats".to_string()));
        assert_eq!(t.rows.len(), 2);
        let name = t.columns.iter().position(|c| c == "player_name").unwrap();
        assert_eq!(t.rows[1][name], "Ja'Marr Chase");
    }

    #[test]
    fn single_quoted_payload_and_nested_players() {
        let body = "cheatsheetData = {'meta': {'players': [{'name': 'A B', 'rank': 1}]}};";
        let t = extract(body).unwrap();
        assert_eq!(t.rows.len(), 1);
    }

    #[test]
    fn braces_inside_strings_do_not_end_literal() {
        assert_eq!(balanced_len(r#"{"a":"}{"} trailing"#), Some(10));
        assert_eq!(balanced_len("{unterminated"), None);
    }

    #[test]
    fn no_payload() {
        assert!(extract("<html><script>var other = {};</script></html>").is_none());
    }
}
