//! Set command - merges attributes into a document and saves the record.

use serde_json::{Map, Value, json};

use crate::cli::SetArgs;
use crate::commands::open;
use crate::output::{OutputFormat, print_value};

/// Parse `PATH=VALUE`. Values that are not valid JSON are taken as strings.
pub fn parse_assignment(raw: &str) -> Result<(Vec<String>, Value), String> {
    let (path, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=VALUE, got '{raw}'"))?;
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        return Err(format!("invalid attribute path in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((segments, value))
}

/// Insert `value` at `path`, creating intermediate objects. A non-object in
/// the way is replaced.
fn insert_path(target: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = target;
    for segment in parents {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(last.clone(), value);
}

/// Build the nested update from every assignment, later ones winning.
pub fn build_update(assignments: &[String]) -> Result<Map<String, Value>, String> {
    let mut values = Map::new();
    for raw in assignments {
        let (path, value) = parse_assignment(raw)?;
        insert_path(&mut values, &path, value);
    }
    Ok(values)
}

/// Run the set command
pub fn run(args: &SetArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let values = build_update(&args.assignments)?;

    let target = open(&args.target)?;
    let doc = &target.document;
    let saved = doc.update_recursive(values)?;

    match format {
        OutputFormat::Human => println!("{}", if saved { "saved" } else { "vetoed" }),
        OutputFormat::Json => {
            print_value(&json!({"saved": saved, "value": doc.to_value()}), format)?;
        }
    }

    Ok(())
}
