//! Report formatting. Every command produces the engine's JSON envelope;
//! the non-JSON formats flatten it for terminal reading.

use serde_json::Value;
use std::io;
use tabled::{builder::Builder, Table};

use crate::OutputFormat;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => print_table(value),
        OutputFormat::Csv => print_csv(value),
        OutputFormat::Minimal => print_minimal(value),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

/// Headline figures, one per report type, for scripting.
const MINIMAL_KEYS: [&str; 5] = [
    "estimated_value",
    "weighted_average_cost_of_capital",
    "trailing_twelve_month_free_cash_flow",
    "avg_monthly_free_cash_flow",
    "changed_loans",
];

fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result {
        for key in MINIMAL_KEYS {
            match map.get(key) {
                Some(Value::Array(items)) => {
                    println!("{}", items.len());
                    return;
                }
                Some(v) if !v.is_null() => {
                    println!("{}", flat(v));
                    return;
                }
                _ => {}
            }
        }
        if let Some((key, v)) = map.iter().next() {
            println!("{}: {}", key, flat(v));
            return;
        }
    }
    println!("{}", flat(result));
}

fn print_table(value: &Value) {
    let Some(envelope) = value.as_object() else {
        println!("{}", value);
        return;
    };

    match envelope.get("result") {
        Some(Value::Object(result)) => {
            // Array-valued fields (buckets, loan lists, history) get their
            // own table below the scalar summary.
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            let mut sections: Vec<(&str, &Vec<Value>)> = Vec::new();
            for (key, val) in result {
                match val {
                    Value::Array(items) if items.first().map_or(false, Value::is_object) => {
                        sections.push((key, items));
                    }
                    _ => builder.push_record([key.as_str(), &flat(val)]),
                }
            }
            println!("{}", Table::from(builder));
            for (name, items) in sections {
                println!("\n{name}:");
                print_record_table(items);
            }
        }
        Some(Value::Array(items)) => print_record_table(items),
        _ => {
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            for (key, val) in envelope {
                builder.push_record([key.as_str(), &flat(val)]);
            }
            println!("{}", Table::from(builder));
        }
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }
    if let Some(Value::String(methodology)) = envelope.get("methodology") {
        println!("\nMethodology: {}", methodology);
    }
}

fn print_record_table(items: &[Value]) {
    let Some(Value::Object(first)) = items.first() else {
        for item in items {
            println!("{}", flat(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in items {
        if let Value::Object(map) = item {
            builder.push_record(
                headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(flat).unwrap_or_default()),
            );
        }
    }
    println!("{}", Table::from(builder));
}

fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Object(map) => {
            // Prefer the first array-of-records field (monthly buckets, loan
            // summaries); fall back to field,value pairs.
            let records = map.values().find_map(|v| match v {
                Value::Array(items) if items.first().map_or(false, Value::is_object) => {
                    Some(items)
                }
                _ => None,
            });
            match records {
                Some(items) => write_record_csv(&mut wtr, items),
                None => {
                    let _ = wtr.write_record(["field", "value"]);
                    for (key, val) in map {
                        let _ = wtr.write_record([key.as_str(), &flat(val)]);
                    }
                }
            }
        }
        Value::Array(items) => write_record_csv(&mut wtr, items),
        other => {
            let _ = wtr.write_record([&flat(other)]);
        }
    }

    let _ = wtr.flush();
}

fn write_record_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, items: &[Value]) {
    let Some(Value::Object(first)) = items.first() else {
        for item in items {
            let _ = wtr.write_record([&flat(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);
    for item in items {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(flat).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}

fn flat(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
