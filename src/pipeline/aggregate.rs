//! Merge per-page JSON into one document-level object.
//!
//! Pages of the same document tend to repeat sections (a header block, a
//! running table) with partial content each. Top-level keys are combined
//! by type:
//!
//! | page value | action |
//! |------------|--------|
//! | object | deep-merged into the accumulated object |
//! | array  | appended to the accumulated array |
//! | scalar | first non-empty value wins |
//!
//! The merged object is then cleaned: arrays are deduplicated in order and
//! empty values are dropped from nested objects.

use crate::output::PageExtraction;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

/// Merge the `extracted_data` of every successful page.
///
/// Pages whose data is not a JSON object contribute nothing.
pub fn aggregate_pages(pages: &[PageExtraction]) -> Value {
    let mut aggregated = Map::new();

    for page in pages.iter().filter(|p| p.success) {
        let Some(data) = page.extracted_data.as_object() else {
            warn!(
                "Page {}: extracted data is not an object, skipped in aggregation",
                page.page_number
            );
            continue;
        };

        for (section, value) in data {
            match value {
                Value::Object(obj) => match aggregated
                    .entry(section.clone())
                    .or_insert_with(|| Value::Object(Map::new()))
                {
                    Value::Object(target) => deep_merge(target, obj),
                    _ => warn!(
                        "Page {}: section '{}' is an object here but not earlier, skipped",
                        page.page_number, section
                    ),
                },
                Value::Array(items) => match aggregated
                    .entry(section.clone())
                    .or_insert_with(|| Value::Array(Vec::new()))
                {
                    Value::Array(target) => target.extend(items.iter().cloned()),
                    _ => warn!(
                        "Page {}: section '{}' is an array here but not earlier, skipped",
                        page.page_number, section
                    ),
                },
                scalar => {
                    let keep_existing = aggregated.get(section).is_some_and(|v| !is_empty(v));
                    if !is_empty(scalar) && !keep_existing {
                        aggregated.insert(section.clone(), scalar.clone());
                    }
                }
            }
        }
    }

    clean_aggregated(aggregated)
}

/// Recursively merge `source` into `target`.
///
/// object+object recurses, array+array extends, array+object pushes the
/// object, object+array keeps the object, anything else overwrites.
pub fn deep_merge(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        let merged = match (target.get_mut(key), value) {
            (Some(Value::Object(t)), Value::Object(s)) => {
                deep_merge(t, s);
                true
            }
            (Some(Value::Array(t)), Value::Array(s)) => {
                t.extend(s.iter().cloned());
                true
            }
            (Some(Value::Array(t)), Value::Object(_)) => {
                t.push(value.clone());
                true
            }
            (Some(Value::Object(_)), Value::Array(_)) => true,
            _ => false,
        };
        if !merged {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn clean_aggregated(data: Map<String, Value>) -> Value {
    let cleaned = data
        .into_iter()
        .map(|(section, content)| {
            let content = match content {
                Value::Array(items) => Value::Array(dedup(items)),
                Value::Object(obj) => Value::Object(clean_object(obj)),
                other => other,
            };
            (section, content)
        })
        .collect();
    Value::Object(cleaned)
}

/// Drop empty values, recursing into objects and deduplicating arrays.
/// A nested object is kept even if it ends up empty after cleaning.
pub fn clean_object(obj: Map<String, Value>) -> Map<String, Value> {
    obj.into_iter()
        .filter(|(_, v)| !is_empty(v))
        .map(|(k, v)| {
            let v = match v {
                Value::Object(o) => Value::Object(clean_object(o)),
                Value::Array(a) => Value::Array(dedup(a)),
                other => other,
            };
            (k, v)
        })
        .collect()
}

/// Remove duplicates, keeping the first occurrence. Items compare by their
/// canonical (key-sorted) JSON text.
pub fn dedup(items: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(canonical(item)))
        .collect()
}

fn canonical(v: &Value) -> String {
    match v {
        Value::Object(obj) => {
            let sorted: Vec<String> = obj
                .iter()
                .collect::<std::collections::BTreeMap<_, _>>()
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical(v)))
                .collect();
            format!("{{{}}}", sorted.join(","))
        }
        Value::Array(items) => {
            format!("[{}]", items.iter().map(canonical).collect::<Vec<_>>().join(","))
        }
        other => other.to_string(),
    }
}

/// `null`, `false`, zero, `""`, `[]` and `{}`.
pub fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Dotted paths of every field in `value`. Arrays of objects contribute the
/// fields of their first element as `name[0].child`.
pub fn field_paths(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Value::Object(obj) = value {
        collect_paths(obj, "", &mut out);
    }
    out
}

fn collect_paths(obj: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in obj {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        out.push(name.clone());
        match value {
            Value::Object(child) => collect_paths(child, &name, out),
            Value::Array(items) => {
                if let Some(Value::Object(first)) = items.first() {
                    collect_paths(first, &format!("{name}[0]"), out);
                }
            }
            _ => {}
        }
    }
}

/// Paths present in both, only in `a`, only in `b`; each sorted.
pub fn diff_paths(a: &[String], b: &[String]) -> (Vec<String>, Vec<String>, Vec<String>) {
    let a: BTreeSet<&String> = a.iter().collect();
    let b: BTreeSet<&String> = b.iter().collect();
    let common = a.intersection(&b).map(|p| (*p).clone()).collect();
    let only_a = a.difference(&b).map(|p| (*p).clone()).collect();
    let only_b = b.difference(&a).map(|p| (*p).clone()).collect();
    (common, only_a, only_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(n: usize, data: Value) -> PageExtraction {
        PageExtraction {
            page_number: n,
            success: true,
            extracted_data: data,
            confidence: 1.0,
            text_length: 0,
            error: None,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        }
    }

    #[test]
    fn aggregation_keeps_first_seen_key_order() {
        let pages = vec![
            page(1, json!({"patient": {"name": "A", "id": "7"}, "date": "2024-01-01"})),
            page(2, json!({"results": [{"code": 1}], "patient": {"age": 40}})),
        ];
        let agg = aggregate_pages(&pages);
        let keys: Vec<&str> = agg.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["patient", "date", "results"]);
        let inner: Vec<&str> = agg["patient"].as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(inner, vec!["name", "id", "age"]);
    }

    #[test]
    fn sections_merge_by_type() {
        let pages = vec![
            page(1, json!({"patient": {"name": "Ann"}, "tests": [{"n": "glucose"}], "title": ""})),
            page(2, json!({"patient": {"age": 40}, "tests": [{"n": "hdl"}], "title": "Lab report"})),
            page(3, json!({"title": "Ignored later title"})),
        ];
        let merged = aggregate_pages(&pages);
        assert_eq!(merged["patient"], json!({"name": "Ann", "age": 40}));
        assert_eq!(merged["tests"], json!([{"n": "glucose"}, {"n": "hdl"}]));
        assert_eq!(merged["title"], json!("Lab report"));
    }

    #[test]
    fn failed_pages_are_skipped() {
        let mut bad = page(2, json!({"x": 1}));
        bad.success = false;
        let merged = aggregate_pages(&[page(1, json!({"y": 2})), bad]);
        assert_eq!(merged, json!({"y": 2}));
    }

    #[test]
    fn deep_merge_rules() {
        let mut target = json!({
            "a": {"x": 1}, "b": [1], "c": [{"k": 1}], "d": {"keep": true}, "e": "old"
        })
        .as_object()
        .cloned()
        .unwrap();
        let source = json!({
            "a": {"y": 2}, "b": [2], "c": {"k": 2}, "d": [9], "e": "new", "f": null
        });
        deep_merge(&mut target, source.as_object().unwrap());
        assert_eq!(
            Value::Object(target),
            json!({
                "a": {"x": 1, "y": 2}, "b": [1, 2], "c": [{"k": 1}, {"k": 2}],
                "d": {"keep": true}, "e": "new", "f": null
            })
        );
    }

    #[test]
    fn arrays_deduplicate_objects_regardless_of_key_order() {
        let items = vec![json!({"a": 1, "b": 2}), json!({"b": 2, "a": 1}), json!("x"), json!("x")];
        assert_eq!(dedup(items), vec![json!({"a": 1, "b": 2}), json!("x")]);
    }

    #[test]
    fn nested_empty_values_are_dropped() {
        let merged = aggregate_pages(&[page(
            1,
            json!({"info": {"name": "Bo", "fax": "", "n": 0, "flag": false, "tags": [], "sub": {"z": null}}}),
        )]);
        assert_eq!(merged["info"], json!({"name": "Bo", "sub": {}}));
    }

    #[test]
    fn field_paths_walk_objects_and_first_array_item() {
        let v = json!({"patient": {"name": "A"}, "tests": [{"code": 1}, {"other": 2}], "n": 3});
        let mut paths = field_paths(&v);
        paths.sort();
        assert_eq!(
            paths,
            vec!["n", "patient", "patient.name", "tests", "tests[0].code"]
        );
        assert!(field_paths(&json!("scalar")).is_empty());
    }

    #[test]
    fn diff_paths_partitions() {
        let a = vec!["x".to_string(), "y".to_string()];
        let b = vec!["y".to_string(), "z".to_string()];
        let (common, only_a, only_b) = diff_paths(&a, &b);
        assert_eq!(common, vec!["y"]);
        assert_eq!(only_a, vec!["x"]);
        assert_eq!(only_b, vec!["z"]);
    }
}
