use serde_json::{Map, Value};

use sift_core::{BoundaryKind, ChunkStrategy};

use super::text::text_units;
use super::{char_len, hard_cut, pack, Piece, SplitConfig, Splitter, Unit};

/// JSON documents split between top-level elements or members, each chunk a
/// valid document of its own. JSON Lines splits between records. Anything
/// else falls back to text splitting.
pub struct StructuredSplitter;

impl Splitter for StructuredSplitter {
    fn strategy(&self) -> ChunkStrategy {
        ChunkStrategy::StructuredData
    }

    fn split_oversized(&self, body: &str, config: &SplitConfig) -> Vec<Piece> {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Array(items)) => split_array(items, config),
            Ok(Value::Object(members)) => split_object(members, config),
            Ok(_) => text_fragments(body, config),
            Err(_) => match json_line_units(body) {
                Some(records) => pack(records, config),
                None => text_fragments(body, config),
            },
        }
    }
}

/// Text packing for payloads that cannot be split structurally. The pieces do
/// not re-parse, so they are all marked `Fragment`.
fn text_fragments(body: &str, config: &SplitConfig) -> Vec<Piece> {
    pack(text_units(body, config.target_chunk_size), config)
        .into_iter()
        .map(|(text, _)| (text, BoundaryKind::Fragment))
        .collect()
}

fn split_array(items: Vec<Value>, config: &SplitConfig) -> Vec<Piece> {
    let rendered = items.iter().map(Value::to_string).collect();
    group(rendered, ('[', ']'), BoundaryKind::ArrayElement, config)
}

fn split_object(members: Map<String, Value>, config: &SplitConfig) -> Vec<Piece> {
    let rendered = members
        .iter()
        .map(|(key, value)| format!("{}:{}", Value::String(key.clone()), value))
        .collect();
    group(rendered, ('{', '}'), BoundaryKind::ObjectMember, config)
}

/// Greedy batches of rendered items, each batch wrapped in `open`/`close`.
/// An item too large to wrap under the hard-cut threshold is cut.
fn group(
    items: Vec<String>,
    (open, close): (char, char),
    boundary: BoundaryKind,
    config: &SplitConfig,
) -> Vec<Piece> {
    let target = config.target_chunk_size.max(1);
    let hard = config.hard_cut_threshold();

    let mut out = Vec::new();
    let mut batch: Vec<String> = Vec::new();
    let mut batch_len = 2;

    let wrap = |batch: &mut Vec<String>| {
        format!("{open}{}{close}", std::mem::take(batch).join(","))
    };

    for item in items {
        let len = char_len(&item);
        if len + 2 > hard {
            if !batch.is_empty() {
                out.push((wrap(&mut batch), boundary));
                batch_len = 2;
            }
            let wrapped = format!("{open}{item}{close}");
            out.extend(
                hard_cut(&wrapped, target)
                    .into_iter()
                    .map(|piece| (piece, BoundaryKind::Fragment)),
            );
            continue;
        }

        let separator = usize::from(!batch.is_empty());
        if !batch.is_empty() && batch_len + separator + len > target {
            out.push((wrap(&mut batch), boundary));
            batch_len = 2;
        }
        batch_len += usize::from(!batch.is_empty()) + len;
        batch.push(item);
    }
    if !batch.is_empty() {
        out.push((wrap(&mut batch), boundary));
    }
    out
}

/// One unit per line when every non-blank line is a JSON value.
fn json_line_units(body: &str) -> Option<Vec<Unit>> {
    let mut units = Vec::new();
    let mut records = 0;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            serde_json::from_str::<Value>(trimmed).ok()?;
            records += 1;
        }
        units.push(Unit::new(line, BoundaryKind::Record));
    }
    (records > 0).then_some(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(target: usize) -> SplitConfig {
        SplitConfig {
            target_chunk_size: target,
            hard_cut_factor: 4,
        }
    }

    #[test]
    fn array_chunks_are_valid_arrays_covering_all_elements() {
        let items: Vec<Value> = (0..100)
            .map(|i| json!({"id": i, "name": format!("item-{i}"), "tags": ["a", "b"]}))
            .collect();
        let body = serde_json::to_string_pretty(&Value::Array(items.clone())).unwrap();

        let pieces = StructuredSplitter.split_oversized(&body, &cfg(500));
        assert!(pieces.len() > 1);

        let mut seen = Vec::new();
        for (text, boundary) in &pieces {
            assert_eq!(*boundary, BoundaryKind::ArrayElement);
            assert!(char_len(text) <= 500);
            match serde_json::from_str::<Value>(text).unwrap() {
                Value::Array(part) => seen.extend(part),
                other => panic!("expected array, got {other}"),
            }
        }
        assert_eq!(seen, items);
    }

    #[test]
    fn object_chunks_keep_member_order() {
        let mut members = Map::new();
        for i in 0..60 {
            members.insert(format!("key_{i:02}"), json!("v".repeat(20)));
        }
        let body = Value::Object(members.clone()).to_string();

        let pieces = StructuredSplitter.split_oversized(&body, &cfg(200));
        assert!(pieces.len() > 1);

        let mut merged = Map::new();
        for (text, boundary) in &pieces {
            assert_eq!(*boundary, BoundaryKind::ObjectMember);
            let Value::Object(part) = serde_json::from_str::<Value>(text).unwrap() else {
                panic!("expected object");
            };
            merged.extend(part);
        }
        let keys: Vec<_> = merged.keys().cloned().collect();
        let expected: Vec<_> = members.keys().cloned().collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn json_lines_split_between_records() {
        let body: String = (0..50)
            .map(|i| format!("{{\"event\":\"tick\",\"n\":{i}}}\n"))
            .collect();
        let pieces = StructuredSplitter.split_oversized(&body, &cfg(120));
        assert!(pieces.len() > 1);
        for (text, boundary) in &pieces {
            assert_eq!(*boundary, BoundaryKind::Record);
            for line in text.lines() {
                assert!(serde_json::from_str::<Value>(line).is_ok());
            }
        }
        let joined: String = pieces.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(joined, body);
    }

    #[test]
    fn unparseable_input_falls_back_to_text() {
        let body = "{ not json at all\n\n".repeat(20);
        let pieces = StructuredSplitter.split_oversized(&body, &cfg(60));
        let joined: String = pieces.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(joined, body);
        assert!(pieces.iter().all(|(_, b)| *b == BoundaryKind::Fragment));
    }

    #[test]
    fn huge_element_is_cut_into_fragments() {
        let body = json!(["small", "x".repeat(1_000), "tail"]).to_string();
        let pieces = StructuredSplitter.split_oversized(&body, &cfg(100));
        assert_eq!(pieces.first().map(|p| p.1), Some(BoundaryKind::ArrayElement));
        assert!(pieces.iter().any(|(_, b)| *b == BoundaryKind::Fragment));
        assert!(pieces.iter().all(|(t, _)| char_len(t) <= 100));
    }
}
