use indexmap::IndexMap;
use ratatui::style::Color;
use serde::Deserialize;

// Default sizing hint for inferred columns, in characters. The actual render
// width grows with the cell content up to the configured maximum.
pub const COLUMN_WIDTH_DEFAULT: usize = 12;

// Field name the trigger stream uses for its correlation reason codes.
pub const REASON_FIELD: &str = "reason";

// A single cell value. The backend only ever sends scalars in its hits,
// everything else is a decode error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl Scalar {
    pub fn render(&self) -> String {
        match self {
            Scalar::Null => "∅".to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Number(n) => n.to_string(),
            Scalar::String(s) => s.replace("\r\n", " ↵ ").replace("\n", " ↵ "),
        }
    }
}

// One row as returned by the backend. IndexMap keeps the field order of the
// wire payload, which is what the column order below is derived from.
pub type Record = IndexMap<String, Scalar>;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub id: String,
    pub label: String,
    pub sortable: bool,
    pub width: usize,
    pub resizable: bool,
}

/// Derive the column schema from a result set.
///
/// The shape of the hits is unknown ahead of time, so the schema is taken
/// from the keys of the first record, in their original order. Records after
/// the first are never inspected. Fields that only show up in later records
/// therefore do not produce a column, that is a known limitation of the
/// first-record rule and kept on purpose.
pub fn infer_columns(hits: &[Record]) -> Vec<ColumnSpec> {
    match hits.first() {
        None => Vec::new(),
        Some(first) => first
            .keys()
            .map(|key| ColumnSpec {
                id: key.clone(),
                label: derive_label(key),
                sortable: true,
                width: COLUMN_WIDTH_DEFAULT,
                resizable: true,
            })
            .collect(),
    }
}

// "next_run_at" -> "Next run at"
pub fn derive_label(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => spaced,
    }
}

/// Display label and color for a trigger correlation reason code.
///
/// Unknown codes pass through unchanged with a neutral color, the trigger
/// stream is allowed to grow new reasons without breaking the viewer.
pub fn reason_label(code: &str) -> (String, Color) {
    match code {
        "service_discovery" => ("Service Discovery".to_string(), Color::Blue),
        "manual_extraction" => ("Manual Extraction".to_string(), Color::Magenta),
        "temporal" => ("Temporal".to_string(), Color::Green),
        _ => (code.to_string(), Color::Gray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, Scalar)]) -> Record {
        fields
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn no_columns_without_hits() {
        assert_eq!(infer_columns(&[]), Vec::new());
    }

    #[test]
    fn columns_follow_first_record_key_order() {
        let hits = vec![record(&[
            ("stream", Scalar::String("default".to_string())),
            ("alert_name", Scalar::String("cpu-high".to_string())),
            ("is_realtime", Scalar::Bool(false)),
            ("last_fired", Scalar::Null),
        ])];
        let columns = infer_columns(&hits);
        let ids: Vec<&str> = columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["stream", "alert_name", "is_realtime", "last_fired"]);
    }

    #[test]
    fn later_records_do_not_contribute_columns() {
        let hits = vec![
            record(&[("alert_name", Scalar::String("cpu-high".to_string()))]),
            record(&[
                ("alert_name", Scalar::String("mem-low".to_string())),
                ("extra", Scalar::Bool(true)),
            ]),
        ];
        assert_eq!(infer_columns(&hits).len(), 1);
    }

    #[test]
    fn inferred_columns_are_sortable_and_resizable() {
        let hits = vec![record(&[("count", Scalar::Number(3.into()))])];
        let columns = infer_columns(&hits);
        assert!(columns[0].sortable);
        assert!(columns[0].resizable);
        assert_eq!(columns[0].width, COLUMN_WIDTH_DEFAULT);
    }

    #[test]
    fn labels_are_derived_from_field_names() {
        assert_eq!(derive_label("next_run_at"), "Next run at");
        assert_eq!(derive_label("alert_name"), "Alert name");
        assert_eq!(derive_label("reason"), "Reason");
        assert_eq!(derive_label(""), "");
    }

    #[test]
    fn known_reasons_get_distinct_labels() {
        let (temporal, temporal_color) = reason_label("temporal");
        let (discovery, discovery_color) = reason_label("service_discovery");
        let (manual, _) = reason_label("manual_extraction");
        assert!(!temporal.is_empty());
        assert!(!discovery.is_empty());
        assert!(!manual.is_empty());
        assert_ne!(temporal, discovery);
        assert_ne!(discovery, manual);
        assert_ne!(temporal_color, discovery_color);
    }

    #[test]
    fn unknown_reason_passes_through() {
        let (label, color) = reason_label("unknown_code");
        assert_eq!(label, "unknown_code");
        assert_eq!(color, Color::Gray);
    }

    #[test]
    fn scalar_rendering() {
        assert_eq!(Scalar::Null.render(), "∅");
        assert_eq!(Scalar::Bool(true).render(), "true");
        assert_eq!(Scalar::Number(1700000000000i64.into()).render(), "1700000000000");
        assert_eq!(
            Scalar::String("line\nbreak".to_string()).render(),
            "line ↵ break"
        );
    }
}
