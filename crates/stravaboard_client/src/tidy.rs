//! Derivation of dashboard columns from raw activity records.
//!
//! | column | source | formula |
//! |---|---|---|
//! | `elapsed_min` | `elapsed_time` (s) | / 60, 2 dp |
//! | `distance_km` | `distance` (m) | / 1000, 2 dp |
//! | `speed_mins_per_km` | the two above | elapsed_min / distance_km, 2 dp, non-finite is null |
//! | `date` | `start_date_local` | calendar date before the time separator |
//!
//! Tidying never fails and never drops or adds rows. Flat records
//! ([`TidyRow::to_record`]) spell nested objects as dotted columns, so
//! `{"athlete": {"id": 9}}` becomes `athlete.id`.

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::utils::{parse_activity_date, round2};
use crate::{RawActivityRecord, RawActivitySet};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

pub const ELAPSED_TIME: &str = "elapsed_time";
pub const DISTANCE: &str = "distance";
pub const START_DATE_LOCAL: &str = "start_date_local";

pub const ELAPSED_MIN: &str = "elapsed_min";
pub const DISTANCE_KM: &str = "distance_km";
pub const SPEED_MINS_PER_KM: &str = "speed_mins_per_km";
pub const DATE: &str = "date";

/// A raw record plus its derived columns.
#[derive(Clone, Debug, PartialEq)]
pub struct TidyRow {
    pub raw: RawActivityRecord,
    pub elapsed_min: Option<f64>,
    pub distance_km: Option<f64>,
    pub speed_mins_per_km: Option<f64>,
    pub date: Option<NaiveDate>,
}

impl TidyRow {
    /// Flatten into one record: raw fields with nested objects spread into
    /// `parent.child` columns, then the derived columns (which win over raw
    /// fields of the same name). Missing values become `null`.
    pub fn to_record(&self) -> RawActivityRecord {
        let mut record = flatten_record(&self.raw);
        record.insert(ELAPSED_MIN.into(), number_or_null(self.elapsed_min));
        record.insert(DISTANCE_KM.into(), number_or_null(self.distance_km));
        record.insert(
            SPEED_MINS_PER_KM.into(),
            number_or_null(self.speed_mins_per_km),
        );
        record.insert(
            DATE.into(),
            self.date
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
        );
        record
    }
}

/// Spread nested objects into dotted keys, at any depth. Arrays and scalars
/// are kept as they are; an empty nested object contributes no column.
pub fn flatten_record(record: &RawActivityRecord) -> RawActivityRecord {
    let mut flat = RawActivityRecord::new();
    flatten_into(&mut flat, None, record);
    flat
}

fn flatten_into(flat: &mut RawActivityRecord, prefix: Option<&str>, record: &RawActivityRecord) {
    for (key, value) in record {
        let column = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(flat, Some(&column), nested),
            other => {
                flat.insert(column, other.clone());
            }
        }
    }
}

fn number_or_null(value: Option<f64>) -> Value {
    value
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Ordered rows, one per input record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TidyActivityTable {
    rows: Vec<TidyRow>,
}

impl TidyActivityTable {
    pub fn rows(&self) -> &[TidyRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<TidyRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TidyRow> {
        self.rows.iter()
    }

    /// First `n` rows. Fetching can overshoot its limit by part of a page;
    /// this is the place to apply an exact cap.
    pub fn head(&self, n: usize) -> Self {
        Self {
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    /// The records the table was derived from, in row order.
    pub fn raw_records(&self) -> RawActivitySet {
        self.rows.iter().map(|row| row.raw.clone()).collect()
    }

    pub fn to_records(&self) -> Vec<RawActivityRecord> {
        self.rows.iter().map(TidyRow::to_record).collect()
    }
}

impl<'a> IntoIterator for &'a TidyActivityTable {
    type Item = &'a TidyRow;
    type IntoIter = std::slice::Iter<'a, TidyRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl Serialize for TidyActivityTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows.iter().map(TidyRow::to_record))
    }
}

/// Derive the presentation columns for every record.
pub fn tidy(raw: &[RawActivityRecord], sink: &dyn DiagnosticSink) -> TidyActivityTable {
    if raw.is_empty() {
        sink.report(Diagnostic::NoData);
        return TidyActivityTable::default();
    }

    let elapsed_min = numeric_column(raw, ELAPSED_TIME, sink, |secs| round2(secs / 60.0));
    let distance_km = numeric_column(raw, DISTANCE, sink, |metres| round2(metres / 1000.0));
    let dates = date_column(raw, sink);

    let rows = raw
        .iter()
        .zip(elapsed_min)
        .zip(distance_km)
        .zip(dates)
        .map(|(((record, elapsed_min), distance_km), date)| TidyRow {
            raw: record.clone(),
            elapsed_min,
            distance_km,
            speed_mins_per_km: pace(elapsed_min, distance_km),
            date,
        })
        .collect();

    TidyActivityTable { rows }
}

/// Tidy an arbitrary JSON payload, which must be an array of objects.
pub fn tidy_json(value: &Value, sink: &dyn DiagnosticSink) -> TidyActivityTable {
    let Value::Array(items) = value else {
        sink.report(Diagnostic::MalformedInput {
            detail: format!("expected an array, got {}", json_kind(value)),
        });
        return TidyActivityTable::default();
    };

    let mut records = RawActivitySet::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Object(record) => records.push(record.clone()),
            other => {
                sink.report(Diagnostic::MalformedInput {
                    detail: format!("element {index} is {}", json_kind(other)),
                });
                return TidyActivityTable::default();
            }
        }
    }
    tidy(&records, sink)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn column_present(raw: &[RawActivityRecord], field: &str) -> bool {
    raw.iter().any(|record| record.contains_key(field))
}

fn numeric_column(
    raw: &[RawActivityRecord],
    field: &'static str,
    sink: &dyn DiagnosticSink,
    convert: impl Fn(f64) -> f64,
) -> Vec<Option<f64>> {
    if !column_present(raw, field) {
        sink.report(Diagnostic::MissingColumn { column: field });
        return vec![None; raw.len()];
    }
    raw.iter()
        .map(|record| {
            record
                .get(field)
                .and_then(Value::as_f64)
                .map(&convert)
                .filter(|v| v.is_finite())
        })
        .collect()
}

fn date_column(raw: &[RawActivityRecord], sink: &dyn DiagnosticSink) -> Vec<Option<NaiveDate>> {
    if !column_present(raw, START_DATE_LOCAL) {
        sink.report(Diagnostic::MissingColumn {
            column: START_DATE_LOCAL,
        });
        return vec![None; raw.len()];
    }
    raw.iter()
        .map(|record| match record.get(START_DATE_LOCAL) {
            Some(Value::String(s)) => parse_activity_date(s),
            Some(Value::Null) | None => None,
            Some(other) => parse_activity_date(&other.to_string()),
        })
        .collect()
}

fn pace(elapsed_min: Option<f64>, distance_km: Option<f64>) -> Option<f64> {
    let pace = elapsed_min? / distance_km?;
    pace.is_finite().then(|| round2(pace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingSink, NullSink};
    use serde_json::json;

    fn records(value: Value) -> RawActivitySet {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::Object(m) => m,
                    _ => panic!("test records must be objects"),
                })
                .collect(),
            _ => panic!("test input must be an array"),
        }
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let sink = CollectingSink::new();
        let table = tidy(&[], &sink);
        assert!(table.is_empty());
        assert_eq!(sink.events(), vec![Diagnostic::NoData]);
    }

    #[test]
    fn derives_all_columns() {
        let raw = records(json!([
            {"elapsed_time": 120, "distance": 1000, "start_date_local": "2024-05-01T10:00:00Z"}
        ]));
        let sink = CollectingSink::new();
        let table = tidy(&raw, &sink);
        let row = &table.rows()[0];
        assert_eq!(row.elapsed_min, Some(2.0));
        assert_eq!(row.distance_km, Some(1.0));
        assert_eq!(row.speed_mins_per_km, Some(2.0));
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn rounds_to_two_decimals() {
        let raw = records(json!([{"elapsed_time": 1234, "distance": 5123.4}]));
        let table = tidy(&raw, &NullSink);
        let row = &table.rows()[0];
        assert_eq!(row.elapsed_min, Some(20.57));
        assert_eq!(row.distance_km, Some(5.12));
        // computed from the rounded columns: 20.57 / 5.12
        assert_eq!(row.speed_mins_per_km, Some(4.02));
    }

    #[test]
    fn half_hundredths_round_to_even() {
        let raw = records(json!([{"elapsed_time": 75, "distance": 1125.0}]));
        let table = tidy(&raw, &NullSink);
        let row = &table.rows()[0];
        assert_eq!(row.elapsed_min, Some(1.25));
        assert_eq!(row.distance_km, Some(1.12));
        // 1.25 / 1.12
        assert_eq!(row.speed_mins_per_km, Some(1.12));
    }

    #[test]
    fn numeric_start_date_is_read_as_yyyymmdd() {
        let raw = records(json!([{"start_date_local": 20240501}]));
        let table = tidy(&raw, &NullSink);
        assert_eq!(table.rows()[0].date, NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[test]
    fn zero_distance_gives_null_pace() {
        let raw = records(json!([{"elapsed_time": 60, "distance": 0}]));
        let table = tidy(&raw, &NullSink);
        let row = &table.rows()[0];
        assert_eq!(row.elapsed_min, Some(1.0));
        assert_eq!(row.distance_km, Some(0.0));
        assert_eq!(row.speed_mins_per_km, None);
    }

    #[test]
    fn zero_time_and_distance_gives_null_pace() {
        let raw = records(json!([{"elapsed_time": 0, "distance": 0}]));
        let table = tidy(&raw, &NullSink);
        assert_eq!(table.rows()[0].speed_mins_per_km, None);
    }

    #[test]
    fn missing_distance_nulls_distance_and_pace_only() {
        let raw = records(json!([
            {"elapsed_time": 600, "start_date_local": "2024-05-01T10:00:00Z"},
            {"elapsed_time": 900, "start_date_local": "2024-05-02T10:00:00Z"}
        ]));
        let sink = CollectingSink::new();
        let table = tidy(&raw, &sink);
        assert_eq!(table.len(), 2);
        for row in &table {
            assert_eq!(row.distance_km, None);
            assert_eq!(row.speed_mins_per_km, None);
            assert!(row.date.is_some());
        }
        assert_eq!(table.rows()[0].elapsed_min, Some(10.0));
        assert_eq!(table.rows()[1].elapsed_min, Some(15.0));
        assert_eq!(
            sink.events(),
            vec![Diagnostic::MissingColumn { column: "distance" }]
        );
    }

    #[test]
    fn each_missing_source_is_reported() {
        let raw = records(json!([{"name": "Lunch Ride"}]));
        let sink = CollectingSink::new();
        let table = tidy(&raw, &sink);
        let row = &table.rows()[0];
        assert_eq!(
            (row.elapsed_min, row.distance_km, row.speed_mins_per_km, row.date),
            (None, None, None, None)
        );
        assert_eq!(
            sink.events(),
            vec![
                Diagnostic::MissingColumn {
                    column: "elapsed_time"
                },
                Diagnostic::MissingColumn { column: "distance" },
                Diagnostic::MissingColumn {
                    column: "start_date_local"
                },
            ]
        );
    }

    #[test]
    fn partially_present_fields_null_only_their_rows() {
        let raw = records(json!([
            {"elapsed_time": 120, "distance": 1000, "start_date_local": "garbage"},
            {"distance": 2000, "start_date_local": null},
            {"elapsed_time": "slow", "distance": 3000, "start_date_local": "2024-06-01T06:00:00Z"}
        ]));
        let sink = CollectingSink::new();
        let table = tidy(&raw, &sink);
        let rows = table.rows();
        assert_eq!(rows[0].date, None);
        assert_eq!(rows[0].speed_mins_per_km, Some(2.0));
        assert_eq!(rows[1].elapsed_min, None);
        assert_eq!(rows[1].distance_km, Some(2.0));
        assert_eq!(rows[1].date, None);
        assert_eq!(rows[2].elapsed_min, None);
        assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn preserves_row_order_and_raw_fields() {
        let raw = records(json!([
            {"id": 3, "distance": 1000},
            {"id": 1, "distance": 2000},
            {"id": 3, "distance": 1000}
        ]));
        let table = tidy(&raw, &NullSink);
        let ids: Vec<u64> = table.iter().map(|r| r.raw["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![3, 1, 3]);
        assert_eq!(table.raw_records(), raw);
    }

    #[test]
    fn retidying_is_idempotent() {
        let raw = records(json!([
            {"elapsed_time": 3725, "distance": 10234.5, "start_date_local": "2024-05-01T10:00:00Z"},
            {"elapsed_time": 60, "distance": 0}
        ]));
        let first = tidy(&raw, &NullSink);
        let second = tidy(&first.raw_records(), &NullSink);
        assert_eq!(first, second);
    }

    #[test]
    fn to_record_flattens_derived_columns() {
        let raw = records(json!([
            {"id": 7, "elapsed_time": 120, "distance": 0, "start_date_local": "2024-05-01T10:00:00Z"}
        ]));
        let table = tidy(&raw, &NullSink);
        let out = serde_json::to_value(&table).expect("serialize");
        assert_eq!(out[0]["id"], json!(7));
        assert_eq!(out[0]["elapsed_min"], json!(2.0));
        assert_eq!(out[0]["distance_km"], json!(0.0));
        assert_eq!(out[0]["speed_mins_per_km"], Value::Null);
        assert_eq!(out[0]["date"], json!("2024-05-01"));
    }

    #[test]
    fn to_record_spreads_nested_objects_into_dotted_columns() {
        let raw = records(json!([{
            "id": 1,
            "athlete": {"id": 9, "resource_state": 1},
            "map": {"summary_polyline": "abc", "meta": {"detail": 2}, "empty": {}},
            "laps": [{"lap": 1}],
            "distance": 1000
        }]));
        let table = tidy(&raw, &NullSink);
        let record = &table.to_records()[0];
        assert_eq!(record["athlete.id"], json!(9));
        assert_eq!(record["athlete.resource_state"], json!(1));
        assert_eq!(record["map.summary_polyline"], json!("abc"));
        assert_eq!(record["map.meta.detail"], json!(2));
        assert_eq!(record["laps"], json!([{"lap": 1}]));
        assert!(!record.contains_key("athlete"));
        assert!(!record.contains_key("map"));
        assert!(!record.contains_key("map.empty"));
        assert_eq!(record["distance_km"], json!(1.0));
        // raw rows keep their nesting
        assert_eq!(table.rows()[0].raw["athlete"], json!({"id": 9, "resource_state": 1}));
    }

    #[test]
    fn presence_checks_use_top_level_keys() {
        let raw = records(json!([{"stats": {"distance": 1000}}]));
        let sink = CollectingSink::new();
        let table = tidy(&raw, &sink);
        assert_eq!(table.rows()[0].distance_km, None);
        assert!(
            sink.events()
                .contains(&Diagnostic::MissingColumn { column: "distance" })
        );
    }

    #[test]
    fn head_caps_rows() {
        let raw = records(json!([{"id": 1}, {"id": 2}, {"id": 3}]));
        let mut table = tidy(&raw, &NullSink);
        assert_eq!(table.head(2).len(), 2);
        assert_eq!(table.head(10).len(), 3);
        table.truncate(1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn tidy_json_rejects_error_objects() {
        let sink = CollectingSink::new();
        let payload = json!({"message": "Authorization Error", "errors": []});
        let table = tidy_json(&payload, &sink);
        assert!(table.is_empty());
        assert_eq!(
            sink.events(),
            vec![Diagnostic::MalformedInput {
                detail: "expected an array, got an object".into()
            }]
        );
    }

    #[test]
    fn tidy_json_rejects_non_object_elements() {
        let sink = CollectingSink::new();
        let table = tidy_json(&json!([{"id": 1}, "two"]), &sink);
        assert!(table.is_empty());
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn tidy_json_accepts_record_arrays() {
        let table = tidy_json(
            &json!([{"elapsed_time": 120, "distance": 1000}]),
            &NullSink,
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].speed_mins_per_km, Some(2.0));
    }
}
