//! Offices and shifts, plus what the table and form views need to know about them.

use crate::api::types::number_or_string;
use crate::api::RecordId;
use chrono::NaiveTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A table column header
#[derive(Debug, Clone, Copy)]
pub struct Column {
  pub title: &'static str,
  pub width: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  Number,
  /// `HH:MM` or `HH:MM:SS`, stored as `HH:MM:SS`
  Time,
}

/// One input of the add/edit form
#[derive(Debug, Clone, Copy)]
pub struct FormField {
  pub label: &'static str,
  pub kind: FieldKind,
}

/// A record type managed through a backend collection.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Collection name, also the endpoint path (`/offices`)
  const RESOURCE: &'static str;
  /// Singular display name ("Office")
  const LABEL: &'static str;

  fn id(&self) -> Option<&RecordId>;

  fn columns() -> &'static [Column];

  /// Cell text, one per column
  fn cells(&self) -> Vec<String>;

  fn form_fields() -> &'static [FormField];

  /// Current values in `form_fields` order
  fn form_values(&self) -> Vec<String>;

  /// Build a record from already validated values in `form_fields` order.
  fn from_values(id: Option<RecordId>, values: Vec<String>) -> Self;

  /// Validate raw form input and build the record to send.
  ///
  /// Adding (no `existing`) requires every field. Editing keeps the existing
  /// value for any field left blank. The id is never taken from the form.
  fn from_form(values: &[String], existing: Option<&Self>) -> Result<Self, String> {
    let previous = existing.map(Record::form_values);
    let resolved = resolve_fields(Self::form_fields(), values, previous.as_deref())?;
    Ok(Self::from_values(None, resolved))
  }
}

fn resolve_fields(
  fields: &[FormField],
  values: &[String],
  previous: Option<&[String]>,
) -> Result<Vec<String>, String> {
  fields
    .iter()
    .enumerate()
    .map(|(i, field)| {
      let raw = values.get(i).map(|v| v.trim()).unwrap_or_default();
      let raw = if raw.is_empty() {
        match previous.and_then(|p| p.get(i)) {
          Some(kept) => kept.as_str(),
          None => {
            return Err(format!(
              "Please input the {}!",
              field.label.to_lowercase()
            ))
          }
        }
      } else {
        raw
      };
      normalize(field, raw)
    })
    .collect()
}

fn normalize(field: &FormField, raw: &str) -> Result<String, String> {
  match field.kind {
    FieldKind::Text => Ok(raw.to_string()),
    FieldKind::Number => raw
      .parse::<f64>()
      .ok()
      .filter(|n| n.is_finite())
      .map(|n| n.to_string())
      .ok_or_else(|| format!("{} must be a number", field.label)),
    FieldKind::Time => parse_time(raw)
      .map(|t| t.format("%H:%M:%S").to_string())
      .ok_or_else(|| format!("{} must be a time like 08:00:00", field.label)),
  }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
  NaiveTime::parse_from_str(raw, "%H:%M:%S")
    .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
    .ok()
}

/// Values coming from `resolve_fields` are already checked.
fn number(value: &str) -> f64 {
  value.parse().unwrap_or_default()
}

// ============================================================================
// Office
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<RecordId>,
  pub name: String,
  #[serde(deserialize_with = "number_or_string")]
  pub latitude: f64,
  #[serde(deserialize_with = "number_or_string")]
  pub longitude: f64,
  /// Metres
  #[serde(deserialize_with = "number_or_string")]
  pub radius: f64,
}

const OFFICE_COLUMNS: &[Column] = &[
  Column {
    title: "Name",
    width: 30,
  },
  Column {
    title: "Latitude",
    width: 14,
  },
  Column {
    title: "Longitude",
    width: 14,
  },
  Column {
    title: "Radius",
    width: 10,
  },
];

const OFFICE_FIELDS: &[FormField] = &[
  FormField {
    label: "Name",
    kind: FieldKind::Text,
  },
  FormField {
    label: "Latitude",
    kind: FieldKind::Number,
  },
  FormField {
    label: "Longitude",
    kind: FieldKind::Number,
  },
  FormField {
    label: "Radius",
    kind: FieldKind::Number,
  },
];

impl Record for Office {
  const RESOURCE: &'static str = "offices";
  const LABEL: &'static str = "Office";

  fn id(&self) -> Option<&RecordId> {
    self.id.as_ref()
  }

  fn columns() -> &'static [Column] {
    OFFICE_COLUMNS
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.name.clone(),
      self.latitude.to_string(),
      self.longitude.to_string(),
      self.radius.to_string(),
    ]
  }

  fn form_fields() -> &'static [FormField] {
    OFFICE_FIELDS
  }

  fn form_values(&self) -> Vec<String> {
    self.cells()
  }

  fn from_values(id: Option<RecordId>, values: Vec<String>) -> Self {
    let mut values = values.into_iter();
    let mut next = || values.next().unwrap_or_default();
    Office {
      id,
      name: next(),
      latitude: number(&next()),
      longitude: number(&next()),
      radius: number(&next()),
    }
  }
}

// ============================================================================
// Shift
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<RecordId>,
  pub name: String,
  /// `HH:MM:SS`
  pub start_time: String,
  /// `HH:MM:SS`
  pub end_time: String,
}

const SHIFT_COLUMNS: &[Column] = &[
  Column {
    title: "Name",
    width: 30,
  },
  Column {
    title: "Start Time",
    width: 12,
  },
  Column {
    title: "End Time",
    width: 12,
  },
];

const SHIFT_FIELDS: &[FormField] = &[
  FormField {
    label: "Name",
    kind: FieldKind::Text,
  },
  FormField {
    label: "Start Time",
    kind: FieldKind::Time,
  },
  FormField {
    label: "End Time",
    kind: FieldKind::Time,
  },
];

impl Record for Shift {
  const RESOURCE: &'static str = "shifts";
  const LABEL: &'static str = "Shift";

  fn id(&self) -> Option<&RecordId> {
    self.id.as_ref()
  }

  fn columns() -> &'static [Column] {
    SHIFT_COLUMNS
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.name.clone(),
      self.start_time.clone(),
      self.end_time.clone(),
    ]
  }

  fn form_fields() -> &'static [FormField] {
    SHIFT_FIELDS
  }

  fn form_values(&self) -> Vec<String> {
    self.cells()
  }

  fn from_values(id: Option<RecordId>, values: Vec<String>) -> Self {
    let mut values = values.into_iter();
    let mut next = || values.next().unwrap_or_default();
    Shift {
      id,
      name: next(),
      start_time: next(),
      end_time: next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
  }

  #[test]
  fn test_office_accepts_string_decimals() {
    let office: Office = serde_json::from_value(json!({
      "id": 7, "name": "Branch", "latitude": "-6.2", "longitude": "106.8", "radius": 100
    }))
    .unwrap();
    assert_eq!(office.id, Some(RecordId::from("7")));
    assert_eq!(office.latitude, -6.2);
    assert_eq!(office.longitude, 106.8);
    assert_eq!(office.radius, 100.0);
    assert_eq!(office.cells(), strings(&["Branch", "-6.2", "106.8", "100"]));
  }

  #[test]
  fn test_add_requires_every_field() {
    let err = Office::from_form(&strings(&["HQ", "1.0", "", "50"]), None).unwrap_err();
    assert_eq!(err, "Please input the longitude!");
  }

  #[test]
  fn test_add_builds_record_without_id() {
    let office = Office::from_form(&strings(&["HQ", "1.0", "2.0", "50"]), None).unwrap();
    assert_eq!(
      office,
      Office {
        id: None,
        name: "HQ".to_string(),
        latitude: 1.0,
        longitude: 2.0,
        radius: 50.0,
      }
    );
  }

  #[test]
  fn test_numbers_are_validated() {
    let err = Office::from_form(&strings(&["HQ", "north", "2", "50"]), None).unwrap_err();
    assert_eq!(err, "Latitude must be a number");
  }

  #[test]
  fn test_edit_keeps_blank_fields() {
    let existing = Office {
      id: Some(RecordId::from("1")),
      name: "HQ".to_string(),
      latitude: 1.0,
      longitude: 2.0,
      radius: 50.0,
    };
    let edited = Office::from_form(&strings(&["", "", "", "75"]), Some(&existing)).unwrap();
    assert_eq!(edited.id, None);
    assert_eq!(edited.name, "HQ");
    assert_eq!(edited.radius, 75.0);
  }

  #[test]
  fn test_shift_times_are_normalized() {
    let shift = Shift::from_form(&strings(&["Morning", "8:00", "16:30:00"]), None).unwrap();
    assert_eq!(shift.start_time, "08:00:00");
    assert_eq!(shift.end_time, "16:30:00");

    let err = Shift::from_form(&strings(&["Night", "25:00", "06:00"]), None).unwrap_err();
    assert_eq!(err, "Start Time must be a time like 08:00:00");
  }

  #[test]
  fn test_shift_payload_omits_missing_id() {
    let shift = Shift::from_values(None, strings(&["Morning", "08:00:00", "16:00:00"]));
    assert_eq!(
      serde_json::to_value(&shift).unwrap(),
      json!({"name": "Morning", "start_time": "08:00:00", "end_time": "16:00:00"})
    );
  }
}
