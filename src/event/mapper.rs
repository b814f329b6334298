//! Bidirectional mapping between JSON and domain entities.
//!
//! The same mapper serves the wire format and the cache format, so the two
//! can never drift apart.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::types::{Event, Player};
use crate::error::MapError;

/// Pure, stateless conversion between JSON and an entity type.
pub trait EntityMapper: Send + Sync {
  type Entity: Send;

  /// Build an entity from JSON. Must accept anything `to_json` produces.
  fn to_entity(&self, json: &Value) -> Result<Self::Entity, MapError>;

  fn to_json(&self, entity: &Self::Entity) -> Value;
}

/// Maps [`Event`] to and from its camelCase JSON form.
///
/// ```json
/// {
///   "id": "g1",
///   "title": "Thursday five-a-side",
///   "location": "Pitch 3",
///   "startsAt": "2024-05-02T19:00:00Z",
///   "players": [
///     { "id": "p1", "name": "Ana", "role": "keeper", "confirmed": true,
///       "confirmedAt": "2024-05-01T08:12:45Z" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct EventMapper;

impl EntityMapper for EventMapper {
  type Entity = Event;

  fn to_entity(&self, json: &Value) -> Result<Event, MapError> {
    let obj = as_object(json, "event")?;

    let players: Vec<Player> = match obj.get("players") {
      None | Some(Value::Null) => Vec::new(),
      Some(Value::Array(items)) => items.iter().map(player_from_json).collect::<Result<_, _>>()?,
      Some(_) => {
        return Err(MapError::WrongType {
          field: "players",
          expected: "an array",
        })
      }
    };

    Ok(Event {
      id: required_str(obj, "id")?,
      title: required_str(obj, "title")?,
      description: optional_str(obj, "description")?,
      location: optional_str(obj, "location")?,
      starts_at: parse_timestamp("startsAt", &required_str(obj, "startsAt")?)?,
      players,
    })
  }

  fn to_json(&self, event: &Event) -> Value {
    let mut obj = Map::new();
    obj.insert("id".into(), Value::String(event.id.clone()));
    obj.insert("title".into(), Value::String(event.title.clone()));
    insert_opt(&mut obj, "description", event.description.as_deref());
    insert_opt(&mut obj, "location", event.location.as_deref());
    obj.insert(
      "startsAt".into(),
      Value::String(format_timestamp(&event.starts_at)),
    );
    obj.insert(
      "players".into(),
      Value::Array(event.players.iter().map(player_to_json).collect()),
    );
    Value::Object(obj)
  }
}

fn player_from_json(json: &Value) -> Result<Player, MapError> {
  let obj = as_object(json, "players")?;

  let confirmed = match obj.get("confirmed") {
    None | Some(Value::Null) => false,
    Some(Value::Bool(b)) => *b,
    Some(_) => {
      return Err(MapError::WrongType {
        field: "confirmed",
        expected: "a boolean",
      })
    }
  };

  let confirmed_at = optional_str(obj, "confirmedAt")?
    .map(|s| parse_timestamp("confirmedAt", &s))
    .transpose()?;

  Ok(Player {
    id: required_str(obj, "id")?,
    name: required_str(obj, "name")?,
    role: optional_str(obj, "role")?,
    confirmed,
    confirmed_at,
  })
}

fn player_to_json(player: &Player) -> Value {
  let mut obj = Map::new();
  obj.insert("id".into(), Value::String(player.id.clone()));
  obj.insert("name".into(), Value::String(player.name.clone()));
  insert_opt(&mut obj, "role", player.role.as_deref());
  obj.insert("confirmed".into(), Value::Bool(player.confirmed));
  if let Some(at) = &player.confirmed_at {
    obj.insert("confirmedAt".into(), Value::String(format_timestamp(at)));
  }
  Value::Object(obj)
}

// ============================================================================
// JSON access helpers
// ============================================================================

fn as_object<'a>(json: &'a Value, field: &'static str) -> Result<&'a Map<String, Value>, MapError> {
  match json {
    Value::Object(obj) => Ok(obj),
    Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Array(_) => {
      Err(MapError::WrongType {
        field,
        expected: "an object",
      })
    }
  }
}

fn required_str(obj: &Map<String, Value>, field: &'static str) -> Result<String, MapError> {
  optional_str(obj, field)?.ok_or(MapError::MissingField(field))
}

fn optional_str(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>, MapError> {
  match obj.get(field) {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(Some(s.clone())),
    Some(_) => Err(MapError::WrongType {
      field,
      expected: "a string",
    }),
  }
}

fn insert_opt(obj: &mut Map<String, Value>, field: &str, value: Option<&str>) {
  if let Some(v) = value {
    obj.insert(field.to_string(), Value::String(v.to_string()));
  }
}

/// Canonical timestamp text: RFC 3339 in UTC with a `Z` suffix.
fn format_timestamp(at: &DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, MapError> {
  DateTime::parse_from_rfc3339(value)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|_| MapError::Timestamp {
      field,
      value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use serde_json::json;

  fn sample_event() -> Event {
    Event {
      id: "g1".into(),
      title: "Thursday five-a-side".into(),
      description: None,
      location: Some("Pitch 3".into()),
      starts_at: Utc.with_ymd_and_hms(2024, 5, 2, 19, 0, 0).unwrap(),
      players: vec![
        Player {
          id: "p1".into(),
          name: "Ana".into(),
          role: Some("keeper".into()),
          confirmed: true,
          confirmed_at: Some(
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 12, 45).unwrap()
              + chrono::Duration::milliseconds(250),
          ),
        },
        Player {
          id: "p2".into(),
          name: "Bo".into(),
          role: None,
          confirmed: false,
          confirmed_at: None,
        },
      ],
    }
  }

  #[test]
  fn round_trips_through_json() {
    let mapper = EventMapper;
    let event = sample_event();
    let back = mapper.to_entity(&mapper.to_json(&event)).unwrap();
    assert_eq!(back, event);
  }

  #[test]
  fn round_trips_an_event_without_players() {
    let mapper = EventMapper;
    let event = Event {
      players: Vec::new(),
      description: Some("bring bibs".into()),
      ..sample_event()
    };
    assert_eq!(mapper.to_entity(&mapper.to_json(&event)).unwrap(), event);
  }

  #[test]
  fn writes_canonical_wire_form() {
    let json = EventMapper.to_json(&sample_event());
    assert_eq!(json["startsAt"], "2024-05-02T19:00:00Z");
    assert_eq!(json["players"][0]["confirmedAt"], "2024-05-01T08:12:45.250Z");
    assert!(json.get("description").is_none());
    assert!(json["players"][1].get("role").is_none());
  }

  #[test]
  fn reads_server_payload_with_nulls() {
    let json = json!({
      "id": "g9",
      "title": "Sunday",
      "description": null,
      "startsAt": "2024-06-09T10:00:00+02:00",
      "players": [{ "id": "p1", "name": "Ana", "role": null, "confirmedAt": null }]
    });
    let event = EventMapper.to_entity(&json).unwrap();
    assert_eq!(event.description, None);
    assert_eq!(
      event.starts_at,
      Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap()
    );
    assert!(!event.players[0].confirmed);
    assert_eq!(event.confirmed_players().count(), 0);
  }

  #[test]
  fn bad_timestamp_is_an_error_not_a_default() {
    let json = json!({ "id": "g1", "title": "x", "startsAt": "02/05/2024 19:00" });
    assert_eq!(
      EventMapper.to_entity(&json),
      Err(MapError::Timestamp {
        field: "startsAt",
        value: "02/05/2024 19:00".into()
      })
    );
  }

  #[test]
  fn rejects_wrong_shapes() {
    assert_eq!(
      EventMapper.to_entity(&json!([])),
      Err(MapError::WrongType {
        field: "event",
        expected: "an object"
      })
    );
    assert_eq!(
      EventMapper.to_entity(&json!({ "title": "x", "startsAt": "2024-05-02T19:00:00Z" })),
      Err(MapError::MissingField("id"))
    );
    assert_eq!(
      EventMapper.to_entity(&json!({ "id": 7, "title": "x" })),
      Err(MapError::WrongType {
        field: "id",
        expected: "a string"
      })
    );
    assert!(EventMapper
      .to_entity(&json!({ "id": "g1", "title": "x", "startsAt": "2024-05-02T19:00:00Z", "players": {} }))
      .is_err());
  }
}
