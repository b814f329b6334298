use chrono::{DateTime, Utc};

/// A scheduled event and the players signed up for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
  pub id: String,
  pub title: String,
  pub description: Option<String>,
  pub location: Option<String>,
  pub starts_at: DateTime<Utc>,
  /// Sign-up order is preserved
  pub players: Vec<Player>,
}

/// A player's attendance for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
  pub id: String,
  pub name: String,
  pub role: Option<String>, // e.g. "goalkeeper"
  pub confirmed: bool,
  pub confirmed_at: Option<DateTime<Utc>>,
}

impl Event {
  /// Players that confirmed attendance.
  pub fn confirmed_players(&self) -> impl Iterator<Item = &Player> {
    self.players.iter().filter(|p| p.confirmed)
  }
}
