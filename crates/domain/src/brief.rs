//! The brief/schedule data model shared by the matcher, the stores, the
//! approval flow, and the executor.
//!
//! Wire-facing types serialize camelCase because they travel inside SSE
//! frames and inside the persisted `schedule_data` JSON column.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Enums
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    Syb,
    Beatbreeze,
}

impl Default for Product {
    fn default() -> Self {
        Self::Syb
    }
}

/// Brief lifecycle. Transitions only move forward:
/// submitted → approved → scheduled → completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BriefStatus {
    Submitted,
    Approved,
    Scheduled,
    Completed,
}

impl BriefStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "scheduled" => Some(Self::Scheduled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether `next` is a legal forward transition from `self`.
    pub fn can_advance_to(&self, next: BriefStatus) -> bool {
        let rank = |s: BriefStatus| match s {
            Self::Submitted => 0,
            Self::Approved => 1,
            Self::Scheduled => 2,
            Self::Completed => 3,
        };
        rank(next) > rank(*self)
    }
}

/// Which days of the week a schedule entry fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayFilter {
    Daily,
    Weekday,
    Weekend,
}

impl DayFilter {
    pub fn admits(&self, day: chrono::Weekday) -> bool {
        use chrono::Weekday::*;
        match self {
            Self::Daily => true,
            Self::Weekday => matches!(day, Mon | Tue | Wed | Thu | Fri),
            Self::Weekend => matches!(day, Sat | Sun),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekday => "weekday",
            Self::Weekend => "weekend",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekday" => Some(Self::Weekday),
            "weekend" => Some(Self::Weekend),
            _ => None,
        }
    }
}

/// Schedule-entry lifecycle. `Error` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Active,
    Paused,
    Completed,
    Error,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaypartIcon {
    Sunrise,
    Sun,
    Sunset,
    Moon,
    Stars,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dayparts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One contiguous block of operating hours with a target energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Daypart {
    /// Stable slug (`opening`, `peak-hours`, ...).
    pub key: String,
    /// Human-readable label with the local time range appended.
    pub label: String,
    /// `HH:MM-HH:MM`, venue-local wall clock.
    pub time_range: String,
    pub icon: DaypartIcon,
    /// 1–10.
    pub energy: u8,
}

/// Single-zone briefs carry a flat daypart list; multi-zone briefs carry a
/// map of zone name → list. The untagged serde form matches the wire shape
/// (`dayparts` is either an array or an object keyed by zone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dayparts {
    Single(Vec<Daypart>),
    Multi(BTreeMap<String, Vec<Daypart>>),
}

impl Dayparts {
    /// The daypart list for a given zone, falling back to the flat list.
    pub fn for_zone(&self, zone: &str) -> Option<&[Daypart]> {
        match self {
            Self::Single(list) => Some(list),
            Self::Multi(map) => map.get(zone).map(|v| v.as_slice()),
        }
    }

    /// Iterate `(zone name, dayparts)` pairs uniformly over both shapes.
    /// Single-zone lists surface under the empty zone name.
    pub fn zones(&self) -> Vec<(&str, &[Daypart])> {
        match self {
            Self::Single(list) => vec![("", list.as_slice())],
            Self::Multi(map) => map.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect(),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Multi(_))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Recommendations & schedule data
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub playlist_id: String,
    pub playlist_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_syb_id: Option<String>,
    /// Key of the daypart this pick belongs to.
    pub daypart: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// `weekday` for the base schedule, `weekend` for the variant pass.
    #[serde(default = "d_schedule_type")]
    pub schedule_type: String,
    pub reason: String,
    /// 55–95.
    pub match_score: u8,
}

fn d_schedule_type() -> String {
    "weekday".into()
}

/// One playlist the client liked, resolved to a concrete slot. These rows
/// are what approval materializes into schedule entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedSlot {
    pub zone: String,
    pub daypart_key: String,
    /// `HH:MM-HH:MM`, venue-local.
    pub time_range: String,
    pub playlist_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_syb_id: Option<String>,
    pub days: DayFilter,
}

/// The persisted `schedule_data` column: everything approval needs to
/// materialize entries without re-running the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleData {
    pub dayparts: Dayparts,
    pub daypart_order: Vec<String>,
    pub zone_names: Vec<String>,
    pub liked: Vec<LikedSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekend_dayparts: Option<Dayparts>,
}

/// The designer brief: a human-curation companion to the matcher output,
/// used for email rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignerBrief {
    pub top_genres: Vec<String>,
    pub bpm_ranges: Vec<String>,
    pub daypart_genres: BTreeMap<String, Vec<String>>,
    pub daypart_order: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wall-clock helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse `HH:MM` into minutes since midnight. `24:00` normalizes to 0.
pub fn parse_hhmm(s: &str) -> Option<u16> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u16 = h.parse().ok()?;
    let m: u16 = m.parse().ok()?;
    if h > 24 || m > 59 {
        return None;
    }
    Some((h % 24) * 60 + m)
}

/// Parse a `HH:MM-HH:MM` range into `(start, end)` minutes since midnight.
pub fn parse_time_range(s: &str) -> Option<(u16, u16)> {
    let (a, b) = s.split_once('-')?;
    Some((parse_hhmm(a)?, parse_hhmm(b)?))
}

/// Minutes from `start` to `end` on a wall clock, wrapping through midnight.
pub fn span_minutes(start: u16, end: u16) -> u16 {
    if end > start {
        end - start
    } else {
        1440 - start + end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_advances() {
        assert!(BriefStatus::Submitted.can_advance_to(BriefStatus::Approved));
        assert!(BriefStatus::Approved.can_advance_to(BriefStatus::Scheduled));
        assert!(!BriefStatus::Scheduled.can_advance_to(BriefStatus::Approved));
        assert!(!BriefStatus::Completed.can_advance_to(BriefStatus::Submitted));
    }

    #[test]
    fn day_filter_admission() {
        use chrono::Weekday::*;
        assert!(DayFilter::Daily.admits(Wed));
        assert!(DayFilter::Weekday.admits(Fri));
        assert!(!DayFilter::Weekday.admits(Sat));
        assert!(DayFilter::Weekend.admits(Sun));
        assert!(!DayFilter::Weekend.admits(Mon));
    }

    #[test]
    fn dayparts_untagged_shapes() {
        let single: Dayparts = serde_json::from_str(
            r#"[{"key":"opening","label":"Opening (08:00–12:00)","timeRange":"08:00-12:00","icon":"sunrise","energy":4}]"#,
        )
        .unwrap();
        assert!(!single.is_multi());
        assert_eq!(single.for_zone("anything").unwrap().len(), 1);

        let multi: Dayparts = serde_json::from_str(
            r#"{"Lobby":[{"key":"opening","label":"Opening (06:00–12:00)","timeRange":"06:00-12:00","icon":"sunrise","energy":2}]}"#,
        )
        .unwrap();
        assert!(multi.is_multi());
        assert!(multi.for_zone("Lobby").is_some());
        assert!(multi.for_zone("Pool").is_none());
    }

    #[test]
    fn schedule_data_round_trips() {
        let data = ScheduleData {
            dayparts: Dayparts::Single(vec![Daypart {
                key: "opening".into(),
                label: "Opening (17:00–20:00)".into(),
                time_range: "17:00-20:00".into(),
                icon: DaypartIcon::Sunset,
                energy: 5,
            }]),
            daypart_order: vec!["opening".into()],
            zone_names: vec!["Main".into()],
            liked: vec![LikedSlot {
                zone: "Main".into(),
                daypart_key: "opening".into(),
                time_range: "17:00-20:00".into(),
                playlist_name: "Golden Hour".into(),
                playlist_syb_id: Some("syb:abc".into()),
                days: DayFilter::Daily,
            }],
            weekend_dayparts: None,
        };
        let json = serde_json::to_string(&data).unwrap();
        let back: ScheduleData = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }

    #[test]
    fn wall_clock_parsing() {
        assert_eq!(parse_hhmm("08:30"), Some(510));
        assert_eq!(parse_hhmm("24:00"), Some(0));
        assert_eq!(parse_hhmm("25:00"), None);
        assert_eq!(parse_time_range("23:00-02:00"), Some((1380, 120)));
        assert_eq!(span_minutes(1380, 120), 180);
        assert_eq!(span_minutes(600, 720), 120);
    }
}
