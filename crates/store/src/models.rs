//! Row types for the persisted schema.

use chrono::{DateTime, Utc};
use serde_json::Value;

use mb_domain::brief::{BriefStatus, DayFilter, EntryStatus, ScheduleData};

#[derive(Debug, Clone)]
pub struct BriefRow {
    pub id: i64,
    pub venue_name: String,
    pub venue_type: String,
    pub location: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub product: String,
    pub liked_playlist_ids: Vec<String>,
    pub conversation_summary: String,
    /// Full JSON snapshot of the submission (brief + designer brief).
    pub raw_data: Value,
    pub schedule_data: Option<ScheduleData>,
    pub status: BriefStatus,
    pub syb_account_id: Option<String>,
    pub syb_schedule_id: Option<String>,
    pub automation_tier: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert form of a brief; id/status/created_at are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewBrief {
    pub venue_name: String,
    pub venue_type: String,
    pub location: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub product: String,
    pub liked_playlist_ids: Vec<String>,
    pub conversation_summary: String,
    pub raw_data: Value,
    pub schedule_data: Option<ScheduleData>,
    pub syb_account_id: Option<String>,
    pub automation_tier: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VenueRow {
    pub id: i64,
    pub venue_name: String,
    pub location: String,
    pub venue_type: String,
    pub syb_account_id: Option<String>,
    pub latest_brief_id: Option<i64>,
    /// Gates scheduling without human approval.
    pub auto_schedule: bool,
    pub approved_brief_count: i64,
    /// IANA zone; all of this venue's wall-clock fields read in it.
    pub timezone: String,
}

#[derive(Debug, Clone)]
pub struct ZoneMappingRow {
    pub id: i64,
    pub venue_name: String,
    pub brief_zone_name: String,
    pub syb_zone_id: String,
    pub syb_zone_name: String,
    pub syb_account_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScheduleEntryRow {
    pub id: i64,
    pub brief_id: i64,
    pub zone_id: String,
    pub zone_name: String,
    pub playlist_syb_id: String,
    pub playlist_name: String,
    /// `HH:MM`, local wall clock in `timezone`.
    pub start_time: String,
    pub end_time: String,
    pub days: DayFilter,
    pub timezone: String,
    pub status: EntryStatus,
    pub last_assigned_at: Option<DateTime<Utc>>,
    pub retry_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewScheduleEntry {
    pub zone_id: String,
    pub zone_name: String,
    pub playlist_syb_id: String,
    pub playlist_name: String,
    pub start_time: String,
    pub end_time: String,
    pub days: DayFilter,
    pub timezone: String,
}

#[derive(Debug, Clone)]
pub struct ApprovalTokenRow {
    pub id: i64,
    pub brief_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpKind {
    SevenDay,
    ThirtyDay,
}

impl FollowUpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SevenDay => "7day",
            Self::ThirtyDay => "30day",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "7day" => Some(Self::SevenDay),
            "30day" => Some(Self::ThirtyDay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DueFollowUp {
    pub id: i64,
    pub brief_id: i64,
    pub kind: FollowUpKind,
    pub tracking_id: String,
    pub contact_email: String,
    pub venue_name: String,
}
