//! The SQLite-backed store. One connection behind a mutex; every method
//! is a short synchronous call. Database writes are the sole source of
//! cross-process truth — in-memory caches never overrule them.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use mb_domain::brief::{BriefStatus, DayFilter, EntryStatus};

use crate::models::*;
use crate::schema;

/// Entry failures become terminal at this retry count.
pub const MAX_ASSIGN_RETRIES: i64 = 3;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("opening database {}", path.as_ref().display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("setting WAL mode")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("enabling foreign keys")?;
        schema::migrate(&conn)?;
        tracing::info!(path = %path.as_ref().display(), "database ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Briefs
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn insert_brief(&self, brief: &NewBrief) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO briefs (
                venue_name, venue_type, location, contact_name, contact_email,
                contact_phone, product, liked_playlist_ids, conversation_summary,
                raw_data, schedule_data, status, syb_account_id, automation_tier,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 'submitted', ?12, ?13, ?14)",
            params![
                brief.venue_name,
                brief.venue_type,
                brief.location,
                brief.contact_name,
                brief.contact_email,
                brief.contact_phone,
                brief.product,
                serde_json::to_string(&brief.liked_playlist_ids)?,
                brief.conversation_summary,
                serde_json::to_string(&brief.raw_data)?,
                brief
                    .schedule_data
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                brief.syb_account_id,
                brief.automation_tier,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_brief(&self, id: i64) -> Result<Option<BriefRow>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, venue_name, venue_type, location, contact_name,
                    contact_email, contact_phone, product, liked_playlist_ids,
                    conversation_summary, raw_data, schedule_data, status,
                    syb_account_id, syb_schedule_id, automation_tier, created_at
             FROM briefs WHERE id = ?1",
            params![id],
            brief_from_row,
        )
        .optional()
        .context("loading brief")
    }

    /// Advance the brief status. Backward transitions are ignored, which
    /// keeps double-submits harmless.
    pub fn advance_brief_status(&self, id: i64, next: BriefStatus) -> Result<()> {
        let Some(brief) = self.get_brief(id)? else {
            return Ok(());
        };
        if !brief.status.can_advance_to(next) {
            tracing::warn!(
                brief_id = id,
                from = brief.status.as_str(),
                to = next.as_str(),
                "ignoring backward brief status transition"
            );
            return Ok(());
        }
        self.conn.lock().execute(
            "UPDATE briefs SET status = ?1 WHERE id = ?2",
            params![next.as_str(), id],
        )?;
        Ok(())
    }

    pub fn set_remote_schedule(&self, id: i64, schedule_id: &str) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE briefs SET syb_schedule_id = ?1 WHERE id = ?2",
            params![schedule_id, id],
        )?;
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Venues
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Insert or refresh the venue row keyed by name. The timezone is set
    /// only when explicitly provided; existing venues keep theirs.
    pub fn upsert_venue(
        &self,
        venue_name: &str,
        location: &str,
        venue_type: &str,
        syb_account_id: Option<&str>,
        timezone: Option<&str>,
        latest_brief_id: i64,
    ) -> Result<VenueRow> {
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO venues (venue_name, location, venue_type, syb_account_id,
                                     latest_brief_id, timezone, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, COALESCE(?6, 'Asia/Bangkok'), ?7, ?7)
                 ON CONFLICT (venue_name) DO UPDATE SET
                     location        = CASE WHEN excluded.location != '' THEN excluded.location ELSE venues.location END,
                     venue_type      = CASE WHEN excluded.venue_type != '' THEN excluded.venue_type ELSE venues.venue_type END,
                     syb_account_id  = COALESCE(excluded.syb_account_id, venues.syb_account_id),
                     latest_brief_id = excluded.latest_brief_id,
                     timezone        = COALESCE(?6, venues.timezone),
                     updated_at      = excluded.updated_at",
                params![venue_name, location, venue_type, syb_account_id, latest_brief_id, timezone, now],
            )?;
        }
        self.get_venue(venue_name)?
            .context("venue vanished after upsert")
    }

    pub fn get_venue(&self, venue_name: &str) -> Result<Option<VenueRow>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, venue_name, location, venue_type, syb_account_id,
                    latest_brief_id, auto_schedule, approved_brief_count, timezone
             FROM venues WHERE venue_name = ?1",
            params![venue_name],
            venue_from_row,
        )
        .optional()
        .context("loading venue")
    }

    pub fn increment_venue_approved(&self, venue_name: &str) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE venues SET approved_brief_count = approved_brief_count + 1,
                               updated_at = ?2
             WHERE venue_name = ?1",
            params![venue_name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Zone mappings
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn zone_mappings(&self, venue_name: &str) -> Result<Vec<ZoneMappingRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, venue_name, brief_zone_name, syb_zone_id, syb_zone_name, syb_account_id
             FROM zone_mappings WHERE venue_name = ?1 ORDER BY brief_zone_name",
        )?;
        let rows = stmt
            .query_map(params![venue_name], mapping_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Schedule entries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Bulk insert on the auto-schedule path (the approval path inserts
    /// inside `finalize_approval`'s transaction instead).
    pub fn insert_schedule_entries(
        &self,
        brief_id: i64,
        entries: &[NewScheduleEntry],
    ) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        insert_entries_tx(&tx, brief_id, entries)?;
        tx.commit()?;
        Ok(entries.len())
    }

    pub fn active_entries(&self) -> Result<Vec<ScheduleEntryRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, brief_id, zone_id, zone_name, playlist_syb_id, playlist_name,
                    start_time, end_time, days, timezone, status, last_assigned_at,
                    retry_count
             FROM schedule_entries WHERE status = 'active' ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn entries_for_brief(&self, brief_id: i64) -> Result<Vec<ScheduleEntryRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, brief_id, zone_id, zone_name, playlist_syb_id, playlist_name,
                    start_time, end_time, days, timezone, status, last_assigned_at,
                    retry_count
             FROM schedule_entries WHERE brief_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![brief_id], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_active_entries(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let n = conn.query_row(
            "SELECT COUNT(*) FROM schedule_entries WHERE status = 'active'",
            [],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    pub fn mark_entry_assigned(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE schedule_entries SET last_assigned_at = ?1, retry_count = 0 WHERE id = ?2",
            params![at.to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Record an assignment failure; returns the new retry count. The
    /// entry turns terminal (`error`) at [`MAX_ASSIGN_RETRIES`].
    pub fn record_entry_failure(&self, id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE schedule_entries SET retry_count = retry_count + 1 WHERE id = ?1",
            params![id],
        )?;
        let retries: i64 = conn.query_row(
            "SELECT retry_count FROM schedule_entries WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        if retries >= MAX_ASSIGN_RETRIES {
            conn.execute(
                "UPDATE schedule_entries SET status = 'error' WHERE id = ?1",
                params![id],
            )?;
        }
        Ok(retries)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Approval tokens
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn create_approval_token(
        &self,
        brief_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO approval_tokens (brief_id, token, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![brief_id, token, expires_at.to_rfc3339(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_token(&self, token: &str) -> Result<Option<ApprovalTokenRow>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, brief_id, token, expires_at, used_at
             FROM approval_tokens WHERE token = ?1",
            params![token],
            |row| {
                Ok(ApprovalTokenRow {
                    id: row.get(0)?,
                    brief_id: row.get(1)?,
                    token: row.get(2)?,
                    expires_at: parse_utc(row.get::<_, String>(3)?),
                    used_at: row.get::<_, Option<String>>(4)?.map(parse_utc),
                })
            },
        )
        .optional()
        .context("loading approval token")
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Follow-ups
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn create_follow_up(
        &self,
        brief_id: i64,
        kind: FollowUpKind,
        scheduled_for: DateTime<Utc>,
        tracking_id: &str,
    ) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO follow_ups (brief_id, type, scheduled_for, tracking_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![brief_id, kind.as_str(), scheduled_for.to_rfc3339(), tracking_id],
        )?;
        Ok(())
    }

    pub fn due_follow_ups(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<DueFollowUp>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT f.id, f.brief_id, f.type, f.tracking_id, b.contact_email, b.venue_name
             FROM follow_ups f JOIN briefs b ON b.id = f.brief_id
             WHERE f.sent_at IS NULL AND f.scheduled_for <= ?1
             ORDER BY f.scheduled_for LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![now.to_rfc3339(), limit as i64], |row| {
                Ok(DueFollowUp {
                    id: row.get(0)?,
                    brief_id: row.get(1)?,
                    kind: FollowUpKind::parse(&row.get::<_, String>(2)?)
                        .unwrap_or(FollowUpKind::SevenDay),
                    tracking_id: row.get(3)?,
                    contact_email: row.get(4)?,
                    venue_name: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// `sent_at` is written exactly once, whatever the send outcome.
    pub fn mark_follow_up_sent(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE follow_ups SET sent_at = ?1 WHERE id = ?2 AND sent_at IS NULL",
            params![at.to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn mark_follow_up_opened(&self, tracking_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE follow_ups SET opened_at = ?1
             WHERE tracking_id = ?2 AND opened_at IS NULL",
            params![at.to_rfc3339(), tracking_id],
        )?;
        Ok(())
    }

    pub fn follow_up_by_tracking_id(&self, tracking_id: &str) -> Result<Option<(i64, Option<DateTime<Utc>>)>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, opened_at FROM follow_ups WHERE tracking_id = ?1",
            params![tracking_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?.map(parse_utc),
                ))
            },
        )
        .optional()
        .context("loading follow-up")
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Approval finalization (single transaction)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Consume the token and commit every approval write atomically:
    /// zone mappings, schedule entries (or the remote-schedule bind),
    /// brief status, and the venue's approved counter. Returns `false`
    /// without touching anything when the token was already used — the
    /// `used_at` check-and-set is the serialization point for
    /// double-submits.
    pub fn finalize_approval(&self, f: &ApprovalFinalization<'_>) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let consumed = tx.execute(
            "UPDATE approval_tokens SET used_at = ?1 WHERE id = ?2 AND used_at IS NULL",
            params![Utc::now().to_rfc3339(), f.token_id],
        )?;
        if consumed == 0 {
            // Already redeemed; the open transaction drops without effect.
            return Ok(false);
        }

        for (brief_zone, syb_zone_id, syb_zone_name) in f.mappings {
            tx.execute(
                "INSERT INTO zone_mappings
                     (venue_name, brief_zone_name, syb_zone_id, syb_zone_name, syb_account_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (venue_name, brief_zone_name) DO UPDATE SET
                     syb_zone_id = excluded.syb_zone_id,
                     syb_zone_name = excluded.syb_zone_name,
                     syb_account_id = COALESCE(excluded.syb_account_id, zone_mappings.syb_account_id)",
                params![f.venue_name, brief_zone, syb_zone_id, syb_zone_name, f.syb_account_id],
            )?;
        }

        match f.remote_schedule_id {
            Some(schedule_id) => {
                tx.execute(
                    "UPDATE briefs SET syb_schedule_id = ?1, status = 'scheduled' WHERE id = ?2",
                    params![schedule_id, f.brief_id],
                )?;
            }
            None => {
                insert_entries_tx(&tx, f.brief_id, f.entries)?;
                tx.execute(
                    "UPDATE briefs SET status = 'approved' WHERE id = ?1",
                    params![f.brief_id],
                )?;
            }
        }

        tx.execute(
            "UPDATE venues SET approved_brief_count = approved_brief_count + 1,
                               updated_at = ?2
             WHERE venue_name = ?1",
            params![f.venue_name, Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;
        Ok(true)
    }
}

pub struct ApprovalFinalization<'a> {
    pub token_id: i64,
    pub brief_id: i64,
    pub venue_name: &'a str,
    /// `(brief_zone_name, syb_zone_id, syb_zone_name)`
    pub mappings: &'a [(String, String, String)],
    pub syb_account_id: Option<&'a str>,
    pub entries: &'a [NewScheduleEntry],
    pub remote_schedule_id: Option<&'a str>,
}

fn insert_entries_tx(
    tx: &rusqlite::Transaction<'_>,
    brief_id: i64,
    entries: &[NewScheduleEntry],
) -> Result<()> {
    for e in entries {
        tx.execute(
            "INSERT INTO schedule_entries
                 (brief_id, zone_id, zone_name, playlist_syb_id, playlist_name,
                  start_time, end_time, days, timezone, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'active')",
            params![
                brief_id,
                e.zone_id,
                e.zone_name,
                e.playlist_syb_id,
                e.playlist_name,
                e.start_time,
                e.end_time,
                e.days.as_str(),
                e.timezone,
            ],
        )?;
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Row mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_utc(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn brief_from_row(row: &Row<'_>) -> rusqlite::Result<BriefRow> {
    let liked: String = row.get(8)?;
    let raw: String = row.get(10)?;
    let schedule: Option<String> = row.get(11)?;
    let status: String = row.get(12)?;
    Ok(BriefRow {
        id: row.get(0)?,
        venue_name: row.get(1)?,
        venue_type: row.get(2)?,
        location: row.get(3)?,
        contact_name: row.get(4)?,
        contact_email: row.get(5)?,
        contact_phone: row.get(6)?,
        product: row.get(7)?,
        liked_playlist_ids: serde_json::from_str(&liked).unwrap_or_default(),
        conversation_summary: row.get(9)?,
        raw_data: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
        schedule_data: schedule.and_then(|s| serde_json::from_str(&s).ok()),
        status: BriefStatus::parse(&status).unwrap_or(BriefStatus::Submitted),
        syb_account_id: row.get(13)?,
        syb_schedule_id: row.get(14)?,
        automation_tier: row.get(15)?,
        created_at: parse_utc(row.get::<_, String>(16)?),
    })
}

fn venue_from_row(row: &Row<'_>) -> rusqlite::Result<VenueRow> {
    Ok(VenueRow {
        id: row.get(0)?,
        venue_name: row.get(1)?,
        location: row.get(2)?,
        venue_type: row.get(3)?,
        syb_account_id: row.get(4)?,
        latest_brief_id: row.get(5)?,
        auto_schedule: row.get::<_, i64>(6)? != 0,
        approved_brief_count: row.get(7)?,
        timezone: row.get(8)?,
    })
}

fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<ZoneMappingRow> {
    Ok(ZoneMappingRow {
        id: row.get(0)?,
        venue_name: row.get(1)?,
        brief_zone_name: row.get(2)?,
        syb_zone_id: row.get(3)?,
        syb_zone_name: row.get(4)?,
        syb_account_id: row.get(5)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleEntryRow> {
    let days: String = row.get(8)?;
    let status: String = row.get(10)?;
    Ok(ScheduleEntryRow {
        id: row.get(0)?,
        brief_id: row.get(1)?,
        zone_id: row.get(2)?,
        zone_name: row.get(3)?,
        playlist_syb_id: row.get(4)?,
        playlist_name: row.get(5)?,
        start_time: row.get(6)?,
        end_time: row.get(7)?,
        days: DayFilter::parse(&days).unwrap_or(DayFilter::Daily),
        timezone: row.get(9)?,
        status: EntryStatus::parse(&status).unwrap_or(EntryStatus::Active),
        last_assigned_at: row.get::<_, Option<String>>(11)?.map(parse_utc),
        retry_count: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mb_domain::brief::{Daypart, DaypartIcon, Dayparts, LikedSlot, ScheduleData};

    fn sample_brief(venue: &str) -> NewBrief {
        NewBrief {
            venue_name: venue.into(),
            venue_type: "bar-lounge".into(),
            location: "Bangkok".into(),
            contact_name: "Nok".into(),
            contact_email: "nok@example.com".into(),
            contact_phone: "+66 2 000 0000".into(),
            product: "syb".into(),
            liked_playlist_ids: vec!["deep-sunset".into()],
            conversation_summary: "Rooftop bar, sophisticated crowd".into(),
            raw_data: serde_json::json!({"energy": 7}),
            schedule_data: Some(sample_schedule_data()),
            syb_account_id: None,
            automation_tier: None,
        }
    }

    fn sample_schedule_data() -> ScheduleData {
        ScheduleData {
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
                playlist_name: "Deep Sunset".into(),
                playlist_syb_id: Some("syb:ds".into()),
                days: DayFilter::Daily,
            }],
            weekend_dayparts: None,
        }
    }

    fn entry(zone: &str, start: &str, days: DayFilter) -> NewScheduleEntry {
        NewScheduleEntry {
            zone_id: zone.into(),
            zone_name: format!("{zone} floor"),
            playlist_syb_id: "syb:ds".into(),
            playlist_name: "Deep Sunset".into(),
            start_time: start.into(),
            end_time: "20:00".into(),
            days,
            timezone: "Asia/Bangkok".into(),
        }
    }

    #[test]
    fn brief_round_trips_with_schedule_data() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_brief(&sample_brief("Sky Bar")).unwrap();
        let brief = db.get_brief(id).unwrap().unwrap();

        assert_eq!(brief.venue_name, "Sky Bar");
        assert_eq!(brief.status, BriefStatus::Submitted);
        let data = brief.schedule_data.unwrap();
        assert_eq!(data.liked.len(), 1);
        assert_eq!(data.liked[0].playlist_syb_id.as_deref(), Some("syb:ds"));
        // Serializing again yields the identical structure.
        assert_eq!(
            serde_json::to_string(&data).unwrap(),
            serde_json::to_string(&sample_schedule_data()).unwrap()
        );
    }

    #[test]
    fn brief_status_never_moves_backward() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_brief(&sample_brief("Sky Bar")).unwrap();
        db.advance_brief_status(id, BriefStatus::Approved).unwrap();
        db.advance_brief_status(id, BriefStatus::Submitted).unwrap();
        assert_eq!(
            db.get_brief(id).unwrap().unwrap().status,
            BriefStatus::Approved
        );
    }

    #[test]
    fn venue_upsert_updates_in_place() {
        let db = Database::open_in_memory().unwrap();
        let b1 = db.insert_brief(&sample_brief("Sky Bar")).unwrap();
        let b2 = db.insert_brief(&sample_brief("Sky Bar")).unwrap();

        let v1 = db
            .upsert_venue("Sky Bar", "Bangkok", "bar-lounge", None, None, b1)
            .unwrap();
        let v2 = db
            .upsert_venue("Sky Bar", "", "", Some("acc1"), None, b2)
            .unwrap();

        assert_eq!(v1.id, v2.id);
        // Blank fields never clobber known values.
        assert_eq!(v2.location, "Bangkok");
        assert_eq!(v2.venue_type, "bar-lounge");
        assert_eq!(v2.syb_account_id.as_deref(), Some("acc1"));
        assert_eq!(v2.latest_brief_id, Some(b2));
        assert_eq!(v2.timezone, "Asia/Bangkok");
    }

    #[test]
    fn finalize_approval_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let brief_id = db.insert_brief(&sample_brief("Sky Bar")).unwrap();
        db.upsert_venue("Sky Bar", "Bangkok", "bar-lounge", None, None, brief_id)
            .unwrap();
        db.create_approval_token(brief_id, "tok123", Utc::now() + Duration::days(7))
            .unwrap();
        let token = db.get_token("tok123").unwrap().unwrap();

        let mappings = vec![("Main".to_string(), "z1".to_string(), "Main Floor".to_string())];
        let entries = vec![
            entry("z1", "17:00", DayFilter::Daily),
            entry("z1", "20:00", DayFilter::Weekend),
        ];
        let finalization = ApprovalFinalization {
            token_id: token.id,
            brief_id,
            venue_name: "Sky Bar",
            mappings: &mappings,
            syb_account_id: None,
            entries: &entries,
            remote_schedule_id: None,
        };

        assert!(db.finalize_approval(&finalization).unwrap());
        assert!(!db.finalize_approval(&finalization).unwrap());

        // Exactly one set of entries, one used_at, one counter bump.
        assert_eq!(db.entries_for_brief(brief_id).unwrap().len(), 2);
        assert!(db.get_token("tok123").unwrap().unwrap().used_at.is_some());
        assert_eq!(
            db.get_venue("Sky Bar").unwrap().unwrap().approved_brief_count,
            1
        );
        assert_eq!(
            db.get_brief(brief_id).unwrap().unwrap().status,
            BriefStatus::Approved
        );
    }

    #[test]
    fn finalize_with_remote_bind_marks_scheduled() {
        let db = Database::open_in_memory().unwrap();
        let brief_id = db.insert_brief(&sample_brief("Sky Bar")).unwrap();
        db.upsert_venue("Sky Bar", "Bangkok", "bar-lounge", None, None, brief_id)
            .unwrap();
        db.create_approval_token(brief_id, "tok456", Utc::now() + Duration::days(7))
            .unwrap();
        let token = db.get_token("tok456").unwrap().unwrap();

        let mappings = vec![("Main".to_string(), "z1".to_string(), "Main Floor".to_string())];
        assert!(db
            .finalize_approval(&ApprovalFinalization {
                token_id: token.id,
                brief_id,
                venue_name: "Sky Bar",
                mappings: &mappings,
                syb_account_id: Some("acc1"),
                entries: &[],
                remote_schedule_id: Some("sched_9"),
            })
            .unwrap());

        let brief = db.get_brief(brief_id).unwrap().unwrap();
        assert_eq!(brief.status, BriefStatus::Scheduled);
        assert_eq!(brief.syb_schedule_id.as_deref(), Some("sched_9"));
        assert!(db.entries_for_brief(brief_id).unwrap().is_empty());
    }

    #[test]
    fn entry_failures_turn_terminal_at_three() {
        let db = Database::open_in_memory().unwrap();
        let brief_id = db.insert_brief(&sample_brief("Sky Bar")).unwrap();
        db.insert_schedule_entries(brief_id, &[entry("z1", "17:00", DayFilter::Daily)])
            .unwrap();
        let id = db.active_entries().unwrap()[0].id;

        assert_eq!(db.record_entry_failure(id).unwrap(), 1);
        assert_eq!(db.record_entry_failure(id).unwrap(), 2);
        assert_eq!(db.record_entry_failure(id).unwrap(), 3);

        assert!(db.active_entries().unwrap().is_empty());
        let entry = &db.entries_for_brief(brief_id).unwrap()[0];
        assert_eq!(entry.status, EntryStatus::Error);
    }

    #[test]
    fn successful_assignment_resets_retries() {
        let db = Database::open_in_memory().unwrap();
        let brief_id = db.insert_brief(&sample_brief("Sky Bar")).unwrap();
        db.insert_schedule_entries(brief_id, &[entry("z1", "17:00", DayFilter::Daily)])
            .unwrap();
        let id = db.active_entries().unwrap()[0].id;

        db.record_entry_failure(id).unwrap();
        let at = Utc::now();
        db.mark_entry_assigned(id, at).unwrap();

        let row = &db.active_entries().unwrap()[0];
        assert_eq!(row.retry_count, 0);
        assert_eq!(
            row.last_assigned_at.unwrap().timestamp(),
            at.timestamp()
        );
    }

    #[test]
    fn follow_up_sent_at_is_write_once() {
        let db = Database::open_in_memory().unwrap();
        let brief_id = db.insert_brief(&sample_brief("Sky Bar")).unwrap();
        db.create_follow_up(brief_id, FollowUpKind::SevenDay, Utc::now(), "trk1")
            .unwrap();

        let due = db.due_follow_ups(Utc::now(), 5).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].contact_email, "nok@example.com");

        let first = Utc::now();
        db.mark_follow_up_sent(due[0].id, first).unwrap();
        db.mark_follow_up_sent(due[0].id, first + Duration::hours(1))
            .unwrap();

        assert!(db.due_follow_ups(Utc::now(), 5).unwrap().is_empty());
        // The second write was a no-op.
        let (_, opened) = db.follow_up_by_tracking_id("trk1").unwrap().unwrap();
        assert!(opened.is_none());
    }

    #[test]
    fn due_follow_ups_respects_limit_and_schedule() {
        let db = Database::open_in_memory().unwrap();
        let brief_id = db.insert_brief(&sample_brief("Sky Bar")).unwrap();
        let now = Utc::now();
        for i in 0..7 {
            db.create_follow_up(
                brief_id,
                FollowUpKind::SevenDay,
                now - Duration::minutes(10 - i),
                &format!("trk{i}"),
            )
            .unwrap();
        }
        db.create_follow_up(brief_id, FollowUpKind::ThirtyDay, now + Duration::days(30), "future")
            .unwrap();

        let due = db.due_follow_ups(now, 5).unwrap();
        assert_eq!(due.len(), 5);
        assert!(due.iter().all(|f| f.tracking_id != "future"));
    }

    #[test]
    fn pixel_open_is_recorded_once() {
        let db = Database::open_in_memory().unwrap();
        let brief_id = db.insert_brief(&sample_brief("Sky Bar")).unwrap();
        db.create_follow_up(brief_id, FollowUpKind::SevenDay, Utc::now(), "trk1")
            .unwrap();

        let first = Utc::now();
        db.mark_follow_up_opened("trk1", first).unwrap();
        db.mark_follow_up_opened("trk1", first + Duration::hours(2))
            .unwrap();

        let (_, opened) = db.follow_up_by_tracking_id("trk1").unwrap().unwrap();
        assert_eq!(opened.unwrap().timestamp(), first.timestamp());
    }
}
