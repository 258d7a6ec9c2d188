//! The schedule executor: a singleton 60-second loop that puts the right
//! playlist on the right zone at the right venue-local time, recovers from
//! cold starts via catch-up, dispatches due follow-up emails, and keeps the
//! process warm while active entries exist.
//!
//! A tick never raises out of the loop; every downstream failure lands in
//! a log line and, for assignments, the entry's retry counter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

use mb_domain::brief::parse_hhmm;
use mb_store::{Database, DueFollowUp, ScheduleEntryRow, MAX_ASSIGN_RETRIES};

use crate::emails;
use crate::state::AppState;

const TICK_PERIOD: std::time::Duration = std::time::Duration::from_secs(60);
/// Keepalive arbitration runs every 5th tick.
const KEEPALIVE_EVERY_TICKS: u64 = 5;
const KEEPALIVE_PING_PERIOD: std::time::Duration = std::time::Duration::from_secs(600);
const FOLLOW_UPS_PER_TICK: usize = 5;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Local-time predicates (pure, tested without a database)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn parse_tz(tz: &str) -> Tz {
    tz.parse().unwrap_or(chrono_tz::Asia::Bangkok)
}

fn minutes_of_day<T: Timelike>(t: &T) -> u16 {
    (t.hour() * 60 + t.minute()) as u16
}

fn circular_minute_distance(a: u16, b: u16) -> u16 {
    let d = (a as i32 - b as i32).unsigned_abs() as u16;
    d.min(1440 - d)
}

/// Whether the entry was already assigned on the current date in its own
/// timezone. Day-of-date comparison, never a 24-hour delta.
pub fn assigned_today(entry: &ScheduleEntryRow, now_utc: DateTime<Utc>) -> bool {
    let tz = parse_tz(&entry.timezone);
    match entry.last_assigned_at {
        Some(at) => {
            at.with_timezone(&tz).date_naive() == now_utc.with_timezone(&tz).date_naive()
        }
        None => false,
    }
}

/// Due-now window: the entry's local start time lies within ±1 minute of
/// the venue-local now, today is admitted by the day filter, and the entry
/// has not been assigned today.
pub fn is_due_now(entry: &ScheduleEntryRow, now_utc: DateTime<Utc>) -> bool {
    let tz = parse_tz(&entry.timezone);
    let local = now_utc.with_timezone(&tz);
    if !entry.days.admits(local.weekday()) || assigned_today(entry, now_utc) {
        return false;
    }
    match parse_hhmm(&entry.start_time) {
        Some(start) => circular_minute_distance(minutes_of_day(&local), start) <= 1,
        None => false,
    }
}

/// Overdue: the start has already passed today (venue-local), today is
/// admitted, and the entry has not been assigned today. Feeds catch-up.
pub fn is_overdue(entry: &ScheduleEntryRow, now_utc: DateTime<Utc>) -> bool {
    let tz = parse_tz(&entry.timezone);
    let local = now_utc.with_timezone(&tz);
    if !entry.days.admits(local.weekday()) || assigned_today(entry, now_utc) {
        return false;
    }
    match parse_hhmm(&entry.start_time) {
        Some(start) => start < minutes_of_day(&local),
        None => false,
    }
}

/// Collapse overdue entries to at most one per zone: the latest start is
/// the one that should currently be playing.
pub fn collapse_catch_up(entries: Vec<ScheduleEntryRow>) -> Vec<ScheduleEntryRow> {
    let mut best: HashMap<String, ScheduleEntryRow> = HashMap::new();
    for entry in entries {
        let start = parse_hhmm(&entry.start_time).unwrap_or(0);
        match best.get(&entry.zone_id) {
            Some(current)
                if parse_hhmm(&current.start_time).unwrap_or(0) >= start => {}
            _ => {
                best.insert(entry.zone_id.clone(), entry);
            }
        }
    }
    let mut collapsed: Vec<ScheduleEntryRow> = best.into_values().collect();
    collapsed.sort_by_key(|e| e.id);
    collapsed
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the executor until the process exits. Spawned once from `main`.
pub async fn run(state: AppState) {
    let keepalive = Keepalive::new(state.external_url("/health"));
    let mut interval = tokio::time::interval(TICK_PERIOD);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut tick_count: u64 = 0;

    tracing::info!("schedule executor started (60s tick)");
    loop {
        interval.tick().await;
        tick_count += 1;
        tick(&state, Utc::now()).await;

        if tick_count % KEEPALIVE_EVERY_TICKS == 0 {
            arbitrate_keepalive(&state, &keepalive);
        }
    }
}

/// One executor pass: due-now assignments, catch-up, follow-ups.
pub async fn tick(state: &AppState, now: DateTime<Utc>) {
    let Some(db) = &state.db else {
        return;
    };

    let entries = match db.active_entries() {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "executor could not load active entries");
            return;
        }
    };

    // Zones touched this tick: the second assignment of the same zone in
    // one pass is always redundant.
    let mut assigned_zones: HashSet<String> = HashSet::new();

    // 1. Due-now window.
    for entry in &entries {
        if assigned_zones.contains(&entry.zone_id) || !is_due_now(entry, now) {
            continue;
        }
        assign_entry(state, db, entry, now, &mut assigned_zones).await;
    }

    // 2. Catch-up: after a cold start, put each zone on the entry that
    //    should currently be playing.
    let overdue: Vec<ScheduleEntryRow> = entries
        .iter()
        .filter(|e| !assigned_zones.contains(&e.zone_id) && is_overdue(e, now))
        .cloned()
        .collect();
    for entry in collapse_catch_up(overdue) {
        if assigned_zones.contains(&entry.zone_id) {
            continue;
        }
        tracing::info!(
            entry_id = entry.id,
            zone = %entry.zone_name,
            start = %entry.start_time,
            "catch-up assignment"
        );
        assign_entry(state, db, &entry, now, &mut assigned_zones).await;
    }

    // 3. Follow-up dispatch.
    dispatch_follow_ups(state, db, now).await;
}

async fn assign_entry(
    state: &AppState,
    db: &Database,
    entry: &ScheduleEntryRow,
    now: DateTime<Utc>,
    assigned_zones: &mut HashSet<String>,
) {
    let Some(platform) = &state.platform else {
        tracing::warn!(entry_id = entry.id, "no platform client; cannot assign");
        return;
    };

    match platform
        .assign_source(&[entry.zone_id.clone()], &entry.playlist_syb_id)
        .await
    {
        Ok(()) => {
            assigned_zones.insert(entry.zone_id.clone());
            if let Err(e) = db.mark_entry_assigned(entry.id, now) {
                tracing::error!(entry_id = entry.id, error = %e, "assigned but not recorded");
            } else {
                tracing::info!(
                    entry_id = entry.id,
                    zone = %entry.zone_name,
                    playlist = %entry.playlist_name,
                    "playlist assigned"
                );
            }
        }
        Err(e) => {
            tracing::warn!(entry_id = entry.id, error = %e, "assignment failed");
            match db.record_entry_failure(entry.id) {
                Ok(retries) if retries >= MAX_ASSIGN_RETRIES => {
                    tracing::error!(
                        entry_id = entry.id,
                        retries,
                        "entry marked error after repeated failures"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(entry_id = entry.id, error = %e, "failure not recorded");
                }
            }
        }
    }
}

async fn dispatch_follow_ups(state: &AppState, db: &Database, now: DateTime<Utc>) {
    let due = match db.due_follow_ups(now, FOLLOW_UPS_PER_TICK) {
        Ok(due) => due,
        Err(e) => {
            tracing::warn!(error = %e, "could not load due follow-ups");
            return;
        }
    };

    for follow_up in due {
        send_follow_up(state, &follow_up).await;
        // One attempt per row, whatever the outcome: marking sent first
        // failure included trades possible drops for bounded retries.
        if let Err(e) = db.mark_follow_up_sent(follow_up.id, now) {
            tracing::error!(follow_up_id = follow_up.id, error = %e, "sent_at not recorded");
        }
    }
}

async fn send_follow_up(state: &AppState, follow_up: &DueFollowUp) {
    if follow_up.contact_email.trim().is_empty() {
        tracing::info!(follow_up_id = follow_up.id, "no contact email; marking sent");
        return;
    }
    let Some(mailer) = &state.mailer else {
        tracing::warn!(follow_up_id = follow_up.id, "no mailer configured");
        return;
    };

    let pixel_url = state.external_url(&format!("/follow-up/track/{}", follow_up.tracking_id));
    let (subject, html) = emails::follow_up_email(follow_up.kind, &follow_up.venue_name, &pixel_url);
    if let Err(e) = mailer
        .send_html(&follow_up.contact_email, &subject, html)
        .await
    {
        tracing::warn!(
            follow_up_id = follow_up.id,
            to = %follow_up.contact_email,
            error = %e,
            "follow-up email failed"
        );
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Keepalive
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Self-ping arbiter: while active entries exist, GET `/health` every ten
/// minutes so free-tier hosts do not put the process to sleep.
struct Keepalive {
    url: String,
    handle: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Keepalive {
    fn new(url: String) -> Arc<Self> {
        Arc::new(Self {
            url,
            handle: parking_lot::Mutex::new(None),
        })
    }

    fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn start(&self) {
        let mut guard = self.handle.lock();
        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let url = self.url.clone();
        tracing::info!(url = %url, "keepalive pinger started");
        *guard = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(KEEPALIVE_PING_PERIOD);
            loop {
                interval.tick().await;
                match reqwest::get(&url).await {
                    Ok(resp) => tracing::debug!(status = %resp.status(), "keepalive ping"),
                    Err(e) => tracing::debug!(error = %e, "keepalive ping failed"),
                }
            }
        }));
    }

    fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
            tracing::info!("keepalive pinger stopped");
        }
    }
}

fn arbitrate_keepalive(state: &AppState, keepalive: &Keepalive) {
    let Some(db) = &state.db else {
        return;
    };
    match db.count_active_entries() {
        Ok(n) if n > 0 => {
            if !keepalive.is_running() {
                keepalive.start();
            }
        }
        Ok(_) => keepalive.stop(),
        Err(e) => tracing::warn!(error = %e, "keepalive count failed"),
    }
}
