//! From brief to durable schedule: resolving liked playlists into slots,
//! materializing schedule entries at approval, and pre-building the remote
//! platform schedule with weekly RRULE slots.

use mb_catalog::Catalog;
use mb_domain::brief::{
    parse_time_range, span_minutes, DayFilter, Dayparts, LikedSlot, Recommendation, ScheduleData,
};
use mb_providers::{SchedulePlan, ScheduleSlot};
use mb_store::{NewScheduleEntry, ZoneMappingRow};

/// Fallback zone label for single-zone briefs.
pub const DEFAULT_ZONE: &str = "Main";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Liked slots
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve liked playlist names/ids against the recommendations they were
/// picked from, yielding concrete `(zone, daypart, time range)` slots.
/// Unresolvable likes are dropped with a log line.
pub fn build_liked_slots(
    liked: &[String],
    recommendations: &[Recommendation],
    dayparts: &Dayparts,
    days: DayFilter,
    catalog: &Catalog,
) -> Vec<LikedSlot> {
    let mut slots = Vec::with_capacity(liked.len());
    for wanted in liked {
        let Some(rec) = recommendations
            .iter()
            .find(|r| &r.playlist_id == wanted || &r.playlist_name == wanted)
        else {
            tracing::warn!(playlist = %wanted, "liked playlist not in recommendations");
            continue;
        };

        let zone = rec.zone.clone().unwrap_or_else(|| DEFAULT_ZONE.to_string());
        let Some(part) = dayparts
            .for_zone(&zone)
            .and_then(|parts| parts.iter().find(|p| p.key == rec.daypart))
        else {
            tracing::warn!(playlist = %wanted, daypart = %rec.daypart, "liked playlist has no daypart");
            continue;
        };

        let syb_id = rec
            .playlist_syb_id
            .clone()
            .or_else(|| catalog.resolve(&rec.playlist_id).and_then(|p| p.syb_id.clone()));

        slots.push(LikedSlot {
            zone,
            daypart_key: part.key.clone(),
            time_range: part.time_range.clone(),
            playlist_name: rec.playlist_name.clone(),
            playlist_syb_id: syb_id,
            days,
        });
    }
    slots
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry materialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Turn the persisted schedule data into executor rows, joining liked
/// slots against the learned zone mappings. Slots without a platform
/// playlist id or a mapped zone cannot be driven and are skipped.
pub fn entries_from_schedule_data(
    data: &ScheduleData,
    mappings: &[ZoneMappingRow],
    timezone: &str,
) -> Vec<NewScheduleEntry> {
    let mut entries = Vec::new();
    for slot in &data.liked {
        let Some(syb_id) = &slot.playlist_syb_id else {
            tracing::warn!(playlist = %slot.playlist_name, "skipping slot without platform id");
            continue;
        };
        let mapping = mappings
            .iter()
            .find(|m| m.brief_zone_name.eq_ignore_ascii_case(&slot.zone))
            .or_else(|| (mappings.len() == 1).then(|| &mappings[0]));
        let Some(mapping) = mapping else {
            tracing::warn!(zone = %slot.zone, "no zone mapping for slot");
            continue;
        };
        let Some((start, end)) = slot.time_range.split_once('-') else {
            continue;
        };
        entries.push(NewScheduleEntry {
            zone_id: mapping.syb_zone_id.clone(),
            zone_name: mapping.syb_zone_name.clone(),
            playlist_syb_id: syb_id.clone(),
            playlist_name: slot.playlist_name.clone(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            days: slot.days,
            timezone: timezone.to_string(),
        });
    }
    entries
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Remote schedule plan
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn rrule_byday(days: DayFilter) -> &'static [&'static str] {
    match days {
        DayFilter::Weekday => &["MO", "TU", "WE", "TH", "FR"],
        DayFilter::Weekend => &["SA", "SU"],
        DayFilter::Daily => &["MO", "TU", "WE", "TH", "FR", "SA", "SU"],
    }
}

/// Weekly slots for one liked slot: one per admitted day of week, start in
/// `HHMMSS` local wall clock, duration wrapping through midnight.
pub fn slots_for(slot: &LikedSlot) -> Vec<ScheduleSlot> {
    let Some(syb_id) = &slot.playlist_syb_id else {
        return Vec::new();
    };
    let Some((start, end)) = parse_time_range(&slot.time_range) else {
        return Vec::new();
    };
    let start_hhmmss = format!("{:02}{:02}00", start / 60, start % 60);
    let duration_ms = span_minutes(start, end) as u64 * 60_000;

    rrule_byday(slot.days)
        .iter()
        .map(|day| ScheduleSlot {
            rrule: format!("FREQ=WEEKLY;BYDAY={day}"),
            start: start_hhmmss.clone(),
            duration: duration_ms,
            playlist_ids: vec![syb_id.clone()],
        })
        .collect()
}

/// The remote schedule pre-built at submission when the platform account
/// is already confirmed.
pub fn build_schedule_plan(
    brief_id: i64,
    venue_name: &str,
    owner_id: &str,
    data: &ScheduleData,
) -> SchedulePlan {
    let zone_label = data
        .zone_names
        .first()
        .cloned()
        .unwrap_or_else(|| DEFAULT_ZONE.to_string());
    let slots: Vec<ScheduleSlot> = data.liked.iter().flat_map(slots_for).collect();
    SchedulePlan {
        owner_id: owner_id.to_string(),
        name: format!("{venue_name} {zone_label} — by BMAsia"),
        description: format!("Brief #{brief_id} — time-of-day music schedule"),
        slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_domain::brief::{Daypart, DaypartIcon};

    fn daypart(key: &str, range: &str, energy: u8) -> Daypart {
        Daypart {
            key: key.into(),
            label: format!("{key} ({range})"),
            time_range: range.into(),
            icon: DaypartIcon::Sun,
            energy,
        }
    }

    fn rec(id: &str, name: &str, daypart: &str, syb: Option<&str>) -> Recommendation {
        Recommendation {
            playlist_id: id.into(),
            playlist_name: name.into(),
            playlist_syb_id: syb.map(|s| s.to_string()),
            daypart: daypart.into(),
            zone: None,
            schedule_type: "weekday".into(),
            reason: String::new(),
            match_score: 80,
        }
    }

    fn mapping(zone: &str, syb_zone: &str) -> ZoneMappingRow {
        ZoneMappingRow {
            id: 1,
            venue_name: "Sky Bar".into(),
            brief_zone_name: zone.into(),
            syb_zone_id: syb_zone.into(),
            syb_zone_name: format!("{zone} Floor"),
            syb_account_id: None,
        }
    }

    fn sample_data() -> ScheduleData {
        ScheduleData {
            dayparts: Dayparts::Single(vec![
                daypart("opening", "17:00-20:00", 5),
                daypart("peak-hours", "20:00-23:00", 7),
            ]),
            daypart_order: vec!["opening".into(), "peak-hours".into()],
            zone_names: vec![DEFAULT_ZONE.into()],
            liked: vec![
                LikedSlot {
                    zone: DEFAULT_ZONE.into(),
                    daypart_key: "opening".into(),
                    time_range: "17:00-20:00".into(),
                    playlist_name: "Golden Hour".into(),
                    playlist_syb_id: Some("syb:gh".into()),
                    days: DayFilter::Daily,
                },
                LikedSlot {
                    zone: DEFAULT_ZONE.into(),
                    daypart_key: "peak-hours".into(),
                    time_range: "20:00-23:00".into(),
                    playlist_name: "Night Drive".into(),
                    playlist_syb_id: Some("syb:nd".into()),
                    days: DayFilter::Daily,
                },
                LikedSlot {
                    zone: DEFAULT_ZONE.into(),
                    daypart_key: "opening".into(),
                    time_range: "17:00-20:00".into(),
                    playlist_name: "Weekend Warmup".into(),
                    playlist_syb_id: Some("syb:ww".into()),
                    days: DayFilter::Weekend,
                },
                LikedSlot {
                    zone: DEFAULT_ZONE.into(),
                    daypart_key: "peak-hours".into(),
                    time_range: "20:00-23:00".into(),
                    playlist_name: "Weekend Peak".into(),
                    playlist_syb_id: Some("syb:wp".into()),
                    days: DayFilter::Weekend,
                },
            ],
            weekend_dayparts: None,
        }
    }

    #[test]
    fn liked_slots_resolve_through_recommendations() {
        let catalog = Catalog::from_playlists(vec![]);
        let dayparts = Dayparts::Single(vec![daypart("opening", "17:00-20:00", 5)]);
        let recs = vec![rec("gh", "Golden Hour", "opening", Some("syb:gh"))];
        let slots = build_liked_slots(
            &["Golden Hour".to_string(), "Unknown".to_string()],
            &recs,
            &dayparts,
            DayFilter::Daily,
            &catalog,
        );
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].time_range, "17:00-20:00");
        assert_eq!(slots[0].playlist_syb_id.as_deref(), Some("syb:gh"));
        assert_eq!(slots[0].zone, DEFAULT_ZONE);
    }

    #[test]
    fn approval_materializes_weekday_and_weekend_entries() {
        // Two liked playlists in two dayparts plus the weekend variant:
        // four entries, each carrying the venue timezone.
        let entries = entries_from_schedule_data(
            &sample_data(),
            &[mapping(DEFAULT_ZONE, "z9")],
            "Asia/Bangkok",
        );
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.timezone == "Asia/Bangkok"));
        assert!(entries.iter().all(|e| e.zone_id == "z9"));
        assert_eq!(
            entries
                .iter()
                .filter(|e| e.days == DayFilter::Weekend)
                .count(),
            2
        );
        assert_eq!(entries[0].start_time, "17:00");
        assert_eq!(entries[1].start_time, "20:00");
    }

    #[test]
    fn unmapped_zones_are_skipped() {
        let mut data = sample_data();
        data.liked[0].zone = "Terrace".into();
        let mappings = vec![mapping(DEFAULT_ZONE, "z9"), mapping("Garden", "z10")];
        let entries = entries_from_schedule_data(&data, &mappings, "Asia/Bangkok");
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn single_mapping_catches_all_zones() {
        let mut data = sample_data();
        data.liked[0].zone = "Terrace".into();
        let entries =
            entries_from_schedule_data(&data, &[mapping(DEFAULT_ZONE, "z9")], "Asia/Bangkok");
        assert_eq!(entries.len(), 4);
    }

    #[test]
    fn rrule_slots_expand_per_day() {
        let slot = LikedSlot {
            zone: DEFAULT_ZONE.into(),
            daypart_key: "wind-down".into(),
            time_range: "23:00-02:00".into(),
            playlist_name: "Night Cap".into(),
            playlist_syb_id: Some("syb:nc".into()),
            days: DayFilter::Weekend,
        };
        let slots = slots_for(&slot);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].rrule, "FREQ=WEEKLY;BYDAY=SA");
        assert_eq!(slots[1].rrule, "FREQ=WEEKLY;BYDAY=SU");
        assert_eq!(slots[0].start, "230000");
        // Wraps through midnight: 3 hours.
        assert_eq!(slots[0].duration, 3 * 60 * 60 * 1000);
    }

    #[test]
    fn schedule_plan_names_follow_the_house_format() {
        let plan = build_schedule_plan(42, "Sky Bar", "acc1", &sample_data());
        assert_eq!(plan.name, "Sky Bar Main — by BMAsia");
        assert!(plan.description.contains("Brief #42"));
        // 2 daily slots × 7 days + 2 weekend slots × 2 days.
        assert_eq!(plan.slots.len(), 2 * 7 + 2 * 2);
    }
}
