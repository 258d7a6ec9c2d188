//! Daypart generation: segment a venue's operating hours into 2–4 labeled,
//! time-bounded parts with per-part energy targets.

use std::sync::OnceLock;

use regex::Regex;

use mb_domain::brief::{span_minutes, Daypart, DaypartIcon};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operating-hours parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn clock_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The compact HHMM branch must come first or "0900" would split into
    // "09" + "00" and read as two tokens.
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{3,4})\s*(am|pm)?|(\d{1,2})(?::(\d{2}))?\s*(am|pm)?").unwrap()
    })
}

/// Parse one clock token (`7`, `7am`, `07:30`, `1930`, `7:30pm`) into
/// minutes since midnight.
fn parse_clock(hour: &str, minute: Option<&str>, meridiem: Option<&str>) -> Option<u16> {
    let mut h: u16 = hour.parse().ok()?;
    let m: u16 = minute.map(|m| m.parse().ok()).unwrap_or(Some(0))?;
    if m > 59 {
        return None;
    }
    match meridiem.map(|s| s.to_ascii_lowercase()) {
        Some(ref s) if s == "pm" => {
            if h != 12 {
                h += 12;
            }
        }
        Some(ref s) if s == "am" => {
            if h == 12 {
                h = 0;
            }
        }
        _ => {}
    }
    if h > 24 {
        return None;
    }
    Some((h % 24) * 60 + m)
}

/// Parse free-text operating hours into `(open, close)` minutes since
/// midnight. Accepts `HH`, `HH:MM`, `HHMM`, optional am/pm, separated by a
/// dash or the word `to`. Returns `None` when no two clock tokens exist.
pub fn parse_operating_hours(text: &str) -> Option<(u16, u16)> {
    let mut tokens = Vec::with_capacity(2);
    for cap in clock_token_re().captures_iter(text) {
        let minutes = if let Some(compact) = cap.get(1) {
            // HHMM form: split the digit run.
            let digits = compact.as_str();
            let (h, m) = digits.split_at(digits.len() - 2);
            parse_clock(h, Some(m), cap.get(2).map(|m| m.as_str()))
        } else {
            parse_clock(
                cap.get(3)?.as_str(),
                cap.get(4).map(|m| m.as_str()),
                cap.get(5).map(|m| m.as_str()),
            )
        };
        if let Some(minutes) = minutes {
            tokens.push(minutes);
            if tokens.len() == 2 {
                break;
            }
        }
    }
    if tokens.len() == 2 {
        Some((tokens[0], tokens[1]))
    } else {
        None
    }
}

fn fmt_hhmm(minutes: u16) -> String {
    format!("{:02}:{:02}", (minutes % 1440) / 60, minutes % 60)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Segmentation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct SegmentPlan {
    names: &'static [&'static str],
    keys: &'static [&'static str],
    energy_offsets: &'static [i8],
}

const PLAN_2: SegmentPlan = SegmentPlan {
    names: &["Opening", "Peak"],
    keys: &["opening", "peak"],
    energy_offsets: &[-1, 1],
};
const PLAN_3: SegmentPlan = SegmentPlan {
    names: &["Opening", "Peak Hours", "Wind Down"],
    keys: &["opening", "peak-hours", "wind-down"],
    energy_offsets: &[-2, 0, 1],
};
const PLAN_4: SegmentPlan = SegmentPlan {
    names: &["Opening", "Build Up", "Peak Hours", "Wind Down"],
    keys: &["opening", "build-up", "peak-hours", "wind-down"],
    energy_offsets: &[-2, -1, 1, 0],
};

fn icon_for_start(minutes: u16) -> DaypartIcon {
    match (minutes % 1440) / 60 {
        5..=10 => DaypartIcon::Sunrise,
        11..=15 => DaypartIcon::Sun,
        16..=18 => DaypartIcon::Sunset,
        19..=23 => DaypartIcon::Moon,
        _ => DaypartIcon::Stars,
    }
}

fn clamp_energy(base: u8, offset: i8) -> u8 {
    (base as i16 + offset as i16).clamp(1, 10) as u8
}

/// Derive 2–4 dayparts from an operating-hours string and a base energy.
/// Unparseable or empty hours fall back to a fixed morning/afternoon/evening
/// trio. Ordering is significant downstream.
pub fn generate_dayparts(hours: &str, base_energy: u8) -> Vec<Daypart> {
    let Some((open, close)) = parse_operating_hours(hours) else {
        return fallback_dayparts(base_energy);
    };

    let total = span_minutes(open, close);
    let plan = if total <= 6 * 60 {
        &PLAN_2
    } else if total <= 12 * 60 {
        &PLAN_3
    } else {
        &PLAN_4
    };

    let count = plan.names.len() as u16;
    let seg_len = ((total as f64) / (count as f64)).round() as u16;

    (0..count as usize)
        .map(|i| {
            let start = (open + i as u16 * seg_len) % 1440;
            // The final segment absorbs rounding so the parts tile the
            // operating window exactly.
            let end = if i as u16 == count - 1 {
                close
            } else {
                (open + (i as u16 + 1) * seg_len) % 1440
            };
            Daypart {
                key: plan.keys[i].into(),
                label: format!("{} ({}–{})", plan.names[i], fmt_hhmm(start), fmt_hhmm(end)),
                time_range: format!("{}-{}", fmt_hhmm(start), fmt_hhmm(end)),
                icon: icon_for_start(start),
                energy: clamp_energy(base_energy, plan.energy_offsets[i]),
            }
        })
        .collect()
}

fn fallback_dayparts(base_energy: u8) -> Vec<Daypart> {
    let fixed: [(&str, &str, u16, u16, DaypartIcon, i8); 3] = [
        ("morning", "Morning", 6 * 60, 12 * 60, DaypartIcon::Sunrise, -2),
        ("afternoon", "Afternoon", 12 * 60, 18 * 60, DaypartIcon::Sun, 0),
        ("evening", "Evening", 18 * 60, 23 * 60, DaypartIcon::Moon, 1),
    ];
    fixed
        .into_iter()
        .map(|(key, name, start, end, icon, offset)| Daypart {
            key: key.into(),
            label: format!("{} ({}–{})", name, fmt_hhmm(start), fmt_hhmm(end)),
            time_range: format!("{}-{}", fmt_hhmm(start), fmt_hhmm(end)),
            icon,
            energy: clamp_energy(base_energy, offset),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_domain::brief::parse_time_range;

    #[test]
    fn parses_common_hour_forms() {
        assert_eq!(parse_operating_hours("17:00-02:00"), Some((1020, 120)));
        assert_eq!(parse_operating_hours("7am-6pm"), Some((420, 1080)));
        assert_eq!(parse_operating_hours("0900 to 1800"), Some((540, 1080)));
        assert_eq!(parse_operating_hours("11 to 23"), Some((660, 1380)));
        assert_eq!(parse_operating_hours("12pm - 12am"), Some((720, 0)));
        assert_eq!(parse_operating_hours("open all day"), None);
        assert_eq!(parse_operating_hours(""), None);
    }

    #[test]
    fn nine_hour_window_gets_three_parts() {
        // Rooftop bar: wraps past midnight, 9h window.
        let parts = generate_dayparts("17:00-02:00", 7);
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts.iter().map(|p| p.energy).collect::<Vec<_>>(),
            vec![5, 7, 8]
        );
        assert!(parts[0].label.starts_with("Opening"));
        assert!(parts[1].label.starts_with("Peak Hours"));
        assert!(parts[2].label.starts_with("Wind Down"));
        assert_eq!(parts[0].icon, DaypartIcon::Sunset);
        assert_eq!(parts[0].time_range, "17:00-20:00");
        assert_eq!(parts[2].time_range, "23:00-02:00");
    }

    #[test]
    fn short_wrap_window_gets_two_parts() {
        let parts = generate_dayparts("23:00 - 02:00", 6);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].time_range, "23:00-00:30");
        assert_eq!(parts[1].time_range, "00:30-02:00");
        assert_eq!(parts[1].icon, DaypartIcon::Stars);
    }

    #[test]
    fn long_day_gets_four_parts() {
        let parts = generate_dayparts("06:00-24:00", 5);
        assert_eq!(parts.len(), 4);
        assert_eq!(
            parts.iter().map(|p| p.key.as_str()).collect::<Vec<_>>(),
            vec!["opening", "build-up", "peak-hours", "wind-down"]
        );
        assert_eq!(
            parts.iter().map(|p| p.energy).collect::<Vec<_>>(),
            vec![3, 4, 6, 5]
        );
    }

    #[test]
    fn segments_tile_the_operating_window() {
        for hours in ["17:00-02:00", "7am-6pm", "10:00-17:30", "06:00-24:00"] {
            let parts = generate_dayparts(hours, 5);
            let (open, close) = parse_operating_hours(hours).unwrap();
            let ranges: Vec<(u16, u16)> = parts
                .iter()
                .map(|p| parse_time_range(&p.time_range).unwrap())
                .collect();
            assert_eq!(ranges.first().unwrap().0, open, "{hours}");
            assert_eq!(ranges.last().unwrap().1, close, "{hours}");
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].1, pair[1].0, "{hours}: segments must be contiguous");
            }
        }
    }

    #[test]
    fn empty_hours_fall_back_to_fixed_trio() {
        let parts = generate_dayparts("", 5);
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts.iter().map(|p| p.key.as_str()).collect::<Vec<_>>(),
            vec!["morning", "afternoon", "evening"]
        );
        assert_eq!(
            parts.iter().map(|p| p.energy).collect::<Vec<_>>(),
            vec![3, 5, 6]
        );
        assert_eq!(parts[0].icon, DaypartIcon::Sunrise);
        assert_eq!(parts[2].icon, DaypartIcon::Moon);
    }

    #[test]
    fn energy_clamps_at_both_ends() {
        let low = generate_dayparts("7am-6pm", 1);
        assert!(low.iter().all(|p| (1..=10).contains(&p.energy)));
        assert_eq!(low[0].energy, 1);

        let high = generate_dayparts("7am-6pm", 10);
        assert!(high.iter().all(|p| (1..=10).contains(&p.energy)));
        assert_eq!(high[2].energy, 10);
    }
}
