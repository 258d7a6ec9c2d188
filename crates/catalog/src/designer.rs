//! Designer-brief synthesis: condenses the structured inputs into the top
//! genres, BPM bands, and per-daypart genre lists the design team works
//! from. A sanity companion to the matcher, rendered into the internal
//! submission email.

use std::collections::BTreeMap;

use mb_domain::brief::{Daypart, DesignerBrief};

use crate::vibes::{venue_genre_boost, vibe_profile};

const TOP_GENRE_COUNT: usize = 8;

/// Build the designer brief from the selected vibes, venue type, base
/// energy, and the daypart list for the primary zone.
pub fn build_designer_brief(
    vibes: &[String],
    venue_type: &str,
    base_energy: u8,
    dayparts: &[Daypart],
) -> DesignerBrief {
    // Genre scoring: +1.0 per selected vibe's genres, +0.5 per venue
    // booster genre. First-seen order breaks score ties so the result is
    // stable.
    let mut scores: Vec<(String, f64)> = Vec::new();
    let mut bump = |genre: &str, amount: f64, scores: &mut Vec<(String, f64)>| {
        if let Some(entry) = scores.iter_mut().find(|(g, _)| g == genre) {
            entry.1 += amount;
        } else {
            scores.push((genre.to_string(), amount));
        }
    };

    for vibe in vibes {
        if let Some(profile) = vibe_profile(vibe) {
            for genre in profile.genres {
                bump(genre, 1.0, &mut scores);
            }
        }
    }
    for genre in venue_genre_boost(venue_type) {
        bump(genre, 0.5, &mut scores);
    }

    let mut ranked: Vec<(usize, String, f64)> = scores
        .into_iter()
        .enumerate()
        .map(|(i, (g, s))| (i, g, s))
        .collect();
    ranked.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    let top_genres: Vec<String> = ranked
        .into_iter()
        .take(TOP_GENRE_COUNT)
        .map(|(_, g, _)| g)
        .collect();

    // BPM bands of the selected vibes, deduplicated in selection order.
    let mut bpm_ranges: Vec<String> = Vec::new();
    for vibe in vibes {
        if let Some(profile) = vibe_profile(vibe) {
            if !bpm_ranges.iter().any(|b| b == profile.bpm) {
                bpm_ranges.push(profile.bpm.to_string());
            }
        }
    }

    // Per-daypart genres: six when the part runs at or above the base
    // energy, five otherwise.
    let mut daypart_genres = BTreeMap::new();
    let mut daypart_order = Vec::with_capacity(dayparts.len());
    for dp in dayparts {
        let take = if dp.energy >= base_energy { 6 } else { 5 };
        daypart_genres.insert(
            dp.key.clone(),
            top_genres.iter().take(take).cloned().collect(),
        );
        daypart_order.push(dp.key.clone());
    }

    DesignerBrief {
        top_genres,
        bpm_ranges,
        daypart_genres,
        daypart_order,
    }
}
