//! Deterministic playlist matcher: scores every catalog playlist against a
//! brief and returns ranked per-daypart picks with a normalized match score.
//!
//! Everything here is pure — same catalog, same brief, same picks. Ties are
//! broken by catalog order so the output is stable across runs.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use mb_domain::brief::{Daypart, Recommendation};

use crate::playlists::Catalog;
use crate::vibes::{humanize_venue_type, venue_categories, vibe_keywords};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Input / output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct MatchInput {
    pub venue_type: String,
    pub vibes: Vec<String>,
    pub energy: u8,
    pub avoid_list: String,
    /// `instrumental`, `mostly-instrumental`, `mix`, or anything else.
    pub vocals: String,
    pub genre_hints: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MatchOutput {
    pub recommendations: Vec<Recommendation>,
    pub designer_notes: String,
}

/// Total picks across all dayparts; each daypart gets `⌈12 / n⌉`.
const TOTAL_PICK_BUDGET: usize = 12;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Base scoring
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct BaseScore {
    score: f64,
    venue_matched: bool,
    matched_vibes: Vec<String>,
}

fn instrumental_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"instrumental|piano|ambient|nature").unwrap())
}

fn mostly_instrumental_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"instrumental|piano|acoustic").unwrap())
}

fn avoid_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;]|\band\b|\bor\b").unwrap())
}

const AVOID_FILLER: &[&str] = &["no", "hits", "mainstream"];

/// Tokenize an avoid list into normalized exclusion terms: split on `,;`
/// and the words and/or, strip filler words, fold hyphens to spaces.
/// `"no hip-hop or rap"` → `["hip hop", "rap"]`.
pub fn avoid_terms(avoid_list: &str) -> Vec<String> {
    avoid_split_re()
        .split(&avoid_list.to_lowercase())
        .filter_map(|part| {
            let term = part
                .split_whitespace()
                .filter(|w| !AVOID_FILLER.contains(w))
                .collect::<Vec<_>>()
                .join(" ")
                .replace('-', " ");
            let term = term.trim().to_string();
            (!term.is_empty()).then_some(term)
        })
        .collect()
}

fn base_score(
    text: &str,
    categories: &std::collections::BTreeSet<String>,
    input: &MatchInput,
    avoid: &[String],
) -> BaseScore {
    let mut score = 0.0;

    // 1. Venue category match: 2 + intersection size.
    let targets = venue_categories(&input.venue_type);
    let intersection = categories
        .iter()
        .filter(|c| targets.contains(&c.as_str()))
        .count();
    let venue_matched = intersection > 0;
    if venue_matched {
        score += 2.0 + intersection as f64;
    }

    // 2. Vibe keywords: +0.5 each.
    let mut matched_vibes = Vec::new();
    for vibe in &input.vibes {
        let mut hit = false;
        for kw in vibe_keywords(vibe) {
            if text.contains(kw) {
                score += 0.5;
                hit = true;
            }
        }
        if hit {
            matched_vibes.push(vibe.clone());
        }
    }

    // 3. Genre hints are the strongest positive signal.
    for hint in &input.genre_hints {
        if text.contains(&hint.to_lowercase()) {
            score += 2.0;
        }
    }

    // 4. Avoid terms are effectively exclusion. Hyphens fold to spaces on
    //    both sides so "hip-hop" excludes "hip hop".
    let norm_text = text.replace('-', " ");
    for term in avoid {
        if norm_text.contains(term.as_str()) {
            score -= 10.0;
        }
    }

    // 5. Vocals preference boost.
    match input.vocals.as_str() {
        "instrumental" => {
            if instrumental_re().is_match(text) {
                score += 1.5;
            }
        }
        "mostly-instrumental" => {
            if mostly_instrumental_re().is_match(text) {
                score += 0.8;
            }
        }
        _ => {}
    }

    BaseScore {
        score,
        venue_matched,
        matched_vibes,
    }
}

fn daypart_energy_categories(energy: u8) -> &'static [&'static str] {
    if energy <= 3 {
        &["spa", "lounge"]
    } else if energy <= 6 {
        &["cafe", "restaurant", "hotel", "lounge"]
    } else {
        &["bar", "store", "lounge"]
    }
}

fn author_reason(description: &str, base: &BaseScore, input: &MatchInput) -> String {
    let vibe_text = if base.matched_vibes.is_empty() {
        input
            .vibes
            .first()
            .cloned()
            .unwrap_or_else(|| "signature".into())
    } else {
        base.matched_vibes.join(", ")
    };
    if base.venue_matched {
        format!(
            "{} — fits your {} {}",
            description,
            vibe_text,
            humanize_venue_type(&input.venue_type)
        )
    } else {
        format!("{} — complements the {} atmosphere", description, vibe_text)
    }
}

fn author_designer_notes(input: &MatchInput, avoid: &[String]) -> String {
    let vibes = if input.vibes.is_empty() {
        "the venue's signature".to_string()
    } else {
        input.vibes.join(" and ")
    };
    let mut notes = format!(
        "Anchor the {} around {} moods at energy {}/10; shift texture by daypart rather than jumping genres.",
        humanize_venue_type(&input.venue_type),
        vibes,
        input.energy
    );
    if !avoid.is_empty() {
        notes.push_str(&format!(" Keep {} out of rotation.", avoid.join(", ")));
    }
    notes
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Matching
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Score every catalog playlist for the brief and pick per-daypart
/// recommendations. A playlist is picked at most once across the daypart
/// list; scores ≤ 0 never surface.
pub fn match_playlists(
    catalog: &Catalog,
    input: &MatchInput,
    dayparts: &[Daypart],
) -> MatchOutput {
    let avoid = avoid_terms(&input.avoid_list);

    let scored: Vec<(usize, &crate::playlists::Playlist, BaseScore)> = catalog
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            let base = base_score(&p.search_text(), &p.categories, input, &avoid);
            (idx, p, base)
        })
        .collect();

    let per_part = if dayparts.is_empty() {
        TOTAL_PICK_BUDGET
    } else {
        TOTAL_PICK_BUDGET.div_ceil(dayparts.len())
    };

    let mut picked: HashSet<usize> = HashSet::new();
    let mut recommendations = Vec::new();

    for dp in dayparts {
        let energy_cats = daypart_energy_categories(dp.energy);

        let mut candidates: Vec<(usize, f64)> = scored
            .iter()
            .filter(|(idx, _, _)| !picked.contains(idx))
            .map(|(idx, p, base)| {
                let bonus = if p.categories.iter().any(|c| energy_cats.contains(&c.as_str())) {
                    1.0
                } else {
                    0.0
                };
                (*idx, base.score + bonus)
            })
            .filter(|(_, s)| *s > 0.0)
            .collect();

        // Descending score, catalog order breaks ties.
        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let Some(&(_, max_score)) = candidates.first() else {
            continue;
        };

        for &(idx, dp_score) in candidates.iter().take(per_part) {
            picked.insert(idx);
            let (_, playlist, base) = &scored[idx];
            let match_score =
                (55.0 + dp_score / max_score * 40.0).round().clamp(55.0, 95.0) as u8;
            recommendations.push(Recommendation {
                playlist_id: playlist.id.clone(),
                playlist_name: playlist.name.clone(),
                playlist_syb_id: playlist.syb_id.clone(),
                daypart: dp.key.clone(),
                zone: None,
                schedule_type: "weekday".into(),
                reason: author_reason(&playlist.description, base, input),
                match_score,
            });
        }
    }

    MatchOutput {
        recommendations,
        designer_notes: author_designer_notes(input, &avoid),
    }
}
