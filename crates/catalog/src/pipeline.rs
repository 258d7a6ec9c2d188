//! The recommendation pipeline: composes the daypart generator, the
//! matcher, and the designer brief across zones and weekend variants.
//! Used by both the non-chat recommend endpoint and the conversational
//! engine's `generate_recommendations` tool.

use serde::{Deserialize, Serialize};

use mb_domain::brief::{Daypart, Dayparts, DesignerBrief, Recommendation};

use crate::dayparts::generate_dayparts;
use crate::designer::build_designer_brief;
use crate::matcher::{match_playlists, MatchInput};
use crate::playlists::Catalog;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-zone overrides merged atop the base brief.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSpec {
    pub name: String,
    #[serde(default)]
    pub hours: Option<String>,
    #[serde(default)]
    pub energy: Option<u8>,
    #[serde(default)]
    pub vibes: Option<Vec<String>>,
    #[serde(default)]
    pub genre_hints: Option<Vec<String>>,
}

/// Weekend-mode overrides, applied on top of the (possibly zone-merged)
/// brief for the second matcher pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekendOverrides {
    #[serde(default)]
    pub hours: Option<String>,
    #[serde(default)]
    pub energy: Option<u8>,
    #[serde(default)]
    pub vibes: Option<Vec<String>>,
    #[serde(default)]
    pub genre_hints: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefRequest {
    #[serde(default)]
    pub venue_name: Option<String>,
    #[serde(default)]
    pub venue_type: String,
    #[serde(default)]
    pub vibes: Vec<String>,
    #[serde(default = "d_energy")]
    pub energy: u8,
    #[serde(default)]
    pub hours: String,
    #[serde(default)]
    pub vocals: String,
    #[serde(default)]
    pub avoid_list: String,
    #[serde(default)]
    pub genre_hints: Vec<String>,
    #[serde(default)]
    pub zones: Vec<ZoneSpec>,
    #[serde(default)]
    pub weekend: Option<WeekendOverrides>,
}

fn d_energy() -> u8 {
    5
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationBundle {
    pub recommendations: Vec<Recommendation>,
    pub dayparts: Dayparts,
    pub designer_notes: String,
    pub multi_zone: bool,
    pub zone_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekend_dayparts: Option<Dayparts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekend_recommendations: Option<Vec<Recommendation>>,
    pub designer_brief: DesignerBrief,
}

impl RecommendationBundle {
    /// The daypart list designer synthesis and emails lead with: the flat
    /// list for single-zone briefs, the first zone's list otherwise.
    pub fn primary_dayparts(&self) -> &[Daypart] {
        self.dayparts
            .zones()
            .first()
            .map(|(_, parts)| *parts)
            .unwrap_or(&[])
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn merged_input(req: &BriefRequest, zone: Option<&ZoneSpec>, weekend: Option<&WeekendOverrides>) -> (MatchInput, String) {
    let mut vibes = req.vibes.clone();
    let mut energy = req.energy;
    let mut hours = req.hours.clone();
    let mut genre_hints = req.genre_hints.clone();

    if let Some(zone) = zone {
        if let Some(v) = &zone.vibes {
            vibes = v.clone();
        }
        if let Some(e) = zone.energy {
            energy = e;
        }
        if let Some(h) = &zone.hours {
            hours = h.clone();
        }
        if let Some(g) = &zone.genre_hints {
            genre_hints = g.clone();
        }
    }
    if let Some(wk) = weekend {
        if let Some(v) = &wk.vibes {
            vibes = v.clone();
        }
        if let Some(e) = wk.energy {
            energy = e;
        }
        if let Some(h) = &wk.hours {
            hours = h.clone();
        }
        if let Some(g) = &wk.genre_hints {
            genre_hints = g.clone();
        }
    }

    (
        MatchInput {
            venue_type: req.venue_type.clone(),
            vibes,
            energy,
            avoid_list: req.avoid_list.clone(),
            vocals: req.vocals.clone(),
            genre_hints,
        },
        hours,
    )
}

fn run_pass(
    catalog: &Catalog,
    req: &BriefRequest,
    weekend: Option<&WeekendOverrides>,
    schedule_type: &str,
) -> (Vec<Recommendation>, Dayparts, String) {
    if req.zones.len() > 1 {
        let mut map = std::collections::BTreeMap::new();
        let mut recommendations = Vec::new();
        let mut notes = String::new();
        for zone in &req.zones {
            let (input, hours) = merged_input(req, Some(zone), weekend);
            let parts = generate_dayparts(&hours, input.energy);
            let out = match_playlists(catalog, &input, &parts);
            if notes.is_empty() {
                notes = out.designer_notes;
            }
            recommendations.extend(out.recommendations.into_iter().map(|mut r| {
                r.zone = Some(zone.name.clone());
                r.schedule_type = schedule_type.into();
                r
            }));
            map.insert(zone.name.clone(), parts);
        }
        (recommendations, Dayparts::Multi(map), notes)
    } else {
        let zone = req.zones.first();
        let (input, hours) = merged_input(req, zone, weekend);
        let parts = generate_dayparts(&hours, input.energy);
        let out = match_playlists(catalog, &input, &parts);
        let recommendations = out
            .recommendations
            .into_iter()
            .map(|mut r| {
                r.zone = zone.map(|z| z.name.clone());
                r.schedule_type = schedule_type.into();
                r
            })
            .collect();
        (recommendations, Dayparts::Single(parts), out.designer_notes)
    }
}

/// Run the full pipeline: base pass per zone, optional weekend pass, and
/// the designer brief.
pub fn run_pipeline(catalog: &Catalog, req: &BriefRequest) -> RecommendationBundle {
    let (recommendations, dayparts, designer_notes) = run_pass(catalog, req, None, "weekday");

    let (weekend_recommendations, weekend_dayparts) = match &req.weekend {
        Some(wk) => {
            let (recs, parts, _) = run_pass(catalog, req, Some(wk), "weekend");
            (Some(recs), Some(parts))
        }
        None => (None, None),
    };

    let zone_names: Vec<String> = req.zones.iter().map(|z| z.name.clone()).collect();
    let multi_zone = req.zones.len() > 1;

    let primary_parts: Vec<Daypart> = dayparts
        .zones()
        .first()
        .map(|(_, parts)| parts.to_vec())
        .unwrap_or_default();
    let designer_brief =
        build_designer_brief(&req.vibes, &req.venue_type, req.energy, &primary_parts);

    RecommendationBundle {
        recommendations,
        dayparts,
        designer_notes,
        multi_zone,
        zone_names,
        weekend_dayparts,
        weekend_recommendations,
        designer_brief,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlists::Playlist;
    use std::collections::{BTreeSet, HashSet};

    fn playlist(id: &str, name: &str, description: &str, cats: &[&str]) -> Playlist {
        Playlist {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            categories: cats.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            syb_id: Some(format!("syb:{id}")),
        }
    }

    fn resort_catalog() -> Catalog {
        Catalog::from_playlists(vec![
            playlist("calm-waters", "Calm Waters", "Zen ambient textures with nature layers", &["spa", "lounge"]),
            playlist("lobby-grand", "Lobby Grand", "Refined hotel lounge with serene piano", &["hotel", "lounge"]),
            playlist("island-splash", "Island Splash", "Tropical house for sunny poolside afternoons", &["bar", "lounge"]),
            playlist("beach-fiesta", "Beach Fiesta", "Upbeat latin and summer beach grooves", &["bar"]),
            playlist("sunset-chill", "Sunset Chill", "Relaxed chillout for golden evenings", &["lounge", "cafe"]),
        ])
    }

    fn resort_request() -> BriefRequest {
        BriefRequest {
            venue_name: Some("Azure Resort".into()),
            venue_type: "resort".into(),
            vibes: vec!["relaxed".into()],
            energy: 5,
            hours: "06:00-24:00".into(),
            zones: vec![
                ZoneSpec {
                    name: "Lobby".into(),
                    hours: Some("06:00-24:00".into()),
                    energy: Some(3),
                    vibes: Some(vec!["zen".into()]),
                    genre_hints: None,
                },
                ZoneSpec {
                    name: "Pool".into(),
                    hours: Some("09:00-19:00".into()),
                    energy: Some(7),
                    vibes: Some(vec!["tropical".into()]),
                    genre_hints: Some(vec!["tropical house".into()]),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn multi_zone_produces_separate_dayparts_per_zone() {
        let bundle = run_pipeline(&resort_catalog(), &resort_request());
        assert!(bundle.multi_zone);
        assert_eq!(bundle.zone_names, vec!["Lobby", "Pool"]);

        // 18h lobby window → 4 parts; 10h pool window → 3 parts.
        assert_eq!(bundle.dayparts.for_zone("Lobby").unwrap().len(), 4);
        assert_eq!(bundle.dayparts.for_zone("Pool").unwrap().len(), 3);
    }

    #[test]
    fn multi_zone_recommendations_carry_zone_and_never_repeat_within_zone() {
        let bundle = run_pipeline(&resort_catalog(), &resort_request());
        assert!(bundle.recommendations.iter().all(|r| r.zone.is_some()));

        for zone in ["Lobby", "Pool"] {
            let mut seen = HashSet::new();
            for rec in bundle.recommendations.iter().filter(|r| r.zone.as_deref() == Some(zone)) {
                assert!(
                    seen.insert(rec.playlist_id.clone()),
                    "{} repeated in {zone}",
                    rec.playlist_id
                );
            }
        }
    }

    #[test]
    fn zone_vibe_overrides_steer_the_matcher() {
        let bundle = run_pipeline(&resort_catalog(), &resort_request());
        let pool_ids: Vec<&str> = bundle
            .recommendations
            .iter()
            .filter(|r| r.zone.as_deref() == Some("Pool"))
            .map(|r| r.playlist_id.as_str())
            .collect();
        assert!(pool_ids.contains(&"island-splash"));
    }

    #[test]
    fn weekend_pass_tags_schedule_type() {
        let mut req = resort_request();
        req.zones.truncate(1);
        req.weekend = Some(WeekendOverrides {
            energy: Some(8),
            ..Default::default()
        });
        let bundle = run_pipeline(&resort_catalog(), &req);
        let weekend = bundle.weekend_recommendations.expect("weekend pass ran");
        assert!(weekend.iter().all(|r| r.schedule_type == "weekend"));
        assert!(bundle.weekend_dayparts.is_some());
        assert!(bundle
            .recommendations
            .iter()
            .all(|r| r.schedule_type == "weekday"));
    }

    #[test]
    fn single_zone_bundle_is_flat() {
        let req = BriefRequest {
            venue_type: "cafe".into(),
            vibes: vec!["warm".into()],
            energy: 4,
            hours: "7am-6pm".into(),
            ..Default::default()
        };
        let bundle = run_pipeline(&resort_catalog(), &req);
        assert!(!bundle.multi_zone);
        assert!(!bundle.dayparts.is_multi());
        assert!(bundle.zone_names.is_empty());
        assert_eq!(bundle.primary_dayparts().len(), 3);
    }
}
