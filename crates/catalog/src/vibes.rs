//! Static vibe and venue lookup tables. These are curation data, not code:
//! they encode how the design team translates a vibe word into genres,
//! keywords, and BPM bands, and a venue type into platform categories.

/// Genres + BPM band for one vibe word.
pub struct VibeProfile {
    pub genres: &'static [&'static str],
    pub bpm: &'static str,
}

/// Vibe → genre/BPM profile. Order matters nowhere; lookup is by key.
pub const VIBE_GENRES: &[(&str, VibeProfile)] = &[
    (
        "sophisticated",
        VibeProfile {
            genres: &["jazz", "soul", "lounge", "nu-disco", "deep house"],
            bpm: "95-115",
        },
    ),
    (
        "trendy",
        VibeProfile {
            genres: &["nu-disco", "indie dance", "deep house", "electro pop"],
            bpm: "105-120",
        },
    ),
    (
        "warm",
        VibeProfile {
            genres: &["acoustic", "folk", "soul", "soft pop"],
            bpm: "70-95",
        },
    ),
    (
        "relaxed",
        VibeProfile {
            genres: &["ambient", "chillout", "acoustic", "downtempo"],
            bpm: "60-85",
        },
    ),
    (
        "zen",
        VibeProfile {
            genres: &["ambient", "nature sounds", "new age", "solo piano"],
            bpm: "50-70",
        },
    ),
    (
        "tropical",
        VibeProfile {
            genres: &["tropical house", "reggae", "latin", "afrobeats"],
            bpm: "100-118",
        },
    ),
    (
        "energetic",
        VibeProfile {
            genres: &["house", "funk", "disco", "pop"],
            bpm: "115-128",
        },
    ),
    (
        "romantic",
        VibeProfile {
            genres: &["jazz ballads", "soul", "bossa nova", "solo piano"],
            bpm: "60-80",
        },
    ),
    (
        "elegant",
        VibeProfile {
            genres: &["classical crossover", "jazz", "lounge"],
            bpm: "70-95",
        },
    ),
    (
        "vibrant",
        VibeProfile {
            genres: &["funk", "disco", "latin", "pop"],
            bpm: "110-125",
        },
    ),
    (
        "cozy",
        VibeProfile {
            genres: &["folk", "acoustic", "indie folk", "soft jazz"],
            bpm: "65-90",
        },
    ),
    (
        "modern",
        VibeProfile {
            genres: &["electronica", "indie pop", "alternative r&b"],
            bpm: "100-118",
        },
    ),
];

pub fn vibe_profile(vibe: &str) -> Option<&'static VibeProfile> {
    VIBE_GENRES
        .iter()
        .find(|(k, _)| *k == vibe)
        .map(|(_, p)| p)
}

/// Keywords the matcher looks for in playlist text per vibe.
pub const VIBE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "sophisticated",
        &["sophisticated", "elegant", "classy", "refined", "jazz", "cocktail"],
    ),
    ("trendy", &["trendy", "modern", "fresh", "stylish", "disco"]),
    ("warm", &["warm", "cozy", "inviting", "mellow", "soft"]),
    ("relaxed", &["relaxed", "chill", "calm", "laid-back", "easy"]),
    ("zen", &["zen", "meditative", "serene", "peaceful", "spa", "nature"]),
    ("tropical", &["tropical", "island", "beach", "summer", "sunny"]),
    ("energetic", &["energetic", "upbeat", "party", "dance", "lively"]),
    ("romantic", &["romantic", "intimate", "candlelight", "smooth"]),
    ("elegant", &["elegant", "graceful", "luxury", "refined"]),
    ("vibrant", &["vibrant", "colorful", "groovy", "funky"]),
    ("cozy", &["cozy", "fireside", "homely", "gentle"]),
    ("modern", &["modern", "contemporary", "sleek", "electronic"]),
];

pub fn vibe_keywords(vibe: &str) -> &'static [&'static str] {
    VIBE_KEYWORDS
        .iter()
        .find(|(k, _)| *k == vibe)
        .map(|(_, kws)| *kws)
        .unwrap_or(&[])
}

/// Venue type → platform playlist categories the matcher targets.
pub const VENUE_CATEGORIES: &[(&str, &[&str])] = &[
    ("hotel-lobby", &["hotel", "lounge"]),
    ("hotel", &["hotel", "lounge"]),
    ("resort", &["hotel", "lounge"]),
    ("bar-lounge", &["bar", "lounge"]),
    ("bar", &["bar", "lounge"]),
    ("rooftop-bar", &["bar", "lounge"]),
    ("beach-club", &["bar", "lounge"]),
    ("cafe", &["cafe"]),
    ("coffee-shop", &["cafe"]),
    ("restaurant", &["restaurant"]),
    ("fine-dining", &["restaurant", "lounge"]),
    ("spa", &["spa"]),
    ("wellness", &["spa"]),
    ("retail", &["store"]),
    ("store", &["store"]),
];

pub fn venue_categories(venue_type: &str) -> &'static [&'static str] {
    VENUE_CATEGORIES
        .iter()
        .find(|(k, _)| *k == venue_type)
        .map(|(_, cats)| *cats)
        .unwrap_or(&[])
}

/// Venue type → genres boosted in the designer brief.
pub const VENUE_GENRE_BOOST: &[(&str, &[&str])] = &[
    ("hotel-lobby", &["lounge", "jazz", "ambient"]),
    ("hotel", &["lounge", "jazz", "ambient"]),
    ("resort", &["tropical house", "lounge", "chillout"]),
    ("bar-lounge", &["deep house", "nu-disco", "funk"]),
    ("bar", &["deep house", "nu-disco", "funk"]),
    ("rooftop-bar", &["deep house", "nu-disco", "tropical house"]),
    ("beach-club", &["tropical house", "latin", "deep house"]),
    ("cafe", &["acoustic", "indie folk", "soft pop"]),
    ("coffee-shop", &["acoustic", "indie folk", "soft pop"]),
    ("restaurant", &["jazz", "soul", "bossa nova"]),
    ("fine-dining", &["jazz", "classical crossover", "soul"]),
    ("spa", &["ambient", "nature sounds", "new age"]),
    ("wellness", &["ambient", "nature sounds", "new age"]),
    ("retail", &["pop", "indie dance", "electro pop"]),
    ("store", &["pop", "indie dance", "electro pop"]),
];

pub fn venue_genre_boost(venue_type: &str) -> &'static [&'static str] {
    VENUE_GENRE_BOOST
        .iter()
        .find(|(k, _)| *k == venue_type)
        .map(|(_, genres)| *genres)
        .unwrap_or(&[])
}

/// `"hotel-lobby"` → `"hotel lobby"` for prose.
pub fn humanize_venue_type(venue_type: &str) -> String {
    venue_type.replace('-', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hotel_lobby_targets_hotel_and_lounge() {
        assert_eq!(venue_categories("hotel-lobby"), &["hotel", "lounge"]);
    }

    #[test]
    fn unknown_venue_type_has_no_categories() {
        assert!(venue_categories("laser-tag-arena").is_empty());
    }

    #[test]
    fn every_vibe_has_keywords_and_genres() {
        for (vibe, profile) in VIBE_GENRES {
            assert!(!profile.genres.is_empty(), "{vibe} has no genres");
            assert!(!vibe_keywords(vibe).is_empty(), "{vibe} has no keywords");
        }
    }

    #[test]
    fn humanize_strips_hyphens() {
        assert_eq!(humanize_venue_type("bar-lounge"), "bar lounge");
    }
}
