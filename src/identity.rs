use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static TRAILING_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(.*?\)\s*$").unwrap());
static DST_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+D/?ST\s*$").unwrap());
static GENERATIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(JR\.?|SR\.?|III|II)\b").unwrap());
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z '\-]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static TEAM_ABBREVIATIONS: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let names: &[(&str, &str)] = &[
        ("ARIZONA CARDINALS", "ARI"),
        ("ATLANTA FALCONS", "ATL"),
        ("BALTIMORE RAVENS", "BAL"),
        ("BUFFALO BILLS", "BUF"),
        ("CAROLINA PANTHERS", "CAR"),
        ("CHICAGO BEARS", "CHI"),
        ("CINCINNATI BENGALS", "CIN"),
        ("CLEVELAND BROWNS", "CLE"),
        ("DALLAS COWBOYS", "DAL"),
        ("DENVER BRONCOS", "DEN"),
        ("DETROIT LIONS", "DET"),
        ("GREEN BAY PACKERS", "GB"),
        ("HOUSTON TEXANS", "HOU"),
        ("INDIANAPOLIS COLTS", "IND"),
        ("JACKSONVILLE JAGUARS", "JAX"),
        ("KANSAS CITY CHIEFS", "KC"),
        ("LAS VEGAS RAIDERS", "LV"),
        ("OAKLAND RAIDERS", "OAK"),
        ("LOS ANGELES CHARGERS", "LAC"),
        ("SAN DIEGO CHARGERS", "SD"),
        ("LOS ANGELES RAMS", "LAR"),
        ("ST. LOUIS RAMS", "STL"),
        ("MIAMI DOLPHINS", "MIA"),
        ("MINNESOTA VIKINGS", "MIN"),
        ("NEW ENGLAND PATRIOTS", "NE"),
        ("NEW ORLEANS SAINTS", "NO"),
        ("NEW YORK GIANTS", "NYG"),
        ("NEW YORK JETS", "NYJ"),
        ("PHILADELPHIA EAGLES", "PHI"),
        ("PITTSBURGH STEELERS", "PIT"),
        ("SAN FRANCISCO 49ERS", "SF"),
        ("SEATTLE SEAHAWKS", "SEA"),
        ("TAMPA BAY BUCCANEERS", "TB"),
        ("TENNESSEE TITANS", "TEN"),
        ("WASHINGTON COMMANDERS", "WAS"),
        ("WASHINGTON FOOTBALL TEAM", "WAS"),
        ("WASHINGTON REDSKINS", "WAS"),
    ];
    let mut map: HashMap<String, &'static str> =
        names.iter().map(|(n, a)| (n.to_string(), *a)).collect();
    for (_, abbr) in names {
        map.insert(abbr.to_string(), abbr);
    }
    map
});

/// Stable join key for a displayed player name.
///
/// Drops a trailing parenthetical, a trailing D/ST marker, generational
/// suffixes and any character outside letters, apostrophe, hyphen and space,
/// then collapses whitespace and lowercases. The pass is repeated until the
/// output stops changing, so `derive_key(derive_key(x)) == derive_key(x)`.
pub fn derive_key(name: &str) -> String {
    let mut current = clean_once(name);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(name: &str) -> String {
    let s = TRAILING_PAREN.replace(name.trim(), "");
    let s = DST_SUFFIX.replace(&s, "");
    let s = GENERATIONAL.replace_all(&s, "");
    let s = DISALLOWED.replace_all(&s, "");
    WHITESPACE.replace_all(s.trim(), " ").to_lowercase()
}

/// Franchise abbreviation for a full team name, current or relocated.
/// Abbreviations map to themselves; anything unknown comes back upper-cased.
pub fn team_abbreviation(name: &str) -> String {
    let upper = WHITESPACE
        .replace_all(name.trim(), " ")
        .to_uppercase();
    let upper = DST_SUFFIX.replace(&upper, "").into_owned();
    match TEAM_ABBREVIATIONS.get(&upper) {
        Some(abbr) => abbr.to_string(),
        None => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_decorations() {
        assert_eq!(derive_key("Patrick Mahomes II"), "patrick mahomes");
        assert_eq!(derive_key("Odell Beckham Jr."), "odell beckham");
        assert_eq!(derive_key("Josh Allen (BUF)"), "josh allen");
        assert_eq!(derive_key("Ja'Marr  Chase"), "ja'marr chase");
        assert_eq!(derive_key("Amon-Ra St. Brown"), "amon-ra st brown");
        assert_eq!(derive_key("Buffalo Bills D/ST"), "buffalo bills");
        assert_eq!(derive_key("D.J. Moore"), "dj moore");
        assert_eq!(derive_key(""), "");
    }

    #[test]
    fn idempotent_on_awkward_inputs() {
        for raw in [
            "I.I",
            "A. Back (KC)",
            "Marvin Harrison Jr. (ARI)",
            "  X  (y) (z) ",
            "Jr.Jr.",
            "Kenneth Walker III",
            "San Francisco 49ers DST",
            "Ñandú (FA)",
            "Bills DST DST",
        ] {
            let once = derive_key(raw);
            assert_eq!(derive_key(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn team_names_map_to_abbreviations() {
        assert_eq!(team_abbreviation("Kansas City Chiefs"), "KC");
        assert_eq!(team_abbreviation("san diego  chargers"), "SD");
        assert_eq!(team_abbreviation("Washington Football Team"), "WAS");
        assert_eq!(team_abbreviation("Buffalo Bills DST"), "BUF");
        assert_eq!(team_abbreviation("jax"), "JAX");
        assert_eq!(team_abbreviation("Springfield Atoms"), "SPRINGFIELD ATOMS");
    }
}
