/// Source-site constants and the default URL templates.
use crate::types::{Position, Scoring};

pub const DEFAULT_BASE_URL: &str = "https://www.fantasypros.com";

// Placeholders: {base} {season} {scoring} {scoring_query} {position} {adp_slug} {ecr_prefix}
pub const DEFAULT_DRAFT_TEMPLATE: &str = "{base}/nfl/adp/{adp_slug}.php?year={season}";
pub const DEFAULT_CONSENSUS_TEMPLATE: &str =
    "{base}/nfl/rankings/{ecr_prefix}cheatsheets.php?year={season}";
pub const DEFAULT_PERFORMANCE_TEMPLATE: &str =
    "{base}/nfl/stats/{position}.php?scoring={scoring_query}&year={season}";

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Path segments that mark a redirect to an authentication page.
pub const LOGIN_PATH_SEGMENTS: &[&str] = &["login", "signin", "sign-in", "auth"];

/// Inline script assignments that carry the full consensus list.
pub const EMBEDDED_PAYLOAD_VARIABLES: &[&str] = &[
    "ecrData",
    "cheatsheetsData",
    "cheatsheetData",
    "rankingsData",
];

/// Keys under which an embedded payload keeps its record list.
pub const EMBEDDED_RECORD_KEYS: &[&str] = &["players", "rows", "data", "rankings"];

/// Draft platforms that publish their own ADP column.
pub const DRAFT_PLATFORMS: &[&str] = &[
    "ESPN", "YAHOO", "SLEEPER", "CBS", "NFL", "RTSPORTS", "FANTRAX",
];

pub const CONSENSUS_PREDICTOR: &str = "ECR";
pub const DRAFT_AVERAGE_PREDICTOR: &str = "ADP_AVG";

/// ADP page slug, e.g. `ppr-wr`, `half-point-ppr-overall` or plain `qb` for standard.
pub fn adp_slug(scoring: Scoring, position: Position) -> String {
    match scoring {
        Scoring::Ppr => format!("ppr-{}", position.as_slug()),
        Scoring::Half => format!("half-point-ppr-{}", position.as_slug()),
        Scoring::Std => position.as_slug().to_string(),
    }
}

/// Cheatsheet page prefix for a scoring format.
pub fn ecr_prefix(scoring: Scoring) -> &'static str {
    match scoring {
        Scoring::Ppr => "ppr-",
        Scoring::Half => "half-point-ppr-",
        Scoring::Std => "",
    }
}

pub fn draft_predictor_name(platform: &str) -> String {
    format!("ADP_{}", platform.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(adp_slug(Scoring::Ppr, Position::Wr), "ppr-wr");
        assert_eq!(adp_slug(Scoring::Half, Position::Overall), "half-point-ppr-overall");
        assert_eq!(adp_slug(Scoring::Std, Position::Qb), "qb");
        assert_eq!(ecr_prefix(Scoring::Half), "half-point-ppr-");
        assert_eq!(draft_predictor_name("espn"), "ADP_ESPN");
    }
}
