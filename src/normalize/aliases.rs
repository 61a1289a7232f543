use crate::constants::DRAFT_PLATFORMS;
use crate::types::SourceKind;

/// A canonical field a table column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    PlayerName,
    Team,
    Position,
    ByeWeek,
    DraftRank,
    DraftValue,
    /// Per-platform ADP column, carrying the platform label.
    Platform(&'static str),
    ConsensusRank,
    ConsensusValue,
    Tier,
    PerformanceRank,
    PerformanceScore,
    PointsPerGame,
    Games,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::PlayerName => "player_name",
            Field::Team => "team",
            Field::Position => "position",
            Field::ByeWeek => "bye_week",
            Field::DraftRank => "draft_rank",
            Field::DraftValue => "draft_value",
            Field::Platform(_) => "draft_source",
            Field::ConsensusRank => "consensus_rank",
            Field::ConsensusValue => "consensus_value",
            Field::Tier => "tier",
            Field::PerformanceRank => "performance_rank",
            Field::PerformanceScore => "performance_score",
            Field::PointsPerGame => "points_per_game",
            Field::Games => "games",
        }
    }
}

/// Header vocabulary of one field.
///
/// `exact` are literal canonical headers, `aliases` are compared after
/// [`normalize_header`], and `words` enable whole-word containment (identity
/// fields only).
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub field: Field,
    pub exact: &'static [&'static str],
    pub aliases: Vec<String>,
    pub words: &'static [&'static str],
}

impl FieldSpec {
    fn new(field: Field, exact: &'static [&'static str], aliases: &[&'static str]) -> Self {
        Self {
            field,
            exact,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            words: &[],
        }
    }

    fn with_words(mut self, words: &'static [&'static str]) -> Self {
        self.words = words;
        self
    }
}

/// Lowercase and drop everything but ASCII letters and digits.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Field vocabulary for a source kind, identity fields first.
pub fn field_specs(kind: SourceKind) -> Vec<FieldSpec> {
    let mut specs = vec![
        FieldSpec::new(
            Field::PlayerName,
            &["player_name"],
            &["player", "name", "playername", "fullname"],
        )
        .with_words(&["PLAYER", "NAME"]),
        FieldSpec::new(
            Field::Team,
            &["team"],
            &["team", "tm", "tmabbr", "teamabbr", "teamid", "playerteamid"],
        )
        .with_words(&["TEAM"]),
        FieldSpec::new(
            Field::Position,
            &["position"],
            &["pos", "position", "positionid", "playerpositionid"],
        )
        .with_words(&["POS", "POSITION"]),
        FieldSpec::new(
            Field::ByeWeek,
            &["bye_week"],
            &["bye", "byeweek", "playerbyeweek"],
        ),
    ];

    match kind {
        SourceKind::DraftPosition => {
            specs.push(FieldSpec::new(
                Field::DraftRank,
                &["draft_rank"],
                &["rank", "rk", "overall", "ovr", "adprank"],
            ));
            specs.push(FieldSpec::new(
                Field::DraftValue,
                &["draft_value", "adp"],
                &["avg", "adp", "average", "avgadp", "averagedraftposition"],
            ));
            for &platform in DRAFT_PLATFORMS {
                specs.push(FieldSpec {
                    field: Field::Platform(platform),
                    exact: &[],
                    aliases: vec![normalize_header(platform)],
                    words: &[],
                });
            }
        }
        SourceKind::ConsensusRanking => {
            specs.push(FieldSpec::new(
                Field::ConsensusRank,
                &["consensus_rank", "ecr_rank"],
                &["rk", "rank", "ecr", "ecrrank", "rankecr", "overallrank"],
            ));
            specs.push(FieldSpec::new(
                Field::ConsensusValue,
                &["consensus_value"],
                &["avg", "avgrank", "rankave", "rankavg", "average", "ecravg"],
            ));
            specs.push(FieldSpec::new(Field::Tier, &["tier"], &["tier", "tiers"]));
        }
        SourceKind::Performance => {
            specs.push(FieldSpec::new(
                Field::PerformanceRank,
                &["performance_rank"],
                &["rank", "rk", "overallrank"],
            ));
            specs.push(FieldSpec::new(
                Field::PerformanceScore,
                &["performance_score", "fantasy_points"],
                &["fpts", "fantasypoints", "fantasypts", "points", "pts", "totalpoints"],
            ));
            specs.push(FieldSpec::new(
                Field::PointsPerGame,
                &["points_per_game", "fantasy_points_per_game"],
                &["fptsg", "ppg", "pointspergame", "fantasypointspergame", "fptspergame"],
            ));
            specs.push(FieldSpec::new(
                Field::Games,
                &["games"],
                &["g", "gp", "games", "gamesplayed"],
            ));
        }
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header("FPTS/G"), "fptsg");
        assert_eq!(normalize_header("Player Team (Bye)"), "playerteambye");
        assert_eq!(normalize_header("rank_ecr"), "rankecr");
        assert_eq!(normalize_header("AVG."), "avg");
    }

    #[test]
    fn every_platform_has_an_alias() {
        let specs = field_specs(SourceKind::DraftPosition);
        for &platform in DRAFT_PLATFORMS {
            let spec = specs
                .iter()
                .find(|s| s.field == Field::Platform(platform))
                .unwrap();
            assert_eq!(spec.aliases, vec![platform.to_ascii_lowercase()]);
        }
    }
}
