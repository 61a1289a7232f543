#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rank_scraper::normalize::normalize;
    use rank_scraper::rank::{ensure_rank, RankField};
    use rank_scraper::resolve::resolve;
    use rank_scraper::types::{Position, RawDocument, ResolveStrategy, SourceKind};
    use std::fs;

    fn fixture(name: &str) -> RawDocument {
        let path = format!("{}/tests/resources/{}", env!("CARGO_MANIFEST_DIR"), name);
        let body = fs::read_to_string(&path).unwrap();
        RawDocument {
            url: "https://www.example.com/nfl/stats/wr.php?scoring=PPR&year=2023".into(),
            final_url: "https://www.example.com/nfl/stats/wr.php?scoring=PPR&year=2023".into(),
            status: 200,
            body,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn main_table_wins_over_sidebar_widget() {
        let doc = fixture("wr_stats_with_sidebar.html");
        let table = resolve(&doc, SourceKind::Performance, 15).unwrap();

        assert_eq!(table.strategy, ResolveStrategy::HeuristicScan);
        assert_eq!(table.row_count(), 40);
        assert_eq!(
            table.columns,
            vec!["Rank", "Player", "MISC_G", "MISC_FPTS", "MISC_FPTS/G"]
        );
    }

    #[test]
    fn resolved_stats_normalize_and_rank() {
        let doc = fixture("wr_stats_with_sidebar.html");
        let table = resolve(&doc, SourceKind::Performance, 15).unwrap();
        let mut records = normalize(&table, SourceKind::Performance).unwrap();
        ensure_rank(&mut records, RankField::Performance);

        assert_eq!(records.len(), 40);
        let first = &records[0];
        assert_eq!(first.player_name, "Adam Receiver");
        assert_eq!(first.player_key, "adam receiver");
        assert_eq!(first.team.as_deref(), Some("KC"));
        assert_eq!(first.games, Some(17.0));
        assert_eq!(first.performance_score, Some(320.4));
        assert_eq!(first.points_per_game, Some(18.8));
        assert_eq!(first.performance_rank, Some(1));
        assert!(first.extras.is_empty());
        // Stats pages carry no position column; the page scope supplies it later.
        assert_eq!(first.position, None::<Position>);

        let mut ranks: Vec<u32> = records.iter().filter_map(|r| r.performance_rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (1..=40).collect::<Vec<u32>>());
    }
}
