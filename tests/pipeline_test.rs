#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rank_scraper::app::ports::{HttpClientPort, HttpGetResult, TransportError};
    use rank_scraper::config::{FetchConfig, RunConfig};
    use rank_scraper::fetch::Fetcher;
    use rank_scraper::infra::throttle::HostThrottle;
    use rank_scraper::output::write_report;
    use rank_scraper::pipeline::{Pipeline, PartitionOutcome};
    use rank_scraper::types::{Partition, Position, Scoring, SourceKind};
    use std::collections::HashMap;
    use std::sync::Arc;

    const BASE: &str = "https://fixture.test";
    const CONSENSUS_URL: &str = "https://fixture.test/nfl/rankings/ppr-cheatsheets.php?year=2023";
    const WR_DRAFT_URL: &str = "https://fixture.test/nfl/adp/ppr-wr.php?year=2023";
    const WR_STATS_URL: &str = "https://fixture.test/nfl/stats/wr.php?scoring=PPR&year=2023";

    const RECEIVERS: &[(&str, &str)] = &[
        ("Adam Wideout", "KC"),
        ("Brian Flanker", "DAL"),
        ("Calvin Split", "MIA"),
        ("Derek Slot", "SF"),
        ("Ethan Deep", "BUF"),
        ("Frank Route", "CIN"),
        ("George Catch", "DET"),
        ("Henry Hands", "PHI"),
    ];
    const TIGHT_ENDS: &[(&str, &str)] = &[
        ("Isaac Blocker", "KC"),
        ("Jacob Seam", "SF"),
        ("Kevin Inline", "BAL"),
        ("Louis Wing", "LV"),
    ];

    /// Serves fixed pages by URL; anything else is a 404.
    struct FixtureHttp {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl HttpClientPort for FixtureHttp {
        async fn get(&self, url: &str) -> Result<HttpGetResult, TransportError> {
            let (status, body) = match self.pages.get(url) {
                Some(body) => (200, body.clone()),
                None => (404, String::from("<html><body>Not found</body></html>")),
            };
            Ok(HttpGetResult {
                status,
                final_url: url.to_string(),
                bytes: body.into_bytes(),
                retry_after: None,
            })
        }
    }

    fn consensus_page() -> String {
        let records: Vec<String> = consensus_order()
            .iter()
            .enumerate()
            .map(|(i, (pos, name, team))| {
                format!(
                    r#"{{"player_name": "{}", "player_team_id": "{}", "player_position_id": "{}", "rank_ecr": {}}}"#,
                    name,
                    team,
                    pos,
                    i + 1
                )
            })
            .collect();
        format!(
            "<html><head><script>var ecrData = {{\"players\": [{}]}};</script></head><body></body></html>",
            records.join(", ")
        )
    }

    fn wr_draft_page() -> String {
        let rows: String = RECEIVERS
            .iter()
            .enumerate()
            .map(|(i, (name, team))| {
                // Sleeper swaps the first two receivers.
                let sleeper = match i {
                    0 => 2,
                    1 => 1,
                    _ => i + 1,
                };
                format!(
                    "<tr><td>{}</td><td>{} {} ({})</td><td>WR{}</td><td>{}</td><td>{}</td><td>{:.1}</td></tr>",
                    i + 1,
                    name,
                    team,
                    7 + i % 6,
                    i + 1,
                    i + 1,
                    sleeper,
                    i as f64 * 8.0 + 5.5
                )
            })
            .collect();
        format!(
            "<html><body><table id=\"data\"><thead><tr><th>Rank</th><th>Player Team (Bye)</th><th>POS</th><th>ESPN</th><th>Sleeper</th><th>AVG</th></tr></thead><tbody>{}</tbody></table></body></html>",
            rows
        )
    }

    fn wr_stats_page(with_points: bool) -> String {
        let header = if with_points {
            "<th>Rank</th><th>Player</th><th>G</th><th>FPTS</th><th>FPTS/G</th>"
        } else {
            "<th>Player</th><th>Team</th><th>G</th>"
        };
        let rows: String = RECEIVERS
            .iter()
            .enumerate()
            .map(|(i, (name, team))| {
                let points = 300.0 - i as f64 * 20.0;
                if with_points {
                    format!(
                        "<tr><td>{}</td><td>{} ({})</td><td>17</td><td>{:.1}</td><td>{:.1}</td></tr>",
                        i + 1,
                        name,
                        team,
                        points,
                        points / 17.0
                    )
                } else {
                    format!("<tr><td>{}</td><td>{}</td><td>17</td></tr>", name, team)
                }
            })
            .collect();
        format!(
            "<html><body><table id=\"data\"><thead><tr>{}</tr></thead><tbody>{}</tbody></table></body></html>",
            header, rows
        )
    }

    /// Overall consensus order. Positions interleave so the positional
    /// re-rank has work to do.
    fn consensus_order() -> Vec<(&'static str, &'static str, &'static str)> {
        let mut players = Vec::new();
        for (i, &(name, team)) in RECEIVERS.iter().enumerate() {
            players.push(("WR", name, team));
            if let Some(&(name, team)) = TIGHT_ENDS.get(i) {
                players.push(("TE", name, team));
            }
        }
        players
    }

    fn consensus_csv() -> String {
        let mut csv = String::from("RK,PLAYER NAME,TEAM,POS\n");
        for (i, (pos, name, team)) in consensus_order().iter().enumerate() {
            csv.push_str(&format!("{},{},{},{}{}\n", i + 1, name, team, pos, i + 1));
        }
        csv
    }

    fn stats_page(players: &[(String, f64)]) -> String {
        let rows: String = players
            .iter()
            .enumerate()
            .map(|(i, (name, points))| {
                format!(
                    "<tr><td>{}</td><td>{} (KC)</td><td>17</td><td>{:.1}</td></tr>",
                    i + 1,
                    name,
                    points
                )
            })
            .collect();
        format!(
            "<html><body><table id=\"data\"><thead><tr><th>Rank</th><th>Player</th><th>G</th><th>FPTS</th></tr></thead><tbody>{}</tbody></table></body></html>",
            rows
        )
    }

    fn config(strict_schema: bool, output_dir: std::path::PathBuf) -> RunConfig {
        RunConfig {
            seasons: vec![2023],
            scorings: vec![Scoring::Ppr],
            positions: vec![Position::Wr, Position::Te],
            base_url: BASE.to_string(),
            min_table_rows: 5,
            output_dir,
            strict_schema,
            fetch: FetchConfig {
                max_attempts: 2,
                backoff_base_ms: 1,
                delay_min_ms: 0,
                delay_max_ms: 0,
                ..FetchConfig::default()
            },
            ..RunConfig::default()
        }
    }

    fn pipeline(config: RunConfig, pages: Vec<(&str, String)>) -> Pipeline {
        let http = Arc::new(FixtureHttp {
            pages: pages
                .into_iter()
                .map(|(url, body)| (url.to_string(), body))
                .collect(),
        });
        let fetcher = Fetcher::new(http, Arc::new(HostThrottle::disabled()), &config.fetch);
        Pipeline::new(config, fetcher)
    }

    #[tokio::test]
    async fn joins_sources_and_skips_unavailable_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            config(true, dir.path().to_path_buf()),
            vec![
                (CONSENSUS_URL, consensus_page()),
                (WR_DRAFT_URL, wr_draft_page()),
                (WR_STATS_URL, wr_stats_page(true)),
            ],
        );

        let report = pipeline.run().await.unwrap();
        assert!(!report.aborted);
        assert_eq!(report.outcomes.len(), 2);

        let wr = Partition::new(2023, Scoring::Ppr, Position::Wr);
        let te = Partition::new(2023, Scoring::Ppr, Position::Te);
        assert_eq!(
            report.outcomes[0],
            PartitionOutcome::Success {
                partition: wr,
                joined: RECEIVERS.len(),
                predictors: 4,
            }
        );
        assert!(matches!(
            &report.outcomes[1],
            PartitionOutcome::Skipped { partition, .. } if *partition == te
        ));

        let mut predictors: Vec<&str> = report
            .metrics
            .iter()
            .map(|m| m.predictor_name.as_str())
            .collect();
        predictors.sort_unstable();
        assert_eq!(predictors, vec!["ADP_AVG", "ADP_ESPN", "ADP_SLEEPER", "ECR"]);

        // Consensus and final order agree exactly once receivers are re-ranked among themselves.
        let ecr = report
            .metrics
            .iter()
            .find(|m| m.predictor_name == "ECR")
            .unwrap();
        assert_eq!(ecr.sample_size, RECEIVERS.len());
        assert!((ecr.rank_correlation.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(ecr.mean_abs_error, Some(0.0));

        let sleeper = report
            .metrics
            .iter()
            .find(|m| m.predictor_name == "ADP_SLEEPER")
            .unwrap();
        assert!(sleeper.rank_correlation.unwrap() < 1.0);
        assert!((sleeper.mean_abs_error.unwrap() - 0.25).abs() < 1e-9);

        let (_, joined) = &report.joined[0];
        let top = &joined[0];
        assert_eq!(top.player_name, "Adam Wideout");
        assert_eq!(top.team.as_deref(), Some("KC"));
        assert_eq!(top.performance_rank, 1);

        let summary = write_report(&report, dir.path()).unwrap();
        let metrics_file = summary.metrics_file.unwrap();
        assert!(metrics_file.ends_with("metrics.csv"));
        assert!(metrics_file.exists());
        assert_eq!(summary.joined_files.len(), 1);
        assert_eq!(summary.canonical_files.len(), 3);
        assert_eq!(summary.extremes_files.len(), 1);
        assert!(summary.extremes_files[0].ends_with("extremes/extremes_2023_ppr_wr.csv"));
    }

    #[tokio::test]
    async fn unmappable_header_stops_a_strict_run() {
        let dir = tempfile::tempdir().unwrap();
        let pages = || {
            vec![
                (CONSENSUS_URL, consensus_page()),
                (WR_DRAFT_URL, wr_draft_page()),
                (WR_STATS_URL, wr_stats_page(false)),
            ]
        };

        let strict = pipeline(config(true, dir.path().to_path_buf()), pages());
        let report = strict.run().await.unwrap();
        assert!(report.aborted);
        assert_eq!(report.outcomes.len(), 1);
        assert!(matches!(
            report.outcomes[0],
            PartitionOutcome::Failed { schema: true, .. }
        ));
        assert!(report.metrics.is_empty());

        let lenient = pipeline(config(false, dir.path().to_path_buf()), pages());
        let report = lenient.run().await.unwrap();
        assert!(!report.aborted);
        assert_eq!(report.outcomes.len(), 2);
        assert!(matches!(
            report.outcomes[1],
            PartitionOutcome::Skipped { .. }
        ));
    }

    #[tokio::test]
    async fn overall_performance_is_the_reranked_union_of_position_pages() {
        let dir = tempfile::tempdir().unwrap();
        let first = ["Alan", "Brett", "Colin"];
        let surname = ["Passer", "Rusher", "Catcher", "Tightend", "Kicker", "Defense"];
        let mut urls = Vec::new();
        for (p, position) in Position::INDIVIDUAL.iter().enumerate() {
            // Every page ranks its own players 1..3; points interleave across positions.
            let players: Vec<(String, f64)> = (0..first.len())
                .map(|i| {
                    let name = format!("{} {}", first[i], surname[p]);
                    (name, 300.0 - ((i * 6 + p) as f64) * 5.0)
                })
                .collect();
            urls.push((
                format!(
                    "{}/nfl/stats/{}.php?scoring=PPR&year=2023",
                    BASE,
                    position.as_slug()
                ),
                stats_page(&players),
            ));
        }
        let pages: Vec<(&str, String)> = urls.iter().map(|(u, b)| (u.as_str(), b.clone())).collect();

        let mut cfg = config(true, dir.path().to_path_buf());
        cfg.min_table_rows = 2;
        let pipeline = pipeline(cfg, pages);
        let table = pipeline
            .canonical_table(
                SourceKind::Performance,
                Partition::new(2023, Scoring::Ppr, Position::Overall),
            )
            .await
            .unwrap();

        assert_eq!(table.records.len(), 18);
        let ranks: Vec<u32> = table.records.iter().filter_map(|r| r.performance_rank).collect();
        assert_eq!(ranks, (1..=18).collect::<Vec<u32>>());
        assert!(table
            .records
            .windows(2)
            .all(|w| w[0].performance_score > w[1].performance_score));

        assert_eq!(table.records[0].player_name, "Alan Passer");
        assert_eq!(table.records[0].position, Some(Position::Qb));
        assert_eq!(table.records[1].player_name, "Alan Rusher");
        assert_eq!(table.records[1].position, Some(Position::Rb));
        assert_eq!(table.records[17].player_name, "Colin Defense");
        assert_eq!(table.records[17].position, Some(Position::Dst));
    }

    #[tokio::test]
    async fn consensus_falls_back_to_linked_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let export_url = "https://fixture.test/nfl/rankings/export.php?type=csv&year=2023";
        let landing = r#"<html><body><p>Rankings load in your browser.</p>
            <a href="/nfl/rankings/export.php?type=csv&amp;year=2023">Export CSV</a></body></html>"#;

        let pipeline = pipeline(
            config(true, dir.path().to_path_buf()),
            vec![
                (CONSENSUS_URL, landing.to_string()),
                (export_url, consensus_csv()),
                (WR_DRAFT_URL, wr_draft_page()),
                (WR_STATS_URL, wr_stats_page(true)),
            ],
        );

        let wr = Partition::new(2023, Scoring::Ppr, Position::Wr);
        let consensus = pipeline
            .canonical_table(SourceKind::ConsensusRanking, wr)
            .await
            .unwrap();
        assert_eq!(consensus.source_url, export_url);
        assert_eq!(consensus.records.len(), RECEIVERS.len());
        let ranks: Vec<u32> = consensus.records.iter().filter_map(|r| r.consensus_rank).collect();
        assert_eq!(ranks, (1..=RECEIVERS.len() as u32).collect::<Vec<u32>>());
        assert_eq!(consensus.records[1].player_name, "Brian Flanker");

        let report = pipeline.run().await.unwrap();
        assert!(matches!(
            report.outcomes[0],
            PartitionOutcome::Success { joined, .. } if joined == RECEIVERS.len()
        ));
        assert!(report
            .canonical
            .iter()
            .any(|t| t.kind == SourceKind::ConsensusRanking && t.source_url == export_url));
        let ecr = report.metrics.iter().find(|m| m.predictor_name == "ECR").unwrap();
        assert_eq!(ecr.mean_abs_error, Some(0.0));
    }
}
