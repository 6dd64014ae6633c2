use std::time::Duration;

use chrono::Utc;
use clap::Subcommand;
use prediction_contest_core::rescore::{self, RescoreReport};
use prediction_contest_core::{
    bonus, bracket, cutoff, submit, Awards, CutoffRules, MatchId, Outcome, PlayerId,
    Standings, TeamId, TournamentId,
};

use crate::store::{self, Store};
use crate::Error;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create all missing tables.
    Migrate,
    /// Record the result of a match and propagate it into scores, ranks and the bracket.
    #[command(name = "result")]
    Record {
        match_id: MatchId,
        #[arg(long)]
        winner: TeamId,
        #[arg(long)]
        player_of_match: PlayerId,
        #[arg(long)]
        batted_first: TeamId,
        #[arg(long)]
        runs: u32,
        #[arg(long)]
        wickets: u8,
        /// The match was played with reduced overs.
        #[arg(long)]
        shortened: bool,
    },
    /// Mark a match as cancelled. A match with a result can only be cancelled while no later
    /// match completed.
    Cancel { match_id: MatchId },
    /// Rescore all predictions of a completed match.
    Rescore {
        match_id: MatchId,
        /// Reject the rescore if a later match already completed.
        #[arg(long)]
        correction: bool,
    },
    /// Rescore every completed match of a tournament.
    Recompute { tournament: TournamentId },
    /// Fill all playoff slots that can be decided.
    Advance { tournament: TournamentId },
    /// Close a tournament and apply the end-of-tournament bonus.
    Bonus {
        tournament: TournamentId,
        #[arg(long)]
        player_of_tournament: Option<PlayerId>,
        #[arg(long)]
        top_run_scorer: Option<PlayerId>,
        #[arg(long)]
        top_wicket_taker: Option<PlayerId>,
    },
    /// Activate all due scheduled predictions.
    Activate {
        /// Keep running and sweep every SECS seconds.
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Show the prediction deadline of a match.
    Cutoff { match_id: MatchId },
    /// Show the league table.
    Standings { tournament: TournamentId },
    /// Show the ranking of all predictors.
    Leaderboard { tournament: TournamentId },
}

impl Command {
    pub async fn run(self, store: &Store, rules: &CutoffRules) -> Result<(), Error> {
        let now = Utc::now();

        match self {
            Self::Migrate => store::migrate(store).await?,
            Self::Record {
                match_id,
                winner,
                player_of_match,
                batted_first,
                runs,
                wickets,
                shortened,
            } => {
                let outcome = Outcome {
                    winner,
                    player_of_match,
                    batted_first,
                    first_innings_runs: runs,
                    first_innings_wickets: wickets,
                    shortened,
                };

                let report = rescore::record_result(store, match_id, outcome, now).await?;
                print_report(&report);
            }
            Self::Cancel { match_id } => {
                rescore::cancel_match(store, match_id, now).await?;
                println!("Cancelled match {}", match_id);
            }
            Self::Rescore {
                match_id,
                correction,
            } => {
                let report = rescore::rescore_match(store, match_id, correction, now).await?;
                print_report(&report);
            }
            Self::Recompute { tournament } => {
                let report = rescore::recompute_tournament(store, tournament, now).await?;
                print_report(&report);
            }
            Self::Advance { tournament } => {
                let plan = bracket::advance_bracket(store, tournament).await?;
                if plan.is_empty() {
                    println!("Nothing to advance");
                }

                for assignment in plan {
                    println!(
                        "Match {} position {}: team {}",
                        assignment.match_id, assignment.position, assignment.team
                    );
                }
            }
            Self::Bonus {
                tournament,
                player_of_tournament,
                top_run_scorer,
                top_wicket_taker,
            } => {
                let awards = Awards {
                    player_of_tournament,
                    top_run_scorer,
                    top_wicket_taker,
                };

                let results =
                    bonus::apply_tournament_bonuses(store, tournament, awards, now).await?;
                println!("Champion: team {}", results.champion);
            }
            Self::Activate { watch: None } => {
                let activated = submit::activate_due(store, now).await?;
                println!("Activated {} predictions", activated);
            }
            Self::Activate {
                watch: Some(secs),
            } => {
                let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(err) = submit::activate_due(store, Utc::now()).await {
                                log::error!("Activation sweep failed: {}", err);
                            }
                        }
                        _ = tokio::signal::ctrl_c() => {
                            log::info!("Received SIGINT, stopping");
                            break;
                        }
                    }
                }
            }
            Self::Cutoff { match_id } => {
                let m = store
                    .fixtures()
                    .get(match_id)
                    .await?
                    .ok_or(prediction_contest_core::Error::MatchNotFound(match_id))?;
                let calendar = store.fixtures().list(m.tournament).await?;

                let decision = cutoff::resolve(rules, now, &calendar, &m)?;

                println!("Match {} ({})", m.number, m.start);
                println!("Deadline: {}", decision.deadline);
                match decision.reason {
                    Some(reason) => println!("Locked: {}", reason),
                    None => println!("Open for edits: {}", decision.open),
                }
                if decision.closing_soon(now, rules.reminder_lead) {
                    println!("Closing soon");
                }
                println!("Scheduled predictions activate at {}", decision.activation_at);
            }
            Self::Standings { tournament } => {
                let teams = store.tournaments().teams(tournament).await?;
                let matches = store.fixtures().list(tournament).await?;

                let standings = Standings::from_matches(&teams, &matches)?;

                println!("# | Team | P | W | L | Pts");
                for (index, entry) in standings.iter().enumerate() {
                    println!(
                        "{} | {} | {} | {} | {} | {}",
                        index + 1,
                        entry.name,
                        entry.played,
                        entry.won,
                        entry.lost,
                        entry.points
                    );
                }
            }
            Self::Leaderboard { tournament } => {
                let mut entries = store.season_entries(tournament).list().await?;
                entries.sort_by_key(|entry| entry.rank);

                println!("# | User | Points | Penalties");
                for entry in entries {
                    println!(
                        "{} | {} | {} | {}",
                        entry.rank, entry.user, entry.totals.points, entry.totals.penalties
                    );
                }
            }
        }

        Ok(())
    }
}

fn print_report(report: &RescoreReport) {
    println!(
        "Scored {} predictions, cleared {}",
        report.scored, report.cleared
    );
}
