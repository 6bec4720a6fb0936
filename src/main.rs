use std::fs::File;
use std::io::{self, BufRead, Write};

use chrono::{FixedOffset, Utc};
use prettytable::{row, Table};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use club_match_board::api::HttpClubApi;
use club_match_board::board::{Board, BoardConfig, FinishOutcome, PairingOutcome};
use club_match_board::card::{MatchCard, MatchCategory};
use club_match_board::result_codec::{ResultSymbol, Side};
use club_match_board::utils::prompt::{CoachingOutcome, Decision, OperatorPrompt};
use club_match_board::ClubError;

/// Confirmation gates answered on the terminal.
struct ConsolePrompt;

impl ConsolePrompt {
    fn ask(question: &str) -> String {
        print!("{} ", question);
        let _ = io::stdout().flush();
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        line.trim().to_lowercase()
    }
}

impl OperatorPrompt for ConsolePrompt {
    async fn confirm_repeat_pairing(&self, nth: u32, name1: &str, name2: &str) -> Decision {
        // An empty answer proceeds, matching the dismissal behavior of the
        // gate.
        let answer = Self::ask(&format!(
            "{} and {} already played today (match #{}). Play anyway? [Y/n]",
            name1, name2, nth
        ));
        if answer == "n" {
            Decision::Cancel
        } else {
            Decision::Proceed
        }
    }

    async fn confirm_promotion(
        &self,
        name: &str,
        next_grade: &str,
        reason: Option<&str>,
    ) -> Decision {
        let reason = reason.unwrap_or("promotion requirements");
        let answer = Self::ask(&format!(
            "{} met {}. Promote to {}? [y/N]",
            name, reason, next_grade
        ));
        if answer == "y" {
            Decision::Proceed
        } else {
            Decision::Cancel
        }
    }

    async fn coaching_outcome(&self, name1: &str, name2: &str) -> CoachingOutcome {
        let answer = Self::ask(&format!(
            "Coaching match {} vs {}: [r]ecord, [d]iscard or [k]eep playing?",
            name1, name2
        ));
        match answer.as_str() {
            "r" => CoachingOutcome::Record,
            "d" => CoachingOutcome::Discard,
            _ => CoachingOutcome::KeepPlaying,
        }
    }
}

/// Today's date for the club, which runs on Japan time.
fn club_today() -> String {
    let jst = FixedOffset::east_opt(9 * 3600).expect("fixed JST offset");
    Utc::now().with_timezone(&jst).format("%Y-%m-%d").to_string()
}

fn parse_side(token: &str) -> Option<Side> {
    match token {
        "1" => Some(Side::P1),
        "2" => Some(Side::P2),
        _ => None,
    }
}

fn print_roster(board: &Board<HttpClubApi, ConsolePrompt>) {
    let mut table = Table::new();
    table.add_row(row!["Code", "Name", "Kana", "Grade", "Type"]);
    for p in board.unassigned() {
        table.add_row(row![
            p.member_code.as_deref().unwrap_or(&p.id),
            p.name,
            p.kana,
            p.grade,
            p.member_type
        ]);
    }
    table.printstd();
}

fn card_seat(card: &MatchCard, side: Side) -> String {
    match card.participant_id(side) {
        Some(id) => {
            let result = card
                .result(side)
                .map(|r| format!(" {}", r))
                .unwrap_or_default();
            format!("{}{}", id, result)
        }
        None => "-".to_string(),
    }
}

fn print_cards(board: &Board<HttpClubApi, ConsolePrompt>) {
    let mut table = Table::new();
    table.add_row(row!["Card", "Status", "Type", "Player 1", "Player 2", "Notes"]);
    for card in board.cards() {
        table.add_row(row![
            card.index,
            card.status,
            card.category,
            card_seat(card, Side::P1),
            card_seat(card, Side::P2),
            card.notes.join("\n")
        ]);
    }
    table.printstd();
}

const HELP: &str = "\
Commands:
  roster                         show the unassigned pool
  cards                          show all match cards
  checkin <id> [id...]           check members in for today
  checkout <id>                  check a member out
  assign <card> <1|2> <id>       seat a participant
  unassign <card> <1|2>          return a seat to the pool
  type <card> <category>         認定戦 / 初回認定 / 指導 / フリー
  handicap <card> <label>        override a pending card's handicap
  start <card>                   start the match
  result <card> <1|2> <symbol>   enter ○ ● △ ◇ ◆ (or - to clear)
  finish <card>                  record the match
  cancel <card>                  release the pairing
  addcard / delcard <card>       grow or shrink the board
  certify <card> <1|2> <grade>   manual grade certification
  endtoday                       end-of-day reset
  quit";

async fn run() -> Result<(), ClubError> {
    // Load the .env file only in the development environment (bypassed with
    // the --release flag)
    #[cfg(debug_assertions)]
    dotenv::dotenv().ok();

    let base_url =
        std::env::var("CLUB_API_URL").expect("Expected CLUB_API_URL as an environment variable");
    let date = std::env::var("CLUB_DATE").unwrap_or_else(|_| club_today());

    let mut config = BoardConfig::new(date);
    if let Ok(count) = std::env::var("CLUB_DEFAULT_CARD_COUNT") {
        if let Ok(count) = count.parse() {
            config.default_card_count = count;
        }
    }

    let api = HttpClubApi::new(&base_url);
    let mut board = Board::bootstrap(api, ConsolePrompt, config).await?;
    info!("Board ready for {}", board.date());
    println!("Club match board for {}. Type 'help' for commands.", board.date());

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let result = dispatch(&mut board, &tokens).await;
        match result {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => println!("Error: {}", e),
        }
    }
    Ok(())
}

async fn dispatch(
    board: &mut Board<HttpClubApi, ConsolePrompt>,
    tokens: &[&str],
) -> Result<bool, ClubError> {
    match tokens {
        [] => {}
        ["help"] => println!("{}", HELP),
        ["quit"] | ["exit"] => return Ok(true),
        ["roster"] => print_roster(board),
        ["cards"] => print_cards(board),
        ["checkin", ids @ ..] if !ids.is_empty() => {
            let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
            board.add_participants(&ids).await?;
            print_roster(board);
        }
        ["checkout", id] => {
            board.remove_participant(id).await?;
            print_roster(board);
        }
        ["assign", card, side, id] => {
            let index = card.parse()?;
            let side = parse_side(side).ok_or_else(|| anyhow::anyhow!("side must be 1 or 2"))?;
            match board.assign(index, side, id).await? {
                PairingOutcome::Waiting => println!("Waiting for the second player."),
                PairingOutcome::Paired { handicap } => {
                    println!("Paired. Handicap: {}", handicap)
                }
                PairingOutcome::Declined => println!("Pairing released."),
            }
        }
        ["unassign", card, side] => {
            let index = card.parse()?;
            let side = parse_side(side).ok_or_else(|| anyhow::anyhow!("side must be 1 or 2"))?;
            board.unassign(index, side)?;
        }
        ["type", card, label] => {
            let category = MatchCategory::from_label(label)
                .ok_or_else(|| anyhow::anyhow!("unknown match type: {}", label))?;
            board.change_category(card.parse()?, category)?;
        }
        ["handicap", card, label] => board.set_handicap(card.parse()?, label)?,
        ["start", card] => board.start(card.parse()?).await?,
        ["result", card, side, symbol] => {
            let index = card.parse()?;
            let side = parse_side(side).ok_or_else(|| anyhow::anyhow!("side must be 1 or 2"))?;
            let value = if *symbol == "-" {
                None
            } else {
                Some(
                    ResultSymbol::parse(symbol)
                        .ok_or_else(|| anyhow::anyhow!("unknown result symbol: {}", symbol))?,
                )
            };
            board.submit_result(index, side, value)?;
        }
        ["finish", card] => match board.finish(card.parse()?).await? {
            FinishOutcome::Recorded(message) => {
                println!("{}", message.unwrap_or_else(|| "Recorded.".to_string()))
            }
            FinishOutcome::AlreadyInFlight => println!("Already being recorded."),
            FinishOutcome::Discarded => println!("Discarded; pairing released."),
            FinishOutcome::KeptPlaying => println!("Match stays in progress."),
        },
        ["cancel", card] => board.cancel(card.parse()?).await?,
        ["addcard"] => {
            let index = board.add_card().await?;
            println!("Added card {}.", index);
        }
        ["delcard", card] => board.delete_card(card.parse()?).await?,
        ["certify", card, side, grade] => {
            let index = card.parse()?;
            let side = parse_side(side).ok_or_else(|| anyhow::anyhow!("side must be 1 or 2"))?;
            board.certify_grade(index, side, grade).await?;
        }
        ["endtoday"] => {
            let message = board.end_today().await?;
            println!("{}", message.unwrap_or_else(|| "Day closed.".to_string()));
        }
        _ => println!("Unknown command. Type 'help'."),
    }
    Ok(false)
}

#[tokio::main]
async fn main() {
    if let Err(e) = setup_tracing() {
        panic!("Error trying to setup tracing: {}", e);
    }

    if let Err(e) = run().await {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

/// Sets up the tracing subscriber for the console.
fn setup_tracing() -> Result<(), ClubError> {
    if cfg!(debug_assertions) {
        let filter = EnvFilter::from_default_env()
            .add_directive("none".parse()?)
            .add_directive("club_match_board=info".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::NONE)
            .pretty()
            .init();

        return Ok(());
    }

    let log_file = File::create("debug.log")?;

    // Only errors are logged in production
    tracing_subscriber::fmt::fmt()
        .with_span_events(FmtSpan::NONE)
        .with_max_level(LevelFilter::ERROR)
        .with_writer(log_file)
        .pretty()
        .init();

    Ok(())
}
