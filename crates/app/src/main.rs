use std::fmt;
use std::sync::Arc;

use quiz_core::model::{AnswerId, Player, PlayerId, ResultRecord};
use quiz_core::{Advance, QuizSession};
use services::{Clock, QuizError, QuizLoopService, ResultService};
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

mod telemetry;

const LEADERBOARD_LIMIT: u32 = 10;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidPlayerId { raw: String },
    InvalidPlayerName { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidPlayerId { raw } => write!(f, "invalid --player-id value: {raw}"),
            ArgsError::InvalidPlayerName { raw } => {
                write!(f, "invalid --player-name value: {raw:?}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    db_url: String,
    player: Player,
    shuffle: bool,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- play        [options]");
    eprintln!("  cargo run -p app -- leaderboard [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>      SQLite URL (default: sqlite:quiz.sqlite3)");
    eprintln!("  --player-id <id>       Numeric player id (default: 1)");
    eprintln!("  --player-name <name>   Display name (default: Anonymous)");
    eprintln!("  --shuffle              Randomise question order");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_PLAYER_ID, QUIZ_PLAYER_NAME, QUIZ_SHUFFLE");
    eprintln!("  QUIZ_LOG, QUIZ_LOG_FORMAT=json");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Leaderboard,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "leaderboard" => Some(Self::Leaderboard),
            _ => None,
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl Args {
    fn from_env() -> Self {
        let db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite:quiz.sqlite3".into()), normalize_sqlite_url);
        let player_id = std::env::var("QUIZ_PLAYER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| PlayerId::new(1), PlayerId::new);
        let player = std::env::var("QUIZ_PLAYER_NAME")
            .ok()
            .and_then(|name| Player::new(player_id, name).ok())
            .unwrap_or_else(|| Player::anonymous(player_id));

        Self {
            db_url,
            player,
            shuffle: env_flag("QUIZ_SHUFFLE"),
        }
    }

    fn parse(mut self, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut player_id = self.player.id();
        let mut player_name: Option<String> = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    self.db_url = normalize_sqlite_url(value);
                }
                "--player-id" => {
                    let value = require_value(args, "--player-id")?;
                    let parsed: PlayerId = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidPlayerId { raw: value.clone() })?;
                    player_id = parsed;
                }
                "--player-name" => {
                    player_name = Some(require_value(args, "--player-name")?);
                }
                "--shuffle" => self.shuffle = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        self.player = match player_name {
            Some(name) => Player::new(player_id, name.clone())
                .map_err(|_| ArgsError::InvalidPlayerName { raw: name })?,
            None if player_id == self.player.id() => self.player,
            None => Player::new(player_id, self.player.name())
                .unwrap_or_else(|_| Player::anonymous(player_id)),
        };
        Ok(self)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// What the player typed at the answer prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Answer(AnswerId),
    Quit,
    Invalid,
}

/// Map a 1-based menu number to the answer shown at that position.
fn parse_choice(input: &str, answers: &[AnswerId]) -> Choice {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Choice::Quit;
    }
    input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| answers.get(i).copied())
        .map_or(Choice::Invalid, Choice::Answer)
}

fn print_question(session: &QuizSession) -> Option<Vec<AnswerId>> {
    let current = session.current_question()?;
    println!();
    println!(
        "[pass {}  {}/{}] {}",
        current.pass,
        current.position + 1,
        current.pass_len,
        current.question.prompt()
    );
    if current.attempt.is_retry() {
        println!("(retry, attempt {})", current.attempt.attempts() + 1);
    }
    for (n, answer) in (1_usize..).zip(current.question.answers()) {
        println!("  {n}) {}", answer.text);
    }
    Some(current.question.answers().iter().map(|a| a.id).collect())
}

fn print_result(record: &ResultRecord) {
    println!();
    println!("Quiz complete, {}!", record.player().name());
    println!(
        "  Score:           {}/{}",
        record.score(),
        record.total_questions()
    );
    println!("  Total attempts:  {}", record.total_attempts());
    println!("  First try:       {}%", record.first_try_percentage());
    println!("  Passes:          {}", record.passes());
    println!("  Time:            {}s", record.elapsed().num_seconds());
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> std::io::Result<Option<String>> {
    use std::io::Write;
    print!("> ");
    std::io::stdout().flush()?;
    lines.next_line().await
}

async fn play(storage: &Storage, args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let loop_svc = QuizLoopService::new(
        Clock::system(),
        Arc::clone(&storage.questions),
        Arc::clone(&storage.results),
    )
    .with_shuffle(args.shuffle);

    let mut session = loop_svc.start_session(args.player).await?;
    println!(
        "Welcome, {}! {} questions. Type the answer number, or q to quit.",
        session.player().name(),
        session.total_questions()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(answers) = print_question(&session) {
        let Some(line) = read_line(&mut lines).await? else {
            println!();
            return Ok(());
        };
        let answer_id = match parse_choice(&line, &answers) {
            Choice::Answer(id) => id,
            Choice::Quit => return Ok(()),
            Choice::Invalid => {
                println!("Please enter a number between 1 and {}.", answers.len());
                continue;
            }
        };

        let res = match loop_svc.answer_current(&mut session, answer_id).await {
            Ok(res) => res,
            Err(err @ QuizError::Persist { .. }) => {
                warn!(error = %err, "retrying result persistence");
                let Some(record) = err.into_unsaved_result() else {
                    break;
                };
                print_result(&record);
                loop_svc.finalize_result(record).await?;
                break;
            }
            Err(err) => return Err(err.into()),
        };

        let attempts = res.outcome.attempts;
        if res.outcome.correct {
            println!("Correct! (attempts: {attempts})");
        } else {
            println!("Wrong. (attempts: {attempts})");
        }

        match res.outcome.next {
            Advance::Next => {}
            Advance::RetryPass { pass, size } => {
                println!();
                println!("Pass {pass}: retrying {size} missed question(s).");
            }
            Advance::Finished(record) => print_result(&record),
        }
    }

    Ok(())
}

async fn leaderboard(storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let results = ResultService::new(Arc::clone(&storage.results));
    let board = results.leaderboard(LEADERBOARD_LIMIT).await?;
    if board.is_empty() {
        println!("No finished sessions yet.");
        return Ok(());
    }

    println!("{:>4}  {:<20} {:>7} {:>9} {:>6}", "#", "player", "first%", "attempts", "score");
    for entry in &board {
        let item = &entry.item;
        println!(
            "{:>4}  {:<20} {:>6}% {:>9} {:>3}/{}",
            entry.rank,
            item.player_name,
            item.first_try_percentage,
            item.total_attempts,
            item.score,
            item.total_questions
        );
    }

    let stats = results.global_stats().await?;
    println!();
    println!(
        "{} sessions, {} attempts, {}% first try on average",
        stats.sessions, stats.total_attempts, stats.average_first_try_percentage
    );
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: play when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::from_env()
        .parse(&mut argv.into_iter())
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;

    // Open + migrate SQLite here so core/services stay storage-agnostic.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    match cmd {
        Command::Play => play(&storage, parsed).await,
        Command::Leaderboard => leaderboard(&storage).await,
    }
}

#[tokio::main]
async fn main() {
    telemetry::init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Args {
        Args {
            db_url: "sqlite::memory:".into(),
            player: Player::anonymous(PlayerId::new(1)),
            shuffle: false,
        }
    }

    fn parse(raw: &[&str]) -> Result<Args, ArgsError> {
        base().parse(&mut raw.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&["--player-id", "7", "--player-name", "Ada", "--shuffle"]).unwrap();
        assert_eq!(args.player, Player::new(PlayerId::new(7), "Ada").unwrap());
        assert!(args.shuffle);
        assert_eq!(args.db_url, "sqlite::memory:");
    }

    #[test]
    fn player_id_alone_keeps_default_name() {
        let args = parse(&["--player-id", "3"]).unwrap();
        assert_eq!(args.player.id(), PlayerId::new(3));
        assert_eq!(args.player.name(), "Anonymous");
    }

    #[test]
    fn bad_flags_are_rejected() {
        assert!(matches!(
            parse(&["--player-id", "x"]),
            Err(ArgsError::InvalidPlayerId { .. })
        ));
        assert!(matches!(
            parse(&["--player-name", "  "]),
            Err(ArgsError::InvalidPlayerName { .. })
        ));
        assert!(matches!(
            parse(&["--db"]),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(parse(&["--nope"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn sqlite_urls_are_made_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:/tmp/quiz.db".into()),
            "sqlite:///tmp/quiz.db"
        );
        assert!(normalize_sqlite_url("quiz.db".into()).starts_with("sqlite:///"));
    }

    #[test]
    fn choices_map_menu_numbers_to_answer_ids() {
        let answers = [AnswerId::new(10), AnswerId::new(20)];
        assert_eq!(parse_choice(" 2 ", &answers), Choice::Answer(AnswerId::new(20)));
        assert_eq!(parse_choice("Q", &answers), Choice::Quit);
        assert_eq!(parse_choice("0", &answers), Choice::Invalid);
        assert_eq!(parse_choice("3", &answers), Choice::Invalid);
        assert_eq!(parse_choice("two", &answers), Choice::Invalid);
    }
}
