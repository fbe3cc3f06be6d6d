use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{Answer, AnswerId, Catalog, Question, QuestionId};
use serde::Deserialize;
use storage::repository::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    catalog: Option<PathBuf>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:quiz.sqlite3".into());
        let mut catalog = std::env::var("QUIZ_CATALOG").ok().map(PathBuf::from);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--catalog" => {
                    catalog = Some(PathBuf::from(require_value(&mut args, "--catalog")?));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, catalog })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>      SQLite URL (default: sqlite:quiz.sqlite3)");
    eprintln!("  --catalog <path>       TOML catalog to import (default: built-in sample)");
    eprintln!("  -h, --help             Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_CATALOG, QUIZ_LOG");
}

/// On-disk catalog shape. Ids default to 1-based positions when omitted.
///
/// Seeding replaces the stored catalog; questions absent from the file are removed.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    questions: Vec<QuestionEntry>,
}

#[derive(Debug, Deserialize)]
struct QuestionEntry {
    #[serde(default)]
    id: Option<QuestionId>,
    prompt: String,
    answers: Vec<AnswerEntry>,
}

#[derive(Debug, Deserialize)]
struct AnswerEntry {
    #[serde(default)]
    id: Option<AnswerId>,
    text: String,
    #[serde(default)]
    correct: bool,
}

const SAMPLE_CATALOG: &str = r#"
[[questions]]
prompt = "Which keyword declares an immutable binding in Rust?"
answers = [
    { text = "let", correct = true },
    { text = "var" },
    { text = "const mut" },
]

[[questions]]
prompt = "What does the ? operator do on a Result?"
answers = [
    { text = "Returns early with the error", correct = true },
    { text = "Panics on error" },
    { text = "Ignores the error" },
]

[[questions]]
prompt = "Which type owns a growable UTF-8 string?"
answers = [
    { text = "&str" },
    { text = "String", correct = true },
    { text = "char" },
]
"#;

fn build_catalog(file: CatalogFile) -> Result<Catalog, quiz_core::Error> {
    let mut questions = Vec::with_capacity(file.questions.len());
    for (q_pos, entry) in (1_u64..).zip(file.questions) {
        let answers = (1_u64..)
            .zip(entry.answers)
            .map(|(a_pos, a)| {
                Answer::new(a.id.unwrap_or(AnswerId::new(a_pos)), a.text, a.correct)
            })
            .collect();
        questions.push(Question::new(
            entry.id.unwrap_or(QuestionId::new(q_pos)),
            entry.prompt,
            answers,
        )?);
    }
    Ok(Catalog::new(questions)?)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("QUIZ_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let raw = match &args.catalog {
        Some(path) => std::fs::read_to_string(path)?,
        None => SAMPLE_CATALOG.to_owned(),
    };
    let catalog = build_catalog(toml::from_str::<CatalogFile>(&raw)?)?;

    let storage = Storage::sqlite(&args.db_url).await?;
    storage.questions.replace_catalog(&catalog).await?;

    info!(db = %args.db_url, questions = catalog.len(), "catalog seeded");
    println!(
        "Seeded {} questions into {}",
        catalog.len(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
