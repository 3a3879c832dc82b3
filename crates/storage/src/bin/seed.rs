use std::fmt;

use quiz_core::model::{Difficulty, OptionIndex, Question, QuestionId, Quiz, QuizId};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    quiz_id: QuizId,
    title: String,
    minutes: u32,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidQuizId { raw: String },
    InvalidMinutes { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz-id value: {raw}"),
            ArgsError::InvalidMinutes { raw } => write!(f, "invalid --minutes value: {raw}"),
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
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:quiz.sqlite3?mode=rwc".into());
        let mut quiz_id = std::env::var("QUIZ_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| QuizId::new(1), QuizId::new);
        let mut title =
            std::env::var("QUIZ_TITLE").unwrap_or_else(|_| "General Knowledge".into());
        let mut minutes = std::env::var("QUIZ_MINUTES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(10);

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
                "--quiz-id" => {
                    let value = require_value(&mut args, "--quiz-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidQuizId { raw: value.clone() })?;
                    quiz_id = QuizId::new(parsed);
                }
                "--title" => {
                    title = require_value(&mut args, "--title")?;
                }
                "--minutes" => {
                    let value = require_value(&mut args, "--minutes")?;
                    minutes = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidMinutes { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            quiz_id,
            title,
            minutes,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:quiz.sqlite3?mode=rwc)");
    eprintln!("  --quiz-id <id>            Quiz id to upsert (default: 1)");
    eprintln!("  --title <text>            Quiz title (default: General Knowledge)");
    eprintln!("  --minutes <n>             Time limit in minutes (default: 10)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_ID, QUIZ_TITLE, QUIZ_MINUTES");
}

fn sample_quiz(args: &Args) -> Result<Quiz, quiz_core::Error> {
    let samples: [(&str, [&str; 4], u8, Difficulty); 5] = [
        (
            "Which planet is known as the Red Planet?",
            ["Venus", "Mars", "Jupiter", "Mercury"],
            1,
            Difficulty::Easy,
        ),
        (
            "What is the chemical symbol for gold?",
            ["Ag", "Gd", "Au", "Go"],
            2,
            Difficulty::Easy,
        ),
        (
            "How many sides does a hexagon have?",
            ["Five", "Six", "Seven", "Eight"],
            1,
            Difficulty::Easy,
        ),
        (
            "Which ocean is the largest by area?",
            ["Atlantic", "Indian", "Arctic", "Pacific"],
            3,
            Difficulty::Medium,
        ),
        (
            "In which year did the first crewed Moon landing happen?",
            ["1965", "1969", "1972", "1959"],
            1,
            Difficulty::Hard,
        ),
    ];

    let mut questions = Vec::with_capacity(samples.len());
    for (id, (prompt, options, correct, difficulty)) in (1_u64..).zip(samples) {
        questions.push(Question::new(
            QuestionId::new(id),
            prompt,
            options.iter().map(|o| (*o).to_string()).collect(),
            OptionIndex::new(correct),
            Some(difficulty),
        )?);
    }

    Ok(Quiz::new(
        args.quiz_id,
        args.title.clone(),
        "General",
        Some("Trivia".to_string()),
        args.minutes,
        questions,
    )?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let quiz = sample_quiz(&args)?;
    storage.quizzes.upsert_quiz(&quiz).await?;

    let known = storage.quizzes.list_quizzes(50).await?;
    println!(
        "Seeded quiz {} ({} questions, {} min) into {}; {} quiz(zes) available",
        quiz.id(),
        quiz.question_count(),
        quiz.time_limit_minutes(),
        args.db_url,
        known.len()
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
