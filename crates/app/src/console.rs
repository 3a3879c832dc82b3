//! Line-oriented terminal front end for a driven attempt.

use quiz_core::model::{OptionIndex, SubmissionSummary};
use services::{AttemptHandle, AttemptOutcome, AttemptProgress, AttemptState, SubmitOutcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// One parsed line of user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Start,
    Answer(OptionIndex),
    Next,
    Previous,
    /// One-based question number as typed by the user.
    GoTo(usize),
    Submit,
    Retry,
    Show,
    Help,
    Quit,
}

/// Parse a line, or `None` when it is not a known command.
pub fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim().to_ascii_lowercase();
    let mut words = line.split_whitespace();
    let head = words.next()?;

    let input = match head {
        "start" | "begin" => Input::Start,
        "n" | "next" => Input::Next,
        "p" | "prev" | "previous" => Input::Previous,
        "g" | "go" | "goto" => {
            let number = words.next()?.parse::<usize>().ok()?;
            if number == 0 {
                return None;
            }
            Input::GoTo(number)
        }
        "s" | "submit" => Input::Submit,
        "r" | "retry" => Input::Retry,
        "show" | "l" | "look" => Input::Show,
        "h" | "help" | "?" => Input::Help,
        "q" | "quit" | "exit" => Input::Quit,
        letter if letter.len() == 1 => {
            let byte = letter.as_bytes()[0];
            if !(b'a'..=b'f').contains(&byte) {
                return None;
            }
            Input::Answer(OptionIndex::new(byte - b'a'))
        }
        _ => return None,
    };

    if words.next().is_some() {
        return None;
    }
    Some(input)
}

pub fn print_help() {
    println!("Commands:");
    println!("  start          begin the countdown");
    println!("  a..f           answer the current question");
    println!("  n / p          next or previous question");
    println!("  g <number>     jump to a question");
    println!("  s              submit now");
    println!("  r              retry a failed submission");
    println!("  show           print the current question again");
    println!("  q              abandon the attempt and exit");
}

pub fn render(progress: &AttemptProgress) {
    match progress.state {
        AttemptState::Loading => println!("Loading quiz {}...", progress.quiz_id),
        AttemptState::Ready => println!(
            "Quiz {} is ready: {} questions, {} on the clock. Type `start` to begin.",
            progress.quiz_id,
            progress.total,
            progress.remaining_label()
        ),
        AttemptState::Running => render_question(progress),
        AttemptState::Submitting => println!("Submitting your answers..."),
        AttemptState::Submitted => match (progress.score, progress.result_id) {
            (Some(score), Some(result_id)) => {
                println!("Submitted as result {result_id} with a score of {score}%.");
            }
            _ => println!("Submitted."),
        },
        AttemptState::Errored => {
            let reason = progress.failure.as_deref().unwrap_or("unknown failure");
            match progress.score {
                Some(score) => println!(
                    "Submission failed: {reason}. Your score of {score}% is kept; type `r` to retry."
                ),
                None => println!("Quiz unavailable: {reason}."),
            }
        }
    }
}

fn render_question(progress: &AttemptProgress) {
    let hurry = if progress.running_low { "  hurry!" } else { "" };
    println!(
        "\nQuestion {}  [{} left{hurry}]  answered {}/{}",
        progress.position_label(),
        progress.remaining_label(),
        progress.answered,
        progress.total
    );
    let Some(question) = progress.current.as_ref() else {
        return;
    };
    println!("{}", question.prompt);
    for (index, option) in (0_u8..).zip(question.options.iter()) {
        let option_index = OptionIndex::new(index);
        let marker = if question.selected == Some(option_index) {
            '*'
        } else {
            ' '
        };
        println!("  {marker} {}) {option}", option_index.letter());
    }
}

/// Countdown checkpoints worth a line of output.
fn announce_remaining(remaining_seconds: u32) -> bool {
    remaining_seconds > 0
        && (remaining_seconds % 60 == 0 || remaining_seconds == 30 || remaining_seconds <= 10)
}

pub fn print_outcome(outcome: &AttemptOutcome) {
    match outcome {
        AttemptOutcome::Submitted { result_id, summary } => {
            println!("Result {result_id}");
            print_summary(summary);
        }
        AttemptOutcome::Failed { error, summary } => {
            println!("Attempt failed: {error}");
            if let Some(summary) = summary {
                print_summary(summary);
            }
        }
        AttemptOutcome::Abandoned => println!("Attempt abandoned; nothing was submitted."),
    }
}

fn print_summary(summary: &SubmissionSummary) {
    println!(
        "  score      {}% ({})",
        summary.score(),
        if summary.passed() { "passed" } else { "not passed" }
    );
    println!(
        "  correct    {} of {}  (incorrect {}, unanswered {})",
        summary.correct(),
        summary.total(),
        summary.incorrect(),
        summary.unanswered()
    );
    println!(
        "  time       {}s of {}s",
        summary.elapsed_seconds(),
        summary.duration_seconds()
    );
}

/// Run the prompt until the attempt settles or the user quits.
///
/// Closing the input of a running attempt waits for it to settle instead of
/// abandoning it.
///
/// # Errors
///
/// Returns the I/O error if reading input fails.
pub async fn drive(
    mut handle: AttemptHandle,
    input: impl AsyncBufRead + Unpin,
) -> Result<AttemptOutcome, Box<dyn std::error::Error>> {
    let mut updates = handle.subscribe();
    let mut lines = input.lines();
    let mut last_state = handle.progress().state;

    print_help();
    render(&handle.progress());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let progress = updates.borrow_and_update().clone();
                if progress.state != last_state {
                    last_state = progress.state;
                    if progress.state == AttemptState::Submitted {
                        break;
                    }
                    if progress.state != AttemptState::Running {
                        render(&progress);
                    }
                } else if progress.state == AttemptState::Running
                    && announce_remaining(progress.remaining_seconds)
                {
                    println!("  {} left", progress.remaining_label());
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    if matches!(last_state, AttemptState::Running | AttemptState::Submitting) {
                        println!("Input closed; the attempt is submitted when time runs out.");
                        handle.settled().await;
                    }
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_input(&line) {
                    None => println!("Unknown command: {}. Type `help` for the list.", line.trim()),
                    Some(Input::Quit) => return Ok(handle.abandon().await?),
                    Some(input) => execute(&handle, input).await,
                }
            }
        }
    }

    Ok(handle.close().await?)
}

async fn execute(handle: &AttemptHandle, input: Input) {
    let result = match input {
        Input::Start => handle.start().await.map(|()| render(&handle.progress())),
        Input::Answer(option) => handle
            .answer_current(option)
            .await
            .map(|_| render(&handle.progress())),
        Input::Next => handle.next().await.map(|_| render(&handle.progress())),
        Input::Previous => handle.previous().await.map(|_| render(&handle.progress())),
        Input::GoTo(number) => handle
            .go_to(number - 1)
            .await
            .map(|_| render(&handle.progress())),
        Input::Submit => handle.submit().await.map(|outcome| {
            if outcome == SubmitOutcome::Duplicate {
                println!("Already submitted.");
            }
        }),
        Input::Retry => handle.retry().await.map(|_| ()),
        Input::Show => {
            render(&handle.progress());
            Ok(())
        }
        Input::Help => {
            print_help();
            Ok(())
        }
        Input::Quit => Ok(()),
    };

    if let Err(err) = result {
        println!("{err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use quiz_core::model::{Question, QuestionId, Quiz, QuizId};
    use quiz_core::time::fixed_clock;
    use services::AttemptLoopService;
    use storage::repository::{InMemoryRepository, QuizStore};

    async fn one_question_service() -> (AttemptLoopService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let question = Question::new(
            QuestionId::new(1),
            "Pick a",
            vec!["a".into(), "b".into()],
            OptionIndex::new(0),
            None,
        )
        .unwrap();
        let quiz = Quiz::new(QuizId::new(1), "Quiz", "General", None, 1, vec![question]).unwrap();
        repo.upsert_quiz(&quiz).await.unwrap();
        let service =
            AttemptLoopService::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo.clone()));
        (service, repo)
    }

    #[tokio::test(start_paused = true)]
    async fn closed_input_lets_a_running_attempt_expire() {
        let (service, repo) = one_question_service().await;
        let handle = service.launch(QuizId::new(1)).await;
        handle.start().await.unwrap();

        let outcome = drive(handle, &b""[..]).await.unwrap();
        let AttemptOutcome::Submitted { summary, .. } = outcome else {
            panic!("expected an expiry submission, got {outcome:?}");
        };
        assert_eq!(summary.unanswered(), 1);
        assert_eq!(summary.elapsed_seconds(), 60);
        assert_eq!(repo.submission_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_answers_then_submit() {
        let (service, repo) = one_question_service().await;
        let handle = service.launch(QuizId::new(1)).await;

        let outcome = drive(handle, &b"start\na\ns\n"[..]).await.unwrap();
        let AttemptOutcome::Submitted { summary, .. } = outcome else {
            panic!("expected a submission, got {outcome:?}");
        };
        assert_eq!(summary.score(), 100);
        assert_eq!(repo.submission_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quit_abandons_without_submitting() {
        let (service, repo) = one_question_service().await;
        let handle = service.launch(QuizId::new(1)).await;

        let outcome = drive(handle, &b"start\nq\n"[..]).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Abandoned);
        assert_eq!(repo.submission_count(), 0);
    }

    #[test]
    fn letters_answer_the_current_question() {
        assert_eq!(parse_input("a"), Some(Input::Answer(OptionIndex::new(0))));
        assert_eq!(parse_input(" C "), Some(Input::Answer(OptionIndex::new(2))));
        assert_eq!(parse_input("f"), Some(Input::Answer(OptionIndex::new(5))));
        assert_eq!(parse_input("z"), None);
    }

    #[test]
    fn commands_and_arguments() {
        assert_eq!(parse_input("start"), Some(Input::Start));
        assert_eq!(parse_input("n"), Some(Input::Next));
        assert_eq!(parse_input("prev"), Some(Input::Previous));
        assert_eq!(parse_input("g 3"), Some(Input::GoTo(3)));
        assert_eq!(parse_input("g 0"), None);
        assert_eq!(parse_input("g"), None);
        assert_eq!(parse_input("s now"), None);
        assert_eq!(parse_input("QUIT"), Some(Input::Quit));
    }

    #[test]
    fn announces_minutes_and_final_seconds() {
        assert!(announce_remaining(120));
        assert!(announce_remaining(30));
        assert!(announce_remaining(3));
        assert!(!announce_remaining(45));
        assert!(!announce_remaining(0));
    }
}
