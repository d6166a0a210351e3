//! Interactive timer loop.
//!
//! Reads one command per line from stdin and forwards it to the
//! [`TimerDriver`]. Events print as JSON lines on stdout; the countdown
//! renders on stderr.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tikkr_core::timer::command_channel;
use tikkr_core::{
    CompletionDispatcher, Config, Database, DriverCommand, Event, Mode, TimerDriver, TimerEngine,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::notifier::TerminalNotifier;

const HELP: &str = "commands: start | stop | reset | skip | work | short | long | clear | status | reload | help | quit";

#[derive(Debug)]
enum Input {
    Command(DriverCommand),
    Status,
    Reload,
    Help,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(Input::Empty);
    };
    let input = match word.to_ascii_lowercase().as_str() {
        "start" | "s" | "resume" => Input::Command(DriverCommand::Start),
        "stop" | "pause" | "p" => Input::Command(DriverCommand::Stop),
        "reset" | "r" => Input::Command(DriverCommand::Reset),
        "skip" | "next" | "n" => Input::Command(DriverCommand::Skip),
        "clear" => Input::Command(DriverCommand::ResetSessions),
        "mode" => {
            let target = words.next().ok_or("usage: mode <work|short|long>")?;
            Input::Command(DriverCommand::SwitchMode(
                target.parse::<Mode>().map_err(|e| e.to_string())?,
            ))
        }
        "work" | "short" | "long" => {
            Input::Command(DriverCommand::SwitchMode(word.parse::<Mode>().map_err(|e| e.to_string())?))
        }
        "status" | "st" => Input::Status,
        "reload" => Input::Reload,
        "help" | "?" | "h" => Input::Help,
        "quit" | "q" | "exit" => Input::Quit,
        other => return Err(format!("unknown command '{other}' ({HELP})")),
    };
    Ok(input)
}

fn render(event: &Event) {
    match event {
        Event::TimerTick { mode, formatted, .. } => {
            eprint!("\r{:<11} {formatted}   ", mode.label());
            let _ = std::io::stderr().flush();
        }
        other => match serde_json::to_string(other) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!(error = %e, "cannot serialize event"),
        },
    }
}

pub fn run(tick_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_loop(tick_ms))
}

async fn run_loop(tick_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Arc::new(Mutex::new(Database::open()?));
    let notifier = TerminalNotifier::new(config.notifications.clone());
    let dispatcher = CompletionDispatcher::new(db.clone(), db, notifier);

    let engine = TimerEngine::new(config.timer.clone())?;
    let (driver, mut events) = TimerDriver::new(engine, dispatcher, Duration::from_millis(tick_ms));
    let (handle, commands) = command_channel(16);
    let driver_task = tokio::spawn(driver.run(commands));
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            render(&event);
        }
    });

    eprintln!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Ok(Input::Command(cmd)) => {
                if !handle.send(cmd).await {
                    break;
                }
            }
            Ok(Input::Status) => {
                if let Some(snapshot) = handle.snapshot().await {
                    println!("{}", serde_json::to_string(&snapshot)?);
                }
            }
            Ok(Input::Reload) => match Config::load() {
                Ok(cfg) => {
                    handle.send(DriverCommand::UpdateSettings(cfg.timer)).await;
                }
                Err(e) => eprintln!("error: {e}"),
            },
            Ok(Input::Help) => eprintln!("{HELP}"),
            Ok(Input::Quit) => break,
            Ok(Input::Empty) => {}
            Err(msg) => eprintln!("{msg}"),
        }
    }

    handle.send(DriverCommand::Shutdown).await;
    let (engine, _) = driver_task.await?;
    drop(handle);
    printer.await?;

    eprintln!();
    eprintln!(
        "completed {} work session(s) this run",
        engine.completed_work_sessions()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_aliases() {
        assert!(matches!(parse_input("start"), Ok(Input::Command(DriverCommand::Start))));
        assert!(matches!(parse_input("  P "), Ok(Input::Command(DriverCommand::Stop))));
        assert!(matches!(parse_input("skip"), Ok(Input::Command(DriverCommand::Skip))));
        assert!(matches!(
            parse_input("long"),
            Ok(Input::Command(DriverCommand::SwitchMode(Mode::LongBreak)))
        ));
        assert!(matches!(
            parse_input("mode short"),
            Ok(Input::Command(DriverCommand::SwitchMode(Mode::ShortBreak)))
        ));
        assert!(matches!(parse_input(""), Ok(Input::Empty)));
        assert!(matches!(
            parse_input("clear"),
            Ok(Input::Command(DriverCommand::ResetSessions))
        ));
        assert!(matches!(parse_input("status"), Ok(Input::Status)));
        assert!(matches!(parse_input("q"), Ok(Input::Quit)));
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(parse_input("dance").is_err());
        assert!(parse_input("mode").is_err());
        assert!(parse_input("mode nap").is_err());
    }
}
