// Poll Server CLI
// Drive a running poll server as a teacher or a student from the terminal.

use clap::{Parser, Subcommand};
use colored::*;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use poll_server::poll::{PollResult, ServerEvent};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

#[derive(Parser)]
#[command(name = "poll-cli")]
#[command(about = "Live classroom poll client", long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Print finished polls
    History,

    /// Join as teacher, start a poll and follow it until it ends
    Teacher {
        /// Teacher display name
        #[arg(short, long, default_value = "Teacher")]
        name: String,

        /// Question text
        #[arg(short, long)]
        question: String,

        /// Answer option (repeat for each option)
        #[arg(short, long = "option", required = true, num_args = 1)]
        options: Vec<String>,

        /// Index of the correct option
        #[arg(short, long)]
        correct: Option<usize>,

        /// Time limit in seconds (0 = until ended manually)
        #[arg(short, long, default_value_t = 30)]
        duration: u64,

        /// End the poll manually after this many seconds
        #[arg(long)]
        end_after: Option<u64>,
    },

    /// Join as student, answer the next poll and show the results
    Student {
        /// Student display name
        #[arg(short, long)]
        name: String,

        /// Option index to pick
        #[arg(short, long)]
        choice: usize,

        /// Pick the option but leave it to the timeout to submit
        #[arg(long)]
        no_submit: bool,
    },

    /// Join as teacher and print every event
    Watch {
        /// Teacher display name
        #[arg(short, long, default_value = "Observer")]
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Health => check_health(&cli.server).await,
        Commands::History => show_history(&cli.server).await,
        Commands::Teacher {
            name,
            question,
            options,
            correct,
            duration,
            end_after,
        } => run_teacher(&cli.server, &name, &question, options, correct, duration, end_after).await,
        Commands::Student {
            name,
            choice,
            no_submit,
        } => run_student(&cli.server, &name, choice, !no_submit).await,
        Commands::Watch { name } => watch(&cli.server, &name).await,
    }
}

async fn check_health(server: &str) {
    println!("{}", "Checking server health...".cyan());

    let url = format!("http://{}/poll/health", server);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            println!("{} Health check passed", "✓".green());
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
                println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
            }
        }
        Ok(resp) => println!("{} Health check failed: {}", "✗".red(), resp.status()),
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            println!("  Make sure the server is running on {}", server);
        }
    }
}

async fn show_history(server: &str) {
    let url = format!("http://{}/poll/history", server);
    let history = match reqwest::get(&url).await {
        Ok(resp) => resp.json::<Vec<PollResult>>().await,
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            return;
        }
    };

    match history {
        Ok(history) if history.is_empty() => println!("{}", "No polls finished yet".yellow()),
        Ok(history) => {
            for (i, result) in history.iter().enumerate() {
                println!("{} {}", format!("#{}", i + 1).bold(), result.poll.question.bold());
                print_result(result);
                println!();
            }
        }
        Err(e) => println!("{} Unexpected history payload: {}", "✗".red(), e),
    }
}

async fn run_teacher(
    server: &str,
    name: &str,
    question: &str,
    options: Vec<String>,
    correct: Option<usize>,
    duration: u64,
    end_after: Option<u64>,
) {
    let Some((mut write, mut read)) = open(server).await else {
        return;
    };

    send(&mut write, json!({"event": "registerUser", "data": {"name": name, "role": "teacher"}})).await;
    send(
        &mut write,
        json!({"event": "createPoll", "data": {
            "question": question,
            "options": options,
            "correctIndex": correct,
            "duration": duration,
        }}),
    )
    .await;

    let manual_deadline = end_after.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut end_sent = false;

    loop {
        let wait = match manual_deadline {
            Some(deadline) if !end_sent => deadline.saturating_duration_since(Instant::now()),
            _ => Duration::from_secs(30),
        };

        match timeout(wait, next_event(&mut read)).await {
            Ok(Some(event)) => {
                let ended = matches!(event, ServerEvent::PollEnded(_));
                print_event(&event);
                if ended {
                    break;
                }
            }
            Ok(None) => {
                println!("{} Connection closed", "✗".yellow());
                break;
            }
            Err(_) if manual_deadline.is_some() && !end_sent => {
                println!("{}", "Ending poll...".cyan());
                send(&mut write, json!({"event": "manualEndPoll"})).await;
                end_sent = true;
            }
            Err(_) => continue,
        }
    }
}

async fn run_student(server: &str, name: &str, choice: usize, submit: bool) {
    let Some((mut write, mut read)) = open(server).await else {
        return;
    };

    send(&mut write, json!({"event": "registerUser", "data": {"name": name, "role": "student"}})).await;
    println!("{}", "⏳ Waiting for poll...".yellow());

    let mut answered = false;
    while let Some(event) = next_event(&mut read).await {
        print_event(&event);
        match event {
            ServerEvent::PollStarted(_) if !answered => {
                send(
                    &mut write,
                    json!({"event": "selectChoice", "data": {"name": name, "choice": choice}}),
                )
                .await;
                if submit {
                    sleep(Duration::from_millis(100)).await;
                    send(&mut write, json!({"event": "submitVote", "data": {}})).await;
                }
                answered = true;
            }
            ServerEvent::PollEnded(_) | ServerEvent::Removed => break,
            _ => {}
        }
    }
}

async fn watch(server: &str, name: &str) {
    let Some((mut write, mut read)) = open(server).await else {
        return;
    };

    send(&mut write, json!({"event": "registerUser", "data": {"name": name, "role": "teacher"}})).await;
    send(&mut write, json!({"event": "getPollHistory"})).await;
    println!("Press {} to stop watching.", "Ctrl+C".bold());

    while let Some(event) = next_event(&mut read).await {
        print_event(&event);
    }
    println!("{} Connection closed", "✗".yellow());
}

async fn open(server: &str) -> Option<(WsWrite, WsRead)> {
    let url = format!("ws://{}/poll", server);
    match connect_async(&url).await {
        Ok((ws_stream, _)) => {
            println!("{} Connected to {}", "✓".green(), url);
            Some(ws_stream.split())
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            None
        }
    }
}

async fn send(write: &mut WsWrite, payload: serde_json::Value) {
    if let Err(e) = write.send(Message::Text(payload.to_string())).await {
        println!("{} Failed to send {}: {}", "✗".red(), payload["event"], e);
    }
}

/// Next server event, skipping frames that are not events. `None` once closed.
async fn next_event(read: &mut WsRead) -> Option<ServerEvent> {
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                Ok(event) => return Some(event),
                Err(e) => println!("{} Unrecognized frame ({}): {}", "?".yellow(), e, text),
            },
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => {
                println!("{} Connection error: {}", "✗".red(), e);
                return None;
            }
        }
    }
    None
}

fn print_event(event: &ServerEvent) {
    match event {
        ServerEvent::Connected { id } => println!("{} Connection id {}", "◀".green(), id.dimmed()),
        ServerEvent::UsersList(students) => {
            let names: Vec<&str> = students.iter().map(|s| s.name.as_str()).collect();
            println!("{} Students ({}): {}", "◀".green(), students.len(), names.join(", "));
        }
        ServerEvent::PollStarted(result) => {
            println!("\n{} {}", "❓".bold(), result.poll.question.bold());
            for (i, option) in result.poll.options.iter().enumerate() {
                println!("  [{}] {}", i, option);
            }
            if result.poll.duration > 0 {
                println!("  {} {}s left", "⏱".cyan(), result.poll.duration);
            }
        }
        ServerEvent::PollUpdated(result) => {
            println!("{} Live results ({}s left)", "◀".green(), result.poll.duration);
            print_result(result);
        }
        ServerEvent::PollEnded(result) => {
            println!("\n{}", "═".repeat(50).green());
            println!("{} {}", "Poll ended:".bold(), result.poll.question);
            print_result(result);
            println!("{}", "═".repeat(50).green());
        }
        ServerEvent::Removed => println!("{}", "You were removed by the teacher".red().bold()),
        ServerEvent::PollHistory(history) => {
            println!("{} {} past poll(s)", "◀".green(), history.len());
        }
    }
}

fn print_result(result: &PollResult) {
    for (i, option) in result.poll.options.iter().enumerate() {
        let pct = result.stats.percentages.get(i).copied().unwrap_or(0);
        let votes = result.poll.votes.get(i).copied().unwrap_or(0);
        let bar = "█".repeat((pct / 5) as usize);
        let label = if result.poll.correct_index == Some(i) {
            format!("{} ✓", option).green().to_string()
        } else {
            option.to_string()
        };
        println!("  {:<20} {:>3}% {:>3} {}", label, pct, votes, bar.cyan());
    }
    println!(
        "  correct: {}  wrong: {}  no response: {}",
        result.stats.correct_count.to_string().green(),
        result.stats.wrong_count.to_string().red(),
        result.stats.no_response_count.to_string().yellow()
    );
}
