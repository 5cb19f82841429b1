//! Console operator.
//!
//! Reads commands from stdin and answers admission prompts. A prompt takes
//! over the next input line until it is answered or the gate gives up on
//! it; otherwise lines are commands.

use crate::admission::ApprovalRequest;
use crate::server::WhiteboardServer;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show registered participants
    List,
    /// Remove a participant by name
    Kick(String),
    /// Broadcast a notice
    Say(String),
    Help,
    /// Anything unrecognized, kept for the error message
    Unknown(String),
}

pub const HELP: &str = "Commands:
  list          show active participants
  kick <name>   remove a participant
  say <text>    broadcast a notice
  help          show this help";

/// Parse one console line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match (word.to_ascii_lowercase().as_str(), rest) {
        ("list" | "ls", "") => Command::List,
        ("kick", name) if !name.is_empty() => Command::Kick(name.to_string()),
        ("say", text) if !text.is_empty() => Command::Say(text.to_string()),
        ("help" | "?", _) => Command::Help,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

/// Whether a prompt answer accepts the candidate.
pub fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Prompt shown for a pending approval.
pub fn prompt_for(candidate: &str) -> String {
    format!("\"{candidate}\" wants to join. Accept? [y/N]")
}

/// Console line for the `list` command.
pub fn format_roster(roster: &[(String, Duration)]) -> String {
    if roster.is_empty() {
        return "No active participants".to_string();
    }
    let entries: Vec<String> = roster
        .iter()
        .map(|(name, age)| format!("{name} ({}s)", age.as_secs()))
        .collect();
    format!("Active ({}): {}", roster.len(), entries.join(", "))
}

/// Run one command against the server, returning the console output.
pub async fn execute(server: &WhiteboardServer, command: Command) -> String {
    match command {
        Command::List => format_roster(&server.roster().await),
        Command::Kick(name) => {
            if server.kick(&name).await {
                format!("Removed {name}")
            } else {
                format!("No participant named {name}")
            }
        }
        Command::Say(text) => {
            let reached = server.broadcast_notice(&text).await;
            format!("Notice sent to {reached} participant(s)")
        }
        Command::Help => HELP.to_string(),
        Command::Unknown(line) => format!("Unknown command: {line}\n{HELP}"),
    }
}

fn expired_notice(candidate: &str) -> String {
    format!("Request from \"{candidate}\" expired")
}

/// Serve the console on stdin and stdout.
pub async fn run_console(
    server: Arc<WhiteboardServer>,
    approvals: mpsc::Receiver<ApprovalRequest>,
) {
    let input = BufReader::new(tokio::io::stdin());
    serve_console(&server, approvals, input, tokio::io::stdout()).await;
}

/// Serve the console until `input` ends.
///
/// After input ends, remaining approval requests are denied.
pub async fn serve_console<R, W>(
    server: &WhiteboardServer,
    mut approvals: mpsc::Receiver<ApprovalRequest>,
    input: R,
    mut output: W,
) where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut pending: Option<ApprovalRequest> = None;
    let mut approvals_open = true;

    loop {
        tokio::select! {
            request = approvals.recv(), if approvals_open && pending.is_none() => match request {
                Some(request) => {
                    emit(&mut output, &prompt_for(request.candidate())).await;
                    pending = Some(request);
                }
                None => approvals_open = false,
            },
            () = expiry(&mut pending) => {
                if let Some(request) = pending.take() {
                    emit(&mut output, &expired_notice(request.candidate())).await;
                }
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => match pending.take() {
                    Some(request) => {
                        let candidate = request.candidate().to_string();
                        if !request.respond(parse_answer(&line)) {
                            emit(&mut output, &expired_notice(&candidate)).await;
                        }
                    }
                    None => {
                        if let Some(command) = parse_command(&line) {
                            emit(&mut output, &execute(server, command).await).await;
                        }
                    }
                },
                Ok(None) => {
                    info!("Operator console closed");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read operator input: {}", e);
                    break;
                }
            },
        }
    }

    if let Some(request) = pending.take() {
        request.respond(false);
    }
    while let Some(request) = approvals.recv().await {
        warn!(candidate = request.candidate(), "No operator console, denying");
        request.respond(false);
    }
}

/// Resolves when the pending request, if any, is abandoned by the gate.
async fn expiry(pending: &mut Option<ApprovalRequest>) {
    match pending {
        Some(request) => request.expired().await,
        None => std::future::pending().await,
    }
}

async fn emit<W: AsyncWrite + Unpin>(output: &mut W, text: &str) {
    let line = format!("{text}\n");
    if let Err(e) = output.write_all(line.as_bytes()).await {
        warn!("Failed to write console output: {}", e);
        return;
    }
    let _ = output.flush().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{ApprovalSurface, ChannelApproval};
    use crate::config::ServerConfig;
    use crate::session::BoxFuture;
    use crate::session::testing::RecordingHandle;
    use tokio::io::{DuplexStream, Lines};
    use tokio::task::JoinHandle;
    use uuid::Uuid;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("list"), Some(Command::List));
        assert_eq!(parse_command("  LIST  "), Some(Command::List));
        assert_eq!(parse_command("kick bob"), Some(Command::Kick("bob".into())));
        assert_eq!(
            parse_command("kick  Mary Ann "),
            Some(Command::Kick("Mary Ann".into()))
        );
        assert_eq!(
            parse_command("say lunch in 5"),
            Some(Command::Say("lunch in 5".into()))
        );
        assert_eq!(parse_command("help"), Some(Command::Help));
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn test_parse_incomplete_commands() {
        assert_eq!(parse_command("kick"), Some(Command::Unknown("kick".into())));
        assert_eq!(parse_command("say "), Some(Command::Unknown("say".into())));
        assert_eq!(
            parse_command("list extra"),
            Some(Command::Unknown("list extra".into()))
        );
        assert_eq!(
            parse_command("dance"),
            Some(Command::Unknown("dance".into()))
        );
    }

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("y"));
        assert!(parse_answer(" YES "));
        assert!(!parse_answer("n"));
        assert!(!parse_answer(""));
        assert!(!parse_answer("yep"));
    }

    #[test]
    fn test_prompt_text() {
        assert_eq!(prompt_for("bob"), "\"bob\" wants to join. Accept? [y/N]");
    }

    struct AllowAll;

    impl ApprovalSurface for AllowAll {
        fn decide<'a>(&'a self, _candidate: &'a str) -> BoxFuture<'a, bool> {
            Box::pin(async { true })
        }
    }

    #[tokio::test]
    async fn test_execute_commands() {
        let server = WhiteboardServer::new(ServerConfig::new("host"), Arc::new(AllowAll)).unwrap();
        assert_eq!(
            execute(&server, Command::List).await,
            "No active participants"
        );

        let handle = RecordingHandle::new();
        server
            .add_client(Uuid::new_v4(), "bob", handle.clone())
            .await
            .unwrap();
        assert!(execute(&server, Command::List).await.starts_with("Active (1): bob ("));
        assert_eq!(
            execute(&server, Command::Say("hello".into())).await,
            "Notice sent to 1 participant(s)"
        );
        assert_eq!(
            execute(&server, Command::Kick("bob".into())).await,
            "Removed bob"
        );
        assert_eq!(
            execute(&server, Command::Kick("bob".into())).await,
            "No participant named bob"
        );
        assert!(execute(&server, Command::Unknown("x".into())).await.contains("Commands:"));
    }

    #[test]
    fn test_format_roster() {
        assert_eq!(format_roster(&[]), "No active participants");
        let roster = vec![
            ("alice".to_string(), Duration::from_secs(75)),
            ("bob".to_string(), Duration::from_millis(2500)),
        ];
        assert_eq!(format_roster(&roster), "Active (2): alice (75s), bob (2s)");
    }

    struct Console {
        input: DuplexStream,
        output: Lines<BufReader<DuplexStream>>,
        task: JoinHandle<()>,
    }

    impl Console {
        async fn next_line(&mut self) -> String {
            tokio::time::timeout(Duration::from_secs(2), self.output.next_line())
                .await
                .unwrap()
                .unwrap()
                .unwrap()
        }

        async fn type_line(&mut self, line: &str) {
            self.input.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        }
    }

    fn console(admission_timeout: Duration) -> (Arc<WhiteboardServer>, Console) {
        let (approval, approvals) = ChannelApproval::new(4);
        let config = ServerConfig {
            admission_timeout,
            ..ServerConfig::new("host")
        };
        let server = WhiteboardServer::new(config, Arc::new(approval)).unwrap();

        let (input, input_rx) = tokio::io::duplex(1024);
        let (output_tx, output_rx) = tokio::io::duplex(4096);
        let task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                serve_console(&server, approvals, BufReader::new(input_rx), output_tx).await;
            })
        };
        let console = Console {
            input,
            output: BufReader::new(output_rx).lines(),
            task,
        };
        (server, console)
    }

    fn request(server: &Arc<WhiteboardServer>, name: &'static str) -> JoinHandle<bool> {
        let server = Arc::clone(server);
        tokio::spawn(async move { server.request_connection(name).await })
    }

    #[tokio::test]
    async fn test_console_answers_prompts() {
        let (server, mut console) = console(Duration::from_secs(5));

        let guest = request(&server, "guest");
        assert_eq!(console.next_line().await, prompt_for("guest"));
        console.type_line("yes").await;
        assert!(guest.await.unwrap());

        let other = request(&server, "other");
        assert_eq!(console.next_line().await, prompt_for("other"));
        console.type_line("n").await;
        assert!(!other.await.unwrap());

        console.task.abort();
    }

    #[tokio::test]
    async fn test_expired_prompt_frees_the_next_line() {
        let (server, mut console) = console(Duration::from_millis(100));

        let guest = request(&server, "guest");
        assert_eq!(console.next_line().await, prompt_for("guest"));
        assert_eq!(console.next_line().await, expired_notice("guest"));
        assert!(!guest.await.unwrap());

        console.type_line("list").await;
        assert_eq!(console.next_line().await, "No active participants");

        console.task.abort();
    }

    #[tokio::test]
    async fn test_queued_candidate_is_prompted_after_expiry() {
        let (server, mut console) = console(Duration::from_millis(150));

        let first = request(&server, "first");
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = request(&server, "second");

        assert_eq!(console.next_line().await, prompt_for("first"));
        assert_eq!(console.next_line().await, expired_notice("first"));
        assert_eq!(console.next_line().await, prompt_for("second"));
        console.type_line("y").await;

        assert!(!first.await.unwrap());
        assert!(second.await.unwrap());
        console.task.abort();
    }

    #[tokio::test]
    async fn test_closed_input_denies_pending() {
        let (server, mut console) = console(Duration::from_secs(5));

        let guest = request(&server, "guest");
        assert_eq!(console.next_line().await, prompt_for("guest"));
        drop(console.input);
        assert!(!guest.await.unwrap());

        console.task.abort();
    }
}
