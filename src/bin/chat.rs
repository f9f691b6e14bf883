//! Terminal front end: log in (or sign up), join the room, chat, leave.

use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use lobbychat::{
    ChatError, ChatSession, LeaveKind, LeaveOutcome,
    accounts::AccountClient,
    config::DEFAULT_STORE_URL,
    store::RestStore,
    sync::ChatView,
    telemetry,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "lobbychat", about = "Join the shared chat room from a terminal")]
struct Args {
    /// Base url of the collection store
    #[arg(long, env = "CHAT_STORE_URL", default_value = DEFAULT_STORE_URL)]
    store_url: String,

    /// Asked for on stdin when omitted
    #[arg(short, long)]
    username: Option<String>,

    /// Create the account before logging in
    #[arg(long)]
    signup: bool,

    /// Also refresh every N seconds instead of only after sending
    #[arg(long, env = "CHAT_POLL_SECS", value_parser = clap::value_parser!(u64).range(1..))]
    poll_secs: Option<u64>,
}

fn render(view: &ChatView) {
    println!("----");
    for msg in &view.messages {
        println!("{}: {}", msg.sender, msg.body);
    }
    println!("[active: {}]", view.roster.join(", "));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    telemetry::init_tracing("warn")?;
    let args = Args::parse();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let username = match args.username {
        Some(username) => username,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(b"Username: ").await?;
            stdout.flush().await?;
            lines.next_line().await?.unwrap_or_default()
        }
    };

    let store = RestStore::new(args.store_url);
    let accounts = AccountClient::new(store.clone());
    if args.signup {
        accounts.sign_up(&username).await.context("signing up")?;
        println!("User registered successfully!");
    }
    if accounts.login(&username).await.context("logging in")?.is_none() {
        bail!("invalid username {username:?}");
    }

    let session = ChatSession::new(store);
    session.join(&username).await.context("joining the chat")?;
    if let Some(secs) = args.poll_secs {
        session.start_polling(Duration::from_secs(secs))?;
    }

    let mut views = session.subscribe();
    render(&views.borrow_and_update());
    let renderer = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            render(&views.borrow_and_update());
        }
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut draft: Option<String> = None;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut ctrl_c => break,
        };
        let Some(line) = line else {
            break;
        };

        let body = match line.trim() {
            "/quit" => break,
            "/refresh" => {
                let result = tokio::select! {
                    result = session.refresh() => result,
                    _ = &mut ctrl_c => break,
                };
                if let Err(e) = result {
                    eprintln!("refresh failed: {e}");
                }
                continue;
            }
            "/retry" => match draft.take() {
                Some(body) => body,
                None => continue,
            },
            _ => line,
        };

        // an interrupted send may or may not have reached the store
        let result = tokio::select! {
            result = session.publish(&body) => result,
            _ = &mut ctrl_c => break,
        };
        match result {
            Ok(()) => {}
            Err(ChatError::InvalidInput(_)) => {}
            Err(e) => {
                eprintln!("message not sent: {e} (type /retry to resend)");
                draft = Some(body);
            }
        }
    }

    let outcome = session.leave(LeaveKind::Graceful).await;
    debug!(?outcome, "left");
    renderer.abort();
    if let LeaveOutcome::DeregisterFailed(e) = outcome {
        eprintln!("could not remove you from the active users: {e}");
    }
    println!("You have been removed from the chat.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_zero_poll_interval_is_refused() {
        let err = Args::try_parse_from(["lobbychat", "--poll-secs", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let args = Args::try_parse_from(["lobbychat", "--poll-secs", "3"]).unwrap();
        assert_eq!(args.poll_secs, Some(3));
    }
}
