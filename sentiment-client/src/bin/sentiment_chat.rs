/// Sentiment Chat
///
/// Line oriented terminal chat with the sentiment bot. Identifies as `SUBSCRIBER_ID`
/// (default: local) on the server at `WS_URL` (default: ws://127.0.0.1:9001).
use sentiment_bot::protocol::ServerMessage;
use sentiment_client::{
    ChatClient, ChatClientConfig, ConnectionStatus, HELP, Input, parse_line,
};
use std::error::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr so they never interleave with chat output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ChatClientConfig::from_env();
    println!(
        "Connecting to {} as {} (type /help for commands)",
        config.url, config.subscriber
    );

    let mut handle = ChatClient::new(config)?.start();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(Some(Input::Command(command))) => {
                        if handle.commands.send(command).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(Input::Help)) => println!("{HELP}"),
                    Ok(Some(Input::Quit)) => break,
                    Ok(None) => {}
                    Err(error) => println!("{error}"),
                }
            }
            Some(message) = handle.messages.recv() => print_message(&message),
            Some(status) = handle.status.recv() => match status {
                ConnectionStatus::Connected => println!("[connected]"),
                ConnectionStatus::Disconnected => println!("[disconnected]"),
                ConnectionStatus::Reconnecting => {}
            },
        }
    }

    Ok(())
}

fn print_message(message: &ServerMessage) {
    match message {
        ServerMessage::Welcome { message, .. } => println!("{message}"),
        ServerMessage::Reply { text, .. } => println!("\n{text}\n"),
        ServerMessage::Notification { text, .. } => println!("\n[notification]\n{text}\n"),
        ServerMessage::Error { text } => println!("Error: {text}"),
    }
}
