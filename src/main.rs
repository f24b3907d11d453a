#![deny(dead_code)]
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{error, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;

mod utils;

use chatsync::config::{self, ChatConfig};
use chatsync::session::StaticSession;
use chatsync::transport::HttpTransport;
use chatsync::{ChatStore, DeliveryStatus, Message, MessageDraft, Notice, User};

/// Command line arguments for chatsync
#[derive(Parser, Debug)]
#[command(author, version, about = "chatsync: drive a one-to-one chat backend from the terminal.")]
struct Args {
    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// API base URL, e.g. http://localhost:5001/api
    #[arg(long)]
    api_url: Option<String>,

    /// Session token, sent as the `jwt` cookie
    #[arg(long)]
    token: Option<String>,

    /// Id of the signed-in user
    #[arg(long, value_name = "ID")]
    user_id: String,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List chat-eligible users
    Users,
    /// Print the conversation with a peer
    History { peer: String },
    /// Send a message to a peer
    Send {
        peer: String,
        text: String,
        #[arg(long)]
        image: Option<String>,
    },
}

fn print_message(msg: &Message, me: &str) {
    let who = if msg.sender_id == me { "me" } else { msg.sender_id.as_str() };
    let marker = match msg.status {
        DeliveryStatus::Sending => " (sending)",
        DeliveryStatus::Sent => "",
        DeliveryStatus::Failed => " (failed)",
    };
    println!(
        "[{}] {}: {}{}{}",
        msg.created_at.format("%Y-%m-%d %H:%M"),
        who,
        msg.text.as_deref().unwrap_or(""),
        msg.attachment.as_ref().map(|_| " [image]").unwrap_or(""),
        marker
    );
}

async fn run(store: &ChatStore, command: Command, me: &str) -> Result<()> {
    match command {
        Command::Users => {
            store.get_users().await?;
            for user in store.state().users {
                println!("{}\t{}\t{}", user.id, user.full_name, user.email);
            }
        }
        Command::History { peer } => {
            store.set_selected_user(Some(User::new(&peer, "")));
            store.get_messages(&peer).await?;
            for msg in store.state().messages {
                print_message(&msg, me);
            }
        }
        Command::Send { peer, text, image } => {
            store.set_selected_user(Some(User::new(&peer, "")));
            let mut draft = MessageDraft::text(&text);
            if let Some(image) = image {
                draft = draft.with_image(&image);
            }
            let confirmed = store
                .send_message(draft)
                .await?
                .ok_or_else(|| anyhow!("Message was not delivered"))?;
            print_message(&confirmed, me);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    utils::setup_logging(args.log_file.as_deref(), level)?;

    if let Some(path) = &args.config {
        config::set_config_path_override(path.clone());
    }
    let mut chat_config: ChatConfig = config::load_config()?;
    if let Some(url) = args.api_url {
        chat_config.api_url = url;
    }
    if let Some(token) = args.token {
        chat_config.auth_token = Some(token);
    }

    let transport = Arc::new(HttpTransport::new(&chat_config)?);
    let session = Arc::new(StaticSession::new(Some(User::new(&args.user_id, ""))));
    let (store, mut notices) =
        ChatStore::with_notice_capacity(transport, session, chat_config.notice_capacity);

    let outcome = run(&store, args.command, &args.user_id).await;

    while let Ok(notice) = notices.try_recv() {
        match notice {
            Notice::Error(text) => eprintln!("error: {}", text),
            Notice::SendFailed(temp_id) => eprintln!("error: message {} failed to send", temp_id),
        }
    }

    if let Err(e) = &outcome {
        error!("{}", e);
    }
    outcome
}
