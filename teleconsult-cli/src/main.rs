use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use std::sync::Arc;
use teleconsult_client::{
    RoleProfile, SessionConfig, SessionController, SessionNotice, SyntheticSource, WsRendezvous,
};
use teleconsult_core::RoomCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "teleconsult")]
#[command(about = "Terminal harness for the consultation signaling core")]
struct Cli {
    /// Rendezvous server URL.
    #[arg(long, default_value = "ws://127.0.0.1:8443/ws")]
    server: String,

    /// Auth token passed to the rendezvous server.
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a consultation as the doctor: mints a room code and waits.
    Host {
        #[arg(long, default_value = "Dr. Demo")]
        name: String,

        #[arg(long, default_value = "general practice")]
        specialization: String,
    },

    /// Join an existing room as the patient.
    Join {
        /// Room code; prompted for when omitted.
        #[arg(long)]
        room: Option<String>,

        #[arg(long, default_value = "Demo Patient")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = SessionConfig {
        rendezvous_url: cli.server.clone(),
        auth_token: cli.token.clone(),
        ..Default::default()
    };
    let rendezvous = Arc::new(WsRendezvous::new(
        config.rendezvous_url.clone(),
        config.auth_token.as_deref(),
    ));

    let (profile, room) = match cli.command {
        Commands::Host {
            name,
            specialization,
        } => {
            let profile = RoleProfile::Doctor {
                name,
                specialization,
                bio: String::new(),
            };
            (profile, None)
        }
        Commands::Join { room, name } => {
            let code = match room {
                Some(code) => code,
                None => Input::new()
                    .with_prompt("Room code")
                    .interact_text()
                    .context("failed to read room code")?,
            };
            let room: RoomCode = code.parse().context("invalid room code")?;
            let profile = RoleProfile::Patient {
                name,
                id: 0,
                email: String::new(),
            };
            (profile, Some(room))
        }
    };

    let controller = SessionController::new(profile, config, rendezvous, Arc::new(SyntheticSource));
    let mut notices = controller
        .notices()
        .context("notice stream already taken")?;

    let room = match room {
        Some(room) => room,
        None => {
            let room = controller.host_room();
            println!(
                "{} {}",
                "📋 Room code:".cyan().bold(),
                room.to_string().yellow().bold()
            );
            room
        }
    };

    let summary = controller
        .join(room)
        .await
        .context("failed to join the room")?;
    println!(
        "{} joined as {} ({} in room)",
        "✅".green(),
        summary.role.to_string().bold(),
        summary.participant_count
    );

    loop {
        tokio::select! {
            notice = notices.recv() => {
                let Some(notice) = notice else { break };
                print_notice(&notice);
                if matches!(notice, SessionNotice::Closed) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Leaving the room...".cyan());
                controller.leave().await;
                break;
            }
        }
    }

    Ok(())
}

fn print_notice(notice: &SessionNotice) {
    match notice {
        SessionNotice::Joined {
            role,
            participant_count,
        } => println!("joined as {role}, {participant_count} in room"),
        SessionNotice::PeerJoined { role } => {
            println!("{} peer joined as {role}", "👋".green())
        }
        SessionNotice::Connected => println!("{}", "🔗 peer connection established".green()),
        SessionNotice::ChannelOpen => println!("{}", "💬 data channel open".green()),
        SessionNotice::Message(msg) => println!("📨 {msg:?}"),
        SessionNotice::ScanRequested => {
            println!("{}", "🩺 the doctor requested a face scan".cyan().bold())
        }
        SessionNotice::RemoteStreamChanged => println!("🎥 remote media updated"),
        SessionNotice::PeerLeft => println!("{}", "👋 peer left the room".yellow()),
        SessionNotice::Failure(err) => println!("{} {err}", "❌".red()),
        SessionNotice::Closed => println!("{}", "session closed".yellow()),
    }
}
