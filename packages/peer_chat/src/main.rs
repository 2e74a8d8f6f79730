use std::io::Write;
use std::net::{IpAddr, UdpSocket};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use peer_session::{Listener, Message, PeerIdentity, SessionConfig, SessionIo, SessionManager};

mod config;
use config::FileConfig;

/// Peer-to-peer line chat over TCP.
#[derive(Parser, Debug)]
#[command(name = "peerchat")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Display name attached to your messages
    #[arg(long)]
    name: Option<String>,
    /// Port to dial and listen on
    #[arg(long)]
    port: Option<u16>,
    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

const MENU: &str = "\
Welcome!
1. Connect to a person
2. Wait for someone to connect
3. Exit
Select what to do: ";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging; chat output itself goes straight to stdout.
    let default_directive = if args.debug {
        "peer_chat=debug,peer_session=debug"
    } else {
        "peer_chat=warn,peer_session=warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut file_config = FileConfig::load(args.config.as_deref())?;
    if let Some(name) = args.name {
        file_config.name = name;
    }
    if let Some(port) = args.port {
        file_config.port = port;
    }
    let config = file_config.session_config();
    debug!(?config, "configuration loaded");

    // All terminal input flows through one router thread; the menu and the
    // active session both read from this channel.
    let mut stdin_rx = spawn_stdin_router();

    loop {
        print!("{MENU}");
        std::io::stdout().flush().ok();
        let Some(choice) = stdin_rx.recv().await else {
            break;
        };
        match choice.trim() {
            "1" => {
                if let Err(error) = run_dial_session(&config, &mut stdin_rx).await {
                    println!("Connection error: {error:#}");
                }
            }
            "2" => {
                if let Err(error) = run_listen_session(&config, &mut stdin_rx).await {
                    println!("Connection error: {error:#}");
                }
            }
            "3" => break,
            _ => println!("Error! Incorrect input, try again"),
        }
    }

    Ok(())
}

/// Forward terminal lines into a channel from a dedicated thread. A blocked
/// stdin read cannot be retracted, so the thread owns it for the whole run.
fn spawn_stdin_router() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn prompt(stdin_rx: &mut mpsc::Receiver<String>, text: &str) -> Result<String> {
    print!("{text}");
    std::io::stdout().flush().ok();
    stdin_rx.recv().await.context("standard input closed")
}

/// Menu option 1: dial a peer by name and address.
async fn run_dial_session(
    config: &SessionConfig,
    stdin_rx: &mut mpsc::Receiver<String>,
) -> Result<()> {
    let name = prompt(stdin_rx, "Enter the person's name: ").await?;
    let host = prompt(stdin_rx, "Enter the person's address: ").await?;
    let peer = PeerIdentity::resolve(name.trim(), host.trim(), config.port).await?;

    let (io, line_tx, printer) = session_io();
    let mut session = SessionManager::new(config.clone());

    // Ctrl-C while dialing aborts the retries instead of the process.
    let cancel = session.cancel_handle();
    let guard = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let connected = session.connect(peer, io).await;
    guard.abort();
    connected?;

    println!("Connected! Start sending messages now!");
    run_session(session, line_tx, stdin_rx).await;
    printer.await.ok();
    Ok(())
}

/// Menu option 2: wait for a peer to dial in.
async fn run_listen_session(
    config: &SessionConfig,
    stdin_rx: &mut mpsc::Receiver<String>,
) -> Result<()> {
    match local_ipv4_address() {
        Some(ip) => println!("Your IP address is {ip}"),
        None => warn!("could not determine a local address"),
    }

    let listener = Listener::bind(config.port)
        .await
        .context("failed to bind the chat port")?;
    println!("Waiting for connection...");

    let (io, line_tx, printer) = session_io();
    let mut session = SessionManager::new(config.clone());

    let prompt_rx = &mut *stdin_rx;
    let peer = session
        .listen(listener, io, move |_addr| async move {
            print!("Enter the person's name: ");
            std::io::stdout().flush().ok();
            prompt_rx.recv().await.ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "standard input closed")
            })
        })
        .await?;

    println!("Connected to {}! Start conversation now!", peer.name);
    run_session(session, line_tx, stdin_rx).await;
    printer.await.ok();
    Ok(())
}

/// Channels for one session plus the task printing incoming messages.
fn session_io() -> (SessionIo, mpsc::Sender<String>, JoinHandle<()>) {
    let (line_tx, line_rx) = mpsc::channel(16);
    let (display_tx, mut display_rx) = mpsc::channel::<Message>(16);
    let printer = tokio::spawn(async move {
        while let Some(message) = display_rx.recv().await {
            println!("{message}");
        }
    });
    (
        SessionIo {
            input: line_rx,
            display: display_tx,
        },
        line_tx,
        printer,
    )
}

/// Feed terminal lines into the session until it ends, stdin closes, or the
/// user hits Ctrl-C, then wait out both exchangers.
async fn run_session(
    mut session: SessionManager,
    line_tx: mpsc::Sender<String>,
    stdin_rx: &mut mpsc::Receiver<String>,
) {
    let ending = session.cancel_handle();
    loop {
        tokio::select! {
            _ = ending.cancelled() => break,
            _ = tokio::signal::ctrl_c() => {
                ending.cancel();
                break;
            }
            line = stdin_rx.recv() => match line {
                Some(line) => {
                    if line_tx.send(line).await.is_err() {
                        break;
                    }
                }
                // stdin closed: this is the local end-of-stream
                None => break,
            },
        }
    }

    // dropping our sender is the outbound exchanger's end-of-stream
    drop(line_tx);
    session.wait().await;
    println!("Connection terminated.");
}

/// Best-effort local IPv4 discovery: route a UDP socket toward a public
/// address and read back the source address the OS picked. Nothing is sent.
fn local_ipv4_address() -> Option<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect(("8.8.8.8", 80)).ok()?;
    Some(socket.local_addr().ok()?.ip())
}
