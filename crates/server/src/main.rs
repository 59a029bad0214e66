mod config;
mod events;
mod server;
mod simulation;
mod transport;
mod tui;

use std::io;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use config::{Args, ServerConfig};
use events::ServerEvent;
use server::GameServer;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let headless = args.headless;
    let config: ServerConfig = args.into();
    let bind_addr = config.bind_addr.clone();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut server = GameServer::new(&bind_addr, config).await?;
    log::info!("server listening on {}", server.local_addr());

    if headless {
        server.run().await;
        log::info!("server shut down");
    } else {
        run_with_tui(&mut server).await?;
    }

    Ok(())
}

/// Interactive console mode (§10 "operational console"): drives the same
/// non-blocking [`GameServer::tick_once`] the headless loop uses, interleaved with
/// terminal rendering and keyboard input, rather than handing control to `run`.
async fn run_with_tui(server: &mut GameServer) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = server.running();

    while running.load(Ordering::SeqCst) {
        server.tick_once();

        for event in server.drain_events() {
            match event {
                ServerEvent::ClientConnecting { addr } => {
                    log::debug!("connection request from {addr}");
                }
                ServerEvent::ClientConnected { client_id, addr, entity_id } => {
                    log::info!("client {client_id} connected from {addr} as entity {entity_id}");
                }
                ServerEvent::ClientDisconnected { client_id, reason } => {
                    log::info!("client {client_id} {}", reason.as_str());
                }
                ServerEvent::ConnectionDenied { addr, reason } => {
                    log::warn!("connection denied to {addr}: {reason}");
                }
                ServerEvent::ClientKicked { client_id, reason } => {
                    log::warn!("client {client_id} kicked: {reason}");
                }
                ServerEvent::Error { message } => {
                    log::error!("{message}");
                }
            }
        }

        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    running.store(false, Ordering::SeqCst);
                }
            }
        }

        let stats = server.stats();
        let clients = server.client_infos();
        terminal.draw(|frame| {
            tui::render(frame, stats, &clients);
        })?;
    }

    server.shutdown_connections();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
