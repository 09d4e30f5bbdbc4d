use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use mousekit_core::{ChannelHandler, ControlConfig, ListenerConfig, MouseControl};
use mousekit_platform::{open_mouse, system_hook, Listener, Platform};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "mousekit")]
#[command(about = "Move, click and watch the system mouse", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the cursor position
    Position,

    /// Print the primary screen size
    ScreenSize,

    /// Move the cursor
    Move {
        #[arg(allow_hyphen_values = true)]
        x: i32,
        #[arg(allow_hyphen_values = true)]
        y: i32,
    },

    /// Press a button at a position
    Press {
        #[command(flatten)]
        target: Target,
    },

    /// Release a button at a position
    Release {
        #[command(flatten)]
        target: Target,
    },

    /// Press then release a button at a position
    Click {
        #[command(flatten)]
        target: Target,

        /// Pause between press and release, in milliseconds
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },

    /// Print observed mouse events as JSON lines
    Watch {
        /// Consume observed events instead of passing them on (pair with
        /// --duration-secs, the pointer stops reaching other programs)
        #[arg(long)]
        capture: bool,

        /// Stop after this many seconds (runs until interrupted otherwise)
        #[arg(short, long)]
        duration_secs: Option<u64>,

        /// Listener poll interval, in milliseconds
        #[arg(long, default_value = "10")]
        poll_ms: u64,
    },
}

#[derive(clap::Args, Debug)]
struct Target {
    #[arg(allow_hyphen_values = true)]
    x: i32,
    #[arg(allow_hyphen_values = true)]
    y: i32,

    /// Button identifier: 1 left, 2 right, 3 middle
    #[arg(short, long, default_value = "1")]
    button: u8,
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mousekit=info,mousekit_platform=info,mousekit_core=info".into()),
        )
        .try_init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Watch {
            capture,
            duration_secs,
            poll_ms,
        } => watch(
            ListenerConfig {
                poll_interval_ms: poll_ms,
                capture,
                ..Default::default()
            },
            duration_secs.map(Duration::from_secs),
        ),
        Command::Click {
            target,
            delay_ms,
        } => {
            let mouse = mouse(ControlConfig {
                click_delay_ms: delay_ms,
            })?;
            mouse
                .click_code(target.x, target.y, target.button)
                .context("click failed")
        }
        command => control(command),
    }
}

fn mouse(config: ControlConfig) -> Result<Box<dyn MouseControl>> {
    let platform = Platform::detect().context("no mouse backend for this system")?;
    open_mouse(platform, config).with_context(|| format!("failed to open {platform} mouse"))
}

fn control(command: Command) -> Result<()> {
    let mouse = mouse(ControlConfig::default())?;
    match command {
        Command::Position => {
            let position = mouse.position().context("failed to read cursor position")?;
            println!("{} {}", position.x, position.y);
        }
        Command::ScreenSize => {
            let size = mouse.screen_size().context("failed to read screen size")?;
            println!("{} {}", size.width, size.height);
        }
        Command::Move { x, y } => mouse.move_to(x, y).context("move failed")?,
        Command::Press { target } => mouse
            .press_code(target.x, target.y, target.button)
            .context("press failed")?,
        Command::Release { target } => mouse
            .release_code(target.x, target.y, target.button)
            .context("release failed")?,
        Command::Click { .. } | Command::Watch { .. } => bail!("not a control command"),
    }
    Ok(())
}

fn watch(config: ListenerConfig, duration: Option<Duration>) -> Result<()> {
    let (handler, events) = ChannelHandler::bounded(config.event_buffer.max(1));
    let capture = config.capture;

    let hook = system_hook().context("no mouse hook for this system")?;
    let handle = Listener::new(hook, handler)
        .with_config(config)
        .start()
        .context("failed to start mouse listener")?;
    info!(capture, "Watching mouse events");

    let deadline = duration.map(|d| Instant::now() + d);
    loop {
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                (deadline - now).min(Duration::from_millis(100))
            }
            None => Duration::from_millis(100),
        };
        match events.recv_timeout(wait) {
            Ok(event) => println!("{}", serde_json::to_string(&event)?),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    handle.stop();
    let faults = handle.faults();
    handle.join().context("mouse listener failed")?;
    for fault in faults {
        warn!(event = ?fault.event, "Handler fault: {}", fault.message);
    }
    Ok(())
}
