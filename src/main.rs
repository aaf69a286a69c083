//! wchlink - flash, dump and debug a CH582 through a WCH-LinkE probe

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use wchlink::{
    CancelToken, Context, DumpRequest, Operation, Rail, Session, SessionConfig, Speed, Transport,
};

/// Parse a `BUS:ADDRESS` device location
fn parse_location(s: &str) -> Result<(u8, u8), String> {
    let (bus, address) = s
        .split_once(':')
        .ok_or_else(|| format!("Expected BUS:ADDRESS, got '{}'", s))?;
    let bus = bus
        .parse::<u8>()
        .map_err(|e| format!("Invalid bus number: {}", e))?;
    let address = address
        .parse::<u8>()
        .map_err(|e| format!("Invalid device address: {}", e))?;
    Ok((bus, address))
}

fn parse_speed(s: &str) -> Result<Speed, String> {
    s.parse::<Speed>().map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "wchlink")]
#[command(version, about = "Flash, dump and debug a CH582 through a WCH-LinkE", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Flash a .bin file. If no file is given, a blinky is flashed
    #[arg(long, value_name = "FILE")]
    flash: Option<Option<PathBuf>>,

    /// Dump memory at this (hexadecimal) address, use with --length to fetch more bytes
    #[arg(long, value_name = "ADDRESS")]
    dump: Option<String>,

    /// Number of bytes to dump (decimal or 0x-prefixed hexadecimal)
    #[arg(long, requires = "dump")]
    length: Option<String>,

    /// Open the debug interface terminal
    #[arg(long)]
    terminal: bool,

    /// Toggle the 3.3V line, to turn the chip off and on again
    #[arg(long = "toggle-3v")]
    toggle_3v: bool,

    /// Toggle the 5V line, to turn the chip off and on again
    #[arg(long = "toggle-5v")]
    toggle_5v: bool,

    /// Reset the target
    #[arg(long)]
    reset: bool,

    /// Link speed: fast, medium, slow (or 6000, 4000, 400 kHz)
    #[arg(long, default_value = "medium", value_parser = parse_speed)]
    speed: Speed,

    /// USB transfer timeout in milliseconds
    #[arg(long, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: u64,

    /// Pause between idle terminal polls in milliseconds
    #[arg(long, default_value_t = 0)]
    poll_interval_ms: u64,

    /// Use the probe at BUS:ADDRESS when more than one is connected
    #[arg(long, value_parser = parse_location)]
    device: Option<(u8, u8)>,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logger
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Reject malformed input before touching the probe
    let dump = cli
        .dump
        .as_deref()
        .map(|address| DumpRequest::parse(address, cli.length.as_deref()))
        .transpose()?;
    let image = match &cli.flash {
        Some(Some(path)) => {
            let image = std::fs::read(path)?;
            log::info!("Flashing {} (len={})", path.display(), image.len());
            Some(image)
        }
        Some(None) => {
            log::info!("Flashing blinky example");
            Some(wchlink::BLINK_IMAGE.to_vec())
        }
        None => None,
    };

    let config = SessionConfig::new()
        .with_speed(cli.speed)
        .with_timeout(Duration::from_millis(cli.timeout_ms))
        .with_poll_interval(Duration::from_millis(cli.poll_interval_ms));

    let context = Context::new()?;
    let probe = context.pick_probe(cli.device)?;
    let mut session = probe.open(&context, config)?;

    session.attach_probe()?;
    if cli.toggle_3v {
        session.power_cycle(Rail::V33)?;
    }
    if cli.toggle_5v {
        session.power_cycle(Rail::V5)?;
    }
    session.attach_chip()?;

    if let Some(image) = image {
        flash(&mut session, &image)?;
        session.reset()?;
        if cli.terminal {
            terminal(&mut session)?;
        }
    } else if cli.reset {
        session.reset()?;
        if cli.terminal {
            terminal(&mut session)?;
        }
    } else if cli.terminal {
        terminal(&mut session)?;
    } else if let Some(request) = dump {
        println!("{}", session.dump(&request)?);
    } else if !(cli.toggle_3v || cli.toggle_5v) {
        log::info!("Flashing blinky example");
        flash(&mut session, wchlink::BLINK_IMAGE)?;
        session.reset()?;
    }

    log::info!("Done");
    Ok(())
}

fn flash<T: Transport>(session: &mut Session<T>, image: &[u8]) -> wchlink::Result<()> {
    let mut operation = session.flash(image)?;
    let total = operation.total();
    while let Some(phase) = operation.next_phase() {
        if let Some(result) = operation.next() {
            let completed = result?;
            log::debug!("{} done ({}/{})", phase, completed, total);
        }
    }
    Ok(())
}

fn terminal<T: Transport>(session: &mut Session<T>) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    session.open_terminal(&mut output, &cancel)?;
    println!();
    Ok(())
}
