use clap::{App, Arg, SubCommand};
use colored::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use cansat_gcs::{
    list_available_ports, EventSeverity, EventSink, GcsConfig, SourceMode, TelemetryRecord,
    TelemetryService,
};

const DEFAULT_TICK_MS: &str = "500";

/// Console stand-in for the GUI: mission events go straight to the
/// operator's terminal.
struct ConsoleEventSink;

impl EventSink for ConsoleEventSink {
    fn on_event(&self, message: &str, severity: EventSeverity) {
        match severity {
            EventSeverity::Info => {
                println!("{} {}", "[MISSION]".bright_blue().bold(), message);
            }
            EventSeverity::Popup => {
                println!(
                    "{} {}",
                    "[MISSION]".bright_yellow().bold(),
                    message.bright_yellow().bold()
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("gcs")
        .version("0.1.0")
        .author("Team Phoenix Ground Segment")
        .about("CanSat ground control station - live serial telemetry with simulated fallback")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Serial endpoint to connect to (overrides config)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("baud")
                .short("b")
                .long("baud")
                .value_name("BAUD")
                .help("Serial baud rate (overrides config)")
                .takes_value(true)
                .validator(|v| {
                    v.parse::<u32>()
                        .map(|_| ())
                        .map_err(|_| "baud must be a number".into())
                }),
        )
        .arg(
            Arg::with_name("dummy")
                .long("dummy")
                .help("Force simulated telemetry"),
        )
        .arg(
            Arg::with_name("tick")
                .short("t")
                .long("tick")
                .value_name("MS")
                .help("Display refresh interval in milliseconds")
                .takes_value(true)
                .default_value(DEFAULT_TICK_MS)
                .validator(|v| {
                    v.parse::<u64>()
                        .map(|_| ())
                        .map_err(|_| "tick must be a number".into())
                }),
        )
        .subcommand(
            SubCommand::with_name("list-ports").about("List available serial endpoints and exit"),
        )
        .get_matches();

    if matches.subcommand_matches("list-ports").is_some() {
        let ports = list_available_ports();
        if ports.is_empty() {
            println!("{}", "No serial endpoints found.".yellow());
        } else {
            for port in ports {
                println!("{port}");
            }
        }
        return Ok(());
    }

    let mut config = match matches.value_of("config") {
        Some(path) => GcsConfig::load(Path::new(path))?,
        None => GcsConfig::default(),
    };
    if let Some(port) = matches.value_of("port") {
        config.port = Some(port.to_string());
    }
    if let Some(baud) = matches.value_of("baud") {
        config.baud_rate = baud.parse()?;
    }
    if matches.is_present("dummy") {
        config.use_dummy = true;
    }
    let tick_ms: u64 = matches.value_of("tick").unwrap_or(DEFAULT_TICK_MS).parse()?;

    // Endpoint selection: explicit flag or config wins; otherwise offer
    // what the host has and take the first one, like the GUI's selection
    // dialog defaults to.
    let selection = match (&config.port, config.use_dummy) {
        (Some(port), false) => Some(port.clone()),
        (_, true) => None,
        (None, false) => {
            let ports = list_available_ports();
            if ports.is_empty() {
                println!(
                    "{}",
                    "No serial endpoints found; running simulated mission.".yellow()
                );
                None
            } else {
                println!("{}", "Available endpoints:".bright_white());
                for port in &ports {
                    println!("  {port}");
                }
                let chosen = ports[0].clone();
                println!("Using {}", chosen.bright_cyan());
                Some(chosen)
            }
        }
    };

    let mut service = TelemetryService::new(config, Arc::new(ConsoleEventSink));
    service.start(selection.as_deref()).await;

    println!();
    println!(
        "{}",
        "  Time     | Alt (m)  | V/S (m/s) | Temp (C) | Press (hPa) | Batt (%) | GPS             | Mode"
            .bright_white()
            .bold()
    );
    println!(
        "{}",
        " ----------+----------+-----------+----------+-------------+----------+-----------------+------"
            .bright_white()
    );

    let mut ticker = time::interval(Duration::from_millis(tick_ms));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(record) = service.get_data() {
                    print_record(&record, service.mode());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Shutting down ground station...".bright_white());
                break;
            }
        }
    }

    service.stop();
    Ok(())
}

fn print_record(record: &TelemetryRecord, mode: SourceMode) {
    let altitude = format!("{:>8.1}", record.altitude);
    let vspeed = format!("{:>9.1}", record.vertical_speed);
    let temp = format!("{:>8.1}", record.temperature);
    let pressure = format!("{:>11.2}", record.pressure);
    let battery = if record.battery > 20.0 {
        format!("{:>8.2}", record.battery).green()
    } else {
        format!("{:>8.2}", record.battery).red()
    };
    let gps = format!("{:>7.4},{:>8.4}", record.gps.lat, record.gps.lon);
    let mode_str = match mode {
        SourceMode::Live => "LIVE".bright_green(),
        SourceMode::Simulated => "SIM".bright_yellow(),
    };

    println!(
        "  {} | {} | {} | {} | {} | {} | {} | {}",
        record.time, altitude, vspeed, temp, pressure, battery, gps, mode_str
    );
}
