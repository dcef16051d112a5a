// Calibration and streaming example
//
// Opens the first SDS 200A, walks through the offset calibration and then
// streams raw sample transfers for a few seconds.

use clap::Parser;
use sds200a_rs::{CancelToken, Channel, ErrorKind, RawSampleBuffer, SdsConnector};
use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "calibrate")]
#[command(version = "1.0")]
#[command(about = "Calibrate a SDS 200A and stream raw samples")]
struct Args {
    /// Zero offset of channel 1, skips its search
    #[arg(long, allow_hyphen_values = true)]
    zero1: Option<f64>,

    /// Zero offset of channel 2, skips its search
    #[arg(long, allow_hyphen_values = true)]
    zero2: Option<f64>,

    /// How long to stream after calibration
    #[arg(short, long, default_value_t = 2, help = "Streaming duration in seconds")]
    seconds: u64,

    /// Write the first sample transfer to this CSV file
    #[arg(long)]
    csv: Option<std::path::PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

fn wait_for_enter() -> io::Result<()> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let mut devices = SdsConnector::enumerate()?;
    let descriptor = devices.descriptors()[0];
    let mut scope = devices.open(&descriptor)?;
    println!(
        "Successfully opened a SDS 200A at Bus {}, Port {}",
        descriptor.bus_number, descriptor.port_number
    );
    drop(devices);

    println!("--- Calibration");
    if args.zero1.is_none() || args.zero2.is_none() {
        println!("For each probe connect both conductors of the coaxial cord with each other.");
        println!("If you are ready, press Enter.");
        wait_for_enter()?;
    }
    scope.calibrate_offset(args.zero1, args.zero2)?;

    match scope.calibrate_scale() {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotSupported => {
            println!("Scale calibration is not available yet, keeping uV/tick at 0");
        }
        Err(e) => return Err(e.into()),
    }

    let calibration = scope.calibration()?;
    println!("Calibration data:");
    println!("Channel Zero       uv_per_ticks");
    for channel in Channel::ALL {
        println!(
            "   {}    {:>9.6}  {}",
            channel.number(),
            calibration.zero(channel),
            calibration.uv_per_tick(channel)
        );
    }

    if let Some(path) = &args.csv {
        let samples = scope.raw_samples()?;
        samples.write_csv(std::fs::File::create(path)?)?;
        println!("Wrote {} samples to {}", samples.len(), path.display());
    }

    println!("\nStreaming for {}s...", args.seconds);
    let cancel = CancelToken::new();
    let timer = {
        let cancel = cancel.clone();
        let duration = Duration::from_secs(args.seconds);
        thread::spawn(move || {
            thread::sleep(duration);
            cancel.cancel();
        })
    };

    let mut transfers = 0usize;
    let mut bytes = 0usize;
    for chunk in scope.stream(cancel) {
        let chunk = chunk?;
        transfers += 1;
        bytes += chunk.len();
        if let Ok(samples) = RawSampleBuffer::from_bytes(&chunk) {
            print!(
                "\r {:04} {:04}",
                samples.first(Channel::Ch1).unwrap_or(0),
                samples.first(Channel::Ch2).unwrap_or(0)
            );
        }
    }
    let _ = timer.join();

    println!("\nReceived {} transfers, {} bytes", transfers, bytes);
    scope.close();
    Ok(())
}
