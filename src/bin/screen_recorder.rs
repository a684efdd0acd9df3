use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use paceloop::capture::{self, RecordingConfig, Region};

/// Record the screen to an MJPEG AVI file
#[derive(Parser, Debug)]
#[command(name = "screen-recorder", version)]
struct Cli {
    /// Output file
    #[arg(short, long, default_value = "my_screen_record.avi")]
    output: PathBuf,

    /// Frames per second
    #[arg(long, default_value_t = 20.0)]
    fps: f64,

    /// Stop after this many seconds (default: until 'q' is pressed)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Region to capture as top,left,width,height (default: primary monitor)
    #[arg(long, allow_hyphen_values = true)]
    region: Option<Region>,

    /// JPEG quality, 1-100
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,
}

impl Cli {
    fn config(&self) -> Result<RecordingConfig, String> {
        let duration = match self.duration {
            Some(secs) => Some(
                Duration::try_from_secs_f64(secs)
                    .map_err(|_| format!("invalid duration: {}", secs))?,
            ),
            None => None,
        };
        Ok(RecordingConfig {
            output_path: self.output.clone(),
            fps: self.fps,
            duration,
            region: self.region,
            quality: self.quality,
        })
    }
}

/// Stop keys are read in raw mode, where `\n` does not return the cursor
fn log_line(record: &log::Record) -> String {
    format!("[{} {}] {}\r\n", record.level(), record.target(), record.args())
}

fn init_logger() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| buf.write_all(log_line(record).as_bytes()))
        .init();
}

fn main() {
    init_logger();
    let cli = Cli::parse();
    let config = match cli.config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(2);
        }
    };

    println!("Starting screen recording to '{}'...", config.output_path.display());
    println!("Press 'q' to stop recording manually (if no duration is set).");
    match capture::record_screen(&config) {
        Ok(summary) => println!(
            "Recording finished. Saved {} frames to '{}'.",
            summary.frames,
            config.output_path.display()
        ),
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    }
}
