//! Command-line argument parsing

use std::path::PathBuf;

use clap::Parser;

/// Get default config path help text for current platform
fn default_config_help() -> String {
    #[cfg(target_os = "linux")]
    return "Settings file path (default: ~/.config/voxroom/network.json)".to_string();

    #[cfg(target_os = "macos")]
    return "Settings file path (default: ~/Library/Application Support/voxroom/network.json)"
        .to_string();

    #[cfg(target_os = "windows")]
    return "Settings file path (default: %APPDATA%\\voxroom\\network.json)".to_string();

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    return "Settings file path (overrides platform default)".to_string();
}

/// Parse a probability in `[0, 1]`
fn parse_probability(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("{} is not between 0.0 and 1.0", value));
    }
    Ok(value)
}

/// voxroom loopback session
///
/// Opens an in-process chatroom, streams a generated tone from the host to
/// every guest, and reports what each guest received.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Number of peers in the room, including the host
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(2..=64))]
    pub peers: u16,

    /// Number of audio segments the host sends
    #[arg(short, long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..=1_000_000))]
    pub segments: u32,

    /// Sample rate in Hz
    #[arg(short = 'r', long, default_value_t = 48000, value_parser = clap::value_parser!(u32).range(8000..=192_000))]
    pub sample_rate: u32,

    /// Number of interleaved channels
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..=8))]
    pub channels: u16,

    /// Segment duration in milliseconds
    #[arg(short, long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub frame_ms: u32,

    /// Probability of dropping each unreliable delivery (0.0 - 1.0)
    #[arg(short, long, default_value_t = 0.0, value_parser = parse_probability)]
    pub loss: f64,

    /// Settings file path (overrides platform default)
    #[arg(long, help = default_config_help())]
    pub config: Option<PathBuf>,

    /// Enable debug logging (shows membership changes and sequence gaps)
    #[arg(long, default_value = "false")]
    pub debug: bool,
}
