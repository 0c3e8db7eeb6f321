use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::warn;

use dslr_tether::config::Config;
use dslr_tether::cr2;
use dslr_tether::edsdk::dynamic::{default_library_name, DynamicSdk};
use dslr_tether::prep;
use dslr_tether::session::{list_cameras, ErrorPolicy, Session, SessionOptions};
use dslr_tether::viewer::{self, ViewerOptions};

/// Parse and validate the window upscale factor (1, 2 or 4)
fn parse_scale(s: &str) -> Result<u32, String> {
    let scale: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid scale factor", s))?;
    if ![1, 2, 4].contains(&scale) {
        return Err(format!("Scale must be 1, 2 or 4, got {}", scale));
    }
    Ok(scale)
}

/// Parse and validate the grid pitch (10-1000 pixels)
fn parse_pitch(s: &str) -> Result<i32, String> {
    let pitch: i32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid grid pitch", s))?;
    if !(10..=1000).contains(&pitch) {
        return Err(format!("Grid pitch must be between 10 and 1000, got {}", pitch));
    }
    Ok(pitch)
}

/// dslr-tether: live view and tethered capture for Canon DSLRs
#[derive(Parser)]
#[command(name = "dslr-tether")]
#[command(version, about = "Tethered live view and capture for Canon DSLRs")]
#[command(long_about = "Stream the live preview from a Canon DSLR with a calibration \
    grid and exposure readout, adjust ISO/aperture/shutter from the keyboard, \
    capture RAW stills, and pull them straight off the card.")]
#[command(after_help = "EXAMPLES:
    # Start the live view with the default settings
    dslr-tether live

    # Double grid pitch on a 4x window, keep going through SDK errors
    dslr-tether live --pitch 200 --scale 4 --debug

    # See which bodies are attached
    dslr-tether list-cameras

    # Normalize a converted RAW frame and look for tilted lines
    dslr-tether prep shot.tiff --lines

    # Where does the RAW section of a CR2 start?
    dslr-tether inspect IMG_4679.CR2")]
struct Cli {
    /// Log SDK errors and keep going instead of exiting
    #[arg(long, global = true)]
    debug: bool,

    /// Make this tool a chatterbox
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream the live preview with the calibration overlay
    #[command(after_help = "KEYS (while running):
    space   capture RAW and download it
    m       save the current preview frame
    a/q     ISO down/up
    s/w     aperture down/up
    d/e     shutter down/up
    Esc/x   quit and clean up")]
    Live {
        /// Custom config file path (default: ~/.config/dslr-tether/config.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Window upscale factor: 1, 2 or 4
        #[arg(long, short = 's', value_parser = parse_scale)]
        scale: Option<u32>,

        /// Calibration grid pitch in pixels
        #[arg(long, short = 'p', value_parser = parse_pitch)]
        pitch: Option<i32>,

        /// Directory captured stills are downloaded into
        #[arg(long)]
        images_dir: Option<PathBuf>,

        /// Path of the EDSDK dynamic library
        #[arg(long)]
        library: Option<PathBuf>,
    },

    /// List attached camera bodies
    ListCameras {
        /// Path of the EDSDK dynamic library
        #[arg(long)]
        library: Option<PathBuf>,
    },

    /// Normalize a converted RAW frame and display it
    Prep {
        /// The image file to process
        file: PathBuf,

        /// Detect straight lines and annotate their slopes
        #[arg(long)]
        lines: bool,
    },

    /// Report a CR2 file's header and RAW section offset
    Inspect {
        /// The CR2 file to inspect
        file: PathBuf,
    },
}

/// Display formatted startup status showing current settings
fn print_startup_status(camera: Option<&str>, options: &ViewerOptions) {
    println!();
    println!("┌─────────────────────────────────────────┐");
    println!("│         dslr-tether v{:<19}│", env!("CARGO_PKG_VERSION"));
    println!("├─────────────────────────────────────────┤");
    println!("│  Camera:   {:<28} │", camera.unwrap_or("(name unavailable)"));
    println!("│  Images:   {:<28} │", options.images_dir.display().to_string());
    println!("│  Preview:  {:<28} │", options.preview_path.display().to_string());
    println!(
        "│  Grid:     {:<28} │",
        format!("{} px, {}x window", options.grid_pitch, options.scale)
    );
    println!("├─────────────────────────────────────────┤");
    println!("│  KEYS                                   │");
    println!("│    space   capture RAW + download       │");
    println!("│    m       save preview frame           │");
    println!("│    a/q     ISO down/up                  │");
    println!("│    s/w     aperture down/up             │");
    println!("│    d/e     shutter down/up              │");
    println!("│    Esc/x   quit                         │");
    println!("└─────────────────────────────────────────┘");
    println!();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, String> {
    // If --config is specified, require the file to exist.
    // Otherwise, fall back to defaults if the default config is not found.
    match path {
        Some(path) => Config::load_from_explicit(path).map_err(|e| e.to_string()),
        None => match Config::load(None) {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                eprintln!("Using default settings.\n");
                Ok(Config::default())
            }
        },
    }
}

fn load_sdk(cli_path: Option<PathBuf>, config: &Config) -> Result<DynamicSdk, String> {
    let path = cli_path
        .or_else(|| config.sdk.library.clone())
        .unwrap_or_else(|| PathBuf::from(default_library_name()));
    DynamicSdk::load(&path).map_err(|e| {
        format!(
            "Failed to load the EDSDK library from '{}': {}\n\n\
             Install the Canon EDSDK and point --library (or [sdk].library in \
             the config file) at it.",
            path.display(),
            e
        )
    })
}

#[allow(clippy::too_many_arguments)]
fn run_live(
    config_path: Option<PathBuf>,
    scale: Option<u32>,
    pitch: Option<i32>,
    images_dir: Option<PathBuf>,
    library: Option<PathBuf>,
    debug: bool,
) -> Result<(), String> {
    let config = load_config(config_path.as_ref())?;

    // Merge settings: CLI args > config file > built-in defaults
    let viewer_options = ViewerOptions {
        scale: scale.or(config.overlay.scale).unwrap_or(2),
        poll: Duration::from_millis(config.timing.poll_ms.unwrap_or(100)),
        preview_path: config
            .paths
            .preview_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("preview.jpg")),
        images_dir: images_dir
            .or_else(|| config.paths.images_dir.clone())
            .unwrap_or_else(|| PathBuf::from("images")),
        grid_pitch: pitch.or(config.overlay.grid_pitch).unwrap_or(100),
    };
    let session_options = SessionOptions {
        settle_delay: Duration::from_secs(config.timing.settle_secs.unwrap_or(2)),
        capture_delay: Duration::from_secs(config.timing.capture_secs.unwrap_or(6)),
        buffer_capacity: 3
            * u64::from(config.camera.max_width.unwrap_or(4272))
            * u64::from(config.camera.max_height.unwrap_or(2848)),
    };

    let sdk = load_sdk(library, &config)?;
    let policy = if debug {
        ErrorPolicy::Continue
    } else {
        ErrorPolicy::FailFast
    };
    let mut session = Session::new(sdk, session_options).with_policy(policy);

    if let Err(e) = viewer::setup_interrupt_handler() {
        eprintln!("Warning: Could not set up Ctrl+C handler: {}", e);
    }

    if let Err(e) = session.initialize() {
        // Release whatever was acquired before the failure.
        if let Err(cleanup_err) = session.cleanup() {
            eprintln!("Warning: {}", cleanup_err);
        }
        return Err(e.to_string());
    }
    print_startup_status(session.camera_name().as_deref(), &viewer_options);

    // Teardown runs on every exit path, including a failed loop.
    let run_result = viewer::run_live(&mut session, &viewer_options);
    let cleanup_result = session.cleanup();

    run_result.map_err(|e| e.to_string())?;
    cleanup_result.map_err(|e| e.to_string())?;
    println!("Live view stopped.");
    Ok(())
}

fn run_list_cameras(library: Option<PathBuf>) -> Result<(), String> {
    let config = load_config(None)?;
    let sdk = load_sdk(library, &config)?;
    let names = list_cameras(&sdk).map_err(|e| e.to_string())?;
    if names.is_empty() {
        println!("No cameras attached.");
        return Ok(());
    }
    println!("Attached cameras:");
    for (index, name) in names.iter().enumerate() {
        println!("  [{}] {}", index, name);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if cli.debug {
        warn!("debug mode: SDK errors are logged and ignored");
    }

    let result = match cli.command {
        Some(Commands::Live {
            config,
            scale,
            pitch,
            images_dir,
            library,
        }) => run_live(config, scale, pitch, images_dir, library, cli.debug),
        Some(Commands::ListCameras { library }) => run_list_cameras(library),
        Some(Commands::Prep { file, lines }) => {
            prep::run_prep(&file, lines).map_err(|e| e.to_string())
        }
        Some(Commands::Inspect { file }) => cr2::run_inspect(&file).map_err(|e| e.to_string()),
        None => {
            // Show brief help when no command is provided
            println!("dslr-tether {}", env!("CARGO_PKG_VERSION"));
            println!("Tethered live view and capture for Canon DSLRs\n");
            println!("USAGE:");
            println!("    dslr-tether <COMMAND>\n");
            println!("COMMANDS:");
            println!("    live          Stream the live preview with the calibration overlay");
            println!("    list-cameras  List attached camera bodies");
            println!("    prep          Normalize a converted RAW frame and display it");
            println!("    inspect       Report a CR2 file's header");
            println!("    help          Print this message or the help of a subcommand\n");
            println!("Run 'dslr-tether --help' for more details and examples.");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Scale parsing tests

    #[test]
    fn test_parse_scale_valid() {
        assert_eq!(parse_scale("1").unwrap(), 1);
        assert_eq!(parse_scale("2").unwrap(), 2);
        assert_eq!(parse_scale("4").unwrap(), 4);
    }

    #[test]
    fn test_parse_scale_invalid() {
        assert!(parse_scale("3").is_err());
        assert!(parse_scale("0").is_err());
        assert!(parse_scale("8").is_err());
        assert!(parse_scale("two").is_err());
        assert!(parse_scale("").is_err());
    }

    #[test]
    fn test_parse_scale_error_message() {
        let err = parse_scale("3").unwrap_err();
        assert!(err.contains("must be 1, 2 or 4"));
        assert!(err.contains('3'));
    }

    // Grid pitch parsing tests

    #[test]
    fn test_parse_pitch_valid() {
        assert_eq!(parse_pitch("100").unwrap(), 100);
        assert_eq!(parse_pitch("10").unwrap(), 10);
        assert_eq!(parse_pitch("1000").unwrap(), 1000);
    }

    #[test]
    fn test_parse_pitch_out_of_range() {
        assert!(parse_pitch("9").is_err());
        assert!(parse_pitch("1001").is_err());
        assert!(parse_pitch("-100").is_err());
        assert!(parse_pitch("abc").is_err());
    }

    // Merge logic tests

    #[test]
    fn test_scale_merge_cli_beats_config() {
        // This mirrors the logic in run_live()
        let cli: Option<u32> = Some(4);
        let config: Option<u32> = Some(1);
        assert_eq!(cli.or(config).unwrap_or(2), 4);
    }

    #[test]
    fn test_scale_merge_config_beats_default() {
        let cli: Option<u32> = None;
        let config: Option<u32> = Some(1);
        assert_eq!(cli.or(config).unwrap_or(2), 1);
    }

    #[test]
    fn test_scale_merge_default() {
        let cli: Option<u32> = None;
        let config: Option<u32> = None;
        assert_eq!(cli.or(config).unwrap_or(2), 2);
    }

    #[test]
    fn test_buffer_capacity_from_camera_dims() {
        // Defaults are the Rebel XSi maximums: 3 channels at 4272x2848.
        let capacity = 3u64 * 4272 * 2848;
        assert_eq!(capacity, 36_499_968);
    }
}
