//! # Badgekit CLI
//!
//! Command-line access to the template engine, mostly for inspecting stored
//! configurations and markup.
//!
//! ## Usage
//!
//! ```bash
//! # Decode surface markup into a formatting record
//! badgekit decode '<p style="text-align:right"><strong>Hi</strong></p>'
//!
//! # Encode a formatting record (JSON) into markup
//! badgekit encode '{"text":"Hi","isBold":true}'
//!
//! # Re-write a stored configuration in canonical form
//! badgekit normalize config.json
//!
//! # Print the scaled preview layout and render the code image
//! badgekit preview config.json --code-png code.png
//!
//! # Print @font-face rules for a font feed
//! badgekit fonts fonts.json
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `badgekit=info`).

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

use badgekit::{
    BadgeError, EngineConfig, EditorSession,
    fonts::{FontDescriptor, FontRegistry},
    format::{FormattingRecord, codec},
    persist::{self, ConfigBlob},
    preview::QrCodeEncoder,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Badgekit - badge and ticket template utility
#[derive(Parser, Debug)]
#[command(name = "badgekit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Canvas to use, overriding the configuration file
    #[arg(long, global = true)]
    canvas: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode surface markup into a formatting record
    Decode {
        /// Markup to decode ("-" reads stdin)
        markup: String,
    },

    /// Encode a formatting record (JSON) into surface markup
    Encode {
        /// Record as JSON ("-" reads stdin)
        record: String,
    },

    /// Load a stored configuration and print it in canonical form
    Normalize {
        /// Configuration blob (JSON)
        file: PathBuf,

        /// Write to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Print the scaled preview layout of a stored configuration
    Preview {
        /// Configuration blob (JSON)
        file: PathBuf,

        /// Font feed (JSON array of descriptors)
        #[arg(long, value_name = "FILE")]
        fonts: Option<PathBuf>,

        /// Also render the code image to a PNG
        #[arg(long, value_name = "FILE")]
        code_png: Option<PathBuf>,

        /// Preview width in screen pixels
        #[arg(long)]
        width: Option<f64>,
    },

    /// Print @font-face rules for a font feed
    Fonts {
        /// Font feed (JSON array of descriptors)
        file: PathBuf,

        /// List selectable families instead
        #[arg(long)]
        list: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("badgekit=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), BadgeError> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(canvas) = cli.canvas {
        config.canvas = canvas;
    }

    match cli.command {
        Commands::Decode { markup } => {
            let markup = read_arg(&markup)?;
            let record = codec::decode(&markup, config.template_canvas().font_sizes);
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::Encode { record } => {
            let record: FormattingRecord = serde_json::from_str(&read_arg(&record)?)?;
            println!("{}", codec::encode(&record));
        }

        Commands::Normalize { file, out } => {
            let blob = load_blob(&file)?;
            let model = persist::deserialize_for(&blob, &config.template_canvas());
            let json = persist::serialize(&model)?.to_json()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Wrote {}", path.display());
                }
                None => println!("{}", json),
            }
        }

        Commands::Preview {
            file,
            fonts,
            code_png,
            width,
        } => {
            if let Some(width) = width {
                config.preview_width = width;
            }
            let blob = load_blob(&file)?;
            let descriptors = match fonts {
                Some(path) => load_fonts(&path)?,
                None => Vec::new(),
            };
            let mut session = EditorSession::open(config, Some(&blob), &descriptors);

            if let Some(path) = code_png {
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(session.regenerate_code(&QrCodeEncoder::new()));
                let image = session
                    .code_image()
                    .ok_or_else(|| BadgeError::CodeImage("no code image was produced".into()))?;
                std::fs::write(&path, &image.png)?;
                eprintln!("Saved {}px code to {}", image.size, path.display());
            }

            println!("{}", serde_json::to_string_pretty(&session.preview())?);
        }

        Commands::Fonts { file, list } => {
            let descriptors = load_fonts(&file)?;
            let mut registry = FontRegistry::new();
            registry.install(&descriptors);
            if list {
                for family in registry.families() {
                    println!("{}", family);
                }
            } else {
                println!("{}", registry.stylesheet());
            }
        }
    }

    Ok(())
}

/// An argument value, or stdin when it is "-".
fn read_arg(value: &str) -> Result<String, BadgeError> {
    if value != "-" {
        return Ok(value.to_string());
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn load_blob(path: &Path) -> Result<ConfigBlob, BadgeError> {
    ConfigBlob::from_json(&std::fs::read_to_string(path)?)
}

fn load_fonts(path: &Path) -> Result<Vec<FontDescriptor>, BadgeError> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}
