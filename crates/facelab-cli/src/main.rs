use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facelab_core::{capture_file, CapturedImage, InferenceBackend};
use facelab_infer::{InferenceClient, InferenceConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod render;
mod session;

#[derive(Parser)]
#[command(name = "facelab", about = "Face recognition lab: observe, enroll and unlock with a vision model")]
struct Cli {
    /// TOML config file (defaults to $FACELAB_CONFIG when set)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive five-step lab
    Run {
        /// Write the summary report here when the REPORT step is reached
        #[arg(long)]
        report_out: Option<PathBuf>,
    },
    /// Describe the facial features in one image
    Describe {
        image: PathBuf,
        /// Print the raw reply instead of the categorised report
        #[arg(long)]
        raw: bool,
    },
    /// Compare two face images
    Compare {
        reference: PathBuf,
        candidate: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the resolved inference configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = InferenceConfig::load(cli.config.as_deref(), |key| std::env::var(key).ok())
        .context("loading configuration")?;

    match cli.command {
        Commands::Config => {
            println!("endpoint:             {}", config.endpoint());
            println!("model:                {}", config.model);
            println!("temperature:          {}", config.temperature);
            println!("max_tokens:           {}", config.max_tokens);
            println!(
                "request_timeout_secs: {}",
                match config.request_timeout_secs {
                    0 => "none".to_string(),
                    s => s.to_string(),
                }
            );
            println!(
                "api_key:              {}",
                if config.api_key.is_some() { "set" } else { "not set" }
            );
        }
        Commands::Run { report_out } => {
            let client = InferenceClient::new(config)?;
            session::run(client, report_out).await?;
        }
        Commands::Describe { image, raw } => {
            let client = InferenceClient::new(config)?;
            let image = load_image(&image)?;
            let text = client.describe(&image.data_uri).await;
            if raw {
                println!("{text}");
            } else {
                print!("{}", render::analysis_report(&text));
            }
        }
        Commands::Compare {
            reference,
            candidate,
            json,
        } => {
            let client = InferenceClient::new(config)?;
            let reference = load_image(&reference)?;
            let candidate = load_image(&candidate)?;
            let result = client.compare(&reference.data_uri, &candidate.data_uri).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("match:       {}", result.matched);
                println!("similarity:  {:.1}%", result.similarity);
                println!("spectrum:    {}", render::spectrum(&result));
                println!("explanation: {}", result.explanation);
            }
        }
    }

    Ok(())
}

fn load_image(path: &Path) -> Result<CapturedImage> {
    match capture_file(path)? {
        Some(image) => {
            tracing::info!(image = %image.preview(), "loaded image");
            Ok(image)
        }
        None => bail!("image not found: {}", path.display()),
    }
}
