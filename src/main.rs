use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pageshelf::uploads::describe::describe_extraction;
use pageshelf::uploads::{extract_file, ExtractionEngine};
use pageshelf::{boundary_from_content_type, gateway, Config, UploadService};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Upload markup documents and extract structured summaries.
#[derive(Parser, Debug)]
#[command(name = "pageshelf", version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Extract a summary from a local markup file without storing it.
    Extract {
        path: PathBuf,
        /// Print JSON instead of a text report.
        #[arg(long)]
        json: bool,
    },
    /// Pull the file part out of a raw multipart body.
    Multipart {
        /// File holding the raw request body.
        body: PathBuf,
        /// The request's Content-Type header value.
        #[arg(long)]
        content_type: String,
        /// Write the payload here instead of describing it.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print shell completions.
    Completions { shell: Shell },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the config file JSON schema.
    Schema,
    /// Print the effective configuration as TOML.
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pageshelf=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { host, port } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            let service = UploadService::from_config(&config);
            gateway::run(service, &config.gateway).await
        }
        Command::Extract { path, json } => {
            let content = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let extraction = ExtractionEngine::default().extract(&content);
            if json {
                println!("{}", serde_json::to_string_pretty(&extraction)?);
            } else {
                print!("{}", describe_extraction(&extraction));
            }
            Ok(())
        }
        Command::Multipart {
            body,
            content_type,
            output,
        } => {
            let raw = tokio::fs::read(&body)
                .await
                .with_context(|| format!("Failed to read {}", body.display()))?;
            let Some(boundary) = boundary_from_content_type(&content_type) else {
                bail!("Content-Type has no multipart boundary: {content_type}");
            };
            let Some(file) = extract_file(&raw, &boundary) else {
                bail!("No file part found in {}", body.display());
            };
            match output {
                Some(output) => tokio::fs::write(&output, &file.content)
                    .await
                    .with_context(|| format!("Failed to write {}", output.display()))?,
                None => {
                    println!("filename: {}", file.filename);
                    if let Some(field) = &file.field_name {
                        println!("field: {field}");
                    }
                    if let Some(content_type) = &file.content_type {
                        println!("content-type: {content_type}");
                    }
                    println!("size: {} bytes", file.content.len());
                }
            }
            Ok(())
        }
        Command::Config { command } => {
            match command {
                ConfigCommand::Schema => println!("{}", Config::schema_json()?),
                ConfigCommand::Show => {
                    let config = Config::load(cli.config.as_deref())?;
                    print!("{}", toml::to_string_pretty(&config)?);
                }
            }
            Ok(())
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "pageshelf", &mut std::io::stdout());
            std::io::stdout().flush()?;
            Ok(())
        }
    }
}
