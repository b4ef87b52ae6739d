use anyhow::Context;
use clap::{Parser, Subcommand};
use thz_rs::util::hex::{decode_hex, format_hex_compact, hex_byte};
use thz_rs::{fixed_point, init_logger, load_config, log_info, Monitor, ThzDeviceHandle};

#[derive(Parser)]
#[command(name = "thz-cli")]
#[command(about = "CLI tool for THZ heat-pump controllers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the controller for liveness
    Ping { port: String },
    /// Query the controller firmware version
    Version { port: String },
    /// Run one read command and dump the reply payload
    Read {
        port: String,
        /// Command byte, hex
        #[arg(short, long, default_value = "fb")]
        command: String,
    },
    /// Run one write command with a raw hex payload
    Set {
        port: String,
        /// Command byte, hex
        command: String,
        /// Payload bytes, hex
        payload: String,
    },
    /// Run the spooling monitor loop from a config file
    Monitor { config: std::path::PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    match cli.command {
        Commands::Ping { port } => {
            let mut handle = ThzDeviceHandle::connect(&port).await?;
            if handle.ping().await? {
                log_info("ping ok");
            } else {
                anyhow::bail!("no ping reply");
            }
        }
        Commands::Version { port } => {
            let mut handle = ThzDeviceHandle::connect(&port).await?;
            let data = handle
                .request(thz_rs::constants::CMD_FIRMWARE_VERSION, None)
                .await?;
            let version = fixed_point(&data, 2).context("version reply too short")?;
            log_info(&format!("version: {version:.2}"));
        }
        Commands::Read { port, command } => {
            let command = hex_byte(&command).context("invalid command byte")?;
            let mut handle = ThzDeviceHandle::connect(&port).await?;
            let data = handle.request(command, None).await?;
            log_info(&format!(
                "{} ({} bytes)",
                format_hex_compact(&data),
                data.len()
            ));
        }
        Commands::Set {
            port,
            command,
            payload,
        } => {
            let command = hex_byte(&command).context("invalid command byte")?;
            let payload = decode_hex(&payload).context("invalid payload hex")?;
            let mut handle = ThzDeviceHandle::connect(&port).await?;
            let reply = handle.request(command, Some(&payload)).await?;
            log_info(&format!("set ok ({} reply bytes)", reply.len()));
        }
        Commands::Monitor { config } => {
            let config = load_config(&config)?;
            if let Some(path) = &config.log {
                log_info(&format!(
                    "log directive {} noted; output goes to the configured logger",
                    path.display()
                ));
            }
            Monitor::new(config).run().await?;
        }
    }

    Ok(())
}
