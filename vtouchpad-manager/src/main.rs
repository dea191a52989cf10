use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vtouchpad::{Manager, TouchpadArray, TouchpadConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Socket path for the manager
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Instance number (used to generate socket path)
    #[arg(short, long, default_value = "0")]
    instance: u32,

    /// JSON touchpad configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of touchpads, overriding the configuration
    #[arg(short, long)]
    devices: Option<usize>,

    /// uinput node, overriding the configuration and VTOUCHPAD_UINPUT
    #[arg(long)]
    uinput: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let socket_path = if let Some(path) = args.socket {
        path
    } else {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/run/user/{}/vtouchpad-{}", uid, args.instance))
    };

    let mut config = match &args.config {
        Some(path) => TouchpadConfig::from_file(path)?,
        None => TouchpadConfig::default(),
    }
    .with_env();
    if let Some(devices) = args.devices {
        config.devices = devices;
    }
    if let Some(uinput) = args.uinput {
        config.uinput_path = uinput;
    }
    config.validate()?;

    tracing::info!("Starting vtouchpad manager");
    tracing::info!("Socket path: {}", socket_path.display());
    tracing::info!("uinput node: {}", config.uinput_path.display());

    let touchpads = TouchpadArray::with_uinput(config);
    let manager = Manager::new(&socket_path, touchpads)?;
    manager.run().await?;

    Ok(())
}
