use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use nearshare_core::{
    Client, ClientBuilder, DeviceType, FileMeta, FilePayload, FileType, OutgoingFile, Server,
    ServerBuilder, ServerInstance, TextType,
};

#[derive(Parser, Debug)]
#[command(name = "nearshare", version, about = "Quick Share compatible file and text sharing")]
struct Cli {
    /// Set log level: error,warn,info,debug,trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Advertise this machine and accept incoming transfers
    Listen {
        /// Port to listen on (ephemeral when omitted)
        #[arg(long)]
        port: Option<u16>,

        /// Name shown to peers (OS hostname when omitted)
        #[arg(long)]
        hostname: Option<String>,

        /// Directory received files are written to
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },

    /// Browse for nearby servers
    Discover {
        /// How long to browse, in seconds
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },

    /// Send a text to a server
    SendText {
        /// Server address (host:port)
        #[arg(long)]
        peer: SocketAddr,

        /// The text to send
        text: String,
    },

    /// Send a file to a server
    SendFile {
        /// Server address (host:port)
        #[arg(long)]
        peer: SocketAddr,

        /// File to send
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_target(false)
        .init();

    match cli.cmd {
        Commands::Listen {
            port,
            hostname,
            output,
        } => listen(port, hostname, output).await,
        Commands::Discover { timeout } => discover(timeout).await,
        Commands::SendText { peer, text } => send_text(peer, text).await,
        Commands::SendFile { peer, file } => send_file(peer, file).await,
    }
}

async fn listen(port: Option<u16>, hostname: Option<String>, output: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&output)?;

    let mut builder = ServerBuilder::new().with_device_type(DeviceType::Laptop);
    if let Some(port) = port {
        builder = builder.with_port(port);
    }
    if let Some(hostname) = hostname {
        builder = builder.with_hostname(hostname);
    }

    let output = Arc::new(output);
    let mut server: Server = builder.build(
        Arc::new(|text, files, pin| {
            println!("incoming transfer, pin {pin:04}");
            if let Some(text) = text {
                println!("  text: {} ({} bytes)", text.title, text.size);
            }
            for file in files {
                println!("  file: {} ({} bytes, {})", file.name, file.size, file.mime_type);
            }
            true
        }),
        Arc::new(|payload| {
            println!("← text: {}", payload.text);
        }),
        Arc::new(move |payload: FilePayload| {
            let output = Arc::clone(&output);
            tokio::spawn(async move {
                if let Err(err) = save_file(payload, &output).await {
                    tracing::error!(%err, "save received file");
                }
            });
        }),
    )?;

    server.listen().await?;
    println!("✓ Listening on port {}", server.port());
    println!("  Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    server.stop().await?;
    Ok(())
}

async fn save_file(mut payload: FilePayload, output: &Path) -> Result<()> {
    // Drop any path components a malicious sender smuggles into the name.
    let name = Path::new(&payload.meta.name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "received.bin".to_string());
    let path = output.join(name);

    let mut out = tokio::fs::File::create(&path)
        .await
        .with_context(|| format!("create {}", path.display()))?;
    tokio::io::copy(&mut payload.content, &mut out).await?;

    println!("← file: {}", path.display());
    Ok(())
}

async fn discover(timeout: u64) -> Result<()> {
    let client = build_client()?;
    let mut servers = client.list_servers()?;

    println!("Browsing for {timeout}s...");
    let deadline = tokio::time::sleep(Duration::from_secs(timeout));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Some(server) = servers.recv() => {
                println!("  {} @ {}", server.hostname, server.addr);
            }
        }
    }

    Ok(())
}

async fn send_text(peer: SocketAddr, text: String) -> Result<()> {
    let client = build_client()?;
    let instance = ServerInstance::new(peer, peer.to_string());

    client
        .send_text(&instance, &text, TextType::Text)
        .await
        .context("send text")?;

    println!("✓ Text sent");
    Ok(())
}

async fn send_file(peer: SocketAddr, file: PathBuf) -> Result<()> {
    let client = build_client()?;
    let instance = ServerInstance::new(peer, peer.to_string());

    let size = std::fs::metadata(&file)
        .with_context(|| format!("stat {}", file.display()))?
        .len() as i64;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file.bin".to_string());
    let content = tokio::fs::File::open(&file)
        .await
        .with_context(|| format!("open {}", file.display()))?;

    let outgoing = OutgoingFile {
        meta: FileMeta {
            kind: file_type_of(&name),
            mime_type: mime_type_of(&name).to_string(),
            name,
            size,
        },
        content: Box::new(content),
    };

    client
        .send_files(&instance, vec![outgoing])
        .await
        .context("send file")?;

    println!("✓ File sent");
    Ok(())
}

fn build_client() -> Result<Client> {
    use nearshare_core::random::{alphanum, CryptRandom};

    let endpoint = String::from_utf8(alphanum(&CryptRandom, 4))?;
    Ok(ClientBuilder::new()
        .with_device_type(DeviceType::Laptop)
        .build(endpoint)?)
}

fn extension_of(name: &str) -> &str {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
}

fn file_type_of(name: &str) -> FileType {
    match extension_of(name) {
        "jpg" | "jpeg" | "png" | "gif" | "webp" => FileType::Image,
        "mp4" | "mkv" | "webm" => FileType::Video,
        "mp3" | "wav" | "flac" | "ogg" => FileType::Audio,
        "apk" => FileType::App,
        _ => FileType::Unknown,
    }
}

fn mime_type_of(name: &str) -> &'static str {
    match extension_of(name) {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
