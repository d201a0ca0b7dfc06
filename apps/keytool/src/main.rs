use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medichain_crypto::{generate_key_pair, normalize_pem, RecipientPublicKey};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "keytool",
    about = "Development P-256 key pairs for MediChain record sealing"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MEDICHAIN_LOG", default_value = "info", global = true)]
    log: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write <name>.pem (PKCS8) and <name>.pub.pem (SPKI)
    Generate {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long, default_value = "medichain")]
        name: String,
    },
    /// Print the hex SHA-256 fingerprint of a public key's SPKI encoding
    Fingerprint {
        /// Public key (PEM or base64 SPKI)
        #[arg(long)]
        key: PathBuf,
    },
    /// Print a key file with literal `\n` escapes turned into newlines
    Normalize {
        #[arg(long)]
        key: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Generate { out_dir, name } => {
            let (private_path, public_path) = generate(&out_dir, &name).await?;
            println!("{}", private_path.display());
            println!("{}", public_path.display());
        }
        Command::Fingerprint { key } => println!("{}", fingerprint(&key).await?),
        Command::Normalize { key } => {
            let text = tokio::fs::read_to_string(&key)
                .await
                .with_context(|| format!("reading {}", key.display()))?;
            print!("{}", normalize_pem(&text));
        }
    }

    Ok(())
}

async fn generate(out_dir: &Path, name: &str) -> Result<(PathBuf, PathBuf)> {
    let private_path = out_dir.join(format!("{name}.pem"));
    let public_path = out_dir.join(format!("{name}.pub.pem"));

    let (secret, public) = generate_key_pair();
    tokio::fs::create_dir_all(out_dir).await?;
    let mut private_file = create_new(&private_path, 0o600).await?;
    let mut public_file = match create_new(&public_path, 0o644).await {
        Ok(file) => file,
        Err(e) => {
            drop(private_file);
            let _ = tokio::fs::remove_file(&private_path).await;
            return Err(e);
        }
    };

    write_all(&mut private_file, &private_path, secret.to_pkcs8_pem()?.as_bytes()).await?;
    write_all(&mut public_file, &public_path, public.to_pem()?.as_bytes()).await?;

    info!(
        fingerprint = %hex::encode(public.fingerprint()?),
        private = %private_path.display(),
        "generated P-256 key pair"
    );
    Ok((private_path, public_path))
}

/// Exclusive create; never follows or replaces an existing file.
async fn create_new(path: &Path, mode: u32) -> Result<tokio::fs::File> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    match options.open(path).await {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            anyhow::bail!("refusing to overwrite {}", path.display())
        }
        Err(e) => Err(e).with_context(|| format!("creating {}", path.display())),
    }
}

async fn write_all(file: &mut tokio::fs::File, path: &Path, contents: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    file.write_all(contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("syncing {}", path.display()))
}

async fn fingerprint(key: &Path) -> Result<String> {
    let text = tokio::fs::read_to_string(key)
        .await
        .with_context(|| format!("reading {}", key.display()))?;
    let public = RecipientPublicKey::parse(&text)?;
    Ok(hex::encode(public.fingerprint()?))
}
