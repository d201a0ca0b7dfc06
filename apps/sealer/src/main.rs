use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use medichain_crypto::{
    decrypt, encrypt, Error as CryptoError, RecipientPrivateKey, RecipientPublicKey,
};
use medichain_wire::{split, SealedFileMetadata};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "sealer", about = "Seal record files for upload and open downloaded ones")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MEDICHAIN_LOG", default_value = "info", global = true)]
    log: String,
    /// Log format
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Encrypt a file to a recipient's P-256 public key
    Seal {
        /// Recipient public key (PEM or base64 SPKI)
        #[arg(long, env = "MEDICHAIN_RECIPIENT_KEY")]
        recipient_key: PathBuf,
        /// Plaintext file
        #[arg(long)]
        input: PathBuf,
        /// Where to write the ciphertext body
        #[arg(long)]
        output: PathBuf,
        /// Where to write the JSON sidecar (default: <output>.json)
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// MIME type recorded in the sidecar
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Decrypt a downloaded ciphertext with the local private key
    Open {
        /// Private key (PKCS8/SEC1 PEM, escaped `\n` accepted)
        #[arg(long, env = "MEDICHAIN_PRIVATE_KEY")]
        private_key: PathBuf,
        /// Ciphertext body
        #[arg(long)]
        input: PathBuf,
        /// JSON sidecar (default: <input>.json)
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Where to write the plaintext
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log, &args.log_format);

    match args.command {
        Command::Seal {
            recipient_key,
            input,
            output,
            metadata,
            content_type,
        } => {
            let metadata = metadata.unwrap_or_else(|| sidecar_path(&output));
            seal(&recipient_key, &input, &output, &metadata, content_type).await
        }
        Command::Open {
            private_key,
            input,
            metadata,
            output,
        } => {
            let metadata = metadata.unwrap_or_else(|| sidecar_path(&input));
            open(&private_key, &input, &metadata, &output).await
        }
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(std::io::stderr)).init(),
        LogFormat::Text => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }
}

fn sidecar_path(body: &Path) -> PathBuf {
    let mut name = body.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

async fn seal(
    recipient_key: &Path,
    input: &Path,
    output: &Path,
    metadata_path: &Path,
    content_type: Option<String>,
) -> Result<()> {
    let key_text = tokio::fs::read_to_string(recipient_key)
        .await
        .with_context(|| format!("reading recipient key {}", recipient_key.display()))?;
    let recipient = RecipientPublicKey::parse(&key_text).context("recipient public key")?;

    let plaintext = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let plaintext_len = plaintext.len();

    let sealed = tokio::task::spawn_blocking(move || encrypt(&plaintext, &recipient)).await??;
    let (body, mut metadata) = split(sealed);
    if let Some(name) = input.file_name().and_then(|n| n.to_str()) {
        metadata = metadata.with_file_name(name);
    }
    if let Some(content_type) = content_type {
        metadata = metadata.with_content_type(content_type);
    }

    // A body without its sidecar cannot be opened; never leave one behind.
    tokio::fs::write(metadata_path, metadata.to_json()?)
        .await
        .with_context(|| format!("writing {}", metadata_path.display()))?;
    if let Err(e) = tokio::fs::write(output, &body).await {
        let _ = tokio::fs::remove_file(metadata_path).await;
        return Err(e).with_context(|| format!("writing {}", output.display()));
    }

    info!(
        input = %input.display(),
        output = %output.display(),
        plaintext_len,
        ciphertext_len = body.len(),
        "sealed"
    );
    Ok(())
}

async fn open(private_key: &Path, input: &Path, metadata_path: &Path, output: &Path) -> Result<()> {
    let key_text = tokio::fs::read_to_string(private_key)
        .await
        .with_context(|| format!("reading private key {}", private_key.display()))?;
    let secret = RecipientPrivateKey::parse(&key_text)
        .context("private key is unreadable; log in again to re-derive it")?;

    let json = tokio::fs::read_to_string(metadata_path)
        .await
        .with_context(|| format!("reading {}", metadata_path.display()))?;
    let metadata = SealedFileMetadata::from_json(&json)?;
    let body = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let sealed = metadata.to_sealed(body)?;

    let plaintext = tokio::task::spawn_blocking(move || decrypt(&sealed, &secret))
        .await?
        .map_err(|e| match e {
            CryptoError::AuthenticationFailure(_) => anyhow::Error::new(e)
                .context("record could not be opened with this key (wrong recipient or tampered data)"),
            other => anyhow::Error::new(other),
        })?;

    tokio::fs::write(output, &plaintext)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    info!(
        output = %output.display(),
        content_type = metadata.content_type.as_deref().unwrap_or("application/octet-stream"),
        plaintext_len = plaintext.len(),
        "opened"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medichain_crypto::generate_key_pair;

    async fn write_key_pair(dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
        let (secret, public) = generate_key_pair();
        let private_path = dir.join(format!("{stem}.pem"));
        let public_path = dir.join(format!("{stem}.pub.pem"));
        tokio::fs::write(&private_path, secret.to_pkcs8_pem().unwrap().as_bytes())
            .await
            .unwrap();
        tokio::fs::write(&public_path, public.to_pem().unwrap())
            .await
            .unwrap();
        (private_path, public_path)
    }

    #[test]
    fn sidecar_path_appends_json() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/scan.bin")),
            PathBuf::from("/tmp/scan.bin.json")
        );
    }

    #[tokio::test]
    async fn seal_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let (private_path, public_path) = write_key_pair(dir.path(), "doctor").await;
        let input = dir.path().join("notes.txt");
        let body = dir.path().join("notes.enc");
        let sidecar = sidecar_path(&body);
        let output = dir.path().join("notes.out");
        tokio::fs::write(&input, b"follow-up in two weeks").await.unwrap();

        seal(&public_path, &input, &body, &sidecar, Some("text/plain".into()))
            .await
            .unwrap();
        let metadata = SealedFileMetadata::from_json(&std::fs::read_to_string(&sidecar).unwrap()).unwrap();
        assert_eq!(metadata.file_name.as_deref(), Some("notes.txt"));

        open(&private_path, &body, &sidecar, &output).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"follow-up in two weeks");
    }

    #[tokio::test]
    async fn open_with_wrong_key_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (_, public_path) = write_key_pair(dir.path(), "patient").await;
        let (other_private, _) = write_key_pair(dir.path(), "stranger").await;
        let input = dir.path().join("scan.bin");
        let body = dir.path().join("scan.enc");
        let sidecar = sidecar_path(&body);
        let output = dir.path().join("scan.out");
        tokio::fs::write(&input, vec![0x42u8; 1024]).await.unwrap();

        seal(&public_path, &input, &body, &sidecar, None).await.unwrap();
        let err = open(&other_private, &body, &sidecar, &output).await.unwrap_err();
        assert!(err.to_string().contains("could not be opened"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn failed_body_write_leaves_no_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let (_, public_path) = write_key_pair(dir.path(), "clinic").await;
        let input = dir.path().join("xray.bin");
        let body = dir.path().join("xray.enc");
        let sidecar = sidecar_path(&body);
        tokio::fs::write(&input, b"image").await.unwrap();
        tokio::fs::create_dir(&body).await.unwrap();

        let err = seal(&public_path, &input, &body, &sidecar, None).await.unwrap_err();
        assert!(err.to_string().contains("writing"));
        assert!(!sidecar.exists());
        assert!(body.is_dir());
    }
}
