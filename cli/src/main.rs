use std::{fs, path::{Path, PathBuf}, process::ExitCode};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sealkey::{
    config::SigningKeyConfig, export_public_key_string, import_master_secret, import_public_key_string,
    public_key_fingerprint, sign_text, verify_text, MasterSecret, SigningKeyManager, StoredSigningKey,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Generate, store and use wrapped P-256 signing keys
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CliArgs {
    /// JSON file overriding the signing key configuration
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct MasterArgs {
    /// Master secret (base64)
    #[clap(long, env = "SEALKEY_MASTER")]
    master: String,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    #[clap(flatten)]
    master: MasterArgs,

    /// Where to write the stored key (stdout if missing)
    #[clap(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SignArgs {
    #[clap(flatten)]
    master: MasterArgs,

    /// Stored key file produced by `generate`
    #[clap(long)]
    key: PathBuf,

    #[clap(long)]
    message: String,
}

#[derive(Parser, Debug)]
struct VerifyArgs {
    /// Stored key file produced by `generate`
    #[clap(long)]
    key: PathBuf,

    /// Signature (base64)
    #[clap(long)]
    signature: String,

    #[clap(long)]
    message: String,
}

#[derive(Parser, Debug)]
struct PublicKeyArgs {
    /// Stored key file produced by `generate`
    #[clap(long)]
    key: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    Generate(GenerateArgs),
    Sign(SignArgs),
    Verify(VerifyArgs),
    PublicKey(PublicKeyArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(EnvFilter::from_default_env()))
        .init();

    let args = CliArgs::parse();
    let manager = SigningKeyManager::new(load_config(args.config.as_deref())?)?;

    match args.command {
        Command::Generate(a) => generate(&manager, &a).await,
        Command::Sign(a) => sign(&manager, &a).await,
        Command::Verify(a) => verify(&a).await,
        Command::PublicKey(a) => public_key(&a).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SigningKeyConfig> {
    let path = match path {
        Some(x) => x,
        None => return Ok(SigningKeyConfig::default()),
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

fn load_key(path: &Path) -> anyhow::Result<StoredSigningKey> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_key(&text).with_context(|| format!("parsing {}", path.display()))
}

fn parse_key(text: &str) -> anyhow::Result<StoredSigningKey> {
    Ok(serde_json::from_str(text)?)
}

async fn master_secret(encoded: &str) -> anyhow::Result<MasterSecret> {
    let bytes = base64::decode(encoded.trim()).context("master secret is not base64")?;
    Ok(import_master_secret(&bytes).await?)
}

/// Line printed by `verify` and the process exit code that goes with it.
fn verdict(valid: bool) -> (&'static str, u8) {
    if valid {
        ("valid", 0)
    } else {
        ("invalid", 1)
    }
}

async fn generate_json(manager: &SigningKeyManager, master: &str) -> anyhow::Result<String> {
    let master = master_secret(master).await?;
    let generated = manager.generate_signing_key_material(&master).await?;
    Ok(serde_json::to_string_pretty(&generated.to_stored())?)
}

async fn sign_message(manager: &SigningKeyManager, master: &str, stored: &StoredSigningKey, message: &str) -> anyhow::Result<String> {
    let master = master_secret(master).await?;
    let key = manager
        .restore_signing_key(&master, stored)
        .await
        .context("could not unwrap the private key (wrong master secret?)")?;
    Ok(sign_text(&key, message).await?)
}

async fn verify_message(stored: &StoredSigningKey, signature: &str, message: &str) -> anyhow::Result<bool> {
    let key = import_public_key_string(&stored.public_key).await?;
    Ok(verify_text(&key, signature.trim(), message).await?)
}

async fn generate(manager: &SigningKeyManager, args: &GenerateArgs) -> anyhow::Result<ExitCode> {
    let json = generate_json(manager, &args.master.master).await?;

    match &args.out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Stored signing key written");
        }
        None => println!("{json}"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn sign(manager: &SigningKeyManager, args: &SignArgs) -> anyhow::Result<ExitCode> {
    let stored = load_key(&args.key)?;
    println!("{}", sign_message(manager, &args.master.master, &stored, &args.message).await?);
    Ok(ExitCode::SUCCESS)
}

async fn verify(args: &VerifyArgs) -> anyhow::Result<ExitCode> {
    let stored = load_key(&args.key)?;
    let (line, code) = verdict(verify_message(&stored, &args.signature, &args.message).await?);
    println!("{line}");
    Ok(ExitCode::from(code))
}

async fn public_key(args: &PublicKeyArgs) -> anyhow::Result<ExitCode> {
    let stored = load_key(&args.key)?;
    let key = import_public_key_string(&stored.public_key).await?;

    println!("{}", export_public_key_string(&key).await?);
    println!("fingerprint: {}", public_key_fingerprint(&key).await?);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64 of 32 bytes of 0x11
    const MASTER: &str = "ERERERERERERERERERERERERERERERERERERERERERE=";

    #[test]
    fn verdict_exit_codes() {
        assert_eq!(verdict(true), ("valid", 0));
        assert_eq!(verdict(false), ("invalid", 1));
    }

    #[tokio::test]
    async fn generate_sign_verify_through_json() {
        let manager = SigningKeyManager::default();
        let json = generate_json(&manager, MASTER).await.unwrap();
        let stored = parse_key(&json).unwrap();

        let signature = sign_message(&manager, MASTER, &stored, "hello").await.unwrap();
        assert!(verify_message(&stored, &signature, "hello").await.unwrap());

        let valid = verify_message(&stored, &signature, "goodbye").await.unwrap();
        assert!(!valid);
        assert_eq!(verdict(valid), ("invalid", 1));
    }

    #[tokio::test]
    async fn sign_with_wrong_master_fails() {
        let manager = SigningKeyManager::default();
        let stored = parse_key(&generate_json(&manager, MASTER).await.unwrap()).unwrap();

        let other = base64::encode([0x22u8; 32]);
        assert!(sign_message(&manager, &other, &stored, "hello").await.is_err());
    }

    #[test]
    fn config_file_defaults() {
        assert_eq!(load_config(None).unwrap(), SigningKeyConfig::default());
    }
}
