#![forbid(unsafe_code)]

//! sigill CLI: XML-DSig templates, signing and verification.

use clap::{Args, Parser, Subcommand};
use sigill::template;
use sigill::{Document, DsigContext, Error, Key, KeyDataFormat, Result, TransformId};
use sigill::core::TransformUsage;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sigill", about = "sigill: pure Rust XML digital signatures", version)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log filter, e.g. `info` or `sigill_dsig=trace`. RUST_LOG wins.
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a document holding a signature template
    Sign {
        /// Template XML file (with empty DigestValue/SignatureValue)
        file: PathBuf,

        #[command(flatten)]
        key: KeyArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,
    },

    /// Verify a signed XML document
    Verify {
        /// Input XML file
        file: PathBuf,

        #[command(flatten)]
        key: KeyArgs,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,
    },

    /// Insert an enveloped signature template into a document
    Template {
        /// Input XML file
        file: PathBuf,

        /// Canonicalization method
        #[arg(long, default_value = "exc-c14n", value_parser = canonicalization)]
        c14n: TransformId,

        /// Signature method
        #[arg(long, default_value = "rsa-sha256", value_parser = signature_method)]
        signature: TransformId,

        /// Digest method
        #[arg(long, default_value = "sha256", value_parser = digest_method)]
        digest: TransformId,

        /// Reference URI (default: the whole document)
        #[arg(long, default_value = "")]
        uri: String,

        /// Add a KeyInfo with this KeyName; empty means "filled at signing"
        #[arg(long = "key-name")]
        key_name: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported algorithms and key formats
    Algorithms,
}

#[derive(Args)]
struct KeyArgs {
    /// Key file
    #[arg(short = 'k', long)]
    key: PathBuf,

    /// Key file format
    #[arg(long, default_value = "pem", value_parser = key_format)]
    format: KeyDataFormat,

    /// Password for encrypted PKCS#8 and PKCS#12 files
    #[arg(long)]
    password: Option<String>,
}

impl KeyArgs {
    fn load(&self) -> Result<Key> {
        sigill::keys::load_from_file_with_password(&self.key, self.format, self.password.as_deref())
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_level.as_deref());

    if let Err(e) = sigill::init() {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let result = match cli.command {
        Commands::Sign {
            file,
            key,
            output,
            id_attr,
        } => cmd_sign(&file, &key, output, id_attr),
        Commands::Verify { file, key, id_attr } => cmd_verify(&file, &key, id_attr),
        Commands::Template {
            file,
            c14n,
            signature,
            digest,
            uri,
            key_name,
            output,
        } => cmd_template(&file, c14n, signature, digest, &uri, key_name.as_deref(), output),
        Commands::Algorithms => {
            cmd_algorithms();
            Ok(())
        }
    };

    let code = match result {
        Ok(()) => 0,
        Err(e) if e.is_verification_failure() => {
            eprintln!("INVALID: {e}");
            1
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };
    if let Err(e) = sigill::shutdown() {
        tracing::warn!(error = %e, "shutdown failed");
    }
    process::exit(code);
}

fn init_logging(verbose: bool, level: Option<&str>) {
    let fallback = level.unwrap_or(if verbose { "debug" } else { "warn" });
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_sign(file: &Path, key: &KeyArgs, output: Option<PathBuf>, id_attr: Vec<String>) -> Result<()> {
    let mut doc = read_document(file)?;
    let mut ctx = DsigContext::with_key(key.load()?);
    for attr in &id_attr {
        ctx.add_id_attr(attr);
    }
    tracing::debug!(file = %file.display(), "signing");
    ctx.sign_document(&mut doc)?;
    write_output(output, doc.to_xml().as_bytes())
}

fn cmd_verify(file: &Path, key: &KeyArgs, id_attr: Vec<String>) -> Result<()> {
    let doc = read_document(file)?;
    let mut ctx = DsigContext::with_key(key.load()?);
    for attr in &id_attr {
        ctx.add_id_attr(attr);
    }
    tracing::debug!(file = %file.display(), "verifying");
    ctx.verify_document(&doc)?;
    println!("OK");
    Ok(())
}

fn cmd_template(
    file: &Path,
    c14n: TransformId,
    signature: TransformId,
    digest: TransformId,
    uri: &str,
    key_name: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut doc = read_document(file)?;
    let sig = template::create_signature(&mut doc, c14n, signature, None)?;
    let reference = template::add_reference(&mut doc, sig, digest, None, Some(uri), None)?;
    template::add_transform(&mut doc, reference, TransformId::Enveloped)?;
    template::add_transform(&mut doc, reference, c14n)?;
    if let Some(name) = key_name {
        let key_info = template::ensure_key_info(&mut doc, sig, None)?;
        template::add_key_name(&mut doc, key_info, Some(name))?;
    }
    write_output(output, doc.to_xml().as_bytes())
}

fn cmd_algorithms() {
    let groups = [
        ("Canonicalization", TransformUsage::Canonicalization),
        ("Reference transforms", TransformUsage::ReferenceTransform),
        ("Digests", TransformUsage::Digest),
        ("Signatures", TransformUsage::Signature),
    ];
    for (title, usage) in groups {
        println!("{title}:");
        for id in TransformId::ALL.iter().filter(|id| id.usage() == usage) {
            println!("  {:<24} {}", id.name(), id.uri());
        }
        println!();
    }
    println!("Key formats:");
    for format in KeyDataFormat::ALL {
        println!("  {format}");
    }
}

// ── Utility functions ────────────────────────────────────────────────

fn read_document(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidDocument(format!("{}: {e}", path.display())))?;
    Document::parse(&text)
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<()> {
    match path {
        Some(p) => std::fs::write(&p, data)
            .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", p.display())))),
        None => {
            use std::io::Write;
            std::io::stdout().write_all(data)?;
            Ok(())
        }
    }
}

fn key_format(name: &str) -> std::result::Result<KeyDataFormat, String> {
    KeyDataFormat::from_name(name).ok_or_else(|| {
        let known: Vec<_> = KeyDataFormat::ALL.iter().map(|f| f.name()).collect();
        format!("unknown key format {name:?}, expected one of {}", known.join(", "))
    })
}

fn algorithm(name: &str, usage: TransformUsage) -> std::result::Result<TransformId, String> {
    TransformId::from_name(name)
        .filter(|id| id.usage() == usage)
        .ok_or_else(|| format!("unknown algorithm {name:?}; see `sigill algorithms`"))
}

fn canonicalization(name: &str) -> std::result::Result<TransformId, String> {
    algorithm(name, TransformUsage::Canonicalization)
}

fn signature_method(name: &str) -> std::result::Result<TransformId, String> {
    algorithm(name, TransformUsage::Signature)
}

fn digest_method(name: &str) -> std::result::Result<TransformId, String> {
    algorithm(name, TransformUsage::Digest)
}
