#![forbid(unsafe_code)]

//! Sigtuna CLI: sign, verify and canonicalize XML documents.

use clap::{Parser, Subcommand, ValueEnum};
use sigtuna_c14n::C14nMode;
use sigtuna_core::Error;
use sigtuna_crypto::{CryptoKey, CryptoProvider, HashAlgorithm, RustCryptoProvider, SigningAlgorithm};
use sigtuna_dsig::{ReferenceOptions, SignOptions, SignedXml, VerifyOptions, VerifyResult};
use sigtuna_transforms::Transform;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "sigtuna", about = "Sigtuna: pure Rust XML Digital Signature (XML-DSig, C14N)", version)]
struct Cli {
    /// Debug logging (otherwise RUST_LOG applies)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an enveloped signature to an XML document
    Sign {
        /// Input XML file
        file: PathBuf,

        /// Load private key (PEM or DER, auto-detected)
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Load raw HMAC key (binary file)
        #[arg(long = "hmac-key")]
        hmac_key: Option<PathBuf>,

        /// Signature algorithm
        #[arg(short, long, value_enum, default_value_t = Algorithm::Rsa)]
        algorithm: Algorithm,

        /// Digest used for the reference and the signature
        #[arg(short, long, value_enum, default_value_t = Digest::Sha256)]
        digest: Digest,

        /// Canonicalization for SignedInfo and the reference
        #[arg(long, value_enum, default_value_t = Mode::Inclusive)]
        c14n: Mode,

        /// Embed the public key as a KeyValue
        #[arg(long = "key-value")]
        key_value: bool,

        /// Embed an X.509 certificate (PEM or DER)
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a signed XML document
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Verify with this key instead of the embedded ones
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Verify with the key of this certificate
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Load raw HMAC key (binary file)
        #[arg(long = "hmac-key")]
        hmac_key: Option<PathBuf>,
    },

    /// Canonicalize an XML document
    C14n {
        /// Input XML file
        file: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Mode::Inclusive)]
        mode: Mode,

        /// InclusiveNamespaces prefix list for the exclusive modes
        #[arg(long, default_value = "")]
        prefixes: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported algorithms and key types
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    Rsa,
    RsaPss,
    Ecdsa,
    Hmac,
}

#[derive(Clone, Copy, ValueEnum)]
enum Digest {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl From<Digest> for HashAlgorithm {
    fn from(digest: Digest) -> Self {
        match digest {
            Digest::Sha1 => HashAlgorithm::Sha1,
            Digest::Sha256 => HashAlgorithm::Sha256,
            Digest::Sha384 => HashAlgorithm::Sha384,
            Digest::Sha512 => HashAlgorithm::Sha512,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Inclusive,
    InclusiveComments,
    Exclusive,
    ExclusiveComments,
}

impl From<Mode> for C14nMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Inclusive => C14nMode::Inclusive,
            Mode::InclusiveComments => C14nMode::InclusiveWithComments,
            Mode::Exclusive => C14nMode::Exclusive,
            Mode::ExclusiveComments => C14nMode::ExclusiveWithComments,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Sign {
            file,
            key,
            hmac_key,
            algorithm,
            digest,
            c14n,
            key_value,
            cert,
            output,
        } => cmd_sign(SignArgs {
            file,
            key,
            hmac_key,
            algorithm,
            hash: digest.into(),
            mode: c14n.into(),
            key_value,
            cert,
            output,
        }),

        Commands::Verify {
            file,
            key,
            cert,
            hmac_key,
        } => cmd_verify(file, key, cert, hmac_key),

        Commands::C14n {
            file,
            mode,
            prefixes,
            output,
        } => cmd_c14n(file, mode.into(), &prefixes, output),

        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

struct SignArgs {
    file: PathBuf,
    key: Option<PathBuf>,
    hmac_key: Option<PathBuf>,
    algorithm: Algorithm,
    hash: HashAlgorithm,
    mode: C14nMode,
    key_value: bool,
    cert: Option<PathBuf>,
    output: Option<PathBuf>,
}

fn cmd_sign(args: SignArgs) -> Result<(), Error> {
    let provider = RustCryptoProvider;
    let document = sigtuna_xml::parse(&read_file(&args.file)?)?;

    let (signing, key) = match args.algorithm {
        Algorithm::Hmac => {
            let path = args
                .hmac_key
                .ok_or_else(|| Error::Configuration("hmac signing needs --hmac-key".into()))?;
            let secret = std::fs::read(&path)?;
            (
                SigningAlgorithm::hmac(args.hash),
                sigtuna_keys::load_hmac_key(&provider, &secret, args.hash)?,
            )
        }
        other => {
            let path = args
                .key
                .ok_or_else(|| Error::Configuration("signing needs --key".into()))?;
            let key = sigtuna_keys::load_key_file(&provider, &path, args.hash)?;
            let signing = match other {
                Algorithm::RsaPss => SigningAlgorithm::rsa_pss(args.hash, None),
                Algorithm::Ecdsa => SigningAlgorithm::ecdsa(args.hash),
                _ => SigningAlgorithm::rsa_pkcs1(args.hash),
            };
            (signing, key)
        }
    };

    let mut options = SignOptions {
        references: vec![ReferenceOptions::new("", args.hash)
            .with_transform(Transform::Enveloped)
            .with_transform(Transform::c14n(args.mode))],
        ..SignOptions::default()
    };
    if args.key_value {
        options.key_value = Some(key.public_key()?);
    }
    if let Some(path) = &args.cert {
        options.x509.push(sigtuna_keys::load_certificate(&std::fs::read(path)?)?);
    }

    log::info!("signing {}", args.file.display());
    let mut signed = SignedXml::new();
    signed.signature_mut().signed_info_mut().canonicalization_method.mode = args.mode;
    signed.sign(&signing, &key, &document, &options)?;
    write_output(args.output, signed.to_string().as_bytes())
}

fn cmd_verify(
    file: PathBuf,
    key: Option<PathBuf>,
    cert: Option<PathBuf>,
    hmac_key: Option<PathBuf>,
) -> Result<(), Error> {
    let provider = RustCryptoProvider;
    let document = sigtuna_xml::parse(&read_file(&file)?)?;
    let mut signed = SignedXml::from_document(document)?;

    let explicit = match (key, cert, hmac_key) {
        (_, _, Some(path)) => {
            let secret = std::fs::read(&path)?;
            Some(sigtuna_keys::load_hmac_key(&provider, &secret, HashAlgorithm::Sha256)?)
        }
        (Some(path), _, _) | (None, Some(path), None) => Some(load_public_key(&provider, &path)?),
        (None, None, None) => None,
    };
    if let Some(key) = explicit {
        signed.set_verify_options(VerifyOptions::with_key(key));
    }

    log::info!("verifying {}", file.display());
    match signed.verify_detailed() {
        VerifyResult::Valid => {
            println!("OK");
            Ok(())
        }
        VerifyResult::Invalid { reason } => {
            eprintln!("INVALID: {reason}");
            process::exit(1);
        }
    }
}

fn cmd_c14n(file: PathBuf, mode: C14nMode, prefixes: &str, output: Option<PathBuf>) -> Result<(), Error> {
    let xml = read_file(&file)?;
    let canonical = sigtuna_c14n::canonicalize(&xml, mode, prefixes)?;
    write_output(output, &canonical)
}

fn cmd_info() -> Result<(), Error> {
    println!("Sigtuna: pure Rust XML Digital Signature");
    println!();
    println!("Supported digest algorithms:");
    println!("  SHA-1, SHA-256, SHA-384, SHA-512");
    println!();
    println!("Supported signature algorithms:");
    println!("  RSA PKCS#1 v1.5 (SHA-1, SHA-256, SHA-384, SHA-512)");
    println!("  RSA-PSS (SHA-1, SHA-256, SHA-384, SHA-512, RSAPSSParams)");
    println!("  ECDSA P-256/P-384/P-521 (SHA-1, SHA-256, SHA-384, SHA-512)");
    println!("  HMAC (SHA-1, SHA-256, SHA-384, SHA-512, HMACOutputLength)");
    println!();
    println!("Supported transforms:");
    println!("  Enveloped signature, Base64, XPath filter");
    println!();
    println!("Supported canonicalization:");
    println!("  C14N 1.0 (with and without comments)");
    println!("  Exclusive C14N 1.0 (with and without comments, InclusiveNamespaces)");
    println!();
    println!("Supported key formats:");
    println!("  PEM, DER (PKCS#1, PKCS#8, SPKI, X.509), raw binary (HMAC)");
    println!("  KeyInfo: KeyValue (RSA, ECDSA), X509Data, SPKIData");
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

/// Public key from a key or certificate file. A private key file yields
/// its public half.
fn load_public_key(provider: &dyn CryptoProvider, path: &Path) -> Result<CryptoKey, Error> {
    let key = sigtuna_keys::load_key_file(provider, path, HashAlgorithm::Sha256)?;
    if key.is_private() {
        key.public_key()
    } else {
        Ok(key)
    }
}

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => std::fs::write(&p, data)
            .map_err(|e| Error::Configuration(format!("{}: {e}", p.display()))),
        None => {
            use std::io::Write;
            std::io::stdout().write_all(data).map_err(Error::from)
        }
    }
}
