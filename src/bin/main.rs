//! PDF Signer CLI
//!
//! Signs PDF documents with a local key, verifies signed documents and
//! manages the shared configuration file.

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use pdf_remote_signer::{
    infra::config::{ConfigManager, ExportFormat},
    HashAlgorithm, LocalKeyIdentity, SelectionRect, SignWorkflow, SignaturePlacement,
    SigningConfiguration, VerificationReport, VerifyWorkflow,
};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Parser)]
#[command(name = "pdf-signer")]
#[command(about = "Detached PKCS#7 signing and verification for PDF documents")]
#[command(long_about = "
PDF Signer - visible, detached PKCS#7 signatures for PDF files

EXAMPLES:
    # Sign page 1 (zero-based) inside a dragged rectangle
    pdf-signer sign contract.pdf --cert me.pem --key me.key --page 1 --rect 100,200,300,250

    # Try it out with a throwaway self-signed certificate
    pdf-signer sign contract.pdf --self-signed \"Test Signer\"

    # Verify a signed document
    pdf-signer verify contract-signed.pdf --json

COORDINATES:
    --rect takes startX,startY,endX,endY in page points with the origin at
    the top-left corner of the page, as a viewer reports a mouse drag.

ENVIRONMENT VARIABLES:
    PDF_SIGNER_CERT   Signer certificate (PEM)
    PDF_SIGNER_KEY    Signer private key (PEM)
    RUST_LOG          Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a PDF with a local certificate and key
    Sign {
        /// PDF file to sign
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Output file path (defaults to <input>-signed.pdf)
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,

        /// Signer certificate (PEM)
        #[arg(long, env = "PDF_SIGNER_CERT", value_name = "PEM")]
        cert: Option<PathBuf>,

        /// Signer private key (PEM)
        #[arg(long, env = "PDF_SIGNER_KEY", value_name = "PEM")]
        key: Option<PathBuf>,

        /// Generate a throwaway self-signed identity with this common name
        #[arg(long, value_name = "CN", conflicts_with_all = ["cert", "key"])]
        self_signed: Option<String>,

        /// Zero-based page index
        #[arg(short, long, default_value_t = 0)]
        page: usize,

        /// Signature rectangle: startX,startY,endX,endY (top-left origin)
        #[arg(short, long, value_parser = parse_rect, default_value = "50,50,250,110")]
        rect: SelectionRect,

        /// Label shown as "Signed by ..." (defaults to the certificate CN)
        #[arg(short, long)]
        name: Option<String>,

        /// Hash algorithm (overrides config)
        #[arg(long, value_enum)]
        hash: Option<HashAlgorithmArg>,
    },

    /// Verify the signature of a signed PDF
    Verify {
        /// Signed PDF to verify
        #[arg(value_name = "SIGNED_FILE")]
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone)]
enum HashAlgorithmArg {
    Sha256,
    Sha384,
    Sha512,
}

impl From<HashAlgorithmArg> for HashAlgorithm {
    fn from(arg: HashAlgorithmArg) -> Self {
        match arg {
            HashAlgorithmArg::Sha256 => HashAlgorithm::Sha256,
            HashAlgorithmArg::Sha384 => HashAlgorithm::Sha384,
            HashAlgorithmArg::Sha512 => HashAlgorithm::Sha512,
        }
    }
}

#[derive(ValueEnum, Clone)]
enum ExportFormatArg {
    Toml,
    Json,
    Yaml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

/// Parameters for the sign command
struct SignCommandArgs {
    input_file: PathBuf,
    output: Option<PathBuf>,
    cert: Option<PathBuf>,
    key: Option<PathBuf>,
    self_signed: Option<String>,
    page: usize,
    rect: SelectionRect,
    name: Option<String>,
    hash: Option<HashAlgorithmArg>,
}

fn parse_rect(value: &str) -> std::result::Result<SelectionRect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid coordinate: {e}"))?;
    match parts.as_slice() {
        [start_x, start_y, end_x, end_y] => {
            Ok(SelectionRect::new(*start_x, *start_y, *end_x, *end_y))
        }
        _ => Err(format!("expected 4 comma-separated numbers, got {}", parts.len())),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new().into_diagnostic()?,
    };

    match cli.command {
        Commands::Sign {
            input_file,
            output,
            cert,
            key,
            self_signed,
            page,
            rect,
            name,
            hash,
        } => {
            let args = SignCommandArgs {
                input_file,
                output,
                cert,
                key,
                self_signed,
                page,
                rect,
                name,
                hash,
            };
            handle_sign_command(&config_manager, args)?;
        }

        Commands::Verify { file, json } => {
            handle_verify_command(&file, json)?;
        }

        Commands::Config(config_cmd) => {
            handle_config_command(&config_manager, config_cmd)?;
        }
    }

    Ok(())
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("{stem}-signed.pdf"))
}

fn handle_sign_command(config_manager: &ConfigManager, args: SignCommandArgs) -> Result<()> {
    let mut config: SigningConfiguration = config_manager.load_or_default().into_diagnostic()?;
    if let Some(hash) = args.hash {
        config.hash_algorithm = HashAlgorithm::from(hash).as_str().to_string();
    }

    let identity = match (&args.self_signed, &args.cert, &args.key) {
        (Some(cn), _, _) => {
            println!("⚠️  Using a throwaway self-signed certificate for '{cn}'");
            LocalKeyIdentity::generate_self_signed(cn, 2048).into_diagnostic()?
        }
        (None, Some(cert), Some(key)) => LocalKeyIdentity::from_pem_files(cert, key)
            .into_diagnostic()
            .wrap_err("Failed to load signing identity")?,
        _ => {
            return Err(miette::miette!(
                help = "pass --cert and --key, set PDF_SIGNER_CERT/PDF_SIGNER_KEY, or use --self-signed",
                "No signing identity given"
            ));
        }
    };

    let label = args
        .name
        .or_else(|| identity.common_name())
        .unwrap_or_else(|| config.default_signer_label.clone());

    let pdf = std::fs::read(&args.input_file)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", args.input_file.display()))?;

    let workflow = SignWorkflow::from_config(&config).into_diagnostic()?;
    let placement = SignaturePlacement::new(args.page, args.rect);
    let signed = workflow
        .sign_with_identity(&pdf, &placement, &label, &identity)
        .into_diagnostic()?;

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input_file));
    std::fs::write(&output, &signed)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to write {}", output.display()))?;

    println!("✅ Signed as '{label}' -> {}", output.display());
    Ok(())
}

fn format_time(time: SystemTime) -> String {
    der::DateTime::from_system_time(time)
        .map(|t| t.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn report_json(report: &VerificationReport) -> serde_json::Value {
    let details = report.details.as_ref();
    serde_json::json!({
        "valid": report.success(),
        "failure": report.failure,
        "message": report.message,
        "byteRange": details.map(|d| d.byte_range.as_array()),
        "digestAlgorithm": details.map(|d| d.digest_algorithm),
        "signer": details.and_then(|d| d.signer_common_name.clone()),
        "signingTime": details.and_then(|d| d.signing_time).map(format_time),
    })
}

fn handle_verify_command(file: &Path, json: bool) -> Result<()> {
    let report = VerifyWorkflow::new().run_file(file).into_diagnostic()?;

    if json {
        let text = serde_json::to_string_pretty(&report_json(&report)).into_diagnostic()?;
        println!("{text}");
    } else if let Some(details) = &report.details {
        println!("✅ Signature valid: {}", file.display());
        println!(
            "   Signer: {}",
            details.signer_common_name.as_deref().unwrap_or("(no common name)")
        );
        println!("   Digest algorithm: {}", details.digest_algorithm);
        if let Some(time) = details.signing_time {
            println!("   Signing time: {}", format_time(time));
        }
        println!("   ByteRange: {}", details.byte_range);
    } else {
        println!("❌ Signature invalid: {}", file.display());
        if let Some(failure) = report.failure {
            println!("   Reason: {}", failure.as_str());
        }
        if let Some(message) = &report.message {
            println!("   Detail: {message}");
        }
    }

    if !report.success() {
        std::process::exit(1);
    }
    Ok(())
}

fn handle_config_command(config_manager: &ConfigManager, config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show => match config_manager.load() {
            Ok(config) => {
                println!("📋 Current Configuration:");
                println!("  Hash algorithm: {}", config.hash_algorithm);
                println!("  Signature capacity: {} bytes", config.signature_capacity);
                println!("  Reason: {}", config.reason);
                println!("  Default signer label: {}", config.default_signer_label);
                println!("  Field name: {}", config.field_name);
                println!("  Signer timeout: {}s", config.signer_timeout_seconds);
                println!("  Max in flight: {}", config.max_in_flight);
                println!("  Relay bind address: {}", config.relay.bind_address);
                println!(
                    "  Relay signer token: {}",
                    if config.relay.signer_token.is_some() {
                        "set"
                    } else {
                        "not set"
                    }
                );
                println!(
                    "  Configuration file: {}",
                    config_manager.config_path().display()
                );
            }
            Err(_) => {
                println!("📋 No configuration file found. Use 'config init' to create one.");
            }
        },

        ConfigCommands::Init => {
            let _config = config_manager.load_or_create_default().into_diagnostic()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
            println!("   Edit the file to customize settings, or use 'config set' commands.");
        }

        ConfigCommands::Set { key, value } => {
            config_manager
                .update_value(&key, &value)
                .into_diagnostic()?;
            println!("✅ Configuration updated: {key} = {value}");
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager
                .export_config(format.into())
                .into_diagnostic()?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content).into_diagnostic()?;
                println!("✅ Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }
    }

    Ok(())
}
