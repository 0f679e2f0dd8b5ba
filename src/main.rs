//! Command-line interface for soapschema

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use soapschema::{FaultCode, Limits, SoapVersion};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "soapschema")]
#[command(author, version, about = "SOAP envelope inspection tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect a SOAP envelope: payload tag or fault details
    Envelope {
        /// Path to the envelope file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Read the envelope as SOAP 1.2
        #[arg(long)]
        soap12: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print a fault envelope
    Fault {
        /// Fault code: Client, Server, VersionMismatch, MustUnderstand
        /// (Sender and Receiver are accepted too)
        #[arg(short, long)]
        code: String,

        /// Fault message
        #[arg(short, long)]
        message: String,

        /// URI of the faulting node
        #[arg(short, long)]
        actor: Option<String>,

        /// Produce a SOAP 1.2 envelope
        #[arg(long)]
        soap12: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Envelope { file, soap12, json } => cmd_envelope(file, version(soap12), json),
        Commands::Fault {
            code,
            message,
            actor,
            soap12,
        } => cmd_fault(&code, &message, actor.as_deref(), version(soap12)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn version(soap12: bool) -> SoapVersion {
    if soap12 {
        SoapVersion::Soap12
    } else {
        SoapVersion::Soap11
    }
}

#[cfg(feature = "cli")]
fn cmd_envelope(
    path: PathBuf,
    version: SoapVersion,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    use serde_json::json;

    let bytes = fs::read(&path)?;
    let envelope = version.model()?.parse_envelope(&bytes, &Limits::default())?;

    if let Some(fault) = envelope.fault_error() {
        if json_output {
            let value = json!({
                "version": version.to_string(),
                "fault": {
                    "code": fault.code.to_string(),
                    "message": fault.message,
                    "actor": fault.actor,
                }
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{} fault", version);
            println!("  Code: {}", fault.code);
            println!("  Message: {}", fault.message);
            if let Some(actor) = &fault.actor {
                println!("  Actor: {}", actor);
            }
        }
        return Ok(());
    }

    let payload = envelope.payload().ok_or("Envelope has no payload")?;
    let header = envelope.header().map(|h| {
        h.children
            .iter()
            .map(|c| c.qname.to_string())
            .collect::<Vec<_>>()
    });
    if json_output {
        let value = json!({
            "version": version.to_string(),
            "payload": payload.qname.to_string(),
            "header": header,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{} envelope", version);
        println!("  Payload: {}", payload.qname);
        if let Some(header) = header {
            println!("  Header: {}", header.join(", "));
        }
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_fault(
    code: &str,
    message: &str,
    actor: Option<&str>,
    version: SoapVersion,
) -> Result<(), Box<dyn std::error::Error>> {
    let code = FaultCode::from_wire(code).ok_or_else(|| format!("Unknown fault code: {}", code))?;
    let xml = version.model()?.error_response(code, message, None, actor)?;
    println!("{}", xml);
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
