//! Celik CLI Example
//!
//! Reads Serbian identity and vehicle registration cards through a PC/SC
//! reader and verifies their signatures.
//!
//! # Prerequisites
//!
//! - A contact smart card reader
//! - PC/SC daemon running (built-in on macOS/Windows, `pcscd` on Linux)
//!
//! # Quick Start
//!
//! ```bash
//! cargo run --example celik-cli -p celik-core --features pcsc -- readers
//! cargo run --example celik-cli -p celik-core --features pcsc -- read
//! RUST_LOG=debug cargo run --example celik-cli -p celik-core --features pcsc -- verify
//! ```
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `readers` | List readers |
//! | `read [reader]` | Print every record on the card as JSON |
//! | `certs [reader]` | Print the card certificates as hex |
//! | `verify [reader]` | Verify every signature against the card's own CA |
//! | `change-pin [reader]` | Change the card holder PIN |
//!
//! Without a reader name, the first reader is used.

#![expect(unused_crate_dependencies, reason = "needed for CLI example")]

use std::env;
use std::io::{self, Write};

use celik_core::card::PcscConnector;
use celik_core::reader::vehicle::SIGNED_BLOCKS;
use celik_core::{
    API_VERSION, CertificateRole, EidContext, Error, Result, SignatureRole, VerificationResult,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_help();
        return;
    }

    let reader = args.get(2).map(String::as_str);
    let outcome = match args[1].as_str() {
        "readers" => cmd_readers(),
        "read" => with_context(|context| cmd_read(context, reader)),
        "certs" => with_context(|context| cmd_certs(context, reader)),
        "verify" => with_context(|context| cmd_verify(context, reader)),
        "change-pin" => with_context(|context| cmd_change_pin(context, reader)),
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error ({}): {e}", e.code());
    }
}

fn print_help() {
    println!(
        r#"Celik CLI

USAGE:
    celik-cli <COMMAND> [READER]

COMMANDS:
    readers      List smart card readers
    read         Print every record on the card as JSON
    certs        Print the card certificates
    verify       Verify the card signatures against the CA stored on the card
    change-pin   Change the card holder PIN
    help         Show this help message

EXAMPLES:
    cargo run --example celik-cli --features pcsc -- readers
    cargo run --example celik-cli --features pcsc -- read "Gemalto USB Reader 00 00"
"#
    );
}

fn with_context(run: impl FnOnce(&mut EidContext) -> Result<()>) -> Result<()> {
    let mut context = EidContext::startup(API_VERSION, PcscConnector::establish()?)?;
    let outcome = run(&mut context);
    context.cleanup();
    outcome
}

fn pick_reader(context: &mut EidContext, requested: Option<&str>) -> Result<String> {
    if let Some(name) = requested {
        return Ok(name.to_string());
    }
    context
        .list_readers()?
        .into_iter()
        .next()
        .ok_or_else(|| Error::Reader("no readers found".to_string()))
}

fn cmd_readers() -> Result<()> {
    let mut context = EidContext::startup(API_VERSION, PcscConnector::establish()?)?;
    let readers = context.list_readers()?;
    if readers.is_empty() {
        println!("No readers found.");
        println!("\nMake sure the PC/SC daemon is running:");
        println!("  - macOS: launchctl list | grep pcscd");
        println!("  - Linux: systemctl status pcscd");
    } else {
        println!("Found {} reader(s):\n", readers.len());
        for (i, reader) in readers.iter().enumerate() {
            println!("  [{}] {}", i + 1, reader);
        }
    }
    context.cleanup();
    Ok(())
}

fn cmd_read(context: &mut EidContext, reader: Option<&str>) -> Result<()> {
    let reader = pick_reader(context, reader)?;
    let mut session = context.begin_read(&reader, None)?;
    println!("Detected: {}\n", session.family());

    let records = session.read_all()?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn cmd_certs(context: &mut EidContext, reader: Option<&str>) -> Result<()> {
    let reader = pick_reader(context, reader)?;
    let mut session = context.begin_read(&reader, None)?;

    for role in [
        CertificateRole::IntermediateCa,
        CertificateRole::User1,
        CertificateRole::User2,
    ] {
        match session.read_certificate(role) {
            Ok(cert) => {
                println!("{role:?} ({} bytes):", cert.as_der().len());
                println!("  {}", hex::encode(cert.as_der()));
            }
            Err(Error::UnableToExecute(reason)) => println!("{role:?}: {reason}"),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn print_verification(result: &VerificationResult) {
    let verdict = if result.is_valid() { "OK" } else { "FAILED" };
    println!("{:?}: {verdict}", result.role);
    println!("  signer: {}", result.signer_subject);
    for error in &result.errors {
        println!("  - {error}");
    }
}

fn cmd_verify(context: &mut EidContext, reader: Option<&str>) -> Result<()> {
    let reader = pick_reader(context, reader)?;
    let mut session = context.begin_read(&reader, None)?;

    if session.family().is_vehicle() {
        for index in SIGNED_BLOCKS {
            print_verification(&session.verify_registration(index, None)?);
        }
        return Ok(());
    }
    if !session.family().is_identity() {
        println!("{} data is not signed.", session.family());
        return Ok(());
    }

    for role in [
        SignatureRole::Card,
        SignatureRole::Fixed,
        SignatureRole::Variable,
        SignatureRole::Portrait,
    ] {
        match session.verify_with_card_anchor(role) {
            Ok(result) => print_verification(&result),
            Err(Error::UnableToExecute(reason)) => println!("{role:?}: skipped, {reason}"),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn cmd_change_pin(context: &mut EidContext, reader: Option<&str>) -> Result<()> {
    let reader = pick_reader(context, reader)?;
    let old = prompt("Current PIN: ")?;
    let new = prompt("New PIN: ")?;
    if prompt("Repeat new PIN: ")? != new {
        return Err(Error::InvalidParameter("PINs do not match".to_string()));
    }

    let mut session = context.begin_read(&reader, None)?;
    match session.change_password(&old, &new) {
        Ok(_) => println!("PIN changed."),
        Err(Error::InvalidPassword { attempts_remaining }) => {
            println!("Wrong PIN, {attempts_remaining} attempt(s) left.");
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout()
        .flush()
        .map_err(|e| Error::General(e.to_string()))?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .map_err(|e| Error::General(e.to_string()))?;
    Ok(line.trim().to_string())
}
