use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use wit_cabi::abi::{self, CanonicalAbiError};
use wit_cabi::host::{CanonicalOptions, MemoryHost, Val};
use wit_cabi::wave::{format_val, parse_val};
use wit_cabi::{WaveType, WitType, load_wit_type_from_path, resolve_wit_type};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Lib(#[from] wit_cabi::Error),

    #[error("Canonical ABI error: {0}")]
    CanonicalAbi(#[from] CanonicalAbiError),

    #[error("WAVE parsing error: {0}")]
    WaveParse(String),
}

#[derive(Parser)]
#[command(name = "wit-cabi")]
#[command(about = "Inspect the canonical ABI layout of WIT types and lower values through it")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TypeArgs {
    /// Path to the WIT file or package directory containing the type definition
    #[arg(short, long, env = "WIT_CABI_WIT")]
    wit: PathBuf,

    /// Name of the type to use (if not specified, uses the first type found)
    #[arg(short = 't', long)]
    type_name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the size, alignment and flattened core slots of a type
    Layout {
        #[command(flatten)]
        ty: TypeArgs,
    },

    /// Lower a WAVE-encoded value to flat core operands
    Lower {
        #[command(flatten)]
        ty: TypeArgs,

        /// WAVE-encoded value to lower
        #[arg(short, long)]
        value: String,

        /// Upper bound on linear memory, in bytes
        #[arg(long)]
        memory_limit: Option<usize>,
    },

    /// Store a WAVE-encoded value in linear memory and load it back
    Store {
        #[command(flatten)]
        ty: TypeArgs,

        /// WAVE-encoded value to store
        #[arg(short, long)]
        value: String,

        /// Write the whole linear memory to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Upper bound on linear memory, in bytes
        #[arg(long)]
        memory_limit: Option<usize>,
    },
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Layout { ty } => {
            let (_, ty) = load_type(&ty)?;
            println!("type: {ty}");
            println!("size: {}", abi::size(&ty)?);
            println!("alignment: {}", abi::alignment(&ty)?);
            println!("flat:");
            for segment in abi::flatten(&ty)? {
                let label = segment.label_path();
                if label.is_empty() {
                    println!("  {}", segment.ty);
                } else {
                    println!("  {label}: {}", segment.ty);
                }
            }
            Ok(())
        }

        Commands::Lower {
            ty,
            value,
            memory_limit,
        } => {
            let (wave_type, ty) = load_type(&ty)?;
            let value = parse_val(&value, &wave_type, &ty)?;
            let mut host = MemoryHost::with_options(options(memory_limit));

            let segments = abi::flatten(&ty)?;
            let operands = host.lower_value(&ty, value)?;
            for (segment, operand) in segments.iter().zip(&operands) {
                let label = segment.label_path();
                if label.is_empty() {
                    println!("{operand}");
                } else {
                    println!("{label} = {operand}");
                }
            }
            print_memory(&host);
            Ok(())
        }

        Commands::Store {
            ty,
            value,
            output,
            memory_limit,
        } => {
            let (wave_type, ty) = load_type(&ty)?;
            let value = parse_val(&value, &wave_type, &ty)?;
            let mut host = MemoryHost::with_options(options(memory_limit));

            let ptr = host.store_value(&ty, value)?;
            let bytes = host.memory().read(ptr, abi::size(&ty)?)?;
            println!("ptr: {ptr}");
            println!("value: {}", hex(bytes));
            print_memory(&host);

            let loaded: Val = host.load_value(&ty, ptr)?;
            println!("loaded: {}", format_val(&loaded, &wave_type)?);

            if let Some(output) = output {
                std::fs::write(&output, host.memory().as_bytes())?;
                println!(
                    "Wrote linear memory to {} ({} bytes)",
                    output.display(),
                    host.memory().len()
                );
            }
            Ok(())
        }
    }
}

fn load_type(args: &TypeArgs) -> Result<(WaveType, WitType), AppError> {
    let (resolve, type_id, ty) = load_wit_type_from_path(&args.wit, args.type_name.as_deref())?;
    let wave_type =
        resolve_wit_type(&resolve, type_id).map_err(|e| AppError::WaveParse(e.to_string()))?;
    Ok((wave_type, ty))
}

fn options(memory_limit: Option<usize>) -> CanonicalOptions {
    match memory_limit {
        Some(limit) => CanonicalOptions::default().with_memory_limit(limit),
        None => CanonicalOptions::default(),
    }
}

fn print_memory(host: &MemoryHost) {
    let memory = host.memory();
    if memory.is_empty() {
        println!("memory: (empty)");
    } else {
        println!("memory ({} bytes): {}", memory.len(), hex(memory.as_bytes()));
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
