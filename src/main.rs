use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dbmlgen::codegen::GeneratorOptions;
use dbmlgen::convert::{convert, ConvertOptions, OutputFormat};
use dbmlgen::parser::ParseOptions;

#[derive(Parser, Debug)]
#[command(name = "dbmlgen", version)]
#[command(about = "Convert DBML to schema JSON, TypeORM entities or a Prisma schema", long_about = None)]
struct Cli {
    /// Input DBML file (stdin when omitted or `-`)
    input: Option<PathBuf>,

    /// Output format: json, typeorm or prisma
    #[arg(long, short, default_value = "json")]
    format: OutputFormat,

    /// Write files into this directory instead of stdout
    #[arg(long, short, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Fail on lines that cannot be parsed
    #[arg(long)]
    strict: bool,

    /// Leave column notes out of generated code
    #[arg(long)]
    no_comments: bool,

    /// Prisma datasource provider (default: from Project database_type)
    #[arg(long, value_name = "NAME")]
    provider: Option<String>,
}

fn read_input(path: Option<&PathBuf>) -> io::Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path),
        _ => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let input = match read_input(cli.input.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            let name = cli.input.as_ref().map_or("stdin".into(), |p| p.display().to_string());
            eprintln!("Failed to read {}: {}", name, e);
            process::exit(1);
        }
    };

    let options = ConvertOptions {
        parse: ParseOptions { strict: cli.strict },
        generator: GeneratorOptions {
            include_comments: !cli.no_comments,
            datasource_provider: cli.provider,
        },
    };

    let artifacts = match convert(&input, cli.format, &options) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Conversion error: {}", e);
            process::exit(1);
        }
    };

    match cli.output {
        Some(dir) => {
            if let Err(e) = fs::create_dir_all(&dir) {
                eprintln!("Failed to create {}: {}", dir.display(), e);
                process::exit(1);
            }
            for artifact in &artifacts {
                let path = dir.join(&artifact.filename);
                if let Err(e) = fs::write(&path, &artifact.content) {
                    eprintln!("Failed to write {}: {}", path.display(), e);
                    process::exit(1);
                }
                tracing::info!(path = %path.display(), "wrote artifact");
            }
        }
        None => {
            let headers = artifacts.len() > 1;
            for artifact in &artifacts {
                if headers {
                    println!("// {}", artifact.filename);
                }
                print!("{}", artifact.content);
                if headers && !artifact.content.ends_with('\n') {
                    println!();
                }
            }
        }
    }
}
