use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use folio_pdf::{Compositor, parse_description};

#[derive(Parser)]
#[command(name = "folio-pdf")]
#[command(version)]
#[command(about = "Compose a JSON report description into a paginated PDF", long_about = None)]
struct Cli {
    /// Report description (JSON)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output PDF (defaults to the input name with a .pdf extension)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Extra directory to search for font families (repeatable)
    #[arg(long = "font-dir", value_name = "DIR")]
    font_dirs: Vec<PathBuf>,

    /// Print warnings to stdout as JSON
    #[arg(long)]
    warnings_json: bool,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(&cli.input)?;
    let mut doc = parse_description(&json)?;
    // relative paths in the description resolve against its directory; flags against the cwd
    doc.metadata.font_dirs.extend(
        cli.font_dirs
            .iter()
            .map(|d| std::path::absolute(d).unwrap_or_else(|_| d.clone())),
    );

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("pdf"));
    let base_dir = cli
        .input
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let out = Compositor::new(doc).with_base_dir(base_dir).render()?;
    std::fs::write(&output, &out.bytes)?;

    if cli.warnings_json {
        println!("{}", serde_json::to_string_pretty(&out.warnings)?);
    } else {
        for w in &out.warnings {
            eprintln!("warning: {w}");
        }
    }
    eprintln!(
        "Wrote {} ({} pages, {} bytes)",
        output.display(),
        out.page_count,
        out.bytes.len()
    );
    Ok(())
}
