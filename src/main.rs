use clap::Parser;
use mpascal::CompilerOptions;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "mpascalc", about = "Compiles a restricted Pascal dialect to a stack-VM instruction listing")]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Output path; defaults to standard output
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Trace each pipeline phase to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let result = run(&cli);
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> mpascal::CompileResult<()> {
    if cli.verbose {
        eprintln!("reading {}", cli.input.display());
    }
    let source = fs::read_to_string(&cli.input)
        .map_err(|e| mpascal::CompileError::syntax(0, format!("could not read '{}': {}", cli.input.display(), e)))?;

    if cli.verbose {
        eprintln!("lexing ({} bytes)", source.len());
    }
    let tokens = mpascal::lexer::tokenize(&source)?;

    if cli.verbose {
        eprintln!("parsing ({} tokens)", tokens.len());
    }
    let program = mpascal::parser::parse(tokens)?;

    if cli.verbose {
        eprintln!("semantic analysis");
    }
    mpascal::semantic::analyze(&program)?;

    if cli.verbose {
        eprintln!("code generation");
    }
    let options = CompilerOptions::default();
    let instructions = mpascal::codegen::generate(&program, &options)?;
    if cli.verbose {
        eprintln!("emitted {} instructions", instructions.len());
    }

    let mut listing = instructions.join("\n");
    if options.emit_trailing_newline {
        listing.push('\n');
    }

    match &cli.output {
        Some(path) => fs::write(path, &listing)
            .map_err(|e| mpascal::CompileError::syntax(0, format!("could not write '{}': {}", path.display(), e)))?,
        None => print!("{}", listing),
    }

    Ok(())
}
