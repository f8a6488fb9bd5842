//! Ferro compiler CLI.
//!
//! `ferroc compile` runs the full pipeline and writes the IR and assembly
//! files; `ferroc check` stops after semantic analysis. Exit codes: 0 on
//! success, 1 for lexical/syntactic errors, 2 for semantic (or code
//! generation) errors, 3 for I/O errors.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use ferroc::{
    BuildConfig, CompileError, Lexer, Parser, ProjectConfig, SemanticAnalyzer, compile_file,
    diagnostics,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "ferroc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ferro compiler - compile Ferro programs to MIPS32 assembly", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file to quadruple IR and MIPS assembly
    Compile {
        /// Input source file
        input: PathBuf,

        /// Stop after emitting the quadruple IR
        #[arg(long)]
        ir: bool,

        /// Emit MIPS assembly (the default; overrides --ir)
        #[arg(long)]
        asm: bool,

        /// Output directory (ir/ and asm/ are created beneath it)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Path to a ferro.toml project configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Treat warnings as errors
        #[arg(long)]
        deny_warnings: bool,

        /// Suppress progress output (diagnostics still print)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Parse and analyze a source file without generating code
    Check {
        /// Input source file
        input: PathBuf,

        /// Treat warnings as errors
        #[arg(long)]
        deny_warnings: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            input,
            ir,
            asm,
            out_dir,
            config,
            deny_warnings,
            quiet,
        } => run_compile(&input, ir, asm, out_dir, config.as_deref(), deny_warnings, quiet),
        Commands::Check {
            input,
            deny_warnings,
        } => run_check(&input, deny_warnings),
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "ferroc", &mut io::stdout());
}

fn build_config(
    input: &Path,
    ir: bool,
    asm: bool,
    out_dir: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<BuildConfig, String> {
    let mut config = BuildConfig::new();

    let project_path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => ProjectConfig::find_near(input),
    };
    if let Some(path) = project_path {
        config.apply_project(&ProjectConfig::load(&path)?);
    }

    // CLI flags win over the project file; --asm wins over --ir.
    if ir {
        config.emit_asm = false;
    }
    if asm {
        config.emit_asm = true;
    }
    if let Some(out_dir) = out_dir {
        config.out_dir = out_dir;
    }
    Ok(config)
}

fn run_compile(
    input: &Path,
    ir: bool,
    asm: bool,
    out_dir: Option<PathBuf>,
    config_path: Option<&Path>,
    deny_warnings: bool,
    quiet: bool,
) {
    let mut config = match build_config(input, ir, asm, out_dir, config_path) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("Error: {}", message);
            process::exit(3);
        }
    };
    if deny_warnings {
        config.deny_warnings = true;
    }

    match compile_file(input, &config) {
        Ok(output) => {
            for diag in &output.diagnostics {
                eprintln!("{}", diag);
            }
            if !quiet {
                println!("Wrote {}", output.ir_path.display());
                if let Some(asm_path) = &output.asm_path {
                    println!("Wrote {}", asm_path.display());
                }
            }
        }
        Err(err) => {
            eprintln!("{}", err);
            process::exit(err.exit_code());
        }
    }
}

fn run_check(input: &Path, deny_warnings: bool) {
    let source = match std::fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: Failed to read source file '{}': {}", input.display(), e);
            process::exit(3);
        }
    };

    let tokens = match Lexer::new(&source).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    let program = match Parser::new(tokens).parse() {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let diags = SemanticAnalyzer::new().analyze(&program);
    for diag in &diags {
        eprintln!("{}", diag);
    }
    let fatal = diagnostics::has_errors(&diags) || (deny_warnings && !diags.is_empty());
    if fatal {
        // Match the pipeline's classification of fatal semantics.
        process::exit(CompileError::Semantic(diags).exit_code());
    }
}
