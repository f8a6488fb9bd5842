//! Ferro compiler library.
//!
//! Compiles Ferro source, a small Rust-flavored imperative language, to a
//! quadruple intermediate representation and MIPS32 assembly targeting a
//! SPIM-style runtime.
//!
//! The pipeline: lexer -> parser -> semantic analysis -> IR generation ->
//! register allocation and MIPS emission. Lexical and syntactic errors abort
//! immediately; semantic diagnostics accumulate and any error among them
//! blocks code generation, while warnings pass through. Every compilation
//! uses fresh stage instances; there is no global state.
//!
//! ```rust,ignore
//! use ferroc::{compile_source, BuildConfig};
//!
//! let artifacts = compile_source("fn main() { return; }", &BuildConfig::new())?;
//! println!("{}", artifacts.ir_text);
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod ir;
pub mod irgen;
pub mod lexer;
pub mod parser;
pub mod regalloc;
pub mod semantics;
pub mod symbols;

pub use ast::Program;
pub use codegen::{CodeGenError, MipsCodeGenerator};
pub use config::{BuildConfig, ProjectConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity, has_errors};
pub use ir::{IrProgram, Quad, write_ir};
pub use irgen::IrGenerator;
pub use lexer::{LexError, Lexer, Token};
pub use parser::{ParseError, Parser};
pub use semantics::SemanticAnalyzer;
pub use symbols::SymbolTable;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A failed compilation, by pipeline stage.
#[derive(Debug)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    /// The full diagnostic list of a compilation stopped by fatal semantic
    /// diagnostics (warnings included, in source order).
    Semantic(Vec<Diagnostic>),
    CodeGen(CodeGenError),
    Io(String),
}

impl CompileError {
    /// Process exit code: 1 lexical/syntactic, 2 semantic (and codegen),
    /// 3 I/O.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Lex(_) | CompileError::Parse(_) => 1,
            CompileError::Semantic(_) | CompileError::CodeGen(_) => 2,
            CompileError::Io(_) => 3,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "{}", e),
            CompileError::Parse(e) => write!(f, "{}", e),
            CompileError::Semantic(diags) => {
                for (i, diag) in diags.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", diag)?;
                }
                Ok(())
            }
            CompileError::CodeGen(e) => write!(f, "{}", e),
            CompileError::Io(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        CompileError::Lex(e)
    }
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl From<CodeGenError> for CompileError {
    fn from(e: CodeGenError) -> Self {
        CompileError::CodeGen(e)
    }
}

/// Everything a successful compilation produces.
#[derive(Debug)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub program: Program,
    /// Non-fatal diagnostics (warnings).
    pub diagnostics: Vec<Diagnostic>,
    pub ir: IrProgram,
    pub ir_text: String,
    /// `None` when assembly emission was disabled.
    pub asm: Option<String>,
}

/// Run the pipeline over a source string.
pub fn compile_source(source: &str, config: &BuildConfig) -> Result<Compilation, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let program = Parser::new(tokens.clone()).parse()?;

    let diagnostics = SemanticAnalyzer::new().analyze(&program);
    let fatal = has_errors(&diagnostics)
        || (config.deny_warnings && !diagnostics.is_empty());
    if fatal {
        return Err(CompileError::Semantic(diagnostics));
    }

    let ir = IrGenerator::new().generate(&program);
    let ir_text = write_ir(&ir.quads);
    let asm = if config.emit_asm {
        Some(MipsCodeGenerator::new(&ir).generate()?)
    } else {
        None
    };

    Ok(Compilation {
        tokens,
        program,
        diagnostics,
        ir,
        ir_text,
        asm,
    })
}

/// Paths written by [`compile_file`], plus the warnings to report.
#[derive(Debug)]
pub struct BuildOutput {
    pub ir_path: PathBuf,
    pub asm_path: Option<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compile a source file, writing `<stem>.ir` under `<out_dir>/ir/` and
/// (unless disabled) `<stem>.asm` under `<out_dir>/asm/`.
pub fn compile_file(source_path: &Path, config: &BuildConfig) -> Result<BuildOutput, CompileError> {
    let source = fs::read_to_string(source_path).map_err(|e| {
        CompileError::Io(format!(
            "Failed to read source file '{}': {}",
            source_path.display(),
            e
        ))
    })?;

    let artifacts = compile_source(&source, config)?;

    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());

    let ir_dir = config.out_dir.join("ir");
    fs::create_dir_all(&ir_dir)
        .map_err(|e| CompileError::Io(format!("Failed to create '{}': {}", ir_dir.display(), e)))?;
    let ir_path = ir_dir.join(format!("{}.ir", stem));
    fs::write(&ir_path, &artifacts.ir_text)
        .map_err(|e| CompileError::Io(format!("Failed to write '{}': {}", ir_path.display(), e)))?;

    let asm_path = match &artifacts.asm {
        Some(asm) => {
            let asm_dir = config.out_dir.join("asm");
            fs::create_dir_all(&asm_dir).map_err(|e| {
                CompileError::Io(format!("Failed to create '{}': {}", asm_dir.display(), e))
            })?;
            let path = asm_dir.join(format!("{}.asm", stem));
            fs::write(&path, asm).map_err(|e| {
                CompileError::Io(format!("Failed to write '{}': {}", path.display(), e))
            })?;
            Some(path)
        }
        None => None,
    };

    Ok(BuildOutput {
        ir_path,
        asm_path,
        diagnostics: artifacts.diagnostics,
    })
}
