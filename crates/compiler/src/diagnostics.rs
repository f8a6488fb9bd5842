//! Semantic diagnostics.
//!
//! Errors and warnings accumulate in a `Vec<Diagnostic>` owned by the driver;
//! the analyzer never aborts on the first problem. Warnings do not block code
//! generation, any error does.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    UndefinedVariable,
    UndefinedFunction,
    ImmutableAssignment,
    TypeMismatch,
    FunctionArgs,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    UnusedVariable,
    VariableShadowing,
}

impl DiagnosticKind {
    /// Stable machine-readable code; warnings carry a `warning_` prefix.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UndefinedVariable => "undefined_variable",
            DiagnosticKind::UndefinedFunction => "undefined_function",
            DiagnosticKind::ImmutableAssignment => "immutable_assignment",
            DiagnosticKind::TypeMismatch => "type_mismatch",
            DiagnosticKind::FunctionArgs => "function_args",
            DiagnosticKind::BreakOutsideLoop => "break_outside_loop",
            DiagnosticKind::ContinueOutsideLoop => "continue_outside_loop",
            DiagnosticKind::UnusedVariable => "warning_unused_variable",
            DiagnosticKind::VariableShadowing => "warning_variable_shadowing",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnusedVariable | DiagnosticKind::VariableShadowing => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            line: None,
            column: None,
            suggestion: None,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn suggest(mut self, text: impl Into<String>) -> Self {
        self.suggestion = Some(text.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity() {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        write!(f, "{}", prefix)?;
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, " at line {}, column {}", line, column)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

/// True when any diagnostic is a hard error (warnings alone do not count).
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| d.severity() == Severity::Error)
}
