//! Lexically scoped symbol table.
//!
//! An explicit stack of name-to-symbol maps. A scope is pushed on function
//! entry and for every block, and popped on exit; popping reports unused
//! non-function symbols. Redeclaring a name in the same scope is shadowing:
//! allowed, the prior symbol is marked used, and a notice is emitted.

use crate::ast::Ty;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Var,
    Function { param_tys: Vec<Ty>, ret_ty: Ty },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    /// The variable's type; `None` while unknown (error recovery).
    /// For functions the signature lives in `kind`.
    pub ty: Option<Ty>,
    pub mutable: bool,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub used: bool,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn var(name: impl Into<String>, ty: Option<Ty>, mutable: bool) -> Self {
        Symbol {
            name: name.into(),
            ty,
            mutable,
            line: None,
            column: None,
            used: false,
            kind: SymbolKind::Var,
        }
    }

    pub fn function(name: impl Into<String>, param_tys: Vec<Ty>, ret_ty: Ty) -> Self {
        Symbol {
            name: name.into(),
            ty: None,
            mutable: false,
            line: None,
            column: None,
            used: false,
            kind: SymbolKind::Function { param_tys, ret_ty },
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { .. })
    }
}

/// One scope: a map plus declaration order so popped-scope warnings are
/// reported in source order.
#[derive(Debug, Default)]
struct Scope {
    symbols: HashMap<String, Symbol>,
    order: Vec<String>,
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::default()],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost scope, warning about unused non-function symbols.
    /// The global scope is never popped.
    pub fn exit_scope(&mut self, diagnostics: &mut Vec<Diagnostic>) {
        if self.scopes.len() <= 1 {
            return;
        }
        let Some(mut scope) = self.scopes.pop() else {
            return;
        };
        for name in scope.order.drain(..) {
            // A shadowed name appears twice in the order list; only the
            // surviving symbol is still in the map.
            let Some(symbol) = scope.symbols.remove(&name) else {
                continue;
            };
            if !symbol.used && !symbol.is_function() {
                let mut diag = Diagnostic::new(
                    DiagnosticKind::UnusedVariable,
                    format!("Variable '{}' is defined but never used", symbol.name),
                )
                .suggest(format!(
                    "Consider removing unused variable '{}'",
                    symbol.name
                ));
                if let (Some(line), Some(column)) = (symbol.line, symbol.column) {
                    diag = diag.at(line, column);
                }
                diagnostics.push(diag);
            }
        }
    }

    /// Define a symbol in the current scope. Same-scope redeclaration is
    /// shadowing: the prior symbol counts as used and a notice is emitted.
    pub fn define(&mut self, symbol: Symbol, diagnostics: &mut Vec<Diagnostic>) {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if let Some(existing) = scope.symbols.get_mut(&symbol.name) {
            existing.used = true;
            let mut diag = Diagnostic::new(
                DiagnosticKind::VariableShadowing,
                format!("Variable '{}' shadows a previous declaration", symbol.name),
            );
            if let Some(prev_line) = existing.line {
                diag = diag.suggest(format!("Previous declaration was at line {}", prev_line));
            }
            if let (Some(line), Some(column)) = (symbol.line, symbol.column) {
                diag = diag.at(line, column);
            }
            diagnostics.push(diag);
        }
        scope.order.push(symbol.name.clone());
        scope.symbols.insert(symbol.name.clone(), symbol);
    }

    /// Innermost-first lookup. `mark_used` records the reference for the
    /// unused-variable check (assignment counts as a use).
    pub fn lookup(&mut self, name: &str, mark_used: bool) -> Option<&Symbol> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(symbol) = scope.symbols.get_mut(name) {
                if mark_used {
                    symbol.used = true;
                }
                return Some(symbol);
            }
        }
        None
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
