//! Semantic analysis.
//!
//! A single pre-order walk over the AST, threading the scope stack, the
//! current function's return type, and the loop-nesting depth. Diagnostics
//! accumulate; nothing aborts early. Expression typing propagates "unknown"
//! (`None`) to suppress cascades from an already-reported problem.
//!
//! Function signatures are registered in a first pass so forward calls
//! resolve regardless of declaration order.

use crate::ast::{BinOp, Block, Expr, FnDecl, Program, Stmt, Ty, UnOp};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::symbols::{Symbol, SymbolKind, SymbolTable};

pub struct SemanticAnalyzer {
    table: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    /// Return type of the enclosing function; `None` at top level.
    current_ret_ty: Option<Ty>,
    loop_depth: u32,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        SemanticAnalyzer {
            table: SymbolTable::new(),
            diagnostics: Vec::new(),
            current_ret_ty: None,
            loop_depth: 0,
        }
    }

    /// Analyze a program and return every diagnostic found.
    pub fn analyze(mut self, program: &Program) -> Vec<Diagnostic> {
        for f in &program.functions {
            let param_tys = f.params.iter().map(|p| p.ty.clone()).collect();
            let symbol =
                Symbol::function(f.name.clone(), param_tys, f.ret_ty.clone()).at(f.line, f.column);
            self.table.define(symbol, &mut self.diagnostics);
        }
        for f in &program.functions {
            self.check_fn(f);
        }
        self.diagnostics
    }

    fn report(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    fn check_fn(&mut self, f: &FnDecl) {
        self.table.enter_scope();
        let saved_ret = self.current_ret_ty.replace(f.ret_ty.clone());
        for p in &f.params {
            let symbol =
                Symbol::var(p.name.clone(), Some(p.ty.clone()), p.mutable).at(p.line, p.column);
            self.table.define(symbol, &mut self.diagnostics);
        }
        self.check_block(&f.body);
        self.current_ret_ty = saved_ret;
        self.table.exit_scope(&mut self.diagnostics);
    }

    fn check_block(&mut self, block: &Block) {
        self.table.enter_scope();
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.table.exit_scope(&mut self.diagnostics);
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty => {}
            Stmt::Let {
                name,
                mutable,
                ty,
                init,
                line,
                column,
            } => {
                // The initializer is typed before the name is in scope, so
                // `let x = x + 1;` refers to any outer `x`.
                let init_ty = init.as_ref().and_then(|e| self.type_of(e));
                if let (Some(declared), Some(actual)) = (ty.as_ref(), init_ty.as_ref()) {
                    if declared != actual {
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::TypeMismatch,
                                format!(
                                    "Type mismatch in variable '{}' initialization: expected '{}', found '{}'",
                                    name, declared, actual
                                ),
                            )
                            .at(*line, *column)
                            .suggest(format!(
                                "Convert the value to type '{}' or change the expected type",
                                declared
                            )),
                        );
                    }
                }
                let var_ty = ty.clone().or(init_ty);
                let symbol = Symbol::var(name.clone(), var_ty, *mutable).at(*line, *column);
                self.table.define(symbol, &mut self.diagnostics);
            }
            Stmt::Assign { place, value } => self.check_assign(place, value),
            Stmt::Return {
                value,
                line,
                column,
            } => self.check_return(value.as_ref(), *line, *column),
            Stmt::If {
                cond,
                then_block,
                elifs,
                else_block,
            } => {
                self.check_condition(cond, "If");
                self.check_block(then_block);
                for (elif_cond, elif_block) in elifs {
                    self.check_condition(elif_cond, "If");
                    self.check_block(elif_block);
                }
                if let Some(else_block) = else_block {
                    self.check_block(else_block);
                }
            }
            Stmt::While { cond, body } => {
                self.check_condition(cond, "While");
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
            }
            Stmt::For {
                var,
                mutable,
                range,
                body,
                line,
                column,
            } => {
                if let Expr::Range { start, end, .. } = range {
                    self.check_range_bound(start);
                    self.check_range_bound(end);
                }
                // The loop variable lives in a scope wrapping the body.
                self.table.enter_scope();
                let symbol = Symbol::var(var.clone(), Some(Ty::I32), *mutable).at(*line, *column);
                self.table.define(symbol, &mut self.diagnostics);
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
                self.table.exit_scope(&mut self.diagnostics);
            }
            Stmt::Loop { body } => {
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
            }
            Stmt::Break {
                value,
                line,
                column,
            } => {
                if let Some(value) = value {
                    self.type_of(value);
                }
                if self.loop_depth == 0 {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::BreakOutsideLoop,
                            "'break' outside of a loop",
                        )
                        .at(*line, *column),
                    );
                }
            }
            Stmt::Continue { line, column } => {
                if self.loop_depth == 0 {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::ContinueOutsideLoop,
                            "'continue' outside of a loop",
                        )
                        .at(*line, *column),
                    );
                }
            }
            Stmt::Expr(expr) => {
                self.type_of(expr);
            }
            Stmt::Block(block) => self.check_block(block),
        }
    }

    fn check_condition(&mut self, cond: &Expr, construct: &str) {
        let (line, column) = cond.position();
        if let Some(ty) = self.type_of(cond) {
            if ty != Ty::Bool {
                self.report(
                    Diagnostic::new(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "{} condition must be of type 'bool', found '{}'",
                            construct, ty
                        ),
                    )
                    .at(line, column)
                    .suggest("Use a boolean expression as the condition"),
                );
            }
        }
    }

    fn check_range_bound(&mut self, bound: &Expr) {
        let (line, column) = bound.position();
        if let Some(ty) = self.type_of(bound) {
            if ty != Ty::I32 {
                self.report(
                    Diagnostic::new(
                        DiagnosticKind::TypeMismatch,
                        format!("For range bound must be of type 'i32', found '{}'", ty),
                    )
                    .at(line, column),
                );
            }
        }
    }

    fn check_return(&mut self, value: Option<&Expr>, line: u32, column: u32) {
        let expected = self.current_ret_ty.clone().unwrap_or(Ty::Unit);
        match value {
            Some(expr) => {
                if let Some(actual) = self.type_of(expr) {
                    if actual != expected {
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::TypeMismatch,
                                format!(
                                    "Type mismatch in return statement: expected '{}', found '{}'",
                                    expected, actual
                                ),
                            )
                            .at(line, column),
                        );
                    }
                }
            }
            None => {
                if expected != Ty::Unit {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::TypeMismatch,
                            format!(
                                "Function expects return type '{}', but no value returned",
                                expected
                            ),
                        )
                        .at(line, column),
                    );
                }
            }
        }
    }

    fn check_assign(&mut self, place: &Expr, value: &Expr) {
        match place {
            Expr::Ident { name, line, column } => {
                let Some((sym_ty, mutable)) = self.lookup_var(name) else {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::UndefinedVariable,
                            format!("Use of undeclared variable '{}'", name),
                        )
                        .at(*line, *column)
                        .suggest(format!("Declare variable '{}' before using it", name)),
                    );
                    self.type_of(value);
                    return;
                };
                if !mutable {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::ImmutableAssignment,
                            format!("Cannot assign to immutable variable '{}'", name),
                        )
                        .at(*line, *column)
                        .suggest(format!(
                            "Consider declaring '{}' as 'mut {}' to make it mutable",
                            name, name
                        )),
                    );
                    self.type_of(value);
                    return;
                }
                let value_ty = self.type_of(value);
                if let (Some(expected), Some(actual)) = (sym_ty, value_ty) {
                    if expected != actual {
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::TypeMismatch,
                                format!(
                                    "Type mismatch in assignment to '{}': expected '{}', found '{}'",
                                    name, expected, actual
                                ),
                            )
                            .at(*line, *column)
                            .suggest(format!(
                                "Convert the value to type '{}' or change the expected type",
                                expected
                            )),
                        );
                    }
                }
            }
            Expr::Index { .. } | Expr::TupleField { .. } => {
                self.check_place_mutability(place);
                let slot_ty = self.type_of(place);
                let value_ty = self.type_of(value);
                if let (Some(expected), Some(actual)) = (slot_ty, value_ty) {
                    if expected != actual {
                        let (line, column) = place.position();
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::TypeMismatch,
                                format!(
                                    "Type mismatch in assignment: expected '{}', found '{}'",
                                    expected, actual
                                ),
                            )
                            .at(line, column),
                        );
                    }
                }
            }
            // The parser only produces place expressions here.
            _ => {}
        }
    }

    /// For `a[i] = v` and `t.0 = v` the root binding must be mutable.
    fn check_place_mutability(&mut self, place: &Expr) {
        let mut root = place;
        loop {
            match root {
                Expr::Index { base, .. } | Expr::TupleField { base, .. } => root = base,
                _ => break,
            }
        }
        if let Expr::Ident { name, line, column } = root {
            if let Some((_, mutable)) = self.lookup_var(name) {
                if !mutable {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::ImmutableAssignment,
                            format!("Cannot assign to immutable variable '{}'", name),
                        )
                        .at(*line, *column)
                        .suggest(format!(
                            "Consider declaring '{}' as 'mut {}' to make it mutable",
                            name, name
                        )),
                    );
                }
            }
        }
    }

    /// Variable lookup that copies out what the caller needs, so the table
    /// borrow never overlaps diagnostic emission. Functions do not count.
    fn lookup_var(&mut self, name: &str) -> Option<(Option<Ty>, bool)> {
        match self.table.lookup(name, true) {
            Some(symbol) if !symbol.is_function() => Some((symbol.ty.clone(), symbol.mutable)),
            _ => None,
        }
    }

    fn lookup_fn(&mut self, name: &str) -> Option<(Vec<Ty>, Ty)> {
        match self.table.lookup(name, true) {
            Some(Symbol {
                kind: SymbolKind::Function { param_tys, ret_ty },
                ..
            }) => Some((param_tys.clone(), ret_ty.clone())),
            _ => None,
        }
    }

    /// Type of an expression, or `None` when unknown. Reports problems as a
    /// side effect; an unknown operand suppresses follow-on reports.
    fn type_of(&mut self, expr: &Expr) -> Option<Ty> {
        match expr {
            Expr::Int { .. } => Some(Ty::I32),
            Expr::Bool { .. } => Some(Ty::Bool),
            Expr::Ident { name, line, column } => match self.lookup_var(name) {
                Some((ty, _)) => ty,
                None => {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::UndefinedVariable,
                            format!("Use of undeclared variable '{}'", name),
                        )
                        .at(*line, *column)
                        .suggest(format!("Declare variable '{}' before using it", name)),
                    );
                    None
                }
            },
            Expr::Binary {
                op,
                lhs,
                rhs,
                line,
                column,
            } => self.type_of_binary(*op, lhs, rhs, *line, *column),
            Expr::Unary {
                op,
                operand,
                line,
                column,
            } => {
                let operand_ty = self.type_of(operand)?;
                match (op, &operand_ty) {
                    (UnOp::Not, Ty::Bool) => Some(Ty::Bool),
                    (UnOp::Neg, Ty::I32) => Some(Ty::I32),
                    _ => {
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::TypeMismatch,
                                format!(
                                    "Cannot apply operator '{}' to type '{}'",
                                    op.symbol(),
                                    operand_ty
                                ),
                            )
                            .at(*line, *column),
                        );
                        None
                    }
                }
            }
            Expr::Borrow {
                mutable, operand, ..
            } => {
                let inner = self.type_of(operand)?;
                Some(Ty::Ref(*mutable, Box::new(inner)))
            }
            Expr::Call {
                callee,
                args,
                line,
                column,
            } => {
                let signature = self.lookup_fn(callee);
                for arg in args {
                    self.type_of(arg);
                }
                match signature {
                    Some((param_tys, ret_ty)) => {
                        if param_tys.len() != args.len() {
                            self.report(
                                Diagnostic::new(
                                    DiagnosticKind::FunctionArgs,
                                    format!(
                                        "Function '{}' expects {} arguments, found {}",
                                        callee,
                                        param_tys.len(),
                                        args.len()
                                    ),
                                )
                                .at(*line, *column),
                            );
                        }
                        Some(ret_ty)
                    }
                    None => {
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::UndefinedFunction,
                                format!("Use of undeclared function '{}'", callee),
                            )
                            .at(*line, *column),
                        );
                        None
                    }
                }
            }
            Expr::ArrayLit {
                elems,
                line,
                column,
            } => {
                let mut elem_ty: Option<Ty> = None;
                for elem in elems {
                    let Some(ty) = self.type_of(elem) else {
                        return None;
                    };
                    match &elem_ty {
                        None => elem_ty = Some(ty),
                        Some(first) if *first != ty => {
                            self.report(
                                Diagnostic::new(
                                    DiagnosticKind::TypeMismatch,
                                    format!(
                                        "Array elements must all have type '{}', found '{}'",
                                        first, ty
                                    ),
                                )
                                .at(*line, *column),
                            );
                            return None;
                        }
                        Some(_) => {}
                    }
                }
                elem_ty.map(|ty| Ty::Array(Box::new(ty), elems.len()))
            }
            Expr::Index {
                base,
                index,
                line,
                column,
            } => {
                if let Some(index_ty) = self.type_of(index) {
                    if index_ty != Ty::I32 {
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::TypeMismatch,
                                format!("Array index must be of type 'i32', found '{}'", index_ty),
                            )
                            .at(*line, *column),
                        );
                    }
                }
                match self.type_of(base)? {
                    Ty::Array(elem, _) => Some(*elem),
                    other => {
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::TypeMismatch,
                                format!("Cannot index into value of type '{}'", other),
                            )
                            .at(*line, *column),
                        );
                        None
                    }
                }
            }
            Expr::TupleLit { elems, .. } => {
                let mut tys = Vec::with_capacity(elems.len());
                for elem in elems {
                    tys.push(self.type_of(elem)?);
                }
                Some(Ty::Tuple(tys))
            }
            Expr::TupleField {
                base,
                index,
                line,
                column,
            } => match self.type_of(base)? {
                Ty::Tuple(tys) => {
                    if let Some(field_ty) = tys.get(*index) {
                        Some(field_ty.clone())
                    } else {
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::TypeMismatch,
                                format!(
                                    "Tuple type '{}' has no field {}",
                                    Ty::Tuple(tys),
                                    index
                                ),
                            )
                            .at(*line, *column),
                        );
                        None
                    }
                }
                other => {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::TypeMismatch,
                            format!("Cannot access field {} on value of type '{}'", index, other),
                        )
                        .at(*line, *column),
                    );
                    None
                }
            },
            Expr::Range { start, end, .. } => {
                // Only meaningful under `for`; bounds are typed there too.
                self.type_of(start);
                self.type_of(end);
                None
            }
        }
    }

    fn type_of_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        line: u32,
        column: u32,
    ) -> Option<Ty> {
        let lhs_ty = self.type_of(lhs);
        let rhs_ty = self.type_of(rhs);
        if op.is_comparison() {
            return match (lhs_ty, rhs_ty) {
                (Some(l), Some(r)) if l == r && (l == Ty::I32 || l == Ty::Bool) => Some(Ty::Bool),
                (Some(l), Some(r)) => {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::TypeMismatch,
                            format!("Cannot compare types '{}' and '{}'", l, r),
                        )
                        .at(line, column),
                    );
                    None
                }
                // An unknown side was already reported; assume bool.
                _ => Some(Ty::Bool),
            };
        }
        match (lhs_ty, rhs_ty) {
            (Some(Ty::I32), Some(Ty::I32)) => Some(Ty::I32),
            (Some(l), Some(r)) => {
                self.report(
                    Diagnostic::new(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "Cannot apply operator '{}' to types '{}' and '{}'",
                            op.symbol(),
                            l,
                            r
                        ),
                    )
                    .at(line, column),
                );
                None
            }
            _ => None,
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
