//! IR generation.
//!
//! An AST walk emitting an append-only quadruple list. Expression lowering
//! returns the operand holding the value; statement lowering returns
//! nothing. Control flow lowers through label templates with no
//! optimization. A LIFO stack of `(continue_label, break_label)` pairs gives
//! `break` and `continue` their targets; the analyzer guarantees neither
//! appears outside a loop.

use crate::ast::{BinOp, Block, Expr, FnDecl, Program, Stmt, UnOp};
use crate::ir::{FuncInfo, IrProgram, Op, Operand, Quad};

pub struct IrGenerator {
    quads: Vec<Quad>,
    temp_count: usize,
    label_count: usize,
    loop_stack: Vec<(usize, usize)>,
    functions: Vec<FuncInfo>,
}

impl IrGenerator {
    pub fn new() -> Self {
        IrGenerator {
            quads: Vec::new(),
            temp_count: 0,
            label_count: 0,
            loop_stack: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn generate(mut self, program: &Program) -> IrProgram {
        for f in &program.functions {
            self.lower_fn(f);
        }
        IrProgram {
            quads: self.quads,
            functions: self.functions,
        }
    }

    /// Fresh `t<n>` with strictly increasing `n`.
    fn new_temp(&mut self) -> Operand {
        let temp = Operand::Temp(self.temp_count);
        self.temp_count += 1;
        temp
    }

    /// Fresh `L<n>` with strictly increasing `n`.
    fn new_label(&mut self) -> usize {
        let label = self.label_count;
        self.label_count += 1;
        label
    }

    fn emit(&mut self, op: Op, a1: Option<Operand>, a2: Option<Operand>, dst: Option<Operand>) {
        self.quads.push(Quad::new(op, a1, a2, dst));
    }

    fn emit_label(&mut self, label: usize) {
        self.emit(Op::Label, None, None, Some(Operand::Label(label)));
    }

    fn emit_goto(&mut self, label: usize) {
        self.emit(Op::Goto, None, None, Some(Operand::Label(label)));
    }

    fn emit_if_false(&mut self, cond: Operand, label: usize) {
        self.emit(Op::IfFalseGoto, Some(cond), None, Some(Operand::Label(label)));
    }

    fn lower_fn(&mut self, f: &FnDecl) {
        self.functions.push(FuncInfo {
            name: f.name.clone(),
            params: f.params.iter().map(|p| p.name.clone()).collect(),
        });
        self.emit(
            Op::FuncBegin,
            Some(Operand::Var(f.name.clone())),
            Some(Operand::Const(f.params.len() as i32)),
            None,
        );
        self.lower_block(&f.body);
        self.emit(Op::FuncEnd, Some(Operand::Var(f.name.clone())), None, None);
    }

    fn lower_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty => {}
            Stmt::Let { name, init, .. } => {
                if let Some(init) = init {
                    let value = self.lower_expr(init);
                    self.emit(Op::Assign, Some(value), None, Some(Operand::Var(name.clone())));
                }
            }
            Stmt::Assign { place, value } => {
                let rhs = self.lower_expr(value);
                match place {
                    Expr::Ident { name, .. } => {
                        self.emit(Op::Assign, Some(rhs), None, Some(Operand::Var(name.clone())));
                    }
                    Expr::Index { base, index, .. } => {
                        let arr = self.lower_expr(base);
                        let idx = self.lower_expr(index);
                        self.emit(Op::ArrStore, Some(rhs), Some(idx), Some(arr));
                    }
                    Expr::TupleField { base, index, .. } => {
                        let tup = self.lower_expr(base);
                        self.emit(
                            Op::TupStore,
                            Some(rhs),
                            Some(Operand::Const(*index as i32)),
                            Some(tup),
                        );
                    }
                    _ => unreachable!("parser only produces place expressions in assignments"),
                }
            }
            Stmt::Return { value, .. } => {
                let value = value.as_ref().map(|e| self.lower_expr(e));
                self.emit(Op::Return, value, None, None);
            }
            Stmt::If {
                cond,
                then_block,
                elifs,
                else_block,
            } => self.lower_if(cond, then_block, elifs, else_block.as_ref()),
            Stmt::While { cond, body } => {
                let loop_start = self.new_label();
                let loop_end = self.new_label();
                self.loop_stack.push((loop_start, loop_end));
                self.emit_label(loop_start);
                let cond_value = self.lower_expr(cond);
                self.emit_if_false(cond_value, loop_end);
                self.lower_block(body);
                self.emit_goto(loop_start);
                self.emit_label(loop_end);
                self.loop_stack.pop();
            }
            Stmt::For {
                var, range, body, ..
            } => self.lower_for(var, range, body),
            Stmt::Loop { body } => {
                let loop_start = self.new_label();
                let loop_end = self.new_label();
                self.loop_stack.push((loop_start, loop_end));
                self.emit_label(loop_start);
                let body_start = self.quads.len();
                self.lower_block(body);
                self.emit_goto(loop_start);
                // The end label exists only for break; a breakless loop
                // would otherwise define a label nothing references.
                if self.label_referenced_since(body_start, loop_end) {
                    self.emit_label(loop_end);
                }
                self.loop_stack.pop();
            }
            Stmt::Break { .. } => {
                // A break value (loop-valued break) is not supported and is
                // ignored here; the analyzer has already typed it.
                let &(_, break_label) = self
                    .loop_stack
                    .last()
                    .expect("analyzer rejects break outside a loop");
                self.emit_goto(break_label);
            }
            Stmt::Continue { .. } => {
                let &(continue_label, _) = self
                    .loop_stack
                    .last()
                    .expect("analyzer rejects continue outside a loop");
                self.emit_goto(continue_label);
            }
            Stmt::Expr(expr) => {
                self.lower_expr(expr);
            }
            Stmt::Block(block) => self.lower_block(block),
        }
    }

    /// ```text
    /// t := <C>            ; IF_FALSE_GOTO t, Lelse0
    /// <T>                 ; GOTO Lend (when an else/elif follows)
    /// LABEL Lelse0 ... per elif ...
    /// LABEL Llast         ; <E>
    /// LABEL Lend
    /// ```
    fn lower_if(
        &mut self,
        cond: &Expr,
        then_block: &Block,
        elifs: &[(Expr, Block)],
        else_block: Option<&Block>,
    ) {
        let cond_value = self.lower_expr(cond);
        let mut false_label = self.new_label();
        let end_label = self.new_label();
        self.emit_if_false(cond_value, false_label);
        self.lower_block(then_block);
        if !elifs.is_empty() || else_block.is_some() {
            self.emit_goto(end_label);
        }
        for (elif_cond, elif_block) in elifs {
            self.emit_label(false_label);
            let elif_value = self.lower_expr(elif_cond);
            let next_false = self.new_label();
            self.emit_if_false(elif_value, next_false);
            self.lower_block(elif_block);
            self.emit_goto(end_label);
            false_label = next_false;
        }
        self.emit_label(false_label);
        if let Some(else_block) = else_block {
            self.lower_block(else_block);
        }
        // Without an else or elif nothing jumps to the end label; emitting
        // it would leave an unreferenced LABEL in the program.
        if !elifs.is_empty() || else_block.is_some() {
            self.emit_label(end_label);
        }
    }

    /// Whether any jump emitted since `from` targets `label`.
    fn label_referenced_since(&self, from: usize, label: usize) -> bool {
        self.quads[from..]
            .iter()
            .any(|q| q.op.is_jump() && q.dst == Some(Operand::Label(label)))
    }

    /// `for v in S..E { B }` desugars to a counted while loop. The counter
    /// temp is deliberately re-assigned by its increment quad; `continue`
    /// jumps to the increment, `break` past the loop.
    fn lower_for(&mut self, var: &str, range: &Expr, body: &Block) {
        let Expr::Range { start, end, .. } = range else {
            unreachable!("for-loop iterable is guaranteed to be a range");
        };
        let counter = self.new_temp();
        let start_value = self.lower_expr(start);
        let end_value = self.lower_expr(end);
        self.emit(Op::Assign, Some(start_value), None, Some(counter.clone()));

        let loop_start = self.new_label();
        let loop_end = self.new_label();
        let increment = self.new_label();
        self.loop_stack.push((increment, loop_end));

        self.emit_label(loop_start);
        let cmp = self.new_temp();
        self.emit(
            Op::Lt,
            Some(counter.clone()),
            Some(end_value),
            Some(cmp.clone()),
        );
        self.emit_if_false(cmp, loop_end);
        self.emit(
            Op::Assign,
            Some(counter.clone()),
            None,
            Some(Operand::Var(var.to_string())),
        );
        self.lower_block(body);
        self.emit_label(increment);
        self.emit(
            Op::Add,
            Some(counter.clone()),
            Some(Operand::Const(1)),
            Some(counter),
        );
        self.emit_goto(loop_start);
        self.emit_label(loop_end);
        self.loop_stack.pop();
    }

    fn lower_expr(&mut self, expr: &Expr) -> Operand {
        match expr {
            Expr::Int { value, .. } => Operand::Const(*value),
            Expr::Bool { value, .. } => Operand::Const(if *value { 1 } else { 0 }),
            Expr::Ident { name, .. } => Operand::Var(name.clone()),
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs_value = self.lower_expr(lhs);
                let rhs_value = self.lower_expr(rhs);
                let dst = self.new_temp();
                let ir_op = match op {
                    BinOp::Add => Op::Add,
                    BinOp::Sub => Op::Sub,
                    BinOp::Mul => Op::Mul,
                    BinOp::Div => Op::Div,
                    BinOp::Mod => Op::Mod,
                    BinOp::Eq => Op::Eq,
                    BinOp::Ne => Op::Ne,
                    BinOp::Lt => Op::Lt,
                    BinOp::Le => Op::Le,
                    BinOp::Gt => Op::Gt,
                    BinOp::Ge => Op::Ge,
                };
                self.emit(ir_op, Some(lhs_value), Some(rhs_value), Some(dst.clone()));
                dst
            }
            Expr::Unary { op, operand, .. } => {
                let value = self.lower_expr(operand);
                let dst = self.new_temp();
                match op {
                    UnOp::Neg => {
                        self.emit(Op::Neg, Some(value), None, Some(dst.clone()));
                    }
                    // `!b` on a 0/1 value is `b == 0`.
                    UnOp::Not => {
                        self.emit(
                            Op::Eq,
                            Some(value),
                            Some(Operand::Const(0)),
                            Some(dst.clone()),
                        );
                    }
                }
                dst
            }
            // Borrows have no IR representation; the operand's value flows
            // through (references are type-checked only).
            Expr::Borrow { operand, .. } => self.lower_expr(operand),
            Expr::Call { callee, args, .. } => {
                let values: Vec<Operand> = args.iter().map(|a| self.lower_expr(a)).collect();
                for value in values.into_iter().rev() {
                    self.emit(Op::Param, Some(value), None, None);
                }
                let dst = self.new_temp();
                self.emit(
                    Op::Call,
                    Some(Operand::Var(callee.clone())),
                    Some(Operand::Const(args.len() as i32)),
                    Some(dst.clone()),
                );
                dst
            }
            Expr::ArrayLit { elems, .. } => {
                let values: Vec<Operand> = elems.iter().map(|e| self.lower_expr(e)).collect();
                let dst = self.new_temp();
                self.emit(
                    Op::ArrInit,
                    Some(Operand::List(values)),
                    Some(Operand::Const(elems.len() as i32)),
                    Some(dst.clone()),
                );
                dst
            }
            Expr::Index { base, index, .. } => {
                let arr = self.lower_expr(base);
                let idx = self.lower_expr(index);
                let dst = self.new_temp();
                self.emit(Op::ArrLoad, Some(arr), Some(idx), Some(dst.clone()));
                dst
            }
            Expr::TupleLit { elems, .. } => {
                let values: Vec<Operand> = elems.iter().map(|e| self.lower_expr(e)).collect();
                let dst = self.new_temp();
                self.emit(
                    Op::TupInit,
                    Some(Operand::List(values)),
                    Some(Operand::Const(elems.len() as i32)),
                    Some(dst.clone()),
                );
                dst
            }
            Expr::TupleField { base, index, .. } => {
                let tup = self.lower_expr(base);
                let dst = self.new_temp();
                self.emit(
                    Op::TupLoad,
                    Some(tup),
                    Some(Operand::Const(*index as i32)),
                    Some(dst.clone()),
                );
                dst
            }
            Expr::Range { .. } => {
                unreachable!("range expressions only appear under for loops")
            }
        }
    }
}

impl Default for IrGenerator {
    fn default() -> Self {
        Self::new()
    }
}
