//! MIPS32 target emission.
//!
//! The quadruple list is partitioned into basic blocks (leaders: the first
//! quad, every `LABEL`, every `FUNC_BEGIN`, and the quad after any jump) and
//! driven through the register manager one block at a time. Output targets a
//! SPIM-style runtime: a `.data` section of globals, `.text` starting with
//! the stack setup and `j main`, function bodies, and an `end:` label that
//! issues syscall 10.
//!
//! Live-out per block is approximated as the globals plus every variable
//! read anywhere in the function, stored back before each jump, call, and
//! return; that is the price of skipping dataflow analysis in an
//! unoptimized compiler.
//!
//! Calling convention: the caller serializes arguments into the callee's
//! frame (the k-th buffered `PARAM` at `8+4k` past the caller frame), saves
//! `$sp` at the callee's slot 0, bumps `$sp` by its own frame size, and
//! `jal`s; the callee keeps `$ra` at `4($sp)` and returns in `$v0`. `main`
//! exits through `end:` instead of `jr $ra`. The allocatable registers are
//! not preserved across calls, so the manager's register state is
//! invalidated after each `jal`.

use crate::ir::{IrProgram, Op, Operand, Quad};
use crate::regalloc::{referenced_later, RegisterManager};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Failure during target emission. `Internal` means malformed IR (a compiler
/// bug); `Unsupported` marks IR constructs with no MIPS lowering.
#[derive(Debug)]
pub enum CodeGenError {
    Internal(String),
    Unsupported(&'static str),
}

impl fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeGenError::Internal(msg) => write!(f, "code generator: {}", msg),
            CodeGenError::Unsupported(op) => {
                write!(f, "code generator: no MIPS lowering for {}", op)
            }
        }
    }
}

impl std::error::Error for CodeGenError {}

pub struct MipsCodeGenerator<'a> {
    ir: &'a IrProgram,
    globals: BTreeSet<String>,
    lines: Vec<String>,
    mgr: RegisterManager,
    /// Buffered PARAM operands awaiting the next CALL.
    param_buf: Vec<Operand>,
}

/// `(name, start, end)` of each function's quad range.
fn function_ranges(quads: &[Quad]) -> Vec<(String, usize, usize)> {
    let mut ranges = Vec::new();
    let mut open: Option<(String, usize)> = None;
    for (i, quad) in quads.iter().enumerate() {
        match quad.op {
            Op::FuncBegin => {
                if let Some(name) = quad.a1.as_ref().and_then(|o| o.sym()) {
                    open = Some((name, i));
                }
            }
            Op::FuncEnd => {
                if let Some((name, start)) = open.take() {
                    ranges.push((name, start, i + 1));
                }
            }
            _ => {}
        }
    }
    ranges
}

/// Named-operand positions that denote storage for a given op. Jump targets,
/// function names, and aggregate element lists are excluded.
fn storage_operands(quad: &Quad) -> Vec<&Operand> {
    let mut out = Vec::new();
    match quad.op {
        Op::FuncBegin | Op::FuncEnd | Op::Label | Op::Goto => {}
        Op::Call => out.extend(quad.dst.iter()),
        Op::IfFalseGoto => out.extend(quad.a1.iter()),
        _ => {
            out.extend(quad.a1.iter());
            out.extend(quad.a2.iter());
            out.extend(quad.dst.iter());
        }
    }
    out
}

impl<'a> MipsCodeGenerator<'a> {
    pub fn new(ir: &'a IrProgram) -> Self {
        let fn_names: HashSet<&str> = ir.functions.iter().map(|f| f.name.as_str()).collect();
        let mut globals = BTreeSet::new();
        for (name, start, end) in function_ranges(&ir.quads) {
            let params: HashSet<&str> = ir
                .function(&name)
                .map(|f| f.params.iter().map(|p| p.as_str()).collect())
                .unwrap_or_default();
            for quad in &ir.quads[start..end] {
                for operand in storage_operands(quad) {
                    if let Operand::Var(var) = operand {
                        if !fn_names.contains(var.as_str()) && !params.contains(var.as_str()) {
                            globals.insert(var.clone());
                        }
                    }
                }
            }
        }
        let mut mgr = RegisterManager::new();
        mgr.set_globals(globals.clone());
        MipsCodeGenerator {
            ir,
            globals,
            lines: Vec::new(),
            mgr,
            param_buf: Vec::new(),
        }
    }

    pub fn generate(mut self) -> Result<String, CodeGenError> {
        self.lines.push(".data".to_string());
        for var in &self.globals {
            self.lines.push(format!("{}: .word 0", var));
        }
        self.lines.push(String::new());
        self.lines.push(".text".to_string());
        self.lines.push("lui $sp, 0x1004".to_string());
        self.lines.push("j main".to_string());
        self.lines.push(String::new());

        for (name, start, end) in function_ranges(&self.ir.quads) {
            self.gen_function(&name, start, end)?;
        }

        self.lines.push("end:".to_string());
        self.lines.push("\tli $v0, 10".to_string());
        self.lines.push("\tsyscall".to_string());
        let mut out = self.lines.join("\n");
        out.push('\n');
        Ok(out)
    }

    fn gen_function(&mut self, name: &str, start: usize, end: usize) -> Result<(), CodeGenError> {
        let ir = self.ir;
        let quads = &ir.quads[start..end];
        let is_main = name == "main";

        self.lines.push(format!("{}:", name));
        if !is_main {
            self.lines.push("\tsw $ra, 4($sp)".to_string());
        }

        // Frame locals: the parameters plus every temp in the body. Other
        // named variables live in the data section.
        let params: Vec<String> = ir
            .function(name)
            .map(|f| f.params.clone())
            .unwrap_or_default();
        let mut locals: HashSet<String> = params.iter().cloned().collect();
        for quad in quads {
            for operand in [&quad.a1, &quad.a2, &quad.dst].into_iter().flatten() {
                if let Operand::Temp(n) = operand {
                    locals.insert(format!("t{}", n));
                }
            }
        }
        self.mgr.begin_function(locals, if is_main { 0 } else { 8 });

        // Parameters sit above the saved $sp and $ra slots; the first formal
        // takes the top of the argument block (PARAMs arrive reversed).
        let argc = params.len();
        for (j, param) in params.iter().enumerate() {
            self.mgr
                .assign_offset(param, 8 + 4 * (argc - 1 - j) as i32);
        }

        // Live-out approximation shared by every block of the function.
        let mut out_set = self.globals.clone();
        for quad in quads {
            for operand in [&quad.a1, &quad.a2].into_iter().flatten() {
                if let Some(sym) = operand.sym() {
                    out_set.insert(sym);
                }
            }
        }

        let mut leaders = BTreeSet::new();
        leaders.insert(0usize);
        for (i, quad) in quads.iter().enumerate() {
            if matches!(quad.op, Op::Label | Op::FuncBegin) {
                leaders.insert(i);
            }
            if quad.op.is_jump() && i + 1 < quads.len() {
                leaders.insert(i + 1);
            }
        }
        let leaders: Vec<usize> = leaders.into_iter().collect();

        for (n, &block_start) in leaders.iter().enumerate() {
            let block_end = leaders.get(n + 1).copied().unwrap_or(quads.len());
            let block = &quads[block_start..block_end];
            if block.is_empty() {
                continue;
            }
            self.mgr.reset_for_block(&BTreeSet::new());
            self.param_buf.clear();
            for i in 0..block.len() {
                self.emit_quad(name, block, i, &out_set)?;
            }
            // A fall-through block still has to put its live values back.
            let last = &block[block.len() - 1];
            if !matches!(
                last.op,
                Op::Goto | Op::IfFalseGoto | Op::Return | Op::Call | Op::FuncEnd
            ) {
                self.mgr.store_out_set(&out_set, &mut self.lines);
            }
        }
        Ok(())
    }

    fn gen_epilogue(&mut self, func: &str) {
        if func == "main" {
            self.lines.push("\tj end".to_string());
        } else {
            self.lines.push("\tlw $ra, 4($sp)".to_string());
            self.lines.push("\tjr $ra".to_string());
        }
        self.lines.push(String::new());
    }

    fn operand(quad_part: &Option<Operand>, what: &str) -> Result<Operand, CodeGenError> {
        quad_part
            .clone()
            .ok_or_else(|| CodeGenError::Internal(format!("quadruple is missing {}", what)))
    }

    fn dst_sym(quad: &Quad) -> Result<String, CodeGenError> {
        quad.dst
            .as_ref()
            .and_then(|o| o.sym())
            .ok_or_else(|| CodeGenError::Internal("quadruple is missing a destination".into()))
    }

    /// Release a consumed source: an immediate's register goes straight back
    /// to the free list; a variable dead for the rest of the block is
    /// unbound (pinned globals stay).
    fn release_source(
        &mut self,
        operand: &Operand,
        reg: crate::regalloc::Reg,
        dst: &str,
        block: &[Quad],
        i: usize,
    ) {
        match operand.sym() {
            None => self.mgr.release_const_reg(reg),
            Some(sym) => {
                if sym != dst && !referenced_later(block, i + 1, &sym) {
                    self.mgr.free_var_regs(&sym);
                }
            }
        }
    }

    fn emit_quad(
        &mut self,
        func: &str,
        block: &[Quad],
        i: usize,
        out_set: &BTreeSet<String>,
    ) -> Result<(), CodeGenError> {
        let quad = block[i].clone();
        match quad.op {
            Op::FuncBegin => Ok(()),
            Op::FuncEnd => {
                self.gen_epilogue(func);
                Ok(())
            }
            Op::Label => {
                let label = Self::operand(&quad.dst, "a label")?;
                self.lines.push(format!("{}:", label));
                Ok(())
            }
            Op::Goto => {
                self.mgr.store_out_set(out_set, &mut self.lines);
                let label = Self::operand(&quad.dst, "a jump target")?;
                self.lines.push(format!("\tj {}", label));
                Ok(())
            }
            Op::IfFalseGoto => {
                self.mgr.store_out_set(out_set, &mut self.lines);
                let cond = Self::operand(&quad.a1, "a condition")?;
                let label = Self::operand(&quad.dst, "a jump target")?;
                let rs = self
                    .mgr
                    .get_src_reg(&cond, block, i, out_set, &mut self.lines)?;
                self.lines.push(format!("\tbeq {}, $zero, {}", rs, label));
                self.release_source(&cond, rs, "", block, i);
                Ok(())
            }
            Op::Assign => {
                let src = Self::operand(&quad.a1, "a source")?;
                let dst = Self::dst_sym(&quad)?;
                let rs = self
                    .mgr
                    .get_src_reg(&src, block, i, out_set, &mut self.lines)?;
                self.mgr.rebind(rs, &dst);
                // Write-through: the destination always gains a memory home,
                // globals by symbol, locals in their frame slot.
                self.mgr.store_variable(&dst, rs, &mut self.lines);
                Ok(())
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Eq | Op::Ne | Op::Lt
            | Op::Le | Op::Gt | Op::Ge => self.emit_binary(&quad, block, i, out_set),
            Op::Neg => {
                let src = Self::operand(&quad.a1, "an operand")?;
                let dst = Self::dst_sym(&quad)?;
                let rs = self
                    .mgr
                    .get_src_reg(&src, block, i, out_set, &mut self.lines)?;
                let rd = self.mgr.get_dst_reg(&dst, block, i, out_set, &mut self.lines);
                self.lines.push(format!("\tsub {}, $zero, {}", rd, rs));
                self.release_source(&src, rs, &dst, block, i);
                Ok(())
            }
            Op::Return => {
                self.mgr.store_out_set(out_set, &mut self.lines);
                if let Some(value) = &quad.a1 {
                    self.emit_return_value(value)?;
                }
                if func == "main" {
                    self.lines.push("\tj end".to_string());
                } else {
                    self.lines.push("\tlw $ra, 4($sp)".to_string());
                    self.lines.push("\tjr $ra".to_string());
                }
                Ok(())
            }
            Op::Param => {
                self.param_buf.push(Self::operand(&quad.a1, "an argument")?);
                Ok(())
            }
            Op::Call => self.emit_call(&quad, block, i, out_set),
            Op::ArrInit => Err(CodeGenError::Unsupported("ARR_INIT")),
            Op::ArrLoad => Err(CodeGenError::Unsupported("ARR_LOAD")),
            Op::ArrStore => Err(CodeGenError::Unsupported("ARR_STORE")),
            Op::TupInit => Err(CodeGenError::Unsupported("TUP_INIT")),
            Op::TupLoad => Err(CodeGenError::Unsupported("TUP_LOAD")),
            Op::TupStore => Err(CodeGenError::Unsupported("TUP_STORE")),
        }
    }

    fn emit_binary(
        &mut self,
        quad: &Quad,
        block: &[Quad],
        i: usize,
        out_set: &BTreeSet<String>,
    ) -> Result<(), CodeGenError> {
        let a1 = Self::operand(&quad.a1, "a left operand")?;
        let a2 = Self::operand(&quad.a2, "a right operand")?;
        let dst = Self::dst_sym(quad)?;
        let rs = self
            .mgr
            .get_src_reg(&a1, block, i, out_set, &mut self.lines)?;
        let rt = self
            .mgr
            .get_src_reg(&a2, block, i, out_set, &mut self.lines)?;
        let rd = self.mgr.get_dst_reg(&dst, block, i, out_set, &mut self.lines);
        match quad.op {
            Op::Add => self.lines.push(format!("\tadd {}, {}, {}", rd, rs, rt)),
            Op::Sub => self.lines.push(format!("\tsub {}, {}, {}", rd, rs, rt)),
            Op::Mul => self.lines.push(format!("\tmul {}, {}, {}", rd, rs, rt)),
            Op::Div => {
                self.lines.push(format!("\tdiv {}, {}", rs, rt));
                self.lines.push(format!("\tmflo {}", rd));
            }
            Op::Mod => {
                self.lines.push(format!("\tdiv {}, {}", rs, rt));
                self.lines.push(format!("\tmfhi {}", rd));
            }
            Op::Eq => {
                self.lines.push(format!("\txor {}, {}, {}", rd, rs, rt));
                self.lines.push(format!("\tsltiu {}, {}, 1", rd, rd));
            }
            Op::Ne => {
                self.lines.push(format!("\txor {}, {}, {}", rd, rs, rt));
                self.lines.push(format!("\tsltu {}, $zero, {}", rd, rd));
            }
            Op::Lt => self.lines.push(format!("\tslt {}, {}, {}", rd, rs, rt)),
            Op::Gt => self.lines.push(format!("\tslt {}, {}, {}", rd, rt, rs)),
            Op::Le => {
                self.lines.push(format!("\tslt {}, {}, {}", rd, rt, rs));
                self.lines.push(format!("\txori {}, {}, 1", rd, rd));
            }
            Op::Ge => {
                self.lines.push(format!("\tslt {}, {}, {}", rd, rs, rt));
                self.lines.push(format!("\txori {}, {}, 1", rd, rd));
            }
            _ => unreachable!("emit_binary only receives binary ops"),
        }
        self.release_source(&a1, rs, &dst, block, i);
        self.release_source(&a2, rt, &dst, block, i);
        Ok(())
    }

    fn emit_return_value(&mut self, value: &Operand) -> Result<(), CodeGenError> {
        match value {
            Operand::Const(c) => {
                self.lines.push(format!("\tli $v0, {}", c));
                Ok(())
            }
            _ => {
                let Some(sym) = value.sym() else {
                    return Err(CodeGenError::Internal(format!(
                        "return value '{}' is not loadable",
                        value
                    )));
                };
                if let Some(reg) = self.mgr.reg_of(&sym) {
                    self.lines.push(format!("\tadd $v0, {}, $zero", reg));
                } else if self.mgr.is_local(&sym) {
                    let Some(offset) = self.mgr.offset_of(&sym) else {
                        return Err(CodeGenError::Internal(format!(
                            "return value '{}' has no frame slot",
                            sym
                        )));
                    };
                    self.lines.push(format!("\tlw $v0, {}($sp)", offset));
                } else {
                    self.lines.push(format!("\tlw $v0, {}", sym));
                }
                Ok(())
            }
        }
    }

    fn emit_call(
        &mut self,
        quad: &Quad,
        block: &[Quad],
        i: usize,
        out_set: &BTreeSet<String>,
    ) -> Result<(), CodeGenError> {
        let callee = quad
            .a1
            .as_ref()
            .and_then(|o| o.sym())
            .ok_or_else(|| CodeGenError::Internal("call without a callee".into()))?;
        let dst = quad.dst.as_ref().and_then(|o| o.sym());

        // Everything live except the result goes back to memory first; the
        // callee is free to read globals and clobber registers.
        let mut pre_call = out_set.clone();
        if let Some(d) = &dst {
            pre_call.remove(d);
        }
        self.mgr.store_out_set(&pre_call, &mut self.lines);

        let frame = self.mgr.frame_size();
        let buffered: Vec<Operand> = self.param_buf.drain(..).collect();
        for (k, param) in buffered.iter().enumerate() {
            let reg = self
                .mgr
                .get_src_reg(param, block, i, out_set, &mut self.lines)?;
            self.lines
                .push(format!("\tsw {}, {}($sp)", reg, 8 + 4 * k as i32 + frame));
            self.release_source(param, reg, "", block, i);
        }
        self.lines.push(format!("\tsw $sp, {}($sp)", frame));
        self.lines.push(format!("\taddi $sp, $sp, {}", frame));
        self.lines.push(format!("\tjal {}", callee));
        self.lines.push("\tlw $sp, 0($sp)".to_string());

        // $s registers are not preserved by the callee.
        self.mgr.invalidate_registers();

        if let Some(d) = dst {
            let rd = self.mgr.get_dst_reg(&d, block, i, out_set, &mut self.lines);
            self.lines.push(format!("\tadd {}, $v0, $zero", rd));
            let mut just_dst = BTreeSet::new();
            just_dst.insert(d);
            self.mgr.store_out_set(&just_dst, &mut self.lines);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irgen::IrGenerator;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn compile_asm(source: &str) -> String {
        let tokens = Lexer::new(source).tokenize().expect("lexes");
        let program = Parser::new(tokens).parse().expect("parses");
        let ir = IrGenerator::new().generate(&program);
        MipsCodeGenerator::new(&ir).generate().expect("codegen")
    }

    fn lines_of(asm: &str) -> Vec<&str> {
        asm.lines().collect()
    }

    #[test]
    fn test_program_shell() {
        let asm = compile_asm("fn main() { return; }");
        let lines = lines_of(&asm);
        assert_eq!(lines[0], ".data");
        let text_at = lines.iter().position(|l| *l == ".text").unwrap();
        assert_eq!(lines[text_at + 1], "lui $sp, 0x1004");
        assert_eq!(lines[text_at + 2], "j main");
        assert!(lines.contains(&"main:"));
        let end_at = lines.iter().position(|l| *l == "end:").unwrap();
        assert_eq!(lines[end_at + 1], "\tli $v0, 10");
        assert_eq!(lines[end_at + 2], "\tsyscall");
    }

    #[test]
    fn test_data_section_lists_globals_sorted() {
        let asm = compile_asm("fn main() { let z:i32 = 1; let a:i32 = 2; let m:i32 = a + z; let q = m; }");
        let lines = lines_of(&asm);
        let data_at = lines.iter().position(|l| *l == ".data").unwrap();
        assert_eq!(lines[data_at + 1], "a: .word 0");
        assert_eq!(lines[data_at + 2], "m: .word 0");
        assert_eq!(lines[data_at + 3], "q: .word 0");
        assert_eq!(lines[data_at + 4], "z: .word 0");
    }

    #[test]
    fn test_hello_arithmetic_assembly() {
        let asm = compile_asm("fn main() { let mut x: i32 = 1; x = x + 2; return; }");
        assert!(asm.contains("\tli $s0, 1"));
        assert!(asm.contains("\tsw $s0, x"));
        assert!(asm.contains("\tadd "));
        // main returns through the exit label.
        assert!(asm.contains("\tj end"));
        assert!(!asm.contains("\tjr $ra"));
    }

    #[test]
    fn test_while_loop_branches() {
        let asm = compile_asm("fn main() { let mut i:i32 = 0; while i < 10 { i = i + 1; } }");
        assert!(asm.contains("L0:"));
        assert!(asm.contains("L1:"));
        assert!(asm.contains("\tslt "));
        assert!(asm.contains(", $zero, L1"));
        assert!(asm.contains("\tj L0"));
    }

    #[test]
    fn test_loop_counter_survives_the_back_edge() {
        // The increment block must store the counter before jumping back.
        let asm = compile_asm("fn main(){ let mut s:i32=0; for i in 0..5 { s = s + i; } }");
        let lines = lines_of(&asm);
        // Find the increment block: LABEL L2 ... j L0.
        let inc_at = lines.iter().position(|l| *l == "L2:").unwrap();
        let jump_at = lines[inc_at..]
            .iter()
            .position(|l| *l == "\tj L0")
            .unwrap()
            + inc_at;
        let between = &lines[inc_at..jump_at];
        assert!(
            between.iter().any(|l| l.starts_with("\tsw ") && l.ends_with("($sp)")),
            "no counter spill between L2 and the back edge: {:?}",
            between
        );
    }

    #[test]
    fn test_division_uses_lo_and_modulo_uses_hi() {
        let asm = compile_asm("fn main(){ let a:i32 = 7; let q:i32 = a / 2; let r:i32 = a % 2; let s = q + r; }");
        assert!(asm.contains("\tmflo "));
        assert!(asm.contains("\tmfhi "));
    }

    #[test]
    fn test_comparison_lowerings() {
        let asm = compile_asm(
            "fn main(){ let a:i32 = 1; let b:i32 = 2; let e = a == b; let n = a != b; let l = a <= b; if e { } if n { } if l { } }",
        );
        assert!(asm.contains("\txor "));
        assert!(asm.contains("\tsltiu "));
        assert!(asm.contains("\tsltu $zero") || asm.contains(", $zero, "));
        assert!(asm.contains("\txori "));
    }

    #[test]
    fn test_call_frame_dance_is_balanced() {
        let asm = compile_asm(
            "fn add(a:i32, b:i32)->i32{ return a+b; } fn main(){ let z:i32 = add(1, 2); let q = z; }",
        );
        let lines = lines_of(&asm);
        let jal_at = lines.iter().position(|l| *l == "\tjal add").unwrap();
        // Before the call: args serialized, $sp saved, $sp bumped.
        let frame_bump = lines[..jal_at]
            .iter()
            .rev()
            .find(|l| l.starts_with("\taddi $sp, $sp, "))
            .expect("frame bump before jal");
        let size: i32 = frame_bump.rsplit(' ').next().unwrap().parse().unwrap();
        assert!(lines[..jal_at]
            .iter()
            .any(|l| **l == format!("\tsw $sp, {}($sp)", size)));
        // After the call: $sp restored from the saved slot.
        assert_eq!(lines[jal_at + 1], "\tlw $sp, 0($sp)");
        // Arguments land just past the caller frame, first formal on top.
        assert!(lines[..jal_at]
            .iter()
            .any(|l| l.starts_with("\tsw $s") && l.ends_with(&format!(", {}($sp)", 8 + size))));
        assert!(lines[..jal_at]
            .iter()
            .any(|l| l.starts_with("\tsw $s") && l.ends_with(&format!(", {}($sp)", 12 + size))));
        // Result comes back in $v0.
        assert!(lines[jal_at..].iter().any(|l| l.starts_with("\tadd ") && l.contains("$v0")));
    }

    #[test]
    fn test_callee_saves_and_restores_ra() {
        let asm = compile_asm("fn f()->i32{ return 1; } fn main(){ let x:i32 = f(); let q = x; }");
        let lines = lines_of(&asm);
        let f_at = lines.iter().position(|l| *l == "f:").unwrap();
        assert_eq!(lines[f_at + 1], "\tsw $ra, 4($sp)");
        assert!(lines[f_at..].contains(&"\tlw $ra, 4($sp)"));
        assert!(lines[f_at..].contains(&"\tjr $ra"));
    }

    #[test]
    fn test_callee_reads_params_from_reversed_slots() {
        let asm = compile_asm(
            "fn sub2(a:i32, b:i32)->i32{ return a - b; } fn main(){ let z:i32 = sub2(5, 3); let q = z; }",
        );
        let lines = lines_of(&asm);
        let f_at = lines.iter().position(|l| *l == "sub2:").unwrap();
        let body = &lines[f_at..];
        // argc = 2: first formal at 12($sp), second at 8($sp).
        assert!(body.iter().any(|l| l.ends_with("12($sp)") && l.starts_with("\tlw ")));
        assert!(body.iter().any(|l| l.ends_with("8($sp)") && l.starts_with("\tlw ")));
    }

    #[test]
    fn test_zero_arg_call_still_bumps_sp() {
        let asm = compile_asm("fn f()->i32{ return 4; } fn main(){ let x:i32 = f(); let q = x; }");
        let lines = lines_of(&asm);
        let jal_at = lines.iter().position(|l| *l == "\tjal f").unwrap();
        assert!(lines[..jal_at].iter().any(|l| l.starts_with("\taddi $sp, $sp, ")));
        assert_eq!(lines[jal_at + 1], "\tlw $sp, 0($sp)");
    }

    #[test]
    fn test_arrays_are_rejected_with_unsupported() {
        let tokens = Lexer::new("fn main(){ let a = [1,2]; let x = a[0]; let q = x; }")
            .tokenize()
            .unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let ir = IrGenerator::new().generate(&program);
        let err = MipsCodeGenerator::new(&ir).generate().unwrap_err();
        assert!(matches!(err, CodeGenError::Unsupported("ARR_INIT")));
        assert!(err.to_string().contains("ARR_INIT"));
    }

    #[test]
    fn test_function_names_do_not_become_globals() {
        let asm = compile_asm("fn f()->i32{ return 1; } fn main(){ let x:i32 = f(); let q = x; }");
        let lines = lines_of(&asm);
        let data_at = lines.iter().position(|l| *l == ".data").unwrap();
        let blank_at = lines[data_at..].iter().position(|l| l.is_empty()).unwrap() + data_at;
        let data = &lines[data_at + 1..blank_at];
        assert!(data.iter().all(|l| !l.starts_with("f:")));
        assert!(data.contains(&"x: .word 0"));
    }

    #[test]
    fn test_params_are_locals_not_globals() {
        let asm = compile_asm(
            "fn inc(n:i32)->i32{ return n + 1; } fn main(){ let x:i32 = inc(1); let q = x; }",
        );
        let lines = lines_of(&asm);
        let data_at = lines.iter().position(|l| *l == ".data").unwrap();
        let blank_at = lines[data_at..].iter().position(|l| l.is_empty()).unwrap() + data_at;
        let data = &lines[data_at + 1..blank_at];
        assert!(!data.contains(&"n: .word 0"));
        // The parameter is read from its frame slot instead.
        assert!(asm.contains("\tlw $s0, 8($sp)"));
    }

    #[test]
    fn test_if_false_branch_stores_live_values_first() {
        let asm = compile_asm("fn main(){ let mut x:i32 = 3; if x > 1 { x = 0; } let q = x; }");
        let lines = lines_of(&asm);
        let beq_at = lines.iter().position(|l| l.starts_with("\tbeq ")).unwrap();
        // x was written through on its ASSIGN, so it is already in memory
        // before the branch; the branch itself compares against $zero.
        assert!(lines[..beq_at].iter().any(|l| *l == "\tsw $s0, x"));
        assert!(lines[beq_at].contains("$zero"));
    }
}
