//! Register allocation for the MIPS emitter.
//!
//! The manager works one basic block at a time over two mirrored maps:
//! `residents` (register -> variables it holds) and `locations` (variable ->
//! where its value lives: registers and/or memory). Every mutation goes
//! through the small API here so the two stay coherent: for all `v`, `r`,
//! `v in residents[r]` exactly when `Reg(r) in locations[v]`.
//!
//! When no register is free the victim is the one whose resident variable
//! has the farthest next use in the current block; a variable with another
//! home (memory or a second register) makes its register immediately
//! reclaimable. Ties break toward the lowest register index, and all sets
//! are ordered, so emission is deterministic.
//!
//! Variable classification is per function: temporaries and the enclosing
//! function's parameters are frame locals addressed off `$sp`; every other
//! named variable is a data-section global addressed by symbol. Globals are
//! pinned: the dead-source release path never evicts them.

use crate::codegen::CodeGenError;
use crate::ir::{Operand, Quad};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Allocatable register file: `$s0` through `$s7`.
pub const NUM_REGISTERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reg(pub usize);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$s{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Location {
    Reg(Reg),
    Memory,
}

/// Where a variable's next mention in the block lands.
enum NextUse {
    /// Referenced as a source, this many quads ahead.
    Used(usize),
    /// Overwritten before any read.
    Redefined,
    /// Not mentioned again in the block.
    Absent,
}

fn references(quad: &Quad, var: &str) -> bool {
    let hit = |operand: &Option<Operand>| {
        operand
            .as_ref()
            .and_then(|o| o.sym())
            .is_some_and(|s| s == var)
    };
    hit(&quad.a1) || hit(&quad.a2)
}

fn defines(quad: &Quad, var: &str) -> bool {
    quad.dst
        .as_ref()
        .and_then(|o| o.sym())
        .is_some_and(|s| s == var)
}

fn next_use(block: &[Quad], from: usize, var: &str) -> NextUse {
    for (distance, quad) in block[from..].iter().enumerate() {
        if references(quad, var) {
            return NextUse::Used(distance);
        }
        if defines(quad, var) {
            return NextUse::Redefined;
        }
    }
    NextUse::Absent
}

/// True when `var` is read anywhere in `block[from..]`, redefinitions
/// notwithstanding.
pub fn referenced_later(block: &[Quad], from: usize, var: &str) -> bool {
    block
        .get(from..)
        .unwrap_or(&[])
        .iter()
        .any(|q| references(q, var))
}

pub struct RegisterManager {
    residents: Vec<BTreeSet<String>>,
    locations: HashMap<String, BTreeSet<Location>>,
    free_regs: Vec<Reg>,
    frame_offsets: HashMap<String, i32>,
    frame_size: i32,
    locals: HashSet<String>,
    globals: BTreeSet<String>,
}

impl RegisterManager {
    pub fn new() -> Self {
        RegisterManager {
            residents: vec![BTreeSet::new(); NUM_REGISTERS],
            locations: HashMap::new(),
            free_regs: Vec::new(),
            frame_offsets: HashMap::new(),
            frame_size: 0,
            locals: HashSet::new(),
            globals: BTreeSet::new(),
        }
    }

    pub fn set_globals(&mut self, globals: BTreeSet<String>) {
        self.globals = globals;
    }

    /// Start a new function frame. `locals` is the function's parameters
    /// plus every temporary appearing in its body.
    pub fn begin_function(&mut self, locals: HashSet<String>, base_frame: i32) {
        self.locals = locals;
        self.frame_offsets.clear();
        self.frame_size = base_frame;
    }

    /// Pre-assign a frame slot (used for parameters, whose offsets are fixed
    /// by the calling convention).
    pub fn assign_offset(&mut self, var: &str, offset: i32) {
        self.frame_offsets.insert(var.to_string(), offset);
        self.frame_size = self.frame_size.max(offset + 4);
    }

    pub fn frame_size(&self) -> i32 {
        self.frame_size
    }

    pub fn offset_of(&self, var: &str) -> Option<i32> {
        self.frame_offsets.get(var).copied()
    }

    pub fn is_local(&self, var: &str) -> bool {
        self.locals.contains(var)
    }

    /// A data-section variable not shadowed by a local of the same name.
    pub fn is_pinned_global(&self, var: &str) -> bool {
        self.globals.contains(var) && !self.locals.contains(var)
    }

    /// Forget all register state at a block boundary. Variables in `in_set`
    /// are known to start the block in memory.
    pub fn reset_for_block(&mut self, in_set: &BTreeSet<String>) {
        for set in &mut self.residents {
            set.clear();
        }
        self.locations.clear();
        for var in in_set {
            self.locations
                .entry(var.clone())
                .or_default()
                .insert(Location::Memory);
        }
        self.free_regs = (0..NUM_REGISTERS).rev().map(Reg).collect();
    }

    pub fn reg_of(&self, var: &str) -> Option<Reg> {
        self.locations.get(var)?.iter().find_map(|loc| match loc {
            Location::Reg(r) => Some(*r),
            Location::Memory => None,
        })
    }

    pub fn in_memory(&self, var: &str) -> bool {
        self.locations
            .get(var)
            .is_some_and(|locs| locs.contains(&Location::Memory))
    }

    fn bind(&mut self, reg: Reg, var: &str) {
        self.residents[reg.0].insert(var.to_string());
        self.locations
            .entry(var.to_string())
            .or_default()
            .insert(Location::Reg(reg));
    }

    fn release_reg(&mut self, reg: Reg) {
        if !self.free_regs.contains(&reg) {
            self.free_regs.push(reg);
        }
    }

    /// Drop every recorded home of `var`, returning emptied registers to the
    /// free list. No pin check; used when `var` is being redefined.
    fn unbind(&mut self, var: &str) {
        if let Some(locs) = self.locations.remove(var) {
            for loc in locs {
                if let Location::Reg(r) = loc {
                    self.residents[r.0].remove(var);
                    if self.residents[r.0].is_empty() {
                        self.release_reg(r);
                    }
                }
            }
        }
    }

    /// Release a variable whose value is no longer needed. Pinned globals
    /// stay resident.
    pub fn free_var_regs(&mut self, var: &str) {
        if self.is_pinned_global(var) {
            return;
        }
        self.unbind(var);
    }

    /// Return a register that held only an immediate to the free list.
    pub fn release_const_reg(&mut self, reg: Reg) {
        if self.residents[reg.0].is_empty() {
            self.release_reg(reg);
        }
    }

    /// Spill `var` from `reg`, allocating a frame slot on first spill for a
    /// local. The register binding is left intact; the variable simply gains
    /// a memory home.
    pub fn store_variable(&mut self, var: &str, reg: Reg, codes: &mut Vec<String>) {
        if self.is_local(var) {
            let offset = match self.frame_offsets.get(var) {
                Some(offset) => *offset,
                None => {
                    let offset = self.frame_size;
                    self.frame_offsets.insert(var.to_string(), offset);
                    self.frame_size += 4;
                    offset
                }
            };
            codes.push(format!("\tsw {}, {}($sp)", reg, offset));
        } else {
            codes.push(format!("\tsw {}, {}", reg, var));
        }
        self.locations
            .entry(var.to_string())
            .or_default()
            .insert(Location::Memory);
    }

    /// Spill every live-out variable whose only home is a register.
    pub fn store_out_set(&mut self, out_set: &BTreeSet<String>, codes: &mut Vec<String>) {
        for var in out_set {
            let reg = match self.locations.get(var) {
                Some(locs) if !locs.contains(&Location::Memory) => {
                    locs.iter().find_map(|loc| match loc {
                        Location::Reg(r) => Some(*r),
                        Location::Memory => None,
                    })
                }
                _ => None,
            };
            if let Some(reg) = reg {
                self.store_variable(var, reg, codes);
            }
        }
    }

    /// Obtain a register, spilling the farthest-next-use victim when none is
    /// free. Position `i` indexes the current quad within `block`.
    pub fn alloc_reg(
        &mut self,
        block: &[Quad],
        i: usize,
        out_set: &BTreeSet<String>,
        codes: &mut Vec<String>,
    ) -> Reg {
        if let Some(reg) = self.free_regs.pop() {
            return reg;
        }

        let mut chosen = Reg(0);
        let mut farthest = -1i64;
        for idx in 0..NUM_REGISTERS {
            // The soonest upcoming use among residents that have no other
            // home; a register with none of those is reclaimable outright.
            let mut nearest = i64::MAX;
            for var in &self.residents[idx] {
                let has_other_home = self.locations.get(var).is_some_and(|l| l.len() > 1);
                if has_other_home {
                    continue;
                }
                if let NextUse::Used(d) = next_use(block, i, var) {
                    nearest = nearest.min(d as i64);
                }
            }
            if nearest == i64::MAX {
                chosen = Reg(idx);
                break;
            }
            if nearest > farthest {
                farthest = nearest;
                chosen = Reg(idx);
            }
        }

        let evicted: Vec<String> = self.residents[chosen.0].iter().cloned().collect();
        for var in evicted {
            if let Some(locs) = self.locations.get_mut(&var) {
                locs.remove(&Location::Reg(chosen));
            }
            let homeless = self.locations.get(&var).is_none_or(|l| l.is_empty());
            if homeless {
                let need_store = match next_use(block, i, &var) {
                    NextUse::Used(_) => true,
                    NextUse::Redefined => false,
                    NextUse::Absent => out_set.contains(&var),
                };
                if need_store {
                    self.store_variable(&var, chosen, codes);
                }
            }
        }
        self.residents[chosen.0].clear();
        chosen
    }

    /// Register holding a source operand, loading it if necessary:
    /// `lw` from the frame for a local, `lw` by symbol for a global, `li`
    /// for an immediate.
    pub fn get_src_reg(
        &mut self,
        operand: &Operand,
        block: &[Quad],
        i: usize,
        out_set: &BTreeSet<String>,
        codes: &mut Vec<String>,
    ) -> Result<Reg, CodeGenError> {
        match operand.sym() {
            Some(name) => {
                if let Some(reg) = self.reg_of(&name) {
                    return Ok(reg);
                }
                let reg = self.alloc_reg(block, i, out_set, codes);
                if self.is_local(&name) {
                    let Some(offset) = self.offset_of(&name) else {
                        return Err(CodeGenError::Internal(format!(
                            "register manager: local '{}' read before it has a frame slot",
                            name
                        )));
                    };
                    codes.push(format!("\tlw {}, {}($sp)", reg, offset));
                } else {
                    codes.push(format!("\tlw {}, {}", reg, name));
                }
                self.bind(reg, &name);
                Ok(reg)
            }
            None => match operand {
                Operand::Const(value) => {
                    let reg = self.alloc_reg(block, i, out_set, codes);
                    codes.push(format!("\tli {}, {}", reg, value));
                    Ok(reg)
                }
                other => Err(CodeGenError::Internal(format!(
                    "register manager: operand '{}' cannot be loaded",
                    other
                ))),
            },
        }
    }

    /// Register for a destination. Prefers retargeting the first source's
    /// register when that source is dead for the rest of the block, is not a
    /// pinned global, and shares its register with nothing else. The
    /// destination's previous homes are dropped either way: it is being
    /// redefined.
    pub fn get_dst_reg(
        &mut self,
        dst: &str,
        block: &[Quad],
        i: usize,
        out_set: &BTreeSet<String>,
        codes: &mut Vec<String>,
    ) -> Reg {
        let src1 = block[i].a1.as_ref().and_then(|o| o.sym());
        if let Some(s1) = src1 {
            if !self.is_pinned_global(&s1) {
                if let Some(reg) = self.reg_of(&s1) {
                    if self.residents[reg.0].len() == 1 && !referenced_later(block, i + 1, &s1) {
                        self.residents[reg.0].remove(&s1);
                        if let Some(locs) = self.locations.get_mut(&s1) {
                            locs.remove(&Location::Reg(reg));
                        }
                        self.unbind(dst);
                        self.bind(reg, dst);
                        return reg;
                    }
                }
            }
        }
        self.unbind(dst);
        let reg = self.alloc_reg(block, i, out_set, codes);
        self.bind(reg, dst);
        reg
    }

    /// Redefine `dst` as living in `reg` (which already holds its new
    /// value), dropping every stale home first. Used by ASSIGN, where source
    /// and destination share a register.
    pub fn rebind(&mut self, reg: Reg, dst: &str) {
        self.unbind(dst);
        // The register may have been freed by the unbind when dst was its
        // only resident under another name; reclaim it.
        self.free_regs.retain(|r| *r != reg);
        self.bind(reg, dst);
    }

    /// Drop every register binding while keeping memory homes. Used after a
    /// call: the callee does not preserve the allocatable registers, and the
    /// pre-call spill has already put live values in memory.
    pub fn invalidate_registers(&mut self) {
        for set in &mut self.residents {
            set.clear();
        }
        self.locations.retain(|_, locs| {
            locs.retain(|loc| *loc == Location::Memory);
            !locs.is_empty()
        });
        self.free_regs = (0..NUM_REGISTERS).rev().map(Reg).collect();
    }

    /// Verify the mirrored maps agree; test support.
    pub fn check_coherence(&self) -> Result<(), String> {
        for (idx, vars) in self.residents.iter().enumerate() {
            for var in vars {
                let ok = self
                    .locations
                    .get(var)
                    .is_some_and(|l| l.contains(&Location::Reg(Reg(idx))));
                if !ok {
                    return Err(format!("residents[{}] holds '{}' without a matching location", idx, var));
                }
            }
        }
        for (var, locs) in &self.locations {
            for loc in locs {
                if let Location::Reg(r) = loc {
                    if !self.residents[r.0].contains(var) {
                        return Err(format!("'{}' claims {} without being resident", var, r));
                    }
                }
            }
        }
        for reg in &self.free_regs {
            if !self.residents[reg.0].is_empty() {
                return Err(format!("{} is free but has residents", reg));
            }
        }
        Ok(())
    }
}

impl Default for RegisterManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Op;

    fn assign(src: Operand, dst: Operand) -> Quad {
        Quad::new(Op::Assign, Some(src), None, Some(dst))
    }

    fn v(name: &str) -> Operand {
        Operand::Var(name.into())
    }

    fn fresh(globals: &[&str], locals: &[&str]) -> RegisterManager {
        let mut mgr = RegisterManager::new();
        mgr.set_globals(globals.iter().map(|s| s.to_string()).collect());
        mgr.begin_function(locals.iter().map(|s| s.to_string()).collect(), 8);
        mgr.reset_for_block(&BTreeSet::new());
        mgr
    }

    #[test]
    fn test_free_registers_allocated_lowest_index_first() {
        let mut mgr = fresh(&["a", "b"], &[]);
        let block = [assign(v("a"), v("x"))];
        let mut codes = Vec::new();
        let out = BTreeSet::new();
        let r1 = mgr.get_src_reg(&v("a"), &block, 0, &out, &mut codes).unwrap();
        let r2 = mgr.get_src_reg(&v("b"), &block, 0, &out, &mut codes).unwrap();
        assert_eq!(r1, Reg(0));
        assert_eq!(r2, Reg(1));
        assert_eq!(codes, vec!["\tlw $s0, a", "\tlw $s1, b"]);
        mgr.check_coherence().unwrap();
    }

    #[test]
    fn test_src_register_is_reused_when_already_loaded() {
        let mut mgr = fresh(&["a"], &[]);
        let block = [assign(v("a"), v("x"))];
        let mut codes = Vec::new();
        let out = BTreeSet::new();
        let r1 = mgr.get_src_reg(&v("a"), &block, 0, &out, &mut codes).unwrap();
        let r2 = mgr.get_src_reg(&v("a"), &block, 0, &out, &mut codes).unwrap();
        assert_eq!(r1, r2);
        assert_eq!(codes.len(), 1);
    }

    #[test]
    fn test_immediate_loads_with_li() {
        let mut mgr = fresh(&[], &[]);
        let block = [assign(Operand::Const(7), v("x"))];
        let mut codes = Vec::new();
        let reg = mgr
            .get_src_reg(&Operand::Const(7), &block, 0, &BTreeSet::new(), &mut codes)
            .unwrap();
        assert_eq!(codes, vec![format!("\tli {}, 7", reg)]);
        // The register is unbound; releasing it makes it reusable.
        mgr.release_const_reg(reg);
        mgr.check_coherence().unwrap();
    }

    #[test]
    fn test_local_loads_from_frame_offset() {
        let mut mgr = fresh(&[], &["n"]);
        mgr.assign_offset("n", 8);
        let block = [assign(v("n"), v("x"))];
        let mut codes = Vec::new();
        mgr.get_src_reg(&v("n"), &block, 0, &BTreeSet::new(), &mut codes)
            .unwrap();
        assert_eq!(codes, vec!["\tlw $s0, 8($sp)"]);
    }

    #[test]
    fn test_local_without_slot_is_an_internal_error() {
        let mut mgr = fresh(&[], &["t0"]);
        let block = [assign(Operand::Temp(0), v("x"))];
        let mut codes = Vec::new();
        let err = mgr
            .get_src_reg(&Operand::Temp(0), &block, 0, &BTreeSet::new(), &mut codes)
            .unwrap_err();
        assert!(err.to_string().contains("frame slot"));
    }

    #[test]
    fn test_spill_selects_farthest_next_use() {
        let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let mut mgr = fresh(&["a", "b", "c", "d", "e", "f", "g", "h", "z"], &[]);
        // Block references a soonest and h farthest.
        let mut block = vec![assign(v("z"), v("sink"))];
        for name in names {
            block.push(assign(v(name), v("sink")));
        }
        let mut codes = Vec::new();
        let out = BTreeSet::new();
        for name in names {
            mgr.get_src_reg(&v(name), &block, 0, &out, &mut codes).unwrap();
        }
        codes.clear();
        let reg = mgr.get_src_reg(&v("z"), &block, 0, &out, &mut codes).unwrap();
        // h lived in the last-allocated register and is the farthest use.
        assert_eq!(reg, Reg(7));
        assert_eq!(codes, vec!["\tsw $s7, h", "\tlw $s7, z"]);
        mgr.check_coherence().unwrap();
    }

    #[test]
    fn test_eviction_skips_variables_with_a_memory_home() {
        let mut mgr = fresh(&["a", "z"], &[]);
        let block = [assign(v("z"), v("sink")), assign(v("a"), v("sink"))];
        let mut codes = Vec::new();
        let out = BTreeSet::new();
        let ra = mgr.get_src_reg(&v("a"), &block, 0, &out, &mut codes).unwrap();
        mgr.store_variable("a", ra, &mut codes);
        // Fill the remaining registers.
        for n in 0..(NUM_REGISTERS - 1) {
            let name = format!("v{}", n);
            mgr.get_src_reg(&v(&name), &block, 0, &out, &mut codes).unwrap();
        }
        codes.clear();
        // `a` has a memory home, so its register is reclaimed without a store.
        let reg = mgr.get_src_reg(&v("z"), &block, 0, &out, &mut codes).unwrap();
        assert_eq!(reg, ra);
        assert_eq!(codes, vec!["\tlw $s0, z"]);
        mgr.check_coherence().unwrap();
    }

    #[test]
    fn test_dst_reuses_dead_source_register() {
        let mut mgr = fresh(&[], &["a", "t0"]);
        mgr.assign_offset("a", 8);
        let block = [Quad::new(
            Op::Add,
            Some(v("a")),
            Some(Operand::Const(1)),
            Some(Operand::Temp(0)),
        )];
        let mut codes = Vec::new();
        let out = BTreeSet::new();
        let rs = mgr.get_src_reg(&v("a"), &block, 0, &out, &mut codes).unwrap();
        let rd = mgr.get_dst_reg("t0", &block, 0, &out, &mut codes);
        assert_eq!(rs, rd);
        assert_eq!(mgr.reg_of("a"), None);
        assert_eq!(mgr.reg_of("t0"), Some(rd));
        mgr.check_coherence().unwrap();
    }

    #[test]
    fn test_dst_does_not_steal_pinned_global_register() {
        let mut mgr = fresh(&["g"], &["t0"]);
        let block = [Quad::new(
            Op::Add,
            Some(v("g")),
            Some(Operand::Const(1)),
            Some(Operand::Temp(0)),
        )];
        let mut codes = Vec::new();
        let out = BTreeSet::new();
        let rs = mgr.get_src_reg(&v("g"), &block, 0, &out, &mut codes).unwrap();
        let rd = mgr.get_dst_reg("t0", &block, 0, &out, &mut codes);
        assert_ne!(rs, rd);
        assert_eq!(mgr.reg_of("g"), Some(rs));
        mgr.check_coherence().unwrap();
    }

    #[test]
    fn test_dst_does_not_reuse_source_still_live_in_block() {
        let mut mgr = fresh(&[], &["a", "t0"]);
        mgr.assign_offset("a", 8);
        let block = [
            Quad::new(Op::Add, Some(v("a")), Some(Operand::Const(1)), Some(Operand::Temp(0))),
            assign(v("a"), v("sink")),
        ];
        let mut codes = Vec::new();
        let out = BTreeSet::new();
        let rs = mgr.get_src_reg(&v("a"), &block, 0, &out, &mut codes).unwrap();
        let rd = mgr.get_dst_reg("t0", &block, 0, &out, &mut codes);
        assert_ne!(rs, rd);
        assert_eq!(mgr.reg_of("a"), Some(rs));
    }

    #[test]
    fn test_redefined_dst_loses_stale_memory_home() {
        // After t0 is redefined its old spill slot must not satisfy later
        // store_out_set calls.
        let mut mgr = fresh(&[], &["t0"]);
        let block = [
            assign(Operand::Const(1), Operand::Temp(0)),
            Quad::new(Op::Add, Some(Operand::Temp(0)), Some(Operand::Const(1)), Some(Operand::Temp(0))),
        ];
        let mut codes = Vec::new();
        let out = BTreeSet::new();
        let rs = mgr.get_src_reg(&Operand::Const(1), &block, 0, &out, &mut codes).unwrap();
        mgr.rebind(rs, "t0");
        mgr.store_variable("t0", rs, &mut codes);
        assert!(mgr.in_memory("t0"));
        let rd = mgr.get_dst_reg("t0", &block, 1, &out, &mut codes);
        assert!(!mgr.in_memory("t0"));
        codes.clear();
        let mut out_codes = Vec::new();
        let mut live = BTreeSet::new();
        live.insert("t0".to_string());
        mgr.store_out_set(&live, &mut out_codes);
        assert_eq!(out_codes, vec![format!("\tsw {}, 8($sp)", rd)]);
    }

    #[test]
    fn test_free_var_regs_pins_globals() {
        let mut mgr = fresh(&["g"], &[]);
        let block = [assign(v("g"), v("sink"))];
        let mut codes = Vec::new();
        let reg = mgr
            .get_src_reg(&v("g"), &block, 0, &BTreeSet::new(), &mut codes)
            .unwrap();
        mgr.free_var_regs("g");
        assert_eq!(mgr.reg_of("g"), Some(reg));
        mgr.free_var_regs("other");
        mgr.check_coherence().unwrap();
    }

    #[test]
    fn test_free_var_regs_releases_locals() {
        let mut mgr = fresh(&[], &["n"]);
        mgr.assign_offset("n", 8);
        let block = [assign(v("n"), v("sink"))];
        let mut codes = Vec::new();
        let reg = mgr
            .get_src_reg(&v("n"), &block, 0, &BTreeSet::new(), &mut codes)
            .unwrap();
        mgr.free_var_regs("n");
        assert_eq!(mgr.reg_of("n"), None);
        // The emptied register is allocatable again.
        let mut more = Vec::new();
        let next = mgr.alloc_reg(&block, 0, &BTreeSet::new(), &mut more);
        assert_eq!(next, reg);
        mgr.check_coherence().unwrap();
    }

    #[test]
    fn test_store_out_set_spills_register_only_variables() {
        let mut mgr = fresh(&["a", "b"], &[]);
        let block = [assign(v("a"), v("sink")), assign(v("b"), v("sink"))];
        let mut codes = Vec::new();
        let out: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let ra = mgr.get_src_reg(&v("a"), &block, 0, &out, &mut codes).unwrap();
        let rb = mgr.get_src_reg(&v("b"), &block, 0, &out, &mut codes).unwrap();
        mgr.store_variable("b", rb, &mut codes);
        codes.clear();
        mgr.store_out_set(&out, &mut codes);
        // a spills; b already has a memory home; c has no location at all.
        assert_eq!(codes, vec![format!("\tsw {}, a", ra)]);
    }

    #[test]
    fn test_invalidate_registers_keeps_memory_homes() {
        let mut mgr = fresh(&["g"], &[]);
        let block = [assign(v("g"), v("sink"))];
        let mut codes = Vec::new();
        let reg = mgr
            .get_src_reg(&v("g"), &block, 0, &BTreeSet::new(), &mut codes)
            .unwrap();
        mgr.store_variable("g", reg, &mut codes);
        mgr.invalidate_registers();
        assert_eq!(mgr.reg_of("g"), None);
        assert!(mgr.in_memory("g"));
        // All registers are allocatable again, lowest index first.
        assert_eq!(mgr.alloc_reg(&block, 0, &BTreeSet::new(), &mut codes), Reg(0));
        mgr.check_coherence().unwrap();
    }

    #[test]
    fn test_rebind_survives_self_assignment() {
        let mut mgr = fresh(&["x"], &[]);
        let block = [assign(v("x"), v("x"))];
        let mut codes = Vec::new();
        let reg = mgr
            .get_src_reg(&v("x"), &block, 0, &BTreeSet::new(), &mut codes)
            .unwrap();
        mgr.rebind(reg, "x");
        assert_eq!(mgr.reg_of("x"), Some(reg));
        mgr.check_coherence().unwrap();
    }

    #[test]
    fn test_spill_allocates_frame_slots_on_demand() {
        let mut mgr = fresh(&[], &["t0", "t1"]);
        assert_eq!(mgr.frame_size(), 8);
        let mut codes = Vec::new();
        mgr.store_variable("t0", Reg(0), &mut codes);
        mgr.store_variable("t1", Reg(1), &mut codes);
        mgr.store_variable("t0", Reg(2), &mut codes);
        assert_eq!(mgr.offset_of("t0"), Some(8));
        assert_eq!(mgr.offset_of("t1"), Some(12));
        assert_eq!(mgr.frame_size(), 16);
        assert_eq!(
            codes,
            vec!["\tsw $s0, 8($sp)", "\tsw $s1, 12($sp)", "\tsw $s2, 8($sp)"]
        );
    }
}
