//! End-to-end pipeline tests through the public API, including the
//! file-writing driver.

use ferroc::{
    BuildConfig, CompileError, DiagnosticKind, compile_file, compile_source,
};
use std::fs;

fn compile(source: &str) -> ferroc::Compilation {
    compile_source(source, &BuildConfig::new()).expect("compiles")
}

#[test]
fn hello_arithmetic_ir_and_asm() {
    let artifacts = compile("fn main() { let mut x: i32 = 1; x = x + 2; return; }");
    let ir_lines: Vec<&str> = artifacts.ir_text.lines().collect();
    assert_eq!(ir_lines[0], "0: (FUNC_BEGIN, main, 0, None)");
    assert_eq!(ir_lines[1], "1: (ASSIGN, 1, None, x)");
    assert_eq!(ir_lines[2], "2: (ADD, x, 2, t0)");
    assert_eq!(ir_lines[3], "3: (ASSIGN, t0, None, x)");
    assert_eq!(ir_lines[4], "4: (RETURN, None, None, None)");

    let asm = artifacts.asm.expect("assembly");
    assert!(asm.contains("\tli "));
    assert!(asm.contains("\tsw $s0, x"));
    assert!(asm.contains("\tadd "));
}

#[test]
fn while_loop_ir_shape() {
    let artifacts = compile("fn main() { let mut i:i32 = 0; while i < 10 { i = i + 1; } }");
    let ir = &artifacts.ir_text;
    let order = [
        "(LABEL, None, None, L0)",
        "(LT, i, 10, t0)",
        "(IF_FALSE_GOTO, t0, None, L1)",
        "(ADD, i, 1, t1)",
        "(ASSIGN, t1, None, i)",
        "(GOTO, None, None, L0)",
        "(LABEL, None, None, L1)",
    ];
    let mut at = 0;
    for needle in order {
        let found = ir[at..].find(needle).unwrap_or_else(|| {
            panic!("'{}' missing (in order) from IR:\n{}", needle, ir)
        });
        at += found + needle.len();
    }
}

#[test]
fn for_range_ir_shape() {
    let artifacts = compile("fn main(){ let mut s:i32=0; for i in 0..5 { s = s + i; } }");
    let ir = &artifacts.ir_text;
    let order = [
        "(ASSIGN, 0, None, t0)",
        "(LABEL, None, None, L0)",
        "(LT, t0, 5, t1)",
        "(IF_FALSE_GOTO, t1, None, L1)",
        "(ASSIGN, t0, None, i)",
        "(ADD, s, i, t2)",
        "(LABEL, None, None, L2)",
        "(ADD, t0, 1, t0)",
        "(GOTO, None, None, L0)",
        "(LABEL, None, None, L1)",
    ];
    let mut at = 0;
    for needle in order {
        let found = ir[at..].find(needle).unwrap_or_else(|| {
            panic!("'{}' missing (in order) from IR:\n{}", needle, ir)
        });
        at += found + needle.len();
    }
}

#[test]
fn immutable_assignment_blocks_codegen() {
    let err = compile_source("fn main(){ let x:i32 = 1; x = 2; }", &BuildConfig::new())
        .expect_err("must fail");
    let CompileError::Semantic(diags) = err else {
        panic!("expected semantic failure");
    };
    let immutable: Vec<_> = diags
        .iter()
        .filter(|d| d.kind == DiagnosticKind::ImmutableAssignment)
        .collect();
    assert_eq!(immutable.len(), 1);
    assert_eq!(immutable[0].line, Some(1));
    assert_eq!(immutable[0].column, Some(27));
}

#[test]
fn unused_variable_warns_but_compiles() {
    let artifacts = compile("fn main(){ let y:i32 = 3; }");
    assert_eq!(artifacts.diagnostics.len(), 1);
    let diag = &artifacts.diagnostics[0];
    assert_eq!(diag.kind, DiagnosticKind::UnusedVariable);
    assert!(diag.message.contains("'y'"));
    assert!(!artifacts.ir_text.is_empty());
    assert!(artifacts.asm.is_some());
}

#[test]
fn arity_mismatch_blocks_codegen() {
    let err = compile_source(
        "fn add(a:i32,b:i32)->i32{ return a+b; } fn main(){ let z:i32 = add(1); }",
        &BuildConfig::new(),
    )
    .expect_err("must fail");
    let CompileError::Semantic(diags) = err else {
        panic!("expected semantic failure");
    };
    assert!(diags
        .iter()
        .any(|d| d.kind == DiagnosticKind::FunctionArgs
            && d.message.contains("expects 2 arguments, found 1")));
}

#[test]
fn diagnostics_render_in_the_documented_format() {
    let err = compile_source("fn main(){ let x:i32 = 1; x = 2; }", &BuildConfig::new())
        .expect_err("must fail");
    let rendered = err.to_string();
    assert!(rendered.contains("Error at line 1, column 27: Cannot assign to immutable variable 'x'"));
    assert!(rendered.contains("\n  Suggestion: "));
}

#[test]
fn functions_with_calls_compile_end_to_end() {
    let artifacts = compile(
        "fn fib(n: i32) -> i32 {\n\
         \tif n < 2 {\n\
         \t\treturn n;\n\
         \t}\n\
         \treturn fib(n - 1) + fib(n - 2);\n\
         }\n\
         fn main() {\n\
         \tlet mut r: i32 = 0;\n\
         \tr = fib(10);\n\
         \treturn;\n\
         }\n",
    );
    let asm = artifacts.asm.expect("assembly");
    assert!(asm.contains("fib:"));
    assert!(asm.contains("\tjal fib"));
    assert!(asm.contains("\tsw $ra, 4($sp)"));
    assert!(asm.contains("\tjr $ra"));
    // Call-frame balance: every bump has its restore.
    let bumps = asm.matches("\taddi $sp, $sp, ").count();
    let restores = asm.matches("\tlw $sp, 0($sp)").count();
    assert_eq!(bumps, restores);
}

#[test]
fn compile_file_writes_ir_and_asm() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("loop.rs");
    fs::write(
        &source_path,
        "fn main() { let mut i:i32 = 0; while i < 3 { i = i + 1; } }",
    )
    .expect("write source");

    let config = BuildConfig::new().with_out_dir(dir.path().join("out"));
    let output = compile_file(&source_path, &config).expect("compiles");

    assert_eq!(output.ir_path, dir.path().join("out/ir/loop.ir"));
    assert_eq!(output.asm_path.as_deref(), Some(dir.path().join("out/asm/loop.asm").as_path()));

    let ir = fs::read_to_string(&output.ir_path).expect("ir file");
    assert!(ir.starts_with("0: (FUNC_BEGIN, main, 0, None)"));
    let asm = fs::read_to_string(output.asm_path.as_ref().unwrap()).expect("asm file");
    assert!(asm.starts_with(".data"));
    assert!(asm.trim_end().ends_with("syscall"));
}

#[test]
fn ir_only_build_writes_no_asm_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("arrays.rs");
    fs::write(
        &source_path,
        "fn main() { let a = [1, 2, 3]; let x:i32 = a[1]; let q = x; }",
    )
    .expect("write source");

    let config = BuildConfig::new()
        .with_out_dir(dir.path().join("out"))
        .with_emit_asm(false);
    let output = compile_file(&source_path, &config).expect("compiles");
    assert!(output.asm_path.is_none());
    assert!(output.ir_path.exists());
    let ir = fs::read_to_string(&output.ir_path).expect("ir file");
    assert!(ir.contains("(ARR_INIT, [1, 2, 3], 3, t0)"));
}

#[test]
fn project_config_is_honored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("strict.rs");
    fs::write(&source_path, "fn main(){ let y:i32 = 3; }").expect("write source");
    fs::write(dir.path().join("ferro.toml"), "deny_warnings = true\n").expect("write config");

    let project_path = ferroc::ProjectConfig::find_near(&source_path).expect("found");
    let project = ferroc::ProjectConfig::load(&project_path).expect("loads");
    let mut config = BuildConfig::new().with_out_dir(dir.path().join("out"));
    config.apply_project(&project);

    let err = compile_file(&source_path, &config).expect_err("warnings denied");
    assert!(matches!(err, CompileError::Semantic(_)));
}

#[test]
fn nested_control_flow_compiles() {
    let artifacts = compile(
        "fn main() {\n\
         \tlet mut total: i32 = 0;\n\
         \tfor i in 0..10 {\n\
         \t\tif i % 2 == 0 {\n\
         \t\t\tcontinue;\n\
         \t\t}\n\
         \t\tlet mut j: i32 = i;\n\
         \t\tloop {\n\
         \t\t\tj = j - 1;\n\
         \t\t\tif j <= 0 {\n\
         \t\t\t\tbreak;\n\
         \t\t\t}\n\
         \t\t\ttotal = total + j;\n\
         \t\t}\n\
         \t}\n\
         \treturn;\n\
         }\n",
    );
    // Label closure over the whole program.
    use std::collections::HashSet;
    let mut defined = HashSet::new();
    let mut referenced = HashSet::new();
    for quad in &artifacts.ir.quads {
        match quad.op {
            ferroc::ir::Op::Label => {
                defined.insert(format!("{}", quad.dst.as_ref().unwrap()));
            }
            ferroc::ir::Op::Goto | ferroc::ir::Op::IfFalseGoto => {
                referenced.insert(format!("{}", quad.dst.as_ref().unwrap()));
            }
            _ => {}
        }
    }
    assert_eq!(defined, referenced);
    assert!(artifacts.asm.is_some());
}
