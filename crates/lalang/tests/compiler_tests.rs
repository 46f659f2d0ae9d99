//! Compiler behavior: token classification, the frame stack across REPL
//! lines, and the single-pass local promotion, pinned through the
//! disassembly that `.print_code` emits.

use lalang::{CollectBytesPrint, Compiler, ErrorKind, NoPrint, Object, Vm};
use pretty_assertions::assert_eq;

fn compile_fails(source: &str) -> ErrorKind {
    let mut vm = Vm::with_writer(Box::new(NoPrint));
    let mut compiler = Compiler::new("<test>");
    compiler
        .compile(&mut vm, source.as_bytes())
        .expect_err("expected a compile error")
        .kind()
}

/// Compiles a single block and returns its disassembly.
fn disassemble_block(source: &str) -> String {
    let collector = CollectBytesPrint::new();
    let mut vm = Vm::with_writer(Box::new(collector.clone()));
    let program = format!("{source} .print_code");
    vm.eval_text(program.as_bytes(), "<test>").expect("evaluation failed");
    collector.output_string()
}

#[test]
fn balanced_input_yields_runnable_code() {
    let mut vm = Vm::with_writer(Box::new(NoPrint));
    let mut compiler = Compiler::new("<test>");
    compiler.compile(&mut vm, b"1 2 +").unwrap();
    let code = compiler.pop_runnable_code(&vm).expect("balanced input");
    assert_eq!(code.len(), 3);
}

#[test]
fn unbalanced_input_is_retained_across_calls() {
    let mut vm = Vm::with_writer(Box::new(NoPrint));
    let mut compiler = Compiler::new("<test>");
    compiler.compile(&mut vm, b"{ 1").unwrap();
    assert!(compiler.pop_runnable_code(&vm).is_none());
    compiler.compile(&mut vm, b"2 }").unwrap();
    let code = compiler.pop_runnable_code(&vm).expect("now balanced");
    vm.eval(&code, None).unwrap();
    // The closed block is on the stack as a func value.
    assert_eq!(vm.stack_len(), 1);
    assert!(matches!(vm.top_object().unwrap(), Object::Repr(r) if r.contains("code block")));
}

#[test]
fn loads_before_a_store_compile_global_after_local() {
    assert_eq!(
        disassemble_block("[ x =x x @x ]"),
        "LOAD_GLOBAL x\nSTORE_LOCAL x\nLOAD_LOCAL x\nCALL_LOCAL x\n"
    );
}

#[test]
fn quote_marks_local_without_emitting() {
    assert_eq!(disassemble_block("[ 'x x ]"), "LOAD_LOCAL x\n");
}

#[test]
fn inner_function_locals_do_not_leak_outward() {
    assert_eq!(disassemble_block("[ [ =y ] y ]"), "LOAD_FUNC 0\nLOAD_GLOBAL y\n");
}

#[test]
fn code_blocks_share_the_enclosing_function_scope() {
    // A `{}` block inside a function still promotes against the
    // function's local set.
    assert_eq!(disassemble_block("[ =v { v } ]"), "STORE_LOCAL v\nLOAD_FUNC 0\n");
    assert_eq!(disassemble_block("{ =g g }"), "STORE_GLOBAL g\nLOAD_GLOBAL g\n");
}

#[test]
fn rename_store_emits_rename_then_store() {
    assert_eq!(disassemble_block("{ [ ] =@f }"), "LOAD_FUNC 0\nRENAME_FUNC f\nSTORE_GLOBAL f\n");
}

#[test]
fn operators_win_over_store_classification() {
    // `==` starts with `=` but is an operator token.
    assert_eq!(disassemble_block("{ 1 2 == }"), "LOAD_INT 1\nLOAD_INT 2\nEQ\n");
}

#[test]
fn paste_markers_and_parens_emit_nothing() {
    assert_eq!(disassemble_block("{ >>> ( 1 2 + ) ... }"), "LOAD_INT 1\nLOAD_INT 2\nADD\n");
}

#[test]
fn comments_run_to_end_of_line() {
    assert_eq!(disassemble_block("{ 1 # 2 +\n}"), "LOAD_INT 1\n");
}

#[test]
fn bare_minus_is_subtraction_but_minus_digit_is_a_literal() {
    assert_eq!(disassemble_block("{ 5 -1 - }"), "LOAD_INT 5\nLOAD_INT -1\nSUB\n");
}

#[test]
fn minus_name_is_not_a_valid_token() {
    assert_eq!(compile_fails("-x"), ErrorKind::Parse);
}

#[test]
fn integer_literal_with_non_digit_fails() {
    assert_eq!(compile_fails("12ab"), ErrorKind::Parse);
}

#[test]
fn integer_literal_overflow_fails() {
    assert_eq!(compile_fails("9223372036854775808"), ErrorKind::Parse);
}

#[test]
fn unterminated_string_literal_fails() {
    assert_eq!(compile_fails(r#""abc"#), ErrorKind::Lex);
    assert_eq!(compile_fails("\"abc\nx\"y\"\n"), ErrorKind::Lex);
}

#[test]
fn local_declaration_outside_function_fails() {
    assert_eq!(compile_fails("'x"), ErrorKind::Parse);
    assert_eq!(compile_fails("{ 'x }"), ErrorKind::Parse);
}

#[test]
fn brace_kind_mismatch_fails() {
    assert_eq!(compile_fails("{ ]"), ErrorKind::Parse);
    assert_eq!(compile_fails("[ }"), ErrorKind::Parse);
}

#[test]
fn closing_an_unopened_block_fails() {
    assert_eq!(compile_fails("}"), ErrorKind::Parse);
}

#[test]
fn malformed_names_fail() {
    assert_eq!(compile_fails("."), ErrorKind::Parse);
    assert_eq!(compile_fails(".1bad"), ErrorKind::Parse);
    assert_eq!(compile_fails("=.!"), ErrorKind::Parse);
    assert_eq!(compile_fails("$"), ErrorKind::Parse);
}

#[test]
fn compile_errors_carry_positions() {
    let mut vm = Vm::with_writer(Box::new(NoPrint));
    let mut compiler = Compiler::new("<test>");
    let err = compiler.compile(&mut vm, b"1 2\n  'oops").unwrap_err();
    let position = err.position().expect("compile errors have positions");
    assert_eq!((position.row, position.col), (1, 2));
    assert_eq!(&*position.filename, "<test>");
}

#[test]
fn stores_inside_functions_always_compile_local() {
    assert_eq!(disassemble_block("[ =x =y ]"), "STORE_LOCAL x\nSTORE_LOCAL y\n");
}

#[test]
fn getter_and_setter_tokens() {
    assert_eq!(disassemble_block("{ .len =.x }"), "GETTER len\nSETTER x\n");
}
