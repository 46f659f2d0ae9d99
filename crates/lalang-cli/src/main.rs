//! The interactive REPL driver.
//!
//! Reads one line at a time, continuing the prompt while a block is still
//! open, and prints the stack after each evaluated line. Behavior is
//! configured through single-digit environment variables: `QUIET`, `EVAL`,
//! `STDLIB`, `PRINT_TOKENS`, `PRINT_CODE`, `PRINT_STACK`, `PRINT_EVAL`.

use std::{
    env,
    io::{BufRead, Write},
    path::Path,
    process::ExitCode,
};

use lalang::{Compiler, RunError, Vm};

const STDLIB_PATH: &str = "stdlib.lala";

fn getenv_digit(name: &str, default: u8) -> u8 {
    let Ok(value) = env::var(name) else {
        return default;
    };
    if value.is_empty() {
        return default;
    }
    let bytes = value.as_bytes();
    if bytes.len() != 1 || !bytes[0].is_ascii_digit() {
        eprintln!("Expected env var {name} to be a single digit, but got: {value}");
        std::process::exit(1);
    }
    bytes[0] - b'0'
}

fn fatal(err: &RunError) -> ! {
    eprintln!("{err}");
    std::process::exit(1);
}

fn print_stack(vm: &mut Vm) {
    let values = vm.stack_values().to_vec();
    for value in values {
        if let Err(err) = vm.print_value(value) {
            fatal(&err);
        }
        println!();
        let _ = std::io::stdout().flush();
    }
}

fn main() -> ExitCode {
    let quiet = getenv_digit("QUIET", 0) != 0;
    let eval = getenv_digit("EVAL", 1) != 0;
    let stdlib = getenv_digit("STDLIB", 1) != 0;

    let mut vm = Vm::new();
    let mut compiler = Compiler::new("<stdin>");

    // Load the stdlib before any debug flags apply; it can be debugged
    // separately.
    if stdlib && Path::new(STDLIB_PATH).exists() {
        if let Err(err) = vm.include(STDLIB_PATH) {
            fatal(&err);
        }
    }

    vm.flags.print_tokens = getenv_digit("PRINT_TOKENS", 0);
    vm.flags.print_code = getenv_digit("PRINT_CODE", 0);
    vm.flags.print_stack = getenv_digit("PRINT_STACK", 0);
    vm.flags.print_eval = getenv_digit("PRINT_EVAL", 0);

    let stdin = std::io::stdin();
    let mut continuing = false;
    loop {
        if eval && !quiet {
            print!("{}", if continuing { "... " } else { ">>> " });
            let _ = std::io::stdout().flush();
        }

        let mut line = Vec::new();
        match stdin.lock().read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                eprintln!("Error getting line from stdin: {err}");
                return ExitCode::FAILURE;
            }
        }

        if let Err(err) = compiler.compile(&mut vm, &line) {
            fatal(&err);
        }
        let code = compiler.pop_runnable_code(&vm);
        if let Some(code) = &code {
            if eval && !code.is_empty() {
                if let Err(err) = vm.eval(code, None) {
                    fatal(&err);
                }
                if !quiet && line.first() != Some(&b' ') {
                    print_stack(&mut vm);
                }
            }
        }
        continuing = code.is_none();
    }

    ExitCode::SUCCESS
}
