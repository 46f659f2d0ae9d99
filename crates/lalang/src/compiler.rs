//! The single-pass compiler.
//!
//! Tokens are classified by a cascading prefix match and emitted directly
//! as bytecode; there is no AST. Blocks nest through a stack of frames,
//! and function frames carry the set of names known to be local so far.
//!
//! Because emitted instructions are never revised, a name referenced
//! before its first store inside a function compiles as a global, and
//! afterwards as a local. That asymmetry is part of the language.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    code::{Code, Instr, Op},
    error::{Position, RunError, RunResult},
    intern::StrId,
    lexer::Lexer,
    vm::Vm,
};

/// Frames can nest deeply through data literals; this only bounds runaway
/// input.
const COMPILER_STACK_SIZE: usize = 1024;

/// One nesting level of `{}` / `[]` under construction.
#[derive(Debug)]
struct Frame {
    code: Code,
    /// Names stored or declared local so far, for function frames.
    locals: SmallVec<[StrId; 8]>,
}

/// Compiler state, kept across calls so the REPL can feed partial input.
#[derive(Debug)]
pub struct Compiler {
    filename: Rc<str>,
    row: u32,
    col: u32,
    frames: Vec<Frame>,
}

impl Compiler {
    #[must_use]
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.into(),
            row: 0,
            col: 0,
            frames: Vec::new(),
        }
    }

    fn position(&self) -> Position {
        Position {
            filename: Rc::clone(&self.filename),
            row: self.row,
            col: self.col,
        }
    }

    fn err(&self, error: RunError) -> RunError {
        error.at(self.position())
    }

    /// The innermost function frame, whose local-set decides promotion.
    fn last_func_frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.iter_mut().rev().find(|frame| frame.code.is_func)
    }

    fn in_func(&self) -> bool {
        self.frames.iter().any(|frame| frame.code.is_func)
    }

    /// Whether `name` is local in the innermost function frame right now.
    fn is_local(&self, name: StrId) -> bool {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.code.is_func)
            .is_some_and(|frame| frame.locals.contains(&name))
    }

    fn mark_local(&mut self, name: StrId) {
        let frame = self
            .last_func_frame_mut()
            .expect("mark_local called outside a function frame");
        if !frame.locals.contains(&name) {
            frame.locals.push(name);
        }
    }

    fn push_frame(&mut self, row: u32, col: u32, is_func: bool) -> RunResult<()> {
        if self.frames.len() >= COMPILER_STACK_SIZE {
            return Err(self.err(RunError::parse("Too many nested blocks")));
        }
        self.frames.push(Frame {
            code: Code::new(Rc::clone(&self.filename), row, col, is_func),
            locals: SmallVec::new(),
        });
        Ok(())
    }

    fn top_code(&mut self) -> &mut Code {
        &mut self.frames.last_mut().expect("no compiler frame").code
    }

    /// Compiles `text`, appending to the open frame (creating the implicit
    /// top-level frame if none is open).
    pub fn compile(&mut self, vm: &mut Vm, text: &[u8]) -> RunResult<()> {
        if self.frames.is_empty() {
            self.push_frame(self.row, self.col, false)?;
        }

        let mut lexer = Lexer::new(text, self.row, self.col);
        while let Some(token) = lexer.next_token() {
            self.row = token.row;
            self.col = token.col;

            if vm.flags.print_tokens > 0 {
                if vm.flags.print_tokens >= 2 {
                    eprint!("{}: ", self.position());
                }
                eprintln!("Got token: [{}]", String::from_utf8_lossy(token.text));
            }

            self.compile_token(vm, token.text)?;
        }
        let (row, col) = lexer.position();
        self.row = row;
        self.col = col;
        Ok(())
    }

    /// Classifies and emits one token. The match order is load-bearing:
    /// operator tokens must win over `=`-prefixed stores, and `=.` over
    /// plain `=`.
    fn compile_token(&mut self, vm: &mut Vm, token: &[u8]) -> RunResult<()> {
        let first = token[0];

        if token == b">>>" || token == b"..." {
            // REPL paste markers.
        } else if first.is_ascii_digit() || (first == b'-' && token.get(1).is_some_and(u8::is_ascii_digit)) {
            let i = self.parse_int_literal(token)?;
            self.top_code().push(Instr::LoadInt(i));
        } else if first == b'"' {
            if token.len() < 2 || token[token.len() - 1] != b'"' {
                return Err(self.err(RunError::lex(format!(
                    "Unterminated string literal: [{}]",
                    String::from_utf8_lossy(token)
                ))));
            }
            let parsed = parse_string_literal(token);
            let id = vm.interns.intern(&parsed);
            self.top_code().push(Instr::LoadStr(id));
        } else if let Some(op) = Op::parse(token) {
            self.top_code().push(op.instr());
        } else if first == b'.' {
            let name = self.parse_name(vm, &token[1..])?;
            self.top_code().push(Instr::Getter(name));
        } else if token.starts_with(b"=.") {
            let name = self.parse_name(vm, &token[2..])?;
            self.top_code().push(Instr::Setter(name));
        } else if first == b'\'' {
            // Declare local without emitting anything.
            let name = self.parse_name(vm, &token[1..])?;
            if !self.in_func() {
                return Err(self.err(RunError::parse(format!(
                    "Invalid outside of function scope: [{}]",
                    String::from_utf8_lossy(token)
                ))));
            }
            self.mark_local(name);
        } else if first == b'=' {
            let rename_func = token.get(1) == Some(&b'@');
            let name = self.parse_name(vm, &token[if rename_func { 2 } else { 1 }..])?;
            if rename_func {
                self.top_code().push(Instr::RenameFunc(name));
            }
            if self.in_func() {
                self.mark_local(name);
                self.top_code().push(Instr::StoreLocal(name));
            } else {
                self.top_code().push(Instr::StoreGlobal(name));
            }
        } else if first == b'@' && token.len() > 1 {
            let name = self.parse_name(vm, &token[1..])?;
            let instr = if self.is_local(name) {
                Instr::CallLocal(name)
            } else {
                Instr::CallGlobal(name)
            };
            self.top_code().push(instr);
        } else if first == b'$' {
            let name = self.parse_name(vm, &token[1..])?;
            self.top_code().push(Instr::RenameFunc(name));
        } else if token == b"(" || token == b")" {
            // Stack-effect hints; they emit nothing.
        } else if token == b"{" || token == b"[" {
            if vm.flags.print_code > 0 {
                let depth = self.frames.len() - 1;
                eprintln!("{}Compiling '{}' code block:", "  ".repeat(depth), first as char);
            }
            self.push_frame(self.row, self.col, first == b'[')?;
        } else if token == b"}" || token == b"]" {
            self.close_frame(vm, first == b']')?;
        } else {
            let name = self.parse_name(vm, token)?;
            let instr = if self.is_local(name) {
                Instr::LoadLocal(name)
            } else {
                Instr::LoadGlobal(name)
            };
            self.top_code().push(instr);
        }
        Ok(())
    }

    /// Closes the current block: the popped frame's code goes into the
    /// VM's code pool, and a `LOAD_FUNC` for it is emitted into the
    /// enclosing frame.
    fn close_frame(&mut self, vm: &mut Vm, closed_func: bool) -> RunResult<()> {
        if self.frames.len() <= 1 {
            return Err(self.err(RunError::parse("Unterminated block")));
        }
        let was_func = self.top_code().is_func;
        if was_func != closed_func {
            return Err(self.err(RunError::parse(format!(
                "Expected '{}', got '{}'",
                if was_func { ']' } else { '}' },
                if closed_func { ']' } else { '}' },
            ))));
        }
        let frame = self.frames.pop().expect("frame count checked");
        if vm.flags.print_code > 0 {
            let depth = self.frames.len();
            eprint!("{}", frame.code.render(&vm.interns, depth));
        }
        let index = vm.push_code(Rc::new(frame.code));
        self.top_code().push(Instr::LoadFunc(index));
        Ok(())
    }

    /// Yields the finished top-level block once all braces are balanced;
    /// otherwise keeps state and waits for more input.
    pub fn pop_runnable_code(&mut self, vm: &Vm) -> Option<Code> {
        if self.frames.len() == 1 {
            let frame = self.frames.pop().expect("frame count checked");
            if vm.flags.print_code > 0 && !frame.code.is_empty() {
                eprintln!("Compiled top-level code:");
                eprint!("{}", frame.code.render(&vm.interns, 1));
            }
            Some(frame.code)
        } else {
            None
        }
    }

    /// Base-10 integer literal, with an optional leading `-`.
    fn parse_int_literal(&self, token: &[u8]) -> RunResult<i64> {
        let neg = token[0] == b'-';
        let digits = &token[usize::from(neg)..];
        // Accumulate negatively so i64::MIN parses.
        let mut i: i64 = 0;
        for (offset, &c) in digits.iter().enumerate() {
            if !c.is_ascii_digit() {
                return Err(self.err(RunError::parse(format!(
                    "Integer literal contains non-digit at position {}: [{}]",
                    offset + usize::from(neg),
                    String::from_utf8_lossy(token)
                ))));
            }
            i = i
                .checked_mul(10)
                .and_then(|i| i.checked_sub(i64::from(c - b'0')))
                .ok_or_else(|| {
                    self.err(RunError::parse(format!(
                        "Integer literal out of range: [{}]",
                        String::from_utf8_lossy(token)
                    )))
                })?;
        }
        if neg {
            Ok(i)
        } else {
            i.checked_neg().ok_or_else(|| {
                self.err(RunError::parse(format!(
                    "Integer literal out of range: [{}]",
                    String::from_utf8_lossy(token)
                )))
            })
        }
    }

    /// Validates and interns a name: `[A-Za-z_][A-Za-z0-9_]*`.
    fn parse_name(&self, vm: &mut Vm, token: &[u8]) -> RunResult<StrId> {
        let valid = match token.first() {
            None => {
                return Err(self.err(RunError::parse("Expected name, got empty token!")));
            }
            Some(&first) => {
                (first == b'_' || first.is_ascii_alphabetic())
                    && token[1..].iter().all(|&c| c == b'_' || c.is_ascii_alphanumeric())
            }
        };
        if !valid {
            return Err(self.err(RunError::parse(format!(
                "Expected name, got: [{}]",
                String::from_utf8_lossy(token)
            ))));
        }
        Ok(vm.interns.intern(token))
    }
}

/// Decodes the body of a string-literal token: `\n` becomes a newline,
/// any other escaped byte stands for itself.
fn parse_string_literal(token: &[u8]) -> Vec<u8> {
    let body = &token[1..token.len() - 1];
    let mut parsed = Vec::with_capacity(body.len());
    let mut bytes = body.iter().copied();
    while let Some(c) = bytes.next() {
        if c == b'\\' {
            match bytes.next() {
                Some(b'n') => parsed.push(b'\n'),
                Some(other) => parsed.push(other),
                None => break,
            }
        } else {
            parsed.push(c);
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_literal_unescapes() {
        assert_eq!(parse_string_literal(br#""a\nb""#), b"a\nb");
        assert_eq!(parse_string_literal(br#""a\\b""#), b"a\\b");
        assert_eq!(parse_string_literal(br#""say \"hi\"""#), b"say \"hi\"");
        assert_eq!(parse_string_literal(br#""""#), b"");
    }
}
