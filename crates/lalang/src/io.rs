//! Output abstraction for language-visible printing.
//!
//! Everything the language itself writes (`print`, `.write`, `.writeline`,
//! `print_stack`, `.print_code`) goes through the VM's [`PrintWriter`], so
//! hosts and tests can capture or discard it. Debug tracing controlled by
//! the `print_*` flags bypasses this and goes to stderr.

use std::{
    cell::RefCell,
    io::{self, Write as _},
    rc::Rc,
};

/// Sink for language-visible output.
///
/// Lalang strings are byte strings, so the interface is byte-oriented.
pub trait PrintWriter {
    /// Writes raw bytes to the output.
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Writes a UTF-8 fragment (repr text, separators, newlines).
    fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }
}

/// Default writer: straight to stdout, flushed per write.
///
/// Flushing eagerly keeps REPL output interleaved correctly with the
/// prompt, which is written outside the VM.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(bytes);
        let _ = stdout.flush();
    }
}

/// Writer that collects all output into a shared byte buffer.
///
/// Cloning shares the buffer, so a host can hand one clone to the VM and
/// keep another to read the output back afterwards.
#[derive(Debug, Clone, Default)]
pub struct CollectBytesPrint {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl CollectBytesPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collected output so far, leaving the buffer intact.
    #[must_use]
    pub fn output(&self) -> Vec<u8> {
        self.buf.borrow().clone()
    }

    /// Returns the collected output lossily decoded as UTF-8.
    #[must_use]
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.buf.borrow()).into_owned()
    }

    /// Takes the collected output, clearing the buffer.
    #[must_use]
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buf.borrow_mut())
    }
}

impl PrintWriter for CollectBytesPrint {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.borrow_mut().extend_from_slice(bytes);
    }
}

/// Writer that discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write_bytes(&mut self, _bytes: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_shares_buffer_across_clones() {
        let collector = CollectBytesPrint::new();
        let mut writer = collector.clone();
        writer.write_str("hi");
        writer.write_bytes(b"!\n");
        assert_eq!(collector.output_string(), "hi!\n");
    }
}
