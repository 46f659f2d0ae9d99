//! The tokenizer.
//!
//! Tokens are runs of bytes separated by spaces and newlines, except string
//! literals, which begin at `"` and swallow anything (escaped by `\`) up to
//! the next unescaped `"`, a newline, or end of input. `#` starts a comment
//! running to the end of the line. The lexer does not classify tokens
//! beyond the string-literal distinction; classification is the compiler's
//! job.
//!
//! Row and column advance for every byte consumed, so a token's recorded
//! position points at its first byte.

/// One token: a byte slice of the source plus its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a [u8],
    pub row: u32,
    pub col: u32,
}

/// Streaming tokenizer over a byte buffer.
///
/// The starting row/col are supplied by the caller so a compiler can keep
/// positions continuous across successive REPL lines.
#[derive(Debug)]
pub struct Lexer<'a> {
    text: &'a [u8],
    pos: usize,
    row: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(text: &'a [u8], row: u32, col: u32) -> Self {
        Self { text, pos: 0, row, col }
    }

    /// The position just past the last byte consumed.
    #[must_use]
    pub fn position(&self) -> (u32, u32) {
        (self.row, self.col)
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    #[inline]
    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.row += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    /// Skips whitespace and comments up to the next token byte.
    fn skip_blank(&mut self) {
        let mut comment = false;
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\n' => {}
                b'#' => comment = true,
                _ if !comment => break,
                _ => {}
            }
            self.advance();
            if c == b'\n' {
                comment = false;
            }
        }
    }

    /// Returns the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<Token<'a>> {
        self.skip_blank();
        let start = self.pos;
        let (row, col) = (self.row, self.col);
        let first = self.peek()?;

        if first == b'"' {
            // String literal: any byte goes, `\` escapes the next one.
            // Ends at an unescaped `"`, a newline, or end of input; a
            // terminating newline stays outside the token so the compiler
            // sees the literal as unterminated.
            self.advance();
            while let Some(c) = self.peek() {
                if c == b'\n' {
                    break;
                }
                self.advance();
                if c == b'\\' {
                    self.advance();
                } else if c == b'"' {
                    break;
                }
            }
        } else {
            while let Some(c) = self.peek() {
                if c == b' ' || c == b'\n' {
                    break;
                }
                self.advance();
            }
        }

        Some(Token {
            text: &self.text[start..self.pos],
            row,
            col,
        })
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<&[u8]> {
        Lexer::new(text.as_bytes(), 0, 0).map(|t| t.text).collect()
    }

    #[test]
    fn splits_on_spaces_and_newlines() {
        assert_eq!(tokens("2 3 +"), vec![&b"2"[..], b"3", b"+"]);
        assert_eq!(tokens("  a\nb  "), vec![&b"a"[..], b"b"]);
        assert_eq!(tokens(""), Vec::<&[u8]>::new());
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(tokens("1 # two three\n4"), vec![&b"1"[..], b"4"]);
        assert_eq!(tokens("# only a comment"), Vec::<&[u8]>::new());
    }

    #[test]
    fn string_literals_keep_spaces_and_escapes() {
        assert_eq!(tokens(r#""a b" c"#), vec![&br#""a b""#[..], b"c"]);
        assert_eq!(tokens(r#""a\"b""#), vec![&br#""a\"b""#[..]]);
        // Unterminated at a newline: the newline stays outside the token.
        assert_eq!(tokens("\"oops\nx"), vec![&b"\"oops"[..], b"x"]);
    }

    #[test]
    fn positions_point_at_first_byte() {
        let mut lexer = Lexer::new(b"ab\n  cd", 0, 0);
        let a = lexer.next_token().unwrap();
        assert_eq!((a.row, a.col), (0, 0));
        let c = lexer.next_token().unwrap();
        assert_eq!((c.row, c.col), (1, 2));
    }

    #[test]
    fn positions_continue_from_caller_supplied_origin() {
        let mut lexer = Lexer::new(b" x", 4, 0);
        let x = lexer.next_token().unwrap();
        assert_eq!((x.row, x.col), (4, 1));
    }
}
