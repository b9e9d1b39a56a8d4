//! Lexical scan for import references.
//!
//! Finds `@import`, `@use` and `@forward` references without parsing the
//! stylesheet; comments and string literals are skipped so commented-out
//! imports never produce edges.

/// A raw import reference found in a source file, unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReference {
    pub reference: String,
    /// 1-based line of the reference
    pub line: u32,
}

/// Scan stylesheet text for import references, in order of appearance.
pub fn scan_imports(source: &str) -> Vec<ImportReference> {
    let mut scanner = Scanner::new(source);
    let mut refs = Vec::new();

    while let Some(byte) = scanner.peek() {
        match byte {
            b'/' if scanner.peek_at(1) == Some(b'/') => scanner.skip_line_comment(),
            b'/' if scanner.peek_at(1) == Some(b'*') => scanner.skip_block_comment(),
            b'"' | b'\'' => {
                scanner.bump();
                scanner.skip_string(byte);
            }
            b'@' => {
                scanner.bump();
                match scanner.read_ident().as_str() {
                    "import" => scanner.read_import_args(&mut refs),
                    "use" | "forward" => scanner.read_single_reference(&mut refs),
                    _ => {}
                }
            }
            _ => {
                scanner.bump();
            }
        }
    }

    refs
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek();
        if let Some(byte) = byte {
            self.pos += 1;
            if byte == b'\n' {
                self.line += 1;
            }
        }
        byte
    }

    fn skip_line_comment(&mut self) {
        while let Some(byte) = self.peek() {
            if byte == b'\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        self.bump();
        self.bump();
        while let Some(byte) = self.bump() {
            if byte == b'*' && self.peek() == Some(b'/') {
                self.bump();
                break;
            }
        }
    }

    /// Skip past a string literal whose opening quote was already consumed.
    fn skip_string(&mut self, quote: u8) {
        while let Some(byte) = self.bump() {
            match byte {
                b'\\' => {
                    self.bump();
                }
                _ if byte == quote => break,
                _ => {}
            }
        }
    }

    /// Read a string literal whose opening quote was already consumed.
    fn read_string(&mut self, quote: u8) -> String {
        let mut out = Vec::new();
        while let Some(byte) = self.bump() {
            match byte {
                b'\\' => {
                    if let Some(escaped) = self.bump() {
                        out.push(escaped);
                    }
                }
                _ if byte == quote => break,
                _ => out.push(byte),
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(byte) if byte.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => self.skip_line_comment(),
                Some(b'/') if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    /// Skip the rest of the statement, honoring strings and comments so a
    /// `;` inside either does not end it early.
    fn skip_to_semicolon(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b';' => {
                    self.bump();
                    return;
                }
                b'/' if self.peek_at(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                b'"' | b'\'' => {
                    self.bump();
                    self.skip_string(byte);
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// `@import` takes a comma-separated list of references. Unquoted
    /// arguments (`url(...)`, bare CSS imports) are left to the underlying
    /// compiler and produce no reference.
    fn read_import_args(&mut self, refs: &mut Vec<ImportReference>) {
        loop {
            self.skip_ws_and_comments();
            match self.peek() {
                Some(quote @ (b'"' | b'\'')) => {
                    let line = self.line;
                    self.bump();
                    let reference = self.read_string(quote);
                    refs.push(ImportReference { reference, line });
                }
                _ => {
                    self.skip_to_semicolon();
                    return;
                }
            }
            self.skip_ws_and_comments();
            if self.peek() == Some(b',') {
                self.bump();
                continue;
            }
            self.skip_to_semicolon();
            return;
        }
    }

    /// `@use` and `@forward` take exactly one reference; trailing
    /// modifiers (`as`, `with (...)`) are skipped.
    fn read_single_reference(&mut self, refs: &mut Vec<ImportReference>) {
        self.skip_ws_and_comments();
        if let Some(quote @ (b'"' | b'\'')) = self.peek() {
            let line = self.line;
            self.bump();
            let reference = self.read_string(quote);
            refs.push(ImportReference { reference, line });
        }
        self.skip_to_semicolon();
    }
}
