// quill-reader - S-expression reader for Quill
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Character-level reader: turns buffered source text into `QuillVal`
//! forms, interning symbols into packages as it goes.
//!
//! One call to [`Reader::read_next`] yields one top-level form. When the
//! buffer does not yet hold a complete form the reader rewinds the stream
//! to the pre-attempt position and returns `Ok(None)`; the host may feed
//! more text and retry. Malformed input likewise rewinds before the error
//! surfaces, so the offending text is never half-consumed.
//!
//! Quote and quasiquote are rewritten at read time: `'x` becomes
//! `(quote x)`, and backquote templates become explicit `append`/`list`/
//! `quote` constructions (with the all-`list` peephole collapse).

use thiserror::Error;

use crate::package::PackageRegistry;
use crate::stream::{InputStream, EOF_CHAR};
use crate::symbol::Symbol;
use crate::value::QuillVal;

/// Words that always resolve to the global package, whatever the current
/// package is.
pub const RESERVED_WORDS: &[&str] = &[
    "quote", "begin", "set!", "if", "if*", "lambda", "defmacro", ".", "while",
];

const UNQUOTE_MARKER: &str = ",";
const SPLICE_MARKER: &str = ",@";

/// One complete top-level form, with the source text it was read from.
#[derive(Debug, Clone)]
pub struct Form {
    pub value: QuillVal,
    pub text: String,
}

/// Reader failure. The stream has already been rewound to the pre-form
/// position when one of these surfaces.
#[derive(Debug, Clone, Error)]
#[error("read error at {line}:{column}: {kind}")]
pub struct ReadError {
    pub kind: ReadErrorKind,
    pub line: usize,
    pub column: usize,
}

/// What went wrong while reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadErrorKind {
    #[error("unexpected ')'")]
    UnexpectedClose,
    #[error("',' is only allowed inside a quasiquote template")]
    StrayUnquote,
    #[error("',@' is only allowed inside a quasiquote template")]
    StraySplice,
    #[error("malformed dotted pair")]
    MalformedDot,
}

/// Internal outcome of a single read attempt. `Incomplete` means the
/// buffer ran out mid-form and the caller should surface the EOF sentinel.
enum Attempt {
    Incomplete,
    Failed(ReadErrorKind),
}

type Parse<T> = Result<T, Attempt>;

/// The Quill reader: an input stream plus the package registry used to
/// intern symbols.
pub struct Reader {
    stream: InputStream,
    registry: PackageRegistry,
}

impl Reader {
    /// Create a reader interning into `registry`.
    #[must_use]
    pub fn new(registry: PackageRegistry) -> Self {
        Reader {
            stream: InputStream::new(),
            registry,
        }
    }

    /// Append source text to the stream.
    pub fn feed(&mut self, text: &str) {
        self.stream.add(text);
    }

    /// The registry this reader interns into.
    #[must_use]
    pub fn registry(&self) -> &PackageRegistry {
        &self.registry
    }

    /// Read one top-level form. `Ok(None)` is the EOF sentinel: no complete
    /// form is buffered, and the stream has been restored so the host can
    /// feed more text and retry.
    pub fn read_next(&mut self) -> Result<Option<Form>, ReadError> {
        self.stream.save();
        self.skip_atmosphere();
        if self.stream.at_eof() {
            self.stream.restore();
            return Ok(None);
        }
        let start = self.stream.cursor();
        match self.read_form(0) {
            Ok(value) => {
                let text = self.stream.text_from(start);
                self.stream.trim_consumed();
                Ok(Some(Form { value, text }))
            }
            Err(Attempt::Incomplete) => {
                self.stream.restore();
                Ok(None)
            }
            Err(Attempt::Failed(kind)) => {
                let (line, column) = self.stream.line_column();
                self.stream.restore();
                Err(ReadError { kind, line, column })
            }
        }
    }

    /// Read every complete form currently buffered.
    pub fn read_all(&mut self) -> Result<Vec<Form>, ReadError> {
        let mut forms = Vec::new();
        while let Some(form) = self.read_next()? {
            forms.push(form);
        }
        Ok(forms)
    }

    // ========================================================================
    // Form reading
    // ========================================================================

    fn skip_atmosphere(&mut self) {
        loop {
            let ch = self.stream.peek();
            if ch != EOF_CHAR && ch.is_whitespace() {
                self.stream.read();
            } else if ch == ';' {
                while !matches!(self.stream.read(), '\n' | EOF_CHAR) {}
            } else {
                return;
            }
        }
    }

    fn read_form(&mut self, depth: usize) -> Parse<QuillVal> {
        self.skip_atmosphere();
        match self.stream.peek() {
            EOF_CHAR => Err(Attempt::Incomplete),
            '(' => self.read_list(depth),
            ')' => Err(Attempt::Failed(ReadErrorKind::UnexpectedClose)),
            '"' => self.read_string(),
            '\'' => {
                self.stream.read();
                let form = self.read_form(depth)?;
                Ok(self.quote_form(form))
            }
            '`' => {
                self.stream.read();
                let template = self.read_form(depth + 1)?;
                Ok(self.expand_template(&template))
            }
            ',' => {
                self.stream.read();
                let splice = self.stream.peek() == '@';
                if splice {
                    self.stream.read();
                }
                if depth == 0 {
                    return Err(Attempt::Failed(if splice {
                        ReadErrorKind::StraySplice
                    } else {
                        ReadErrorKind::StrayUnquote
                    }));
                }
                let form = self.read_form(depth - 1)?;
                let marker = if splice { SPLICE_MARKER } else { UNQUOTE_MARKER };
                Ok(QuillVal::list(vec![
                    QuillVal::symbol(self.global_symbol(marker)),
                    form,
                ]))
            }
            _ => self.read_atom(),
        }
    }

    fn read_list(&mut self, depth: usize) -> Parse<QuillVal> {
        self.stream.read(); // consume '('
        let mut items: Vec<QuillVal> = Vec::new();
        let mut tail = QuillVal::Nil;
        loop {
            self.skip_atmosphere();
            match self.stream.peek() {
                EOF_CHAR => return Err(Attempt::Incomplete),
                ')' => {
                    self.stream.read();
                    break;
                }
                _ => {
                    let form = self.read_form(depth)?;
                    if self.is_dot(&form) {
                        if items.is_empty() {
                            return Err(Attempt::Failed(ReadErrorKind::MalformedDot));
                        }
                        self.skip_atmosphere();
                        if self.stream.peek() == ')' {
                            return Err(Attempt::Failed(ReadErrorKind::MalformedDot));
                        }
                        tail = self.read_form(depth)?;
                        self.skip_atmosphere();
                        match self.stream.peek() {
                            EOF_CHAR => return Err(Attempt::Incomplete),
                            ')' => {
                                self.stream.read();
                                break;
                            }
                            _ => return Err(Attempt::Failed(ReadErrorKind::MalformedDot)),
                        }
                    }
                    items.push(form);
                }
            }
        }
        Ok(QuillVal::dotted_list(items, tail))
    }

    fn read_string(&mut self) -> Parse<QuillVal> {
        self.stream.read(); // opening quote
        let mut text = String::new();
        loop {
            match self.stream.read() {
                EOF_CHAR => return Err(Attempt::Incomplete),
                '"' => break,
                '\\' => match self.stream.read() {
                    EOF_CHAR => return Err(Attempt::Incomplete),
                    escaped => text.push(escaped),
                },
                ch => text.push(ch),
            }
        }
        Ok(QuillVal::string(text))
    }

    fn read_atom(&mut self) -> Parse<QuillVal> {
        let mut token = String::new();
        loop {
            let ch = self.stream.peek();
            if ch == EOF_CHAR
                || ch.is_whitespace()
                || matches!(ch, '(' | ')' | '"' | ';' | '\'' | '`' | ',')
            {
                break;
            }
            token.push(self.stream.read());
        }
        Ok(self.classify(&token))
    }

    fn classify(&self, token: &str) -> QuillVal {
        if token == "#t" || token == "#T" {
            return QuillVal::bool(true);
        }
        if token.starts_with('#') {
            return QuillVal::bool(false);
        }
        let first = token.chars().next().unwrap_or(EOF_CHAR);
        if first == '+' || first == '-' || first.is_ascii_digit() {
            if let Ok(n) = token.parse::<i32>() {
                return QuillVal::int(n);
            }
            if token.contains('.') {
                if let Ok(x) = token.parse::<f32>() {
                    return QuillVal::float(x);
                }
            }
        }
        QuillVal::symbol(self.intern_token(token))
    }

    // ========================================================================
    // Symbol interning
    // ========================================================================

    fn intern_token(&self, token: &str) -> Symbol {
        if let Some(idx) = token.find(':') {
            let (pkg, name) = (&token[..idx], &token[idx + 1..]);
            if pkg.is_empty() {
                return self.registry.keywords().intern(name);
            }
            // A prefixed name interns only in the named package, never
            // through its imports.
            return self.registry.find_or_create(pkg).intern(name);
        }
        self.intern_bare(token)
    }

    fn intern_bare(&self, name: &str) -> Symbol {
        if RESERVED_WORDS.contains(&name) {
            return self.registry.global().intern(name);
        }
        let current = self.registry.current();
        current.resolve(name).unwrap_or_else(|| current.intern(name))
    }

    fn global_symbol(&self, name: &str) -> Symbol {
        self.registry.global().intern(name)
    }

    fn is_dot(&self, form: &QuillVal) -> bool {
        form.as_symbol()
            .is_some_and(|sym| sym.name() == "." && sym.is_global())
    }

    // ========================================================================
    // Quasiquote rewriting
    // ========================================================================

    fn quote_form(&self, form: QuillVal) -> QuillVal {
        QuillVal::list(vec![QuillVal::symbol(self.global_symbol("quote")), form])
    }

    fn list_symbol(&self) -> Symbol {
        self.intern_bare("list")
    }

    fn append_symbol(&self) -> Symbol {
        self.intern_bare("append")
    }

    /// `(, X)` or `(,@ X)` marker payload, if `form` is one.
    fn unquote_payload(&self, form: &QuillVal, marker: &str) -> Option<QuillVal> {
        let cell = form.as_cons()?;
        let sym = cell.first.as_symbol()?;
        if sym.name() != marker || !sym.is_global() {
            return None;
        }
        let rest = cell.rest.as_cons()?;
        if !rest.rest.is_nil() {
            return None;
        }
        Some(rest.first.clone())
    }

    fn is_list_call(&self, form: &QuillVal) -> bool {
        form.as_cons()
            .and_then(|cell| cell.first.as_symbol().cloned())
            .is_some_and(|sym| sym == self.list_symbol())
    }

    /// Rewrite a backquote template into `append`/`list`/`quote` calls.
    fn expand_template(&self, template: &QuillVal) -> QuillVal {
        if template.as_cons().is_none() {
            // `atom → (quote atom)
            return self.quote_form(template.clone());
        }
        if let Some(payload) = self.unquote_payload(template, UNQUOTE_MARKER) {
            // `(,X) → X
            return payload;
        }

        let mut segments: Vec<QuillVal> = Vec::new();
        let mut cursor = template.clone();
        loop {
            // A template like `(a . ,b)` reads as a chain whose rest is an
            // unquote form; append its payload whole as the tail. The whole
            // template being an unquote was already handled above.
            if let Some(payload) = self.unquote_payload(&cursor, UNQUOTE_MARKER) {
                segments.push(payload);
                break;
            }
            match cursor {
                QuillVal::Cons(cell) => {
                    let item = &cell.first;
                    if let Some(payload) = self.unquote_payload(item, UNQUOTE_MARKER) {
                        segments.push(QuillVal::list(vec![
                            QuillVal::symbol(self.list_symbol()),
                            payload,
                        ]));
                    } else if let Some(payload) = self.unquote_payload(item, SPLICE_MARKER) {
                        segments.push(payload);
                    } else {
                        segments.push(QuillVal::list(vec![
                            QuillVal::symbol(self.list_symbol()),
                            self.expand_template(item),
                        ]));
                    }
                    cursor = cell.rest.clone();
                }
                QuillVal::Nil => break,
                other => {
                    segments.push(self.expand_template(&other));
                    break;
                }
            }
        }

        // Peephole: when every segment is a (list …) call, splice their
        // elements into a single (list …).
        if segments.iter().all(|seg| self.is_list_call(seg)) {
            let mut collapsed = vec![QuillVal::symbol(self.list_symbol())];
            for seg in &segments {
                let args = seg.cdr().unwrap_or(QuillVal::Nil);
                collapsed.extend(args.elements().unwrap_or_default());
            }
            return QuillVal::list(collapsed);
        }

        let mut form = vec![QuillVal::symbol(self.append_symbol())];
        form.extend(segments);
        QuillVal::list(form)
    }
}

// ============================================================================
// Tests
// ============================================================================
