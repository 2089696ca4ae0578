//! Layout pass
//!
//! Runs before the grammar. Indentation is not context-free, so this pass
//! resolves it and leaves the pest grammar a flat token stream to match:
//!
//! - comments are blanked to spaces (byte for byte)
//! - line breaks inside brackets and after a `\` continuation become
//!   [`JOIN`], which the grammar treats as whitespace
//! - a block opening adds [`INDENT`] after the header line; a block closing
//!   adds [`DEDENT`] after the block's last code line
//!
//! Markers are single bytes and their positions are recorded, so every
//! offset in the output maps back to the original source.

use crate::error::Diagnostic;

pub(crate) const INDENT: char = '\u{1}';
pub(crate) const DEDENT: char = '\u{2}';
pub(crate) const JOIN: char = '\u{3}';

const MAX_BRACKET_DEPTH: usize = 64;
const TAB_WIDTH: usize = 8;

/// Output of the layout pass
#[derive(Debug, Clone)]
pub struct Layout {
    /// Transformed text handed to the grammar
    pub text: String,
    /// Offsets (in `text`) of inserted marker bytes, ascending
    inserted: Vec<usize>,
    /// Top-level statement starts: (offset in `text`, 0-indexed line)
    chunks: Vec<(usize, usize)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Layout {
    /// Map an offset in `text` back to the original source
    pub fn original_offset(&self, offset: usize) -> usize {
        offset - self.inserted.partition_point(|&p| p < offset)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// 0-indexed line range `[first, next)` covered by chunk `i`
    pub fn chunk_lines(&self, i: usize) -> (usize, usize) {
        let first = self.chunks[i].1;
        let next = self.chunks.get(i + 1).map_or(usize::MAX, |c| c.1);
        (first, next)
    }

    /// Text of chunk `i` alone, with the same offsets as `text`
    ///
    /// Everything before the chunk is blanked (line breaks kept) and
    /// everything after it is cut off.
    pub fn chunk_text(&self, i: usize) -> String {
        let start = self.chunks[i].0;
        let end = self.chunks.get(i + 1).map_or(self.text.len(), |c| c.0);

        let mut out = String::with_capacity(end);
        for c in self.text[..start].chars() {
            if c == '\n' {
                out.push('\n');
            } else {
                for _ in 0..c.len_utf8() {
                    out.push(' ');
                }
            }
        }
        out.push_str(&self.text[start..end]);
        out
    }
}

/// Run the layout pass over `source`
pub fn layout(source: &str) -> Layout {
    let mut layouter = Layouter::new(source.len());
    for (line_no, raw) in source.split_inclusive('\n').enumerate() {
        let (body, eol) = split_eol(raw);
        layouter.line(line_no, body, eol);
    }
    let last_line = source.split_inclusive('\n').count().max(1) - 1;
    layouter.finish(last_line);

    Layout {
        text: layouter.out,
        inserted: layouter.inserted,
        chunks: layouter.chunks,
        diagnostics: layouter.diagnostics,
    }
}

fn split_eol(raw: &str) -> (&str, &str) {
    if let Some(body) = raw.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = raw.strip_suffix('\n') {
        (body, "\n")
    } else {
        (raw, "")
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenString {
    quote: char,
    triple: bool,
    line: usize,
    col: usize,
}

struct Layouter {
    out: String,
    inserted: Vec<usize>,
    chunks: Vec<(usize, usize)>,
    diagnostics: Vec<Diagnostic>,
    indents: Vec<usize>,
    /// Open brackets: (char, line, col)
    brackets: Vec<(char, usize, usize)>,
    string: Option<OpenString>,
    /// Previous physical line ended with `\`
    continued: bool,
    /// Where the last complete logical line ended in `out`
    last_code_end: Option<usize>,
    /// Line of a header (ending in `:`) still waiting for its block
    pending_block: Option<usize>,
    /// The current logical line contains code
    has_code: bool,
    /// Last significant character of the current logical line
    last_sig: Option<char>,
    depth_reported: bool,
}

impl Layouter {
    fn new(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity + 64),
            inserted: Vec::new(),
            chunks: Vec::new(),
            diagnostics: Vec::new(),
            indents: vec![0],
            brackets: Vec::new(),
            string: None,
            continued: false,
            last_code_end: None,
            pending_block: None,
            has_code: false,
            last_sig: None,
            depth_reported: false,
        }
    }

    fn error(&mut self, line: usize, col: usize, message: impl Into<String>, rule: &str) {
        self.diagnostics
            .push(Diagnostic::error(line + 1, col + 1, message, rule));
    }

    fn line(&mut self, line_no: usize, body: &str, eol: &str) {
        let logical_start = self.string.is_none() && self.brackets.is_empty() && !self.continued;
        self.continued = false;

        if logical_start {
            let (width, indent_chars, rest) = measure_indent(body);
            let blank = rest.is_empty() || rest.starts_with('#');
            if !blank {
                self.indentation(line_no, width, indent_chars);
                if self.indents.len() == 1 && !starts_with_clause_keyword(rest) {
                    self.chunks.push((self.out.len(), line_no));
                }
            }
        }

        self.scan(line_no, body);

        let in_string = self.string.is_some();
        let joined = !in_string && (!self.brackets.is_empty() || self.continued);
        if !in_string && !joined {
            if self.has_code {
                self.last_code_end = Some(self.out.len());
                if self.last_sig == Some(':') {
                    self.pending_block = Some(line_no);
                }
            }
            self.has_code = false;
            self.last_sig = None;
        }

        if joined {
            for c in eol.chars() {
                self.out.push(if c == '\n' { JOIN } else { ' ' });
            }
        } else {
            self.out.push_str(eol);
        }
    }

    fn indentation(&mut self, line_no: usize, width: usize, col: usize) {
        let mut top = self.indents.last().copied().unwrap_or(0);

        if let Some(header) = self.pending_block.take() {
            if width > top {
                self.indents.push(width);
                self.insert_marker(INDENT);
                return;
            }
            self.error(
                line_no,
                col,
                format!("expected an indented block after line {}", header + 1),
                "indentation",
            );
        } else if width > top {
            self.error(line_no, col, "unexpected indent", "indentation");
            return;
        }

        while width < top {
            self.indents.pop();
            self.insert_marker(DEDENT);
            top = self.indents.last().copied().unwrap_or(0);
        }
        if width > top {
            self.error(
                line_no,
                col,
                "unindent does not match any outer indentation level",
                "indentation",
            );
            self.indents.push(width);
        }
    }

    fn insert_marker(&mut self, marker: char) {
        if let Some(pos) = self.last_code_end {
            self.out.insert(pos, marker);
            self.inserted.push(pos);
            self.last_code_end = Some(pos + 1);
        }
    }

    fn scan(&mut self, line_no: usize, body: &str) {
        let mut chars = body.char_indices().peekable();
        let mut col = 0usize;

        while let Some((i, c)) = chars.next() {
            let this_col = col;
            col += 1;

            if (c as u32) < 0x20 && !matches!(c, '\t' | '\u{c}' | '\r') || c == '\u{7f}' {
                self.error(
                    line_no,
                    this_col,
                    format!("invalid non-printable character U+{:04X}", c as u32),
                    "syntax",
                );
                self.out.push(' ');
                continue;
            }

            if let Some(open) = self.string {
                self.out.push(c);
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        col += 1;
                        self.out.push(escaped);
                    } else {
                        // backslash-newline continues the string
                        self.continued = !open.triple;
                    }
                } else if c == open.quote {
                    if !open.triple {
                        self.string = None;
                        self.last_sig = Some(c);
                    } else if body[i..].starts_with(&triple(c)) {
                        for _ in 0..2 {
                            if let Some((_, q)) = chars.next() {
                                col += 1;
                                self.out.push(q);
                            }
                        }
                        self.string = None;
                        self.last_sig = Some(c);
                    }
                }
                continue;
            }

            match c {
                '#' => {
                    for _ in 0..body.len() - i {
                        self.out.push(' ');
                    }
                    return;
                }
                '"' | '\'' => {
                    self.has_code = true;
                    let is_triple = body[i..].starts_with(&triple(c));
                    self.out.push(c);
                    if is_triple {
                        for _ in 0..2 {
                            if let Some((_, q)) = chars.next() {
                                col += 1;
                                self.out.push(q);
                            }
                        }
                    }
                    self.string = Some(OpenString {
                        quote: c,
                        triple: is_triple,
                        line: line_no,
                        col: this_col,
                    });
                }
                '(' | '[' | '{' => {
                    self.has_code = true;
                    self.last_sig = Some(c);
                    self.brackets.push((c, line_no, this_col));
                    if self.brackets.len() > MAX_BRACKET_DEPTH && !self.depth_reported {
                        self.depth_reported = true;
                        self.error(line_no, this_col, "too many nested parentheses", "syntax");
                    }
                    self.out.push(c);
                }
                ')' | ']' | '}' => {
                    self.has_code = true;
                    self.last_sig = Some(c);
                    match self.brackets.pop() {
                        None => self.error(line_no, this_col, format!("unmatched '{}'", c), "syntax"),
                        Some((open, _, _)) if closing(open) != c => self.error(
                            line_no,
                            this_col,
                            format!(
                                "closing parenthesis '{}' does not match opening parenthesis '{}'",
                                c, open
                            ),
                            "syntax",
                        ),
                        Some(_) => {}
                    }
                    self.out.push(c);
                }
                '\\' if chars.peek().map_or(true, |&(_, n)| n == '\r') => {
                    self.continued = true;
                    self.out.push(' ');
                }
                c => {
                    if !c.is_whitespace() {
                        self.has_code = true;
                        self.last_sig = Some(c);
                    }
                    self.out.push(if c == '\r' { ' ' } else { c });
                }
            }
        }

        if let Some(open) = self.string {
            if !open.triple && !self.continued {
                self.error(open.line, open.col, "unterminated string literal", "syntax");
                self.string = None;
            }
        }
    }

    fn finish(&mut self, last_line: usize) {
        if let Some(open) = self.string.take() {
            self.error(
                open.line,
                open.col,
                "unterminated triple-quoted string literal",
                "syntax",
            );
        }
        if let Some(&(open, line, col)) = self.brackets.last() {
            self.error(line, col, format!("'{}' was never closed", open), "syntax");
            self.brackets.clear();
        }
        if let Some(header) = self.pending_block.take() {
            self.error(
                last_line,
                0,
                format!("expected an indented block after line {}", header + 1),
                "indentation",
            );
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.insert_marker(DEDENT);
        }
    }
}

fn triple(quote: char) -> String {
    std::iter::repeat(quote).take(3).collect()
}

fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Indentation width, its length in characters, and the rest of the line
fn measure_indent(body: &str) -> (usize, usize, &str) {
    let mut width = 0;
    let mut count = 0;
    for c in body.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
            '\u{c}' => width = 0,
            _ => break,
        }
        count += 1;
    }
    let rest = body[count..].trim_end_matches('\r');
    (width, count, rest)
}

fn starts_with_clause_keyword(rest: &str) -> bool {
    ["elif", "else", "except", "finally"].iter().any(|kw| {
        rest.strip_prefix(kw).is_some_and(|after| {
            !after
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible(layout: &Layout) -> String {
        layout
            .text
            .replace(INDENT, "<I>")
            .replace(DEDENT, "<D>")
            .replace(JOIN, "<J>")
    }

    #[test]
    fn test_markers_surround_blocks() {
        let layout = layout("if x:\n    y = 1\nz = 2\n");
        assert!(layout.diagnostics.is_empty());
        assert_eq!(visible(&layout), "if x:<I>\n    y = 1<D>\nz = 2\n");
    }

    #[test]
    fn test_dedent_lands_before_blank_lines() {
        let layout = layout("def f():\n    return 1\n\n\n# done\nf()\n");
        assert_eq!(
            visible(&layout),
            "def f():<I>\n    return 1<D>\n\n\n      \nf()\n"
        );
    }

    #[test]
    fn test_brackets_join_lines() {
        let layout = layout("x = [1,\n     2]\n");
        assert_eq!(visible(&layout), "x = [1,<J>     2]\n");
        assert_eq!(layout.chunk_count(), 1);
    }

    #[test]
    fn test_offsets_map_back_to_source() {
        let source = "if a:\n    b\nc\n";
        let layout = layout(source);
        let c_offset = layout.text.find('c').unwrap();
        assert_eq!(layout.original_offset(c_offset), source.find('c').unwrap());
    }

    #[test]
    fn test_clause_keywords_do_not_start_chunks() {
        let layout = layout("try:\n    x\nexcept E:\n    y\nz\n");
        assert_eq!(layout.chunk_count(), 2);
        assert_eq!(layout.chunk_lines(0), (0, 4));
    }

    #[test]
    fn test_indentation_errors() {
        let layout = layout("x = 1\n    y = 2\nif x:\nz = 3\n");
        let messages: Vec<&str> = layout
            .diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec!["unexpected indent", "expected an indented block after line 3"]
        );
        assert_eq!(layout.diagnostics[0].line, 2);
    }

    #[test]
    fn test_unclosed_bracket_and_string() {
        let bracket = layout("x = (1,\n");
        assert_eq!(bracket.diagnostics[0].message, "'(' was never closed");

        let string = layout("s = 'abc\n");
        assert_eq!(string.diagnostics[0].message, "unterminated string literal");
    }

    #[test]
    fn test_triple_quoted_string_spans_lines() {
        let layout = layout("s = \"\"\"a\n  b\"\"\"\nt = 1\n");
        assert!(layout.diagnostics.is_empty());
        assert_eq!(layout.chunk_count(), 2);
    }

    #[test]
    fn test_chunk_text_keeps_offsets() {
        let layout = layout("a = 1\nb = (\n");
        let chunk = layout.chunk_text(1);
        assert_eq!(chunk.len(), layout.text.len());
        assert!(chunk.starts_with("     \n"));
    }
}
