//! Marker comment recognition.
//!
//! A marker is a line comment of the form `//<prefix>:<hint>[ <path>]` that
//! starts its line. Doc comments (`///`) never match because the prefix must
//! follow the two slashes directly. The scan steps over string and character
//! literals and block comments, so marker text inside them is not a marker.

use inkwasm_bind::Hint;

/// A marker comment found in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Marker {
    /// 1-based line of the comment.
    pub line: usize,
    /// Parsed hint and target path, or the reason the marker is malformed.
    pub body: std::result::Result<(Hint, String), String>,
}

/// Collect every marker comment in `source`, in line order.
pub(crate) fn scan(prefix: &str, source: &str) -> Vec<Marker> {
    let lead = format!("{prefix}:");
    let mut lexer = Lexer {
        src: source,
        pos: 0,
        line: 1,
    };
    let mut markers = Vec::new();
    let mut line_start = true;
    while let Some(c) = lexer.peek() {
        if c == '\n' {
            lexer.bump();
            line_start = true;
            continue;
        }
        if c.is_whitespace() {
            lexer.bump();
            continue;
        }
        let line = lexer.line;
        if lexer.eat("//") {
            let text = lexer.line_text();
            if let Some(rest) = text.strip_prefix(lead.as_str()).filter(|_| line_start) {
                markers.push(Marker {
                    line,
                    body: parse_body(rest),
                });
            }
        } else if lexer.eat("/*") {
            lexer.block_comment();
        } else if c.is_alphabetic() || c == '_' {
            lexer.word();
        } else {
            lexer.bump();
            match c {
                '"' => lexer.quoted('"'),
                '\'' => lexer.char_or_lifetime(),
                _ => {}
            }
        }
        line_start = false;
    }
    markers
}

/// Just enough of the Rust lexical grammar to tell comments from literals.
struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
}

impl<'s> Lexer<'s> {
    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn eat(&mut self, text: &str) -> bool {
        if !self.rest().starts_with(text) {
            return false;
        }
        for _ in text.chars() {
            self.bump();
        }
        true
    }

    /// The rest of the current line, newline excluded.
    fn line_text(&mut self) -> &'s str {
        let rest = self.rest();
        let end = rest.find('\n').unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    /// Skip past the end of a block comment; block comments nest.
    fn block_comment(&mut self) {
        let mut depth = 1;
        while depth > 0 {
            if self.eat("/*") {
                depth += 1;
            } else if self.eat("*/") {
                depth -= 1;
            } else if self.bump().is_none() {
                return;
            }
        }
    }

    /// Skip past the closing quote of an escaped literal.
    fn quoted(&mut self, close: char) {
        while let Some(c) = self.bump() {
            if c == '\\' {
                self.bump();
            } else if c == close {
                return;
            }
        }
    }

    fn raw(&mut self, hashes: usize) {
        let close = format!("\"{}", "#".repeat(hashes));
        while !self.eat(&close) {
            if self.bump().is_none() {
                return;
            }
        }
    }

    /// An identifier, keyword, or the prefix of a byte, C, or raw literal.
    fn word(&mut self) {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match (&self.src[start..self.pos], self.peek()) {
            ("b" | "c", Some('"')) => {
                self.bump();
                self.quoted('"');
            }
            ("b", Some('\'')) => {
                self.bump();
                self.quoted('\'');
            }
            ("r" | "br" | "cr", Some('"' | '#')) => {
                let hashes = self.rest().bytes().take_while(|&b| b == b'#').count();
                if self.rest()[hashes..].starts_with('"') {
                    self.pos += hashes + 1;
                    self.raw(hashes);
                }
            }
            _ => {}
        }
    }

    /// After a `'`: a character literal, or a lifetime or label to leave be.
    fn char_or_lifetime(&mut self) {
        let mut chars = self.rest().chars();
        match (chars.next(), chars.next()) {
            (Some('\\'), _) => self.quoted('\''),
            (Some(_), Some('\'')) => {
                self.bump();
                self.bump();
            }
            _ => {}
        }
    }
}

/// Split `<hint>[ <path>]` and check the path rules for the hint.
fn parse_body(rest: &str) -> std::result::Result<(Hint, String), String> {
    let rest = rest.trim_end();
    let (keyword, path) = match rest.find(char::is_whitespace) {
        Some(at) => (&rest[..at], rest[at..].trim()),
        None => (rest, ""),
    };

    let hint = Hint::parse(keyword).map_err(|err| format!("malformed marker: {err}"))?;
    match (hint.is_export(), path.is_empty()) {
        (true, false) => Err(format!("malformed marker: export takes no path, found '{path}'")),
        (false, true) => Err(format!("malformed marker: {hint} requires a target path")),
        _ => Ok((hint, path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_markers_with_lines() {
        let src = "use x;\n\n//inkwasm:func globalThis.alert\nfn alert();\n    //inkwasm:export\n";
        let found = scan("inkwasm", src);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].line, 3);
        assert_eq!(found[0].body, Ok((Hint::Func, "globalThis.alert".to_string())));
        assert_eq!(found[1].line, 5);
        assert_eq!(found[1].body, Ok((Hint::Export, String::new())));
    }

    #[test]
    fn ignores_doc_and_spaced_comments() {
        let src = "///inkwasm:func a\n// inkwasm:func b\n//other:func c\n";
        assert!(scan("inkwasm", src).is_empty());
    }

    #[test]
    fn literals_and_block_comments_hide_markers() {
        let src = r##"const A: &str = "
//inkwasm:func globalThis.a
";
/* outer /* inner */
//inkwasm:func globalThis.b
*/
const B: &str = r#"
//inkwasm:func globalThis.c
"#;
const Q: char = '"';
fn f<'a>(x: &'a str) -> &'a str { x }
//inkwasm:func globalThis.d
fn d();
let s = "x"; //inkwasm:func globalThis.e
"##;
        let found = scan("inkwasm", src);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 12);
        assert_eq!(found[0].body, Ok((Hint::Func, "globalThis.d".to_string())));
    }

    #[test]
    fn custom_prefix() {
        let found = scan("js", "//js:get .length\n");
        assert_eq!(found[0].body, Ok((Hint::Get, ".length".to_string())));
    }

    #[test]
    fn path_keeps_inner_spaces() {
        let found = scan("inkwasm", "//inkwasm:get globalThis[\"a b\"]  \n");
        assert_eq!(found[0].body, Ok((Hint::Get, "globalThis[\"a b\"]".to_string())));
    }

    #[test]
    fn malformed_markers() {
        let bad = |s: &str| scan("inkwasm", s).remove(0).body.unwrap_err();
        assert!(bad("//inkwasm:call f").contains("unknown hint 'call'"));
        assert!(bad("//inkwasm:func").contains("requires a target path"));
        assert!(bad("//inkwasm:set   ").contains("requires a target path"));
        assert!(bad("//inkwasm:export Foo").contains("takes no path"));
    }
}
