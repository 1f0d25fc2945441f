use std::sync::LazyLock;

use regex::Regex;

use sift_core::{BoundaryKind, ChunkStrategy};

use super::{pack, Piece, SplitConfig, Splitter, Unit};

/// Lines that open a top-level declaration, after optional modifiers.
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^(?:(?:pub(?:\([^)]*\))?|export|default|async|unsafe|static|public|private|protected"#,
        r#"|internal|abstract|final|extern(?:\s+"[^"]*")?|override|open|sealed|inline|const)\s+)*"#,
        r#"(?:(?:fn|def|class|function|func|impl|struct|enum|trait|mod|interface|type|object"#,
        r#"|module|package|import|from|use|let|var|const|namespace|template)\b"#,
        r#"|@|#\[|#include|#define|macro_rules!)"#,
    ))
    .unwrap()
});

/// C-family signatures without a keyword, e.g. `int main(void) {`.
static C_SIGNATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][\w\s\*&:<>,\[\]]*\([^;]*$").unwrap());

/// Top-level declarations (functions, types, impl blocks), line packing when
/// none are found.
pub struct CodeSplitter;

impl Splitter for CodeSplitter {
    fn strategy(&self) -> ChunkStrategy {
        ChunkStrategy::Code
    }

    fn split_oversized(&self, body: &str, config: &SplitConfig) -> Vec<Piece> {
        pack(code_units(body), config)
    }
}

#[derive(Debug)]
struct Line<'a> {
    text: &'a str,
    starts_declaration: bool,
    attachable: bool,
}

/// Split source into declaration units. The units cover `body` exactly.
fn code_units(body: &str) -> Vec<Unit> {
    let mut scanner = Scanner::default();
    let lines: Vec<Line<'_>> = body
        .split_inclusive('\n')
        .map(|text| {
            let at_top = scanner.at_top_level();
            let unindented = text.starts_with(|c: char| !c.is_whitespace());
            let line = Line {
                text,
                starts_declaration: at_top && unindented && opens_declaration(text),
                attachable: at_top && unindented && is_attachable(text),
            };
            scanner.scan(text);
            line
        })
        .collect();

    if !lines.iter().any(|l| l.starts_declaration) {
        return lines
            .into_iter()
            .map(|l| Unit::new(l.text, BoundaryKind::Line))
            .collect();
    }

    let mut units = Vec::new();
    let mut current: Vec<Line<'_>> = Vec::new();
    let mut current_is_declaration = false;

    for line in lines {
        if line.starts_declaration {
            let trailing = current.iter().rev().take_while(|l| l.attachable).count();
            let carried = current.split_off(current.len() - trailing);
            if !current.is_empty() {
                units.push(join_unit(&current, current_is_declaration));
            }
            current = carried;
            current_is_declaration = true;
        }
        current.push(line);
    }
    if !current.is_empty() {
        units.push(join_unit(&current, current_is_declaration));
    }
    units
}

fn join_unit(lines: &[Line<'_>], is_declaration: bool) -> Unit {
    let text: String = lines.iter().map(|l| l.text).collect();
    let boundary = if is_declaration {
        BoundaryKind::Declaration
    } else {
        BoundaryKind::Line
    };
    Unit::new(text, boundary)
}

fn opens_declaration(line: &str) -> bool {
    let line = line.trim_end();
    DECLARATION.is_match(line) || C_SIGNATURE.is_match(line)
}

/// Comment, attribute and decorator lines that belong to the next declaration.
fn is_attachable(line: &str) -> bool {
    let t = line.trim();
    if t.starts_with("#include") || t.starts_with("#define") {
        return false;
    }
    ["//", "/*", "*", "#", "@"].iter().any(|p| t.starts_with(p))
}

/// Tracks bracket depth across lines, ignoring strings and comments.
#[derive(Debug, Default)]
struct Scanner {
    depth: i64,
    in_block_comment: bool,
    in_triple: Option<&'static str>,
}

impl Scanner {
    fn at_top_level(&self) -> bool {
        self.depth == 0 && !self.in_block_comment && self.in_triple.is_none()
    }

    fn scan(&mut self, line: &str) {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let rest = &chars[i..];
            if self.in_block_comment {
                if rest.starts_with(&['*', '/']) {
                    self.in_block_comment = false;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }
            if let Some(delim) = self.in_triple {
                if starts_with_str(rest, delim) {
                    self.in_triple = None;
                    i += 3;
                } else {
                    i += 1;
                }
                continue;
            }

            match rest[0] {
                '/' if rest.get(1) == Some(&'/') => return,
                '/' if rest.get(1) == Some(&'*') => {
                    self.in_block_comment = true;
                    i += 2;
                }
                '#' if rest.get(1).is_none_or(|c| c.is_whitespace() || *c == '#') => return,
                '"' if starts_with_str(rest, "\"\"\"") => {
                    self.in_triple = Some("\"\"\"");
                    i += 3;
                }
                '\'' if starts_with_str(rest, "'''") => {
                    self.in_triple = Some("'''");
                    i += 3;
                }
                '"' | '`' => i += skip_quoted(rest, rest[0]),
                '\'' => i += skip_single_quote(rest),
                '{' | '(' | '[' => {
                    self.depth += 1;
                    i += 1;
                }
                '}' | ')' | ']' => {
                    self.depth = (self.depth - 1).max(0);
                    i += 1;
                }
                _ => i += 1,
            }
        }
    }
}

fn starts_with_str(chars: &[char], pat: &str) -> bool {
    let mut it = chars.iter();
    pat.chars().all(|p| it.next() == Some(&p))
}

/// Length of a quoted literal starting at `chars[0]`, or 1 when unterminated.
fn skip_quoted(chars: &[char], quote: char) -> usize {
    let mut i = 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            '\n' => break,
            _ => i += 1,
        }
    }
    1
}

/// Char literals, single-quoted strings, or a lifetime/label quote.
fn skip_single_quote(chars: &[char]) -> usize {
    match (chars.get(1), chars.get(2)) {
        (Some('\\'), _) => skip_quoted(chars, '\''),
        (Some(_), Some('\'')) => 3,
        (Some(c), _) if c.is_alphabetic() || *c == '_' => {
            let run = chars[1..]
                .iter()
                .take_while(|c| c.is_alphanumeric() || **c == '_')
                .count();
            if chars.get(1 + run) == Some(&'\'') {
                run + 2
            } else {
                1
            }
        }
        _ => skip_quoted(chars, '\''),
    }
}
