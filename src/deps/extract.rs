//! Static module-reference extraction.
//!
//! Parses TypeScript/TSX text with tree-sitter and reports every module
//! specifier that does not start with `.`: static imports (including
//! side-effect imports and `import x = require(...)`), re-exports, dynamic
//! `import(...)` calls and `require(...)` calls.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;
use tree_sitter::{Language, Node, Parser};

/// One static reference found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceMention {
    /// The specifier exactly as written.
    pub specifier: String,
    /// `import type` / `export type` statement.
    pub type_only: bool,
    pub referencing_path: PathBuf,
}

/// Source grammar, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    TypeScript,
    Tsx,
}

impl Grammar {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") | Some("jsx") => Grammar::Tsx,
            _ => Grammar::TypeScript,
        }
    }

    fn language(self) -> Language {
        match self {
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Reusable parsers for both grammars.
///
/// Parsers are not `Sync`; parallel callers keep one extractor per worker.
pub struct SpecifierExtractor {
    typescript: Parser,
    tsx: Parser,
}

impl SpecifierExtractor {
    pub fn new() -> Result<Self> {
        Ok(SpecifierExtractor {
            typescript: parser_for(Grammar::TypeScript)?,
            tsx: parser_for(Grammar::Tsx)?,
        })
    }

    /// Extract mentions from `text`, which was read from `path`.
    ///
    /// Syntax errors are recovered: whatever the error-tolerant tree still
    /// contains is reported.
    pub fn extract(&mut self, path: &Path, text: &str) -> Vec<ReferenceMention> {
        let parser = match Grammar::for_path(path) {
            Grammar::TypeScript => &mut self.typescript,
            Grammar::Tsx => &mut self.tsx,
        };

        let Some(tree) = parser.parse(text, None) else {
            debug!("parser gave up on {}", path.display());
            return Vec::new();
        };

        let root = tree.root_node();
        if root.has_error() {
            debug!("syntax errors in {}, using recovered tree", path.display());
        }

        let mut found = Vec::new();
        collect(root, text.as_bytes(), path, &mut found);
        found
    }
}

fn parser_for(grammar: Grammar) -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar.language())
        .with_context(|| format!("failed to load the {:?} grammar", grammar))?;
    Ok(parser)
}

/// Convenience wrapper building a fresh extractor.
pub fn extract(path: &Path, text: &str) -> Result<Vec<ReferenceMention>> {
    Ok(SpecifierExtractor::new()?.extract(path, text))
}

/// `^[^.]`
fn is_module_like(specifier: &str) -> bool {
    !specifier.is_empty() && !specifier.starts_with('.')
}

/// Pre-order depth-first walk without recursion.
fn collect(root: Node<'_>, src: &[u8], path: &Path, found: &mut Vec<ReferenceMention>) {
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        let descend = match node.kind() {
            "import_statement" => visit_statement(node, src, path, found),
            "export_statement" => visit_statement(node, src, path, found),
            "call_expression" => visit_call(node, src, path, found),
            _ => true,
        };

        if descend {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
}

/// Import and export-from statements. Returns whether to descend.
fn visit_statement(
    node: Node<'_>,
    src: &[u8],
    path: &Path,
    found: &mut Vec<ReferenceMention>,
) -> bool {
    let source = node.child_by_field_name("source").or_else(|| {
        let mut cursor = node.walk();
        let require_clause = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "import_require_clause");
        require_clause.and_then(|c| c.child_by_field_name("source"))
    });

    let Some(source) = source else {
        // `export const x = ...` and friends hold ordinary code
        return node.kind() == "export_statement";
    };

    let specifier = string_value(source, src);
    if is_module_like(&specifier) {
        found.push(ReferenceMention {
            specifier,
            type_only: has_type_keyword(node),
            referencing_path: path.to_path_buf(),
        });
    }
    false
}

/// `import("...")` and `require("...")`. Returns whether to descend.
fn visit_call(
    node: Node<'_>,
    src: &[u8],
    path: &Path,
    found: &mut Vec<ReferenceMention>,
) -> bool {
    let Some(function) = node.child_by_field_name("function") else {
        return true;
    };
    let is_import = function.kind() == "import";
    let is_require =
        function.kind() == "identifier" && function.utf8_text(src).ok() == Some("require");
    if !is_import && !is_require {
        return true;
    }

    let Some(arguments) = node.child_by_field_name("arguments") else {
        return true;
    };
    let mut cursor = arguments.walk();
    let args: Vec<Node<'_>> = arguments.named_children(&mut cursor).collect();

    let literal = match args.as_slice() {
        [only] if only.kind() == "string" => Some(*only),
        [first, ..] if is_import && first.kind() == "string" => Some(*first),
        _ => None,
    };
    let Some(literal) = literal else {
        return true;
    };

    let specifier = string_value(literal, src);
    if is_module_like(&specifier) {
        found.push(ReferenceMention {
            specifier,
            type_only: false,
            referencing_path: path.to_path_buf(),
        });
        false
    } else {
        true
    }
}

/// Statement-level `type` modifier (`import type`, `export type`).
fn has_type_keyword(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == "type");
    found
}

/// Contents of a string literal node, without quotes, escapes decoded.
fn string_value(node: Node<'_>, src: &[u8]) -> String {
    let mut cursor = node.walk();
    let mut value = String::new();
    let mut high = None;
    for child in node.named_children(&mut cursor) {
        let text = child.utf8_text(src).unwrap_or_default();
        match child.kind() {
            "string_fragment" => {
                flush_surrogate(&mut value, &mut high);
                value.push_str(text);
            }
            "escape_sequence" => match escape_code(text) {
                Some(code) => push_code(&mut value, &mut high, code),
                None => flush_surrogate(&mut value, &mut high),
            },
            _ => {}
        }
    }
    flush_surrogate(&mut value, &mut high);
    value
}

/// Code point of one escape sequence (leading `\` included). `None` for a
/// line continuation, which contributes nothing.
fn escape_code(text: &str) -> Option<u32> {
    let body = text.strip_prefix('\\')?;
    let mut chars = body.chars();
    let code = match chars.next()? {
        'n' => 0x0A,
        't' => 0x09,
        'r' => 0x0D,
        'b' => 0x08,
        'f' => 0x0C,
        'v' => 0x0B,
        '\n' | '\r' | '\u{2028}' | '\u{2029}' => return None,
        'x' => u32::from_str_radix(chars.as_str(), 16).ok()?,
        'u' => {
            let hex = chars.as_str();
            let hex = hex
                .strip_prefix('{')
                .and_then(|h| h.strip_suffix('}'))
                .unwrap_or(hex);
            u32::from_str_radix(hex, 16).ok()?
        }
        '0'..='7' => u32::from_str_radix(body, 8).ok()?,
        other => other as u32,
    };
    Some(code)
}

/// Append a code point, pairing UTF-16 surrogates split across escapes.
fn push_code(value: &mut String, high: &mut Option<u32>, code: u32) {
    match code {
        0xD800..=0xDBFF => {
            flush_surrogate(value, high);
            *high = Some(code);
        }
        0xDC00..=0xDFFF if high.is_some() => {
            let h = high.take().unwrap_or_default();
            let combined = 0x10000 + ((h - 0xD800) << 10) + (code - 0xDC00);
            value.push(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        _ => {
            flush_surrogate(value, high);
            value.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
    }
}

fn flush_surrogate(value: &mut String, high: &mut Option<u32>) {
    if high.take().is_some() {
        value.push(char::REPLACEMENT_CHARACTER);
    }
}
