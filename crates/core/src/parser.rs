//! Tree-sitter parser (C2): one grammar per supported language, a definition
//! walk and a reference walk, producing the tag vocabulary from §6.
//!
//! Syntax errors never fail `parse`: tree-sitter still returns a (partial)
//! tree for broken input, and tags are emitted from whatever was recognized.

use crate::types::{Tag, TagKind};
use tree_sitter::{Language, Node, Parser};

/// Per-language constant grammar handle. Tree-sitter's `Language` values are
/// cheap, reference-counted handles to grammar tables compiled once at
/// process start — there's no per-parse compilation cost to amortize here.
fn language_for_ext(ext: &str) -> Option<Language> {
    match ext {
        "rs" => Some(tree_sitter_rust::LANGUAGE.into()),
        "ts" | "tsx" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "js" | "jsx" | "mjs" | "cjs" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "py" | "pyi" => Some(tree_sitter_python::LANGUAGE.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        "c" | "h" => Some(tree_sitter_c::LANGUAGE.into()),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some(tree_sitter_cpp::LANGUAGE.into()),
        "java" => Some(tree_sitter_java::LANGUAGE.into()),
        _ => None,
    }
}

pub fn is_supported_ext(ext: &str) -> bool {
    language_for_ext(ext).is_some()
}

fn is_go(ext: &str) -> bool {
    ext == "go"
}
fn is_rust(ext: &str) -> bool {
    ext == "rs"
}

fn classify_definition(kind: &str) -> Option<TagKind> {
    match kind {
        "function_item" | "function_declaration" | "function_definition" => Some(TagKind::FunctionName),
        "method_definition" | "method_declaration" => Some(TagKind::MethodName),
        "struct_item" | "struct_specifier" | "class_declaration" | "class_definition" | "class_specifier" => {
            Some(TagKind::ClassName)
        }
        "enum_item" | "enum_specifier" | "enum_declaration" | "trait_item" | "interface_declaration"
        | "impl_item" => Some(TagKind::ClassName),
        "const_item" | "static_item" | "let_declaration" | "variable_declarator" => Some(TagKind::VariableName),
        "type_item" | "type_alias_declaration" | "type_spec" => Some(TagKind::VariableName),
        _ => None,
    }
}

fn is_import_node(kind: &str) -> bool {
    matches!(
        kind,
        "use_declaration"
            | "import_statement"
            | "import_from_statement"
            | "import_declaration"
            | "import_spec"
            | "preproc_include"
    )
}

fn is_call_node(kind: &str) -> bool {
    matches!(kind, "call_expression" | "call" | "method_invocation" | "function_call")
}

fn extract_name(node: &Node, source: &[u8], ext: &str) -> Option<String> {
    for field in ["name", "type"] {
        if let Some(name_node) = node.child_by_field_name(field) {
            if let Ok(text) = name_node.utf8_text(source) {
                let name = text.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }

    if node.kind() == "impl_item" && is_rust(ext) {
        if let Some(type_node) = node.child_by_field_name("type") {
            if let Ok(text) = type_node.utf8_text(source) {
                return Some(text.trim().to_string());
            }
        }
    }

    if node.kind() == "type_spec" && is_go(ext) {
        if let Some(child) = node.named_child(0) {
            if let Ok(text) = child.utf8_text(source) {
                return Some(text.trim().to_string());
            }
        }
    }

    if node.kind() == "function_definition" || node.kind() == "function_item" {
        if let Some(decl) = node.child_by_field_name("declarator") {
            if let Some(name_node) = decl.child_by_field_name("declarator") {
                if let Ok(text) = name_node.utf8_text(source) {
                    return Some(text.trim().to_string());
                }
            }
            if let Ok(text) = decl.utf8_text(source) {
                let s = text.trim();
                return Some(s.find('(').map(|p| s[..p].trim().to_string()).unwrap_or_else(|| s.to_string()));
            }
        }
    }

    None
}

/// Best-effort callee name for a call node: the function/method field if
/// present, else the leading identifier in the node's own text.
fn extract_callee_name(node: &Node, source: &[u8]) -> Option<String> {
    for field in ["function", "name", "method"] {
        if let Some(n) = node.child_by_field_name(field) {
            if let Ok(text) = n.utf8_text(source) {
                let trimmed = text.trim();
                let last_segment = trimmed.rsplit(['.', ':']).next().unwrap_or(trimmed);
                if !last_segment.is_empty() {
                    return Some(last_segment.to_string());
                }
            }
        }
    }
    let text = node.utf8_text(source).ok()?;
    let head = text.split('(').next()?.trim();
    let last_segment = head.rsplit(['.', ':']).next().unwrap_or(head);
    if last_segment.is_empty() || !last_segment.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false)
    {
        return None;
    }
    Some(last_segment.to_string())
}

struct Walker<'a> {
    source: &'a [u8],
    ext: &'a str,
    file: &'a str,
    tags: Vec<Tag>,
    in_class_depth: usize,
}

impl<'a> Walker<'a> {
    fn walk(&mut self, node: &Node) {
        let kind = node.kind();

        if let Some(mut tag_kind) = classify_definition(kind) {
            let name = extract_name(node, self.source, self.ext).unwrap_or_default();
            if !name.is_empty() {
                let start = node.start_position();
                let end = node.end_position();
                if self.in_class_depth > 0 && matches!(tag_kind, TagKind::FunctionName) && !is_go(self.ext) {
                    tag_kind = TagKind::MethodName;
                }
                let mut tag = Tag::new(name, tag_kind, self.file, start.row + 1, start.column)
                    .with_span(end.row + 1, end.column);
                tag.column = start.column;
                self.tags.push(tag);
            }
            let nests_class = matches!(kind, "class_declaration" | "class_definition" | "class_specifier" | "impl_item");
            if nests_class {
                self.in_class_depth += 1;
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                self.walk(&child);
            }
            if nests_class {
                self.in_class_depth -= 1;
            }
            return;
        }

        if is_import_node(kind) {
            if let Ok(text) = node.utf8_text(self.source) {
                let start = node.start_position();
                let name = text.split_whitespace().collect::<Vec<_>>().join(" ");
                let name = if name.len() > 120 { name[..120].to_string() } else { name };
                self.tags.push(Tag::new(name, TagKind::ImportReference, self.file, start.row + 1, start.column));
            }
            return;
        }

        if is_call_node(kind) {
            if let Some(callee) = extract_callee_name(node, self.source) {
                let start = node.start_position();
                self.tags.push(Tag::new(callee, TagKind::CallReference, self.file, start.row + 1, start.column));
            }
        }

        if kind == "comment" || kind == "line_comment" || kind == "block_comment" {
            let start = node.start_position();
            if let Ok(text) = node.utf8_text(self.source) {
                self.tags.push(Tag::new(
                    text.chars().take(80).collect::<String>(),
                    TagKind::Comment,
                    self.file,
                    start.row + 1,
                    start.column,
                ));
            }
            return;
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(&child);
        }
    }
}

/// Parses `content` as `ext` and returns its tags. Returns an empty list for
/// an unsupported extension or a file tree-sitter can't even partially parse.
pub fn parse(content: &str, ext: &str, rel_path: &str) -> Vec<Tag> {
    let Some(lang) = language_for_ext(ext) else {
        return Vec::new();
    };
    let mut parser = Parser::new();
    if parser.set_language(&lang).is_err() {
        return Vec::new();
    }
    let Some(tree) = parser.parse(content, None) else {
        return Vec::new();
    };

    let mut walker = Walker { source: content.as_bytes(), ext, file: rel_path, tags: Vec::new(), in_class_depth: 0 };
    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        walker.walk(&child);
    }
    walker.tags
}

/// Reads and parses a file from disk. Non-UTF-8 content is lossily decoded
/// per §4.2 step 2; I/O errors yield an empty tag list (the caller records a
/// warning).
pub fn parse_file(abs_path: &std::path::Path, rel_path: &str) -> Option<Vec<Tag>> {
    let ext = abs_path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
    if !is_supported_ext(&ext) {
        return None;
    }
    let bytes = std::fs::read(abs_path).ok()?;
    let content = String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    Some(parse(&content, &ext, rel_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rust_function_and_struct() {
        let src = "pub fn greet(name: &str) -> String {\n  name.to_string()\n}\n\nstruct Config { name: String }\n";
        let tags = parse(src, "rs", "lib.rs");
        assert!(tags.iter().any(|t| t.name == "greet" && t.kind == TagKind::FunctionName));
        assert!(tags.iter().any(|t| t.name == "Config" && t.kind == TagKind::ClassName));
    }

    #[test]
    fn parses_python_class_and_methods() {
        let src = "class UserAuth:\n    def authenticate(self):\n        pass\n";
        let tags = parse(src, "py", "auth.py");
        assert!(tags.iter().any(|t| t.name == "UserAuth" && t.kind == TagKind::ClassName));
        assert!(tags.iter().any(|t| t.name == "authenticate" && t.kind == TagKind::MethodName));
    }

    #[test]
    fn extracts_call_references() {
        let src = "def user_auth():\n    authenticate_user('', '')\n";
        let tags = parse(src, "py", "auth.py");
        assert!(tags.iter().any(|t| t.name == "authenticate_user" && t.kind == TagKind::CallReference));
    }

    #[test]
    fn extracts_imports() {
        let src = "import os\nfrom foo import bar\n";
        let tags = parse(src, "py", "m.py");
        assert!(tags.iter().any(|t| t.kind == TagKind::ImportReference));
    }

    #[test]
    fn unsupported_extension_returns_empty() {
        assert!(parse("hello", "md", "readme.md").is_empty());
    }

    #[test]
    fn partial_syntax_errors_still_yield_tags() {
        let src = "fn good() {}\nfn broken( {\n";
        let tags = parse(src, "rs", "lib.rs");
        assert!(tags.iter().any(|t| t.name == "good"));
    }

    #[test]
    fn tag_spans_are_well_formed() {
        let src = "fn foo() {\n  1 + 1;\n}\n";
        let tags = parse(src, "rs", "lib.rs");
        for tag in &tags {
            assert!(tag.is_well_formed());
        }
    }
}
