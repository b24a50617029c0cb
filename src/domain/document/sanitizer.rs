//! Free-text sanitization.
//!
//! Every text field is stripped of markup before a document becomes usable.
//! Script and style elements are removed together with their content; every
//! other tag is dropped while its text is kept. The result is plain text:
//! a `<` that does not open a tag survives as a literal character, and
//! renderers that emit markup escape it themselves.

use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use once_cell::sync::Lazy;

/// Elements removed together with their content.
const CLEAN_CONTENT_TAGS: [&str; 4] = ["script", "style", "iframe", "object"];

/// Elements that never take a closing tag.
const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

static TEXT_SANITIZER: Lazy<AmmoniaBuilder<'static>> = Lazy::new(build_text_sanitizer);

fn build_text_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    builder.tags(HashSet::new());
    builder.clean_content_tags(HashSet::from(CLEAN_CONTENT_TAGS));
    builder
}

/// Strips markup from a single text value.
///
/// Only real tags are parsed: a closing tag, a comment, a void element, a
/// script-class element, or an opening tag whose closing tag appears later.
/// Any other `<` is plain text, so `a<b and c>d` keeps every character.
pub fn sanitize_text(input: &str) -> String {
    if !input.contains(['<', '>', '&']) {
        return input.to_string();
    }
    let cleaned = TEXT_SANITIZER.clean(&escape_stray_angles(input)).to_string();
    decode_entities(&cleaned)
}

/// Entity-escapes every `<` that does not open markup.
fn escape_stray_angles(input: &str) -> String {
    let lowered = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    for (i, c) in input.char_indices() {
        if c == '<' && !opens_markup(&lowered, i) {
            out.push_str("&lt;");
        } else {
            out.push(c);
        }
    }
    out
}

/// Whether the `<` at byte `at` of the lower-cased text starts markup.
fn opens_markup(lowered: &str, at: usize) -> bool {
    let rest = &lowered[at + 1..];
    if rest.starts_with("!--") {
        return true;
    }
    let (closing, rest) = match rest.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let name_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if name_len == 0 || !rest.as_bytes()[0].is_ascii_alphabetic() {
        return false;
    }
    let name = &rest[..name_len];
    let terminated = matches!(
        rest.as_bytes().get(name_len),
        None | Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r')
    );
    if !terminated {
        return false;
    }
    if closing || CLEAN_CONTENT_TAGS.contains(&name) || VOID_TAGS.contains(&name) {
        return true;
    }
    lowered[at..].contains(&format!("</{}", name))
}

/// Turns the sanitizer's HTML serialization back into plain text.
///
/// A `<` that would spell out a script-class tag stays escaped so that
/// entity-encoded input cannot smuggle one through.
fn decode_entities(cleaned: &str) -> String {
    let cleaned = cleaned.replace("&gt;", ">").replace("&nbsp;", "\u{a0}");
    let mut out = String::with_capacity(cleaned.len());
    let mut rest = cleaned.as_str();
    while let Some(pos) = rest.find("&lt;") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 4..];
        if spells_script_tag(after) {
            out.push_str("&lt;");
        } else {
            out.push('<');
        }
        rest = after;
    }
    out.push_str(rest);
    out.replace("&amp;", "&")
}

fn spells_script_tag(after: &str) -> bool {
    let lowered = after.to_ascii_lowercase();
    let name = lowered.strip_prefix('/').unwrap_or(&lowered);
    CLEAN_CONTENT_TAGS.iter().any(|tag| name.starts_with(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(sanitize_text("Hello world"), "Hello world");
    }

    #[test]
    fn script_elements_are_removed_with_content() {
        let cleaned = sanitize_text("Intro<script>alert('x')</script> done");
        assert!(!cleaned.contains("<script>"));
        assert!(!cleaned.contains("alert"));
        assert!(cleaned.starts_with("Intro"));
    }

    #[test]
    fn ordinary_tags_are_stripped_but_text_kept() {
        assert_eq!(sanitize_text("<b>bold</b> move"), "bold move");
        assert_eq!(sanitize_text("line<br>break"), "linebreak");
    }

    #[test]
    fn quote_prefix_survives() {
        assert_eq!(sanitize_text("> quoted line"), "> quoted line");
    }

    #[test]
    fn ampersands_survive() {
        assert_eq!(sanitize_text("Tom & Jerry"), "Tom & Jerry");
    }

    #[test]
    fn comparison_is_kept_as_plain_text() {
        assert_eq!(sanitize_text("if x < y then done"), "if x < y then done");
    }

    #[test]
    fn unclosed_tag_lookalike_keeps_its_text() {
        assert_eq!(sanitize_text("a<b and c>d rest"), "a<b and c>d rest");
    }

    #[test]
    fn encoded_script_tag_is_not_reconstructed() {
        let cleaned = sanitize_text("&lt;script&gt;alert(1)&lt;/script&gt;");
        assert!(!cleaned.to_ascii_lowercase().contains("<script"));
        assert!(!cleaned.to_ascii_lowercase().contains("</script"));
    }

    #[test]
    fn unclosed_script_tag_is_still_removed() {
        let cleaned = sanitize_text("before <script>alert(1)");
        assert!(!cleaned.contains("<script"));
        assert!(!cleaned.contains("alert"));
    }

    #[test]
    fn multiline_text_keeps_line_structure() {
        let cleaned = sanitize_text("- one\n- two <i>x</i>");
        assert_eq!(cleaned.lines().count(), 2);
    }
}
