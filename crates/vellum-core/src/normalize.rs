//! Markup normalization for content-presence checks and content hashing.
//!
//! The engine treats the body field as opaque rich-text markup, but two
//! decisions depend on what the markup *says*:
//!
//! - a draft with no visible text is never pushed to the store and never
//!   offered for restore, and
//! - snapshot de-duplication compares normalized content, so markup churn
//!   that does not change visible text does not grow the history.
//!
//! Normalization strips tags, decodes the handful of entities editors emit,
//! and collapses whitespace runs to single spaces. It is not an HTML parser
//! and does not need to be: unbalanced markup degrades to over-stripping,
//! which errs on the side of "no content".

/// Entities decoded during normalization. Anything else passes through
/// verbatim (an unknown entity is visible text as far as presence goes).
const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
];

/// Reduce markup to its visible text: tags removed, entities decoded,
/// whitespace collapsed, leading/trailing whitespace trimmed.
#[must_use]
pub fn normalized_text(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    let mut in_tag = false;

    'outer: while let Some(ch) = rest.chars().next() {
        if in_tag {
            rest = &rest[ch.len_utf8()..];
            if ch == '>' {
                in_tag = false;
            }
            continue;
        }

        match ch {
            '<' => {
                in_tag = true;
                rest = &rest[1..];
            }
            '&' => {
                for (entity, replacement) in ENTITIES {
                    if let Some(after) = rest.strip_prefix(entity) {
                        out.push_str(replacement);
                        rest = after;
                        continue 'outer;
                    }
                }
                out.push('&');
                rest = &rest[1..];
            }
            _ => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }

    collapse_whitespace(&out)
}

/// Whether markup carries no visible text at all (empty, or placeholder
/// structure like `<p><br></p>`).
#[must_use]
pub fn is_blank_markup(markup: &str) -> bool {
    normalized_text(markup).is_empty()
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(ch);
        }
    }

    out
}
