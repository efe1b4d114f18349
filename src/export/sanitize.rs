//! Text sanitising for PDF placement.
//!
//! The PDF writer uses the standard Helvetica fonts, which cover printable
//! ASCII only. Model output routinely contains smart quotes, bullets,
//! currency signs, HTML entities, markdown emphasis and the odd emoji;
//! [`sanitize_for_pdf`] maps or strips all of it.
//!
//! ## Rule Order
//!
//! One pass runs these rules in order:
//!
//! 1. Normalise line endings (CRLF / CR → LF)
//! 2. Decode HTML entities (named and numeric)
//! 3. Map characters to ASCII (quotes, dashes, bullets, currency, symbols,
//!    accented Latin letters); drop everything else, emoji included
//! 4. Strip markdown emphasis, inline code, heading markers and links
//! 5. Remove any entity that survived decoding
//! 6. Normalise whitespace
//!
//! The output of a pass is printable ASCII plus `\n`. On such input every
//! rule either leaves the text alone or makes it strictly shorter, so
//! repeating the pass until nothing changes terminates, and the result is
//! idempotent.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Sanitise text for a PDF text operator. Idempotent.
pub fn sanitize_for_pdf(input: &str) -> String {
    let mut current = sanitize_pass(input);
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Aggressive fallback: printable ASCII only, all whitespace collapsed.
pub fn ascii_only(input: &str) -> String {
    let kept: String = input
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| (' '..='~').contains(c))
        .collect();
    RE_SPACES.replace_all(&kept, " ").trim().to_string()
}

fn sanitize_pass(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = decode_entities(&s);
    let s = map_to_ascii(&s);
    let s = strip_markdown(&s);
    let s = RE_ANY_ENTITY.replace_all(&s, "").into_owned();
    normalise_whitespace(&s)
}

// ── Rule 1: Line endings ─────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: HTML entities ────────────────────────────────────────────────

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(nbsp|amp|lt|gt|quot|apos|#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6});").unwrap());

fn decode_entities(input: &str) -> String {
    RE_ENTITY
        .replace_all(input, |caps: &Captures| {
            let name = &caps[1];
            match name {
                "nbsp" => " ".to_string(),
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => {
                    let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        name[1..].parse::<u32>().ok()
                    };
                    code.and_then(char::from_u32)
                        .map(String::from)
                        .unwrap_or_default()
                }
            }
        })
        .into_owned()
}

// ── Rule 3: Character mapping ────────────────────────────────────────────

/// Base letters for U+0100..=U+017F (Latin Extended-A).
const LATIN_EXT_A: &str = concat!(
    "AaAaAa", "CcCcCcCc", "DdDd", "EeEeEeEeEe", "GgGgGgGg", "HhHh", "IiIiIiIiIi", "Ii", "Jj",
    "Kkk", "LlLlLlLlLl", "NnNnNnnNn", "OoOoOo", "Oo", "RrRrRr", "SsSsSsSs", "TtTtTt",
    "UuUuUuUuUuUu", "Ww", "YyY", "ZzZzZz", "s",
);

fn map_char(c: char, out: &mut String) {
    let mapped: &str = match c {
        '\n' => "\n",
        ' '..='~' => {
            out.push(c);
            return;
        }
        '\t' => " ",
        // Quotes and dashes
        '\u{201C}'..='\u{201F}' | '\u{00AB}' | '\u{00BB}' | '\u{2033}' => "\"",
        '\u{2018}'..='\u{201B}' | '\u{2032}' | '\u{00B4}' | '\u{2039}' | '\u{203A}' => "'",
        '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{00AD}' => "-",
        '\u{2026}' => "...",
        // Bullets
        '\u{2022}' | '\u{2023}' | '\u{2043}' | '\u{2219}' | '\u{00B7}' | '\u{25AA}' | '\u{25AB}'
        | '\u{25A0}' | '\u{25A1}' | '\u{25B2}' | '\u{25BA}' | '\u{25B8}' | '\u{25C6}'
        | '\u{25CF}' | '\u{25E6}' => "-",
        // Currency
        '\u{00A3}' | '\u{20A4}' => "GBP",
        '\u{20AC}' => "EUR",
        '\u{00A5}' | '\u{20A5}' => "YEN",
        '\u{00A2}' => "c",
        // Symbols
        '\u{00B1}' => "+/-",
        '\u{00D7}' => "x",
        '\u{00F7}' => "/",
        '\u{00B0}' => "deg",
        '\u{00A9}' => "(c)",
        '\u{00AE}' => "(R)",
        '\u{2122}' => "(TM)",
        '\u{2605}' | '\u{2606}' => "*",
        '\u{00A1}' => "!",
        '\u{00BF}' => "?",
        '\u{00BC}' => "1/4",
        '\u{00BD}' => "1/2",
        '\u{00BE}' => "3/4",
        // Spaces
        '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => " ",
        // Latin-1 letters
        'À'..='Å' => "A",
        'Æ' => "AE",
        'Ç' => "C",
        'È'..='Ë' => "E",
        'Ì'..='Ï' => "I",
        'Ð' => "D",
        'Ñ' => "N",
        'Ò'..='Ö' | 'Ø' => "O",
        'Ù'..='Ü' => "U",
        'Ý' => "Y",
        'Þ' => "Th",
        'ß' => "ss",
        'à'..='å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è'..='ë' => "e",
        'ì'..='ï' => "i",
        'ð' => "d",
        'ñ' => "n",
        'ò'..='ö' | 'ø' => "o",
        'ù'..='ü' => "u",
        'ý' | 'ÿ' => "y",
        'þ' => "th",
        '\u{0100}'..='\u{017F}' => {
            let idx = c as usize - 0x100;
            &LATIN_EXT_A[idx..idx + 1]
        }
        // Arrows, emoji, control characters, other scripts
        _ => "",
    };
    out.push_str(mapped);
}

fn map_to_ascii(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        map_char(c, &mut out);
    }
    out
}

// ── Rule 4: Markdown ─────────────────────────────────────────────────────

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*\n]+)\*\*").unwrap());
static RE_BOLD_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"__([^_\n]+)__").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());
static RE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").unwrap());
static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]\n]+)\]\([^)\n]*\)").unwrap());

fn strip_markdown(input: &str) -> String {
    let s = RE_BOLD.replace_all(input, "$1");
    let s = RE_BOLD_UNDERSCORE.replace_all(&s, "$1");
    let s = RE_ITALIC.replace_all(&s, "$1");
    let s = RE_CODE.replace_all(&s, "$1");
    let s = RE_HEADING.replace_all(&s, "");
    RE_LINK.replace_all(&s, "$1").into_owned()
}

// ── Rule 5: Leftover entities ────────────────────────────────────────────

static RE_ANY_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#?[a-zA-Z0-9]+;").unwrap());

// ── Rule 6: Whitespace ───────────────────────────────────────────────────

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn normalise_whitespace(input: &str) -> String {
    let lines: Vec<String> = input
        .split('\n')
        .map(|line| RE_SPACES.replace_all(line.trim(), " ").into_owned())
        .collect();
    let joined = lines.join("\n");
    RE_BLANK_LINES.replace_all(&joined, "\n\n").trim().to_string()
}

/// `true` when `s` contains only characters the PDF writer can place.
pub fn is_pdf_safe(s: &str) -> bool {
    s.chars().all(|c| c == '\n' || (' '..='~').contains(&c))
}
