//! Typography rule sets for HTML branches.
//!
//! A typography is a named bundle of macro rebindings plus a number
//! formatter. The macros are installed in the branch's dedicated typography
//! context by `typo.set`, shadowing the plain special characters for that
//! branch only.

use crate::context::{MacroBinding, MacroMap};
use crate::html::{current_html, NBSP};
use crate::special::special_characters;

#[derive(Clone)]
pub struct Typography {
    pub name: &'static str,
    pub macros: MacroMap,
    pub format_number: fn(&str) -> String,
}

pub const TYPOGRAPHY_NAMES: [&str; 3] = ["english", "french", "neutral"];

pub fn find(name: &str) -> Option<Typography> {
    match name {
        "neutral" => Some(neutral()),
        "english" => Some(english()),
        "french" => Some(french()),
        _ => None,
    }
}

/// Language-neutral rules: plain special characters, numbers unchanged.
pub fn neutral() -> Typography {
    Typography {
        name: "neutral",
        macros: special_characters(),
        format_number: format_number_neutral,
    }
}

pub fn english() -> Typography {
    let mut macros = MacroMap::new();
    macros.insert("text.backtick".into(), MacroBinding::append_text("‘"));
    macros.insert("text.apostrophe".into(), MacroBinding::append_text("’"));
    Typography {
        name: "english",
        macros,
        format_number: format_number_english,
    }
}

/// French rules: curly quotes, guillemets padded with non-breaking spaces,
/// and a non-breaking space before double punctuation.
pub fn french() -> Typography {
    let mut macros = MacroMap::new();
    macros.insert("text.backtick".into(), MacroBinding::append_text("‘"));
    macros.insert("text.apostrophe".into(), MacroBinding::append_text("’"));
    macros.insert(
        "text.guillemet.open".into(),
        MacroBinding::raw("", false, |executor, _| {
            let branch = current_html(executor)?;
            branch.append_line_text("«");
            branch.require_nbsp();
            Ok(())
        }),
    );
    macros.insert(
        "text.guillemet.close".into(),
        MacroBinding::raw("", false, |executor, _| {
            let branch = current_html(executor)?;
            branch.require_nbsp();
            branch.append_line_text("»");
            Ok(())
        }),
    );
    macros.insert(
        "text.punctuation.double".into(),
        MacroBinding::builtin("contents", false, |executor, _, args| {
            let contents = args.text(0);
            if contents.is_empty() {
                return Ok(());
            }
            let branch = current_html(executor)?;
            if !matches!(branch.tail_char(), Some('…') | Some('.')) {
                branch.require_nbsp();
            }
            branch.append_line_text(contents);
            Ok(())
        }),
    );
    Typography {
        name: "french",
        macros,
        format_number: format_number_french,
    }
}

fn format_number_neutral(number: &str) -> String {
    number.to_string()
}

fn format_number_english(number: &str) -> String {
    format_number_custom(number, ",")
}

fn format_number_french(number: &str) -> String {
    let mut sep = String::new();
    sep.push(NBSP);
    format_number_custom(number, &sep)
}

/// Whether `number` looks like a signed decimal number, with `.` or `,` as
/// the decimal separator.
pub fn is_number(number: &str) -> bool {
    parse_number(number).is_some()
}

type ParsedNumber<'a> = (&'a str, &'a str, Option<(&'a str, &'a str)>);

/// Splits a number into sign, integer digits, and optional (separator,
/// decimal digits).
fn parse_number(number: &str) -> Option<ParsedNumber<'_>> {
    let bytes = number.as_bytes();
    let sign_len = usize::from(matches!(bytes.first(), Some(b'+') | Some(b'-')));
    let mut end = sign_len;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let sign = &number[..sign_len];
    let before = &number[sign_len..end];
    if end == bytes.len() {
        return Some((sign, before, None));
    }
    if matches!(bytes[end], b'.' | b',') {
        let decimal_sep = &number[end..end + 1];
        let after = &number[end + 1..];
        if !after.is_empty() && after.bytes().all(|b| b.is_ascii_digit()) {
            return Some((sign, before, Some((decimal_sep, after))));
        }
    }
    None
}

/// Groups digits by threes on both sides of the decimal separator and
/// renders a leading minus as an en-dash. Malformed input is left unchanged.
pub fn format_number_custom(number: &str, thousands_sep: &str) -> String {
    let Some((sign, before, decimal)) = parse_number(number) else {
        return number.to_string();
    };
    let mut text = String::new();
    text.push_str(if sign == "-" { "–" } else { sign });

    // Integer digits group from the right.
    let mut groups = Vec::new();
    let mut group_end = before.len();
    while group_end > 0 {
        let group_start = group_end.saturating_sub(3);
        groups.push(&before[group_start..group_end]);
        group_end = group_start;
    }
    groups.reverse();
    text.push_str(&groups.join(thousands_sep));

    // Decimal digits group from the left.
    if let Some((decimal_sep, after)) = decimal {
        text.push_str(decimal_sep);
        let mut group_start = 0;
        while group_start < after.len() {
            if group_start > 0 {
                text.push_str(thousands_sep);
            }
            let group_end = (group_start + 3).min(after.len());
            text.push_str(&after[group_start..group_end]);
            group_start = group_end;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_numbers_unchanged() {
        assert_eq!((neutral().format_number)("1234567.89"), "1234567.89");
    }

    #[test]
    fn english_number_grouping() {
        let format = english().format_number;
        assert_eq!(format("1"), "1");
        assert_eq!(format("12"), "12");
        assert_eq!(format("123"), "123");
        assert_eq!(format("1234"), "1,234");
        assert_eq!(format("1234567"), "1,234,567");
        assert_eq!(format("1234.5678"), "1,234.567,8");
        assert_eq!(format("+1234"), "+1,234");
    }

    #[test]
    fn minus_becomes_en_dash() {
        assert_eq!(format_number_custom("-1234", ","), "–1,234");
    }

    #[test]
    fn french_uses_nbsp_separator() {
        assert_eq!((french().format_number)("1234"), "1\u{a0}234");
    }

    #[test]
    fn malformed_numbers_pass_through() {
        assert_eq!(format_number_custom("12a34", ","), "12a34");
        assert_eq!(format_number_custom("1.2.3", ","), "1.2.3");
        assert_eq!(format_number_custom("1.", ","), "1.");
    }

    #[test]
    fn comma_decimal_separator() {
        assert_eq!(format_number_custom("1234,5", "."), "1.234,5");
    }

    #[test]
    fn number_validation() {
        assert!(is_number("42"));
        assert!(is_number("-42"));
        assert!(is_number("+1,5"));
        assert!(is_number(""));
        assert!(!is_number("x"));
        assert!(!is_number("1..2"));
    }
}
