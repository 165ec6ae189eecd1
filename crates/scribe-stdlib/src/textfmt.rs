//! Case conversion and number spelling macros.

use scribe::context::{MacroBinding, MacroMap};
use scribe::error::InternalError;

pub(crate) fn register(macros: &mut MacroMap) {
    macros.insert(
        "case.lower".to_string(),
        MacroBinding::builtin("text", true, |executor, _, args| {
            executor.append_text(&args.text(0).to_lowercase())?;
            Ok(())
        }),
    );
    macros.insert(
        "case.upper".to_string(),
        MacroBinding::builtin("text", true, |executor, _, args| {
            executor.append_text(&args.text(0).to_uppercase())?;
            Ok(())
        }),
    );
    macros.insert(
        "alpha.latin".to_string(),
        MacroBinding::builtin("number", true, |executor, _, args| {
            let number = args.text(0);
            let value = parse_arabic(number)?;
            if !(1..=26).contains(&value) {
                return Err(InternalError::new(format!(
                    "unsupported number for conversion to latin letter: {number}"
                ))
                .into());
            }
            let letter = char::from(b'A' + (value - 1) as u8);
            executor.append_text(&letter.to_string())?;
            Ok(())
        }),
    );
    macros.insert(
        "roman".to_string(),
        MacroBinding::builtin("number", true, |executor, _, args| {
            let roman = arabic_to_roman(parse_arabic(args.text(0))?)?;
            executor.append_text(&roman)?;
            Ok(())
        }),
    );
}

fn parse_arabic(text: &str) -> Result<i64, InternalError> {
    text.trim()
        .parse()
        .map_err(|_| InternalError::new(format!("invalid Arabic number: {text}")))
}

const ROMAN_DIGITS: [(i64, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

fn arabic_to_roman(mut value: i64) -> Result<String, InternalError> {
    if !(1..=3999).contains(&value) {
        return Err(InternalError::new(format!(
            "unsupported number for conversion to Roman: {value}"
        )));
    }
    let mut roman = String::new();
    for (arabic, digits) in ROMAN_DIGITS {
        while value >= arabic {
            roman.push_str(digits);
            value -= arabic;
        }
    }
    Ok(roman)
}

#[cfg(test)]
mod tests {
    use scribe::{execution_failure_test, execution_test};

    execution_test!(
        case_conversion,
        crate::built_ins(),
        "$case.upper[mixed Case] $case.lower[mixed Case]",
        "MIXED CASE mixed case"
    );

    execution_test!(latin_letters, crate::built_ins(), "$alpha.latin[1]$alpha.latin[26]", "AZ");

    execution_failure_test!(
        latin_letters_stop_at_z,
        crate::built_ins(),
        "$alpha.latin[27]",
        "/root.psc:1: $alpha.latin: unsupported number for conversion to latin letter: 27"
    );

    // The range error echoes the argument as written, not the parsed value.
    execution_failure_test!(
        latin_letter_errors_echo_the_argument,
        crate::built_ins(),
        "$alpha.latin[+27]",
        "/root.psc:1: $alpha.latin: unsupported number for conversion to latin letter: +27"
    );

    execution_test!(roman_numbers, crate::built_ins(), "$roman[2024] $roman[49]", "MMXXIV XLIX");

    execution_failure_test!(
        roman_numbers_start_at_one,
        crate::built_ins(),
        "$roman[0]",
        "/root.psc:1: $roman: unsupported number for conversion to Roman: 0"
    );

    execution_failure_test!(
        roman_rejects_non_numbers,
        crate::built_ins(),
        "$roman[abc]",
        "/root.psc:1: $roman: invalid Arabic number: abc"
    );
}
