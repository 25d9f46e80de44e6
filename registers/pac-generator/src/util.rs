// Licensed under the Apache-2.0 license

//! Identifier conversion and literal formatting for emitted Rust code.
//!
//! SoC builders name things in whatever case their HDL uses (`UART`,
//! `ev_pending`, `SPIFlash`). Everything that ends up as a Rust identifier
//! goes through [`snake_case`] (modules, struct fields, constants) or
//! [`camel_case`] (bitfield types and field names) first, so validation and
//! emission agree on what counts as a duplicate.

/// Keywords (strict and reserved) that cannot be used as plain identifiers.
const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Splits a name into words at punctuation, whitespace and lower-to-upper
/// case transitions. Runs of capitals stay one word.
fn words(name: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = None;
    let mut prev: Option<char> = None;
    for (i, c) in name.char_indices() {
        if !c.is_ascii_alphanumeric() {
            if let Some(s) = start.take() {
                words.push(&name[s..i]);
            }
        } else {
            let boundary = c.is_ascii_uppercase()
                && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit());
            match start {
                Some(s) if boundary => {
                    words.push(&name[s..i]);
                    start = Some(i);
                }
                None => start = Some(i),
                _ => {}
            }
        }
        prev = Some(c);
    }
    if let Some(s) = start {
        words.push(&name[s..]);
    }
    words
}

/// Makes `ident` usable as a Rust identifier: a leading digit gets an
/// underscore prefix, a keyword gets an underscore suffix.
fn escape(mut ident: String) -> String {
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if KEYWORDS.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// Converts a name to snake_case.
///
/// # Examples
/// ```
/// use litex_pac_generator::util::snake_case;
/// assert_eq!(snake_case("EvPending"), "ev_pending");
/// assert_eq!(snake_case("UART"), "uart");
/// ```
pub fn snake_case(name: &str) -> String {
    escape(words(name).join("_").to_ascii_lowercase())
}

/// Converts a name to CamelCase.
///
/// # Examples
/// ```
/// use litex_pac_generator::util::camel_case;
/// assert_eq!(camel_case("ev_pending"), "EvPending");
/// assert_eq!(camel_case("RXTX"), "Rxtx");
/// ```
pub fn camel_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for word in words(name) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            result.push(first.to_ascii_uppercase());
            result.extend(chars.map(|c| c.to_ascii_lowercase()));
        }
    }
    escape(result)
}

/// Converts a name to SCREAMING_SNAKE_CASE, for constants.
pub fn upper_snake_case(name: &str) -> String {
    snake_case(name).trim_end_matches('_').to_ascii_uppercase()
}

/// Formats an integer as a Rust literal, hex with `_` every four digits.
/// Single digits stay decimal.
///
/// # Examples
/// ```
/// use litex_pac_generator::util::hex_const;
/// assert_eq!(hex_const(5), "5");
/// assert_eq!(hex_const(0xa000), "0xa000");
/// assert_eq!(hex_const(0x82000000), "0x8200_0000");
/// ```
pub fn hex_const(val: u64) -> String {
    if val < 10 {
        return val.to_string();
    }
    let digits = format!("{val:x}");
    let lead = match digits.len() % 4 {
        0 => 4,
        n => n,
    };
    let mut out = format!("0x{}", &digits[..lead]);
    for group in digits.as_bytes()[lead..].chunks(4) {
        out.push('_');
        out.extend(group.iter().map(|&b| char::from(b)));
    }
    out
}

/// Splits an integer literal into its digits and radix.
///
/// Accepts `0x`/`0X` hex, `0b`/`0B` binary, leading-zero octal and decimal,
/// the spellings SVD files use.
pub fn split_radix(value: &str) -> (&str, u32) {
    if let Some(v) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        (v, 16)
    } else if let Some(v) = value.strip_prefix("0b").or_else(|| value.strip_prefix("0B")) {
        (v, 2)
    } else if value.starts_with('0') && value != "0" {
        (value.trim_start_matches('0'), 8)
    } else {
        (value, 10)
    }
}

/// Parses an integer literal in any of the radixes [`split_radix`] knows.
pub fn parse_int(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    let (digits, radix) = split_radix(trimmed);
    let digits = digits.replace('_', "");
    if digits.is_empty() {
        // "00" and friends
        return (radix == 8).then_some(0);
    }
    u64::from_str_radix(&digits, radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words() {
        assert_eq!(words("ev_pending"), ["ev", "pending"]);
        assert_eq!(words("EvPending"), ["Ev", "Pending"]);
        assert_eq!(words("SPIFlash"), ["SPIFlash"]);
        assert_eq!(words("timer0Value"), ["timer0", "Value"]);
        assert_eq!(words("__a--b  "), ["a", "b"]);
        assert!(words("--").is_empty());
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("EvPending"), "ev_pending");
        assert_eq!(snake_case("UART"), "uart");
        assert_eq!(snake_case("main_ram"), "main_ram");
        assert_eq!(snake_case("spi-flash"), "spi_flash");
        assert_eq!(snake_case("IDENTIFIER_MEM"), "identifier_mem");
        assert_eq!(snake_case("0dac"), "_0dac");
        assert_eq!(snake_case("type"), "type_");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("ev_pending"), "EvPending");
        assert_eq!(camel_case("EvPending"), "EvPending");
        assert_eq!(camel_case("RXTX"), "Rxtx");
        assert_eq!(camel_case("i2c_ctrl"), "I2cCtrl");
        assert_eq!(camel_case("TIMER0"), "Timer0");
        assert_eq!(camel_case("self"), "Self_");
    }

    #[test]
    fn test_upper_snake_case() {
        assert_eq!(upper_snake_case("main_ram"), "MAIN_RAM");
        assert_eq!(upper_snake_case("Uart"), "UART");
        assert_eq!(upper_snake_case("type"), "TYPE");
    }

    #[test]
    fn test_hex_const() {
        assert_eq!(hex_const(0), "0");
        assert_eq!(hex_const(9), "9");
        assert_eq!(hex_const(10), "0xa");
        assert_eq!(hex_const(0x1234), "0x1234");
        assert_eq!(hex_const(0x12345), "0x1_2345");
        assert_eq!(hex_const(0x82000000), "0x8200_0000");
        assert_eq!(hex_const(u64::MAX), "0xffff_ffff_ffff_ffff");
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0x82000000"), Some(0x8200_0000));
        assert_eq!(parse_int("0XA000"), Some(0xa000));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("010"), Some(8));
        assert_eq!(parse_int("00"), Some(0));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int(" 32 "), Some(32));
        assert_eq!(parse_int("0x8000_0000"), Some(0x8000_0000));
        assert_eq!(parse_int("0xzz"), None);
        assert_eq!(parse_int(""), None);
    }
}
