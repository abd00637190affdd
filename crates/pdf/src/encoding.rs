//! Byte encoding of token text for the standard Helvetica font.

/// Replacement byte for characters WinAnsiEncoding cannot represent.
const REPLACEMENT: u8 = b'?';

/// Characters that WinAnsiEncoding places in 0x80..=0x9F.
const WIN_ANSI_HIGH: &[(char, u8)] = &[
    ('\u{20AC}', 0x80), // €
    ('\u{201A}', 0x82), // ‚
    ('\u{0192}', 0x83), // ƒ
    ('\u{201E}', 0x84), // „
    ('\u{2026}', 0x85), // …
    ('\u{2020}', 0x86), // †
    ('\u{2021}', 0x87), // ‡
    ('\u{02C6}', 0x88), // ˆ
    ('\u{2030}', 0x89), // ‰
    ('\u{0160}', 0x8A), // Š
    ('\u{2039}', 0x8B), // ‹
    ('\u{0152}', 0x8C), // Œ
    ('\u{017D}', 0x8E), // Ž
    ('\u{2018}', 0x91), // ‘
    ('\u{2019}', 0x92), // ’
    ('\u{201C}', 0x93), // “
    ('\u{201D}', 0x94), // ”
    ('\u{2022}', 0x95), // •
    ('\u{2013}', 0x96), // –
    ('\u{2014}', 0x97), // —
    ('\u{02DC}', 0x98), // ˜
    ('\u{2122}', 0x99), // ™
    ('\u{0161}', 0x9A), // š
    ('\u{203A}', 0x9B), // ›
    ('\u{0153}', 0x9C), // œ
    ('\u{017E}', 0x9E), // ž
    ('\u{0178}', 0x9F), // Ÿ
];

/// Encode text as WinAnsiEncoding bytes.
///
/// ASCII and Latin-1 map directly; the typographic characters WinAnsi keeps in
/// 0x80..=0x9F are looked up; anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(encode_char).collect()
}

fn encode_char(c: char) -> u8 {
    match c as u32 {
        0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
        0x09 | 0x0A | 0x0D => b' ',
        _ => WIN_ANSI_HIGH
            .iter()
            .find(|(ch, _)| *ch == c)
            .map(|(_, byte)| *byte)
            .unwrap_or(REPLACEMENT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(encode_win_ansi("Hello (world)"), b"Hello (world)".to_vec());
    }

    #[test]
    fn test_latin1() {
        assert_eq!(encode_win_ansi("Café"), vec![b'C', b'a', b'f', 0xE9]);
    }

    #[test]
    fn test_typographic_quotes_and_dashes() {
        assert_eq!(
            encode_win_ansi("\u{201C}a\u{201D}\u{2014}\u{20AC}"),
            vec![0x93, b'a', 0x94, 0x97, 0x80]
        );
    }

    #[test]
    fn test_unencodable_replaced() {
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
        assert_eq!(encode_win_ansi("\u{0007}"), b"?".to_vec());
    }
}
