//! Text normalization applied to every source line before prompt construction.
//!
//! Runs Unicode NFC composition first, then a fixed fold table that maps
//! fullwidth Latin letters/digits to their ASCII counterparts and halfwidth
//! katakana to the standard fullwidth forms. Characters outside the table
//! pass through unchanged, so the transform is idempotent.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

// Halfwidth katakana, ordered U+FF66..U+FF9F.
const HALFWIDTH_KATAKANA: &str = "ｦｧｨｩｪｫｬｭｮｯｰｱｲｳｴｵｶｷｸｹｺｻｼｽｾｿﾀﾁﾂﾃﾄﾅﾆﾇﾈﾉﾊﾋﾌﾍﾎﾏﾐﾑﾒﾓﾔﾕﾖﾗﾘﾙﾚﾛﾜﾝﾞﾟ";
const FULLWIDTH_KATAKANA: &str = "ヲァィゥェォャュョッーアイウエオカキクケコサシスセソタチツテトナニヌネノハヒフヘホマミムメモヤユヨラリルレロワン゛゜";

static FOLD_TABLE: Lazy<HashMap<char, char>> = Lazy::new(|| {
    let mut table = HashMap::new();

    // Fullwidth A-Z, a-z, 0-9 sit at a fixed offset from their ASCII forms.
    let fullwidth_ranges = [(0xFF21u32, 0xFF3A), (0xFF41, 0xFF5A), (0xFF10, 0xFF19)];
    for (start, end) in fullwidth_ranges {
        for code in start..=end {
            let from = char::from_u32(code).expect("fullwidth code point");
            let to = char::from_u32(code - 0xFEE0).expect("ascii code point");
            table.insert(from, to);
        }
    }

    for (from, to) in HALFWIDTH_KATAKANA.chars().zip(FULLWIDTH_KATAKANA.chars()) {
        table.insert(from, to);
    }

    table
});

/// Normalize a source line: NFC composition, then the fold table.
pub fn normalize(text: &str) -> String {
    text.nfc()
        .map(|c| FOLD_TABLE.get(&c).copied().unwrap_or(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_fullwidth_digits_and_letters() {
        assert_eq!(normalize("０１２ＡＢａｂ"), "012ABab");
    }

    #[test]
    fn folds_halfwidth_katakana() {
        assert_eq!(normalize("ｱｲｳｴｵ"), "アイウエオ");
        assert_eq!(normalize("ﾊﾟｰﾃｨ"), normalize(&normalize("ﾊﾟｰﾃｨ")));
    }

    #[test]
    fn passes_through_unmapped_characters() {
        assert_eq!(normalize("Hello, 世界! {0}"), "Hello, 世界! {0}");
    }

    #[test]
    fn is_idempotent() {
        let samples = ["ＡＢＣ１２３", "ｶﾞｷﾞｸﾞ", "plain ascii", "改行\nあり", ""];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn applies_nfc_composition() {
        // "e" + combining acute accent composes to a single code point.
        let decomposed = "e\u{0301}";
        assert_eq!(normalize(decomposed), "\u{00E9}");
    }
}
