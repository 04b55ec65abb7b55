//! East-Asian-Width classification and combining-mark detection.
//!
//! Baseline Narrow/Wide/zero-width comes from `unicode_width` (the teacher's
//! own `terminal::state` drew its width decisions from the same crate); the
//! Ambiguous bucket `unicode_width` doesn't expose on its `width()` method is
//! recovered here by comparing it against `width_cjk()`, which folds
//! Ambiguous into Wide. The combining-mark ranges below are grounded on the
//! range-table technique in `freddiehaddad-oxidized`'s `core-text/src/width.rs`
//! (small hand-maintained range checks rather than a full Unicode property
//! crate), since `unicode_width` doesn't classify combining marks at all.

use unicode_width::UnicodeWidthChar;

/// Effective East-Asian-Width bucket once ambiguous-width mode has been
/// resolved to a concrete visual width is just `f32`; this enum is the
/// pre-resolution classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eaw {
    Narrow,
    Wide,
    Ambiguous,
}

/// Classify a code point's East-Asian-Width property into the three buckets
/// this system distinguishes (Neutral/Narrow/Halfwidth collapse to Narrow;
/// Wide/Fullwidth collapse to Wide; Ambiguous stays distinct).
pub fn classify(c: char) -> Eaw {
    let narrow_width = c.width().unwrap_or(0);
    let cjk_width = c.width_cjk().unwrap_or(0);
    if cjk_width >= 2 && narrow_width < 2 {
        Eaw::Ambiguous
    } else if narrow_width >= 2 {
        Eaw::Wide
    } else if is_ambiguous(c as u32) {
        // unicode_width folds a handful of legacy-fallback code points (e.g.
        // private-use-area box-drawing substitutes) into narrow on both
        // methods; the pack's ambiguous-width terminals still treat them as
        // ambiguous, so the hand-maintained table catches what the crate
        // collapses away.
        Eaw::Ambiguous
    } else {
        Eaw::Narrow
    }
}

fn is_ambiguous(cp: u32) -> bool {
    matches!(cp,
        0x00A1 | 0x00A4 | 0x00A7 | 0x00A8 | 0x00AA | 0x00AD | 0x00AE
        | 0x00B0..=0x00B4 | 0x00B6..=0x00BA | 0x00BC..=0x00BF
        | 0x00C6 | 0x00D0 | 0x00D7 | 0x00D8 | 0x00DE..=0x00E1
        | 0x00E6 | 0x00E8..=0x00EA | 0x00EC | 0x00ED | 0x00F0
        | 0x00F2 | 0x00F3 | 0x00F7..=0x00FA | 0x00FC | 0x00FE
        | 0x0101 | 0x0111 | 0x0113 | 0x011B | 0x0126 | 0x0127
        | 0x012B | 0x0131..=0x0133 | 0x0138 | 0x013F..=0x0142
        | 0x0144 | 0x0148..=0x014B | 0x014D | 0x0152 | 0x0153
        | 0x0166 | 0x0167 | 0x016B | 0x01CE | 0x01D0 | 0x01D2
        | 0x01D4 | 0x01D6 | 0x01D8 | 0x01DA | 0x01DC
        | 0x0251 | 0x0261 | 0x02C4 | 0x02C7 | 0x02C9..=0x02CB
        | 0x02CD | 0x02D0 | 0x02D8..=0x02DB | 0x02DD | 0x02DF
        | 0x0391..=0x03A9 | 0x03B1..=0x03C9 // Greek
        | 0x0401 | 0x0410..=0x044F | 0x0451 // Cyrillic
        | 0x2010 | 0x2013..=0x2016 | 0x2018 | 0x2019 | 0x201C
        | 0x201D | 0x2020..=0x2022 | 0x2024..=0x2027 | 0x2030
        | 0x2032 | 0x2033 | 0x2035 | 0x203B | 0x203E | 0x2074
        | 0x207F | 0x2081..=0x2084 | 0x20AC | 0x2103 | 0x2105
        | 0x2109 | 0x2113 | 0x2116 | 0x2121 | 0x2122 | 0x2126
        | 0x212B | 0x2153 | 0x2154 | 0x215B..=0x215E
        | 0x2160..=0x216B | 0x2170..=0x2179 | 0x2189
        | 0x2190..=0x2199 | 0x21B8 | 0x21B9 | 0x21D2 | 0x21D4
        | 0x21E7 | 0x2200 | 0x2202 | 0x2203 | 0x2207 | 0x2208
        | 0x220B | 0x220F | 0x2211 | 0x2215 | 0x221A
        | 0x221D..=0x2220 | 0x2223 | 0x2225 | 0x2227..=0x222C
        | 0x222E | 0x2234..=0x2237 | 0x223C | 0x223D | 0x2248
        | 0x224C | 0x2252 | 0x2260 | 0x2261 | 0x2264..=0x2267
        | 0x226A | 0x226B | 0x226E | 0x226F | 0x2282 | 0x2283
        | 0x2286 | 0x2287 | 0x2295 | 0x2299 | 0x22A5 | 0x22BF
        | 0x2312 | 0x2460..=0x24FF // circled digits/numbers
        | 0x2500..=0x2595 // box drawing / block elements
        | 0x25A0..=0x25FC // geometric shapes
        | 0x2605 | 0x2606 | 0x2609 | 0x260E | 0x260F
        | 0x2614 | 0x2615 | 0x261C | 0x261E | 0x2640 | 0x2642
        | 0x2660..=0x266F // card/music symbols
        | 0x273D | 0x2757 | 0x2776..=0x277F
        | 0xE000..=0xF8FF // private use area (many legacy CJK fonts map box-drawing fallbacks here)
        | 0xFFFD
    )
}

/// Combining-mark ranges: Combining Diacritical Marks, Hebrew points, Arabic
/// marks, Devanagari/Bengali signs, Korean Jungseong/Jongseong, variation
/// selectors, ZWJ/ZWNJ.
pub fn is_combining_mark(c: char) -> bool {
    let cp = c as u32;
    matches!(cp,
        0x0300..=0x036F // Combining Diacritical Marks
        | 0x0483..=0x0489 // Cyrillic combining
        | 0x0591..=0x05BD | 0x05BF | 0x05C1 | 0x05C2 | 0x05C4 | 0x05C5 | 0x05C7 // Hebrew points
        | 0x0610..=0x061A | 0x064B..=0x065F | 0x0670 // Arabic marks
        | 0x06D6..=0x06DC | 0x06DF..=0x06E4 | 0x06E7 | 0x06E8 | 0x06EA..=0x06ED
        | 0x0900..=0x0903 | 0x093A..=0x093C | 0x093E..=0x094F | 0x0951..=0x0957 // Devanagari
        | 0x0981..=0x0983 | 0x09BC | 0x09BE..=0x09C4 | 0x09C7 | 0x09C8 | 0x09CB..=0x09CD | 0x09D7 // Bengali
        | 0x1160..=0x11A7 // Hangul Jungseong
        | 0x11A8..=0x11FF // Hangul Jongseong
        | 0x200D // ZWJ
        | 0x200C // ZWNJ
        | 0xFE00..=0xFE0F // variation selectors
        | 0x1AB0..=0x1AFF
        | 0x1DC0..=0x1DFF
        | 0x20D0..=0x20FF // combining diacritical marks for symbols
        | 0xFE20..=0xFE2F // combining half marks
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_narrow() {
        assert_eq!(classify('a'), Eaw::Narrow);
    }

    #[test]
    fn cjk_is_wide() {
        assert_eq!(classify('界'), Eaw::Wide);
    }

    #[test]
    fn degree_sign_is_ambiguous() {
        assert_eq!(classify('\u{00B0}'), Eaw::Ambiguous);
    }

    #[test]
    fn acute_accent_is_combining() {
        assert!(is_combining_mark('\u{0301}'));
        assert!(!is_combining_mark('A'));
    }

    #[test]
    fn zwj_is_combining() {
        assert!(is_combining_mark('\u{200D}'));
    }
}
