//! Text cleanup applied to every field before it leaves the service.

use unicode_normalization::UnicodeNormalization;

/// Strips control characters, flattens line breaks, collapses whitespace and
/// applies NFC.  Idempotent.
pub fn normalize(text: &str) -> String {
    let without_controls: String = text.chars().filter(|ch| !is_stripped_control(*ch)).collect();

    let flattened = without_controls
        .replace("\r\n", " ")
        .replace('\n', " ")
        .replace('\r', " ");

    let collapsed = flattened.split_whitespace().collect::<Vec<_>>().join(" ");

    collapsed.nfc().collect()
}

// C0 controls and DEL, keeping tab, LF and CR.
fn is_stripped_control(ch: char) -> bool {
    let code = ch as u32;
    (code < 32 && !matches!(ch, '\t' | '\n' | '\r')) || code == 127
}
