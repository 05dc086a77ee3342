use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string, accounting for CJK double-width, emoji, etc.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Terminal-safe rendering of one source line: tabs and other control
/// characters become a single space so every char occupies at least one cell.
pub(crate) fn visible_line(s: &str) -> String {
    s.chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect()
}

/// Display columns taken by the first `chars` characters of `line` once made
/// visible. Used to place the editor cursor.
pub(crate) fn column_of(line: &str, chars: usize) -> usize {
    line.chars()
        .take(chars)
        .map(|ch| if ch.is_control() { 1 } else { ch.width().unwrap_or(0) })
        .sum()
}

/// Cut a string to at most `width` display columns, no marker.
pub(crate) fn clip_display(s: &str, width: usize) -> &str {
    let mut used = 0;
    for (i, ch) in s.char_indices() {
        let cw = ch.width().unwrap_or(0);
        if used + cw > width {
            return &s[..i];
        }
        used += cw;
    }
    s
}

/// Truncate to `width` display columns, ending in ".." when cut.
pub(crate) fn truncate_display(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    if width < 3 {
        return clip_display(s, width).to_string();
    }
    format!("{}..", clip_display(s, width - 2))
}

/// Pad or truncate a string to exactly `width` display columns.
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    let t = truncate_display(s, width);
    let pad = width.saturating_sub(display_width(&t));
    format!("{}{}", t, " ".repeat(pad))
}
