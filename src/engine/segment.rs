use std::ops::Range;

/// One command unit of a compound shell line.
///
/// `range` is the byte range of `text` inside the line it was split from.
/// Whitespace around the separators is not part of the segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub command: &'a str,
    pub text: &'a str,
    pub range: Range<usize>,
}

/// Split `line` at top-level `|`, `||`, `|&`, `&&`, `;`, `&` and newlines.
///
/// Quoted strings, backslash escapes, `$(...)` and backtick substitutions are
/// never split. Redirection ampersands (`2>&1`, `&>file`) and the clobber
/// redirect `>|` stay inside their segment.
pub fn split_segments(line: &str) -> Vec<Segment<'_>> {
    let bytes = line.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    let mut quote: Option<u8> = None;
    let mut subst_depth = 0usize;
    let mut in_backtick = false;

    while i < bytes.len() {
        let b = bytes[i];

        match quote {
            Some(b'\'') => {
                if b == b'\'' {
                    quote = None;
                }
                i += 1;
                continue;
            }
            Some(_) => {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == b'"' {
                    quote = None;
                }
                i += 1;
                continue;
            }
            None => {}
        }

        match b {
            b'\\' => {
                i += 2;
                continue;
            }
            b'\'' | b'"' => quote = Some(b),
            b'`' => in_backtick = !in_backtick,
            b'$' if bytes.get(i + 1) == Some(&b'(') => {
                subst_depth += 1;
                i += 2;
                continue;
            }
            b'(' if subst_depth > 0 => subst_depth += 1,
            b')' if subst_depth > 0 => subst_depth -= 1,
            _ if in_backtick || subst_depth > 0 => {}
            b';' | b'\n' => {
                push_segment(line, start, i, &mut segments);
                i += 1;
                start = i;
                continue;
            }
            b'|' => {
                // `>|` is a redirect, not a pipe
                if i > 0 && bytes[i - 1] == b'>' {
                    i += 1;
                    continue;
                }
                let width = match bytes.get(i + 1) {
                    Some(b'|') | Some(b'&') => 2,
                    _ => 1,
                };
                push_segment(line, start, i, &mut segments);
                i += width;
                start = i;
                continue;
            }
            b'&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    push_segment(line, start, i, &mut segments);
                    i += 2;
                    start = i;
                    continue;
                }
                let redirect = (i > 0 && matches!(bytes[i - 1], b'>' | b'<'))
                    || bytes.get(i + 1) == Some(&b'>');
                if !redirect {
                    push_segment(line, start, i, &mut segments);
                    i += 1;
                    start = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    push_segment(line, start, bytes.len(), &mut segments);
    segments
}

fn push_segment<'a>(line: &'a str, start: usize, end: usize, out: &mut Vec<Segment<'a>>) {
    let Some(raw) = line.get(start..end) else {
        return;
    };
    let lead = raw.len() - raw.trim_start().len();
    let text = raw.trim();
    if text.is_empty() {
        return;
    }
    let begin = start + lead;
    out.push(Segment {
        command: first_word(text),
        text,
        range: begin..begin + text.len(),
    });
}

/// First whitespace-delimited word of `text`, quote-aware, as raw text.
pub fn first_word(text: &str) -> &str {
    word_ranges(text)
        .into_iter()
        .next()
        .and_then(|range| text.get(range))
        .unwrap_or("")
}

/// Byte ranges of the whitespace-delimited words of `text`.
///
/// Quotes and backslash escapes keep whitespace inside a word; the quote
/// characters themselves stay part of the word.
pub fn word_ranges(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut words = Vec::new();
    let mut quote: Option<u8> = None;
    let mut start: Option<usize> = None;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if quote.is_none() && b.is_ascii_whitespace() {
            if let Some(s) = start.take() {
                words.push(s..i);
            }
            i += 1;
            continue;
        }
        if start.is_none() {
            start = Some(i);
        }
        match quote {
            Some(q) if b == q => quote = None,
            Some(b'"') if b == b'\\' => i += 1,
            Some(_) => {}
            None => match b {
                b'\\' => i += 1,
                b'\'' | b'"' => quote = Some(b),
                _ => {}
            },
        }
        i += 1;
    }

    if let Some(s) = start {
        words.push(s..bytes.len());
    }
    words
}

/// Replace exactly the bytes of `segment` in `line` with `replacement`.
///
/// The segment must come from `line` (or from a line whose bytes before
/// `segment.range.end` are unchanged); otherwise `line` is returned as is.
pub fn apply_segment(line: &str, segment: &Segment<'_>, replacement: &str) -> String {
    let (Some(head), Some(tail)) = (
        line.get(..segment.range.start),
        line.get(segment.range.end..),
    ) else {
        return line.to_string();
    };

    let mut out = String::with_capacity(head.len() + replacement.len() + tail.len());
    out.push_str(head);
    out.push_str(replacement);
    out.push_str(tail);
    out
}

/// Offer every segment of `line` to `rewrite` and splice back the results.
///
/// Segments are visited last to first so that earlier byte ranges stay valid
/// while later ones are replaced. Returns `None` when nothing changed.
pub fn rewrite_segments<F>(line: &str, mut rewrite: F) -> Option<String>
where
    F: FnMut(&Segment<'_>) -> Option<String>,
{
    let segments = split_segments(line);
    let mut out = line.to_string();
    let mut changed = false;

    for segment in segments.iter().rev() {
        if let Some(replacement) = rewrite(segment) {
            if replacement != segment.text {
                out = apply_segment(&out, segment, &replacement);
                changed = true;
            }
        }
    }

    changed.then_some(out)
}
