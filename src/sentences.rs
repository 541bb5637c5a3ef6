use regex::Regex;
use std::sync::OnceLock;

static CJK_TERMINATOR: OnceLock<Regex> = OnceLock::new();
static SENTENCE_BREAK: OnceLock<Regex> = OnceLock::new();

fn cjk_terminator() -> &'static Regex {
    CJK_TERMINATOR.get_or_init(|| Regex::new(r"([。！？])").expect("valid CJK terminator regex"))
}

fn sentence_break() -> &'static Regex {
    SENTENCE_BREAK
        .get_or_init(|| Regex::new(r"[.!?。！？]\s+").expect("valid sentence break regex"))
}

/// Splits text into trimmed, non-empty sentences in order of appearance.
///
/// A break happens at every whitespace run that directly follows one of
/// `. ! ? 。 ！ ？`; the terminator stays with the sentence before it. CJK
/// terminators always get a break even when the source has no space after them.
pub fn split(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let spaced = cjk_terminator().replace_all(text, "$1 ");
    let spaced = spaced.trim();

    let mut sentences = Vec::new();
    let mut start = 0usize;
    for found in sentence_break().find_iter(spaced) {
        // The terminator is the first char of the match; cut right after it.
        let terminator_len = found
            .as_str()
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(0);
        push_fragment(&mut sentences, &spaced[start..found.start() + terminator_len]);
        start = found.end();
    }
    push_fragment(&mut sentences, &spaced[start..]);
    sentences
}

fn push_fragment(sentences: &mut Vec<String>, fragment: &str) {
    let fragment = fragment.trim();
    if !fragment.is_empty() {
        sentences.push(fragment.to_string());
    }
}
