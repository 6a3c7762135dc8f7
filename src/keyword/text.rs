//! Word-level tokenisation shared by phrase matching and echo comparison.
//!
//! A token is a maximal run of alphanumeric characters and apostrophes,
//! lowercased, with the apostrophes removed (`"That's"` → `"thats"`).  Every
//! token remembers its byte range in the source text.  Phrases are found as
//! substrings of the space-joined tokens ([`Normalized`]), so `"stop"` also
//! matches `"stopped"`, and a match can still be cut out of the original
//! transcript on word boundaries.

/// One normalised word and its byte range in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub norm: String,
    pub start: usize,
    pub end: usize,
}

/// Split `text` into normalised tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_alphanumeric() || ch == '\'' || ch == '\u{2019}' {
            let (_, norm) = current.get_or_insert_with(|| (idx, String::new()));
            if ch.is_alphanumeric() {
                norm.extend(ch.to_lowercase());
            }
        } else if let Some((start, norm)) = current.take() {
            push_token(&mut tokens, norm, start, idx);
        }
    }
    if let Some((start, norm)) = current {
        push_token(&mut tokens, norm, start, text.len());
    }
    tokens
}

fn push_token(tokens: &mut Vec<Token>, norm: String, start: usize, end: usize) {
    // A lone apostrophe is punctuation, not a word.
    if !norm.is_empty() {
        tokens.push(Token { norm, start, end });
    }
}

/// Normalised form of `text`: tokens joined by single spaces.
pub fn normalize(text: &str) -> String {
    tokenize(text)
        .into_iter()
        .map(|t| t.norm)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The normalised form of a source text, searchable by substring, with a
/// map from every match back to the source words it touches.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    text: String,
    tokens: Vec<Token>,
    /// Byte offset of each token in `text`.
    offsets: Vec<usize>,
}

impl Normalized {
    pub fn new(source: &str) -> Self {
        let tokens = tokenize(source);
        let mut text = String::new();
        let mut offsets = Vec::with_capacity(tokens.len());
        for token in &tokens {
            if !text.is_empty() {
                text.push(' ');
            }
            offsets.push(text.len());
            text.push_str(&token.norm);
        }
        Self { text, tokens, offsets }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Start offsets of every (possibly overlapping) occurrence of `needle`.
    pub fn find_all<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
        let mut from = 0;
        std::iter::from_fn(move || {
            if needle.is_empty() || from > self.text.len() {
                return None;
            }
            let at = from + self.text[from..].find(needle)?;
            from = at + self.text[at..].chars().next().map_or(1, char::len_utf8);
            Some(at)
        })
    }

    pub fn contains(&self, needle: &str) -> bool {
        !needle.is_empty() && self.text.contains(needle)
    }

    /// Number of non-overlapping occurrences of `needle`.
    pub fn count(&self, needle: &str) -> usize {
        if needle.is_empty() {
            return 0;
        }
        self.text.matches(needle).count()
    }

    /// Source byte where the word containing normalised offset `pos` starts.
    pub fn source_start(&self, pos: usize) -> usize {
        self.token_at(pos).map_or(0, |t| t.start)
    }

    /// Source byte where the word containing the last byte before normalised
    /// offset `end` ends.
    pub fn source_end(&self, end: usize) -> usize {
        self.token_at(end.saturating_sub(1)).map_or(0, |t| t.end)
    }

    fn token_at(&self, pos: usize) -> Option<&Token> {
        let idx = self.offsets.partition_point(|&o| o <= pos).checked_sub(1)?;
        self.tokens.get(idx)
    }
}

/// Trim separators left dangling after a phrase was cut out.
pub fn tidy(fragment: &str) -> String {
    fragment
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '.'))
        .to_string()
}
