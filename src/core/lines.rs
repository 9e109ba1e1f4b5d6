//! Purpose: Text-layer helpers shared by the table extractors.
//! Exports: `fold`, `count_keywords`, `tokens`, `merge_currency`.
//! Role: Normalize Spanish report text so keyword matching is stable.
//! Invariants: `fold` lowercases and strips diacritics; it never drops characters.
//! Invariants: Keyword matching always happens on folded needles and folded haystacks.

/// Lowercase `text` and fold Spanish diacritics to their ASCII base letter.
///
/// The extracted text layer of a report does not always preserve combining
/// accents, so both sides of every keyword comparison go through this.
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => out.push('a'),
            'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => out.push('e'),
            'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => out.push('i'),
            'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => out.push('o'),
            'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => out.push('u'),
            'ñ' | 'Ñ' => out.push('n'),
            _ => out.extend(ch.to_lowercase()),
        }
    }
    out
}

/// Count how many of `keywords` occur in the already-folded `haystack`.
pub fn count_keywords(haystack: &str, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|keyword| haystack.contains(*keyword))
        .count()
}

pub fn tokens(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Join a bare `$` token with the amount that follows it, so currency cells
/// like `$ 471.800` survive whitespace tokenization as one token.
pub fn merge_currency(tokens: Vec<&str>) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token == "$" {
            if let Some(next) = iter.peek() {
                out.push(format!("${next}"));
                iter.next();
                continue;
            }
        }
        out.push(token.to_string());
    }
    out
}
