// src/textnorm.rs

use std::collections::HashSet;
use std::sync::LazyLock;

/// Portuguese stopwords, stored in their accent-folded form so they can be
/// matched against already-cleaned tokens.
static STOPWORDS_PT: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "o", "e", "de", "do", "da", "dos", "das", "em", "um", "uma", "uns", "umas", "os",
        "as", "no", "na", "nos", "nas", "que", "com", "por", "para", "se", "ao", "aos", "mais",
        "mas", "ou", "quando", "muito", "ja", "tambem", "so", "pelo", "pela", "pelos", "pelas",
        "ate", "isso", "ele", "ela", "eles", "elas", "entre", "depois", "sem", "mesmo", "seu",
        "sua", "seus", "suas", "nao", "nem", "num", "numa", "meu", "minha", "essa", "esse",
        "essas", "esses", "esta", "este", "estas", "estes", "dele", "dela", "voce", "qual",
        "quem", "lhe", "como",
    ]
    .into_iter()
    .collect()
});

/// Transliterate one accented character to its closest ASCII form.
/// Characters without a mapping pass through unchanged and are dealt
/// with by the `[a-z0-9\s]` filter in `clean_text`.
fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ã' | 'â' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'õ' | 'ô' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Deterministic cleanup: lowercase, transliterate accents, replace every
/// character outside `[a-z0-9\s]` with a space, collapse whitespace.
/// The output contains only `[a-z0-9 ]` and has no leading/trailing space.
pub fn clean_text(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(fold_char)
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop Portuguese stopwords from an already-cleaned string.
pub fn remove_stopwords(text: &str) -> String {
    text.split_whitespace()
        .filter(|w| !STOPWORDS_PT.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cleanup variant used for retrieval queries and catalog descriptions:
/// deterministic cleanup followed by stopword removal.
pub fn clean_for_retrieval(text: &str) -> String {
    remove_stopwords(&clean_text(text))
}
