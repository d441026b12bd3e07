/// Turns a display name into the key used to spot duplicates.
pub trait NameNormalizer: Send + Sync {
    fn normalize(&self, name: &str) -> String;
}

/// Trim and lowercase only. Accented and unaccented spellings stay distinct.
pub struct LowercaseTrim;

impl NameNormalizer for LowercaseTrim {
    fn normalize(&self, name: &str) -> String {
        name.trim().to_lowercase()
    }
}

/// Lowercase, trim, and fold common Latin diacritics ("Étienne" == "etienne").
pub struct AccentFolding;

// Covers the Latin letters seen in candidate names, not all of Unicode.
// Anything outside the table is kept as is.
fn fold_char(ch: char, out: &mut String) {
    match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => out.push('a'),
        'æ' => out.push_str("ae"),
        'ç' => out.push('c'),
        'è' | 'é' | 'ê' | 'ë' => out.push('e'),
        'ì' | 'í' | 'î' | 'ï' => out.push('i'),
        'ñ' => out.push('n'),
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => out.push('o'),
        'œ' => out.push_str("oe"),
        'ß' => out.push_str("ss"),
        'ù' | 'ú' | 'û' | 'ü' => out.push('u'),
        'ý' | 'ÿ' => out.push('y'),
        other => out.push(other),
    }
}

impl NameNormalizer for AccentFolding {
    fn normalize(&self, name: &str) -> String {
        let lowered = name.trim().to_lowercase();
        let mut folded = String::with_capacity(lowered.len());
        for ch in lowered.chars() {
            fold_char(ch, &mut folded);
        }
        folded
    }
}
