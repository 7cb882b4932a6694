//! Script detection and canonical forms for Arabic and Latin text.
//!
//! Every comparison in the crate happens between canonical forms. Both pipelines
//! share one character stage (compatibility decomposition, mark stripping, Arabic
//! letter folding) so that a string normalized under one script is already stable
//! under the other.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Share of letters one script needs before a string counts as written in it.
const DOMINANT_SHARE: f64 = 0.7;
const TATWEEL: char = '\u{0640}';

/// Apostrophes and the ayn/hamza half rings used by transliteration schemes.
const TRANSLITERATION_MARKS: &[char] = &[
    '\'', '`', '\u{2018}', '\u{2019}', '\u{02BB}', '\u{02BC}', '\u{02BE}', '\u{02BF}',
];

/// Leading article forms, including the sun-letter assimilations.
pub const PARTICLES: &[&str] = &[
    "al", "el", "ul", "as", "ash", "ad", "adh", "ar", "at", "ath", "az", "an",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Arabic,
    Latin,
    Mixed,
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Script::Arabic => write!(f, "arabic"),
            Script::Latin => write!(f, "latin"),
            Script::Mixed => write!(f, "mixed"),
        }
    }
}

/// Canonical form of a surface string, tagged with the script whose rules produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedString {
    text: String,
    script: Script,
}

impl NormalizedString {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn script(&self) -> Script {
        self.script
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl AsRef<str> for NormalizedString {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for NormalizedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

static LETTER_FOLDS: Lazy<HashMap<char, char>> = Lazy::new(|| {
    const GROUPS: &[(char, &[char])] = &[
        ('ا', &['أ', 'إ', 'آ', 'ٱ', 'ٲ', 'ٳ', 'ٵ']),
        ('ه', &['ة', 'ۃ', 'ە', 'ہ', 'ۀ', 'ۂ', 'ھ']),
        ('ي', &['ى', 'ی', 'ې', 'ئ', 'ے', 'ۓ', 'ێ']),
        ('و', &['ؤ', 'ۆ', 'ۇ', 'ۈ', 'ۋ', 'ۄ', 'ۅ', 'ۉ']),
        ('ك', &['ک', 'گ', 'ڪ']),
        ('غ', &['ڠ', 'ۼ']),
        ('ف', &['ڤ', 'ڥ']),
        ('ق', &['ڨ']),
        ('ب', &['پ']),
        ('ج', &['چ']),
        ('ز', &['ژ']),
        ('0', &['٠', '۰']),
        ('1', &['١', '۱']),
        ('2', &['٢', '۲']),
        ('3', &['٣', '۳']),
        ('4', &['٤', '۴']),
        ('5', &['٥', '۵']),
        ('6', &['٦', '۶']),
        ('7', &['٧', '۷']),
        ('8', &['٨', '۸']),
        ('9', &['٩', '۹']),
    ];
    GROUPS
        .iter()
        .flat_map(|(canonical, variants)| variants.iter().map(move |v| (*v, *canonical)))
        .collect()
});

static TRANSLITERATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    const GROUPS: &[(&str, &[&str])] = &[
        (
            "muhammad",
            &[
                "mohamed", "mohammed", "mohammad", "mohamad", "muhamed", "muhammed", "muhamad",
                "mohd", "mhd", "mouhamed", "mohammod",
            ],
        ),
        ("ahmad", &["ahmed", "ahmet", "ahmd"]),
        ("abdul", &["abdel", "abdal", "abdoul", "abdol", "abdoel"]),
        ("abdullah", &["abdallah", "abdellah", "abdulla", "abdalla"]),
        (
            "abdulrahman",
            &["abdurrahman", "abdelrahman", "abderrahman", "abdalrahman", "abdourahman"],
        ),
        (
            "abdulbasit",
            &["abdelbasit", "abdelbaset", "abdulbaset", "abdelbasset", "abdulbasset"],
        ),
        ("basit", &["baset", "basset", "basith"]),
        ("mishary", &["mishari", "meshary", "meshari", "mishaari", "mishaary"]),
        ("afasy", &["afasi", "alafasy", "alafasi", "elafasy"]),
        ("sudais", &["sudays", "soudais", "sudaes"]),
        ("shuraim", &["shuraym", "shureim", "shoraim"]),
        ("minshawi", &["menshawi", "minshawy", "menshawy", "minshawee"]),
        ("husary", &["hussary", "husari", "hosary", "hussari", "husaree"]),
        ("ghamdi", &["ghamidi", "ghamadi", "ghamedi"]),
        ("maher", &["mahir"]),
        ("muaiqly", &["muaiqli", "mueaqly", "muaiqaly", "muayqili"]),
        ("hudhaify", &["huthaify", "hudhaifi", "huzaifi", "hudaifi"]),
        ("yasser", &["yasir", "yaser"]),
        ("dosari", &["dossary", "dossari", "dawsari", "dosary"]),
        ("shatri", &["shatry", "shatree"]),
        ("ajmi", &["ajamy", "ajami", "ajmy"]),
        ("yusuf", &["yousef", "youssef", "yousuf", "yusef", "yussuf"]),
        ("ibrahim", &["ebrahim", "ibraheem"]),
        ("ali", &["aly"]),
        ("abu", &["abou", "abo"]),
        ("ibn", &["bin", "ben"]),
        ("quran", &["koran", "quraan", "kuran", "qoran", "coran"]),
        ("surah", &["sura", "surat", "soorah", "soora", "sourate"]),
        ("ayah", &["aya", "aayah", "ayat"]),
        ("juz", &["juzz", "juza", "joz"]),
        ("hizb", &["hezb"]),
        ("fatiha", &["fatihah", "faatiha", "faatihah", "fateha", "fatihat"]),
        ("baqarah", &["baqara", "bakara", "baqra"]),
        ("imran", &["imraan", "emran"]),
        ("nisa", &["nisaa", "nissa"]),
        ("maidah", &["maida", "maaidah"]),
        ("kahf", &["kahef", "kahaf"]),
        ("maryam", &["mariam", "maryem"]),
        ("yasin", &["yaseen", "yassin", "yaasin"]),
        ("rahman", &["rehman", "rahmaan", "rahmane"]),
        ("waqiah", &["waqia", "waaqiah", "waqiat"]),
        ("mulk", &["molk"]),
        ("ikhlas", &["ikhlaas", "ekhlas"]),
        ("falaq", &["falak"]),
        ("nas", &["naas"]),
        ("tajweed", &["tajwid", "tajwheed"]),
        ("tarteel", &["tartil", "tarteal"]),
        ("mujawwad", &["mujawad", "mojawwad"]),
        ("murattal", &["murattil", "moratal", "murattel"]),
        ("qari", &["qaree", "qary", "kari"]),
        ("hafs", &["hafss"]),
        ("warsh", &["wersh"]),
        (
            "al",
            &["el", "ul", "as", "ash", "ad", "adh", "ar", "at", "ath", "az", "an"],
        ),
    ];
    GROUPS
        .iter()
        .flat_map(|(canonical, variants)| variants.iter().map(move |v| (*v, *canonical)))
        .collect()
});

/// Canonicalizes `text` under the rules of `script`. `Mixed` text takes the Latin
/// pipeline, which also folds any Arabic letters it carries.
pub fn normalize(text: &str, script: Script) -> NormalizedString {
    let text = match script {
        Script::Arabic => normalize_arabic(text),
        Script::Latin | Script::Mixed => normalize_latin(text),
    };
    NormalizedString { text, script }
}

/// Detects the script of `text` and normalizes it under that script.
pub fn normalize_text(text: &str) -> NormalizedString {
    normalize(text, detect_script(text))
}

struct LetterCounts {
    arabic: usize,
    latin: usize,
    other: usize,
}

fn count_letters(text: &str) -> LetterCounts {
    let mut counts = LetterCounts {
        arabic: 0,
        latin: 0,
        other: 0,
    };
    for c in text.nfkd() {
        if is_stripped(c) || TRANSLITERATION_MARKS.contains(&c) {
            continue;
        }
        if is_arabic_letter(c) {
            counts.arabic += 1;
        } else if is_latin_letter(c) {
            counts.latin += 1;
        } else if c.is_alphabetic() {
            counts.other += 1;
        }
    }
    counts
}

/// Classifies the dominant script by letter share. Text without letters is Latin.
pub fn detect_script(text: &str) -> Script {
    let LetterCounts {
        arabic,
        latin,
        other,
    } = count_letters(text);
    let total = arabic + latin + other;
    if total == 0 {
        return Script::Latin;
    }
    let total = total as f64;
    if arabic as f64 / total > DOMINANT_SHARE {
        Script::Arabic
    } else if latin as f64 / total > DOMINANT_SHARE {
        Script::Latin
    } else {
        Script::Mixed
    }
}

/// Plain majority between Arabic and Latin letters; `Mixed` only on a tie.
///
/// Used for display text that carries both a Latin and an Arabic title, where
/// [`detect_script`] would almost always answer `Mixed`.
pub fn dominant_script(text: &str) -> Script {
    let LetterCounts { arabic, latin, .. } = count_letters(text);
    match arabic.cmp(&latin) {
        Ordering::Greater => Script::Arabic,
        Ordering::Less => Script::Latin,
        Ordering::Equal if arabic == 0 => Script::Latin,
        Ordering::Equal => Script::Mixed,
    }
}

/// True when `token` is one of the article particles stripped from leading position.
pub fn is_particle(token: &str) -> bool {
    PARTICLES.contains(&token)
}

pub fn is_arabic_letter(c: char) -> bool {
    c != TATWEEL
        && !is_arabic_mark(c)
        && matches!(
            c,
            '\u{0621}'..='\u{064A}'
                | '\u{0671}'..='\u{06D3}'
                | '\u{06D5}'
                | '\u{06EE}'..='\u{06EF}'
                | '\u{06FA}'..='\u{06FF}'
                | '\u{0750}'..='\u{077F}'
                | '\u{FB50}'..='\u{FDFF}'
                | '\u{FE70}'..='\u{FEFC}'
        )
}

pub fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
        || (c.is_alphabetic()
            && matches!(c, '\u{00C0}'..='\u{024F}' | '\u{1E00}'..='\u{1EFF}'))
}

/// Harakat, Quranic annotation signs and the superscript alef.
fn is_arabic_mark(c: char) -> bool {
    matches!(
        c,
        '\u{0610}'..='\u{061A}'
            | '\u{064B}'..='\u{065F}'
            | '\u{0670}'
            | '\u{06D6}'..='\u{06DC}'
            | '\u{06DF}'..='\u{06E8}'
            | '\u{06EA}'..='\u{06ED}'
    )
}

fn is_stripped(c: char) -> bool {
    c == TATWEEL || is_arabic_mark(c) || is_combining_mark(c)
}

fn fold_char(c: char) -> char {
    LETTER_FOLDS.get(&c).copied().unwrap_or(c)
}

/// Compatibility decomposition, mark stripping and letter folding.
fn canonical_chars(text: &str) -> impl Iterator<Item = char> + '_ {
    text.nfkd().filter(|c| !is_stripped(*c)).map(fold_char)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_arabic(text: &str) -> String {
    let folded: String = canonical_chars(text).collect();
    collapse_whitespace(&folded)
}

fn normalize_latin(text: &str) -> String {
    let lowered: String = canonical_chars(text).flat_map(char::to_lowercase).collect();
    let cleaned: String = canonical_chars(&lowered)
        .filter(|c| !TRANSLITERATION_MARKS.contains(c))
        .map(|c| {
            if is_word_char(c) || c.is_whitespace() || c == '-' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut pieces: Vec<&str> = cleaned
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|piece| !piece.is_empty())
        .collect();
    let leading = pieces
        .iter()
        .take_while(|piece| is_particle(piece))
        .count()
        .min(pieces.len().saturating_sub(1));
    pieces.drain(..leading);

    pieces
        .iter()
        .map(|piece| TRANSLITERATIONS.get(piece).copied().unwrap_or(*piece))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn detects_dominant_script() {
        assert_eq!(detect_script("سورة الكهف"), Script::Arabic);
        assert_eq!(detect_script("Surat Al-Kahf"), Script::Latin);
        assert_eq!(detect_script("Kahf الكهف"), Script::Mixed);
        assert_eq!(detect_script(""), Script::Latin);
        assert_eq!(detect_script("114 !?"), Script::Latin);
    }

    #[test]
    fn bilingual_titles_have_a_majority_script() {
        assert_eq!(detect_script("Al-Kahf الكهف"), Script::Mixed);
        assert_eq!(dominant_script("Al-Kahf الكهف"), Script::Latin);
        assert_eq!(dominant_script("Kahf الكهف"), Script::Arabic);
        assert_eq!(dominant_script("ab بت"), Script::Mixed);
        assert_eq!(dominant_script("114"), Script::Latin);
    }

    #[test]
    fn diacritics_do_not_change_arabic_canonical_form() {
        let voweled = normalize_text("الْفَاتِحَةِ");
        let bare = normalize_text("الفاتحة");
        assert_eq!(voweled, bare);
        assert_eq!(voweled.script(), Script::Arabic);
    }

    #[test]
    fn folds_arabic_letter_variants() {
        assert_eq!(normalize_text("إبراهيم").as_str(), "ابراهيم");
        assert_eq!(normalize_text("مكّة").as_str(), "مكه");
        assert_eq!(normalize_text("موسى").as_str(), "موسي");
        assert_eq!(normalize_text("ک").as_str(), "ك");
        assert_eq!(normalize_text("الرحمـــن").as_str(), "الرحمن");
        assert_eq!(normalize_text("سورة  ١٨").as_str(), "سوره 18");
    }

    #[test]
    fn transliteration_variants_collapse() {
        let expected = normalize_text("Muhammad").into_string();
        assert_eq!(expected, "muhammad");
        for variant in ["Mohamed", "Mohammed", "MOHAMMAD", "muhamed"] {
            assert_eq!(normalize_text(variant).as_str(), expected, "{variant}");
        }
    }

    #[test]
    fn strips_leading_particles_only() {
        assert_eq!(normalize_text("Al-Fatihah").as_str(), "fatiha");
        assert_eq!(normalize_text("as-Sudais").as_str(), "sudais");
        assert_eq!(normalize_text("al al-Kahf").as_str(), "kahf");
        assert_eq!(
            normalize_text("Mohamed Siddiq El-Minshawi").as_str(),
            "muhammad siddiq al minshawi"
        );
        assert_eq!(normalize_text("al").as_str(), "al");
    }

    #[test]
    fn latin_diacritics_and_apostrophes() {
        assert_eq!(normalize_text("Sūrat al-Fātiḥah").as_str(), "surah al fatiha");
        assert_eq!(normalize_text("Qur'ān").as_str(), "quran");
        assert_eq!(normalize_text("Ḥafṣ ʿan ʿĀṣim").as_str(), "hafs al asim");
    }

    #[test]
    fn punctuation_becomes_space() {
        assert_eq!(normalize_text("  Yasin!!  (36) ").as_str(), "yasin 36");
        assert_eq!(normalize_text("!!!").as_str(), "");
    }

    #[test]
    fn transliteration_table_is_closed() {
        for (variant, canonical) in TRANSLITERATIONS.iter() {
            assert!(
                !TRANSLITERATIONS.contains_key(canonical),
                "{variant} -> {canonical} is itself a variant"
            );
            assert!(!canonical.contains(' ') && !canonical.contains('-'));
        }
        for (variant, canonical) in LETTER_FOLDS.iter() {
            assert!(!LETTER_FOLDS.contains_key(canonical), "{variant} folds twice");
        }
    }

    proptest! {
        #[test]
        fn latin_normalization_is_idempotent(s in "[a-zA-Z'\\- ]{0,32}") {
            let once = normalize_text(&s);
            let twice = normalize_text(once.as_str());
            prop_assert_eq!(once.as_str(), twice.as_str());
        }

        #[test]
        fn arabic_normalization_is_idempotent(s in "[\u{0621}-\u{064A}\u{064B}-\u{0652}\u{0640} ]{0,24}") {
            let once = normalize_text(&s);
            let twice = normalize_text(once.as_str());
            prop_assert_eq!(once.as_str(), twice.as_str());
        }

        #[test]
        fn mixed_normalization_is_idempotent(s in "[a-zA-Z\u{0621}-\u{064A}\u{064E}\u{0650}\\-. ]{0,32}") {
            let once = normalize_text(&s);
            let twice = normalize_text(once.as_str());
            prop_assert_eq!(once.as_str(), twice.as_str());
        }
    }
}
