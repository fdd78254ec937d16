//! Similarity metrics for matching a new task against past executions.
//!
//! Two signals are fused by the warm-up builder:
//!
//! - **File overlap**: Jaccard index over normalized file paths
//! - **Name distance**: normalized Levenshtein similarity over task names
//!
//! Both return values in `[0.0, 1.0]`.

// Static regexes are compile-time constants.
#![allow(clippy::expect_used)]
#![allow(clippy::cast_precision_loss)]

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Everything that is not a letter, digit, or space, in any script.
static NAME_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N} ]+").expect("static regex: name noise"));

/// Everything that is not a letter or digit, in any script.
static HASH_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static regex: hash noise"));

/// Runs of forward slashes.
static SLASH_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/{2,}").expect("static regex: slash runs"));

/// Lexically cleans a file path and lower-cases it.
///
/// Backslashes become slashes, repeated slashes collapse, `.` segments are
/// dropped, and `..` consumes the previous segment. An empty result is `"."`.
///
/// # Examples
///
/// ```
/// use agentlore::services::similarity::normalize_path;
///
/// assert_eq!(normalize_path("./Src//lib.rs"), "src/lib.rs");
/// assert_eq!(normalize_path("src/bin/../main.rs"), "src/main.rs");
/// assert_eq!(normalize_path(""), ".");
/// ```
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let lowered = path.trim().replace('\\', "/").to_lowercase();
    let collapsed = SLASH_RUNS.replace_all(&lowered, "/");
    let rooted = collapsed.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in collapsed.split('/') {
        match segment {
            "" | "." => {},
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                },
                _ if rooted => {},
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Normalizes a list of paths into a set, dropping empty and `"."` entries.
#[must_use]
pub fn normalize_paths<S: AsRef<str>>(paths: &[S]) -> BTreeSet<String> {
    paths
        .iter()
        .filter(|p| !p.as_ref().trim().is_empty())
        .map(|p| normalize_path(p.as_ref()))
        .filter(|p| p != ".")
        .collect()
}

/// Jaccard index `|A ∩ B| / |A ∪ B|`.
///
/// Two empty sets score 0.0: no shared evidence is not a match.
#[must_use]
pub fn jaccard_similarity<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaccard similarity over normalized file paths.
#[must_use]
pub fn file_similarity<S: AsRef<str>, T: AsRef<str>>(a: &[S], b: &[T]) -> f64 {
    jaccard_similarity(&normalize_paths(a), &normalize_paths(b))
}

/// Lower-cases a task name and keeps only letters, digits, and spaces.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    NAME_NOISE.replace_all(&name.to_lowercase(), "").into_owned()
}

/// Lower-cased letters and digits of a task name, used as a pattern key.
///
/// # Examples
///
/// ```
/// use agentlore::services::similarity::task_hash;
///
/// assert_eq!(task_hash("Add login handler!"), "addloginhandler");
/// ```
#[must_use]
pub fn task_hash(name: &str) -> String {
    HASH_NOISE.replace_all(&name.to_lowercase(), "").into_owned()
}

/// Classic dynamic-programming edit distance over Unicode scalar values.
///
/// # Examples
///
/// ```
/// use agentlore::services::similarity::levenshtein_distance;
///
/// assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
/// assert_eq!(levenshtein_distance("", "abc"), 3);
/// ```
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// `1 - distance / max(len)` on already-normalized strings.
///
/// Identical strings (including two empty ones) score 1.0; exactly one empty
/// string scores 0.0.
#[must_use]
pub fn normalized_levenshtein_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if a.is_empty() || b.is_empty() || max_len == 0 {
        return 0.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

/// Similarity of two task names after [`normalize_name`].
#[must_use]
pub fn name_similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein_similarity(&normalize_name(a), &normalize_name(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("src/lib.rs", "src/lib.rs" ; "already clean")]
    #[test_case("SRC/Lib.RS", "src/lib.rs" ; "lower cased")]
    #[test_case("./src/./lib.rs", "src/lib.rs" ; "dot segments")]
    #[test_case("src//lib.rs/", "src/lib.rs" ; "repeated and trailing slashes")]
    #[test_case("src\\models\\mod.rs", "src/models/mod.rs" ; "backslashes")]
    #[test_case("a/b/../../c", "c" ; "parent segments")]
    #[test_case("../outside.rs", "../outside.rs" ; "leading parent kept")]
    #[test_case("/../etc/hosts", "/etc/hosts" ; "parent of root is root")]
    #[test_case(".", "." ; "current directory")]
    #[test_case("   ", "." ; "blank")]
    fn test_normalize_path(input: &str, expected: &str) {
        assert_eq!(normalize_path(input), expected);
    }

    #[test]
    fn test_normalize_paths_drops_empty_and_dot() {
        let set = normalize_paths(&["", ".", "./", "src/a.rs", "SRC/a.rs"]);
        assert_eq!(set.len(), 1);
        assert!(set.contains("src/a.rs"));
    }

    #[test]
    fn test_jaccard_bounds() {
        let empty: BTreeSet<&str> = BTreeSet::new();
        let s: BTreeSet<&str> = ["a", "b"].into_iter().collect();
        let t: BTreeSet<&str> = ["b", "c"].into_iter().collect();

        assert!(jaccard_similarity(&empty, &empty).abs() < f64::EPSILON);
        assert!((jaccard_similarity(&s, &s) - 1.0).abs() < f64::EPSILON);
        assert!((jaccard_similarity(&s, &t) - 1.0 / 3.0).abs() < 1e-9);
        assert!(jaccard_similarity(&s, &empty).abs() < f64::EPSILON);
    }

    #[test]
    fn test_file_similarity_uses_normalized_paths() {
        let sim = file_similarity(&["./src/auth.rs", "src/login.rs"], &["SRC/auth.rs"]);
        assert!((sim - 0.5).abs() < f64::EPSILON);
    }

    #[test_case("Add login handler!", "add login handler" ; "punctuation dropped")]
    #[test_case("Fix bug #42", "fix bug 42" ; "digits kept")]
    #[test_case("***", "" ; "only noise")]
    #[test_case("Réparer l'écran", "réparer lécran" ; "accented letters kept")]
    #[test_case("Исправить баг!", "исправить баг" ; "cyrillic kept")]
    #[test_case("日本語のタスク。", "日本語のタスク" ; "cjk kept")]
    fn test_normalize_name(input: &str, expected: &str) {
        assert_eq!(normalize_name(input), expected);
    }

    #[test_case("Créer", "créer" ; "accented")]
    #[test_case("Удалить файл", "удалитьфайл" ; "cyrillic")]
    #[test_case("全く別の仕事!", "全く別の仕事" ; "cjk")]
    fn test_task_hash_keeps_non_ascii_letters(input: &str, expected: &str) {
        assert_eq!(task_hash(input), expected);
    }

    #[test_case("Исправить", "Удалить" ; "cyrillic")]
    #[test_case("日本語のタスク", "全く別の仕事" ; "cjk")]
    #[test_case("Éditer", "Supprimer" ; "accented")]
    fn test_distinct_non_ascii_names_are_not_identical(a: &str, b: &str) {
        assert!(name_similarity(a, b) < 1.0);
        assert!((name_similarity(a, a) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_levenshtein_counts_code_points() {
        assert_eq!(levenshtein_distance("héllo", "hello"), 1);
        assert_eq!(levenshtein_distance("日本語", "日本"), 1);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_one_edit_on_five_chars() {
        assert_eq!(levenshtein_distance("hello", "hallo"), 1);
        let sim = normalized_levenshtein_similarity("hello", "hallo");
        assert!((sim - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_normalized_similarity_edge_cases() {
        assert!((normalized_levenshtein_similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!(normalized_levenshtein_similarity("", "abc").abs() < f64::EPSILON);
        assert!(normalized_levenshtein_similarity("abc", "").abs() < f64::EPSILON);
        assert!(normalized_levenshtein_similarity("abc", "xyz").abs() < f64::EPSILON);
    }

    #[test]
    fn test_name_similarity_ignores_case_and_punctuation() {
        assert!((name_similarity("Add Login Handler", "add login handler.") - 1.0).abs() < f64::EPSILON);
    }
}
