//! Risky-pattern inspection of configuration and declaration text.
//!
//! The migration treats this as a pass/fail signal: the sanitizer's
//! post-rewrite scan and `doctor`'s .condarc check both go through
//! `find_risky_tokens`. Patterns are literal fragments, not a grammar.

/// The reserved channel alias that resolves to commercially-licensed repos.
pub const RESERVED_CHANNEL: &str = "defaults";

/// Commercial endpoint host fragments.
pub const RISKY_HOSTS: &[&str] = &["repo.anaconda.com", "repo.continuum.io"];

/// Commercially-licensed repository path fragments.
pub const RISKY_PATHS: &[&str] = &["pkgs/main", "pkgs/r", "pkgs/pro", "pkgs/msys2"];

/// Scan text for known risky tokens; returns each distinct token found,
/// in scan order. `defaults` is matched as a standalone word so package
/// names merely containing the substring do not trip the scan.
pub fn find_risky_tokens(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |t: &str| {
        if !found.iter().any(|f| f == t) {
            found.push(t.to_string());
        }
    };

    for line in text.lines() {
        if contains_word(line, RESERVED_CHANNEL) {
            push(RESERVED_CHANNEL);
        }
        for h in RISKY_HOSTS {
            if line.contains(h) {
                push(h);
            }
        }
        for p in RISKY_PATHS {
            if line.contains(p) {
                push(p);
            }
        }
    }
    found
}

/// True when the text contains no known risky tokens.
pub fn is_clean(text: &str) -> bool {
    find_risky_tokens(text).is_empty()
}

fn contains_word(line: &str, word: &str) -> bool {
    let bytes = line.as_bytes();
    let mut start = 0;
    while let Some(pos) = line[start..].find(word) {
        let begin = start + pos;
        let end = begin + word.len();
        let left_ok = begin == 0 || !is_word_byte(bytes[begin - 1]);
        let right_ok = end == bytes.len() || !is_word_byte(bytes[end]);
        if left_ok && right_ok {
            return true;
        }
        start = end;
    }
    false
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_reserved_channel_word() {
        let tokens = find_risky_tokens("channels:\n  - defaults\n");
        assert_eq!(tokens, vec!["defaults".to_string()]);
    }

    #[test]
    fn package_names_containing_defaults_are_not_flagged() {
        assert!(is_clean("  - widget-defaultsmith=1.0\n"));
        assert!(is_clean("  - mydefaults_tool\n"));
    }

    #[test]
    fn flags_hosts_and_paths() {
        let text = "channel_alias: https://repo.anaconda.com/pkgs/main\n";
        let tokens = find_risky_tokens(text);
        assert!(tokens.contains(&"repo.anaconda.com".to_string()));
        assert!(tokens.contains(&"pkgs/main".to_string()));
    }

    #[test]
    fn clean_text_yields_nothing() {
        assert!(is_clean("channels:\n  - conda-forge\ndependencies:\n  - python=3.11\n"));
    }

    #[test]
    fn tokens_are_deduplicated() {
        let text = "defaults\ndefaults\n";
        assert_eq!(find_risky_tokens(text).len(), 1);
    }
}
