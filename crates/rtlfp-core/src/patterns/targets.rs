//! Candidate signal selection by name globs.

use indexmap::IndexMap;

use crate::models::DesignSignal;
use crate::query::guards::truncate_pattern;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Any,
    One,
    Class { items: Vec<(char, char)>, negated: bool },
    Lit(char),
}

/// Glob with `*`, `?` and `[...]` classes (`[!...]` negates).
fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => tokens.push(Token::Any),
            '?' => tokens.push(Token::One),
            '[' => {
                if let Some((token, next)) = parse_class(&chars, i + 1) {
                    tokens.push(token);
                    i = next;
                    continue;
                }
                tokens.push(Token::Lit('['));
            }
            c => tokens.push(Token::Lit(c)),
        }
        i += 1;
    }
    tokens
}

/// Parse a class body starting after `[`. Returns the token and the index
/// just past `]`, or `None` when the class is unterminated.
fn parse_class(chars: &[char], start: usize) -> Option<(Token, usize)> {
    let mut i = start;
    let negated = chars.get(i) == Some(&'!');
    if negated {
        i += 1;
    }
    let mut items = Vec::new();
    let mut first = true;
    while i < chars.len() {
        let c = chars[i];
        if c == ']' && !first {
            return Some((Token::Class { items, negated }, i + 1));
        }
        first = false;
        if chars.get(i + 1) == Some(&'-') && chars.get(i + 2).is_some_and(|e| *e != ']') {
            items.push((c, chars[i + 2]));
            i += 3;
        } else {
            items.push((c, c));
            i += 1;
        }
    }
    None
}

fn token_matches(token: &Token, c: char) -> bool {
    match token {
        Token::Any | Token::One => true,
        Token::Lit(l) => *l == c,
        Token::Class { items, negated } => {
            items.iter().any(|(lo, hi)| *lo <= c && c <= *hi) != *negated
        }
    }
}

pub fn glob_match(text: &str, pattern: &str) -> bool {
    let tokens = tokenize(pattern);
    // prev[j]: text prefix so far matches the first j tokens.
    let mut prev = vec![false; tokens.len() + 1];
    prev[0] = true;
    for j in 1..=tokens.len() {
        prev[j] = prev[j - 1] && tokens[j - 1] == Token::Any;
    }
    for c in text.chars() {
        let mut cur = vec![false; tokens.len() + 1];
        for j in 1..=tokens.len() {
            cur[j] = match &tokens[j - 1] {
                Token::Any => cur[j - 1] || prev[j],
                token => prev[j - 1] && token_matches(token, c),
            };
        }
        prev = cur;
    }
    prev[tokens.len()]
}

/// Maps each configured mechanism tag to the signals whose name matches any
/// of its globs. Tags keep configuration order; signals keep input order.
#[derive(Debug, Clone)]
pub struct TargetSelector<'c> {
    patterns: &'c IndexMap<String, Vec<String>>,
}

pub type TargetSet<'s> = IndexMap<String, Vec<&'s DesignSignal>>;

impl<'c> TargetSelector<'c> {
    pub fn new(patterns: &'c IndexMap<String, Vec<String>>) -> Self {
        TargetSelector { patterns }
    }

    pub fn select_targets<'s>(&self, signals: &'s [DesignSignal]) -> TargetSet<'s> {
        let mut targets = TargetSet::new();
        for (mech, globs) in self.patterns {
            let globs: Vec<&str> = globs.iter().map(|g| truncate_pattern(g)).collect();
            let matched: Vec<&DesignSignal> = signals
                .iter()
                .filter(|s| globs.iter().any(|g| glob_match(&s.name, g)))
                .collect();
            tracing::debug!("Selected {} {mech} targets", matched.len());
            targets.insert(mech.clone(), matched);
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("dcache_set_idx", "*set_idx*"));
        assert!(glob_match("set_idx", "*set_idx*"));
        assert!(!glob_match("dcache_way_idx", "*set_idx*"));
        assert!(glob_match("mshr_0", "mshr_?"));
        assert!(!glob_match("mshr_10", "mshr_?"));
        assert!(glob_match("mshr_3", "mshr_[0-3]"));
        assert!(!glob_match("mshr_4", "mshr_[0-3]"));
        assert!(glob_match("mshr_4", "mshr_[!0-3]"));
        assert!(glob_match("a[b", "a[b"));
        assert!(glob_match("", "*"));
        assert!(!glob_match("x", ""));
    }

    #[test]
    fn test_select_targets_keeps_order() {
        let signals = vec![
            DesignSignal::new("dcache_set_idx", "top.dcache", None),
            DesignSignal::new("dcache_mshr_full", "top.dcache.mshrs", None),
            DesignSignal::new("icache_set_idx", "top.icache", None),
        ];
        let mut patterns = IndexMap::new();
        patterns.insert("queue".to_string(), vec!["*mshr_full*".to_string()]);
        patterns.insert("mapping".to_string(), vec!["*set_idx*".to_string()]);
        patterns.insert("arbiter".to_string(), vec!["*arb*".to_string()]);

        let targets = TargetSelector::new(&patterns).select_targets(&signals);
        assert_eq!(
            targets.keys().collect::<Vec<_>>(),
            vec!["queue", "mapping", "arbiter"]
        );
        let mapping: Vec<&str> = targets["mapping"].iter().map(|s| s.module_path.as_str()).collect();
        assert_eq!(mapping, vec!["top.dcache", "top.icache"]);
        assert_eq!(targets["queue"].len(), 1);
        assert!(targets["arbiter"].is_empty());
    }
}
