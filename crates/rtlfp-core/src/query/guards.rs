//! Shared guardrails for query parameters and traversal limits.

pub const MAX_PATTERN_LENGTH: usize = 512;
pub const MAX_QUERY_DEPTH: usize = 1024;
pub const MAX_QUERY_PATHS: usize = 10_000;
pub const MAX_CONE_NODES: usize = 50_000;
pub const MAX_RENDERED_PATHS: usize = 100;

pub const DEFAULT_QUERY_DEPTH: usize = 50;
pub const MSHR_QUERY_DEPTH: usize = 60;
pub const DCACHE_QUERY_DEPTH: usize = 100;
pub const PRESET_QUERY_PATHS: usize = 20;

pub fn clamp_int(value: usize, minimum: usize, maximum: usize) -> usize {
    value.max(minimum).min(maximum)
}

/// Depth counts nodes on a path; zero is allowed and matches nothing.
pub fn clamp_depth(value: usize) -> usize {
    clamp_int(value, 0, MAX_QUERY_DEPTH)
}

/// An explicit limit is capped at `MAX_QUERY_PATHS`; `None` is unbounded and
/// enumeration runs until the frontier is exhausted.
pub fn clamp_paths(value: Option<usize>) -> usize {
    match value {
        Some(limit) => limit.min(MAX_QUERY_PATHS),
        None => usize::MAX,
    }
}

/// Trim whitespace and cap the length, cutting on a char boundary.
pub fn truncate_pattern(pattern: &str) -> &str {
    let stripped = pattern.trim();
    if stripped.len() <= MAX_PATTERN_LENGTH {
        return stripped;
    }
    let mut end = MAX_PATTERN_LENGTH;
    while !stripped.is_char_boundary(end) {
        end -= 1;
    }
    &stripped[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_depth(0), 0);
        assert_eq!(clamp_depth(60), 60);
        assert_eq!(clamp_depth(usize::MAX), MAX_QUERY_DEPTH);
        assert_eq!(clamp_paths(None), usize::MAX);
        assert_eq!(clamp_paths(Some(usize::MAX)), MAX_QUERY_PATHS);
        assert_eq!(clamp_paths(Some(0)), 0);
        assert_eq!(clamp_paths(Some(20)), 20);
    }

    #[test]
    fn test_truncate_pattern() {
        assert_eq!(truncate_pattern("  *set_idx*  "), "*set_idx*");
        let long = "é".repeat(MAX_PATTERN_LENGTH);
        let cut = truncate_pattern(&long);
        assert!(cut.len() <= MAX_PATTERN_LENGTH);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
