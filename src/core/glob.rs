//! Path glob matching for compiled-unit names.
//!
//! Patterns are split on `/`. A `**` segment matches zero or more whole
//! segments, `*` matches any run of characters inside one segment and `?`
//! matches exactly one character inside one segment. A pattern ending in `/`
//! is read as if it ended in `/**`. Matching is case-sensitive and never
//! touches the filesystem.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    AnyDepth,
    Literal(String),
    Wildcard(Vec<char>),
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Self {
        let mut normalized = pattern.trim().replace('\\', "/");
        if normalized.ends_with('/') {
            normalized.push_str("**");
        }

        let segments = normalized
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "**" => Segment::AnyDepth,
                s if s.contains(['*', '?']) => Segment::Wildcard(s.chars().collect()),
                s => Segment::Literal(s.to_string()),
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.replace('\\', "/");
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match_segments(&self.segments, &parts)
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            // Collapse runs of `**`; they mean the same as one.
            let rest_start = rest
                .iter()
                .position(|s| *s != Segment::AnyDepth)
                .unwrap_or(rest.len());
            let rest = &rest[rest_start..];
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => match_segment(segment, head) && match_segments(rest, tail),
            None => false,
        },
    }
}

fn match_segment(segment: &Segment, name: &str) -> bool {
    match segment {
        Segment::AnyDepth => true,
        Segment::Literal(literal) => literal == name,
        Segment::Wildcard(pattern) => {
            let name: Vec<char> = name.chars().collect();
            wildcard_match(pattern, &name)
        }
    }
}

/// Greedy `*` / `?` matcher with single-point backtracking.
fn wildcard_match(pattern: &[char], name: &[char]) -> bool {
    let (mut p, mut n) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_n = 0;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_n = n;
            p += 1;
        } else if let Some(star_p) = star {
            p = star_p + 1;
            star_n += 1;
            n = star_n;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
