//! Link string parsing and rewriting.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$(\./)?((?:\.\./)*)([.\w-]+)(?:\?priority=(-?\d+))?\$$")
        .expect("link pattern is valid")
});

static PARSED: LazyLock<Mutex<HashMap<String, Option<Link>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Parsed link descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Canonical link string without the priority suffix (`$../a.b$`).
    pub value: String,
    /// Whether the link resolves against the dependent's context.
    pub relative: bool,
    /// Number of `../` steps.
    pub parent_level: usize,
    /// Dotted target path.
    pub path: String,
    /// Tie-breaker between links of one option; higher wins.
    pub priority: i64,
}

impl Link {
    /// Path segments of the target.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.').filter(|s| !s.is_empty())
    }

    /// Name of the targeted option (last path segment).
    pub fn option_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    /// The full link string, priority suffix included when non-zero.
    pub fn to_link_string(&self) -> String {
        self.render(&self.path, self.parent_level)
    }

    /// Rewrite this link for a child option named `child` of the dependent.
    ///
    /// The child addresses the same-named member of the target. A relative
    /// link gains one `../` because the child sits one level deeper.
    pub fn for_child(&self, child: &str) -> Link {
        let path = format!("{}.{}", self.path, child);
        let level = if self.relative {
            self.parent_level + 1
        } else {
            0
        };
        Link {
            value: canonical(self.relative, level, &path),
            relative: self.relative,
            parent_level: level,
            path,
            priority: self.priority,
        }
    }

    fn render(&self, path: &str, level: usize) -> String {
        let mut out = canonical(self.relative, level, path);
        if self.priority != 0 {
            out.pop();
            out.push_str(&format!("?priority={}$", self.priority));
        }
        out
    }
}

fn canonical(relative: bool, level: usize, path: &str) -> String {
    let mut out = String::from("$");
    if relative {
        if level == 0 {
            out.push_str("./");
        } else {
            out.push_str(&"../".repeat(level));
        }
    }
    out.push_str(path);
    out.push('$');
    out
}

/// Whether `s` matches the link grammar.
pub fn is_link(s: &str) -> bool {
    parse(s).is_some()
}

/// Parse a link string. Results (including misses) are memoised globally.
pub fn parse(s: &str) -> Option<Link> {
    let mut memo = PARSED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(hit) = memo.get(s) {
        return hit.clone();
    }
    let parsed = parse_uncached(s);
    memo.insert(s.to_string(), parsed.clone());
    parsed
}

fn parse_uncached(s: &str) -> Option<Link> {
    let caps = LINK_PATTERN.captures(s)?;
    let dot = caps.get(1).is_some();
    let ups = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let parent_level = ups.len() / 3;
    let path = caps.get(3)?.as_str().trim_matches('.').to_string();
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return None;
    }
    let priority = match caps.get(4) {
        Some(m) => m.as_str().parse::<i64>().ok()?,
        None => 0,
    };
    let relative = dot || parent_level > 0;
    Some(Link {
        value: canonical(relative, parent_level, &path),
        relative,
        parent_level,
        path,
        priority,
    })
}
