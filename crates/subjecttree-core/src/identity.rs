use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a node, derived from the path of names from the root.
///
/// Segments are joined with `/`. A literal `/`, `#` or `\` inside a name is
/// escaped with `\`. When a sibling list repeats a name, the k-th occurrence
/// (k >= 2) is written `name#k`, so every node of a tree has a distinct id
/// and the id of a node never depends on its description or on its
/// position among differently named siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

/// One decoded path segment: the node name and its occurrence among
/// same-named siblings (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub occurrence: usize,
}

impl NodeId {
    /// Identity of a root node.
    pub fn root(name: &str) -> Self {
        NodeId(encode_segment(name, 1))
    }

    /// Identity of the `occurrence`-th child called `name` under `self`.
    pub fn child(&self, name: &str, occurrence: usize) -> Self {
        NodeId(format!("{}/{}", self.0, encode_segment(name, occurrence)))
    }

    /// Build an identity from plain names (first occurrence at every level).
    pub fn from_names<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let encoded: Vec<String> = names
            .into_iter()
            .map(|n| encode_segment(n.as_ref(), 1))
            .collect();
        if encoded.is_empty() {
            None
        } else {
            Some(NodeId(encoded.join("/")))
        }
    }

    /// Parse a user-typed path such as `Algebra/Linear Algebra`.
    ///
    /// Whitespace around segments is ignored and empty segments are skipped.
    pub fn parse_path(input: &str) -> Option<Self> {
        let encoded: Vec<String> = decode(input)
            .into_iter()
            .map(|s| Segment {
                name: s.name.trim().to_string(),
                occurrence: s.occurrence,
            })
            .filter(|s| !s.name.is_empty())
            .map(|s| encode_segment(&s.name, s.occurrence))
            .collect();
        if encoded.is_empty() {
            None
        } else {
            Some(NodeId(encoded.join("/")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> Vec<Segment> {
        decode(&self.0)
    }

    /// Number of edges between the root and this node.
    pub fn depth(&self) -> usize {
        self.segments().len().saturating_sub(1)
    }

    pub fn parent(&self) -> Option<NodeId> {
        let segments = self.segments();
        if segments.len() < 2 {
            return None;
        }
        let encoded: Vec<String> = segments[..segments.len() - 1]
            .iter()
            .map(|s| encode_segment(&s.name, s.occurrence))
            .collect();
        Some(NodeId(encoded.join("/")))
    }

    pub fn is_ancestor_of(&self, other: &NodeId) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
            && !ends_with_escape(&self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn encode_segment(name: &str, occurrence: usize) -> String {
    let mut out = String::with_capacity(name.len() + 3);
    for ch in name.chars() {
        if matches!(ch, '\\' | '/' | '#') {
            out.push('\\');
        }
        out.push(ch);
    }
    if occurrence > 1 {
        out.push('#');
        out.push_str(&occurrence.to_string());
    }
    out
}

// An odd run of trailing backslashes means the final `/` candidate is escaped.
fn ends_with_escape(raw: &str) -> bool {
    raw.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn decode(raw: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut name = String::new();
    let mut occurrence: Option<String> = None;
    let mut chars = raw.chars();

    let finish = |name: &mut String, occurrence: &mut Option<String>, out: &mut Vec<Segment>| {
        let occ = match occurrence.take() {
            Some(digits) if !digits.is_empty() => match digits.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    name.push('#');
                    name.push_str(&digits);
                    1
                }
            },
            Some(_) => {
                name.push('#');
                1
            }
            None => 1,
        };
        out.push(Segment {
            name: std::mem::take(name),
            occurrence: occ,
        });
    };

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(digits) = occurrence.take() {
                    name.push('#');
                    name.push_str(&digits);
                }
                if let Some(next) = chars.next() {
                    name.push(next);
                }
            }
            '/' => finish(&mut name, &mut occurrence, &mut segments),
            '#' => {
                if let Some(digits) = occurrence.take() {
                    name.push('#');
                    name.push_str(&digits);
                }
                occurrence = Some(String::new());
            }
            c => {
                if let Some(digits) = occurrence.as_mut() {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        continue;
                    }
                }
                if let Some(digits) = occurrence.take() {
                    name.push('#');
                    name.push_str(&digits);
                }
                name.push(c);
            }
        }
    }
    finish(&mut name, &mut occurrence, &mut segments);
    segments
}
