//! Purely lexical path containment.
//!
//! `is_subpath(parent, child)` holds when the normalized parent equals the
//! common path of parent and child, i.e. the parent is a prefix of the child
//! on a path-segment boundary. No filesystem access.

/// Splits on `/`, dropping empty and `.` segments, resolving `..`.
fn normalize_segments(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out
}

/// True when `child` lies under (or equals) `parent`.
pub fn is_subpath(parent: &str, child: &str) -> bool {
    let parent = normalize_segments(parent);
    if parent.is_empty() {
        return false;
    }
    let child = normalize_segments(child);
    child.len() >= parent.len() && child[..parent.len()] == parent[..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_child_matches() {
        assert!(is_subpath("p2/dir3", "p2/dir3/file1"));
    }

    #[test]
    fn equal_paths_match() {
        assert!(is_subpath("p2/dir3", "p2/dir3"));
    }

    #[test]
    fn prefix_must_end_on_segment_boundary() {
        assert!(!is_subpath("p2/dir3/dir", "p2/dir3/dir_file"));
        assert!(is_subpath("p2/dir3/dir", "p2/dir3/dir/file"));
    }

    #[test]
    fn sibling_does_not_match() {
        assert!(!is_subpath("p2/dir3", "p2/dir4/file"));
        assert!(!is_subpath("p2/dir3", "p1/dir3/file"));
    }

    #[test]
    fn normalization_applies() {
        assert!(is_subpath("p2//dir3/./", "p2/dir3/x/../y"));
        assert!(!is_subpath("", "p2/dir3"));
    }
}
