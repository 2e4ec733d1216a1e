//! Operator range expressions such as `1,3-5` or `all`.
//!
//! Indices are 1-based. Anything that does not resolve to a valid index is
//! dropped rather than rejected; the number of such tokens is reported so the
//! operator can spot typos.

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// zero-based, in expression order, duplicates kept
    pub indices: Vec<usize>,
    pub dropped: usize,
}

pub fn parse_selection(expression: &str, len: usize) -> Selection {
    let expression = expression.trim().to_lowercase();
    if expression == "all" {
        return Selection {
            indices: (0..len).collect(),
            dropped: 0,
        };
    }

    let mut selection = Selection::default();
    for token in expression.split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        let before = selection.indices.len();
        if token.contains('-') {
            if let Some((start, end)) = parse_range(token) {
                // clamp to [1, len]
                let start = start.max(1);
                let end = end.min(len);
                selection.indices.extend((start..=end).map(|i| i - 1));
            }
        } else {
            let idx = token.parse::<usize>().unwrap_or(0);
            if idx >= 1 && idx <= len {
                selection.indices.push(idx - 1);
            }
        }
        if selection.indices.len() == before {
            debug!("selection token {:?} matched no target", token);
            selection.dropped += 1;
        }
    }
    selection
}

/// Endpoints that do not parse count as 0, which the caller clamps to 1.
/// Only a token with more than one `-` is rejected outright.
fn parse_range(token: &str) -> Option<(usize, usize)> {
    let (start, end) = token.split_once('-')?;
    if end.contains('-') {
        return None;
    }
    let start = start.parse::<usize>().unwrap_or(0);
    let end = end.parse::<usize>().unwrap_or(0);
    Some((start, end))
}

pub fn select<T: Clone>(expression: &str, targets: &[T]) -> Vec<T> {
    parse_selection(expression, targets.len())
        .indices
        .into_iter()
        .map(|i| targets[i].clone())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn targets(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("http://t{}.onion", i)).collect()
    }

    #[test]
    fn all_returns_everything() {
        let t = targets(4);
        assert_eq!(select("all", &t), t);
        assert_eq!(select("  ALL \n", &t), t);
    }

    #[test]
    fn ranges_are_inclusive() {
        let t = targets(6);
        for a in 1..=6 {
            for b in a..=6 {
                let s = select(&format!("{}-{}", a, b), &t);
                assert_eq!(s.len(), b - a + 1);
                assert_eq!(s, t[a - 1..b].to_vec());
            }
        }
    }

    #[test]
    fn invalid_tokens_contribute_nothing() {
        let t = targets(3);
        assert!(select("0,999,abc", &t).is_empty());
        assert_eq!(parse_selection("0,999,abc", 3).dropped, 3);
    }

    #[test]
    fn order_and_duplicates_follow_the_expression() {
        let t = targets(5);
        assert_eq!(
            select("3,1,3,2-3", &t),
            vec![
                t[2].clone(),
                t[0].clone(),
                t[2].clone(),
                t[1].clone(),
                t[2].clone()
            ]
        );
    }

    #[test]
    fn ranges_clamp_to_list() {
        let t = targets(3);
        assert_eq!(select("0-2", &t), t[0..2].to_vec());
        assert_eq!(select("2-10", &t), t[1..3].to_vec());
        assert!(select("5-9", &t).is_empty());
    }

    #[test]
    fn malformed_ranges() {
        let t = targets(3);
        let sel = parse_selection("3-1,-2,1-x,1-2-3, 2 - 3 ", 3);
        assert_eq!(sel.indices, vec![0, 1]);
        assert_eq!(sel.dropped, 4);
        // a bad start endpoint reads as 0 and is clamped to the first target
        assert_eq!(select("-2", &t), t[0..2].to_vec());
        assert_eq!(select("x-3", &t), t.clone());
        // endpoints are not trimmed, so spaced ranges select nothing
        assert!(select("2 - 3", &t).is_empty());
        assert!(select("2-", &t).is_empty());
        assert_eq!(select("3-1", &t), Vec::<String>::new());
    }

    #[test]
    fn empty_tokens_are_ignored() {
        let sel = parse_selection("1,,2,", 2);
        assert_eq!(sel.indices, vec![0, 1]);
        assert_eq!(sel.dropped, 0);
        assert_eq!(parse_selection("", 2), Selection::default());
    }

    #[test]
    fn out_of_range_single_index() {
        let t = targets(1);
        assert!(select("2", &t).is_empty());
    }
}
