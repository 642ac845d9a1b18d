//! Typo suggestions for undefined names

/// Levenshtein edit distance over bytes, using two rows
pub fn edit_distance(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Largest distance still worth suggesting for a name of this length
pub fn suggestion_threshold(name: &str) -> usize {
    match name.len() {
        0..=2 => 1,
        3..=5 => 2,
        _ => 3,
    }
}

/// Closest candidate within the threshold; ties keep the first seen
pub fn find_similar_name<'a, I>(name: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let threshold = suggestion_threshold(name);
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        if candidate == name {
            continue;
        }
        let distance = edit_distance(name, candidate);
        if distance <= threshold && best.is_none_or(|(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }
    best.map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("print", "print"), 0);
        assert_eq!(edit_distance("prnt", "print"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("Len", "len"), 1);
    }

    #[test]
    fn test_find_similar_name() {
        let names = ["print", "println", "push"];
        assert_eq!(find_similar_name("prnt", names), Some("print"));
        assert_eq!(find_similar_name("printn", names), Some("print"));
        assert_eq!(find_similar_name("zzzzzz", names), None);
    }

    #[test]
    fn test_exact_name_is_not_suggested() {
        assert_eq!(find_similar_name("len", ["len"]), None);
    }

    #[test]
    fn test_threshold_scales_with_length() {
        assert_eq!(suggestion_threshold("f"), 1);
        assert_eq!(suggestion_threshold("print"), 2);
        assert_eq!(suggestion_threshold("println"), 3);
    }
}
