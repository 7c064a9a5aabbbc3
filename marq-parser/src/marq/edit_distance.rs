//! Edit distance and nearest-name lookup for unknown-command suggestions.

/// Classic dynamic-programming edit distance (insert/delete/replace, all
/// cost 1).
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            let substitution = prev[j - 1] + usize::from(a[i - 1] != b[j - 1]);
            cur[j] = substitution.min(prev[j] + 1).min(cur[j - 1] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// The unique candidate closest to `actual`, if it is close enough to be a
/// plausible typo: distance at most 2 and at most a third of the name.
pub fn nearest_name<'a, I>(actual: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<&str> = None;
    let mut best_delta = usize::MAX;
    let mut ties = 0;

    for candidate in candidates {
        if candidate == actual {
            continue;
        }
        let delta = edit_distance(actual, candidate);
        if delta < best_delta {
            best = Some(candidate);
            best_delta = delta;
            ties = 1;
        } else if delta == best_delta {
            ties += 1;
        }
    }

    if ties == 1 && best_delta <= 2 && best_delta <= actual.chars().count() / 3 {
        best
    } else {
        None
    }
}
