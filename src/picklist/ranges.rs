/// Collapses page numbers into a compact list such as `1-3, 5, 7-8`.
pub fn page_ranges(pages: &[usize]) -> String {
    let mut sorted = pages.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let (mut start, mut prev) = (first, first);
    for page in iter {
        if page != prev + 1 {
            parts.push(format_range(start, prev));
            start = page;
        }
        prev = page;
    }
    parts.push(format_range(start, prev));
    parts.join(", ")
}

fn format_range(start: usize, end: usize) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_consecutive_runs() {
        assert_eq!(page_ranges(&[5, 1, 2, 3, 8, 7]), "1-3, 5, 7-8");
    }

    #[test]
    fn single_and_empty() {
        assert_eq!(page_ranges(&[4]), "4");
        assert_eq!(page_ranges(&[]), "");
    }

    #[test]
    fn repeated_pages_are_listed_once() {
        assert_eq!(page_ranges(&[2, 2, 3]), "2-3");
    }
}
