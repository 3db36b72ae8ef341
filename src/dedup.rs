use std::collections::HashSet;

use crate::record::Record;

/// Keep the first record per url, then drop urls the store already holds.
pub fn new_records(candidates: Vec<Record>, known: &HashSet<String>) -> Vec<Record> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|r| seen.insert(r.url.clone()))
        .filter(|r| !known.contains(&r.url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.url.as_str()).collect()
    }

    #[test]
    fn first_occurrence_wins() {
        let batch = vec![
            Record::new("https://x.com/a", "first", "2024-01-01"),
            Record::new("https://x.com/b", "b", "2024-01-01"),
            Record::new("https://x.com/a", "second", "2024-01-02"),
        ];
        let out = new_records(batch, &HashSet::new());
        assert_eq!(urls(&out), ["https://x.com/a", "https://x.com/b"]);
        assert_eq!(out[0].title, "first");
    }

    #[test]
    fn known_urls_are_dropped() {
        let known: HashSet<String> = ["https://x.com/b".to_string()].into();
        let batch = vec![
            Record::new("https://x.com/c", "c", "2024-01-01"),
            Record::new("https://x.com/b", "b", "2024-01-01"),
            Record::new("https://x.com/a", "a", "2024-01-01"),
        ];
        assert_eq!(urls(&new_records(batch, &known)), ["https://x.com/c", "https://x.com/a"]);
    }

    #[test]
    fn identity_is_exact() {
        let known: HashSet<String> = ["https://x.com/a".to_string()].into();
        let batch = vec![
            Record::new("https://x.com/a/", "slash", "2024-01-01"),
            Record::new("https://X.com/a", "case", "2024-01-01"),
        ];
        assert_eq!(new_records(batch, &known).len(), 2);
    }
}
