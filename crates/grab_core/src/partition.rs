/// One URL per non-empty line, trimmed.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Deal `urls` round-robin into `groups` buckets: url `i` lands in bucket
/// `i % groups`. Zero groups is treated as one. Trailing empty buckets are
/// dropped, so the result never holds more buckets than urls.
pub fn partition_round_robin<T: Clone>(urls: &[T], groups: usize) -> Vec<Vec<T>> {
    let groups = groups.max(1).min(urls.len().max(1));
    let mut buckets: Vec<Vec<T>> = vec![Vec::new(); groups];
    for (i, url) in urls.iter().enumerate() {
        buckets[i % groups].push(url.clone());
    }
    buckets.retain(|bucket| !bucket.is_empty());
    buckets
}
