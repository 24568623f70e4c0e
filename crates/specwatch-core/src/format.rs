//! Plain-text rendering of registry listings for front-ends.

use specwatch_registry::{Endpoint, Snapshot};

/// Numbered list of monitored URLs, as shown by `list`.
///
/// # Example
///
/// ```rust
/// use specwatch_core::format::format_endpoint_list;
///
/// assert_eq!(
///     format_endpoint_list(&[]),
///     "No endpoints are being monitored in this channel."
/// );
/// ```
pub fn format_endpoint_list(endpoints: &[Endpoint]) -> String {
    if endpoints.is_empty() {
        return "No endpoints are being monitored in this channel.".to_string();
    }

    let lines: Vec<String> = endpoints
        .iter()
        .enumerate()
        .map(|(i, endpoint)| {
            let paused = if endpoint.enabled { "" } else { " (paused)" };
            format!("{}. {}{}", i + 1, endpoint.url, paused)
        })
        .collect();

    format!(
        "Currently monitoring {} endpoint(s):\n\n{}",
        endpoints.len(),
        lines.join("\n")
    )
}

/// One line per snapshot: fetch time and digest prefix, oldest first.
pub fn format_history(url: &str, snapshots: &[Snapshot]) -> String {
    if snapshots.is_empty() {
        return format!("No snapshots stored for {url}.");
    }

    let mut out = format!("{} snapshot(s) for {url}:\n", snapshots.len());
    for snapshot in snapshots {
        out.push_str(&format!(
            "\n{}  {}",
            snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S%.3f UTC"),
            snapshot.digest.short()
        ));
    }
    out
}
