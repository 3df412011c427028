// src/update.rs
//! Out-of-band version check. Purely informational: failures are logged and ignored.

use reqwest::Client;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    pub current: String,
    pub remote: String,
}

/// `x.y.z` as an integer triple; anything unparseable counts as `0.0.0`.
pub fn parse_version(s: &str) -> (u32, u32, u32) {
    let parts: Vec<u32> = s
        .trim()
        .split('.')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<u32>, _>>()
        .unwrap_or_default();
    match parts.as_slice() {
        [a, b, c] => (*a, *b, *c),
        _ => (0, 0, 0),
    }
}

/// `Some` only when `remote` is strictly newer than `current`.
pub fn compare(current: &str, remote: &str) -> Option<UpdateInfo> {
    (parse_version(current) < parse_version(remote)).then(|| UpdateInfo {
        current: current.trim().to_string(),
        remote: remote.trim().to_string(),
    })
}

pub async fn check_for_update(client: &Client, url: &str, current: &str) -> Option<UpdateInfo> {
    let res = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status());
    let body = match res {
        Ok(r) => r.text().await,
        Err(e) => Err(e),
    };
    match body {
        Ok(remote) => {
            let info = compare(current, &remote);
            tracing::debug!(current, remote = remote.trim(), update = info.is_some(), "version check");
            info
        }
        Err(e) => {
            tracing::warn!(error = ?e, url, "version check failed");
            None
        }
    }
}
