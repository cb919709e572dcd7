// Conditional download of the published workbook.
//
// The workbook usually lives behind a share link that aggressive proxies
// love to cache, so every request carries no-cache headers plus a
// cache-busting query parameter. On our side the bytes are re-downloaded
// only when the change signal differs from the last fetch for that URL:
// ETag when the server provides one, else Last-Modified, else a coarse time
// bucket that forces a refresh once per interval. Network and HTTP errors
// propagate to the caller; retrying is the caller's decision.
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Mutex;
use std::time::Duration;

const GET_TIMEOUT: Duration = Duration::from_secs(45);
const HEAD_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
struct CachedFetch {
    signal: String,
    bytes: Vec<u8>,
}

/// Signal-keyed byte cache, one entry per URL.
#[derive(Debug, Default)]
pub struct FetchCache {
    entries: HashMap<String, CachedFetch>,
}

impl FetchCache {
    /// Cached bytes for `url`, provided the stored signal matches.
    pub fn lookup(&self, url: &str, signal: &str) -> Option<Vec<u8>> {
        self.entries
            .get(url)
            .filter(|e| e.signal == signal)
            .map(|e| e.bytes.clone())
    }

    /// Remember the bytes fetched for `url` under `signal`, replacing any
    /// previous entry for that URL.
    pub fn store(&mut self, url: &str, signal: &str, bytes: Vec<u8>) {
        self.entries.insert(
            url.to_string(),
            CachedFetch {
                signal: signal.to_string(),
                bytes,
            },
        );
    }
}

// Process-wide cache. The lock is only held around lookup/insert, never
// across the network call, so concurrent fetches of one URL are at worst a
// duplicate download.
static CACHE: Lazy<Mutex<FetchCache>> = Lazy::new(|| Mutex::new(FetchCache::default()));

/// Return the workbook bytes for `url`, downloading only when `signal`
/// differs from the previously observed one.
pub fn fetch_if_changed(url: &str, signal: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    if let Some(bytes) = CACHE.lock().unwrap().lookup(url, signal) {
        return Ok(bytes);
    }
    let bytes = download(url, signal)?;
    CACHE.lock().unwrap().store(url, signal, bytes.clone());
    Ok(bytes)
}

/// Compute the change signal for `url`: ETag, else Last-Modified, else a
/// time bucket of `refresh_secs`. A failing HEAD request degrades to the
/// time bucket; only the actual download can surface a fetch error.
pub fn change_signal(url: &str, refresh_secs: u64) -> String {
    match head_validator(url) {
        Ok(Some(validator)) => validator,
        _ => time_bucket(chrono::Utc::now().timestamp(), refresh_secs),
    }
}

/// Coarse fallback signal: constant within one refresh interval, different
/// across intervals, so the cache invalidates at least once per interval.
pub fn time_bucket(now_secs: i64, refresh_secs: u64) -> String {
    format!("t{}", now_secs / refresh_secs.max(1) as i64)
}

fn head_validator(url: &str) -> Result<Option<String>, reqwest::Error> {
    let client = Client::builder().timeout(HEAD_TIMEOUT).build()?;
    let resp = no_cache(client.head(url.trim())).send()?.error_for_status()?;
    let headers = resp.headers();
    let validator = headers
        .get(reqwest::header::ETAG)
        .or_else(|| headers.get(reqwest::header::LAST_MODIFIED))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Ok(validator)
}

fn download(url: &str, signal: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let client = Client::builder().timeout(GET_TIMEOUT).build()?;
    let final_url = with_cachebuster(url.trim(), signal);
    let resp = no_cache(client.get(final_url)).send()?.error_for_status()?;
    Ok(resp.bytes()?.to_vec())
}

fn no_cache(req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
    req.header("Cache-Control", "no-cache, no-store, max-age=0, must-revalidate")
        .header("Pragma", "no-cache")
        .header("Expires", "0")
}

/// Append the signal as a `_cb` query parameter, reduced to characters safe
/// in a query string (ETags carry quotes).
fn with_cachebuster(url: &str, signal: &str) -> String {
    let cb: String = signal.chars().filter(char::is_ascii_alphanumeric).collect();
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}_cb={cb}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_signal_hits_the_cache() {
        let mut cache = FetchCache::default();
        assert_eq!(cache.lookup("http://x/wb.xlsx", "\"etag-1\""), None);
        cache.store("http://x/wb.xlsx", "\"etag-1\"", vec![1, 2, 3]);
        assert_eq!(
            cache.lookup("http://x/wb.xlsx", "\"etag-1\""),
            Some(vec![1, 2, 3])
        );
    }

    #[test]
    fn changed_signal_misses_and_store_replaces() {
        let mut cache = FetchCache::default();
        cache.store("u", "t1", vec![1]);
        assert_eq!(cache.lookup("u", "t2"), None);
        cache.store("u", "t2", vec![2]);
        assert_eq!(cache.lookup("u", "t2"), Some(vec![2]));
        assert_eq!(cache.lookup("u", "t1"), None);
    }

    #[test]
    fn time_bucket_changes_once_per_interval() {
        assert_eq!(time_bucket(0, 300), time_bucket(299, 300));
        assert_ne!(time_bucket(299, 300), time_bucket(300, 300));
        // degenerate interval must not divide by zero
        assert_eq!(time_bucket(7, 0), "t7");
    }

    #[test]
    fn cachebuster_is_query_safe() {
        assert_eq!(
            with_cachebuster("http://x/wb.xlsx", "\"abc-1\""),
            "http://x/wb.xlsx?_cb=abc1"
        );
        assert_eq!(
            with_cachebuster("http://x/wb.xlsx?dl=1", "t42"),
            "http://x/wb.xlsx?dl=1&_cb=t42"
        );
    }
}
