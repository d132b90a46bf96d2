//! HEAD Content-Length probe.
//!
//! Lets the quota gate stop an item whose size would cross the ceiling
//! before any bytes are transferred. Best-effort: servers that block HEAD
//! or omit Content-Length simply yield None and the commit-time quota
//! reservation stays authoritative.

use std::str;
use std::time::Duration;

/// Returns the advertised Content-Length for `url`, or None when the server
/// does not reveal one. Never fails the item: probe errors are logged and
/// treated as unknown size.
pub fn probe_content_length(url: &str, user_agent: &str) -> Option<u64> {
    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).ok()?;
    easy.nobody(true).ok()?; // HEAD request
    easy.follow_location(true).ok()?;
    easy.useragent(user_agent).ok()?;
    easy.connect_timeout(Duration::from_secs(15)).ok()?;
    easy.timeout(Duration::from_secs(30)).ok()?;

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })
            .ok()?;
        if let Err(e) = transfer.perform() {
            tracing::debug!(url, "HEAD probe failed: {}", e);
            return None;
        }
    }

    let code = easy.response_code().ok()?;
    if !(200..300).contains(&code) {
        tracing::debug!(url, code, "HEAD probe rejected");
        return None;
    }

    parse_content_length(&headers)
}

fn parse_content_length(headers: &[String]) -> Option<u64> {
    // Redirect chains repeat headers; the last Content-Length wins.
    headers
        .iter()
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<u64>().ok()
            } else {
                None
            }
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_last_content_length() {
        let headers = vec![
            "HTTP/1.1 302 Found".to_string(),
            "Content-Length: 0".to_string(),
            "HTTP/1.1 200 OK".to_string(),
            "Content-Length: 4096".to_string(),
        ];
        assert_eq!(parse_content_length(&headers), Some(4096));
    }

    #[test]
    fn missing_header_is_none() {
        let headers = vec!["HTTP/1.1 200 OK".to_string()];
        assert_eq!(parse_content_length(&headers), None);
    }

    #[test]
    fn case_insensitive_header_name() {
        let headers = vec!["content-length: 17".to_string()];
        assert_eq!(parse_content_length(&headers), Some(17));
    }
}
