//! Checklist loading and the googlevideo cache target
//!
//! A checklist is a plain list of sites, one per line. Lines that are empty
//! or start with `/` are skipped. Every entry is reduced to its host and
//! probed as `https://<host>`.

use crate::error::{Error, Result};
use crate::target::Target;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

const CLUSTER_ALPHABET: &[u8; 37] = b"0123456789abcdefghijklmnopqrstuvwxyz-";
const CLUSTER_DECODED: &[u8; 37] = b"7elsz6dkry5cjqx4bipw3ahov29gnu08fmt1-";

/// Reduce a checklist entry to `https://<host>`
pub fn clean_url(entry: &str) -> String {
    let mut rest = entry.trim();
    for scheme in ["https://", "http://"] {
        if rest
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        {
            rest = &rest[scheme.len()..];
            break;
        }
    }
    let host = rest.split('/').next().unwrap_or(rest);
    format!("https://{host}")
}

/// Parse checklist text into unique normalized addresses, first occurrence wins
pub fn parse(source: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut addresses = Vec::new();

    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('/') {
            continue;
        }
        let address = clean_url(line);
        if address == "https://" {
            continue;
        }
        if seen.insert(address.clone()) {
            debug!(%address, "URL to check");
            addresses.push(address);
        }
    }

    addresses
}

/// Load a checklist file into targets
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<Target>> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| Error::Checklist {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let targets: Vec<Target> = parse(&source).into_iter().map(Target::new).collect();
    if targets.is_empty() {
        return Err(Error::Checklist {
            path: path.display().to_string(),
            message: "no sites to check".into(),
        });
    }

    info!(path = %path.display(), count = targets.len(), "Loaded checklist");
    Ok(targets)
}

/// Extract the cluster codename from a `report_mapping` response.
///
/// The body looks like `<client ip> => <codename> : ...`.
pub fn cluster_codename(body: &str) -> Option<&str> {
    body.split(' ').nth(2).filter(|word| !word.is_empty())
}

/// Turn a cluster codename into the address of its first cache node
pub fn google_cache_url(codename: &str) -> String {
    let decoded: String = codename
        .bytes()
        .filter_map(|b| {
            CLUSTER_ALPHABET
                .iter()
                .position(|a| *a == b)
                .map(|i| char::from(CLUSTER_DECODED[i]))
        })
        .collect();
    format!("https://rr1---sn-{decoded}.googlevideo.com")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_url() {
        assert_eq!(clean_url("https://example.com/path"), "https://example.com");
        assert_eq!(clean_url("HTTP://Example.com"), "https://Example.com");
        assert_eq!(clean_url("  rutracker.org  "), "https://rutracker.org");
        assert_eq!(clean_url("i.ytimg.com/vi/x.jpg"), "https://i.ytimg.com");
    }

    #[test]
    fn test_parse_skips_comments_and_duplicates() {
        let source = "/ video\nyoutube.com\n\nhttps://youtube.com/watch\n/discord.com\nx.com\n";
        assert_eq!(parse(source), vec!["https://youtube.com", "https://x.com"]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checklist.txt");
        std::fs::write(&path, "a.example\nb.example\n").unwrap();

        let targets = load(&path).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].address, "https://b.example");
        assert!(targets[0].pinned.is_none());
    }

    #[test]
    fn test_load_empty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "/ nothing\n").unwrap();
        assert!(matches!(load(&path), Err(Error::Checklist { .. })));
    }

    #[test]
    fn test_cluster_codename() {
        assert_eq!(cluster_codename("1.2.3.4 => fra16s05 : extra"), Some("fra16s05"));
        assert_eq!(cluster_codename("garbage"), None);
    }

    #[test]
    fn test_google_cache_url() {
        assert_eq!(google_cache_url("09az-"), "https://rr1---sn-7y51-.googlevideo.com");
        assert_eq!(google_cache_url("a:b"), "https://rr1---sn-5c.googlevideo.com");
    }
}
