//! Parsing for pipermail-style mailing-list archives
//!
//! The archive index links one text file per month, newest first. Each
//! file is an mbox: messages separated by `From <user> at <host> <date>`
//! lines. Messages are reduced to a short summary whose SHA-512 is the
//! identity used for dedup.

use std::io::Read;
use std::sync::LazyLock;

use chrono::DateTime;
use flate2::read::GzDecoder;
use regex::Regex;
use sha2::{Digest, Sha512};

use crate::detect::Message;
use crate::LookoutError;

static INDEX_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("valid cell pattern"));

static INDEX_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#).expect("valid anchor pattern")
});

/// mbox separator, e.g. `From jdoe at icecube.wisc.edu  Mon May  6 10:00:00 2024`
static MBOX_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^From \w*.\w* at \w*.\w*.\w* *\w*").expect("valid separator pattern")
});

/// Everything after this line is an attachment
const ATTACHMENT_MARKER: &str = "-------------- next part --------------";

/// Month links from the archive index, in page order (newest first)
pub fn parse_index(html: &str) -> Vec<String> {
    let mut links = Vec::new();
    for cell in INDEX_CELL.captures_iter(html) {
        for a in INDEX_ANCHOR.captures_iter(&cell[1]) {
            let href = &a[1];
            if href.ends_with(".txt") || href.ends_with(".txt.gz") {
                links.push(href.to_string());
            }
        }
    }
    links
}

/// Decode a downloaded month file, gunzipping `.gz` links
pub fn decode_group(link: &str, body: &[u8]) -> crate::Result<String> {
    if link.ends_with(".gz") {
        let mut text = String::new();
        GzDecoder::new(body)
            .read_to_string(&mut text)
            .map_err(|e| LookoutError::Parse(format!("Cannot decompress {}: {}", link, e)))?;
        Ok(text)
    } else {
        Ok(String::from_utf8_lossy(body).into_owned())
    }
}

/// SHA-512 of the text, hex encoded
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha512::digest(text.as_bytes()))
}

/// Split a month file into normalised messages in file order.
///
/// Messages that normalise to nothing (e.g. blank trailing chunks) are
/// dropped.
pub fn parse_group(text: &str, subject_tag: Option<&str>) -> Vec<Message> {
    let mut chunks: Vec<Vec<&str>> = vec![Vec::new()];
    for line in text.split('\n') {
        if MBOX_SEPARATOR.is_match(line) {
            chunks.push(Vec::new());
        } else if let Some(chunk) = chunks.last_mut() {
            chunk.push(line);
        }
    }

    let messages: Vec<Message> = chunks
        .iter()
        .map(|lines| normalize_message(lines, subject_tag))
        .filter(|text| !text.is_empty())
        .map(|text| Message {
            hash: content_hash(&text),
            text,
        })
        .collect();

    tracing::debug!("Parsed {} messages", messages.len());
    messages
}

/// Reduce one raw message to `From:`, `Date:` and `Subject:` lines plus
/// the trimmed body
pub fn normalize_message(lines: &[&str], subject_tag: Option<&str>) -> String {
    let mut in_header = true;
    let mut sender = None;
    let mut date = None;
    let mut subject = None;
    let mut body = String::new();

    for line in lines {
        let line = line.trim();
        if in_header {
            if line.is_empty() {
                in_header = false;
            } else if let Some(value) = line.strip_prefix("From:") {
                sender = Some(normalize_sender(value));
            } else if let Some(value) = line.strip_prefix("Date:") {
                date = Some(normalize_date(value.trim()));
            } else if let Some(value) = line.strip_prefix("Subject:") {
                let value = match subject_tag {
                    Some(tag) if !tag.is_empty() => value.replace(tag, ""),
                    _ => value.to_string(),
                };
                subject = Some(value.trim().to_string());
            }
        } else if line.starts_with(ATTACHMENT_MARKER) {
            break;
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }

    let mut out = String::new();
    if let Some(sender) = sender.filter(|s| !s.is_empty()) {
        out.push_str(&format!("From: {}\n", sender));
    }
    if let Some(date) = date.filter(|d| !d.is_empty()) {
        out.push_str(&format!("Date: {}\n", date));
    }
    if let Some(subject) = subject.filter(|s| !s.is_empty()) {
        out.push_str(&format!("Subject: {}\n", subject));
    }
    let body = body.trim();
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
    }
    out
}

/// `jdoe at example.org (Jane Doe)` becomes `Jane Doe`; without a
/// display name the obfuscated address is restored
fn normalize_sender(value: &str) -> String {
    let value = value.trim().replace(" at ", "@");
    if let (Some(open), Some(close)) = (value.find('('), value.rfind(')')) {
        if open < close {
            return value[open + 1..close].trim().to_string();
        }
    }
    value
}

/// RFC 2822 dates are converted to UTC; anything else is kept as written
fn normalize_date(value: &str) -> String {
    match DateTime::parse_from_rfc2822(value) {
        Ok(date) => format!(
            "{} UTC",
            date.naive_utc().format("%Y-%m-%dT%H:%M:%S")
        ),
        Err(e) => {
            tracing::debug!("Keeping unparseable date {:?}: {}", value, e);
            value.to_string()
        }
    }
}
