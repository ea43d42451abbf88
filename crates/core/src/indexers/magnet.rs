//! Magnet URI parsing.

use url::Url;

/// Fields read from a magnet link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetInfo {
    /// Lowercase 40-hex BitTorrent info hash.
    pub info_hash: String,
    /// Display name (`dn`), already percent-decoded.
    pub display_name: Option<String>,
}

/// Parse a `magnet:?xt=urn:btih:...` link.
///
/// Accepts hex (40 chars) and base32 (32 chars) info hashes. Returns `None`
/// for anything else.
pub fn parse_magnet(uri: &str) -> Option<MagnetInfo> {
    let url = Url::parse(uri.trim()).ok()?;
    if url.scheme() != "magnet" {
        return None;
    }

    let mut info_hash = None;
    let mut display_name = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "xt" if info_hash.is_none() => {
                info_hash = value
                    .strip_prefix("urn:btih:")
                    .or_else(|| value.strip_prefix("URN:BTIH:"))
                    .and_then(normalize_info_hash);
            }
            "dn" if display_name.is_none() => {
                let name = value.trim();
                if !name.is_empty() {
                    display_name = Some(name.to_string());
                }
            }
            _ => {}
        }
    }

    Some(MagnetInfo {
        info_hash: info_hash?,
        display_name,
    })
}

/// Lowercase hex form of an info hash given in hex or base32.
pub fn normalize_info_hash(hash: &str) -> Option<String> {
    let hash = hash.trim();
    match hash.len() {
        40 if hash.chars().all(|c| c.is_ascii_hexdigit()) => Some(hash.to_ascii_lowercase()),
        32 => base32_to_hex(hash),
        _ => None,
    }
}

fn base32_to_hex(input: &str) -> Option<String> {
    let mut out = String::with_capacity(40);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for c in input.chars() {
        let c = c.to_ascii_uppercase();
        let value = match c {
            'A'..='Z' => c as u32 - 'A' as u32,
            '2'..='7' => c as u32 - '2' as u32 + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push_str(&format!("{:02x}", (buffer >> bits) & 0xff));
            buffer &= (1 << bits) - 1;
        }
    }

    (out.len() == 40).then_some(out)
}
