/// Decimal gigabytes with one fraction digit, the way the drive list shows sizes.
pub fn format_decimal_gb(bytes: u64) -> String {
    if bytes == 0 {
        return "Unknown".to_string();
    }
    format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
}

/// Exact byte count from a `(500107862016 Bytes)` or `(31,457,280,000 bytes)`
/// parenthetical. Rounded display values never yield a count.
pub fn exact_bytes(text: &str) -> Option<u64> {
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let close = after.find(')')?;
        let inner = after[..close].trim();
        if let Some(number) = strip_suffix_ignore_case(inner, "bytes") {
            let digits: String = number.trim().chars().filter(|c| *c != ',').collect();
            if let Ok(value) = digits.parse::<u64>() {
                return Some(value);
            }
        }
        rest = &after[close + 1..];
    }
    None
}

/// `500.1 GB (500107862016 Bytes) (exactly 976773168 512-Byte-Units)` -> `500.1 GB`.
pub fn display_value(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.find(" (") {
        Some(idx) => trimmed[..idx].trim().to_string(),
        None => trimmed.to_string(),
    }
}

fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    if value.len() < suffix.len() {
        return None;
    }
    let split = value.len() - suffix.len();
    if !value.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = value.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}
