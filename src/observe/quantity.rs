// src/observe/quantity.rs - Kubernetes resource quantity parsing

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// CPU quantity in millicores. Metrics-server reports nanocore strings like
/// `156481394n`; requests are usually `500m` or whole cores.
pub fn parse_millicores(quantity: &Quantity) -> i64 {
    (parse_value(&quantity.0) * 1000.0).round() as i64
}

/// Memory (or any byte-denominated) quantity in bytes.
pub fn parse_bytes(quantity: &Quantity) -> i64 {
    parse_value(&quantity.0).round() as i64
}

/// Decode a quantity string into its plain numeric value. Unknown suffixes
/// parse as zero rather than poisoning a whole snapshot.
fn parse_value(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }

    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e' || c == 'E'))
        .unwrap_or(raw.len());
    // 'e' may open an exponent rather than a suffix ("1e3" vs "1Ei")
    let (number, suffix) = match raw[split..].chars().next() {
        Some('i') if split > 0 => {
            // binary suffix whose first letter was eaten as an exponent char
            let start = split - 1;
            (&raw[..start], &raw[start..])
        }
        _ => (&raw[..split], &raw[split..]),
    };

    let value: f64 = match number.parse() {
        Ok(v) => v,
        Err(_) => return 0.0,
    };

    let multiplier: f64 = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024.0_f64.powi(2),
        "Gi" => 1024.0_f64.powi(3),
        "Ti" => 1024.0_f64.powi(4),
        "Pi" => 1024.0_f64.powi(5),
        "Ei" => 1024.0_f64.powi(6),
        _ => return 0.0,
    };

    value * multiplier
}
