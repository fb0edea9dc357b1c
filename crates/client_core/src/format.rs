const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human readable size: the largest unit whose scaled value is at least 1,
/// rounded to two decimals without trailing zeros.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut divisor: u64 = 1;
    while unit + 1 < SIZE_UNITS.len() && bytes / divisor >= 1024 {
        divisor *= 1024;
        unit += 1;
    }

    let scaled = (bytes as f64 / divisor as f64 * 100.0).round() / 100.0;
    format!("{scaled} {}", SIZE_UNITS[unit])
}
