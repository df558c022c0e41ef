const UNITS: &[&str] = &["KiB", "MiB", "GiB", "TiB", "PiB"];

const GRAPH_FILL: char = '#';
const GRAPH_BLANK: char = ' ';

/// Renders `fraction` as a bar of exactly `length` characters.
///
/// The fraction is clamped to `[0, 1]` (NaN counts as 0) and the number of
/// filled cells is rounded half to even.
pub fn percent_to_graph(fraction: f64, length: usize) -> String {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let hashes = ((fraction * length as f64).round_ties_even() as usize).min(length);
    let spaces = length - hashes;

    let mut graph = String::with_capacity(length);
    graph.extend(std::iter::repeat(GRAPH_FILL).take(hashes));
    graph.extend(std::iter::repeat(GRAPH_BLANK).take(spaces));
    graph
}

/// Turns 1,025 KiB into "1.00 MiB", for example.
///
/// A value is only promoted to the next unit while it is strictly greater
/// than 1024, so exactly 1024 KiB prints as "1024.00 KiB" rather than
/// "1.00 MiB". Anything past the PiB range stays in PiB.
pub fn bytes_to_human_readable(kibibytes: u64, decimal_places: usize) -> String {
    let mut value = kibibytes as f64;
    let mut unit = 0;
    while value > 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.decimal_places$} {}", UNITS[unit])
}

/// `part / whole`, or 0 when there is nothing to divide by.
pub fn fraction_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

pub fn format_percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}
