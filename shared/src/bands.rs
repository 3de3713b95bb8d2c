use regex::Regex;
use std::sync::LazyLock;

/// Amateur band edges in Hz, inclusive on both ends.
const BAND_PLAN: &[(u64, u64, &str)] = &[
    (135_700, 137_800, "2200m"),
    (472_000, 479_000, "630m"),
    (1_800_000, 2_000_000, "160m"),
    (3_500_000, 4_000_000, "80m"),
    (5_250_000, 5_450_000, "60m"),
    (7_000_000, 7_300_000, "40m"),
    (10_100_000, 10_150_000, "30m"),
    (14_000_000, 14_350_000, "20m"),
    (18_068_000, 18_168_000, "17m"),
    (21_000_000, 21_450_000, "15m"),
    (24_890_000, 24_990_000, "12m"),
    (28_000_000, 29_700_000, "10m"),
    (50_000_000, 54_000_000, "6m"),
    (70_000_000, 70_500_000, "4m"),
    (144_000_000, 148_000_000, "2m"),
    (222_000_000, 225_000_000, "1.25m"),
    (420_000_000, 450_000_000, "70cm"),
    (1_240_000_000, 1_300_000_000, "23cm"),
];

static MODE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(FT8|FT4|CW|SSB|USB|LSB|RTTY|PSK31|PSK63|PSK|JT65|JT9|WSPR|MSK144|JS8|Q65|FST4W?|OLIVIA|SSTV|FM|AM)\b",
    )
    .expect("Invalid regex")
});

pub fn band_for_frequency(frequency_hz: u64) -> Option<&'static str> {
    BAND_PLAN
        .iter()
        .find(|(low, high, _)| (*low..=*high).contains(&frequency_hz))
        .map(|(_, _, band)| *band)
}

/// Picks the first recognised mode token out of a free-text spot comment.
/// Sideband designators are reported as `SSB`.
pub fn mode_from_comment(comment: &str) -> Option<String> {
    MODE_REGEX
        .captures(comment)?
        .get(1)
        .map(|m| normalize_mode(m.as_str()))
}

/// Uppercases a mode label and folds sideband designators, so configured filters and
/// detected modes compare equal.
pub fn normalize_mode(mode: &str) -> String {
    let upper = mode.trim().to_ascii_uppercase();
    match upper.as_str() {
        "USB" | "LSB" => "SSB".to_string(),
        _ => upper,
    }
}
