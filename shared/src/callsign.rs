use crate::error::PrefixTableError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Continent {
    AF,
    AN,
    AS,
    EU,
    NA,
    OC,
    SA,
}

impl FromStr for Continent {
    type Err = PrefixTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AF" => Ok(Continent::AF),
            "AN" => Ok(Continent::AN),
            "AS" => Ok(Continent::AS),
            "EU" => Ok(Continent::EU),
            "NA" => Ok(Continent::NA),
            "OC" => Ok(Continent::OC),
            "SA" => Ok(Continent::SA),
            other => Err(PrefixTableError::UnknownContinent(other.to_string())),
        }
    }
}

impl fmt::Display for Continent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Geographic metadata for a callsign. Any field may be unknown.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallsignInfo {
    pub cq_zone: Option<u8>,
    pub itu_zone: Option<u8>,
    pub continent: Option<Continent>,
}

impl CallsignInfo {
    pub const fn new(cq_zone: u8, itu_zone: u8, continent: Continent) -> Self {
        Self {
            cq_zone: Some(cq_zone),
            itu_zone: Some(itu_zone),
            continent: Some(continent),
        }
    }
}

pub trait CallsignResolver {
    /// Never fails; unresolvable fields come back as `None`.
    fn resolve(&self, callsign: &str) -> CallsignInfo;
}

impl<F> CallsignResolver for F
where
    F: Fn(&str) -> CallsignInfo,
{
    fn resolve(&self, callsign: &str) -> CallsignInfo {
        self(callsign)
    }
}

/// Suffixes that never carry location information.
const OPERATING_SUFFIXES: &[&str] = &["P", "M", "MM", "AM", "QRP", "A", "B", "LH"];

/// Reduces a callsign to the part whose prefix identifies the operating entity:
/// `G0XYZ/P` -> `G0XYZ`, `EA8/G0XYZ` -> `EA8`.
pub fn base_callsign(callsign: &str) -> String {
    let upper = callsign.trim().to_ascii_uppercase();
    let parts: Vec<&str> = upper
        .split('/')
        .filter(|p| !p.is_empty() && !OPERATING_SUFFIXES.contains(p) && !is_call_area(p))
        .collect();

    match parts.as_slice() {
        [] => upper.clone(),
        [single] => (*single).to_string(),
        many => many
            .iter()
            .min_by_key(|p| p.len())
            .map_or_else(|| upper.clone(), |p| (*p).to_string()),
    }
}

// `K1ABC/4` keeps the home prefix.
fn is_call_area(part: &str) -> bool {
    part.len() == 1 && part.chars().all(|c| c.is_ascii_digit())
}

/// Longest-prefix lookup table from callsign prefix to zone/continent.
#[derive(Debug, Clone, Default)]
pub struct PrefixTable {
    // Sorted by descending prefix length so the first hit is the longest match.
    entries: Vec<(String, CallsignInfo)>,
}

impl PrefixTable {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, CallsignInfo)>,
        S: AsRef<str>,
    {
        let mut entries: Vec<(String, CallsignInfo)> = entries
            .into_iter()
            .map(|(prefix, info)| (prefix.as_ref().trim().to_ascii_uppercase(), info))
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { entries }
    }

    /// Parses `PREFIX,CQ,ITU,CONTINENT` lines. Blank lines and lines starting with `#` are
    /// skipped.
    pub fn parse(contents: &str) -> Result<Self, PrefixTableError> {
        let mut entries = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [prefix, cq, itu, continent] = fields.as_slice() else {
                return Err(PrefixTableError::FieldCount {
                    line: index + 1,
                    found: fields.len(),
                });
            };
            let parse_zone = |value: &str| -> Result<Option<u8>, PrefixTableError> {
                if value.is_empty() {
                    return Ok(None);
                }
                value
                    .parse()
                    .map(Some)
                    .map_err(|source| PrefixTableError::Zone {
                        line: index + 1,
                        source,
                    })
            };
            let info = CallsignInfo {
                cq_zone: parse_zone(cq)?,
                itu_zone: parse_zone(itu)?,
                continent: if continent.is_empty() {
                    None
                } else {
                    Some(continent.parse()?)
                },
            };
            entries.push(((*prefix).to_string(), info));
        }
        Ok(Self::from_entries(entries))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PrefixTableError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Common prefixes only; zones follow the entity's primary zone, so large countries
    /// spanning several zones resolve approximately.
    pub fn builtin() -> Self {
        use Continent::{AF, AS, EU, NA, OC, SA};
        let rows: &[(&str, u8, u8, Continent)] = &[
            // North America
            ("K", 5, 8, NA),
            ("W", 5, 8, NA),
            ("N", 5, 8, NA),
            ("AA", 5, 8, NA),
            ("AB", 5, 8, NA),
            ("AC", 5, 8, NA),
            ("AD", 5, 8, NA),
            ("AE", 5, 8, NA),
            ("AF", 5, 8, NA),
            ("AG", 5, 8, NA),
            ("AI", 5, 8, NA),
            ("AJ", 5, 8, NA),
            ("AK", 5, 8, NA),
            ("K0", 4, 7, NA),
            ("W0", 4, 7, NA),
            ("N0", 4, 7, NA),
            ("K5", 4, 7, NA),
            ("W5", 4, 7, NA),
            ("N5", 4, 7, NA),
            ("K6", 3, 6, NA),
            ("W6", 3, 6, NA),
            ("N6", 3, 6, NA),
            ("K7", 3, 6, NA),
            ("W7", 3, 6, NA),
            ("N7", 3, 6, NA),
            ("K8", 4, 8, NA),
            ("W8", 4, 8, NA),
            ("N8", 4, 8, NA),
            ("K9", 4, 8, NA),
            ("W9", 4, 8, NA),
            ("N9", 4, 8, NA),
            ("KH6", 31, 61, OC),
            ("KL7", 1, 1, NA),
            ("KP4", 8, 11, NA),
            ("VE", 5, 9, NA),
            ("VA", 5, 9, NA),
            ("VE7", 3, 2, NA),
            ("VO1", 5, 9, NA),
            ("XE", 6, 10, NA),
            ("CO", 8, 11, NA),
            ("VP9", 5, 11, NA),
            // Europe
            ("G", 14, 27, EU),
            ("M", 14, 27, EU),
            ("2E", 14, 27, EU),
            ("GM", 14, 27, EU),
            ("GW", 14, 27, EU),
            ("GI", 14, 27, EU),
            ("EI", 14, 27, EU),
            ("F", 14, 27, EU),
            ("D", 14, 28, EU),
            ("I", 15, 28, EU),
            ("EA", 14, 37, EU),
            ("CT", 14, 37, EU),
            ("ON", 14, 27, EU),
            ("PA", 14, 27, EU),
            ("OZ", 14, 18, EU),
            ("SM", 14, 18, EU),
            ("LA", 14, 18, EU),
            ("OH", 15, 18, EU),
            ("SP", 15, 28, EU),
            ("OK", 15, 28, EU),
            ("OE", 15, 28, EU),
            ("HB", 14, 28, EU),
            ("HA", 15, 28, EU),
            ("YO", 20, 28, EU),
            ("LZ", 20, 28, EU),
            ("SV", 20, 28, EU),
            ("9A", 15, 28, EU),
            ("S5", 15, 28, EU),
            ("YU", 15, 28, EU),
            ("UR", 16, 29, EU),
            ("UA", 16, 29, EU),
            ("R", 16, 29, EU),
            ("TA", 20, 39, EU),
            // Asia
            ("UA9", 17, 30, AS),
            ("R9", 17, 30, AS),
            ("UA0", 19, 32, AS),
            ("R0", 19, 32, AS),
            ("J", 25, 45, AS),
            ("JT", 23, 32, AS),
            ("JY", 20, 39, AS),
            ("B", 24, 44, AS),
            ("BV", 24, 44, AS),
            ("HL", 25, 44, AS),
            ("DS", 25, 44, AS),
            ("VU", 22, 41, AS),
            ("4X", 20, 39, AS),
            ("HZ", 21, 39, AS),
            ("A4", 21, 39, AS),
            ("A6", 21, 39, AS),
            ("A7", 21, 39, AS),
            ("9V", 28, 54, AS),
            ("HS", 26, 49, AS),
            // Oceania
            ("VK", 30, 59, OC),
            ("ZL", 32, 60, OC),
            ("DU", 27, 50, OC),
            ("YB", 28, 51, OC),
            // South America
            ("PY", 11, 15, SA),
            ("PP", 11, 15, SA),
            ("PT", 11, 15, SA),
            ("PU", 11, 15, SA),
            ("LU", 13, 14, SA),
            ("CE", 12, 14, SA),
            ("CX", 13, 14, SA),
            ("HK", 9, 12, SA),
            ("YV", 9, 12, SA),
            ("OA", 10, 12, SA),
            // Africa
            ("ZS", 38, 57, AF),
            ("5Z", 37, 48, AF),
            ("CN", 33, 37, AF),
            ("SU", 34, 38, AF),
            ("EA8", 33, 36, AF),
            ("D4", 35, 46, AF),
        ];

        Self::from_entries(
            rows.iter()
                .map(|(prefix, cq, itu, continent)| (*prefix, CallsignInfo::new(*cq, *itu, *continent))),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CallsignResolver for PrefixTable {
    fn resolve(&self, callsign: &str) -> CallsignInfo {
        let base = base_callsign(callsign);
        self.entries
            .iter()
            .find(|(prefix, _)| base.starts_with(prefix.as_str()))
            .map(|(_, info)| *info)
            .unwrap_or_default()
    }
}
