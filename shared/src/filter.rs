use crate::bands::normalize_mode;
use crate::callsign::{CallsignInfo, CallsignResolver, Continent};
use crate::spots::Report;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::BTreeSet;

/// Optional filter criteria. An empty set (or `None`) means the criterion is not applied, so
/// `FilterConfig::default()` matches every report.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    /// Only has an effect together with a non-empty `watchlist`.
    pub watchlist_only: bool,
    pub watchlist: BTreeSet<String>,
    pub exclude_list: BTreeSet<String>,
    pub cq_zones: BTreeSet<u8>,
    pub itu_zones: BTreeSet<u8>,
    pub continents: BTreeSet<Continent>,
    pub bands: BTreeSet<String>,
    pub modes: BTreeSet<String>,
    pub callsign: Option<String>,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        !self.watchlist_active()
            && self.exclude_list.is_empty()
            && self.cq_zones.is_empty()
            && self.itu_zones.is_empty()
            && self.continents.is_empty()
            && self.bands.is_empty()
            && self.modes.is_empty()
            && self.callsign_needle().is_none()
    }

    fn watchlist_active(&self) -> bool {
        self.watchlist_only && !self.watchlist.is_empty()
    }

    fn callsign_needle(&self) -> Option<String> {
        self.callsign
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_ascii_uppercase)
    }
}

/// Conjunction of every configured criterion. Zone and continent criteria read the origin
/// station's metadata and exclude the report when that metadata is unknown.
///
/// The continent criterion is asymmetric: the origin must be inside the selected set and the
/// destination must resolve to a continent outside it, which keeps only paths leaving the
/// watched continents.
pub fn matches<R>(report: &Report, config: &FilterConfig, resolver: &R) -> bool
where
    R: CallsignResolver + ?Sized,
{
    let origin_cell = OnceCell::new();
    let origin =
        || -> CallsignInfo { *origin_cell.get_or_init(|| resolver.resolve(&report.origin_call)) };

    if config.watchlist_active() && !either_call_has_prefix(report, &config.watchlist) {
        return false;
    }

    if !config.exclude_list.is_empty() && either_call_has_prefix(report, &config.exclude_list) {
        return false;
    }

    if !config.cq_zones.is_empty()
        && !origin().cq_zone.is_some_and(|z| config.cq_zones.contains(&z))
    {
        return false;
    }

    if !config.itu_zones.is_empty()
        && !origin().itu_zone.is_some_and(|z| config.itu_zones.contains(&z))
    {
        return false;
    }

    if !config.continents.is_empty() {
        if !origin().continent.is_some_and(|c| config.continents.contains(&c)) {
            return false;
        }
        let destination = resolver.resolve(&report.destination_call);
        if !destination.continent.is_some_and(|c| !config.continents.contains(&c)) {
            return false;
        }
    }

    if !config.bands.is_empty()
        && !report
            .band
            .is_some_and(|band| config.bands.iter().any(|b| b.trim().eq_ignore_ascii_case(band)))
    {
        return false;
    }

    if !config.modes.is_empty()
        && !report
            .mode
            .as_deref()
            .is_some_and(|mode| config.modes.iter().any(|m| normalize_mode(m) == mode))
    {
        return false;
    }

    if let Some(needle) = config.callsign_needle()
        && !report.origin_call.contains(&needle)
        && !report.destination_call.contains(&needle)
    {
        return false;
    }

    true
}

fn either_call_has_prefix(report: &Report, prefixes: &BTreeSet<String>) -> bool {
    prefixes
        .iter()
        .map(|p| p.trim().to_ascii_uppercase())
        .filter(|p| !p.is_empty())
        .any(|p| report.origin_call.starts_with(&p) || report.destination_call.starts_with(&p))
}
