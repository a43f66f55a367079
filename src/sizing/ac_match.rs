//! AC block selection under the DC:AC design rule.
//!
//! Finding nothing is an ordinary outcome (`None`), not an error; callers can
//! ask [`AcBlockMatcher::suggest_adjustments`] for nearby DC counts that do
//! match.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::catalog::AcBlockTemplate;

/// No AC block may be assigned exactly this many DC blocks.
pub const EXCLUDED_DC_BLOCKS_PER_AC_BLOCK: u32 = 3;

/// Every AC block carries at least this many DC blocks.
pub const MIN_DC_BLOCKS_PER_AC_BLOCK: u32 = 1;

/// Default number of quantities scanned above the minimum.
pub const DEFAULT_SEARCH_EXTRA: u32 = 40;

/// Maximum number of suggestions returned.
pub const MAX_SUGGESTIONS: usize = 3;

const MW_TOLERANCE: f64 = 1e-9;

/// How DC blocks are spread over AC blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcStrategy {
    /// Containers only, the same count behind every AC block.
    ContainerOnly,
    /// Containers and cabinets; counts per AC block may differ by one.
    Mixed,
}

/// A selected AC block quantity and layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcBlockConfiguration {
    pub strategy: AcStrategy,
    pub ac_block_qty: u32,
    pub rated_mw: f64,
    pub pcs_units: u32,
    pub pcs_unit_kw: f64,
    /// Uniform DC blocks per AC block (container-only strategy).
    pub dc_blocks_per_ac_block: Option<u32>,
    pub dc_blocks_per_ac_block_base: u32,
    pub dc_blocks_per_ac_block_max: u32,
    pub total_ac_mw: f64,
    pub oversize_mw: f64,
}

impl AcBlockConfiguration {
    fn new(
        strategy: AcStrategy,
        template: &AcBlockTemplate,
        qty: u32,
        base: u32,
        max: u32,
        poi_mw: f64,
    ) -> Self {
        let rated_mw = template.rated_mw();
        let total_ac_mw = f64::from(qty) * rated_mw;
        Self {
            strategy,
            ac_block_qty: qty,
            rated_mw,
            pcs_units: template.pcs_units,
            pcs_unit_kw: template.pcs_unit_kw,
            dc_blocks_per_ac_block: (strategy == AcStrategy::ContainerOnly).then_some(base),
            dc_blocks_per_ac_block_base: base,
            dc_blocks_per_ac_block_max: max,
            total_ac_mw,
            oversize_mw: total_ac_mw - poi_mw,
        }
    }

    fn spread(&self) -> u32 {
        self.dc_blocks_per_ac_block_max - self.dc_blocks_per_ac_block_base
    }
}

impl fmt::Display for AcBlockConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x {}x{}kW ({} MW) = {:.2} MW, ",
            self.ac_block_qty, self.pcs_units, self.pcs_unit_kw, self.rated_mw, self.total_ac_mw
        )?;
        if self.spread() == 0 {
            write!(f, "{} DC blocks each", self.dc_blocks_per_ac_block_base)
        } else {
            write!(
                f,
                "{}-{} DC blocks each",
                self.dc_blocks_per_ac_block_base, self.dc_blocks_per_ac_block_max
            )
        }
    }
}

/// A perturbed DC layout that admits an AC configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentSuggestion {
    pub container_count: u32,
    pub cabinet_count: u32,
    pub container_delta: i64,
    pub cabinet_delta: i64,
    pub configuration: AcBlockConfiguration,
}

impl AdjustmentSuggestion {
    fn removes_blocks(&self) -> bool {
        self.container_delta < 0 || self.cabinet_delta < 0
    }

    fn magnitude(&self) -> u64 {
        self.container_delta.unsigned_abs() + self.cabinet_delta.unsigned_abs()
    }
}

impl fmt::Display for AdjustmentSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut changes = Vec::new();
        for (delta, noun) in [
            (self.container_delta, "container"),
            (self.cabinet_delta, "cabinet"),
        ] {
            if delta != 0 {
                let verb = if delta > 0 { "add" } else { "remove" };
                let n = delta.unsigned_abs();
                let plural = if n == 1 { "" } else { "s" };
                changes.push(format!("{verb} {n} {noun}{plural}"));
            }
        }
        write!(
            f,
            "{} ({} containers, {} cabinets): {}",
            changes.join(" and "),
            self.container_count,
            self.cabinet_count,
            self.configuration
        )
    }
}

/// Scans AC block quantities per template.
#[derive(Debug, Clone, Copy)]
pub struct AcBlockMatcher<'a> {
    pub candidates: &'a [AcBlockTemplate],
    /// Quantities scanned above `ceil(poi_mw / rated_mw)`.
    pub search_extra: u32,
}

impl<'a> AcBlockMatcher<'a> {
    pub fn new(candidates: &'a [AcBlockTemplate], search_extra: u32) -> Self {
        Self {
            candidates,
            search_extra,
        }
    }

    /// Every AC block carries the same number of containers.
    ///
    /// Best is lowest oversize, then fewest AC blocks.
    pub fn find_container_only(
        &self,
        poi_mw: f64,
        container_count: u32,
    ) -> Option<AcBlockConfiguration> {
        if container_count == 0 {
            return None;
        }
        self.best(poi_mw, AcStrategy::ContainerOnly, |qty| {
            if container_count % qty != 0 {
                return None;
            }
            let per_block = container_count / qty;
            (per_block != EXCLUDED_DC_BLOCKS_PER_AC_BLOCK).then_some((per_block, per_block))
        })
    }

    /// Containers and cabinets spread over AC blocks, at most one apart.
    ///
    /// Best is lowest oversize, then smallest spread, then fewest AC blocks.
    pub fn find_mixed(
        &self,
        poi_mw: f64,
        container_count: u32,
        cabinet_count: u32,
    ) -> Option<AcBlockConfiguration> {
        let total = container_count.checked_add(cabinet_count)?;
        if total == 0 {
            return None;
        }
        self.best(poi_mw, AcStrategy::Mixed, |qty| {
            let (cont_each, cont_rem) = (container_count / qty, container_count % qty);
            let (cab_each, cab_rem) = (cabinet_count / qty, cabinet_count % qty);
            let base = cont_each + cab_each;
            let max = base + u32::from(cont_rem > 0 || cab_rem > 0);
            if base < MIN_DC_BLOCKS_PER_AC_BLOCK
                || base == EXCLUDED_DC_BLOCKS_PER_AC_BLOCK
                || max == EXCLUDED_DC_BLOCKS_PER_AC_BLOCK
            {
                return None;
            }
            let rebuilt = cont_each * qty + cont_rem + cab_each * qty + cab_rem;
            (rebuilt == total).then_some((base, max))
        })
    }

    /// Tries DC layouts within `±max_delta` of the given counts.
    ///
    /// Returns up to [`MAX_SUGGESTIONS`], container-only hits first, then
    /// layouts that only add blocks, then the smallest change. Suggestions
    /// that remove blocks lower the installed energy, so the guarantee must
    /// be rechecked before adopting one.
    pub fn suggest_adjustments(
        &self,
        poi_mw: f64,
        container_count: u32,
        cabinet_count: u32,
        max_delta: u32,
    ) -> Vec<AdjustmentSuggestion> {
        let delta = i64::from(max_delta);
        let mut seen = BTreeSet::new();
        let mut hits = Vec::new();

        for container_delta in -delta..=delta {
            for cabinet_delta in -delta..=delta {
                if container_delta == 0 && cabinet_delta == 0 {
                    continue;
                }
                let (Some(containers), Some(cabinets)) = (
                    shifted(container_count, container_delta),
                    shifted(cabinet_count, cabinet_delta),
                ) else {
                    continue;
                };
                if !seen.insert((containers, cabinets)) {
                    continue;
                }
                let configuration = if cabinets == 0 {
                    self.find_container_only(poi_mw, containers)
                        .or_else(|| self.find_mixed(poi_mw, containers, 0))
                } else {
                    self.find_mixed(poi_mw, containers, cabinets)
                };
                if let Some(configuration) = configuration {
                    hits.push(AdjustmentSuggestion {
                        container_count: containers,
                        cabinet_count: cabinets,
                        container_delta,
                        cabinet_delta,
                        configuration,
                    });
                }
            }
        }

        hits.sort_by(|a, b| {
            let rank = |s: &AdjustmentSuggestion| {
                (
                    s.configuration.strategy != AcStrategy::ContainerOnly,
                    s.removes_blocks(),
                    s.magnitude(),
                )
            };
            rank(a)
                .cmp(&rank(b))
                .then_with(|| a.configuration.oversize_mw.total_cmp(&b.configuration.oversize_mw))
        });
        debug!(
            candidates = seen.len(),
            hits = hits.len(),
            "AC adjustment search"
        );
        hits.truncate(MAX_SUGGESTIONS);
        hits
    }

    /// Scans every template and quantity, keeping the first best candidate.
    ///
    /// `layout` returns `(base, max)` DC blocks per AC block for an accepted
    /// quantity.
    fn best(
        &self,
        poi_mw: f64,
        strategy: AcStrategy,
        layout: impl Fn(u32) -> Option<(u32, u32)>,
    ) -> Option<AcBlockConfiguration> {
        if !(poi_mw.is_finite() && poi_mw > 0.0) {
            return None;
        }
        let mut best: Option<AcBlockConfiguration> = None;
        let mut scanned = 0_u32;
        for template in self.candidates {
            let rated_mw = template.rated_mw();
            if !(rated_mw.is_finite() && rated_mw > 0.0) {
                continue;
            }
            let n_min = min_quantity(poi_mw / rated_mw);
            for qty in n_min..=n_min.saturating_add(self.search_extra) {
                scanned += 1;
                if f64::from(qty) * rated_mw < poi_mw - MW_TOLERANCE {
                    continue;
                }
                let Some((base, max)) = layout(qty) else {
                    continue;
                };
                let candidate =
                    AcBlockConfiguration::new(strategy, template, qty, base, max, poi_mw);
                if best
                    .as_ref()
                    .is_none_or(|b| compare(&candidate, b) == Ordering::Less)
                {
                    best = Some(candidate);
                }
            }
        }
        debug!(
            ?strategy,
            scanned,
            found = best.is_some(),
            "AC block scan"
        );
        best
    }
}

/// Oversize, then spread (zero for container-only), then quantity.
fn compare(a: &AcBlockConfiguration, b: &AcBlockConfiguration) -> Ordering {
    a.oversize_mw
        .total_cmp(&b.oversize_mw)
        .then_with(|| a.spread().cmp(&b.spread()))
        .then_with(|| a.ac_block_qty.cmp(&b.ac_block_qty))
}

/// `ceil(ratio)`, at least one, tolerant of floating-point noise.
fn min_quantity(ratio: f64) -> u32 {
    let nearest = ratio.round();
    let n = if (ratio - nearest).abs() < MW_TOLERANCE {
        nearest
    } else {
        ratio.ceil()
    };
    // Clamped into u32 range first.
    n.clamp(1.0, f64::from(u32::MAX)) as u32
}

fn shifted(count: u32, delta: i64) -> Option<u32> {
    u32::try_from(i64::from(count) + delta).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ac_block::default_ac_blocks;

    fn only(units: u32, kw: f64) -> Vec<AcBlockTemplate> {
        vec![AcBlockTemplate::new(units, kw)]
    }

    #[test]
    fn container_only_picks_lowest_oversize_divisor() {
        let candidates = only(4, 1725.0);
        let matcher = AcBlockMatcher::new(&candidates, DEFAULT_SEARCH_EXTRA);
        let cfg = matcher.find_container_only(100.0, 90).expect("a divisor exists");
        assert_eq!(cfg.ac_block_qty, 15);
        assert_eq!(cfg.dc_blocks_per_ac_block, Some(6));
        assert!((cfg.oversize_mw - 3.5).abs() < 1e-9);
    }

    #[test]
    fn container_only_full_catalog_still_prefers_6_9_mw() {
        let candidates = default_ac_blocks();
        let matcher = AcBlockMatcher::new(&candidates, DEFAULT_SEARCH_EXTRA);
        let cfg = matcher.find_container_only(100.0, 90).expect("a divisor exists");
        assert_eq!(cfg.pcs_units, 4);
        assert_eq!(cfg.pcs_unit_kw, 1725.0);
        assert_eq!(cfg.ac_block_qty, 15);
    }

    #[test]
    fn three_per_block_is_never_chosen() {
        let candidates = only(2, 1725.0);
        let matcher = AcBlockMatcher::new(&candidates, DEFAULT_SEARCH_EXTRA);
        // 9 containers over 3 blocks would give exactly 3 each.
        let cfg = matcher.find_container_only(10.0, 9).expect("9 blocks of 1");
        assert_eq!(cfg.ac_block_qty, 9);
        assert_eq!(cfg.dc_blocks_per_ac_block, Some(1));
    }

    #[test]
    fn container_only_exhaustion_is_none() {
        let candidates = only(4, 1725.0);
        let matcher = AcBlockMatcher::new(&candidates, 0);
        // n_min = 15, 91 is not divisible by 15.
        assert!(matcher.find_container_only(100.0, 91).is_none());
        assert!(matcher.find_container_only(100.0, 0).is_none());
    }

    #[test]
    fn mixed_skips_base_of_three() {
        let candidates = only(4, 1725.0);
        let matcher = AcBlockMatcher::new(&candidates, DEFAULT_SEARCH_EXTRA);
        let cfg = matcher.find_mixed(20.0, 7, 3).expect("4 blocks works");
        assert_eq!(cfg.strategy, AcStrategy::Mixed);
        assert_eq!(cfg.ac_block_qty, 4);
        assert_eq!(cfg.dc_blocks_per_ac_block_base, 1);
        assert_eq!(cfg.dc_blocks_per_ac_block_max, 2);
        assert_eq!(cfg.dc_blocks_per_ac_block, None);
    }

    #[test]
    fn mixed_rejects_max_of_three() {
        let candidates = only(4, 1250.0);
        let matcher = AcBlockMatcher::new(&candidates, 0);
        // qty 4: 2 containers each plus 3 spare cabinets -> 2..3 per block.
        assert!(matcher.find_mixed(20.0, 8, 3).is_none());
    }

    #[test]
    fn mixed_needs_a_dc_block_on_every_ac_block() {
        let candidates = default_ac_blocks();
        let matcher = AcBlockMatcher::new(&candidates, DEFAULT_SEARCH_EXTRA);
        // Every template needs more than 10 AC blocks for 100 MW.
        assert!(matcher.find_mixed(100.0, 0, 10).is_none());

        let candidates = only(2, 1250.0);
        let matcher = AcBlockMatcher::new(&candidates, DEFAULT_SEARCH_EXTRA);
        let cfg = matcher.find_mixed(10.0, 0, 10).expect("5 x 2.5 MW fits");
        assert_eq!(cfg.ac_block_qty, 5);
        assert!(cfg.dc_blocks_per_ac_block_base >= MIN_DC_BLOCKS_PER_AC_BLOCK);
        assert_eq!(cfg.dc_blocks_per_ac_block_base, 2);
    }

    #[test]
    fn mixed_prefers_even_spread_over_fewer_blocks() {
        let candidates = vec![
            AcBlockTemplate::new(4, 1250.0),
            AcBlockTemplate::new(2, 1000.0),
        ];
        let matcher = AcBlockMatcher::new(&candidates, 0);
        // 4 x 5 MW gives 12..13 per block; 10 x 2 MW gives exactly 5.
        let cfg = matcher.find_mixed(20.0, 50, 0).expect("both fit");
        assert_eq!(cfg.ac_block_qty, 10);
        assert_eq!(cfg.dc_blocks_per_ac_block_base, 5);
        assert_eq!(cfg.dc_blocks_per_ac_block_max, 5);
    }

    #[test]
    fn suggestions_prefer_container_only() {
        let candidates = only(4, 1725.0);
        let matcher = AcBlockMatcher::new(&candidates, 0);
        let suggestions = matcher.suggest_adjustments(100.0, 91, 0, 2);
        assert!(!suggestions.is_empty());
        assert!(suggestions.len() <= MAX_SUGGESTIONS);
        let first = &suggestions[0];
        assert_eq!(first.configuration.strategy, AcStrategy::ContainerOnly);
        assert_eq!((first.container_count, first.cabinet_count), (90, 0));
        assert!(first.to_string().starts_with("remove 1 container"));
    }

    #[test]
    fn suggestions_never_repeat_or_include_original() {
        let candidates = default_ac_blocks();
        let matcher = AcBlockMatcher::new(&candidates, DEFAULT_SEARCH_EXTRA);
        let suggestions = matcher.suggest_adjustments(50.0, 10, 1, 2);
        let mut seen = BTreeSet::new();
        for s in &suggestions {
            assert!((s.container_delta, s.cabinet_delta) != (0, 0));
            assert!(seen.insert((s.container_count, s.cabinet_count)));
        }
    }

    #[test]
    fn non_positive_poi_matches_nothing() {
        let candidates = default_ac_blocks();
        let matcher = AcBlockMatcher::new(&candidates, DEFAULT_SEARCH_EXTRA);
        assert!(matcher.find_container_only(0.0, 10).is_none());
        assert!(matcher.find_mixed(-1.0, 10, 2).is_none());
    }
}
