//! Working-zone reconciliation.
//!
//! When the UI asks for a new working zone, the reader compares it with the
//! zone it currently holds and picks exactly one course of action. The
//! decision is a pure function of the inputs below so it can be reasoned
//! about (and tested) apart from any decoding.

use framewin_core::TimeSection;
use std::fmt;

/// Everything the reconciliation looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneRequest {
    pub old_zone: TimeSection,
    pub new_zone: TimeSection,
    /// The backend materializes everything itself.
    pub always_caching: bool,
    /// The backend says `new_zone` fits the budget.
    pub fits_budget: bool,
    /// The cache holds a fully imported `old_zone`.
    pub caching: bool,
    /// An import toward `old_zone` is still running.
    pub importing: bool,
    pub force_reload: bool,
}

/// The single action taken for a working-zone change. Rows are listed in
/// precedence order; the first matching row wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneDecision {
    /// Backend handles its own materialization. Nothing to do.
    AlwaysCached,
    /// Zone too large for the budget: clear and go frame-by-frame.
    StopCaching,
    /// Same zone already being imported.
    AlreadyImporting,
    /// Not caching, forced, or the zones are disjoint: clear and import all.
    FullReload,
    /// New zone inside the old one: purge the frames outside it.
    Reduce,
    /// Zone grew on both sides: clear and import all. Two partial imports
    /// would be cheaper; a single reload keeps the cache logic simple.
    ReloadBothSides,
    /// Zone grew at the head: import the gap before the cache.
    Prepend(TimeSection),
    /// Zone grew at the tail: import the gap after the cache.
    Append(TimeSection),
}

impl ZoneDecision {
    pub fn decide(req: &ZoneRequest) -> Self {
        if req.always_caching {
            return Self::AlwaysCached;
        }
        if !req.fits_budget {
            return Self::StopCaching;
        }
        if req.importing && !req.force_reload && req.old_zone == req.new_zone {
            return Self::AlreadyImporting;
        }
        if !req.caching || req.force_reload || !req.old_zone.overlaps(req.new_zone) {
            return Self::FullReload;
        }
        if req.old_zone.contains(req.new_zone) {
            return Self::Reduce;
        }

        // Both zones are bounded past the overlap check.
        let (Some((old_start, old_end)), Some((new_start, new_end))) =
            (req.old_zone.bounds(), req.new_zone.bounds())
        else {
            return Self::FullReload;
        };

        if new_start < old_start && new_end > old_end {
            Self::ReloadBothSides
        } else if new_start < old_start {
            Self::Prepend(TimeSection::between(new_start, old_start))
        } else {
            Self::Append(TimeSection::between(old_end, new_end))
        }
    }

    /// The section to import and whether it is prepended, if this decision
    /// needs decoding.
    pub fn import(&self, new_zone: TimeSection) -> Option<(TimeSection, bool)> {
        match *self {
            Self::FullReload | Self::ReloadBothSides => Some((new_zone, false)),
            Self::Prepend(gap) => Some((gap, true)),
            Self::Append(gap) => Some((gap, false)),
            Self::AlwaysCached | Self::StopCaching | Self::AlreadyImporting | Self::Reduce => None,
        }
    }

    /// Whether the cache is emptied before anything else happens.
    pub fn clears_cache(&self) -> bool {
        matches!(
            self,
            Self::StopCaching | Self::FullReload | Self::ReloadBothSides
        )
    }
}

impl fmt::Display for ZoneDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlwaysCached => write!(f, "always cached"),
            Self::StopCaching => write!(f, "stop caching"),
            Self::AlreadyImporting => write!(f, "already importing"),
            Self::FullReload => write!(f, "full reload"),
            Self::Reduce => write!(f, "reduce"),
            Self::ReloadBothSides => write!(f, "reload (grew on both sides)"),
            Self::Prepend(gap) => write!(f, "prepend {gap}"),
            Self::Append(gap) => write!(f, "append {gap}"),
        }
    }
}
