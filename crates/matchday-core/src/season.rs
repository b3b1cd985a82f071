//! Season rollover detection.
//!
//! Structural data (rosters, squad lists) only changes meaningfully when a
//! competition rolls into a new season. Phase 2 responses carry the season
//! they claim to describe; this module decides whether that claim means a
//! rollover happened.

use crate::model::SeasonMarker;

/// Decides whether an observed season marker indicates a rollover relative
/// to the recorded current season.
///
/// Rules, in order:
/// - No recorded season yet: treat the observation as new. First contact
///   with a scope must trigger the structural phase once.
/// - Same id as recorded: not new, regardless of dates.
/// - Different id *and* a strictly later start date: new season.
/// - Different id but an equal or earlier start date: not new. Providers
///   occasionally re-publish an old season under a corrected label; going
///   backwards must never re-trigger structural sync.
///
/// Both signals are required together. An unseen id alone, or a shifted
/// start date alone, is read as a provider correction rather than a
/// rollover; a looser either-or reading would re-run the structural phase
/// for the same season every time a feed restates its label or start date.
pub fn is_new_season(recorded: Option<&SeasonMarker>, observed: &SeasonMarker) -> bool {
    match recorded {
        None => true,
        Some(current) => {
            current.id != observed.id && observed.start_date > current.start_date
        }
    }
}
