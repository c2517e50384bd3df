// Roster management: automatic placement on acquisition, lineup selection.

pub mod lineup;
pub mod placement;
