//! Core reconciliation modules

pub mod datum;
pub mod cube;
pub mod stats;
pub mod coregister;
pub mod compare;

// Re-export main types
pub use datum::{DatumParams, DatumReferencer};
pub use cube::{epoch_from_offset, CubeParams, Frame, FrameData, InsarCube, InsarField, SelectionMode};
pub use coregister::{MatchParams, NearestPixelMatcher, PixelMatch, SpatialMatcher};
pub use compare::{ComparisonReport, EpochPair, OneToOneComparator, PairedSample};
