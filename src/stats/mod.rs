//! Path statistics exposed to observers

pub mod snapshot;

pub use snapshot::PathSnapshot;
