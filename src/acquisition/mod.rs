//! Photo acquisition for the wheel.
//!
//! `PhotoAcquisitionCoordinator` owns the acquisition state and runs one
//! cycle at a time across the local and remote sources.

pub mod coordinator;

pub use coordinator::{AcquisitionEvent, CycleHandle, CycleSummary, PhotoAcquisitionCoordinator};
