//! Request and state types for one acquisition cycle.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AcquireError;
use crate::models::AcquiredImage;

/// Inclusive bounds for the number of photos drawn per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: usize,
    pub max: usize,
}

impl CountRange {
    pub fn new(min: usize, max: usize) -> Result<Self, AcquireError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), AcquireError> {
        if self.min == 0 || self.min > self.max {
            return Err(AcquireError::InvalidRequest(format!(
                "count range {}..={} must be non-empty and start at 1 or more",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

impl Default for CountRange {
    fn default() -> Self {
        Self { min: 10, max: 20 }
    }
}

/// How many photos one cycle asks of each source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionRequest {
    total_count: usize,
    local_count: usize,
}

impl AcquisitionRequest {
    /// Build an explicit request. `local_count` must lie in `1..=total_count`
    /// and `total_count` inside `range`.
    pub fn new(
        total_count: usize,
        local_count: usize,
        range: &CountRange,
    ) -> Result<Self, AcquireError> {
        if !range.contains(total_count) {
            return Err(AcquireError::InvalidRequest(format!(
                "total count {} outside {}..={}",
                total_count, range.min, range.max
            )));
        }
        if local_count == 0 || local_count > total_count {
            return Err(AcquireError::InvalidRequest(format!(
                "local count {} outside 1..={}",
                local_count, total_count
            )));
        }
        Ok(Self {
            total_count,
            local_count,
        })
    }

    /// Draw a total from `range`, then a local share from `1..=total`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, range: &CountRange) -> Self {
        let total_count = rng.gen_range(range.min..=range.max);
        let local_count = rng.gen_range(1..=total_count);
        Self {
            total_count,
            local_count,
        }
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn local_count(&self) -> usize {
        self.local_count
    }

    pub fn remote_count(&self) -> usize {
        self.total_count - self.local_count
    }
}

/// Whether the local photo library may be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessStatus {
    #[default]
    NotDetermined,
    Authorized,
    Limited,
    Denied,
}

impl AccessStatus {
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Authorized | Self::Limited)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CyclePhase {
    #[default]
    Idle,
    Fetching,
}

/// Everything the display layer observes about acquisition.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionState {
    pub photos: Vec<AcquiredImage>,
    pub progress: usize,
    pub busy_local: bool,
    pub busy_remote: bool,
    pub phase: CyclePhase,
    pub request: Option<AcquisitionRequest>,
    pub access: AccessStatus,
    /// Incremented at the start of every cycle.
    pub cycle: u64,
}

impl AcquisitionState {
    /// Reset for a new cycle and mark both sources busy.
    pub fn begin(&mut self, request: AcquisitionRequest) -> u64 {
        self.photos.clear();
        self.progress = 0;
        self.busy_local = true;
        self.busy_remote = true;
        self.phase = CyclePhase::Fetching;
        self.request = Some(request);
        self.cycle += 1;
        self.cycle
    }

    pub fn append_local(&mut self, image: AcquiredImage) {
        self.photos.push(image);
        self.progress += 1;
        debug_assert!(self.progress <= self.total_count());
    }

    pub fn append_remote(&mut self, batch: Vec<AcquiredImage>) {
        self.progress += batch.len();
        self.photos.extend(batch);
        debug_assert!(self.progress <= self.total_count());
    }

    pub fn finish_local(&mut self) {
        self.busy_local = false;
        self.settle();
    }

    pub fn finish_remote(&mut self) {
        self.busy_remote = false;
        self.settle();
    }

    fn settle(&mut self) {
        if !self.busy_local && !self.busy_remote {
            self.phase = CyclePhase::Idle;
        }
    }

    pub fn is_busy(&self) -> bool {
        self.phase == CyclePhase::Fetching
    }

    pub fn total_count(&self) -> usize {
        self.request.map(|r| r.total_count()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn local_image() -> AcquiredImage {
        AcquiredImage::local("/photos/a.png".into(), DynamicImage::new_rgb8(1, 1))
    }

    #[test]
    fn test_random_request_bounds() {
        let range = CountRange::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let req = AcquisitionRequest::random(&mut rng, &range);
            assert!((10..=20).contains(&req.total_count()));
            assert!(req.local_count() >= 1);
            assert!(req.local_count() <= req.total_count());
            assert_eq!(req.local_count() + req.remote_count(), req.total_count());
        }
    }

    #[test]
    fn test_explicit_request_validation() {
        let range = CountRange::default();
        let req = AcquisitionRequest::new(15, 6, &range).unwrap();
        assert_eq!(req.remote_count(), 9);

        assert!(AcquisitionRequest::new(9, 1, &range).is_err());
        assert!(AcquisitionRequest::new(21, 1, &range).is_err());
        assert!(AcquisitionRequest::new(12, 0, &range).is_err());
        assert!(AcquisitionRequest::new(12, 13, &range).is_err());
        // All local is allowed; remote share is then zero.
        assert_eq!(AcquisitionRequest::new(12, 12, &range).unwrap().remote_count(), 0);
    }

    #[test]
    fn test_count_range_validation() {
        assert!(CountRange::new(0, 5).is_err());
        assert!(CountRange::new(6, 5).is_err());
        assert!(CountRange::new(3, 3).is_ok());
    }

    #[test]
    fn test_state_cycle() {
        let range = CountRange::default();
        let mut state = AcquisitionState::default();
        state.photos.push(local_image());

        let cycle = state.begin(AcquisitionRequest::new(10, 4, &range).unwrap());
        assert_eq!(cycle, 1);
        assert!(state.photos.is_empty());
        assert!(state.busy_local && state.busy_remote);
        assert!(state.is_busy());

        state.append_local(local_image());
        state.append_remote(vec![local_image(), local_image()]);
        assert_eq!(state.progress, 3);
        assert_eq!(state.total_count(), 10);

        state.finish_remote();
        assert!(state.is_busy());
        state.finish_local();
        assert!(!state.is_busy());
        assert!(!state.busy_local && !state.busy_remote);
    }

    #[test]
    fn test_access_status() {
        assert!(AccessStatus::Authorized.grants_access());
        assert!(AccessStatus::Limited.grants_access());
        assert!(!AccessStatus::Denied.grants_access());
        assert!(!AccessStatus::NotDetermined.grants_access());
    }
}
