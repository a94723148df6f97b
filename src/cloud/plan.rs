//! Upload planning: single PUT or multipart, and how to split the artifact.

use crate::constants::{S3_MAX_OBJECT_SIZE, S3_MAX_PARTS, S3_MAX_PART_SIZE, S3_MIN_PART_SIZE};
use crate::error::UploadError;

/// How an artifact of a given size is sent to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPlan {
    SingleShot {
        size: u64,
    },
    Multipart {
        part_count: u64,
        part_size: u64,
        total_size: u64,
    },
}

/// Byte range of one multipart part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub part_number: i64,
    pub offset: u64,
    pub len: u64,
}

impl UploadPlan {
    /// Plan an upload of `total_size` bytes.
    ///
    /// Sizes up to `threshold` go in one request. Larger objects are split
    /// into parts of `part_size` clamped to the S3 part limits; when that
    /// would need more than 10 000 parts the part size grows to fit.
    pub fn for_size(total_size: u64, threshold: u64, part_size: u64) -> Result<Self, UploadError> {
        if total_size > S3_MAX_OBJECT_SIZE {
            return Err(UploadError::Permanent(format!(
                "artifact of {} bytes exceeds the maximum object size of {} bytes",
                total_size, S3_MAX_OBJECT_SIZE
            )));
        }

        // One PUT can carry at most one maximum-sized part
        let threshold = threshold.min(S3_MAX_PART_SIZE);
        if total_size <= threshold || total_size == 0 {
            return Ok(UploadPlan::SingleShot { size: total_size });
        }

        let mut part_size = part_size.clamp(S3_MIN_PART_SIZE, S3_MAX_PART_SIZE);
        if div_ceil(total_size, part_size) > S3_MAX_PARTS {
            part_size = div_ceil(total_size, S3_MAX_PARTS).clamp(S3_MIN_PART_SIZE, S3_MAX_PART_SIZE);
        }

        Ok(UploadPlan::Multipart {
            part_count: div_ceil(total_size, part_size),
            part_size,
            total_size,
        })
    }

    pub fn total_size(&self) -> u64 {
        match self {
            UploadPlan::SingleShot { size } => *size,
            UploadPlan::Multipart { total_size, .. } => *total_size,
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, UploadPlan::Multipart { .. })
    }

    /// Part ranges in ascending order. A single-shot plan yields nothing.
    pub fn parts(&self) -> PartRanges {
        match *self {
            UploadPlan::SingleShot { .. } => PartRanges {
                next: 1,
                part_count: 0,
                part_size: 0,
                total_size: 0,
            },
            UploadPlan::Multipart {
                part_count,
                part_size,
                total_size,
            } => PartRanges {
                next: 1,
                part_count,
                part_size,
                total_size,
            },
        }
    }
}

/// Iterator over the parts of a multipart plan.
#[derive(Debug, Clone)]
pub struct PartRanges {
    next: u64,
    part_count: u64,
    part_size: u64,
    total_size: u64,
}

impl Iterator for PartRanges {
    type Item = PartRange;

    fn next(&mut self) -> Option<PartRange> {
        if self.next > self.part_count {
            return None;
        }

        let offset = (self.next - 1) * self.part_size;
        let len = self.part_size.min(self.total_size - offset);
        let range = PartRange {
            part_number: self.next as i64,
            offset,
            len,
        };
        self.next += 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.part_count + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PartRanges {}

fn div_ceil(value: u64, divisor: u64) -> u64 {
    (value + divisor - 1) / divisor
}
