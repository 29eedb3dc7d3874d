//! Identifier allocation with bounded retry.
//!
//! The next id is `prefix + (max numeric suffix + 1)`. Allocation is only
//! safe together with a create that fails on an existing record; a lost
//! race surfaces as `AlreadyExists` for the allocated id and triggers a
//! fresh scan.

use orgiam_core::error::{OrgIamError, OrgIamResult};
use orgiam_core::id::{self, EntityKind};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct IdAllocator {
    max_attempts: u32,
}

impl IdAllocator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Allocate an id for `kind` and create the record under it.
    ///
    /// `list_ids` returns every id currently in the collection; `create`
    /// must fail with [`OrgIamError::AlreadyExists`] when the id is taken.
    /// Any other error is returned as is.
    pub async fn allocate<T, L, LF, C, CF>(
        &self,
        kind: EntityKind,
        mut list_ids: L,
        mut create: C,
    ) -> OrgIamResult<T>
    where
        L: FnMut() -> LF,
        LF: Future<Output = OrgIamResult<Vec<String>>>,
        C: FnMut(String) -> CF,
        CF: Future<Output = OrgIamResult<T>>,
    {
        for attempt in 1..=self.max_attempts {
            let existing = list_ids().await?;
            let Some(candidate) = id::next_id(kind, &existing) else {
                // Suffix space overflowed; no point retrying.
                break;
            };

            match create(candidate.clone()).await {
                Ok(created) => {
                    debug!(%kind, id = %candidate, attempt, "Identifier allocated");
                    return Ok(created);
                }
                Err(OrgIamError::AlreadyExists { id, .. }) if id == candidate => {
                    warn!(%kind, id = %candidate, attempt, "Identifier taken concurrently, rescanning");
                }
                Err(other) => return Err(other),
            }
        }

        Err(OrgIamError::AllocationExhausted {
            kind,
            attempts: self.max_attempts,
        })
    }
}
