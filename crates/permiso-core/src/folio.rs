// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sequential folio allocation.
//!
//! Folios are a fixed numeric prefix followed by a decimal suffix. Allocation
//! reads the existing folios under the prefix and picks `max(suffix) + 1`,
//! scanning forward past any value that is somehow already taken. No lock is
//! held across the read; the store's uniqueness constraint is the backstop
//! against a concurrent caller winning the same suffix.

use rand::Rng;
use tracing::warn;

use crate::persistence::FolioStore;

/// Range of the randomized suffix used when the folio query fails.
const FALLBACK_SUFFIX_RANGE: std::ops::RangeInclusive<u64> = 10_000..=99_999;

/// Allocate the next unused folio under `prefix` for `entidad`.
///
/// Starts the sequence at `min_suffix` when no folios exist. If the folio
/// query itself fails, degrades to `prefix` + a random 5-digit suffix:
/// availability wins over strict sequentiality.
pub async fn next_folio(
    store: &dyn FolioStore,
    entidad: &str,
    prefix: &str,
    min_suffix: u64,
) -> String {
    let existing = match store.list_folios(entidad, prefix).await {
        Ok(folios) => folios,
        Err(e) => {
            warn!(error = %e, prefix, "folio query failed, falling back to random suffix");
            let suffix = rand::thread_rng().gen_range(FALLBACK_SUFFIX_RANGE);
            return format!("{prefix}{suffix}");
        }
    };

    let suffixes: Vec<u64> = existing
        .iter()
        .filter_map(|folio| folio.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
        .filter_map(|rest| rest.parse().ok())
        .collect();

    let mut next = suffixes
        .iter()
        .max()
        .map(|max| max + 1)
        .unwrap_or(min_suffix);

    // A concurrent insert may have beaten this read; scan forward until free.
    while existing.iter().any(|f| *f == format!("{prefix}{next}")) {
        next += 1;
    }

    format!("{prefix}{next}")
}
