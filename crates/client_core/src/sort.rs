//! Derived ordering of the medication cache.
//!
//! Pure: the cache is never mutated, and the projection is recomputed only
//! when the cache generation or the sort configuration changes.

use shared::domain::Medication;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Dose,
    CurrentStock,
    MinStock,
    ExpirationDate,
    DaysRemaining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            key: SortKey::Name,
            direction: SortDirection::Ascending,
        }
    }
}

// String keys compare case-insensitively, numeric keys by value. Ties are
// Ordering::Equal on purpose: the sort is stable, so equal elements keep
// their relative cache order.
fn compare(key: SortKey, a: &Medication, b: &Medication) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Dose => a.dose.to_lowercase().cmp(&b.dose.to_lowercase()),
        SortKey::CurrentStock => a.current_stock.cmp(&b.current_stock),
        SortKey::MinStock => a.min_stock.cmp(&b.min_stock),
        SortKey::ExpirationDate => a.expiration_date.cmp(&b.expiration_date),
        SortKey::DaysRemaining => a.days_remaining.cmp(&b.days_remaining),
    }
}

pub struct SortProjection {
    config: SortConfig,
    memo: Option<(u64, SortConfig, Vec<Medication>)>,
}

impl Default for SortProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl SortProjection {
    pub fn new() -> Self {
        Self {
            config: SortConfig::default(),
            memo: None,
        }
    }

    pub fn config(&self) -> SortConfig {
        self.config
    }

    /// Clicking the active ascending key flips to descending; anything else
    /// selects that key ascending.
    pub fn request_sort(&mut self, key: SortKey) {
        if self.config.key == key && self.config.direction == SortDirection::Ascending {
            self.config.direction = SortDirection::Descending;
        } else {
            self.config = SortConfig {
                key,
                direction: SortDirection::Ascending,
            };
        }
    }

    /// Ordered view of `medications`. `generation` identifies the cache
    /// snapshot; the previous result is reused while both the generation and
    /// the configuration are unchanged.
    pub fn project(&mut self, generation: u64, medications: &[Medication]) -> &[Medication] {
        let fresh = matches!(
            &self.memo,
            Some((memo_generation, memo_config, _))
                if *memo_generation == generation && *memo_config == self.config
        );
        if !fresh {
            let mut ordered = medications.to_vec();
            let config = self.config;
            ordered.sort_by(|a, b| {
                let ordering = compare(config.key, a, b);
                match config.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
            self.memo = Some((generation, config, ordered));
        }
        self.memo
            .as_ref()
            .map(|(_, _, ordered)| ordered.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
#[path = "tests/sort_tests.rs"]
mod tests;
