//! FLANN-style approximate nearest neighbour search for binary descriptors
//!
//! Multi-probe locality-sensitive hashing: every table hashes a random subset
//! of descriptor bits into a key, and a query visits its own bucket plus all
//! buckets whose key differs in at most `multi_probe_level` bits.

use crate::{FeatureError, Result};
use cv_core::{hamming_distance, Descriptors, FeatureMatch};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LshParams {
    pub table_number: usize,
    /// Bits per hash key, at most 32.
    pub key_size: usize,
    /// Hamming radius of the probed buckets around the query key.
    pub multi_probe_level: usize,
    /// Seed for the per-table bit selection.
    pub seed: u64,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            table_number: 6,
            key_size: 12,
            multi_probe_level: 2,
            seed: 0x5eed,
        }
    }
}

impl LshParams {
    pub fn with_table_number(mut self, table_number: usize) -> Self {
        self.table_number = table_number;
        self
    }

    pub fn with_key_size(mut self, key_size: usize) -> Self {
        self.key_size = key_size;
        self
    }

    pub fn with_multi_probe_level(mut self, level: usize) -> Self {
        self.multi_probe_level = level;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

struct LshTable {
    bits: Vec<usize>,
    buckets: HashMap<u32, Vec<usize>>,
}

impl LshTable {
    fn key(&self, data: &[u8]) -> u32 {
        self.bits.iter().enumerate().fold(0u32, |key, (k, &bit)| {
            if (data[bit / 8] >> (bit % 8)) & 1 == 1 {
                key | (1 << k)
            } else {
                key
            }
        })
    }
}

/// XOR masks of every key perturbation with at most `level` flipped bits.
fn probe_masks(key_size: usize, level: usize) -> Vec<u32> {
    fn extend(masks: &mut Vec<u32>, mask: u32, start: usize, remaining: usize, key_size: usize) {
        if remaining == 0 {
            return;
        }
        for bit in start..key_size {
            let next = mask | (1 << bit);
            masks.push(next);
            extend(masks, next, bit + 1, remaining - 1, key_size);
        }
    }

    let mut masks = vec![0];
    extend(&mut masks, 0, 0, level.min(key_size), key_size);
    masks
}

/// LSH index over one set of binary descriptors.
pub struct LshIndex {
    params: LshParams,
    tables: Vec<LshTable>,
    probes: Vec<u32>,
    points: Vec<Vec<u8>>,
}

impl LshIndex {
    /// Hash every descriptor of `train` into `params.table_number` tables.
    pub fn build(train: &Descriptors, params: LshParams) -> Result<Self> {
        if params.table_number == 0 || params.key_size == 0 || params.key_size > 32 {
            return Err(FeatureError::MatchingError(format!(
                "invalid LSH parameters: {} tables, {}-bit keys",
                params.table_number, params.key_size
            )));
        }

        let points: Vec<Vec<u8>> = train.iter().map(|d| d.data.clone()).collect();
        let mut tables = Vec::new();

        if !points.is_empty() {
            let size = train.descriptor_size().ok_or_else(|| {
                FeatureError::MatchingError("train descriptors differ in length".into())
            })?;
            let total_bits = size * 8;
            if total_bits < params.key_size {
                return Err(FeatureError::MatchingError(format!(
                    "{}-bit keys need descriptors of at least that many bits, got {total_bits}",
                    params.key_size
                )));
            }

            let mut rng = StdRng::seed_from_u64(params.seed);
            for _ in 0..params.table_number {
                let mut table = LshTable {
                    bits: index::sample(&mut rng, total_bits, params.key_size).into_vec(),
                    buckets: HashMap::new(),
                };
                for (i, p) in points.iter().enumerate() {
                    let key = table.key(p);
                    table.buckets.entry(key).or_default().push(i);
                }
                tables.push(table);
            }
        }

        debug!(
            points = points.len(),
            tables = tables.len(),
            key_size = params.key_size,
            "built LSH index"
        );

        Ok(Self {
            params,
            tables,
            probes: probe_masks(params.key_size, params.multi_probe_level),
            points,
        })
    }

    pub fn params(&self) -> &LshParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Up to `k` indexed descriptors closest to `query` among the probed
    /// candidates, as `(index, hamming distance)` sorted by distance then index.
    pub fn search_knn(&self, query: &[u8], k: usize) -> Vec<(usize, u32)> {
        let mut seen = vec![false; self.points.len()];
        let mut candidates = Vec::new();

        for table in &self.tables {
            let key = table.key(query);
            for &mask in &self.probes {
                let Some(bucket) = table.buckets.get(&(key ^ mask)) else {
                    continue;
                };
                for &i in bucket {
                    if !seen[i] {
                        seen[i] = true;
                        candidates.push((i, hamming_distance(query, &self.points[i])));
                    }
                }
            }
        }

        candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        candidates.truncate(k);
        candidates
    }

    /// Neighbour lists for every query descriptor.
    pub fn knn_search(&self, queries: &Descriptors, k: usize) -> Vec<Vec<(usize, u32)>> {
        queries
            .descriptors
            .par_iter()
            .map(|desc| self.search_knn(&desc.data, k))
            .collect()
    }
}

/// Approximate matcher backed by an [`LshIndex`] built on the train set.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlannMatcher {
    params: LshParams,
}

impl FlannMatcher {
    pub fn new(params: LshParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LshParams {
        &self.params
    }

    /// For every query descriptor, up to `k` train neighbours sorted by
    /// ascending distance.
    pub fn knn_match(
        &self,
        query: &Descriptors,
        train: &Descriptors,
        k: usize,
    ) -> Result<Vec<Vec<FeatureMatch>>> {
        if let (Some(q), Some(t)) = (query.descriptor_size(), train.descriptor_size()) {
            if q != t {
                return Err(FeatureError::MatchingError(format!(
                    "query descriptors have {q} bytes, train descriptors {t}"
                )));
            }
        }

        let index = LshIndex::build(train, self.params)?;
        let knn = index
            .knn_search(query, k)
            .into_iter()
            .enumerate()
            .map(|(query_idx, neighbours)| {
                neighbours
                    .into_iter()
                    .map(|(train_idx, distance)| {
                        FeatureMatch::new(query_idx, train_idx, distance as f32)
                    })
                    .collect()
            })
            .collect();
        Ok(knn)
    }
}
