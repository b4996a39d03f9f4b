//! `SegmentCacheIndex` — the single-writer, in-memory index of all known
//! segment headers, answering three query families: `locate` (exact
//! candidates), `intersect_region` (flush targeting), and
//! `find_rollup_candidates` (rollup reuse across dimensionalities).
//!
//! Structured as a bitkey-map keyed by `(provenance, bitKey)` giving all
//! headers of one dimensionality, and a fact-map keyed by `provenance`
//! giving a [`FactInfo`] (header ids plus the dimensionality
//! [`PartiallyOrderedSet`]). The thread-ownership invariant — current
//! thread must equal the owning manager thread — is checked on every
//! public entry point.

use std::collections::{HashMap, HashSet};
use std::thread::ThreadId;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bitkey::BitKey;
use crate::error::CacheError;
use crate::poset::PartiallyOrderedSet;
use crate::segment_column::SegmentColumn;
use crate::segment_header::{Provenance, SegmentHeader};
use crate::value::Value;

/// All headers sharing one [`Provenance`], independent of dimensionality —
/// a "fact group".
#[derive(Debug, Default)]
struct FactInfo {
    header_ids: HashSet<[u8; 32]>,
    poset: PartiallyOrderedSet<BitKey>,
}

/// Request shape for `locate`.
#[derive(Debug, Clone)]
pub struct LocateRequest {
    pub provenance: Provenance,
    pub bit_key: BitKey,
    pub coords: HashMap<String, Value>,
    pub compound_predicates: Vec<String>,
}

/// One singleton rollup candidate. Only singleton groups are produced —
/// combining partial matches across siblings is explicitly out of scope.
#[derive(Debug, Clone)]
pub struct RollupCandidate {
    pub header: SegmentHeader,
}

pub struct SegmentCacheIndex {
    owner_thread: ThreadId,
    headers: HashMap<[u8; 32], SegmentHeader>,
    bitkey_map: HashMap<(Provenance, BitKey), Vec<[u8; 32]>>,
    fact_map: HashMap<Provenance, FactInfo>,
    max_headers: Option<usize>,
    rng: StdRng,
}

impl SegmentCacheIndex {
    /// Construct the index on the calling thread. Whichever thread calls
    /// this becomes the sole thread permitted to read or write it — in
    /// practice, the `CacheManager`'s dedicated worker thread.
    pub fn new(max_index_headers: Option<usize>) -> Self {
        SegmentCacheIndex {
            owner_thread: std::thread::current().id(),
            headers: HashMap::new(),
            bitkey_map: HashMap::new(),
            fact_map: HashMap::new(),
            max_headers: max_index_headers,
            rng: StdRng::from_entropy(),
        }
    }

    fn check_thread(&self) -> Result<(), CacheError> {
        if std::thread::current().id() != self.owner_thread {
            return Err(CacheError::InvariantViolation(
                "SegmentCacheIndex accessed off its owning manager thread".to_string(),
            ));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn get(&self, unique_id: &[u8; 32]) -> Result<Option<SegmentHeader>, CacheError> {
        self.check_thread()?;
        Ok(self.headers.get(unique_id).cloned())
    }

    /// Insert a header, maintaining both maps and the poset. Idempotent:
    /// inserting an already-present `unique_id` is a no-op. Applies the
    /// eviction policy afterwards if the index is now over its configured
    /// header budget.
    pub fn insert(&mut self, header: SegmentHeader) -> Result<(), CacheError> {
        self.check_thread()?;
        let id = *header.unique_id();
        if self.headers.contains_key(&id) {
            return Ok(());
        }

        let provenance = header.provenance.clone();
        let bit_key = header.constrained_cols_bit_key;

        self.bitkey_map
            .entry((provenance.clone(), bit_key))
            .or_default()
            .push(id);
        let fact = self.fact_map.entry(provenance).or_default();
        fact.header_ids.insert(id);
        fact.poset.insert(bit_key);

        self.headers.insert(id, header);
        self.evict_if_over_budget();
        Ok(())
    }

    /// Remove a header by id. Removing an absent id is a no-op — absence
    /// is a normal result, not an error.
    pub fn remove(&mut self, unique_id: &[u8; 32]) -> Result<(), CacheError> {
        self.check_thread()?;
        self.remove_internal(unique_id);
        Ok(())
    }

    fn remove_internal(&mut self, unique_id: &[u8; 32]) {
        let Some(header) = self.headers.remove(unique_id) else {
            return;
        };
        let provenance = header.provenance.clone();
        let bit_key = header.constrained_cols_bit_key;

        if let Some(ids) = self.bitkey_map.get_mut(&(provenance.clone(), bit_key)) {
            ids.retain(|id| id != unique_id);
            if ids.is_empty() {
                self.bitkey_map.remove(&(provenance.clone(), bit_key));
            }
        }

        if let Some(fact) = self.fact_map.get_mut(&provenance) {
            fact.header_ids.remove(unique_id);
            if !self.bitkey_map.contains_key(&(provenance.clone(), bit_key)) {
                fact.poset.remove(&bit_key);
            }
            if fact.header_ids.is_empty() {
                self.fact_map.remove(&provenance);
            }
        }
    }

    /// Random eviction over actual map entries: pick a uniformly random
    /// key from the header map and evict it, repeating until back under
    /// budget.
    fn evict_if_over_budget(&mut self) {
        let Some(max) = self.max_headers else {
            return;
        };
        while self.headers.len() > max {
            let victim_index = self.rng.gen_range(0..self.headers.len());
            let victim_id = *self
                .headers
                .keys()
                .nth(victim_index)
                .expect("index within bounds of a non-empty map");
            self.remove_internal(&victim_id);
        }
    }

    /// Exact-match candidates for a dimensionality and coordinate set.
    pub fn locate(&self, req: &LocateRequest) -> Result<Vec<SegmentHeader>, CacheError> {
        self.check_thread()?;
        let ids = self
            .bitkey_map
            .get(&(req.provenance.clone(), req.bit_key))
            .cloned()
            .unwrap_or_default();

        let mut result = Vec::new();
        'header: for id in ids {
            let header = &self.headers[&id];
            if header.compound_predicates != req.compound_predicates {
                continue;
            }

            for (expr, value) in &req.coords {
                if let Some(excluded) = header.get_excluded_region(expr) {
                    if excluded.is_wildcard() || excluded.contains(value) {
                        continue 'header;
                    }
                }

                match header.get_constrained_column(expr) {
                    None => {
                        return Err(CacheError::InvariantViolation(format!(
                            "locate: header {} has no constrained column for requested expression `{expr}`",
                            header.unique_id_hex()
                        )));
                    }
                    Some(col) => {
                        if !col.is_wildcard() && !col.contains(value) {
                            continue 'header;
                        }
                    }
                }
            }

            result.push(header.clone());
        }
        Ok(result)
    }

    /// Headers whose constrained columns intersect a flush region.
    pub fn intersect_region(
        &self,
        provenance: &Provenance,
        region: &[SegmentColumn],
    ) -> Result<Vec<SegmentHeader>, CacheError> {
        self.check_thread()?;
        let Some(fact) = self.fact_map.get(provenance) else {
            return Ok(Vec::new());
        };

        let mut result = Vec::new();
        'header: for id in &fact.header_ids {
            let header = &self.headers[id];
            for region_col in region {
                match header.get_constrained_column(&region_col.column_expression) {
                    // Header doesn't constrain this column at all: implicit
                    // intersect.
                    None => continue,
                    Some(header_col) => {
                        if header_col.is_wildcard() || region_col.is_wildcard() {
                            continue;
                        }
                        let shares_value = header_col
                            .values
                            .values()
                            .expect("non-wildcard column has a concrete value set")
                            .iter()
                            .any(|v| region_col.contains(v));
                        if !shares_value {
                            continue 'header;
                        }
                    }
                }
            }
            result.push(header.clone());
        }
        Ok(result)
    }

    /// Candidates a rollup could be built from. Only singleton candidates
    /// are ever returned — combining multiple partial matches to cover the
    /// projected axes is explicitly future work.
    pub fn find_rollup_candidates(
        &self,
        provenance: &Provenance,
        bit_key: BitKey,
        coords: &HashMap<String, Value>,
    ) -> Result<Vec<RollupCandidate>, CacheError> {
        self.check_thread()?;
        let Some(fact) = self.fact_map.get(provenance) else {
            return Ok(Vec::new());
        };

        let mut candidates = Vec::new();
        for ancestor_bit_key in fact.poset.get_ancestors(&bit_key) {
            let ids = self
                .bitkey_map
                .get(&(provenance.clone(), ancestor_bit_key))
                .cloned()
                .unwrap_or_default();

            for id in ids {
                let header = &self.headers[&id];
                let mut keep_ok = true;
                let mut non_wildcard_projected = 0usize;

                for col in &header.constrained_columns {
                    match coords.get(&col.column_expression) {
                        Some(requested_value) => {
                            if !col.is_wildcard() && !col.contains(requested_value) {
                                keep_ok = false;
                                break;
                            }
                        }
                        None => {
                            if !col.is_wildcard() {
                                non_wildcard_projected += 1;
                            }
                        }
                    }
                }

                if !keep_ok {
                    continue;
                }
                if non_wildcard_projected == 0 {
                    candidates.push(RollupCandidate {
                        header: header.clone(),
                    });
                }
                // Otherwise: a partial match that needs combining with
                // siblings to cover the projected axes. Not produced here.
            }
        }
        Ok(candidates)
    }
}
