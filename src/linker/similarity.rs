use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use crate::linker::link::Link;
use crate::linker::viability::{self, Viability};
use crate::metric::CompositeMetric;
use crate::search::{build_search_structure, SearchStats, SearchStructure};
use crate::utils::config::LinkerConfig;
use crate::utils::errors::LinkageResult;
use crate::utils::record::{FieldMapping, Record, RecordPair};
use crate::utils::types::RecordId;

/// How repeated unordered pairs are suppressed in symmetric linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dedup {
    /// Asymmetric linkage: (a, b) and (b, a) mean different things.
    Off,
    /// Both sides hold the same records: keep the pair when the probe has the
    /// smaller id, its mirror is found when the other record is probed.
    IdOrder,
    /// Overlapping but different sets: remember every emitted pair.
    Seen,
}

/// Counters for one pass over the probe set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkageStats {
    pub probes: u64,
    pub candidates: u64,
    pub over_threshold: u64,
    pub reflexive: u64,
    pub duplicate: u64,
    pub not_viable: u64,
    pub emitted: u64,
}

/// Links two record sets by indexing the larger and probing it with each
/// record of the smaller.
pub struct SimilaritySearchLinker<'a> {
    config: LinkerConfig,
    probes: &'a [Record],
    /// False when set2 is the probe side and pairs must be swapped back.
    probe_is_set1: bool,
    mapping: FieldMapping,
    index: Box<dyn SearchStructure<Record> + Send>,
    viability: Viability,
    dedup: Dedup,
}

impl<'a> SimilaritySearchLinker<'a> {
    pub fn new(config: LinkerConfig, set1: &'a [Record], set2: &'a [Record]) -> LinkageResult<Self> {
        config.validate()?;

        let probe_is_set1 = set1.len() <= set2.len();
        let (probes, indexed, mapping) = if probe_is_set1 {
            let mapping = FieldMapping::new(
                config.kind1,
                config.fields1.clone(),
                config.kind2,
                config.fields2.clone(),
            )?;
            (set1, set2, mapping)
        } else {
            let mapping = FieldMapping::new(
                config.kind2,
                config.fields2.clone(),
                config.kind1,
                config.fields1.clone(),
            )?;
            (set2, set1, mapping)
        };

        let indexed_kind = mapping.to_kind();
        let metric = CompositeMetric::new(config.base_metric, mapping.to_fields().to_vec(), config.aggregation)
            .excluding(indexed_kind.id_field());
        let index = build_search_structure(Arc::new(metric), indexed.to_vec(), &config.search)?;

        let dedup = if !config.is_symmetric() {
            Dedup::Off
        } else if same_ids(set1, set2) {
            Dedup::IdOrder
        } else {
            Dedup::Seen
        };

        info!(
            "linking {} probes against {} indexed records ({}, threshold {}, flipped: {})",
            probes.len(),
            indexed.len(),
            config.provenance,
            config.threshold,
            !probe_is_set1
        );

        Ok(Self {
            config,
            probes,
            probe_is_set1,
            mapping,
            index,
            viability: viability::always(),
            dedup,
        })
    }

    pub fn with_viability(mut self, viability: Viability) -> Self {
        self.viability = viability;
        self
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// True when the second set is the probe side.
    pub fn is_flipped(&self) -> bool {
        !self.probe_is_set1
    }

    /// A fresh lazy pass over all links. Nothing is searched until the
    /// iterator is pulled, one probe record at a time.
    pub fn links(&self) -> Links<'_, 'a> {
        Links {
            linker: self,
            next_probe: 0,
            pending: VecDeque::new(),
            seen: HashSet::new(),
            stats: LinkageStats::default(),
            finished: false,
        }
    }

    /// Links grouped per probe record, one (possibly empty) batch per probe.
    pub fn link_batches(&self) -> LinkBatches<'_, 'a> {
        LinkBatches(self.links())
    }

    pub fn index_stats(&self) -> SearchStats {
        self.index.stats()
    }

    /// Stops the index workers. Later passes panic.
    pub fn terminate(&mut self) {
        self.index.terminate();
    }

    fn links_for(&self, probe: &Record, seen: &mut HashSet<(RecordId, RecordId)>, stats: &mut LinkageStats) -> Vec<Link> {
        let threshold = self.config.threshold;
        let query = self.mapping.project(probe);
        let hits = self.index.find_within_threshold(&query, threshold);

        stats.probes += 1;
        stats.candidates += hits.len() as u64;

        let mut batch = Vec::new();
        for hit in hits {
            let candidate = hit.value;
            if hit.distance > threshold {
                stats.over_threshold += 1;
                continue;
            }
            if candidate.id() == probe.id() {
                stats.reflexive += 1;
                continue;
            }
            let duplicate = match self.dedup {
                Dedup::Off => false,
                Dedup::IdOrder => probe.id() > candidate.id(),
                Dedup::Seen => {
                    let key = (probe.id().min(candidate.id()), probe.id().max(candidate.id()));
                    !seen.insert(key)
                }
            };
            if duplicate {
                stats.duplicate += 1;
                continue;
            }

            let (record1, record2) = if self.probe_is_set1 {
                (probe, candidate)
            } else {
                (candidate, probe)
            };
            let pair = RecordPair { record1, record2, distance: hit.distance };
            if !(self.viability)(&pair) {
                stats.not_viable += 1;
                continue;
            }

            stats.emitted += 1;
            batch.push(self.make_link(&pair, probe, candidate));
        }
        batch
    }

    fn make_link(&self, pair: &RecordPair<'_>, probe: &Record, candidate: &Record) -> Link {
        let fields_populated = self
            .mapping
            .from_fields()
            .iter()
            .zip(self.mapping.to_fields())
            .filter(|&(&pf, &cf)| probe.present(pf).is_some() && candidate.present(cf).is_some())
            .count();

        Link {
            record1: pair.record1.id(),
            kind1: self.config.kind1,
            role1: self.config.role1.clone(),
            record2: pair.record2.id(),
            kind2: self.config.kind2,
            role2: self.config.role2.clone(),
            link_type: self.config.link_type,
            distance: pair.distance,
            fields_populated,
            provenance: format!("{}, distance: {}", self.config.provenance, pair.distance),
        }
    }
}

fn same_ids(set1: &[Record], set2: &[Record]) -> bool {
    if set1.len() != set2.len() {
        return false;
    }
    let ids: HashSet<RecordId> = set1.iter().map(Record::id).collect();
    set2.iter().all(|r| ids.contains(&r.id()))
}

/// Pull-based stream of links in probe order.
pub struct Links<'l, 'a> {
    linker: &'l SimilaritySearchLinker<'a>,
    next_probe: usize,
    pending: VecDeque<Link>,
    seen: HashSet<(RecordId, RecordId)>,
    stats: LinkageStats,
    finished: bool,
}

impl Links<'_, '_> {
    pub fn stats(&self) -> &LinkageStats {
        &self.stats
    }

    /// Searches the next probe record and returns its links, `None` once
    /// every probe has been searched.
    pub fn next_batch(&mut self) -> Option<Vec<Link>> {
        let Some(probe) = self.linker.probes.get(self.next_probe) else {
            if !self.finished {
                self.finished = true;
                info!("linkage pass done: {:?}", self.stats);
            }
            return None;
        };
        self.next_probe += 1;

        let batch = self.linker.links_for(probe, &mut self.seen, &mut self.stats);

        let interval = self.linker.config.progress_interval;
        if interval > 0 && self.next_probe % interval == 0 {
            debug!(
                "{}/{} probes searched, {} links so far",
                self.next_probe,
                self.linker.probes.len(),
                self.stats.emitted
            );
        }
        Some(batch)
    }
}

impl Iterator for Links<'_, '_> {
    type Item = Link;

    fn next(&mut self) -> Option<Link> {
        loop {
            if let Some(link) = self.pending.pop_front() {
                return Some(link);
            }
            let batch = self.next_batch()?;
            self.pending.extend(batch);
        }
    }
}

pub struct LinkBatches<'l, 'a>(Links<'l, 'a>);

impl LinkBatches<'_, '_> {
    pub fn stats(&self) -> &LinkageStats {
        self.0.stats()
    }
}

impl Iterator for LinkBatches<'_, '_> {
    type Item = Vec<Link>;

    fn next(&mut self) -> Option<Vec<Link>> {
        self.0.next_batch()
    }
}
