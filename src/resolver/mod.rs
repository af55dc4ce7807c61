//! Repair of open triangles.
//!
//! Each pivot cluster is worked through in order of evidence strength: vital
//! event rules per chain, then MSED over the parents' names, then a vote
//! over competing explanations, and finally hierarchical clustering. A chain
//! nothing speaks for or against is left alone.
pub mod cluster;
pub mod heuristics;
pub mod msed;
pub mod normalise;
pub mod vote;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, info, warn};

use crate::graph::{Chain, GraphStore, OpenTriangleCluster};
use crate::metric::{IdentityMetric, Metric};
use crate::resolver::cluster::Dendrogram;
use crate::resolver::heuristics::{ChainRecords, FamilyStats, Repair};
use crate::resolver::vote::Vote;
use crate::utils::config::ResolverConfig;
use crate::utils::errors::LinkageResult;
use crate::utils::record::{Record, RecordStore};
use crate::utils::types::{Distance, EdgeType, RecordId};

/// Labels recorded on every edge the resolver creates or deletes.
pub mod provenance {
    pub const MAX_AGE_RANGE: &str = "max_age_range";
    pub const MIN_B_INTERVAL: &str = "min_b_interval";
    pub const BIRTHPLACE_MODE: &str = "birthplace_mode";
    pub const MATCH_M_DATE_BD: &str = "match_m_date_bd";
    pub const MSED: &str = "msed";
    pub const SOLE_EXPLANATION: &str = "sole_explanation";
    pub const CLARITY_VOTE: &str = "clarity_vote";
    pub const CLUSTER_SPLIT: &str = "cluster_split";
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub clusters: usize,
    pub chains: usize,
    pub created: usize,
    pub deleted: usize,
    /// Chains dropped because a record could not be fetched.
    pub skipped: usize,
    /// Chains with competing evidence and no clear winner.
    pub ambiguous: usize,
    /// Chains still open with no signal either way.
    pub untouched: usize,
    /// Mutations per rule.
    pub by_provenance: BTreeMap<String, usize>,
}

impl ResolutionReport {
    pub fn merge(&mut self, other: ResolutionReport) {
        self.clusters += other.clusters;
        self.chains += other.chains;
        self.created += other.created;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.ambiguous += other.ambiguous;
        self.untouched += other.untouched;
        for (rule, count) in other.by_provenance {
            *self.by_provenance.entry(rule).or_default() += count;
        }
    }

    pub fn mutations(&self) -> usize {
        self.created + self.deleted
    }

    fn count(&mut self, provenance: &str) {
        *self.by_provenance.entry(provenance.to_string()).or_default() += 1;
    }
}

/// A chain of the cluster with its freshly fetched records.
struct Fetched {
    chain: Chain,
    y: Record,
    z: Record,
}

pub struct Resolver<'s> {
    config: ResolverConfig,
    metric: Box<dyn Metric<Record>>,
    records: &'s dyn RecordStore,
}

impl<'s> Resolver<'s> {
    pub fn new(config: ResolverConfig, records: &'s dyn RecordStore) -> LinkageResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            metric: Box::new(IdentityMetric::default()),
            records,
        })
    }

    /// Replaces the distance used for new edges and for clustering.
    pub fn with_metric(mut self, metric: Box<dyn Metric<Record>>) -> Self {
        self.metric = metric;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn resolve_all(&self, graph: &mut dyn GraphStore, clusters: &[OpenTriangleCluster]) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        for cluster in clusters {
            report.merge(self.resolve_cluster(graph, cluster));
        }
        info!(
            "resolved {} clusters / {} chains: {} created, {} deleted, {} skipped, {} ambiguous, {} untouched",
            report.clusters,
            report.chains,
            report.created,
            report.deleted,
            report.skipped,
            report.ambiguous,
            report.untouched
        );
        report
    }

    pub fn resolve_cluster(&self, graph: &mut dyn GraphStore, cluster: &OpenTriangleCluster) -> ResolutionReport {
        let mut report = ResolutionReport {
            clusters: 1,
            chains: cluster.chains.len(),
            ..Default::default()
        };

        let x = match self.records.fetch(cluster.x) {
            Ok(x) => x,
            Err(e) => {
                warn!("skipping cluster around {}: {e}", cluster.x);
                report.skipped = cluster.chains.len();
                return report;
            }
        };
        let fetched = self.fetch_chains(cluster, &mut report);
        if fetched.is_empty() {
            return report;
        }

        let mut family: Vec<&Record> = vec![&x];
        for f in &fetched {
            for r in [&f.y, &f.z] {
                if family.iter().all(|m| m.id() != r.id()) {
                    family.push(r);
                }
            }
        }
        let stats = FamilyStats::from_records(&family);

        let mut pending = Vec::new();
        for (i, f) in fetched.iter().enumerate() {
            if !self.is_open(graph, x.id(), &f.chain) {
                continue;
            }
            let chain = ChainRecords { x: &x, y: &f.y, z: &f.z };
            match heuristics::evaluate(&chain, &stats, &self.config) {
                Some(repair) => self.apply(graph, &repair, &chain, &mut report),
                None => pending.push(i),
            }
        }

        if !pending.is_empty() {
            self.resolve_by_msed(graph, &x, &fetched, &pending, &mut report);
            pending.retain(|&i| self.is_open(graph, x.id(), &fetched[i].chain));
        }

        let mut fallback = Vec::new();
        for i in pending {
            let f = &fetched[i];
            match vote::vote(graph, &[x.id(), f.y.id(), f.z.id()], &self.config) {
                Vote::Keep { winner, discard, provenance } => {
                    debug!("{} explains {}-{}-{} ({provenance})", winner, x.id(), f.y.id(), f.z.id());
                    for (member, target) in discard {
                        self.delete(graph, member, target, self.config.explanation_edge_type, provenance, &mut report);
                    }
                }
                Vote::Ambiguous => {
                    debug!("ambiguous explanations for {}-{}-{}", x.id(), f.y.id(), f.z.id());
                    report.ambiguous += 1;
                }
                Vote::NoContest => fallback.push(i),
            }
        }

        if !fallback.is_empty() {
            self.resolve_by_clustering(graph, &x, &mut report);
            report.untouched += fallback
                .iter()
                .filter(|&&i| self.is_open(graph, x.id(), &fetched[i].chain))
                .count();
        }
        report
    }

    fn fetch_chains(&self, cluster: &OpenTriangleCluster, report: &mut ResolutionReport) -> Vec<Fetched> {
        let mut fetched = Vec::with_capacity(cluster.chains.len());
        for chain in &cluster.chains {
            match (self.records.fetch(chain.y), self.records.fetch(chain.z)) {
                (Ok(y), Ok(z)) => fetched.push(Fetched { chain: *chain, y, z }),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("skipping chain {}-{}-{}: {e}", cluster.x, chain.y, chain.z);
                    report.skipped += 1;
                }
            }
        }
        fetched
    }

    fn is_open(&self, graph: &dyn GraphStore, x: RecordId, chain: &Chain) -> bool {
        let relation = self.config.edge_type;
        graph.has_edge(x, chain.y, relation)
            && graph.has_edge(chain.y, chain.z, relation)
            && !graph.has_edge(x, chain.z, relation)
    }

    fn apply(&self, graph: &mut dyn GraphStore, repair: &Repair, chain: &ChainRecords<'_>, report: &mut ResolutionReport) {
        match *repair {
            Repair::Delete { a, b, provenance } => {
                self.delete(graph, a, b, self.config.edge_type, provenance, report);
            }
            Repair::Create { a, b, provenance } => {
                let distance = match self.metric.distance(chain.x, chain.z) {
                    Ok(d) => d,
                    Err(e) => {
                        debug!("distance {a}-{b} unavailable, using chain mean: {e}");
                        self.chain_mean(graph, chain)
                    }
                };
                let populated = chain
                    .x
                    .kind()
                    .identity_fields()
                    .iter()
                    .zip(chain.z.kind().identity_fields())
                    .filter(|&(&xf, zf)| chain.x.present(xf).is_some() && chain.z.present(zf).is_some())
                    .count();
                if graph.create_edge(a, b, self.config.edge_type, distance, populated, provenance) {
                    report.created += 1;
                    report.count(provenance);
                }
            }
        }
    }

    fn chain_mean(&self, graph: &dyn GraphStore, chain: &ChainRecords<'_>) -> Distance {
        let relation = self.config.edge_type;
        let legs = [
            graph.edge(chain.x.id(), chain.y.id(), relation),
            graph.edge(chain.y.id(), chain.z.id(), relation),
        ];
        let known: Vec<Distance> = legs.iter().flatten().map(|e| e.distance).collect();
        if known.is_empty() {
            0.0
        } else {
            known.iter().sum::<Distance>() / known.len() as Distance
        }
    }

    fn delete(
        &self,
        graph: &mut dyn GraphStore,
        a: RecordId,
        b: RecordId,
        relation: EdgeType,
        provenance: &str,
        report: &mut ResolutionReport,
    ) {
        if graph.delete_edge(a, b, relation, provenance) {
            report.deleted += 1;
            report.count(provenance);
        }
    }

    /// Families are seeded from chains whose three records agree on the
    /// parents' names, or from pairs of a disagreeing chain that agree
    /// closely. A disagreeing chain with exactly two records inside one
    /// family loses the edge to the outsider end.
    fn resolve_by_msed(
        &self,
        graph: &mut dyn GraphStore,
        x: &Record,
        fetched: &[Fetched],
        pending: &[usize],
        report: &mut ResolutionReport,
    ) {
        let mut identities: HashMap<RecordId, normalise::Identity> = HashMap::new();
        let mut families: Vec<BTreeSet<RecordId>> = Vec::new();
        let mut doubtful: Vec<[RecordId; 3]> = Vec::new();

        for &i in pending {
            let f = &fetched[i];
            let ids = [x.id(), f.y.id(), f.z.id()];
            let mut group = [
                normalise::identity_of(x),
                normalise::identity_of(&f.y),
                normalise::identity_of(&f.z),
            ];
            normalise::canonicalise(&mut group);
            let strings = group.each_ref().map(msed::identity_string);
            for (id, record) in ids.iter().zip([x, &f.y, &f.z]) {
                identities.entry(*id).or_insert_with(|| normalise::identity_of(record));
            }

            let whole = msed::msed(&strings);
            if whole < self.config.msed_threshold {
                msed::add_family(&mut families, ids);
            } else if whole > self.config.msed_threshold {
                doubtful.push(ids);
                if msed::msed(&strings[0..2]) < self.config.tuple_threshold {
                    msed::add_family(&mut families, ids[0..2].iter().copied());
                }
                if msed::msed(&strings[1..3]) < self.config.tuple_threshold {
                    msed::add_family(&mut families, ids[1..3].iter().copied());
                }
            }
        }

        let k = self.config.msed_k;
        let families: Vec<BTreeSet<RecordId>> = families
            .into_iter()
            .flat_map(|family| {
                if family.len() < k {
                    return vec![family];
                }
                // Canonicalised together, so every member is ranked in one form.
                let ids: Vec<RecordId> = family.iter().copied().filter(|id| identities.contains_key(id)).collect();
                let group = ids.iter().filter_map(|id| identities.get(id).cloned()).collect();
                let members: Vec<(RecordId, String)> = ids.into_iter().zip(msed::family_strings(group)).collect();
                let ranked = msed::ranked_subsets(&members, k);
                msed::grow_families(&ranked, self.config.growth_ratio_bound, self.config.growth_absolute_bound)
            })
            .collect();

        for [cx, cy, cz] in doubtful {
            for family in &families {
                let inside = [cx, cy, cz].map(|id| family.contains(&id));
                let outsider = match inside {
                    [false, true, true] => cx,
                    [true, true, false] => cz,
                    _ => continue,
                };
                self.delete(graph, outsider, cy, self.config.edge_type, provenance::MSED, report);
                break;
            }
        }
    }

    /// Splits the family around `x` where average linkage shows two tight
    /// groups far apart.
    fn resolve_by_clustering(&self, graph: &mut dyn GraphStore, x: &Record, report: &mut ResolutionReport) {
        let ids = self.candidate_family(graph, x.id());
        let mut members: Vec<Record> = Vec::with_capacity(ids.len());
        for id in ids {
            match self.records.fetch(id) {
                Ok(r) => members.push(r),
                Err(e) => warn!("leaving {id} out of clustering: {e}"),
            }
        }
        if members.len() < 3 {
            return;
        }

        let n = members.len();
        let mut matrix = vec![vec![None; n]; n];
        for i in 0..n {
            for j in i + 1..n {
                match self.metric.distance(&members[i], &members[j]) {
                    Ok(d) => {
                        matrix[i][j] = Some(d);
                        matrix[j][i] = Some(d);
                    }
                    Err(e) => debug!("no distance {}-{}: {e}", members[i].id(), members[j].id()),
                }
            }
        }

        let ids: Vec<RecordId> = members.iter().map(Record::id).collect();
        let tree = Dendrogram::average_linkage(&ids, &matrix, self.config.reject_threshold);
        for (left, right) in tree.splits(self.config.match_threshold, self.config.reject_threshold) {
            for &a in &left {
                for &b in &right {
                    self.delete(graph, a, b, self.config.edge_type, provenance::CLUSTER_SPLIT, report);
                }
            }
        }
    }

    /// Records reachable from `x` over the resolved relationship within the
    /// configured number of steps, `x` first, nearest first, up to the
    /// configured family size.
    fn candidate_family(&self, graph: &dyn GraphStore, x: RecordId) -> Vec<RecordId> {
        let limit = self.config.max_family_size;
        let mut family = vec![x];
        let mut seen = HashSet::from([x]);
        let mut queue = VecDeque::from([(x, 0usize)]);
        while let Some((id, depth)) = queue.pop_front() {
            if depth == self.config.max_family_depth {
                continue;
            }
            for next in graph.neighbours(id, self.config.edge_type) {
                if family.len() == limit {
                    debug!("candidate family of {x} capped at {limit} records");
                    return family;
                }
                if seen.insert(next) {
                    family.push(next);
                    queue.push_back((next, depth + 1));
                }
            }
        }
        family
    }
}
