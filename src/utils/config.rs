//! Explicit configuration for each component, passed in at construction.
use crate::metric::{Aggregation, BaseMetric};
use crate::utils::errors::{LinkageError, LinkageResult};
use crate::utils::types::{Distance, EdgeType, FieldSet, RecordKind};

/// Seed used for reference point sampling unless overridden.
pub const DEFAULT_SEED: u64 = 34258723425;

/// Which search structure a linker builds over its indexed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStructureKind {
    #[default]
    BitBlaster,
    Exhaustive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub structure: SearchStructureKind,
    pub reference_points: usize,
    /// Worker threads; `None` uses the available parallelism.
    pub workers: Option<usize>,
    pub seed: u64,
    /// Records per job handed to a worker during a query.
    pub chunk_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            structure: SearchStructureKind::BitBlaster,
            reference_points: 20,
            workers: None,
            seed: DEFAULT_SEED,
            chunk_size: 256,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> LinkageResult<()> {
        if self.reference_points == 0 && self.structure == SearchStructureKind::BitBlaster {
            return Err(LinkageError::InvalidConfig("reference_points must be > 0".into()));
        }
        if self.workers == Some(0) {
            return Err(LinkageError::InvalidConfig("workers must be > 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(LinkageError::InvalidConfig("chunk_size must be > 0".into()));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

/// What to link and how to compare it. The viability rule is attached to the
/// linker itself since it is code, not data.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkerConfig {
    pub threshold: Distance,
    pub link_type: EdgeType,
    pub provenance: String,
    pub role1: String,
    pub role2: String,
    pub kind1: RecordKind,
    pub kind2: RecordKind,
    /// Compared fields of `kind1`, paired positionally with `fields2`.
    pub fields1: FieldSet,
    pub fields2: FieldSet,
    pub base_metric: BaseMetric,
    pub aggregation: Aggregation,
    pub search: SearchConfig,
    /// Probes between progress messages; 0 disables them.
    pub progress_interval: usize,
}

impl LinkerConfig {
    /// Linkage of one kind and role against itself.
    pub fn symmetric(kind: RecordKind, role: &str, fields: FieldSet) -> Self {
        Self {
            threshold: 0.5,
            link_type: EdgeType::Sibling,
            provenance: format!("{kind}-{kind} {role}"),
            role1: role.to_string(),
            role2: role.to_string(),
            kind1: kind,
            kind2: kind,
            fields1: fields.clone(),
            fields2: fields,
            base_metric: BaseMetric::NormalisedLevenshtein,
            aggregation: Aggregation::MeanOfPresent,
            search: SearchConfig::default(),
            progress_interval: 1000,
        }
    }

    /// Linkage between two kinds or roles over positionally paired fields.
    pub fn mapped(
        kind1: RecordKind,
        role1: &str,
        fields1: FieldSet,
        kind2: RecordKind,
        role2: &str,
        fields2: FieldSet,
    ) -> Self {
        Self {
            provenance: format!("{kind1}-{kind2} {role1}-{role2}"),
            role2: role2.to_string(),
            kind2,
            fields2,
            ..Self::symmetric(kind1, role1, fields1)
        }
    }

    pub fn with_threshold(mut self, threshold: Distance) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_link_type(mut self, link_type: EdgeType) -> Self {
        self.link_type = link_type;
        self
    }

    pub fn with_provenance(mut self, provenance: impl Into<String>) -> Self {
        self.provenance = provenance.into();
        self
    }

    pub fn with_metric(mut self, base_metric: BaseMetric, aggregation: Aggregation) -> Self {
        self.base_metric = base_metric;
        self.aggregation = aggregation;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Same kind and role on both sides: each unordered pair is a single link.
    pub fn is_symmetric(&self) -> bool {
        self.kind1 == self.kind2 && self.role1 == self.role2
    }

    pub fn validate(&self) -> LinkageResult<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(LinkageError::InvalidConfig(format!(
                "threshold must be finite and >= 0, got {}",
                self.threshold
            )));
        }
        if self.fields1.len() != self.fields2.len() {
            return Err(LinkageError::FieldSetMismatch {
                left: self.fields1.len(),
                right: self.fields2.len(),
            });
        }
        if self.link_type == EdgeType::Deleted {
            return Err(LinkageError::InvalidConfig("links cannot be DELETED markers".into()));
        }
        self.search.validate()
    }
}

/// Thresholds and bounds used when repairing open triangles. Defaults are the
/// values tuned on the Umea dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Relationship whose open triangles are resolved.
    pub edge_type: EdgeType,
    /// Relationship from bundle members to competing explanations.
    pub explanation_edge_type: EdgeType,
    /// Years a sibling may sit from the family median.
    pub max_age_difference: i32,
    /// Minimum days between two births of the same mother.
    pub min_birth_interval_days: i64,
    /// Birth dates closer than this are treated as twins or duplicates.
    pub twin_tolerance_days: i64,
    pub min_family_size: usize,
    /// Upper bound on the parents' marriage date distance for creating a link.
    pub date_threshold: f64,
    pub msed_threshold: f64,
    pub tuple_threshold: f64,
    pub msed_k: usize,
    pub growth_ratio_bound: f64,
    pub growth_absolute_bound: f64,
    pub clarity_threshold: f64,
    pub match_threshold: f64,
    pub reject_threshold: f64,
    /// Path length explored when gathering a candidate family.
    pub max_family_depth: usize,
    /// Records gathered into one candidate family, nearest first.
    pub max_family_size: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            edge_type: EdgeType::Sibling,
            explanation_edge_type: EdgeType::Id,
            max_age_difference: 23,
            min_birth_interval_days: 280,
            twin_tolerance_days: 2,
            min_family_size: 3,
            date_threshold: 0.8,
            msed_threshold: 0.04,
            tuple_threshold: 0.02,
            msed_k: 3,
            growth_ratio_bound: 0.5,
            growth_absolute_bound: 0.01,
            clarity_threshold: 0.2,
            match_threshold: 0.2,
            reject_threshold: 0.5,
            max_family_depth: 5,
            max_family_size: 100,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> LinkageResult<()> {
        if self.edge_type == EdgeType::Deleted || self.explanation_edge_type == EdgeType::Deleted {
            return Err(LinkageError::InvalidConfig(
                "DELETED markers cannot be resolved".into(),
            ));
        }
        if self.msed_k < 2 {
            return Err(LinkageError::InvalidConfig("msed_k must be >= 2".into()));
        }
        if self.max_family_size < 3 {
            return Err(LinkageError::InvalidConfig("max_family_size must be >= 3".into()));
        }
        if self.match_threshold > self.reject_threshold {
            return Err(LinkageError::InvalidConfig(format!(
                "match threshold {} exceeds reject threshold {}",
                self.match_threshold, self.reject_threshold
            )));
        }
        let bounds = [
            self.date_threshold,
            self.msed_threshold,
            self.tuple_threshold,
            self.growth_ratio_bound,
            self.growth_absolute_bound,
            self.clarity_threshold,
        ];
        if bounds.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(LinkageError::InvalidConfig("thresholds must be finite and >= 0".into()));
        }
        Ok(())
    }
}
