use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use linkage::graph::{count_open_triangles, InMemoryGraph, OpenTriangleDetector, TrianglePattern};
use linkage::linker::{persist_links, SimilaritySearchLinker};
use linkage::resolver::Resolver;
use linkage::utils::config::{LinkerConfig, ResolverConfig, SearchConfig};
use linkage::utils::logging;
use linkage::utils::record::{birth, records_by_id, Record};
use linkage::utils::types::{EdgeType, RecordKind};

const FORENAMES: &[&str] = &["ANDERS", "PER", "JOHAN", "ERIK", "OLOF", "NILS", "LARS", "JONAS"];
const MOTHERS: &[&str] = &["ANNA", "BRITA", "KARIN", "MARIA", "CHRISTINA", "MAGDALENA", "SARA"];
const SURNAMES: &[&str] = &["ANDERSSON", "PERSSON", "JOHANSSON", "ERIKSSON", "OLSSON", "NILSSON"];
const PLACES: &[&str] = &["UMEA", "HOLMSUND", "SAVAR", "TAVELSJO"];

/// Synthetic parish: each family gets a handful of children born a couple of
/// years apart; a few births copy one family's names onto another's dates to
/// produce open triangles.
fn synthetic_births(families: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut births = Vec::new();
    let mut next_id = 1u64;

    for _ in 0..families {
        let father = FORENAMES.choose(&mut rng).copied().unwrap_or("ANDERS");
        let mother = MOTHERS.choose(&mut rng).copied().unwrap_or("ANNA");
        let surname = SURNAMES.choose(&mut rng).copied().unwrap_or("ANDERSSON");
        let maiden = format!("{}DOTTER", &SURNAMES.choose(&mut rng).copied().unwrap_or("PER")[..3]);
        let place = PLACES.choose(&mut rng).copied().unwrap_or("UMEA");
        let married = rng.random_range(1800..1850);

        let mut year = married + 1;
        for _ in 0..rng.random_range(2..6) {
            let child = Record::blank(next_id, RecordKind::Birth)
                .with_field(birth::FORENAME, *FORENAMES.choose(&mut rng).unwrap_or(&"PER"))
                .with_field(birth::SURNAME, surname)
                .with_field(birth::BIRTH_DAY, rng.random_range(1..29).to_string())
                .with_field(birth::BIRTH_MONTH, rng.random_range(1..13).to_string())
                .with_field(birth::BIRTH_YEAR, year.to_string())
                .with_field(birth::BIRTH_ADDRESS, place)
                .with_field(birth::FATHER_FORENAME, father)
                .with_field(birth::FATHER_SURNAME, surname)
                .with_field(birth::MOTHER_FORENAME, mother)
                .with_field(birth::MOTHER_MAIDEN_SURNAME, maiden.as_str())
                .with_field(birth::PARENTS_DAY_OF_MARRIAGE, "1")
                .with_field(birth::PARENTS_MONTH_OF_MARRIAGE, "6")
                .with_field(birth::PARENTS_YEAR_OF_MARRIAGE, married.to_string());
            births.push(child);
            next_id += 1;
            year += rng.random_range(2..4);
        }
    }

    // Transcription slips: a child whose record names the wrong mother.
    let slips: Vec<Record> = births
        .iter()
        .step_by(7)
        .map(|r| {
            let id = next_id + r.id();
            let mut slip = Record::new(id, RecordKind::Birth, r.fields().to_vec());
            slip.set_field(birth::STANDARDISED_ID, id.to_string());
            slip.set_field(birth::MOTHER_FORENAME, *MOTHERS.choose(&mut rng).unwrap_or(&"ANNA"));
            slip.set_field(birth::BIRTH_YEAR, (rng.random_range(1790..1900)).to_string());
            slip
        })
        .collect();
    births.extend(slips);
    births
}

fn main() -> Result<()> {
    logging::init();

    let births = synthetic_births(40, 1822);
    info!("generated {} birth records", births.len());

    let identity = RecordKind::Birth.identity_fields().to_vec();
    let config = LinkerConfig::symmetric(RecordKind::Birth, "baby", identity)
        .with_threshold(0.25)
        .with_provenance("Birth-Birth siblings")
        .with_search(SearchConfig { reference_points: 10, ..SearchConfig::default() });

    let mut linker = SimilaritySearchLinker::new(config, &births, &births)?;
    let mut graph = InMemoryGraph::new();
    let persisted = persist_links(linker.links(), &mut graph);
    info!("index stats: {:?}", linker.index_stats());
    linker.terminate();

    let pattern = TrianglePattern::new(EdgeType::Sibling).with_kinds(
        RecordKind::Birth,
        RecordKind::Birth,
        RecordKind::Birth,
    );
    let before = count_open_triangles(&graph, &pattern);
    let clusters = OpenTriangleDetector::new(pattern.clone()).detect_clusters(&graph);

    let store = records_by_id(&births);
    let resolver = Resolver::new(ResolverConfig::default(), &store)?;
    let report = resolver.resolve_all(&mut graph, &clusters);
    let after = count_open_triangles(&graph, &pattern);

    info!(
        "{persisted} sibling edges, open triangles {before} -> {after}, rules: {:?}",
        report.by_provenance
    );
    Ok(())
}
