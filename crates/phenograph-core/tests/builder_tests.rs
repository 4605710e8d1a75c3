use phenograph_core::{
    load_ontology_str, load_ontology_with_report, BuildError, BuildReport, BuildWarning,
    GenericEntryFactory, HpoEntryFactory, Ontology, OntologyBuilder, OntologyConfig, QueryError,
    RootPolicy, TermId, TermIdError,
};
use phenograph_obo::parse_obo;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn id(s: &str) -> TermId {
    TermId::parse(s).expect("valid curie")
}

fn build(text: &str) -> Result<(Ontology, BuildReport), BuildError> {
    init_tracing();
    load_ontology_with_report(text.as_bytes(), &HpoEntryFactory, &OntologyConfig::default())
}

fn reject_config() -> OntologyConfig {
    OntologyConfig {
        root_policy: RootPolicy::Reject,
        ..OntologyConfig::default()
    }
}

// ============================================================================
// Alternate ids
// ============================================================================

#[test]
fn either_alt_id_resolves_to_the_primary_term() {
    let text = "\
[Term]
id: HP:0000001
name: All

[Term]
id: HP:0000005
name: Mode of inheritance
alt_id: HP:0001453
alt_id: HP:0001461
is_a: HP:0000001
";
    let (onto, report) = build(text).unwrap();
    assert!(report.warnings.is_empty());

    for alt in ["HP:0001453", "HP:0001461"] {
        let term = onto.term(&id(alt)).unwrap();
        assert_eq!(term.id, id("HP:0000005"));
        assert_eq!(term.name, "Mode of inheritance");
    }
    assert_eq!(
        onto.term(&id("HP:0000005")).unwrap().alt_ids,
        vec![id("HP:0001453"), id("HP:0001461")]
    );

    // Resolution is idempotent.
    let once = onto.primary_id(&id("HP:0001453")).cloned().unwrap();
    assert_eq!(onto.primary_id(&once), Some(&once));

    // Alt ids are not vertices but queries accept them.
    assert!(!onto.graph().contains(&id("HP:0001453")));
    assert_eq!(
        onto.parents(&id("HP:0001461")).unwrap(),
        vec![id("HP:0000001")]
    );
    assert_eq!(onto.alt_ids().len(), 2);
}

#[test]
fn alt_id_equal_to_a_primary_id_is_dropped() {
    let text = "\
[Term]
id: HP:1
alt_id: HP:2

[Term]
id: HP:2
is_a: HP:1
";
    let (onto, report) = build(text).unwrap();
    assert_eq!(
        report.warnings,
        vec![BuildWarning::AltIdShadowsPrimary {
            alt_id: id("HP:2"),
            declared_by: id("HP:1"),
        }]
    );
    assert_eq!(onto.term(&id("HP:2")).unwrap().id, id("HP:2"));
    assert!(onto.term(&id("HP:1")).unwrap().alt_ids.is_empty());
    assert!(onto.alt_ids().is_empty());
}

#[test]
fn alt_id_claimed_twice_keeps_first_writer() {
    let text = "\
[Term]
id: HP:1

[Term]
id: HP:2
alt_id: HP:100
is_a: HP:1

[Term]
id: HP:3
alt_id: HP:100
is_a: HP:1
";
    let (onto, report) = build(text).unwrap();
    assert_eq!(
        report.warnings,
        vec![BuildWarning::AltIdConflict {
            alt_id: id("HP:100"),
            kept: id("HP:2"),
            dropped_from: id("HP:3"),
        }]
    );
    assert_eq!(onto.term(&id("HP:100")).unwrap().id, id("HP:2"));
    assert!(onto.term(&id("HP:3")).unwrap().alt_ids.is_empty());
}

// ============================================================================
// Vertices and metadata
// ============================================================================

#[test]
fn dangling_target_becomes_metadata_less_vertex() {
    let text = "\
[Term]
id: HP:2
is_a: HP:1
";
    let (onto, report) = build(text).unwrap();
    assert_eq!(
        report.warnings,
        vec![BuildWarning::DanglingVertex { term_id: id("HP:1") }]
    );
    assert!(onto.contains(&id("HP:1")));
    assert_eq!(onto.root(), &id("HP:1"));
    assert_eq!(
        onto.term(&id("HP:1")).unwrap_err(),
        QueryError::NoMetadata(id("HP:1"))
    );
    assert_eq!(onto.count_all_terms(), 1);
    assert_eq!(onto.vertex_count(), 2);
}

#[test]
fn obsolete_terms_are_partitioned_but_remain_vertices() {
    let text = "\
[Term]
id: HP:1
name: All

[Term]
id: HP:2
is_a: HP:1

[Term]
id: HP:3
name: obsolete thing
is_obsolete: true
replaced_by: HP:2
";
    let (onto, report) = build(text).unwrap();
    assert!(report.warnings.is_empty());
    assert_eq!(onto.root(), &id("HP:1"));
    assert_eq!(onto.count_all_terms(), 3);
    assert_eq!(onto.non_obsolete_term_ids().len(), 2);
    assert!(onto.obsolete_term_ids().contains(&id("HP:3")));
    assert_eq!(onto.all_term_ids().len(), 3);
    assert!(onto.graph().contains(&id("HP:3")));

    let obsolete = onto.term(&id("HP:3")).unwrap();
    assert!(obsolete.is_obsolete());
    assert_eq!(obsolete.replaced_by, vec![id("HP:2")]);
}

#[test]
fn replaced_by_alone_marks_a_term_obsolete() {
    let text = "\
[Term]
id: HP:1
name: All

[Term]
id: HP:2
is_a: HP:1

[Term]
id: HP:3
is_a: HP:1
replaced_by: HP:2

[Term]
id: HP:4
replaced_by: HP:2
";
    let (onto, report) = build(text).unwrap();
    assert!(report.warnings.is_empty());

    let replaced = onto.term(&id("HP:3")).unwrap();
    assert!(replaced.is_obsolete());
    assert_eq!(
        onto.obsolete_term_ids().iter().cloned().collect::<Vec<_>>(),
        vec![id("HP:3"), id("HP:4")]
    );
    assert_eq!(
        onto.non_obsolete_term_ids().iter().cloned().collect::<Vec<_>>(),
        vec![id("HP:1"), id("HP:2")]
    );
    // A parentless replaced term is not a second root.
    assert_eq!(onto.root(), &id("HP:1"));
}

#[test]
fn typedef_and_instance_stanzas_are_skipped() {
    let text = "\
[Term]
id: HP:1

[Typedef]
id: part_of
name: part of

[Instance]
id: patient_1
instance_of: HP:1
";
    let (onto, report) = build(text).unwrap();
    assert_eq!(report.term_stanzas, 1);
    assert_eq!(report.skipped_stanzas, 2);
    assert_eq!(onto.vertex_count(), 1);
}

// ============================================================================
// Fatal errors
// ============================================================================

#[test]
fn empty_inputs_are_rejected() {
    assert!(matches!(build(""), Err(BuildError::EmptyOntology)));
    assert!(matches!(
        build("format-version: 1.2\n\n[Typedef]\nid: part_of\n"),
        Err(BuildError::EmptyOntology)
    ));
}

#[test]
fn is_a_cycle_is_rejected() {
    let text = "\
[Term]
id: HP:1
is_a: HP:3

[Term]
id: HP:2
is_a: HP:1

[Term]
id: HP:3
is_a: HP:2

[Term]
id: HP:4
";
    match build(text) {
        Err(BuildError::Cycle { members }) => {
            assert_eq!(members, vec![id("HP:1"), id("HP:2"), id("HP:3")]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn self_loop_is_a_cycle() {
    assert!(matches!(
        build("[Term]\nid: HP:1\nis_a: HP:1\n"),
        Err(BuildError::Cycle { .. })
    ));
}

#[test]
fn part_of_loops_do_not_count_as_cycles() {
    init_tracing();
    let text = "\
[Term]
id: GO:1

[Term]
id: GO:2
is_a: GO:1
relationship: part_of GO:3

[Term]
id: GO:3
is_a: GO:1
relationship: part_of GO:2
";
    let onto = load_ontology_str(text, &GenericEntryFactory, &OntologyConfig::default())
        .expect("part_of loop is fine");
    assert_eq!(onto.edge_count(), 4);
    assert_eq!(onto.root(), &id("GO:1"));
}

#[test]
fn only_obsolete_sinks_means_no_root() {
    assert!(matches!(
        build("[Term]\nid: HP:1\nis_obsolete: true\n"),
        Err(BuildError::NoRoot)
    ));
}

#[test]
fn invalid_term_id_reports_its_line() {
    match build("[Term]\nid: HP:1\n\n[Term]\nid: not-a-curie\n") {
        Err(BuildError::InvalidTermId { line, source }) => {
            assert_eq!(line, 4);
            assert!(matches!(source, TermIdError::MissingSeparator(_)));
        }
        other => panic!("expected invalid id, got {other:?}"),
    }
}

#[test]
fn parse_errors_propagate() {
    assert!(matches!(
        build("[Term]\nid: HP:1\nname: a\nname: b\n"),
        Err(BuildError::Parse(_))
    ));
}

// ============================================================================
// Root policy
// ============================================================================

const TWO_ROOTS: &str = "\
[Term]
id: HP:2

[Term]
id: HP:1

[Term]
id: HP:3
is_a: HP:1
";

#[test]
fn multiple_roots_get_an_artificial_root() {
    let (onto, report) = build(TWO_ROOTS).unwrap();
    let root = id("owl:Thing");
    assert_eq!(onto.root(), &root);
    assert_eq!(onto.term(&root).unwrap().name, "artificial root");
    assert_eq!(onto.children(&root).unwrap(), vec![id("HP:1"), id("HP:2")]);

    // Synthesized edges are numbered after the input ones, in candidate order.
    let synthesized: Vec<(u32, TermId)> = onto
        .incoming_relationships(&root)
        .unwrap()
        .iter()
        .map(|r| (r.id, r.source.clone()))
        .collect();
    assert_eq!(synthesized, vec![(2, id("HP:1")), (3, id("HP:2"))]);

    assert_eq!(
        report.warnings,
        vec![BuildWarning::ArtificialRoot {
            root: root.clone(),
            children: vec![id("HP:1"), id("HP:2")],
        }]
    );
}

#[test]
fn reject_policy_fails_on_multiple_roots() {
    init_tracing();
    match load_ontology_str(TWO_ROOTS, &HpoEntryFactory, &reject_config()) {
        Err(BuildError::MultipleRoots { candidates }) => {
            assert_eq!(candidates, vec![id("HP:1"), id("HP:2")]);
        }
        other => panic!("expected multiple roots, got {other:?}"),
    }
}

#[test]
fn custom_artificial_root_from_json_config() {
    init_tracing();
    let config = OntologyConfig::from_json(
        r#"{ "artificial_root": "HP:0000000", "artificial_root_name": "synthetic" }"#,
    )
    .unwrap();
    let onto = load_ontology_str(TWO_ROOTS, &HpoEntryFactory, &config).unwrap();
    assert_eq!(onto.root(), &id("HP:0000000"));
    assert_eq!(onto.term(&id("HP:0000000")).unwrap().name, "synthetic");
}

// ============================================================================
// Builder surface
// ============================================================================

#[test]
fn builder_accepts_pre_parsed_stanzas() {
    init_tracing();
    let file = parse_obo("ontology: x\n\n[Term]\nid: HP:1\n\n[Term]\nid: HP:2\nis_a: HP:1\n")
        .unwrap();

    let mut builder = OntologyBuilder::new(&HpoEntryFactory, OntologyConfig::default());
    builder.header(&file.header);
    for stanza in &file.stanzas {
        builder.add_stanza(stanza).unwrap();
    }
    let onto = builder.build().unwrap();
    assert_eq!(onto.meta().get("ontology"), Some("x"));
    assert_eq!(onto.root(), &id("HP:1"));
}

#[test]
fn builder_works_through_a_trait_object() {
    init_tracing();
    let factory: Box<dyn phenograph_core::EntryFactory> = Box::new(GenericEntryFactory);
    let mut builder = OntologyBuilder::new(factory.as_ref(), OntologyConfig::default());
    let file = parse_obo("[Term]\nid: GO:1\n").unwrap();
    builder.add_obo_file(&file).unwrap();
    assert_eq!(builder.build().unwrap().root(), &id("GO:1"));
}

#[test]
fn building_twice_is_deterministic() {
    let text = include_str!("data/go_sample.obo");
    let (a, _) = build(text).unwrap();
    let (b, _) = build(text).unwrap();

    let vertices = |o: &Ontology| o.graph().vertices().cloned().collect::<Vec<_>>();
    let edges = |o: &Ontology| {
        o.relationships()
            .map(|r| (r.id, r.source.clone(), r.dest.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(vertices(&a), vertices(&b));
    assert_eq!(edges(&a), edges(&b));
    assert_eq!(a.root(), b.root());
}
