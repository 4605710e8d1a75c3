//! Stream entry points: OBO text in, frozen ontology out.
//!
//! The reader is consumed in a single pass; only the builder's accumulator
//! grows with the input.

use phenograph_obo::{OboEvent, OboReader};
use std::io::BufRead;

use crate::builder::{BuildReport, OntologyBuilder};
use crate::config::OntologyConfig;
use crate::factory::EntryFactory;
use crate::ontology::Ontology;
use crate::BuildError;

pub fn load_ontology_with_report<R, F>(
    reader: R,
    factory: &F,
    config: &OntologyConfig,
) -> Result<(Ontology, BuildReport), BuildError>
where
    R: BufRead,
    F: EntryFactory + ?Sized,
{
    let mut builder = OntologyBuilder::new(factory, config.clone());
    for event in OboReader::new(reader) {
        match event? {
            OboEvent::Header(header) => builder.header(&header),
            OboEvent::Stanza(stanza) => builder.add_stanza(&stanza)?,
        }
    }
    builder.build_with_report()
}

pub fn load_ontology<R, F>(
    reader: R,
    factory: &F,
    config: &OntologyConfig,
) -> Result<Ontology, BuildError>
where
    R: BufRead,
    F: EntryFactory + ?Sized,
{
    load_ontology_with_report(reader, factory, config).map(|(ontology, _)| ontology)
}

pub fn load_ontology_str<F>(
    text: &str,
    factory: &F,
    config: &OntologyConfig,
) -> Result<Ontology, BuildError>
where
    F: EntryFactory + ?Sized,
{
    load_ontology(text.as_bytes(), factory, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::UberphenoEntryFactory;
    use phenograph_obo::OboParseError;

    #[test]
    fn parse_errors_surface_as_build_errors() {
        let err = load_ontology_str(
            "[Term]\nid: UBERPHENO:1\nis_a UBERPHENO:2\n",
            &UberphenoEntryFactory,
            &OntologyConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Parse(OboParseError::Syntax { line: 3, .. })
        ));
    }

    #[test]
    fn header_only_input_is_empty() {
        let err = load_ontology_str(
            "format-version: 1.2\n",
            &UberphenoEntryFactory,
            &OntologyConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::EmptyOntology));
    }
}
