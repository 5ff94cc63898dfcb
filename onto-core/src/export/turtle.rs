//! OWL 2 Turtle rendering of an [`OntologyDocument`].

use std::fmt::{self, Write};

use super::OntologyDocument;

const PREFIXES: &[(&str, &str)] = &[
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

fn namespace(base_iri: &str) -> String {
    if base_iri.ends_with('#') || base_iri.ends_with('/') {
        base_iri.to_string()
    } else {
        format!("{base_iri}#")
    }
}

fn literal(label: &str) -> String {
    let mut out = String::with_capacity(label.len() + 2);
    out.push('"');
    for c in label.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn local_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!(":{n}"))
        .collect::<Vec<_>>()
        .join(" , ")
}

pub fn render(doc: &OntologyDocument) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_document(&mut out, doc);
    out
}

fn write_document(out: &mut String, doc: &OntologyDocument) -> fmt::Result {
    let ontology = doc.base_iri.trim_end_matches(['#', '/']);

    writeln!(out, "@prefix : <{}> .", namespace(&doc.base_iri))?;
    for (prefix, iri) in PREFIXES {
        writeln!(out, "@prefix {prefix}: <{iri}> .")?;
    }
    writeln!(out)?;
    writeln!(out, "<{ontology}> a owl:Ontology .")?;

    for class in &doc.classes {
        writeln!(out)?;
        writeln!(out, ":{} a owl:Class ;", class.name)?;
        writeln!(out, "    rdfs:label {} .", literal(&class.label))?;
    }

    for dp in &doc.data_properties {
        writeln!(out)?;
        writeln!(out, ":{} a owl:DatatypeProperty ;", dp.name)?;
        writeln!(out, "    rdfs:domain :{} ;", dp.domain)?;
        writeln!(out, "    rdfs:range {} ;", dp.range.curie())?;
        writeln!(out, "    rdfs:label {} .", literal(&dp.label))?;
    }

    for op in &doc.object_properties {
        writeln!(out)?;
        writeln!(out, ":{} a owl:ObjectProperty ;", op.name)?;
        if !op.domains.is_empty() {
            writeln!(out, "    rdfs:domain {} ;", local_list(&op.domains))?;
        }
        if !op.ranges.is_empty() {
            writeln!(out, "    rdfs:range {} ;", local_list(&op.ranges))?;
        }
        writeln!(out, "    rdfs:label {} .", literal(&op.label))?;
    }

    for individual in &doc.individuals {
        writeln!(out)?;
        writeln!(
            out,
            ":{} a owl:NamedIndividual , :{} ;",
            individual.name, individual.class
        )?;
        writeln!(out, "    rdfs:label {} .", literal(&individual.label))?;
    }

    Ok(())
}
