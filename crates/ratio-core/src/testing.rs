//! Shared fixtures for unit tests.

use crate::formats::RdfFormat;
use crate::schema::SchemaCatalog;
use crate::storage::MemoryTripleStore;
use crate::Term;

pub(crate) const SCHEMA: &str = r#"
@prefix ex: <http://ex.org/schema#> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix ratio: <http://www.example.org/ratio-tool#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .

ratio:Configuration ratio:hasBase "http://ex.org/data#" .

ex:Trial a owl:Class ; rdfs:label "Trial" ; rdfs:comment "A clinical trial" .
ex:Arm a owl:Class .
ex:Group a owl:Class ; rdfs:label "Group" .
ex:Site a owl:Class ; rdfs:label "Site" .
ex:Drug a owl:Class ; rdfs:label "Drug" .
ex:Antibiotic a owl:Class ; rdfs:subClassOf ex:Drug .

ex:title a owl:DatatypeProperty, owl:FunctionalProperty ;
    rdfs:domain ex:Trial ; rdfs:range xsd:string ;
    ratio:order 1 ; ratio:width 100 .
ex:hasArm a owl:ObjectProperty ;
    rdfs:domain ex:Trial ; rdfs:range ex:Arm ;
    ratio:described true ; ratio:order 2 .
ex:phase a owl:DatatypeProperty ;
    rdfs:domain ex:Trial ; rdfs:range ex:Phase ; ratio:order 3 ;
    ratio:show_label false ; ratio:deletable false .
ex:site a owl:ObjectProperty ;
    rdfs:domain ex:Trial ; rdfs:range ex:Site ;
    ratio:addCustomOptionAllowed true ; ratio:order 4 .
ex:participants a owl:DatatypeProperty ;
    rdfs:domain ex:Trial ; rdfs:range xsd:positiveInteger ; ratio:order 5 .
ex:blinded a owl:DatatypeProperty ;
    rdfs:domain ex:Trial ; rdfs:range xsd:boolean ; ratio:order 6 .

ex:drug a owl:ObjectProperty ;
    rdfs:domain ex:Arm ; rdfs:range ex:Drug ;
    ratio:addCustomOptionAllowed true ; ratio:order 1 .
ex:dose a owl:DatatypeProperty ;
    rdfs:domain ex:Arm ; rdfs:range xsd:float ; ratio:order 2 .
ex:hasGroup a owl:ObjectProperty ;
    rdfs:domain ex:Arm ; rdfs:range ex:Group ;
    ratio:described true ; ratio:order 3 .
ex:color a owl:DatatypeProperty ;
    rdfs:domain ex:Arm ; rdfs:range ex:Color ; ratio:order 4 .

ex:details a ratio:Subheading ; rdfs:domain ex:Group ; rdfs:label "Details" ; ratio:order 1 .
ex:size a owl:DatatypeProperty ;
    rdfs:domain ex:Group ; rdfs:range xsd:nonNegativeInteger ; ratio:order 2 .
ex:count a owl:DatatypeProperty ;
    rdfs:domain ex:Group ; rdfs:range xsd:integer ; ratio:order 3 .

ex:Phase owl:oneOf ( "I" "II" "III" ) .
ex:Color owl:oneOf ( "x" "y" ) .

ex:penicillin a owl:NamedIndividual, ex:Antibiotic ; rdfs:label "Penicillin" .
ex:aspirin a owl:NamedIndividual, ex:Drug ; rdfs:label "Aspirin" .
"#;

pub(crate) const TEMPLATE: &str = r#"
@prefix ex: <http://ex.org/schema#> .

# one trial with one arm
trial = root(ex:Trial, "Trial {id}")
arm = addIndividual(ex:Arm, "Arm A", trial, ex:hasArm)
"#;

pub(crate) fn ex(local: &str) -> Term {
    Term::uri(format!("http://ex.org/schema#{local}"))
}

pub(crate) fn schema_store() -> (MemoryTripleStore, SchemaCatalog) {
    let mut store = MemoryTripleStore::new();
    let mut schema = SchemaCatalog::default();
    schema
        .load_schema(&mut store, SCHEMA, RdfFormat::Turtle)
        .expect("schema loads");
    (store, schema)
}
