//! End-to-end tests: schema reading, document import, reference
//! resolution, export round-trips and diagnostic collection.

use approxsim_model::{
    find_unresolved, import_document, write_document, ImportFailure, ObjectFactory, ObjectId,
    ObjectTree, Reference, SimpleValue,
};
use approxsim_schema::builtins::ROOT_NAME;
use approxsim_schema::{read_schema, TypeRegistry};

const SCHEMA: &str = r#"
<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema"
            xmlns:sp="http://pdc.kth.se/stratmasNamespace"
            targetNamespace="http://pdc.kth.se/stratmasNamespace">
  <xsd:complexType name="MilitaryUnit">
    <xsd:sequence>
      <xsd:element name="location" type="sp:Point"/>
      <xsd:element name="strength" type="sp:Double"/>
      <xsd:element name="symbol" type="sp:SymbolIDCode" minOccurs="0"/>
      <xsd:element name="superior" type="sp:Reference" minOccurs="0"/>
      <xsd:element name="subunits" type="sp:MilitaryUnit"
                   minOccurs="0" maxOccurs="unbounded"/>
    </xsd:sequence>
  </xsd:complexType>
  <xsd:complexType name="ArmoredUnit">
    <xsd:complexContent>
      <xsd:extension base="sp:MilitaryUnit">
        <xsd:sequence>
          <xsd:element name="armor" type="sp:Double"/>
        </xsd:sequence>
      </xsd:extension>
    </xsd:complexContent>
  </xsd:complexType>
  <xsd:complexType name="Scenario">
    <xsd:sequence>
      <xsd:element name="startTime" type="sp:Timestamp"/>
      <xsd:element name="timeStep" type="sp:Duration"/>
      <xsd:element name="forces" type="sp:MilitaryUnit"
                   minOccurs="0" maxOccurs="unbounded"/>
      <xsd:element name="readings" type="sp:Double"
                   minOccurs="0" maxOccurs="unbounded"/>
    </xsd:sequence>
  </xsd:complexType>
</xsd:schema>"#;

fn registry() -> TypeRegistry {
    let document = roxmltree::Document::parse(SCHEMA).unwrap();
    let (registry, warnings) = read_schema(&document).unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");
    registry
}

fn import(source: &str) -> Result<(ObjectTree, ObjectId, usize), ImportFailure> {
    let registry = registry();
    let factory = ObjectFactory::new(&registry);
    let mut tree = ObjectTree::new();
    let outcome = import_document(source, &registry, &factory, &mut tree)?;
    Ok((tree, outcome.root, outcome.diagnostics.len()))
}

const MINIMAL: &str = r#"<?xml version="1.0"?>
<scenario xmlns:sp="http://pdc.kth.se/stratmasNamespace"
          xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
          xsi:type="sp:Scenario" identifier="x">
  <startTime>1000</startTime>
  <timeStep>86400</timeStep>
</scenario>"#;

#[test]
fn minimal_document_is_root_wrapped_with_exact_values() {
    let registry = registry();
    let factory = ObjectFactory::new(&registry);
    let mut tree = ObjectTree::new();
    let outcome = import_document(MINIMAL, &registry, &factory, &mut tree).unwrap();
    assert!(outcome.diagnostics.is_empty());

    // The literal root tag was a Scenario; the returned tree is wrapped in
    // the canonical Root regardless.
    let root_type = registry.get(&ROOT_NAME).unwrap();
    assert_eq!(tree.type_of(outcome.root), root_type);
    let identifiables = tree.child(outcome.root, "identifiables").unwrap();
    let members: Vec<_> = tree.children(identifiables).collect();
    assert_eq!(members.len(), 1);
    let scenario = members[0];
    assert_eq!(tree.identifier(scenario), "x");

    let start = tree.child(scenario, "startTime").unwrap();
    assert_eq!(tree.value(start), Some(&SimpleValue::Timestamp(1000)));
    let step = tree.child(scenario, "timeStep").unwrap();
    assert_eq!(tree.value(step), Some(&SimpleValue::Duration(86400.0)));
}

const BATTLE: &str = r#"<?xml version="1.0"?>
<battle xmlns:sp="http://pdc.kth.se/stratmasNamespace"
        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
        xsi:type="sp:Scenario">
  <startTime>1136073600000</startTime>
  <timeStep>3600</timeStep>
  <forces identifier="alpha">
    <location><lat>59.35</lat><lon>18.07</lon></location>
    <strength>0.75</strength>
    <symbol><value>SFGPUCI--------</value></symbol>
  </forces>
  <forces identifier="bravo" xsi:type="sp:ArmoredUnit">
    <location><lat>59.0</lat><lon>17.5</lon></location>
    <strength>0.5</strength>
    <superior><name>alpha</name></superior>
    <subunits identifier="recon">
      <location><lat>58.9</lat><lon>17.4</lon></location>
      <strength>1.0</strength>
    </subunits>
    <armor>0.9</armor>
  </forces>
</battle>"#;

#[test]
fn nested_units_points_symbols_and_references_import() {
    let (tree, root, diagnostics) = import(BATTLE).unwrap();
    assert_eq!(diagnostics, 0);

    let identifiables = tree.child(root, "identifiables").unwrap();
    let battle = tree.child(identifiables, "battle").unwrap();
    let forces = tree.child(battle, "forces").unwrap();
    let members: Vec<_> = tree
        .children(forces)
        .map(|m| tree.identifier(m).to_string())
        .collect();
    assert_eq!(members, vec!["alpha", "bravo"]);

    let alpha = tree.child(forces, "alpha").unwrap();
    assert_eq!(
        tree.value(tree.child(alpha, "location").unwrap()),
        Some(&SimpleValue::Point {
            lat: 59.35,
            lon: 18.07
        })
    );
    match tree.value(tree.child(alpha, "symbol").unwrap()) {
        Some(SimpleValue::SymbolCode(code)) => assert_eq!(code.as_str(), "SFGPUCI--------"),
        other => panic!("expected a symbol code, got {other:?}"),
    }

    let bravo = tree.child(forces, "bravo").unwrap();
    // xsi:type specialized the slot; the extension slot is present.
    assert!(tree.child(bravo, "armor").is_some());
    let recon = tree.child(tree.child(bravo, "subunits").unwrap(), "recon").unwrap();
    assert_eq!(
        tree.value(tree.child(recon, "strength").unwrap()),
        Some(&SimpleValue::Double(1.0))
    );
}

#[test]
fn references_resolve_with_the_committed_descent_policy() {
    let (tree, root, _) = import(BATTLE).unwrap();
    let identifiables = tree.child(root, "identifiables").unwrap();
    let battle = tree.child(identifiables, "battle").unwrap();
    let forces = tree.child(battle, "forces").unwrap();
    let alpha = tree.child(forces, "alpha").unwrap();
    let bravo = tree.child(forces, "bravo").unwrap();

    // The imported superior reference resolves to the sibling unit.
    match tree.value(tree.child(bravo, "superior").unwrap()) {
        Some(SimpleValue::Reference(reference)) => {
            assert_eq!(reference.resolve(&tree, bravo), Some(alpha));
        }
        other => panic!("expected a reference, got {other:?}"),
    }

    // A name that exists nowhere on the ancestor chain resolves to nothing.
    assert_eq!(
        Reference::to_identifier("ghost").resolve(&tree, bravo),
        None
    );

    // Committed descent: "alpha" anchors at the forces list, but alpha has
    // no "recon" child, and resolution does not retry other ancestors.
    let inward = Reference::new(vec!["recon".into(), "alpha".into()]);
    assert_eq!(inward.resolve(&tree, bravo), None);
    // The same inner name under the right scope resolves.
    let inward = Reference::new(vec!["recon".into(), "subunits".into(), "bravo".into()]);
    let recon = tree.child(tree.child(bravo, "subunits").unwrap(), "recon").unwrap();
    assert_eq!(inward.resolve(&tree, bravo), Some(recon));
}

#[test]
fn unresolved_references_are_swept_out() {
    let source = BATTLE.replace("<name>alpha</name>", "<name>charlie</name>");
    let (tree, root, _) = import(&source).unwrap();
    let unresolved = find_unresolved(&tree, root);
    assert_eq!(unresolved.len(), 1);
    assert_eq!(tree.identifier(unresolved[0]), "superior");
}

fn scenario_with_bad_readings(bad: usize, good: usize) -> String {
    let mut body = String::from(
        r#"<?xml version="1.0"?>
<scenario xmlns:sp="http://pdc.kth.se/stratmasNamespace"
          xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
          xsi:type="sp:Scenario" identifier="x">
  <startTime>0</startTime>
  <timeStep>1</timeStep>
"#,
    );
    for i in 0..bad {
        body.push_str(&format!("  <readings>bad-{i}</readings>\n"));
    }
    for i in 0..good {
        body.push_str(&format!("  <readings>{i}.5</readings>\n"));
    }
    body.push_str("</scenario>");
    body
}

#[test]
fn a_few_errors_are_collected_and_the_tree_still_builds() {
    let registry = registry();
    let factory = ObjectFactory::new(&registry);
    let mut tree = ObjectTree::new();
    let source = scenario_with_bad_readings(5, 2);
    let outcome = import_document(&source, &registry, &factory, &mut tree).unwrap();

    assert_eq!(outcome.diagnostics.len(), 5);
    for diagnostic in outcome.diagnostics.iter() {
        assert!(diagnostic.line > 0);
        assert!(diagnostic.column > 0);
    }

    let identifiables = tree.child(outcome.root, "identifiables").unwrap();
    let scenario = tree.child(identifiables, "x").unwrap();
    let readings = tree.child(scenario, "readings").unwrap();
    assert_eq!(tree.children(readings).count(), 2);
}

#[test]
fn the_hundredth_error_aborts_with_ninety_nine_collected() {
    let source = scenario_with_bad_readings(150, 0);
    match import(&source) {
        Err(ImportFailure::TooManyErrors(collected)) => {
            assert_eq!(collected.len(), 99);
        }
        Ok(_) => panic!("expected the error cap to trip"),
        Err(other) => panic!("expected the error cap to trip, got {other}"),
    }
}

#[test]
fn malformed_xml_is_fatal() {
    let source = "<scenario><startTime>1</wrong></scenario>";
    assert!(matches!(import(source), Err(ImportFailure::Fatal { .. })));
}

fn assert_same_subtree(a_tree: &ObjectTree, a: ObjectId, b_tree: &ObjectTree, b: ObjectId) {
    assert_eq!(a_tree.identifier(a), b_tree.identifier(b));
    assert_eq!(a_tree.type_of(a), b_tree.type_of(b));
    assert_eq!(a_tree.value(a), b_tree.value(b));
    let a_children: Vec<_> = a_tree.children(a).collect();
    let b_children: Vec<_> = b_tree.children(b).collect();
    assert_eq!(
        a_children.len(),
        b_children.len(),
        "child count differs under {:?}",
        a_tree.identifier(a)
    );
    for (&ac, &bc) in a_children.iter().zip(&b_children) {
        assert_same_subtree(a_tree, ac, b_tree, bc);
    }
}

#[test]
fn export_round_trips_through_import() {
    let registry = registry();
    let factory = ObjectFactory::new(&registry);
    let mut tree = ObjectTree::new();
    let outcome = import_document(BATTLE, &registry, &factory, &mut tree).unwrap();

    let mut buffer = Vec::new();
    write_document(&tree, &registry, outcome.root, &mut buffer).unwrap();
    let exported = String::from_utf8(buffer).unwrap();

    let mut reimported = ObjectTree::new();
    let second = import_document(&exported, &registry, &factory, &mut reimported)
        .unwrap_or_else(|e| panic!("re-import failed: {e}\n{exported}"));
    assert!(second.diagnostics.is_empty(), "{}", second.diagnostics);
    assert_same_subtree(&tree, outcome.root, &reimported, second.root);
}
