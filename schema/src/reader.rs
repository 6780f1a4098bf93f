use std::fmt;

use roxmltree::Node;

use crate::builtins::{self, VALUE_TYPE_NAME, XSD_NAMESPACE};
use crate::declaration::{Declaration, MaxOccurs};
use crate::error::SchemaError;
use crate::registry::{ConstructionTypeTable, TypeRegistry};
use crate::type_def::{TypeDefinition, TypeRef};
use crate::xstypes::QName;

/// A non-fatal finding from the schema reader: a construct it does not
/// support, or a redeclaration it ignored. The registry is still usable.
#[derive(Debug)]
pub struct SchemaWarning {
    pub message: String,
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl SchemaWarning {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Reads the subset of XSD the simulation protocol schema uses and builds
/// the type registry from it: top-level `complexType`s (optionally abstract,
/// optionally extending a base) with a `sequence` of typed elements, and
/// top-level `simpleType` restrictions of built-in types.
///
/// Types may refer to each other in any document order; names are reserved
/// in a first pass and the definitions mapped in a second.
pub fn read_schema(
    document: &roxmltree::Document,
) -> Result<(TypeRegistry, Vec<SchemaWarning>), SchemaError> {
    let schema = document.root_element();
    if !is_xsd(schema, "schema") {
        return Err(SchemaError::NotASchema);
    }
    let target_namespace = schema.attribute("targetNamespace");

    let mut table = ConstructionTypeTable::new();
    let mut warnings = Vec::new();
    builtins::register_builtins(&mut table)?;

    // Pass 1: reserve a slot per named top-level type.
    let mut pending: Vec<(TypeRef, Node)> = Vec::new();
    for child in schema.children().filter(|c| c.is_element()) {
        if !is_xsd(child, "complexType") && !is_xsd(child, "simpleType") {
            if !is_xsd(child, "annotation") && !is_xsd(child, "element") {
                warnings.push(SchemaWarning::new(format!(
                    "unsupported top-level construct <{}> ignored",
                    child.tag_name().name()
                )));
            }
            continue;
        }
        let name = child
            .attribute("name")
            .ok_or_else(|| SchemaError::MissingAttribute {
                element: child.tag_name().name().into(),
                attribute: "name".into(),
            })?;
        let qname = QName::with_optional_namespace(target_namespace, name);
        if builtins::is_builtin_name(&qname) {
            warnings.push(SchemaWarning::new(format!(
                "redeclaration of built-in type {qname} ignored"
            )));
            continue;
        }
        let ref_ = table.reserve(qname)?;
        pending.push((ref_, child));
    }

    // Pass 2: map the definitions.
    for (ref_, node) in pending {
        let definition = if is_xsd(node, "complexType") {
            map_complex_type(&table, node, target_namespace, &mut warnings)?
        } else {
            map_simple_type(&table, node, target_namespace, &mut warnings)?
        };
        table.insert(ref_, definition);
    }

    let registry = table.freeze()?;
    Ok((registry, warnings))
}

fn is_xsd(node: Node, tag: &str) -> bool {
    node.tag_name().name() == tag && node.tag_name().namespace() == Some(XSD_NAMESPACE)
}

fn xsd_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| is_xsd(*c, tag))
}

fn resolve_type_attribute(
    table: &ConstructionTypeTable,
    node: Node,
    attribute: &str,
) -> Result<TypeRef, SchemaError> {
    let value = node
        .attribute(attribute)
        .ok_or_else(|| SchemaError::MissingAttribute {
            element: node.tag_name().name().into(),
            attribute: attribute.into(),
        })?;
    let name = QName::parse(value, node)?;
    table.get(&name).ok_or(SchemaError::UnknownType(name))
}

fn map_complex_type(
    table: &ConstructionTypeTable,
    complex_type: Node,
    target_namespace: Option<&str>,
    warnings: &mut Vec<SchemaWarning>,
) -> Result<TypeDefinition, SchemaError> {
    let name = QName::with_optional_namespace(
        target_namespace,
        complex_type.attribute("name").unwrap_or_default(),
    );
    let abstract_ = complex_type.attribute("abstract") == Some("true");

    // <complexContent><extension base="..."> carries both the base type and
    // the content sequence; a bare <sequence> means "derives from the
    // universal value type".
    let (base, content) = if let Some(content) = xsd_child(complex_type, "complexContent") {
        let extension =
            xsd_child(content, "extension").ok_or_else(|| SchemaError::MissingContent {
                element: "complexContent".into(),
                child: "extension".into(),
            })?;
        let base = resolve_type_attribute(table, extension, "base")?;
        (base, extension)
    } else {
        let base = table
            .get(&VALUE_TYPE_NAME)
            .expect("built-in types not registered");
        (base, complex_type)
    };

    // TODO: choice and all groups; the protocol schema only uses sequences
    let mut declarations = Vec::new();
    if let Some(sequence) = xsd_child(content, "sequence") {
        for item in sequence.children().filter(|c| c.is_element()) {
            if !is_xsd(item, "element") {
                warnings.push(SchemaWarning::new(format!(
                    "unsupported content particle <{}> in type {} ignored",
                    item.tag_name().name(),
                    name
                )));
                continue;
            }
            declarations.push(map_element(table, item, &name, warnings)?);
        }
    }

    Ok(TypeDefinition {
        name,
        base: Some(base),
        abstract_,
        declarations,
    })
}

fn map_element(
    table: &ConstructionTypeTable,
    element: Node,
    owner: &QName,
    warnings: &mut Vec<SchemaWarning>,
) -> Result<Declaration, SchemaError> {
    let tag = element
        .attribute("name")
        .ok_or_else(|| SchemaError::MissingAttribute {
            element: "element".into(),
            attribute: "name".into(),
        })?;
    let type_ = resolve_type_attribute(table, element, "type")?;

    let min_occurs = match element.attribute("minOccurs") {
        None => 1,
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| SchemaError::InvalidOccurs(v.into()))?,
    };
    let max_occurs = match element.attribute("maxOccurs") {
        None => MaxOccurs::Count(1),
        Some("unbounded") => MaxOccurs::Unbounded,
        Some(v) => MaxOccurs::Count(
            v.parse::<u64>()
                .map_err(|_| SchemaError::InvalidOccurs(v.into()))?,
        ),
    };
    if let MaxOccurs::Count(max) = max_occurs {
        if max < min_occurs {
            return Err(SchemaError::InvalidOccurs(format!(
                "minOccurs {min_occurs} > maxOccurs {max} on {owner}/{tag}"
            )));
        }
    }

    if element.attribute("nillable").is_some() {
        warnings.push(SchemaWarning::new(format!(
            "nillable on {owner}/{tag} is not supported"
        )));
    }

    Ok(Declaration {
        name: tag.into(),
        type_,
        min_occurs,
        max_occurs,
    })
}

fn map_simple_type(
    table: &ConstructionTypeTable,
    simple_type: Node,
    target_namespace: Option<&str>,
    warnings: &mut Vec<SchemaWarning>,
) -> Result<TypeDefinition, SchemaError> {
    let name = QName::with_optional_namespace(
        target_namespace,
        simple_type.attribute("name").unwrap_or_default(),
    );
    let restriction =
        xsd_child(simple_type, "restriction").ok_or_else(|| SchemaError::MissingContent {
            element: "simpleType".into(),
            child: "restriction".into(),
        })?;
    let base = resolve_type_attribute(table, restriction, "base")?;

    // Constraining facets only narrow the lexical space; the value parsers
    // stay those of the base type.
    if restriction.children().any(|c| c.is_element()) {
        warnings.push(SchemaWarning::new(format!(
            "constraining facets on simple type {name} ignored"
        )));
    }

    Ok(TypeDefinition {
        name,
        base: Some(base),
        abstract_: false,
        declarations: vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{APPROXSIM_NAMESPACE, DOUBLE_NAME};

    const SCHEMA: &str = r#"
        <xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema"
                    xmlns:sp="http://pdc.kth.se/stratmasNamespace"
                    targetNamespace="http://pdc.kth.se/stratmasNamespace">
          <xsd:complexType name="Element" abstract="true">
            <xsd:sequence>
              <xsd:element name="location" type="sp:Point"/>
            </xsd:sequence>
          </xsd:complexType>
          <xsd:complexType name="MilitaryUnit">
            <xsd:complexContent>
              <xsd:extension base="sp:Element">
                <xsd:sequence>
                  <xsd:element name="strength" type="sp:Percentage"/>
                  <xsd:element name="subunits" type="sp:MilitaryUnit"
                               minOccurs="0" maxOccurs="unbounded"/>
                </xsd:sequence>
              </xsd:extension>
            </xsd:complexContent>
          </xsd:complexType>
          <xsd:simpleType name="Percentage">
            <xsd:restriction base="sp:Double"/>
          </xsd:simpleType>
        </xsd:schema>"#;

    fn name(local: &str) -> QName {
        QName::with_namespace(APPROXSIM_NAMESPACE, local)
    }

    #[test]
    fn reads_the_protocol_subset() {
        let doc = roxmltree::Document::parse(SCHEMA).unwrap();
        let (registry, warnings) = read_schema(&doc).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");

        let element = registry.get(&name("Element")).unwrap();
        let unit = registry.get(&name("MilitaryUnit")).unwrap();
        assert!(registry.resolve(element).abstract_);
        assert!(registry.can_substitute(unit, element));

        // Forward reference: Element/location resolves although Point is a
        // built-in and Percentage is declared after its first use.
        let strength = registry.sub_element(unit, "strength").unwrap();
        let percentage = registry.get(&name("Percentage")).unwrap();
        assert_eq!(strength.type_, percentage);
        assert!(!strength.is_list());
        assert!(registry.sub_element(unit, "subunits").unwrap().is_list());
    }

    #[test]
    fn percentage_restricts_double() {
        let doc = roxmltree::Document::parse(SCHEMA).unwrap();
        let (registry, _) = read_schema(&doc).unwrap();
        let percentage = registry.get(&name("Percentage")).unwrap();
        let double = registry.get(&DOUBLE_NAME).unwrap();
        assert!(registry.can_substitute(percentage, double));
    }

    #[test]
    fn rejects_non_schema_documents() {
        let doc = roxmltree::Document::parse("<scenario/>").unwrap();
        assert!(matches!(read_schema(&doc), Err(SchemaError::NotASchema)));
    }

    #[test]
    fn warns_on_builtin_redeclaration() {
        let doc = roxmltree::Document::parse(
            r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema"
                           targetNamespace="http://pdc.kth.se/stratmasNamespace">
                 <xsd:complexType name="Double"/>
               </xsd:schema>"#,
        )
        .unwrap();
        let (registry, warnings) = read_schema(&doc).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(registry.get(&DOUBLE_NAME).is_ok());
    }
}
