use std::io;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as XmlEvent};
use quick_xml::Writer;

use approxsim_schema::builtins::{APPROXSIM_NAMESPACE, XSI_NAMESPACE};
use approxsim_schema::TypeRegistry;

use crate::object::{ObjectId, ObjectKind, ObjectTree};
use crate::reference::Reference;
use crate::value::SimpleValue;

/// Writes the XML form of the subtree rooted at `root`, symmetric to what
/// the importer reads: `xsi:type` on every element, `identifier` attributes
/// where they differ from the tag, list slots flattened to repeated
/// elements, and the structural forms for points, references and symbol
/// codes. Text and attribute escaping is quick-xml's.
pub fn write_document<W: io::Write>(
    tree: &ObjectTree,
    registry: &TypeRegistry,
    root: ObjectId,
    writer: W,
) -> io::Result<()> {
    let mut writer = Writer::new_with_indent(writer, b' ', 2);
    emit(
        &mut writer,
        XmlEvent::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    let tag = match tree.identifier(root) {
        "" => "root",
        identifier => identifier,
    };
    write_node(&mut writer, tree, registry, root, tag, true)
}

fn emit<W: io::Write>(writer: &mut Writer<W>, event: XmlEvent) -> io::Result<()> {
    writer
        .write_event(event)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}

fn write_node<W: io::Write>(
    writer: &mut Writer<W>,
    tree: &ObjectTree,
    registry: &TypeRegistry,
    node: ObjectId,
    tag: &str,
    top: bool,
) -> io::Result<()> {
    let mut start = BytesStart::new(tag);
    if top {
        start.push_attribute(("xmlns:sp", APPROXSIM_NAMESPACE));
        start.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
    }
    let type_name = &registry.resolve(tree.type_of(node)).name.local_name;
    start.push_attribute(("xsi:type", format!("sp:{type_name}").as_str()));
    let identifier = tree.identifier(node);
    if identifier != tag {
        start.push_attribute(("identifier", identifier));
    }
    emit(writer, XmlEvent::Start(start))?;

    match tree.node(node).kind() {
        ObjectKind::Simple(value) => match value {
            SimpleValue::Point { lat, lon } => {
                write_text_element(writer, "lat", &lat.to_string())?;
                write_text_element(writer, "lon", &lon.to_string())?;
            }
            SimpleValue::Reference(reference) => write_reference(writer, reference)?,
            SimpleValue::SymbolCode(code) => {
                write_text_element(writer, "value", code.as_str())?;
            }
            other => {
                emit(writer, XmlEvent::Text(BytesText::new(&other.lexical())))?;
            }
        },
        ObjectKind::Complex { children } => {
            for &child in children {
                write_slot(writer, tree, registry, child)?;
            }
        }
        ObjectKind::List { children, .. } => {
            // Only reachable when a bare list is exported directly; slots
            // are flattened by their parent.
            for &child in children {
                write_node(writer, tree, registry, child, tree.identifier(node), false)?;
            }
        }
    }

    emit(writer, XmlEvent::End(BytesEnd::new(tag)))
}

fn write_slot<W: io::Write>(
    writer: &mut Writer<W>,
    tree: &ObjectTree,
    registry: &TypeRegistry,
    child: ObjectId,
) -> io::Result<()> {
    match tree.node(child).kind() {
        // A list slot appears as repeated elements named by the slot tag,
        // not as a wrapper element.
        ObjectKind::List { children, .. } => {
            let slot_tag = tree.identifier(child);
            for &member in children {
                write_node(writer, tree, registry, member, slot_tag, false)?;
            }
            Ok(())
        }
        _ => write_node(writer, tree, registry, child, tree.identifier(child), false),
    }
}

/// `<name>` carries the innermost component; each enclosing scope nests one
/// `<scope>` deeper. The importer accumulates them back in the same order.
fn write_reference<W: io::Write>(writer: &mut Writer<W>, reference: &Reference) -> io::Result<()> {
    let components = reference.components();
    write_text_element(writer, "name", &components[0])?;
    for component in &components[1..] {
        emit(writer, XmlEvent::Start(BytesStart::new("scope")))?;
        write_text_element(writer, "name", component)?;
    }
    for _ in &components[1..] {
        emit(writer, XmlEvent::End(BytesEnd::new("scope")))?;
    }
    Ok(())
}

fn write_text_element<W: io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> io::Result<()> {
    emit(writer, XmlEvent::Start(BytesStart::new(tag)))?;
    emit(writer, XmlEvent::Text(BytesText::new(text)))?;
    emit(writer, XmlEvent::End(BytesEnd::new(tag)))
}
