use quick_xml::events::{BytesStart, BytesText, Event as XmlEvent};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use approxsim_schema::builtins::{APPROXSIM_NAMESPACE, ROOT_NAME, XSI_NAMESPACE};
use approxsim_schema::{Declaration, QName, TypeRef, TypeRegistry};

use crate::error::{Diagnostic, DiagnosticList, ImportFailure, Severity};
use crate::factory::{Constructor, ObjectFactory};
use crate::object::{ObjectId, ObjectTree};
use crate::reference::Reference;
use crate::value::{
    parse_boolean, parse_double, parse_duration, parse_timestamp, SimpleValue, ValueError,
};

/// The result of a successful import: the (Root-wrapped) document tree plus
/// every non-fatal finding gathered along the way. Callers decide how many
/// of the findings to surface.
pub struct ImportOutcome {
    pub root: ObjectId,
    pub diagnostics: DiagnosticList,
}

/// Streams an XML document and reconstructs the typed object tree it
/// describes.
///
/// Element types come from an explicit `xsi:type` attribute when present,
/// otherwise from the slot the enclosing element's type declares for the
/// tag. The `identifier` attribute names the node, defaulting to the tag.
/// Simple content is parsed per the declared type; `Point` and `Reference`
/// elements have dedicated handling; everything else accumulates children
/// in a placeholder until its end tag, when the factory finalizes them.
///
/// Recoverable findings (bad values, unknown types, construction failures)
/// are collected with line/column context, skipping the offending subtree;
/// the finding that would exceed [`DiagnosticList::MAX_COLLECTED`] aborts
/// the parse. Well-formedness errors abort immediately.
///
/// Whatever the document's literal root tag, the returned tree is wrapped
/// in a canonical `Root` node unless the document element already is one.
pub fn import_document(
    source: &str,
    registry: &TypeRegistry,
    factory: &ObjectFactory,
    tree: &mut ObjectTree,
) -> Result<ImportOutcome, ImportFailure> {
    Importer {
        source,
        registry,
        factory,
        reader: NsReader::from_str(source),
        tree,
        diagnostics: DiagnosticList::default(),
        stack: Vec::new(),
        chars: None,
        point: None,
        reference: None,
        skip_depth: 0,
        result: None,
    }
    .run()
}

/// Placeholder for a composite node under construction: the children
/// accumulated so far, with the list containers for list-valued slots
/// created up front.
struct Frame {
    tag: String,
    identifier: String,
    type_: TypeRef,
    /// The slot this element fills, with the resolved (possibly
    /// `xsi:type`-specialized) type substituted in; the factory finalizes
    /// against it.
    declaration: Declaration,
    children: Vec<ObjectId>,
}

enum CharTarget {
    /// The content of a simple-typed element.
    Value {
        constructor: Constructor,
        type_: TypeRef,
        identifier: String,
    },
    /// A `lat`/`lon` child of a point element.
    Coordinate,
    /// One identifier component of a reference element.
    ReferenceName,
}

struct CharAccum {
    tag: String,
    target: CharTarget,
    buf: String,
}

struct PointFrame {
    tag: String,
    identifier: String,
    type_: TypeRef,
    lat: Option<f64>,
    lon: Option<f64>,
}

struct RefAccum {
    identifier: String,
    type_: TypeRef,
    depth: u32,
    names: Vec<String>,
}

struct Importer<'a> {
    source: &'a str,
    registry: &'a TypeRegistry,
    factory: &'a ObjectFactory,
    reader: NsReader<&'a [u8]>,
    tree: &'a mut ObjectTree,
    diagnostics: DiagnosticList,
    stack: Vec<Frame>,
    chars: Option<CharAccum>,
    point: Option<PointFrame>,
    reference: Option<RefAccum>,
    /// Number of open elements of a subtree being discarded after a
    /// collected error.
    skip_depth: u32,
    /// The finalized document element, before Root wrapping.
    result: Option<ObjectId>,
}

impl Importer<'_> {
    fn run(mut self) -> Result<ImportOutcome, ImportFailure> {
        loop {
            let event = match self.reader.read_event() {
                Ok(event) => event,
                Err(source) => {
                    let (line, column) = self.position();
                    return Err(ImportFailure::Fatal {
                        line,
                        column,
                        source,
                    });
                }
            };
            match event {
                XmlEvent::Start(start) => {
                    let tag = local_name(&start);
                    self.on_start(&start, &tag)?;
                }
                XmlEvent::Empty(start) => {
                    let tag = local_name(&start);
                    self.on_start(&start, &tag)?;
                    self.on_element_end(&tag)?;
                }
                XmlEvent::End(end) => {
                    let tag = String::from_utf8_lossy(end.local_name().into_inner()).into_owned();
                    self.on_element_end(&tag)?;
                }
                XmlEvent::Text(text) => self.on_text(&text)?,
                XmlEvent::CData(cdata) => {
                    let text = String::from_utf8_lossy(&cdata).into_owned();
                    self.on_characters(&text)?;
                }
                XmlEvent::Eof => break,
                _ => {}
            }
        }
        self.finish()
    }

    // ----- element start --------------------------------------------------

    fn on_start(&mut self, start: &BytesStart, tag: &str) -> Result<(), ImportFailure> {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(());
        }

        // Reference content: nested <scope> elements deepen the reference,
        // anything else contributes an identifier component.
        if let Some(reference) = self.reference.as_mut() {
            if tag == "scope" {
                reference.depth += 1;
            } else {
                self.chars = Some(CharAccum {
                    tag: tag.to_string(),
                    target: CharTarget::ReferenceName,
                    buf: String::new(),
                });
            }
            return Ok(());
        }

        // Point content: exactly the two coordinate children.
        if self.point.is_some() {
            if tag == "lat" || tag == "lon" {
                self.chars = Some(CharAccum {
                    tag: tag.to_string(),
                    target: CharTarget::Coordinate,
                    buf: String::new(),
                });
                return Ok(());
            }
            self.collect(Severity::Error, format!("unexpected <{tag}> in a point"))?;
            self.skip_depth += 1;
            return Ok(());
        }

        if self.chars.is_some() {
            self.collect(
                Severity::Error,
                format!("unexpected <{tag}> inside simple content"),
            )?;
            self.skip_depth += 1;
            return Ok(());
        }

        let (identifier, xsi_type) = self.read_attributes(start, tag)?;

        // (a) explicit xsi:type, else (b) the parent's declaration for the
        // tag. A root element without either is looked up by its tag name.
        let type_ = if let Some(type_name) = xsi_type {
            match self.resolve_type_name(&type_name) {
                Some(type_) => type_,
                None => {
                    self.collect(Severity::Error, format!("unknown type {type_name:?}"))?;
                    self.skip_depth += 1;
                    return Ok(());
                }
            }
        } else if let Some(frame) = self.stack.last() {
            match self.registry.sub_element(frame.type_, tag) {
                Ok(declaration) => declaration.type_,
                Err(e) => {
                    self.collect(Severity::Error, e.to_string())?;
                    self.skip_depth += 1;
                    return Ok(());
                }
            }
        } else {
            match self.resolve_type_name(tag) {
                Some(type_) => type_,
                None => {
                    self.collect(
                        Severity::Error,
                        format!("cannot determine the type of root element <{tag}>"),
                    )?;
                    self.skip_depth += 1;
                    return Ok(());
                }
            }
        };

        let constructor = match self.factory.constructor_for(self.registry, type_) {
            Ok(constructor) => constructor,
            Err(e) => {
                self.collect(Severity::Error, e.to_string())?;
                self.skip_depth += 1;
                return Ok(());
            }
        };

        match constructor {
            Constructor::Double
            | Constructor::String
            | Constructor::Boolean
            | Constructor::Timestamp
            | Constructor::Duration => {
                self.chars = Some(CharAccum {
                    tag: tag.to_string(),
                    target: CharTarget::Value {
                        constructor,
                        type_,
                        identifier,
                    },
                    buf: String::new(),
                });
            }
            Constructor::Point => {
                self.point = Some(PointFrame {
                    tag: tag.to_string(),
                    identifier,
                    type_,
                    lat: None,
                    lon: None,
                });
            }
            Constructor::Reference => {
                self.reference = Some(RefAccum {
                    identifier,
                    type_,
                    depth: 1,
                    names: Vec::new(),
                });
            }
            Constructor::SymbolCode | Constructor::Complex => {
                let declaration = match self.stack.last() {
                    Some(parent) => match self.registry.sub_element(parent.type_, tag) {
                        Ok(slot) if !slot.is_list() => slot.with_type(type_),
                        _ => Declaration::new(tag.to_string(), type_),
                    },
                    None => Declaration::new(tag.to_string(), type_),
                };
                let mut frame = Frame {
                    tag: tag.to_string(),
                    identifier,
                    type_,
                    declaration,
                    children: Vec::new(),
                };
                // Pre-create the container for every list-valued slot, so
                // members can stream straight into it.
                let list_slots: Vec<Declaration> = self
                    .registry
                    .all_declarations(type_)
                    .into_iter()
                    .filter(|d| d.is_list())
                    .cloned()
                    .collect();
                for declaration in list_slots {
                    frame.children.push(self.tree.create_list(declaration));
                }
                self.stack.push(frame);
            }
        }
        Ok(())
    }

    fn read_attributes(
        &mut self,
        start: &BytesStart,
        tag: &str,
    ) -> Result<(String, Option<String>), ImportFailure> {
        let mut identifier = None;
        let mut xsi_type = None;
        for attribute in start.attributes() {
            let attribute = match attribute {
                Ok(attribute) => attribute,
                Err(e) => {
                    let (line, column) = self.position();
                    return Err(ImportFailure::Fatal {
                        line,
                        column,
                        source: quick_xml::Error::InvalidAttr(e),
                    });
                }
            };
            let value = match attribute.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(source) => {
                    let (line, column) = self.position();
                    return Err(ImportFailure::Fatal {
                        line,
                        column,
                        source,
                    });
                }
            };
            let (namespace, local) = self.reader.resolve_attribute(attribute.key);
            match (namespace, local.into_inner()) {
                (ResolveResult::Unbound, b"identifier") => identifier = Some(value),
                (ResolveResult::Bound(ns), b"type")
                    if ns.into_inner() == XSI_NAMESPACE.as_bytes() =>
                {
                    xsi_type = Some(value)
                }
                _ => {}
            }
        }
        let identifier = match identifier {
            Some(identifier) if !identifier.is_empty() => identifier,
            _ => tag.to_string(),
        };
        Ok((identifier, xsi_type))
    }

    /// Looks up a (possibly prefixed) type name in the protocol namespace,
    /// falling back to the empty namespace for registries built without a
    /// target namespace.
    fn resolve_type_name(&self, name: &str) -> Option<TypeRef> {
        let local = name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name);
        let qualified = QName::with_namespace(APPROXSIM_NAMESPACE, local);
        if let Ok(type_) = self.registry.get(&qualified) {
            return Some(type_);
        }
        let unqualified = QName::with_optional_namespace(None::<String>, local);
        self.registry.get(&unqualified).ok()
    }

    // ----- character data -------------------------------------------------

    fn on_text(&mut self, text: &BytesText) -> Result<(), ImportFailure> {
        let text = match text.unescape() {
            Ok(text) => text.into_owned(),
            Err(source) => {
                let (line, column) = self.position();
                return Err(ImportFailure::Fatal {
                    line,
                    column,
                    source,
                });
            }
        };
        self.on_characters(&text)
    }

    fn on_characters(&mut self, text: &str) -> Result<(), ImportFailure> {
        if self.skip_depth > 0 {
            return Ok(());
        }
        if let Some(accum) = self.chars.as_mut() {
            accum.buf.push_str(text);
        } else if !text.trim().is_empty() {
            self.collect(Severity::Warning, "stray character data ignored")?;
        }
        Ok(())
    }

    // ----- element end ----------------------------------------------------

    fn on_element_end(&mut self, tag: &str) -> Result<(), ImportFailure> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(());
        }

        if let Some(accum) = self.chars.take() {
            debug_assert_eq!(accum.tag, tag);
            return self.finish_chars(accum, tag);
        }

        if let Some(reference) = self.reference.as_mut() {
            reference.depth -= 1;
            if reference.depth == 0 {
                let reference = self.reference.take().expect("reference accumulator");
                if reference.names.is_empty() {
                    self.collect(Severity::Error, "reference with no identifier")?;
                } else {
                    let node = self.tree.create_simple(
                        reference.type_,
                        reference.identifier,
                        SimpleValue::Reference(Reference::new(reference.names)),
                    );
                    self.attach(node, tag)?;
                }
            }
            return Ok(());
        }

        if let Some(point) = self.point.as_ref() {
            if point.tag == tag {
                let point = self.point.take().expect("point frame");
                if point.lat.is_none() || point.lon.is_none() {
                    self.collect(
                        Severity::Warning,
                        format!("point {:?} is missing a coordinate", point.identifier),
                    )?;
                }
                let node = self.tree.create_simple(
                    point.type_,
                    point.identifier,
                    SimpleValue::Point {
                        lat: point.lat.unwrap_or(0.0),
                        lon: point.lon.unwrap_or(0.0),
                    },
                );
                self.attach(node, tag)?;
            }
            return Ok(());
        }

        let frame = match self.stack.pop() {
            Some(frame) => frame,
            // Can only be the end of a root element whose start failed.
            None => return Ok(()),
        };
        debug_assert_eq!(frame.tag, tag);

        let mut builder = self
            .factory
            .vector_create(&frame.declaration)
            .identifier(frame.identifier);
        for child in frame.children {
            builder.push(child);
        }
        match builder.finish(self.tree, self.registry) {
            Ok(node) => {
                if self.stack.is_empty() {
                    self.result = Some(node);
                } else {
                    self.attach(node, tag)?;
                }
            }
            Err(e) => {
                self.collect(Severity::Error, e.to_string())?;
            }
        }
        Ok(())
    }

    fn finish_chars(&mut self, accum: CharAccum, tag: &str) -> Result<(), ImportFailure> {
        match accum.target {
            CharTarget::Value {
                constructor,
                type_,
                identifier,
            } => match parse_simple(constructor, &accum.buf) {
                Ok(value) => {
                    let node = self.tree.create_simple(type_, identifier, value);
                    self.attach(node, tag)?;
                }
                Err(e) => {
                    self.collect(Severity::Error, e.to_string())?;
                }
            },
            CharTarget::Coordinate => match parse_double(&accum.buf) {
                Ok(value) => {
                    let point = self.point.as_mut().expect("coordinate outside a point");
                    if tag == "lat" {
                        point.lat = Some(value);
                    } else {
                        point.lon = Some(value);
                    }
                }
                Err(e) => {
                    self.collect(Severity::Error, e.to_string())?;
                }
            },
            CharTarget::ReferenceName => {
                let name = accum.buf.trim().to_string();
                if name.is_empty() {
                    self.collect(Severity::Error, "empty reference component")?;
                } else {
                    self.reference
                        .as_mut()
                        .expect("name outside a reference")
                        .names
                        .push(name);
                }
            }
        }
        Ok(())
    }

    /// Routes a finished node into the enclosing placeholder: straight into
    /// the pre-created container for list-valued slots, otherwise into the
    /// placeholder's child list. A node with no enclosing placeholder is
    /// the document element.
    fn attach(&mut self, node: ObjectId, tag: &str) -> Result<(), ImportFailure> {
        let Some(frame) = self.stack.last_mut() else {
            self.result = Some(node);
            return Ok(());
        };
        let declaration = match self.registry.sub_element(frame.type_, tag) {
            Ok(declaration) => declaration,
            Err(e) => {
                let message = e.to_string();
                self.collect(Severity::Error, message)?;
                return Ok(());
            }
        };
        if declaration.is_list() {
            let container = frame
                .children
                .iter()
                .copied()
                .find(|&c| self.tree.identifier(c) == tag)
                .expect("list containers are created with the placeholder");
            // Members without an identifier attribute all default to the
            // tag name; colliding identifiers are suffix-mutated rather
            // than rejected.
            if let Err(e) = self
                .tree
                .add_with_unique_identifier(self.registry, container, node)
            {
                self.collect(Severity::Error, e.to_string())?;
            }
        } else {
            frame.children.push(node);
        }
        Ok(())
    }

    // ----- bookkeeping ----------------------------------------------------

    fn collect(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
    ) -> Result<(), ImportFailure> {
        if self.diagnostics.is_full() {
            let collected = std::mem::take(&mut self.diagnostics);
            return Err(ImportFailure::TooManyErrors(collected));
        }
        let (line, column) = self.position();
        self.diagnostics.push(Diagnostic {
            severity,
            line,
            column,
            message: message.into(),
        });
        Ok(())
    }

    fn position(&self) -> (u64, u64) {
        let offset = (self.reader.buffer_position() as usize).min(self.source.len());
        let before = &self.source.as_bytes()[..offset];
        let line = before.iter().filter(|&&b| b == b'\n').count() as u64 + 1;
        let column = match before.iter().rposition(|&b| b == b'\n') {
            Some(newline) => (offset - newline) as u64,
            None => offset as u64 + 1,
        };
        (line, column)
    }

    fn finish(mut self) -> Result<ImportOutcome, ImportFailure> {
        let Some(document) = self.result else {
            return Err(ImportFailure::NoRoot(self.diagnostics));
        };

        let root_type = match self.registry.get(&ROOT_NAME) {
            Ok(root_type) => root_type,
            Err(_) => {
                // A registry without the built-ins; leave the document
                // element as the root.
                return Ok(ImportOutcome {
                    root: document,
                    diagnostics: self.diagnostics,
                });
            }
        };
        if self.tree.type_of(document) == root_type {
            return Ok(ImportOutcome {
                root: document,
                diagnostics: self.diagnostics,
            });
        }

        // Whatever the document's literal root element was, the imported
        // tree hangs under a canonical Root.
        let wrapper = self
            .factory
            .default_create(
                self.tree,
                self.registry,
                &Declaration::new("root", root_type),
            )
            .expect("the built-in Root type is constructible");
        let identifiables = self
            .tree
            .child(wrapper, "identifiables")
            .expect("Root declares the identifiables list");
        if let Err(e) = self.tree.add(self.registry, identifiables, document) {
            self.collect(Severity::Error, e.to_string())?;
            return Err(ImportFailure::NoRoot(self.diagnostics));
        }
        Ok(ImportOutcome {
            root: wrapper,
            diagnostics: self.diagnostics,
        })
    }
}

fn local_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.local_name().into_inner()).into_owned()
}

fn parse_simple(constructor: Constructor, text: &str) -> Result<SimpleValue, ValueError> {
    match constructor {
        Constructor::Double => parse_double(text).map(SimpleValue::Double),
        Constructor::String => Ok(SimpleValue::String(text.to_string())),
        Constructor::Boolean => parse_boolean(text).map(SimpleValue::Boolean),
        Constructor::Timestamp => parse_timestamp(text).map(SimpleValue::Timestamp),
        Constructor::Duration => parse_duration(text).map(SimpleValue::Duration),
        _ => unreachable!("structural types do not accumulate characters"),
    }
}
