use std::cell::RefCell;
use std::rc::Rc;

use crate::binding::{
    AttributeBinding, AttributeKind, Binding, ComposedGroup, NodeBinding, TagBinding,
};
use crate::collections::map::HashMap;
use crate::dom::Document;
use crate::error::DomError;
use crate::template::{CompiledTemplate, DependencyKind, TemplateNode, TEXT_CONTENT};
use crate::NodeId;

/// Clone `template` into `container` and build one binding per dependency.
///
/// The bindings start uninitialized; the first patch runs against no previous values.
pub fn instantiate(
    doc: &mut Document,
    template: &CompiledTemplate,
    container: NodeId,
) -> Result<Vec<Binding>, DomError> {
    let mut positions = Vec::with_capacity(template.node_count());
    clone_into(doc, &template.structure, container, &mut positions)?;

    let node_at = |position: usize| {
        positions
            .get(position)
            .copied()
            .ok_or(DomError::Missing { id: position })
    };

    let mut groups: HashMap<(usize, usize), Rc<RefCell<ComposedGroup>>> = HashMap::new();
    let mut bindings = Vec::with_capacity(template.dependencies.len());
    for dependency in &template.dependencies {
        let binding = match &dependency.kind {
            DependencyKind::Node => Binding::Node(NodeBinding::new(
                node_at(dependency.position)?,
                node_at(dependency.position + 1)?,
            )),
            DependencyKind::Tag { closing } => {
                Binding::Tag(TagBinding::new(node_at(dependency.position)?, *closing))
            }
            DependencyKind::Attribute { name, composed } => {
                let target = node_at(dependency.position)?;
                let kind = match composed {
                    Some(composed) => {
                        let key = (
                            dependency.position,
                            Rc::as_ptr(&composed.statics) as *const String as usize,
                        );
                        let group = groups.entry(key).or_insert_with(|| {
                            Rc::new(RefCell::new(ComposedGroup::new(
                                Rc::clone(&composed.statics),
                                name == TEXT_CONTENT,
                            )))
                        });
                        AttributeKind::Composed {
                            group: Rc::clone(group),
                            slot: composed.slot,
                        }
                    }
                    None => classify(name),
                };
                Binding::Attribute(AttributeBinding {
                    target,
                    name: Rc::from(name.as_str()),
                    kind,
                })
            }
        };
        bindings.push(binding);
    }
    Ok(bindings)
}

fn classify(name: &str) -> AttributeKind {
    if let Some(event) = name.strip_prefix('@') {
        AttributeKind::Event {
            event: Rc::from(event),
            handler: Rc::new(RefCell::new(None)),
            attached: false,
        }
    } else if let Some(property) = name.strip_prefix('.') {
        AttributeKind::Property {
            property: Rc::from(property),
        }
    } else if name == "ref" {
        AttributeKind::Ref { current: None }
    } else if name == TEXT_CONTENT {
        AttributeKind::TextContent
    } else {
        AttributeKind::Plain
    }
}

fn clone_into(
    doc: &mut Document,
    nodes: &[TemplateNode],
    parent: NodeId,
    positions: &mut Vec<NodeId>,
) -> Result<(), DomError> {
    for node in nodes {
        let id = match node {
            TemplateNode::Element {
                tag,
                attributes,
                children,
            } => {
                let id = doc.create_element(tag);
                positions.push(id);
                for (name, value) in attributes {
                    doc.set_attribute(id, name, value)?;
                }
                clone_into(doc, children, id, positions)?;
                id
            }
            TemplateNode::Text(text) => {
                let id = doc.create_text(text);
                positions.push(id);
                id
            }
            TemplateNode::Comment(text) => {
                let id = doc.create_comment(text);
                positions.push(id);
                id
            }
        };
        doc.append_child(parent, id)?;
    }
    Ok(())
}
