use std::rc::Rc;

use super::parser::{parse, TemplateNode};
use super::scanner::{scan, HoleSite, MARK_CLOSE, MARK_OPEN, NODE_MARKER, TAG_MARKER};
use super::Statics;
use crate::error::TemplateError;

/// Tag given to the placeholder element of a dynamic tag until its first patch.
pub(crate) const PLACEHOLDER_TAG: &str = "weave-tag";
/// Pseudo attribute name for holes inside raw-text element bodies.
pub(crate) const TEXT_CONTENT: &str = "#text";

/// Static parts of an attribute value interpolating several holes,
/// e.g. `class="a {} {}"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedAttribute {
    /// Literal text around the holes; always one longer than the hole count.
    pub statics: Rc<[String]>,
    /// Which hole of the attribute this dependency fills.
    pub slot: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DependencyKind {
    /// Content between two anchor comments at `position` and `position + 1`.
    Node,
    Attribute {
        name: String,
        composed: Option<ComposedAttribute>,
    },
    /// The element at `position` takes its tag from the value.
    Tag { closing: bool },
}

/// Where one hole lands in the structural tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    pub kind: DependencyKind,
    /// Pre-order index of the node in [`CompiledTemplate::structure`].
    pub position: usize,
}

/// Structure plus dependencies, one per hole in value order.
#[derive(Debug, PartialEq, Eq)]
pub struct CompiledTemplate {
    pub structure: Vec<TemplateNode>,
    pub dependencies: Vec<Dependency>,
}

impl CompiledTemplate {
    /// Number of nodes in a pre-order walk of the structure.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[TemplateNode]) -> usize {
            nodes
                .iter()
                .map(|node| match node {
                    TemplateNode::Element { children, .. } => 1 + count(children),
                    _ => 1,
                })
                .sum()
        }
        count(&self.structure)
    }
}

pub fn compile(statics: Statics) -> Result<CompiledTemplate, TemplateError> {
    let scan = scan(statics.fragments())?;
    let forest = parse(&scan.markup);
    let mut walker = Walker {
        sites: &scan.sites,
        placed: vec![None; scan.sites.len()],
        position: 0,
    };
    let structure = walker.walk(forest)?;
    let dependencies = walker
        .placed
        .into_iter()
        .enumerate()
        .map(|(index, dependency)| {
            dependency.ok_or(TemplateError::UnplaceableHole {
                index,
                context: "markup the parser discarded",
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompiledTemplate {
        structure,
        dependencies,
    })
}

struct Walker<'a> {
    sites: &'a [HoleSite],
    placed: Vec<Option<Dependency>>,
    position: usize,
}

impl Walker<'_> {
    fn next_position(&mut self) -> usize {
        let position = self.position;
        self.position += 1;
        position
    }

    fn place(&mut self, index: usize, kind: DependencyKind, position: usize) {
        if let Some(slot) = self.placed.get_mut(index) {
            if slot.is_none() {
                *slot = Some(Dependency { kind, position });
            }
        }
    }

    fn walk(&mut self, nodes: Vec<TemplateNode>) -> Result<Vec<TemplateNode>, TemplateError> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                TemplateNode::Comment(text) => match node_marker(&text) {
                    Some(index) => {
                        let start = self.next_position();
                        self.next_position();
                        out.push(TemplateNode::Comment(String::new()));
                        out.push(TemplateNode::Comment(String::new()));
                        self.place(index, DependencyKind::Node, start);
                    }
                    None => {
                        self.next_position();
                        out.push(TemplateNode::Comment(text));
                    }
                },
                TemplateNode::Text(text) => {
                    self.next_position();
                    out.push(TemplateNode::Text(text));
                }
                TemplateNode::Element {
                    tag,
                    attributes,
                    children,
                } => {
                    let position = self.next_position();
                    let tag = self.element_tag(tag, position);
                    let attributes = self.attributes(attributes, position)?;
                    let children = if crate::dom::is_raw_text(&tag) {
                        self.raw_text(children, position)?
                    } else {
                        children
                    };
                    let children = self.walk(children)?;
                    out.push(TemplateNode::Element {
                        tag,
                        attributes,
                        children,
                    });
                }
            }
        }
        Ok(out)
    }

    fn element_tag(&mut self, tag: String, position: usize) -> String {
        let Some(index) = tag
            .strip_prefix(TAG_MARKER)
            .and_then(|rest| rest.parse::<usize>().ok())
        else {
            return tag;
        };
        self.place(index, DependencyKind::Tag { closing: false }, position);
        let closers: Vec<usize> = self
            .sites
            .iter()
            .enumerate()
            .filter(|(_, site)| **site == HoleSite::CloseTag { opening: index })
            .map(|(closer, _)| closer)
            .collect();
        for closer in closers {
            self.place(closer, DependencyKind::Tag { closing: true }, position);
        }
        PLACEHOLDER_TAG.to_owned()
    }

    fn attributes(
        &mut self,
        attributes: Vec<(String, String)>,
        position: usize,
    ) -> Result<Vec<(String, String)>, TemplateError> {
        let mut kept = Vec::with_capacity(attributes.len());
        for (name, value) in attributes {
            if name.contains(MARK_OPEN) {
                let index = split_markers(&name).1.first().copied().unwrap_or(0);
                return Err(TemplateError::UnplaceableHole {
                    index,
                    context: "an attribute name",
                });
            }
            if value.contains(MARK_OPEN) {
                self.bind_value(&name, &value, position);
            } else {
                kept.push((name, value));
            }
        }
        Ok(kept)
    }

    fn raw_text(
        &mut self,
        children: Vec<TemplateNode>,
        position: usize,
    ) -> Result<Vec<TemplateNode>, TemplateError> {
        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            match child {
                TemplateNode::Text(text) if text.contains(MARK_OPEN) => {
                    self.bind_value(TEXT_CONTENT, &text, position);
                }
                other => kept.push(other),
            }
        }
        Ok(kept)
    }

    fn bind_value(&mut self, name: &str, value: &str, position: usize) {
        let (statics, holes) = split_markers(value);
        if holes.len() == 1 && statics.iter().all(String::is_empty) {
            self.place(
                holes[0],
                DependencyKind::Attribute {
                    name: name.to_owned(),
                    composed: None,
                },
                position,
            );
            return;
        }
        let statics: Rc<[String]> = statics.into();
        for (slot, index) in holes.into_iter().enumerate() {
            self.place(
                index,
                DependencyKind::Attribute {
                    name: name.to_owned(),
                    composed: Some(ComposedAttribute {
                        statics: Rc::clone(&statics),
                        slot,
                    }),
                },
                position,
            );
        }
    }
}

fn node_marker(text: &str) -> Option<usize> {
    text.strip_prefix(NODE_MARKER)?.parse().ok()
}

/// Split a marked value into its literal parts and the hole indices between them.
fn split_markers(value: &str) -> (Vec<String>, Vec<usize>) {
    let mut statics = Vec::new();
    let mut holes = Vec::new();
    let mut rest = value;
    while let Some(open) = rest.find(MARK_OPEN) {
        let after = &rest[open + MARK_OPEN.len_utf8()..];
        let Some(close) = after.find(MARK_CLOSE) else {
            break;
        };
        match after[..close].parse::<usize>() {
            Ok(index) => {
                statics.push(rest[..open].to_owned());
                holes.push(index);
            }
            Err(_) => {
                statics.push(rest[..open].to_owned());
            }
        }
        rest = &after[close + MARK_CLOSE.len_utf8()..];
    }
    statics.push(rest.to_owned());
    (statics, holes)
}
