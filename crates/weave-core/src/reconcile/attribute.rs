use std::rc::Rc;

use indexmap::IndexMap;

use super::PatchContext;
use crate::binding::{AttributeBinding, AttributeKind};
use crate::dom::{Document, Listener};
use crate::error::PatchError;
use crate::value::Value;
use crate::NodeId;

/// Attributes mirrored to a live property instead of the attribute itself.
const LIVE_PROPERTIES: &[&str] = &["value", "checked", "selected", "indeterminate"];

/// Style properties that take bare numbers.
const UNITLESS: &[&str] = &[
    "opacity",
    "z-index",
    "flex",
    "flex-grow",
    "flex-shrink",
    "font-weight",
    "line-height",
    "order",
    "zoom",
    "orphans",
    "widows",
    "column-count",
    "tab-size",
];

impl AttributeBinding {
    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_composed(&self) -> bool {
        matches!(self.kind, AttributeKind::Composed { .. })
    }

    pub(crate) fn update(&mut self, cx: &mut PatchContext<'_>, value: &Value) -> Result<(), PatchError> {
        let target = self.target;
        match &mut self.kind {
            AttributeKind::Event {
                event,
                handler,
                attached,
            } => {
                let next = match value {
                    Value::Callback(callback) => Some(callback.clone()),
                    nothing if nothing.is_nothing() => None,
                    other => return Err(unsupported(other, "event")),
                };
                *handler.borrow_mut() = next;
                if !*attached {
                    let slot = Rc::clone(handler);
                    cx.doc.add_listener(
                        target,
                        event,
                        Listener::new(move |event| {
                            let current = slot.borrow().clone();
                            if let Some(callback) = current {
                                callback.call(event);
                            }
                        }),
                    )?;
                    *attached = true;
                }
                Ok(())
            }
            AttributeKind::Ref { current } => {
                let next = match value {
                    Value::Ref(node_ref) => Some(node_ref.clone()),
                    nothing if nothing.is_nothing() => None,
                    other => return Err(unsupported(other, "ref")),
                };
                if let Some(previous) = current.take() {
                    let replaced = next.as_ref().map_or(true, |next| !next.ptr_eq(&previous));
                    if replaced && previous.get() == Some(target) {
                        previous.set(None);
                    }
                }
                if let Some(node_ref) = &next {
                    node_ref.set(Some(target));
                    cx.refs.push(node_ref.clone());
                }
                *current = next;
                Ok(())
            }
            AttributeKind::Composed { group, slot } => {
                let part = if value.is_nothing() {
                    String::new()
                } else {
                    value
                        .to_text()
                        .ok_or_else(|| unsupported(value, "composed attribute"))?
                };
                let (rendered, text_content) = {
                    let mut group = group.borrow_mut();
                    if let Some(existing) = group.parts.get_mut(*slot) {
                        *existing = part;
                    }
                    (group.render(), group.text_content)
                };
                if text_content {
                    cx.doc.set_text_content(target, &rendered)?;
                } else {
                    cx.doc.set_attribute(target, &self.name, &rendered)?;
                }
                Ok(())
            }
            AttributeKind::Property { property } => {
                cx.doc.set_property(target, property, value.clone())?;
                Ok(())
            }
            AttributeKind::TextContent => {
                let text = if value.is_nothing() {
                    String::new()
                } else {
                    value
                        .to_text()
                        .ok_or_else(|| unsupported(value, "text content"))?
                };
                cx.doc.set_text_content(target, &text)?;
                Ok(())
            }
            AttributeKind::Plain => apply_plain(cx.doc, target, &self.name, value),
        }
    }
}

fn unsupported(value: &Value, binding: &'static str) -> PatchError {
    PatchError::UnsupportedValue {
        kind: value.kind_name(),
        binding,
    }
}

fn apply_plain(doc: &mut Document, target: NodeId, name: &str, value: &Value) -> Result<(), PatchError> {
    let live = LIVE_PROPERTIES.contains(&name);
    if value.is_nothing() {
        if live {
            doc.remove_property(target, name)?;
        }
        doc.remove_attribute(target, name)?;
        return Ok(());
    }
    match value {
        Value::Object(entries) => {
            let style = style_string(entries)?;
            doc.set_attribute(target, name, &style)?;
        }
        primitive if primitive.is_primitive() => {
            if live {
                doc.set_property(target, name, primitive.clone())?;
            } else if matches!(primitive, Value::Bool(true)) {
                doc.set_attribute(target, name, "")?;
            } else {
                let text = primitive.to_text().unwrap_or_default();
                doc.set_attribute(target, name, &text)?;
            }
        }
        other => return Err(unsupported(other, "attribute")),
    }
    Ok(())
}

/// Expand an inline style object into `kebab-case:value;` pairs.
pub(crate) fn style_string(entries: &IndexMap<String, Value>) -> Result<String, PatchError> {
    let mut out = String::new();
    for (key, value) in entries {
        if value.is_nothing() {
            continue;
        }
        let property = kebab_case(key);
        let text = match value {
            Value::Int(_) | Value::Float(_) if !UNITLESS.contains(&property.as_str()) => {
                format!("{}px", value.to_text().unwrap_or_default())
            }
            other => other
                .to_text()
                .ok_or_else(|| unsupported(other, "style property"))?,
        };
        out.push_str(&property);
        out.push(':');
        out.push_str(&text);
        out.push(';');
    }
    Ok(out)
}

fn kebab_case(key: &str) -> String {
    if key.starts_with("--") {
        return key.to_owned();
    }
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_objects_are_dash_cased_with_units() {
        let Value::Object(entries) = Value::object([
            ("backgroundColor", Value::from("red")),
            ("fontSize", Value::from(12)),
            ("zIndex", Value::from(3)),
            ("display", Value::Null),
        ]) else {
            unreachable!()
        };
        assert_eq!(
            style_string(&entries).unwrap(),
            "background-color:red;font-size:12px;z-index:3;"
        );
    }

    #[test]
    fn custom_properties_keep_their_name() {
        assert_eq!(kebab_case("--mainColor"), "--mainColor");
    }
}
