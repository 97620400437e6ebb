use super::*;
use crate::binding::NodeBinding;
use crate::component::ComponentDef;
use crate::dom::Event;
use crate::value::{Callback, CapturedChildren};
use std::cell::{Cell, RefCell};
use weave_macros::html;

struct Fixture {
    doc: Document,
    cache: TemplateCache,
    container: NodeId,
    region: NodeBinding,
}

impl Fixture {
    fn new() -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        let container = doc.create_element("main");
        doc.append_child(root, container).unwrap();
        let region = NodeBinding::append_to(&mut doc, container).unwrap();
        Self {
            doc,
            cache: TemplateCache::new(),
            container,
            region,
        }
    }

    fn render(&mut self, value: impl Into<Value>) -> Result<(), PatchError> {
        let mut cx = PatchContext::new(&mut self.doc, &mut self.cache);
        self.region.update(&mut cx, &value.into())
    }

    fn render_with(&mut self, host: &dyn ComponentHost, value: impl Into<Value>) -> Result<(), PatchError> {
        let mut cx = PatchContext::new(&mut self.doc, &mut self.cache).with_host(host);
        self.region.update(&mut cx, &value.into())
    }

    fn markup(&self) -> String {
        self.doc.markup(self.container)
    }

    fn find(&self, tag: &str) -> NodeId {
        self.doc
            .find_by_tag(self.container, tag)
            .unwrap_or_else(|| panic!("no <{tag}> in {}", self.markup()))
    }
}

#[derive(Default)]
struct RecordingHost {
    defined: RefCell<Vec<String>>,
    suspended: RefCell<Vec<NodeId>>,
    resolved: RefCell<Vec<(NodeId, NodeId)>>,
}

impl ComponentHost for RecordingHost {
    fn define(&self, def: &ComponentDef) {
        self.defined.borrow_mut().push(def.tag().to_owned());
    }

    fn suspend(&self, _doc: &mut Document, placeholder: NodeId, _lazy: &LazyComponent) {
        self.suspended.borrow_mut().push(placeholder);
    }

    fn resolve(&self, _doc: &mut Document, placeholder: NodeId, replacement: NodeId) {
        self.resolved.borrow_mut().push((placeholder, replacement));
    }

    fn load_error(&self, _placeholder: NodeId, error: &LoadError) -> TemplateDescription {
        html!("<em>{}</em>", error.message())
    }
}

fn greeting(name: &str) -> TemplateDescription {
    html!("<p>Hello {}!</p>", name)
}

fn list(items: &[&str]) -> TemplateDescription {
    let rows: Vec<TemplateDescription> = items.iter().map(|item| html!("<li>{}</li>", *item)).collect();
    html!("<ul>{}</ul>", rows)
}

fn heading(tag: &str, title: &str) -> TemplateDescription {
    html!(
        "<{} class=\"title\" data-title=\"{}\">{}</{}>",
        tag,
        title,
        title,
        tag
    )
}

#[test]
fn text_hole_is_patched_in_place() {
    let mut f = Fixture::new();
    f.render(greeting("Ada")).unwrap();
    assert_eq!(f.markup(), "<p>Hello Ada!</p>");
    let p = f.find("p");
    let children = f.doc.children(p).unwrap().to_vec();

    f.render(greeting("Grace")).unwrap();
    assert_eq!(f.markup(), "<p>Hello Grace!</p>");
    assert_eq!(f.find("p"), p);
    assert_eq!(f.doc.children(p).unwrap(), children.as_slice());
    assert_eq!(f.cache.len(), 1);
}

#[test]
fn list_grows_and_shrinks_by_index() {
    let mut f = Fixture::new();
    f.render(list(&[])).unwrap();
    assert_eq!(f.markup(), "<ul></ul>");
    let ul = f.find("ul");
    assert_eq!(f.doc.children(ul).unwrap().len(), 2);

    f.render(list(&["a", "b", "c"])).unwrap();
    assert_eq!(f.markup(), "<ul><li>a</li><li>b</li><li>c</li></ul>");
    // outer anchors plus anchors and element per item
    assert_eq!(f.doc.children(ul).unwrap().len(), 2 + 3 * 3);
    let first = f.find("li");

    f.render(list(&["a"])).unwrap();
    assert_eq!(f.markup(), "<ul><li>a</li></ul>");
    assert_eq!(f.doc.children(ul).unwrap().len(), 2 + 3);
    assert_eq!(f.find("li"), first);
    assert_eq!(f.find("ul"), ul);
}

#[test]
fn composed_attribute_rerenders_whole_value() {
    let mut f = Fixture::new();
    let badge = |variant: &str| html!("<span class=\"a {}\"></span>", variant);
    f.render(badge("b")).unwrap();
    assert_eq!(f.markup(), "<span class=\"a b\"></span>");
    let span = f.find("span");

    f.render(badge("c")).unwrap();
    assert_eq!(f.markup(), "<span class=\"a c\"></span>");
    assert_eq!(f.find("span"), span);
}

#[test]
fn composed_attribute_with_several_holes() {
    let mut f = Fixture::new();
    let pill = |size: &str, tone: Option<&str>| html!("<i class=\"pill {} {}\"></i>", size, tone);
    f.render(pill("sm", Some("warn"))).unwrap();
    assert_eq!(f.markup(), "<i class=\"pill sm warn\"></i>");
    f.render(pill("lg", None)).unwrap();
    assert_eq!(f.markup(), "<i class=\"pill lg \"></i>");
}

#[test]
fn tag_swap_moves_attributes_and_retargets_bindings() {
    let mut f = Fixture::new();
    f.render(heading("h1", "Intro")).unwrap();
    assert_eq!(
        f.markup(),
        "<h1 class=\"title\" data-title=\"Intro\">Intro</h1>"
    );
    let h1 = f.find("h1");

    f.render(heading("h2", "Intro")).unwrap();
    assert_eq!(
        f.markup(),
        "<h2 class=\"title\" data-title=\"Intro\">Intro</h2>"
    );
    assert!(!f.doc.contains(h1));
    let h2 = f.find("h2");

    f.render(heading("h2", "Next")).unwrap();
    assert_eq!(
        f.markup(),
        "<h2 class=\"title\" data-title=\"Next\">Next</h2>"
    );
    assert_eq!(f.find("h2"), h2);
}

#[test]
fn ref_follows_swapped_element() {
    let mut f = Fixture::new();
    let node_ref = NodeRef::new();
    let view = |tag: &str, node_ref: &NodeRef| html!("<{} ref=\"{}\"></{}>", tag, node_ref.clone(), tag);
    f.render(view("section", &node_ref)).unwrap();
    assert_eq!(node_ref.get(), Some(f.find("section")));

    f.render(view("article", &node_ref)).unwrap();
    assert_eq!(node_ref.get(), Some(f.find("article")));
    assert_eq!(f.markup(), "<article></article>");
}

#[test]
fn repatching_the_same_values_performs_no_mutation() {
    let mut f = Fixture::new();
    let description = list(&["x", "y"]);
    f.render(description.clone()).unwrap();
    let mutations = f.doc.mutation_count();

    f.render(description.clone()).unwrap();
    f.render(description).unwrap();
    assert_eq!(f.doc.mutation_count(), mutations);
}

#[test]
fn patch_returns_early_for_the_same_sequence() {
    let mut doc = Document::new();
    let mut cache = TemplateCache::new();
    let values: Rc<[Value]> = vec![Value::from(1)].into();
    let mut cx = PatchContext::new(&mut doc, &mut cache);
    let mut bindings = Vec::new();
    let result = patch(&mut cx, &mut bindings, &values, Some(&values)).unwrap();
    assert!(Rc::ptr_eq(&result, &values));
}

#[test]
fn patch_rejects_wrong_arity() {
    let mut doc = Document::new();
    let mut cache = TemplateCache::new();
    let values: Rc<[Value]> = vec![Value::from(1), Value::from(2)].into();
    let mut cx = PatchContext::new(&mut doc, &mut cache);
    let err = patch(&mut cx, &mut [], &values, None).unwrap_err();
    assert_eq!(
        err,
        PatchError::ArityMismatch {
            bindings: 0,
            values: 2
        }
    );
}

#[test]
fn equal_template_from_another_call_site_is_patched() {
    let mut f = Fixture::new();
    f.render(html!("<b>{}</b>", 1)).unwrap();
    let b = f.find("b");
    f.render(html!("<b>{}</b>", 2)).unwrap();
    assert_eq!(f.find("b"), b);
    assert_eq!(f.markup(), "<b>2</b>");
}

#[test]
fn different_template_replaces_the_region() {
    let mut f = Fixture::new();
    f.render(greeting("Ada")).unwrap();
    let p = f.find("p");
    f.render(html!("<em>{}</em>", "gone")).unwrap();
    assert_eq!(f.markup(), "<em>gone</em>");
    assert!(!f.doc.contains(p));
}

#[test]
fn nothing_clears_the_region() {
    let mut f = Fixture::new();
    f.render(greeting("Ada")).unwrap();
    f.render(Value::Null).unwrap();
    assert_eq!(f.markup(), "");
    f.render(false).unwrap();
    assert_eq!(f.markup(), "");
    f.render("back").unwrap();
    assert_eq!(f.markup(), "back");
}

#[test]
fn listener_is_attached_once_and_calls_latest_handler() {
    let mut f = Fixture::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    for round in 0..5 {
        let seen = Rc::clone(&seen);
        let handler = Callback::new(move |_| seen.borrow_mut().push(round));
        f.render(html!("<button @click=\"{}\">go</button>", handler)).unwrap();
    }
    let button = f.find("button");
    assert_eq!(f.doc.listener_attachments(), 1);
    assert_eq!(f.markup(), "<button>go</button>");

    assert_eq!(f.doc.dispatch_event(&Event::new("click", button)), 1);
    assert_eq!(*seen.borrow(), vec![4]);
}

#[test]
fn removed_handler_is_not_called() {
    let mut f = Fixture::new();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let handler = Callback::new(move |_| counter.set(counter.get() + 1));
    f.render(html!("<a @click=\"{}\"></a>", Some(handler))).unwrap();
    f.render(html!("<a @click=\"{}\"></a>", None::<Callback>)).unwrap();
    let a = f.find("a");
    f.doc.dispatch_event(&Event::new("click", a));
    assert_eq!(calls.get(), 0);
}

#[test]
fn property_and_boolean_attributes() {
    let mut f = Fixture::new();
    let field = |value: &str, disabled: bool| {
        html!("<input .value=\"{}\" disabled=\"{}\">", value, disabled)
    };
    f.render(field("hi", true)).unwrap();
    let input = f.find("input");
    assert_eq!(f.doc.get_property(input, "value").and_then(Value::as_str), Some("hi"));
    assert_eq!(f.doc.get_attribute(input, "disabled"), Some(""));

    f.render(field("there", false)).unwrap();
    assert_eq!(f.doc.get_property(input, "value").and_then(Value::as_str), Some("there"));
    assert_eq!(f.doc.get_attribute(input, "disabled"), None);
}

#[test]
fn style_object_becomes_inline_style() {
    let mut f = Fixture::new();
    let style = Value::object([("marginTop", 4), ("zIndex", 2)]);
    f.render(html!("<div style=\"{}\"></div>", style)).unwrap();
    assert_eq!(
        f.markup(),
        "<div style=\"margin-top:4px;z-index:2;\"></div>"
    );
}

#[test]
fn raw_text_hole_sets_text_content() {
    let mut f = Fixture::new();
    f.render(html!("<textarea>{}</textarea>", "a < b")).unwrap();
    let textarea = f.find("textarea");
    assert_eq!(f.doc.text_content(textarea), "a < b");
}

#[test]
fn unsupported_node_value_is_an_error() {
    let mut f = Fixture::new();
    let err = f
        .render(html!("<p>{}</p>", Callback::new(|_| {})))
        .unwrap_err();
    assert_eq!(
        err,
        PatchError::UnsupportedValue {
            kind: "callback",
            binding: "node",
        }
    );
}

#[test]
fn captured_children_are_reinserted() {
    let mut f = Fixture::new();
    let text = f.doc.create_text("slot");
    let children = CapturedChildren::new(vec![text]);
    f.render(html!("<div>{}</div>", children.clone())).unwrap();
    assert_eq!(f.markup(), "<div>slot</div>");

    let mutations = f.doc.mutation_count();
    f.render(html!("<div>{}</div>", children)).unwrap();
    assert_eq!(f.doc.mutation_count(), mutations);
}

#[test]
fn component_tag_is_defined_before_insertion() {
    let mut f = Fixture::new();
    let host = RecordingHost::default();
    let card = ComponentDef::new("x-card", |_| Ok(html!("")));
    f.render_with(&host, html!("<{}></{}>", card.clone(), card))
        .unwrap();
    assert_eq!(*host.defined.borrow(), vec!["x-card".to_string()]);
    assert_eq!(f.markup(), "<x-card></x-card>");
}

#[test]
fn pending_lazy_tag_suspends_once_then_swaps() {
    let mut f = Fixture::new();
    let host = RecordingHost::default();
    let lazy = LazyComponent::new(|| async { Ok(ComponentDef::new("x-late", |_| Ok(html!("")))) });
    let view = |lazy: &LazyComponent| html!("<{}></{}>", lazy.clone(), lazy.clone());

    f.render_with(&host, view(&lazy)).unwrap();
    f.render_with(&host, view(&lazy)).unwrap();
    let placeholder = f.find("weave-tag");
    assert_eq!(*host.suspended.borrow(), vec![placeholder]);

    let _ = lazy.start();
    let _ = lazy.settle(Ok(ComponentDef::new("x-late", |_| Ok(html!("")))));
    f.render_with(&host, view(&lazy)).unwrap();
    let late = f.find("x-late");
    assert_eq!(*host.resolved.borrow(), vec![(placeholder, late)]);
    assert_eq!(f.markup(), "<x-late></x-late>");
}

#[test]
fn failed_lazy_tag_renders_the_error_in_place() {
    let mut f = Fixture::new();
    let host = RecordingHost::default();
    let lazy = LazyComponent::new(|| async { Err(LoadError::new("offline")) });
    let _ = lazy.settle(Err(LoadError::new("offline")));
    f.render_with(&host, html!("<{}></{}>", lazy.clone(), lazy))
        .unwrap();
    assert_eq!(f.markup(), "<weave-tag><em>offline</em></weave-tag>");
}
