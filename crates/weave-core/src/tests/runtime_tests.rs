use super::*;
use crate::context::ContextKey;
use crate::error::RenderError;
use crate::hooks::{Cleanup, Setter};
use crate::scope::RenderScope;
use crate::suspense::LazyStatus;
use crate::value::{Callback, NodeRef};
use std::cell::{Cell, RefCell};
use std::task::Waker;
use weave_macros::{component, html};

/// Future resolved by hand from the test body.
struct Gate<T> {
    value: RefCell<Option<T>>,
    waker: RefCell<Option<Waker>>,
}

impl<T> Gate<T> {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(None),
            waker: RefCell::new(None),
        })
    }

    fn open(&self, value: T) {
        *self.value.borrow_mut() = Some(value);
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }
}

struct GateFuture<T>(Rc<Gate<T>>);

impl<T> Future for GateFuture<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        match self.0.value.borrow_mut().take() {
            Some(value) => Poll::Ready(value),
            None => {
                *self.0.waker.borrow_mut() = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[derive(Default)]
struct RecordingBoundary {
    pending: RefCell<Vec<NodeId>>,
    resolved: RefCell<Vec<(NodeId, NodeId)>>,
}

impl SuspenseBoundary for RecordingBoundary {
    fn register_pending(&self, _doc: &mut Document, node: NodeId) {
        self.pending.borrow_mut().push(node);
    }

    fn resolve_pending(&self, _doc: &mut Document, node: NodeId, replacement: NodeId) {
        self.resolved.borrow_mut().push((node, replacement));
    }
}

fn markup(rt: &Runtime) -> String {
    let doc = rt.document();
    doc.markup(doc.root())
}

fn markup_of(rt: &Runtime, node: NodeId) -> String {
    rt.document().markup(node)
}

fn greeter() -> ComponentDef {
    ComponentDef::new("x-greeter", |cx| {
        let name = cx.attribute("name").unwrap_or_else(|| "world".into());
        Ok(html!("<p>Hello {}</p>", name))
    })
}

#[component("x-badge")]
fn badge(cx: &mut RenderScope<'_>) -> TemplateDescription {
    html!("<i>{}</i>", cx.attribute("label"))
}

#[component("x-broken")]
fn broken(_cx: &mut RenderScope<'_>) -> Result<TemplateDescription, RenderError> {
    Err(RenderError::new("boom"))
}

#[test]
fn connected_element_renders_and_reacts_to_attributes() {
    let rt = Runtime::default();
    rt.define(greeter()).unwrap();
    let host = rt.mount(rt.root(), "x-greeter").unwrap();
    rt.flush();
    assert_eq!(markup(&rt), "<x-greeter><p>Hello world</p></x-greeter>");
    assert_eq!(rt.lifecycle_state(host), Some(LifecycleState::Idle));

    rt.document_mut().set_attribute(host, "name", "Ada").unwrap();
    rt.flush();
    assert_eq!(markup_of(&rt, host), "<p>Hello Ada</p>");
    assert_eq!(rt.render_count(host), Some(2));
    assert!(rt.is_idle());
}

#[test]
fn component_macro_builds_a_definition() {
    let rt = Runtime::default();
    rt.define(badge()).unwrap();
    let host = rt.mount(rt.root(), "x-badge").unwrap();
    rt.document_mut().set_attribute(host, "label", "new").unwrap();
    rt.flush();
    assert_eq!(markup_of(&rt, host), "<i>new</i>");
}

#[test]
fn elements_mounted_before_define_are_upgraded() {
    let rt = Runtime::default();
    let host = rt.mount(rt.root(), "x-greeter").unwrap();
    rt.flush();
    assert_eq!(rt.lifecycle_state(host), None);

    rt.define(greeter()).unwrap();
    rt.flush();
    assert_eq!(markup_of(&rt, host), "<p>Hello world</p>");
    assert_eq!(rt.render_count(host), Some(1));
}

#[test]
fn defining_a_tag_twice_fails() {
    let rt = Runtime::default();
    rt.define(greeter()).unwrap();
    assert_eq!(
        rt.define(greeter()),
        Err(DefineError::AlreadyDefined("x-greeter".into()))
    );
    assert!(rt.is_defined("x-greeter"));
}

#[test]
fn render_error_is_contained_to_its_element() {
    let rt = Runtime::default();
    rt.define(broken()).unwrap();
    rt.define(greeter()).unwrap();
    let failing = rt.mount(rt.root(), "x-broken").unwrap();
    let sibling = rt.mount(rt.root(), "x-greeter").unwrap();
    rt.flush();

    assert_eq!(
        markup_of(&rt, failing),
        "<div class=\"weave-error\" role=\"alert\"><strong>&lt;x-broken&gt;</strong> boom</div>"
    );
    assert_eq!(markup_of(&rt, sibling), "<p>Hello world</p>");
    assert_eq!(rt.lifecycle_state(failing), Some(LifecycleState::Idle));
}

#[test]
fn custom_error_presenter_is_used() {
    let options = RuntimeOptions {
        error_presenter: Rc::new(|info: &ErrorInfo| html!("<b>{}: {}</b>", info.tag.as_str(), info.message.as_str())),
        ..RuntimeOptions::default()
    };
    let rt = Runtime::with_options(Arc::new(DefaultScheduler), options);
    rt.define(broken()).unwrap();
    let host = rt.mount(rt.root(), "x-broken").unwrap();
    rt.flush();
    assert_eq!(markup_of(&rt, host), "<b>x-broken: boom</b>");
}

fn counter(setter: Rc<RefCell<Option<Setter<i32>>>>) -> ComponentDef {
    ComponentDef::new("x-counter", move |cx| {
        let (count, set) = cx.use_state(|| 0);
        *setter.borrow_mut() = Some(set);
        Ok(html!("<span>{}</span>", count))
    })
}

#[test]
fn state_writes_coalesce_into_one_render() {
    let rt = Runtime::default();
    let setter = Rc::new(RefCell::new(None));
    rt.define(counter(Rc::clone(&setter))).unwrap();
    let host = rt.mount(rt.root(), "x-counter").unwrap();
    rt.flush();
    let set = setter.borrow().clone().unwrap();

    set.set(1);
    set.set(2);
    set.update(|count| count + 1);
    rt.flush();
    assert_eq!(markup_of(&rt, host), "<span>3</span>");
    assert_eq!(rt.render_count(host), Some(2));

    set.set(3);
    rt.flush();
    assert_eq!(rt.render_count(host), Some(2));
}

#[test]
fn events_drive_state_through_the_runtime() {
    let rt = Runtime::default();
    rt.define(ComponentDef::new("x-clicker", |cx| {
        let (count, set) = cx.use_state(|| 0u32);
        let click = Callback::new(move |_| set.update(|count| count + 1));
        Ok(html!("<button @click=\"{}\">{}</button>", click, count))
    }))
    .unwrap();
    let host = rt.mount(rt.root(), "x-clicker").unwrap();
    rt.flush();

    let button = rt.document().find_by_tag(host, "button").unwrap();
    for _ in 0..3 {
        assert_eq!(rt.dispatch_event(&Event::new("click", button)).unwrap(), 1);
        rt.flush();
    }
    assert_eq!(markup_of(&rt, host), "<button>3</button>");
    assert_eq!(rt.document().listener_attachments(), 1);
}

#[test]
fn reducer_applies_actions() {
    enum Action {
        Add(i64),
        Reset,
    }
    let rt = Runtime::default();
    let dispatch = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&dispatch);
    rt.define(ComponentDef::new("x-total", move |cx| {
        let (total, dispatch) = cx.use_reducer(
            |total: &i64, action: Action| match action {
                Action::Add(n) => total + n,
                Action::Reset => 0,
            },
            || 10,
        );
        *slot.borrow_mut() = Some(dispatch);
        Ok(html!("{}", total))
    }))
    .unwrap();
    let host = rt.mount(rt.root(), "x-total").unwrap();
    rt.flush();

    let dispatch = dispatch.borrow().clone().unwrap();
    dispatch.dispatch(Action::Add(5));
    rt.flush();
    assert_eq!(markup_of(&rt, host), "15");
    dispatch.dispatch(Action::Reset);
    rt.flush();
    assert_eq!(markup_of(&rt, host), "0");
}

#[test]
fn effects_run_after_commit_with_cleanup_first() {
    let rt = Runtime::default();
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    rt.define(ComponentDef::new("x-effect", move |cx| {
        let dep = cx.attribute("dep").unwrap_or_default();
        sink.borrow_mut().push(format!("render {dep}"));
        let effect_log = Rc::clone(&sink);
        let effect_dep = dep.clone();
        cx.use_effect(dep.clone(), move || {
            effect_log.borrow_mut().push(format!("effect {effect_dep}"));
            let cleanup_log = Rc::clone(&effect_log);
            Cleanup::new(move || cleanup_log.borrow_mut().push(format!("cleanup {effect_dep}")))
        });
        Ok(html!("<i>{}</i>", dep))
    }))
    .unwrap();
    let host = rt.mount(rt.root(), "x-effect").unwrap();
    rt.document_mut().set_attribute(host, "dep", "a").unwrap();
    rt.flush();
    rt.document_mut().set_attribute(host, "dep", "b").unwrap();
    rt.flush();
    rt.document_mut().set_attribute(host, "other", "x").unwrap();
    rt.flush();
    rt.document_mut().remove(host).unwrap();
    rt.flush();

    assert_eq!(
        *log.borrow(),
        vec![
            "render a",
            "effect a",
            "render b",
            "cleanup a",
            "effect b",
            "render b",
            "cleanup b",
        ]
    );
    assert_eq!(rt.lifecycle_state(host), None);
    assert_eq!(rt.instance_count(), 0);
}

#[test]
fn memo_recomputes_only_when_deps_change() {
    let rt = Runtime::default();
    let computed = Rc::new(Cell::new(0));
    let counter = Rc::clone(&computed);
    rt.define(ComponentDef::new("x-memo", move |cx| {
        let size = cx.attribute("size").unwrap_or_default();
        let counter = Rc::clone(&counter);
        let label = cx.use_memo(size.clone(), move || {
            counter.set(counter.get() + 1);
            size.to_uppercase()
        });
        Ok(html!("{}", label))
    }))
    .unwrap();
    let host = rt.mount(rt.root(), "x-memo").unwrap();
    rt.document_mut().set_attribute(host, "size", "lg").unwrap();
    rt.flush();
    rt.document_mut().set_attribute(host, "unrelated", "1").unwrap();
    rt.flush();
    assert_eq!(computed.get(), 1);
    rt.document_mut().set_attribute(host, "size", "sm").unwrap();
    rt.flush();
    assert_eq!(computed.get(), 2);
    assert_eq!(markup_of(&rt, host), "SM");
}

#[test]
fn moving_an_element_keeps_its_instance() {
    let rt = Runtime::default();
    let setter = Rc::new(RefCell::new(None));
    rt.define(counter(Rc::clone(&setter))).unwrap();
    let left = rt.mount(rt.root(), "div").unwrap();
    let right = rt.mount(rt.root(), "div").unwrap();
    let host = rt.mount(left, "x-counter").unwrap();
    rt.flush();
    setter.borrow().clone().unwrap().set(7);
    rt.flush();

    rt.document_mut().append_child(right, host).unwrap();
    rt.flush();
    assert_eq!(rt.lifecycle_state(host), Some(LifecycleState::Idle));
    assert_eq!(markup_of(&rt, right), "<x-counter><span>7</span></x-counter>");
    assert_eq!(rt.render_count(host), Some(2));
}

#[test]
fn detach_and_reattach_in_one_turn_is_a_move() {
    let rt = Runtime::default();
    rt.define(greeter()).unwrap();
    let host = rt.mount(rt.root(), "x-greeter").unwrap();
    rt.flush();
    {
        let mut doc = rt.document_mut();
        doc.detach(host).unwrap();
        let root = doc.root();
        doc.append_child(root, host).unwrap();
    }
    rt.flush();
    assert_eq!(rt.lifecycle_state(host), Some(LifecycleState::Idle));
    assert_eq!(rt.render_count(host), Some(1));
}

#[test]
fn detached_element_is_torn_down() {
    let rt = Runtime::default();
    let setter = Rc::new(RefCell::new(None));
    rt.define(counter(Rc::clone(&setter))).unwrap();
    let host = rt.mount(rt.root(), "x-counter").unwrap();
    rt.flush();
    rt.document_mut().detach(host).unwrap();
    rt.flush();
    assert_eq!(rt.lifecycle_state(host), None);

    // writes after teardown are ignored
    setter.borrow().clone().unwrap().set(5);
    assert_eq!(rt.flush(), 0);
}

#[test]
fn spawned_task_is_dropped_with_its_instance() {
    let rt = Runtime::default();
    rt.define(ComponentDef::new("x-poller", |cx| {
        let started = cx.use_ref(|| false);
        if !started.replace(true) {
            cx.spawn(std::future::pending::<()>());
        }
        Ok(html!(""))
    }))
    .unwrap();
    let host = rt.mount(rt.root(), "x-poller").unwrap();
    rt.flush();
    assert_eq!(rt.pending_tasks(), 1);

    rt.document_mut().remove(host).unwrap();
    rt.flush();
    assert_eq!(rt.pending_tasks(), 0);
}

#[test]
fn captured_children_are_projected() {
    let rt = Runtime::default();
    rt.define(ComponentDef::new("x-card", |cx| {
        Ok(html!("<section>{}</section>", cx.children()))
    }))
    .unwrap();
    let host = {
        let mut doc = rt.document_mut();
        let host = doc.create_element("x-card");
        let bold = doc.create_element("b");
        let text = doc.create_text("hi");
        doc.append_child(bold, text).unwrap();
        doc.append_child(host, bold).unwrap();
        let root = doc.root();
        doc.append_child(root, host).unwrap();
        host
    };
    rt.flush();
    assert_eq!(markup_of(&rt, host), "<section><b>hi</b></section>");

    rt.document_mut().set_attribute(host, "x", "1").unwrap();
    rt.flush();
    assert_eq!(markup_of(&rt, host), "<section><b>hi</b></section>");
}

thread_local! {
    static THEME: ContextKey<String> = ContextKey::new();
}

fn theme_key() -> ContextKey<String> {
    THEME.with(|key| *key)
}

fn theme_components(rt: &Runtime) {
    rt.define(ComponentDef::new("x-theme", |cx| {
        let mode = cx.attribute("mode").unwrap_or_default();
        cx.provide(&theme_key(), mode);
        Ok(html!("{}", cx.children()))
    }))
    .unwrap();
    rt.define(ComponentDef::new("x-label", |cx| {
        let mode = cx.use_context(&theme_key()).unwrap_or_else(|| "none".into());
        Ok(html!("<span>{}</span>", mode))
    }))
    .unwrap();
}

#[test]
fn context_reaches_descendants_and_tracks_changes() {
    let rt = Runtime::default();
    theme_components(&rt);
    let (theme, label) = {
        let mut doc = rt.document_mut();
        let theme = doc.create_element("x-theme");
        doc.set_attribute(theme, "mode", "dark").unwrap();
        let label = doc.create_element("x-label");
        doc.append_child(theme, label).unwrap();
        let root = doc.root();
        doc.append_child(root, theme).unwrap();
        (theme, label)
    };
    rt.flush();
    assert_eq!(markup_of(&rt, label), "<span>dark</span>");
    assert_eq!(rt.subscriber_count(theme), 1);

    rt.document_mut().set_attribute(theme, "mode", "light").unwrap();
    rt.flush();
    assert_eq!(markup_of(&rt, label), "<span>light</span>");

    let root = rt.root();
    rt.document_mut().append_child(root, label).unwrap();
    rt.flush();
    assert_eq!(markup_of(&rt, label), "<span>none</span>");
    assert_eq!(rt.subscriber_count(theme), 0);
}

fn late() -> ComponentDef {
    ComponentDef::new("x-late", |_| Ok(html!("<b>late</b>")))
}

fn shell(lazy: LazyComponent) -> ComponentDef {
    ComponentDef::new("x-shell", move |_| {
        Ok(html!("<{}></{}>", lazy.clone(), lazy.clone()))
    })
}

fn mount_shell(rt: &Runtime, boundary: &Rc<RecordingBoundary>) -> NodeId {
    let host = rt.mount(rt.root(), "x-shell").unwrap();
    rt.set_suspense_boundary(host, Rc::clone(boundary) as Rc<dyn SuspenseBoundary>);
    rt.flush();
    host
}

#[test]
fn lazy_component_swaps_in_when_loaded() {
    let rt = Runtime::default();
    let gate = Gate::new();
    let future_gate = Rc::clone(&gate);
    let lazy = LazyComponent::new(move || GateFuture(future_gate));
    rt.define(shell(lazy.clone())).unwrap();
    let boundary = Rc::new(RecordingBoundary::default());
    let host = mount_shell(&rt, &boundary);

    let placeholder = rt.document().find_by_tag(host, "weave-tag").unwrap();
    assert_eq!(*boundary.pending.borrow(), vec![placeholder]);
    assert!(lazy.is_loading());
    assert_eq!(rt.pending_tasks(), 1);

    gate.open(Ok(late()));
    rt.flush();
    let replacement = rt.document().find_by_tag(host, "x-late").unwrap();
    assert_eq!(markup_of(&rt, host), "<x-late><b>late</b></x-late>");
    assert_eq!(*boundary.resolved.borrow(), vec![(placeholder, replacement)]);
    assert_eq!(rt.pending_tasks(), 0);
}

#[test]
fn failed_lazy_component_shows_the_error() {
    let rt = Runtime::default();
    let gate = Gate::new();
    let future_gate = Rc::clone(&gate);
    let lazy = LazyComponent::new(move || GateFuture(future_gate));
    rt.define(shell(lazy)).unwrap();
    let boundary = Rc::new(RecordingBoundary::default());
    let host = mount_shell(&rt, &boundary);
    let placeholder = rt.document().find_by_tag(host, "weave-tag").unwrap();

    gate.open(Err(LoadError::new("offline")));
    rt.flush();
    assert!(markup_of(&rt, placeholder).contains("component failed to load: offline"));
    assert_eq!(*boundary.resolved.borrow(), vec![(placeholder, placeholder)]);
}

#[test]
fn load_finishing_after_disconnect_is_discarded() {
    let rt = Runtime::default();
    let gate = Gate::new();
    let future_gate = Rc::clone(&gate);
    let lazy = LazyComponent::new(move || GateFuture(future_gate));
    rt.define(shell(lazy.clone())).unwrap();
    let boundary = Rc::new(RecordingBoundary::default());
    let host = mount_shell(&rt, &boundary);

    rt.document_mut().remove(host).unwrap();
    rt.flush();
    gate.open(Ok(late()));
    rt.flush();

    assert!(matches!(lazy.status(), LazyStatus::Ready(_)));
    assert!(boundary.resolved.borrow().is_empty());
    assert_eq!(rt.instance_count(), 0);
    assert!(!rt.is_defined("x-late"));
}

#[test]
fn runaway_updates_stop_at_the_step_limit() {
    let options = RuntimeOptions {
        max_flush_steps: 50,
        ..RuntimeOptions::default()
    };
    let rt = Runtime::with_options(Arc::new(DefaultScheduler), options);
    rt.define(ComponentDef::new("x-runaway", |cx| {
        let (count, set) = cx.use_state(|| 0u64);
        cx.use_effect_always(move || {
            set.set(count + 1);
            Cleanup::none()
        });
        Ok(html!("{}", count))
    }))
    .unwrap();
    rt.mount(rt.root(), "x-runaway").unwrap();
    assert_eq!(rt.flush(), 50);
    assert!(!rt.is_idle());
}

#[test]
fn templates_are_compiled_once_per_call_site() {
    let rt = Runtime::default();
    rt.define(greeter()).unwrap();
    for _ in 0..3 {
        rt.mount(rt.root(), "x-greeter").unwrap();
    }
    rt.flush();
    assert_eq!(rt.template_count(), 1);
    assert_eq!(rt.instance_count(), 3);
}

#[test]
fn microtasks_run_in_order() {
    let rt = Runtime::default();
    let order = Rc::new(RefCell::new(Vec::new()));
    for n in 0..3 {
        let order = Rc::clone(&order);
        rt.queue_microtask(move || order.borrow_mut().push(n));
    }
    assert_eq!(rt.flush(), 3);
    assert_eq!(*order.borrow(), vec![0, 1, 2]);
}

#[test]
fn swapping_component_kinds_moves_authored_children() {
    let rt = Runtime::default();
    let teardowns = Rc::new(Cell::new(0));
    let first = {
        let teardowns = Rc::clone(&teardowns);
        ComponentDef::new("x-first", move |cx| {
            let teardowns = Rc::clone(&teardowns);
            cx.use_effect((), move || Cleanup::new(move || teardowns.set(teardowns.get() + 1)));
            Ok(html!("<i>X:{}</i>", cx.children()))
        })
    };
    let second = ComponentDef::new("y-second", |cx| Ok(html!("<u>Y:{}</u>", cx.children())));
    let setter = Rc::new(RefCell::new(None));
    {
        let setter = Rc::clone(&setter);
        rt.define(ComponentDef::new("x-switch", move |cx| {
            let (swapped, set) = cx.use_state(|| false);
            *setter.borrow_mut() = Some(set);
            let def = if swapped { second.clone() } else { first.clone() };
            Ok(html!("<{}><b>kid</b></{}>", def.clone(), def))
        }))
        .unwrap();
    }
    let host = rt.mount(rt.root(), "x-switch").unwrap();
    rt.flush();
    assert_eq!(markup_of(&rt, host), "<x-first><i>X:<b>kid</b></i></x-first>");
    let old = rt.document().find_by_tag(host, "x-first").unwrap();

    setter.borrow().clone().unwrap().set(true);
    rt.flush();
    assert_eq!(markup_of(&rt, host), "<y-second><u>Y:<b>kid</b></u></y-second>");
    let new = rt.document().find_by_tag(host, "y-second").unwrap();
    assert_eq!(rt.lifecycle_state(old), None);
    assert_eq!(rt.lifecycle_state(new), Some(LifecycleState::Idle));
    assert_eq!(rt.instance_count(), 2);
    assert_eq!(teardowns.get(), 1);

    rt.flush();
    assert_eq!(teardowns.get(), 1);
}

#[test]
fn node_ref_is_cleared_when_its_owner_disconnects() {
    let rt = Runtime::default();
    let exported = Rc::new(RefCell::new(None::<NodeRef>));
    {
        let exported = Rc::clone(&exported);
        rt.define(ComponentDef::new("x-field", move |cx| {
            let input = cx.use_node_ref();
            *exported.borrow_mut() = Some(input.clone());
            Ok(html!("<input ref=\"{}\">", input))
        }))
        .unwrap();
    }
    let host = rt.mount(rt.root(), "x-field").unwrap();
    rt.flush();
    let input = rt.document().find_by_tag(host, "input");
    let node_ref = exported.borrow().clone().unwrap();
    assert!(input.is_some());
    assert_eq!(node_ref.get(), input);

    rt.document_mut().remove(host).unwrap();
    rt.flush();
    assert_eq!(rt.lifecycle_state(host), None);
    assert_eq!(node_ref.get(), None);
}
