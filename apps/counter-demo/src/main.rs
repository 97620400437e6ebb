use std::future::Future;
use std::io::{self, BufRead, Write};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::Duration;

use weave_core::{
    Cleanup, ComponentDef, ContextKey, Event, LazyComponent, LoadError, NodeId,
    RenderScope, TemplateDescription,
};
use weave_macros::{component, html};
use weave_runtime_std::StdRuntime;

const STATS_LOAD_DELAY: Duration = Duration::from_millis(300);

thread_local! {
    static THEME: ContextKey<String> = ContextKey::new();
}

fn theme() -> ContextKey<String> {
    THEME.with(|key| *key)
}

#[component("counter-app")]
fn counter_app(cx: &mut RenderScope<'_>) -> TemplateDescription {
    let mode = cx.attribute("theme").unwrap_or_else(|| "light".into());
    cx.provide(&theme(), mode.clone());
    html!(
        "<main class=\"app {}\"><h1>Weave counter</h1><counter-view></counter-view>{}</main>",
        mode,
        cx.children()
    )
}

#[component("counter-view")]
fn counter_view(cx: &mut RenderScope<'_>) -> TemplateDescription {
    let (count, set_count) = cx.use_state(|| 0i64);
    let mode = cx.use_context(&theme()).unwrap_or_default();
    cx.use_effect(count, move || {
        log::info!("count is now {count}");
        Cleanup::none()
    });
    let increment = {
        let set_count = set_count.clone();
        cx.use_callback((), move |_| set_count.update(|count| count + 1))
    };
    let decrement = cx.use_callback((), move |_| set_count.update(|count| count - 1));
    html!(
        "<section class=\"counter {}\"><button id=\"dec\" @click=\"{}\">-</button><output>{}</output><button id=\"inc\" @click=\"{}\">+</button></section>",
        mode,
        decrement,
        count,
        increment
    )
}

/// Completes once a worker thread reports that the stats bundle arrived.
struct BundleLoad {
    shared: Arc<Mutex<(bool, Option<Waker>)>>,
}

impl Future for BundleLoad {
    type Output = Result<ComponentDef, LoadError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if shared.0 {
            return Poll::Ready(Ok(stats_panel()));
        }
        shared.1 = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[component("stats-panel")]
fn stats_panel(cx: &mut RenderScope<'_>) -> TemplateDescription {
    let mode = cx.use_context(&theme()).unwrap_or_default();
    html!("<aside>stats loaded ({} theme)</aside>", mode)
}

fn lazy_stats() -> LazyComponent {
    LazyComponent::new(|| {
        let shared = Arc::new(Mutex::new((false, None::<Waker>)));
        let worker = Arc::clone(&shared);
        thread::spawn(move || {
            thread::sleep(STATS_LOAD_DELAY);
            let waker = {
                let mut state = worker.lock().unwrap_or_else(PoisonError::into_inner);
                state.0 = true;
                state.1.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        });
        BundleLoad { shared }
    })
}

fn main() {
    env_logger::init();

    println!("=== Weave headless counter ===");
    println!("Commands: + / - to click, t to toggle theme, d to dump markup, q to quit");
    println!();

    let std_runtime = StdRuntime::new();
    let rt = std_runtime.runtime();
    for def in [counter_app(), counter_view()] {
        if let Err(err) = rt.define(def) {
            log::error!("{err}");
            return;
        }
    }

    let stats = lazy_stats();
    let shown = stats.clone();
    let slot = ComponentDef::new("stats-slot", move |_| {
        Ok(html!("<{}>loading stats</{}>", shown.clone(), shown.clone()))
    });
    if let Err(err) = rt.define(slot) {
        log::error!("{err}");
        return;
    }

    let app = {
        let mut doc = rt.document_mut();
        let app = doc.create_element("counter-app");
        let slot = doc.create_element("stats-slot");
        let mounted = doc
            .append_child(app, slot)
            .and_then(|()| {
                let root = doc.root();
                doc.append_child(root, app)
            });
        if let Err(err) = mounted {
            log::error!("cannot mount the app: {err}");
            return;
        }
        app
    };
    std_runtime.run_until_idle();
    dump(&rt, app);
    if std_runtime.run_until(STATS_LOAD_DELAY * 4, |rt| rt.pending_tasks() == 0) {
        dump(&rt, app);
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let Some(Ok(line)) = lines.next() else {
            break;
        };
        match line.trim() {
            "+" => click(&rt, "inc"),
            "-" => click(&rt, "dec"),
            "t" => {
                let next = match rt.document().get_attribute(app, "theme") {
                    Some("dark") => "light",
                    _ => "dark",
                };
                if let Err(err) = rt.document_mut().set_attribute(app, "theme", next) {
                    log::error!("{err}");
                }
            }
            "d" => {}
            "q" => break,
            other => {
                println!("unknown command {other:?}");
                continue;
            }
        }
        std_runtime.run_until_idle();
        dump(&rt, app);
    }
}

fn click(rt: &weave_core::Runtime, id: &str) {
    let target = {
        let doc = rt.document();
        doc.find_all_by_tag(doc.root(), "button")
            .into_iter()
            .find(|&button| doc.get_attribute(button, "id") == Some(id))
    };
    match target {
        Some(target) => {
            if let Err(err) = rt.dispatch_event(&Event::new("click", target)) {
                log::error!("{err}");
            }
        }
        None => log::warn!("no button #{id}"),
    }
}

fn dump(rt: &weave_core::Runtime, app: NodeId) {
    println!("{}", rt.document().outer_html(app));
}
