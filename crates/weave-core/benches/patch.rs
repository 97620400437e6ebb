use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use weave_core::{compile, Document, NodeBinding, PatchContext, Statics, TemplateCache, TemplateDescription, Value};
use weave_macros::html;

const ROW_SAMPLES: &[usize] = &[8, 32, 128, 512];

fn row(index: usize, selected: bool) -> TemplateDescription {
    html!(
        "<li class=\"row {}\" data-index=\"{}\"><span>Item {}</span><em>{}</em></li>",
        if selected { "selected" } else { "" },
        index,
        index,
        format!("detail {index}")
    )
}

fn table(rows: usize, selected: usize) -> TemplateDescription {
    let items: Vec<TemplateDescription> = (0..rows).map(|i| row(i, i == selected)).collect();
    html!("<section><h1>{}</h1><ul>{}</ul></section>", rows, items)
}

struct PatchFixture {
    doc: Document,
    cache: TemplateCache,
    region: NodeBinding,
}

impl PatchFixture {
    fn new() -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        let region = NodeBinding::append_to(&mut doc, root).expect("region");
        Self {
            doc,
            cache: TemplateCache::new(),
            region,
        }
    }

    fn render(&mut self, description: TemplateDescription) {
        let mut cx = PatchContext::new(&mut self.doc, &mut self.cache);
        self.region
            .update(&mut cx, &Value::Template(description))
            .expect("patch");
    }
}

fn bench_compile(c: &mut Criterion) {
    let statics = table(0, 0).statics();
    c.bench_function("compile_table", |b| {
        b.iter(|| black_box(compile(black_box(statics)).expect("compile")));
    });
    let row_statics: Statics = row(0, false).statics();
    c.bench_function("compile_row", |b| {
        b.iter(|| black_box(compile(black_box(row_statics)).expect("compile")));
    });
}

fn bench_steady_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch_selection");
    for &rows in ROW_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, &rows| {
            let mut fixture = PatchFixture::new();
            fixture.render(table(rows, 0));
            let mut selected = 0;
            b.iter(|| {
                selected = (selected + 1) % rows;
                fixture.render(table(rows, selected));
            });
        });
    }
    group.finish();
}

fn bench_list_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch_list_churn");
    for &rows in ROW_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, &rows| {
            let mut fixture = PatchFixture::new();
            b.iter(|| {
                fixture.render(table(rows, 0));
                fixture.render(table(rows / 2, 0));
            });
            black_box(fixture.doc.mutation_count());
        });
    }
    group.finish();
}

fn bench_idempotent_patch(c: &mut Criterion) {
    let mut fixture = PatchFixture::new();
    let description = table(128, 3);
    fixture.render(description.clone());
    c.bench_function("patch_same_values", |b| {
        b.iter(|| fixture.render(description.clone()));
    });
}

criterion_group!(
    patch,
    bench_compile,
    bench_steady_patch,
    bench_list_churn,
    bench_idempotent_patch
);
criterion_main!(patch);
