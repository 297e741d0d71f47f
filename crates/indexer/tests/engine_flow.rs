use context_indexer::{
    canonical_path, ChangeKind, CodeChange, ContextEngine, ContextService, EngineConfig,
    PROJECT_CONFIG_FILE,
};
use context_search::CodeQuery;
use context_syntax::{Language, ParseDispatcher, ParseOutcome, RegexParser, SourceParser};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn engine() -> ContextEngine {
    ContextEngine::new(EngineConfig::default())
}

fn project(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().expect("tempdir");
    for (path, content) in files {
        let full = temp.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(full, content).expect("write file");
    }
    temp
}

fn cycle_project() -> TempDir {
    project(&[
        ("pom.xml", "<project/>"),
        ("src/A.java", "class A extends B {}\n"),
        ("src/B.java", "class B extends A {}\n"),
    ])
}

#[tokio::test]
async fn analyze_project_is_idempotent() {
    let temp = project(&[
        ("Cargo.toml", "[package]\nname = \"demo\"\n"),
        ("src/lib.rs", "pub struct Widget;\n"),
    ]);
    let engine = engine();

    let first = engine.analyze_project(temp.path()).await;
    let second = engine.analyze_project(temp.path()).await;
    assert!(Arc::ptr_eq(&first, &second));

    assert!(!first.degraded);
    assert_eq!(first.metrics.files_scanned, 1);
    assert_eq!(first.metrics.files_parsed, 1);
    assert_eq!(first.structure.languages.get("rust"), Some(&1));
    assert_eq!(engine.metrics().analysis_count, 1);
    assert_eq!(engine.metrics().project_count, 1);
}

#[tokio::test]
async fn concurrent_first_calls_converge() {
    let temp = cycle_project();
    let engine = engine();

    let (a, b) = tokio::join!(
        engine.analyze_project(temp.path()),
        engine.analyze_project(temp.path())
    );
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &engine.analyze_project(temp.path()).await));
}

#[tokio::test]
async fn mutual_inheritance_is_one_cycle() {
    let temp = cycle_project();
    let engine = engine();

    let graph = engine.dependency_graph(temp.path()).await;
    let cycles = graph.detect_circular_dependencies();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), 2);

    let project = engine.analyze_project(temp.path()).await;
    assert!(project.is_graph_built());
    assert!(Arc::ptr_eq(&graph, &project.graph()));
}

#[tokio::test]
async fn changes_evict_and_reanalysis_sees_new_content() {
    let temp = cycle_project();
    let engine = engine();
    let before = engine.analyze_project(temp.path()).await;
    assert_eq!(before.graph().detect_circular_dependencies().len(), 1);

    let b = temp.path().join("src/B.java");
    std::fs::write(&b, "class B {}\n").expect("rewrite B");
    let report = engine.apply_changes(vec![CodeChange::modified(&b)]).await;

    assert_eq!(report.applied, 1);
    assert_eq!(report.reparsed, 1);
    assert_eq!(report.evicted_projects, vec![canonical_path(temp.path())]);
    assert!(engine.cached_project(temp.path()).is_none());

    let after = engine.analyze_project(temp.path()).await;
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(after.graph().detect_circular_dependencies().is_empty());
}

#[tokio::test]
async fn supplied_content_is_parsed_instead_of_disk() {
    let temp = project(&[
        ("package.json", "{}"),
        ("src/widget.ts", "export class Gadget {}\n"),
    ]);
    let engine = engine();
    engine.analyze_project(temp.path()).await;

    let file = temp.path().join("src/widget.ts");
    let change = CodeChange::modified(&file)
        .with_old_content("export class Gadget {}\n")
        .with_content("export class Widget {}\n");
    engine.apply_changes(vec![change]).await;

    let hits = engine.find_related_code(&CodeQuery::from("widget"));
    assert!(hits.iter().any(|hit| hit.symbol.as_deref() == Some("Widget")));
    assert!(engine
        .find_related_code(&CodeQuery::from("Gadget"))
        .is_empty());
}

/// Java parser that takes its time, so changes can land mid-analysis
struct SlowJava;

impl SourceParser for SlowJava {
    fn name(&self) -> &'static str {
        "slow-java"
    }

    fn supports(&self, language: Language) -> bool {
        language == Language::Java
    }

    fn parse(&self, source: &str, language: Language, path: &str) -> ParseOutcome {
        std::thread::sleep(Duration::from_millis(400));
        RegexParser::new().parse(source, language, path)
    }
}

#[tokio::test]
async fn deletion_during_analysis_is_not_undone() {
    let temp = project(&[
        ("pom.xml", "<project/>"),
        ("A.java", "class A {}\n"),
        ("Gone.java", "class Gone {}\n"),
    ]);
    let engine = ContextEngine::with_dispatcher(
        EngineConfig::default(),
        ParseDispatcher::new().with_parser(Arc::new(SlowJava)),
    );
    let gone = temp.path().join("Gone.java");

    let delete = async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        std::fs::remove_file(&gone).expect("delete");
        engine.apply_changes(vec![CodeChange::deleted(&gone)]).await
    };
    let (in_flight, report) = tokio::join!(engine.analyze_project(temp.path()), delete);
    assert_eq!(report.applied, 1);

    // the run that overlapped the delete is not kept
    let context = engine.analyze_project(temp.path()).await;
    assert!(!Arc::ptr_eq(&context, &in_flight));
    assert_eq!(context.metrics.files_scanned, 1);
    assert!(context.graph().find_by_name("Gone").is_empty());
    assert_eq!(context.graph().find_by_name("A").len(), 1);

    assert!(engine.cache().get(&canonical_path(&gone)).is_none());
    assert!(engine
        .find_related_code(&CodeQuery::from("Gone"))
        .is_empty());
}

#[tokio::test]
async fn deleted_files_leave_search() {
    let temp = project(&[
        ("pyproject.toml", "[project]\n"),
        ("app/models.py", "class Invoice:\n    pass\n"),
    ]);
    let engine = engine();
    engine.analyze_project(temp.path()).await;
    assert!(!engine
        .find_related_code(&CodeQuery::from("invoice"))
        .is_empty());

    let file = temp.path().join("app/models.py");
    std::fs::remove_file(&file).expect("delete");
    let report = engine.apply_changes(vec![CodeChange::deleted(&file)]).await;

    assert_eq!(report.removed, 1);
    assert_eq!(report.evicted_projects.len(), 1);
    assert!(engine
        .find_related_code(&CodeQuery::from("invoice"))
        .is_empty());
    assert_eq!(engine.metrics().cache_size, 0);
}

#[tokio::test]
async fn broken_and_unsupported_files_degrade_gracefully() {
    let temp = project(&[
        ("Cargo.toml", "[package]\n"),
        ("src/good.rs", "pub struct Sturdy;\n"),
        ("src/broken.rs", "fn main() { let x = ; }}}\n"),
        ("src/main.go", "package main\n"),
    ]);
    let engine = engine();
    let context = engine.analyze_project(temp.path()).await;

    assert!(!context.degraded);
    assert_eq!(context.metrics.files_scanned, 2);
    assert_eq!(context.metrics.files_parsed, 1);
    assert_eq!(context.metrics.parse_failures, 1);
    assert_eq!(engine.cache().len(), 1);

    // a change to an unsupported file is ignored but still evicts
    let go = temp.path().join("src/main.go");
    let report = engine
        .apply_changes(vec![CodeChange::new(&go, ChangeKind::Modified).with_content("package x")])
        .await;
    assert_eq!(report.reparsed, 0);
    assert_eq!(report.failed, 0);
    assert!(engine
        .find_related_code(&CodeQuery::from("package"))
        .is_empty());
}

#[tokio::test]
async fn failed_reparse_removes_entry() {
    let temp = project(&[("Cargo.toml", "[package]\n"), ("src/lib.rs", "pub struct Old;\n")]);
    let engine = engine();
    engine.analyze_project(temp.path()).await;

    let file = temp.path().join("src/lib.rs");
    let report = engine
        .apply_changes(vec![CodeChange::modified(&file).with_content("fn main() { let x = ; }}}")])
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.removed, 1);
    assert!(engine.cache().get(&canonical_path(&file)).is_none());
    assert_eq!(engine.metrics().parse_failures, 1);
}

#[tokio::test]
async fn project_config_file_is_honoured() {
    let temp = project(&[
        ("Cargo.toml", "[package]\n"),
        (PROJECT_CONFIG_FILE, "exclude_globs = [\"generated/**\"]\n"),
        ("src/lib.rs", "pub struct Kept;\n"),
        ("generated/api.rs", "pub struct Skipped;\n"),
    ]);
    let context = engine().analyze_project(temp.path()).await;
    assert_eq!(context.structure.files.len(), 1);
    assert!(context.structure.files[0].ends_with("src/lib.rs"));
}

#[tokio::test]
async fn invalid_project_config_degrades_without_caching() {
    let temp = project(&[
        (PROJECT_CONFIG_FILE, "max_results = 0\n"),
        ("src/lib.rs", "pub struct Kept;\n"),
    ]);
    let engine = engine();

    let context = engine.analyze_project(temp.path()).await;
    assert!(context.degraded);
    assert!(context.graph().is_empty());
    assert!(engine.cached_project(temp.path()).is_none());
}

#[tokio::test]
async fn invalidate_project_forces_rebuild() {
    let temp = cycle_project();
    let engine = engine();
    let first = engine.analyze_project(temp.path()).await;

    assert!(engine.invalidate_project(temp.path()));
    assert!(!engine.invalidate_project(temp.path()));
    let second = engine.analyze_project(temp.path()).await;
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(engine.metrics().analysis_count, 2);
}

#[tokio::test]
async fn search_results_are_bounded() {
    let mut files = vec![("Cargo.toml".to_string(), "[package]\n".to_string())];
    for i in 0..30 {
        files.push((
            format!("src/widget_{i}.rs"),
            format!("pub struct Widget{i} {{ size: u32 }}\n"),
        ));
    }
    let borrowed: Vec<(&str, &str)> = files
        .iter()
        .map(|(p, c)| (p.as_str(), c.as_str()))
        .collect();
    let temp = project(&borrowed);
    let engine = engine();
    engine.analyze_project(temp.path()).await;

    let hits = engine.find_related_code(&CodeQuery::from("widget size"));
    assert_eq!(hits.len(), 20);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(hits.iter().all(|hit| hit.score > 0.0));
}
