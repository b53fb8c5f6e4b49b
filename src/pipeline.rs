//! The named pipelines, as task graphs.
//!
//! ```text
//! clean   clean
//! lint    lint
//! build   series(clean, parallel(series(parallel(html, css, js), useref), image, font, extra))
//! serve   series(parallel(html, css, js), dev-server)
//! start   series(<build>, dist-server)
//! deploy  series(<build>, publish)
//! ```
//!
//! `clean` finishes before any writer starts. Bundling waits for the three
//! intermediate transformers; images, fonts and public files are written
//! straight to the output alongside it.

use crate::bundle::Bundler;
use crate::clean::Cleaner;
use crate::config::BuildConfig;
use crate::lint::Linter;
use crate::passthrough::Passthrough;
use crate::publish::Publisher;
use crate::serve::{DevServer, DistServer};
use crate::task::TaskNode;
use crate::transform::AssetTask;
use crate::types::AssetRole;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineName {
    Clean,
    Lint,
    Build,
    Serve,
    Start,
    Deploy,
}

impl PipelineName {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineName::Clean => "clean",
            PipelineName::Lint => "lint",
            PipelineName::Build => "build",
            PipelineName::Serve => "serve",
            PipelineName::Start => "start",
            PipelineName::Deploy => "deploy",
        }
    }
}

fn asset(config: &Arc<BuildConfig>, role: AssetRole) -> TaskNode {
    TaskNode::leaf(AssetTask::for_role(config.clone(), role))
}

/// The markup, style and script transformers, concurrently.
fn intermediate(config: &Arc<BuildConfig>) -> TaskNode {
    TaskNode::Parallel(vec![
        asset(config, AssetRole::Markup),
        asset(config, AssetRole::Style),
        asset(config, AssetRole::Script),
    ])
}

pub fn clean(config: &Arc<BuildConfig>) -> TaskNode {
    TaskNode::leaf(Cleaner::new(config.clone()))
}

pub fn lint(config: &Arc<BuildConfig>) -> TaskNode {
    TaskNode::leaf(Linter::new(config.clone()))
}

pub fn build(config: &Arc<BuildConfig>) -> TaskNode {
    TaskNode::Sequence(vec![
        clean(config),
        TaskNode::Parallel(vec![
            TaskNode::Sequence(vec![
                intermediate(config),
                TaskNode::leaf(Bundler::new(config.clone())),
            ]),
            asset(config, AssetRole::Image),
            asset(config, AssetRole::Font),
            TaskNode::leaf(Passthrough::new(config.clone())),
        ]),
    ])
}

pub fn serve(config: &Arc<BuildConfig>, shutdown: Arc<AtomicBool>) -> TaskNode {
    TaskNode::Sequence(vec![
        intermediate(config),
        TaskNode::leaf(DevServer::new(config.clone(), shutdown)),
    ])
}

pub fn start(config: &Arc<BuildConfig>, shutdown: Arc<AtomicBool>) -> TaskNode {
    TaskNode::Sequence(vec![
        build(config),
        TaskNode::leaf(DistServer::new(config.clone(), shutdown)),
    ])
}

pub fn deploy(config: &Arc<BuildConfig>) -> TaskNode {
    TaskNode::Sequence(vec![build(config), TaskNode::leaf(Publisher::new(config.clone()))])
}

/// The graph for a named pipeline.
pub fn for_name(name: PipelineName, config: &Arc<BuildConfig>, shutdown: Arc<AtomicBool>) -> TaskNode {
    match name {
        PipelineName::Clean => clean(config),
        PipelineName::Lint => lint(config),
        PipelineName::Build => build(config),
        PipelineName::Serve => serve(config, shutdown),
        PipelineName::Start => start(config, shutdown),
        PipelineName::Deploy => deploy(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Executor, TaskEvent};
    use crate::test_helpers::{assert_file_contains, config_for, event_index, read, setup_fixtures, write};
    use std::sync::mpsc;
    use tempfile::TempDir;

    const BUILD_SHAPE: &str =
        "series(clean, parallel(series(parallel(html, css, js), useref), image, font, extra))";

    fn shutdown() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    fn run_with_events(node: &TaskNode) -> (Result<(), crate::task::PipelineError>, Vec<TaskEvent>) {
        let (tx, rx) = mpsc::channel();
        let result = Executor::with_events(tx).run(node);
        (result, rx.try_iter().collect())
    }

    #[test]
    fn pipeline_shapes() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        assert_eq!(clean(&config).to_string(), "clean");
        assert_eq!(lint(&config).to_string(), "lint");
        assert_eq!(build(&config).to_string(), BUILD_SHAPE);
        assert_eq!(
            serve(&config, shutdown()).to_string(),
            "series(parallel(html, css, js), dev-server)"
        );
        assert_eq!(
            start(&config, shutdown()).to_string(),
            format!("series({BUILD_SHAPE}, dist-server)")
        );
        assert_eq!(
            deploy(&config).to_string(),
            format!("series({BUILD_SHAPE}, publish)")
        );
    }

    #[test]
    fn for_name_picks_the_graph() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        assert_eq!(
            for_name(PipelineName::Build, &config, shutdown()).to_string(),
            BUILD_SHAPE
        );
        assert_eq!(for_name(PipelineName::Lint, &config, shutdown()).leaf_names(), vec!["lint"]);
    }

    #[test]
    fn build_orders_clean_transform_and_bundle() {
        let tmp = setup_fixtures();
        let (result, events) = run_with_events(&build(&config_for(tmp.path())));
        result.unwrap();

        let clean_done = event_index(&events, "clean", false);
        for task in ["html", "css", "js", "image", "font", "extra"] {
            assert!(clean_done < event_index(&events, task, true), "{task} started before clean finished");
        }
        let useref_start = event_index(&events, "useref", true);
        for task in ["html", "css", "js"] {
            assert!(event_index(&events, task, false) < useref_start, "useref started before {task} finished");
        }
    }

    #[test]
    fn build_produces_final_site() {
        let tmp = setup_fixtures();
        write(tmp.path(), "dist/stale.txt", "left over");
        Executor::new().run(&build(&config_for(tmp.path()))).unwrap();
        let root = tmp.path();

        assert!(!root.join("dist/stale.txt").exists());
        let html = read(root, "dist/index.html");
        assert!(!html.contains("build:") && !html.contains("endbuild"), "{html}");
        assert!(!html.contains("{{"), "{html}");
        assert!(html.contains("fixture-site"));
        assert_file_contains(&root.join("dist/assets/scripts/main.js"), "document.querySelectorAll");
        assert!(!read(root, "dist/assets/scripts/main.js").contains("//"));
        assert!(!read(root, "dist/assets/styles/main.css").contains('\n'));
        assert_eq!(read(root, "dist/robots.txt"), read(root, "public/robots.txt"));
        assert!(root.join("dist/assets/images/pixel.png").exists());
        assert!(root.join("dist/assets/fonts/site.woff").exists());
    }

    #[test]
    fn failing_transformer_stops_bundling_but_not_siblings() {
        let tmp = setup_fixtures();
        write(tmp.path(), "src/assets/styles/main.scss", "body { color: ");
        let (result, events) = run_with_events(&build(&config_for(tmp.path())));

        let err = result.unwrap_err();
        let failed: Vec<&str> = err.failures().iter().map(|f| f.task.as_str()).collect();
        assert_eq!(failed, vec!["css"]);
        assert!(!events.iter().any(|e| matches!(e, TaskEvent::Started { task } if task == "useref")));
        assert!(tmp.path().join("dist/robots.txt").exists());
        assert!(tmp.path().join("dist/assets/fonts/site.woff").exists());
    }

    #[test]
    fn lint_pipeline_fixes_fixture_scripts() {
        let tmp = setup_fixtures();
        write(tmp.path(), "src/assets/scripts/extra.js", "const x = 1   \n\n\n");
        Executor::new().run(&lint(&config_for(tmp.path()))).unwrap();
        assert_eq!(read(tmp.path(), "src/assets/scripts/extra.js"), "const x = 1\n");
    }
}
