//! # Sitepipe
//!
//! A build pipeline for static websites. Sources are templates, SCSS,
//! scripts, images and fonts under `src/`, plus static files under
//! `public/`; the result is a minified, bundled site in `dist/` that can be
//! served locally or pushed to a git branch.
//!
//! # Architecture: Tasks in a Graph
//!
//! Every unit of work is a [`task::Task`] with a name and a blocking `run`.
//! Pipelines are trees of tasks combined in sequence or in parallel and
//! walked by [`task::Executor`]:
//!
//! ```text
//! build = series(clean,
//!                parallel(series(parallel(html, css, js), useref),
//!                         image, font, extra))
//! ```
//!
//! Markup, styles and scripts go through two phases: a per-file transform
//! into `temp/`, then bundling and minification from `temp/` into `dist/`.
//! Images, fonts and public files are final after one step and go straight
//! to `dist/`.
//!
//! - **Explicit completion**: every task returns a `Result`. Sequences stop
//!   at the first failure; parallel groups let every child settle and then
//!   report all failures together.
//! - **Shared, immutable configuration**: one [`config::BuildConfig`] is
//!   loaded at startup and handed to every task in an `Arc`.
//! - **Observable order**: the executor emits a [`task::TaskEvent`] for each
//!   start, finish and failure, which the CLI prints and tests assert on.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `sitepipe.toml` loading, defaults, validation, template data |
//! | [`types`] | Asset roles, directory roles, path patterns |
//! | [`files`] | Role-directory traversal and structure-preserving writes |
//! | [`task`] | Task trait, task graph, executor, error taxonomy |
//! | [`clean`] | Deletes the generated directories |
//! | [`lint`] | Script style checks with in-place fixing |
//! | [`transform`] | Per-file transformers: templates, SCSS, scripts, images, fonts |
//! | [`passthrough`] | Copies `public/` into the output |
//! | [`bundle`] | Build-block resolution, concatenation and minification |
//! | [`serve`] | Dev server with watch + live reload, dist server |
//! | [`publish`] | Pushes the output to a git branch |
//! | [`pipeline`] | The named pipelines as task graphs |
//! | [`output`] | CLI output formatting |

pub mod bundle;
pub mod clean;
pub mod config;
pub mod files;
pub mod lint;
pub mod output;
pub mod passthrough;
pub mod pipeline;
pub mod publish;
pub mod serve;
pub mod task;
pub mod transform;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
