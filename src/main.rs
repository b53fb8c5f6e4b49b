use clap::{Parser, Subcommand};
use sitepipe::config::{self, BuildConfig};
use sitepipe::output;
use sitepipe::pipeline::{self, PipelineName};
use sitepipe::task::Executor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitepipe")]
#[command(about = "Build pipeline for static websites")]
#[command(long_about = "\
Build pipeline for static websites

Templates, SCSS and scripts under src/ are compiled into temp/, then
bundled and minified into dist/ together with images, fonts and the
contents of public/.

Project layout:

  sitepipe.toml                    # Optional, sparse overrides of the defaults
  package.json                     # Exposed to templates as `pkg`
  src/
  ├── index.html                   # Page template (minijinja)
  ├── layouts/base.html            # Extended by pages, not built on its own
  └── assets/
      ├── styles/main.scss         # → temp/assets/styles/main.css
      ├── scripts/main.js          # Linted, optionally piped through [scripts] command
      ├── images/                  # Losslessly re-encoded into dist/
      └── fonts/                   # Copied into dist/
  public/                          # Copied verbatim into dist/

Bundles are declared in markup:

  <!-- build:js assets/scripts/site.js -->
  <script src=\"assets/scripts/main.js\"></script>
  <!-- endbuild -->

Logging goes to stderr; set SITEPIPE_LOG (e.g. SITEPIPE_LOG=debug) to see more.

Run 'sitepipe gen-config' to print a documented sitepipe.toml.")]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Configuration file, relative to the root (default: sitepipe.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Delete the intermediate and output directories
    Clean,
    /// Check scripts, fixing what can be fixed in place
    Lint,
    /// Clean, transform, bundle and minify the site into the output directory
    Build,
    /// Compile sources and serve them with live reload
    Serve,
    /// Build, then serve the output directory
    Start,
    /// Build, then push the output directory to the deploy branch
    Deploy,
    /// Print a stock sitepipe.toml with all options documented
    GenConfig,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SITEPIPE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    let name = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        Command::Clean => PipelineName::Clean,
        Command::Lint => PipelineName::Lint,
        Command::Build => PipelineName::Build,
        Command::Serve => PipelineName::Serve,
        Command::Start => PipelineName::Start,
        Command::Deploy => PipelineName::Deploy,
    };

    let config = Arc::new(BuildConfig::load(&cli.root, cli.config.as_deref())?);
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))?;
    }

    let node = pipeline::for_name(name, &config, shutdown);
    println!("{}", output::format_pipeline_header(name.as_str(), &node));

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_task_event(&event);
        }
    });
    let started = Instant::now();
    let result = Executor::with_events(tx).run(&node);
    printer.join().map_err(|_| "output thread panicked")?;

    match result {
        Ok(()) => {
            println!("{}", output::format_summary(name.as_str(), started.elapsed()));
            Ok(())
        }
        Err(e) => {
            output::print_failures(&e);
            std::process::exit(1);
        }
    }
}
