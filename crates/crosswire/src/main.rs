use std::path::PathBuf;

use anyhow::Context as _;
use env_flags::env_flags;
use once_cell::sync::OnceCell;

use crosswire::config;
use crosswire::job;
use crosswire::session::Session;
use crosswire::store::{self, WorkbookPaths};

/// Crosswire home (config and default log dir): `CROSSWIRE_HOME`, else
/// `$HOME/.crosswire`, else `./.crosswire`.
fn crosswire_home() -> PathBuf {
    if let Ok(home) = std::env::var("CROSSWIRE_HOME")
        && !home.is_empty()
    {
        return PathBuf::from(home);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".crosswire");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".crosswire")
}

fn init_tracing() {
    env_flags! {
        /// Tracing filter, e.g. "info", "debug", or targets format.
        RUST_LOG: &str = "info";
        /// Preferred filter env (alias). If set, overrides RUST_LOG.
        TRACING_FILTER: &str = "";
        /// Pretty formatting for logs (ignored if TRACING_JSON=true).
        TRACING_PRETTY: bool = false;
        /// Compact single-line formatting for logs (ignored if TRACING_JSON=true)
        TRACING_COMPACT: bool = true;
        /// JSON formatting for logs
        TRACING_JSON: bool = false;
        /// If true, also log to file under <CROSSWIRE_HOME>/logs or LOG_DIR
        LOG_TO_FILE: bool = true;
        /// Optional explicit log directory (absolute). Defaults to <CROSSWIRE_HOME>/logs
        LOG_DIR: &str = "";
    }

    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, prelude::*};

    let cw_home = crosswire_home();

    // Load user config (optional) and let it influence tracing defaults when
    // env is not set.
    let user_cfg = config::load_user_config(&cw_home).ok().flatten();
    let env_set = |k: &str| std::env::var_os(k).is_some();

    // Support TRACING_FILTER as primary; fall back to RUST_LOG; then user config.
    let mut rust_log = if !(*TRACING_FILTER).is_empty() {
        (*TRACING_FILTER).to_string()
    } else {
        (*RUST_LOG).to_string()
    };
    let mut tracing_json = *TRACING_JSON;
    let mut tracing_compact = *TRACING_COMPACT;
    let mut tracing_pretty = *TRACING_PRETTY;
    let mut log_to_file = *LOG_TO_FILE;
    let mut log_dir: Option<PathBuf> = if !(*LOG_DIR).is_empty() {
        Some(PathBuf::from((*LOG_DIR).to_string()))
    } else {
        None
    };

    if let Some(cfg) = user_cfg.as_ref().and_then(|c| c.logging.as_ref()) {
        if !(env_set("TRACING_FILTER") || env_set("RUST_LOG"))
            && let Some(level) = cfg.level.as_ref()
        {
            rust_log = level.clone();
        }
        if !env_set("TRACING_JSON")
            && let Some(v) = cfg.json
        {
            tracing_json = v;
        }
        if !env_set("TRACING_COMPACT")
            && let Some(v) = cfg.compact
        {
            tracing_compact = v;
        }
        if !env_set("TRACING_PRETTY")
            && let Some(v) = cfg.pretty
        {
            tracing_pretty = v;
        }
        if !env_set("LOG_TO_FILE")
            && let Some(v) = cfg.to_file
        {
            log_to_file = v;
        }
        if !env_set("LOG_DIR")
            && let Some(dir) = cfg.dir.as_ref()
        {
            log_dir = Some(PathBuf::from(dir));
        }
    }

    let filter = EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new("info"));
    let base = tracing_subscriber::fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    // Optional file logging layer; the worker guard must outlive main.
    static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
    let file_writer = if log_to_file {
        let dir = log_dir.unwrap_or_else(|| cw_home.join("logs"));
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "crosswire.log");
                let (nb, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_GUARD.set(guard);
                Some(nb)
            }
            Err(e) => {
                eprintln!("failed to create log dir {}: {}", dir.display(), e);
                None
            }
        }
    } else {
        None
    };
    // Build stderr + optional file layers for the selected format, then init.
    let reg = tracing_subscriber::registry().with(filter);
    if tracing_json {
        let stderr_layer = base.json();
        let res = match file_writer {
            Some(nb) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_file(false)
                    .with_line_number(false)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(nb)
                    .json();
                reg.with(stderr_layer).with(file_layer).try_init()
            }
            None => reg.with(stderr_layer).try_init(),
        };
        if let Err(e) = res {
            eprintln!("tracing already set: {:?}", e);
        }
    } else if tracing_compact {
        let stderr_layer = base.compact();
        let res = match file_writer {
            Some(nb) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_file(false)
                    .with_line_number(false)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(nb)
                    .compact();
                reg.with(stderr_layer).with(file_layer).try_init()
            }
            None => reg.with(stderr_layer).try_init(),
        };
        if let Err(e) = res {
            eprintln!("tracing already set: {:?}", e);
        }
    } else if tracing_pretty {
        let stderr_layer = base.pretty();
        let res = match file_writer {
            Some(nb) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_file(false)
                    .with_line_number(false)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(nb)
                    .pretty();
                reg.with(stderr_layer).with(file_layer).try_init()
            }
            None => reg.with(stderr_layer).try_init(),
        };
        if let Err(e) = res {
            eprintln!("tracing already set: {:?}", e);
        }
    } else {
        let stderr_layer = base;
        let res = match file_writer {
            Some(nb) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_file(false)
                    .with_line_number(false)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(nb);
                reg.with(stderr_layer).with(file_layer).try_init()
            }
            None => reg.with(stderr_layer).try_init(),
        };
        if let Err(e) = res {
            eprintln!("tracing already set: {:?}", e);
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing early
    init_tracing();

    env_flags! {
        /// Directory holding the workbook sheets. Defaults to the current directory.
        WORKBOOK_DIR: &str = "";
        /// Explicit path for the model-supplier sheet (overrides WORKBOOK_DIR/model_suppliers.csv).
        BINDINGS_FILE: &str = "";
        /// Explicit path for the model-config sheet (overrides WORKBOOK_DIR/model_configs.csv).
        CONFIGS_FILE: &str = "";
        /// Propagation job file (TOML).
        JOB_FILE: &str = "propagation.toml";
        /// If set, the review bundle is written to this directory.
        EXPORT_DIR: &str = "";
        /// Plan and report only; leave the workbook untouched.
        DRY_RUN: bool = false;
    }

    tracing::info!("starting crosswire");

    let cw_home = crosswire_home();
    tracing::info!("crosswire_home={}", cw_home.display());
    let user_cfg = config::load_user_config(&cw_home).ok().flatten();
    let workbook_cfg = user_cfg.as_ref().and_then(|c| c.workbook.as_ref());

    // Paths: env wins, else config, else current directory.
    let workbook_dir = if !(*WORKBOOK_DIR).is_empty() {
        PathBuf::from((*WORKBOOK_DIR).to_string())
    } else if let Some(dir) = workbook_cfg.and_then(|w| w.dir.as_ref()) {
        config::expand_home(dir)
    } else {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    };
    tracing::info!("workbook_dir={}", workbook_dir.display());

    let mut paths = WorkbookPaths::in_dir(&workbook_dir);
    let bindings_override = if !(*BINDINGS_FILE).is_empty() {
        Some(PathBuf::from((*BINDINGS_FILE).to_string()))
    } else {
        workbook_cfg
            .and_then(|w| w.bindings_file.as_ref())
            .map(|s| config::expand_home(s))
    };
    if let Some(p) = bindings_override {
        tracing::debug!("bindings sheet override: {}", p.display());
        paths.bindings = p;
    }
    let configs_override = if !(*CONFIGS_FILE).is_empty() {
        Some(PathBuf::from((*CONFIGS_FILE).to_string()))
    } else {
        workbook_cfg
            .and_then(|w| w.configs_file.as_ref())
            .map(|s| config::expand_home(s))
    };
    if let Some(p) = configs_override {
        tracing::debug!("configs sheet override: {}", p.display());
        paths.configs = p;
    }

    let export_dir = if !(*EXPORT_DIR).is_empty() {
        Some(PathBuf::from((*EXPORT_DIR).to_string()))
    } else {
        user_cfg
            .as_ref()
            .and_then(|c| c.export.as_ref())
            .and_then(|e| e.dir.as_ref())
            .map(|s| config::expand_home(s))
    };

    let job_path = PathBuf::from((*JOB_FILE).to_string());
    let mut job = job::load_from_file(&job_path)
        .with_context(|| format!("loading job file {}", job_path.display()))?;
    if job.policy.is_none() {
        job.policy = user_cfg
            .as_ref()
            .and_then(|c| c.apply.as_ref())
            .and_then(|a| a.on_duplicate);
    }
    tracing::info!(
        "job: parent_model='{}', {} clone source(s), on_duplicate={:?}",
        job.parent_model,
        job.selections.len(),
        job.policy.unwrap_or_default()
    );

    let workbook = store::load_workbook(&paths).context("loading workbook")?;
    tracing::info!(
        "workbook loaded: {} supplier(s), {} binding(s), {} config row(s)",
        workbook.suppliers.rows.len(),
        workbook.bindings.rows.len(),
        workbook.configs.rows.len()
    );

    let mut session = Session::new(workbook);
    tracing::info!("session {} opened", session.id);

    let plan = session.plan(&job).context("planning propagation")?;
    if plan.matched_bindings == 0 {
        tracing::warn!("no bindings matched parent model '{}'", job.parent_model);
    }
    for r in &plan.renames {
        tracing::info!(
            "rename binding {}: '{}' -> '{}'",
            r.binding_id,
            r.old_model,
            r.new_model
        );
    }
    for c in &plan.clones {
        tracing::info!(
            "clone '{}' -> '{}' (supplier {})",
            c.source_model,
            c.new_model,
            c.supplier_id
        );
    }
    if plan.is_empty() {
        tracing::info!("nothing to do");
        return Ok(());
    }
    if *DRY_RUN {
        tracing::info!(
            "dry run: {} rename(s) and {} clone(s) planned, workbook left untouched",
            plan.renames.len(),
            plan.clones.len()
        );
        return Ok(());
    }

    let report = session.apply(&plan).context("applying propagation")?;
    tracing::info!(
        "applied: {} renamed, {} added, {} replaced",
        report.renamed,
        report.added,
        report.replaced
    );

    store::save_workbook(&paths, &session.bindings, &session.configs)
        .context("saving workbook")?;
    tracing::info!("workbook saved");

    if let Some(dir) = export_dir {
        let session_id = session.id.to_string();
        store::export_bundle(
            &dir,
            &session.suppliers,
            &session.bindings,
            &session.configs.columns,
            &report.new_configs,
            &session.log,
            &session_id,
        )
        .context("writing export bundle")?;
        tracing::info!("export bundle written to {}", dir.display());
    }

    tracing::info!(
        "done: {} change(s) logged in session {}",
        session.log.len(),
        session.id
    );
    Ok(())
}
