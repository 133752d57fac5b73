//! CLI argument parsing and run dispatch
//!
//! The tool is meant to run inside CI with no arguments at all: every option
//! can be supplied through the environment, and the required ones
//! (`USERNAME`, `ACCESS_TOKEN`, `REF`) only through it in practice.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use url::Url;

use bump_translations::config::{parse_target_list, Credentials, Settings};
use bump_translations::defaults;
use bump_translations::error::Error;
use bump_translations::output::{render_summary, ColorChoice, OutputConfig};
use bump_translations::pipeline::Pipeline;
use bump_translations::registry::NpmRegistry;
use bump_translations::repository::DefaultGitOperations;

/// Bump Translations - Propagate the translations package to downstream repositories
#[derive(Parser, Debug)]
#[command(name = "bump-translations")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Account used for clone and push
    #[arg(long, env = "USERNAME", hide_env_values = true)]
    username: Option<String>,

    /// Token used for clone and push
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Registry token for installing private packages
    #[arg(long, env = "NPM_TOKEN", hide_env_values = true)]
    npm_token: Option<String>,

    /// Branch to clone and push
    #[arg(long = "ref", value_name = "BRANCH", env = "REF")]
    git_ref: Option<String>,

    /// Repository to update (repeatable, defaults to the built-in list)
    #[arg(
        long = "target",
        value_name = "NAME",
        env = "BUMP_TARGETS",
        value_delimiter = ','
    )]
    targets: Vec<String>,

    /// Base URL the target names are appended to
    #[arg(long, value_name = "URL", env = "BUMP_ORIGIN", default_value = defaults::DEFAULT_ORIGIN)]
    origin: String,

    /// Fully qualified name of the translations package
    #[arg(long, value_name = "NAME", env = "BUMP_PACKAGE", default_value = defaults::TRANSLATIONS_PACKAGE)]
    package: String,

    /// Version to install: "latest" or an explicit version
    #[arg(long, value_name = "VERSION", env = "BUMP_VERSION", default_value = "latest")]
    package_version: String,

    /// Registry used for resolution
    #[arg(long, value_name = "URL", env = "NPM_REGISTRY", default_value = defaults::DEFAULT_REGISTRY)]
    registry: String,

    /// HTTP proxy for git transport
    #[arg(long, value_name = "URL", env = "BUMP_PROXY")]
    proxy: Option<String>,

    /// Directory for clones and scratch installs (defaults to a temporary directory)
    #[arg(long, value_name = "DIR", env = "BUMP_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Process targets one at a time
    #[arg(long)]
    sequential: bool,

    /// Commit locally but do not push
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Print the run report as JSON instead of the summary
    #[arg(long)]
    json: bool,

    /// Colorize the summary
    #[arg(long, value_name = "WHEN", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(
        long,
        value_name = "LEVEL",
        env = "BUMP_TRANSLATIONS_LOG",
        default_value = "info"
    )]
    log_level: String,
}

impl Cli {
    /// Run the pipeline over every target.
    ///
    /// Returns exit code 1 when any target failed; configuration problems are
    /// reported as errors before any target is touched.
    pub fn execute(self) -> Result<ExitCode> {
        init_logging(&self.log_level);

        let output = OutputConfig::new(self.color);
        console::set_colors_enabled(output.use_color);
        console::set_colors_enabled_stderr(output.use_color);

        // The temporary work dir is removed when `_temp_dir` drops.
        let (work_dir, _temp_dir) = match &self.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create work dir {}", dir.display()))?;
                (dir.clone(), None)
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("bump-translations-")
                    .tempdir()
                    .context("Failed to create a temporary work dir")?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };

        let settings = self.settings(work_dir)?;
        settings.validate()?;

        info!(
            "Bumping {}@{} in {} on {}",
            settings.package,
            settings.selector,
            settings.targets.join(", "),
            settings.r#ref
        );
        debug!("Work dir: {}", settings.work_dir.display());

        let git = DefaultGitOperations;
        let registry = NpmRegistry::new();
        let report = Pipeline::new(&settings, &git, &registry).run_all();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{}", render_summary(&output, &report));
        }

        Ok(ExitCode::from(report.exit_code() as u8))
    }

    fn settings(&self, work_dir: PathBuf) -> Result<Settings, Error> {
        let username = required(&self.username, "USERNAME")?;
        let token = required(&self.access_token, "ACCESS_TOKEN")?;
        let git_ref = required(&self.git_ref, "REF")?;

        let credentials = Credentials::new(username, token)?;
        let mut settings = Settings::new(credentials, git_ref, work_dir)?;

        let targets: Vec<String> = self
            .targets
            .iter()
            .flat_map(|t| parse_target_list(t))
            .collect();
        if !targets.is_empty() {
            settings.targets = targets;
        }

        settings.origin = self.origin.clone();
        settings.package = self.package.clone();
        settings.selector = self.package_version.parse()?;
        settings.registry = Url::parse(&self.registry).map_err(|e| Error::Config {
            message: format!("invalid registry URL '{}': {}", self.registry, e),
            hint: None,
        })?;
        settings.npm_token = self.npm_token.clone().filter(|t| !t.trim().is_empty());
        settings.proxy = self.proxy.clone().filter(|p| !p.trim().is_empty());
        settings.dry_run = self.dry_run;
        settings.sequential = self.sequential;

        Ok(settings)
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, Error> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(Error::Config {
            message: format!("{} is not set", name),
            hint: Some(format!(
                "Provide {} through the environment (CI secret)",
                name
            )),
        }),
    }
}

/// Sets up `env_logger`; `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_target(false)
        .try_init();
}
