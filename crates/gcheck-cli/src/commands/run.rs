//! Run command - the full strategy evaluation

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use gcheck_core::config::{ProgramConfig, ProgramKind};
use gcheck_core::probe::resolve_targets;
use gcheck_core::strategy;
use gcheck_core::target::host_of;
use gcheck_core::{
    checklist, CancelToken, EngineConfig, Evaluation, Evaluator, LifecycleController, ProbeBackend,
    Report, RunStatus,
    Settings, StrategySet, Target, TargetResolver,
};
use gcheck_platform::{
    discover, net, select_doh_resolver, CurlBackend, NativeBackend, ProbeOptions,
    ProcessController, SystemResolver,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::config::load_settings;
use crate::render;

/// How probes are made
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// In-process HTTPS client
    Native,
    /// One curl process per round (needed for proxies)
    Curl,
}

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Fooling program to evaluate (gdpi, zapret, ciadpi)
    #[arg(short = 'f', long)]
    pub program: ProgramKind,

    /// Probe backend
    #[arg(short, long, value_enum, default_value_t = Mode::Native)]
    pub mode: Mode,

    /// Strategy list file
    #[arg(short = 's', long = "strategies")]
    pub strategy_list: PathBuf,

    /// Checklist file with the target addresses
    #[arg(short = 'l', long)]
    pub checklist: PathBuf,

    /// Probe rounds per strategy
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub passes: u32,

    /// Do not kill known fooling programs before the run
    #[arg(long)]
    pub skip_task_kill: bool,

    /// Do not stop and delete known services before the run
    #[arg(long = "skip-svc-kill")]
    pub skip_service_kill: bool,

    /// Skip certificate verification for every request
    #[arg(long)]
    pub insecure: bool,

    /// Also write the report as JSON
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Start without waiting for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Everything the async part of the run needs
struct Plan {
    settings: Settings,
    kind: ProgramKind,
    program: PathBuf,
    curl: Option<PathBuf>,
    set: StrategySet,
    targets: Vec<Target>,
    engine: EngineConfig,
    skip_task_kill: bool,
    skip_service_kill: bool,
}

impl Plan {
    fn backend(&self, options: &ProbeOptions) -> Arc<dyn ProbeBackend> {
        match self.curl {
            Some(ref curl) => Arc::new(CurlBackend::new(
                curl,
                self.settings.curl.basic_keys.clone(),
                options.clone(),
            )),
            None => Arc::new(NativeBackend::new(options.clone())),
        }
    }
}

/// Execute the run command
pub fn execute(args: RunArgs, config: Option<&Path>) -> Result<()> {
    let mut settings = load_settings(config)?;
    if args.insecure {
        settings.general.skip_cert_verify = true;
    }

    let table = settings.payloads.substitution_table();
    let set = strategy::compile_file(&args.strategy_list, &table)
        .with_context(|| format!("Failed to compile {}", args.strategy_list.display()))?;
    info!(
        strategies = set.len(),
        transport = set.transport(),
        proxy = ?set.proxy,
        "Compiled strategy list"
    );

    let program_config = settings.programs.get(args.program);
    check_requirements(args.program, program_config, &set, args.mode)?;
    warn_missing_payloads(&settings, &set);

    let targets = checklist::load(&args.checklist)
        .with_context(|| format!("Failed to load checklist {}", args.checklist.display()))?;
    info!(targets = targets.len(), "Loaded checklist");

    let program = discover::find_program(args.program, program_config)
        .with_context(|| format!("Can't find {}", args.program.display_name()))?;
    info!(path = %program.display(), "Found {}", args.program.display_name());

    let curl = match args.mode {
        Mode::Curl => {
            let path = discover::find_curl(&settings.curl).context("Can't find curl")?;
            info!(path = %path.display(), "Found curl");
            Some(path)
        }
        Mode::Native => None,
    };

    let engine = EngineConfig::from_settings(&settings, args.passes as usize);
    info!("Estimated time: {}", format_duration(engine.estimate(set.len())));

    if !args.yes {
        wait_for_confirmation()?;
    }

    let (cancel_tx, cancel) = CancelToken::channel();
    ctrlc::set_handler(move || {
        warn!("Received interrupt signal, stopping...");
        cancel_tx.send_replace(true);
    })
    .context("Failed to set signal handler")?;

    let plan = Plan {
        settings,
        kind: args.program,
        program,
        curl,
        set,
        targets,
        engine,
        skip_task_kill: args.skip_task_kill,
        skip_service_kill: args.skip_service_kill,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let evaluation = runtime.block_on(evaluate(plan, cancel))?;

    let report = Report::build(&evaluation);
    print!("{}", render::report(&report));

    if let Some(ref path) = args.report_json {
        let json = report.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Wrote JSON report");
    }

    match report.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Interrupted { .. } => bail!("Evaluation interrupted"),
        RunStatus::Aborted { reason, .. } => bail!("Evaluation aborted: {}", reason),
    }
}

async fn evaluate(mut plan: Plan, cancel: CancelToken) -> Result<Evaluation> {
    let controller = ProcessController::new(&plan.settings, plan.kind)
        .with_skips(plan.skip_task_kill, plan.skip_service_kill);
    let mut options = ProbeOptions::for_set(&plan.set, plan.settings.general.skip_cert_verify);
    let verified = !options.insecure;

    let mut interrupt = cancel.clone();
    let evaluator = Evaluator::new(plan.engine.clone(), &plan.program, plan.backend(&options), controller)
        .with_cancellation(cancel);
    evaluator.prepare().await;

    let targets = std::mem::take(&mut plan.targets);
    let checked = interrupt
        .run_until_cancelled(preflight(&plan, &mut options, targets.clone()))
        .await;
    let targets = match checked {
        Some(Ok(targets)) => targets,
        Some(Err(e)) => {
            evaluator.lifecycle().final_cleanup().await;
            return Err(e);
        }
        None => {
            warn!("Interrupted during pre-flight checks");
            evaluator.lifecycle().final_cleanup().await;
            return Ok(Evaluation {
                strategies: std::mem::take(&mut plan.set.strategies),
                targets,
                status: RunStatus::Interrupted { strategy: None },
            });
        }
    };

    let evaluator = if verified && options.insecure {
        evaluator.with_backend(plan.backend(&options))
    } else {
        evaluator
    };

    let strategies = std::mem::take(&mut plan.set.strategies);
    Ok(evaluator.run(strategies, targets).await)
}

/// Connectivity check, extra targets and target resolution
async fn preflight(plan: &Plan, options: &mut ProbeOptions, mut targets: Vec<Target>) -> Result<Vec<Target>> {
    let general = &plan.settings.general;
    let timeout = plan.settings.connection_timeout();

    if general.connectivity_test {
        let url = &general.connectivity_test_url;
        if !net::check_connectivity(plan.backend(options).as_ref(), url, timeout).await {
            if options.insecure {
                bail!("No connectivity to {}", url);
            }
            warn!("Retrying with certificate verification disabled");
            let insecure = options.insecure();
            if !net::check_connectivity(plan.backend(&insecure).as_ref(), url, timeout).await {
                bail!("No connectivity to {}", url);
            }
            warn!("Connection works only without certificate verification, continuing insecure");
            *options = insecure;
        }
    }

    if general.auto_google_cache {
        match net::google_cache_target(&general.mapping_urls, timeout, options.insecure).await {
            Ok(Some(address)) => {
                if !targets.iter().any(|t| t.address == address) {
                    targets.push(Target::new(address));
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Googlevideo cluster lookup failed"),
        }
    }

    if let Some(ref proxy) = options.proxy {
        info!(proxy = %proxy, "Proxy in use, skipping target resolution");
        return Ok(targets);
    }

    let resolver: Box<dyn TargetResolver> = if plan.settings.resolver.use_doh {
        let config = &plan.settings.resolver;
        let resolver = select_doh_resolver(
            &config.doh_resolvers,
            host_of(&general.connectivity_test_url),
            options.ip_version,
            Duration::from_secs(config.timeout_secs),
            config.retries,
            options.insecure,
        )
        .await
        .context("No working DoH resolver")?;
        Box::new(resolver)
    } else {
        Box::new(SystemResolver::new(options.ip_version))
    };

    let targets = resolve_targets(resolver.as_ref(), targets).await;
    if targets.is_empty() {
        bail!("None of the targets resolved");
    }
    Ok(targets)
}

/// Combinations of program, strategy list and backend that can't work
fn check_requirements(kind: ProgramKind, program: &ProgramConfig, set: &StrategySet, mode: Mode) -> Result<()> {
    if program.works_as_proxy && set.proxy.is_none() {
        bail!(
            "{} works as a proxy, the strategy list must set #PROXY=",
            kind.display_name()
        );
    }
    if set.proxy.is_some() && mode != Mode::Curl {
        bail!("Probing through a proxy needs curl mode (-m curl)");
    }
    Ok(())
}

fn warn_missing_payloads(settings: &Settings, set: &StrategySet) {
    for file in settings.payloads.payload_files() {
        if file.is_empty() || Path::new(file).exists() {
            continue;
        }
        let used = set
            .strategies
            .iter()
            .any(|s| s.tokens.iter().any(|t| t.contains(file)));
        if used {
            warn!(file, "Payload file referenced by the strategy list does not exist");
        }
    }
}

fn wait_for_confirmation() -> Result<()> {
    print!("Press ENTER to begin, Ctrl-C to cancel...");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcheck_core::strategy::compile;

    fn set(source: &str) -> StrategySet {
        let table = Settings::default().payloads.substitution_table();
        compile(source, &table).unwrap()
    }

    // =========== Requirements ===========

    #[test]
    fn test_proxy_program_needs_proxy() {
        let kind = ProgramKind::ByeDpi;
        let config = kind.default_config();
        let plain = set("#PROTO=TCP\n#KEY#-s1#\n#ENDGROUP#\n");
        assert!(check_requirements(kind, &config, &plain, Mode::Curl).is_err());

        let proxied = set("#PROTO=TCP\n#PROXY=socks5://127.0.0.1:1080\n#KEY#-s1#\n#ENDGROUP#\n");
        assert!(check_requirements(kind, &config, &proxied, Mode::Curl).is_ok());
        assert!(check_requirements(kind, &config, &proxied, Mode::Native).is_err());
    }

    #[test]
    fn test_udp_runs_in_both_modes() {
        let kind = ProgramKind::Zapret;
        let config = kind.default_config();
        let udp = set("#PROTO=UDP\n#KEY#--dpi-desync=fake#\n#ENDGROUP#\n");
        assert!(check_requirements(kind, &config, &udp, Mode::Native).is_ok());
        assert!(check_requirements(kind, &config, &udp, Mode::Curl).is_ok());

        let proxied = set("#PROTO=UDP\n#PROXY=socks5://127.0.0.1:1080\n#KEY#--dpi-desync=fake#\n#ENDGROUP#\n");
        assert!(check_requirements(kind, &config, &proxied, Mode::Native).is_err());
    }

    #[test]
    fn test_plain_tcp_native_ok() {
        let kind = ProgramKind::GoodbyeDpi;
        let config = kind.default_config();
        let tcp = set("#PROTO=TCP\n#KEY#-e1#\n#ENDGROUP#\n");
        assert!(check_requirements(kind, &config, &tcp, Mode::Native).is_ok());
    }

    // =========== Formatting ===========

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(2300)), "2s");
        assert_eq!(format_duration(Duration::from_secs(69)), "1m 9s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
