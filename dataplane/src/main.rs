// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(rustdoc::missing_crate_level_docs)]

mod host;
mod script;

use crate::host::Host;
use crate::script::UpdateScript;
use args::{BackendArg, CmdArgs, Parser};
use dplane::{
    BackendConfig, Framework, FrameworkConfig, HhProvider, LogBackend, MODULE_INFO, ProviderFlags,
    ProviderPriority,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracectl::{get_trace_ctl, trace_target};
use tracing::{error, info, level_filters::LevelFilter};

trace_target!("dataplane", LevelFilter::DEBUG, &[]);

fn process_tracing_cmds(args: &CmdArgs) {
    let tctl = get_trace_ctl();
    if let Some(tracing) = args.tracing()
        && let Err(e) = tctl.setup_from_string(tracing)
    {
        error!("Invalid tracing configuration: {e}");
        eprintln!("Invalid tracing configuration: {e}");
        std::process::exit(1);
    }
    if args.show_tracing_tags() {
        let out = tctl.as_string_by_tag().unwrap_or_else(|e| e.to_string());
        println!("{out}");
        std::process::exit(0);
    }
    if args.show_tracing_targets() {
        let out = tctl.as_string().unwrap_or_else(|e| e.to_string());
        println!("{out}");
        std::process::exit(0);
    }
}

fn build_provider(args: &CmdArgs) -> HhProvider {
    let provider = HhProvider::new(args.name());
    match args.backend() {
        BackendArg::None => provider,
        BackendArg::Log => provider.with_backend(
            Arc::new(LogBackend),
            BackendConfig {
                grace: args.grace(),
                ..BackendConfig::default()
            },
        ),
    }
}

fn load_script(args: &CmdArgs) -> miette::Result<UpdateScript> {
    match args.script() {
        Some(path) => UpdateScript::load(path),
        None => Ok(UpdateScript::default()),
    }
}

fn main() {
    let args = CmdArgs::parse();
    process_tracing_cmds(&args);
    info!(
        " ━━━━━━ {} v{}: {} ━━━━━━",
        MODULE_INFO.name, MODULE_INFO.version, MODULE_INFO.description
    );

    let script = match load_script(&args) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let ctrlc_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received stop request");
        ctrlc_stop.store(true, Ordering::Relaxed);
    }) {
        error!("Failed to set stop handler: {e}");
    }

    let mut framework = Framework::new(FrameworkConfig {
        work_limit: args.work_limit(),
        queue_capacity: args.queue_capacity(),
    });
    if let Err(e) = framework.register(
        args.name(),
        ProviderPriority::PreKernel,
        ProviderFlags::DEFAULT,
        Box::new(build_provider(&args)),
    ) {
        error!("Failed to register provider: {e}");
        std::process::exit(1);
    }
    if let Err(e) = framework.start() {
        error!("Failed to start dataplane framework: {e}");
        std::process::exit(1);
    }

    info!("Feeding {} update(s)", script.len());
    let mut host = Host::new(framework, stop)
        .with_max_cycles(args.cycles())
        .with_interval(args.cycle_interval());
    let code = match host.run(&script) {
        Ok(summary) => {
            if summary.interrupted {
                info!(
                    "Run interrupted with {} of {} update(s) completed",
                    summary.completed(),
                    summary.fed
                );
            }
            i32::from(summary.failed > 0)
        }
        Err(e) => {
            error!("Dataplane run failed: {e}");
            1
        }
    };
    host.shutdown();
    info!("\n{}", host.framework());
    std::process::exit(code);
}
