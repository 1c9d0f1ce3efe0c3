//! kexecboot - kexec based bootloader
//!
//! Usage: kexecboot [-c <config>] [--dry-run]

use std::convert::Infallible;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context};
use log::LevelFilter;

use kexecboot::config::{self, HostContext, Settings};
use kexecboot::console::{KeyInput, TerminalGuard, TextRenderer, Tty};
use kexecboot::devices::ProcPartitions;
use kexecboot::init::detect_init;
use kexecboot::launch::Launcher;
use kexecboot::logger::DebugLog;
use kexecboot::mount::SysMounter;
use kexecboot::populate::IconSet;
use kexecboot::power::{DryRunPower, PowerControl, SysPower};
use kexecboot::probe::{FileIconLoader, KernelProber};
use kexecboot::process::SysSpawner;
use kexecboot::quirks::ConfiguredQuirks;
use kexecboot::scan::Scanner;
use kexecboot::ui::Session;

struct Options {
    config_path: PathBuf,
    dry_run: bool,
}

fn print_usage() {
    println!("kexecboot {}", kexecboot::VERSION);
    println!();
    println!("Usage: kexecboot [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>  Settings file (default {})", config::DEFAULT_CONFIG_PATH);
    println!("      --dry-run        Don't touch the machine; run {} instead of kexec", config::DRY_RUN_KEXEC_PATH);
    println!("  -h, --help           Show this help");
    println!("  -V, --version        Show version");
}

/// Logging goes to stderr. `RUST_LOG` wins over the kernel command line.
fn init_logging() -> bool {
    let from_env = std::env::var_os("RUST_LOG").is_some();
    let mut builder = env_logger::Builder::new();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.init();

    if !from_env {
        log::set_max_level(LevelFilter::Info);
    }
    from_env
}

fn run(options: Options, level_from_env: bool) -> anyhow::Result<Infallible> {
    let settings = match Settings::load(&options.config_path) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("{}; using defaults", e);
            Settings::default()
        }
    };

    let mut log = DebugLog::with_capacity_limit(settings.log_rows);
    log.info(format_args!("kexecboot {} starting", kexecboot::VERSION));

    let init_mode = detect_init(std::process::id(), &SysMounter, &settings.printk_path, &mut log)
        .context("init setup failed")?;

    let host = HostContext::from_proc();
    if let (false, Some(level)) = (level_from_env, host.log_level) {
        log::set_max_level(level);
    }

    let tty = match Tty::open(host.tty.as_deref()) {
        Ok(tty) => tty,
        Err(e) => {
            log.warn(format_args!("Can't open {:?}: {}; using stdin", host.tty, e));
            Tty::open(None)?
        }
    };
    let terminal = match TerminalGuard::disable_echo(tty.fd()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            log.warn(format_args!("Can't set up terminal: {}", e));
            None
        }
    };
    log.info(format_args!("tty is {}", host.tty.as_deref().unwrap_or("stdin")));

    if let Some(delay) = settings.delay_secs {
        // slow SD/CF cards
        std::thread::sleep(Duration::from_secs(delay));
    }

    let kexec_path = if options.dry_run {
        config::DRY_RUN_KEXEC_PATH.to_string()
    } else {
        settings.kexec_path.clone()
    };
    let power: Box<dyn PowerControl> = if options.dry_run {
        Box::new(DryRunPower)
    } else {
        Box::new(SysPower)
    };

    let icons = IconSet::load(&settings.icons, &FileIconLoader, &mut log);
    let prober = KernelProber::from_settings(&settings).detect_machine_kernel();
    let mut scanner = Scanner::new(
        Box::new(ProcPartitions::new()),
        Box::new(prober),
        Box::new(SysMounter),
        &settings.mount_point,
    )
    .with_icon_decoder(Box::new(FileIconLoader));
    let quirks = ConfiguredQuirks::new(&settings.quirks);
    if !quirks.is_empty() {
        scanner = scanner.with_quirks(Box::new(quirks));
    }

    let mut session = Session::new(scanner, icons, power, init_mode, log)
        .with_renderer(Box::new(TextRenderer::stdout()));
    session.load().context("device scan failed")?;

    let mut input = KeyInput::new(tty.fd(), settings.timeout_secs.map(Duration::from_secs));
    let index = session.run(&mut input).context("menu aborted")?;

    drop(terminal);
    let (item, mut log) = session.finish(index);
    let item = item.ok_or_else(|| anyhow!("no boot entry #{}", index))?;
    log.info(format_args!("Booting {} from {}", item.kernel, item.device));

    let launcher = Launcher::new(
        kexec_path,
        &settings.mount_point,
        &settings.net_probe_path,
        Box::new(SysMounter),
        Box::new(SysSpawner),
    );
    launcher
        .launch(&item, &host, &mut log)
        .with_context(|| format!("can't boot {}", item.display_label()))
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        config_path: PathBuf::from(config::DEFAULT_CONFIG_PATH),
        dry_run: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "-V" | "--version" => {
                println!("kexecboot {}", kexecboot::VERSION);
                return ExitCode::SUCCESS;
            }
            "-c" | "--config" => {
                i += 1;
                match args.get(i) {
                    Some(path) => options.config_path = PathBuf::from(path),
                    None => {
                        eprintln!("Missing argument for {}", args[i - 1]);
                        return ExitCode::from(2);
                    }
                }
            }
            "--dry-run" => options.dry_run = true,
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                return ExitCode::from(2);
            }
        }
        i += 1;
    }

    let level_from_env = init_logging();

    match run(options, level_from_env) {
        Ok(never) => match never {},
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
