use std::{env, fs, path::Path, rc::Rc};

use log::{Level, LevelFilter, Log, Metadata, Record};
use rayon::prelude::*;

use xvm::{
    bytecode::{image::disassemble, xse},
    runtime::{
        clock::SystemClock,
        config::VmConfig,
        error::LoadError,
        host_api::HostScope,
        script::ThreadHandle,
        vm::{RunOutcome, Timeslice, Vm},
    },
};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let level = match record.level() {
                Level::Error => "error",
                Level::Warn => "warning",
                Level::Info => "info",
                Level::Debug => "debug",
                Level::Trace => "trace",
            };
            eprintln!("{}: {}", level, record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() {
    let mut args: Vec<String> = env::args().collect();
    let verbose = args.iter().any(|arg| arg == "--verbose");
    let trace = args.iter().any(|arg| arg == "--trace");
    let infinite = args.iter().any(|arg| arg == "--infinite");
    let json = args.iter().any(|arg| arg == "--json");
    if verbose {
        args.retain(|arg| arg != "--verbose");
    }
    if trace {
        args.retain(|arg| arg != "--trace");
    }
    if infinite {
        args.retain(|arg| arg != "--infinite");
    }
    if json {
        args.retain(|arg| arg != "--json");
    }
    let timeslice = match extract_timeslice(&mut args) {
        Some(value) => value,
        None => return,
    };
    let config_path = match extract_value(&mut args, "--config") {
        Some(value) => value,
        None => return,
    };

    let _ = log::set_logger(&LOGGER);
    log::set_max_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => {
            print_help();
        }
        "run" => {
            if args.len() < 3 {
                eprintln!("Usage: xvm run <file.xse> [--timeslice <ms>|--infinite] [--trace]");
                return;
            }
            let mut config = match config_path {
                Some(path) => match VmConfig::from_file(Path::new(&path)) {
                    Ok(config) => config,
                    Err(err) => {
                        eprintln!("Error: cannot read config {}: {}", path, err);
                        return;
                    }
                },
                None => VmConfig::default(),
            };
            config.trace |= trace;
            let budget = match timeslice {
                Some(ms) if !infinite => Timeslice::Millis(ms),
                _ => Timeslice::Infinite,
            };
            run_file(&args[2], config, budget);
        }
        "inspect" => {
            if args.len() < 3 {
                eprintln!("Usage: xvm inspect <file.xse> [--json]");
                return;
            }
            inspect_file(&args[2], json);
        }
        "disasm" => {
            if args.len() < 3 {
                eprintln!("Usage: xvm disasm <file.xse>");
                return;
            }
            disasm_file(&args[2]);
        }
        "check" => {
            if args.len() < 3 {
                eprintln!("Usage: xvm check <file.xse>...");
                return;
            }
            check_files(&args[2..]);
        }
        other => {
            eprintln!("Error: unknown command `{}`", other);
            print_help();
        }
    }
}

fn print_help() {
    println!(
        "\
XtremeScript VM

Usage:
  xvm run <file.xse>
  xvm inspect <file.xse>
  xvm disasm <file.xse>
  xvm check <file.xse>...

Flags:
  --timeslice <ms>   Run for at most <ms> milliseconds (run)
  --infinite         Run until every thread stops (run, default)
  --trace            Print VM instruction trace (run)
  --config <file>    Load VM limits and timeslices from JSON (run)
  --json             Print the image summary as JSON (inspect)
  --verbose          Log loader and scheduler activity
  -h, --help         Show this help message
"
    );
}

fn extract_value(args: &mut Vec<String>, flag: &str) -> Option<Option<String>> {
    let mut value = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            if i + 1 >= args.len() {
                eprintln!("Usage: xvm <command> {} <value>", flag);
                return None;
            }
            value = Some(args.remove(i + 1));
            args.remove(i);
            continue;
        }
        i += 1;
    }
    Some(value)
}

fn extract_timeslice(args: &mut Vec<String>) -> Option<Option<u64>> {
    match extract_value(args, "--timeslice")? {
        Some(value) => match value.parse::<u64>() {
            Ok(parsed) => Some(Some(parsed)),
            Err(_) => {
                eprintln!("Error: --timeslice expects a non-negative integer.");
                None
            }
        },
        None => Some(None),
    }
}

/// Console versions of the host functions scripts expect.
fn register_console_api(vm: &mut Vm) {
    vm.register_host_api(
        HostScope::Global,
        "PrintString",
        Rc::new(|vm: &mut Vm, thread: ThreadHandle| {
            let text = vm.param_as_string(thread, 0);
            let count = vm.param_as_int(thread, 1).max(0);
            for _ in 0..count {
                print!("{}", text);
            }
            vm.return_void(thread, 2);
        }),
    );
    vm.register_host_api(
        HostScope::Global,
        "PrintInt",
        Rc::new(|vm: &mut Vm, thread: ThreadHandle| {
            print!("{}", vm.param_as_int(thread, 0));
            vm.return_void(thread, 1);
        }),
    );
    vm.register_host_api(
        HostScope::Global,
        "PrintNewline",
        Rc::new(|vm: &mut Vm, thread: ThreadHandle| {
            println!();
            vm.return_void(thread, 0);
        }),
    );
}

fn load(vm: &mut Vm, path: &str) -> Option<ThreadHandle> {
    match vm.load_script_file(Path::new(path), None) {
        Ok(thread) => Some(thread),
        Err(err) => {
            eprintln!("Error: cannot load {}: {} ({:?})", path, err, err.code());
            None
        }
    }
}

fn run_file(path: &str, config: VmConfig, budget: Timeslice) {
    let mut vm = Vm::with_clock(config, Box::new(SystemClock::new()));
    register_console_api(&mut vm);
    let Some(thread) = load(&mut vm, path) else {
        return;
    };
    if let Err(err) = vm.start_script(thread) {
        eprintln!("Error: {}", err);
        return;
    }

    let outcome = vm.run_scripts(budget);
    if let Some(fault) = vm.last_fault(thread) {
        eprintln!("Error: thread {} faulted: {}", thread, fault);
    }
    match outcome {
        RunOutcome::Budget => println!("stopped after timeslice"),
        _ => {
            let ret_val = vm.return_value(thread);
            println!("_RetVal: {}", ret_val);
            if let Some(code) = vm.exit_code(thread) {
                println!("exit code: {}", code);
            }
        }
    }
    vm.shutdown();
}

fn inspect_file(path: &str, json: bool) {
    let mut vm = Vm::new();
    let Some(thread) = load(&mut vm, path) else {
        return;
    };
    let Some(info) = vm.script_info(thread) else {
        return;
    };
    if json {
        match serde_json::to_string_pretty(&info) {
            Ok(text) => println!("{}", text),
            Err(err) => eprintln!("Error: {}", err),
        }
        return;
    }

    println!("Image: {}", path);
    println!("  sha256: {}", info.sha256.as_deref().unwrap_or("-"));
    println!("  instructions: {}", info.instructions);
    println!("  stack size: {}", info.stack_size);
    println!("  globals: {}", info.global_data_size);
    println!(
        "  priority: {} ({}ms)",
        info.priority, info.timeslice_ms
    );
    println!("  main: {}", info.main.as_deref().unwrap_or("none"));
    println!("  functions: {}", info.functions.join(", "));
    println!("  host calls: {}", info.host_calls.join(", "));
}

fn disasm_file(path: &str) {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("Error: cannot read {}: {}", path, err);
            return;
        }
    };
    match xse::decode(&bytes) {
        Ok(image) => print!("{}", disassemble(&image)),
        Err(err) => eprintln!("Error: {}: {}", path, err),
    }
}

fn check_file(path: &str) -> Result<usize, LoadError> {
    let bytes = fs::read(path)?;
    let image = xse::decode(&bytes)?;
    Ok(image.instrs.len())
}

fn check_files(paths: &[String]) {
    let results: Vec<(&String, Result<usize, LoadError>)> = paths
        .par_iter()
        .map(|path| (path, check_file(path)))
        .collect();

    let mut failed = 0;
    for (path, result) in results {
        match result {
            Ok(count) => println!("ok      {} ({} instructions)", path, count),
            Err(err) => {
                failed += 1;
                println!("{:<7} {}: {}", format!("{:?}", err.code()), path, err);
            }
        }
    }
    if failed > 0 {
        eprintln!("{} of {} images failed", failed, paths.len());
        std::process::exit(1);
    }
}
