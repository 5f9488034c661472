use std::sync::OnceLock;
use anyhow::Context;
use clap::{Parser, ValueEnum, ColorChoice, ArgAction, CommandFactory};
use clap_complete::Shell;
use comfy_table::{Table, ContentArrangement};
use serde::{Deserialize, Serialize};
use is_terminal::IsTerminal;
mod db_scan;
mod device_path;
mod error;
mod identifier;
mod markdown;
mod resolver;
mod support_db;

use device_path::{DevicePath, Notation, PathSegment};
use resolver::{MatchKind, MatchResult};
use support_db::SupportDatabase;

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum OutputFmt { Text, Json }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum TextFormat { Lines, Table }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum TargetNotation { Enumerator, Firmware, Acpi }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum LogFormat { Text, Json }

#[derive(Parser, Debug)]
#[command(
    name = "HwCompat",
    about = "Hardware support lookup and device path converter",
    long_about = "Hardware support lookup and device path converter: classifies PCI device IDs and disk models against support-list databases and converts device location paths between enumerator, firmware device-path, and ACPI name-path notations.",
    after_long_help = "Examples:\n  HwCompat --db GPUSupportInfo.list --id \"PCI\\VEN_1002&DEV_67DF&SUBSYS_04C81028\"\n  HwCompat --db ETHSupportInfo.list --ids-file devices.txt --text-format table\n  HwCompat --db DiskSupportInfo.list --name-keyed --model \"Samsung SSD 970 EVO 1TB\"\n  HwCompat --convert \"PCIROOT(0)#PCI(0100)#PCI(0000)\" --to firmware\n  HwCompat --convert \"ACPI(_SB_)#ACPI(PCI0)#ACPI(PEGP)#ACPI(GFX0)\" --to acpi --trim-marker PEGP\n  HwCompat --splice 1002&67DF\n  HwCompat --db GPUSupportInfo.list --validate --repair-out GPUSupportInfo.clean.list\n  HwCompat --scan-path ./lists --db-glob \"*.list\"",
    color = ColorChoice::Auto
)]
struct Args {
    /// Support database .list files (merged in order)
    #[arg(long, short = 'd', num_args = 0.., value_delimiter = ',')]
    db: Vec<String>,
    /// Raw enumerator descriptor or bare VVVV&DDDD identifier
    #[arg(long, short = 'i')]
    id: Option<String>,
    /// Disk/storage model name (name-keyed lookup)
    #[arg(long, short = 'M')]
    model: Option<String>,
    /// Batch file: one descriptor or model per line
    #[arg(long, short = 'f')]
    ids_file: Option<String>,
    #[arg(long, default_value_t = false, help = "Treat batch lines as model names instead of bus descriptors")]
    name_keyed: bool,
    /// Device location path to convert (dialect auto-detected)
    #[arg(long, short = 'c')]
    convert: Option<String>,
    #[arg(long, value_enum)]
    to: Option<TargetNotation>,
    #[arg(long, help = "Truncate the path before the rightmost ACPI segment starting with this tag (e.g. PEGP)")]
    trim_marker: Option<String>,
    /// Print the high/low splice byte literals for a device ID
    #[arg(long)]
    splice: Option<String>,
    #[arg(long, default_value_t = false)]
    validate: bool,
    #[arg(long)]
    repair_out: Option<String>,
    /// Add or update an entry in the first --db file (KEY=STATUS, empty status allowed)
    #[arg(long)]
    set: Option<String>,
    #[arg(long, help = "Detail text for --set")]
    set_info: Option<String>,
    #[arg(long, help = "Required driver for --set")]
    set_kext: Option<String>,
    /// Remove an entry (all three fields) from the first --db file
    #[arg(long)]
    delete_key: Option<String>,
    #[arg(long, short = 's')]
    scan_path: Option<String>,
    #[arg(long, short = 'g')]
    db_glob: Option<String>,
    #[arg(long, short = 'n', default_value_t = 20)]
    top: usize,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    #[arg(long, value_enum, default_value = "lines")]
    text_format: TextFormat,
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long)]
    tsv_path: Option<String>,
    #[arg(long)]
    md_path: Option<String>,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long, default_value_t = false)]
    no_emoji: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    completions_out: Option<String>,
    #[arg(long)]
    config: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            db: vec![],
            id: None,
            model: None,
            ids_file: None,
            name_keyed: false,
            convert: None,
            to: None,
            trim_marker: None,
            splice: None,
            validate: false,
            repair_out: None,
            set: None,
            set_info: None,
            set_kext: None,
            delete_key: None,
            scan_path: None,
            db_glob: None,
            top: 20,
            output: OutputFmt::Text,
            text_format: TextFormat::Lines,
            json_path: None,
            csv_path: None,
            tsv_path: None,
            md_path: None,
            no_color: false,
            force_color: false,
            no_emoji: false,
            log_level: None,
            log_format: None,
            log_path: None,
            verbose: 0,
            quiet: false,
            progress: false,
            completions: None,
            completions_out: None,
            config: None,
        }
    }
}

/// One row of a resolution run: the raw input, the key the lookup used (the
/// extracted or given identifier, or the upper-cased model name), and the
/// match outcome.
#[derive(Clone, Debug, Serialize)]
struct ResolvedItem {
    input: String,
    key: Option<String>,
    result: MatchResult,
}

#[derive(Deserialize)]
struct AppConfig {
    db: Option<Vec<String>>,
    name_keyed: Option<bool>,
    trim_marker: Option<String>,
    db_glob: Option<String>,
    scan_path: Option<String>,
    output: Option<OutputFmt>,
    text_format: Option<TextFormat>,
    top: Option<usize>,
    json_path: Option<String>,
    csv_path: Option<String>,
    tsv_path: Option<String>,
    md_path: Option<String>,
    repair_out: Option<String>,
    progress: Option<bool>,
    force_color: Option<bool>,
    no_emoji: Option<bool>,
    log_format: Option<LogFormat>,
    log_path: Option<String>,
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() {
            if let Ok(mut f) = std::fs::File::create(path) { clap_complete::generate(sh, &mut cmd, "HwCompat", &mut f); } else { clap_complete::generate(sh, &mut cmd, "HwCompat", &mut std::io::stdout()); }
        } else {
            clap_complete::generate(sh, &mut cmd, "HwCompat", &mut std::io::stdout());
        }
        return;
    }
    if let Some(p) = args.config.as_ref()
        && let Ok(s) = std::fs::read_to_string(p)
        && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    else {
        let def = "HwCompat.toml";
        if let Ok(s) = std::fs::read_to_string(def)
            && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    }
    {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if args.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if let Some(lvl) = args.log_level {
            let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
            builder.filter_level(f);
        } else if args.verbose > 0 {
            let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
            builder.filter_level(f);
        }
        if let Some(fmt) = args.log_format {
            match fmt {
                LogFormat::Json => {
                    builder.format(|buf, record| {
                        use std::io::Write;
                        let ts = chrono::Local::now().to_rfc3339();
                        let obj = serde_json::json!({
                            "ts": ts,
                            "level": record.level().to_string(),
                            "target": record.target(),
                            "msg": record.args().to_string(),
                        });
                        writeln!(buf, "{}", obj)
                    });
                }
                LogFormat::Text => {
                    builder.format(|buf, record| {
                        use std::io::Write;
                        let ts = chrono::Local::now().format("%H:%M:%S");
                        writeln!(buf, "[{:<5} {}] {}", record.level(), ts, record.args())
                    });
                }
            }
        }
        if let Some(path) = args.log_path.as_ref() {
            match std::fs::File::create(path) {
                Ok(f) => {
                    builder.target(env_logger::Target::Pipe(Box::new(f)));
                }
                Err(e) => {
                    eprintln!("Failed to open log file {}: {}", path, e);
                }
            }
        }
        builder.init();
    }
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);

    let mut failed = false;
    let mut did_work = false;

    if let Some(id) = args.splice.as_ref() {
        did_work = true;
        failed |= !run_splice(&args, id);
    }
    if let Some(input) = args.convert.as_ref() {
        did_work = true;
        failed |= !run_convert(&args, input);
    }
    if args.validate {
        did_work = true;
        failed |= !run_validate(&args);
    }
    if args.set.is_some() || args.delete_key.is_some() {
        did_work = true;
        failed |= !run_edit(&args);
    }
    if let Some(root) = args.scan_path.as_ref() {
        did_work = true;
        failed |= !run_scan(&args, root);
    }
    if args.id.is_some() || args.model.is_some() || args.ids_file.is_some() {
        did_work = true;
        failed |= !run_resolution(&args);
    }
    if !did_work {
        log::error!("Nothing to do: provide --id/--model/--ids-file, --convert, --splice, --validate or --scan-path (see --help)");
        failed = true;
    }
    if failed { std::process::exit(1); }
}

fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.db.is_empty() && let Some(v) = cfg.db { args.db = v; }
    if let Some(v) = cfg.name_keyed { args.name_keyed = v; }
    if args.trim_marker.is_none() && let Some(v) = cfg.trim_marker { args.trim_marker = Some(v); }
    if args.db_glob.is_none() && let Some(v) = cfg.db_glob { args.db_glob = Some(v); }
    if args.scan_path.is_none() && let Some(v) = cfg.scan_path { args.scan_path = Some(v); }
    if let Some(v) = cfg.output { args.output = v; }
    if let Some(v) = cfg.text_format { args.text_format = v; }
    if args.top == 20 && let Some(v) = cfg.top { args.top = v; }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if args.csv_path.is_none() && let Some(v) = cfg.csv_path { args.csv_path = Some(v); }
    if args.tsv_path.is_none() && let Some(v) = cfg.tsv_path { args.tsv_path = Some(v); }
    if args.md_path.is_none() && let Some(v) = cfg.md_path { args.md_path = Some(v); }
    if args.repair_out.is_none() && let Some(v) = cfg.repair_out { args.repair_out = Some(v); }
    if let Some(v) = cfg.progress { args.progress = v; }
    if let Some(v) = cfg.force_color { args.force_color = v; }
    if let Some(v) = cfg.no_emoji { args.no_emoji = v; }
    if let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
}

fn run_splice(args: &Args, id: &str) -> bool {
    let id = id.trim();
    let device_hex = match id.split_once('&') {
        Some((_, dev)) => dev,
        None => id,
    };
    match identifier::split_bytes_for_splice(device_hex) {
        Ok((high, low)) => {
            match args.output {
                OutputFmt::Json => println!("{}", serde_json::json!({"device": device_hex.to_uppercase(), "high": high, "low": low})),
                OutputFmt::Text => println!("high={} low={}", high, low),
            }
            true
        }
        Err(e) => {
            log::error!("Splice failed: {}", e);
            false
        }
    }
}

fn run_convert(args: &Args, input: &str) -> bool {
    let path = match DevicePath::parse_auto(input) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Path parse failed: {}", e);
            return false;
        }
    };
    let path = match args.trim_marker.as_ref() {
        Some(marker) => path.trim_before_marker(marker),
        None => path,
    };
    // No explicit target flips the PCI dialect; ACPI name segments default
    // to the name-path form.
    let target = match args.to {
        Some(TargetNotation::Enumerator) => Notation::Enumerator,
        Some(TargetNotation::Firmware) => Notation::Firmware,
        Some(TargetNotation::Acpi) => Notation::AcpiNames,
        None => {
            if path.segments().iter().any(|s| matches!(s, PathSegment::AcpiName { .. })) {
                Notation::AcpiNames
            } else if input.trim_start().starts_with("PCIROOT") {
                Notation::Firmware
            } else {
                Notation::Enumerator
            }
        }
    };
    match path.convert(target) {
        Ok(out) => {
            match args.output {
                OutputFmt::Json => println!("{}", serde_json::json!({"input": input, "converted": out})),
                OutputFmt::Text => println!("{}", out),
            }
            true
        }
        Err(e) => {
            log::error!("Path conversion failed: {}", e);
            false
        }
    }
}

fn read_file(path: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))
}

/// Editor-style mutation of the first --db file: the status line plus
/// optional detail/driver lines of one entry.
fn run_edit(args: &Args) -> bool {
    let Some(db_path) = args.db.first() else {
        log::error!("--set/--delete-key need a --db file");
        return false;
    };
    let mut db = match SupportDatabase::load_path(db_path) {
        Ok(db) => db,
        Err(e) => {
            log::error!("Failed to load database {}: {}", db_path, e);
            return false;
        }
    };
    if let Some(spec) = args.set.as_ref() {
        let Some((key, status)) = spec.split_once('=') else {
            log::error!("--set expects KEY=STATUS");
            return false;
        };
        let key = key.trim();
        let status = status.trim();
        if key.is_empty() {
            log::error!("--set key must not be empty");
            return false;
        }
        if !args.name_keyed && !identifier::is_valid_text(key) {
            log::error!("Invalid device ID for --set: {} (expected VVVV&DDDD)", key);
            return false;
        }
        if !status.is_empty() && status != "0" && status != "1" {
            log::error!("Status value must be 0 or 1");
            return false;
        }
        let status = if status.is_empty() { None } else { Some(status) };
        db.insert_record(key, status, args.set_info.as_deref(), args.set_kext.as_deref());
    }
    if let Some(key) = args.delete_key.as_ref()
        && !db.remove_record(key) {
        log::warn!("Key not present: {}", key);
    }
    match db.save_path(db_path) {
        Ok(()) => {
            if !args.quiet { println!("{}", paint(&format!("Database written: {} ({} entries)", db_path, db.len()), "1;36")); }
            true
        }
        Err(e) => {
            log::error!("Database write failed for {}: {}", db_path, e);
            false
        }
    }
}

fn run_validate(args: &Args) -> bool {
    if args.db.is_empty() {
        log::error!("--validate needs at least one --db file");
        return false;
    }
    if args.repair_out.is_some() && args.db.len() > 1 {
        log::warn!("--repair-out applies to the first --db file only");
    }
    let mut clean = true;
    let mut reports = Vec::new();
    let resolution_pending = args.id.is_some() || args.model.is_some() || args.ids_file.is_some();
    for (idx, p) in args.db.iter().enumerate() {
        let content = match read_file(p) {
            Ok(c) => c,
            Err(e) => {
                log::error!("{:#}", e);
                clean = false;
                continue;
            }
        };
        let violations = support_db::validate(&content);
        if !violations.is_empty() { clean = false; }
        match args.output {
            OutputFmt::Json => {
                let rows: Vec<serde_json::Value> = violations
                    .iter()
                    .map(|v| serde_json::json!({"line_no": v.line_no, "kind": v.kind, "message": v.message(), "line": v.line, "repairable": v.kind.repairable()}))
                    .collect();
                reports.push(serde_json::json!({"path": p, "violations": rows}));
            }
            OutputFmt::Text => {
                if violations.is_empty() {
                    if !args.quiet { println!("{}", paint(&format!("{}: format OK", p), "32")); }
                } else {
                    println!("{}", paint(&format!("{}: {} violations", p, violations.len()), "1;31"));
                    for v in &violations { println!("  {}", v); }
                }
            }
        }
        if idx == 0 && !resolution_pending && let Some(out) = args.md_path.as_ref() {
            if let Err(e) = std::fs::write(out, markdown::render_validation(p, &violations)) { log::error!("Markdown write failed for {}: {}", out, e); }
            else if !args.quiet { println!("{}", paint(&format!("Markdown written: {}", out), "1;36")); }
        }
        if idx == 0 && let Some(out) = args.repair_out.as_ref() {
            let (repaired, removed) = support_db::repair(&content);
            match std::fs::write(out, repaired) {
                Ok(()) => { if !args.quiet { println!("{}", paint(&format!("Repaired copy written: {} ({} lines removed)", out, removed), "1;36")); } }
                Err(e) => log::error!("Repair write failed for {}: {}", out, e),
            }
        }
    }
    if let OutputFmt::Json = args.output {
        println!("{}", serde_json::to_string_pretty(&reports).unwrap_or_default());
    }
    clean
}

fn run_scan(args: &Args, root: &str) -> bool {
    let report = db_scan::scan(root, args.db_glob.as_deref(), args.top);
    match args.output {
        OutputFmt::Json => println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default()),
        OutputFmt::Text => {
            if !args.quiet { println!("{}", paint(&format!("Checked {} database files under {}", report.files_checked, root), "1;36")); }
            for (f, c) in &report.by_file {
                println!("{}", paint(&format!("{}: {} violations", f, c), "1;31"));
            }
            for s in &report.samples {
                println!("  {} line {}: {} - {}", s.path, s.line_no, s.message, s.line);
            }
            if report.by_file.is_empty() && !args.quiet { println!("{}", paint("No format violations found", "32")); }
        }
    }
    report.by_file.is_empty()
}

fn load_databases(paths: &[String]) -> SupportDatabase {
    let mut db = SupportDatabase::default();
    for p in paths {
        match std::fs::read_to_string(p) {
            Ok(content) => db.extend_from_text(&content),
            Err(e) => log::warn!("Failed to read database {}: {}", p, e),
        }
    }
    db
}

fn resolve_input(db: &SupportDatabase, input: &str, name_keyed: bool) -> ResolvedItem {
    if name_keyed {
        let result = resolver::resolve_name(db, input);
        return ResolvedItem { input: input.to_string(), key: Some(input.trim().to_uppercase()), result };
    }
    // Bare VVVV&DDDD text first, then token extraction from a full descriptor.
    let key = match identifier::parse(input) {
        Ok(id) => Some(id.to_string()),
        Err(_) => identifier::extract(input).map(|id| id.to_string()),
    };
    match key {
        Some(k) => {
            let result = resolver::resolve_id(db, &k);
            ResolvedItem { input: input.to_string(), key: Some(k), result }
        }
        None => {
            log::debug!("No VEN/DEV tokens in descriptor: {}", input);
            ResolvedItem { input: input.to_string(), key: None, result: MatchResult::no_match() }
        }
    }
}

fn run_resolution(args: &Args) -> bool {
    let db_paths = if args.db.is_empty() {
        std::env::var("HWCOMPAT_DB")
            .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
            .unwrap_or_default()
    } else {
        args.db.clone()
    };
    if db_paths.is_empty() {
        log::warn!("No support database given; every lookup will report unknown");
    }
    let db = load_databases(&db_paths);
    if db.is_empty() && !db_paths.is_empty() {
        log::warn!("Support database is empty; every lookup will report unknown");
    }
    log::info!("Loaded {} database entries from {} file(s)", db.len(), db_paths.len());

    let mut inputs: Vec<(String, bool)> = Vec::new();
    if let Some(id) = args.id.as_ref() { inputs.push((id.clone(), args.name_keyed)); }
    if let Some(m) = args.model.as_ref() { inputs.push((m.clone(), true)); }
    if let Some(f) = args.ids_file.as_ref() {
        match read_file(f) {
            Ok(content) => {
                for line in content.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') { continue; }
                    inputs.push((line.to_string(), args.name_keyed));
                }
            }
            Err(e) => {
                log::error!("{:#}", e);
                return false;
            }
        }
    }

    let pb = if args.progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
    let mut items: Vec<ResolvedItem> = Vec::new();
    for (input, by_name) in inputs {
        if let Some(pb) = &pb { pb.set_message(input.clone()); pb.tick(); }
        items.push(resolve_input(&db, &input, by_name));
    }
    if let Some(pb) = &pb { pb.finish_and_clear(); }

    match args.output {
        OutputFmt::Json => println!("{}", serde_json::to_string_pretty(&items).unwrap_or_default()),
        OutputFmt::Text => match args.text_format {
            TextFormat::Lines => print_lines(&items, args),
            TextFormat::Table => print_table(&items, args),
        },
    }
    if let Some(p) = args.json_path.as_ref() {
        match serde_json::to_string_pretty(&items) {
            Ok(s) => {
                if let Err(e) = std::fs::write(p, s) { log::error!("JSON write failed for {}: {}", p, e); }
                else if !args.quiet { println!("{}", paint(&format!("JSON written: {}", p), "1;36")); }
            }
            Err(e) => log::error!("JSON encode failed: {}", e),
        }
    }
    if let Some(p) = args.csv_path.as_ref() {
        if let Err(e) = write_delimited(p, &items, b',') { log::error!("CSV write failed for {}: {}", p, e); } else if !args.quiet { println!("{}", paint(&format!("CSV written: {}", p), "1;36")); }
    }
    if let Some(p) = args.tsv_path.as_ref() {
        if let Err(e) = write_delimited(p, &items, b'\t') { log::error!("TSV write failed for {}: {}", p, e); } else if !args.quiet { println!("{}", paint(&format!("TSV written: {}", p), "1;36")); }
    }
    if let Some(p) = args.md_path.as_ref() {
        if let Err(e) = std::fs::write(p, markdown::render_report(&items)) { log::error!("Markdown write failed for {}: {}", p, e); } else if !args.quiet { println!("{}", paint(&format!("Markdown written: {}", p), "1;36")); }
    }
    true
}

fn write_delimited(path: &str, items: &[ResolvedItem], delimiter: u8) -> Result<(), std::io::Error> {
    let mut wtr = csv::WriterBuilder::new().delimiter(delimiter).from_path(path)?;
    wtr.write_record(["input", "id", "status", "match", "matched_key", "detail", "driver"])?;
    for it in items {
        wtr.write_record([
            it.input.clone(),
            it.key.clone().unwrap_or_else(|| "N/A".to_string()),
            it.result.status.clone().unwrap_or_default(),
            it.result.kind.as_str().to_string(),
            it.result.matched_key.clone().unwrap_or_default(),
            it.result.detail.clone(),
            it.result.driver.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn print_lines(items: &[ResolvedItem], args: &Args) {
    for it in items {
        let code = status_code(&it.result);
        let key = it.key.as_deref().unwrap_or("N/A");
        let label = status_display(&it.result, !args.no_emoji);
        println!(
            "{}  {}  {}  {}  {}",
            truncate(&it.input, 48),
            paint(key, code),
            paint(&label, code),
            paint(&it.result.detail, code),
            paint(&it.result.driver, code)
        );
    }
    if !args.quiet { print_summary(items); }
}

fn print_table(items: &[ResolvedItem], args: &Args) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let hdr: Vec<String> = ["Input", "ID", "Status", "Detail", "Driver", "Match"]
        .iter()
        .map(|h| paint(h, "1"))
        .collect();
    table.set_header(hdr);
    for it in items {
        let code = status_code(&it.result);
        table.add_row(vec![
            truncate(&it.input, 40),
            paint(it.key.as_deref().unwrap_or("N/A"), code),
            paint(&status_display(&it.result, !args.no_emoji), code),
            paint(&truncate(&it.result.detail, 40), code),
            paint(&truncate(&it.result.driver, 28), code),
            it.result.kind.as_str().to_string(),
        ]);
    }
    println!("{}", table);
    if !args.quiet { print_summary(items); }
}

fn print_summary(items: &[ResolvedItem]) {
    let supported = items.iter().filter(|i| matches!(i.result.status.as_deref(), Some("1"))).count();
    let unsupported = items.iter().filter(|i| matches!(i.result.status.as_deref(), Some(v) if v != "1")).count();
    let unknown = items.len() - supported - unsupported;
    println!(
        "{}",
        paint(
            &format!("{} device(s): {} supported, {} unsupported, {} unknown", items.len(), supported, unsupported, unknown),
            "1;36"
        )
    );
}

fn status_code(res: &MatchResult) -> &'static str {
    match res.status.as_deref() {
        Some("1") if res.kind != MatchKind::Exact => "33",
        Some("1") => "32",
        Some(_) => "31",
        None => "90",
    }
}

fn status_display(res: &MatchResult, emoji: bool) -> String {
    let label = resolver::status_label(res);
    if !emoji { return label.to_string(); }
    let glyph = match res.status.as_deref() {
        Some("1") if res.kind != MatchKind::Exact => "🟠",
        Some("1") => "✅",
        Some(_) => "❌",
        None => "❓",
    };
    format!("{} {}", glyph, label)
}

fn truncate(s: &str, n: usize) -> String {
    let mut out: String = s.chars().take(n).collect();
    if s.chars().count() > n { out.push_str("..."); }
    out
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&true) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args { quiet: true, ..Default::default() }
    }

    fn empty_config() -> AppConfig {
        AppConfig {
            db: None,
            name_keyed: None,
            trim_marker: None,
            db_glob: None,
            scan_path: None,
            output: None,
            text_format: None,
            top: None,
            json_path: None,
            csv_path: None,
            tsv_path: None,
            md_path: None,
            repair_out: None,
            progress: None,
            force_color: None,
            no_emoji: None,
            log_format: None,
            log_path: None,
        }
    }

    #[test]
    fn config_fills_only_defaults() {
        let mut args = base_args();
        args.db = vec!["cli.list".to_string()];
        let cfg = AppConfig {
            db: Some(vec!["cfg.list".to_string()]),
            top: Some(5),
            trim_marker: Some("PEGP".to_string()),
            ..empty_config()
        };
        apply_config(&mut args, cfg);
        assert_eq!(args.db, vec!["cli.list".to_string()]);
        assert_eq!(args.top, 5);
        assert_eq!(args.trim_marker.as_deref(), Some("PEGP"));
    }

    #[test]
    fn config_parses_from_toml() {
        let cfg: AppConfig = toml::from_str("db = [\"GPUSupportInfo.list\"]\ntop = 3\nname_keyed = true\n").unwrap();
        let mut args = base_args();
        apply_config(&mut args, cfg);
        assert_eq!(args.db, vec!["GPUSupportInfo.list".to_string()]);
        assert_eq!(args.top, 3);
        assert!(args.name_keyed);
    }

    #[test]
    fn resolve_input_extracts_from_descriptor() {
        let db = SupportDatabase::from_text("1002&67DF=1\n1002&67DF.kext=WhateverGreen\n");
        let item = resolve_input(&db, "PCI\\VEN_1002&DEV_67DF&SUBSYS_04C81028&REV_E7", false);
        assert_eq!(item.key.as_deref(), Some("1002&67DF"));
        assert_eq!(item.result.kind, MatchKind::Exact);
        assert_eq!(item.result.driver, "WhateverGreen");
    }

    #[test]
    fn resolve_input_without_tokens_is_unknown() {
        let db = SupportDatabase::from_text("1002&67DF=1\n");
        let item = resolve_input(&db, "USB\\VID_046D&PID_C52B", false);
        assert!(item.key.is_none());
        assert_eq!(item.result.kind, MatchKind::None);
    }

    #[test]
    fn resolve_input_name_keyed_uses_name_tiers() {
        let db = SupportDatabase::from_text("*970 EVO=1\n");
        let item = resolve_input(&db, "Samsung SSD 970 EVO 1TB", true);
        assert_eq!(item.result.kind, MatchKind::Fuzzy);
        assert_eq!(item.result.matched_key.as_deref(), Some("*970 EVO"));
    }

    #[test]
    fn delimited_export_writes_rows() {
        let db = SupportDatabase::from_text("1002&67DF=1\n");
        let items = vec![
            resolve_input(&db, "1002&67DF", false),
            resolve_input(&db, "5555&0000", false),
        ];
        let p = std::env::temp_dir().join("hwcompat_test_export.csv");
        write_delimited(&p.to_string_lossy(), &items, b',').unwrap();
        let data = std::fs::read_to_string(&p).unwrap();
        assert_eq!(data.lines().count(), 3);
        assert!(data.lines().next().unwrap().starts_with("input,id,status"));
        assert!(data.contains("1002&67DF,1,exact"));
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn edit_round_trip_on_disk() {
        let p = std::env::temp_dir().join("hwcompat_edit_test.list");
        std::fs::write(&p, "1002&67DF=1\n").unwrap();
        let mut args = base_args();
        args.db = vec![p.to_string_lossy().to_string()];
        args.set = Some("10EC&8168=1".to_string());
        args.set_kext = Some("RealtekRTL8111".to_string());
        assert!(run_edit(&args));
        let data = std::fs::read_to_string(&p).unwrap();
        assert!(data.contains("10EC&8168=1"));
        assert!(data.contains("10EC&8168.kext=RealtekRTL8111"));

        let mut args = base_args();
        args.db = vec![p.to_string_lossy().to_string()];
        args.delete_key = Some("1002&67DF".to_string());
        assert!(run_edit(&args));
        let data = std::fs::read_to_string(&p).unwrap();
        assert!(!data.contains("1002&67DF"));

        let mut args = base_args();
        args.db = vec![p.to_string_lossy().to_string()];
        args.set = Some("not-an-id=1".to_string());
        assert!(!run_edit(&args));
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn status_code_follows_match_quality() {
        let db = SupportDatabase::from_text("1002&FFFF=1\n1002&67DF=1\n10DE&2204=0\n");
        let exact = resolver::resolve_id(&db, "1002&67DF");
        assert_eq!(status_code(&exact), "32");
        let wild = resolver::resolve_id(&db, "1002&9999");
        assert_eq!(status_code(&wild), "33");
        let unsupported = resolver::resolve_id(&db, "10DE&2204");
        assert_eq!(status_code(&unsupported), "31");
        let unknown = resolver::resolve_id(&db, "5555&0000");
        assert_eq!(status_code(&unknown), "90");
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer input string", 8), "a longer...");
    }
}
