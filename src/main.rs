// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;

use allocation_intake::admin::{AdminPanel, AdminRows, Export, StoreKind};
use allocation_intake::allocation::{category_shares, resolve_labels};
use allocation_intake::config::Config;
use allocation_intake::logging::init_tracing;
use allocation_intake::report::format_brl;
use allocation_intake::upload::{DriveUploader, FileUploader, LocalFile};

const USAGE: &str = "\
Usage:
  allocation-intake                          admin panel (TUI)
  allocation-intake resolve <tier> <band>    preview an allocation
  allocation-intake list <store>             list clients | profiles
  allocation-intake delete <store> <id>      delete one record
  allocation-intake dump <store> <out-file>  SQL dump of a store
  allocation-intake csv <store> <out-file>   CSV export of a table
  allocation-intake upload <file> [folder]   push a file to cloud storage";

fn main() -> Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();

    // Config is read only by commands that touch stores or storage
    match args.get(1).map(String::as_str) {
        None => run_ui_mode(&Config::from_env()?),
        Some("resolve") => run_resolve(arg(&args, 2, "tier")?, arg(&args, 3, "band")?),
        Some("list") => run_list(&Config::from_env()?, store_arg(&args)?),
        Some("delete") => {
            let id: i64 = arg(&args, 3, "id")?
                .parse()
                .with_context(|| format!("record id must be a number, got {:?}", args[3]))?;
            run_delete(&Config::from_env()?, store_arg(&args)?, id)
        }
        Some("dump") => {
            let panel = open_panel(&Config::from_env()?)?;
            let export = panel.export_dump(store_arg(&args)?)?;
            write_export(&export, Path::new(arg(&args, 3, "out-file")?))
        }
        Some("csv") => {
            let panel = open_panel(&Config::from_env()?)?;
            let export = panel.export_csv(store_arg(&args)?)?;
            write_export(&export, Path::new(arg(&args, 3, "out-file")?))
        }
        Some("upload") => run_upload(&Config::from_env()?, arg(&args, 2, "file")?, args.get(3).map(String::as_str)),
        Some("help") | Some("--help") | Some("-h") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => {
            eprintln!("❌ Unknown command: {}\n", other);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    match args.get(index) {
        Some(value) => Ok(value.as_str()),
        None => bail!("missing <{}>\n\n{}", name, USAGE),
    }
}

fn store_arg(args: &[String]) -> Result<StoreKind> {
    arg(args, 2, "store")?.parse::<StoreKind>().map_err(anyhow::Error::msg)
}

fn open_panel(config: &Config) -> Result<AdminPanel> {
    let panel = AdminPanel::from_config(config);
    panel.ensure_schemas().context("could not prepare record stores")?;
    Ok(panel)
}

fn run_resolve(tier: &str, band: &str) -> Result<()> {
    let (tier, band, breakdown) = resolve_labels(tier, band)?;

    println!("📊 Allocation: {} / {}", tier, band);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Total net worth: {}", format_brl(breakdown.total_net_worth));
    for share in category_shares(&breakdown) {
        println!("  {:<32} {:>18}  ({:.1}%)", share.label, format_brl(share.amount), share.percent);
    }

    Ok(())
}

fn run_list(config: &Config, kind: StoreKind) -> Result<()> {
    let panel = open_panel(config)?;
    let rows = panel.list(kind)?;

    println!("🗂️  {} ({} records)", panel.store(kind).file_name(), rows.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match rows {
        AdminRows::Clients(rows) => {
            for row in rows {
                let r = row.record;
                println!(
                    "#{:<5} {:<24} {:<28} {:<13} {:>5}  {}",
                    row.id,
                    r.name,
                    r.email,
                    r.tier,
                    r.capital_band,
                    format_brl(r.breakdown.total_net_worth)
                );
            }
        }
        AdminRows::Profiles(rows) => {
            for row in rows {
                let r = row.record;
                println!(
                    "#{:<5} {:<24} {:<20} {:<14} {}",
                    row.id, r.company_name, r.contact_name, r.city, r.email
                );
            }
        }
    }

    Ok(())
}

fn run_delete(config: &Config, kind: StoreKind, id: i64) -> Result<()> {
    let panel = open_panel(config)?;

    if panel.delete(kind, id)? {
        println!("✓ Deleted {} #{}", kind, id);
    } else {
        println!("✓ Nothing to delete: {} #{} does not exist", kind, id);
    }
    Ok(())
}

fn write_export(export: &Export, out: &Path) -> Result<()> {
    std::fs::write(out, &export.bytes).with_context(|| format!("could not write {}", out.display()))?;

    println!("💾 Exported {} bytes → {}", export.bytes.len(), out.display());
    println!("   sha256: {}", export.sha256);
    Ok(())
}

fn run_upload(config: &Config, file: &str, folder: Option<&str>) -> Result<()> {
    let path = Path::new(file);
    if !path.is_file() {
        bail!("file not found: {}", path.display());
    }

    let uploader = DriveUploader::new(config.drive_upload_url.clone(), config.google_token_path.clone());
    let local = LocalFile::new(path);
    let folder = folder.or(config.drive_folder_id.as_deref());

    println!("☁️  Uploading {} ...", local.name);
    let runtime = tokio::runtime::Runtime::new()?;
    let remote_id = runtime.block_on(uploader.upload(&local, folder))?;

    println!("✓ File uploaded, id: {}", remote_id);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    println!("🖥️  Loading admin panel...\n");

    let panel = open_panel(config)?;
    let export_dir = env::current_dir()?;
    let mut app = ui::App::new(panel, export_dir)?;

    println!("Starting UI... (Press 'q' to quit)\n");
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use a subcommand:\n\n{}", USAGE);
    std::process::exit(1);
}
