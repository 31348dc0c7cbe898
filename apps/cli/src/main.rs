use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use sysmaint_core::{efi_candidates, Drive};
use sysmaint_host_macos::{build_drive_snapshot, system_discovery, DiscoveryConfig};

#[derive(Parser)]
#[command(name = "sysmaint")]
#[command(about = "Drive discovery for macOS maintenance tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log every query and discovery step
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Upper bound in seconds for each system query
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Skip the USB-specific detection step
    #[arg(long, global = true)]
    no_usb_scan: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered drives
    Drives {
        #[arg(long)]
        json: bool,
        #[arg(long)]
        pretty: bool,
    },
    /// List every partition identifier
    Partitions,
    /// List EFI partition candidates
    Efi {
        #[arg(long)]
        json: bool,
    },
    /// Show host OS and machine model
    Host,
    /// Print a full drive snapshot as JSON
    Snapshot {
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = DiscoveryConfig::from_env();
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout_secs(secs);
    }
    if cli.no_usb_scan {
        config.usb_scan = false;
    }
    let discovery = system_discovery(config.clone())?;
    log::debug!(
        "timeout {:?}, usb scan {}",
        discovery.config().command_timeout,
        discovery.config().usb_scan
    );

    match cli.command {
        Commands::Drives { json, pretty } => {
            let drives = discovery.discover_drives();
            if json || pretty {
                print_json(&drives, pretty)?;
            } else {
                print_drive_table(&drives);
            }
        }
        Commands::Partitions => {
            for identifier in discovery.list_partition_identifiers() {
                println!("{}", identifier);
            }
        }
        Commands::Efi { json } => {
            let candidates = efi_candidates(&discovery.discover_drives());
            if json {
                print_json(&candidates, true)?;
            } else if candidates.is_empty() {
                eprintln!("no EFI partitions found");
            } else {
                for candidate in candidates {
                    let location = if candidate.is_internal { "internal" } else { "external" };
                    let mount = if candidate.mount_point.is_empty() {
                        "-"
                    } else {
                        candidate.mount_point.as_str()
                    };
                    println!(
                        "{}\t{}\t{}\t{}\t{}",
                        candidate.identifier, candidate.disk_identifier, location, candidate.name, mount
                    );
                }
            }
        }
        Commands::Host => {
            let host = discovery.host_info();
            println!("os: {}", host.os);
            println!("os_version: {}", host.os_version);
            println!("machine: {}", host.machine);
        }
        Commands::Snapshot { pretty } => {
            print_json(&build_drive_snapshot(&config)?, pretty)?;
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}

fn print_drive_table(drives: &[Drive]) {
    if drives.is_empty() {
        eprintln!("no drives found");
        return;
    }
    println!(
        "{:<12} {:<28} {:<12} {:<22} {:<9} {}",
        "IDENTIFIER", "NAME", "SIZE", "TYPE", "LOCATION", "MOUNT"
    );
    for drive in drives {
        let location = if drive.is_internal { "internal" } else { "external" };
        let efi = if drive.is_efi { " [EFI]" } else { "" };
        let mount = if drive.is_mounted() { drive.mount_point.as_str() } else { "-" };
        println!(
            "{:<12} {:<28} {:<12} {:<22} {:<9} {}{}",
            drive.identifier, drive.name, drive.size, drive.kind, location, mount, efi
        );
        for partition in &drive.partitions {
            let efi = if partition.is_efi { " [EFI]" } else { "" };
            println!(
                "  {:<10} {:<28} {:<12} {:<22} {:<9} {}{}",
                partition.identifier, partition.name, partition.size, partition.kind, "", partition.mount_point, efi
            );
        }
    }
}
