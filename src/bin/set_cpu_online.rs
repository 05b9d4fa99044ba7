use std::io::{Error as IoError, ErrorKind};

use novathor_hotplug_governor::constants::DEFAULT_SYSFS_ROOT;
use novathor_hotplug_governor::cpu_control::{CpuControl, SysfsCpu};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments: program <cpu_index> <on|off> [sysfs_root]
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <cpu_index> <on|off> [sysfs_root]", args[0]);
        eprintln!("  cpu_index: Core to bring online or take offline (cpu0 is fixed online)");
        eprintln!("  sysfs_root: Optional hotplug root (default: {DEFAULT_SYSFS_ROOT})");
        eprintln!();
        eprintln!("Example: sudo {} 1 off", args[0]);
        std::process::exit(1);
    }

    let cpu_index: usize = args[1]
        .parse()
        .map_err(|_| IoError::new(ErrorKind::InvalidInput, "cpu index must be a valid number"))?;

    let target_online = match args[2].as_str() {
        "on" | "1" => true,
        "off" | "0" => false,
        _ => {
            eprintln!("Error: second argument must be on or off");
            std::process::exit(1);
        }
    };

    let sysfs_root = args
        .get(3)
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_SYSFS_ROOT);

    let cpu = SysfsCpu::new(sysfs_root, cpu_index + 1);

    if cpu.is_online(cpu_index) == target_online {
        println!(
            "cpu{cpu_index} is already {}",
            if target_online { "online" } else { "offline" }
        );
        return Ok(());
    }

    if target_online {
        cpu.bring_online(cpu_index)?;
        println!("cpu{cpu_index} brought online");
    } else {
        cpu.take_offline(cpu_index)?;
        println!("cpu{cpu_index} taken offline");
    }

    Ok(())
}
