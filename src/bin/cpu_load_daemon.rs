use std::env;
use std::process;

use novathor_hotplug_governor::load_monitor::LoadSensor;

fn print_usage() {
    println!("CPU Load Daemon - export the sampled load percentage to a file");
    println!();
    println!("Usage:");
    println!("  cpu_load_daemon [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --path <path>       Sensor file path (default: /run/cpu-load/load)");
    println!("  --interval <ms>     Update interval in ms (default: 1000)");
    println!("  --cpu <index>       Core to sample, -1 for the aggregate (default: -1)");
    println!("  --help              Show this help");
    println!();
    println!("Examples:");
    println!("  sudo cpu_load_daemon");
    println!("  sudo cpu_load_daemon --path /tmp/cpu-load --interval 500 --cpu 0");
    println!();
    println!("The sensor file contains one integer percentage per update.");
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut sensor_path = "/run/cpu-load/load".to_string();
    let mut interval_ms = 1000u64;
    let mut sample_cpu: Option<usize> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--path" => {
                if i + 1 < args.len() {
                    sensor_path = args[i + 1].clone();
                    i += 1;
                } else {
                    eprintln!("Error: --path requires an argument");
                    process::exit(1);
                }
            }
            "--interval" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse() {
                        Ok(val) => interval_ms = val,
                        Err(_) => {
                            eprintln!("Error: invalid interval");
                            process::exit(1);
                        }
                    }
                    i += 1;
                } else {
                    eprintln!("Error: --interval requires an argument");
                    process::exit(1);
                }
            }
            "--cpu" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse::<i64>() {
                        Ok(val) if val < 0 => sample_cpu = None,
                        Ok(val) => sample_cpu = Some(val as usize),
                        Err(_) => {
                            eprintln!("Error: invalid cpu index");
                            process::exit(1);
                        }
                    }
                    i += 1;
                } else {
                    eprintln!("Error: --cpu requires an argument");
                    process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!();
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    if sensor_path.starts_with("/run") {
        println!("writing under /run (usually needs root privileges)");
    }

    let running = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        println!("\nstopping daemon...");
        r.store(false, std::sync::atomic::Ordering::Relaxed);
    })
    .expect("Error setting up the Ctrl+C handler");

    let mut sensor = LoadSensor::new(&sensor_path, interval_ms, sample_cpu);
    if let Err(e) = sensor.run(&running) {
        eprintln!("fatal error: {e}");
        process::exit(1);
    }
}
