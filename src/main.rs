use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use toml::Table;

use novathor_hotplug_governor::{
    constants::*,
    control::ControlDir,
    cpu_control::SysfsCpu,
    governor::{Timing, Tunables},
    lifecycle::HotplugGovernor,
    load_monitor::ProcStatSampler,
    status,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let config = std::env::args()
        .nth(1)
        .map(std::fs::read_to_string)
        .unwrap_or(Ok("".to_string()))?
        .parse::<Table>()?;

    let timing = config.get("timing").and_then(|t| t.as_table());
    // ms
    let base_period_ms: u64 = timing
        .and_then(|t| t.get("base-period-ms"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| v.is_positive().then_some(v).ok_or("must be positive"))
        .and_then(|v| {
            u64::try_from(v).map_err(|_| &*format!("cannot be greater than {}", u64::MAX).leak())
        })
        .unwrap_or_else(|s| {
            println!("timing.base-period-ms {s}, replaced with the default value of 100 ms");
            DEFAULT_BASE_PERIOD_MS
        });
    // ms - warm-up before the first evaluation
    let init_delay_ms: u64 = timing
        .and_then(|t| t.get("init-delay-ms"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| v.is_positive().then_some(v).ok_or("must be positive"))
        .and_then(|v| {
            u64::try_from(v).map_err(|_| &*format!("cannot be greater than {}", u64::MAX).leak())
        })
        .unwrap_or_else(|s| {
            println!("timing.init-delay-ms {s}, replaced with the default value of 20 s");
            DEFAULT_INIT_DELAY_MS
        });
    // ms
    let resume_delay_ms: u64 = timing
        .and_then(|t| t.get("resume-delay-ms"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| v.is_positive().then_some(v).ok_or("must be positive"))
        .and_then(|v| {
            u64::try_from(v).map_err(|_| &*format!("cannot be greater than {}", u64::MAX).leak())
        })
        .unwrap_or_else(|s| {
            println!("timing.resume-delay-ms {s}, replaced with the default value of 1 s");
            DEFAULT_RESUME_DELAY_MS
        });
    // us - dwell between actions with one core online
    let min_action_interval_us: u64 = timing
        .and_then(|t| t.get("min-action-interval-us"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| {
            (!v.is_negative())
                .then_some(v)
                .ok_or("must not be negative")
        })
        .and_then(|v| {
            u64::try_from(v).map_err(|_| &*format!("cannot be greater than {}", u64::MAX).leak())
        })
        .unwrap_or_else(|s| {
            println!("timing.min-action-interval-us {s}, replaced with the default value of 2 s");
            DEFAULT_MIN_ACTION_INTERVAL_US
        });
    // ms - how often the control files are polled
    let control_poll_ms: u64 = timing
        .and_then(|t| t.get("control-poll-ms"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| v.is_positive().then_some(v).ok_or("must be positive"))
        .and_then(|v| {
            u64::try_from(v).map_err(|_| &*format!("cannot be greater than {}", u64::MAX).leak())
        })
        .unwrap_or_else(|s| {
            println!("timing.control-poll-ms {s}, replaced with the default value of 500 ms");
            DEFAULT_CONTROL_POLL_MS
        });

    let thresholds = config.get("thresholds").and_then(|t| t.as_table());
    // percentage (0-100)
    let load_threshold: u32 = thresholds
        .and_then(|t| t.get("load"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| {
            (0..=100)
                .contains(&v)
                .then_some(v)
                .ok_or("must be between 0 and 100")
        })
        .map(|v| v as u32)
        .unwrap_or_else(|s| {
            println!("thresholds.load {s}, replaced with the default value of 50%");
            DEFAULT_LOAD_THRESHOLD
        });
    // percentage (0-100)
    let high_load_threshold: u32 = thresholds
        .and_then(|t| t.get("high-load"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| {
            (0..=100)
                .contains(&v)
                .then_some(v)
                .ok_or("must be between 0 and 100")
        })
        .map(|v| v as u32)
        .unwrap_or_else(|s| {
            println!("thresholds.high-load {s}, replaced with the default value of 90%");
            DEFAULT_HIGH_LOAD_THRESHOLD
        });
    let high_load_threshold = if high_load_threshold < load_threshold {
        println!("thresholds.high-load can't be less than thresholds.load, clamping");
        load_threshold
    } else {
        high_load_threshold
    };
    // cycles
    let counter_threshold: u32 = thresholds
        .and_then(|t| t.get("counter"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| {
            (0..=100)
                .contains(&v)
                .then_some(v)
                .ok_or("must be between 0 and 100")
        })
        .map(|v| v as u32)
        .unwrap_or_else(|s| {
            println!("thresholds.counter {s}, replaced with the default value of 10 cycles");
            DEFAULT_COUNTER_THRESHOLD
        });
    // cycles
    let up_timer_threshold: u32 = thresholds
        .and_then(|t| t.get("up-timer"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| {
            (0..=100)
                .contains(&v)
                .then_some(v)
                .ok_or("must be between 0 and 100")
        })
        .map(|v| v as u32)
        .unwrap_or_else(|s| {
            println!("thresholds.up-timer {s}, replaced with the default value of 1 cycle");
            DEFAULT_UP_TIMER_THRESHOLD
        });
    // period multiplier
    let work_delay: u32 = thresholds
        .and_then(|t| t.get("work-delay"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| {
            (0..=100)
                .contains(&v)
                .then_some(v)
                .ok_or("must be between 0 and 100")
        })
        .map(|v| v as u32)
        .unwrap_or_else(|s| {
            println!("thresholds.work-delay {s}, replaced with the default value of 10");
            DEFAULT_WORK_DELAY
        });

    let cpu_table = config.get("cpu").and_then(|t| t.as_table());
    let max_cpus: usize = cpu_table
        .and_then(|t| t.get("max-cpus"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .and_then(|v| v.is_positive().then_some(v).ok_or("must be positive"))
        .and_then(|v| {
            usize::try_from(v)
                .map_err(|_| &*format!("cannot be greater than {}", usize::MAX).leak())
        })
        .unwrap_or_else(|s| {
            println!("cpu.max-cpus {s}, replaced with the default value of 2");
            DEFAULT_MAX_CPUS
        });
    let sysfs_root: String = cpu_table
        .and_then(|t| t.get("sysfs-root"))
        .ok_or("is missing")
        .and_then(|v| v.as_str().ok_or("must be a string"))
        .map(|v| v.to_string())
        .unwrap_or_else(|s| {
            println!("cpu.sysfs-root {s}, replaced with the default of {DEFAULT_SYSFS_ROOT}");
            DEFAULT_SYSFS_ROOT.to_string()
        });
    // cpu index sampled for load; negative samples the aggregate line
    let sample_cpu: Option<usize> = cpu_table
        .and_then(|t| t.get("sample-cpu"))
        .ok_or("is missing")
        .and_then(|v| v.as_integer().ok_or("must be an integer"))
        .map(|v| usize::try_from(v).ok())
        .unwrap_or_else(|s| {
            println!("cpu.sample-cpu {s}, replaced with the default of cpu0");
            Some(0)
        });

    let paths = config.get("paths").and_then(|t| t.as_table());
    let control_dir: String = paths
        .and_then(|t| t.get("control-dir"))
        .ok_or("is missing")
        .and_then(|v| v.as_str().ok_or("must be a string"))
        .map(|v| v.to_string())
        .unwrap_or_else(|s| {
            println!("paths.control-dir {s}, replaced with the default of {DEFAULT_CONTROL_DIR}");
            DEFAULT_CONTROL_DIR.to_string()
        });

    let timing = Timing {
        base_period: Duration::from_millis(base_period_ms),
        init_delay: Duration::from_millis(init_delay_ms),
        resume_delay: Duration::from_millis(resume_delay_ms),
        min_action_interval: Duration::from_micros(min_action_interval_us),
    };
    // Seed values only: tunables reset to these on every restart,
    // nothing is persisted.
    let tunables = Tunables {
        load_threshold,
        high_load_threshold,
        counter_threshold,
        up_timer_threshold,
        work_delay,
    };

    let cpu = SysfsCpu::new(&sysfs_root, max_cpus);
    let sampler = ProcStatSampler::new(sample_cpu);
    let (governor, mut status_rx) =
        HotplugGovernor::start(Box::new(cpu), Box::new(sampler), timing, tunables)?;
    let control = ControlDir::init(&control_dir, governor.tunables())?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::Relaxed);
    })?;

    let status_path = control.dir().join("status.json");
    let load_path = control.dir().join("load");
    let jh_status: JoinHandle<()> = std::thread::spawn(move || {
        loop {
            let snapshot = status_rx.wait();
            if let Err(e) = status::write_status_file(&status_path, &snapshot) {
                log::warn!("status export failed: {e}");
            }
            if let Err(e) = status::write_load_file(&load_path, snapshot.last_load) {
                log::warn!("load export failed: {e}");
            }
            if !snapshot.running {
                break;
            }
        }
    });

    log::info!(
        "governor started, {max_cpus} possible cpus, control dir {}",
        control.dir().display()
    );

    let control_poll = Duration::from_millis(control_poll_ms);
    while running.load(Ordering::Relaxed) {
        control.poll_tunables(governor.tunables());
        control.poll_power(&governor);
        std::thread::sleep(control_poll);
    }

    log::info!("shutting down");
    governor.shutdown();
    let _ = jh_status.join();
    Ok(())
}
