use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::constants::DEFAULT_PROC_STAT;

/// Load measurement collaborator. `sample` returns a percentage in
/// 0..=100, already averaged over whatever window the implementation
/// keeps internally.
pub trait LoadSampler: Send {
    fn sample(&mut self) -> io::Result<u32>;
}

/// CPU utilization from `/proc/stat` deltas between consecutive calls.
///
/// `cpu = None` samples the aggregate line, `Some(n)` a single core.
pub struct ProcStatSampler {
    path: PathBuf,
    cpu: Option<usize>,
    prev_idle: u64,
    prev_total: u64,
}

impl ProcStatSampler {
    pub fn new(cpu: Option<usize>) -> Self {
        Self::with_path(DEFAULT_PROC_STAT, cpu)
    }

    pub fn with_path(path: impl Into<PathBuf>, cpu: Option<usize>) -> Self {
        Self {
            path: path.into(),
            cpu,
            prev_idle: 0,
            prev_total: 0,
        }
    }
}

impl LoadSampler for ProcStatSampler {
    fn sample(&mut self) -> io::Result<u32> {
        let stat = fs::read_to_string(&self.path)?;
        let prefix = match self.cpu {
            Some(n) => format!("cpu{n} "),
            None => "cpu ".to_string(),
        };
        let line = stat
            .lines()
            .find(|l| l.starts_with(&prefix))
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidData, "cpu line missing"))?;

        // cpu  user nice system idle iowait irq softirq steal guest guest_nice
        let nums: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .filter_map(|s| s.parse::<u64>().ok())
            .collect();
        if nums.len() < 5 {
            return Err(io::Error::new(ErrorKind::InvalidData, "truncated cpu line"));
        }

        // idle = idle + iowait
        let idle = nums[3] + nums[4];
        let total: u64 = nums.iter().sum();

        // First reading has no baseline yet.
        if self.prev_total == 0 {
            self.prev_idle = idle;
            self.prev_total = total;
            return Ok(0);
        }

        let diff_idle = idle.saturating_sub(self.prev_idle);
        let diff_total = total.saturating_sub(self.prev_total);
        self.prev_idle = idle;
        self.prev_total = total;

        if diff_total == 0 {
            return Ok(0);
        }
        let busy = diff_total - diff_idle.min(diff_total);
        Ok(((busy * 100) / diff_total).min(100) as u32)
    }
}

/// Standalone sensor exporting the sampled load percentage to a file,
/// for external consumers that want the measurement without the governor.
pub struct LoadSensor {
    sensor_path: PathBuf,
    update_interval: Duration,
    sampler: ProcStatSampler,
}

impl LoadSensor {
    pub fn new(sensor_path: impl Into<PathBuf>, update_interval_ms: u64, cpu: Option<usize>) -> Self {
        Self {
            sensor_path: sensor_path.into(),
            update_interval: Duration::from_millis(update_interval_ms),
            sampler: ProcStatSampler::new(cpu),
        }
    }

    /// Write the load value atomically via a temporary file and rename,
    /// so readers never observe a partial write.
    pub fn write_sensor_value(&self, load: u32) -> io::Result<()> {
        if let Some(parent) = Path::new(&self.sensor_path).parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.sensor_path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(format!("{load}\n").as_bytes())?;
        file.flush()?;
        fs::rename(&temp_path, &self.sensor_path)?;
        Ok(())
    }

    pub fn run(&mut self, running: &AtomicBool) -> io::Result<()> {
        println!("cpu load sensor started");
        println!("output file: {}", self.sensor_path.display());
        println!("interval: {:?}", self.update_interval);

        while running.load(Ordering::Relaxed) {
            match self.sampler.sample() {
                Ok(load) => {
                    if let Err(e) = self.write_sensor_value(load) {
                        eprintln!("sensor write failed: {e}");
                    }
                }
                Err(e) => eprintln!("load sample failed: {e}"),
            }
            thread::sleep(self.update_interval);
        }
        Ok(())
    }
}
