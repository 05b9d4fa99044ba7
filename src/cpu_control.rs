use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CpuControlError {
    #[error("cpu0 is the boot cpu and cannot be taken offline")]
    BootCpu,
    #[error("cpu{0} is beyond the platform maximum")]
    OutOfRange(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Core park/unpark primitives, provided by the host platform.
///
/// Both hotplug calls block until the transition completes and may be
/// slow; they must only run on a thread that is allowed to sleep.
pub trait CpuControl: Send {
    fn online_count(&self) -> usize;
    fn max_possible(&self) -> usize;
    fn is_online(&self, cpu: usize) -> bool;
    fn bring_online(&self, cpu: usize) -> Result<(), CpuControlError>;
    fn take_offline(&self, cpu: usize) -> Result<(), CpuControlError>;
}

/// Production implementation backed by the Linux CPU hotplug sysfs
/// interface: `<root>/cpuN/online` holds `0` or `1`.
pub struct SysfsCpu {
    root: PathBuf,
    max_cpus: usize,
}

impl SysfsCpu {
    pub fn new(root: impl Into<PathBuf>, max_cpus: usize) -> Self {
        Self {
            root: root.into(),
            max_cpus: max_cpus.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn online_path(&self, cpu: usize) -> PathBuf {
        self.root.join(format!("cpu{cpu}")).join("online")
    }
}

impl CpuControl for SysfsCpu {
    fn online_count(&self) -> usize {
        // cpu0 has no online attribute on most kernels, count it as
        // always online.
        let mut count = 1;
        for cpu in 1..self.max_cpus {
            if self.is_online(cpu) {
                count += 1;
            }
        }
        count
    }

    fn max_possible(&self) -> usize {
        self.max_cpus
    }

    fn is_online(&self, cpu: usize) -> bool {
        if cpu == 0 {
            return true;
        }
        fs::read_to_string(self.online_path(cpu))
            .map(|s| s.trim() == "1")
            .unwrap_or(false)
    }

    fn bring_online(&self, cpu: usize) -> Result<(), CpuControlError> {
        if cpu >= self.max_cpus {
            return Err(CpuControlError::OutOfRange(cpu));
        }
        if cpu == 0 {
            return Ok(());
        }
        fs::write(self.online_path(cpu), "1\n")?;
        Ok(())
    }

    fn take_offline(&self, cpu: usize) -> Result<(), CpuControlError> {
        if cpu == 0 {
            return Err(CpuControlError::BootCpu);
        }
        if cpu >= self.max_cpus {
            return Err(CpuControlError::OutOfRange(cpu));
        }
        fs::write(self.online_path(cpu), "0\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(tag: &str, online: &[&str]) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "novathor-sysfs-{}-{tag}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        for (cpu, value) in online.iter().enumerate() {
            let dir = root.join(format!("cpu{cpu}"));
            fs::create_dir_all(&dir).unwrap();
            if cpu > 0 {
                fs::write(dir.join("online"), format!("{value}\n")).unwrap();
            }
        }
        root
    }

    #[test]
    fn counts_online_cpus() {
        let root = fake_sysfs("count", &["1", "1"]);
        let cpu = SysfsCpu::new(&root, 2);
        assert_eq!(cpu.online_count(), 2);

        fs::write(root.join("cpu1").join("online"), "0\n").unwrap();
        assert_eq!(cpu.online_count(), 1);
    }

    #[test]
    fn toggles_secondary_core() {
        let root = fake_sysfs("toggle", &["1", "1"]);
        let cpu = SysfsCpu::new(&root, 2);

        cpu.take_offline(1).unwrap();
        assert!(!cpu.is_online(1));
        cpu.bring_online(1).unwrap();
        assert!(cpu.is_online(1));
    }

    #[test]
    fn refuses_to_offline_cpu0() {
        let root = fake_sysfs("cpu0", &["1", "1"]);
        let cpu = SysfsCpu::new(&root, 2);
        assert!(matches!(cpu.take_offline(0), Err(CpuControlError::BootCpu)));
        assert!(cpu.is_online(0));
    }

    #[test]
    fn rejects_indices_beyond_the_platform() {
        let root = fake_sysfs("range", &["1", "1"]);
        let cpu = SysfsCpu::new(&root, 2);
        assert!(matches!(
            cpu.bring_online(2),
            Err(CpuControlError::OutOfRange(2))
        ));
        assert!(matches!(
            cpu.take_offline(5),
            Err(CpuControlError::OutOfRange(5))
        ));
    }

    #[test]
    fn missing_online_file_reads_as_offline() {
        let root = fake_sysfs("missing", &["1"]);
        let cpu = SysfsCpu::new(&root, 2);
        assert!(!cpu.is_online(1));
        assert_eq!(cpu.online_count(), 1);
    }
}
