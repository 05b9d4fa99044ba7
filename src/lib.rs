// Public modules
pub mod control;
pub mod cpu_control;
pub mod evaluator;
pub mod governor;
pub mod lifecycle;
pub mod load_monitor;
pub mod power;
pub mod status;
pub mod tunables;

// Re-export constants commonly used
pub mod constants {
    pub const DEFAULT_LOAD_THRESHOLD: u32 = 50;
    pub const DEFAULT_HIGH_LOAD_THRESHOLD: u32 = 90;
    pub const DEFAULT_COUNTER_THRESHOLD: u32 = 10;
    pub const DEFAULT_UP_TIMER_THRESHOLD: u32 = 1;
    pub const DEFAULT_WORK_DELAY: u32 = 10;

    pub const DEFAULT_BASE_PERIOD_MS: u64 = 100;
    pub const DEFAULT_INIT_DELAY_MS: u64 = 20_000;
    pub const DEFAULT_RESUME_DELAY_MS: u64 = 1_000;
    pub const DEFAULT_MIN_ACTION_INTERVAL_US: u64 = 2_000_000;
    pub const DEFAULT_CONTROL_POLL_MS: u64 = 500;

    pub const DEFAULT_MAX_CPUS: usize = 2;
    pub const DEFAULT_SYSFS_ROOT: &str = "/sys/devices/system/cpu";
    pub const DEFAULT_PROC_STAT: &str = "/proc/stat";
    pub const DEFAULT_CONTROL_DIR: &str = "/run/novathor-hotplug";
}
