use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::lifecycle::HotplugGovernor;
use crate::tunables::{TUNABLE_NAMES, TunableStore};

/// File-based attribute transport: one file per tunable plus a `power`
/// file accepting the tokens `suspend` and `resume`.
///
/// The daemon polls the files for external writes, applies the store's
/// silent-clamp policy and rewrites each file with the canonical value,
/// so a read always sees the effective setting.
pub struct ControlDir {
    dir: PathBuf,
}

impl ControlDir {
    pub fn init(dir: impl Into<PathBuf>, tunables: &TunableStore) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        for name in TUNABLE_NAMES {
            let value = tunables.show(name).unwrap_or_default();
            fs::write(dir.join(name), format!("{value}\n"))?;
        }
        fs::write(dir.join("power"), "")?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pick up external writes to the tunable files.
    pub fn poll_tunables(&self, tunables: &TunableStore) {
        for name in TUNABLE_NAMES {
            let path = self.dir.join(name);
            let Ok(text) = fs::read_to_string(&path) else {
                continue;
            };
            let Some(current) = tunables.show(name) else {
                continue;
            };
            if text.trim() == current {
                continue;
            }
            tunables.store(name, &text);
            // Rejected writes get the prior value back.
            let canonical = tunables.show(name).unwrap_or(current);
            if let Err(e) = fs::write(&path, format!("{canonical}\n")) {
                log::warn!("failed to rewrite {name}: {e}");
            }
        }
    }

    /// Dispatch pending power transitions. The file is a stand-in for
    /// the kernel's sleep notification hook; a systemd sleep hook can
    /// write it.
    pub fn poll_power(&self, governor: &HotplugGovernor) {
        let path = self.dir.join("power");
        let Ok(text) = fs::read_to_string(&path) else {
            return;
        };
        let request = text.trim();
        if request.is_empty() {
            return;
        }
        match request {
            "suspend" => governor.notify_suspend(),
            "resume" => governor.notify_resume(),
            other => log::warn!("unknown power request {other:?}"),
        }
        if let Err(e) = fs::write(&path, "") {
            log::warn!("failed to clear power file: {e}");
        }
    }
}
