//! `/proc`-backed access to a running process.

use std::fs::{self, File};
use std::io;
use std::os::unix::fs::FileExt;

use tracing::debug;

use crate::{ProcessMemory, TargetError, TargetResult};

/// Memory handle on a live process, opened through `/proc/<pid>/mem`.
#[derive(Debug)]
pub struct LinuxProcess {
    pid: i32,
    mem: File,
    base: u64,
}

impl LinuxProcess {
    /// Opens `pid` and resolves the load address of `module`.
    ///
    /// With no module the first mapping of the process is used. The address is
    /// looked up on every attach since it moves between runs.
    pub fn attach(pid: i32, module: Option<&str>) -> TargetResult<Self> {
        let attach_err = |reason: String| TargetError::Attach { pid, reason };

        let maps = fs::read_to_string(format!("/proc/{pid}/maps"))
            .map_err(|err| attach_err(format!("reading maps: {err}")))?;
        let base = resolve_base(&maps, module).ok_or_else(|| {
            attach_err(match module {
                Some(module) => format!("module `{module}` is not mapped"),
                None => "process has no mappings".to_string(),
            })
        })?;
        let mem = File::open(format!("/proc/{pid}/mem"))
            .map_err(|err| attach_err(format!("opening memory: {err}")))?;

        debug!(pid, base = format_args!("{base:#x}"), "attached to process");
        Ok(Self { pid, mem, base })
    }

    /// Load address the register offset is relative to.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Process id.
    pub fn pid(&self) -> i32 {
        self.pid
    }
}

impl ProcessMemory for LinuxProcess {
    fn read(&mut self, address: u64, buf: &mut [u8]) -> io::Result<()> {
        self.mem.read_exact_at(buf, address)
    }

    fn terminate(&mut self) -> io::Result<()> {
        // SAFETY: kill(2) takes plain integers and has no memory-safety
        // requirements.
        let rc = unsafe { libc::kill(self.pid, libc::SIGKILL) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(err)
        }
    }
}

/// Finds the start address of the first mapping whose path ends with `module`
/// in `/proc/<pid>/maps` text, or of the first mapping at all when `module` is
/// `None`.
pub fn resolve_base(maps: &str, module: Option<&str>) -> Option<u64> {
    maps.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let range = fields.next()?;
        let path = fields.nth(4);
        let matches = match module {
            None => true,
            Some(module) => path.is_some_and(|path| {
                path == module || path.rsplit('/').next() == Some(module)
            }),
        };
        if !matches {
            return None;
        }
        let (start, _) = range.split_once('-')?;
        u64::from_str_radix(start, 16).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = "\
55d0c0a00000-55d0c0a02000 r--p 00000000 08:01 393229   /usr/bin/cat
55d0c0a02000-55d0c0a07000 r-xp 00002000 08:01 393229   /usr/bin/cat
7f2b3c000000-7f2b3c021000 rw-p 00000000 00:00 0
7f2b3d400000-7f2b3d428000 r--p 00000000 08:01 400123   /opt/emu/libgambatte.so
7f2b3d428000-7f2b3d5bd000 r-xp 00028000 08:01 400123   /opt/emu/libgambatte.so
7ffd1e7d1000-7ffd1e7f2000 rw-p 00000000 00:00 0        [stack]
";

    #[test]
    fn first_mapping_without_module() {
        assert_eq!(resolve_base(MAPS, None), Some(0x55d0_c0a0_0000));
    }

    #[test]
    fn module_by_file_name_or_full_path() {
        assert_eq!(
            resolve_base(MAPS, Some("libgambatte.so")),
            Some(0x7f2b_3d40_0000)
        );
        assert_eq!(
            resolve_base(MAPS, Some("/opt/emu/libgambatte.so")),
            Some(0x7f2b_3d40_0000)
        );
    }

    #[test]
    fn anonymous_mappings_never_match_a_module() {
        assert_eq!(resolve_base(MAPS, Some("libsdl.so")), None);
        assert_eq!(resolve_base("", None), None);
    }

    #[test]
    fn attach_to_missing_process_fails() {
        let err = LinuxProcess::attach(i32::MAX, None).expect_err("no such pid");
        assert!(matches!(err, TargetError::Attach { pid, .. } if pid == i32::MAX));
    }

    #[test]
    fn reads_own_memory() {
        let marker: [u8; 6] = *b"lockst";
        let mut me = LinuxProcess::attach(std::process::id() as i32, None).expect("attach self");
        let mut buf = [0u8; 6];
        me.read(marker.as_ptr() as u64, &mut buf).expect("read self");
        assert_eq!(buf, marker);
    }
}
