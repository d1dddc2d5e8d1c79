use crate::constants::{MAX_SPARSE_LENGTH, ZERO_FILL_CHUNK};
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

/// How disk space is reserved when a file is first created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreallocationMode {
    /// Leave the file empty until data is written.
    None,
    /// Set the file's length without reserving blocks.
    #[default]
    Sparse,
    /// Reserve every block up front.
    Full,
}

/// One way of bringing a file to its target length.
///
/// A [`PreallocationMode`] expands into an ordered plan of steps; the first
/// step that succeeds ends the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocStep {
    /// Nothing to reserve for a zero-length file.
    Skip,
    /// Extend the file's length, leaving a hole.
    ExtendSparse,
    /// Seek to the last byte, write a zero, then truncate to length.
    SeekAndWrite,
    /// Ask the filesystem to reserve the blocks.
    Reserve,
    /// Write zero-filled chunks until the length is reached.
    ZeroFill,
}

impl PreallocationMode {
    /// The steps tried, in order, for a file of `length` bytes.
    pub fn plan(self, length: u64) -> &'static [AllocStep] {
        match self {
            Self::None => &[],
            Self::Sparse if length == 0 => &[AllocStep::Skip],
            Self::Sparse => &[AllocStep::ExtendSparse, AllocStep::SeekAndWrite],
            Self::Full => &[AllocStep::Reserve, AllocStep::ZeroFill],
        }
    }
}

impl AllocStep {
    pub fn apply(self, file: &mut File, length: u64) -> io::Result<()> {
        match self {
            Self::Skip => Ok(()),
            Self::ExtendSparse => file.set_len(length),
            Self::SeekAndWrite => seek_and_write(file, length),
            Self::Reserve => reserve(file, length),
            Self::ZeroFill => zero_fill(file, length),
        }
    }
}

/// Runs `plan` against `file`, returning true as soon as one step succeeds.
///
/// `attempt` performs each step; production code passes [`AllocStep::apply`].
pub(crate) fn run_plan<F>(file: &mut File, plan: &[AllocStep], length: u64, mut attempt: F) -> bool
where
    F: FnMut(AllocStep, &mut File, u64) -> io::Result<()>,
{
    for &step in plan {
        match attempt(step, file, length) {
            Ok(()) => return true,
            Err(e) => tracing::debug!(?step, length, "preallocation step failed: {}", e),
        }
    }
    false
}

/// Makes an already-open writable file `length` bytes long without writing data.
pub fn preallocate_sparse(file: &mut File, length: u64) -> bool {
    run_plan(file, PreallocationMode::Sparse.plan(length), length, AllocStep::apply)
}

/// Creates `path` if needed and reserves `length` bytes of disk for it.
pub fn preallocate_full(path: &Path, length: u64) -> bool {
    let mut file = match OpenOptions::new().write(true).create(true).truncate(false).open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!("couldn't open \"{}\" to preallocate: {}", path.display(), e);
            return false;
        }
    };

    run_plan(&mut file, PreallocationMode::Full.plan(length), length, AllocStep::apply)
}

fn seek_and_write(file: &mut File, length: u64) -> io::Result<()> {
    debug_assert!(length < MAX_SPARSE_LENGTH, "sparse length must fit a signed offset");

    let Some(last) = length.checked_sub(1) else {
        return Ok(());
    };

    file.seek(SeekFrom::Start(last))?;
    file.write_all(&[0])?;
    file.set_len(length)?;
    file.rewind()?;
    Ok(())
}

fn zero_fill<W: Write>(file: &mut W, length: u64) -> io::Result<()> {
    let buf = [0u8; ZERO_FILL_CHUNK];
    let mut remaining = length;

    while remaining > 0 {
        let pass = remaining.min(ZERO_FILL_CHUNK as u64) as usize;
        let written = file.write(&buf[..pass])?;
        if written != pass {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", written, pass),
            ));
        }
        remaining -= pass as u64;
    }

    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn reserve(file: &mut File, length: u64) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let len = libc::off_t::try_from(length)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds off_t"))?;

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let code = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, len) };
    if code == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(code))
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
fn reserve(_file: &mut File, _length: u64) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "block reservation is not available on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn native_rejected(step: AllocStep, file: &mut File, length: u64) -> io::Result<()> {
        match step {
            AllocStep::ExtendSparse | AllocStep::Reserve => {
                Err(io::Error::new(io::ErrorKind::Unsupported, "rejected"))
            }
            _ => step.apply(file, length),
        }
    }

    #[test]
    fn test_plans() {
        assert!(PreallocationMode::None.plan(100).is_empty());
        assert_eq!(PreallocationMode::Sparse.plan(0), &[AllocStep::Skip]);
        assert_eq!(
            PreallocationMode::Sparse.plan(1),
            &[AllocStep::ExtendSparse, AllocStep::SeekAndWrite]
        );
        assert_eq!(
            PreallocationMode::Full.plan(0),
            &[AllocStep::Reserve, AllocStep::ZeroFill]
        );
    }

    #[test]
    fn test_sparse_zero_length_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.dat");
        let mut file = File::create(&path).unwrap();

        let mut calls = Vec::new();
        let ok = run_plan(&mut file, PreallocationMode::Sparse.plan(0), 0, |step, f, len| {
            calls.push(step);
            step.apply(f, len)
        });

        assert!(ok);
        assert_eq!(calls, vec![AllocStep::Skip]);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_sparse_native() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sparse.dat");
        let mut file = File::create(&path).unwrap();

        assert!(preallocate_sparse(&mut file, 65536));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 65536);
    }

    #[test]
    fn test_sparse_fallback_when_native_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fallback.dat");
        let mut file = File::create(&path).unwrap();

        let mut calls = Vec::new();
        let ok = run_plan(
            &mut file,
            PreallocationMode::Sparse.plan(10_000),
            10_000,
            |step, f, len| {
                calls.push(step);
                native_rejected(step, f, len)
            },
        );

        assert!(ok);
        assert_eq!(calls, vec![AllocStep::ExtendSparse, AllocStep::SeekAndWrite]);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 10_000);
    }

    #[test]
    fn test_full_fallback_zero_fills() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("full.dat");
        let mut file = File::create(&path).unwrap();

        let length = 3 * ZERO_FILL_CHUNK as u64 + 17;
        let ok = run_plan(&mut file, PreallocationMode::Full.plan(length), length, native_rejected);

        assert!(ok);
        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len() as u64, length);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_full_creates_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("created.dat");

        assert!(preallocate_full(&path, 8192));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8192);
    }

    #[test]
    fn test_full_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("file.dat");

        assert!(!preallocate_full(&path, 8192));
    }

    #[test]
    fn test_every_step_failing() {
        let temp = TempDir::new().unwrap();
        let mut file = File::create(temp.path().join("x.dat")).unwrap();

        let ok = run_plan(&mut file, PreallocationMode::Full.plan(10), 10, |_, _, _| {
            Err(io::Error::other("nope"))
        });
        assert!(!ok);
    }

    /// Accepts at most `limit` bytes per call.
    struct ShortWriter {
        limit: usize,
        calls: usize,
        written: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            let n = buf.len().min(self.limit);
            self.written += n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_zero_fill_short_write_aborts() {
        let mut writer = ShortWriter {
            limit: ZERO_FILL_CHUNK / 2,
            calls: 0,
            written: 0,
        };

        let err = zero_fill(&mut writer, 4 * ZERO_FILL_CHUNK as u64).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert_eq!(writer.calls, 1);
        assert_eq!(writer.written, ZERO_FILL_CHUNK / 2);
    }

    #[test]
    fn test_zero_fill_full_chunks_succeed() {
        let mut writer = ShortWriter {
            limit: ZERO_FILL_CHUNK,
            calls: 0,
            written: 0,
        };

        zero_fill(&mut writer, 2 * ZERO_FILL_CHUNK as u64 + 1).unwrap();
        assert_eq!(writer.calls, 3);
        assert_eq!(writer.written, 2 * ZERO_FILL_CHUNK + 1);
    }
}
