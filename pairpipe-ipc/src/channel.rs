//! Pipe Channel
//!
//! A unidirectional kernel pipe split into a [`ReadEnd`] and a [`WriteEnd`].
//! Each endpoint owns its descriptor and closes it on drop, so whoever holds
//! the value is the only party that can read (or write) through it. The
//! reader observes end-of-stream once every copy of the write end is gone.

use crate::framing::{ChannelError, UnitReader, UnitWriter};
use std::fs::File;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

/// Read end of a channel.
#[derive(Debug)]
pub struct ReadEnd {
    fd: OwnedFd,
}

/// Write end of a channel.
#[derive(Debug)]
pub struct WriteEnd {
    fd: OwnedFd,
}

/// Either end of a channel, as handed to a worker.
#[derive(Debug)]
pub enum Endpoint {
    /// Read end, bound to a consumer
    Read(ReadEnd),
    /// Write end, bound to a producer
    Write(WriteEnd),
}

impl Endpoint {
    /// Short name of the end, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Endpoint::Read(_) => "read",
            Endpoint::Write(_) => "write",
        }
    }
}

impl AsRawFd for Endpoint {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Endpoint::Read(end) => end.as_raw_fd(),
            Endpoint::Write(end) => end.as_raw_fd(),
        }
    }
}

impl From<ReadEnd> for Endpoint {
    fn from(end: ReadEnd) -> Self {
        Endpoint::Read(end)
    }
}

impl From<WriteEnd> for Endpoint {
    fn from(end: WriteEnd) -> Self {
        Endpoint::Write(end)
    }
}

/// Create a pipe, returning `(read_end, write_end)`.
///
/// Both descriptors are close-on-exec, so a child process only ever sees an
/// endpoint that was explicitly handed to it.
pub fn create_channel() -> Result<(ReadEnd, WriteEnd), ChannelError> {
    let mut fds = [0 as RawFd; 2];

    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    ))]
    let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    )))]
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };

    if ret != 0 {
        return Err(ChannelError::Create(std::io::Error::last_os_error()));
    }

    // SAFETY: pipe(2) succeeded, both descriptors are open and owned by nobody else.
    let (read_fd, write_fd) =
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    )))]
    {
        set_cloexec(read_fd.as_raw_fd()).map_err(ChannelError::Create)?;
        set_cloexec(write_fd.as_raw_fd()).map_err(ChannelError::Create)?;
    }

    Ok((ReadEnd { fd: read_fd }, WriteEnd { fd: write_fd }))
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
fn set_cloexec(fd: RawFd) -> std::io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags == -1 || libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) == -1 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

macro_rules! endpoint_impls {
    ($end:ident, $wrap:ident) => {
        impl $end {
            /// Take ownership of an inherited descriptor.
            ///
            /// # Safety
            /// `fd` must be an open descriptor that nothing else will close.
            pub unsafe fn from_raw_fd(fd: RawFd) -> Self {
                Self {
                    fd: unsafe { OwnedFd::from_raw_fd(fd) },
                }
            }

            /// Release the endpoint as a plain `File`.
            pub fn into_file(self) -> File {
                File::from(self.fd)
            }
        }

        impl AsRawFd for $end {
            fn as_raw_fd(&self) -> RawFd {
                self.fd.as_raw_fd()
            }
        }

        impl AsFd for $end {
            fn as_fd(&self) -> BorrowedFd<'_> {
                self.fd.as_fd()
            }
        }

        impl IntoRawFd for $end {
            fn into_raw_fd(self) -> RawFd {
                self.fd.into_raw_fd()
            }
        }

        impl From<$end> for OwnedFd {
            fn from(end: $end) -> OwnedFd {
                end.fd
            }
        }

        impl From<$end> for $wrap<File> {
            fn from(end: $end) -> Self {
                $wrap::new(end.into_file())
            }
        }
    };
}

endpoint_impls!(ReadEnd, UnitReader);
endpoint_impls!(WriteEnd, UnitWriter);
