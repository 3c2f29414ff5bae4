//! Descriptors that `select` cannot watch
//!
//! Kept in its own test binary: while it runs, every descriptor below
//! `FD_SETSIZE` is taken, so no other test may open files concurrently.

use nix::libc::rlim_t;
use nix::sys::resource::{getrlimit, setrlimit, Resource};
use nix::sys::select::FD_SETSIZE;
use nix::unistd::dup;
use rdpbridge_core::engine::FdInterest;
use rdpbridge_core::input::WireInput;
use rdpbridge_core::ui::{ChannelWaker, GuiWaker};
use rdpbridge_core::{
    BridgeConfig, CloseReason, ConnectionWorker, ControlSignal, EngineError, NoChannels,
    ProtocolEngine, RenderSink,
};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Duplicates a socket until a copy lands at or above `FD_SETSIZE`
///
/// Returns `None` when the hard descriptor limit does not allow it.
fn descriptors_past_select_limit() -> Option<Vec<OwnedFd>> {
    let wanted = (FD_SETSIZE + 64) as rlim_t;
    let (soft, hard) = getrlimit(Resource::RLIMIT_NOFILE).ok()?;
    if hard < wanted {
        return None;
    }
    if soft < wanted {
        setrlimit(Resource::RLIMIT_NOFILE, wanted, hard).ok()?;
    }
    let (stream, _peer) = UnixStream::pair().ok()?;
    let mut fds = Vec::new();
    loop {
        let fd = dup(&stream).ok()?;
        let past = fd.as_raw_fd() >= FD_SETSIZE as RawFd;
        fds.push(fd);
        if past {
            return Some(fds);
        }
    }
}

/// Engine whose connection descriptor is the last, highest one
struct FarEngine {
    fds: Vec<OwnedFd>,
}

impl ProtocolEngine for FarEngine {
    fn get_fds<'fd>(&'fd self, interest: &mut FdInterest<'fd>) -> Result<(), EngineError> {
        if let Some(fd) = self.fds.last() {
            interest.read(fd.as_fd());
        }
        Ok(())
    }
    fn check_fds(&mut self, _sink: &mut RenderSink<'_>) -> Result<(), EngineError> {
        Ok(())
    }
    fn send_input(&mut self, _input: WireInput) {}
    fn request_disconnect(&mut self) {}
    fn shall_disconnect(&self) -> bool {
        false
    }
}

#[test]
fn test_descriptor_beyond_select_limit_fails_connection() {
    let Some(mut fds) = descriptors_past_select_limit() else {
        eprintln!("descriptor limit too low, skipping");
        return;
    };
    let far = fds.pop().unwrap();
    let far_fd = far.as_raw_fd();

    let mut interest = FdInterest::new();
    interest.read(far.as_fd());
    assert!(interest.beyond_select_limit().is_some());
    assert_eq!(interest.wait(), Err(nix::errno::Errno::EBADF));
    drop(interest);

    // Free a low slot for the worker's own wake pipe
    fds.truncate(fds.len().saturating_sub(8));
    let (tx, wakes) = mpsc::channel();
    let waker: Arc<dyn GuiWaker> = Arc::new(ChannelWaker::new(tx));
    let engine = FarEngine { fds: vec![far] };
    let (handle, link) =
        ConnectionWorker::spawn(&BridgeConfig::default(), engine, NoChannels, waker).unwrap();

    let exit = match link.control.recv_timeout(Duration::from_secs(5)) {
        Ok(ControlSignal::Closed(exit)) => exit,
        Err(e) => panic!("worker did not close: {e}"),
    };
    assert_eq!(exit.reason, CloseReason::Failed);
    let error = exit.error.unwrap();
    assert!(error.starts_with("Protocol engine failure"), "{error}");
    assert!(error.contains(&format!("descriptor {far_fd}")), "{error}");
    assert!(wakes.recv_timeout(Duration::from_secs(5)).is_ok());
    handle.join();
}
