//! Capture a filtered backtrace when a run panics.
//!
//! The hook records into a thread-local only while a run is armed.
//! `catch_unwind` returns on the panicking thread, so the recovery boundary
//! can pick the trace up right after the unwind.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

use crate::error::ImportError;

/// Module paths whose frames are worth showing an operator.
const KEPT_FRAMES: &[&str] = &[
    "importer::pipeline",
    "importer::sites",
    "importer::crawler",
    "importer::stores",
    "importer::browser",
];

static INSTALL: Once = Once::new();
static ARMED: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CAPTURED: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Chain a capturing hook in front of the existing one. Idempotent.
pub fn install() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if ARMED.load(Ordering::SeqCst) > 0 {
                let trace = filter_frames(&Backtrace::force_capture().to_string());
                CAPTURED.with(|slot| *slot.borrow_mut() = Some(trace));
            }
            previous(info);
        }));
    });
}

/// Keeps capture enabled while alive.
pub struct ArmGuard(());

impl Drop for ArmGuard {
    fn drop(&mut self) {
        ARMED.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn arm() -> ArmGuard {
    install();
    CAPTURED.with(|slot| slot.borrow_mut().take());
    ARMED.fetch_add(1, Ordering::SeqCst);
    ArmGuard(())
}

/// Trace captured on this thread by the last panic, if any.
pub fn take_captured() -> Option<String> {
    CAPTURED.with(|slot| slot.borrow_mut().take())
}

/// Panic payload as text.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Turn a caught panic into an error carrying the captured trace.
pub fn into_error(payload: Box<dyn Any + Send>) -> ImportError {
    ImportError::Panic {
        message: payload_message(payload.as_ref()),
        trace: take_captured().unwrap_or_default(),
    }
}

/// Keep frames from importer modules along with their `at file:line` line.
pub fn filter_frames(backtrace: &str) -> String {
    let mut kept = Vec::new();
    let mut keep_location = false;

    for line in backtrace.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("at ") {
            if keep_location {
                kept.push(line.to_string());
            }
            continue;
        }
        keep_location = KEPT_FRAMES.iter().any(|prefix| trimmed.contains(prefix));
        if keep_location {
            kept.push(line.to_string());
        }
    }

    kept.join("\n")
}
