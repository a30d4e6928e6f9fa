//! Teardown when the process exits or the module is unloaded.
//!
//! Statics are never dropped, so anything living in one that must release
//! the media library registers a hook here. Hooks run from a library
//! destructor, newest first.

use std::mem;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;

type ExitHook = Box<dyn FnOnce() + Send>;

static HOOKS: Mutex<Vec<ExitHook>> = parking_lot::const_mutex(Vec::new());

/// Run `hook` when the process exits.
pub fn on_exit(hook: impl FnOnce() + Send + 'static) {
    HOOKS.lock().push(Box::new(hook));
}

/// Run and forget every registered hook. Returns how many ran.
///
/// Panicking hooks are contained. If the registry is locked elsewhere nothing
/// runs, so exit is never blocked.
pub fn run_exit_hooks() -> usize {
    let hooks = match HOOKS.try_lock() {
        Some(mut hooks) => mem::take(&mut *hooks),
        None => return 0,
    };

    let count = hooks.len();
    for hook in hooks.into_iter().rev() {
        let _ = panic::catch_unwind(AssertUnwindSafe(hook));
    }
    count
}

#[ctor::dtor]
fn teardown_at_exit() {
    run_exit_hooks();
}
