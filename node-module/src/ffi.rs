//! C ABI of the loadable module.
//!
//! The host loads the library and calls:
//!
//! - `obsTwitchStreamModuleInit()` once after loading
//! - `obsStartStreamToTwitch(argc, argv)` with the host call arguments
//! - `obsStopStreamToTwitch()`
//! - `obsTwitchLastError()` after a non-zero status, for the message
//!
//! - `obsTwitchStreamModuleShutdown()` before an explicit unload
//!
//! Every call returns a [`Status`] code. Panics are caught at the boundary.
//! The export bodies are generic over the pipeline so they run the same way
//! against libobs and in tests.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use tracing::error;

use obs_twitch_engine::{EngineError, SessionController};
use obs_twitch_pipeline::MediaPipeline;
use obs_twitch_types::{HostValue, HostValueKind};

use crate::commands::ControllerSlot;
use crate::error::{BridgeError, Status, MESSAGE_PREFIX};

/// One host call argument.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostArg {
    /// A [`HostValueKind`] tag.
    pub kind: u32,
    /// NUL-terminated UTF-8 text; read only for strings.
    pub text: *const c_char,
    /// Read only for numbers.
    pub number: f64,
    /// Read only for booleans; non-zero is true.
    pub boolean: u8,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Decode one argument. Strings that are null or not UTF-8 do not count as
/// text.
///
/// # Safety
///
/// For string arguments `arg.text` must be null or point to a NUL-terminated
/// buffer valid for the duration of the call.
pub unsafe fn decode_arg(arg: &HostArg) -> HostValue {
    match HostValueKind::from_raw(arg.kind) {
        HostValueKind::Undefined => HostValue::Undefined,
        HostValueKind::Null => HostValue::Null,
        HostValueKind::Boolean => HostValue::Boolean(arg.boolean != 0),
        HostValueKind::Number => HostValue::Number(arg.number),
        HostValueKind::Object => HostValue::Object,
        HostValueKind::String => {
            if arg.text.is_null() {
                return HostValue::Object;
            }
            match unsafe { CStr::from_ptr(arg.text) }.to_str() {
                Ok(text) => HostValue::String(text.to_string()),
                Err(_) => HostValue::Object,
            }
        }
    }
}

/// Decode an argument vector. A null `argv` is read as no arguments.
///
/// # Safety
///
/// `argv` must be null or point to `argc` valid [`HostArg`]s, each satisfying
/// the contract of [`decode_arg`].
pub unsafe fn decode_args(argc: usize, argv: *const HostArg) -> Vec<HostValue> {
    if argv.is_null() || argc == 0 {
        return Vec::new();
    }
    let args = unsafe { std::slice::from_raw_parts(argv, argc) };
    args.iter().map(|arg| unsafe { decode_arg(arg) }).collect()
}

fn set_last_error(message: Option<String>) {
    let message = message.map(|m| CString::new(m.replace('\0', " ")).unwrap_or_default());
    LAST_ERROR.with(|slot| *slot.borrow_mut() = message);
}

/// Run an export body, turning its outcome into a status code and recording
/// the error message for [`last_error`].
pub fn run_export<F>(name: &str, body: F) -> Status
where
    F: FnOnce() -> Result<(), BridgeError>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => {
            set_last_error(None);
            Status::Ok
        }
        Ok(Err(e)) => {
            let message = e.host_message();
            error!("{}", message);
            set_last_error(Some(message));
            e.status()
        }
        Err(_) => {
            let message = format!("{MESSAGE_PREFIX}: panic in {name}");
            error!("{}", message);
            set_last_error(Some(message));
            Status::Panic
        }
    }
}

/// Message of the last failed call on this thread, or null.
///
/// The pointer stays valid until the next export call on the same thread.
pub fn last_error() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(ptr::null(), |m| m.as_ptr()))
}

/// Body of `obsStartStreamToTwitch`.
///
/// # Safety
///
/// Same contract as [`decode_args`].
pub unsafe fn start_stream<P, F>(
    slot: &ControllerSlot<P>,
    argc: usize,
    argv: *const HostArg,
    create: F,
) -> Status
where
    P: MediaPipeline,
    F: FnOnce() -> Result<SessionController<P>, EngineError>,
{
    let args = unsafe { decode_args(argc, argv) };
    run_export("obsStartStreamToTwitch", || {
        slot.start(&args, create)?;
        Ok(())
    })
}

/// Body of `obsStopStreamToTwitch`.
pub fn stop_stream<P: MediaPipeline>(slot: &ControllerSlot<P>) -> Status {
    run_export("obsStopStreamToTwitch", || {
        slot.stop();
        Ok(())
    })
}

/// Body of `obsTwitchStreamModuleShutdown`.
pub fn shutdown_module<P: MediaPipeline>(slot: &ControllerSlot<P>) -> Status {
    run_export("obsTwitchStreamModuleShutdown", || {
        slot.shutdown();
        Ok(())
    })
}

#[cfg(feature = "libobs")]
#[allow(non_snake_case)]
mod exports {
    use std::os::raw::c_char;
    use std::sync::Once;

    use obs_twitch_engine::SessionController;
    use obs_twitch_pipeline::ObsPipeline;

    use super::{run_export, shutdown_module, start_stream, stop_stream, HostArg};
    use crate::commands::ControllerSlot;
    use crate::error::Status;
    use crate::{exit, init_module, pipeline_config};

    static SLOT: ControllerSlot<ObsPipeline> = ControllerSlot::new();
    static EXIT_HOOK: Once = Once::new();

    /// Module initialization: logging, configuration and exit teardown.
    #[no_mangle]
    pub extern "C" fn obsTwitchStreamModuleInit() -> i32 {
        run_export("obsTwitchStreamModuleInit", || {
            init_module();
            EXIT_HOOK.call_once(|| {
                exit::on_exit(|| {
                    SLOT.shutdown_at_exit();
                })
            });
            Ok(())
        }) as i32
    }

    /// Start streaming with `argv[0]` as the stream key.
    ///
    /// # Safety
    ///
    /// `argv` must be null or point to `argc` valid [`HostArg`]s.
    #[no_mangle]
    pub unsafe extern "C" fn obsStartStreamToTwitch(argc: usize, argv: *const HostArg) -> i32 {
        let init = obsTwitchStreamModuleInit();
        if init != Status::Ok as i32 {
            return init;
        }
        let status = unsafe {
            start_stream(&SLOT, argc, argv, || {
                SessionController::new(ObsPipeline::new(), pipeline_config().clone())
            })
        };
        status as i32
    }

    /// Stop the active stream, if any.
    #[no_mangle]
    pub extern "C" fn obsStopStreamToTwitch() -> i32 {
        stop_stream(&SLOT) as i32
    }

    /// Stop any stream and release the library before the module unloads.
    #[no_mangle]
    pub extern "C" fn obsTwitchStreamModuleShutdown() -> i32 {
        shutdown_module(&SLOT) as i32
    }

    /// Message of the last failed call on this thread, or null.
    #[no_mangle]
    pub extern "C" fn obsTwitchLastError() -> *const c_char {
        super::last_error()
    }
}
