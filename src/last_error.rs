//! Bridge between the thread's last-error slot and managed word cells.
//!
//! `errno` on POSIX targets, `GetLastError`/`SetLastError` on Windows.
//! Values are copied without validation.

use rtsffi_core::{FfiError, ObjectHandle, TaskContext};

#[cfg(windows)]
unsafe extern "system" {
    fn GetLastError() -> u32;
    fn SetLastError(code: u32);
}

#[cfg(any(target_os = "linux", target_os = "emscripten", target_os = "redox"))]
fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__errno_location() }
}

#[cfg(any(target_os = "android", target_os = "openbsd", target_os = "netbsd"))]
fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__errno() }
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__error() }
}

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
fn errno_location() -> *mut libc::c_int {
    unsafe { libc::___errno() }
}

/// The calling thread's last-error code.
pub fn last_error() -> i32 {
    #[cfg(unix)]
    // SAFETY: the errno location is valid for the lifetime of the thread.
    return unsafe { *errno_location() };
    #[cfg(windows)]
    // SAFETY: plain thread-local read.
    return unsafe { GetLastError() as i32 };
}

/// Overwrite the calling thread's last-error code.
pub fn set_last_error(code: i32) {
    #[cfg(unix)]
    // SAFETY: as in `last_error`.
    unsafe {
        *errno_location() = code;
    }
    #[cfg(windows)]
    // SAFETY: plain thread-local write.
    unsafe {
        SetLastError(code as u32);
    }
}

fn word_cell_error() -> FfiError {
    FfiError::InvalidHandle { what: "word cell" }
}

/// Store the current last-error code into the word cell `cell`.
pub fn capture_last_error(ctx: &mut TaskContext, cell: ObjectHandle) -> Result<(), FfiError> {
    let code = last_error();
    if ctx.heap.set_word(cell, code as isize as usize) {
        Ok(())
    } else {
        Err(word_cell_error())
    }
}

/// Load the word cell `cell` into the last-error slot.
pub fn apply_last_error(ctx: &TaskContext, cell: ObjectHandle) -> Result<(), FfiError> {
    let word = ctx.heap.word(cell).ok_or_else(word_cell_error)?;
    set_last_error(word as isize as i32);
    Ok(())
}
