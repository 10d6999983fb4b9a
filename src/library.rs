//! Dynamic library binding over the host loader.
//!
//! Handles are plain machine words owned by hosted code. The loader's
//! reference counting is the only liveness tracking; using a handle after
//! [`unload`] is the caller's mistake. Every failure is reported as
//! [`FfiError::Foreign`] with the platform's own diagnostic, cut to the
//! configured message buffer.

use std::ffi::c_void;
use std::fmt;
use std::mem::ManuallyDrop;
use std::num::NonZeroUsize;

use log::debug;
use rtsffi_core::{ConversionError, FfiError};

use crate::config::FfiConfig;

#[cfg(unix)]
use libloading::os::unix::{Library, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};
#[cfg(windows)]
use libloading::os::windows::Library;

/// Opaque handle to a loaded library.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LibraryHandle(NonZeroUsize);

impl LibraryHandle {
    /// The word handed to hosted code.
    pub fn as_word(self) -> usize {
        self.0.get()
    }

    /// Rebuild a handle from a hosted word. Zero is never a valid handle.
    pub fn from_word(word: usize) -> Result<Self, FfiError> {
        NonZeroUsize::new(word)
            .map(LibraryHandle)
            .ok_or(FfiError::InvalidHandle { what: "library" })
    }

    fn from_library(library: Library) -> Result<Self, FfiError> {
        Self::from_word(library.into_raw() as usize)
    }

    /// Borrow the loader's library object without taking ownership of the
    /// reference it holds.
    fn borrow(self) -> ManuallyDrop<Library> {
        // SAFETY: the word came from `into_raw` on a library that hosted
        // code has not unloaded.
        ManuallyDrop::new(unsafe { Library::from_raw(self.0.get() as _) })
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LibraryHandle({:#x})", self.0.get())
    }
}

fn foreign(message: String) -> FfiError {
    FfiError::foreign(message, FfiConfig::current().message_limit())
}

#[cfg(unix)]
fn open_flags() -> i32 {
    if FfiConfig::current().load_lazily() {
        RTLD_LAZY | RTLD_LOCAL
    } else {
        RTLD_NOW | RTLD_LOCAL
    }
}

/// Load the library at `path`.
pub fn load_library(path: &str) -> Result<LibraryHandle, FfiError> {
    // SAFETY: running a library's initialisers is the point of loading it.
    #[cfg(unix)]
    let loaded = unsafe { Library::open(Some(path), open_flags()) };
    #[cfg(windows)]
    let loaded = unsafe { Library::new(path) };

    let library = loaded.map_err(|err| foreign(format!("Loading <{path}> failed: {err}")))?;
    let handle = LibraryHandle::from_library(library)?;
    debug!("loaded <{path}> as {handle:?}");
    Ok(handle)
}

/// A handle for the running executable, so symbols linked into the runtime
/// itself can be resolved.
pub fn load_self() -> Result<LibraryHandle, FfiError> {
    // SAFETY: opening the main program runs no new initialisers.
    #[cfg(unix)]
    let loaded = unsafe { Library::open(None::<&str>, open_flags()) };
    #[cfg(windows)]
    let loaded = Library::this();

    let library =
        loaded.map_err(|err| foreign(format!("Loading address of executable failed: {err}")))?;
    LibraryHandle::from_library(library)
}

/// Drop one loader reference to `handle`.
pub fn unload(handle: LibraryHandle) -> Result<(), FfiError> {
    let library = ManuallyDrop::into_inner(handle.borrow());
    library.close().map_err(|err| {
        #[cfg(unix)]
        let message = format!("dlclose failed: {err}");
        #[cfg(windows)]
        let message = format!("FreeLibrary failed: {err}");
        foreign(message)
    })?;
    debug!("unloaded {handle:?}");
    Ok(())
}

/// Address of the symbol `name` in `handle`.
pub fn resolve_symbol(handle: LibraryHandle, name: &str) -> Result<NonZeroUsize, FfiError> {
    if let Some(offset) = name.bytes().position(|b| b == 0) {
        return Err(ConversionError::InteriorNul { offset }.into());
    }
    let library = handle.borrow();
    // SAFETY: the symbol is only read as an address, never called here.
    let symbol = unsafe { library.get::<*mut c_void>(name.as_bytes()) }
        .map_err(|err| foreign(format!("load_sym <{name}> : {err}")))?;
    let address = NonZeroUsize::new(*symbol as usize)
        .ok_or_else(|| foreign(format!("load_sym <{name}> : symbol has a null address")))?;
    debug!("resolved <{name}> at {:#x}", address.get());
    Ok(address)
}
