//! The boundary call protocol.
//!
//! Every crossing between managed and native execution runs through
//! [`TaskContext::boundary_call`]:
//!
//! ```text
//! Idle -> Armed (save point marked, arguments rooted)
//!      -> Executing (delegate runs)
//!      -> Unwinding (result or failure packaged, roots released)
//!      -> Idle
//! ```
//!
//! Roots pushed since the save point are released on every exit path. A
//! recoverable failure comes back as `Err`; a panic in the delegate is caught
//! and reported the same way, so no unwind ever reaches native frames. An
//! unrecoverable failure terminates the process.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, error};

use crate::context::TaskContext;
use crate::error::FfiError;
use crate::roots::RootHandle;
use crate::value::Value;

/// Phase of the innermost crossing on a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryState {
    Idle,
    Armed,
    Executing,
    Unwinding,
}

/// Result of a crossing as seen by hosted code.
pub type BoundaryResult = Result<Value, FfiError>;

/// Terminate the process. Used when no caller on either side of the
/// boundary can continue.
pub fn crash(message: &str) -> ! {
    error!("{message}");
    eprintln!("{message}");
    std::process::abort()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl TaskContext {
    /// Run `delegate` as one boundary crossing.
    ///
    /// `args` are pushed as roots before the delegate runs and the delegate
    /// receives their root handles. Crossings nest: a callback that re-enters
    /// managed code may cross again, and each crossing restores the state it
    /// found.
    pub fn boundary_call<F>(&mut self, args: &[Value], delegate: F) -> BoundaryResult
    where
        F: FnOnce(&mut TaskContext, &[RootHandle]) -> BoundaryResult,
    {
        let outer_state = self.state;
        self.crossings += 1;

        let reset = self.save_vec.mark();
        self.state = BoundaryState::Armed;
        let mut pushed = Vec::with_capacity(args.len());
        for arg in args {
            pushed.push(self.save_vec.push(arg.clone()));
        }

        self.state = BoundaryState::Executing;
        let outcome = catch_unwind(AssertUnwindSafe(|| delegate(&mut *self, &pushed)));

        self.state = BoundaryState::Unwinding;
        let result = match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) if err.is_unrecoverable() => crash(&err.to_string()),
            Ok(Err(err)) => {
                debug!("{}: boundary call failed: {err}", self.id());
                Err(err)
            }
            Err(payload) => {
                let message = panic_message(payload);
                debug!("{}: boundary call panicked: {message}", self.id());
                Err(FfiError::Panic { message })
            }
        };

        self.save_vec.reset(reset);
        self.crossings -= 1;
        self.state = outer_state;
        result
    }

    /// Read a value rooted by the current crossing.
    pub fn rooted(&self, handle: RootHandle) -> Option<&Value> {
        self.save_vec.get(handle)
    }
}
