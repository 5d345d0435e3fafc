//! `Runtime`: one interpreter's evaluation state plus the process-wide
//! library registry it loads against. The Interpreter API named in the
//! design notes — set/get result, reset, set error-code, append
//! error-info, save/restore/discard state, get/set return options,
//! transfer result — is implemented here as thin methods over
//! [`rt_interp::Interp`].

use rt_interp::{
    get_return_options, merge_return_options, process_return, transfer_result, unwind_one_level, CompletionCode, Interp, ReturnOptionsError,
    SavedState,
};
use rt_loader::{InterpId, LibraryRegistry, LoadOutcome, LoaderError};
use rt_value::{Dict, List, Value};

/// One interpreter's evaluation state, paired with the library registry it
/// shares with every other interpreter in the process (spec §5: the
/// loaded-library list is process-wide, one mutex, while each `Interp`
/// itself needs no internal locking).
pub struct Runtime {
    pub interp: Interp,
    pub id: InterpId,
    pub safe: bool,
}

impl Runtime {
    pub fn new(id: InterpId, safe: bool) -> Self {
        Runtime {
            interp: Interp::new(),
            id,
            safe,
        }
    }

    // -- Interpreter API (spec §6) -----------------------------------

    pub fn set_result(&mut self, value: Value) {
        self.interp.obj_result = value;
    }

    pub fn result(&self) -> &Value {
        &self.interp.obj_result
    }

    /// Resets the interpreter to a clean `OK` state: clears the result,
    /// error-logging flag, and — when `reset_error_stack` is set — the
    /// error stack too.
    pub fn reset(&mut self) {
        self.interp.status = CompletionCode::Ok;
        self.interp.flags.err_already_logged = false;
        self.interp.obj_result = Value::new();
        self.interp.return_opts = Value::from_dict(Dict::new());
        if self.interp.reset_error_stack {
            self.interp.error_stack = Value::from_list(List::new());
        }
    }

    pub fn set_error_code(&mut self, code: Value) {
        self.interp.error_code = code;
    }

    /// Appends a line to the accumulated error-info trace, the way a
    /// catching construct builds up a traceback as the error unwinds
    /// through nested calls.
    pub fn append_error_info(&mut self, line: &str) {
        let mut trace = self.interp.error_info.get_string().to_string();
        if !trace.is_empty() {
            trace.push('\n');
        }
        trace.push_str(line);
        self.interp.error_info = Value::from_string(trace);
    }

    pub fn save_state(&self, status: CompletionCode) -> SavedState {
        self.interp.save(status)
    }

    pub fn restore_state(&mut self, state: SavedState) {
        self.interp.restore(state)
    }

    pub fn discard_state(state: SavedState) {
        Interp::discard(state)
    }

    /// `Tcl_GetReturnOptions`: the stored return-options dict with
    /// `-code`/`-level` filled in for `result`, the completion code the
    /// caller is currently observing — the numeric pair a script-visible
    /// `-options` read is supposed to show, not just whatever subset of
    /// keys a `return` call happened to pass explicitly.
    pub fn return_options(&self, result: CompletionCode) -> Dict {
        get_return_options(&self.interp, result)
    }

    pub fn set_return_options(&mut self, opts: Value) {
        self.interp.return_opts = opts;
    }

    /// One enclosing frame's worth of unwinding a deferred `RETURN`; see
    /// [`rt_interp::unwind_one_level`].
    pub fn unwind_return_level(&mut self) -> CompletionCode {
        unwind_one_level(&mut self.interp)
    }

    /// Moves `src`'s result (and, if present, its return-options and error
    /// state) onto `self`.
    pub fn transfer_result(&mut self, src: &Runtime, code: CompletionCode) {
        transfer_result(&src.interp, code, &mut self.interp);
    }

    // -- Return-options convenience (spec §4.9) ----------------------

    /// Merges a `-code`/`-level`/... key-value sequence and immediately
    /// processes the result against this interpreter, the way a `return`
    /// evaluation would: the combination the design splits into
    /// `mergeReturnOptions` + `processReturn`, composed here since callers
    /// almost always want both steps together.
    pub fn evaluate_return(&mut self, kvs: &[(Value, Value)]) -> Result<CompletionCode, ReturnOptionsError> {
        let (code, level, opts) = merge_return_options(&self.interp, kvs)?;
        Ok(process_return(&mut self.interp, code, level, opts))
    }

    // -- Library loader wiring (spec §4.10) --------------------------

    pub fn load_library(&self, registry: &LibraryRegistry, file_name: &str, prefix: Option<&str>) -> Result<LoadOutcome, LoaderError> {
        registry.load(file_name, prefix, self.id, self.safe)
    }

    pub fn unload_library(
        &self,
        registry: &LibraryRegistry,
        file_name: Option<&str>,
        prefix: Option<&str>,
        keep_library: bool,
    ) -> Result<i32, LoaderError> {
        registry.unload(file_name, prefix, self.id, self.safe, keep_library)
    }
}
