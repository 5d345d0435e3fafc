//! Interpreter evaluation state: the fields a catching construct saves,
//! mutates, and restores as scripts raise and recover from errors.

use rt_value::{Dict, List, Value};

/// The numeric kind returned by every evaluation. `App` carries any
/// application-defined code above the five built-in ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCode {
    Ok,
    Error,
    Return,
    Break,
    Continue,
    App(i32),
}

impl CompletionCode {
    pub fn as_i32(self) -> i32 {
        match self {
            CompletionCode::Ok => 0,
            CompletionCode::Error => 1,
            CompletionCode::Return => 2,
            CompletionCode::Break => 3,
            CompletionCode::Continue => 4,
            CompletionCode::App(n) => n,
        }
    }

    pub fn from_i32(n: i32) -> Self {
        match n {
            0 => CompletionCode::Ok,
            1 => CompletionCode::Error,
            2 => CompletionCode::Return,
            3 => CompletionCode::Break,
            4 => CompletionCode::Continue,
            other => CompletionCode::App(other),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ok" => Some(CompletionCode::Ok),
            "error" => Some(CompletionCode::Error),
            "return" => Some(CompletionCode::Return),
            "break" => Some(CompletionCode::Break),
            "continue" => Some(CompletionCode::Continue),
            _ => None,
        }
    }
}

/// Notable bits the design calls out by name rather than a generic
/// bitflags set, since there are only two of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    /// Set once an ERROR status has had its error-info/error-code
    /// populated, so a second logging attempt for the same failure is a
    /// no-op (the invariant: only the *first* logging operation owns
    /// those fields).
    pub err_already_logged: bool,
    /// Whether `log_error` also shadows into the legacy `errorInfo` /
    /// `errorCode` variables alongside the modern interp-state fields.
    pub legacy_copy: bool,
}

/// Evaluation outcome and structured-failure state for one interpreter.
pub struct Interp {
    pub status: CompletionCode,
    pub flags: Flags,
    pub return_level: u32,
    pub return_code: CompletionCode,
    pub error_info: Value,
    pub error_code: Value,
    pub error_stack: Value,
    pub return_opts: Value,
    pub obj_result: Value,
    pub reset_error_stack: bool,
    pub error_line: i32,
    /// Legacy shadow variables some callers still read directly. See the
    /// module docs on [`Interp::safe_catch`] for the compatibility
    /// behavior this design preserves around them.
    pub legacy_error_info: Option<Value>,
    pub legacy_error_code: Option<Value>,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    pub fn new() -> Self {
        Interp {
            status: CompletionCode::Ok,
            flags: Flags::default(),
            return_level: 0,
            return_code: CompletionCode::Ok,
            error_info: Value::new(),
            error_code: Value::from_list(List::new()),
            error_stack: Value::from_list(List::new()),
            return_opts: Value::from_dict(Dict::new()),
            obj_result: Value::new(),
            reset_error_stack: true,
            error_line: 0,
            legacy_error_info: None,
            legacy_error_code: None,
        }
    }

    /// Populates `errorInfo`/`errorCode` for a freshly raised error, but
    /// only the first time per the invariant in the design notes; a
    /// second call while `err_already_logged` is set is a no-op. When
    /// `flags.legacy_copy` is set, shadows the same values into the
    /// legacy variables.
    pub fn log_error(&mut self, info: Value, code: Value) {
        if self.flags.err_already_logged {
            return;
        }
        self.flags.err_already_logged = true;
        if self.flags.legacy_copy {
            self.legacy_error_info = Some(info.clone());
            self.legacy_error_code = Some(code.clone());
        }
        self.error_info = info;
        self.error_code = code;
    }

    fn snapshot(&self, include_legacy: bool) -> SavedState {
        SavedState {
            status: self.status,
            flags: self.flags,
            return_level: self.return_level,
            return_code: self.return_code,
            error_info: self.error_info.incr(),
            error_code: self.error_code.incr(),
            error_stack: self.error_stack.incr(),
            return_opts: self.return_opts.incr(),
            obj_result: self.obj_result.incr(),
            reset_error_stack: self.reset_error_stack,
            error_line: self.error_line,
            legacy: include_legacy.then(|| (self.legacy_error_info.clone(), self.legacy_error_code.clone())),
        }
    }

    /// `save(interp, status)`: snapshots every field, incrementing the
    /// refcount on every held value, and records `status` as the status
    /// to be restored later (the status the caller wants to restore
    /// *into*, not necessarily the current one).
    pub fn save(&self, status: CompletionCode) -> SavedState {
        let mut state = self.snapshot(true);
        state.status = status;
        state
    }

    /// `restore(state, interp)`: writes the snapshot back, old values
    /// dropping (and so decrementing) as they are overwritten.
    pub fn restore(&mut self, state: SavedState) {
        self.status = state.status;
        self.flags = state.flags;
        self.return_level = state.return_level;
        self.return_code = state.return_code;
        self.error_info = state.error_info;
        self.error_code = state.error_code;
        self.error_stack = state.error_stack;
        self.return_opts = state.return_opts;
        self.obj_result = state.obj_result;
        self.reset_error_stack = state.reset_error_stack;
        self.error_line = state.error_line;
        if let Some((info, code)) = state.legacy {
            self.legacy_error_info = info;
            self.legacy_error_code = code;
        }
    }

    /// `discard(state)`: frees the record without touching the interp.
    /// Rust's ownership gives this for free — dropping the snapshot
    /// decrements whatever refcounts `save` had bumped.
    pub fn discard(state: SavedState) {
        drop(state)
    }

    /// A catch built on save/restore that leaves the legacy `errorInfo` /
    /// `errorCode` variables exactly as they were when the guarded block
    /// started, *if* they had already been set (traced through) by then
    /// — protecting an outer trace from being clobbered by an inner
    /// failure. If they were unset when the block started, whatever the
    /// block itself establishes survives the restore undisturbed, since
    /// the snapshot never captured them to begin with.
    pub fn safe_catch<F>(&mut self, body: F) -> CompletionCode
    where
        F: FnOnce(&mut Interp) -> CompletionCode,
    {
        let already_traced = self.legacy_error_info.is_some() || self.legacy_error_code.is_some();
        let state = self.snapshot(already_traced);
        let result = body(self);
        self.restore(state);
        result
    }
}

/// A heap snapshot of [`Interp`]'s fields, as produced by [`Interp::save`].
pub struct SavedState {
    status: CompletionCode,
    flags: Flags,
    return_level: u32,
    return_code: CompletionCode,
    error_info: Value,
    error_code: Value,
    error_stack: Value,
    return_opts: Value,
    obj_result: Value,
    reset_error_stack: bool,
    error_line: i32,
    legacy: Option<(Option<Value>, Option<Value>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_restore_round_trips_and_drops_held_values() {
        let mut interp = Interp::new();
        interp.obj_result = Value::from_string("before");
        let state = interp.save(CompletionCode::Error);

        interp.obj_result = Value::from_string("during");
        interp.status = CompletionCode::Error;

        interp.restore(state);
        assert_eq!(interp.status.as_i32(), CompletionCode::Error.as_i32());
        assert_eq!(interp.obj_result.get_string().as_ref(), "before");
    }

    #[test]
    fn discard_frees_without_touching_interp() {
        let mut interp = Interp::new();
        interp.obj_result = Value::from_string("untouched");
        let state = interp.save(CompletionCode::Ok);
        Interp::discard(state);
        assert_eq!(interp.obj_result.get_string().as_ref(), "untouched");
    }

    #[test]
    fn safe_catch_preserves_an_outer_trace() {
        let mut interp = Interp::new();
        interp.legacy_error_info = Some(Value::from_string("outer trace"));
        interp.legacy_error_code = Some(Value::from_string("OUTER"));

        interp.safe_catch(|inner| {
            inner.legacy_error_info = Some(Value::from_string("inner trace"));
            inner.legacy_error_code = Some(Value::from_string("INNER"));
            CompletionCode::Error
        });

        assert_eq!(interp.legacy_error_info.unwrap().get_string().as_ref(), "outer trace");
        assert_eq!(interp.legacy_error_code.unwrap().get_string().as_ref(), "OUTER");
    }

    #[test]
    fn safe_catch_keeps_a_freshly_established_trace() {
        let mut interp = Interp::new();
        assert!(interp.legacy_error_info.is_none());

        interp.safe_catch(|inner| {
            inner.flags.legacy_copy = true;
            inner.log_error(Value::from_string("new trace"), Value::from_string("NEW"));
            CompletionCode::Error
        });

        assert_eq!(interp.legacy_error_info.unwrap().get_string().as_ref(), "new trace");
        assert_eq!(interp.legacy_error_code.unwrap().get_string().as_ref(), "NEW");
    }

    #[test]
    fn log_error_is_a_no_op_after_the_first_call() {
        let mut interp = Interp::new();
        interp.log_error(Value::from_string("first"), Value::from_string("E1"));
        interp.log_error(Value::from_string("second"), Value::from_string("E2"));
        assert_eq!(interp.error_info.get_string().as_ref(), "first");
        assert_eq!(interp.error_code.get_string().as_ref(), "E1");
    }
}
