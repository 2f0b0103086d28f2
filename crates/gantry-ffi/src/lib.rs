//! C FFI bindings for the Gantry bridge
//!
//! This crate exposes the bridge's three inbound entry points (init, run,
//! clear) to C embedders. The API follows these principles:
//! - ABI-stable (uses only C-compatible types)
//! - Error handling via out-parameters
//! - Opaque pointers for bridge objects
//! - Evaluation contexts addressed by opaque `u64` identities
//! - The engine is supplied by the embedder as a set of C callbacks
//!
//! Structured payloads cross the boundary as JSON strings: the input map
//! goes in as a JSON object, the run outcome comes back as
//! `{"result":"ok"|"match"|"timeout", ...}`. Strings returned by this API
//! must be freed with `gantry_string_free()`.

use gantry_bridge::{
    BridgeError, ContextId, ContextTable, Engine, EngineError, InputValue, Limits, MatchData,
    RunOutcome,
};
use libc::{c_char, c_int, c_void};
use serde::Deserialize;
use serde_json::json;
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::Arc;

// ============================================================================
// Run Callback Return Codes
// ============================================================================

/// The run matched nothing.
pub const GANTRY_RUN_OK: c_int = 0;
/// The run matched; the callback may set the match payload out-parameter.
pub const GANTRY_RUN_MATCH: c_int = 1;
/// The budget was exhausted without a match.
pub const GANTRY_RUN_TIMEOUT: c_int = 2;
/// The engine rejected an argument of the call.
pub const GANTRY_ERR_INVALID_ARGUMENT: c_int = -1;
/// The engine rejected the input object.
pub const GANTRY_ERR_INVALID_OBJECT: c_int = -2;
/// Internal engine failure.
pub const GANTRY_ERR_INTERNAL: c_int = -3;

// ============================================================================
// Opaque Types
// ============================================================================

/// Opaque handle to an assembled bridge instance
#[repr(C)]
pub struct GantryBridge {
    _private: [u8; 0],
}

/// Error information
#[repr(C)]
pub struct GantryError {
    message: *mut c_char,
}

/// Resource/time budget for one run call.
///
/// Non-positive budgets are clamped to zero (zero means exhausted).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GantryLimits {
    /// Maximum container nesting depth converted for the engine
    pub max_depth: i32,
    /// Total number of values converted for the engine
    pub max_elements: i32,
    /// Maximum size of a converted string, in bytes
    pub max_string_size: i32,
    /// Overall budget for the call, in microseconds
    pub general_budget_us: i64,
    /// Budget for the engine run itself, in microseconds
    pub run_budget_us: i64,
}

impl GantryLimits {
    fn to_limits(self) -> Limits {
        Limits::new(
            self.max_depth.max(0) as usize,
            self.max_elements.max(0) as usize,
            self.max_string_size.max(0) as usize,
            self.general_budget_us.max(0) as u64,
            self.run_budget_us.max(0) as u64,
        )
    }

    fn from_limits(limits: &Limits) -> Self {
        Self {
            max_depth: limits.max_depth.min(i32::MAX as usize) as i32,
            max_elements: limits.max_elements.min(i32::MAX as usize) as i32,
            max_string_size: limits.max_string_size.min(i32::MAX as usize) as i32,
            general_budget_us: limits.general_budget_us.min(i64::MAX as u64) as i64,
            run_budget_us: limits.run_budget_us.min(i64::MAX as u64) as i64,
        }
    }
}

// ============================================================================
// Engine Callbacks
// ============================================================================

/// Allocate fresh evaluation state. Returns null on failure.
pub type GantryOpenContextFn = unsafe extern "C" fn(user_data: *mut c_void) -> *mut c_void;

/// Advance a context with one batch of input.
///
/// `input_json` is a JSON document describing the converted input map.
/// Returns one of the `GANTRY_RUN_*` / `GANTRY_ERR_*` codes. On
/// `GANTRY_RUN_MATCH` the callback may set `*match_out` to a
/// `malloc`-allocated JSON string `{"data": "...", "actions": [...]}`;
/// the bridge copies it and frees it with `free`.
pub type GantryRunContextFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    user_data: *mut c_void,
    input_json: *const c_char,
    limits: *const GantryLimits,
    match_out: *mut *mut c_char,
) -> c_int;

/// Destroy evaluation state created by the open callback.
pub type GantryDropContextFn = unsafe extern "C" fn(ctx: *mut c_void, user_data: *mut c_void);

/// The engine, as supplied by the embedder.
///
/// All three callbacks are required. `user_data` is passed through to every
/// callback verbatim and never interpreted.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GantryEngineCallbacks {
    /// Opaque pointer handed back to every callback
    pub user_data: *mut c_void,
    /// Context allocation callback
    pub open_context: Option<GantryOpenContextFn>,
    /// Run callback
    pub run_context: Option<GantryRunContextFn>,
    /// Context destruction callback
    pub drop_context: Option<GantryDropContextFn>,
}

/// Engine state behind one evaluation context.
struct CallbackContext {
    ptr: *mut c_void,
    callbacks: GantryEngineCallbacks,
}

// The embedder's callbacks must tolerate being invoked from whatever thread
// the caller uses; that contract is documented on gantry_bridge_new.
unsafe impl Send for CallbackContext {}

impl Drop for CallbackContext {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.callbacks.drop_context {
            unsafe { drop_fn(self.ptr, self.callbacks.user_data) };
        }
    }
}

/// [`Engine`] implementation over the embedder's callbacks.
struct CallbackEngine {
    callbacks: GantryEngineCallbacks,
}

unsafe impl Send for CallbackEngine {}
unsafe impl Sync for CallbackEngine {}

#[derive(Deserialize)]
struct MatchPayload {
    #[serde(default)]
    data: String,
    #[serde(default)]
    actions: Vec<String>,
}

impl Engine for CallbackEngine {
    type Context = CallbackContext;

    fn open_context(&self) -> Result<Self::Context, EngineError> {
        let open = self
            .callbacks
            .open_context
            .ok_or_else(|| EngineError::Internal("missing open_context callback".to_string()))?;
        let ptr = unsafe { open(self.callbacks.user_data) };
        if ptr.is_null() {
            return Err(EngineError::Internal(
                "engine returned a null context".to_string(),
            ));
        }
        Ok(CallbackContext {
            ptr,
            callbacks: self.callbacks,
        })
    }

    fn run(
        &self,
        ctx: &mut Self::Context,
        input: &InputValue,
        limits: &Limits,
    ) -> Result<RunOutcome, EngineError> {
        let run = self
            .callbacks
            .run_context
            .ok_or_else(|| EngineError::Internal("missing run_context callback".to_string()))?;

        let input_json = CString::new(input_to_json(input).to_string())
            .map_err(|_| EngineError::InvalidArgument("input contains a NUL byte".to_string()))?;
        let c_limits = GantryLimits::from_limits(limits);

        let mut match_out: *mut c_char = ptr::null_mut();
        let code = unsafe {
            run(
                ctx.ptr,
                self.callbacks.user_data,
                input_json.as_ptr(),
                &c_limits,
                &mut match_out,
            )
        };

        // Whatever the code, take ownership of the payload if one was set.
        let payload = if match_out.is_null() {
            None
        } else {
            let copied = unsafe { CStr::from_ptr(match_out) }
                .to_string_lossy()
                .into_owned();
            unsafe { libc::free(match_out as *mut c_void) };
            Some(copied)
        };

        match code {
            GANTRY_RUN_OK => Ok(RunOutcome::NoMatch),
            GANTRY_RUN_TIMEOUT => Ok(RunOutcome::Timeout),
            GANTRY_RUN_MATCH => Ok(RunOutcome::Match(parse_match_payload(payload))),
            GANTRY_ERR_INVALID_ARGUMENT => Err(EngineError::InvalidArgument(
                "engine rejected the run arguments".to_string(),
            )),
            GANTRY_ERR_INVALID_OBJECT => Err(EngineError::InvalidObject(
                "engine rejected the input object".to_string(),
            )),
            other => Err(EngineError::Internal(format!(
                "engine returned unknown code {}",
                other
            ))),
        }
    }
}

/// Decode the callback's match payload; a payload that is not the expected
/// JSON object is carried verbatim as the match data.
fn parse_match_payload(payload: Option<String>) -> MatchData {
    match payload {
        None => MatchData::default(),
        Some(text) => match serde_json::from_str::<MatchPayload>(&text) {
            Ok(parsed) => MatchData {
                data: parsed.data,
                actions: parsed.actions,
            },
            Err(_) => MatchData {
                data: text,
                actions: Vec::new(),
            },
        },
    }
}

// ============================================================================
// JSON Conversions
// ============================================================================

fn input_to_json(input: &InputValue) -> serde_json::Value {
    match input {
        InputValue::Null => serde_json::Value::Null,
        InputValue::Bool(b) => json!(b),
        InputValue::I64(i) => json!(i),
        InputValue::F64(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        InputValue::Str(s) => json!(s),
        InputValue::Array(values) => {
            serde_json::Value::Array(values.iter().map(input_to_json).collect())
        }
        InputValue::Map(entries) => {
            let mut map = serde_json::Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), input_to_json(value));
            }
            serde_json::Value::Object(map)
        }
    }
}

fn json_to_input(value: &serde_json::Value) -> InputValue {
    match value {
        serde_json::Value::Null => InputValue::Null,
        serde_json::Value::Bool(b) => InputValue::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => InputValue::I64(i),
            None => InputValue::F64(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(s) => InputValue::Str(s.clone()),
        serde_json::Value::Array(values) => {
            InputValue::Array(values.iter().map(json_to_input).collect())
        }
        serde_json::Value::Object(entries) => InputValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), json_to_input(v)))
                .collect(),
        ),
    }
}

fn outcome_to_json(outcome: &RunOutcome) -> serde_json::Value {
    match outcome {
        RunOutcome::NoMatch => json!({ "result": "ok" }),
        RunOutcome::Timeout => json!({ "result": "timeout" }),
        RunOutcome::Match(data) => json!({
            "result": "match",
            "data": data.data,
            "actions": data.actions,
        }),
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

// Internal representation of the bridge (not exposed to C)
struct BridgeHandle {
    engine: Arc<CallbackEngine>,
    contexts: ContextTable<CallbackEngine>,
}

/// Convert a Rust string to a C string (caller must free)
unsafe fn rust_to_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Create an error from a BridgeError
unsafe fn create_error(error: BridgeError) -> *mut GantryError {
    let message = rust_to_c_string(&error.to_string());
    let err = Box::new(GantryError { message });
    Box::into_raw(err)
}

/// Set the error out-parameter
unsafe fn set_error(error_out: *mut *mut GantryError, error: BridgeError) {
    if !error_out.is_null() {
        *error_out = create_error(error);
    }
}

// ============================================================================
// Bridge Lifecycle Functions
// ============================================================================

/// Create a new bridge instance over the embedder's engine callbacks.
///
/// # Arguments
/// * `callbacks` - Engine callbacks; all three function pointers required
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * Non-null pointer to GantryBridge on success
/// * NULL on failure (check error parameter)
///
/// # Safety
/// - The callbacks must stay valid for the bridge's lifetime and tolerate
///   being invoked from any thread the embedder calls the bridge on
/// - The returned bridge must be freed with `gantry_bridge_destroy()`
#[no_mangle]
pub unsafe extern "C" fn gantry_bridge_new(
    callbacks: *const GantryEngineCallbacks,
    error: *mut *mut GantryError,
) -> *mut GantryBridge {
    if callbacks.is_null() {
        set_error(
            error,
            BridgeError::Misuse("null callbacks pointer".to_string()),
        );
        return ptr::null_mut();
    }
    let callbacks = *callbacks;
    if callbacks.open_context.is_none()
        || callbacks.run_context.is_none()
        || callbacks.drop_context.is_none()
    {
        set_error(
            error,
            BridgeError::Misuse("all engine callbacks are required".to_string()),
        );
        return ptr::null_mut();
    }

    let handle = Box::new(BridgeHandle {
        engine: Arc::new(CallbackEngine { callbacks }),
        contexts: ContextTable::new(),
    });
    Box::into_raw(handle) as *mut GantryBridge
}

/// Destroy a bridge instance, dropping every remaining evaluation context.
///
/// # Safety
/// - The bridge pointer must have been created by `gantry_bridge_new()`
/// - The bridge must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn gantry_bridge_destroy(bridge: *mut GantryBridge) {
    if bridge.is_null() {
        return;
    }
    let handle = Box::from_raw(bridge as *mut BridgeHandle);
    drop(handle);
}

// ============================================================================
// Evaluation Context Functions
// ============================================================================

/// Create a new evaluation context.
///
/// # Returns
/// * Non-zero context identity on success
/// * 0 on failure (check error parameter)
///
/// # Safety
/// - The bridge pointer must be valid
/// - The returned identity must eventually be passed to
///   `gantry_context_clear()`
#[no_mangle]
pub unsafe extern "C" fn gantry_context_init(
    bridge: *mut GantryBridge,
    error: *mut *mut GantryError,
) -> u64 {
    if bridge.is_null() {
        set_error(error, BridgeError::Misuse("null bridge pointer".to_string()));
        return 0;
    }
    let handle = &*(bridge as *mut BridgeHandle);
    match handle.contexts.init(&handle.engine) {
        Ok(id) => id.as_u64(),
        Err(e) => {
            set_error(error, e);
            0
        }
    }
}

/// Advance an evaluation context with one batch of input.
///
/// # Arguments
/// * `bridge` - Bridge pointer (must not be NULL)
/// * `context_id` - Identity returned by `gantry_context_init()`
/// * `input_json` - Input map as a null-terminated JSON object
/// * `limits` - Budget for this run (must not be NULL)
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * JSON outcome string on success (`{"result":"ok"|"match"|"timeout"}`,
///   match outcomes carry `data` and `actions`); free with
///   `gantry_string_free()`
/// * NULL on failure (check error parameter)
///
/// # Safety
/// - Pointers must be valid; `input_json` must be a null-terminated string
/// - A context must not be run concurrently from multiple threads
#[no_mangle]
pub unsafe extern "C" fn gantry_context_run(
    bridge: *mut GantryBridge,
    context_id: u64,
    input_json: *const c_char,
    limits: *const GantryLimits,
    error: *mut *mut GantryError,
) -> *mut c_char {
    if bridge.is_null() || input_json.is_null() || limits.is_null() {
        set_error(
            error,
            BridgeError::Misuse("null argument (bridge, input, or limits)".to_string()),
        );
        return ptr::null_mut();
    }
    let handle = &*(bridge as *mut BridgeHandle);

    let input_str = match CStr::from_ptr(input_json).to_str() {
        Ok(s) => s,
        Err(_) => {
            set_error(
                error,
                BridgeError::Misuse("input JSON is not valid UTF-8".to_string()),
            );
            return ptr::null_mut();
        }
    };
    let input_value: serde_json::Value = match serde_json::from_str(input_str) {
        Ok(v) => v,
        Err(e) => {
            set_error(
                error,
                BridgeError::Misuse(format!("input is not valid JSON: {}", e)),
            );
            return ptr::null_mut();
        }
    };
    let input = json_to_input(&input_value);
    let limits = (*limits).to_limits();

    match handle
        .contexts
        .run(ContextId::from_raw(context_id), &input, &limits)
    {
        Ok(outcome) => rust_to_c_string(&outcome_to_json(&outcome).to_string()),
        Err(e) => {
            set_error(error, e);
            ptr::null_mut()
        }
    }
}

/// Dispose an evaluation context. The identity is invalid afterwards.
///
/// # Returns
/// * 0 on success
/// * -1 on failure (check error parameter)
///
/// # Safety
/// - The bridge pointer must be valid
#[no_mangle]
pub unsafe extern "C" fn gantry_context_clear(
    bridge: *mut GantryBridge,
    context_id: u64,
    error: *mut *mut GantryError,
) -> c_int {
    if bridge.is_null() {
        set_error(error, BridgeError::Misuse("null bridge pointer".to_string()));
        return -1;
    }
    let handle = &*(bridge as *mut BridgeHandle);
    match handle.contexts.dispose(ContextId::from_raw(context_id)) {
        Ok(()) => 0,
        Err(e) => {
            set_error(error, e);
            -1
        }
    }
}

// ============================================================================
// Error Handling Functions
// ============================================================================

/// Get the error message.
///
/// # Safety
/// - The error pointer must be valid
/// - The returned string is valid until `gantry_error_free()` is called
///   and must not be freed directly
#[no_mangle]
pub unsafe extern "C" fn gantry_error_message(error: *const GantryError) -> *const c_char {
    if error.is_null() {
        return ptr::null();
    }
    (*error).message
}

/// Free an error.
///
/// # Safety
/// - The error pointer must have been created by this API
/// - The error must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn gantry_error_free(error: *mut GantryError) {
    if error.is_null() {
        return;
    }
    if !(*error).message.is_null() {
        let _ = CString::from_raw((*error).message);
    }
    let _ = Box::from_raw(error);
}

/// Free a string returned by this API.
///
/// # Safety
/// - The string must have been returned by a `gantry_*` function
#[no_mangle]
pub unsafe extern "C" fn gantry_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    let _ = CString::from_raw(s);
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Gantry version string.
///
/// # Safety
/// - The returned string is static and must not be freed
#[no_mangle]
pub unsafe extern "C" fn gantry_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Tests
// ============================================================================
