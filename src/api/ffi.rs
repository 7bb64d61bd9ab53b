//! C-compatible API.
//!
//! Strings returned by this module are owned by Rust and must be released with
//! [`retrofit_free_str`]. Failures come back as `{"ok":false,"code":n,"error":"..."}`
//! where `code` is a [`RetroCode`].

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use serde::Serialize;
use serde_json::json;

use crate::common::config::load_cfg;
use crate::common::error::{RetroCode, RetroError, RetroResult};
use crate::common::log;
use crate::evaluation::domain::{CostModel, ScoredRecord};
use crate::evaluation::threshold::{evaluate_with, SweepOptions};
use crate::training::params::model_parameters;

/// ABI version.
#[no_mangle]
pub extern "C" fn retrofit_api_version() -> u32 {
    1
}

/// Load configuration and install logging. Returns a [`RetroCode`].
#[no_mangle]
pub extern "C" fn retrofit_init() -> u32 {
    let result = load_cfg().and_then(|cfg| log::init(&cfg.log_level));
    match result {
        Ok(()) => RetroCode::Ok as u32,
        Err(err) => err.code() as u32,
    }
}

/// Sweep the threshold grid over a JSON array of `{"label":..,"p1":..}` records.
///
/// `model_name` may be null. `cost_json` may be null to use the configured costs.
#[no_mangle]
pub extern "C" fn retrofit_evaluate_json(
    records_json: *const c_char,
    model_name: *const c_char,
    cost_json: *const c_char,
) -> *const c_char {
    respond(|| {
        let raw = read_str(records_json).ok_or(RetroError::MissingArgument("records"))?;
        let records: Vec<ScoredRecord> = serde_json::from_str(&raw)
            .map_err(|err| RetroError::invalid(format!("records: {err}")))?;
        let model_name = read_str(model_name).unwrap_or_default();

        let cfg = load_cfg()?;
        let cost = match read_str(cost_json) {
            Some(raw) => serde_json::from_str::<CostModel>(&raw)
                .map_err(|err| RetroError::invalid(format!("cost: {err}")))?,
            None => cfg.default_cost,
        };
        let opts = SweepOptions {
            parallel_min_records: cfg.parallel_min_records,
        };
        Ok(evaluate_with(&records, &model_name, None, &cost, opts))
    })
}

/// Default parameter tables for a comma separated list of algorithms.
#[no_mangle]
pub extern "C" fn retrofit_model_parameters_json(
    algorithms: *const c_char,
    target_type: *const c_char,
    train_method: *const c_char,
) -> *const c_char {
    respond(|| {
        let algorithms = read_str(algorithms);
        let names: Option<Vec<&str>> = algorithms
            .as_deref()
            .map(|a| a.split(',').map(str::trim).filter(|s| !s.is_empty()).collect());
        let target_type = read_str(target_type);
        let train_method = read_str(train_method);
        model_parameters(
            names.as_deref(),
            target_type.as_deref(),
            train_method.as_deref(),
        )
    })
}

/// Free strings allocated by Rust.
#[no_mangle]
pub extern "C" fn retrofit_free_str(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(ptr as *mut c_char);
    }
}

fn read_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn respond<T, F>(op: F) -> *const c_char
where
    T: Serialize,
    F: FnOnce() -> RetroResult<T>,
{
    let body = match op().and_then(|value| {
        serde_json::to_value(value).map_err(|err| RetroError::Internal(err.to_string()))
    }) {
        Ok(value) => json!({ "ok": true, "result": value }),
        Err(err) => {
            tracing::warn!(code = err.code() as u32, error = %err, "ffi call failed");
            json!({ "ok": false, "code": err.code() as u32, "error": err.to_string() })
        }
    };
    string_to_raw(body.to_string())
}

fn string_to_raw(s: String) -> *const c_char {
    match CString::new(s) {
        Ok(cstring) => cstring.into_raw(),
        Err(_) => fallback_json_raw(),
    }
}

fn fallback_json_raw() -> *const c_char {
    const FALLBACK: &[u8] = b"{\"ok\":false}\0";
    match CStr::from_bytes_with_nul(FALLBACK) {
        Ok(s) => CString::from(s).into_raw(),
        Err(_) => std::ptr::null(),
    }
}
