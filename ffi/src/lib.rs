/*
 * lib.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Gemello, a Gemini protocol client.
 *
 * Gemello is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Gemello is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Gemello.  If not, see <http://www.gnu.org/licenses/>.
 */

//! C FFI for gemello core. One shared client, created on first use from the current
//! configuration. Returned strings are newly allocated (free with gemello_free_string).
//! All string parameters are UTF-8 NUL-terminated.

use gemello_core::config::{default_config_path, load_config};
use gemello_core::request::resolve;
use gemello_core::{
    Client, ClientConfig, Document, Element, GeminiError, Request, Status, TrustSetting,
};
use libc::{c_char, c_int, c_void, size_t};
use std::ffi::{CStr, CString};
use std::path::PathBuf;
use std::ptr;
use std::sync::{Arc, RwLock};

pub const GEMELLO_OK: c_int = 0;
pub const GEMELLO_ERR_INVALID_REQUEST: c_int = -1;
pub const GEMELLO_ERR_CONNECTION: c_int = -2;
pub const GEMELLO_ERR_TIMEOUT: c_int = -3;
pub const GEMELLO_ERR_PROTOCOL: c_int = -4;
pub const GEMELLO_ERR_IO: c_int = -5;
pub const GEMELLO_ERR_TOO_MANY_REDIRECTS: c_int = -6;
pub const GEMELLO_ERR_CONFIG: c_int = -7;

/// Element kinds passed to the gemello_document_foreach callback.
pub const GEMELLO_ELEMENT_TEXT: c_int = 0;
pub const GEMELLO_ELEMENT_HEADING: c_int = 1;
pub const GEMELLO_ELEMENT_LINK: c_int = 2;
pub const GEMELLO_ELEMENT_LIST_ITEM: c_int = 3;
pub const GEMELLO_ELEMENT_QUOTE: c_int = 4;
pub const GEMELLO_ELEMENT_PREFORMATTED: c_int = 5;

/// Callback for document traversal: (element_index, kind, level, text, secondary, item_index, user_data).
/// secondary is the link label or preformatted alt text, NULL when absent. Strings are valid only
/// for the duration of the call.
type OnElement = extern "C" fn(size_t, c_int, c_int, *const c_char, *const c_char, size_t, *mut c_void);

struct Registry {
    config: RwLock<ClientConfig>,
    client: RwLock<Option<Arc<Client>>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: once_cell::sync::OnceCell<Registry> = once_cell::sync::OnceCell::new();
    REGISTRY.get_or_init(|| Registry {
        config: RwLock::new(ClientConfig::default()),
        client: RwLock::new(None),
    })
}

/// Shared client, built from the current configuration on first use.
fn shared_client() -> Result<Arc<Client>, GeminiError> {
    let reg = registry();
    if let Some(client) = reg.client.read().unwrap().as_ref() {
        return Ok(Arc::clone(client));
    }
    let mut slot = reg.client.write().unwrap();
    if let Some(client) = slot.as_ref() {
        return Ok(Arc::clone(client));
    }
    let config = reg.config.read().unwrap().clone();
    let client = Arc::new(Client::new(config)?);
    *slot = Some(Arc::clone(&client));
    Ok(client)
}

/// Replace the configuration; the next request builds a new client. Requests in flight keep the old one.
fn replace_config(config: ClientConfig) {
    let reg = registry();
    *reg.config.write().unwrap() = config;
    *reg.client.write().unwrap() = None;
}

fn ptr_to_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

/// CString for text that may contain NUL bytes (dropped).
fn to_cstring(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = std::cell::RefCell::new(None);
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(to_cstring(msg)));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn error_code(err: &GeminiError) -> c_int {
    match err {
        GeminiError::InvalidRequest(_) => GEMELLO_ERR_INVALID_REQUEST,
        GeminiError::Connection(_) => GEMELLO_ERR_CONNECTION,
        GeminiError::Timeout(_) => GEMELLO_ERR_TIMEOUT,
        GeminiError::Protocol(_) => GEMELLO_ERR_PROTOCOL,
        GeminiError::Io(_) => GEMELLO_ERR_IO,
        GeminiError::TooManyRedirects(_) => GEMELLO_ERR_TOO_MANY_REDIRECTS,
        GeminiError::Config(_) => GEMELLO_ERR_CONFIG,
    }
}

/// Record `err` as the last error and return its code.
fn fail(err: &GeminiError) -> c_int {
    set_last_error(&err.to_string());
    error_code(err)
}

/// Version string (static, do not free).
#[no_mangle]
pub extern "C" fn gemello_version() -> *const c_char {
    b"0.1.0\0".as_ptr() as *const c_char
}

/// Install the env_logger backend (RUST_LOG controls the level). Safe to call more than once.
#[no_mangle]
pub extern "C" fn gemello_init_logging() {
    if env_logger::try_init().is_ok() {
        log::debug!("[gemini] logging initialised");
    }
}

/// Last error message from a failed call on this thread. Valid until the next failing call. Do not free.
#[no_mangle]
pub extern "C" fn gemello_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Free a string returned by this library. No-op if ptr is NULL.
#[no_mangle]
pub unsafe extern "C" fn gemello_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

// ---------- Configuration ----------

/// Load client configuration from path, or from ~/.gemello/client.xml when path is NULL.
/// A missing file means defaults. Returns 0 on success, GEMELLO_ERR_CONFIG on error.
#[no_mangle]
pub extern "C" fn gemello_load_config(path: *const c_char) -> c_int {
    let path = match ptr_to_str(path) {
        Some(p) => PathBuf::from(p),
        None => match default_config_path() {
            Some(p) => p,
            None => return fail(&GeminiError::Config("HOME is not set".into())),
        },
    };
    match load_config(&path) {
        Ok(config) => {
            log::debug!("[gemini] configuration loaded from {}", path.display());
            replace_config(config);
            clear_last_error();
            GEMELLO_OK
        }
        Err(e) => fail(&e),
    }
}

/// Nonzero: accept any server certificate (no chain or hostname validation). Zero: system roots.
#[no_mangle]
pub extern "C" fn gemello_set_insecure_trust(enabled: c_int) {
    let mut config = registry().config.read().unwrap().clone();
    config.trust = if enabled != 0 {
        log::warn!("[gemini] certificate validation disabled");
        TrustSetting::InsecureAcceptAll
    } else {
        TrustSetting::System
    };
    replace_config(config);
}

// ---------- Requests ----------

/// Status, meta and the whole body as text.
fn fetch_text(
    client: &Client,
    request: &Request,
    follow_redirects: bool,
) -> Result<(u8, String, String), GeminiError> {
    let mut response = if follow_redirects {
        client.send_following_redirects(request)?.1
    } else {
        client.send(request)?
    };
    let body = response.read_to_string()?;
    Ok((response.status_code(), response.meta().to_string(), body))
}

/// Blocking fetch. On success writes the status code and newly allocated meta and body strings
/// (caller frees with gemello_free_string; any out pointer may be NULL) and returns 0. Body is
/// empty for non-2x statuses. With follow_redirects nonzero, 3x responses are followed up to the
/// configured limit. On error returns a negative GEMELLO_ERR_* code; see gemello_last_error.
#[no_mangle]
pub unsafe extern "C" fn gemello_fetch(
    url: *const c_char,
    follow_redirects: c_int,
    out_status: *mut c_int,
    out_meta: *mut *mut c_char,
    out_body: *mut *mut c_char,
) -> c_int {
    let url = match ptr_to_str(url) {
        Some(u) => u,
        None => {
            return fail(&GeminiError::invalid_request("url is null or not valid UTF-8"));
        }
    };
    let request = match Request::new(&url) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let client = match shared_client() {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    match fetch_text(&client, &request, follow_redirects != 0) {
        Ok((status, meta, body)) => {
            if !out_status.is_null() {
                *out_status = c_int::from(status);
            }
            if !out_meta.is_null() {
                *out_meta = to_cstring(&meta).into_raw();
            }
            if !out_body.is_null() {
                *out_body = to_cstring(&body).into_raw();
            }
            clear_last_error();
            GEMELLO_OK
        }
        Err(e) => {
            log::debug!("[gemini] fetch {} failed: {}", url, e);
            fail(&e)
        }
    }
}

/// Resolve a link target against the page URL. Returns a new string, or NULL on error.
#[no_mangle]
pub extern "C" fn gemello_resolve(base: *const c_char, reference: *const c_char) -> *mut c_char {
    let (base, reference) = match (ptr_to_str(base), ptr_to_str(reference)) {
        (Some(b), Some(r)) => (b, r),
        _ => {
            set_last_error("base or reference is null or not valid UTF-8");
            return ptr::null_mut();
        }
    };
    match resolve(&base, &reference) {
        Ok(url) => {
            clear_last_error();
            to_cstring(&url).into_raw()
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Description of a status code (e.g. 51 -> "Not found"). New string, or NULL for codes outside 10..69.
#[no_mangle]
pub extern "C" fn gemello_status_description(code: c_int) -> *mut c_char {
    match u8::try_from(code).ok().and_then(Status::from_code) {
        Some(status) => to_cstring(status.description()).into_raw(),
        None => ptr::null_mut(),
    }
}

// ---------- Documents ----------

/// Parsed gemtext document. Opaque to C; free with gemello_document_free.
pub struct GemelloDocument {
    doc: Document,
    title: Option<CString>,
}

/// Parse gemtext. Never fails for valid UTF-8; NULL if text is NULL or not UTF-8.
#[no_mangle]
pub extern "C" fn gemello_parse(text: *const c_char) -> *mut GemelloDocument {
    let text = match ptr_to_str(text) {
        Some(t) => t,
        None => {
            set_last_error("text is null or not valid UTF-8");
            return ptr::null_mut();
        }
    };
    let doc = gemello_core::gemtext::parse_str(&text);
    let title = doc.title().map(to_cstring);
    clear_last_error();
    Box::into_raw(Box::new(GemelloDocument { doc, title }))
}

#[no_mangle]
pub unsafe extern "C" fn gemello_document_free(doc: *mut GemelloDocument) {
    if !doc.is_null() {
        drop(Box::from_raw(doc));
    }
}

/// Number of elements (a list or preformatted block counts once).
#[no_mangle]
pub unsafe extern "C" fn gemello_document_len(doc: *const GemelloDocument) -> size_t {
    match doc.as_ref() {
        Some(d) => d.doc.len(),
        None => 0,
    }
}

/// Text of the first level-1 heading, or NULL. Valid until the document is freed. Do not free.
#[no_mangle]
pub unsafe extern "C" fn gemello_document_title(doc: *const GemelloDocument) -> *const c_char {
    doc.as_ref()
        .and_then(|d| d.title.as_ref())
        .map(|t| t.as_ptr())
        .unwrap_or(ptr::null())
}

/// Walk the document in order. Lists produce one call per item and preformatted blocks one
/// call per line, with item_index counting from 0; an empty preformatted block produces none.
/// level is the heading level (1..3), 0 for other kinds.
#[no_mangle]
pub unsafe extern "C" fn gemello_document_foreach(
    doc: *const GemelloDocument,
    on_element: OnElement,
    user_data: *mut c_void,
) {
    let Some(doc) = doc.as_ref() else {
        return;
    };
    for (index, element) in doc.doc.iter().enumerate() {
        let emit = |kind: c_int, level: c_int, text: &str, secondary: Option<&str>, item: usize| {
            let text_c = to_cstring(text);
            let secondary_c = secondary.map(to_cstring);
            on_element(
                index,
                kind,
                level,
                text_c.as_ptr(),
                secondary_c.as_ref().map(|s| s.as_ptr()).unwrap_or(ptr::null()),
                item,
                user_data,
            );
        };
        match element {
            Element::Text(text) => emit(GEMELLO_ELEMENT_TEXT, 0, text, None, 0),
            Element::Heading { level, text } => {
                emit(GEMELLO_ELEMENT_HEADING, c_int::from(*level), text, None, 0)
            }
            Element::Link { target, label } => {
                emit(GEMELLO_ELEMENT_LINK, 0, target, label.as_deref(), 0)
            }
            Element::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    emit(GEMELLO_ELEMENT_LIST_ITEM, 0, item, None, i);
                }
            }
            Element::Quote(text) => emit(GEMELLO_ELEMENT_QUOTE, 0, text, None, 0),
            Element::Preformatted { alt, lines } => {
                for (i, line) in lines.iter().enumerate() {
                    emit(GEMELLO_ELEMENT_PREFORMATTED, 0, line, alt.as_deref(), i);
                }
            }
        }
    }
}
