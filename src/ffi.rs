//! C ABI.
//!
//! Resolvers and results are owned by this library and referred to from C by opaque `u64`
//! handles. Handles are never `0`, never reused, and invalid after the matching `*_free` call;
//! passing a stale handle is reported as [`ErrorKind::InvalidHandle`] rather than touching
//! freed memory. Strings only ever cross the boundary as copies into caller-owned buffers, so
//! there is nothing for C to free except handles. See `include/bip353.h`.
//!
//! Resolution blocks the calling thread on a process-wide tokio runtime. These functions must
//! not be called from within an async context.
use crate::address;
use crate::config::Config;
use crate::error::{ErrorKind, ResolutionError};
use crate::instruction::PaymentInstruction;
use crate::network::Network;
use crate::resolver::Resolver;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Runtime;

type Outcome = Result<PaymentInstruction, ResolutionError>;

lazy_static! {
    static ref RUNTIME: std::io::Result<Runtime> = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build();
    static ref RESOLVERS: Mutex<HashMap<u64, Arc<Resolver>>> = Mutex::new(HashMap::new());
    static ref RESULTS: Mutex<HashMap<u64, Outcome>> = Mutex::new(HashMap::new());
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

const OK: c_int = 0;

fn lock<T>(registry: &Mutex<T>) -> MutexGuard<'_, T> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn register<T>(registry: &Mutex<HashMap<u64, T>>, value: T) -> u64 {
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    lock(registry).insert(handle, value);
    handle
}

fn release<T>(registry: &Mutex<HashMap<u64, T>>, handle: u64) -> c_int {
    match lock(registry).remove(&handle) {
        Some(_) => OK,
        None => ErrorKind::InvalidHandle.code(),
    }
}

/// Borrow a C string. `None` for NULL or non-UTF-8 input.
unsafe fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Copy `value` into `buf` like `snprintf`: at most `len - 1` bytes followed by a NUL. Returns
/// the full length of `value`, so a return value `>= len` means the copy was truncated.
unsafe fn copy_out(value: &str, buf: *mut c_char, len: usize) -> i64 {
    if !buf.is_null() && len > 0 {
        let n = value.len().min(len - 1);
        std::ptr::copy_nonoverlapping(value.as_ptr().cast::<c_char>(), buf, n);
        *buf.add(n) = 0;
    }
    i64::try_from(value.len()).unwrap_or(i64::MAX)
}

fn create(config: &Config) -> u64 {
    match Resolver::from_config(config) {
        Ok(resolver) => register(&*RESOLVERS, Arc::new(resolver)),
        Err(err) => {
            tracing::warn!("can't create resolver: {err}");
            0
        }
    }
}

/// Create a resolver for `network` (`"main"`, `"testnet"`, `"signet"` or `"regtest"`) with the
/// default configuration. Returns `0` if the network is NULL or unknown.
///
/// # Safety
///
/// `network` must be NULL or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn bip353_resolver_create(network: *const c_char) -> u64 {
    match read_str(network).map(str::parse::<Network>) {
        Some(Ok(network)) => create(&Config::default().with_network(network)),
        _ => 0,
    }
}

/// Create a resolver from a JSON config file. Returns `0` if the file can't be loaded.
///
/// # Safety
///
/// `path` must be NULL or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn bip353_resolver_create_from_config(path: *const c_char) -> u64 {
    let Some(path) = read_str(path) else {
        return 0;
    };
    match Config::try_from_file(path) {
        Ok(config) => create(&config),
        Err(err) => {
            tracing::warn!("can't load config {path}: {err}");
            0
        }
    }
}

/// Release a resolver. Results it produced stay valid.
#[no_mangle]
pub extern "C" fn bip353_resolver_free(resolver: u64) -> c_int {
    release(&*RESOLVERS, resolver)
}

/// Outcome counters of a resolver, see [`Resolver::stats`].
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Bip353Stats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
}

/// Fill `out` with the resolver's outcome counters. Returns `0`, the invalid-handle code for
/// unknown resolvers, or the malformed-address code if `out` is NULL.
///
/// # Safety
///
/// `out` must be NULL or valid for writes of one [`Bip353Stats`].
#[no_mangle]
pub unsafe extern "C" fn bip353_resolver_stats(resolver: u64, out: *mut Bip353Stats) -> c_int {
    let Some(resolver) = lock(&*RESOLVERS).get(&resolver).cloned() else {
        return ErrorKind::InvalidHandle.code();
    };
    if out.is_null() {
        return ErrorKind::MalformedAddress.code();
    }
    let stats = resolver.stats();
    out.write(Bip353Stats {
        total: stats.total,
        success: stats.success,
        failed: stats.failed,
    });
    OK
}

/// Split and validate `address` without resolving it, copying the normalized user and domain
/// into the given buffers. Buffers of `BIP353_NAME_BUF_LEN` bytes always hold a part in full.
/// Returns `0` or the malformed-address code; nothing is written on failure.
///
/// # Safety
///
/// `address` must be NULL or point to a NUL-terminated string. Each buffer must be NULL or
/// valid for writes of its length.
#[no_mangle]
pub unsafe extern "C" fn bip353_parse_address(
    address: *const c_char,
    user_buf: *mut c_char,
    user_len: usize,
    domain_buf: *mut c_char,
    domain_len: usize,
) -> c_int {
    match read_str(address).map(address::parse) {
        Some(Ok(parsed)) => {
            copy_out(parsed.user(), user_buf, user_len);
            copy_out(parsed.domain(), domain_buf, domain_len);
            OK
        }
        _ => ErrorKind::MalformedAddress.code(),
    }
}

enum Request<'a> {
    Address(&'a str),
    Parts(&'a str, &'a str),
}

fn resolve_request(resolver: u64, request: Option<Request<'_>>) -> u64 {
    let found = lock(&*RESOLVERS).get(&resolver).cloned();
    let outcome = match (found, request) {
        (None, _) => Err(ResolutionError::InvalidHandle),
        (Some(_), None) => Err(ResolutionError::MalformedAddress(
            "address is NULL or not UTF-8".to_string(),
        )),
        (Some(resolver), Some(request)) => match &*RUNTIME {
            Ok(runtime) => runtime.block_on(async {
                match request {
                    Request::Address(address) => resolver.resolve(address).await,
                    Request::Parts(user, domain) => resolver.resolve_parts(user, domain).await,
                }
            }),
            Err(err) => Err(ResolutionError::TransportUnavailable(format!(
                "async runtime unavailable: {err}"
            ))),
        },
    };
    register(&*RESULTS, outcome)
}

/// Resolve `address` (`user@domain`, optionally prefixed with `₿`). Always returns a result
/// handle, to be released with [`bip353_result_free`].
///
/// # Safety
///
/// `address` must be NULL or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn bip353_resolve_address(resolver: u64, address: *const c_char) -> u64 {
    resolve_request(resolver, read_str(address).map(Request::Address))
}

/// Resolve an address given as separate user and domain parts. Always returns a result
/// handle, to be released with [`bip353_result_free`].
///
/// # Safety
///
/// `user` and `domain` must each be NULL or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn bip353_resolve(
    resolver: u64,
    user: *const c_char,
    domain: *const c_char,
) -> u64 {
    let parts = read_str(user).zip(read_str(domain));
    resolve_request(
        resolver,
        parts.map(|(user, domain)| Request::Parts(user, domain)),
    )
}

fn with_result<T>(result: u64, f: impl FnOnce(&Outcome) -> T) -> Option<T> {
    lock(&*RESULTS).get(&result).map(f)
}

/// `0` on success, otherwise the negative error code.
#[no_mangle]
pub extern "C" fn bip353_result_status(result: u64) -> c_int {
    with_result(result, |outcome| match outcome {
        Ok(_) => OK,
        Err(err) => err.kind().code(),
    })
    .unwrap_or_else(|| ErrorKind::InvalidHandle.code())
}

/// `1` if the resolved instruction may be paid more than once, `0` if not or if resolution
/// failed, and the invalid-handle code for unknown handles.
#[no_mangle]
pub extern "C" fn bip353_result_is_reusable(result: u64) -> c_int {
    with_result(result, |outcome| {
        c_int::from(outcome.as_ref().map_or(false, PaymentInstruction::is_reusable))
    })
    .unwrap_or_else(|| ErrorKind::InvalidHandle.code())
}

unsafe fn copy_field(
    result: u64,
    buf: *mut c_char,
    len: usize,
    field: impl FnOnce(&Outcome) -> String,
) -> i64 {
    match with_result(result, field) {
        Some(value) => copy_out(&value, buf, len),
        None => i64::from(ErrorKind::InvalidHandle.code()),
    }
}

/// Copy the payment URI into `buf`. Empty for failed resolutions. Returns the URI's full
/// length, or the invalid-handle code.
///
/// # Safety
///
/// `buf` must be NULL or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn bip353_result_uri(result: u64, buf: *mut c_char, len: usize) -> i64 {
    copy_field(result, buf, len, |outcome| {
        outcome
            .as_ref()
            .map(|i| i.uri().to_string())
            .unwrap_or_default()
    })
}

/// Copy the payment type (`on-chain`, `lightning`, `unified` or the name of an unrecognized
/// method) into `buf`. Empty for failed resolutions.
///
/// # Safety
///
/// `buf` must be NULL or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn bip353_result_payment_type(
    result: u64,
    buf: *mut c_char,
    len: usize,
) -> i64 {
    copy_field(result, buf, len, |outcome| {
        outcome
            .as_ref()
            .map(|i| i.payment_type().to_string())
            .unwrap_or_default()
    })
}

/// Copy the error message into `buf`. Empty for successful resolutions.
///
/// # Safety
///
/// `buf` must be NULL or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn bip353_result_error_message(
    result: u64,
    buf: *mut c_char,
    len: usize,
) -> i64 {
    copy_field(result, buf, len, |outcome| match outcome {
        Ok(_) => String::new(),
        Err(err) => err.to_string(),
    })
}

/// Release a result.
#[no_mangle]
pub extern "C" fn bip353_result_free(result: u64) -> c_int {
    release(&*RESULTS, result)
}
