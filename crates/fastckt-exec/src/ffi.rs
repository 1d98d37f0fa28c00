//! C ABI for hosts loading the interpreter as a shared library.
//!
//! Circuits cross the boundary as opaque `Circuit<u64>` pointers, so each
//! call evaluates up to 64 instances. The generator behind RANDOM gates is a
//! single process-wide [`RandomSource`] guarded by a mutex; it is seeded from
//! the clock on first use unless [`set_seed`] ran before.

use std::ffi::{CStr, c_char, c_int};
#[cfg(unix)]
use std::ffi::OsStr;
use std::path::Path;
use std::ptr;
use std::slice;
use std::sync::{Mutex, PoisonError};

use crate::error::status;
use crate::{Circuit, Lane, RandomSource};

static RNG: Mutex<Option<RandomSource>> = Mutex::new(None);

fn with_rng<T>(f: impl FnOnce(&mut RandomSource) -> T) -> T {
    let mut guard = RNG.lock().unwrap_or_else(PoisonError::into_inner);
    f(guard.get_or_insert_with(RandomSource::from_time))
}

/// Borrows a C string as a path. Unix paths are raw bytes and need not be
/// UTF-8.
#[cfg(unix)]
fn c_path(s: &CStr) -> Option<&Path> {
    use std::os::unix::ffi::OsStrExt;

    Some(Path::new(OsStr::from_bytes(s.to_bytes())))
}

#[cfg(not(unix))]
fn c_path(s: &CStr) -> Option<&Path> {
    s.to_str().ok().map(Path::new)
}

/// Reseeds the process-wide generator from the clock.
#[unsafe(no_mangle)]
pub extern "C" fn set_seed_time() {
    with_rng(RandomSource::set_seed_time);
}

/// Reseeds the process-wide generator deterministically.
#[unsafe(no_mangle)]
pub extern "C" fn set_seed(seed: u64) {
    with_rng(|rng| rng.set_seed(seed));
}

/// Loads a descriptor, returning null on any failure.
///
/// # Safety
///
/// `fname` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn load_circuit(fname: *const c_char) -> *mut Circuit<u64> {
    if fname.is_null() {
        return ptr::null_mut();
    }

    // SAFETY: checked non-null above, NUL termination is the caller's contract.
    let Some(path) = c_path(unsafe { CStr::from_ptr(fname) }) else {
        return ptr::null_mut();
    };

    match Circuit::load(path) {
        Ok(circuit) => Box::into_raw(Box::new(circuit)),
        Err(e) => {
            log::error!("failed to load {}: {e}", path.display());
            ptr::null_mut()
        }
    }
}

/// Releases a circuit returned by [`load_circuit`]. Null is ignored.
///
/// # Safety
///
/// `circuit` must come from [`load_circuit`] and must not be used (or freed)
/// again afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_circuit(circuit: *mut Circuit<u64>) {
    if circuit.is_null() {
        return;
    }
    // SAFETY: the pointer came from `Box::into_raw` in `load_circuit` and
    // ownership is handed back exactly once.
    unsafe { drop(Box::from_raw(circuit)) };
}

/// Runs `batch` instances, returning 0 on success or a negative status.
///
/// `inp` holds `batch` instances of `ceil(input_size / 8)` bytes and `out`
/// receives `batch` instances of `ceil(output_size / 8)` bytes. A null or
/// empty `trace_filename` disables tracing.
///
/// # Safety
///
/// `circuit` must be a live pointer from [`load_circuit`] not used
/// concurrently elsewhere; `inp`/`out` must be valid for the sizes above;
/// `trace_filename` must be null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn circuit_compute(
    circuit: *mut Circuit<u64>,
    inp: *const u8,
    out: *mut u8,
    trace_filename: *const c_char,
    batch: c_int,
) -> c_int {
    // SAFETY: the caller guarantees the pointer is live and exclusive.
    let Some(circuit) = (unsafe { circuit.as_mut() }) else {
        return status::BAD_ARGUMENT;
    };
    let Ok(batch) = usize::try_from(batch) else {
        return status::BAD_ARGUMENT;
    };
    if batch == 0 || batch > <u64 as Lane>::LANES {
        return status::BAD_ARGUMENT;
    }

    let in_len = batch * circuit.info().input_bytes();
    let out_len = batch * circuit.info().output_bytes();
    if (in_len > 0 && inp.is_null()) || (out_len > 0 && out.is_null()) {
        return status::BAD_ARGUMENT;
    }

    // SAFETY: non-null whenever the length is non-zero, sized by the caller's
    // contract.
    let inputs = if in_len == 0 {
        &[][..]
    } else {
        unsafe { slice::from_raw_parts(inp, in_len) }
    };
    let outputs = if out_len == 0 {
        &mut [][..]
    } else {
        unsafe { slice::from_raw_parts_mut(out, out_len) }
    };

    let trace_path = if trace_filename.is_null() {
        None
    } else {
        // SAFETY: non-null, NUL termination is the caller's contract.
        let Some(path) = c_path(unsafe { CStr::from_ptr(trace_filename) }) else {
            return status::TRACE_OPEN;
        };
        Some(path)
    };

    let res = with_rng(|rng| circuit.compute_to_path(inputs, outputs, trace_path, batch, rng));
    match res {
        Ok(()) => status::OK,
        Err(e) => {
            log::error!("circuit_compute failed: {e}");
            e.status()
        }
    }
}
