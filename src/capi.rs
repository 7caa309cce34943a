//! C bindings: a stable ABI for programs that load the engine as a shared
//! library. The matching header is `include/novelsm/c.h`.
//!
//! Conventions:
//! * Every type is an opaque pointer, created and destroyed by this module.
//! * Byte strings are passed as pointer + length; there is no slice type.
//! * Fallible calls take a `char** errptr` last. On entry `*errptr` is NULL
//!   or a message this library allocated. On success it is left alone; on
//!   failure the old message is freed and replaced by a new `malloc`-ed,
//!   NUL-terminated one. Release it with `novelsm_free` (or `free`).
//! * Bools are `unsigned char`, 0 is false.
//! * Pointer arguments must be non-NULL unless stated otherwise.

#![allow(non_camel_case_types)]

use std::ffi::{CStr, c_char, c_int, c_uchar, c_void};
use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;

use libc::size_t;
use tracing::warn;

use crate::batch::{BatchHandler, WriteBatch};
use crate::cache::Cache;
use crate::comparator::Comparator;
use crate::db::{self, Db, Range, Snapshot};
use crate::env::{Env, default_env};
use crate::error::{Error, Result};
use crate::filter::{BloomFilterPolicy, FilterPolicy};
use crate::iterator::DbIterator;
use crate::options::{CompressionType, Options, ReadOptions, WriteOptions};

pub const novelsm_no_compression: c_int = CompressionType::None as c_int;
pub const novelsm_zstd_compression: c_int = CompressionType::Zstd as c_int;

pub struct novelsm_t {
    db: Db,
}

pub struct novelsm_iterator_t {
    iter: DbIterator,
}

pub struct novelsm_writebatch_t {
    batch: WriteBatch,
}

pub struct novelsm_snapshot_t {
    snapshot: Snapshot,
}

pub struct novelsm_options_t {
    opts: Options,
}

pub struct novelsm_readoptions_t {
    opts: ReadOptions,
}

pub struct novelsm_writeoptions_t {
    opts: WriteOptions,
}

pub struct novelsm_cache_t {
    cache: Cache,
}

pub struct novelsm_env_t {
    env: Arc<dyn Env>,
}

pub struct novelsm_comparator_t {
    cmp: Arc<CComparator>,
}

pub struct novelsm_filterpolicy_t {
    policy: Arc<dyn FilterPolicy>,
}

type CompareFn = unsafe extern "C" fn(*mut c_void, *const c_char, size_t, *const c_char, size_t) -> c_int;
type NameFn = unsafe extern "C" fn(*mut c_void) -> *const c_char;
type DestructorFn = unsafe extern "C" fn(*mut c_void);
type CreateFilterFn = unsafe extern "C" fn(
    *mut c_void,
    *const *const c_char,
    *const size_t,
    c_int,
    *mut size_t,
) -> *mut c_char;
type KeyMayMatchFn =
    unsafe extern "C" fn(*mut c_void, *const c_char, size_t, *const c_char, size_t) -> c_uchar;

/// Comparator implemented by C callbacks. The destructor runs once the
/// options and databases using it have all let go.
struct CComparator {
    state: *mut c_void,
    destructor: DestructorFn,
    compare: CompareFn,
    name: String,
}

// The caller promises the callbacks are thread-safe.
unsafe impl Send for CComparator {}
unsafe impl Sync for CComparator {}

impl Comparator for CComparator {
    fn name(&self) -> &str {
        &self.name
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> std::cmp::Ordering {
        let r = unsafe {
            (self.compare)(
                self.state,
                a.as_ptr().cast(),
                a.len(),
                b.as_ptr().cast(),
                b.len(),
            )
        };
        r.cmp(&0)
    }
}

impl Drop for CComparator {
    fn drop(&mut self) {
        unsafe { (self.destructor)(self.state) }
    }
}

/// Filter policy implemented by C callbacks.
struct CFilterPolicy {
    state: *mut c_void,
    destructor: DestructorFn,
    create_filter: CreateFilterFn,
    key_may_match: KeyMayMatchFn,
    name: String,
}

unsafe impl Send for CFilterPolicy {}
unsafe impl Sync for CFilterPolicy {}

impl FilterPolicy for CFilterPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_filter(&self, keys: &[&[u8]]) -> Vec<u8> {
        let pointers: Vec<*const c_char> = keys.iter().map(|k| k.as_ptr().cast()).collect();
        let lengths: Vec<size_t> = keys.iter().map(|k| k.len()).collect();
        let mut len: size_t = 0;
        let filter = unsafe {
            (self.create_filter)(
                self.state,
                pointers.as_ptr(),
                lengths.as_ptr(),
                keys.len() as c_int,
                &mut len,
            )
        };
        if filter.is_null() {
            return Vec::new();
        }
        let copy = unsafe { bytes(filter, len) }.to_vec();
        unsafe { libc::free(filter.cast()) };
        copy
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        unsafe {
            (self.key_may_match)(
                self.state,
                key.as_ptr().cast(),
                key.len(),
                filter.as_ptr().cast(),
                filter.len(),
            ) != 0
        }
    }
}

impl Drop for CFilterPolicy {
    fn drop(&mut self) {
        unsafe { (self.destructor)(self.state) }
    }
}

/// Borrow `len` bytes at `data`. NULL or zero length is the empty slice.
unsafe fn bytes<'a>(data: *const c_char, len: size_t) -> &'a [u8] {
    if data.is_null() || len == 0 {
        return &[];
    }
    unsafe { std::slice::from_raw_parts(data.cast(), len) }
}

unsafe fn path_arg(name: *const c_char) -> PathBuf {
    PathBuf::from(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
}

/// `malloc`-ed copy of `data`, not NUL-terminated.
fn malloc_bytes(data: &[u8]) -> *mut c_char {
    unsafe {
        let buf = libc::malloc(data.len().max(1)).cast::<c_char>();
        if !buf.is_null() {
            ptr::copy_nonoverlapping(data.as_ptr().cast(), buf, data.len());
        }
        buf
    }
}

/// `malloc`-ed, NUL-terminated copy of `s`.
fn malloc_cstring(s: &str) -> *mut c_char {
    unsafe {
        let buf = libc::malloc(s.len() + 1).cast::<c_char>();
        if !buf.is_null() {
            ptr::copy_nonoverlapping(s.as_ptr().cast(), buf, s.len());
            *buf.add(s.len()) = 0;
        }
        buf
    }
}

/// Store `err` in the caller's error slot, freeing what was there.
unsafe fn save_error(errptr: *mut *mut c_char, err: &Error) {
    if errptr.is_null() {
        return;
    }
    unsafe {
        libc::free((*errptr).cast());
        *errptr = malloc_cstring(&err.to_string());
    }
}

/// `Some(value)` on success; on failure the error goes to `errptr`.
unsafe fn check<T>(errptr: *mut *mut c_char, result: Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            unsafe { save_error(errptr, &e) };
            None
        }
    }
}

fn into_raw<T>(value: T) -> *mut T {
    Box::into_raw(Box::new(value))
}

unsafe fn destroy<T>(ptr: *mut T) {
    if !ptr.is_null() {
        drop(unsafe { Box::from_raw(ptr) });
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_open(
    options: *const novelsm_options_t,
    name: *const c_char,
    errptr: *mut *mut c_char,
) -> *mut novelsm_t {
    let (options, name) = unsafe { (&(*options).opts, path_arg(name)) };
    match unsafe { check(errptr, Db::open(options, name)) } {
        Some(db) => into_raw(novelsm_t { db }),
        None => ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_close(db: *mut novelsm_t) {
    unsafe { destroy(db) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_put(
    db: *mut novelsm_t,
    options: *const novelsm_writeoptions_t,
    key: *const c_char,
    keylen: size_t,
    val: *const c_char,
    vallen: size_t,
    errptr: *mut *mut c_char,
) {
    unsafe {
        let result = (*db).db.put(&(*options).opts, bytes(key, keylen), bytes(val, vallen));
        check(errptr, result);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_delete(
    db: *mut novelsm_t,
    options: *const novelsm_writeoptions_t,
    key: *const c_char,
    keylen: size_t,
    errptr: *mut *mut c_char,
) {
    unsafe {
        let result = (*db).db.delete(&(*options).opts, bytes(key, keylen));
        check(errptr, result);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_write(
    db: *mut novelsm_t,
    options: *const novelsm_writeoptions_t,
    batch: *mut novelsm_writebatch_t,
    errptr: *mut *mut c_char,
) {
    unsafe {
        let result = (*db).db.write(&(*options).opts, &(*batch).batch);
        check(errptr, result);
    }
}

/// Returns NULL if not found. Otherwise a `malloc`-ed copy of the value,
/// with its length in `*vallen`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_get(
    db: *mut novelsm_t,
    options: *const novelsm_readoptions_t,
    key: *const c_char,
    keylen: size_t,
    vallen: *mut size_t,
    errptr: *mut *mut c_char,
) -> *mut c_char {
    let result = unsafe { (*db).db.get(&(*options).opts, bytes(key, keylen)) };
    let (value, len) = match unsafe { check(errptr, result) }.flatten() {
        Some(v) => (malloc_bytes(&v), v.len()),
        None => (ptr::null_mut(), 0),
    };
    unsafe { *vallen = len };
    value
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_create_iterator(
    db: *mut novelsm_t,
    options: *const novelsm_readoptions_t,
) -> *mut novelsm_iterator_t {
    let iter = unsafe { (*db).db.new_iterator(&(*options).opts) };
    into_raw(novelsm_iterator_t { iter })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_create_snapshot(db: *mut novelsm_t) -> *const novelsm_snapshot_t {
    let snapshot = unsafe { (*db).db.snapshot() };
    into_raw(novelsm_snapshot_t { snapshot })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_release_snapshot(db: *mut novelsm_t, snapshot: *const novelsm_snapshot_t) {
    unsafe {
        let handle = Box::from_raw(snapshot.cast_mut());
        (*db).db.release_snapshot(handle.snapshot);
    }
}

/// Returns NULL if `propname` is not recognized, else a `malloc`-ed
/// NUL-terminated value.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_property_value(db: *mut novelsm_t, propname: *const c_char) -> *mut c_char {
    let name = unsafe { CStr::from_ptr(propname) }.to_string_lossy();
    match unsafe { (*db).db.get_property(&name) } {
        Some(value) => malloc_cstring(&value),
        None => ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_approximate_sizes(
    db: *mut novelsm_t,
    num_ranges: c_int,
    range_start_key: *const *const c_char,
    range_start_key_len: *const size_t,
    range_limit_key: *const *const c_char,
    range_limit_key_len: *const size_t,
    sizes: *mut u64,
) {
    let n = usize::try_from(num_ranges).unwrap_or(0);
    let ranges: Vec<Range<'_>> = (0..n)
        .map(|i| unsafe {
            Range::new(
                bytes(*range_start_key.add(i), *range_start_key_len.add(i)),
                bytes(*range_limit_key.add(i), *range_limit_key_len.add(i)),
            )
        })
        .collect();
    let result = unsafe { (*db).db.approximate_sizes(&ranges) };
    let estimates = result.unwrap_or_else(|e| {
        warn!(error = %e, "approximate_sizes failed");
        vec![0; n]
    });
    for (i, size) in estimates.into_iter().enumerate() {
        unsafe { *sizes.add(i) = size };
    }
}

/// A NULL key means "open on that side".
#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_compact_range(
    db: *mut novelsm_t,
    start_key: *const c_char,
    start_key_len: size_t,
    limit_key: *const c_char,
    limit_key_len: size_t,
) {
    unsafe {
        let start = (!start_key.is_null()).then(|| bytes(start_key, start_key_len));
        let limit = (!limit_key.is_null()).then(|| bytes(limit_key, limit_key_len));
        if let Err(e) = (*db).db.compact_range(start, limit) {
            warn!(error = %e, "compact_range failed");
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_destroy_db(
    options: *const novelsm_options_t,
    name: *const c_char,
    errptr: *mut *mut c_char,
) {
    unsafe {
        let result = db::destroy_db(&(*options).opts, path_arg(name));
        check(errptr, result);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_repair_db(
    options: *const novelsm_options_t,
    name: *const c_char,
    errptr: *mut *mut c_char,
) {
    unsafe {
        let result = db::repair_db(&(*options).opts, path_arg(name));
        check(errptr, result);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_iter_destroy(iter: *mut novelsm_iterator_t) {
    unsafe { destroy(iter) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_iter_valid(iter: *const novelsm_iterator_t) -> c_uchar {
    unsafe { (*iter).iter.is_valid() as c_uchar }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_iter_seek_to_first(iter: *mut novelsm_iterator_t) {
    unsafe { (*iter).iter.seek_to_first() }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_iter_seek_to_last(iter: *mut novelsm_iterator_t) {
    unsafe { (*iter).iter.seek_to_last() }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_iter_seek(iter: *mut novelsm_iterator_t, k: *const c_char, klen: size_t) {
    unsafe { (*iter).iter.seek(bytes(k, klen)) }
}

/// Undefined on an invalid iterator: the move is refused and recorded as the
/// iterator's error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_iter_next(iter: *mut novelsm_iterator_t) {
    unsafe { (*iter).iter.next() }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_iter_prev(iter: *mut novelsm_iterator_t) {
    unsafe { (*iter).iter.prev() }
}

/// Must only be called on a valid iterator. The result points into the
/// iterator and is invalidated by its next move.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_iter_key(iter: *const novelsm_iterator_t, klen: *mut size_t) -> *const c_char {
    unsafe {
        let key = (*iter).iter.key();
        *klen = key.len();
        key.as_ptr().cast()
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_iter_value(iter: *const novelsm_iterator_t, vlen: *mut size_t) -> *const c_char {
    unsafe {
        let value = (*iter).iter.value();
        *vlen = value.len();
        value.as_ptr().cast()
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_iter_get_error(iter: *const novelsm_iterator_t, errptr: *mut *mut c_char) {
    unsafe {
        let status = (*iter).iter.status();
        check(errptr, status);
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn novelsm_writebatch_create() -> *mut novelsm_writebatch_t {
    into_raw(novelsm_writebatch_t {
        batch: WriteBatch::new(),
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_writebatch_destroy(batch: *mut novelsm_writebatch_t) {
    unsafe { destroy(batch) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_writebatch_clear(batch: *mut novelsm_writebatch_t) {
    unsafe { (*batch).batch.clear() }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_writebatch_put(
    batch: *mut novelsm_writebatch_t,
    key: *const c_char,
    klen: size_t,
    val: *const c_char,
    vlen: size_t,
) {
    unsafe { (*batch).batch.put(bytes(key, klen), bytes(val, vlen)) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_writebatch_delete(batch: *mut novelsm_writebatch_t, key: *const c_char, klen: size_t) {
    unsafe { (*batch).batch.delete(bytes(key, klen)) }
}

struct CBatchHandler {
    state: *mut c_void,
    put: unsafe extern "C" fn(*mut c_void, *const c_char, size_t, *const c_char, size_t),
    deleted: unsafe extern "C" fn(*mut c_void, *const c_char, size_t),
}

impl BatchHandler for CBatchHandler {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        unsafe {
            (self.put)(
                self.state,
                key.as_ptr().cast(),
                key.len(),
                value.as_ptr().cast(),
                value.len(),
            )
        }
    }

    fn delete(&mut self, key: &[u8]) {
        unsafe { (self.deleted)(self.state, key.as_ptr().cast(), key.len()) }
    }
}

/// Calls `put` or `deleted` for each record, in the order they were added.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_writebatch_iterate(
    batch: *mut novelsm_writebatch_t,
    state: *mut c_void,
    put: unsafe extern "C" fn(*mut c_void, *const c_char, size_t, *const c_char, size_t),
    deleted: unsafe extern "C" fn(*mut c_void, *const c_char, size_t),
) {
    let mut handler = CBatchHandler { state, put, deleted };
    if let Err(e) = unsafe { (*batch).batch.iterate(&mut handler) } {
        warn!(error = %e, "write batch iteration stopped");
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn novelsm_options_create() -> *mut novelsm_options_t {
    into_raw(novelsm_options_t {
        opts: Options::default(),
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_destroy(options: *mut novelsm_options_t) {
    unsafe { destroy(options) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_comparator(
    options: *mut novelsm_options_t,
    cmp: *mut novelsm_comparator_t,
) {
    unsafe {
        (*options).opts.comparator = Arc::clone(&(*cmp).cmp) as Arc<dyn Comparator>;
    }
}

/// A NULL policy removes the filter policy.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_filter_policy(
    options: *mut novelsm_options_t,
    policy: *mut novelsm_filterpolicy_t,
) {
    unsafe {
        (*options).opts.filter_policy = policy.as_ref().map(|p| Arc::clone(&p.policy));
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_create_if_missing(options: *mut novelsm_options_t, v: c_uchar) {
    unsafe { (*options).opts.create_if_missing = v != 0 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_error_if_exists(options: *mut novelsm_options_t, v: c_uchar) {
    unsafe { (*options).opts.error_if_exists = v != 0 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_paranoid_checks(options: *mut novelsm_options_t, v: c_uchar) {
    unsafe { (*options).opts.paranoid_checks = v != 0 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_env(options: *mut novelsm_options_t, env: *mut novelsm_env_t) {
    unsafe { (*options).opts.env = Arc::clone(&(*env).env) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_write_buffer_size(options: *mut novelsm_options_t, size: size_t) {
    unsafe { (*options).opts.write_buffer_size = size }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_max_open_files(options: *mut novelsm_options_t, n: c_int) {
    unsafe { (*options).opts.max_open_files = usize::try_from(n).unwrap_or(0) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_cache(options: *mut novelsm_options_t, cache: *mut novelsm_cache_t) {
    unsafe { (*options).opts.block_cache = Some((*cache).cache.clone()) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_block_size(options: *mut novelsm_options_t, size: size_t) {
    unsafe { (*options).opts.block_size = size }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_block_restart_interval(options: *mut novelsm_options_t, n: c_int) {
    unsafe { (*options).opts.block_restart_interval = usize::try_from(n).unwrap_or(0) }
}

/// Unknown values leave the setting unchanged.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_options_set_compression(options: *mut novelsm_options_t, t: c_int) {
    match u8::try_from(t).ok().and_then(CompressionType::from_u8) {
        Some(compression) => unsafe { (*options).opts.compression = compression },
        None => warn!(value = t, "unknown compression type ignored"),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_comparator_create(
    state: *mut c_void,
    destructor: DestructorFn,
    compare: CompareFn,
    name: NameFn,
) -> *mut novelsm_comparator_t {
    let name = unsafe { CStr::from_ptr(name(state)) }.to_string_lossy().into_owned();
    into_raw(novelsm_comparator_t {
        cmp: Arc::new(CComparator {
            state,
            destructor,
            compare,
            name,
        }),
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_comparator_destroy(cmp: *mut novelsm_comparator_t) {
    unsafe { destroy(cmp) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_filterpolicy_create(
    state: *mut c_void,
    destructor: DestructorFn,
    create_filter: CreateFilterFn,
    key_may_match: KeyMayMatchFn,
    name: NameFn,
) -> *mut novelsm_filterpolicy_t {
    let name = unsafe { CStr::from_ptr(name(state)) }.to_string_lossy().into_owned();
    into_raw(novelsm_filterpolicy_t {
        policy: Arc::new(CFilterPolicy {
            state,
            destructor,
            create_filter,
            key_may_match,
            name,
        }),
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_filterpolicy_destroy(policy: *mut novelsm_filterpolicy_t) {
    unsafe { destroy(policy) }
}

#[unsafe(no_mangle)]
pub extern "C" fn novelsm_filterpolicy_create_bloom(bits_per_key: c_int) -> *mut novelsm_filterpolicy_t {
    let bits = usize::try_from(bits_per_key).unwrap_or(0);
    into_raw(novelsm_filterpolicy_t {
        policy: Arc::new(BloomFilterPolicy::new(bits)),
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn novelsm_readoptions_create() -> *mut novelsm_readoptions_t {
    into_raw(novelsm_readoptions_t {
        opts: ReadOptions::default(),
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_readoptions_destroy(options: *mut novelsm_readoptions_t) {
    unsafe { destroy(options) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_readoptions_set_verify_checksums(options: *mut novelsm_readoptions_t, v: c_uchar) {
    unsafe { (*options).opts.verify_checksums = v != 0 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_readoptions_set_fill_cache(options: *mut novelsm_readoptions_t, v: c_uchar) {
    unsafe { (*options).opts.fill_cache = v != 0 }
}

/// A NULL snapshot reads the latest state. The options keep the snapshot
/// pinned until they are pointed elsewhere or destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_readoptions_set_snapshot(
    options: *mut novelsm_readoptions_t,
    snapshot: *const novelsm_snapshot_t,
) {
    unsafe {
        (*options).opts.snapshot = snapshot.as_ref().map(|s| s.snapshot.clone());
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn novelsm_writeoptions_create() -> *mut novelsm_writeoptions_t {
    into_raw(novelsm_writeoptions_t {
        opts: WriteOptions::default(),
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_writeoptions_destroy(options: *mut novelsm_writeoptions_t) {
    unsafe { destroy(options) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_writeoptions_set_sync(options: *mut novelsm_writeoptions_t, v: c_uchar) {
    unsafe { (*options).opts.sync = v != 0 }
}

#[unsafe(no_mangle)]
pub extern "C" fn novelsm_cache_create_lru(capacity: size_t) -> *mut novelsm_cache_t {
    into_raw(novelsm_cache_t {
        cache: Cache::new_lru(capacity),
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_cache_destroy(cache: *mut novelsm_cache_t) {
    unsafe { destroy(cache) }
}

#[unsafe(no_mangle)]
pub extern "C" fn novelsm_create_default_env() -> *mut novelsm_env_t {
    into_raw(novelsm_env_t { env: default_env() })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_env_destroy(env: *mut novelsm_env_t) {
    unsafe { destroy(env) }
}

/// Release memory returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn novelsm_free(ptr: *mut c_void) {
    unsafe { libc::free(ptr) }
}

#[unsafe(no_mangle)]
pub extern "C" fn novelsm_major_version() -> c_int {
    db::major_version()
}

#[unsafe(no_mangle)]
pub extern "C" fn novelsm_minor_version() -> c_int {
    db::minor_version()
}
