//! C ABI of module libraries
//!
//! A module library exports a static [`RawModuleInfo`] under the symbol
//! `<code>_cmm_module`. It lists API tables, each starting with a `kind`
//! discriminant (see [`super::ApiKind::number`]):
//!
//! | Kind | Table | Mandatory entries |
//! |------|-------|-------------------|
//! | 1 | [`RawProfileTransformApi`] | `can_handle`, `create_link`, `convert`, `release_link` |
//! | 2 | [`RawMonitorApi`] | `can_handle`, `count`, `profile` |
//! | 3 | [`RawTagCodecApi`] | `can_handle`, `decode_text` |
//! | 4 | [`RawFilterApi`] | `can_handle`, `run`, registration, connectors |
//!
//! Every table is validated before any of its pointers is used. A table
//! failing validation is skipped with a warning; the module keeps its other
//! tables.

use std::ffi::{CStr, c_char, c_void};
use std::ptr::NonNull;
use std::sync::Arc;

use libloading::Library;

use super::{ApiEntry, ApiKind, Capability, CmmApi, ColorLink, FilterFactory, LinkRequest, Module};
use super::{ModuleCode, MonitorApi, TagCodecApi};
use crate::connector::{Connector, Connectors};
use crate::conversion::{Feedback, PixelBlock};
use crate::error::{Error, Result};
use crate::icc::{TagValue, TextData};
use crate::layout::{DataType, PixelLayout};
use crate::message::report;
use crate::node::FilterNode;
use crate::object::Struct;
use crate::pixel_access::PixelAccess;

/// Version of the table layout described here
pub const ABI_VERSION: u32 = 1;

/// Answers a `(query, value)` pair from [`Capability::to_raw`]; non-zero is yes
pub type CanHandleFn = unsafe extern "C" fn(query: u32, value: u32) -> i32;

/// Module description exported by a library
#[repr(C)]
pub struct RawModuleInfo {
    pub abi_version: u32,
    pub code: [u8; 4],
    pub name: *const c_char,
    pub version: *const c_char,
    pub api_count: u32,
    pub apis: *const RawApiPtr,
}

/// Common head of every API table
#[repr(C)]
pub struct RawApiHeader {
    pub kind: u32,
}

/// Pointer to an API table
#[repr(transparent)]
pub struct RawApiPtr(pub *const RawApiHeader);

impl RawApiPtr {
    /// Point at a table whose first field is its `kind`
    pub const fn from_table<T>(table: &'static T) -> Self {
        Self(table as *const T as *const RawApiHeader)
    }
}

#[repr(C)]
pub struct RawLinkRequest {
    pub input: *const u8,
    pub input_len: usize,
    pub output: *const u8,
    pub output_len: usize,
    pub input_layout: u32,
    pub output_layout: u32,
    pub intent: u32,
}

/// Kind 1
#[repr(C)]
pub struct RawProfileTransformApi {
    pub kind: u32,
    pub registration: *const c_char,
    pub can_handle: Option<CanHandleFn>,
    /// Returns null on failure
    pub create_link: Option<unsafe extern "C" fn(request: *const RawLinkRequest) -> *mut c_void>,
    /// Returns 0 on success
    pub convert: Option<unsafe extern "C" fn(link: *mut c_void, src: *const u8, dst: *mut u8, pixels: usize) -> i32>,
    pub release_link: Option<unsafe extern "C" fn(link: *mut c_void)>,
}

/// Kind 2
#[repr(C)]
pub struct RawMonitorApi {
    pub kind: u32,
    pub registration: *const c_char,
    pub can_handle: Option<CanHandleFn>,
    pub count: Option<unsafe extern "C" fn() -> u32>,
    /// Writes up to `capacity` bytes, returns the full size or a negative error
    pub profile: Option<unsafe extern "C" fn(index: u32, out: *mut u8, capacity: usize) -> isize>,
}

/// Kind 3
#[repr(C)]
pub struct RawTagCodecApi {
    pub kind: u32,
    pub registration: *const c_char,
    pub can_handle: Option<CanHandleFn>,
    /// Decodes a payload to UTF-8 text; same size protocol as `profile`
    pub decode_text:
        Option<unsafe extern "C" fn(payload: *const u8, len: usize, out: *mut u8, capacity: usize) -> isize>,
}

/// Connector description of a filter table
#[repr(C)]
pub struct RawConnector {
    pub nick: *const c_char,
    pub connector_type: *const c_char,
    /// Bit `n` accepts [`DataType::from_bits`]`(n)`
    pub data_types: u32,
    pub min_channels: u32,
    pub max_channels: u32,
    pub min_color_channels: u32,
    pub max_color_channels: u32,
    pub flags: u32,
}

impl RawConnector {
    pub const CAN_PLANAR: u32 = 1;
    pub const CAN_INTERWOVEN: u32 = 1 << 1;
    pub const CAN_SWAP: u32 = 1 << 2;
    pub const CAN_SWAP_BYTES: u32 = 1 << 3;
    pub const CAN_REVERT: u32 = 1 << 4;
    pub const CAN_PREMULTIPLIED_ALPHA: u32 = 1 << 5;
    pub const CAN_NONPREMULTIPLIED_ALPHA: u32 = 1 << 6;
    pub const CAN_SUBPIXEL: u32 = 1 << 7;
    pub const MANDATORY: u32 = 1 << 8;
}

/// Block handed to a filter's `run`
#[repr(C)]
pub struct RawBlock {
    pub data: *mut u8,
    /// Valid bytes; on output the filter sets it, at most `capacity`
    pub len: usize,
    pub capacity: usize,
    pub pixels: usize,
    pub layout: u32,
}

/// Kind 4
#[repr(C)]
pub struct RawFilterApi {
    pub kind: u32,
    pub registration: *const c_char,
    pub name: *const c_char,
    pub category: *const c_char,
    pub can_handle: Option<CanHandleFn>,
    /// Returns a feedback code: 0 produced, negative end, positive error
    pub run: Option<unsafe extern "C" fn(input: *const RawBlock, output: *mut RawBlock) -> i32>,
    pub plugs: *const RawConnector,
    pub plug_count: u32,
    pub extra_plugs: u32,
    pub sockets: *const RawConnector,
    pub socket_count: u32,
    pub extra_sockets: u32,
}

// The tables are immutable statics in the exporting library.
unsafe impl Sync for RawModuleInfo {}
unsafe impl Sync for RawApiPtr {}
unsafe impl Sync for RawProfileTransformApi {}
unsafe impl Sync for RawMonitorApi {}
unsafe impl Sync for RawTagCodecApi {}
unsafe impl Sync for RawConnector {}
unsafe impl Sync for RawFilterApi {}

/// # Safety
/// `ptr` must be null or point to a NUL terminated string.
unsafe fn text(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok().map(str::to_string)
}

fn ask(can_handle: CanHandleFn, query: Capability) -> bool {
    let (q, v) = query.to_raw();
    unsafe { can_handle(q, v) != 0 }
}

/// Read a size-then-fill buffer through `fill(out, capacity)`
fn sized_buffer(mut fill: impl FnMut(*mut u8, usize) -> isize) -> std::result::Result<Vec<u8>, isize> {
    let size = fill(std::ptr::null_mut(), 0);
    if size < 0 {
        return Err(size);
    }
    let mut buffer = vec![0u8; size as usize];
    let written = fill(buffer.as_mut_ptr(), buffer.len());
    if written < 0 || written as usize > buffer.len() {
        return Err(written.min(-1));
    }
    buffer.truncate(written as usize);
    Ok(buffer)
}

type ConvertFn = unsafe extern "C" fn(*mut c_void, *const u8, *mut u8, usize) -> i32;
type ReleaseFn = unsafe extern "C" fn(*mut c_void);

struct RawCmm {
    registration: String,
    can_handle: CanHandleFn,
    create_link: unsafe extern "C" fn(*const RawLinkRequest) -> *mut c_void,
    convert: ConvertFn,
    release_link: ReleaseFn,
    library: Option<Arc<Library>>,
}

struct RawLink {
    handle: NonNull<c_void>,
    convert: ConvertFn,
    release_link: ReleaseFn,
    input_pixel_size: usize,
    output_pixel_size: usize,
    _library: Option<Arc<Library>>,
}

// Link handles must be usable from any thread; that is part of the ABI.
unsafe impl Send for RawLink {}
unsafe impl Sync for RawLink {}

impl ColorLink for RawLink {
    fn convert(&self, src: &[u8], dst: &mut [u8], pixels: usize) -> Result<()> {
        if src.len() < pixels * self.input_pixel_size || dst.len() < pixels * self.output_pixel_size {
            return Err(Error::BufferSize {
                expected: pixels * self.output_pixel_size,
                actual: dst.len(),
            });
        }
        let status = unsafe { (self.convert)(self.handle.as_ptr(), src.as_ptr(), dst.as_mut_ptr(), pixels) };
        match status {
            0 => Ok(()),
            code => Err(Error::Transform(format!("module convert returned {code}"))),
        }
    }
}

impl Drop for RawLink {
    fn drop(&mut self) {
        unsafe { (self.release_link)(self.handle.as_ptr()) }
    }
}

impl CmmApi for RawCmm {
    fn registration(&self) -> &str {
        &self.registration
    }

    fn can_handle(&self, query: Capability) -> bool {
        ask(self.can_handle, query)
    }

    fn create_link(&self, request: &LinkRequest<'_>) -> Result<Box<dyn ColorLink>> {
        let raw = RawLinkRequest {
            input: request.input.as_ptr(),
            input_len: request.input.len(),
            output: request.output.as_ptr(),
            output_len: request.output.len(),
            input_layout: request.input_layout.bits(),
            output_layout: request.output_layout.bits(),
            intent: request.intent.to_u32(),
        };
        let handle = unsafe { (self.create_link)(&raw) };
        let handle = NonNull::new(handle)
            .ok_or_else(|| Error::Transform(format!("'{}' could not create a link", self.registration)))?;
        Ok(Box::new(RawLink {
            handle,
            convert: self.convert,
            release_link: self.release_link,
            input_pixel_size: request.input_layout.pixel_size(),
            output_pixel_size: request.output_layout.pixel_size(),
            _library: self.library.clone(),
        }))
    }
}

struct RawMonitor {
    registration: String,
    can_handle: CanHandleFn,
    count: unsafe extern "C" fn() -> u32,
    profile: unsafe extern "C" fn(u32, *mut u8, usize) -> isize,
    _library: Option<Arc<Library>>,
}

impl MonitorApi for RawMonitor {
    fn registration(&self) -> &str {
        &self.registration
    }

    fn can_handle(&self, query: Capability) -> bool {
        ask(self.can_handle, query)
    }

    fn count(&self) -> usize {
        unsafe { (self.count)() as usize }
    }

    fn profile(&self, index: usize) -> Option<Vec<u8>> {
        let index = u32::try_from(index).ok()?;
        sized_buffer(|out, capacity| unsafe { (self.profile)(index, out, capacity) }).ok()
    }
}

struct RawTagCodec {
    registration: String,
    can_handle: CanHandleFn,
    decode_text: unsafe extern "C" fn(*const u8, usize, *mut u8, usize) -> isize,
    _library: Option<Arc<Library>>,
}

impl TagCodecApi for RawTagCodec {
    fn registration(&self) -> &str {
        &self.registration
    }

    fn can_handle(&self, query: Capability) -> bool {
        ask(self.can_handle, query)
    }

    fn decode(&self, payload: &[u8]) -> Result<TagValue> {
        let bytes = sized_buffer(|out, capacity| unsafe {
            (self.decode_text)(payload.as_ptr(), payload.len(), out, capacity)
        })
        .map_err(|code| Error::Module(format!("'{}' failed to decode with {code}", self.registration)))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| Error::Module(format!("'{}' returned invalid text: {e}", self.registration)))?;
        Ok(TagValue::Text(TextData::new(text)))
    }
}

struct RawFilter {
    registration: String,
    name: String,
    category: String,
    can_handle: CanHandleFn,
    run: unsafe extern "C" fn(*const RawBlock, *mut RawBlock) -> i32,
    connectors: Connectors,
    _library: Option<Arc<Library>>,
}

impl FilterFactory for RawFilter {
    fn registration(&self) -> &str {
        &self.registration
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn can_handle(&self, query: Capability) -> bool {
        ask(self.can_handle, query)
    }

    fn connectors(&self) -> &Connectors {
        &self.connectors
    }

    fn run(&self, node: &FilterNode, ticket: &mut PixelAccess) -> Feedback {
        let feedback = node.pull_upstream(0, ticket);
        if feedback != Feedback::Produced {
            return feedback;
        }
        let Some(mut block) = ticket.take_block() else {
            return Feedback::Failed(Error::NoInputImage.code());
        };
        let mut data = ticket.take_buffer(block.data.len());
        let input = RawBlock {
            data: block.data.as_mut_ptr(),
            len: block.data.len(),
            capacity: block.data.len(),
            pixels: block.pixels(),
            layout: block.layout.bits(),
        };
        let mut output = RawBlock {
            data: data.as_mut_ptr(),
            len: 0,
            capacity: data.len(),
            pixels: block.pixels(),
            layout: block.layout.bits(),
        };
        let feedback = Feedback::from_code(unsafe { (self.run)(&input, &mut output) });
        if feedback != Feedback::Produced {
            return feedback;
        }

        let layout = PixelLayout::from_bits(output.layout);
        if output.len > data.len() || output.len != layout.pixel_size() * block.pixels() {
            report!(
                Error,
                Some(node.object()),
                "'{}' produced {} bytes as {}",
                self.registration,
                output.len,
                layout
            );
            return Feedback::Failed(Error::BufferSize {
                expected: layout.pixel_size() * block.pixels(),
                actual: output.len,
            }
            .code());
        }
        data.truncate(output.len);
        ticket.recycle(std::mem::take(&mut block.data));
        ticket.set_block(PixelBlock { layout, data, ..block });
        Feedback::Produced
    }
}

/// # Safety
/// `list` must point to `count` connectors when non-null.
unsafe fn connectors_from_raw(list: *const RawConnector, count: u32, is_plug: bool) -> Option<Vec<Connector>> {
    if count == 0 {
        return Some(Vec::new());
    }
    if list.is_null() {
        return None;
    }
    let raw = unsafe { std::slice::from_raw_parts(list, count as usize) };
    raw.iter()
        .enumerate()
        .map(|(id, c)| {
            let nick = unsafe { text(c.nick) }?;
            let base = if is_plug { Connector::plug(&nick) } else { Connector::socket(&nick) };
            let data_types: Vec<DataType> = (0..6)
                .filter(|bit| c.data_types & (1 << bit) != 0)
                .filter_map(DataType::from_bits)
                .collect();
            let flag = |f: u32| c.flags & f != 0;
            Some(Connector {
                connector_type: unsafe { text(c.connector_type) }.unwrap_or(base.connector_type.clone()),
                data_types,
                min_channels: c.min_channels as usize,
                max_channels: c.max_channels as usize,
                min_color_channels: c.min_color_channels as usize,
                max_color_channels: c.max_color_channels as usize,
                can_planar: flag(RawConnector::CAN_PLANAR),
                can_interwoven: flag(RawConnector::CAN_INTERWOVEN),
                can_swap: flag(RawConnector::CAN_SWAP),
                can_swap_bytes: flag(RawConnector::CAN_SWAP_BYTES),
                can_revert: flag(RawConnector::CAN_REVERT),
                can_premultiplied_alpha: flag(RawConnector::CAN_PREMULTIPLIED_ALPHA),
                can_nonpremultiplied_alpha: flag(RawConnector::CAN_NONPREMULTIPLIED_ALPHA),
                can_subpixel: flag(RawConnector::CAN_SUBPIXEL),
                is_mandatory: flag(RawConnector::MANDATORY),
                id: id as u32,
                ..base
            })
        })
        .collect()
}

type Validated = std::result::Result<ApiEntry, &'static str>;

/// # Safety
/// `header` must point to a table of the kind it announces.
unsafe fn validate(header: *const RawApiHeader, library: &Option<Arc<Library>>) -> Validated {
    let kind = unsafe { (*header).kind };
    match ApiKind::from_number(kind) {
        Some(ApiKind::ProfileTransform) => {
            let t = unsafe { &*(header as *const RawProfileTransformApi) };
            Ok(ApiEntry::Cmm(Arc::new(RawCmm {
                registration: unsafe { text(t.registration) }.ok_or("registration is missing")?,
                can_handle: t.can_handle.ok_or("can_handle is null")?,
                create_link: t.create_link.ok_or("create_link is null")?,
                convert: t.convert.ok_or("convert is null")?,
                release_link: t.release_link.ok_or("release_link is null")?,
                library: library.clone(),
            })))
        }
        Some(ApiKind::Monitor) => {
            let t = unsafe { &*(header as *const RawMonitorApi) };
            Ok(ApiEntry::Monitor(Arc::new(RawMonitor {
                registration: unsafe { text(t.registration) }.ok_or("registration is missing")?,
                can_handle: t.can_handle.ok_or("can_handle is null")?,
                count: t.count.ok_or("count is null")?,
                profile: t.profile.ok_or("profile is null")?,
                _library: library.clone(),
            })))
        }
        Some(ApiKind::TagCodec) => {
            let t = unsafe { &*(header as *const RawTagCodecApi) };
            Ok(ApiEntry::TagCodec(Arc::new(RawTagCodec {
                registration: unsafe { text(t.registration) }.ok_or("registration is missing")?,
                can_handle: t.can_handle.ok_or("can_handle is null")?,
                decode_text: t.decode_text.ok_or("decode_text is null")?,
                _library: library.clone(),
            })))
        }
        Some(ApiKind::FilterFactory) => {
            let t = unsafe { &*(header as *const RawFilterApi) };
            let plugs = unsafe { connectors_from_raw(t.plugs, t.plug_count, true) }.ok_or("plug array is invalid")?;
            let sockets =
                unsafe { connectors_from_raw(t.sockets, t.socket_count, false) }.ok_or("socket array is invalid")?;
            if plugs.is_empty() {
                return Err("a filter needs at least one plug");
            }
            let registration = unsafe { text(t.registration) }.ok_or("registration is missing")?;
            Ok(ApiEntry::Filter(Arc::new(RawFilter {
                name: unsafe { text(t.name) }.unwrap_or_else(|| registration.clone()),
                category: unsafe { text(t.category) }.unwrap_or_default(),
                registration,
                can_handle: t.can_handle.ok_or("can_handle is null")?,
                run: t.run.ok_or("run is null")?,
                connectors: Connectors {
                    plugs,
                    extra_plugs: t.extra_plugs as usize,
                    sockets,
                    extra_sockets: t.extra_sockets as usize,
                },
                _library: library.clone(),
            })))
        }
        None => Err("unknown API kind"),
    }
}

impl Module {
    /// Wrap an exported module table.
    ///
    /// Invalid API tables are reported and skipped; a module without any
    /// valid table is rejected.
    ///
    /// # Safety
    /// `info` and everything reachable from it must stay valid for the
    /// lifetime of the returned module. For a module from a shared library,
    /// pass the library so it stays mapped.
    pub unsafe fn from_raw(info: &RawModuleInfo, library: Option<Arc<Library>>) -> Result<Module> {
        let code = ModuleCode::new(info.code);
        let abi_error = |reason: String| Error::ModuleAbi {
            code: code.to_string(),
            reason,
        };
        if info.abi_version != ABI_VERSION {
            return Err(abi_error(format!(
                "ABI version {} where {ABI_VERSION} is supported",
                info.abi_version
            )));
        }
        if info.apis.is_null() && info.api_count > 0 {
            return Err(abi_error("API list is null".into()));
        }

        let name = unsafe { text(info.name) }.unwrap_or_else(|| code.to_string());
        let version = unsafe { text(info.version) }.unwrap_or_default();
        let mut module = Module::new(code, name, version);
        for i in 0..info.api_count as usize {
            let header = unsafe { (*info.apis.add(i)).0 };
            if header.is_null() {
                report!(Warning, None, "module {}: API table {} is null", code, i);
                continue;
            }
            let kind = unsafe { (*header).kind };
            match unsafe { validate(header, &library) } {
                Ok(entry) => module = module.with_api(entry),
                Err(reason) => {
                    report!(
                        Warning,
                        None,
                        "module {}: API table {} rejected as kind {}: {}",
                        code,
                        i,
                        kind,
                        reason
                    );
                }
            }
        }
        if module.api_count() == 0 {
            return Err(abi_error("no valid API table".into()));
        }
        if let Some(library) = library {
            module = module.with_library(library);
        }
        tracing::debug!(%code, apis = module.api_count(), dynamic = module.is_dynamic(), "module validated");
        report!(Debug, Some(module.object()), "module {} loaded", code);
        Ok(module)
    }
}
