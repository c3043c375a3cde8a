//! Module table exported by the cdylib

use std::ffi::{c_char, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};

use oxcmm_core::icc::RenderingIntent;
use oxcmm_core::module::abi::{ABI_VERSION, RawApiPtr, RawLinkRequest, RawModuleInfo, RawProfileTransformApi};
use oxcmm_core::module::{ApiKind, Capability, CmmApi, ColorLink, LinkRequest};
use oxcmm_core::{Options, PixelLayout};

use crate::MoxCmm;

struct FfiLink {
    link: Box<dyn ColorLink>,
    input_pixel_size: usize,
    output_pixel_size: usize,
}

/// # Safety
/// `ptr` must be null or point to `len` readable bytes.
unsafe fn bytes<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        return &[];
    }
    unsafe { std::slice::from_raw_parts(ptr, len) }
}

extern "C" fn can_handle(query: u32, value: u32) -> i32 {
    Capability::from_raw(query, value).is_some_and(|q| MoxCmm.can_handle(q)) as i32
}

unsafe extern "C" fn create_link(request: *const RawLinkRequest) -> *mut c_void {
    if request.is_null() {
        return std::ptr::null_mut();
    }
    let request = unsafe { &*request };
    let input = unsafe { bytes(request.input, request.input_len) };
    let output = unsafe { bytes(request.output, request.output_len) };
    let input_layout = PixelLayout::from_bits(request.input_layout);
    let output_layout = PixelLayout::from_bits(request.output_layout);

    let created = catch_unwind(AssertUnwindSafe(|| {
        let intent = RenderingIntent::from_u32(request.intent).ok()?;
        let options = Options::new();
        let link = MoxCmm.create_link(&LinkRequest {
            input,
            output,
            input_layout,
            output_layout,
            intent,
            options: &options,
        });
        match link {
            Ok(link) => Some(link),
            Err(e) => {
                tracing::warn!(error = %e, "moxcms link failed");
                None
            }
        }
    }));
    match created {
        Ok(Some(link)) => Box::into_raw(Box::new(FfiLink {
            link,
            input_pixel_size: input_layout.pixel_size(),
            output_pixel_size: output_layout.pixel_size(),
        })) as *mut c_void,
        _ => std::ptr::null_mut(),
    }
}

unsafe extern "C" fn convert(link: *mut c_void, src: *const u8, dst: *mut u8, pixels: usize) -> i32 {
    if link.is_null() || src.is_null() || dst.is_null() {
        return 1;
    }
    let link = unsafe { &*(link as *const FfiLink) };
    let src = unsafe { std::slice::from_raw_parts(src, pixels * link.input_pixel_size) };
    let dst = unsafe { std::slice::from_raw_parts_mut(dst, pixels * link.output_pixel_size) };
    match catch_unwind(AssertUnwindSafe(|| link.link.convert(src, dst, pixels))) {
        Ok(Ok(())) => 0,
        Ok(Err(_)) => 2,
        Err(_) => 3,
    }
}

unsafe extern "C" fn release_link(link: *mut c_void) {
    if !link.is_null() {
        drop(unsafe { Box::from_raw(link as *mut FfiLink) });
    }
}

static CMM_API: RawProfileTransformApi = RawProfileTransformApi {
    kind: ApiKind::ProfileTransform.number(),
    registration: c"org/oxcmm/cmm/moxcms".as_ptr(),
    can_handle: Some(can_handle),
    create_link: Some(create_link),
    convert: Some(convert),
    release_link: Some(release_link),
};

static APIS: [RawApiPtr; 1] = [RawApiPtr::from_table(&CMM_API)];

/// Table looked up by the module loader
#[allow(non_upper_case_globals)]
#[unsafe(no_mangle)]
pub static moxc_cmm_module: RawModuleInfo = RawModuleInfo {
    abi_version: ABI_VERSION,
    code: *b"moxc",
    name: c"moxcms".as_ptr(),
    version: concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char,
    api_count: APIS.len() as u32,
    apis: APIS.as_ptr(),
};

#[cfg(test)]
mod tests {
    use super::*;
    use oxcmm_core::icc::ColorSpace;
    use oxcmm_core::{DataType, Module, Profile};

    #[test]
    fn test_exported_table_validates() {
        let module = unsafe { Module::from_raw(&moxc_cmm_module, None) }.unwrap();
        assert_eq!(module.code(), crate::MODULE_CODE);
        assert_eq!(module.version(), env!("CARGO_PKG_VERSION"));

        let api = module.apis().next().unwrap();
        assert_eq!(api.registration(), crate::REGISTRATION);
        let cmm = api.as_cmm().unwrap();
        assert!(cmm.can_handle(Capability::DataType(DataType::U8)));
        assert!(!cmm.can_handle(Capability::DataType(DataType::Half)));

        let srgb = Profile::from_signature(ColorSpace::Rgb).to_memory();
        let options = Options::new();
        let layout = PixelLayout::new(3, DataType::U8);
        let link = cmm
            .create_link(&LinkRequest {
                input: &srgb,
                output: &srgb,
                input_layout: layout,
                output_layout: layout,
                intent: RenderingIntent::RelativeColorimetric,
                options: &options,
            })
            .unwrap();
        let mut dst = [0u8; 3];
        link.convert(&[10, 128, 250], &mut dst, 1).unwrap();
        assert!(dst[1].abs_diff(128) <= 1);
    }

    #[test]
    fn test_link_failure_is_null() {
        let request = RawLinkRequest {
            input: std::ptr::null(),
            input_len: 0,
            output: std::ptr::null(),
            output_len: 0,
            input_layout: PixelLayout::new(3, DataType::U8).bits(),
            output_layout: PixelLayout::new(3, DataType::U8).bits(),
            intent: 0,
        };
        assert!(unsafe { create_link(&request) }.is_null());
        assert_eq!(unsafe { convert(std::ptr::null_mut(), std::ptr::null(), std::ptr::null_mut(), 1) }, 1);
    }
}
