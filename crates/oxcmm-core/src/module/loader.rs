//! Finding and opening module libraries

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;

use super::abi::RawModuleInfo;
use super::{Module, ModuleCode};
use crate::error::{Error, Result};
use crate::message::report;

fn is_library(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("so") | Some("dylib") | Some("dll")
    )
}

/// Module code of a library file named like `liboxcm_cmm_module.so`.
///
/// The code is the four characters right before `marker` in the file stem.
pub fn module_code_from_path(path: &Path, marker: &str) -> Option<ModuleCode> {
    if !is_library(path) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let end = stem.find(marker)?;
    let start = end.checked_sub(4)?;
    ModuleCode::parse(stem.get(start..end)?)
}

/// Library files under `paths` carrying `marker`, optionally only those of
/// one module code. Unreadable directories are reported and skipped.
pub fn discover(paths: &[PathBuf], marker: &str, required: Option<ModuleCode>) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in paths {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                report!(Warning, None, "module path {}: {}", dir.display(), e);
                continue;
            }
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| match module_code_from_path(path, marker) {
                Some(code) => required.is_none_or(|r| r == code),
                None => false,
            })
            .collect();
        files.sort();
        tracing::debug!(dir = %dir.display(), count = files.len(), "module directory scanned");
        found.extend(files);
    }
    found
}

/// Open a library and validate its module table
pub(crate) fn open(path: &Path, marker: &str) -> Result<Module> {
    let code = module_code_from_path(path, marker)
        .ok_or_else(|| Error::Module(format!("{} is not a module library", path.display())))?;
    let library = unsafe { Library::new(path) }?;
    let library = Arc::new(library);
    let symbol = format!("{code}{marker}\0");
    // the symbol is the static table itself
    let info: *const RawModuleInfo = unsafe { *library.get::<*const RawModuleInfo>(symbol.as_bytes())? };
    if info.is_null() {
        return Err(Error::ModuleAbi {
            code: code.to_string(),
            reason: "module table is null".into(),
        });
    }
    // The table lives as long as the library, which the module keeps.
    let module = unsafe { Module::from_raw(&*info, Some(library.clone())) }?;
    if module.code() != code {
        return Err(Error::ModuleAbi {
            code: code.to_string(),
            reason: format!("table announces code {}", module.code()),
        });
    }
    tracing::info!(%code, path = %path.display(), "module library opened");
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MODULE_MARKER;

    #[test]
    fn test_module_code_from_path() {
        let code = module_code_from_path(Path::new("/usr/lib/liboxcm_cmm_module.so"), MODULE_MARKER);
        assert_eq!(code, Some(ModuleCode::new(*b"oxcm")));
        let code = module_code_from_path(Path::new("moxc_cmm_module.dll"), MODULE_MARKER);
        assert_eq!(code, Some(ModuleCode::new(*b"moxc")));
        assert_eq!(module_code_from_path(Path::new("liboxcm_cmm_module.txt"), MODULE_MARKER), None);
        assert_eq!(module_code_from_path(Path::new("ab_cmm_module.so"), MODULE_MARKER), None);
        assert_eq!(module_code_from_path(Path::new("libfoo.so"), MODULE_MARKER), None);
    }

    #[test]
    fn test_discover_filters_files() {
        let dir = std::env::temp_dir().join(format!("oxcmm-discover-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["libmoxc_cmm_module.so", "libabcd_cmm_module.so", "notes.txt", "libother.so"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let all = discover(&[dir.clone()], MODULE_MARKER, None);
        assert_eq!(all.len(), 2);
        let one = discover(&[dir.clone()], MODULE_MARKER, Some(ModuleCode::new(*b"moxc")));
        assert_eq!(one, vec![dir.join("libmoxc_cmm_module.so")]);
        assert!(discover(&[dir.join("missing")], MODULE_MARKER, None).is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_open_rejects_non_library() {
        let dir = std::env::temp_dir().join(format!("oxcmm-open-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("libzzzz_cmm_module.so");
        std::fs::write(&path, b"not an object file").unwrap();
        assert!(matches!(open(&path, MODULE_MARKER), Err(Error::Library(_))));
        assert!(matches!(open(&dir.join("plain.so"), MODULE_MARKER), Err(Error::Module(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
