use std::ffi::{c_char, c_int, CString};
use std::path::{Path, PathBuf};
use std::ptr;

use libloading::{Library, Symbol};

use super::{Engine, EngineCall, EngineError, EngineOutcome};
use crate::data::header::encode_header;

/// Base name of the engine library; the platform prefix and suffix are added.
pub const ENGINE_LIBRARY: &str = "sofia";

/// Entry point looked up in the engine library.
pub const ENGINE_SYMBOL: &[u8] = b"mainline";

/// `int mainline(const char *parameter_file, const char *header, const float *data, size_t size)`
///
/// `header` is the primary header as concatenated 80-character cards ending
/// with `END`, or NULL. `data` holds `size` samples.
type MainlineFn = unsafe extern "C" fn(*const c_char, *const c_char, *const f32, usize) -> c_int;

/// Engine living in a shared library, resolved once at construction.
pub struct NativeEngine {
    path: PathBuf,
    mainline: MainlineFn,
    // Keeps `mainline` valid.
    _library: Library,
}

impl NativeEngine {
    /// Load the engine from `path` and resolve its entry point.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        log::info!("Loading engine library '{}'", path.display());

        // SAFETY: loading runs the library's initialisers; the engine library is trusted.
        let library = unsafe { Library::new(&path) }.map_err(|source| EngineError::Library {
            path: path.clone(),
            source,
        })?;

        // SAFETY: the symbol is declared with the signature in `MainlineFn`.
        let symbol: Result<Symbol<MainlineFn>, _> = unsafe { library.get(ENGINE_SYMBOL) };
        let mainline = *symbol.map_err(|source| EngineError::MissingSymbol {
            path: path.clone(),
            symbol: String::from_utf8_lossy(ENGINE_SYMBOL).into_owned(),
            source,
        })?;

        Ok(Self {
            path,
            mainline,
            _library: library,
        })
    }

    /// Load the engine from the platform's default search path
    /// (`libsofia.so`, `libsofia.dylib` or `sofia.dll`).
    pub fn open_default() -> Result<Self, EngineError> {
        Self::open(libloading::library_filename(ENGINE_LIBRARY))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Engine for NativeEngine {
    fn accepts_header(&self) -> bool {
        true
    }

    fn mainline(&self, call: EngineCall<'_>) -> Result<EngineOutcome, EngineError> {
        let parameter_file = CString::new(call.parameter_file.as_os_str().as_encoded_bytes())
            .map_err(|_| EngineError::InvalidArgument("parameter file path".to_string()))?;
        let header = match call.header {
            Some(header) => Some(
                CString::new(encode_header(header)?)
                    .map_err(|_| EngineError::InvalidArgument("header".to_string()))?,
            ),
            None => None,
        };
        let data = call.samples.as_raw();

        // SAFETY: every pointer outlives the call and the engine only reads through them.
        let status = unsafe {
            (self.mainline)(
                parameter_file.as_ptr(),
                header.as_ref().map_or(ptr::null(), |h| h.as_ptr()),
                data.as_ptr(),
                data.len(),
            )
        };
        Ok(EngineOutcome::new(status))
    }
}
