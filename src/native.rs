// ABOUTME: Native function bridge: library cache, marshalling and FFI calls

use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;
use bigdecimal::BigDecimal;
use libffi::middle::{Arg, Cif, CodePtr, Type};
use libloading::Library;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_char, CStr, CString};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// The native types a declaration can name, collapsed onto fixed-width
/// slots. On LP64 targets the C-named integer types map exactly; `long
/// double` marshals through `double`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeType {
    Void,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String8,
}

impl NativeType {
    /// Resolves a declared type name against the fixed table. Unknown
    /// names fail `unknown-native-type-name`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "void" => Ok(NativeType::Void),
            "uint8" | "unsigned char" => Ok(NativeType::U8),
            "uint16" | "unsigned short" => Ok(NativeType::U16),
            "uint32" | "unsigned int" => Ok(NativeType::U32),
            "uint64" | "unsigned long" => Ok(NativeType::U64),
            "int8" | "char" => Ok(NativeType::I8),
            "int16" | "short" => Ok(NativeType::I16),
            "int32" | "int" => Ok(NativeType::I32),
            "int64" | "long" => Ok(NativeType::I64),
            "float" => Ok(NativeType::F32),
            "double" | "long double" => Ok(NativeType::F64),
            "string8" | "const char*" => Ok(NativeType::String8),
            _ => Err(Error::new(ErrorKind::UnknownNativeTypeName {
                name: name.to_string(),
            })),
        }
    }

    fn ffi_type(self) -> Type {
        match self {
            NativeType::Void => Type::void(),
            NativeType::U8 => Type::u8(),
            NativeType::U16 => Type::u16(),
            NativeType::U32 => Type::u32(),
            NativeType::U64 => Type::u64(),
            NativeType::I8 => Type::i8(),
            NativeType::I16 => Type::i16(),
            NativeType::I32 => Type::i32(),
            NativeType::I64 => Type::i64(),
            NativeType::F32 => Type::f32(),
            NativeType::F64 => Type::f64(),
            NativeType::String8 => Type::pointer(),
        }
    }
}

/// Process-wide cache of loaded libraries. Handles are reference counted;
/// `update` evicts entries no caller holds anymore.
#[derive(Default)]
pub struct LibraryCache {
    libraries: HashMap<String, Arc<Library>>,
}

impl LibraryCache {
    fn instance() -> &'static Mutex<LibraryCache> {
        static CACHE: OnceLock<Mutex<LibraryCache>> = OnceLock::new();
        CACHE.get_or_init(|| Mutex::new(LibraryCache::default()))
    }

    fn lock() -> MutexGuard<'static, LibraryCache> {
        Self::instance().lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached handle for a library, loading it on a miss.
    pub fn load(library: &str) -> Result<Arc<Library>> {
        let mut cache = Self::lock();
        if let Some(handle) = cache.libraries.get(library) {
            return Ok(Arc::clone(handle));
        }
        // SAFETY: loading a shared library runs its initializers; the
        // interpreter extends the same trust to them as the host process.
        let handle = unsafe { Library::new(library) }.map_err(|e| {
            Error::new(ErrorKind::LibraryLoading {
                library: library.to_string(),
                reason: e.to_string(),
            })
        })?;
        let handle = Arc::new(handle);
        cache
            .libraries
            .insert(library.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Evicts every cached library whose handle is held only by the cache.
    pub fn update() {
        let mut cache = Self::lock();
        cache
            .libraries
            .retain(|_, handle| Arc::strong_count(handle) > 1);
    }
}

fn resolve_symbol(handle: &Library, library: &str, symbol: &str) -> Result<CodePtr> {
    // SAFETY: the symbol is only ever invoked through a Cif prepared from
    // the declared signature; an inaccurate declaration is the script's
    // contract to keep, exactly as with dlsym.
    let address = unsafe {
        handle
            .get::<unsafe extern "C" fn()>(symbol.as_bytes())
            .map(|f| *f)
    }
    .map_err(|e| {
        Error::new(ErrorKind::SymbolNotFound {
            library: library.to_string(),
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })
    })?;
    Ok(CodePtr::from_fun(address))
}

/// One converted argument, kept alive until the call returns.
#[derive(Debug)]
enum RawArg {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Ptr(*const c_char),
}

impl RawArg {
    fn as_arg(&self) -> Arg {
        match self {
            RawArg::U8(v) => Arg::new(v),
            RawArg::U16(v) => Arg::new(v),
            RawArg::U32(v) => Arg::new(v),
            RawArg::U64(v) => Arg::new(v),
            RawArg::I8(v) => Arg::new(v),
            RawArg::I16(v) => Arg::new(v),
            RawArg::I32(v) => Arg::new(v),
            RawArg::I64(v) => Arg::new(v),
            RawArg::F32(v) => Arg::new(v),
            RawArg::F64(v) => Arg::new(v),
            RawArg::Ptr(v) => Arg::new(v),
        }
    }
}

/// Converts script values into raw call data. Numeric conversions are
/// stateless; the string converter owns the NUL-terminated buffer so the
/// pointer stays valid across the call, which is what forces serialized
/// invocation of its function value.
#[derive(Debug)]
enum ArgMarshaller {
    Stateless(NativeType),
    Stateful(RefCell<CString>),
}

impl ArgMarshaller {
    fn new(ty: NativeType) -> Result<Self> {
        match ty {
            NativeType::Void => Err(Error::new(ErrorKind::VoidAsArgumentType)),
            NativeType::String8 => Ok(ArgMarshaller::Stateful(RefCell::new(CString::default()))),
            _ => Ok(ArgMarshaller::Stateless(ty)),
        }
    }

    fn has_state(&self) -> bool {
        matches!(self, ArgMarshaller::Stateful(_))
    }

    fn convert(&self, value: &Value) -> Result<RawArg> {
        match self {
            ArgMarshaller::Stateless(ty) => convert_numeric(*ty, value),
            ArgMarshaller::Stateful(buffer) => {
                let text = value.to_display_string();
                let c_string = CString::new(text).map_err(|_| Error::bad_cast(value, "string8"))?;
                *buffer.borrow_mut() = c_string;
                Ok(RawArg::Ptr(buffer.borrow().as_ptr()))
            }
        }
    }
}

fn int_argument(value: &Value) -> Result<BigInt> {
    match value.to_int()? {
        Value::Int(n) => Ok(n),
        other => Err(Error::bad_cast(&other, "int")),
    }
}

fn float_argument(value: &Value) -> Result<BigDecimal> {
    match value.to_float()? {
        Value::Float(d) => Ok(d),
        other => Err(Error::bad_cast(&other, "float")),
    }
}

fn integer_overflow(n: &BigInt, target: &'static str) -> Error {
    Error::new(ErrorKind::IntegerConversionOverflow {
        value: n.to_string(),
        target,
    })
}

fn convert_numeric(ty: NativeType, value: &Value) -> Result<RawArg> {
    match ty {
        NativeType::U8 => {
            let n = int_argument(value)?;
            Ok(RawArg::U8(n.to_u8().ok_or_else(|| integer_overflow(&n, "uint8"))?))
        }
        NativeType::U16 => {
            let n = int_argument(value)?;
            Ok(RawArg::U16(n.to_u16().ok_or_else(|| integer_overflow(&n, "uint16"))?))
        }
        NativeType::U32 => {
            let n = int_argument(value)?;
            Ok(RawArg::U32(n.to_u32().ok_or_else(|| integer_overflow(&n, "uint32"))?))
        }
        NativeType::U64 => {
            let n = int_argument(value)?;
            Ok(RawArg::U64(n.to_u64().ok_or_else(|| integer_overflow(&n, "uint64"))?))
        }
        NativeType::I8 => {
            let n = int_argument(value)?;
            Ok(RawArg::I8(n.to_i8().ok_or_else(|| integer_overflow(&n, "int8"))?))
        }
        NativeType::I16 => {
            let n = int_argument(value)?;
            Ok(RawArg::I16(n.to_i16().ok_or_else(|| integer_overflow(&n, "int16"))?))
        }
        NativeType::I32 => {
            let n = int_argument(value)?;
            Ok(RawArg::I32(n.to_i32().ok_or_else(|| integer_overflow(&n, "int32"))?))
        }
        NativeType::I64 => {
            let n = int_argument(value)?;
            Ok(RawArg::I64(n.to_i64().ok_or_else(|| integer_overflow(&n, "int64"))?))
        }
        NativeType::F32 => {
            let d = float_argument(value)?;
            let x = d.to_f32().filter(|x| x.is_finite()).ok_or_else(|| {
                Error::new(ErrorKind::FloatConversionOverflow {
                    value: d.to_string(),
                    target: "float",
                })
            })?;
            Ok(RawArg::F32(x))
        }
        NativeType::F64 => {
            let d = float_argument(value)?;
            let x = d.to_f64().filter(|x| x.is_finite()).ok_or_else(|| {
                Error::new(ErrorKind::FloatConversionOverflow {
                    value: d.to_string(),
                    target: "double",
                })
            })?;
            Ok(RawArg::F64(x))
        }
        NativeType::Void | NativeType::String8 => {
            Err(Error::new(ErrorKind::VoidAsArgumentType))
        }
    }
}

/// A script-level value calling a symbol in a dynamically loaded library.
///
/// Construction resolves the library and symbol through the process-wide
/// cache, prepares the call interface from the declared signature and sets
/// up the per-type marshallers. Calls are serialized through the mutex
/// only when a stateful marshaller is present.
pub struct NativeFunction {
    name: String,
    library: String,
    cif: Cif,
    code: CodePtr,
    // Holding the handle keeps the cache from evicting the library.
    _handle: Arc<Library>,
    argument_marshallers: Vec<ArgMarshaller>,
    result_marshaller: NativeType,
    lock: Mutex<()>,
    requires_locking: bool,
}

impl NativeFunction {
    pub fn new(
        name: String,
        library: String,
        result: String,
        argument_types: Vec<String>,
    ) -> Result<Self> {
        let handle = LibraryCache::load(&library)?;
        let code = resolve_symbol(&handle, &library, &name)?;

        let result_marshaller = NativeType::from_name(&result)?;
        let mut ffi_arguments = Vec::with_capacity(argument_types.len());
        let mut argument_marshallers = Vec::with_capacity(argument_types.len());
        for type_name in &argument_types {
            let ty = NativeType::from_name(type_name)?;
            ffi_arguments.push(ty.ffi_type());
            argument_marshallers.push(ArgMarshaller::new(ty)?);
        }
        let requires_locking = argument_marshallers.iter().any(ArgMarshaller::has_state);
        let cif = Cif::new(ffi_arguments, result_marshaller.ffi_type());

        Ok(NativeFunction {
            name,
            library,
            cif,
            code,
            _handle: handle,
            argument_marshallers,
            result_marshaller,
            lock: Mutex::new(()),
            requires_locking,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    /// Marshals the arguments, invokes the symbol and converts the result.
    /// The declared and supplied argument counts must match exactly.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        let expected = self.argument_marshallers.len();
        if args.len() < expected {
            return Err(Error::new(ErrorKind::NotEnoughArguments {
                function: self.name.clone(),
                expected,
                received: args.len(),
            }));
        }
        if args.len() > expected {
            return Err(Error::new(ErrorKind::TooManyArguments {
                function: self.name.clone(),
                expected,
                received: args.len(),
            }));
        }

        let _guard = if self.requires_locking {
            Some(self.lock.lock().unwrap_or_else(PoisonError::into_inner))
        } else {
            None
        };

        let raw: Vec<RawArg> = self
            .argument_marshallers
            .iter()
            .zip(args)
            .map(|(marshaller, value)| marshaller.convert(value))
            .collect::<Result<_>>()?;
        let call_args: Vec<Arg> = raw.iter().map(RawArg::as_arg).collect();

        self.invoke(&call_args)
    }

    fn invoke(&self, args: &[Arg]) -> Result<Value> {
        // SAFETY: the Cif was prepared from the declared signature and every
        // argument slot points at a live RawArg of the matching type.
        // Integer results are read as full words (libffi widens anything
        // narrower to ffi_arg) and truncated to the declared width.
        unsafe {
            match self.result_marshaller {
                NativeType::Void => {
                    self.cif.call::<()>(self.code, args);
                    Ok(Value::None)
                }
                NativeType::U8 => Ok(Value::Int(BigInt::from(
                    self.cif.call::<u64>(self.code, args) as u8,
                ))),
                NativeType::U16 => Ok(Value::Int(BigInt::from(
                    self.cif.call::<u64>(self.code, args) as u16,
                ))),
                NativeType::U32 => Ok(Value::Int(BigInt::from(
                    self.cif.call::<u64>(self.code, args) as u32,
                ))),
                NativeType::U64 => Ok(Value::Int(BigInt::from(
                    self.cif.call::<u64>(self.code, args),
                ))),
                NativeType::I8 => Ok(Value::Int(BigInt::from(
                    self.cif.call::<i64>(self.code, args) as i8,
                ))),
                NativeType::I16 => Ok(Value::Int(BigInt::from(
                    self.cif.call::<i64>(self.code, args) as i16,
                ))),
                NativeType::I32 => Ok(Value::Int(BigInt::from(
                    self.cif.call::<i64>(self.code, args) as i32,
                ))),
                NativeType::I64 => Ok(Value::Int(BigInt::from(
                    self.cif.call::<i64>(self.code, args),
                ))),
                NativeType::F32 => {
                    float_result(f64::from(self.cif.call::<f32>(self.code, args)))
                }
                NativeType::F64 => float_result(self.cif.call::<f64>(self.code, args)),
                NativeType::String8 => {
                    let pointer = self.cif.call::<*const c_char>(self.code, args);
                    if pointer.is_null() {
                        Ok(Value::Str(String::new()))
                    } else {
                        Ok(Value::Str(
                            CStr::from_ptr(pointer).to_string_lossy().into_owned(),
                        ))
                    }
                }
            }
        }
    }
}

fn float_result(x: f64) -> Result<Value> {
    BigDecimal::from_f64(x).map(Value::Float).ok_or_else(|| {
        Error::new(ErrorKind::FloatConversionOverflow {
            value: x.to_string(),
            target: "float",
        })
    })
}

impl Drop for NativeFunction {
    fn drop(&mut self) {
        LibraryCache::update();
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("library", &self.library)
            .field("result", &self.result_marshaller)
            .field("requires_locking", &self.requires_locking)
            .finish()
    }
}
