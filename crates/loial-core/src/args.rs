//! Call arguments and argument passing wrappers.
//!
//! [`AsPointer`] and [`AsRef`] are shared handles: the caller keeps a clone
//! and observes what the native side did. Only `AsPointer` is written back
//! after the call.

use std::cell::RefCell;
use std::rc::Rc;

use crate::structs::StructValue;
use crate::value::Value;

/// Pass the wrapped value's address; the handle receives the native value
/// after the call returns.
#[derive(Debug, Clone, Default)]
pub struct AsPointer(Rc<RefCell<Value>>);

impl AsPointer {
    pub fn new(value: impl Into<Value>) -> Self {
        AsPointer(Rc::new(RefCell::new(value.into())))
    }

    /// Current value.
    pub fn value(&self) -> Value {
        self.0.borrow().clone()
    }

    /// Replace the wrapped value.
    pub fn set(&self, value: impl Into<Value>) {
        *self.0.borrow_mut() = value.into();
    }

    /// Whether two handles share the same cell.
    pub fn ptr_eq(&self, other: &AsPointer) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Pass the wrapped value's address without reading it back.
#[derive(Debug, Clone, Default)]
pub struct AsRef(Rc<RefCell<Value>>);

impl AsRef {
    pub fn new(value: impl Into<Value>) -> Self {
        AsRef(Rc::new(RefCell::new(value.into())))
    }

    pub fn value(&self) -> Value {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: impl Into<Value>) {
        *self.0.borrow_mut() = value.into();
    }
}

/// One argument of a call.
#[derive(Debug, Clone)]
pub enum Arg {
    Value(Value),
    Pointer(AsPointer),
    Ref(AsRef),
}

impl Arg {
    /// The value carried, read through any wrapper.
    pub fn value(&self) -> Value {
        match self {
            Arg::Value(v) => v.clone(),
            Arg::Pointer(p) => p.value(),
            Arg::Ref(r) => r.value(),
        }
    }
}

impl From<AsPointer> for Arg {
    fn from(p: AsPointer) -> Self {
        Arg::Pointer(p)
    }
}

impl From<&AsPointer> for Arg {
    fn from(p: &AsPointer) -> Self {
        Arg::Pointer(p.clone())
    }
}

impl From<AsRef> for Arg {
    fn from(r: AsRef) -> Self {
        Arg::Ref(r)
    }
}

impl From<&AsRef> for Arg {
    fn from(r: &AsRef) -> Self {
        Arg::Ref(r.clone())
    }
}

macro_rules! arg_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(v: $ty) -> Self {
                    Arg::Value(Value::from(v))
                }
            }
        )*
    };
}

arg_from_value!(
    Value, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, &str, String,
    StructValue
);

impl<T: Into<Value>> From<Vec<T>> for Arg {
    fn from(items: Vec<T>) -> Self {
        Arg::Value(Value::from(items))
    }
}

/// Positional and keyword arguments of a single call.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Arg>,
    pub keyword: Vec<(String, Arg)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.positional.push(arg.into());
        self
    }

    /// Append a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, arg: impl Into<Arg>) -> Self {
        self.keyword.push((name.into(), arg.into()));
        self
    }

    /// Every `AsPointer` handle in the call, positional first.
    pub fn pointers(&self) -> impl Iterator<Item = &AsPointer> {
        self.positional
            .iter()
            .chain(self.keyword.iter().map(|(_, arg)| arg))
            .filter_map(|arg| match arg {
                Arg::Pointer(p) => Some(p),
                _ => None,
            })
    }
}

/// Build [`CallArgs`]: positional arguments, then `;` and `name = value`
/// keyword arguments.
///
/// ```
/// let call = loial_core::call_args![1, 2.5; c = 3];
/// assert_eq!(call.positional.len(), 2);
/// assert_eq!(call.keyword[0].0, "c");
/// ```
#[macro_export]
macro_rules! call_args {
    ($($arg:expr),* $(,)? $(; $($key:ident = $val:expr),* $(,)?)?) => {{
        #[allow(unused_mut)]
        let mut call = $crate::CallArgs::new();
        $( call = call.arg($arg); )*
        $($( call = call.kwarg(stringify!($key), $val); )*)?
        call
    }};
}
