//! The runtime value model (spec §3, "Value").
//!
//! Values are `Send + Sync` because a future's resolved value may cross
//! machine/thread boundaries under the threaded scheduling strategy (spec
//! §4.4, §5): a continuation vmid scheduled on a different OS thread than
//! the one that resolved the future must be able to observe that value.

use std::fmt;
use std::sync::Arc;

/// Identifier of a machine (spec glossary: "Machine / vmid"). A future
/// pointer's identity *is* its vmid, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VmId(u64);

impl VmId {
    /// Constructs a `VmId` from its raw numeric value. Only the controller's
    /// machine allocator should mint new ids; this is exposed so storage
    /// back-ends can round-trip ids through persistence.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vm{}", self.0)
    }
}

/// A tagged runtime value (spec §3, "Value").
///
/// Future pointers (`Value::Future`) are first-class: comparable for
/// identity via the `vmid` they carry, and transparently chainable by the
/// controller (spec §4.3 `resolve_future`/`finish`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Symbol(Arc<str>),
    List(Arc<Vec<Value>>),
    /// A function pointer: the identifier used to look up a code location
    /// in the executable's `locations` table.
    FunctionPointer(Arc<str>),
    /// A future pointer, carrying the vmid whose future it references.
    Future(VmId),
    Null,
}

impl Value {
    pub fn is_future(&self) -> bool {
        matches!(self, Value::Future(_))
    }

    /// Returns the vmid this value points to, if it is a future pointer.
    pub fn as_future(&self) -> Option<VmId> {
        match self {
            Value::Future(vmid) => Some(*vmid),
            _ => None,
        }
    }

    pub fn string<S: Into<Arc<str>>>(s: S) -> Self {
        Value::Str(s.into())
    }

    pub fn symbol<S: Into<Arc<str>>>(s: S) -> Self {
        Value::Symbol(s.into())
    }

    pub fn function_pointer<S: Into<Arc<str>>>(s: S) -> Self {
        Value::FunctionPointer(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    /// A short type name, used in error messages and disassembly.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::FunctionPointer(_) => "function",
            Value::Future(_) => "future",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::FunctionPointer(name) => write!(f, "#<fn {name}>"),
            Value::Future(vmid) => write!(f, "#<future {vmid}>"),
            Value::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_identity_is_its_vmid() {
        let a = Value::Future(VmId::from_raw(1));
        let b = Value::Future(VmId::from_raw(1));
        let c = Value::Future(VmId::from_raw(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn as_future_roundtrips() {
        let v = Value::Future(VmId::from_raw(7));
        assert_eq!(v.as_future(), Some(VmId::from_raw(7)));
        assert_eq!(Value::Int(7).as_future(), None);
    }

    #[test]
    fn display_matches_type() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
