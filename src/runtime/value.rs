use std::fmt;

/// Runtime datum used by instruction operands, stack slots and `_RetVal`.
///
/// Literal kinds (`Int`, `Float`, `String`) are what scripts compute with.
/// The addressing kinds only ever appear as instruction operands and are
/// resolved by the VM before an instruction executes. `CallMarker` and
/// `StackBaseMarker` occupy the top slot of every call frame.
///
/// Strings are owned: pushing, popping and copying a value clones the buffer,
/// so destructive string instructions never alias another slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Uninitialized slot.
    #[default]
    Null,
    Int(i32),
    Float(f32),
    String(String),
    /// Absolute stack index; negative indices are frame-relative.
    StackIndex(i32),
    /// `base` plus the integer held in the slot at `offset_index`.
    RelStackIndex { base: i32, offset_index: i32 },
    InstrIndex(usize),
    FuncIndex(usize),
    HostCallIndex(usize),
    Register(Register),
    /// Linkage written by a script-initiated call.
    CallMarker(FrameLink),
    /// Linkage of a host-initiated synchronous call; unwinding it ends the call.
    StackBaseMarker(FrameLink),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    RetVal,
}

/// Callee function and the caller's frame base, saved in a frame's top slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLink {
    pub func: usize,
    pub caller_frame: usize,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:.6}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::StackIndex(i) => write!(f, "[{}]", i),
            Value::RelStackIndex { base, offset_index } => {
                write!(f, "[{} + [{}]]", base, offset_index)
            }
            Value::InstrIndex(i) => write!(f, "@{:04}", i),
            Value::FuncIndex(i) => write!(f, "func#{}", i),
            Value::HostCallIndex(i) => write!(f, "host#{}", i),
            Value::Register(Register::RetVal) => write!(f, "_RetVal"),
            Value::CallMarker(link) => {
                write!(f, "<frame func#{} base={}>", link.func, link.caller_frame)
            }
            Value::StackBaseMarker(link) => {
                write!(f, "<stack-base func#{} base={}>", link.func, link.caller_frame)
            }
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::StackIndex(_) => "stack index",
            Value::RelStackIndex { .. } => "relative stack index",
            Value::InstrIndex(_) => "instruction index",
            Value::FuncIndex(_) => "function index",
            Value::HostCallIndex(_) => "host call index",
            Value::Register(_) => "register",
            Value::CallMarker(_) => "call marker",
            Value::StackBaseMarker(_) => "stack-base marker",
        }
    }

    /// Integer view. Floats truncate toward zero, strings parse their leading
    /// integer prefix, everything else is `0`.
    pub fn coerce_int(&self) -> i32 {
        match self {
            Value::Int(v) => *v,
            Value::Float(v) => *v as i32,
            Value::String(s) => parse_int_prefix(s),
            _ => 0,
        }
    }

    /// Float view. Strings parse their leading float prefix, everything
    /// non-numeric is `0.0`.
    pub fn coerce_float(&self) -> f32 {
        match self {
            Value::Int(v) => *v as f32,
            Value::Float(v) => *v,
            Value::String(s) => parse_float_prefix(s),
            _ => 0.0,
        }
    }

    /// String view. Floats use six decimal digits.
    pub fn coerce_string(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Float(v) => format!("{:.6}", v),
            Value::String(s) => s.clone(),
            _ => String::new(),
        }
    }

    pub fn is_frame_marker(&self) -> bool {
        matches!(self, Value::CallMarker(_) | Value::StackBaseMarker(_))
    }
}

fn skip_sign(bytes: &[u8], mut pos: usize) -> usize {
    if matches!(bytes.get(pos), Some(b'+') | Some(b'-')) {
        pos += 1;
    }
    pos
}

fn skip_digits(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
        pos += 1;
    }
    pos
}

pub(crate) fn parse_int_prefix(s: &str) -> i32 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_start = skip_sign(bytes, 0);
    let end = skip_digits(bytes, digits_start);
    if end == digits_start {
        return 0;
    }
    let negative = bytes[0] == b'-';
    let mut acc: i64 = 0;
    for &b in &bytes[digits_start..end] {
        acc = (acc * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    let signed = if negative { -acc } else { acc };
    signed.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

pub(crate) fn parse_float_prefix(s: &str) -> f32 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let int_start = skip_sign(bytes, 0);
    let int_end = skip_digits(bytes, int_start);
    let mut end = int_end;
    let mut mantissa_digits = int_end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = skip_digits(bytes, end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let exp_start = skip_sign(bytes, end + 1);
        let exp_end = skip_digits(bytes, exp_start);
        if exp_end > exp_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f32>().unwrap_or(0.0)
}
