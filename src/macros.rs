/// Resolve and transmute a `RealSymbol` into a callable function pointer of
/// the given type. Every hook uses this once, at the top, before deciding
/// virtual-vs-passthrough.
macro_rules! get_real {
    ($real:expr, $ty:ty) => {
        std::mem::transmute::<*mut libc::c_void, $ty>($real.get())
    };
}

pub(crate) use get_real;
