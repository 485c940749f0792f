/// The reason an execution terminated abnormally.
///
/// A trap is an ordinary outcome of [`execute`](crate::execute), not an
/// [`Error`](crate::Error): the instance stays usable and reflects every
/// write that happened before the trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, onlyerror::Error)]
pub enum Trap {
    /// Code that was supposed to have been unreachable was reached.
    #[error("unreachable code executed")]
    UnreachableCodeReached,
    /// An out-of-bounds linear memory access.
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    /// Out-of-bounds access to a table.
    #[error("out of bounds table access")]
    TableOutOfBounds,
    /// Indirect call through an uninitialized table element.
    #[error("accessed uninitialized table element")]
    IndirectCallToNull,
    /// Signature mismatch on indirect call.
    #[error("indirect call signature mismatch")]
    BadSignature,
    /// An integer arithmetic operation caused an overflow.
    #[error("integer overflow")]
    IntegerOverflow,
    /// An integer division by zero.
    #[error("integer division by zero")]
    IntegerDivisionByZero,
    /// Failed float-to-int conversion.
    #[error("invalid conversion to integer")]
    BadConversionToInteger,
    /// The call depth limit was reached.
    #[error("call stack exhausted")]
    CallStackExhausted,
    /// The metered execution context ran out of ticks.
    #[error("execution budget exhausted")]
    TicksExhausted,
}
