use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The rewriting pipeline is an offline batch transformation: none of these conditions are
/// retried internally. They propagate to the caller, which must abort the run instead of
/// serializing a partially patched binary.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::NotFound`] - A named function is not present in the control flow graph
/// - [`Error::Malformed`] - Inconsistent program, image or configuration data
/// - [`Error::NotSupported`] - Input uses a feature or machine type that is not handled
/// - [`Error::GoblinErr`] - ELF parsing errors from the goblin crate
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// ## Transformation Errors (fatal)
/// - [`Error::AmbiguousBoundary`] - A function subgraph has no unique entry or exit block
/// - [`Error::RegisterPoolExhausted`] - Not enough scratch registers for a region or block
/// - [`Error::StackPointerClobbered`] - `$sp` is written inside an allocation frame
/// - [`Error::NoPlacementFound`] - A grown segment fits into no free address range
/// - [`Error::BranchOutOfRange`] - A retargeted branch can no longer encode its target
///
/// ## Internal Errors
/// - [`Error::GraphError`] - Graph construction referenced a node that does not exist
///
/// # Examples
///
/// ```rust,ignore
/// use mipsweave::Error;
///
/// match transformer.run(&mut program, &mut image, &["main"]) {
///     Ok(report) => println!("{}", report.summary()),
///     Err(Error::NotFound { name }) => eprintln!("no such function: {name}"),
///     Err(e) if e.is_fatal() => eprintln!("transformation aborted: {e}"),
///     Err(e) => eprintln!("error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// No block of the control flow graph belongs to the requested function.
    ///
    /// This is the only recoverable error: the caller should re-check its input
    /// (function names are matched exactly).
    #[error("Function '{name}' not found in control flow graph")]
    NotFound {
        /// The function name that was looked up
        name: String,
    },

    /// The function subgraph does not have exactly one entry and one exit block.
    ///
    /// Functions with multiple return paths and no unifying exit block, or irreducible
    /// entry structures, must be rejected or pre-split by the caller.
    #[error("Function '{function}' has {entries} entry and {exits} exit blocks, expected exactly one of each")]
    AmbiguousBoundary {
        /// The function whose boundary could not be located
        function: String,
        /// Number of blocks without an in-subgraph predecessor
        entries: usize,
        /// Number of blocks without an in-subgraph successor
        exits: usize,
    },

    /// The scratch register pool cannot hold every synthetic register of a region.
    #[error("Register pool exhausted - {needed} registers needed, {available} available")]
    RegisterPoolExhausted {
        /// Number of physical registers that would have been required
        needed: usize,
        /// Number of physical registers that were available
        available: usize,
    },

    /// An instruction inside an allocation frame writes the stack pointer.
    ///
    /// Allocation frames move `$sp` for their lifetime; an instruction that adjusts
    /// `$sp` itself inside such a frame cannot be rebased.
    #[error("Stack pointer written at 0x{address:08x} inside an allocation frame")]
    StackPointerClobbered {
        /// Original address of the offending instruction (0 when synthesized)
        address: u64,
    },

    /// No free address range can hold a grown segment.
    ///
    /// Aborts the whole run; relocating the entire image is not attempted.
    #[error("No free address range fits segment '{segment}' ({required} bytes)")]
    NoPlacementFound {
        /// Name of the segment that could not be placed
        segment: String,
        /// Size in bytes the segment needs after growth
        required: u64,
    },

    /// A retargeted branch or jump can no longer reach its target.
    #[error("Control transfer at 0x{address:08x} cannot reach 0x{target:08x}")]
    BranchOutOfRange {
        /// New address of the branch instruction
        address: u64,
        /// New absolute target address
        target: u64,
    },

    /// The input is damaged or internally inconsistent.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This input type is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during ELF parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// Graph construction error.
    ///
    /// Raised when an edge references a node that was never added to a graph.
    #[error("{0}")]
    GraphError(String),
}

impl Error {
    /// Returns `true` if this error must abort the whole transformation run.
    ///
    /// Only [`Error::NotFound`] leaves the caller room to correct its input and retry.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_recoverable() {
        let err = Error::NotFound {
            name: "main".to_string(),
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("main"));
    }

    #[test]
    fn test_transformation_errors_are_fatal() {
        let errors = [
            Error::AmbiguousBoundary {
                function: "f".to_string(),
                entries: 1,
                exits: 2,
            },
            Error::RegisterPoolExhausted {
                needed: 9,
                available: 8,
            },
            Error::NoPlacementFound {
                segment: ".text".to_string(),
                required: 76,
            },
        ];
        for err in &errors {
            assert!(err.is_fatal(), "{err} should be fatal");
        }
    }

    #[test]
    fn test_malformed_macro_captures_location() {
        let err = malformed_error!("bad block {}", 3);
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad block 3");
                assert!(file.ends_with("error.rs"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
