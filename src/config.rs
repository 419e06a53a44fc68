//! Compiler configuration.
//!
//! A small builder-style struct in the shape of this kind of compiler's
//! usual extensibility surface: a plain struct with `Default`, a `new`
//! constructor, and `with_*` methods that consume and return `Self`.

#[derive(Debug, Clone, PartialEq)]
pub struct CompilerOptions {
    /// Size of the global temp-slot pool used to spill operands around
    /// nested calls in binary expressions. Must be at least the depth
    /// of the deepest nested binary expression in the source.
    pub temp_slot_pool_size: usize,
    /// Whether the emitted instruction listing ends with a trailing
    /// newline when written to a file or stdout.
    pub emit_trailing_newline: bool,
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temp_slot_pool_size(mut self, size: usize) -> Self {
        self.temp_slot_pool_size = size;
        self
    }

    pub fn with_emit_trailing_newline(mut self, emit: bool) -> Self {
        self.emit_trailing_newline = emit;
        self
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions { temp_slot_pool_size: 4, emit_trailing_newline: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_size_is_four() {
        let opts = CompilerOptions::default();
        assert_eq!(opts.temp_slot_pool_size, 4);
        assert!(opts.emit_trailing_newline);
    }

    #[test]
    fn builder_methods_override_defaults() {
        let opts = CompilerOptions::new().with_temp_slot_pool_size(8).with_emit_trailing_newline(false);
        assert_eq!(opts.temp_slot_pool_size, 8);
        assert!(!opts.emit_trailing_newline);
    }
}
