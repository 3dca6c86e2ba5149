//! # Symbol Resolution
//!
//! Turns sampled instruction pointers into function entries.
//!
//! ## Sources
//!
//! Symbols come from line-oriented text producers, merged into one
//! address-sorted [`SymbolTable`]:
//!
//! 1. `nm -a -C <binary>` for the profiled application (base address 0)
//! 2. the kernel symbol file (`/proc/kallsyms`), every entry classified as kernel
//! 3. separate debug objects for mapped libraries
//!    (`<debug root><mapped filename>`), relocated to the mapping start
//! 4. lines supplied by the embedding host
//!
//! A source that cannot be started or read is logged and skipped.
//!
//! ## Lookup
//!
//! An address resolves to the entry with the greatest address not exceeding
//! it. Addresses outside every known mapping get a synthetic region and an
//! `unresolved` placeholder entry, so every sampled address resolves to
//! exactly one entry.
//!
//! ```text
//! 0x401000 main          ◀── 0x401234 resolves here
//! 0x402000 compute
//! 0x7f..00 libc.so.6+0x… ◀── placeholder for an address with no symbol coverage
//! ```
//!
//! The [`FunctionTable`] keeps only the entries hit by samples; its indices
//! ([`FunctionId`](crate::domain::FunctionId)) key every aggregate.

pub mod memory_maps;
pub mod resolver;
pub mod symbol_source;
pub mod symbol_table;

pub use memory_maps::{MemoryMapIndex, MemoryRange, MemoryRegion};
pub use resolver::{ResolvedSymbols, SymbolResolver};
pub use symbol_source::{
    demangle_symbol, load_symbols, parse_symbol_line, NmProcess, StaticSymbols, SymbolFile,
    SymbolSource,
};
pub use symbol_table::{FunctionEntry, FunctionKind, FunctionTable, SymbolTable};
