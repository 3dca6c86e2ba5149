//! Address-sorted function tables
//!
//! Two tables share this type: the symbol table (everything every source
//! reported) and the function table (only entries hit by samples). Both are
//! kept sorted by address so lookups are a binary search for the greatest
//! address not exceeding the query.

use crate::domain::FunctionId;
use serde::Serialize;
use std::fmt;

/// What kind of symbol an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Text,
    Weak,
    Kernel,
    Misc,
    /// Placeholder registered for an address no source could name
    Unresolved,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Weak => "weak",
            Self::Kernel => "kernel",
            Self::Misc => "misc",
            Self::Unresolved => "unresolved",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEntry {
    pub address: u64,
    /// Owning class, for sources that report one
    pub class_id: Option<u32>,
    pub name: String,
    pub kind: FunctionKind,
}

impl FunctionEntry {
    #[must_use]
    pub fn new(address: u64, name: impl Into<String>, kind: FunctionKind) -> Self {
        Self { address, class_id: None, name: name.into(), kind }
    }

    #[must_use]
    pub fn is_kernel(&self) -> bool {
        self.kind == FunctionKind::Kernel
    }
}

/// Entries sorted ascending by address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: Vec<FunctionEntry>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from unordered entries
    #[must_use]
    pub fn from_entries(entries: Vec<FunctionEntry>) -> Self {
        let mut table = Self { entries };
        table.sort();
        table
    }

    /// Append without keeping order; call [`SymbolTable::sort`] after bulk loading
    pub fn push_unsorted(&mut self, entry: FunctionEntry) {
        self.entries.push(entry);
    }

    /// Stable sort by address, so duplicates keep their load order
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|entry| entry.address);
    }

    /// Insert keeping address order; lands after existing entries at the same address
    pub fn insert_sorted(&mut self, entry: FunctionEntry) -> usize {
        let position = self.entries.partition_point(|e| e.address <= entry.address);
        self.entries.insert(position, entry);
        position
    }

    /// Index of the entry with the greatest address not exceeding `address`
    ///
    /// When several entries share that address, the first one inserted wins.
    #[must_use]
    pub fn lookup_index(&self, address: u64) -> Option<usize> {
        let upper = self.entries.partition_point(|e| e.address <= address);
        let candidate = upper.checked_sub(1)?;
        let found = self.entries[candidate].address;
        Some(self.entries[..candidate].partition_point(|e| e.address < found))
    }

    #[must_use]
    pub fn lookup(&self, address: u64) -> Option<&FunctionEntry> {
        self.lookup_index(address).map(|index| &self.entries[index])
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&FunctionEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn entries(&self) -> &[FunctionEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The subset of symbols hit by samples, indexed by [`FunctionId`]
///
/// Ids are positions in the address-sorted table and never change once the
/// table is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionTable {
    table: SymbolTable,
}

impl FunctionTable {
    /// Build from entries that are already sorted by address
    #[must_use]
    pub fn from_sorted(entries: Vec<FunctionEntry>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].address <= w[1].address));
        Self { table: SymbolTable { entries } }
    }

    /// Function covering `address`, with its id
    #[must_use]
    pub fn resolve(&self, address: u64) -> Option<(FunctionId, &FunctionEntry)> {
        let index = self.table.lookup_index(address)?;
        let id = u32::try_from(index).ok()?;
        Some((FunctionId(id), &self.table.entries[index]))
    }

    /// Resolve to an id, ignoring kernel functions
    #[must_use]
    pub fn resolve_user(&self, address: u64) -> Option<FunctionId> {
        self.resolve(address).filter(|(_, entry)| !entry.is_kernel()).map(|(id, _)| id)
    }

    #[must_use]
    pub fn get(&self, id: FunctionId) -> Option<&FunctionEntry> {
        self.table.get(id.index())
    }

    #[must_use]
    pub fn name(&self, id: FunctionId) -> &str {
        self.get(id).map_or("<unknown>", |entry| entry.name.as_str())
    }

    #[must_use]
    pub fn entries(&self) -> &[FunctionEntry] {
        self.table.entries()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FunctionId, &FunctionEntry)> {
        self.table
            .entries()
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| Some((FunctionId(u32::try_from(index).ok()?), entry)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        SymbolTable::from_entries(vec![
            FunctionEntry::new(0x3000, "gamma", FunctionKind::Text),
            FunctionEntry::new(0x1000, "alpha", FunctionKind::Text),
            FunctionEntry::new(0x2000, "beta", FunctionKind::Weak),
        ])
    }

    #[test]
    fn test_lookup_greatest_not_exceeding() {
        let table = table();
        assert_eq!(table.lookup(0x1000).map(|e| e.name.as_str()), Some("alpha"));
        assert_eq!(table.lookup(0x1fff).map(|e| e.name.as_str()), Some("alpha"));
        assert_eq!(table.lookup(0x2000).map(|e| e.name.as_str()), Some("beta"));
        assert_eq!(table.lookup(0xffff).map(|e| e.name.as_str()), Some("gamma"));
    }

    #[test]
    fn test_lookup_below_first_or_empty() {
        assert!(table().lookup(0x0fff).is_none());
        assert!(SymbolTable::new().lookup(0x1000).is_none());
    }

    #[test]
    fn test_duplicate_addresses_resolve_to_first_inserted() {
        let mut table = SymbolTable::new();
        table.push_unsorted(FunctionEntry::new(0x2000, "second_source", FunctionKind::Text));
        table.push_unsorted(FunctionEntry::new(0x1000, "low", FunctionKind::Text));
        table.push_unsorted(FunctionEntry::new(0x2000, "third_source", FunctionKind::Text));
        table.push_unsorted(FunctionEntry::new(0x2000, "fourth_source", FunctionKind::Text));
        table.sort();

        assert_eq!(table.lookup(0x2100).map(|e| e.name.as_str()), Some("second_source"));
        assert_eq!(table.lookup_index(0x2000), Some(1));
    }

    #[test]
    fn test_resort_is_idempotent() {
        let mut table = table();
        table.push_unsorted(FunctionEntry::new(0x2000, "beta_alias", FunctionKind::Text));
        table.push_unsorted(FunctionEntry::new(0x1000, "alpha_alias", FunctionKind::Text));
        table.sort();
        let once = table.clone();

        table.sort();
        assert_eq!(table, once);
        let names: Vec<&str> = table.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "alpha_alias", "beta", "beta_alias", "gamma"]);
    }

    #[test]
    fn test_insert_sorted_keeps_order() {
        let mut table = table();
        let position = table.insert_sorted(FunctionEntry::new(0x2800, "[unknown]", FunctionKind::Unresolved));
        assert_eq!(position, 2);
        let addresses: Vec<u64> = table.entries().iter().map(|e| e.address).collect();
        assert_eq!(addresses, vec![0x1000, 0x2000, 0x2800, 0x3000]);
    }

    #[test]
    fn test_function_table_resolve_user_skips_kernel() {
        let functions = FunctionTable::from_sorted(vec![
            FunctionEntry::new(0x1000, "main", FunctionKind::Text),
            FunctionEntry::new(0xffff_ffff_8100_0000, "schedule", FunctionKind::Kernel),
        ]);

        assert_eq!(functions.resolve_user(0x1010), Some(FunctionId(0)));
        assert_eq!(functions.resolve_user(0xffff_ffff_8100_0010), None);
        assert_eq!(functions.resolve(0xffff_ffff_8100_0010).map(|(id, _)| id), Some(FunctionId(1)));
        assert_eq!(functions.name(FunctionId(0)), "main");
        assert_eq!(functions.name(FunctionId(9)), "<unknown>");
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&FunctionKind::Unresolved).unwrap();
        assert_eq!(json, "\"unresolved\"");
    }
}
