//! Layout metadata of the binary being rewritten.
//!
//! [`BinaryImage`] is the part of an executable that relocation has to keep consistent
//! with the program: the section table (addresses, sizes, file offsets, permissions) and
//! the symbol table. Raw section contents are not held here; serializing the rewritten
//! binary is the job of the caller.

use bitflags::bitflags;

bitflags! {
    /// Access permissions of a section.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        /// Readable
        const READ = 0x1;
        /// Writable
        const WRITE = 0x2;
        /// Executable
        const EXECUTE = 0x4;
    }
}

/// A named region of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name, e.g. `.text`
    pub name: String,
    /// Virtual address
    pub address: u64,
    /// Mapped size in bytes
    pub size: u64,
    /// Offset of the contents in the file
    pub offset: u64,
    /// Required address alignment (1 when unconstrained)
    pub alignment: u64,
    /// Access permissions
    pub permissions: Permissions,
    /// `true` if the section occupies memory at run time
    pub loadable: bool,
}

impl Section {
    /// Creates a loadable section.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        address: u64,
        size: u64,
        offset: u64,
        alignment: u64,
        permissions: Permissions,
    ) -> Self {
        Section {
            name: name.into(),
            address,
            size,
            offset,
            alignment: alignment.max(1),
            permissions,
            loadable: true,
        }
    }

    /// Returns the first address past the section.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.address + self.size
    }

    /// Returns `true` if `address` lies within the section.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.address && address < self.end()
    }

    /// Returns `true` for executable sections.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.permissions.contains(Permissions::EXECUTE)
    }

    /// Returns `true` for writable sections.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.permissions.contains(Permissions::WRITE)
    }
}

/// Classification of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Code entry point
    Function,
    /// Data object
    Object,
    /// Section symbol
    Section,
    /// Anything else
    Other,
}

/// A symbol table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Symbol name
    pub name: String,
    /// Symbol value (the address for functions and objects)
    pub value: u64,
    /// Size in bytes
    pub size: u64,
    /// Classification
    pub kind: SymbolKind,
}

impl Symbol {
    /// Creates a function symbol.
    #[must_use]
    pub fn function(name: impl Into<String>, value: u64, size: u64) -> Self {
        Symbol {
            name: name.into(),
            value,
            size,
            kind: SymbolKind::Function,
        }
    }
}

/// The symbols of an image, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Creates an empty symbol table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a symbol.
    pub fn push(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }

    /// Returns the number of symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterates over all symbols.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.iter()
    }

    /// Iterates mutably over all symbols.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Symbol> + '_ {
        self.symbols.iter_mut()
    }

    /// Returns the first symbol named `name`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }
}

/// Section and symbol metadata of an executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    /// Section table, in file order
    pub sections: Vec<Section>,
    /// Symbol table
    pub symbols: SymbolTable,
    /// Entry point address
    pub entry: u64,
    /// Exclusive upper bound for placing loadable sections
    pub address_limit: u64,
}

impl Default for BinaryImage {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ADDRESS_LIMIT)
    }
}

impl BinaryImage {
    /// End of the MIPS32 user segment (`kuseg`).
    pub const DEFAULT_ADDRESS_LIMIT: u64 = 0x8000_0000;

    /// Creates an empty image.
    #[must_use]
    pub fn new(address_limit: u64) -> Self {
        BinaryImage {
            sections: Vec::new(),
            symbols: SymbolTable::new(),
            entry: 0,
            address_limit,
        }
    }

    /// Appends a section.
    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Returns the section named `name`.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Returns the loadable section containing `address`.
    #[must_use]
    pub fn section_containing(&self, address: u64) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.loadable && s.contains(address))
    }

    /// Returns the indices of loadable, non-empty sections sorted by address.
    #[must_use]
    pub fn loadable_by_address(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.loadable && s.size > 0)
            .map(|(i, _)| i)
            .collect();
        indices.sort_by_key(|&i| self.sections[i].address);
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_extent_and_permissions() {
        let text = Section::new(
            ".text",
            0x400000,
            0x40,
            0x1000,
            16,
            Permissions::READ | Permissions::EXECUTE,
        );
        assert_eq!(text.end(), 0x400040);
        assert!(text.contains(0x40003c));
        assert!(!text.contains(0x400040));
        assert!(text.is_executable());
        assert!(!text.is_writable());

        let unaligned = Section::new(".x", 0, 4, 0, 0, Permissions::READ);
        assert_eq!(unaligned.alignment, 1);
    }

    #[test]
    fn test_loadable_by_address() {
        let mut image = BinaryImage::default();
        image.add_section(Section::new(".data", 0x400100, 16, 0, 4, Permissions::READ));
        image.add_section(Section::new(".text", 0x400000, 16, 0, 4, Permissions::EXECUTE));
        let mut note = Section::new(".comment", 0, 8, 0, 1, Permissions::empty());
        note.loadable = false;
        image.add_section(note);

        assert_eq!(image.loadable_by_address(), vec![1, 0]);
        assert_eq!(
            image.section_containing(0x400104).map(|s| s.name.as_str()),
            Some(".data")
        );
        assert!(image.section_containing(0x4).is_none());
        assert_eq!(image.address_limit, BinaryImage::DEFAULT_ADDRESS_LIMIT);
    }

    #[test]
    fn test_symbol_table() {
        let mut symbols = SymbolTable::new();
        assert!(symbols.is_empty());
        symbols.push(Symbol::function("main", 0x400000, 32));
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols.by_name("main").map(|s| s.value), Some(0x400000));
        for sym in symbols.iter_mut() {
            sym.value += 4;
        }
        assert_eq!(symbols.iter().next().map(|s| s.value), Some(0x400004));
    }
}
