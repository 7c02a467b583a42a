//! Loading [`BinaryImage`] metadata from 32-bit MIPS ELF files.

use std::path::Path;

use goblin::elf::{
    header::EM_MIPS,
    section_header::{SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHT_NULL},
    sym::{STT_FUNC, STT_OBJECT, STT_SECTION},
    Elf,
};

use crate::{
    program::{BinaryImage, Permissions, Section, Symbol, SymbolKind},
    Error, Result,
};

impl BinaryImage {
    /// Reads the section table, symbol table and entry point of a 32-bit MIPS ELF.
    ///
    /// Sections carrying `SHF_ALLOC` are loadable; their permissions are derived from
    /// `SHF_WRITE` and `SHF_EXECINSTR`. Unnamed symbols are skipped.
    ///
    /// # Arguments
    ///
    /// * `data` - The raw file contents
    ///
    /// # Errors
    ///
    /// Returns [`Error::GoblinErr`] if the data is not a parseable ELF file and
    /// [`Error::NotSupported`] for 64-bit files or machines other than MIPS.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use mipsweave::program::BinaryImage;
    ///
    /// let data = std::fs::read("firmware.elf")?;
    /// let image = BinaryImage::from_elf(&data)?;
    /// for section in &image.sections {
    ///     println!("{} @ 0x{:08x} ({} bytes)", section.name, section.address, section.size);
    /// }
    /// ```
    pub fn from_elf(data: &[u8]) -> Result<Self> {
        let elf = Elf::parse(data)?;
        if elf.is_64 || elf.header.e_machine != EM_MIPS {
            return Err(Error::NotSupported);
        }

        let mut image = BinaryImage::default();
        image.entry = elf.entry;

        for header in elf.section_headers.iter().filter(|h| h.sh_type != SHT_NULL) {
            let name = elf.shdr_strtab.get_at(header.sh_name).unwrap_or_default();

            let loadable = header.sh_flags & u64::from(SHF_ALLOC) != 0;
            let mut permissions = Permissions::empty();
            if loadable {
                permissions |= Permissions::READ;
            }
            if header.sh_flags & u64::from(SHF_WRITE) != 0 {
                permissions |= Permissions::WRITE;
            }
            if header.sh_flags & u64::from(SHF_EXECINSTR) != 0 {
                permissions |= Permissions::EXECUTE;
            }

            let mut section = Section::new(
                name,
                header.sh_addr,
                header.sh_size,
                header.sh_offset,
                header.sh_addralign,
                permissions,
            );
            section.loadable = loadable;
            image.add_section(section);
        }

        for sym in elf.syms.iter() {
            let name = elf.strtab.get_at(sym.st_name).unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let kind = match sym.st_type() {
                STT_FUNC => SymbolKind::Function,
                STT_OBJECT => SymbolKind::Object,
                STT_SECTION => SymbolKind::Section,
                _ => SymbolKind::Other,
            };
            image.symbols.push(Symbol {
                name: name.to_string(),
                value: sym.st_value,
                size: sym.st_size,
                kind,
            });
        }

        Ok(image)
    }

    /// Reads a 32-bit MIPS ELF file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be read, otherwise the errors of
    /// [`BinaryImage::from_elf`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_elf(&data)
    }
}
